use serde::{Deserialize, Serialize};

/// One page of a list endpoint: `{ data: [..], next_page: { offset } }`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Page<T> {
    pub data: Vec<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page: Option<NextPage>,
}

impl<T> Page<T> {
    pub fn into_parts(self) -> (Vec<T>, Option<NextPage>) {
        (self.data, self.next_page)
    }
}

/// Continuation cursor. Only its presence matters; offsets are opaque.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NextPage {
    pub offset: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Workspace {
    pub gid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Project {
    pub gid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub gid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub workspaces: Vec<Compact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<Photo>,
}

/// Compact reference to another resource, as embedded in a user record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Compact {
    pub gid: String,
    #[serde(default)]
    pub resource_type: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Photo {
    #[serde(rename = "image_27x27", default)]
    pub small: Option<String>,
    #[serde(rename = "image_128x128", default)]
    pub medium: Option<String>,
    #[serde(rename = "image_1024x1024", default)]
    pub huge: Option<String>,
}

/// Error body returned with 4xx/5xx responses.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorsResponse {
    #[serde(default)]
    pub errors: Vec<ErrorDetail>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorDetail {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub help: String,
    #[serde(default)]
    pub phrase: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn page_without_cursor_is_last() {
        let page: Page<Workspace> = serde_json::from_value(json!({
            "data": [{ "gid": "1" }, { "gid": "2" }],
            "next_page": null
        }))
        .unwrap();
        assert_eq!(page.data.len(), 2);
        assert!(page.next_page.is_none());

        let page: Page<Project> = serde_json::from_value(json!({ "data": [] })).unwrap();
        assert!(page.next_page.is_none());
    }

    #[test]
    fn page_keeps_offset_and_ignores_extra_cursor_fields() {
        let page: Page<Project> = serde_json::from_value(json!({
            "data": [{ "gid": "p1", "resource_type": "project" }],
            "next_page": { "offset": "eyJ0eXAi", "path": "/projects?offset=eyJ0eXAi", "uri": "https://x" }
        }))
        .unwrap();
        let (items, next) = page.into_parts();
        assert_eq!(items, vec![Project { gid: "p1".into() }]);
        assert_eq!(next.unwrap().offset, "eyJ0eXAi");
    }

    #[test]
    fn user_with_photo_and_workspaces() {
        let user: User = serde_json::from_value(json!({
            "gid": "u1",
            "name": "Ada",
            "email": "ada@example.com",
            "workspaces": [{ "gid": "w1", "resource_type": "workspace", "name": "Eng" }],
            "photo": {
                "image_27x27": "https://s/27.png",
                "image_128x128": "https://s/128.png",
                "image_1024x1024": "https://s/1024.png"
            }
        }))
        .unwrap();
        assert_eq!(user.workspaces[0].name, "Eng");
        let photo = user.photo.unwrap();
        assert_eq!(photo.small.as_deref(), Some("https://s/27.png"));
        assert_eq!(photo.huge.as_deref(), Some("https://s/1024.png"));
    }

    #[test]
    fn compact_user_fills_defaults() {
        let user: User = serde_json::from_value(json!({
            "gid": "u2",
            "name": "Bob",
            "resource_type": "user",
            "photo": null
        }))
        .unwrap();
        assert_eq!(user.email, "");
        assert!(user.workspaces.is_empty());
        assert!(user.photo.is_none());

        let out = serde_json::to_value(&user).unwrap();
        assert!(out.get("photo").is_none());
    }
}
