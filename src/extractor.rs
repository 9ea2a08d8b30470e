//! Two-level pagination over the Asana API.
//!
//! Workspaces are listed first; users and projects are then paged per
//! workspace and concatenated in workspace order. A failure on any page
//! aborts the whole extraction.
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::api::{ApiError, AsanaApi, ListQuery};
use crate::model::{Page, Project, User, Workspace};

pub const DEFAULT_PAGE_LIMIT: u32 = 100;

/// Fields requested for users so that email, photo and memberships are filled.
pub const USER_OPT_FIELDS: &str = "name,email,photo,workspaces,workspaces.name";

#[derive(Clone)]
pub struct Extractor {
    api: Arc<dyn AsanaApi>,
    page_limit: u32,
}

impl Extractor {
    pub fn new(api: Arc<dyn AsanaApi>) -> Self {
        Self {
            api,
            page_limit: DEFAULT_PAGE_LIMIT,
        }
    }

    pub fn with_page_limit(mut self, page_limit: u32) -> Self {
        self.page_limit = page_limit;
        self
    }

    #[instrument(skip_all)]
    pub async fn get_all_workspaces(&self) -> Result<Vec<Workspace>, ApiError> {
        let api = &*self.api;
        let workspaces = paginate(ListQuery::new(self.page_limit), |q| async move {
            api.list_workspaces(&q).await
        })
        .await?;
        info!(count = workspaces.len(), "listed workspaces");
        Ok(workspaces)
    }

    #[instrument(skip_all)]
    pub async fn get_all_users(&self) -> Result<Vec<User>, ApiError> {
        let workspaces = self.get_all_workspaces().await?;
        let api = &*self.api;
        let mut users = Vec::new();
        for ws in &workspaces {
            let query = ListQuery::new(self.page_limit)
                .in_workspace(ws.gid.as_str())
                .with_opt_fields(USER_OPT_FIELDS);
            let page = paginate(query, |q| async move { api.list_users(&q).await }).await?;
            debug!(workspace = %ws.gid, count = page.len(), "listed workspace users");
            users.extend(page);
        }
        info!(workspaces = workspaces.len(), count = users.len(), "extracted users");
        Ok(users)
    }

    #[instrument(skip_all)]
    pub async fn get_all_projects(&self) -> Result<Vec<Project>, ApiError> {
        let workspaces = self.get_all_workspaces().await?;
        let api = &*self.api;
        let mut projects = Vec::new();
        for ws in &workspaces {
            let query = ListQuery::new(self.page_limit).in_workspace(ws.gid.as_str());
            let page = paginate(query, |q| async move { api.list_projects(&q).await }).await?;
            debug!(workspace = %ws.gid, count = page.len(), "listed workspace projects");
            projects.extend(page);
        }
        info!(
            workspaces = workspaces.len(),
            count = projects.len(),
            "extracted projects"
        );
        Ok(projects)
    }
}

/// Follow `next_page` cursors from `query` until none is returned.
async fn paginate<T, F, Fut>(mut query: ListQuery, mut fetch: F) -> Result<Vec<T>, ApiError>
where
    F: FnMut(ListQuery) -> Fut,
    Fut: Future<Output = Result<Page<T>, ApiError>>,
{
    let mut items = Vec::new();
    let mut seen = HashSet::new();
    loop {
        let (data, next) = fetch(query.clone()).await?.into_parts();
        items.extend(data);

        let Some(next) = next else {
            return Ok(items);
        };
        if !seen.insert(next.offset.clone()) {
            return Err(ApiError::PaginationCycle {
                offset: next.offset,
            });
        }
        query.offset = Some(next.offset);
    }
}
