use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;

use crate::model::ErrorsResponse;
use crate::retry::{RetryDecision, RetryError};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("failed to reach Asana: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("invalid Asana response body: {0}")]
    Decode(#[source] reqwest::Error),
    #[error("rate limited by Asana (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },
    #[error("asana server error {status}: {}", summary(.detail))]
    Server {
        status: StatusCode,
        detail: ErrorsResponse,
    },
    #[error("asana client error {status} ({label}): {}", summary(.detail))]
    Client {
        status: StatusCode,
        label: &'static str,
        detail: ErrorsResponse,
    },
    #[error("retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<ApiError>,
    },
    #[error("pagination cycle: offset {offset} was returned twice")]
    PaginationCycle { offset: String },
}

fn summary(detail: &ErrorsResponse) -> &str {
    detail
        .errors
        .first()
        .map(|e| e.message.as_str())
        .filter(|m| !m.is_empty())
        .unwrap_or("no error detail")
}

impl ApiError {
    pub(crate) fn client(status: StatusCode, detail: ErrorsResponse) -> Self {
        let label = match status {
            StatusCode::BAD_REQUEST => "missing or malformed parameter",
            StatusCode::UNAUTHORIZED => "unauthorized",
            StatusCode::FORBIDDEN => "forbidden",
            StatusCode::NOT_FOUND => "not found",
            _ => "request rejected",
        };
        ApiError::Client {
            status,
            label,
            detail,
        }
    }

    /// HTTP status of the failing response, looking through exhausted retries.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Server { status, .. } | ApiError::Client { status, .. } => Some(*status),
            ApiError::RateLimited { .. } => Some(StatusCode::TOO_MANY_REQUESTS),
            ApiError::Transport(err) | ApiError::Decode(err) => err.status(),
            ApiError::RetriesExhausted { last, .. } => last.status(),
            ApiError::PaginationCycle { .. } => None,
        }
    }

    /// First error message parsed from the response body, if any.
    pub fn message(&self) -> Option<&str> {
        match self {
            ApiError::Server { detail, .. } | ApiError::Client { detail, .. } => {
                detail.errors.first().map(|e| e.message.as_str())
            }
            ApiError::RetriesExhausted { last, .. } => last.message(),
            _ => None,
        }
    }

    /// Retry classification for a single attempt. A `Retry-After` hint is
    /// shortened by `base_delay` and clamped at zero.
    pub fn retry_decision(&self, base_delay: Duration) -> RetryDecision {
        match self {
            ApiError::RateLimited {
                retry_after: Some(after),
            } => RetryDecision::RetryAfter(after.saturating_sub(base_delay)),
            ApiError::RateLimited { retry_after: None } | ApiError::Server { .. } => {
                RetryDecision::Backoff
            }
            ApiError::Transport(err) if !err.is_builder() => RetryDecision::Backoff,
            _ => RetryDecision::Fail,
        }
    }
}

impl From<RetryError<ApiError>> for ApiError {
    fn from(err: RetryError<ApiError>) -> Self {
        match err {
            RetryError::Permanent(err) => err,
            RetryError::Exhausted { attempts, last } => ApiError::RetriesExhausted {
                attempts,
                last: Box::new(last),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ErrorDetail;

    const BASE: Duration = Duration::from_millis(50);

    fn detail(message: &str) -> ErrorsResponse {
        ErrorsResponse {
            errors: vec![ErrorDetail {
                message: message.into(),
                help: "see docs".into(),
                phrase: "6 sad squid snuggle softly".into(),
            }],
        }
    }

    #[test]
    fn client_errors_fail_immediately() {
        for status in [
            StatusCode::BAD_REQUEST,
            StatusCode::UNAUTHORIZED,
            StatusCode::NOT_FOUND,
        ] {
            let err = ApiError::client(status, detail("nope"));
            assert_eq!(err.retry_decision(BASE), RetryDecision::Fail);
        }
    }

    #[test]
    fn server_errors_back_off() {
        let err = ApiError::Server {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail: ErrorsResponse::default(),
        };
        assert_eq!(err.retry_decision(BASE), RetryDecision::Backoff);
    }

    #[test]
    fn retry_after_is_shortened_by_base_delay() {
        let err = ApiError::RateLimited {
            retry_after: Some(Duration::from_secs(2)),
        };
        assert_eq!(
            err.retry_decision(BASE),
            RetryDecision::RetryAfter(Duration::from_millis(1950))
        );

        let err = ApiError::RateLimited {
            retry_after: Some(Duration::ZERO),
        };
        assert_eq!(
            err.retry_decision(BASE),
            RetryDecision::RetryAfter(Duration::ZERO)
        );

        let err = ApiError::RateLimited { retry_after: None };
        assert_eq!(err.retry_decision(BASE), RetryDecision::Backoff);
    }

    #[test]
    fn display_and_message_use_parsed_detail() {
        let err = ApiError::client(StatusCode::UNAUTHORIZED, detail("Not Authorized"));
        assert_eq!(err.message(), Some("Not Authorized"));
        let text = err.to_string();
        assert!(text.contains("401"));
        assert!(text.contains("unauthorized"));
        assert!(text.contains("Not Authorized"));

        let err = ApiError::client(StatusCode::NOT_FOUND, ErrorsResponse::default());
        assert!(err.to_string().contains("no error detail"));
    }

    #[test]
    fn exhausted_retries_wrap_last_error() {
        let err: ApiError = RetryError::Exhausted {
            attempts: 6,
            last: ApiError::Server {
                status: StatusCode::BAD_GATEWAY,
                detail: detail("upstream"),
            },
        }
        .into();
        assert!(matches!(err, ApiError::RetriesExhausted { attempts: 6, .. }));
        assert_eq!(err.status(), Some(StatusCode::BAD_GATEWAY));
        assert_eq!(err.message(), Some("upstream"));
    }
}
