//! Error taxonomy shared at the seams the core exposes to an external
//! façade. Internal plumbing uses `anyhow::Result`; this type is the
//! boundary representation for the handful of call sites that need a typed,
//! HTTP-shape-aware error (worker permanent-failure tagging, report status
//! responses).

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub enum ApiError {
    Validation(Vec<FieldError>),
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    RateLimit { retry_after_secs: u64 },
    Upstream(String),
    Internal(String),
}

impl ApiError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        ApiError::Validation(vec![FieldError {
            field: field.to_string(),
            message: message.into(),
        }])
    }

    /// Machine-readable code, matching the `{code: "..."}` response shape.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::Unauthorized => "UNAUTHORIZED",
            ApiError::Forbidden => "FORBIDDEN",
            ApiError::NotFound => "NOT_FOUND",
            ApiError::Conflict => "CONFLICT",
            ApiError::RateLimit { .. } => "RATE_LIMIT",
            ApiError::Upstream(_) => "UPSTREAM_ERROR",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            ApiError::Validation(_) => 400,
            ApiError::Unauthorized => 401,
            ApiError::Forbidden => 403,
            ApiError::NotFound => 404,
            ApiError::Conflict => 409,
            ApiError::RateLimit { .. } => 429,
            ApiError::Upstream(_) => 502,
            ApiError::Internal(_) => 500,
        }
    }

    /// An error is "permanent" for queue retry purposes when retrying the
    /// same payload can never succeed (malformed payload, missing row).
    pub fn is_permanent_for_queue(&self) -> bool {
        matches!(self, ApiError::Validation(_) | ApiError::NotFound)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Validation(details) => {
                write!(f, "validation error: ")?;
                for (i, d) in details.iter().enumerate() {
                    if i > 0 {
                        write!(f, "; ")?;
                    }
                    write!(f, "{}: {}", d.field, d.message)?;
                }
                Ok(())
            }
            ApiError::Unauthorized => write!(f, "unauthorized"),
            ApiError::Forbidden => write!(f, "forbidden"),
            ApiError::NotFound => write!(f, "not found"),
            ApiError::Conflict => write!(f, "conflict"),
            ApiError::RateLimit { retry_after_secs } => {
                write!(f, "rate limited, retry after {retry_after_secs}s")
            }
            ApiError::Upstream(msg) => write!(f, "upstream error: {msg}"),
            ApiError::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_matches_taxonomy_table() {
        assert_eq!(ApiError::validation("asin", "bad").http_status(), 400);
        assert_eq!(ApiError::Unauthorized.http_status(), 401);
        assert_eq!(ApiError::Forbidden.http_status(), 403);
        assert_eq!(ApiError::NotFound.http_status(), 404);
        assert_eq!(ApiError::Conflict.http_status(), 409);
        assert_eq!(ApiError::RateLimit { retry_after_secs: 5 }.http_status(), 429);
        assert_eq!(ApiError::Internal("x".into()).http_status(), 500);
    }

    #[test]
    fn only_validation_and_not_found_are_permanent_for_queue_retry() {
        assert!(ApiError::validation("x", "y").is_permanent_for_queue());
        assert!(ApiError::NotFound.is_permanent_for_queue());
        assert!(!ApiError::Upstream("timeout".into()).is_permanent_for_queue());
        assert!(!ApiError::Internal("x".into()).is_permanent_for_queue());
    }
}
