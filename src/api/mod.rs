//! JSON API error taxonomy and pagination helpers.
//!
//! Every structured failure a handler can report carries a stable error code
//! string (`request:bad_request`, `value:not_found`, ...) and a human-readable
//! message. Structured errors render as `{"error": code, "msg": message}` with
//! HTTP status 400; anything unclassified is collapsed to
//! `server:server_internal_error` with status 500 and is never leaked to the
//! client.

use crate::db::DbError;
use crate::orm::UnknownField;

/// A structured application error with a stable code and a message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {msg}")]
pub struct ApiError {
    pub code: String,
    pub msg: String,
}

impl ApiError {
    /// Create an error with an app-defined code.
    pub fn new(code: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            msg: msg.into(),
        }
    }

    /// Malformed or unsupported request body.
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new("request:bad_request", msg)
    }

    /// A required keyword parameter is absent; `param` names it.
    pub fn missing_param(param: impl Into<String>) -> Self {
        Self::new("request:missing_params", param)
    }

    /// Semantically invalid input value; `field` names the offending field.
    pub fn invalid_value(field: impl Into<String>) -> Self {
        Self::new("value:invalid", field)
    }

    /// A looked-up resource is absent.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::new("value:not_found", what)
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::new("permission:forbidden", msg)
    }

    pub fn need_login(msg: impl Into<String>) -> Self {
        Self::new("permission:need_login", msg)
    }
}

/// Failure result of a handler invocation.
///
/// `Api` surfaces to the client as a 400 with the structured body; `Internal`
/// is logged and surfaces only as a generic 500.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("{0}")]
    Api(#[from] ApiError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<DbError> for HandlerError {
    fn from(err: DbError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<UnknownField> for HandlerError {
    fn from(err: UnknownField) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Pagination window over a known item count.
///
/// Page indices are 1-based. An out-of-range index (or an empty collection)
/// degrades to an empty window on page 1 rather than failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub item_count: u64,
    pub page_index: u64,
    pub page_size: u64,
    pub page_count: u64,
    pub offset: u64,
    pub limit: u64,
    pub has_next: bool,
    pub has_previous: bool,
}

impl Page {
    /// A `page_size` of zero is treated as 1.
    pub fn new(item_count: u64, page_index: u64, page_size: u64) -> Self {
        let page_size = page_size.max(1);
        let page_count = item_count / page_size + u64::from(item_count % page_size > 0);
        let (page_index, offset, limit) = if item_count == 0 || page_index > page_count {
            (1, 0, 0)
        } else {
            (page_index, page_size * (page_index - 1), page_size)
        };
        Self {
            item_count,
            page_index,
            page_size,
            page_count,
            offset,
            limit,
            has_next: page_index < page_count,
            has_previous: page_index > 1,
        }
    }

    /// Default page size of 30 items.
    pub fn with_default_size(item_count: u64, page_index: u64) -> Self {
        Self::new(item_count, page_index, 30)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_violations_collapse_to_internal() {
        let err = UnknownField {
            table: "users".to_string(),
            field: "nickname".to_string(),
        };
        assert!(matches!(HandlerError::from(err), HandlerError::Internal(_)));
    }

    #[test]
    fn first_page_default_size() {
        let p = Page::with_default_size(100, 1);
        assert_eq!(p.page_count, 4);
        assert_eq!(p.offset, 0);
        assert_eq!(p.limit, 30);
        assert!(p.has_next);
        assert!(!p.has_previous);
    }

    #[test]
    fn middle_page() {
        let p = Page::new(90, 9, 10);
        assert_eq!(p.page_count, 9);
        assert_eq!(p.offset, 80);
        assert_eq!(p.limit, 10);
        assert!(!p.has_next);
    }

    #[test]
    fn last_partial_page() {
        let p = Page::new(91, 10, 10);
        assert_eq!(p.page_count, 10);
        assert_eq!(p.offset, 90);
        assert_eq!(p.limit, 10);
    }

    #[test]
    fn out_of_range_index_degrades() {
        let p = Page::new(10, 5, 10);
        assert_eq!(p.page_index, 1);
        assert_eq!(p.offset, 0);
        assert_eq!(p.limit, 0);
    }

    #[test]
    fn zero_page_size_is_clamped() {
        let p = Page::new(10, 1, 0);
        assert_eq!(p.page_size, 1);
        assert_eq!(p.page_count, 10);
        assert_eq!(p.limit, 1);
    }

    #[test]
    fn empty_collection() {
        let p = Page::new(0, 1, 10);
        assert_eq!(p.page_count, 0);
        assert_eq!(p.limit, 0);
        assert!(!p.has_next);
        assert!(!p.has_previous);
    }

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(ApiError::missing_param("x").code, "request:missing_params");
        assert_eq!(ApiError::bad_request("").code, "request:bad_request");
        assert_eq!(ApiError::not_found("y").code, "value:not_found");
        assert_eq!(ApiError::invalid_value("z").code, "value:invalid");
        assert_eq!(ApiError::forbidden("").code, "permission:forbidden");
        assert_eq!(ApiError::need_login("").code, "permission:need_login");
    }
}
