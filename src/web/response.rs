//! Outbound response contract.
//!
//! Handlers return a [`Reply`]; rendering maps it onto an HTTP response per
//! the fixed contract: raw status code becomes an empty body with that
//! status, text becomes HTML (with a `redirect:` sentinel), byte sequences
//! become binary bodies, JSON objects get an `error` key defaulted to null,
//! and prepared responses pass through untouched.

use crate::api::ApiError;
use crate::logger;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Response, StatusCode};
use serde_json::{Map, Value as Json};

/// Redirect sentinel prefix on text replies.
const REDIRECT_PREFIX: &str = "redirect:";

/// A handler's return value, before serialization.
#[derive(Debug)]
pub enum Reply {
    /// Empty body with this status code.
    Status(u16),
    /// HTML text body (or a redirect when prefixed with `redirect:`).
    Text(String),
    /// Binary body, served as `application/octet-stream`.
    Bytes(Vec<u8>),
    /// JSON object body; the `error` key defaults to null.
    Json(Map<String, Json>),
    /// An explicit status paired with another reply.
    WithStatus(u16, Box<Reply>),
    /// A prepared response passed through untouched (streaming et al.).
    Raw(Response<Full<Bytes>>),
}

impl Reply {
    /// A JSON reply. Non-object values are coerced to their text rendering,
    /// matching the anything-else-becomes-text rule.
    pub fn json(value: Json) -> Self {
        match value {
            Json::Object(map) => Self::Json(map),
            other => Self::Text(other.to_string()),
        }
    }

    /// The common `{"msg": ...}` success body.
    pub fn msg(msg: impl Into<String>) -> Self {
        let mut map = Map::new();
        map.insert("msg".to_string(), Json::String(msg.into()));
        Self::Json(map)
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn redirect(target: &str) -> Self {
        Self::Text(format!("{REDIRECT_PREFIX}{target}"))
    }

    pub fn with_status(status: u16, reply: Reply) -> Self {
        Self::WithStatus(status, Box::new(reply))
    }
}

fn is_status_code(code: u16) -> bool {
    (100..600).contains(&code)
}

/// Serialize a reply into an HTTP response.
pub fn render(reply: Reply) -> Response<Full<Bytes>> {
    render_with(reply, StatusCode::OK)
}

fn render_with(reply: Reply, status: StatusCode) -> Response<Full<Bytes>> {
    match reply {
        Reply::WithStatus(code, inner) if is_status_code(code) => {
            match StatusCode::from_u16(code) {
                Ok(status) => render_with(*inner, status),
                Err(_) => render_with(*inner, StatusCode::OK),
            }
        }
        Reply::WithStatus(_, inner) => render_with(*inner, status),

        Reply::Raw(response) => response,

        Reply::Bytes(body) => build(status, "application/octet-stream", Bytes::from(body)),

        Reply::Text(text) => match text.strip_prefix(REDIRECT_PREFIX) {
            Some(target) => Response::builder()
                .status(StatusCode::FOUND)
                .header("Location", target)
                .body(Full::new(Bytes::new()))
                .unwrap_or_else(|e| {
                    logger::log_error(&format!("Failed to build redirect: {e}"));
                    build(StatusCode::OK, "text/html;charset=utf-8", Bytes::new())
                }),
            None => build(status, "text/html;charset=utf-8", Bytes::from(text)),
        },

        Reply::Json(mut map) => {
            map.entry("error".to_string()).or_insert(Json::Null);
            let body = serde_json::to_string(&map).unwrap_or_else(|e| {
                logger::log_error(&format!("Failed to serialize response: {e}"));
                r#"{"error":"server:server_internal_error"}"#.to_string()
            });
            build(status, "application/json;charset=utf-8", Bytes::from(body))
        }

        Reply::Status(code) => match StatusCode::from_u16(code) {
            Ok(status) if is_status_code(code) => {
                build(status, "text/plain;charset=utf-8", Bytes::new())
            }
            // Out-of-range codes degrade to their text rendering.
            _ => build(status, "text/plain;charset=utf-8", Bytes::from(code.to_string())),
        },
    }
}

fn build(status: StatusCode, content_type: &str, body: Bytes) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("Content-Type", content_type)
        .body(Full::new(body))
        .unwrap_or_else(|e| {
            logger::log_error(&format!("Failed to build response: {e}"));
            Response::new(Full::new(Bytes::from("Error")))
        })
}

/// 400: structured application error as `{"error": code, "msg": message}`.
pub(crate) fn api_error_response(err: &ApiError) -> Response<Full<Bytes>> {
    let body = serde_json::json!({"error": err.code, "msg": err.msg});
    build(
        StatusCode::BAD_REQUEST,
        "application/json;charset=utf-8",
        Bytes::from(body.to_string()),
    )
}

/// 500: unclassified failure; detail stays in the logs.
pub(crate) fn internal_error_response() -> Response<Full<Bytes>> {
    build(
        StatusCode::INTERNAL_SERVER_ERROR,
        "application/json;charset=utf-8",
        Bytes::from(r#"{"error":"server:server_internal_error"}"#),
    )
}

/// 404: no route matched.
pub(crate) fn not_found_response(path: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({"error": "value:not_found", "msg": path});
    build(
        StatusCode::NOT_FOUND,
        "application/json;charset=utf-8",
        Bytes::from(body.to_string()),
    )
}
