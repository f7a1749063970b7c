//! Inbound request contract.
//!
//! [`RequestParts`] is everything the binder needs from the hosting HTTP
//! layer: method, path, query string, declared content type, and the raw
//! body. Path-template parameters are matched by the external router and
//! arrive separately as [`PathParams`].

use hyper::body::Bytes;
use hyper::Method;
use serde_json::Value as Json;
use std::collections::BTreeMap;

/// Path-template matches supplied by the hosting HTTP layer.
pub type PathParams = BTreeMap<String, String>;

/// The binder's view of one HTTP request.
#[derive(Debug, Clone)]
pub struct RequestParts {
    pub method: Method,
    /// Request path without the query string.
    pub path: String,
    pub query: Option<String>,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl RequestParts {
    /// A GET request; a `?query` suffix on `target` becomes the query string.
    pub fn get(target: &str) -> Self {
        let (path, query) = split_target(target);
        Self {
            method: Method::GET,
            path,
            query,
            content_type: None,
            body: Bytes::new(),
        }
    }

    /// A POST request with a JSON body.
    pub fn post_json(target: &str, body: &Json) -> Self {
        let (path, query) = split_target(target);
        Self {
            method: Method::POST,
            path,
            query,
            content_type: Some("application/json".to_string()),
            body: Bytes::from(body.to_string()),
        }
    }

    /// A POST request with a multipart form body.
    pub fn post_multipart(target: &str, pairs: &[(&str, &str)]) -> Self {
        let (path, query) = split_target(target);
        let boundary = "----loam-form-boundary";
        let mut body = String::new();
        for (key, value) in pairs {
            body.push_str(&format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{key}\"\r\n\r\n{value}\r\n"
            ));
        }
        body.push_str(&format!("--{boundary}--\r\n"));
        Self {
            method: Method::POST,
            path,
            query,
            content_type: Some(format!("multipart/form-data; boundary={boundary}")),
            body: Bytes::from(body),
        }
    }

    /// A POST request with a form-urlencoded body.
    pub fn post_form(target: &str, pairs: &[(&str, &str)]) -> Self {
        let (path, query) = split_target(target);
        let body: String = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs)
            .finish();
        Self {
            method: Method::POST,
            path,
            query,
            content_type: Some("application/x-www-form-urlencoded".to_string()),
            body: Bytes::from(body),
        }
    }
}

fn split_target(target: &str) -> (String, Option<String>) {
    match target.split_once('?') {
        Some((path, query)) => (path.to_string(), Some(query.to_string())),
        None => (target.to_string(), None),
    }
}

/// Parse a query string into a flat map; the first value wins for repeated
/// keys.
pub(crate) fn parse_query(query: &str) -> BTreeMap<String, Json> {
    let mut out = BTreeMap::new();
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        out.entry(key.into_owned())
            .or_insert_with(|| Json::String(value.into_owned()));
    }
    out
}

/// Parse a form-urlencoded body into a flat map; the first value wins for
/// repeated keys. Keys are normalized `-` to `_` like JSON body keys.
pub(crate) fn parse_form(body: &[u8]) -> BTreeMap<String, Json> {
    let mut out = BTreeMap::new();
    for (key, value) in url::form_urlencoded::parse(body) {
        out.entry(normalize_key(&key))
            .or_insert_with(|| Json::String(value.into_owned()));
    }
    out
}

/// Body keys are identifiers on the handler side; hyphens become
/// underscores.
pub(crate) fn normalize_key(key: &str) -> String {
    key.replace('-', "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_first_value_wins() {
        let map = parse_query("a=1&b=2&a=3");
        assert_eq!(map.get("a"), Some(&Json::String("1".to_string())));
        assert_eq!(map.get("b"), Some(&Json::String("2".to_string())));
    }

    #[test]
    fn query_decodes_plus_and_percent() {
        let map = parse_query("param=Get+Param&x=a%26b");
        assert_eq!(map.get("param"), Some(&Json::String("Get Param".to_string())));
        assert_eq!(map.get("x"), Some(&Json::String("a&b".to_string())));
    }

    #[test]
    fn form_keys_are_normalized() {
        let map = parse_form(b"csrf-token=abc&data=hi");
        assert_eq!(map.get("csrf_token"), Some(&Json::String("abc".to_string())));
        assert_eq!(map.get("data"), Some(&Json::String("hi".to_string())));
    }

    #[test]
    fn target_splits_query() {
        let req = RequestParts::get("/test?a=1");
        assert_eq!(req.path, "/test");
        assert_eq!(req.query.as_deref(), Some("a=1"));

        let req = RequestParts::get("/test");
        assert_eq!(req.path, "/test");
        assert_eq!(req.query, None);
    }
}
