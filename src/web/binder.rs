//! Handler parameter contracts and the per-request binder.
//!
//! A [`ParamSpec`] is the handler descriptor: an explicit declaration, built
//! once at registration time, of which request-derived values the handler
//! needs. The binder extracts raw parameters from the request (body, query
//! string, or path parameters), filters them against the contract, and
//! produces the [`HandlerArgs`] the handler is invoked with.

use super::request::{normalize_key, parse_form, parse_query, PathParams, RequestParts};
use crate::api::ApiError;
use crate::logger;
use hyper::body::Bytes;
use hyper::Method;
use serde_json::Value as Json;
use std::collections::{BTreeMap, BTreeSet};
use std::convert::Infallible;

/// Per-handler parameter contract; immutable after registration.
#[derive(Debug, Clone, Default)]
pub struct ParamSpec {
    named: BTreeSet<String>,
    required: BTreeSet<String>,
    accepts_extra: bool,
    wants_request: bool,
}

impl ParamSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a parameter that must be present, or the request fails with
    /// `request:missing_params`.
    pub fn required(mut self, name: &str) -> Self {
        self.named.insert(name.to_string());
        self.required.insert(name.to_string());
        self
    }

    /// Declare a parameter the handler accepts but can live without.
    pub fn optional(mut self, name: &str) -> Self {
        self.named.insert(name.to_string());
        self
    }

    /// Accept an open-ended parameter map: filtering is skipped and every
    /// available parameter is passed through.
    pub fn accept_extra(mut self) -> Self {
        self.accepts_extra = true;
        self
    }

    /// Ask for the raw request to be injected into [`HandlerArgs::request`].
    pub fn with_request(mut self) -> Self {
        self.wants_request = true;
        self
    }

    pub fn named(&self) -> impl Iterator<Item = &str> {
        self.named.iter().map(String::as_str)
    }

    /// Whether parameter extraction is worth doing at all. Handlers that
    /// declare nothing and accept no extras are called without parsing the
    /// request.
    fn needs_params(&self) -> bool {
        self.accepts_extra || !self.named.is_empty()
    }

    /// Per-request binding: extract, filter, validate.
    pub(crate) async fn bind(
        &self,
        req: RequestParts,
        path_params: &PathParams,
    ) -> Result<HandlerArgs, ApiError> {
        let mut params = if self.needs_params() {
            match gather(&req).await? {
                Some(map) => map,
                // No body/query values: path parameters are the source.
                None => path_params
                    .iter()
                    .map(|(k, v)| (k.clone(), Json::String(v.clone())))
                    .collect(),
            }
        } else {
            BTreeMap::new()
        };

        if !self.accepts_extra && !self.named.is_empty() {
            params.retain(|name, _| self.named.contains(name));
        }

        // Path-matched parameters always win over same-named body/query ones.
        for (name, value) in path_params {
            if params.contains_key(name) {
                logger::log_param_collision(name);
            }
            params.insert(name.clone(), Json::String(value.clone()));
        }

        for name in &self.required {
            if !params.contains_key(name) {
                return Err(ApiError::missing_param(name));
            }
        }

        let request = self.wants_request.then_some(req);
        Ok(HandlerArgs { params, request })
    }
}

/// Extract raw parameters from the request per its verb.
///
/// Body-bearing verbs require a content type and parse the body; query-
/// bearing verbs parse the query string. `None` means the request produced
/// no parameter source at all (as opposed to an empty one).
async fn gather(req: &RequestParts) -> Result<Option<BTreeMap<String, Json>>, ApiError> {
    if matches!(req.method, Method::POST | Method::PUT | Method::PATCH) {
        let content_type = req
            .content_type
            .as_deref()
            .ok_or_else(|| ApiError::bad_request("Missing Content-Type."))?;
        let ct = content_type.to_ascii_lowercase();
        if ct.starts_with("application/json") || ct.starts_with("application/csp-report") {
            let body: Json = serde_json::from_slice(&req.body)
                .map_err(|_| ApiError::bad_request("Invalid JSON body."))?;
            let object = body
                .as_object()
                .ok_or_else(|| ApiError::bad_request("JSON body must be object."))?;
            let map = object
                .iter()
                .map(|(k, v)| (normalize_key(k), v.clone()))
                .collect();
            return Ok(Some(map));
        }
        if ct.starts_with("application/x-www-form-urlencoded") {
            return Ok(Some(parse_form(&req.body)));
        }
        if ct.starts_with("multipart/form-data") {
            return Ok(Some(parse_multipart(content_type, req.body.clone()).await?));
        }
        return Err(ApiError::bad_request(format!(
            "Unsupported Content-Type: {content_type}"
        )));
    }

    match req.query.as_deref() {
        Some(query) if !query.is_empty() => Ok(Some(parse_query(query))),
        _ => Ok(None),
    }
}

/// Parse a multipart form into the same flat map as urlencoded bodies:
/// every part's payload is adopted as text under its part name, the first
/// value wins for repeated names, and keys are normalized like form keys.
async fn parse_multipart(
    content_type: &str,
    body: Bytes,
) -> Result<BTreeMap<String, Json>, ApiError> {
    let boundary = multer::parse_boundary(content_type)
        .map_err(|_| ApiError::bad_request("Invalid multipart boundary."))?;
    let stream = futures::stream::once(async move { Ok::<_, Infallible>(body) });
    let mut multipart = multer::Multipart::new(stream, boundary);

    let mut out = BTreeMap::new();
    loop {
        let field = multipart
            .next_field()
            .await
            .map_err(|_| ApiError::bad_request("Invalid multipart body."))?;
        let Some(field) = field else {
            return Ok(out);
        };
        let Some(name) = field.name().map(normalize_key) else {
            continue;
        };
        let value = field
            .text()
            .await
            .map_err(|_| ApiError::bad_request("Invalid multipart body."))?;
        out.entry(name).or_insert(Json::String(value));
    }
}

/// What a handler is invoked with: the filtered parameter map, plus the raw
/// request when the contract asked for it.
#[derive(Debug, Clone)]
pub struct HandlerArgs {
    pub params: BTreeMap<String, Json>,
    pub request: Option<RequestParts>,
}

impl HandlerArgs {
    pub fn get(&self, name: &str) -> Option<&Json> {
        self.params.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.params.get(name).and_then(Json::as_str)
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        match self.params.get(name)? {
            Json::Number(n) => n.as_i64(),
            Json::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// A declared-required string parameter. Absence is a programming error
    /// (the binder already checked it), so it maps to `request:missing_params`;
    /// a non-string value maps to `value:invalid`.
    pub fn required_str(&self, name: &str) -> Result<&str, ApiError> {
        match self.params.get(name) {
            None => Err(ApiError::missing_param(name)),
            Some(Json::String(s)) => Ok(s),
            Some(_) => Err(ApiError::invalid_value(name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn no_path() -> PathParams {
        PathParams::new()
    }

    #[tokio::test]
    async fn undeclared_params_are_dropped() {
        let spec = ParamSpec::new().required("param");
        let args = spec
            .bind(RequestParts::get("/t?param=x&extra=y"), &no_path())
            .await
            .expect("bind");
        assert_eq!(args.get_str("param"), Some("x"));
        assert_eq!(args.get("extra"), None);
    }

    #[tokio::test]
    async fn accept_extra_passes_everything_through() {
        let spec = ParamSpec::new().required("param").accept_extra();
        let args = spec
            .bind(RequestParts::get("/t?param=x&extra=y"), &no_path())
            .await
            .expect("bind");
        assert_eq!(args.get_str("extra"), Some("y"));
    }

    #[tokio::test]
    async fn missing_required_param_fails() {
        let spec = ParamSpec::new().required("param");
        let err = spec
            .bind(RequestParts::get("/t"), &no_path())
            .await
            .unwrap_err();
        assert_eq!(err.code, "request:missing_params");
        assert_eq!(err.msg, "param");
    }

    #[tokio::test]
    async fn path_params_override_query_params() {
        let spec = ParamSpec::new().required("id");
        let mut path = PathParams::new();
        path.insert("id".to_string(), "7".to_string());
        let args = spec
            .bind(RequestParts::get("/t?id=1"), &path)
            .await
            .expect("bind");
        assert_eq!(args.get_str("id"), Some("7"));
    }

    #[tokio::test]
    async fn path_params_are_source_when_no_query() {
        let spec = ParamSpec::new().required("id");
        let mut path = PathParams::new();
        path.insert("id".to_string(), "9".to_string());
        let args = spec
            .bind(RequestParts::get("/t"), &path)
            .await
            .expect("bind");
        assert_eq!(args.get_str("id"), Some("9"));
    }

    #[tokio::test]
    async fn json_body_binds_by_name() {
        let spec = ParamSpec::new().required("data");
        let req = RequestParts::post_json("/t", &json!({"data": "Post Data", "n": 3}));
        let args = spec.bind(req, &no_path()).await.expect("bind");
        assert_eq!(args.get_str("data"), Some("Post Data"));
        // undeclared key dropped
        assert_eq!(args.get("n"), None);
    }

    #[tokio::test]
    async fn json_body_hyphen_keys_normalized() {
        let spec = ParamSpec::new().required("csrf_token");
        let req = RequestParts::post_json("/t", &json!({"csrf-token": "abc"}));
        let args = spec.bind(req, &no_path()).await.expect("bind");
        assert_eq!(args.get_str("csrf_token"), Some("abc"));
    }

    #[tokio::test]
    async fn post_without_content_type_is_bad_request() {
        let spec = ParamSpec::new().required("data");
        let mut req = RequestParts::post_json("/t", &json!({"data": 1}));
        req.content_type = None;
        let err = spec.bind(req, &no_path()).await.unwrap_err();
        assert_eq!(err.code, "request:bad_request");
    }

    #[tokio::test]
    async fn post_with_unsupported_content_type_is_bad_request() {
        let spec = ParamSpec::new().required("data");
        let mut req = RequestParts::post_json("/t", &json!({"data": 1}));
        req.content_type = Some("text/plain".to_string());
        let err = spec.bind(req, &no_path()).await.unwrap_err();
        assert_eq!(err.code, "request:bad_request");
        assert!(err.msg.contains("text/plain"));
    }

    #[tokio::test]
    async fn post_json_array_is_bad_request() {
        let spec = ParamSpec::new().required("data");
        let req = RequestParts::post_json("/t", &json!([1, 2, 3]));
        let err = spec.bind(req, &no_path()).await.unwrap_err();
        assert_eq!(err.code, "request:bad_request");
        assert_eq!(err.msg, "JSON body must be object.");
    }

    #[tokio::test]
    async fn form_body_binds_by_name() {
        let spec = ParamSpec::new().required("data");
        let req = RequestParts::post_form("/t", &[("data", "Form Data")]);
        let args = spec.bind(req, &no_path()).await.expect("bind");
        assert_eq!(args.get_str("data"), Some("Form Data"));
    }

    #[tokio::test]
    async fn multipart_body_binds_by_name() {
        let spec = ParamSpec::new().required("data").optional("csrf_token");
        let req = RequestParts::post_multipart(
            "/t",
            &[("data", "Multipart Data"), ("csrf-token", "abc")],
        );
        let args = spec.bind(req, &no_path()).await.expect("bind");
        assert_eq!(args.get_str("data"), Some("Multipart Data"));
        assert_eq!(args.get_str("csrf_token"), Some("abc"));
    }

    #[tokio::test]
    async fn malformed_multipart_is_bad_request() {
        let spec = ParamSpec::new().required("data");
        let mut req = RequestParts::post_multipart("/t", &[("data", "x")]);
        req.content_type = Some("multipart/form-data".to_string());
        let err = spec.bind(req, &no_path()).await.unwrap_err();
        assert_eq!(err.code, "request:bad_request");
    }

    #[tokio::test]
    async fn request_injection() {
        let spec = ParamSpec::new().with_request();
        let args = spec
            .bind(RequestParts::get("/t?a=1"), &no_path())
            .await
            .expect("bind");
        let req = args.request.expect("request injected");
        assert_eq!(req.path, "/t");
    }

    #[tokio::test]
    async fn bare_spec_skips_parsing() {
        // A malformed body is never touched when the handler declares
        // nothing: gathering is skipped entirely.
        let spec = ParamSpec::new();
        let mut req = RequestParts::post_json("/t", &json!({}));
        req.body = hyper::body::Bytes::from_static(b"not json");
        let args = spec.bind(req, &no_path()).await.expect("bind");
        assert!(args.params.is_empty());
        assert!(args.request.is_none());
    }

    #[tokio::test]
    async fn get_i64_coerces_strings() {
        let spec = ParamSpec::new().optional("n").optional("m");
        let req = RequestParts::post_json("/t", &json!({"n": 5, "m": "6"}));
        let args = spec.bind(req, &no_path()).await.expect("bind");
        assert_eq!(args.get_i64("n"), Some(5));
        assert_eq!(args.get_i64("m"), Some(6));
    }
}
