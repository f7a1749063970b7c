//! Route registry and dispatcher.
//!
//! Routes are registered under an exact `(method, path)` key together with
//! their [`ParamSpec`]. Dispatch looks up the route, binds parameters,
//! drives the handler, and serializes whatever comes back. Handler failures
//! never escape: structured errors become 400 responses, everything else
//! (including panics) becomes an opaque 500.

use super::binder::{HandlerArgs, ParamSpec};
use super::request::{PathParams, RequestParts};
use super::response::{
    api_error_response, internal_error_response, not_found_response, render, Reply,
};
use crate::api::HandlerError;
use crate::logger;
use futures::FutureExt;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Method, Response};
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;

/// What a handler future resolves to.
pub type HandlerResult = Result<Reply, HandlerError>;

type BoxedHandler =
    Arc<dyn Fn(HandlerArgs) -> Pin<Box<dyn Future<Output = HandlerResult> + Send>> + Send + Sync>;

struct Route {
    name: String,
    spec: ParamSpec,
    handler: BoxedHandler,
}

/// Exact-match route table, immutable once the server starts.
#[derive(Default)]
pub struct Router {
    routes: HashMap<(Method, String), Arc<Route>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler. Re-registering a `(method, path)` pair replaces
    /// the earlier route with a warning.
    pub fn register<F, Fut>(&mut self, method: Method, path: &str, name: &str, spec: ParamSpec, handler: F)
    where
        F: Fn(HandlerArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let route = Arc::new(Route {
            name: name.to_string(),
            spec,
            handler: Arc::new(move |args| Box::pin(handler(args))),
        });
        logger::log_route_registered(&method, path, name);
        if let Some(old) = self.routes.insert((method.clone(), path.to_string()), route) {
            logger::log_route_replaced(&method, path, &old.name);
        }
    }

    pub fn get<F, Fut>(&mut self, path: &str, name: &str, spec: ParamSpec, handler: F)
    where
        F: Fn(HandlerArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.register(Method::GET, path, name, spec, handler);
    }

    pub fn post<F, Fut>(&mut self, path: &str, name: &str, spec: ParamSpec, handler: F)
    where
        F: Fn(HandlerArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.register(Method::POST, path, name, spec, handler);
    }

    /// Drive one request through lookup, binding, the handler, and
    /// serialization.
    pub async fn dispatch(
        &self,
        req: RequestParts,
        path_params: PathParams,
    ) -> Response<Full<Bytes>> {
        logger::log_request(&req.method, &req.path);

        let key = (req.method.clone(), req.path.clone());
        let Some(route) = self.routes.get(&key) else {
            return not_found_response(&req.path);
        };

        let args = match route.spec.bind(req, &path_params).await {
            Ok(args) => args,
            Err(err) => return api_error_response(&err),
        };

        let fut = (route.handler)(args);
        match AssertUnwindSafe(fut).catch_unwind().await {
            Ok(Ok(reply)) => render(reply),
            Ok(Err(HandlerError::Api(err))) => api_error_response(&err),
            Ok(Err(HandlerError::Internal(detail))) => {
                logger::log_unhandled_error(&route.name, &detail);
                internal_error_response()
            }
            Err(panic) => {
                let detail = panic
                    .downcast_ref::<&str>()
                    .map(ToString::to_string)
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "handler panicked".to_string());
                logger::log_unhandled_error(&route.name, &detail);
                internal_error_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use http_body_util::BodyExt;
    use hyper::StatusCode;
    use serde_json::Value as Json;

    async fn body_json(response: Response<Full<Bytes>>) -> Json {
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("collect body")
            .to_bytes();
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let router = Router::new();
        let response = router
            .dispatch(RequestParts::get("/nowhere"), PathParams::new())
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["error"], "value:not_found");
        assert_eq!(body["msg"], "/nowhere");
    }

    #[tokio::test]
    async fn replacement_keeps_the_later_handler() {
        let mut router = Router::new();
        router.get("/x", "first", ParamSpec::new(), |_| async {
            Ok(Reply::text("first"))
        });
        router.get("/x", "second", ParamSpec::new(), |_| async {
            Ok(Reply::text("second"))
        });
        let response = router
            .dispatch(RequestParts::get("/x"), PathParams::new())
            .await;
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("collect body")
            .to_bytes();
        assert_eq!(&bytes[..], b"second");
    }

    #[tokio::test]
    async fn api_error_maps_to_400() {
        let mut router = Router::new();
        router.get("/fail", "fail", ParamSpec::new(), |_| async {
            Err(ApiError::new("test:test_error", "Some Error").into())
        });
        let response = router
            .dispatch(RequestParts::get("/fail"), PathParams::new())
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "test:test_error");
        assert_eq!(body["msg"], "Some Error");
    }

    #[tokio::test]
    async fn internal_error_is_opaque_500() {
        let mut router = Router::new();
        router.get("/boom", "boom", ParamSpec::new(), |_| async {
            Err(HandlerError::Internal("db went away".to_string()))
        });
        let response = router
            .dispatch(RequestParts::get("/boom"), PathParams::new())
            .await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["error"], "server:server_internal_error");
        assert!(body.get("msg").is_none());
    }

    #[tokio::test]
    async fn panic_is_caught_as_500() {
        let mut router = Router::new();
        router.get("/panic", "panic", ParamSpec::new(), |_| async {
            panic!("oops");
        });
        let response = router
            .dispatch(RequestParts::get("/panic"), PathParams::new())
            .await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn binding_failure_short_circuits() {
        let mut router = Router::new();
        router.get("/need", "need", ParamSpec::new().required("param"), |_| async {
            Ok(Reply::text("unreachable"))
        });
        let response = router
            .dispatch(RequestParts::get("/need"), PathParams::new())
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "request:missing_params");
    }
}
