//! HTTP front end: listener setup and the accept loop.
//!
//! The server owns nothing but plumbing. Each accepted connection is served
//! over HTTP/1.1; requests are reduced to [`RequestParts`] and handed to the
//! shared [`Router`], which produces the response.

use crate::logger;
use crate::web::{PathParams, RequestParts, Router};
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::header::CONTENT_TYPE;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use socket2::{Domain, Protocol, Socket, Type};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Create a `TcpListener` with `SO_REUSEPORT` and `SO_REUSEADDR` enabled,
/// so a replacement process can bind before the old one exits.
pub fn create_reusable_listener(addr: SocketAddr) -> std::io::Result<TcpListener> {
    let domain = if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };

    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_port(true)?;
    socket.set_reuse_address(true)?;

    // Non-blocking mode for async compatibility
    socket.set_nonblocking(true)?;

    socket.bind(&addr.into())?;
    socket.listen(128)?;

    let std_listener: std::net::TcpListener = socket.into();
    TcpListener::from_std(std_listener)
}

/// Accept connections until `ctrl-c`, serving each over HTTP/1.1.
pub async fn serve(listener: TcpListener, router: Arc<Router>) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    logger::log_server_start(&addr);

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, _peer_addr)) => {
                        let router = Arc::clone(&router);
                        tokio::spawn(async move {
                            let io = TokioIo::new(stream);
                            let service = service_fn(move |req| {
                                let router = Arc::clone(&router);
                                async move { handle(req, &router).await }
                            });
                            if let Err(e) = http1::Builder::new()
                                .serve_connection(io, service)
                                .await
                            {
                                logger::log_debug(&format!("Connection error: {e}"));
                            }
                        });
                    }
                    Err(e) => {
                        logger::log_error(&format!("Failed to accept connection: {e}"));
                    }
                }
            }

            _ = tokio::signal::ctrl_c() => {
                logger::log_server_stop();
                return Ok(());
            }
        }
    }
}

/// Reduce a hyper request to [`RequestParts`] and dispatch it.
async fn handle(
    req: Request<Incoming>,
    router: &Router,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let (head, body) = req.into_parts();

    let content_type = head
        .headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);

    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            logger::log_warning(&format!("Failed to read request body: {e}"));
            Bytes::new()
        }
    };

    let parts = RequestParts {
        method: head.method,
        path: head.uri.path().to_string(),
        query: head.uri.query().map(ToString::to_string),
        content_type,
        body,
    };

    // Exact-path routes only; no template matches to supply.
    Ok(router.dispatch(parts, PathParams::new()).await)
}
