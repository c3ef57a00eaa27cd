//! Admin HTTP surface
//!
//! A small read-only API over the global configuration:
//!
//! - `GET /context` answers `{"context": <current context name or null>}`
//! - `GET /environment/initialized` answers `{"initialized": <bool>}`, true
//!   when the current context file loads
//!
//! The configuration is re-read on every request, so `locally config
//! set-context` is visible without restarting the server.

use crate::infrastructure::config::GlobalConfig;
use http::{Method, StatusCode, header};
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, Server};
use serde_json::{Value, json};
use std::convert::Infallible;
use std::future::Future;
use std::net::{SocketAddr, TcpListener};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Port used when none is given
pub const DEFAULT_PORT: u16 = 5050;

/// Errors raised by the API server
#[derive(Error, Debug)]
pub enum ApiError {
    /// The listener could not be bound or configured
    #[error("Cannot listen on {addr}: {source}")]
    Bind {
        /// Requested address
        addr: SocketAddr,
        /// Underlying error
        source: std::io::Error,
    },

    /// The async runtime could not be started
    #[error("Cannot start runtime: {0}")]
    Runtime(std::io::Error),

    /// The server failed while running
    #[error("Server error: {0}")]
    Serve(#[from] hyper::Error),
}

/// Answers one request against the configuration in `home`
#[must_use]
pub fn route(method: &Method, path: &str, home: &Path) -> (StatusCode, Value) {
    if *method != Method::GET {
        return (
            StatusCode::METHOD_NOT_ALLOWED,
            json!({ "error": format!("{method} not allowed") }),
        );
    }

    let path = path.trim_end_matches('/');
    match path {
        "/context" | "/environment/initialized" => {}
        _ => return (StatusCode::NOT_FOUND, json!({ "error": "not found" })),
    }

    let config = match GlobalConfig::load(home) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(error = %e, "Cannot load configuration");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": e.to_string() }),
            );
        }
    };

    if path == "/context" {
        (StatusCode::OK, json!({ "context": config.current_context }))
    } else {
        let initialized = config.load_current().is_ok();
        (StatusCode::OK, json!({ "initialized": initialized }))
    }
}

async fn handle(req: Request<Body>, home: Arc<PathBuf>) -> Result<Response<Body>, Infallible> {
    let (status, body) = route(req.method(), req.uri().path(), &home);
    tracing::debug!(method = %req.method(), path = %req.uri().path(), status = status.as_u16(), "API request");
    let response = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap_or_else(|_| Response::new(Body::empty()));
    Ok(response)
}

/// Serves the API on `listener` until `shutdown` completes
///
/// # Errors
///
/// Fails when the listener cannot be used or the server stops with an error.
pub async fn serve<F>(listener: TcpListener, home: PathBuf, shutdown: F) -> Result<(), ApiError>
where
    F: Future<Output = ()>,
{
    let addr = listener
        .local_addr()
        .map_err(|source| ApiError::Bind {
            addr: SocketAddr::from(([0, 0, 0, 0], 0)),
            source,
        })?;
    listener
        .set_nonblocking(true)
        .map_err(|source| ApiError::Bind { addr, source })?;

    let home = Arc::new(home);
    let make_service = make_service_fn(move |_conn| {
        let home = Arc::clone(&home);
        async move {
            Ok::<_, Infallible>(service_fn(move |req| handle(req, Arc::clone(&home))))
        }
    });

    tracing::info!(%addr, "API listening");
    Server::from_tcp(listener)?
        .serve(make_service)
        .with_graceful_shutdown(shutdown)
        .await?;
    tracing::info!(%addr, "API stopped");
    Ok(())
}

/// Blocks serving the API on `127.0.0.1:port` until Ctrl-C
///
/// # Errors
///
/// Fails when the port cannot be bound or the server fails.
pub fn run(home: PathBuf, port: u16) -> Result<(), ApiError> {
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = TcpListener::bind(addr).map_err(|source| ApiError::Bind { addr, source })?;
    let runtime = tokio::runtime::Runtime::new().map_err(ApiError::Runtime)?;
    runtime.block_on(serve(listener, home, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Cannot listen for Ctrl-C");
        }
    }))
}
