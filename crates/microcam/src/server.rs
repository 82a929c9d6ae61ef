//! HTTP surface of the frame ingestion service.
//!
//! | Method | Path          | Handler                 |
//! |--------|---------------|-------------------------|
//! | POST   | `/upload`     | store a frame           |
//! | GET    | `/latest.jpg` | bytes of the newest one |
//! | GET    | `/metrics`    | upload counter          |
//! | GET    | `/healthz`    | liveness                |

use std::sync::Arc;

use axum::extract::multipart::MultipartRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::ingest::FrameIngestor;
use crate::metrics::{self, UploadCounter};
use crate::storage::FrameStore;

/// Shared service context handed to every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    store: Arc<FrameStore>,
    counter: Arc<UploadCounter>,
    ingestor: Arc<FrameIngestor>,
}

impl AppState {
    /// Build the context around a store, using the system clock.
    #[must_use]
    pub fn new(store: FrameStore) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    /// Build the context with a specific clock.
    #[must_use]
    pub fn with_clock(store: FrameStore, clock: Arc<dyn Clock>) -> Self {
        let store = Arc::new(store);
        let counter = Arc::new(UploadCounter::new());
        let ingestor = Arc::new(FrameIngestor::new(
            Arc::clone(&store),
            Arc::clone(&counter),
            clock,
        ));
        Self {
            store,
            counter,
            ingestor,
        }
    }

    /// The frame store.
    #[must_use]
    pub fn store(&self) -> &FrameStore {
        &self.store
    }

    /// The upload counter.
    #[must_use]
    pub fn counter(&self) -> &UploadCounter {
        &self.counter
    }
}

/// Body of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    /// Always `true`.
    pub ok: bool,
    /// Name of the stored frame.
    pub file: String,
}

/// Body of the liveness probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `true`.
    pub ok: bool,
}

/// Build the router. `max_upload_bytes` caps request bodies.
pub fn build_router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/upload", post(upload_handler))
        .route("/latest.jpg", get(latest_handler))
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz_handler))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

/// Run the service until SIGINT or SIGTERM.
///
/// The storage directory is created before the listener is bound, so no
/// request is accepted against a missing directory.
///
/// # Errors
///
/// Returns an error if the directory cannot be created, the address cannot
/// be bound, or the server fails.
pub async fn serve(config: &Config) -> Result<()> {
    let store = FrameStore::open(config.upload_dir())?;
    let app = build_router(AppState::new(store), config.server.max_upload_bytes);

    let addr = config.bind_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| Error::server(format!("bind {addr} failed: {e}")))?;
    info!("microcam listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown_signal())
        .await
        .map_err(|e| Error::server(format!("server failed: {e}")))?;
    info!("microcam stopped");
    Ok(())
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => {}
                    _ = sigint.recv() => {}
                }
            }
            _ => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    info!("Shutdown signal received");
}

async fn upload_handler(
    State(state): State<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>> {
    let multipart = multipart.map_err(|rejection| {
        debug!("Rejecting upload: {rejection}");
        Error::InvalidRequest
    })?;
    let (payload, meta) = read_upload_form(multipart).await?;
    let payload = payload.ok_or(Error::InvalidRequest)?;

    let ingestor = Arc::clone(&state.ingestor);
    let stored = tokio::task::spawn_blocking(move || ingestor.ingest(payload, meta.as_deref()))
        .await
        .map_err(|e| Error::internal(format!("upload task failed: {e}")))??;

    Ok(Json(UploadResponse {
        ok: true,
        file: stored.file_name(),
    }))
}

/// Pull the `file` and `meta` fields out of the form. Other fields and
/// repeats are ignored.
async fn read_upload_form(
    mut multipart: Multipart,
) -> Result<(Option<Vec<u8>>, Option<String>)> {
    let mut payload = None;
    let mut meta = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return Err(multipart_error(&e)),
        };
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("file") if payload.is_none() => {
                let bytes = field.bytes().await.map_err(|e| multipart_error(&e))?;
                payload = Some(bytes.to_vec());
            }
            Some("meta") if meta.is_none() => {
                // Undecodable metadata is treated like absent metadata.
                meta = field.text().await.ok();
            }
            _ => {}
        }
    }

    Ok((payload, meta))
}

fn multipart_error(err: &axum::extract::multipart::MultipartError) -> Error {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        Error::PayloadTooLarge
    } else {
        debug!("Malformed multipart body: {err}");
        Error::InvalidRequest
    }
}

async fn latest_handler(State(state): State<AppState>) -> Result<Response> {
    let store = Arc::clone(&state.store);
    let bytes = tokio::task::spawn_blocking(move || store.read_latest())
        .await
        .map_err(|e| Error::internal(format!("read task failed: {e}")))??;

    Ok(([(header::CONTENT_TYPE, "image/jpeg")], bytes).into_response())
}

async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, metrics::CONTENT_TYPE)],
        state.counter.render(),
    )
}

async fn healthz_handler() -> Json<HealthResponse> {
    Json(HealthResponse { ok: true })
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        if !self.is_client_error() {
            error!("Request failed: {self}");
            return (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response();
        }

        debug!("Rejected request: {self}");
        if self.is_not_found() {
            return (StatusCode::NOT_FOUND, "not found").into_response();
        }
        let status = match self {
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::BAD_REQUEST,
        };
        (status, self.to_string()).into_response()
    }
}
