//! Legacy, non-private file access: the same content the PIR service holds,
//! served over HTTP by filename. Opt-in via `--http`, since it tells the
//! mirror (and anyone watching its network traffic) exactly which file a
//! client wanted — the opposite of upPIR's whole point, which is why this
//! is a separate, clearly optional code path rather than the default.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

use crate::MirrorState;

/// Builds the router: a single catch-all route keyed on the manifest
/// filename, matching `uppir_mirror.py`'s `do_GET` (strip the leading `/`,
/// look the rest up in `fileinfolist`).
pub fn http_router(state: Arc<MirrorState>) -> Router {
    Router::new()
        .route("/*filename", get(serve_file))
        .with_state(state)
}

async fn serve_file(State(state): State<Arc<MirrorState>>, Path(filename): Path<String>) -> impl IntoResponse {
    let Some(file) = state.manifest.files.iter().find(|f| f.filename == filename) else {
        return (StatusCode::NOT_FOUND, Vec::new());
    };

    match state.datastore.get_data(file.offset, file.length) {
        Ok(bytes) => (StatusCode::OK, bytes),
        Err(_) => (StatusCode::NOT_FOUND, Vec::new()),
    }
}

pub async fn serve_http(listener: TcpListener, router: Router) {
    info!("legacy HTTP file access enabled");
    if let Err(err) = axum::serve(listener, router).await {
        tracing::error!(%err, "HTTP server exited");
    }
}
