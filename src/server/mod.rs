//! Web form front-end.
//!
//! One page with the form, a JSON endpoint that runs a generation, and a
//! route that serves finished artifacts back to the audio player.

mod form;
mod page;
mod routes;

pub use form::{FormData, FormError, REFERENCE_FIELD};
pub use page::INDEX_HTML;
pub use routes::{GenerateResponse, HealthStatus, ReloadRequest};

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use parking_lot::Mutex;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::backend::ModelLoader;
use crate::engine::GenerationHandler;
use crate::output::OutputStore;

/// Largest accepted form submission, reference clip included.
pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Shared application state
pub struct AppState<L: ModelLoader> {
    /// One handler serves every request; generations run one at a time.
    pub handler: Mutex<GenerationHandler<L>>,
    /// Read-only view of the output directory
    pub outputs: OutputStore,
}

impl<L: ModelLoader> AppState<L> {
    pub fn new(handler: GenerationHandler<L>) -> Self {
        let outputs = handler.outputs().clone();
        Self {
            handler: Mutex::new(handler),
            outputs,
        }
    }
}

/// Build the router
pub fn router<L: ModelLoader + 'static>(state: Arc<AppState<L>>) -> Router {
    Router::new()
        .route("/", get(routes::index))
        .route("/health", get(routes::health::<L>))
        .route("/api/generate", post(routes::generate::<L>))
        .route("/api/outputs", get(routes::list_outputs::<L>))
        .route("/api/model/reload", post(routes::reload_model::<L>))
        .route("/outputs/:name", get(routes::serve_output::<L>))
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
}

/// Bind `addr` and serve until the listener fails.
pub async fn serve(app: Router, addr: SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "web form listening");
    axum::serve(listener, app).await
}
