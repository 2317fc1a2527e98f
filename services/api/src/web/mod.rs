pub mod protocol;
pub mod rest;
pub mod state;
pub mod ws_handler;

// Re-export the handlers so the binary can build the router from one place.
pub use rest::{
    create_project_handler, export_project_handler, generate_outline_handler,
    list_projects_handler, remove_document_handler, select_project_handler, set_step_handler,
    update_document_handler, update_title_handler, upload_documents_handler, workspace_handler,
};
pub use ws_handler::ws_handler;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};
use state::AppState;
use std::sync::Arc;

/// Smallest request body accepted, so a tiny per-file limit still leaves room for multipart framing.
const MIN_BODY_LIMIT: usize = 10 * 1024 * 1024;

/// Builds the API router. The body limit allows a few maximum-size files per
/// request; oversized individual files are still accepted and marked as failed.
pub fn router(app_state: Arc<AppState>) -> Router {
    let body_limit = usize::try_from(app_state.config.max_upload_bytes)
        .unwrap_or(usize::MAX)
        .saturating_mul(4)
        .max(MIN_BODY_LIMIT);

    Router::new()
        .route("/projects", get(list_projects_handler).post(create_project_handler))
        .route("/workspace", get(workspace_handler))
        .route("/workspace/active", put(select_project_handler))
        .route("/workspace/step", put(set_step_handler))
        .route("/workspace/title", put(update_title_handler))
        .route("/workspace/documents", post(upload_documents_handler))
        .route(
            "/workspace/documents/{id}",
            put(update_document_handler).delete(remove_document_handler),
        )
        .route("/workspace/generate", post(generate_outline_handler))
        .route("/workspace/export", post(export_project_handler))
        .route("/ws", get(ws_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(app_state)
}
