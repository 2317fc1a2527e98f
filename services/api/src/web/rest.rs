//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification. Every handler is a thin call into
//! one `ProjectStore` operation.

use crate::web::state::AppState;
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use textbook_core::{
    domain::now_millis, Document, ExportFormat, Step, StoreError, UploadedFile,
};
use tracing::error;
use utoipa::{OpenApi, ToSchema};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        list_projects_handler,
        create_project_handler,
        workspace_handler,
        select_project_handler,
        set_step_handler,
        update_title_handler,
        upload_documents_handler,
        update_document_handler,
        remove_document_handler,
        generate_outline_handler,
        export_project_handler,
    ),
    components(
        schemas(CreateProjectRequest, SelectProjectRequest, SetStepRequest, UpdateTitleRequest, ExportRequest, StepResponse)
    ),
    tags(
        (name = "Textbook Studio API", description = "Build textbooks from uploaded PDFs.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Payload Structs
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct CreateProjectRequest {
    pub title: String,
}

#[derive(Deserialize, ToSchema)]
pub struct SelectProjectRequest {
    /// `null` clears the active project.
    pub project_id: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct SetStepRequest {
    /// One of `upload`, `extract`, `analyze`, `generate`, `preview`, `export`.
    pub step: String,
}

#[derive(Serialize, ToSchema)]
pub struct StepResponse {
    pub step: String,
    pub label: String,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateTitleRequest {
    pub title: String,
}

#[derive(Deserialize, ToSchema)]
pub struct ExportRequest {
    /// One of `pdf`, `docx`, `html`.
    pub format: String,
}

type HandlerError = (StatusCode, String);

fn no_active_project() -> HandlerError {
    (StatusCode::CONFLICT, "No active project".to_string())
}

/// Maps store failures onto HTTP statuses.
pub fn store_error(e: StoreError) -> HandlerError {
    let status = match &e {
        StoreError::InvalidTitle | StoreError::UnsupportedFileType => StatusCode::BAD_REQUEST,
        StoreError::ProjectBusy(_) => StatusCode::CONFLICT,
        StoreError::Generation(_) | StoreError::Outline(_) | StoreError::Export(_) => {
            StatusCode::BAD_GATEWAY
        }
        StoreError::Persistence(_) => {
            error!("Project store persistence failure: {:?}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, e.to_string())
}

//=========================================================================================
// Project Handlers
//=========================================================================================

/// List every stored project.
#[utoipa::path(
    get,
    path = "/projects",
    responses((status = 200, description = "All projects, in creation order"))
)]
pub async fn list_projects_handler(State(app_state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(app_state.store.projects().await)
}

/// Create a project and make it the active one.
#[utoipa::path(
    post,
    path = "/projects",
    request_body = CreateProjectRequest,
    responses(
        (status = 201, description = "Project created and selected"),
        (status = 400, description = "Empty title"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn create_project_handler(
    State(app_state): State<Arc<AppState>>,
    Json(body): Json<CreateProjectRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let project = app_state.store.create_project(&body.title).await.map_err(store_error)?;
    Ok((StatusCode::CREATED, Json(project)))
}

//=========================================================================================
// Workspace Handlers
//=========================================================================================

/// Projects, active project, current step and busy flag in one response.
#[utoipa::path(
    get,
    path = "/workspace",
    responses((status = 200, description = "Current store snapshot"))
)]
pub async fn workspace_handler(State(app_state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(app_state.store.snapshot().await)
}

/// Select the active project, or clear the selection.
#[utoipa::path(
    put,
    path = "/workspace/active",
    request_body = SelectProjectRequest,
    responses((status = 200, description = "The selected project, or null when cleared or unknown"))
)]
pub async fn select_project_handler(
    State(app_state): State<Arc<AppState>>,
    Json(body): Json<SelectProjectRequest>,
) -> impl IntoResponse {
    Json(app_state.store.select_project(body.project_id.as_deref()).await)
}

/// Move to a workflow step. Any step may be chosen at any time.
#[utoipa::path(
    put,
    path = "/workspace/step",
    request_body = SetStepRequest,
    responses(
        (status = 200, description = "Step changed", body = StepResponse),
        (status = 400, description = "Unknown step name")
    )
)]
pub async fn set_step_handler(
    State(app_state): State<Arc<AppState>>,
    Json(body): Json<SetStepRequest>,
) -> Result<Json<StepResponse>, HandlerError> {
    let step = body
        .step
        .parse::<Step>()
        .map_err(|e| (StatusCode::BAD_REQUEST, e))?;
    app_state.store.set_step(step).await;
    Ok(Json(StepResponse { step: step.to_string(), label: step.label().to_string() }))
}

/// Rename the active project.
#[utoipa::path(
    put,
    path = "/workspace/title",
    request_body = UpdateTitleRequest,
    responses(
        (status = 200, description = "Project renamed"),
        (status = 400, description = "Empty title"),
        (status = 409, description = "No active project, or the project is busy")
    )
)]
pub async fn update_title_handler(
    State(app_state): State<Arc<AppState>>,
    Json(body): Json<UpdateTitleRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let project = app_state
        .store
        .update_title(&body.title)
        .await
        .map_err(store_error)?
        .ok_or_else(no_active_project)?;
    Ok(Json(project))
}

//=========================================================================================
// Document Handlers
//=========================================================================================

/// Upload one or more PDFs into the active project.
///
/// Accepts a multipart/form-data request; every part with a file name is
/// treated as a file. Non-PDF parts are skipped, and a request without any
/// PDF is rejected.
#[utoipa::path(
    post,
    path = "/workspace/documents",
    request_body(content_type = "multipart/form-data", description = "The PDF files to upload."),
    responses(
        (status = 200, description = "Batch processed; see the report for per-file outcomes"),
        (status = 400, description = "No PDF in the request"),
        (status = 409, description = "No active project, or the project is busy")
    )
)]
pub async fn upload_documents_handler(
    State(app_state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, HandlerError> {
    let mut files = Vec::new();
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        (StatusCode::BAD_REQUEST, format!("Failed to read multipart data: {}", e))
    })? {
        let Some(name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await.map_err(|e| {
            (StatusCode::BAD_REQUEST, format!("Failed to read file bytes: {}", e))
        })?;
        files.push(UploadedFile {
            name,
            content_type,
            last_modified: now_millis(),
            bytes: data.to_vec(),
        });
    }

    if files.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Multipart form must include a file".to_string()));
    }

    let report = app_state
        .store
        .upload_documents(files)
        .await
        .map_err(store_error)?
        .ok_or_else(no_active_project)?;
    Ok(Json(report))
}

/// Replace a document of the active project.
#[utoipa::path(
    put,
    path = "/workspace/documents/{id}",
    params(("id" = String, Path, description = "Document id")),
    request_body(content_type = "application/json", description = "The replacement document."),
    responses(
        (status = 200, description = "Document replaced (unknown ids are ignored)"),
        (status = 400, description = "Body id does not match the path"),
        (status = 409, description = "No active project, or the project is busy")
    )
)]
pub async fn update_document_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(document): Json<Document>,
) -> Result<impl IntoResponse, HandlerError> {
    if document.id != id {
        return Err((StatusCode::BAD_REQUEST, "Document id does not match the path".to_string()));
    }
    let project = app_state
        .store
        .update_document(document)
        .await
        .map_err(store_error)?
        .ok_or_else(no_active_project)?;
    Ok(Json(project))
}

/// Remove a document from the active project.
#[utoipa::path(
    delete,
    path = "/workspace/documents/{id}",
    params(("id" = String, Path, description = "Document id")),
    responses(
        (status = 200, description = "Document removed (unknown ids are ignored)"),
        (status = 409, description = "No active project, or the project is busy")
    )
)]
pub async fn remove_document_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, HandlerError> {
    let project = app_state
        .store
        .remove_document(&id)
        .await
        .map_err(store_error)?
        .ok_or_else(no_active_project)?;
    Ok(Json(project))
}

//=========================================================================================
// Generation and Export Handlers
//=========================================================================================

/// Generate the textbook outline for the active project.
#[utoipa::path(
    post,
    path = "/workspace/generate",
    responses(
        (status = 200, description = "Chapters replaced; the step moved to preview"),
        (status = 409, description = "No active project"),
        (status = 502, description = "The generation service failed; the project is unchanged")
    )
)]
pub async fn generate_outline_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HandlerError> {
    let project = app_state
        .store
        .generate_outline()
        .await
        .map_err(store_error)?
        .ok_or_else(no_active_project)?;
    Ok(Json(project))
}

/// Export the active project.
#[utoipa::path(
    post,
    path = "/workspace/export",
    request_body = ExportRequest,
    responses(
        (status = 200, description = "Export finished"),
        (status = 400, description = "Unsupported format"),
        (status = 409, description = "No active project"),
        (status = 502, description = "The export failed")
    )
)]
pub async fn export_project_handler(
    State(app_state): State<Arc<AppState>>,
    Json(body): Json<ExportRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let format = body
        .format
        .parse::<ExportFormat>()
        .map_err(|e| (StatusCode::BAD_REQUEST, e))?;
    let receipt = app_state
        .store
        .export_project(format)
        .await
        .map_err(store_error)?
        .ok_or_else(no_active_project)?;
    Ok(Json(receipt))
}

#[cfg(test)]
mod tests;
