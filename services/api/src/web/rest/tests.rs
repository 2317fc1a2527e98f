use super::*;
use crate::adapters::{BroadcastNotifier, LopdfExtractionAdapter, SimulatedExportAdapter};
use crate::config::Config;
use async_trait::async_trait;
use axum::body::to_bytes;
use axum::response::Response;
use std::time::Duration;
use textbook_core::{
    persistence::DEFAULT_STORAGE_KEY, GenerationOutput, MemoryKeyValueStore, NoticeLevel,
    OutlineGenerationService, PortError, PortResult, ProjectRepository, ProjectStore, StoreDeps,
};

/// Answers with a fixed outline, or fails when `answer` is `None`.
struct CannedGenerator {
    answer: Option<&'static str>,
}

#[async_trait]
impl OutlineGenerationService for CannedGenerator {
    async fn generate_outline(&self, _corpus: &str) -> PortResult<GenerationOutput> {
        match self.answer {
            Some(raw) => Ok(GenerationOutput::from_response(raw)),
            None => Err(PortError::Transport("connection refused".to_string())),
        }
    }
}

async fn create_test_state(answer: Option<&'static str>) -> Arc<AppState> {
    let config = Config::from_lookup(|_| None).unwrap();
    let notifier = BroadcastNotifier::new();
    let store = ProjectStore::open(StoreDeps {
        repository: ProjectRepository::new(Arc::new(MemoryKeyValueStore::new()), DEFAULT_STORAGE_KEY),
        extractor: Arc::new(LopdfExtractionAdapter::default()),
        generator: Arc::new(CannedGenerator { answer }),
        exporter: Arc::new(SimulatedExportAdapter::new(Duration::ZERO)),
        notifier: Arc::new(notifier.clone()),
        upload_limits: config.upload_limits(),
    })
    .await
    .unwrap();
    Arc::new(AppState { store: Arc::new(store), notifier, config: Arc::new(config) })
}

async fn body_json(response: Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn create(state: &Arc<AppState>, title: &str) -> serde_json::Value {
    let response = create_project_handler(
        State(state.clone()),
        Json(CreateProjectRequest { title: title.to_string() }),
    )
    .await
    .unwrap()
    .into_response();
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await
}

// ============================================================================
// Project and workspace handlers
// ============================================================================

#[tokio::test]
async fn test_create_project_selects_it() {
    let state = create_test_state(None).await;
    let project = create(&state, "My Book").await;
    assert_eq!(project["title"], "My Book");
    assert_eq!(project["documents"], serde_json::json!([]));

    let workspace = body_json(workspace_handler(State(state.clone())).await.into_response()).await;
    assert_eq!(workspace["step"], "upload");
    assert_eq!(workspace["busy"], false);
    assert_eq!(workspace["activeProject"]["id"], project["id"]);

    let listed = body_json(list_projects_handler(State(state)).await.into_response()).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_create_project_with_blank_title_is_bad_request() {
    let state = create_test_state(None).await;
    let err = create_project_handler(
        State(state),
        Json(CreateProjectRequest { title: "  ".to_string() }),
    )
    .await
    .err()
    .unwrap();
    assert_eq!(err.0, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_set_step_accepts_any_known_step() {
    let state = create_test_state(None).await;
    let Json(response) = set_step_handler(
        State(state.clone()),
        Json(SetStepRequest { step: "preview".to_string() }),
    )
    .await
    .unwrap();
    assert_eq!(response.step, "preview");
    assert_eq!(response.label, "Preview");
    assert_eq!(state.store.step().await, Step::Preview);

    let err = set_step_handler(State(state), Json(SetStepRequest { step: "publish".to_string() }))
        .await
        .err()
        .unwrap();
    assert_eq!(err.0, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_select_unknown_project_returns_null() {
    let state = create_test_state(None).await;
    create(&state, "Book").await;
    let response = select_project_handler(
        State(state.clone()),
        Json(SelectProjectRequest { project_id: Some("missing".to_string()) }),
    )
    .await
    .into_response();
    assert_eq!(body_json(response).await, serde_json::Value::Null);
    assert!(state.store.active_project().await.is_none());
}

#[tokio::test]
async fn test_operations_without_active_project_conflict() {
    let state = create_test_state(None).await;
    let err = update_title_handler(State(state.clone()), Json(UpdateTitleRequest { title: "T".to_string() }))
        .await
        .err()
        .unwrap();
    assert_eq!(err.0, StatusCode::CONFLICT);

    let err = remove_document_handler(State(state), Path("doc-1".to_string()))
        .await
        .err()
        .unwrap();
    assert_eq!(err.0, StatusCode::CONFLICT);
}

// ============================================================================
// Generation and export handlers
// ============================================================================

#[tokio::test]
async fn test_generate_outline_moves_to_preview() {
    let state = create_test_state(Some(
        r#"{"chapters":[{"title":"Cells","sections":[{"title":"Membranes","content":"..."}]}]}"#,
    ))
    .await;
    create(&state, "Biology").await;

    let response = generate_outline_handler(State(state.clone())).await.unwrap().into_response();
    assert_eq!(response.status(), StatusCode::OK);
    let project = body_json(response).await;
    assert_eq!(project["chapters"][0]["id"], "chapter-1");
    assert_eq!(project["chapters"][0]["sections"][0]["id"], "section-1-1");
    assert_eq!(state.store.step().await, Step::Preview);
}

#[tokio::test]
async fn test_generation_failure_is_bad_gateway_and_notifies() {
    let state = create_test_state(None).await;
    let mut notices = state.notifier.subscribe();
    create(&state, "Biology").await;

    let err = generate_outline_handler(State(state.clone())).await.err().unwrap();
    assert_eq!(err.0, StatusCode::BAD_GATEWAY);
    assert!(state.store.active_project().await.unwrap().chapters.is_empty());

    let notice = notices.recv().await.unwrap();
    assert_eq!(notice.level, NoticeLevel::Error);
}

#[tokio::test]
async fn test_export_validates_format_and_returns_receipt() {
    let state = create_test_state(None).await;
    create(&state, "Field Guide").await;

    let err = export_project_handler(State(state.clone()), Json(ExportRequest { format: "epub".to_string() }))
        .await
        .err()
        .unwrap();
    assert_eq!(err.0, StatusCode::BAD_REQUEST);

    let response = export_project_handler(State(state), Json(ExportRequest { format: "HTML".to_string() }))
        .await
        .unwrap()
        .into_response();
    let receipt = body_json(response).await;
    assert_eq!(receipt["format"], "html");
    assert_eq!(receipt["file_name"], "field-guide.html");
}

#[tokio::test]
async fn test_update_document_rejects_mismatched_ids() {
    let state = create_test_state(None).await;
    create(&state, "Book").await;
    let document = textbook_core::Document::new_upload("a.pdf", 1, now_millis());
    let err = update_document_handler(State(state), Path("doc-other".to_string()), Json(document))
        .await
        .err()
        .unwrap();
    assert_eq!(err.0, StatusCode::BAD_REQUEST);
}

#[test]
fn test_store_errors_map_to_statuses() {
    assert_eq!(store_error(StoreError::InvalidTitle).0, StatusCode::BAD_REQUEST);
    assert_eq!(store_error(StoreError::UnsupportedFileType).0, StatusCode::BAD_REQUEST);
    assert_eq!(store_error(StoreError::ProjectBusy("p".to_string())).0, StatusCode::CONFLICT);
    assert_eq!(
        store_error(StoreError::Export(PortError::Transport("down".to_string()))).0,
        StatusCode::BAD_GATEWAY
    );
}

#[test]
fn test_openapi_lists_every_route() {
    let doc = ApiDoc::openapi();
    for path in [
        "/projects",
        "/workspace",
        "/workspace/active",
        "/workspace/step",
        "/workspace/title",
        "/workspace/documents",
        "/workspace/documents/{id}",
        "/workspace/generate",
        "/workspace/export",
    ] {
        assert!(doc.paths.paths.contains_key(path), "missing {}", path);
    }
}
