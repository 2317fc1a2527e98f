//! crates/textbook_core/src/store.rs
//!
//! The project store: the single owner of every project, the active project,
//! the workflow step and the busy flag.
//!
//! Every mutation is copy-on-write. The changed project is built on a copy of
//! the collection, the copy is persisted, and only then does it replace the
//! in-memory collection. A failed write therefore leaves the store unchanged.
//!
//! Each project has an operation lock. Outline generation, export and uploads
//! hold it for their whole duration; plain mutations only try it and fail with
//! `StoreError::ProjectBusy` when it is taken.

use crate::domain::{Document, ExportFormat, ExportReceipt, Notice, Project};
use crate::ingest::{preview_of, UploadLimits, UploadReport, UploadedFile};
use crate::outline::OutlineError;
use crate::persistence::{PersistError, ProjectRepository};
use crate::ports::{
    ExportService, NotificationService, OutlineGenerationService, PortError, TextExtractionService,
};
use crate::workflow::Step;
use futures::future::join_all;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

//=========================================================================================
// Errors
//=========================================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Project title must not be empty")]
    InvalidTitle,
    #[error("Project {0} has an operation in progress")]
    ProjectBusy(String),
    #[error("Please upload PDF files only.")]
    UnsupportedFileType,
    #[error("Outline generation failed: {0}")]
    Generation(PortError),
    #[error("Outline generation failed: {0}")]
    Outline(#[from] OutlineError),
    #[error("Export failed: {0}")]
    Export(PortError),
    #[error("Persistence failed: {0}")]
    Persistence(#[from] PersistError),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Recorded on documents whose upload never reached a final status.
pub const INTERRUPTED_UPLOAD: &str = "Upload was interrupted before processing finished";

//=========================================================================================
// Construction
//=========================================================================================

/// Everything the store talks to outside the process.
pub struct StoreDeps {
    pub repository: ProjectRepository,
    pub extractor: Arc<dyn TextExtractionService>,
    pub generator: Arc<dyn OutlineGenerationService>,
    pub exporter: Arc<dyn ExportService>,
    pub notifier: Arc<dyn NotificationService>,
    pub upload_limits: UploadLimits,
}

/// A point-in-time copy of the store, for rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    pub projects: Vec<Project>,
    pub active_project: Option<Project>,
    pub step: Step,
    pub busy: bool,
}

struct StoreState {
    projects: Vec<Project>,
    active_id: Option<String>,
    step: Step,
    op_locks: HashMap<String, Arc<Mutex<()>>>,
}

impl StoreState {
    fn position(&self, id: &str) -> Option<usize> {
        self.projects.iter().position(|p| p.id == id)
    }

    fn find(&self, id: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == id)
    }

    fn active(&self) -> Option<&Project> {
        self.active_id.as_deref().and_then(|id| self.find(id))
    }

    fn is_active(&self, id: &str) -> bool {
        self.active_id.as_deref() == Some(id)
    }

    fn op_lock(&mut self, id: &str) -> Arc<Mutex<()>> {
        self.op_locks
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// Decrements the in-flight counter when an async operation ends, on every path.
struct BusyGuard<'a>(&'a AtomicUsize);

impl<'a> BusyGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct ProjectStore {
    state: Mutex<StoreState>,
    in_flight: AtomicUsize,
    repository: ProjectRepository,
    extractor: Arc<dyn TextExtractionService>,
    generator: Arc<dyn OutlineGenerationService>,
    exporter: Arc<dyn ExportService>,
    notifier: Arc<dyn NotificationService>,
    upload_limits: UploadLimits,
}

impl ProjectStore {
    /// Loads the persisted collection and builds a store with no active project
    /// on the `upload` step.
    pub async fn open(deps: StoreDeps) -> Result<Self, PersistError> {
        let mut projects = deps.repository.load().await?;
        let mut interrupted = 0;
        for doc in projects.iter_mut().flat_map(|p| p.documents.iter_mut()) {
            if doc.is_in_flight() {
                doc.mark_failed(INTERRUPTED_UPLOAD);
                interrupted += 1;
            }
        }
        if interrupted > 0 {
            warn!(interrupted, "Stored documents were left mid-upload; marked as failed");
        }
        info!(count = projects.len(), "Project store opened");
        Ok(Self {
            state: Mutex::new(StoreState {
                projects,
                active_id: None,
                step: Step::Upload,
                op_locks: HashMap::new(),
            }),
            in_flight: AtomicUsize::new(0),
            repository: deps.repository,
            extractor: deps.extractor,
            generator: deps.generator,
            exporter: deps.exporter,
            notifier: deps.notifier,
            upload_limits: deps.upload_limits,
        })
    }

    //=====================================================================================
    // Reads
    //=====================================================================================

    pub async fn projects(&self) -> Vec<Project> {
        self.state.lock().await.projects.clone()
    }

    pub async fn active_project(&self) -> Option<Project> {
        self.state.lock().await.active().cloned()
    }

    pub async fn step(&self) -> Step {
        self.state.lock().await.step
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    pub async fn snapshot(&self) -> StoreSnapshot {
        let state = self.state.lock().await;
        StoreSnapshot {
            projects: state.projects.clone(),
            active_project: state.active().cloned(),
            step: state.step,
            busy: self.is_busy(),
        }
    }

    //=====================================================================================
    // Projects and navigation
    //=====================================================================================

    /// Creates a project, makes it active and resets the step to `upload`.
    pub async fn create_project(&self, title: &str) -> StoreResult<Project> {
        let title = title.trim();
        if title.is_empty() {
            return Err(StoreError::InvalidTitle);
        }
        let project = Project::new(title);

        let mut state = self.state.lock().await;
        let mut next = state.projects.clone();
        next.push(project.clone());
        self.repository.save(&next).await?;
        state.projects = next;
        state.active_id = Some(project.id.clone());
        state.step = Step::Upload;

        info!(project_id = %project.id, title = %project.title, "Created project");
        Ok(project)
    }

    /// Makes a stored project active, or clears the selection when `id` is
    /// `None` or unknown. Selecting a project resets the step once, based on
    /// whether it has documents.
    pub async fn select_project(&self, id: Option<&str>) -> Option<Project> {
        let mut state = self.state.lock().await;
        let Some(id) = id else {
            state.active_id = None;
            debug!("Cleared active project");
            return None;
        };
        match state.find(id).cloned() {
            Some(project) => {
                state.active_id = Some(project.id.clone());
                state.step = Step::for_selection(&project);
                debug!(project_id = %project.id, step = %state.step, "Selected project");
                Some(project)
            }
            None => {
                warn!(project_id = %id, "Selected unknown project, clearing selection");
                state.active_id = None;
                state.step = Step::Upload;
                None
            }
        }
    }

    /// Sets the workflow step. Never gated on the active project's data.
    pub async fn set_step(&self, step: Step) {
        let mut state = self.state.lock().await;
        debug!(from = %state.step, to = %step, "Step changed");
        state.step = step;
    }

    //=====================================================================================
    // Active project mutations
    //=====================================================================================
    // Each returns `Ok(None)` without touching anything when no project is active.

    pub async fn update_title(&self, title: &str) -> StoreResult<Option<Project>> {
        let title = title.trim();
        if title.is_empty() {
            return Err(StoreError::InvalidTitle);
        }
        let title = title.to_string();
        self.mutate_active("update_title", move |project| project.title = title)
            .await
    }

    pub async fn add_document(&self, mut document: Document) -> StoreResult<Option<Project>> {
        document.normalize();
        self.mutate_active("add_document", move |project| project.documents.push(document))
            .await
    }

    /// Removes the first document with `id`. An unknown id leaves the documents
    /// unchanged but still refreshes `updated_at`.
    pub async fn remove_document(&self, id: &str) -> StoreResult<Option<Project>> {
        self.mutate_active("remove_document", |project| {
            if let Some(pos) = project.documents.iter().position(|d| d.id == id) {
                project.documents.remove(pos);
            }
        })
        .await
    }

    /// Replaces the document with the same id. An unknown id is a no-op apart
    /// from refreshing `updated_at`.
    pub async fn update_document(&self, mut document: Document) -> StoreResult<Option<Project>> {
        document.normalize();
        self.mutate_active("update_document", move |project| replace_document(project, document))
            .await
    }

    //=====================================================================================
    // Long-running operations
    //=====================================================================================

    /// Sends the active project's extracted text to the outline generator and
    /// replaces its chapters with the result. On any failure the project is
    /// left as it was and an error notice is raised.
    pub async fn generate_outline(&self) -> StoreResult<Option<Project>> {
        let Some((id, op_lock)) = self.active_op_lock().await else {
            debug!("generate_outline ignored: no active project");
            return Ok(None);
        };
        let _busy = BusyGuard::enter(&self.in_flight);
        let _op = op_lock.lock_owned().await;

        let Some(snapshot) = self.state.lock().await.find(&id).cloned() else {
            return Ok(None);
        };
        let corpus = snapshot.corpus();
        info!(project_id = %id, documents = snapshot.documents.len(), corpus_chars = corpus.chars().count(), "Generating outline");

        let chapters = match self.generator.generate_outline(&corpus).await {
            Ok(output) => output.into_chapters(&snapshot.title).map_err(StoreError::from),
            Err(e) => Err(StoreError::Generation(e)),
        };
        let chapters = match chapters {
            Ok(chapters) => chapters,
            Err(e) => {
                warn!(project_id = %id, error = %e, "Outline generation failed");
                self.notifier.notify(Notice::error(format!("Failed to generate textbook: {}", e)));
                return Err(e);
            }
        };
        let chapter_count = chapters.len();

        let mut state = self.state.lock().await;
        let updated = match self.commit(&mut state, &id, move |p| p.chapters = chapters).await {
            Ok(updated) => updated,
            Err(e) => {
                warn!(project_id = %id, error = %e, "Could not store generated outline");
                self.notifier.notify(Notice::error(format!("Failed to generate textbook: {}", e)));
                return Err(e);
            }
        };
        if state.is_active(&id) {
            state.step = Step::Preview;
        }
        drop(state);

        info!(project_id = %id, chapters = chapter_count, "Outline generated");
        self.notifier.notify(Notice::success(format!(
            "Generated {} chapter(s) for \"{}\"",
            chapter_count, updated.title
        )));
        Ok(Some(updated))
    }

    /// Hands the active project to the export collaborator. Documents and
    /// chapters are never modified; only `updated_at` moves on success. A
    /// finished export is reported as such even if that timestamp cannot be
    /// saved.
    pub async fn export_project(&self, format: ExportFormat) -> StoreResult<Option<ExportReceipt>> {
        let Some((id, op_lock)) = self.active_op_lock().await else {
            debug!("export_project ignored: no active project");
            return Ok(None);
        };
        let _busy = BusyGuard::enter(&self.in_flight);
        let _op = op_lock.lock_owned().await;

        let Some(snapshot) = self.state.lock().await.find(&id).cloned() else {
            return Ok(None);
        };
        info!(project_id = %id, %format, "Exporting textbook");

        let receipt = match self.exporter.export(&snapshot, format).await {
            Ok(receipt) => receipt,
            Err(e) => {
                warn!(project_id = %id, %format, error = %e, "Export failed");
                self.notifier.notify(Notice::error(format!("Failed to export textbook: {}", e)));
                return Err(StoreError::Export(e));
            }
        };

        if let Err(e) = self.commit_locked(&id, |_| {}).await {
            warn!(project_id = %id, error = %e, "Export finished but its timestamp could not be saved");
        }

        info!(project_id = %id, file = %receipt.file_name, "Export complete");
        self.notifier.notify(Notice::success(format!(
            "Textbook \"{}\" has been exported as {}",
            snapshot.title, format
        )));
        Ok(Some(receipt))
    }

    /// Runs a batch of uploaded files through extraction and records each as a
    /// document of the active project. Files fail independently; non-PDF files
    /// are skipped, and a batch with no PDF at all is rejected outright.
    pub async fn upload_documents(&self, files: Vec<UploadedFile>) -> StoreResult<Option<UploadReport>> {
        let Some((id, op_lock)) = self.active_op_lock().await else {
            debug!("upload_documents ignored: no active project");
            return Ok(None);
        };

        let (pdfs, others): (Vec<_>, Vec<_>) = files.into_iter().partition(UploadedFile::is_pdf);
        let mut report = UploadReport {
            rejected: others.into_iter().map(|f| f.name).collect(),
            ..UploadReport::default()
        };
        if pdfs.is_empty() {
            warn!(project_id = %id, rejected = report.rejected.len(), "Upload contained no PDF files");
            self.notifier.notify(Notice::error(StoreError::UnsupportedFileType.to_string()));
            return Err(StoreError::UnsupportedFileType);
        }

        let _op = op_lock
            .try_lock_owned()
            .map_err(|_| StoreError::ProjectBusy(id.clone()))?;
        let _busy = BusyGuard::enter(&self.in_flight);

        // Register every accepted file before any extraction starts, so the
        // document list keeps batch order.
        let mut documents: Vec<Document> = pdfs
            .iter()
            .map(|f| Document::new_upload(f.name.clone(), f.size(), f.last_modified))
            .collect();
        let registered = documents.clone();
        if let Err(e) = self.commit_locked(&id, move |p| p.documents.extend(registered)).await {
            warn!(project_id = %id, error = %e, "Could not register uploaded files");
            self.notifier.notify(Notice::error(format!("Failed to upload files: {}", e)));
            return Err(e);
        }
        report.accepted = documents.iter().map(|d| d.id.clone()).collect();

        for doc in documents.iter_mut() {
            doc.mark_processing(30);
        }
        let processing = documents.clone();
        if let Err(e) = self
            .commit_locked(&id, move |p| {
                for doc in processing {
                    replace_document(p, doc);
                }
            })
            .await
        {
            return Err(self.abandon_upload(&id, &report.accepted, e).await);
        }

        let limits = self.upload_limits;
        let extractions = pdfs.iter().map(|file| async move {
            if file.size() > limits.max_file_bytes {
                return Err(PortError::InvalidResponse(format!(
                    "File is larger than the {} byte upload limit",
                    limits.max_file_bytes
                )));
            }
            self.extractor.extract_text(&file.bytes).await
        });
        let results = join_all(extractions).await;

        for (doc, result) in documents.iter_mut().zip(results) {
            match result {
                Ok(text) => {
                    doc.mark_ready(Some(preview_of(&text, limits.preview_chars)));
                    report.ready += 1;
                }
                Err(e) => {
                    warn!(project_id = %id, file = %doc.name, error = %e, "Could not extract text");
                    doc.mark_failed(e.to_string());
                    report.failed += 1;
                }
            }
        }
        let finished = documents;
        if let Err(e) = self
            .commit_locked(&id, move |p| {
                for doc in finished {
                    replace_document(p, doc);
                }
            })
            .await
        {
            return Err(self.abandon_upload(&id, &report.accepted, e).await);
        }

        let mut state = self.state.lock().await;
        let has_ready = state.find(&id).is_some_and(Project::has_ready_document);
        if has_ready && state.is_active(&id) {
            state.step = Step::Extract;
        }
        drop(state);

        info!(project_id = %id, ready = report.ready, failed = report.failed, rejected = report.rejected.len(), "Upload batch processed");
        if report.failed > 0 {
            self.notifier.notify(Notice::error(format!(
                "{} of {} file(s) could not be processed",
                report.failed,
                report.accepted.len()
            )));
        }
        Ok(Some(report))
    }

    //=====================================================================================
    // Internals
    //=====================================================================================

    async fn active_op_lock(&self) -> Option<(String, Arc<Mutex<()>>)> {
        let mut state = self.state.lock().await;
        let id = state.active().map(|p| p.id.clone())?;
        let lock = state.op_lock(&id);
        Some((id, lock))
    }

    /// Applies `f` to the active project unless one of its long-running
    /// operations holds the operation lock.
    async fn mutate_active<F>(&self, op: &'static str, f: F) -> StoreResult<Option<Project>>
    where
        F: FnOnce(&mut Project),
    {
        let mut state = self.state.lock().await;
        let Some(id) = state.active().map(|p| p.id.clone()) else {
            debug!(op, "Ignored: no active project");
            return Ok(None);
        };
        let lock = state.op_lock(&id);
        let _op: MutexGuard<'_, ()> = lock.try_lock().map_err(|_| {
            warn!(op, project_id = %id, "Rejected: project has an operation in progress");
            StoreError::ProjectBusy(id.clone())
        })?;
        let updated = self.commit(&mut state, &id, f).await?;
        debug!(op, project_id = %id, documents = updated.documents.len(), "Project updated");
        Ok(Some(updated))
    }

    /// Takes a batch whose final statuses could not be saved back out of the
    /// project. When even that write fails the documents are failed in memory
    /// only; `open` fails any that were persisted mid-upload.
    async fn abandon_upload(&self, id: &str, doc_ids: &[String], cause: StoreError) -> StoreError {
        warn!(project_id = %id, error = %cause, documents = doc_ids.len(), "Upload could not be saved, rolling back");
        let batch = doc_ids.to_vec();
        let rollback = self
            .commit_locked(id, move |p| p.documents.retain(|d| !batch.contains(&d.id)))
            .await;
        if let Err(e) = rollback {
            warn!(project_id = %id, error = %e, "Rollback could not be saved; failing the batch in memory");
            let mut state = self.state.lock().await;
            if let Some(index) = state.position(id) {
                for doc in state.projects[index].documents.iter_mut() {
                    if doc_ids.contains(&doc.id) {
                        doc.mark_failed(INTERRUPTED_UPLOAD);
                    }
                }
            }
        }
        self.notifier.notify(Notice::error(format!("Failed to upload files: {}", cause)));
        cause
    }

    /// For callers that already hold the project's operation lock.
    async fn commit_locked<F>(&self, id: &str, f: F) -> StoreResult<Project>
    where
        F: FnOnce(&mut Project),
    {
        let mut state = self.state.lock().await;
        self.commit(&mut state, id, f).await
    }

    /// Copy-on-write replacement of one project: mutate a copy, persist the
    /// whole collection, then swap it in.
    async fn commit<F>(&self, state: &mut StoreState, id: &str, f: F) -> StoreResult<Project>
    where
        F: FnOnce(&mut Project),
    {
        let Some(index) = state.position(id) else {
            return Err(StoreError::Persistence(PersistError::Port(PortError::NotFound(
                format!("Project {} not found", id),
            ))));
        };
        let mut updated = state.projects[index].clone();
        f(&mut updated);
        updated.touch();

        let mut next = state.projects.clone();
        next[index] = updated.clone();
        self.repository.save(&next).await?;
        state.projects = next;
        Ok(updated)
    }
}

fn replace_document(project: &mut Project, document: Document) {
    if let Some(slot) = project.documents.iter_mut().find(|d| d.id == document.id) {
        *slot = document;
    }
}
