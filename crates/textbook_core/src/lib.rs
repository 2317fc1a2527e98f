pub mod domain;
pub mod ingest;
pub mod outline;
pub mod persistence;
pub mod ports;
pub mod store;
pub mod workflow;

pub use domain::{
    Chapter, Document, DocumentStatus, ExportFormat, ExportReceipt, Notice, NoticeLevel, Project,
    Section, Style,
};
pub use ingest::{UploadLimits, UploadReport, UploadedFile};
pub use outline::{GenerationOutput, OutlineError, OutlinePayload};
pub use persistence::{MemoryKeyValueStore, PersistError, ProjectRepository};
pub use ports::{
    ExportService, KeyValueStore, NotificationService, OutlineGenerationService, PortError,
    PortResult, TextExtractionService,
};
pub use store::{ProjectStore, StoreDeps, StoreError, StoreResult, StoreSnapshot};
pub use workflow::Step;
