pub mod db;
pub mod export;
pub mod file_store;
pub mod notify;
pub mod outline_llm;
pub mod pdf;

pub use db::DbAdapter;
pub use export::SimulatedExportAdapter;
pub use file_store::FileKeyValueStore;
pub use notify::BroadcastNotifier;
pub use outline_llm::OpenAiOutlineAdapter;
pub use pdf::LopdfExtractionAdapter;
