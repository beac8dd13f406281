//! Compass Storage crate - SQLite chat history and document export.
//!
//! Provides a WAL-mode SQLite database with migrations, the history
//! repository keyed by session id, and the exporters that turn a
//! conversation into a downloadable document.

pub mod db;
pub mod export;
pub mod history;
pub mod migrations;

pub use db::Database;
pub use export::{
    exporter_from_config, parse_transcript, DocumentExporter, ExportError, ExportedDocument,
    HttpDocumentExporter, MockDocumentExporter, TranscriptExporter,
};
pub use history::HistoryRepository;
