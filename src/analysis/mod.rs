//! Analysis Snapshot
//!
//! Loading and watching the analyzer's per-file proof obligation output.

pub mod loader;
pub mod schema;
pub mod watcher;

pub use loader::{AnalysisLoader, AnalysisModule, ScanReport};
pub use schema::FileAnalysis;
pub use watcher::AnalysisWatcher;
