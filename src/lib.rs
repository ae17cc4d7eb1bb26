//! KT Advance Language Server
//!
//! Publishes precomputed KT Advance proof obligations as LSP diagnostics.
//!
//! This library provides:
//! - Incremental mirroring of open documents
//! - Loading and watching of analysis snapshots
//! - Ordered, paced diagnostic publication
//! - Configuration management

pub mod analysis;
pub mod config;
pub mod core;
pub mod lsp;

// Re-exports for clean public API
pub use analysis::AnalysisLoader;
pub use config::Config;
pub use crate::core::{ChangeEvent, DiagnosticIndex, DocumentStore, ProofDiagnostic};
pub use lsp::{DiagnosticSink, SyncController};
