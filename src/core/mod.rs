//! Core State
//!
//! Document mirroring and diagnostic indexing, free of protocol concerns.

pub mod diagnostics;
pub mod document;
pub mod patch;
pub mod record;

pub use diagnostics::{DiagnosticIndex, ProofDiagnostic, Severity, SharedIndex};
pub use document::{Document, DocumentStore, SyncError};
pub use patch::{ChangeEvent, PatchError, RangeEdit, TextPosition};
pub use record::{AnalysisRecord, DependencyLevel, ObligationLevel, Predicate, Status};
