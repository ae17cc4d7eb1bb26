//! Analysis Records
//!
//! One proof obligation as produced by the external analyzer. Records are
//! immutable once read from a snapshot.

use std::path::PathBuf;

use serde::Deserialize;

/// Discharge status of a proof obligation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Violation,
    Dead,
    Discharged,
    Open,
    #[serde(other)]
    Other,
}

impl Status {
    pub fn label(&self) -> &'static str {
        match self {
            Status::Violation => "violation",
            Status::Dead => "dead",
            Status::Discharged => "discharged",
            Status::Open => "open",
            Status::Other => "other",
        }
    }
}

/// Whether an obligation belongs to the function itself or was derived from
/// one of its call sites
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObligationLevel {
    Primary,
    Secondary,
}

/// What a discharge depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyLevel {
    #[serde(rename = "self")]
    SelfContained,
    #[default]
    Unknown,
    Local,
    Api,
    Post,
    Global,
}

impl DependencyLevel {
    /// Human-readable description, `None` for levels that are not rendered
    pub fn description(&self) -> Option<&'static str> {
        match self {
            DependencyLevel::SelfContained | DependencyLevel::Unknown => None,
            DependencyLevel::Local => Some("Depends on local invariants"),
            DependencyLevel::Api => Some("Depends on api assumptions"),
            DependencyLevel::Post => Some("Depends on callee postconditions"),
            DependencyLevel::Global => Some("Depends on global assumptions"),
        }
    }
}

/// The predicate an obligation asserts
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Predicate {
    /// Short predicate kind, e.g. `not-null`
    pub label: String,
    /// Rendered predicate, e.g. `not-null(p)`
    pub expression: String,
}

/// A single proof obligation tied to a source line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRecord {
    pub id: u64,
    pub source_file: PathBuf,
    /// 1-based line as supplied by the analyzer
    pub line: i64,
    pub status: Status,
    pub predicate: Predicate,
    pub explanation: Option<String>,
    pub level: ObligationLevel,
    pub dependency_level: DependencyLevel,
}
