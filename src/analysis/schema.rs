//! Analysis Snapshot Schema
//!
//! On-disk JSON layout of one analysed source file.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::core::record::{
    AnalysisRecord, DependencyLevel, ObligationLevel, Predicate, Status,
};

/// Root of an analysis file (one per source file)
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct FileAnalysis {
    pub source_file: PathBuf,
    #[serde(default)]
    pub functions: Vec<FunctionAnalysis>,
}

/// Obligations collected for one function
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct FunctionAnalysis {
    pub name: String,
    #[serde(default)]
    pub ppos: Vec<PrimaryObligation>,
    #[serde(default)]
    pub callsites: Vec<Callsite>,
}

/// Obligation owned by the function body
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PrimaryObligation {
    pub id: u64,
    pub line: i64,
    pub status: Status,
    pub predicate: Predicate,
    pub explanation: Option<String>,
    #[serde(default)]
    pub dependency_level: DependencyLevel,
}

/// A call site and the obligations it imposes on the caller
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Callsite {
    pub line: i64,
    #[serde(default)]
    pub spos: Vec<SecondaryObligation>,
}

/// Obligation derived from a call site; located at the call
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SecondaryObligation {
    pub id: u64,
    pub status: Status,
    pub predicate: Predicate,
    pub explanation: Option<String>,
    #[serde(default)]
    pub dependency_level: DependencyLevel,
}

impl FileAnalysis {
    /// Source path, resolved against `workspace_root` when relative
    pub fn resolved_source(&self, workspace_root: &Path) -> PathBuf {
        if self.source_file.is_absolute() {
            self.source_file.clone()
        } else {
            workspace_root.join(&self.source_file)
        }
    }

    /// Flatten every function's obligations into records
    pub fn into_records(self, workspace_root: &Path) -> (PathBuf, Vec<AnalysisRecord>) {
        let source_file = self.resolved_source(workspace_root);
        let mut records = Vec::new();

        for function in self.functions {
            records.extend(function.ppos.into_iter().map(|po| AnalysisRecord {
                id: po.id,
                source_file: source_file.clone(),
                line: po.line,
                status: po.status,
                predicate: po.predicate,
                explanation: po.explanation,
                level: ObligationLevel::Primary,
                dependency_level: po.dependency_level,
            }));

            for callsite in function.callsites {
                let line = callsite.line;
                records.extend(callsite.spos.into_iter().map(|po| AnalysisRecord {
                    id: po.id,
                    source_file: source_file.clone(),
                    line,
                    status: po.status,
                    predicate: po.predicate,
                    explanation: po.explanation,
                    level: ObligationLevel::Secondary,
                    dependency_level: po.dependency_level,
                }));
            }
        }

        (source_file, records)
    }
}
