//! Shared helpers for integration tests
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;

use kt_advance_language_server::DiagnosticSink;
use kt_advance_language_server::core::record::{
    AnalysisRecord, DependencyLevel, ObligationLevel, Predicate, Status,
};
use tower_lsp::lsp_types::{Diagnostic, Url};

/// One publication as seen by the client
#[derive(Debug, Clone)]
pub struct Publication {
    pub uri: Url,
    pub diagnostics: Vec<Diagnostic>,
    pub at: Instant,
}

/// Sink that records every publication
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<Publication>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<Publication> {
        self.events.lock().unwrap().clone()
    }

    pub fn for_uri(&self, uri: &Url) -> Vec<Publication> {
        self.events()
            .into_iter()
            .filter(|p| &p.uri == uri)
            .collect()
    }

    pub fn reset(&self) {
        self.events.lock().unwrap().clear();
    }
}

#[tower_lsp::async_trait]
impl DiagnosticSink for RecordingSink {
    async fn publish(&self, uri: Url, diagnostics: Vec<Diagnostic>) {
        self.events.lock().unwrap().push(Publication {
            uri,
            diagnostics,
            at: Instant::now(),
        });
    }
}

pub fn file_uri(path: &Path) -> Url {
    Url::from_file_path(path).unwrap()
}

pub fn record(file: &str, id: u64, status: Status, code: &str) -> AnalysisRecord {
    AnalysisRecord {
        id,
        source_file: PathBuf::from(file),
        line: id as i64,
        status,
        predicate: Predicate {
            label: code.to_string(),
            expression: format!("{}(x)", code),
        },
        explanation: None,
        level: ObligationLevel::Primary,
        dependency_level: DependencyLevel::SelfContained,
    }
}

/// `count` open obligations for `file`
pub fn synthetic_records(file: &str, count: usize) -> Vec<AnalysisRecord> {
    (0..count as u64)
        .map(|id| record(file, id, Status::Open, "synthetic"))
        .collect()
}

/// Ids carried in published messages, in publication order
pub fn published_ids(diagnostics: &[Diagnostic]) -> Vec<u64> {
    diagnostics
        .iter()
        .map(|d| {
            d.message
                .trim_start_matches('#')
                .split('\t')
                .next()
                .unwrap()
                .parse()
                .unwrap()
        })
        .collect()
}
