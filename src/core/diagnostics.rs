//! Diagnostic Index
//!
//! Per-file diagnostics rendered from analysis records. The index is built
//! once from a snapshot and never patched in place; readers hold an `Arc`
//! snapshot and a reload swaps in a whole new index.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::RwLock;

use super::record::{AnalysisRecord, ObligationLevel, Status};

/// Source tag for obligations owned by the function itself
pub const PRIMARY_SOURCE: &str = "KT Advance";
/// Source tag for obligations derived from call sites
pub const SECONDARY_SOURCE: &str = "KT Advance [secondary]";

/// Severity of a rendered diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Error,
    Warning,
    Information,
    Hint,
}

impl Severity {
    pub fn from_status(status: Status) -> Self {
        match status {
            Status::Violation => Severity::Error,
            Status::Dead => Severity::Warning,
            Status::Discharged => Severity::Information,
            Status::Open | Status::Other => Severity::Hint,
        }
    }

    /// Ordering rank, lower sorts first. Information and Hint share the
    /// lowest rank.
    pub fn rank(&self) -> u8 {
        match self {
            Severity::Error => 0,
            Severity::Warning => 1,
            Severity::Information | Severity::Hint => 2,
        }
    }
}

/// Rendered form of one analysis record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofDiagnostic {
    pub id: u64,
    /// 0-based line
    pub line: u32,
    pub severity: Severity,
    pub code: String,
    pub message: String,
    pub level: ObligationLevel,
}

impl ProofDiagnostic {
    pub fn from_record(record: &AnalysisRecord) -> Self {
        Self {
            id: record.id,
            line: zero_based_line(record.line),
            severity: Severity::from_status(record.status),
            code: record.predicate.label.clone(),
            message: render_message(record),
            level: record.level,
        }
    }

    pub fn source(&self) -> &'static str {
        match self.level {
            ObligationLevel::Primary => PRIMARY_SOURCE,
            ObligationLevel::Secondary => SECONDARY_SOURCE,
        }
    }
}

fn zero_based_line(line: i64) -> u32 {
    line.saturating_sub(1).clamp(0, u32::MAX as i64) as u32
}

/// Render the diagnostic message for a record
pub fn render_message(record: &AnalysisRecord) -> String {
    let mut message = format!(
        "#{}\t<{}>\t {}; ",
        record.id,
        record.status.label(),
        record.predicate.label
    );

    if record.level == ObligationLevel::Secondary {
        message.push_str("Secondary; ");
    }
    if let Some(explanation) = &record.explanation {
        message.push_str(explanation);
    }

    message.push('\n');
    message.push_str(&record.predicate.expression);

    if let Some(description) = record.dependency_level.description() {
        message.push('\n');
        message.push_str(description);
    }

    message
}

/// Total order used for publication: severity, then code, then id
pub fn compare(a: &ProofDiagnostic, b: &ProofDiagnostic) -> Ordering {
    a.severity
        .rank()
        .cmp(&b.severity.rank())
        .then_with(|| a.code.cmp(&b.code))
        .then_with(|| a.id.cmp(&b.id))
}

/// Return a new, ordered copy of `diagnostics`
pub fn order_diagnostics(diagnostics: &[ProofDiagnostic]) -> Vec<ProofDiagnostic> {
    let mut ordered = diagnostics.to_vec();
    ordered.sort_by(compare);
    ordered
}

/// Ordered diagnostics for every analysed source file
#[derive(Debug, Clone, Default)]
pub struct DiagnosticIndex {
    files: HashMap<PathBuf, Vec<ProofDiagnostic>>,
}

impl DiagnosticIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the index from per-file record collections. A file listed with
    /// no records gets a present but empty entry.
    pub fn build<I>(records: I) -> Self
    where
        I: IntoIterator<Item = (PathBuf, Vec<AnalysisRecord>)>,
    {
        let mut files: HashMap<PathBuf, Vec<ProofDiagnostic>> = HashMap::new();

        for (file, file_records) in records {
            files
                .entry(file)
                .or_default()
                .extend(file_records.iter().map(ProofDiagnostic::from_record));
        }

        for diagnostics in files.values_mut() {
            diagnostics.sort_by(compare);
        }

        Self { files }
    }

    /// Ordered diagnostics for `file`, `None` when the snapshot has no entry
    pub fn lookup(&self, file: &Path) -> Option<&[ProofDiagnostic]> {
        self.files.get(file).map(Vec::as_slice)
    }

    pub fn files(&self) -> impl Iterator<Item = &Path> {
        self.files.keys().map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn diagnostic_count(&self) -> usize {
        self.files.values().map(Vec::len).sum()
    }
}

/// Shared handle to the current index
#[derive(Debug, Clone, Default)]
pub struct SharedIndex {
    current: Arc<RwLock<Arc<DiagnosticIndex>>>,
}

impl SharedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current index. The lock is released before returning.
    pub async fn snapshot(&self) -> Arc<DiagnosticIndex> {
        self.current.read().await.clone()
    }

    /// Replace the whole index in one step
    pub async fn install(&self, index: DiagnosticIndex) {
        *self.current.write().await = Arc::new(index);
    }
}
