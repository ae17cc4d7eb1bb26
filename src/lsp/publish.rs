//! Publication Pipeline
//!
//! Turns indexed diagnostics into `textDocument/publishDiagnostics`
//! notifications. Each file is published by its own task so a slow or
//! oversized file never holds up the others.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tower_lsp::Client;
use tower_lsp::lsp_types::{
    Diagnostic, DiagnosticSeverity, NumberOrString, Position, Range, Url,
};

use crate::config::Config;
use crate::core::diagnostics::{DiagnosticIndex, ProofDiagnostic, Severity};

/// End column for whole-line ranges; line lengths are not tracked
pub const END_OF_LINE: u32 = i32::MAX as u32;

/// Receiver of outbound publications
#[tower_lsp::async_trait]
pub trait DiagnosticSink: Send + Sync + 'static {
    /// Replace the client's diagnostics for `uri`. An empty list clears them.
    async fn publish(&self, uri: Url, diagnostics: Vec<Diagnostic>);
}

#[tower_lsp::async_trait]
impl DiagnosticSink for Client {
    async fn publish(&self, uri: Url, diagnostics: Vec<Diagnostic>) {
        self.publish_diagnostics(uri, diagnostics, None).await;
    }
}

/// Pause inserted before oversized publications
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackpressurePolicy {
    pub high_water_mark: usize,
    pub delay: Duration,
}

impl BackpressurePolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            high_water_mark: config.high_water_mark,
            delay: config.backpressure_delay,
        }
    }

    /// Delay owed by a publication of `count` diagnostics
    pub fn delay_for(&self, count: usize) -> Option<Duration> {
        (count > self.high_water_mark).then_some(self.delay)
    }
}

impl Default for BackpressurePolicy {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Convert an indexed diagnostic to its wire form
pub fn to_lsp_diagnostic(diagnostic: &ProofDiagnostic) -> Diagnostic {
    let severity = match diagnostic.severity {
        Severity::Error => DiagnosticSeverity::ERROR,
        Severity::Warning => DiagnosticSeverity::WARNING,
        Severity::Information => DiagnosticSeverity::INFORMATION,
        Severity::Hint => DiagnosticSeverity::HINT,
    };

    Diagnostic::new(
        Range::new(
            Position::new(diagnostic.line, 0),
            Position::new(diagnostic.line, END_OF_LINE),
        ),
        Some(severity),
        Some(NumberOrString::String(diagnostic.code.clone())),
        Some(diagnostic.source().to_string()),
        diagnostic.message.clone(),
        None,
        None,
    )
}

/// Resolves, paces and emits publications
pub struct PublicationPipeline<S: DiagnosticSink> {
    sink: Arc<S>,
    policy: BackpressurePolicy,
}

impl<S: DiagnosticSink> PublicationPipeline<S> {
    pub fn new(sink: Arc<S>, policy: BackpressurePolicy) -> Self {
        Self { sink, policy }
    }

    pub fn policy(&self) -> BackpressurePolicy {
        self.policy
    }

    /// Publish the indexed diagnostics of every file in `files`.
    ///
    /// Files without an index entry are skipped, not cleared. Returns the
    /// number of publications sent. No lock is held while waiting out a
    /// backpressure pause; callers pass an index snapshot.
    pub async fn publish(&self, index: Arc<DiagnosticIndex>, files: Vec<Url>) -> usize {
        log::info!(
            "Lint {}",
            files
                .iter()
                .map(Url::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        );

        let mut tasks = JoinSet::new();

        for uri in files {
            let Ok(path) = uri.to_file_path() else {
                log::debug!("Skipping non-local {}", uri);
                continue;
            };

            let Some(found) = index.lookup(&path) else {
                log::debug!("No analysis entry for {}", path.display());
                continue;
            };

            let diagnostics: Vec<Diagnostic> = found.iter().map(to_lsp_diagnostic).collect();
            let delay = self.policy.delay_for(diagnostics.len());
            let sink = self.sink.clone();

            tasks.spawn(async move {
                if let Some(delay) = delay {
                    log::debug!(
                        "Pausing {:?} before publishing {} diagnostics for {}",
                        delay,
                        diagnostics.len(),
                        uri
                    );
                    tokio::time::sleep(delay).await;
                }

                let count = diagnostics.len();
                sink.publish(uri.clone(), diagnostics).await;
                log::info!("Published {} diagnostics for {}", count, uri);
            });
        }

        let mut published = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(()) => published += 1,
                Err(e) => log::error!("Publication task failed: {}", e),
            }
        }
        published
    }

    /// Clear the client's diagnostics for `uri`
    pub async fn clear(&self, uri: Url) {
        log::info!("Cleared diagnostics for {}", uri);
        self.sink.publish(uri, Vec::new()).await;
    }
}
