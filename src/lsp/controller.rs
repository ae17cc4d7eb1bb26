//! Sync Controller
//!
//! Owns the server state for one session and maps document lifecycle
//! events onto the document store, the diagnostic index and the
//! publication pipeline.
//!
//! Per document: `Closed -> Open -> Open(edited) -> Closed`. Text edits
//! never trigger publication; diagnostics come from the analysis snapshot,
//! not from the edited text.

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Mutex;
use tower_lsp::lsp_types::Url;

use crate::analysis::{AnalysisLoader, ScanReport};
use crate::config::Config;
use crate::core::diagnostics::{DiagnosticIndex, SharedIndex};
use crate::core::document::{Document, DocumentStore, SyncError};
use crate::core::patch::ChangeEvent;
use crate::lsp::publish::{BackpressurePolicy, DiagnosticSink, PublicationPipeline};

/// Behaviour switches for the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    pub backpressure: BackpressurePolicy,
    /// Publish a file's cached diagnostics as soon as it is opened
    pub publish_on_open: bool,
    /// After a scan, publish every indexed file instead of only open ones
    pub publish_workspace: bool,
}

impl SyncSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            backpressure: BackpressurePolicy::from_config(config),
            publish_on_open: config.publish_on_open,
            publish_workspace: config.publish_workspace,
        }
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

pub struct SyncController<S: DiagnosticSink> {
    documents: DocumentStore,
    index: SharedIndex,
    pipeline: PublicationPipeline<S>,
    settings: SyncSettings,
    /// Set by `teardown`; held across an index swap so a late reload cannot
    /// land in a torn-down session
    torn_down: Mutex<bool>,
}

impl<S: DiagnosticSink> SyncController<S> {
    pub fn new(sink: Arc<S>, settings: SyncSettings) -> Self {
        Self {
            documents: DocumentStore::new(),
            index: SharedIndex::new(),
            pipeline: PublicationPipeline::new(sink, settings.backpressure),
            settings,
            torn_down: Mutex::new(false),
        }
    }

    pub fn settings(&self) -> SyncSettings {
        self.settings
    }

    pub async fn did_open(&self, uri: Url, text: String, version: i32) {
        log::debug!("Opened {} at version {}", uri, version);
        self.documents.open(uri.clone(), text, version).await;

        if self.settings.publish_on_open && uri.scheme() == "file" {
            self.pipeline
                .publish(self.index.snapshot().await, vec![uri])
                .await;
        }
    }

    /// Apply an edit batch. Rejected batches are logged and leave the
    /// document untouched; nothing is reported to the client.
    pub async fn did_change(&self, uri: &Url, version: i32, changes: &[ChangeEvent]) -> bool {
        match self.documents.change(uri, version, changes).await {
            Ok(()) => true,
            Err(e @ SyncError::StaleEdit { .. }) => {
                log::warn!("{}: {}", uri, e);
                false
            }
            Err(SyncError::NotOpen(_)) => {
                log::warn!("Ignored change for {} which is not open", uri);
                false
            }
            Err(e @ SyncError::MalformedPatch { .. }) => {
                log::warn!("Rejected change batch for {}: {}", uri, e);
                false
            }
        }
    }

    /// Re-lint every open file
    pub async fn did_save(&self, uri: &Url) -> usize {
        log::debug!("Saved {}", uri);
        self.publish_open_files().await
    }

    /// Forget the document and clear its diagnostics on the client
    pub async fn did_close(&self, uri: &Url) {
        if !self.documents.close(uri).await {
            log::debug!("Close for {} which was not open", uri);
        }
        self.pipeline.clear(uri.clone()).await;
    }

    pub async fn publish_open_files(&self) -> usize {
        let files = self.documents.open_files().await;
        self.pipeline.publish(self.index.snapshot().await, files).await
    }

    /// Install a freshly built index and publish: every open file, plus
    /// every indexed file when workspace publication is enabled. Files the
    /// previous index covered but the new one does not are cleared.
    ///
    /// Ignored once the session is torn down.
    pub async fn install_index(&self, index: DiagnosticIndex) -> usize {
        let torn_down = self.torn_down.lock().await;
        if *torn_down {
            log::debug!("Session torn down, discarding analysis index");
            return 0;
        }

        let previous = self.index.snapshot().await;
        self.index.install(index).await;
        let snapshot = self.index.snapshot().await;

        let open: BTreeSet<Url> = self.documents.open_files().await.into_iter().collect();

        let stale: Vec<Url> = previous
            .files()
            .filter(|path| snapshot.lookup(path).is_none())
            .filter_map(|path| Url::from_file_path(path).ok())
            .filter(|uri| self.settings.publish_workspace || open.contains(uri))
            .collect();
        for uri in stale {
            self.pipeline.clear(uri).await;
        }

        let mut files = open;
        if self.settings.publish_workspace {
            files.extend(snapshot.files().filter_map(|path| Url::from_file_path(path).ok()));
        }

        self.pipeline
            .publish(snapshot, files.into_iter().collect())
            .await
    }

    /// Rescan the analysis snapshot and swap it in
    pub async fn reload(&self, loader: &AnalysisLoader) -> Result<ScanReport> {
        let (index, report) = loader.scan().await?;
        self.install_index(index).await;
        Ok(report)
    }

    pub async fn document(&self, uri: &Url) -> Option<Document> {
        self.documents.get(uri).await
    }

    pub async fn open_files(&self) -> Vec<Url> {
        self.documents.open_files().await
    }

    pub async fn index(&self) -> Arc<DiagnosticIndex> {
        self.index.snapshot().await
    }

    /// Drop all session state. Later index installs are ignored.
    pub async fn teardown(&self) {
        let mut torn_down = self.torn_down.lock().await;
        *torn_down = true;
        self.documents.clear().await;
        self.index.install(DiagnosticIndex::new()).await;
        log::info!("Session state cleared");
    }
}
