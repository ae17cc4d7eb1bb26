//! Document Store
//!
//! Mirror of every open document. Each document sits behind its own lock so
//! edits to one URI are serialized while different URIs proceed
//! independently; the outer map lock is only held long enough to find or
//! replace an entry.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tower_lsp::lsp_types::Url;

use super::patch::{self, ChangeEvent, PatchError};

/// Text and version of one open document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub content: String,
    pub version: i32,
}

/// Reasons a change batch was not committed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("document {0} is not open")]
    NotOpen(Url),

    #[error("ignored change with version {incoming} <= {current}")]
    StaleEdit { incoming: i32, current: i32 },

    #[error("change #{index} in batch is malformed: {source}")]
    MalformedPatch {
        index: usize,
        #[source]
        source: PatchError,
    },
}

#[derive(Debug, Default)]
pub struct DocumentStore {
    documents: RwLock<HashMap<Url, Arc<Mutex<Document>>>>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a document; an open always wins
    pub async fn open(&self, uri: Url, content: String, version: i32) {
        let document = Arc::new(Mutex::new(Document { content, version }));
        self.documents.write().await.insert(uri, document);
    }

    /// Apply a batch of changes atomically.
    ///
    /// Every change is applied against the text produced by the previous one.
    /// Nothing is committed unless the whole batch applies.
    pub async fn change(
        &self,
        uri: &Url,
        version: i32,
        changes: &[ChangeEvent],
    ) -> Result<(), SyncError> {
        let entry = self
            .documents
            .read()
            .await
            .get(uri)
            .cloned()
            .ok_or_else(|| SyncError::NotOpen(uri.clone()))?;

        let mut document = entry.lock().await;
        if version <= document.version {
            return Err(SyncError::StaleEdit {
                incoming: version,
                current: document.version,
            });
        }

        let content = patch::apply_all(&document.content, changes)
            .map_err(|(index, source)| SyncError::MalformedPatch { index, source })?;

        document.content = content;
        document.version = version;
        Ok(())
    }

    /// Remove a document, returning whether it was open
    pub async fn close(&self, uri: &Url) -> bool {
        self.documents.write().await.remove(uri).is_some()
    }

    /// Snapshot of a document's committed state
    pub async fn get(&self, uri: &Url) -> Option<Document> {
        let entry = self.documents.read().await.get(uri).cloned()?;
        let document = entry.lock().await;
        Some(document.clone())
    }

    /// Open documents backed by local files. Other schemes (diff views,
    /// untitled buffers, git revisions) never receive publications.
    pub async fn open_files(&self) -> Vec<Url> {
        let mut files: Vec<Url> = self
            .documents
            .read()
            .await
            .keys()
            .filter(|uri| uri.scheme() == "file")
            .cloned()
            .collect();
        files.sort();
        files
    }

    pub async fn clear(&self) {
        self.documents.write().await.clear();
    }
}
