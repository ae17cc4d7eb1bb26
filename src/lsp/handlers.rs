use serde_json::Value;
use tower_lsp::jsonrpc::Result as LspResult;
use tower_lsp::lsp_types::*;

use crate::core::patch::{ChangeEvent, RangeEdit, TextPosition};
use crate::lsp::backend::Backend;

/// Command that rescans the analysis snapshot
pub const RELOAD_COMMAND: &str = "kt-advance.reloadAnalysis";

/// Trait for handling text document lifecycle notifications
#[tower_lsp::async_trait]
pub trait HandleDocumentSync {
    async fn handle_did_open(&self, params: DidOpenTextDocumentParams);
    async fn handle_did_change(&self, params: DidChangeTextDocumentParams);
    async fn handle_did_save(&self, params: DidSaveTextDocumentParams);
    async fn handle_did_close(&self, params: DidCloseTextDocumentParams);
}

/// Trait for handling workspace requests and notifications
#[tower_lsp::async_trait]
pub trait HandleWorkspace {
    async fn handle_execute_command(
        &self,
        params: ExecuteCommandParams,
    ) -> LspResult<Option<Value>>;
    async fn handle_did_change_watched_files(&self, params: DidChangeWatchedFilesParams);
}

/// Convert a protocol change event. A missing range means the whole
/// document is replaced.
#[allow(deprecated)]
pub fn change_event_from_lsp(event: TextDocumentContentChangeEvent) -> ChangeEvent {
    match event.range {
        None => ChangeEvent::FullReplace { text: event.text },
        Some(range) => ChangeEvent::RangeEdit(RangeEdit {
            start: text_position(range.start),
            end: Some(text_position(range.end)),
            replacement: event.text,
            deleted_length: event.range_length.map(|length| length as usize),
        }),
    }
}

fn text_position(position: Position) -> TextPosition {
    TextPosition::new(position.line as usize, position.character as usize)
}

#[tower_lsp::async_trait]
impl HandleDocumentSync for Backend {
    async fn handle_did_open(&self, params: DidOpenTextDocumentParams) {
        let document = params.text_document;
        self.controller
            .did_open(document.uri, document.text, document.version)
            .await;
    }

    async fn handle_did_change(&self, params: DidChangeTextDocumentParams) {
        let document = params.text_document;
        let changes: Vec<ChangeEvent> = params
            .content_changes
            .into_iter()
            .map(change_event_from_lsp)
            .collect();

        self.controller
            .did_change(&document.uri, document.version, &changes)
            .await;
    }

    async fn handle_did_save(&self, params: DidSaveTextDocumentParams) {
        self.controller.did_save(&params.text_document.uri).await;
    }

    async fn handle_did_close(&self, params: DidCloseTextDocumentParams) {
        self.controller.did_close(&params.text_document.uri).await;
    }
}

#[tower_lsp::async_trait]
impl HandleWorkspace for Backend {
    async fn handle_execute_command(
        &self,
        params: ExecuteCommandParams,
    ) -> LspResult<Option<Value>> {
        match params.command.as_str() {
            RELOAD_COMMAND => {
                self.load_analysis().await;
                Ok(None)
            }
            other => {
                log::warn!("Don't know what to do with {}", other);
                Ok(None)
            }
        }
    }

    async fn handle_did_change_watched_files(&self, params: DidChangeWatchedFilesParams) {
        log::info!("{} watched files changed, rescanning", params.changes.len());
        self.load_analysis().await;
    }
}
