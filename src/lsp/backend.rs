use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer};

use crate::Config;
use crate::analysis::watcher::{self, AnalysisWatcher};
use crate::analysis::AnalysisLoader;
use crate::lsp::controller::{SyncController, SyncSettings};
use crate::lsp::handlers::{HandleDocumentSync, HandleWorkspace, RELOAD_COMMAND};

/// Quiet period before a burst of analysis file changes triggers a reload
const RELOAD_DEBOUNCE: Duration = Duration::from_millis(500);

/// The main LSP backend that holds state and implements the Language Server Protocol
pub struct Backend {
    pub client: Client,
    pub config: Config,
    pub controller: Arc<SyncController<Client>>,
    workspace_root: RwLock<Option<PathBuf>>,
    watcher: Mutex<Option<AnalysisWatcher>>,
    reload_task: Mutex<Option<JoinHandle<()>>>,
}

impl Backend {
    pub fn new(client: Client, config: Config) -> Self {
        let controller = Arc::new(SyncController::new(
            Arc::new(client.clone()),
            SyncSettings::from_config(&config),
        ));

        Self {
            client,
            config,
            controller,
            workspace_root: RwLock::new(None),
            watcher: Mutex::new(None),
            reload_task: Mutex::new(None),
        }
    }

    /// Loader for the current workspace; falls back to the working directory
    /// when the client sent no root.
    pub async fn loader(&self) -> AnalysisLoader {
        let root = match self.workspace_root.read().await.clone() {
            Some(root) => root,
            None => std::env::current_dir().unwrap_or_default(),
        };
        AnalysisLoader::new(root, &self.config.analysis_dir)
    }

    /// Scan the analysis snapshot, install it and publish
    pub async fn load_analysis(&self) {
        let loader = self.loader().await;
        match self.controller.reload(&loader).await {
            Ok(report) => {
                self.client
                    .log_message(
                        MessageType::INFO,
                        format!(
                            "Loaded {} proof obligations for {} source files from {} modules",
                            report.diagnostics, report.source_files, report.modules_loaded
                        ),
                    )
                    .await;

                for module in &report.modules_failed {
                    self.client
                        .log_message(
                            MessageType::WARNING,
                            format!("Failed to read analysis module {}", module.display()),
                        )
                        .await;
                }
            }
            Err(e) => {
                log::error!("Analysis scan failed: {:#}", e);
                self.client
                    .log_message(
                        MessageType::ERROR,
                        format!("Failed to load analysis results: {}", e),
                    )
                    .await;
            }
        }
    }

    /// Reload whenever analysis files change on disk
    async fn start_watching(&self) {
        let loader = self.loader().await;
        if !loader.analysis_root().is_dir() {
            log::info!(
                "Not watching {}: directory does not exist",
                loader.analysis_root().display()
            );
            return;
        }

        let (analysis_watcher, mut rx) = match AnalysisWatcher::start(loader.analysis_root()) {
            Ok(started) => started,
            Err(e) => {
                log::warn!("Failed to watch analysis directory: {:#}", e);
                return;
            }
        };
        log::info!("Watching {}", analysis_watcher.root().display());
        *self.watcher.lock().await = Some(analysis_watcher);

        let controller = self.controller.clone();
        let client = self.client.clone();

        let task = tokio::spawn(async move {
            while let Some(changed) = watcher::next_batch(&mut rx, RELOAD_DEBOUNCE).await {
                log::info!("{} analysis files changed, reloading", changed.len());
                match controller.reload(&loader).await {
                    Ok(report) => {
                        client
                            .log_message(
                                MessageType::INFO,
                                format!(
                                    "Analysis reloaded: {} proof obligations",
                                    report.diagnostics
                                ),
                            )
                            .await;
                    }
                    Err(e) => {
                        client
                            .log_message(
                                MessageType::ERROR,
                                format!("Analysis reload failed: {}", e),
                            )
                            .await;
                    }
                }
            }
        });
        *self.reload_task.lock().await = Some(task);
    }
}

#[allow(deprecated)]
fn workspace_root(params: &InitializeParams) -> Option<PathBuf> {
    params
        .workspace_folders
        .as_ref()
        .and_then(|folders| folders.first())
        .map(|folder| &folder.uri)
        .or(params.root_uri.as_ref())
        .and_then(|uri| uri.to_file_path().ok())
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(
        &self,
        params: InitializeParams,
    ) -> tower_lsp::jsonrpc::Result<InitializeResult> {
        let root = workspace_root(&params);
        log::info!("Workspace root: {:?}", root);
        *self.workspace_root.write().await = root;

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Options(
                    TextDocumentSyncOptions {
                        open_close: Some(true),
                        change: Some(TextDocumentSyncKind::INCREMENTAL),
                        save: Some(TextDocumentSyncSaveOptions::Supported(true)),
                        ..Default::default()
                    },
                )),
                execute_command_provider: Some(ExecuteCommandOptions {
                    commands: vec![RELOAD_COMMAND.to_string()],
                    work_done_progress_options: Default::default(),
                }),
                ..Default::default()
            },
            server_info: Some(ServerInfo {
                name: "kt-advance-language-server".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        self.client
            .log_message(MessageType::INFO, "kt-advance-language-server initialized")
            .await;

        self.load_analysis().await;

        if self.config.watch {
            self.start_watching().await;
        }
    }

    async fn shutdown(&self) -> tower_lsp::jsonrpc::Result<()> {
        self.watcher.lock().await.take();
        if let Some(task) = self.reload_task.lock().await.take() {
            task.abort();
        }
        self.controller.teardown().await;
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        self.handle_did_open(params).await
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        self.handle_did_change(params).await
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) {
        self.handle_did_save(params).await
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        self.handle_did_close(params).await
    }

    async fn did_change_watched_files(&self, params: DidChangeWatchedFilesParams) {
        self.handle_did_change_watched_files(params).await
    }

    async fn execute_command(
        &self,
        params: ExecuteCommandParams,
    ) -> tower_lsp::jsonrpc::Result<Option<serde_json::Value>> {
        self.handle_execute_command(params).await
    }
}
