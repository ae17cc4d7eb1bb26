//! Analysis Loader
//!
//! Reads the analysis snapshot of a workspace. Every subdirectory of the
//! analysis root is one module; JSON files directly in the root form an
//! implicit root module. Modules are read in parallel and each one either
//! loads completely or contributes nothing.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio::task::JoinSet;

use super::schema::FileAnalysis;
use crate::core::diagnostics::DiagnosticIndex;
use crate::core::record::AnalysisRecord;

const ANALYSIS_EXTENSION: &str = "json";

/// A directory of analysis files read as one unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisModule {
    pub root: PathBuf,
    /// Whether nested directories belong to this module
    pub recursive: bool,
}

/// Summary of one scan
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    pub modules_loaded: usize,
    pub modules_failed: Vec<PathBuf>,
    pub analysis_files: usize,
    pub source_files: usize,
    pub diagnostics: usize,
    pub elapsed: Duration,
}

/// Loads analysis snapshots for one workspace
#[derive(Debug, Clone)]
pub struct AnalysisLoader {
    workspace_root: PathBuf,
    analysis_root: PathBuf,
}

impl AnalysisLoader {
    /// `analysis_dir` is resolved against `workspace_root` when relative
    pub fn new(workspace_root: impl Into<PathBuf>, analysis_dir: &Path) -> Self {
        let workspace_root = workspace_root.into();
        let analysis_root = if analysis_dir.is_absolute() {
            analysis_dir.to_path_buf()
        } else {
            workspace_root.join(analysis_dir)
        };

        Self {
            workspace_root,
            analysis_root,
        }
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    pub fn analysis_root(&self) -> &Path {
        &self.analysis_root
    }

    /// Find the modules under the analysis root
    pub async fn discover_modules(&self) -> Result<Vec<AnalysisModule>> {
        let mut entries = tokio::fs::read_dir(&self.analysis_root)
            .await
            .with_context(|| {
                format!(
                    "Failed to read analysis directory: {}",
                    self.analysis_root.display()
                )
            })?;

        let mut modules = Vec::new();
        let mut has_root_files = false;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_dir() {
                modules.push(AnalysisModule {
                    root: path,
                    recursive: true,
                });
            } else if is_analysis_file(&path) {
                has_root_files = true;
            }
        }

        if has_root_files {
            modules.push(AnalysisModule {
                root: self.analysis_root.clone(),
                recursive: false,
            });
        }

        modules.sort_by(|a, b| a.root.cmp(&b.root));
        Ok(modules)
    }

    /// Read every module and build a fresh index.
    ///
    /// A missing analysis directory yields an empty index. A module that
    /// fails to read is logged and skipped, so its source files end up with
    /// no index entry.
    pub async fn scan(&self) -> Result<(DiagnosticIndex, ScanReport)> {
        let started = Instant::now();
        let mut report = ScanReport::default();

        if !self.analysis_root.is_dir() {
            log::warn!(
                "Analysis directory {} does not exist, no diagnostics available",
                self.analysis_root.display()
            );
            return Ok((DiagnosticIndex::new(), report));
        }

        log::info!("Scanning {}", self.analysis_root.display());

        let mut tasks = JoinSet::new();
        for module in self.discover_modules().await? {
            let workspace_root = self.workspace_root.clone();
            tasks.spawn_blocking(move || {
                let result = load_module(&module, &workspace_root);
                (module.root, result)
            });
        }

        let mut entries = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((root, Ok(files))) => {
                    log::info!(
                        "Read {} analysis files from {}",
                        files.len(),
                        root.display()
                    );
                    report.modules_loaded += 1;
                    report.analysis_files += files.len();
                    entries.extend(files);
                }
                Ok((root, Err(e))) => {
                    log::warn!("Skipping analysis module {}: {:#}", root.display(), e);
                    report.modules_failed.push(root);
                }
                Err(e) => {
                    log::error!("Analysis module reader panicked: {}", e);
                }
            }
        }

        let index = DiagnosticIndex::build(entries);
        report.source_files = index.len();
        report.diagnostics = index.diagnostic_count();
        report.elapsed = started.elapsed();

        log::info!(
            "Time elapsed for reading is {:?} ({} modules, {} source files, {} diagnostics)",
            report.elapsed,
            report.modules_loaded,
            report.source_files,
            report.diagnostics
        );

        Ok((index, report))
    }
}

/// Whether `path` looks like an analysis file
pub fn is_analysis_file(path: &Path) -> bool {
    path.extension().and_then(|s| s.to_str()) == Some(ANALYSIS_EXTENSION)
}

/// Read one module. Runs on a blocking thread.
fn load_module(
    module: &AnalysisModule,
    workspace_root: &Path,
) -> Result<Vec<(PathBuf, Vec<AnalysisRecord>)>> {
    let mut files = Vec::new();

    for path in collect_analysis_files(&module.root, module.recursive)? {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read analysis file: {}", path.display()))?;
        let analysis: FileAnalysis = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse analysis file: {}", path.display()))?;
        files.push(analysis.into_records(workspace_root));
    }

    Ok(files)
}

fn collect_analysis_files(root: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let entries = std::fs::read_dir(&dir)
            .with_context(|| format!("Failed to read directory: {}", dir.display()))?;

        for entry in entries {
            let path = entry?.path();
            if path.is_dir() {
                if recursive {
                    pending.push(path);
                }
            } else if is_analysis_file(&path) {
                found.push(path);
            }
        }
    }

    found.sort();
    Ok(found)
}
