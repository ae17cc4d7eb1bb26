//! Configuration management for the KT Advance language server.
//!
//! Handles:
//! - Command-line argument parsing
//! - User-global and project configuration files
//!
//! Priority: command line > project file > user-global file > defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;

/// Project configuration file, looked up in the working directory
pub const PROJECT_CONFIG_FILE: &str = ".kt-advance-ls.toml";

pub const DEFAULT_ANALYSIS_DIR: &str = "kt-analysis";
pub const DEFAULT_HIGH_WATER_MARK: usize = 2000;
pub const DEFAULT_BACKPRESSURE_DELAY: Duration = Duration::from_millis(200);

/// Command-line arguments for the KT Advance language server
#[derive(Debug, Default, Parser)]
#[command(name = "kt-advance-ls")]
#[command(about = "Language server publishing KT Advance proof obligations")]
#[command(version)]
pub struct Args {
    /// Directory holding the analysis snapshot
    #[arg(
        long,
        help = "Analysis snapshot directory, relative to the workspace root"
    )]
    pub analysis_dir: Option<PathBuf>,

    /// Diagnostic count above which a publication is delayed
    #[arg(long, help = "Diagnostic count that triggers a publication pause")]
    pub high_water_mark: Option<usize>,

    /// Pause before an oversized publication
    #[arg(long, help = "Pause in milliseconds before oversized publications")]
    pub backpressure_delay_ms: Option<u64>,

    #[arg(long, help = "Do not publish a file's diagnostics when it is opened")]
    pub no_publish_on_open: bool,

    #[arg(long, help = "Only publish open files after the analysis scan")]
    pub no_publish_workspace: bool,

    #[arg(long, help = "Do not watch the analysis directory for changes")]
    pub no_watch: bool,

    /// Log level for the language server
    #[arg(
        long,
        default_value = "info",
        help = "Log level (trace, debug, info, warn, error)"
    )]
    pub log_level: String,
}

/// Settings read from a TOML configuration file
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub analysis_dir: Option<PathBuf>,
    pub high_water_mark: Option<usize>,
    pub backpressure_delay_ms: Option<u64>,
    pub publish_on_open: Option<bool>,
    pub publish_workspace: Option<bool>,
    pub watch: Option<bool>,
}

impl ConfigFile {
    /// Load a configuration file, `None` if it does not exist
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let file = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(Some(file))
    }

    /// Overlay `other` on top of `self`; values set in `other` win
    pub fn overlay(self, other: ConfigFile) -> ConfigFile {
        ConfigFile {
            analysis_dir: other.analysis_dir.or(self.analysis_dir),
            high_water_mark: other.high_water_mark.or(self.high_water_mark),
            backpressure_delay_ms: other.backpressure_delay_ms.or(self.backpressure_delay_ms),
            publish_on_open: other.publish_on_open.or(self.publish_on_open),
            publish_workspace: other.publish_workspace.or(self.publish_workspace),
            watch: other.watch.or(self.watch),
        }
    }
}

/// Combined configuration from all sources
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Analysis snapshot directory; relative paths resolve against the workspace root
    pub analysis_dir: PathBuf,
    /// Publications with more diagnostics than this are delayed
    pub high_water_mark: usize,
    pub backpressure_delay: Duration,
    pub publish_on_open: bool,
    /// Publish every indexed file after a scan, not only open ones
    pub publish_workspace: bool,
    pub watch: bool,
    pub log_level: String,
    /// Configuration files that were found and applied
    pub config_files: Vec<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            analysis_dir: PathBuf::from(DEFAULT_ANALYSIS_DIR),
            high_water_mark: DEFAULT_HIGH_WATER_MARK,
            backpressure_delay: DEFAULT_BACKPRESSURE_DELAY,
            publish_on_open: true,
            publish_workspace: true,
            watch: true,
            log_level: "info".to_string(),
            config_files: Vec::new(),
        }
    }
}

impl Config {
    /// Create configuration from command-line arguments and config files
    pub fn from_args_and_env() -> Result<Self> {
        Self::from_args(Args::parse())
    }

    /// Create configuration from explicit arguments (useful for testing)
    pub fn from_args(args: Args) -> Result<Self> {
        let project_dir = std::env::current_dir()?;
        Self::from_sources(args, user_config_path().as_deref(), &project_dir)
    }

    /// Layer the user-global file, the project file in `project_dir` and `args`
    pub fn from_sources(
        args: Args,
        user_config: Option<&Path>,
        project_dir: &Path,
    ) -> Result<Self> {
        let mut config_files = Vec::new();
        let mut file = ConfigFile::default();

        let project_config = project_dir.join(PROJECT_CONFIG_FILE);
        for path in user_config.into_iter().chain([project_config.as_path()]) {
            if let Some(loaded) = ConfigFile::load(path)? {
                file = file.overlay(loaded);
                config_files.push(path.to_path_buf());
            }
        }

        let defaults = Config::default();

        Ok(Config {
            analysis_dir: args
                .analysis_dir
                .or(file.analysis_dir)
                .unwrap_or(defaults.analysis_dir),
            high_water_mark: args
                .high_water_mark
                .or(file.high_water_mark)
                .unwrap_or(defaults.high_water_mark),
            backpressure_delay: args
                .backpressure_delay_ms
                .or(file.backpressure_delay_ms)
                .map(Duration::from_millis)
                .unwrap_or(defaults.backpressure_delay),
            publish_on_open: !args.no_publish_on_open
                && file.publish_on_open.unwrap_or(defaults.publish_on_open),
            publish_workspace: !args.no_publish_workspace
                && file.publish_workspace.unwrap_or(defaults.publish_workspace),
            watch: !args.no_watch && file.watch.unwrap_or(defaults.watch),
            log_level: args.log_level,
            config_files,
        })
    }

    pub fn has_config_files(&self) -> bool {
        !self.config_files.is_empty()
    }
}

/// `<config_dir>/kt-advance-ls/config.toml`
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("kt-advance-ls").join("config.toml"))
}
