use anyhow::Result;
use tokio::io::{stdin, stdout};
use tower_lsp::{LspService, Server};

use crate::Config;
use crate::lsp::backend::Backend;

/// Start the LSP server on stdin/stdout
pub async fn serve() -> Result<()> {
    let config = Config::from_args_and_env()?;
    init_logging(&config);

    for path in &config.config_files {
        log::info!("Using configuration from {}", path.display());
    }

    let (service, socket) =
        LspService::build(move |client| Backend::new(client, config.clone())).finish();

    Server::new(stdin(), stdout(), socket).serve(service).await;

    Ok(())
}

/// Log to stderr; stdout carries the protocol. `RUST_LOG` overrides the
/// configured level.
fn init_logging(config: &Config) {
    let env = env_logger::Env::default().default_filter_or(config.log_level.as_str());
    if let Err(e) = env_logger::Builder::from_env(env).try_init() {
        eprintln!("Logger already initialized: {}", e);
    }
}
