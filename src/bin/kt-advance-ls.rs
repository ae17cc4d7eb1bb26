use anyhow::Result;
use kt_advance_language_server::lsp::server::serve;

#[tokio::main]
async fn main() -> Result<()> {
    serve().await
}
