//! tunnelup - expose a local service through a public tunnel.

mod cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::run().await
}
