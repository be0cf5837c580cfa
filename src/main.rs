use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    mapsync_cli::cli::run().await
}
