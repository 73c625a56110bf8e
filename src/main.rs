use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;

use index_gateway::cli::Args;
use index_gateway::engine::RemoteIndexer;
use index_gateway::logging::{self, Verbosity};
use index_gateway::transport::{self, HandlerOptions};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse_args();
    logging::init(Verbosity::from_flags(args.verbose, args.quiet));

    let config = args.to_config()?;
    let indexer = RemoteIndexer::builder(config.indexer_url()?)
        .with_timeout(config.request_timeout())
        .with_skip_tls(config.skip_tls)
        .build()
        .context("Failed to build indexer client")?;
    info!(indexer = %indexer.report_url(), "using remote indexer");

    let listener = TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen))?;
    let router = transport::router(indexer, HandlerOptions::from(&config));

    transport::serve(listener, router).await?;
    Ok(())
}
