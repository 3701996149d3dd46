//! halfscan - half-open TCP SYN and UDP port state scanner.

use anyhow::Context;
use clap::Parser;
use halfscan::cli::{self, Args};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = if args.verbose { "halfscan=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr)
        .init();

    let target = args.target.clone();
    cli::run(args)
        .await
        .with_context(|| format!("scan of {} failed", target))
}
