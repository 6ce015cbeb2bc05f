use anyhow::Result;
use clap::Parser;
use s3bench::cli::{self, Cli};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so tables and JSON on stdout stay clean
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = cli.load_config()?;

    // Choose runtime based on mode:
    // - sequential only: one request in flight, current_thread is enough
    // - concurrent: workers need real parallelism
    let runtime = if config.mode.concurrent() {
        tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?
    } else {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?
    };

    let format = cli.format;
    let show_progress = cli.show_progress();
    runtime.block_on(cli::run(config, format, show_progress))?;

    Ok(())
}
