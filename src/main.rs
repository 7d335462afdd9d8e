// Copyright 2026 Pricestream Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use clap::Parser;
use pricestream::config::Config;
use pricestream::publisher::RedisPublisher;
use pricestream::session::chromium::ChromiumSessionDriver;
use pricestream::stream::{PriceStream, ShutdownSignal};
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser)]
#[command(
    name = "pricestream",
    about = "Pricestream — streams live terminal quotes to Redis pub/sub",
    version
)]
struct Cli {
    /// Enable verbose/debug logging
    #[arg(long, short)]
    verbose: bool,

    /// Suppress non-essential output
    #[arg(long, short)]
    quiet: bool,

    /// Run the browser with a visible window (login debugging)
    #[arg(long)]
    headful: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let directive = if cli.verbose {
        "pricestream=debug"
    } else if cli.quiet {
        "pricestream=warn"
    } else {
        "pricestream=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(directive.parse().unwrap()),
        )
        .init();

    if let Err(e) = run(cli).await {
        // Single final fatal log before the non-zero exit.
        error!("fatal: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    info!("starting pricestream v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::from_env()?;
    if cli.headful {
        config.headless = false;
    }

    let publisher = Arc::new(RedisPublisher::connect(&config.redis).await?);
    let driver = Arc::new(ChromiumSessionDriver::new(&config));
    let stream = PriceStream::new(driver, publisher, config.backoff, config.channel.clone());

    let shutdown = ShutdownSignal::new();
    let signal = Arc::clone(&shutdown);
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("received shutdown signal");
        signal.trigger();
    });

    stream.run(&shutdown).await?;
    info!("pricestream stopped");
    Ok(())
}
