//! bargain CLI binary

use anyhow::Result;
use bargain::cli::{BargainApp, Cli, Commands};
use bargain::config::BargainConfig;
use bargain::format::format_price;
use bargain::policy::decide;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    let config = BargainConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Run { port, connect } => {
            let app = BargainApp::new(config);
            if let Some(addr) = connect {
                app.connect(&addr).await?;
            } else {
                app.listen(port).await?;
            }
        }

        Commands::Check { offered, asking } => {
            let verdict = decide(offered, asking, &config.thresholds());
            println!(
                "Price: {} - Offered: {} -> {:?}",
                format_price(asking),
                format_price(offered),
                verdict
            );
        }
    }

    Ok(())
}
