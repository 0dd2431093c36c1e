mod main_runtime;

use anyhow::Context;
use clap::Parser;
use orderwatch::cli::{Cli, Commands};
use orderwatch::config::AppConfig;
use orderwatch::services::{self, RunOptions, TriggerServer};
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match AppConfig::load_from(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            main_runtime::init_logging_simple();
            error!("Failed to load configuration from {}: {}", cli.config, e);
            return Err(e).context("configuration");
        }
    };
    if let Some(days) = cli.threshold_days {
        config.check.fulfillment_day_threshold = days;
        config.validate().context("configuration")?;
    }

    main_runtime::init_logging(&config.logging);
    let options = RunOptions {
        dry_run: cli.dry_run,
    };

    match cli.command() {
        Commands::Run => {
            info!("Starting single check cycle");
            let report = services::run_once(&config, options)
                .await
                .context("initialization failed")?;
            println!("{}", serde_json::to_string(&report.status())?);
        }
        Commands::Serve { port } => {
            let runner = services::init(&config, options)
                .await
                .context("initialization failed")?;
            let server = TriggerServer::new(runner, port.unwrap_or(config.server.port));
            server.run().await?;
        }
        Commands::CheckConfig => {
            println!("Configuration OK");
            println!(
                "  threshold: {} days",
                config.check.fulfillment_day_threshold
            );
            println!("  secrets: {:?}", config.secrets.provider);
            println!(
                "  ledger: {}",
                if config.ledger.enabled {
                    format!(
                        "gs://{}/{}",
                        config.ledger.bucket_name.as_deref().unwrap_or_default(),
                        config.ledger.object_name
                    )
                } else {
                    "disabled".to_string()
                }
            );
            println!(
                "  notify: {:?} ({:?}) -> {}",
                config.notify.channel,
                config.notify.mode,
                config.notify.recipients().join(", ")
            );
        }
    }

    Ok(())
}
