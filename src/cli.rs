use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "orderwatch")]
#[command(version = "0.1.0")]
#[command(
    about = "Alerts once per order when an order stays unfulfilled past its SLA",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Directory holding default.toml and {ORDERWATCH_ENV}.toml
    #[arg(short, long, env = "ORDERWATCH_CONFIG_DIR", default_value = "config")]
    pub config: String,

    /// Log alerts instead of sending them and leave the ledger untouched
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Override check.fulfillment_day_threshold
    #[arg(long, global = true)]
    pub threshold_days: Option<u32>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Run a single check cycle and exit (default)
    Run,
    /// Serve an HTTP trigger that runs one cycle per request
    Serve {
        /// Port to listen on (defaults to server.port)
        #[arg(short, long, env = "PORT")]
        port: Option<u16>,
    },
    /// Load and validate configuration, then print a summary
    CheckConfig,
}

impl Cli {
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Run)
    }
}
