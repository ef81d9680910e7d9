use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use prchecklist::checklist::config::CONFIG_FILE;

mod cmd;

#[derive(Parser)]
#[command(name = "prchecklist")]
#[command(version, about = "Review checklists for release pull requests")]
pub struct Cli {
    /// Verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the web server
    Serve(cmd::serve::ServeArgs),
    /// Work with prchecklist.yml files
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Parse a checklist config and report problems
    Validate {
        /// Path to the config file
        #[arg(default_value = CONFIG_FILE)]
        file: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

fn init_tracing(verbose: bool, format: LogFormat) {
    let filter = if verbose {
        "prchecklist=debug,tower_http=debug"
    } else {
        "prchecklist=info,tower_http=info"
    };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.with_target(false).init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine; variables may come from the environment.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_format);

    match cli.command {
        Commands::Serve(args) => cmd::cmd_serve(args).await,
        Commands::Config { command } => cmd::cmd_config(command),
    }
}
