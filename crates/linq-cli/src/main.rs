use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use linq_cli::commands::{self, symbols, translate};
use linq_cli::config::Config;

/// Translator for the linq `@symbol` notation
#[derive(Parser)]
#[command(name = "linqc")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, env = "LINQC_CONFIG")]
    pub config: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Rewrite `@symbol` references and declare the symbols
    Translate(translate::TranslateArgs),
    /// List the distinct symbols referenced by the inputs
    Symbols(symbols::SymbolsArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "linqc=debug,linq_cli=debug".into())
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "linqc=warn,linq_cli=warn".into())
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cfg = Config::load(cli.config.as_deref())?;
    tracing::debug!(module = %cfg.module, crate_path = %cfg.crate_path, "configuration");

    let output = commands::OutputContext {
        json: cli.json,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Translate(args) => translate::execute(args, &cfg, &output),
        Commands::Symbols(args) => symbols::execute(args, &cfg, &output),
    }
}
