pub mod commands;

use std::process::ExitCode;

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use loomline_core::config::{AppConfig, LoadOptions, LogFormat};
use tracing::Level;

use commands::{lead, price, quote};

#[derive(Debug, Parser)]
#[command(
    name = "loomline",
    about = "Loomline textile sales CLI",
    long_about = "Price fabrics, capture leads, and drive quotes through their revision chain.",
    after_help = "Examples:\n  loomline seed\n  loomline price --item cotton-poplin --quantity 750 \
                  --model sales\n  loomline quote generate --lead LEAD-DEMO-001"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Apply pending database migrations")]
    Migrate,
    #[command(about = "Load the deterministic demo catalog and sales pipeline")]
    Seed,
    #[command(about = "Price one line against the stored tier schedule")]
    Price(price::PriceArgs),
    #[command(about = "Capture leads and move them through the lifecycle")]
    Lead {
        #[command(subcommand)]
        command: LeadCommand,
    },
    #[command(about = "Generate, revise, and track quotes")]
    Quote {
        #[command(subcommand)]
        command: QuoteCommand,
    },
}

#[derive(Debug, Subcommand)]
enum LeadCommand {
    #[command(about = "Capture a new lead with its requested items")]
    Create(lead::CreateArgs),
    #[command(about = "List the lifecycle actions available from the lead's status")]
    Actions(lead::ActionsArgs),
    #[command(about = "Move a lead to another status")]
    Transition(lead::TransitionArgs),
}

#[derive(Debug, Subcommand)]
enum QuoteCommand {
    #[command(about = "Generate the original quote for a lead")]
    Generate(quote::GenerateArgs),
    #[command(about = "Create a revision of a quote")]
    Revise(quote::ReviseArgs),
    #[command(about = "Record the customer's response to a quote")]
    Mark(quote::MarkArgs),
    #[command(about = "Show what changed between two quotes of one chain")]
    Diff(quote::DiffArgs),
    #[command(about = "Recompute a quote's totals under the quote or invoice tax scheme")]
    Summary(quote::SummaryArgs),
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    if let Err(error) = init_logging() {
        eprintln!("logging disabled: {error:#}");
    }

    let result = match cli.command {
        Command::Config => commands::config::run(),
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Price(args) => price::run(&args),
        Command::Lead { command } => match command {
            LeadCommand::Create(args) => lead::create(&args),
            LeadCommand::Actions(args) => lead::actions(&args),
            LeadCommand::Transition(args) => lead::transition(&args),
        },
        Command::Quote { command } => match command {
            QuoteCommand::Generate(args) => quote::generate(&args),
            QuoteCommand::Revise(args) => quote::revise(&args),
            QuoteCommand::Mark(args) => quote::mark(&args),
            QuoteCommand::Diff(args) => quote::diff(&args),
            QuoteCommand::Summary(args) => quote::summary(&args),
        },
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

/// Logs go to stderr so stdout carries nothing but the command envelope.
fn init_logging() -> anyhow::Result<()> {
    let config = AppConfig::load(LoadOptions::default()).context("loading logging config")?;
    let level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(level)
        .with_writer(std::io::stderr);
    let installed = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };

    installed.map_err(|error| anyhow!(error))
}
