//! Lapse CLI
//!
//! Present a set of choices with a deadline, live or on virtual time.

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;
mod interactive;
mod simulate;

use config::{LapseConfig, CONFIG_FILE};
use simulate::Step;

#[derive(Parser)]
#[command(name = "lapse")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Choice selection with a deadline", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Present the choices and wait for a selection on stdin
    Run {
        #[command(flatten)]
        selector: SelectorArgs,
    },

    /// Replay a scripted scenario on virtual time and print a JSON report
    Simulate {
        #[command(flatten)]
        selector: SelectorArgs,

        /// Step to replay: advance:<ms>, select:<choice> or teardown
        #[arg(short, long = "step", required = true)]
        steps: Vec<Step>,

        /// Pretty-print the report
        #[arg(long)]
        pretty: bool,
    },

    /// Write a default lapse.toml in the current directory
    Init {
        /// Overwrite an existing lapse.toml
        #[arg(short, long)]
        force: bool,
    },

    /// Show version and configuration status
    Info,
}

#[derive(Args)]
struct SelectorArgs {
    /// Configuration file (defaults to ./lapse.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Comma-separated choices, overriding the configuration
    #[arg(long, value_delimiter = ',')]
    choices: Option<Vec<String>>,

    /// Deadline in milliseconds, overriding the configuration
    #[arg(short, long)]
    deadline_ms: Option<u64>,
}

impl SelectorArgs {
    fn load(self) -> Result<LapseConfig> {
        let config = match &self.config {
            Some(path) => LapseConfig::load(path)?,
            None => LapseConfig::load_from_dir(Path::new("."))?,
        };
        let config = config.with_overrides(self.choices, self.deadline_ms);
        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();

    match cli.command {
        Commands::Run { selector } => cmd_run(selector),
        Commands::Simulate {
            selector,
            steps,
            pretty,
        } => cmd_simulate(selector, &steps, pretty),
        Commands::Init { force } => cmd_init(force),
        Commands::Info => cmd_info(),
    }
}

fn cmd_run(args: SelectorArgs) -> Result<()> {
    let config = args.load()?;
    info!(
        "Running selector with {} choices, deadline {} ms",
        config.selector.choices.len(),
        config.selector.deadline_ms
    );

    let input = BufReader::new(io::stdin());
    let mut out = io::stdout();
    let end = interactive::run_session(&config, input, &mut out)?;

    info!("Session ended: {}", end);
    Ok(())
}

fn cmd_simulate(args: SelectorArgs, steps: &[Step], pretty: bool) -> Result<()> {
    let config = args.load()?;
    let report = simulate::simulate(&config, steps)?;

    let json = if pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{}", json);

    Ok(())
}

fn cmd_init(force: bool) -> Result<()> {
    let cwd = std::env::current_dir()?;
    let path = LapseConfig::write_default(&cwd, force)?;
    info!("Wrote {}", path.display());

    Ok(())
}

fn cmd_info() -> Result<()> {
    println!("Lapse");
    println!("=====");
    println!();
    println!("Version: {}", env!("CARGO_PKG_VERSION"));
    println!();

    let cwd = std::env::current_dir()?;
    let found = cwd.join(CONFIG_FILE).exists();
    let config = LapseConfig::load_from_dir(&cwd)?;

    println!("Configuration:");
    println!(
        "  {:<14} {}",
        CONFIG_FILE,
        if found { "found" } else { "not found (defaults)" }
    );
    println!("  {:<14} {}", "choices", config.selector.choices.join(", "));
    println!("  {:<14} {} ms", "deadline", config.selector.deadline_ms);
    println!("  {:<14} {} ms", "resolution", config.timer.resolution_ms);

    match config.validate() {
        Ok(()) => println!("  {:<14} ok", "status"),
        Err(e) => println!("  {:<14} invalid: {}", "status", e),
    }

    Ok(())
}
