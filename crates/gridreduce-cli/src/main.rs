//! gridreduce CLI - Run and verify barrier-free grid reductions on the CPU
//! SIMT emulator.
//!
//! # Commands
//!
//! - `gridreduce run` - Run one grid reduction and check it against a sequential fold
//! - `gridreduce sweep` - Run grids of 1..=N teams and verify each result
//! - `gridreduce completions <shell>` - Generate shell completions
//!
//! # Examples
//!
//! ```bash
//! # Five single-thread teams through a two-slot staging buffer
//! gridreduce run --teams 5 --threads 1 --records 2 --value 1
//!
//! # Max over global thread ids, JSON report
//! gridreduce run --teams 300 --threads 128 --op max --pattern index --format json
//!
//! # Verify every grid size up to 64 teams with a 4-slot buffer
//! gridreduce sweep --max-teams 64 --records 4 --threads 96
//!
//! # Same sweep with every thread contributing 3
//! gridreduce sweep --max-teams 64 --records 4 --pattern constant --value 3
//! ```

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod error;

use commands::{parse_mode, parse_op, run, sweep, OutputFormat, ValuePattern};
use config::{FileConfig, GridOverrides};
use gridreduce::{ExecutionMode, ReductionOp};

/// gridreduce CLI - barrier-free grid reductions
#[derive(Parser)]
#[command(name = "gridreduce")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Grid shape and reduction flags shared by `run` and `sweep`.
#[derive(Args)]
struct GridArgs {
    /// Threads per team
    #[arg(short = 'n', long)]
    threads: Option<u32>,

    /// Staging buffer slots (concurrently admitted teams)
    #[arg(short, long)]
    records: Option<u32>,

    /// Warp width (power of two)
    #[arg(short, long)]
    warp_size: Option<u32>,

    /// Execution mode (spmd, generic)
    #[arg(short, long, value_parser = parse_mode)]
    mode: Option<ExecutionMode>,

    /// Resident team workers (default: available parallelism)
    #[arg(long)]
    workers: Option<usize>,

    /// Admission spin limit, 0 to spin forever
    #[arg(long)]
    spin_limit: Option<u64>,

    /// Reduction operator (sum, product, min, max, and, or, xor)
    #[arg(short, long, default_value = "sum", value_parser = parse_op)]
    op: ReductionOp,

    /// Base value contributed by each thread
    #[arg(long, default_value = "1", allow_negative_numbers = true)]
    value: i64,

    /// TOML configuration file with [reduction] and [launch] tables
    #[arg(short, long)]
    config: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,
}

impl GridArgs {
    fn load(&self, teams: Option<u32>) -> error::CliResult<FileConfig> {
        let file = FileConfig::load(self.config.as_deref())?;
        let overrides = GridOverrides {
            teams,
            threads: self.threads,
            records: self.records,
            warp_size: self.warp_size,
            mode: self.mode,
            workers: self.workers,
            spin_limit: self.spin_limit,
        };
        Ok(overrides.apply(file))
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run one grid reduction
    Run {
        /// Teams in the grid
        #[arg(short, long)]
        teams: Option<u32>,

        /// Per-thread contribution pattern
        #[arg(short, long, value_enum, default_value = "constant")]
        pattern: ValuePattern,

        #[command(flatten)]
        grid: GridArgs,
    },

    /// Run grids of 1..=max-teams teams and verify each result
    Sweep {
        /// Largest grid to run
        #[arg(long, default_value = "64")]
        max_teams: u32,

        /// Per-thread contribution pattern
        #[arg(short, long, value_enum, default_value = "index")]
        pattern: ValuePattern,

        #[command(flatten)]
        grid: GridArgs,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

fn setup_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

fn print_banner() {
    eprintln!(
        "  {} {}\n",
        "gridreduce - barrier-free grid reductions".bright_cyan(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let result = match cli.command {
        Commands::Run {
            teams,
            pattern,
            grid,
        } => {
            if !cli.quiet && grid.format == OutputFormat::Text {
                print_banner();
            }
            match grid.load(teams) {
                Ok(config) => run::execute(config, grid.op, grid.value, pattern, grid.format).await,
                Err(e) => Err(e),
            }
        }

        Commands::Sweep {
            max_teams,
            pattern,
            grid,
        } => {
            if !cli.quiet && grid.format == OutputFormat::Text {
                print_banner();
            }
            match grid.load(None) {
                Ok(config) => {
                    sweep::execute(config, max_teams, grid.op, grid.value, pattern, grid.format)
                }
                Err(e) => Err(e),
            }
        }

        Commands::Completions { shell } => {
            use clap::CommandFactory;
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "gridreduce",
                &mut std::io::stdout(),
            );
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
