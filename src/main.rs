use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use depcheck::commands::common::BatchArgs;
use depcheck::commands::registry::RegistryArgs;
use depcheck::commands::{batch, check, clean, registry};
use depcheck::config::Config;
use depcheck::logging;

#[derive(Parser)]
#[command(name = "depcheck")]
#[command(about = "Check third-party crates for toolchain compatibility", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to a depcheck.toml configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging (overridden by DEPCHECK_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a single dependency
    Check {
        /// Name of the dependency to check
        name: String,

        /// Version of the dependency to check
        #[arg(value_name = "VERSION")]
        dep_version: String,

        /// Git repository to pull the dependency from instead of the registry
        #[arg(short, long)]
        repo: Option<String>,
    },

    /// Check every dependency listed in a TOML task file
    Batch {
        /// Task file with [[task]] entries (name, version, optional source)
        tasks: PathBuf,

        /// Number of parallel workers (default: 8)
        #[arg(short = 'j', long)]
        concurrency: Option<usize>,

        /// Report file to write (default: assessments.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check crates from the registry listing, most downloaded first
    Registry {
        /// Stop after this many listing pages
        #[arg(long)]
        pages: Option<u32>,

        /// Crates per listing page
        #[arg(long)]
        per_page: Option<u32>,

        /// Skip crates with fewer downloads than this
        #[arg(long)]
        min_downloads: Option<u64>,

        /// Pin each dependency to its listed repository instead of the registry release
        #[arg(long)]
        git: bool,

        /// Number of parallel workers (default: 8)
        #[arg(short = 'j', long)]
        concurrency: Option<usize>,

        /// Report file to write (default: assessments.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Remove workspaces left behind by a killed run
    Clean,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {e:#}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Check {
            name,
            dep_version,
            repo,
        } => check::execute(&config, name, dep_version, repo),
        Commands::Batch {
            tasks,
            concurrency,
            output,
        } => batch::execute(
            config,
            &tasks,
            &BatchArgs {
                concurrency,
                report: output,
            },
        ),
        Commands::Registry {
            pages,
            per_page,
            min_downloads,
            git,
            concurrency,
            output,
        } => registry::execute(
            config,
            &BatchArgs {
                concurrency,
                report: output,
            },
            &RegistryArgs {
                pages,
                per_page,
                min_downloads,
                use_repository_source: git,
            },
        ),
        Commands::Clean => clean::execute(&config).map(|()| ExitCode::SUCCESS),
    }
}
