//! jobforge CLI tool.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "jobforge")]
#[command(about = "Generate Jenkins jobs from YAML definitions", long_about = None)]
struct Cli {
    /// Settings file (KDL)
    #[arg(long, env = "JOBFORGE_CONF", global = true)]
    conf: Option<PathBuf>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Jenkins user
    #[arg(long, env = "JOBFORGE_USER", global = true)]
    user: Option<String>,

    /// Jenkins password or API token
    #[arg(long, env = "JOBFORGE_PASSWORD", global = true, hide_env_values = true)]
    password: Option<String>,

    /// Upload every job, ignoring the cache
    #[arg(long, global = true)]
    ignore_cache: bool,

    /// Start from an empty cache
    #[arg(long, global = true)]
    flush_cache: bool,

    /// Render unbound placeholders as empty strings
    #[arg(long, global = true)]
    allow_empty_variables: bool,

    /// Look for YAML files in subdirectories
    #[arg(short, long, global = true)]
    recursive: bool,

    /// Patterns of paths to skip when searching directories
    #[arg(short = 'x', long, global = true)]
    exclude: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Expand definitions and print the generated XML
    Test {
        /// YAML files or directories
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Write one file per job into this directory
        #[arg(short)]
        output: Option<PathBuf>,
        /// Print the realized jobs as YAML instead of XML
        #[arg(long)]
        yaml: bool,
        /// Only jobs matching these globs
        #[arg(short = 'n', long = "name")]
        names: Vec<String>,
    },
    /// Upload changed jobs to Jenkins
    Update {
        /// YAML files or directories
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Only jobs matching these globs
        #[arg(short = 'n', long = "name")]
        names: Vec<String>,
        /// Delete managed jobs that are no longer defined
        #[arg(long)]
        delete_old: bool,
        /// Concurrent uploads, 0 for one per CPU
        #[arg(long, default_value = "1")]
        workers: usize,
    },
    /// Delete jobs from Jenkins
    Delete {
        /// Job names, or globs when paths are given
        #[arg(required = true)]
        names: Vec<String>,
        /// Match names against the jobs defined in these paths
        #[arg(short = 'p', long = "path")]
        paths: Vec<PathBuf>,
    },
    /// Delete every job from Jenkins
    DeleteAll {
        /// Do not ask for confirmation
        #[arg(long)]
        yes: bool,
    },
    /// List job names
    List {
        /// List jobs defined in these paths instead of those on Jenkins
        #[arg(short = 'p', long = "path")]
        paths: Vec<PathBuf>,
        /// Only jobs matching these globs
        globs: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let options = commands::GlobalOptions {
        conf: cli.conf,
        user: cli.user,
        password: cli.password,
        ignore_cache: cli.ignore_cache,
        flush_cache: cli.flush_cache,
        allow_empty_variables: cli.allow_empty_variables,
        recursive: cli.recursive,
        exclude: cli.exclude,
    };
    let settings = commands::load_settings(&options)?;

    match cli.command {
        Commands::Test {
            paths,
            output,
            yaml,
            names,
        } => {
            commands::test::run(&settings, &paths, &names, output.as_deref(), yaml)?;
        }
        Commands::Update {
            paths,
            names,
            delete_old,
            workers,
        } => {
            commands::update::run(&settings, &options, &paths, &names, delete_old, workers).await?;
        }
        Commands::Delete { names, paths } => {
            commands::delete::delete(&settings, &options, &names, &paths).await?;
        }
        Commands::DeleteAll { yes } => {
            commands::delete::delete_all(&settings, &options, yes).await?;
        }
        Commands::List { paths, globs } => {
            commands::list::run(&settings, &paths, &globs).await?;
        }
    }

    Ok(())
}
