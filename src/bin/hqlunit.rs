//! HQL unit test runner
//!
//! CLI tool for running SQL unit tests against an external query engine,
//! either for a whole repository or for a single ad-hoc case.
//!
//! Usage:
//!   hqlunit repo path/to/repo --engine-config engine.yaml
//!   hqlunit run --root /tmp/case1 --engine-command "hive -S" --query-file q.hql --test-query-file t.hql

#[path = "hqlunit/commands.rs"]
mod commands;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "hqlunit")]
#[command(about = "Unit tests for Hive-style SQL repositories")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Engine configuration YAML file
    #[arg(long, global = true)]
    engine_config: Option<PathBuf>,

    /// Engine command line, e.g. "hive -S"
    #[arg(long, global = true, conflicts_with = "engine_config")]
    engine_command: Option<String>,

    /// Output format: text, json, junit
    #[arg(short, long, global = true, default_value = "text")]
    output: String,

    /// Write the report to this file instead of stdout
    #[arg(long, global = true)]
    report_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every test case of a repository
    Repo {
        /// Repository root containing the test/ directory
        root: PathBuf,
    },

    /// Run a single test case
    Run(RunArgs),
}

/// Flags of a single-case run
#[derive(Args)]
struct RunArgs {
    /// Case name
    #[arg(short, long)]
    name: Option<String>,

    /// Working directory of the case, must not exist
    #[arg(short, long)]
    root: PathBuf,

    /// Root for relative table definition scripts
    #[arg(short = 'd', long)]
    table_definitions_root: Option<PathBuf>,

    /// Directory receiving the case output file
    #[arg(short = 'g', long)]
    log_dir: Option<PathBuf>,

    /// File containing the query under test
    #[arg(short = 'Q', long)]
    query_file: Option<PathBuf>,

    /// Query under test
    #[arg(short = 'q', long)]
    query: Option<String>,

    /// File containing the validation query
    #[arg(short = 'T', long)]
    test_query_file: Option<PathBuf>,

    /// Validation query
    #[arg(short = 't', long)]
    test_query: Option<String>,

    /// Setup script file (repeatable)
    #[arg(short = 'S', long)]
    setup_file: Vec<PathBuf>,

    /// Setup script (repeatable)
    #[arg(short = 's', long)]
    setup_query: Vec<String>,

    /// Component descriptor file (repeatable)
    #[arg(short = 'L', long)]
    component_file: Vec<PathBuf>,

    /// Component descriptor line (repeatable)
    #[arg(short = 'l', long)]
    component_query: Vec<String>,

    /// Parameter file (repeatable)
    #[arg(short = 'P', long)]
    param_file: Vec<PathBuf>,

    /// Parameter block (repeatable)
    #[arg(short = 'p', long)]
    param_query: Vec<String>,
}

/// Build information constants
const VERSION: &str = env!("CARGO_PKG_VERSION");
const BUILD_TIME: &str = env!("BUILD_TIME");
const GIT_HASH: &str = env!("GIT_HASH");
const GIT_BRANCH: &str = env!("GIT_BRANCH");

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    log::info!(
        "hqlunit v{} ({} @ {}) built {}",
        VERSION,
        GIT_HASH,
        GIT_BRANCH,
        BUILD_TIME
    );

    let shared = commands::SharedOptions {
        engine_config: cli.engine_config,
        engine_command: cli.engine_command,
        output: cli.output,
        report_file: cli.report_file,
    };

    let code = match cli.command {
        Commands::Repo { root } => commands::repo(root, shared).await,
        Commands::Run(args) => {
            let options = hqlunit::test_harness::cli::CaseOptions {
                name: args.name,
                root: args.root,
                table_definitions_root: args.table_definitions_root,
                log_dir: args.log_dir,
                query_file: args.query_file,
                query: args.query,
                test_query_file: args.test_query_file,
                test_query: args.test_query,
                setup_files: args.setup_file,
                setup_queries: args.setup_query,
                component_files: args.component_file,
                component_queries: args.component_query,
                param_files: args.param_file,
                param_queries: args.param_query,
            };
            commands::run(options, shared).await
        }
    };

    std::process::exit(code);
}
