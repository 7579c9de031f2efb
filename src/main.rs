use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use testrs::cli::{self, CollectArgs};
use testrs::db;

/// testrs — Collect Surefire/JUnit test reports into per-source test measures.
#[derive(Parser)]
#[command(name = "testrs", version, about)]
struct Cli {
    /// Path to the SQLite database (default: ./.testrs.db)
    #[arg(long, global = true, default_value = ".testrs.db")]
    db: PathBuf,

    /// Log parsing and merge decisions to stderr.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect a directory of TEST-*.xml / TESTS-*.xml reports into a new run.
    Collect {
        /// Directory holding the reports.
        reports_dir: PathBuf,

        /// Source root used to map test classes to source files.
        #[arg(long, default_value = ".")]
        sources: PathBuf,

        /// Source file extensions to try, in order.
        #[arg(long = "ext", default_values_t = vec!["js".to_string()])]
        extensions: Vec<String>,

        /// Name for this run (default: timestamp).
        #[arg(long)]
        name: Option<String>,

        /// Also store the per-test detail of every resource.
        #[arg(long)]
        details: bool,
    },

    /// List all runs in the database.
    Runs,

    /// Show the numeric measures of a run.
    Measures {
        /// Run name. If omitted, uses the most recent.
        #[arg(long)]
        run: Option<String>,

        /// Only show this resource.
        #[arg(long)]
        resource: Option<String>,
    },

    /// Show the per-test detail stored for a resource.
    Details {
        /// Resource path, as shown by `measures`.
        resource: String,

        /// Run name. If omitted, uses the most recent.
        #[arg(long)]
        run: Option<String>,
    },

    /// Delete a run from the database.
    Delete {
        /// Run name to delete.
        name: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut conn = db::open(&cli.db).context("Failed to open database")?;
    db::init_schema(&conn).context("Failed to initialize schema")?;

    let out = match cli.command {
        Commands::Collect {
            reports_dir,
            sources,
            extensions,
            name,
            details,
        } => cli::cmd_collect(
            &mut conn,
            &CollectArgs {
                reports_dir: &reports_dir,
                sources: &sources,
                extensions: &extensions,
                name: name.as_deref(),
                details,
            },
        )?,
        Commands::Runs => cli::cmd_runs(&conn)?,
        Commands::Measures { run, resource } => {
            cli::cmd_measures(&conn, run.as_deref(), resource.as_deref())?
        }
        Commands::Details { resource, run } => cli::cmd_details(&conn, &resource, run.as_deref())?,
        Commands::Delete { name } => cli::cmd_delete(&conn, &name)?,
    };
    print!("{out}");
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "testrs=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
}
