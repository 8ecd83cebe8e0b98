//! oxide-alter CLI
//!
//! Command-line tool for dropping, renaming and redefining SQLite columns.

use std::process::ExitCode;
use std::str::FromStr;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use sqlx::sqlite::SqliteConnectOptions;
use tracing::{error, Level};
use tracing_subscriber::FmtSubscriber;

use oxide_alter::prelude::*;

/// Drop, rename and redefine SQLite columns.
#[derive(Parser)]
#[command(name = "oxide-alter")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database file path or `sqlite:` URL.
    #[arg(short, long, env = "DATABASE_URL")]
    database: String,

    /// Table to alter.
    table: String,

    /// Keep the original table as `<table>_initial`.
    #[arg(short, long, global = true)]
    safe: bool,

    /// Print the SQL that would run without executing it.
    #[arg(long, global = true)]
    dry_run: bool,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    format: OutputFormat,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Drop a column and its data.
    DropColumn {
        /// Column to drop.
        column: String,
    },

    /// Rename a column.
    RenameColumn {
        /// Current column name.
        old_name: String,
        /// New column name.
        new_name: String,
    },

    /// Replace the type and constraints of a column.
    ReplaceDefinition {
        /// Column to redefine.
        column: String,
        /// New definition; remaining words are joined with spaces, so global
        /// flags such as `--safe` go before the command.
        #[arg(required = true, num_args = 1.., trailing_var_arg = true, allow_hyphen_values = true)]
        definition: Vec<String>,
    },

    /// Show the fields parsed from the table's creation SQL.
    Show,

    /// Drop a `<table>_tmp` shadow table left behind by an interrupted run.
    Cleanup,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("Failed to install the log subscriber");
    }

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            error!("{err:#}");
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let options = connect_options(&cli.database)?;
    let mut mutator = SchemaMutator::connect_with(&options, &cli.table).await?;

    let operation = match cli.command {
        Commands::DropColumn { column } => ColumnOperation::drop_column(column),
        Commands::RenameColumn { old_name, new_name } => {
            ColumnOperation::rename_column(old_name, new_name)
        }
        Commands::ReplaceDefinition { column, definition } => {
            ColumnOperation::replace_definition(column, definition.join(" "))
        }
        Commands::Show => {
            match cli.format {
                OutputFormat::Text => {
                    for field in mutator.fields() {
                        println!("{field}");
                    }
                }
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(mutator.fields())?);
                }
            }
            return Ok(ExitCode::SUCCESS);
        }
        Commands::Cleanup => {
            let message = if mutator.discard_orphaned_shadow().await? {
                format!("Dropped orphaned table '{}_tmp'.", mutator.table())
            } else {
                format!("No orphaned table for '{}'.", mutator.table())
            };
            println!("{message}");
            return Ok(ExitCode::SUCCESS);
        }
    };

    if cli.dry_run {
        return match mutator.sql_for(&operation, cli.safe) {
            Ok(statements) => {
                for sql in statements {
                    println!("{sql};");
                }
                Ok(ExitCode::SUCCESS)
            }
            Err(rejection) => {
                println!("{rejection}");
                Ok(ExitCode::from(1))
            }
        };
    }

    let outcome = mutator.apply(&operation, cli.safe).await?;
    match cli.format {
        OutputFormat::Text => println!("{}", outcome.message()),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&outcome)?),
    }

    Ok(if outcome.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

fn connect_options(database: &str) -> anyhow::Result<SqliteConnectOptions> {
    let options = if database.starts_with("sqlite:") {
        SqliteConnectOptions::from_str(database)
            .with_context(|| format!("Invalid database URL: {database}"))?
    } else {
        SqliteConnectOptions::new().filename(database)
    };
    Ok(options.create_if_missing(false))
}
