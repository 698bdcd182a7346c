//! Quarry CLI
//!
//! Command-line tools for Quarry database files.
//!
//! # Commands
//!
//! - `exec` - Execute SQL statements and print the result sets
//! - `inspect` - List tables with their columns and row counts
//! - `verify` - Verify database integrity
//! - `version` - Show version information

mod commands;

use clap::{Parser, Subcommand};
use std::io::{self, Read};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Quarry command-line database tools.
#[derive(Parser)]
#[command(name = "quarry")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the database file
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute SQL statements
    Exec {
        /// Statements to run; read from standard input when omitted
        sql: Option<String>,

        /// Read the statements from a file
        #[arg(short, long, conflicts_with = "sql")]
        file: Option<PathBuf>,

        /// Positional argument bound to $1, $2, ... (repeatable)
        #[arg(short, long = "arg")]
        args: Vec<String>,

        /// Print a header line with the field names
        #[arg(long)]
        header: bool,

        /// Output format (text, json)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// List tables with their columns and row counts
    Inspect {
        /// Output format (text, json)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Verify database integrity
    Verify,

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let mut out = io::stdout().lock();
    match cli.command {
        Commands::Exec {
            sql,
            file,
            args,
            header,
            format,
        } => {
            let path = cli.path.ok_or("Database path required for exec")?;
            let sql = match (sql, file) {
                (Some(sql), _) => sql,
                (None, Some(file)) => std::fs::read_to_string(file)?,
                (None, None) => {
                    let mut sql = String::new();
                    io::stdin().read_to_string(&mut sql)?;
                    sql
                }
            };
            let format = format.parse()?;
            commands::exec::run(&path, &sql, &args, header, format, &mut out)?;
        }
        Commands::Inspect { format } => {
            let path = cli.path.ok_or("Database path required for inspect")?;
            commands::inspect::run(&path, format.parse()?, &mut out)?;
        }
        Commands::Verify => {
            let path = cli.path.ok_or("Database path required for verify")?;
            commands::verify::run(&path, &mut out)?;
        }
        Commands::Version => {
            println!("Quarry CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Quarry Core v{}", quarry_core::VERSION);
        }
    }

    Ok(())
}
