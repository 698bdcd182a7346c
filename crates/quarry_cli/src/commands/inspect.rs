//! Inspect command implementation.

use super::{CliError, Format};
use quarry_core::Database;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

/// Database inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Database path.
    pub path: String,
    /// File size in bytes.
    pub file_size: u64,
    /// Tables in name order.
    pub tables: Vec<TableInfo>,
}

/// Description of a single table.
#[derive(Debug, Serialize)]
pub struct TableInfo {
    /// Table name.
    pub name: String,
    /// Visible column names.
    pub columns: Vec<String>,
    /// Number of rows.
    pub rows: i64,
}

/// Runs the inspect command.
pub fn run(path: &Path, format: Format, out: &mut impl Write) -> Result<(), CliError> {
    let file_size = std::fs::metadata(path)?.len();
    let db = Database::open(path)?;

    let mut tables = Vec::new();
    for name in db.table_names(None)? {
        let rs = db.run(None, &format!("SELECT * FROM {name}"), &[])?;
        let columns = rs[0].fields()?;
        let counted = db.run(None, &format!("SELECT count(*) FROM {name}"), &[])?;
        let rows = counted[0]
            .first_row()?
            .and_then(|row| row.first().and_then(|v| v.as_int()))
            .unwrap_or(0);
        tables.push(TableInfo {
            name,
            columns,
            rows,
        });
    }
    db.close()?;

    let result = InspectResult {
        path: path.display().to_string(),
        file_size,
        tables,
    };
    match format {
        Format::Json => {
            serde_json::to_writer_pretty(&mut *out, &result)?;
            writeln!(out)?;
        }
        Format::Text => print_text_output(&result, out)?,
    }
    Ok(())
}

fn print_text_output(result: &InspectResult, out: &mut impl Write) -> Result<(), CliError> {
    writeln!(out, "Quarry Database Inspection")?;
    writeln!(out, "==========================")?;
    writeln!(out)?;
    writeln!(out, "Path: {}", result.path)?;
    writeln!(out, "Size: {}", format_size(result.file_size))?;
    writeln!(out)?;
    writeln!(out, "Tables: {}", result.tables.len())?;
    for table in &result.tables {
        writeln!(
            out,
            "  {} ({}) {} rows",
            table.name,
            table.columns.join(", "),
            table.rows
        )?;
    }
    Ok(())
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} bytes", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
