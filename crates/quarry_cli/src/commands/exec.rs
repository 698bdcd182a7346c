//! Exec command implementation.

use super::{parse_arg, to_json, CliError, Format};
use quarry_core::{compile, Database, Recordset, TxCtx, Value};
use serde::Serialize;
use std::io::Write;
use std::path::Path;

/// One result set in JSON output.
#[derive(Debug, Serialize)]
pub struct RecordsetOutput {
    /// Field names.
    pub fields: Vec<String>,
    /// Rows in stream order.
    pub rows: Vec<Vec<serde_json::Value>>,
}

/// Runs the exec command.
///
/// All statements run under one transaction context, so a script may
/// contain its own `BEGIN TRANSACTION` ... `COMMIT` blocks. A script that
/// leaves a transaction open has that work rolled back.
pub fn run(
    path: &Path,
    sql: &str,
    args: &[String],
    header: bool,
    format: Format,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let db = Database::open(path)?;
    let list = compile(sql)?;
    let args: Vec<Value> = args.iter().map(|a| parse_arg(a)).collect();
    let tx = TxCtx::new();

    let recordsets = db.execute(Some(&tx), &list, &args)?;
    tracing::debug!(statements = list.len(), recordsets = recordsets.len(), "executed");
    match format {
        Format::Text => print_text(&recordsets, header, out)?,
        Format::Json => print_json(&recordsets, out)?,
    }

    let open = db.nesting_level();
    if open > 0 {
        let rollback = compile("ROLLBACK")?;
        for _ in 0..open {
            db.execute(Some(&tx), &rollback, &[])?;
        }
        return Err(CliError::OpenTransaction(open));
    }
    db.close()?;
    Ok(())
}

fn print_text(recordsets: &[Recordset], header: bool, out: &mut impl Write) -> Result<(), CliError> {
    for (i, rs) in recordsets.iter().enumerate() {
        if i > 0 {
            writeln!(out)?;
        }
        let mut failed = None;
        rs.for_each(header, |row| {
            let line = row
                .iter()
                .map(Value::to_string)
                .collect::<Vec<_>>()
                .join("\t");
            if let Err(err) = writeln!(out, "{line}") {
                failed = Some(err);
                return Ok(false);
            }
            Ok(true)
        })?;
        if let Some(err) = failed {
            return Err(err.into());
        }
    }
    Ok(())
}

fn print_json(recordsets: &[Recordset], out: &mut impl Write) -> Result<(), CliError> {
    let output = recordsets
        .iter()
        .map(|rs| {
            Ok(RecordsetOutput {
                fields: rs.fields()?,
                rows: rs
                    .rows(None, 0)?
                    .iter()
                    .map(|row| row.iter().map(to_json).collect())
                    .collect(),
            })
        })
        .collect::<Result<Vec<_>, CliError>>()?;
    serde_json::to_writer_pretty(&mut *out, &output)?;
    writeln!(out)?;
    Ok(())
}
