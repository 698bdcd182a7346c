//! Verify command implementation.

use super::CliError;
use quarry_core::{Config, Database};
use std::io::Write;
use std::path::Path;

/// Runs the verify command.
///
/// Replays the journal, then checks the record store, the table list and
/// every row chain.
pub fn run(path: &Path, out: &mut impl Write) -> Result<(), CliError> {
    writeln!(out, "Verifying database at {}", path.display())?;

    let config = Config::new().create_if_missing(false);
    let db = Database::open_with_config(path, config)?;
    let verified = db.verify();
    let tables = db.table_names(None)?.len();
    db.close()?;

    match verified {
        Ok(()) => {
            writeln!(out, "  tables checked: {tables}")?;
            writeln!(out, "✓ Database verification passed")?;
            Ok(())
        }
        Err(err) => {
            writeln!(out, "  ERROR: {err}")?;
            writeln!(out, "✗ Database verification failed")?;
            Err(err.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{exec, Format};
    use std::fs::OpenOptions;
    use std::io::Write as _;
    use tempfile::tempdir;

    #[test]
    fn healthy_database_passes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ok.qdb");
        exec::run(
            &path,
            "BEGIN TRANSACTION; CREATE TABLE t (a int); INSERT INTO t VALUES (1); COMMIT",
            &[],
            false,
            Format::Text,
            &mut Vec::new(),
        )
        .unwrap();

        let mut out = Vec::new();
        run(&path, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("tables checked: 1"));
        assert!(text.contains("passed"));
    }

    #[test]
    fn missing_file_fails() {
        let dir = tempdir().unwrap();
        let mut out = Vec::new();
        assert!(run(&dir.path().join("nope.qdb"), &mut out).is_err());
    }

    #[test]
    fn corrupted_journal_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.qdb");
        exec::run(
            &path,
            "BEGIN TRANSACTION; CREATE TABLE t (a int); COMMIT",
            &[],
            false,
            Format::Text,
            &mut Vec::new(),
        )
        .unwrap();
        let mut file = OpenOptions::new().write(true).open(&path).unwrap();
        file.write_all(b"XXXX").unwrap();
        drop(file);

        let mut out = Vec::new();
        assert!(run(&path, &mut out).is_err());
    }
}
