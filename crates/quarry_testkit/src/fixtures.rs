//! Test fixtures and database helpers.
//!
//! Provides convenience functions for setting up test databases
//! and common test scenarios.

use quarry_core::{Config, Database, TxCtx, Value};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A test database with automatic cleanup.
pub struct TestDatabase {
    /// The database instance.
    pub db: Database,
    /// Context used by [`TestDatabase::exec`].
    pub tx: TxCtx,
    /// The temporary directory (kept alive to prevent cleanup).
    temp_dir: Option<TempDir>,
    config: Config,
}

impl TestDatabase {
    /// Creates a new in-memory test database.
    pub fn memory() -> Self {
        Self {
            db: Database::open_in_memory().expect("Failed to open in-memory database"),
            tx: TxCtx::new(),
            temp_dir: None,
            config: Config::default(),
        }
    }

    /// Creates a new file-based test database with default configuration.
    pub fn file() -> Self {
        Self::file_with_config(Config::default())
    }

    /// Creates a new file-based test database.
    pub fn file_with_config(config: Config) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("test.qdb");
        let db = Database::open_with_config(&path, config.clone())
            .expect("Failed to open file database");
        Self {
            db,
            tx: TxCtx::new(),
            temp_dir: Some(temp_dir),
            config,
        }
    }

    /// Returns the database path if file-based, None if in-memory.
    pub fn path(&self) -> Option<PathBuf> {
        self.temp_dir.as_ref().map(|d| d.path().join("test.qdb"))
    }

    /// Closes and reopens a file-based database.
    ///
    /// # Panics
    ///
    /// Panics for in-memory databases, whose contents do not survive.
    pub fn reopen(&mut self) {
        let path = self.path().expect("Only file databases can be reopened");
        self.db.close().expect("Failed to close database");
        self.db = Database::open_with_config(&path, self.config.clone())
            .expect("Failed to reopen database");
    }

    /// Runs `sql` inside its own transaction.
    pub fn exec(&self, sql: &str, args: &[Value]) {
        self.db
            .run(
                Some(&self.tx),
                &format!("BEGIN TRANSACTION; {sql}; COMMIT"),
                args,
            )
            .unwrap_or_else(|e| panic!("Failed to execute {sql:?}: {e}"));
    }

    /// Runs a single query and collects its rows.
    pub fn query(&self, sql: &str, args: &[Value]) -> Vec<Vec<Value>> {
        query(&self.db, None, sql, args)
    }
}

impl std::ops::Deref for TestDatabase {
    type Target = Database;

    fn deref(&self) -> &Self::Target {
        &self.db
    }
}

/// Runs a query and collects the rows of its only recordset.
pub fn query(db: &Database, tx: Option<&TxCtx>, sql: &str, args: &[Value]) -> Vec<Vec<Value>> {
    let recordsets = db
        .run(tx, sql, args)
        .unwrap_or_else(|e| panic!("Failed to query {sql:?}: {e}"));
    assert_eq!(recordsets.len(), 1, "{sql:?} must produce one recordset");
    recordsets[0].rows(None, 0).expect("Failed to drain recordset")
}

/// Extracts the integers of a single-column result.
pub fn int_column(rows: &[Vec<Value>]) -> Vec<i64> {
    rows.iter()
        .map(|row| row[0].as_int().expect("Expected an int column"))
        .collect()
}

/// Runs a test with a temporary in-memory database.
///
/// # Example
///
/// ```rust
/// use quarry_testkit::with_temp_db;
///
/// with_temp_db(|db| {
///     db.exec("CREATE TABLE t (a int)", &[]);
///     assert_eq!(db.table_names(None).unwrap(), vec!["t".to_string()]);
/// });
/// ```
pub fn with_temp_db<F, R>(f: F) -> R
where
    F: FnOnce(&TestDatabase) -> R,
{
    let test_db = TestDatabase::memory();
    f(&test_db)
}

/// Runs a test with a temporary file-based database.
pub fn with_file_db<F, R>(f: F) -> R
where
    F: FnOnce(&TestDatabase, &Path) -> R,
{
    let test_db = TestDatabase::file();
    let path = test_db.path().expect("File database should have a path");
    f(&test_db, &path)
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// Creates a database with a `people (id int, name string, age int)`
    /// table holding `count` rows; ages cycle through 20..30.
    pub fn populated_database(count: usize) -> TestDatabase {
        let test_db = TestDatabase::memory();
        test_db.exec("CREATE TABLE people (id int, name string, age int)", &[]);
        for i in 0..count {
            let i = i64::try_from(i).expect("Row count out of range");
            test_db.exec(
                "INSERT INTO people VALUES ($1, $2, $3)",
                &[
                    Value::Int(i),
                    Value::Text(format!("person_{i}")),
                    Value::Int(20 + i % 10),
                ],
            );
        }
        test_db
    }

    /// Creates `table_count` tables `t0`, `t1`, ... with one row each.
    pub fn multi_table_database(table_count: usize) -> (TestDatabase, Vec<String>) {
        let test_db = TestDatabase::memory();
        let mut names = Vec::with_capacity(table_count);
        for i in 0..table_count {
            let name = format!("t{i}");
            let n = i64::try_from(i).expect("Table count out of range");
            test_db.exec(
                &format!("CREATE TABLE {name} (n int); INSERT INTO {name} VALUES ($1)"),
                &[Value::Int(n)],
            );
            names.push(name);
        }
        (test_db, names)
    }
}
