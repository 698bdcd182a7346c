//! # Quarry Core
//!
//! Transactional engine for Quarry, an embedded SQL-like database.
//!
//! This crate provides:
//! - A transaction controller with nested BEGIN/COMMIT/ROLLBACK and a
//!   single writer identified by a [`TxCtx`] token
//! - Autocommit batching of physical commits on durable storages
//! - Snapshot roots so schema changes roll back with their transaction
//! - A statement compiler and lazy row pipelines behind [`Recordset`]
//!
//! ## Example
//!
//! ```rust
//! use quarry_core::{Database, TxCtx, Value};
//!
//! let db = Database::open_in_memory().unwrap();
//! let tx = TxCtx::new();
//! db.run(
//!     Some(&tx),
//!     "BEGIN TRANSACTION;
//!      CREATE TABLE fruit (name string, qty int);
//!      INSERT INTO fruit VALUES ('apple', 3), ('pear', 5);
//!      COMMIT;",
//!     &[],
//! )
//! .unwrap();
//!
//! let rs = db
//!     .run(None, "SELECT name FROM fruit WHERE qty > $1", &[Value::Int(4)])
//!     .unwrap();
//! assert_eq!(rs[0].rows(None, 0).unwrap(), vec![vec![Value::from("pear")]]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod autocommit;
mod config;
mod database;
mod error;
mod expr;
mod recordset;
mod root;
mod rset;
mod sql;
mod stmt;
mod table;
mod transaction;
mod types;

pub use config::Config;
pub use database::Database;
pub use error::{CoreError, CoreResult, ExecuteError};
pub use recordset::Recordset;
pub use sql::compile;
pub use stmt::List;
pub use types::TxCtx;

pub use quarry_codec::{ColumnType, Value};
pub use quarry_storage::{FileStorage, MemoryStorage, Storage};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
