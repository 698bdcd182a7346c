//! # Quarry Testkit
//!
//! Test utilities for Quarry.
//!
//! This crate provides:
//! - Test fixtures and database helpers
//! - Property-based test generators using proptest
//! - A model-checking harness for nested transactions
//! - Stress testing utilities
//!
//! ## Usage
//!
//! ```rust
//! use quarry_testkit::prelude::*;
//!
//! with_temp_db(|db| {
//!     db.exec("CREATE TABLE t (a int); INSERT INTO t VALUES (1)", &[]);
//!     assert_eq!(int_column(&db.query("SELECT a FROM t", &[])), vec![1]);
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod integration;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::integration::*;
    pub use crate::stress::*;
}

pub use fixtures::*;
pub use generators::*;
pub use integration::*;
pub use stress::*;
