//! Property-based test generators using proptest.
//!
//! Provides strategies for generating random test data
//! that maintains required invariants.

use proptest::prelude::*;
use quarry_core::{ColumnType, Value};

/// Strategy for generating any value except NaN floats.
pub fn value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        1 => Just(Value::Null),
        1 => any::<bool>().prop_map(Value::Bool),
        4 => any::<i64>().prop_map(Value::Int),
        2 => (-1.0e9..1.0e9f64).prop_map(Value::Float),
        3 => "[a-z]{0,8}".prop_map(Value::Text),
        1 => prop::collection::vec(any::<u8>(), 0..8).prop_map(Value::Blob),
    ]
}

/// Strategy for values that may appear in ORDER BY keys (no `Bool`).
pub fn ordered_value_strategy() -> impl Strategy<Value = Value> {
    value_strategy().prop_filter("Bool is not an ordered type", Value::is_ordered)
}

/// Strategy for generating small integers, dense enough to repeat.
pub fn small_int_strategy() -> impl Strategy<Value = Value> {
    (-20i64..20).prop_map(Value::Int)
}

/// Strategy for generating column types.
pub fn column_type_strategy() -> impl Strategy<Value = ColumnType> {
    prop_oneof![
        Just(ColumnType::Bool),
        Just(ColumnType::Int),
        Just(ColumnType::Float),
        Just(ColumnType::Text),
        Just(ColumnType::Blob),
    ]
}

/// Strategy for generating identifiers that never collide with keywords.
pub fn identifier_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("c_[a-z0-9]{1,8}").expect("Invalid regex")
}

/// An operation on a single-column table `t (n int)`.
#[derive(Debug, Clone)]
pub enum TxOperation {
    /// `BEGIN TRANSACTION`
    Begin,
    /// `COMMIT`
    Commit,
    /// `ROLLBACK`
    Rollback,
    /// `INSERT INTO t VALUES (n)`
    Insert(i64),
    /// `DELETE FROM t WHERE n == n`
    Delete(i64),
    /// `UPDATE t SET n = to WHERE n == from`
    Update {
        /// Value to match.
        from: i64,
        /// Replacement.
        to: i64,
    },
}

/// Strategy for generating transaction operations.
pub fn tx_operation_strategy() -> impl Strategy<Value = TxOperation> {
    prop_oneof![
        2 => Just(TxOperation::Begin),
        2 => Just(TxOperation::Commit),
        1 => Just(TxOperation::Rollback),
        4 => (0i64..10).prop_map(TxOperation::Insert),
        1 => (0i64..10).prop_map(TxOperation::Delete),
        1 => (0i64..10, 0i64..10).prop_map(|(from, to)| TxOperation::Update { from, to }),
    ]
}

/// Strategy for generating a sequence of operations.
pub fn operation_sequence_strategy(
    min_ops: usize,
    max_ops: usize,
) -> impl Strategy<Value = Vec<TxOperation>> {
    prop::collection::vec(tx_operation_strategy(), min_ops..max_ops)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
