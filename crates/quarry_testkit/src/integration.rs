//! Model-checking harness for the transaction controller.
//!
//! [`TxModelHarness`] drives a database with [`TxOperation`]s while keeping
//! a plain model of every open nesting level, and checks after each step
//! that both agree.

use crate::fixtures::{int_column, query};
use crate::generators::TxOperation;
use quarry_core::{Database, TxCtx, Value};

/// A test harness pairing a database with a model of its nesting levels.
pub struct TxModelHarness {
    /// The database instance.
    pub db: Database,
    tx: TxCtx,
    /// `levels[0]` is the committed state, the last entry the innermost
    /// open transaction.
    levels: Vec<Vec<i64>>,
}

impl TxModelHarness {
    /// Creates a harness over an in-memory database with an empty table
    /// `t (n int)`.
    pub fn new() -> Self {
        Self::with_database(Database::open_in_memory().expect("Failed to open database"))
    }

    /// Creates a harness over `db`, which must not contain a table `t`.
    pub fn with_database(db: Database) -> Self {
        let tx = TxCtx::new();
        db.run(
            Some(&tx),
            "BEGIN TRANSACTION; CREATE TABLE t (n int); COMMIT",
            &[],
        )
        .expect("Failed to create table");
        Self {
            db,
            tx,
            levels: vec![Vec::new()],
        }
    }

    /// Current nesting level according to the model.
    pub fn depth(&self) -> usize {
        self.levels.len() - 1
    }

    fn top(&mut self) -> &mut Vec<i64> {
        let last = self.levels.len() - 1;
        &mut self.levels[last]
    }

    /// Applies `op` to the database and the model.
    ///
    /// # Panics
    ///
    /// Panics when the database accepts an operation the model rejects or
    /// the other way around.
    pub fn apply(&mut self, op: &TxOperation) {
        let (sql, args) = match op {
            TxOperation::Begin => ("BEGIN TRANSACTION", vec![]),
            TxOperation::Commit => ("COMMIT", vec![]),
            TxOperation::Rollback => ("ROLLBACK", vec![]),
            TxOperation::Insert(n) => ("INSERT INTO t VALUES ($1)", vec![Value::Int(*n)]),
            TxOperation::Delete(n) => ("DELETE FROM t WHERE n == $1", vec![Value::Int(*n)]),
            TxOperation::Update { from, to } => (
                "UPDATE t SET n = $2 WHERE n == $1",
                vec![Value::Int(*from), Value::Int(*to)],
            ),
        };
        let result = self.db.run(Some(&self.tx), sql, &args);

        let in_transaction = self.depth() > 0;
        let expect_ok = in_transaction || matches!(op, TxOperation::Begin);
        assert_eq!(
            result.is_ok(),
            expect_ok,
            "{op:?} at depth {}: {:?}",
            self.depth(),
            result.err().map(|e| e.to_string())
        );
        if !expect_ok {
            return;
        }

        match op {
            TxOperation::Begin => {
                let copy = self.top().clone();
                self.levels.push(copy);
            }
            TxOperation::Commit => {
                let top = self.levels.pop().unwrap_or_default();
                *self.top() = top;
            }
            TxOperation::Rollback => {
                self.levels.pop();
            }
            TxOperation::Insert(n) => self.top().push(*n),
            TxOperation::Delete(n) => self.top().retain(|x| x != n),
            TxOperation::Update { from, to } => {
                for x in self.top().iter_mut().filter(|x| **x == *from) {
                    *x = *to;
                }
            }
        }
    }

    /// Checks the nesting level and the rows visible to the owner.
    pub fn verify(&self) {
        assert_eq!(self.db.nesting_level(), self.depth());
        let mut expected = self.levels[self.depth()].clone();
        expected.sort_unstable();
        let rows = query(&self.db, Some(&self.tx), "SELECT n FROM t ORDER BY n", &[]);
        assert_eq!(int_column(&rows), expected);
    }

    /// Rolls back every open level and checks the committed rows.
    pub fn finish(mut self) {
        while self.depth() > 0 {
            self.apply(&TxOperation::Rollback);
        }
        self.verify();
        self.db.verify().expect("Database failed verification");
    }
}

impl Default for TxModelHarness {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_commit_and_rollback() {
        let mut harness = TxModelHarness::new();
        for op in [
            TxOperation::Begin,
            TxOperation::Insert(1),
            TxOperation::Begin,
            TxOperation::Insert(2),
            TxOperation::Update { from: 1, to: 5 },
            TxOperation::Rollback,
            TxOperation::Begin,
            TxOperation::Insert(3),
            TxOperation::Commit,
        ] {
            harness.apply(&op);
            harness.verify();
        }
        assert_eq!(harness.depth(), 1);
        harness.apply(&TxOperation::Commit);
        harness.verify();
        harness.finish();
    }

    #[test]
    fn test_updates_outside_transaction_are_rejected() {
        let mut harness = TxModelHarness::new();
        harness.apply(&TxOperation::Insert(1));
        harness.apply(&TxOperation::Commit);
        harness.verify();
        harness.finish();
    }
}
