//! Lazy query results.

use crate::database::DbInner;
use crate::error::{CoreError, CoreResult};
use crate::rset::{Item, Rset};
use crate::types::TxCtx;
use quarry_codec::Value;
use std::fmt;
use std::sync::Arc;

/// The result of a SELECT statement.
///
/// A recordset holds the compiled plan, not rows. Every drain runs the
/// plan again against the tables as they are at that moment, so a
/// recordset obtained before a commit observes the committed data.
///
/// Drains by the caller owning the open write transaction see its
/// uncommitted work. Other callers wait for the write transaction to end.
#[derive(Clone)]
pub struct Recordset {
    db: Arc<DbInner>,
    token: Option<TxCtx>,
    args: Arc<[Value]>,
    plan: Arc<dyn Rset>,
}

impl Recordset {
    pub(crate) fn new(
        db: Arc<DbInner>,
        token: Option<TxCtx>,
        args: Arc<[Value]>,
        plan: Arc<dyn Rset>,
    ) -> Self {
        Self {
            db,
            token,
            args,
            plan,
        }
    }

    /// Calls `f` for every row, preceded by the field names as `Text`
    /// values when `include_header` is set. Iteration stops when `f`
    /// returns `Ok(false)` or an error.
    ///
    /// Unless the recordset's context owns the open write transaction, the
    /// drain holds the read side of the write gate until it returns. `f`
    /// must not start a write transaction on the same thread: the BEGIN
    /// would wait for this drain to finish and never return.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by the plan or by `f`.
    pub fn for_each<F>(&self, include_header: bool, mut f: F) -> CoreResult<()>
    where
        F: FnMut(&[Value]) -> CoreResult<bool>,
    {
        self.db.drain(
            self.token.as_ref(),
            &self.args,
            &*self.plan,
            &mut |item| match item {
                Item::Header(names) if include_header => {
                    let header: Vec<Value> = names.into_iter().map(Value::Text).collect();
                    f(&header)
                }
                Item::Header(_) => Ok(true),
                Item::Row { values, .. } => f(&values),
            },
        )
    }

    /// Names of the result fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the plan cannot be started.
    pub fn fields(&self) -> CoreResult<Vec<String>> {
        let mut header = None;
        self.db.drain(
            self.token.as_ref(),
            &self.args,
            &*self.plan,
            &mut |item| {
                if let Item::Header(names) = item {
                    header = Some(names);
                }
                Ok(false)
            },
        )?;
        header.ok_or_else(|| CoreError::invalid_operation("row stream ended without a header"))
    }

    /// Collects at most `limit` rows after skipping `offset` rows.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by the plan.
    pub fn rows(&self, limit: Option<usize>, offset: usize) -> CoreResult<Vec<Vec<Value>>> {
        let mut rows = Vec::new();
        if limit == Some(0) {
            return Ok(rows);
        }
        let mut skip = offset;
        self.for_each(false, |row| {
            if skip > 0 {
                skip -= 1;
                return Ok(true);
            }
            rows.push(row.to_vec());
            Ok(limit.map_or(true, |n| rows.len() < n))
        })?;
        Ok(rows)
    }

    /// The first row, if any.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by the plan.
    pub fn first_row(&self) -> CoreResult<Option<Vec<Value>>> {
        Ok(self.rows(Some(1), 0)?.pop())
    }
}

impl fmt::Debug for Recordset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Recordset")
            .field("token", &self.token)
            .field("args", &self.args)
            .field("plan", &self.plan)
            .finish_non_exhaustive()
    }
}
