//! Lazy relational operators.
//!
//! Every operator implements [`Rset`]: `run` pushes items into a sink,
//! starting with exactly one [`Item::Header`] that names the fields of the
//! stream, followed by the rows. A sink answering `Ok(false)` stops the
//! producer immediately, an `Err` aborts it; either way no further rows
//! are read. Only table scans attach row ids.

mod distinct;
mod filter;
mod group;
mod join;
mod limit;
mod order;
mod select;
mod table;

pub(crate) use distinct::DistinctRset;
pub(crate) use filter::WhereRset;
pub(crate) use group::GroupByRset;
pub(crate) use join::{CrossJoinRset, JoinSource};
pub(crate) use limit::{LimitRset, OffsetRset};
pub(crate) use order::OrderByRset;
pub(crate) use select::{Fld, SelectRset, SelectSource};
pub(crate) use table::TableRset;

use crate::database::DbInner;
use crate::error::{CoreError, CoreResult};
use crate::table::Table;
use quarry_codec::Value;
use quarry_storage::Storage;
use std::fmt;
use std::sync::Arc;

/// One element of a row stream.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Item {
    /// Field names, sent once before any row.
    Header(Vec<String>),
    /// A data row.
    Row { id: Option<i64>, values: Vec<Value> },
}

/// Consumer of a row stream. `Ok(false)` asks the producer to stop.
pub(crate) type Sink<'s> = dyn FnMut(Item) -> CoreResult<bool> + 's;

/// A relational operator.
pub(crate) trait Rset: Send + Sync + fmt::Debug {
    /// Streams the operator's output into `sink`.
    fn run(&self, ctx: &ExecCtx<'_>, sink: &mut Sink<'_>) -> CoreResult<()>;
}

/// What an operator needs while running.
pub(crate) struct ExecCtx<'a> {
    pub db: &'a DbInner,
    pub args: &'a [Value],
}

impl<'a> ExecCtx<'a> {
    pub(crate) fn new(db: &'a DbInner, args: &'a [Value]) -> Self {
        Self { db, args }
    }

    pub(crate) fn store(&self) -> &dyn Storage {
        &*self.db.store
    }

    /// Resolves a table in the root current at call time.
    pub(crate) fn table(&self, name: &str) -> CoreResult<Arc<Table>> {
        self.db
            .roots
            .read()
            .current()
            .table(name)
            .ok_or_else(|| CoreError::table_not_found(name))
    }
}

/// Drains `rset`, handing the header to `on_header` and every row to `on_row`.
pub(crate) fn drain(
    rset: &dyn Rset,
    ctx: &ExecCtx<'_>,
    mut on_header: impl FnMut(Vec<String>) -> CoreResult<()>,
    mut on_row: impl FnMut(Option<i64>, Vec<Value>) -> CoreResult<()>,
) -> CoreResult<()> {
    rset.run(ctx, &mut |item| {
        match item {
            Item::Header(names) => on_header(names)?,
            Item::Row { id, values } => on_row(id, values)?,
        }
        Ok(true)
    })
}

/// Runs `rset` only far enough to learn its field names.
pub(crate) fn header_of(rset: &dyn Rset, ctx: &ExecCtx<'_>) -> CoreResult<Vec<String>> {
    let mut header = None;
    rset.run(ctx, &mut |item| {
        if let Item::Header(names) = item {
            header = Some(names);
        }
        Ok(false)
    })?;
    header.ok_or_else(|| CoreError::invalid_operation("row stream ended without a header"))
}
