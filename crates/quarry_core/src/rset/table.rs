use super::{ExecCtx, Item, Rset, Sink};
use crate::error::CoreResult;

/// Full scan of one table.
#[derive(Debug, Clone)]
pub(crate) struct TableRset {
    pub name: String,
}

impl TableRset {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Rset for TableRset {
    fn run(&self, ctx: &ExecCtx<'_>, sink: &mut Sink<'_>) -> CoreResult<()> {
        let table = ctx.table(&self.name)?;
        if !sink(Item::Header(table.field_names()))? {
            return Ok(());
        }
        table.scan(ctx.store(), |row| {
            sink(Item::Row {
                id: Some(row.id),
                values: table.logical(&row.slots),
            })
        })
    }
}
