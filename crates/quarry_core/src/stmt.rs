//! Compiled statements.

use crate::error::{CoreError, CoreResult};
use crate::expr::{eval_predicate, Env, Expr, Scope};
use crate::root::ROOT_HANDLE;
use crate::rset::{drain, ExecCtx, Rset};
use crate::table::{handle_value, row_record, Column, Table};
use quarry_codec::{ColumnType, Value};
use std::collections::HashSet;
use std::sync::Arc;

/// Rows of an `INSERT`.
#[derive(Debug)]
pub(crate) enum InsertSource {
    Values(Vec<Vec<Expr>>),
    Select(Arc<dyn Rset>),
}

/// One compiled statement.
#[derive(Debug)]
pub(crate) enum Stmt {
    Begin,
    Commit,
    Rollback,
    CreateTable {
        name: String,
        if_not_exists: bool,
        columns: Vec<(String, ColumnType)>,
    },
    DropTable {
        name: String,
        if_exists: bool,
    },
    AlterAdd {
        table: String,
        column: String,
        ty: ColumnType,
    },
    AlterDrop {
        table: String,
        column: String,
    },
    Truncate {
        table: String,
    },
    Insert {
        table: String,
        /// Target columns; empty means all live columns in order.
        columns: Vec<String>,
        source: InsertSource,
    },
    Update {
        table: String,
        assignments: Vec<(String, Expr)>,
        filter: Option<Expr>,
    },
    Delete {
        table: String,
        filter: Option<Expr>,
    },
    Select(Arc<dyn Rset>),
}

/// A compiled statement list.
///
/// Immutable and cheap to clone; the same list may be executed any number
/// of times, from any number of threads.
#[derive(Debug, Clone)]
pub struct List {
    stmts: Arc<[Stmt]>,
    params: usize,
}

impl List {
    pub(crate) fn new(stmts: Vec<Stmt>, params: usize) -> Self {
        Self {
            stmts: stmts.into(),
            params,
        }
    }

    /// Number of statements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stmts.len()
    }

    /// Whether the list holds no statement.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stmts.is_empty()
    }

    /// Highest positional parameter referenced (`$n`).
    #[must_use]
    pub fn params(&self) -> usize {
        self.params
    }

    pub(crate) fn stmts(&self) -> &[Stmt] {
        &self.stmts
    }
}

impl Stmt {
    /// Whether the statement changes the database.
    pub(crate) fn is_updating(&self) -> bool {
        !matches!(self, Self::Begin | Self::Commit | Self::Rollback | Self::Select(_))
    }

    /// Executes a non-transaction statement. Only `SELECT` yields a plan.
    pub(crate) fn exec(&self, ctx: &ExecCtx<'_>) -> CoreResult<Option<Arc<dyn Rset>>> {
        match self {
            Self::Begin | Self::Commit | Self::Rollback => Err(CoreError::invalid_operation(
                "transaction statements are handled by the database",
            )),
            Self::Select(plan) => Ok(Some(Arc::clone(plan))),
            Self::CreateTable {
                name,
                if_not_exists,
                columns,
            } => create_table(ctx, name, *if_not_exists, columns).map(|()| None),
            Self::DropTable { name, if_exists } => drop_table(ctx, name, *if_exists).map(|()| None),
            Self::AlterAdd { table, column, ty } => alter_add(ctx, table, column, *ty).map(|()| None),
            Self::AlterDrop { table, column } => alter_drop(ctx, table, column).map(|()| None),
            Self::Truncate { table } => truncate(ctx, table).map(|()| None),
            Self::Insert {
                table,
                columns,
                source,
            } => insert(ctx, table, columns, source).map(|()| None),
            Self::Update {
                table,
                assignments,
                filter,
            } => update(ctx, table, assignments, filter.as_ref()).map(|()| None),
            Self::Delete { table, filter } => delete(ctx, table, filter.as_ref()).map(|()| None),
        }
    }
}

fn store_root(ctx: &ExecCtx<'_>, thead: u64) -> CoreResult<()> {
    ctx.store().update(ROOT_HANDLE, &[handle_value(thead)?])?;
    Ok(())
}

fn create_table(
    ctx: &ExecCtx<'_>,
    name: &str,
    if_not_exists: bool,
    columns: &[(String, ColumnType)],
) -> CoreResult<()> {
    let mut roots = ctx.db.roots.write();
    let root = roots.current_mut();
    if root.table(name).is_some() {
        if if_not_exists {
            return Ok(());
        }
        return Err(CoreError::TableExists { name: name.to_string() });
    }
    let mut seen = HashSet::new();
    for (column, _) in columns {
        if !seen.insert(column.as_str()) {
            return Err(CoreError::invalid_operation(format!(
                "duplicate column {column} in table {name}"
            )));
        }
    }

    let mut table = Table {
        name: name.to_string(),
        handle: 0,
        next: root.thead,
        head: 0,
        columns: columns
            .iter()
            .enumerate()
            .map(|(index, (column, ty))| Column {
                index,
                name: column.clone(),
                ty: *ty,
            })
            .collect(),
    };
    table.handle = ctx.store().create(&table.to_record()?)?;
    root.thead = table.handle;
    store_root(ctx, root.thead)?;
    root.insert(table);
    Ok(())
}

fn drop_table(ctx: &ExecCtx<'_>, name: &str, if_exists: bool) -> CoreResult<()> {
    let store = ctx.store();
    let mut roots = ctx.db.roots.write();
    let root = roots.current_mut();
    let Some(table) = root.table(name) else {
        if if_exists {
            return Ok(());
        }
        return Err(CoreError::table_not_found(name));
    };

    for row in table.rows(store)? {
        store.delete(row.handle)?;
    }

    let prev = root
        .tables()
        .find(|t| t.next == table.handle)
        .map(|t| t.name.clone());
    match prev {
        Some(prev) => {
            let prev = root.table_mut(&prev)?;
            prev.next = table.next;
            prev.store(store)?;
        }
        None => {
            root.thead = table.next;
            store_root(ctx, root.thead)?;
        }
    }
    store.delete(table.handle)?;
    root.remove(name);
    Ok(())
}

fn alter_add(ctx: &ExecCtx<'_>, name: &str, column: &str, ty: ColumnType) -> CoreResult<()> {
    let mut roots = ctx.db.roots.write();
    let table = roots.current_mut().table_mut(name)?;
    if table.column(column).is_some() {
        return Err(CoreError::invalid_operation(format!(
            "column {column} already exists in table {name}"
        )));
    }
    table.columns.push(Column {
        index: table.columns.len(),
        name: column.to_string(),
        ty,
    });
    table.store(ctx.store())
}

fn alter_drop(ctx: &ExecCtx<'_>, name: &str, column: &str) -> CoreResult<()> {
    let mut roots = ctx.db.roots.write();
    let table = roots.current_mut().table_mut(name)?;
    let index = table.column_or_err(column)?.index;
    if table.visible_columns().count() == 1 {
        return Err(CoreError::invalid_operation(format!(
            "cannot drop the only column of table {name}"
        )));
    }
    table.columns[index].name.clear();
    table.store(ctx.store())
}

fn truncate(ctx: &ExecCtx<'_>, name: &str) -> CoreResult<()> {
    let store = ctx.store();
    let mut roots = ctx.db.roots.write();
    let table = roots.current_mut().table_mut(name)?;
    for row in table.rows(store)? {
        store.delete(row.handle)?;
    }
    table.head = 0;
    table.store(store)
}

fn insert(ctx: &ExecCtx<'_>, name: &str, columns: &[String], source: &InsertSource) -> CoreResult<()> {
    let schema = ctx.table(name)?;
    let targets: Vec<&Column> = if columns.is_empty() {
        schema.visible_columns().collect()
    } else {
        let mut seen = HashSet::new();
        columns
            .iter()
            .map(|c| {
                if !seen.insert(c.as_str()) {
                    return Err(CoreError::invalid_operation(format!("duplicate column {c} in INSERT")));
                }
                schema.column_or_err(c)
            })
            .collect::<CoreResult<_>>()?
    };

    // Rows are fully materialized before the table is touched.
    let rows: Vec<Vec<Value>> = match source {
        InsertSource::Values(rows) => {
            let scope = Scope::default();
            let env = Env::constant(&scope, ctx.args);
            rows.iter()
                .map(|row| row.iter().map(|e| e.eval(&env)).collect())
                .collect::<CoreResult<_>>()?
        }
        InsertSource::Select(plan) => {
            let mut rows = Vec::new();
            drain(&**plan, ctx, |_| Ok(()), |_, values| {
                rows.push(values);
                Ok(())
            })?;
            rows
        }
    };

    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        if row.len() != targets.len() {
            return Err(CoreError::invalid_operation(format!(
                "table {name}: expected {} values, got {}",
                targets.len(),
                row.len()
            )));
        }
        let mut slots = vec![Value::Null; schema.columns.len()];
        for (column, value) in targets.iter().zip(row) {
            slots[column.index] = column.ty.coerce(value)?;
        }
        records.push(slots);
    }
    drop(targets);
    drop(schema);

    let store = ctx.store();
    let mut roots = ctx.db.roots.write();
    let table = roots.current_mut().table_mut(name)?;
    for slots in records {
        let id = store.id()?;
        table.head = store.create(&row_record(table.head, id, &slots)?)?;
    }
    table.store(store)
}

fn update(
    ctx: &ExecCtx<'_>,
    name: &str,
    assignments: &[(String, Expr)],
    filter: Option<&Expr>,
) -> CoreResult<()> {
    let store = ctx.store();
    let table = ctx.table(name)?;
    let targets = assignments
        .iter()
        .map(|(column, expr)| Ok((table.column_or_err(column)?, expr)))
        .collect::<CoreResult<Vec<_>>>()?;
    let scope = Scope::new(&table.field_names());

    let mut changes = Vec::new();
    for row in table.rows(store)? {
        let values = table.logical(&row.slots);
        let env = Env::row(&scope, &values, Some(row.id), ctx.args);
        if let Some(filter) = filter {
            if !eval_predicate(filter, &env)? {
                continue;
            }
        }
        let mut slots = row.slots.clone();
        for (column, expr) in &targets {
            slots[column.index] = column.ty.coerce(expr.eval(&env)?)?;
        }
        changes.push((row.handle, row_record(row.next, row.id, &slots)?));
    }
    for (handle, record) in changes {
        store.update(handle, &record)?;
    }
    Ok(())
}

fn delete(ctx: &ExecCtx<'_>, name: &str, filter: Option<&Expr>) -> CoreResult<()> {
    let store = ctx.store();
    let table = ctx.table(name)?;
    let scope = Scope::new(&table.field_names());

    let rows = table.rows(store)?;
    let mut kept = Vec::with_capacity(rows.len());
    let mut doomed = Vec::new();
    for row in rows {
        let hit = match filter {
            Some(filter) => {
                let values = table.logical(&row.slots);
                eval_predicate(filter, &Env::row(&scope, &values, Some(row.id), ctx.args))?
            }
            None => true,
        };
        if hit {
            doomed.push(row.handle);
        } else {
            kept.push(row);
        }
    }
    if doomed.is_empty() {
        return Ok(());
    }

    // Relink the survivors in their original chain order.
    let mut next = 0;
    for row in kept.iter().rev() {
        if row.next != next {
            store.update(row.handle, &row_record(next, row.id, &row.slots)?)?;
        }
        next = row.handle;
    }
    for handle in doomed {
        store.delete(handle)?;
    }
    if next != table.head {
        let mut roots = ctx.db.roots.write();
        let table = roots.current_mut().table_mut(name)?;
        table.head = next;
        table.store(store)?;
    }
    Ok(())
}
