//! Snapshot roots: the transactional table directory.
//!
//! Every open transaction level owns one [`Root`]. Beginning a level
//! pushes a copy of the current root that shares the `Arc<Table>` entries;
//! a table is cloned the first time a level mutates it, so lower levels
//! never observe the change. Committing folds the top level into the one
//! below, rolling back drops it.

use crate::error::{CoreError, CoreResult};
use crate::table::Table;
use quarry_storage::Handle;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Handle of the record holding the head of the table list.
pub(crate) const ROOT_HANDLE: Handle = 1;

/// A table directory.
#[derive(Debug, Clone, Default)]
pub(crate) struct Root {
    tables: BTreeMap<String, Arc<Table>>,
    /// Head of the persistent table list.
    pub thead: Handle,
}

impl Root {
    pub(crate) fn new(tables: impl IntoIterator<Item = Table>, thead: Handle) -> Self {
        Self {
            tables: tables
                .into_iter()
                .map(|t| (t.name.clone(), Arc::new(t)))
                .collect(),
            thead,
        }
    }

    pub(crate) fn table(&self, name: &str) -> Option<Arc<Table>> {
        self.tables.get(name).cloned()
    }

    /// Mutable access, cloning the table if another level still shares it.
    pub(crate) fn table_mut(&mut self, name: &str) -> CoreResult<&mut Table> {
        self.tables
            .get_mut(name)
            .map(Arc::make_mut)
            .ok_or_else(|| CoreError::table_not_found(name))
    }

    pub(crate) fn insert(&mut self, table: Table) {
        self.tables.insert(table.name.clone(), Arc::new(table));
    }

    pub(crate) fn remove(&mut self, name: &str) -> Option<Arc<Table>> {
        self.tables.remove(name)
    }

    pub(crate) fn tables(&self) -> impl Iterator<Item = &Arc<Table>> {
        self.tables.values()
    }

    pub(crate) fn names(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }
}

/// The stack of roots, one per open transaction level plus the base.
#[derive(Debug)]
pub(crate) struct RootStack {
    levels: Vec<Root>,
}

impl RootStack {
    pub(crate) fn new(base: Root) -> Self {
        Self { levels: vec![base] }
    }

    /// Number of open levels. Equals the transaction nesting level.
    pub(crate) fn depth(&self) -> usize {
        self.levels.len() - 1
    }

    pub(crate) fn current(&self) -> &Root {
        // levels is never empty: the base is never popped
        &self.levels[self.levels.len() - 1]
    }

    pub(crate) fn current_mut(&mut self) -> &mut Root {
        let top = self.levels.len() - 1;
        &mut self.levels[top]
    }

    pub(crate) fn begin(&mut self) {
        let copy = self.current().clone();
        self.levels.push(copy);
    }

    /// Folds the top level into the level below.
    pub(crate) fn commit(&mut self) -> CoreResult<()> {
        if self.depth() == 0 {
            return Err(CoreError::invalid_operation("no snapshot level to commit"));
        }
        let below = self.levels.len() - 2;
        self.levels.remove(below);
        Ok(())
    }

    /// Discards the top level.
    pub(crate) fn rollback(&mut self) -> CoreResult<()> {
        if self.depth() == 0 {
            return Err(CoreError::invalid_operation("no snapshot level to roll back"));
        }
        self.levels.pop();
        Ok(())
    }
}
