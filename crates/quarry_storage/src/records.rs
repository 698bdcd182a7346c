//! Record table with nested undo logs shared by the storages.

use crate::error::{StorageError, StorageResult};
use crate::journal::Redo;
use crate::storage::Handle;
use quarry_codec::Value;

/// An undo entry, replayed in reverse on rollback.
#[derive(Debug)]
enum Undo {
    Create(Handle),
    Update(Handle, Vec<Value>),
    Delete(Handle, Vec<Value>),
    Id(i64),
}

#[derive(Debug, Default)]
struct Level {
    undo: Vec<Undo>,
    redo: Vec<Redo>,
}

/// Records addressed by handle plus the stack of open transaction levels.
///
/// When `journaled` is set every level also collects redo operations; the
/// outermost commit hands them back to the caller for persisting.
#[derive(Debug, Default)]
pub(crate) struct RecordStore {
    slots: Vec<Option<Vec<Value>>>,
    last_id: i64,
    levels: Vec<Level>,
    journaled: bool,
}

impl RecordStore {
    pub(crate) fn new(journaled: bool) -> Self {
        Self {
            journaled,
            ..Self::default()
        }
    }

    pub(crate) fn depth(&self) -> usize {
        self.levels.len()
    }

    pub(crate) fn live_records(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub(crate) fn begin(&mut self) {
        self.levels.push(Level::default());
    }

    /// Commits the innermost level. Returns the redo log when the outermost
    /// level of a journaled store was committed.
    pub(crate) fn commit(&mut self) -> StorageResult<Option<Vec<Redo>>> {
        let level = self.levels.pop().ok_or(StorageError::NotInTransaction)?;
        match self.levels.last_mut() {
            Some(parent) => {
                parent.undo.extend(level.undo);
                parent.redo.extend(level.redo);
                Ok(None)
            }
            None if self.journaled => Ok(Some(level.redo)),
            None => Ok(None),
        }
    }

    pub(crate) fn rollback(&mut self) -> StorageResult<()> {
        let level = self.levels.pop().ok_or(StorageError::NotInTransaction)?;
        for undo in level.undo.into_iter().rev() {
            match undo {
                Undo::Create(handle) => self.put(handle, None),
                Undo::Update(handle, old) | Undo::Delete(handle, old) => {
                    self.put(handle, Some(old));
                }
                Undo::Id(id) => self.last_id = id,
            }
        }
        Ok(())
    }

    /// Drops every open level without undoing anything.
    pub(crate) fn abandon(&mut self) {
        self.levels.clear();
    }

    pub(crate) fn create(&mut self, data: &[Value]) -> StorageResult<Handle> {
        self.ensure_txn()?;
        self.slots.push(Some(data.to_vec()));
        let handle = self.slots.len() as Handle;
        self.log(Undo::Create(handle), || Redo::Put {
            handle,
            values: data.to_vec(),
        });
        Ok(handle)
    }

    pub(crate) fn read(&self, handle: Handle) -> StorageResult<Vec<Value>> {
        self.slot(handle)
            .and_then(Option::as_ref)
            .cloned()
            .ok_or(StorageError::NotFound { handle })
    }

    pub(crate) fn update(&mut self, handle: Handle, data: &[Value]) -> StorageResult<()> {
        self.ensure_txn()?;
        let old = self
            .slot_mut(handle)
            .and_then(|slot| slot.replace(data.to_vec()))
            .ok_or(StorageError::NotFound { handle })?;
        self.log(Undo::Update(handle, old), || Redo::Put {
            handle,
            values: data.to_vec(),
        });
        Ok(())
    }

    pub(crate) fn delete(&mut self, handle: Handle) -> StorageResult<()> {
        self.ensure_txn()?;
        let old = self
            .slot_mut(handle)
            .and_then(Option::take)
            .ok_or(StorageError::NotFound { handle })?;
        self.log(Undo::Delete(handle, old), || Redo::Delete { handle });
        Ok(())
    }

    pub(crate) fn next_id(&mut self) -> StorageResult<i64> {
        self.ensure_txn()?;
        let prev = self.last_id;
        self.last_id += 1;
        let id = self.last_id;
        self.log(Undo::Id(prev), || Redo::Id(id));
        Ok(id)
    }

    pub(crate) fn reset_id(&mut self) -> StorageResult<()> {
        self.ensure_txn()?;
        let prev = std::mem::replace(&mut self.last_id, 0);
        self.log(Undo::Id(prev), || Redo::Id(0));
        Ok(())
    }

    /// Applies a committed redo operation outside of any transaction.
    pub(crate) fn apply(&mut self, redo: Redo) -> StorageResult<()> {
        match redo {
            Redo::Put { handle, values } => {
                if handle == 0 {
                    return Err(StorageError::Corrupted("record handle 0 in journal".into()));
                }
                self.put(handle, Some(values));
            }
            Redo::Delete { handle } => {
                if self.slot_mut(handle).and_then(Option::take).is_none() {
                    return Err(StorageError::Corrupted(format!(
                        "journal deletes missing record {handle}"
                    )));
                }
            }
            Redo::Id(id) => self.last_id = id,
        }
        Ok(())
    }

    fn ensure_txn(&self) -> StorageResult<()> {
        if self.levels.is_empty() {
            Err(StorageError::NotInTransaction)
        } else {
            Ok(())
        }
    }

    fn log(&mut self, undo: Undo, redo: impl FnOnce() -> Redo) {
        let journaled = self.journaled;
        if let Some(level) = self.levels.last_mut() {
            level.undo.push(undo);
            if journaled {
                level.redo.push(redo());
            }
        }
    }

    fn index(handle: Handle) -> Option<usize> {
        usize::try_from(handle.checked_sub(1)?).ok()
    }

    fn slot(&self, handle: Handle) -> Option<&Option<Vec<Value>>> {
        self.slots.get(Self::index(handle)?)
    }

    fn slot_mut(&mut self, handle: Handle) -> Option<&mut Option<Vec<Value>>> {
        let index = Self::index(handle)?;
        self.slots.get_mut(index)
    }

    fn put(&mut self, handle: Handle, record: Option<Vec<Value>>) {
        let Some(index) = Self::index(handle) else {
            return;
        };
        if index >= self.slots.len() {
            self.slots.resize(index + 1, None);
        }
        self.slots[index] = record;
    }
}
