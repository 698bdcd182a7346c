//! In-memory storage.

use crate::error::{StorageError, StorageResult};
use crate::records::RecordStore;
use crate::storage::{Handle, Storage};
use crate::temp::{MemoryTemp, Temp};
use parking_lot::Mutex;
use quarry_codec::Value;

/// An in-memory storage.
///
/// This storage keeps all records in memory and is suitable for:
/// - Unit tests
/// - Ephemeral databases that don't need persistence
///
/// Transactions are fully supported (nested levels, rollback) but commits
/// are not durable, so `acid()` is `false`.
///
/// # Example
///
/// ```rust
/// use quarry_codec::Value;
/// use quarry_storage::{MemoryStorage, Storage};
///
/// let storage = MemoryStorage::new();
/// storage.begin_transaction().unwrap();
/// let h = storage.create(&[Value::from("x")]).unwrap();
/// storage.rollback().unwrap();
/// assert!(storage.read(h).is_err());
/// ```
#[derive(Debug)]
pub struct MemoryStorage {
    state: Mutex<State>,
}

#[derive(Debug)]
struct State {
    records: RecordStore,
    closed: bool,
}

impl MemoryStorage {
    /// Creates a new empty in-memory storage.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                records: RecordStore::new(false),
                closed: false,
            }),
        }
    }

    /// Number of open transaction levels.
    #[must_use]
    pub fn nesting_level(&self) -> usize {
        self.state.lock().records.depth()
    }

    /// Number of live records.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.state.lock().records.live_records()
    }

    fn with<T>(&self, f: impl FnOnce(&mut RecordStore) -> StorageResult<T>) -> StorageResult<T> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(StorageError::Closed);
        }
        f(&mut state.records)
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for MemoryStorage {
    fn name(&self) -> &str {
        "memory"
    }

    fn acid(&self) -> bool {
        false
    }

    fn begin_transaction(&self) -> StorageResult<()> {
        self.with(|r| {
            r.begin();
            Ok(())
        })
    }

    fn commit(&self) -> StorageResult<()> {
        self.with(|r| r.commit().map(drop))
    }

    fn rollback(&self) -> StorageResult<()> {
        self.with(RecordStore::rollback)
    }

    fn create(&self, data: &[Value]) -> StorageResult<Handle> {
        self.with(|r| r.create(data))
    }

    fn read(&self, handle: Handle) -> StorageResult<Vec<Value>> {
        self.with(|r| r.read(handle))
    }

    fn update(&self, handle: Handle, data: &[Value]) -> StorageResult<()> {
        self.with(|r| r.update(handle, data))
    }

    fn delete(&self, handle: Handle) -> StorageResult<()> {
        self.with(|r| r.delete(handle))
    }

    fn id(&self) -> StorageResult<i64> {
        self.with(RecordStore::next_id)
    }

    fn reset_id(&self) -> StorageResult<()> {
        self.with(RecordStore::reset_id)
    }

    fn create_temp(&self, ascending: bool) -> StorageResult<Box<dyn Temp>> {
        self.with(|_| Ok(Box::new(MemoryTemp::new(ascending)) as Box<dyn Temp>))
    }

    fn verify(&self) -> StorageResult<()> {
        self.with(|_| Ok(()))
    }

    fn close(&self) -> StorageResult<()> {
        let mut state = self.state.lock();
        state.records.abandon();
        state.closed = true;
        Ok(())
    }
}
