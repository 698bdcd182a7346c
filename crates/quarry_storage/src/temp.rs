//! Scratch sorted stores used by grouping, de-duplication and sorting.

use crate::error::{StorageError, StorageResult};
use crate::storage::Handle;
use quarry_codec::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Iterator over the entries of a [`Temp`] in comparator order.
pub type TempEntries<'a> = Box<dyn Iterator<Item = StorageResult<(Vec<Value>, Vec<Value>)>> + 'a>;

/// A sorted key/value scratch store with a side arena of records.
///
/// Keys are rows of values ordered lexicographically with
/// [`Value::collate`], reversed for a descending temp. Setting an
/// existing key replaces its value. Everything is released on drop.
pub trait Temp: Send {
    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Implementations backed by external resources may fail.
    fn set(&mut self, key: Vec<Value>, value: Vec<Value>) -> StorageResult<()>;

    /// Returns the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Implementations backed by external resources may fail.
    fn get(&self, key: &[Value]) -> StorageResult<Option<Vec<Value>>>;

    /// Appends a record to the arena and returns its handle (never 0).
    ///
    /// # Errors
    ///
    /// Implementations backed by external resources may fail.
    fn create(&mut self, data: Vec<Value>) -> StorageResult<Handle>;

    /// Reads an arena record.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] for unknown handles.
    fn read(&self, handle: Handle) -> StorageResult<Vec<Value>>;

    /// Iterates all entries from the first key in comparator order.
    ///
    /// # Errors
    ///
    /// Implementations backed by external resources may fail.
    fn seek_first(&self) -> StorageResult<TempEntries<'_>>;

    /// Number of keys.
    fn len(&self) -> usize;

    /// Whether no key is stored.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone)]
struct Key {
    values: Vec<Value>,
    ascending: bool,
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Key {}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        let ord = Value::collate_rows(&self.values, &other.values);
        if self.ascending {
            ord
        } else {
            ord.reverse()
        }
    }
}

/// In-memory [`Temp`] backed by a `BTreeMap`.
#[derive(Debug)]
pub struct MemoryTemp {
    ascending: bool,
    map: BTreeMap<Key, Vec<Value>>,
    arena: Vec<Vec<Value>>,
}

impl MemoryTemp {
    /// Creates an empty temp.
    #[must_use]
    pub fn new(ascending: bool) -> Self {
        Self {
            ascending,
            map: BTreeMap::new(),
            arena: Vec::new(),
        }
    }

    fn key(&self, values: Vec<Value>) -> Key {
        Key {
            values,
            ascending: self.ascending,
        }
    }
}

impl Temp for MemoryTemp {
    fn set(&mut self, key: Vec<Value>, value: Vec<Value>) -> StorageResult<()> {
        let key = self.key(key);
        self.map.insert(key, value);
        Ok(())
    }

    fn get(&self, key: &[Value]) -> StorageResult<Option<Vec<Value>>> {
        let key = self.key(key.to_vec());
        Ok(self.map.get(&key).cloned())
    }

    fn create(&mut self, data: Vec<Value>) -> StorageResult<Handle> {
        self.arena.push(data);
        Ok(self.arena.len() as Handle)
    }

    fn read(&self, handle: Handle) -> StorageResult<Vec<Value>> {
        handle
            .checked_sub(1)
            .and_then(|i| usize::try_from(i).ok())
            .and_then(|i| self.arena.get(i))
            .cloned()
            .ok_or(StorageError::NotFound { handle })
    }

    fn seek_first(&self) -> StorageResult<TempEntries<'_>> {
        Ok(Box::new(
            self.map
                .iter()
                .map(|(k, v)| Ok((k.values.clone(), v.clone()))),
        ))
    }

    fn len(&self) -> usize {
        self.map.len()
    }
}
