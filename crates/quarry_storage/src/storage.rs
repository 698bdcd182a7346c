//! Storage trait definition.

use crate::error::StorageResult;
use crate::temp::Temp;
use quarry_codec::Value;

/// Identifies a record inside a [`Storage`] or a [`Temp`].
///
/// Handles are never 0. The engine uses 0 as the terminator of linked
/// record chains.
pub type Handle = u64;

/// A record store with nested physical transactions.
///
/// Storages are internally synchronized: every method takes `&self`
/// so a storage can be shared as `Arc<dyn Storage>`.
///
/// # Invariants
///
/// - `create` returns a handle that `read` resolves until it is deleted
/// - Mutations (`create`, `update`, `delete`, `id`, `reset_id`) require an
///   open transaction
/// - `rollback` restores every record and the id counter to the state at
///   the matching `begin_transaction`
/// - Committing a nested level folds its changes into the enclosing level;
///   only the outermost commit is durable
///
/// # Implementors
///
/// - [`super::MemoryStorage`] - For tests and ephemeral databases
/// - [`super::FileStorage`] - Journaled, durable
pub trait Storage: Send + Sync {
    /// Human readable name of the storage (a path or `"memory"`).
    fn name(&self) -> &str;

    /// Whether commits are durable.
    fn acid(&self) -> bool;

    /// Opens a new (possibly nested) physical transaction level.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage is closed.
    fn begin_transaction(&self) -> StorageResult<()>;

    /// Commits the innermost transaction level.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::NotInTransaction`] when no level is
    /// open, or an I/O error if the durable commit fails.
    fn commit(&self) -> StorageResult<()>;

    /// Discards every change made at the innermost transaction level.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::NotInTransaction`] when no level is open.
    fn rollback(&self) -> StorageResult<()>;

    /// Stores a new record and returns its handle.
    ///
    /// # Errors
    ///
    /// Fails outside a transaction or when the storage is closed.
    fn create(&self, data: &[Value]) -> StorageResult<Handle>;

    /// Reads the record stored under `handle`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::NotFound`] if no live record exists.
    fn read(&self, handle: Handle) -> StorageResult<Vec<Value>>;

    /// Replaces the record stored under `handle`.
    ///
    /// # Errors
    ///
    /// Fails outside a transaction or if the record does not exist.
    fn update(&self, handle: Handle, data: &[Value]) -> StorageResult<()>;

    /// Deletes the record stored under `handle`.
    ///
    /// # Errors
    ///
    /// Fails outside a transaction or if the record does not exist.
    fn delete(&self, handle: Handle) -> StorageResult<()>;

    /// Returns the next value of the monotonic row id counter.
    ///
    /// # Errors
    ///
    /// Fails outside a transaction.
    fn id(&self) -> StorageResult<i64>;

    /// Resets the row id counter to zero.
    ///
    /// # Errors
    ///
    /// Fails outside a transaction.
    fn reset_id(&self) -> StorageResult<()>;

    /// Creates a scratch sorted store released when dropped.
    ///
    /// # Errors
    ///
    /// Fails when the storage is closed.
    fn create_temp(&self, ascending: bool) -> StorageResult<Box<dyn Temp>>;

    /// Checks the internal consistency of the storage.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::Corrupted`] on inconsistencies.
    fn verify(&self) -> StorageResult<()>;

    /// Closes the storage. Open transaction levels are discarded.
    ///
    /// # Errors
    ///
    /// Returns an error if releasing underlying resources fails.
    fn close(&self) -> StorageResult<()>;
}
