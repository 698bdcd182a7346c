//! Core type definitions for Quarry.

use std::fmt;
use uuid::Uuid;

/// Transaction context: the token identifying who owns a write transaction.
///
/// Create one per logical caller and pass it to every call that takes
/// part in the same transaction. Calls may come from different threads;
/// ownership follows the token, not the thread.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TxCtx(Uuid);

impl TxCtx {
    /// Creates a fresh, unique context.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TxCtx {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TxCtx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx:{}", self.0)
    }
}
