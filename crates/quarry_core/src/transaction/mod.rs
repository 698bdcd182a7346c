//! Transaction control.
//!
//! The controller is in read mode when no write transaction is open and
//! in write mode while one is. Write mode has exactly one owner, the
//! [`crate::TxCtx`] that issued the outermost BEGIN; nested BEGINs by the
//! owner only deepen the nesting level. Other callers wanting to write
//! wait until the owner's final COMMIT or ROLLBACK.
//!
//! Two locks cooperate: a short control mutex guarding [`Control`], and
//! the [`Gate`] held for writing for the whole life of the write
//! transaction and for reading by non-owners while they run a query.

mod gate;
mod state;

pub(crate) use gate::Gate;
pub(crate) use state::{Control, Mode};
