//! Controller state guarded by the control mutex.

use crate::autocommit::Autocommit;
use crate::types::TxCtx;

/// Mode of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    /// No write transaction.
    Read,
    /// A write transaction is open (or being opened).
    Write,
}

#[derive(Debug)]
pub(crate) struct Control {
    /// Owner of the open write transaction.
    pub cc: Option<TxCtx>,
    /// Transaction nesting level.
    pub tnl: usize,
    pub mode: Mode,
    pub closed: bool,
    pub autocommit: Autocommit,
}

impl Control {
    pub(crate) fn new(autocommit: Autocommit) -> Self {
        Self {
            cc: None,
            tnl: 0,
            mode: Mode::Read,
            closed: false,
            autocommit,
        }
    }

    /// Whether `token` owns the open write transaction.
    pub(crate) fn owns(&self, token: Option<&TxCtx>) -> bool {
        self.mode == Mode::Write && token.is_some() && self.cc.as_ref() == token
    }

    /// Claims write ownership for `token`.
    pub(crate) fn claim(&mut self, token: &TxCtx) {
        self.mode = Mode::Write;
        self.cc = Some(token.clone());
    }

    /// Returns to read mode.
    pub(crate) fn vacate(&mut self) {
        self.mode = Mode::Read;
        self.cc = None;
        self.tnl = 0;
    }
}
