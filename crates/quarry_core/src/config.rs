//! Database configuration.

use std::time::Duration;

/// Configuration for opening a database.
#[derive(Debug, Clone)]
pub struct Config {
    /// Whether to create the database file if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether to batch physical commits on durable storages.
    pub autocommit: bool,

    /// How long an autocommit batch stays open waiting for more work.
    pub grace_period: Duration,

    /// Whether to sync the journal on every durable commit (safer but slower).
    pub sync_on_commit: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            autocommit: true,
            grace_period: Duration::from_secs(1),
            sync_on_commit: true,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the database if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Enables or disables autocommit batching.
    #[must_use]
    pub const fn autocommit(mut self, value: bool) -> Self {
        self.autocommit = value;
        self
    }

    /// Sets the autocommit grace period.
    #[must_use]
    pub const fn grace_period(mut self, period: Duration) -> Self {
        self.grace_period = period;
        self
    }

    /// Sets whether to sync the journal on every durable commit.
    #[must_use]
    pub const fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }
}
