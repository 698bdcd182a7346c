//! Database facade and transaction controller.

use crate::autocommit::Autocommit;
use crate::config::Config;
use crate::error::{CoreError, CoreResult, ExecuteError};
use crate::recordset::Recordset;
use crate::root::{Root, RootStack, ROOT_HANDLE};
use crate::rset::{ExecCtx, Rset, Sink};
use crate::sql::compile;
use crate::stmt::{List, Stmt};
use crate::table::{record_handle, Table};
use crate::transaction::{Control, Gate, Mode};
use crate::types::TxCtx;
use parking_lot::{Condvar, Mutex, RwLock};
use quarry_codec::Value;
use quarry_storage::{FileOptions, FileStorage, Handle, MemoryStorage, Storage, StorageError};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, Weak};
use std::thread;
use tracing::{debug, info, warn};

/// Engine state shared by [`Database`] handles and recordsets.
pub(crate) struct DbInner {
    pub(crate) store: Arc<dyn Storage>,
    /// Snapshot roots; depth equals the nesting level.
    pub(crate) roots: RwLock<RootStack>,
    config: Config,
    control: Mutex<Control>,
    /// Signalled when write mode is vacated.
    vacated: Condvar,
    gate: Gate,
}

impl DbInner {
    fn open(config: Config, store: Arc<dyn Storage>) -> CoreResult<Arc<Self>> {
        let base = load_root(&*store)?;
        let batching = config.autocommit && store.acid();
        info!(
            storage = store.name(),
            tables = base.tables().count(),
            autocommit = batching,
            "database opened"
        );
        Ok(Arc::new(Self {
            store,
            roots: RwLock::new(RootStack::new(base)),
            config,
            control: Mutex::new(Control::new(Autocommit::new(batching))),
            vacated: Condvar::new(),
            gate: Gate::new(),
        }))
    }

    fn begin(self: &Arc<Self>, token: Option<&TxCtx>) -> CoreResult<()> {
        let Some(token) = token else {
            return Err(CoreError::transaction(
                "BEGIN TRANSACTION: must use R/W context, have nil",
            ));
        };

        let mut control = self.control.lock();
        loop {
            if control.closed {
                return Err(CoreError::DatabaseClosed);
            }
            if control.mode == Mode::Read {
                break;
            }
            if control.owns(Some(token)) {
                self.store.begin_transaction()?;
                self.roots.write().begin();
                control.tnl += 1;
                debug!(tnl = control.tnl, "BEGIN TRANSACTION");
                return Ok(());
            }
            self.vacated.wait(&mut control);
        }

        // Claim ownership before blocking on the gate so that concurrent
        // BEGINs queue on the condvar instead of on the gate.
        control.claim(token);
        drop(control);
        self.gate.acquire_write();
        let mut control = self.control.lock();

        match self.open_outermost(&mut control) {
            Ok(()) => {
                self.roots.write().begin();
                control.tnl = 1;
                debug!(tnl = 1, "BEGIN TRANSACTION");
                Ok(())
            }
            Err(err) => {
                control.vacate();
                drop(control);
                self.gate.release_write();
                self.vacated.notify_all();
                Err(err)
            }
        }
    }

    fn open_outermost(self: &Arc<Self>, control: &mut Control) -> CoreResult<()> {
        if let Some(generation) = control.autocommit.enter(&*self.store)? {
            self.arm_timer(generation);
        }
        if let Err(err) = self.store.begin_transaction() {
            control.autocommit.leave(&*self.store)?;
            return Err(err.into());
        }
        Ok(())
    }

    /// COMMIT (`commit == true`) or ROLLBACK of the innermost level.
    fn finish(&self, token: Option<&TxCtx>, commit: bool) -> CoreResult<()> {
        let what = if commit { "COMMIT" } else { "ROLLBACK" };
        let mut control = self.control.lock();
        if control.closed {
            return Err(CoreError::DatabaseClosed);
        }
        if control.mode == Mode::Read {
            return Err(CoreError::transaction(format!("{what}: not in transaction")));
        }
        if !control.owns(token) {
            return Err(CoreError::transaction("invalid passed transaction context"));
        }

        if commit {
            self.store.commit()?;
            self.roots.write().commit()?;
        } else {
            self.store.rollback()?;
            self.roots.write().rollback()?;
        }
        control.tnl -= 1;
        debug_assert_eq!(self.roots.read().depth(), control.tnl);
        debug!(tnl = control.tnl, "{what}");
        if control.tnl > 0 {
            return Ok(());
        }

        let left = control.autocommit.leave(&*self.store);
        control.vacate();
        drop(control);
        self.gate.release_write();
        self.vacated.notify_all();
        left
    }

    /// Runs a statement other than BEGIN, COMMIT and ROLLBACK.
    fn dispatch(
        self: &Arc<Self>,
        token: Option<&TxCtx>,
        stmt: &Stmt,
        args: &Arc<[Value]>,
    ) -> CoreResult<Option<Recordset>> {
        let owner = {
            let control = self.control.lock();
            if control.closed {
                return Err(CoreError::DatabaseClosed);
            }
            control.owns(token)
        };
        let ctx = ExecCtx::new(self, args);

        if !stmt.is_updating() {
            return Ok(stmt
                .exec(&ctx)?
                .map(|plan| Recordset::new(Arc::clone(self), token.cloned(), Arc::clone(args), plan)));
        }
        if !owner {
            return Err(CoreError::transaction(
                "attempt to update the DB outside of a transaction",
            ));
        }

        if let Some(generation) = self.control.lock().autocommit.enter(&*self.store)? {
            self.arm_timer(generation);
        }
        let result = stmt.exec(&ctx);
        let left = self.control.lock().autocommit.leave(&*self.store);
        result?;
        left?;
        Ok(None)
    }

    pub(crate) fn execute(
        self: &Arc<Self>,
        token: Option<&TxCtx>,
        list: &List,
        args: &[Value],
    ) -> Result<Vec<Recordset>, ExecuteError> {
        let args: Arc<[Value]> = args.into();
        let tnl0 = {
            let control = self.control.lock();
            if control.owns(token) {
                control.tnl
            } else {
                0
            }
        };

        let mut recordsets = Vec::new();
        for (index, stmt) in list.stmts().iter().enumerate() {
            let result = match stmt {
                Stmt::Begin => self.begin(token).map(|()| None),
                Stmt::Commit => self.finish(token, true).map(|()| None),
                Stmt::Rollback => self.finish(token, false).map(|()| None),
                _ => self.dispatch(token, stmt, &args),
            };
            match result {
                Ok(Some(rs)) => recordsets.push(rs),
                Ok(None) => {}
                Err(err) => {
                    let source = match self.unwind(token, tnl0) {
                        Ok(()) => err,
                        Err(unwind) => unwind,
                    };
                    return Err(ExecuteError {
                        index,
                        recordsets,
                        source,
                    });
                }
            }
        }
        Ok(recordsets)
    }

    /// Rolls back the levels opened since the list started.
    fn unwind(&self, token: Option<&TxCtx>, tnl0: usize) -> CoreResult<()> {
        loop {
            let tnl = {
                let control = self.control.lock();
                if !control.owns(token) {
                    return Ok(());
                }
                control.tnl
            };
            if tnl <= tnl0 {
                return Ok(());
            }
            debug!(tnl, tnl0, "unwinding after failed statement");
            self.finish(token, false)?;
        }
    }

    /// Runs `plan`, holding the gate for reading unless `token` owns the
    /// write transaction.
    pub(crate) fn drain(
        &self,
        token: Option<&TxCtx>,
        args: &[Value],
        plan: &dyn Rset,
        sink: &mut Sink<'_>,
    ) -> CoreResult<()> {
        let owner = {
            let control = self.control.lock();
            if control.closed {
                return Err(CoreError::DatabaseClosed);
            }
            control.owns(token)
        };
        let _guard = if owner { None } else { Some(self.gate.read()) };
        plan.run(&ExecCtx::new(self, args), sink)
    }

    fn arm_timer(self: &Arc<Self>, generation: u64) {
        let weak = Arc::downgrade(self);
        let period = self.config.grace_period;
        let spawned = thread::Builder::new()
            .name("quarry-autocommit".into())
            .spawn(move || {
                thread::sleep(period);
                if let Some(db) = Weak::upgrade(&weak) {
                    db.autocommit_timeout(generation);
                }
            });
        if let Err(err) = spawned {
            warn!(%err, generation, "failed to start autocommit timer");
        }
    }

    fn autocommit_timeout(&self, generation: u64) {
        let mut control = self.control.lock();
        if control.closed {
            return;
        }
        if let Err(err) = control.autocommit.timeout(generation, &*self.store) {
            warn!(%err, generation, "autocommit batch commit failed");
        }
    }

    fn close(&self) -> CoreResult<()> {
        let mut control = self.control.lock();
        if control.closed {
            return Ok(());
        }
        if control.mode == Mode::Write {
            return Err(CoreError::OpenTransaction);
        }
        if control.autocommit.is_open() {
            debug!("flushing autocommit batch");
        }
        control.autocommit.flush(&*self.store)?;
        control.closed = true;
        self.store.close()?;
        info!(storage = self.store.name(), "database closed");
        Ok(())
    }

    fn table_names(&self, token: Option<&TxCtx>) -> CoreResult<Vec<String>> {
        let owner = {
            let control = self.control.lock();
            if control.closed {
                return Err(CoreError::DatabaseClosed);
            }
            control.owns(token)
        };
        let _guard = if owner { None } else { Some(self.gate.read()) };
        Ok(self.roots.read().current().names())
    }

    fn ensure_open(&self) -> CoreResult<()> {
        if self.control.lock().closed {
            Err(CoreError::DatabaseClosed)
        } else {
            Ok(())
        }
    }

    fn verify(&self) -> CoreResult<()> {
        self.ensure_open()?;
        let _guard = self.gate.read();
        self.store.verify()?;

        let roots = self.roots.read();
        let root = roots.current();
        let stored = load_root(&*self.store)?;
        if stored.thead != root.thead {
            return Err(CoreError::corrupted(format!(
                "table list head is {} but {} is loaded",
                stored.thead, root.thead
            )));
        }
        for table in stored.tables() {
            let loaded = root
                .table(&table.name)
                .ok_or_else(|| CoreError::corrupted(format!("table {} is not loaded", table.name)))?;
            if **table != *loaded {
                return Err(CoreError::corrupted(format!(
                    "table {} differs from its stored record",
                    table.name
                )));
            }
            let mut seen = HashSet::new();
            table.scan(&*self.store, |row| {
                if !seen.insert(row.handle) {
                    return Err(CoreError::corrupted(format!("table {}: row chain loops", table.name)));
                }
                Ok(true)
            })?;
        }
        if stored.tables().count() != root.tables().count() {
            return Err(CoreError::corrupted("loaded tables are missing from the table list"));
        }
        Ok(())
    }
}

impl Drop for DbInner {
    fn drop(&mut self) {
        let control = self.control.get_mut();
        if control.closed || control.tnl > 0 {
            return;
        }
        if let Err(err) = control.autocommit.flush(&*self.store) {
            warn!(%err, "autocommit flush on drop failed");
        }
        if let Err(err) = self.store.close() {
            warn!(%err, "storage close on drop failed");
        }
    }
}

/// Reads the table list, creating the root record of an empty storage.
fn load_root(store: &dyn Storage) -> CoreResult<Root> {
    let thead = match store.read(ROOT_HANDLE) {
        Ok(record) => record
            .first()
            .and_then(record_handle)
            .ok_or_else(|| CoreError::corrupted("malformed root record"))?,
        Err(StorageError::NotFound { .. }) => {
            create_root(store)?;
            0
        }
        Err(err) => return Err(err.into()),
    };

    let mut tables = Vec::new();
    let mut seen = HashSet::new();
    let mut handle: Handle = thead;
    while handle != 0 {
        if !seen.insert(handle) {
            return Err(CoreError::corrupted("table list loops"));
        }
        let record = match store.read(handle) {
            Ok(record) => record,
            Err(StorageError::NotFound { .. }) => {
                return Err(CoreError::corrupted(format!(
                    "table list points at missing record {handle}"
                )))
            }
            Err(err) => return Err(err.into()),
        };
        let table = Table::from_record(handle, &record)?;
        handle = table.next;
        tables.push(table);
    }
    Ok(Root::new(tables, thead))
}

fn create_root(store: &dyn Storage) -> CoreResult<()> {
    store.begin_transaction()?;
    let created = store
        .reset_id()
        .and_then(|()| store.create(&[Value::Int(0)]));
    match created {
        Ok(ROOT_HANDLE) => Ok(store.commit()?),
        Ok(handle) => {
            store.rollback()?;
            Err(CoreError::corrupted(format!(
                "root record allocated at {handle}, expected {ROOT_HANDLE}"
            )))
        }
        Err(err) => {
            let _ = store.rollback();
            Err(err.into())
        }
    }
}

/// The main database handle.
///
/// `Database` is cheap to clone; clones share one engine. The engine lives
/// as long as any handle or [`Recordset`] refers to it.
///
/// # Transactions
///
/// Updating statements must run inside `BEGIN TRANSACTION` ... `COMMIT`
/// issued with a [`TxCtx`]. Transactions nest; only the outermost COMMIT
/// makes the work durable. While one context owns a write transaction,
/// other contexts wanting to write wait, and queries by other callers wait
/// for the transaction to end.
///
/// ```rust
/// use quarry_core::{Database, TxCtx, Value};
///
/// let db = Database::open_in_memory().unwrap();
/// let tx = TxCtx::new();
/// db.run(
///     Some(&tx),
///     "BEGIN TRANSACTION; CREATE TABLE t (a int); INSERT INTO t VALUES ($1); COMMIT;",
///     &[Value::Int(7)],
/// )
/// .unwrap();
///
/// let rs = db.run(None, "SELECT a FROM t", &[]).unwrap();
/// assert_eq!(rs[0].rows(None, 0).unwrap(), vec![vec![Value::Int(7)]]);
/// ```
#[derive(Clone)]
pub struct Database {
    inner: Arc<DbInner>,
}

impl Database {
    /// Opens or creates a database file with the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened, is locked by another
    /// process, or is corrupted.
    pub fn open(path: &Path) -> CoreResult<Self> {
        Self::open_with_config(path, Config::default())
    }

    /// Opens a database file with a custom configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened, is locked by another
    /// process, or is corrupted.
    pub fn open_with_config(path: &Path, config: Config) -> CoreResult<Self> {
        let options = FileOptions {
            create_if_missing: config.create_if_missing,
            sync_on_commit: config.sync_on_commit,
        };
        let store = FileStorage::open_with_options(path, options)?;
        Self::open_with_storage(config, Arc::new(store))
    }

    /// Opens an ephemeral in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if the root record cannot be created.
    pub fn open_in_memory() -> CoreResult<Self> {
        Self::open_with_storage(Config::default(), Arc::new(MemoryStorage::new()))
    }

    /// Opens a database over any storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the table list cannot be loaded.
    pub fn open_with_storage(config: Config, store: Arc<dyn Storage>) -> CoreResult<Self> {
        Ok(Self {
            inner: DbInner::open(config, store)?,
        })
    }

    /// Executes a compiled statement list.
    ///
    /// Returns one recordset per SELECT. When a statement fails, every
    /// transaction level opened since the call started is rolled back and
    /// the error reports the index of the failing statement together with
    /// the recordsets produced before it.
    ///
    /// # Errors
    ///
    /// Returns [`ExecuteError`] for the first failing statement.
    pub fn execute(
        &self,
        token: Option<&TxCtx>,
        list: &List,
        args: &[Value],
    ) -> Result<Vec<Recordset>, ExecuteError> {
        self.inner.execute(token, list, args)
    }

    /// Compiles and executes `sql`.
    ///
    /// # Errors
    ///
    /// A compile error is reported as a failure of statement 0.
    pub fn run(
        &self,
        token: Option<&TxCtx>,
        sql: &str,
        args: &[Value],
    ) -> Result<Vec<Recordset>, ExecuteError> {
        let list = compile(sql).map_err(|err| ExecuteError::new(0, err))?;
        self.execute(token, &list, args)
    }

    /// Closes the database, committing any pending autocommit batch.
    ///
    /// Closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::OpenTransaction`] while a transaction is open.
    pub fn close(&self) -> CoreResult<()> {
        self.inner.close()
    }

    /// Checks the storage and the table structures for consistency.
    ///
    /// Waits for an open write transaction to end.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Corrupted`] or a storage error on damage.
    pub fn verify(&self) -> CoreResult<()> {
        self.inner.verify()
    }

    /// Names of the tables visible to `token`, sorted.
    ///
    /// The owner of the open write transaction sees its own schema changes.
    /// Other callers wait for that transaction to end, like any other read.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DatabaseClosed`] after close.
    pub fn table_names(&self, token: Option<&TxCtx>) -> CoreResult<Vec<String>> {
        self.inner.table_names(token)
    }

    /// Current transaction nesting level, 0 when no transaction is open.
    #[must_use]
    pub fn nesting_level(&self) -> usize {
        self.inner.control.lock().tnl
    }

    /// Whether a write transaction is open.
    #[must_use]
    pub fn is_in_transaction(&self) -> bool {
        self.inner.control.lock().mode == Mode::Write
    }

    /// Checks if the database is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.inner.control.lock().closed
    }

    /// Returns database configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Name of the underlying storage.
    #[must_use]
    pub fn storage_name(&self) -> &str {
        self.inner.store.name()
    }

    #[cfg(test)]
    pub(crate) fn inner(&self) -> &Arc<DbInner> {
        &self.inner
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("storage", &self.inner.store.name())
            .field("nesting_level", &self.nesting_level())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    fn create_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn count(db: &Database, table: &str) -> i64 {
        let rs = db
            .run(None, &format!("SELECT count() FROM {table}"), &[])
            .unwrap();
        rs[0].first_row().unwrap().unwrap()[0].as_int().unwrap()
    }

    #[test]
    fn open_in_memory() {
        let db = create_db();
        assert!(db.is_open());
        assert_eq!(db.storage_name(), "memory");
        assert!(db.table_names(None).unwrap().is_empty());
        assert_eq!(db.nesting_level(), 0);
        assert!(!db.is_in_transaction());
    }

    #[test]
    fn begin_requires_a_context() {
        let db = create_db();
        let err = db.run(None, "BEGIN TRANSACTION", &[]).unwrap_err();
        assert_eq!(
            err.source.to_string(),
            "BEGIN TRANSACTION: must use R/W context, have nil"
        );
    }

    #[test]
    fn commit_and_rollback_outside_a_transaction() {
        let db = create_db();
        let tx = TxCtx::new();
        let err = db.run(Some(&tx), "COMMIT", &[]).unwrap_err();
        assert_eq!(err.source.to_string(), "COMMIT: not in transaction");
        let err = db.run(Some(&tx), "ROLLBACK", &[]).unwrap_err();
        assert_eq!(err.source.to_string(), "ROLLBACK: not in transaction");
    }

    #[test]
    fn nested_levels_across_calls() {
        let db = create_db();
        let tx = TxCtx::new();
        db.run(Some(&tx), "BEGIN TRANSACTION; CREATE TABLE t (a int)", &[])
            .unwrap();
        assert_eq!(db.nesting_level(), 1);
        db.run(Some(&tx), "BEGIN TRANSACTION; INSERT INTO t VALUES (1)", &[])
            .unwrap();
        assert_eq!(db.nesting_level(), 2);
        db.run(Some(&tx), "ROLLBACK; INSERT INTO t VALUES (2); COMMIT", &[])
            .unwrap();
        assert_eq!(db.nesting_level(), 0);
        let rs = db.run(None, "SELECT a FROM t", &[]).unwrap();
        assert_eq!(rs[0].rows(None, 0).unwrap(), vec![vec![Value::Int(2)]]);
    }

    #[test]
    fn wrong_context_cannot_commit() {
        let db = create_db();
        let owner = TxCtx::new();
        let other = TxCtx::new();
        db.run(Some(&owner), "BEGIN TRANSACTION", &[]).unwrap();
        let err = db.run(Some(&other), "COMMIT", &[]).unwrap_err();
        assert_eq!(err.source.to_string(), "invalid passed transaction context");
        assert_eq!(db.nesting_level(), 1);
        db.run(Some(&owner), "COMMIT", &[]).unwrap();
    }

    #[test]
    fn failure_unwinds_only_levels_opened_by_the_call() {
        let db = create_db();
        let tx = TxCtx::new();
        db.run(Some(&tx), "BEGIN TRANSACTION; CREATE TABLE t (a int)", &[])
            .unwrap();
        let err = db
            .run(
                Some(&tx),
                "BEGIN TRANSACTION; INSERT INTO t VALUES (1); BEGIN TRANSACTION; INSERT INTO nope VALUES (1)",
                &[],
            )
            .unwrap_err();
        assert_eq!(err.index, 3);
        assert_eq!(err.source.to_string(), "table nope does not exist");
        assert_eq!(db.nesting_level(), 1);
        db.run(Some(&tx), "COMMIT", &[]).unwrap();
        assert_eq!(count(&db, "t"), 0);
    }

    #[test]
    fn recordsets_before_the_failure_are_returned() {
        let db = create_db();
        let tx = TxCtx::new();
        db.run(Some(&tx), "BEGIN TRANSACTION; CREATE TABLE t (a int); COMMIT", &[])
            .unwrap();
        let err = db
            .run(Some(&tx), "SELECT * FROM t; SELECT * FROM t; COMMIT", &[])
            .unwrap_err();
        assert_eq!(err.index, 2);
        assert_eq!(err.recordsets.len(), 2);
    }

    #[test]
    fn schema_changes_roll_back() {
        let db = create_db();
        let tx = TxCtx::new();
        db.run(Some(&tx), "BEGIN TRANSACTION; CREATE TABLE keep (a int); COMMIT", &[])
            .unwrap();
        db.run(
            Some(&tx),
            "BEGIN TRANSACTION; CREATE TABLE gone (a int); DROP TABLE keep; ALTER TABLE gone ADD b int",
            &[],
        )
        .unwrap();
        assert_eq!(db.table_names(Some(&tx)).unwrap(), vec!["gone".to_string()]);
        db.run(Some(&tx), "ROLLBACK", &[]).unwrap();
        assert_eq!(db.table_names(None).unwrap(), vec!["keep".to_string()]);
        db.verify().unwrap();
    }

    #[test]
    fn nested_commit_keeps_schema_changes() {
        let db = create_db();
        let tx = TxCtx::new();
        db.run(
            Some(&tx),
            "BEGIN TRANSACTION; CREATE TABLE t (a int); \
             BEGIN TRANSACTION; ALTER TABLE t ADD b int; INSERT INTO t VALUES (1, 2); COMMIT; \
             COMMIT",
            &[],
        )
        .unwrap();
        let rs = db.run(None, "SELECT * FROM t", &[]).unwrap();
        assert_eq!(rs[0].fields().unwrap(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(
            rs[0].rows(None, 0).unwrap(),
            vec![vec![Value::Int(1), Value::Int(2)]]
        );
        db.verify().unwrap();
    }

    #[test]
    fn second_writer_waits_for_the_first() {
        let db = create_db();
        let a = TxCtx::new();
        db.run(Some(&a), "BEGIN TRANSACTION; CREATE TABLE t (a int)", &[])
            .unwrap();

        let started = Arc::new(AtomicBool::new(false));
        let writer = {
            let db = db.clone();
            let started = Arc::clone(&started);
            thread::spawn(move || {
                let b = TxCtx::new();
                db.run(Some(&b), "BEGIN TRANSACTION", &[]).unwrap();
                started.store(true, Ordering::SeqCst);
                db.run(Some(&b), "INSERT INTO t VALUES (2); COMMIT", &[])
                    .unwrap();
            })
        };
        thread::sleep(Duration::from_millis(50));
        assert!(!started.load(Ordering::SeqCst));
        db.run(Some(&a), "INSERT INTO t VALUES (1); COMMIT", &[])
            .unwrap();
        writer.join().unwrap();
        assert_eq!(count(&db, "t"), 2);
    }

    #[test]
    fn readers_wait_for_the_writer() {
        let db = create_db();
        let tx = TxCtx::new();
        db.run(Some(&tx), "BEGIN TRANSACTION; CREATE TABLE t (a int); COMMIT", &[])
            .unwrap();
        db.run(Some(&tx), "BEGIN TRANSACTION; INSERT INTO t VALUES (1)", &[])
            .unwrap();

        let reader = {
            let db = db.clone();
            thread::spawn(move || count(&db, "t"))
        };
        thread::sleep(Duration::from_millis(50));
        db.run(Some(&tx), "COMMIT", &[]).unwrap();
        assert_eq!(reader.join().unwrap(), 1);
    }

    #[test]
    fn table_names_hide_uncommitted_tables_from_others() {
        let db = create_db();
        let tx = TxCtx::new();
        db.run(Some(&tx), "BEGIN TRANSACTION; CREATE TABLE uncommitted (x int)", &[])
            .unwrap();
        assert_eq!(
            db.table_names(Some(&tx)).unwrap(),
            vec!["uncommitted".to_string()]
        );

        let other = {
            let db = db.clone();
            thread::spawn(move || db.table_names(None).unwrap())
        };
        thread::sleep(Duration::from_millis(50));
        db.run(Some(&tx), "ROLLBACK", &[]).unwrap();
        assert!(other.join().unwrap().is_empty());
    }

    #[test]
    fn owner_reads_its_own_writes() {
        let db = create_db();
        let tx = TxCtx::new();
        let rs = db
            .run(
                Some(&tx),
                "BEGIN TRANSACTION; CREATE TABLE t (a int); INSERT INTO t VALUES (5); SELECT * FROM t",
                &[],
            )
            .unwrap();
        assert_eq!(rs[0].rows(None, 0).unwrap(), vec![vec![Value::Int(5)]]);
        db.run(Some(&tx), "ROLLBACK", &[]).unwrap();
    }

    /// Memory storage whose `close` always fails.
    #[derive(Default)]
    struct StuckClose {
        inner: MemoryStorage,
        close_calls: std::sync::atomic::AtomicUsize,
    }

    impl Storage for StuckClose {
        fn name(&self) -> &str {
            "stuck"
        }
        fn acid(&self) -> bool {
            false
        }
        fn begin_transaction(&self) -> quarry_storage::StorageResult<()> {
            self.inner.begin_transaction()
        }
        fn commit(&self) -> quarry_storage::StorageResult<()> {
            self.inner.commit()
        }
        fn rollback(&self) -> quarry_storage::StorageResult<()> {
            self.inner.rollback()
        }
        fn create(&self, data: &[Value]) -> quarry_storage::StorageResult<Handle> {
            self.inner.create(data)
        }
        fn read(&self, handle: Handle) -> quarry_storage::StorageResult<Vec<Value>> {
            self.inner.read(handle)
        }
        fn update(&self, handle: Handle, data: &[Value]) -> quarry_storage::StorageResult<()> {
            self.inner.update(handle, data)
        }
        fn delete(&self, handle: Handle) -> quarry_storage::StorageResult<()> {
            self.inner.delete(handle)
        }
        fn id(&self) -> quarry_storage::StorageResult<i64> {
            self.inner.id()
        }
        fn reset_id(&self) -> quarry_storage::StorageResult<()> {
            self.inner.reset_id()
        }
        fn create_temp(&self, ascending: bool) -> quarry_storage::StorageResult<Box<dyn quarry_storage::Temp>> {
            self.inner.create_temp(ascending)
        }
        fn verify(&self) -> quarry_storage::StorageResult<()> {
            self.inner.verify()
        }
        fn close(&self) -> quarry_storage::StorageResult<()> {
            self.close_calls.fetch_add(1, Ordering::SeqCst);
            Err(StorageError::Corrupted("close failed".into()))
        }
    }

    #[test]
    fn drop_survives_a_failing_storage_close() {
        let store = Arc::new(StuckClose::default());
        let db = Database::open_with_storage(Config::default(), Arc::clone(&store) as Arc<dyn Storage>)
            .unwrap();
        let tx = TxCtx::new();
        db.run(Some(&tx), "BEGIN TRANSACTION; CREATE TABLE t (a int); COMMIT", &[])
            .unwrap();
        drop(db);
        assert_eq!(store.close_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn close_refuses_open_transaction() {
        let db = create_db();
        let tx = TxCtx::new();
        db.run(Some(&tx), "BEGIN TRANSACTION", &[]).unwrap();
        assert!(matches!(db.close(), Err(CoreError::OpenTransaction)));
        db.run(Some(&tx), "COMMIT", &[]).unwrap();
        db.close().unwrap();
        db.close().unwrap();
        assert!(!db.is_open());
        let err = db.run(None, "SELECT * FROM t", &[]).unwrap_err();
        assert!(matches!(err.source, CoreError::DatabaseClosed));
        assert!(matches!(db.table_names(None), Err(CoreError::DatabaseClosed)));
    }

    #[test]
    fn compile_errors_are_statement_zero() {
        let db = create_db();
        let err = db.run(None, "SELECT FROM", &[]).unwrap_err();
        assert_eq!(err.index, 0);
        assert!(matches!(err.source, CoreError::Syntax { .. }));
    }
}
