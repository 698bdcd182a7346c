//! File-backed databases: replay, batching of physical commits, locking.

use quarry_core::{Config, CoreError, Database, FileStorage, TxCtx, Value};
use quarry_storage::StorageError;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tempfile::tempdir;

fn open_file(path: &Path, config: Config) -> (Database, Arc<FileStorage>) {
    let store = Arc::new(FileStorage::open(path).unwrap());
    let db = Database::open_with_storage(config, store.clone()).unwrap();
    (db, store)
}

fn values(db: &Database, sql: &str) -> Vec<Vec<Value>> {
    db.run(None, sql, &[]).unwrap()[0].rows(None, 0).unwrap()
}

#[test]
fn reopen_replays_committed_work() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("replay.qdb");
    let tx = TxCtx::new();

    {
        let db = Database::open(&path).unwrap();
        db.run(
            Some(&tx),
            "BEGIN TRANSACTION; CREATE TABLE t (a int, b string); \
             INSERT INTO t VALUES (1, 'one'), (2, 'two'); COMMIT",
            &[],
        )
        .unwrap();
        db.run(Some(&tx), "BEGIN TRANSACTION; INSERT INTO t VALUES (3, 'three')", &[])
            .unwrap();
        db.run(Some(&tx), "ROLLBACK", &[]).unwrap();
        db.close().unwrap();
    }

    let db = Database::open(&path).unwrap();
    assert_eq!(db.table_names(None).unwrap(), vec!["t".to_string()]);
    assert_eq!(
        values(&db, "SELECT a, b FROM t ORDER BY a"),
        vec![
            vec![Value::Int(1), Value::from("one")],
            vec![Value::Int(2), Value::from("two")],
        ]
    );
    db.verify().unwrap();

    // ids keep increasing across sessions
    db.run(Some(&tx), "BEGIN TRANSACTION; INSERT INTO t VALUES (4, 'four'); COMMIT", &[])
        .unwrap();
    let newest = values(&db, "SELECT id() FROM t WHERE a == 4")[0][0].as_int().unwrap();
    let older = values(&db, "SELECT id() FROM t WHERE a < 4");
    assert_eq!(older.len(), 2);
    assert!(older.iter().all(|row| row[0].as_int().unwrap() < newest));
}

#[test]
fn schema_changes_survive_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("schema.qdb");
    let tx = TxCtx::new();
    {
        let db = Database::open(&path).unwrap();
        db.run(
            Some(&tx),
            "BEGIN TRANSACTION; CREATE TABLE a (x int); CREATE TABLE b (y int); \
             INSERT INTO a VALUES (1); ALTER TABLE a ADD z string; \
             UPDATE a SET z = 'set'; DROP TABLE b; COMMIT",
            &[],
        )
        .unwrap();
        db.close().unwrap();
    }
    let db = Database::open(&path).unwrap();
    assert_eq!(db.table_names(None).unwrap(), vec!["a".to_string()]);
    assert_eq!(
        values(&db, "SELECT * FROM a"),
        vec![vec![Value::Int(1), Value::from("set")]]
    );
}

#[test]
fn autocommit_batches_until_the_grace_period_ends() {
    let dir = tempdir().unwrap();
    let config = Config::new().grace_period(Duration::from_millis(100));
    let (db, store) = open_file(&dir.path().join("batch.qdb"), config);
    let base = store.durable_commits();
    let tx = TxCtx::new();

    db.run(Some(&tx), "BEGIN TRANSACTION; CREATE TABLE t (a int); COMMIT", &[])
        .unwrap();
    db.run(Some(&tx), "BEGIN TRANSACTION; INSERT INTO t VALUES (1); COMMIT", &[])
        .unwrap();
    assert_eq!(store.durable_commits(), base);
    assert_eq!(values(&db, "SELECT a FROM t"), vec![vec![Value::Int(1)]]);

    let mut waited = Duration::ZERO;
    while store.durable_commits() == base && waited < Duration::from_secs(5) {
        thread::sleep(Duration::from_millis(20));
        waited += Duration::from_millis(20);
    }
    assert_eq!(store.durable_commits(), base + 1);
}

#[test]
fn close_flushes_the_open_batch() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("flush.qdb");
    let tx = TxCtx::new();
    {
        let config = Config::new().grace_period(Duration::from_secs(60));
        let (db, store) = open_file(&path, config);
        let base = store.durable_commits();
        db.run(
            Some(&tx),
            "BEGIN TRANSACTION; CREATE TABLE t (a int); INSERT INTO t VALUES (9); COMMIT",
            &[],
        )
        .unwrap();
        assert_eq!(store.durable_commits(), base);
        db.close().unwrap();
        assert_eq!(store.durable_commits(), base + 1);
    }
    let db = Database::open(&path).unwrap();
    assert_eq!(values(&db, "SELECT a FROM t"), vec![vec![Value::Int(9)]]);
}

#[test]
fn disabled_autocommit_commits_every_transaction() {
    let dir = tempdir().unwrap();
    let config = Config::new().autocommit(false);
    let (db, store) = open_file(&dir.path().join("direct.qdb"), config);
    let base = store.durable_commits();
    let tx = TxCtx::new();
    db.run(Some(&tx), "BEGIN TRANSACTION; CREATE TABLE t (a int); COMMIT", &[])
        .unwrap();
    db.run(
        Some(&tx),
        "BEGIN TRANSACTION; BEGIN TRANSACTION; INSERT INTO t VALUES (1); COMMIT; COMMIT",
        &[],
    )
    .unwrap();
    assert_eq!(store.durable_commits(), base + 2);
}

#[test]
fn second_open_is_locked_out() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("locked.qdb");
    let db = Database::open(&path).unwrap();
    let err = Database::open(&path).unwrap_err();
    assert!(matches!(err, CoreError::Storage(StorageError::Locked(_))));
    db.close().unwrap();
    Database::open(&path).unwrap();
}

#[test]
fn missing_file_without_create() {
    let dir = tempdir().unwrap();
    let config = Config::new().create_if_missing(false);
    let err = Database::open_with_config(&dir.path().join("absent.qdb"), config).unwrap_err();
    assert!(matches!(err, CoreError::Storage(StorageError::Io(_))));
}
