//! Stress tests for Quarry.
//!
//! These tests verify behavior under heavy load and concurrent access.

use quarry_core::{compile, Database, List, TxCtx, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            duration,
            ops_per_second,
        }
    }

    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Failed: {}", self.failed_ops);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of operations to perform.
    pub operations: usize,
    /// Number of concurrent threads (for concurrent tests).
    pub threads: usize,
    /// Rows inserted per transaction.
    pub batch_size: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 10_000,
            threads: 4,
            batch_size: 100,
        }
    }
}

fn compiled(sql: &str) -> List {
    compile(sql).expect("Invalid stress statement")
}

/// Creates the table `stress (worker int, n int)` used by the stress runs.
pub fn create_stress_table(db: &Database) {
    db.run(
        Some(&TxCtx::new()),
        "BEGIN TRANSACTION; CREATE TABLE IF NOT EXISTS stress (worker int, n int); COMMIT",
        &[],
    )
    .expect("Failed to create stress table");
}

fn int(n: usize) -> Value {
    Value::Int(i64::try_from(n).unwrap_or(i64::MAX))
}

/// Run a sequential write stress test, one transaction per row.
pub fn stress_sequential_writes(db: &Database, config: &StressConfig) -> StressTestResult {
    create_stress_table(db);
    let insert = compiled("BEGIN TRANSACTION; INSERT INTO stress VALUES (0, $1); COMMIT");
    let tx = TxCtx::new();

    let start = Instant::now();
    let mut successful = 0usize;
    let mut failed = 0usize;
    for i in 0..config.operations {
        match db.execute(Some(&tx), &insert, &[int(i)]) {
            Ok(_) => successful += 1,
            Err(_) => failed += 1,
        }
    }
    StressTestResult::new(successful, failed, start.elapsed())
}

/// Run a write stress test with several threads competing for the single
/// writer slot. Each thread commits `operations / threads` rows in batches.
pub fn stress_concurrent_writers(db: &Database, config: &StressConfig) -> StressTestResult {
    create_stress_table(db);
    let begin = compiled("BEGIN TRANSACTION");
    let insert = compiled("INSERT INTO stress VALUES ($1, $2)");
    let commit = compiled("COMMIT");
    let rollback = compiled("ROLLBACK");
    let per_thread = config.operations / config.threads;
    let batch = config.batch_size.max(1);

    let successful = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);
    let start = Instant::now();

    thread::scope(|s| {
        for worker in 0..config.threads {
            let (begin, insert, commit, rollback) = (&begin, &insert, &commit, &rollback);
            let (successful, failed) = (&successful, &failed);
            s.spawn(move || {
                let tx = TxCtx::new();
                let mut done = 0;
                while done < per_thread {
                    let rows = batch.min(per_thread - done);
                    let result = db.execute(Some(&tx), begin, &[]).and_then(|_| {
                        for n in done..done + rows {
                            db.execute(Some(&tx), insert, &[int(worker), int(n)])?;
                        }
                        db.execute(Some(&tx), commit, &[])
                    });
                    match result {
                        Ok(_) => successful.fetch_add(rows, Ordering::Relaxed),
                        Err(_) => {
                            // only succeeds if this worker still owns the transaction
                            let _ = db.execute(Some(&tx), rollback, &[]);
                            failed.fetch_add(rows, Ordering::Relaxed)
                        }
                    };
                    done += rows;
                }
            });
        }
    });

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    )
}

/// Run concurrent readers against one writer.
///
/// Every read must observe a whole number of committed batches.
pub fn stress_readers_and_writer(db: &Database, config: &StressConfig) -> StressTestResult {
    create_stress_table(db);
    let batch = config.batch_size.max(1);
    let batches = config.operations / batch;
    let count = compiled("SELECT count(*) FROM stress WHERE worker == -1");
    let successful = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);
    let writing = AtomicUsize::new(1);
    let start = Instant::now();

    thread::scope(|s| {
        s.spawn(|| {
            let tx = TxCtx::new();
            for b in 0..batches {
                let sql = format!(
                    "BEGIN TRANSACTION; {} COMMIT",
                    "INSERT INTO stress VALUES (-1, $1);".repeat(batch)
                );
                match db.run(Some(&tx), &sql, &[int(b)]) {
                    Ok(_) => successful.fetch_add(1, Ordering::Relaxed),
                    Err(_) => failed.fetch_add(1, Ordering::Relaxed),
                };
            }
            writing.store(0, Ordering::Release);
        });
        for _ in 0..config.threads {
            s.spawn(|| loop {
                let stop = writing.load(Ordering::Acquire) == 0;
                let seen = db
                    .execute(None, &count, &[])
                    .ok()
                    .and_then(|rs| rs[0].first_row().ok().flatten())
                    .and_then(|row| row[0].as_int());
                match seen {
                    Some(n) if usize::try_from(n).is_ok_and(|n| n % batch == 0) => {
                        successful.fetch_add(1, Ordering::Relaxed)
                    }
                    _ => failed.fetch_add(1, Ordering::Relaxed),
                };
                if stop {
                    break;
                }
            });
        }
    });

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    )
}

/// Run a transaction abort stress test. Every other transaction fails on
/// a bad statement and must leave no trace.
pub fn stress_transaction_aborts(db: &Database, config: &StressConfig) -> StressTestResult {
    create_stress_table(db);
    let good = compiled("BEGIN TRANSACTION; INSERT INTO stress VALUES (1, $1); COMMIT");
    let bad = compiled(
        "BEGIN TRANSACTION; INSERT INTO stress VALUES (1, $1); INSERT INTO missing VALUES (1); COMMIT",
    );
    let tx = TxCtx::new();

    let start = Instant::now();
    let mut successful = 0usize;
    let mut failed = 0usize;
    for i in 0..config.operations {
        let list = if i % 2 == 0 { &bad } else { &good };
        match db.execute(Some(&tx), list, &[int(i)]) {
            Ok(_) => successful += 1,
            Err(_) => failed += 1,
        }
    }
    StressTestResult::new(successful, failed, start.elapsed())
}
