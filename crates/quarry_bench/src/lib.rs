//! Benchmark utilities.

use quarry_core::{Database, TxCtx, Value};
use rand::Rng;

/// Generates `count` random rows shaped `(int, string, float)`.
pub fn random_rows(count: usize) -> Vec<Vec<Value>> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|_| {
            let name: String = (0..8).map(|_| rng.gen_range(b'a'..=b'z') as char).collect();
            vec![
                Value::Int(rng.gen_range(0..1_000)),
                Value::Text(name),
                Value::Float(rng.gen_range(0.0..100.0)),
            ]
        })
        .collect()
}

/// Opens an in-memory database with `bench (k int, name string, score float)`
/// holding `count` random rows.
pub fn populated_database(count: usize) -> Database {
    let db = Database::open_in_memory().expect("Failed to open database");
    let tx = TxCtx::new();
    db.run(
        Some(&tx),
        "BEGIN TRANSACTION; CREATE TABLE bench (k int, name string, score float)",
        &[],
    )
    .expect("Failed to create table");
    let insert = quarry_core::compile("INSERT INTO bench VALUES ($1, $2, $3)")
        .expect("Failed to compile insert");
    for row in random_rows(count) {
        db.execute(Some(&tx), &insert, &row)
            .expect("Failed to insert row");
    }
    db.run(Some(&tx), "COMMIT", &[]).expect("Failed to commit");
    db
}
