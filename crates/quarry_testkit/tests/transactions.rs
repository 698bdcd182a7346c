//! Property tests for nested transactions against an in-memory model.

use proptest::prelude::*;
use quarry_core::{Config, Database, TxCtx, Value};
use quarry_testkit::prelude::*;
use std::time::Duration;

proptest! {
    #![proptest_config(PropTestConfig::default().to_proptest_config())]

    #[test]
    fn random_operations_match_the_model(ops in operation_sequence_strategy(1, 40)) {
        let mut harness = TxModelHarness::new();
        for op in &ops {
            harness.apply(op);
            harness.verify();
        }
        harness.finish();
    }
}

proptest! {
    #![proptest_config(PropTestConfig::quick().to_proptest_config())]

    #[test]
    fn random_operations_survive_reopen(ops in operation_sequence_strategy(1, 30)) {
        let config = Config::new().grace_period(Duration::from_millis(5));
        let mut test_db = TestDatabase::file_with_config(config);
        let mut harness = TxModelHarness::with_database(test_db.db.clone());
        for op in &ops {
            harness.apply(op);
        }
        harness.verify();
        harness.finish();
        let committed = int_column(&test_db.query("SELECT count(*) FROM t", &[]))[0];

        test_db.reopen();
        let reopened = int_column(&test_db.query("SELECT count(*) FROM t", &[]))[0];
        prop_assert_eq!(reopened, committed);
        test_db.verify().unwrap();
    }

    #[test]
    fn failed_lists_leave_the_nesting_level_unchanged(
        opened in 0usize..4,
        extra in 1usize..4,
    ) {
        let db = Database::open_in_memory().unwrap();
        let tx = TxCtx::new();
        db.run(Some(&tx), "BEGIN TRANSACTION; CREATE TABLE t (n int); COMMIT", &[]).unwrap();
        for _ in 0..opened {
            db.run(Some(&tx), "BEGIN TRANSACTION; INSERT INTO t VALUES (1)", &[]).unwrap();
        }

        let sql = format!(
            "{} INSERT INTO t VALUES ('not an int')",
            "BEGIN TRANSACTION; INSERT INTO t VALUES (2);".repeat(extra)
        );
        let err = db.run(Some(&tx), &sql, &[]).unwrap_err();
        prop_assert_eq!(err.index, extra * 2);
        prop_assert_eq!(db.nesting_level(), opened);

        let twos = query(&db, Some(&tx), "SELECT count(*) FROM t WHERE n == $1", &[Value::Int(2)]);
        prop_assert_eq!(int_column(&twos), vec![0]);
    }
}
