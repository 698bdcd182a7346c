use super::{ExecCtx, Item, Rset, Sink};
use crate::error::{CoreError, CoreResult};
use crate::expr::{Env, Expr, Scope};
use quarry_codec::Value;

fn count(clause: &str, expr: &Expr, ctx: &ExecCtx<'_>) -> CoreResult<u64> {
    let scope = Scope::default();
    match expr.eval(&Env::constant(&scope, ctx.args))? {
        Value::Int(n) if n >= 0 => Ok(n.unsigned_abs()),
        v => Err(CoreError::eval(format!(
            "invalid {clause} value {v} (type {})",
            v.type_name()
        ))),
    }
}

/// Skips the first `n` rows.
#[derive(Debug)]
pub(crate) struct OffsetRset {
    pub source: Box<dyn Rset>,
    pub n: Expr,
}

impl Rset for OffsetRset {
    fn run(&self, ctx: &ExecCtx<'_>, sink: &mut Sink<'_>) -> CoreResult<()> {
        let mut skip = count("OFFSET", &self.n, ctx)?;
        self.source.run(ctx, &mut |item| match item {
            Item::Row { .. } if skip > 0 => {
                skip -= 1;
                Ok(true)
            }
            item => sink(item),
        })
    }
}

/// Stops after `n` rows.
#[derive(Debug)]
pub(crate) struct LimitRset {
    pub source: Box<dyn Rset>,
    pub n: Expr,
}

impl Rset for LimitRset {
    fn run(&self, ctx: &ExecCtx<'_>, sink: &mut Sink<'_>) -> CoreResult<()> {
        let mut left = count("LIMIT", &self.n, ctx)?;
        self.source.run(ctx, &mut |item| match item {
            Item::Header(_) => Ok(sink(item)? && left > 0),
            Item::Row { .. } => {
                left -= 1;
                Ok(sink(item)? && left > 0)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rset::testing::{db_with, ints};
    use crate::rset::TableRset;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct Counting {
        inner: TableRset,
        pulled: AtomicUsize,
    }

    impl Rset for Counting {
        fn run(&self, ctx: &ExecCtx<'_>, sink: &mut Sink<'_>) -> CoreResult<()> {
            self.inner.run(ctx, &mut |item| {
                if matches!(item, Item::Row { .. }) {
                    self.pulled.fetch_add(1, Ordering::SeqCst);
                }
                sink(item)
            })
        }
    }

    #[test]
    fn limit_stops_pulling_the_source() {
        let db = db_with("CREATE TABLE t (a int); INSERT INTO t VALUES (1), (2), (3), (4)");
        let limit = LimitRset {
            source: Box::new(Counting {
                inner: TableRset::new("t"),
                pulled: AtomicUsize::new(0),
            }),
            n: Expr::Value(Value::Int(2)),
        };
        let items = crate::rset::testing::collect(&db, &limit).unwrap();
        assert_eq!(items.len(), 3);
        let pulled = format!("{:?}", limit.source);
        assert!(pulled.contains("pulled: 2"));
    }

    #[test]
    fn limit_zero_keeps_header() {
        let db = db_with("CREATE TABLE t (a int); INSERT INTO t VALUES (1)");
        let rs = db.run(None, "SELECT * FROM t LIMIT 0", &[]).unwrap();
        assert_eq!(rs[0].fields().unwrap(), vec!["a".to_string()]);
        assert!(rs[0].rows(None, 0).unwrap().is_empty());
    }

    #[test]
    fn offset_and_limit_with_parameters() {
        let db = db_with("CREATE TABLE t (a int); INSERT INTO t VALUES (1), (2), (3), (4), (5)");
        let rs = db
            .run(
                None,
                "SELECT a FROM t ORDER BY a LIMIT $1 OFFSET $2",
                &[Value::Int(2), Value::Int(1)],
            )
            .unwrap();
        assert_eq!(rs[0].rows(None, 0).unwrap(), ints(&[&[2], &[3]]));
    }

    #[test]
    fn negative_limit_fails() {
        let db = db_with("CREATE TABLE t (a int); INSERT INTO t VALUES (1)");
        let rs = db.run(None, "SELECT * FROM t LIMIT -1", &[]).unwrap();
        assert_eq!(
            rs[0].rows(None, 0).unwrap_err().to_string(),
            "invalid LIMIT value -1 (type int64)"
        );
    }
}
