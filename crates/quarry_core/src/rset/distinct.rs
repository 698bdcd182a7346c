use super::{ExecCtx, Item, Rset, Sink};
use crate::error::CoreResult;

/// Removes duplicate rows. Output is in ascending row order.
#[derive(Debug)]
pub(crate) struct DistinctRset {
    pub source: Box<dyn Rset>,
}

impl Rset for DistinctRset {
    fn run(&self, ctx: &ExecCtx<'_>, sink: &mut Sink<'_>) -> CoreResult<()> {
        let mut temp = ctx.store().create_temp(true)?;
        let mut header = Vec::new();
        self.source.run(ctx, &mut |item| {
            match item {
                Item::Header(names) => header = names,
                Item::Row { values, .. } => temp.set(values, Vec::new())?,
            }
            Ok(true)
        })?;

        if !sink(Item::Header(header))? {
            return Ok(());
        }
        for entry in temp.seek_first()? {
            let (values, _) = entry?;
            if !sink(Item::Row { id: None, values })? {
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rset::testing::{collect, db_with, ints, rows};
    use crate::rset::TableRset;

    #[test]
    fn duplicates_collapse_in_ascending_order() {
        let db = db_with("CREATE TABLE t (a int, b int); INSERT INTO t VALUES (2, 1), (1, 1), (2, 1), (1, 2)");
        let distinct = DistinctRset {
            source: Box::new(TableRset::new("t")),
        };
        let items = collect(&db, &distinct).unwrap();
        assert_eq!(items[0], Item::Header(vec!["a".into(), "b".into()]));
        assert_eq!(rows(&items), ints(&[&[1, 1], &[1, 2], &[2, 1]]));
        assert!(items[1..]
            .iter()
            .all(|i| matches!(i, Item::Row { id: None, .. })));
    }

    #[test]
    fn distinct_of_distinct_is_the_same() {
        let db = db_with("CREATE TABLE t (a int); INSERT INTO t VALUES (3), (3), (1)");
        let once = DistinctRset {
            source: Box::new(TableRset::new("t")),
        };
        let twice = DistinctRset {
            source: Box::new(DistinctRset {
                source: Box::new(TableRset::new("t")),
            }),
        };
        assert_eq!(
            rows(&collect(&db, &once).unwrap()),
            rows(&collect(&db, &twice).unwrap())
        );
    }
}
