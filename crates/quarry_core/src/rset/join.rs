use super::{header_of, ExecCtx, Item, Rset, Sink};
use crate::error::CoreResult;
use quarry_codec::Value;

/// One input of a cross join.
#[derive(Debug)]
pub(crate) struct JoinSource {
    pub rset: Box<dyn Rset>,
    /// Alias or table name. Empty for an unaliased subquery.
    pub qualifier: String,
}

/// Nested-loop cartesian product of its sources, left to right.
#[derive(Debug)]
pub(crate) struct CrossJoinRset {
    pub sources: Vec<JoinSource>,
}

struct JoinState {
    headers: Vec<Option<Vec<String>>>,
    header_sent: bool,
    stopped: bool,
}

impl JoinState {
    fn combined(&self) -> Vec<String> {
        self.headers.iter().flatten().flatten().cloned().collect()
    }
}

fn qualify(qualifier: &str, names: Vec<String>) -> Vec<String> {
    names
        .into_iter()
        .map(|name| {
            if qualifier.is_empty() || name.is_empty() {
                return String::new();
            }
            let column = name.rsplit_once('.').map_or(name.as_str(), |(_, c)| c);
            format!("{qualifier}.{column}")
        })
        .collect()
}

impl CrossJoinRset {
    fn nest(
        &self,
        ctx: &ExecCtx<'_>,
        level: usize,
        prefix: &[Value],
        state: &mut JoinState,
        sink: &mut Sink<'_>,
    ) -> CoreResult<()> {
        let source = &self.sources[level];
        let last = level + 1 == self.sources.len();
        source.rset.run(ctx, &mut |item| match item {
            Item::Header(names) => {
                if state.headers[level].is_none() {
                    state.headers[level] = Some(qualify(&source.qualifier, names));
                }
                Ok(true)
            }
            Item::Row { values, .. } => {
                let mut row = Vec::with_capacity(prefix.len() + values.len());
                row.extend_from_slice(prefix);
                row.extend(values);
                if last {
                    if !state.header_sent {
                        state.header_sent = true;
                        if !sink(Item::Header(state.combined()))? {
                            state.stopped = true;
                            return Ok(false);
                        }
                    }
                    if !sink(Item::Row { id: None, values: row })? {
                        state.stopped = true;
                    }
                } else {
                    self.nest(ctx, level + 1, &row, state, sink)?;
                }
                Ok(!state.stopped)
            }
        })
    }
}

impl Rset for CrossJoinRset {
    fn run(&self, ctx: &ExecCtx<'_>, sink: &mut Sink<'_>) -> CoreResult<()> {
        if let [only] = self.sources.as_slice() {
            return only.rset.run(ctx, sink);
        }

        let mut state = JoinState {
            headers: vec![None; self.sources.len()],
            header_sent: false,
            stopped: false,
        };
        self.nest(ctx, 0, &[], &mut state, sink)?;

        if !state.header_sent {
            // Some source was empty: the inner sources never ran, open
            // them just far enough to learn their field names.
            for (source, header) in self.sources.iter().zip(state.headers.iter_mut()) {
                if header.is_none() {
                    *header = Some(qualify(&source.qualifier, header_of(&*source.rset, ctx)?));
                }
            }
            sink(Item::Header(state.combined()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rset::testing::{collect, db_with, rows};
    use crate::rset::TableRset;

    fn source(table: &str, qualifier: &str) -> JoinSource {
        JoinSource {
            rset: Box::new(TableRset::new(table)),
            qualifier: qualifier.into(),
        }
    }

    #[test]
    fn product_cardinality_and_qualified_header() {
        let db = db_with(
            "CREATE TABLE a (x int); CREATE TABLE b (y int); \
             INSERT INTO a VALUES (1), (2), (3); INSERT INTO b VALUES (10), (20)",
        );
        let join = CrossJoinRset {
            sources: vec![source("a", "a"), source("b", "bb")],
        };
        let items = collect(&db, &join).unwrap();
        assert_eq!(items[0], Item::Header(vec!["a.x".into(), "bb.y".into()]));
        assert_eq!(
            items.iter().filter(|i| matches!(i, Item::Header(_))).count(),
            1
        );
        assert_eq!(rows(&items).len(), 6);
        assert!(items[1..]
            .iter()
            .all(|i| matches!(i, Item::Row { id: None, .. })));
    }

    #[test]
    fn empty_outer_source_still_emits_header() {
        let db = db_with("CREATE TABLE a (x int); CREATE TABLE b (y int); INSERT INTO b VALUES (1)");
        let join = CrossJoinRset {
            sources: vec![source("a", "a"), source("b", "b")],
        };
        let items = collect(&db, &join).unwrap();
        assert_eq!(items, vec![Item::Header(vec!["a.x".into(), "b.y".into()])]);
    }

    #[test]
    fn empty_qualifier_anonymizes() {
        let db = db_with("CREATE TABLE a (x int); CREATE TABLE b (y int); INSERT INTO a VALUES (1); INSERT INTO b VALUES (2)");
        let join = CrossJoinRset {
            sources: vec![source("a", "a"), source("b", "")],
        };
        let items = collect(&db, &join).unwrap();
        assert_eq!(items[0], Item::Header(vec!["a.x".into(), String::new()]));
    }

    #[test]
    fn single_source_delegates() {
        let db = db_with("CREATE TABLE a (x int); INSERT INTO a VALUES (1)");
        let join = CrossJoinRset {
            sources: vec![source("a", "a")],
        };
        let items = collect(&db, &join).unwrap();
        assert_eq!(items[0], Item::Header(vec!["x".into()]));
        assert!(matches!(items[1], Item::Row { id: Some(_), .. }));
    }

    #[test]
    fn early_stop_stops_every_level() {
        let db = db_with(
            "CREATE TABLE a (x int); CREATE TABLE b (y int); \
             INSERT INTO a VALUES (1), (2); INSERT INTO b VALUES (1), (2)",
        );
        let join = CrossJoinRset {
            sources: vec![source("a", "a"), source("b", "b")],
        };
        let mut rows_seen = 0;
        join.run(&ExecCtx::new(db.inner(), &[]), &mut |item| {
            if matches!(item, Item::Row { .. }) {
                rows_seen += 1;
            }
            Ok(rows_seen < 3)
        })
        .unwrap();
        assert_eq!(rows_seen, 3);
    }
}
