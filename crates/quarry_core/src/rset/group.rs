use super::{ExecCtx, Item, Rset};
use crate::error::{CoreError, CoreResult};
use crate::expr::Scope;
use crate::table::{handle_value, record_handle};
use quarry_codec::Value;
use quarry_storage::{Handle, Temp};

/// Partitions its source by the values of the grouping columns.
///
/// Members of a group are chained in the temp store as records
/// `[prev, values...]`; the key maps to the head of that chain. Groups
/// are handed out in ascending key order.
#[derive(Debug)]
pub(crate) struct GroupByRset {
    pub source: Box<dyn Rset>,
    pub columns: Vec<String>,
}

/// One group produced by [`GroupByRset`].
pub(crate) enum Group<'t> {
    /// A group with at least one member row.
    Members(GroupMembers<'t>),
    /// The single group of an empty source without grouping columns.
    Empty,
}

/// Re-scannable member list of a group.
pub(crate) struct GroupMembers<'t> {
    temp: &'t dyn Temp,
    head: Handle,
}

impl GroupMembers<'_> {
    /// Calls `f` with every member row.
    pub(crate) fn for_each(&self, mut f: impl FnMut(&[Value]) -> CoreResult<()>) -> CoreResult<()> {
        let mut handle = self.head;
        while handle != 0 {
            let record = self.temp.read(handle)?;
            handle = record
                .first()
                .and_then(record_handle)
                .ok_or_else(|| CoreError::corrupted("malformed group member record"))?;
            f(&record[1..])?;
        }
        Ok(())
    }
}

impl GroupByRset {
    /// Drains the source and enumerates the groups.
    ///
    /// `on_header` receives the source field names; returning `false` from
    /// either callback stops the enumeration.
    pub(crate) fn run_groups(
        &self,
        ctx: &ExecCtx<'_>,
        mut on_header: impl FnMut(Vec<String>) -> CoreResult<bool>,
        mut on_group: impl FnMut(Group<'_>) -> CoreResult<bool>,
    ) -> CoreResult<()> {
        let mut temp = ctx.store().create_temp(true)?;
        let mut header = None;
        let mut key_index = Vec::with_capacity(self.columns.len());

        self.source.run(ctx, &mut |item| {
            match item {
                Item::Header(names) => {
                    let scope = Scope::new(&names);
                    for column in &self.columns {
                        let index = scope
                            .resolve(column)
                            .ok_or_else(|| CoreError::unknown_field(column.clone()))?;
                        key_index.push(index);
                    }
                    header = Some(names);
                }
                Item::Row { values, .. } => {
                    let key: Vec<Value> = key_index
                        .iter()
                        .map(|&i| values.get(i).cloned().unwrap_or(Value::Null))
                        .collect();
                    let prev = temp
                        .get(&key)?
                        .and_then(|v| v.first().and_then(record_handle))
                        .unwrap_or(0);
                    let mut member = Vec::with_capacity(values.len() + 1);
                    member.push(handle_value(prev)?);
                    member.extend(values);
                    let head = temp.create(member)?;
                    temp.set(key, vec![handle_value(head)?])?;
                }
            }
            Ok(true)
        })?;

        let header = header
            .ok_or_else(|| CoreError::invalid_operation("row stream ended without a header"))?;
        if !on_header(header)? {
            return Ok(());
        }

        if temp.is_empty() {
            if self.columns.is_empty() {
                on_group(Group::Empty)?;
            }
            return Ok(());
        }

        for entry in temp.seek_first()? {
            let (_, value) = entry?;
            let head = value
                .first()
                .and_then(record_handle)
                .ok_or_else(|| CoreError::corrupted("malformed group head"))?;
            let members = GroupMembers {
                temp: &*temp,
                head,
            };
            if !on_group(Group::Members(members))? {
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rset::testing::db_with;
    use crate::rset::TableRset;

    fn groups(db: &crate::Database, columns: &[&str]) -> CoreResult<Vec<Option<Vec<Vec<Value>>>>> {
        let group_by = GroupByRset {
            source: Box::new(TableRset::new("t")),
            columns: columns.iter().map(|s| s.to_string()).collect(),
        };
        let mut out = Vec::new();
        group_by.run_groups(
            &ExecCtx::new(db.inner(), &[]),
            |_| Ok(true),
            |group| {
                match group {
                    Group::Members(members) => {
                        let mut rows = Vec::new();
                        members.for_each(|row| {
                            rows.push(row.to_vec());
                            Ok(())
                        })?;
                        rows.sort_by(|a, b| Value::collate_rows(a, b));
                        out.push(Some(rows));
                    }
                    Group::Empty => out.push(None),
                }
                Ok(true)
            },
        )?;
        Ok(out)
    }

    #[test]
    fn groups_are_ascending_and_complete() {
        let db = db_with(
            "CREATE TABLE t (k string, v int); \
             INSERT INTO t VALUES (\"b\", 1), (\"a\", 2), (\"b\", 3), (NULL, 4)",
        );
        let got = groups(&db, &["k"]).unwrap();
        assert_eq!(got.len(), 3);
        assert_eq!(got[0], Some(vec![vec![Value::Null, Value::Int(4)]]));
        assert_eq!(got[1], Some(vec![vec![Value::from("a"), Value::Int(2)]]));
        assert_eq!(
            got[2],
            Some(vec![
                vec![Value::from("b"), Value::Int(1)],
                vec![Value::from("b"), Value::Int(3)]
            ])
        );
    }

    #[test]
    fn empty_source_without_columns_yields_one_empty_group() {
        let db = db_with("CREATE TABLE t (k int)");
        assert_eq!(groups(&db, &[]).unwrap(), vec![None]);
        assert!(groups(&db, &["k"]).unwrap().is_empty());
    }

    #[test]
    fn unknown_group_column() {
        let db = db_with("CREATE TABLE t (k int)");
        let err = groups(&db, &["zz"]).unwrap_err();
        assert_eq!(err.to_string(), "unknown field zz");
    }
}
