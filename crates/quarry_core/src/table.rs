//! Table metadata and the stored row layout.
//!
//! A table is a record `[next, name, head, col0_name, col0_type, ...]`
//! linked into the table list by `next`. Its rows form a singly linked
//! list starting at `head`; each row record is `[next, id, slot0, ...]`
//! with one slot per column ever added. Dropped columns keep their slot
//! and lose their name.

use crate::error::{CoreError, CoreResult};
use quarry_codec::{ColumnType, Value};
use quarry_storage::{Handle, Storage, StorageError};

/// A physical table column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Storage slot of the column within a row record.
    pub index: usize,
    /// Column name, empty once dropped.
    pub name: String,
    /// Declared type.
    pub ty: ColumnType,
}

/// Table metadata as seen by one snapshot root.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    /// Table name.
    pub name: String,
    /// Handle of the metadata record.
    pub handle: Handle,
    /// Handle of the next table in the table list, 0 at the end.
    pub next: Handle,
    /// Handle of the most recently inserted row, 0 when empty.
    pub head: Handle,
    /// All columns in slot order, including dropped ones.
    pub columns: Vec<Column>,
}

/// A row read from a table's row chain.
#[derive(Debug, Clone)]
pub(crate) struct StoredRow {
    pub handle: Handle,
    pub next: Handle,
    pub id: i64,
    /// Physical slots, padded to the current column count.
    pub slots: Vec<Value>,
}

impl Table {
    /// Live columns in slot order.
    pub fn visible_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| !c.name.is_empty())
    }

    /// Names of the live columns.
    #[must_use]
    pub fn field_names(&self) -> Vec<String> {
        self.visible_columns().map(|c| c.name.clone()).collect()
    }

    /// Finds a live column by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.visible_columns().find(|c| c.name == name)
    }

    pub(crate) fn column_or_err(&self, name: &str) -> CoreResult<&Column> {
        self.column(name).ok_or_else(|| CoreError::ColumnNotFound {
            table: self.name.clone(),
            column: name.to_string(),
        })
    }

    /// Projects physical slots onto the live columns.
    pub(crate) fn logical(&self, slots: &[Value]) -> Vec<Value> {
        self.visible_columns()
            .map(|c| slots.get(c.index).cloned().unwrap_or(Value::Null))
            .collect()
    }

    pub(crate) fn to_record(&self) -> CoreResult<Vec<Value>> {
        let mut record = Vec::with_capacity(3 + 2 * self.columns.len());
        record.push(handle_value(self.next)?);
        record.push(Value::Text(self.name.clone()));
        record.push(handle_value(self.head)?);
        for column in &self.columns {
            record.push(Value::Text(column.name.clone()));
            record.push(Value::Text(column.ty.name().to_string()));
        }
        Ok(record)
    }

    pub(crate) fn from_record(handle: Handle, record: &[Value]) -> CoreResult<Self> {
        let bad = || CoreError::corrupted(format!("malformed table record {handle}"));
        if record.len() < 3 || record.len() % 2 == 0 {
            return Err(bad());
        }
        let next = record_handle(&record[0]).ok_or_else(bad)?;
        let name = record[1].as_text().ok_or_else(bad)?.to_string();
        let head = record_handle(&record[2]).ok_or_else(bad)?;
        let columns = record[3..]
            .chunks(2)
            .enumerate()
            .map(|(index, pair)| {
                let name = pair[0].as_text().ok_or_else(bad)?.to_string();
                let ty = ColumnType::parse(pair[1].as_text().ok_or_else(bad)?)?;
                Ok(Column { index, name, ty })
            })
            .collect::<CoreResult<Vec<_>>>()?;
        Ok(Self {
            name,
            handle,
            next,
            head,
            columns,
        })
    }

    /// Persists the metadata record.
    pub(crate) fn store(&self, store: &dyn Storage) -> CoreResult<()> {
        store.update(self.handle, &self.to_record()?)?;
        Ok(())
    }

    /// Reads one row record.
    pub(crate) fn read_row(&self, store: &dyn Storage, handle: Handle) -> CoreResult<StoredRow> {
        let record = match store.read(handle) {
            Ok(record) => record,
            Err(StorageError::NotFound { .. }) => {
                return Err(CoreError::corrupted(format!(
                    "table {}: row chain points at missing record {handle}",
                    self.name
                )))
            }
            Err(err) => return Err(err.into()),
        };
        let bad = || CoreError::corrupted(format!("table {}: malformed row {handle}", self.name));
        if record.len() < 2 {
            return Err(bad());
        }
        let next = record_handle(&record[0]).ok_or_else(bad)?;
        let id = record[1].as_int().ok_or_else(bad)?;
        let mut slots = record[2..].to_vec();
        if slots.len() < self.columns.len() {
            slots.resize(self.columns.len(), Value::Null);
        }
        Ok(StoredRow {
            handle,
            next,
            id,
            slots,
        })
    }

    /// Walks the row chain from `head` until `f` returns `false`.
    pub(crate) fn scan(
        &self,
        store: &dyn Storage,
        mut f: impl FnMut(StoredRow) -> CoreResult<bool>,
    ) -> CoreResult<()> {
        let mut handle = self.head;
        while handle != 0 {
            let row = self.read_row(store, handle)?;
            handle = row.next;
            if !f(row)? {
                break;
            }
        }
        Ok(())
    }

    /// Collects the whole row chain.
    pub(crate) fn rows(&self, store: &dyn Storage) -> CoreResult<Vec<StoredRow>> {
        let mut rows = Vec::new();
        self.scan(store, |row| {
            rows.push(row);
            Ok(true)
        })?;
        Ok(rows)
    }
}

pub(crate) fn row_record(next: Handle, id: i64, slots: &[Value]) -> CoreResult<Vec<Value>> {
    let mut record = Vec::with_capacity(slots.len() + 2);
    record.push(handle_value(next)?);
    record.push(Value::Int(id));
    record.extend_from_slice(slots);
    Ok(record)
}

pub(crate) fn handle_value(handle: Handle) -> CoreResult<Value> {
    i64::try_from(handle)
        .map(Value::Int)
        .map_err(|_| CoreError::corrupted(format!("handle {handle} out of range")))
}

pub(crate) fn record_handle(value: &Value) -> Option<Handle> {
    value.as_int().and_then(|n| Handle::try_from(n).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_storage::MemoryStorage;

    fn table() -> Table {
        Table {
            name: "t".into(),
            handle: 7,
            next: 3,
            head: 0,
            columns: vec![
                Column {
                    index: 0,
                    name: "a".into(),
                    ty: ColumnType::Int,
                },
                Column {
                    index: 1,
                    name: String::new(),
                    ty: ColumnType::Text,
                },
                Column {
                    index: 2,
                    name: "c".into(),
                    ty: ColumnType::Float,
                },
            ],
        }
    }

    #[test]
    fn metadata_record_roundtrip() {
        let t = table();
        let record = t.to_record().unwrap();
        assert_eq!(Table::from_record(7, &record).unwrap(), t);
    }

    #[test]
    fn malformed_metadata_is_corruption() {
        let result = Table::from_record(1, &[Value::Int(0), Value::Int(5)]);
        assert!(matches!(result, Err(CoreError::Corrupted { .. })));
    }

    #[test]
    fn dropped_columns_are_hidden() {
        let t = table();
        assert_eq!(t.field_names(), vec!["a".to_string(), "c".to_string()]);
        assert!(t.column("b").is_none());
        assert_eq!(
            t.logical(&[Value::Int(1), Value::Text("x".into())]),
            vec![Value::Int(1), Value::Null]
        );
    }

    #[test]
    fn scan_walks_chain_and_pads_slots() {
        let store = MemoryStorage::new();
        store.begin_transaction().unwrap();
        let first = store
            .create(&row_record(0, 1, &[Value::Int(1)]).unwrap())
            .unwrap();
        let second = store
            .create(&row_record(first, 2, &[Value::Int(2)]).unwrap())
            .unwrap();
        store.commit().unwrap();

        let mut t = table();
        t.head = second;
        let rows = t.rows(&store).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, 2);
        assert_eq!(rows[1].id, 1);
        assert_eq!(rows[1].slots.len(), 3);
    }

    #[test]
    fn broken_chain_is_corruption() {
        let store = MemoryStorage::new();
        let mut t = table();
        t.head = 42;
        assert!(matches!(
            t.rows(&store),
            Err(CoreError::Corrupted { .. })
        ));
    }
}
