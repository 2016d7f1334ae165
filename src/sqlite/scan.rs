//! B-tree traversals: the full table scan, the index equality probe,
//! and the index-driven table scan.
//!
//! All three walk pages recursively through [`SqliteDatabase::page`].
//! Within a page, cells are sorted by key, and an interior page's cells
//! plus its right-most child cover all descendants, so in-order
//! recursion yields rows in ascending row-id order.

use crate::sqlite::btree::{PageType, TableInteriorCell};
use crate::sqlite::core::record::Record;
use crate::sqlite::core::schema::TableSchema;
use crate::sqlite::core::value::Value;
use crate::sqlite::db::SqliteDatabase;
use crate::sqlite::error::{Result, SqliteError};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use tracing::debug;

/// One table row: the cell's row-id and the decoded column values.
#[derive(Debug, Clone)]
pub struct TableRow {
    pub row_id: u64,
    pub values: Vec<Value>,
}

/// One index entry: the indexed key and the row-id it points at.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub key: Value,
    pub row_id: u64,
}

impl SqliteDatabase {
    /// Scans the whole table B-tree, yielding rows in row-id order.
    pub fn table_scan(&mut self, table: &TableSchema) -> Result<Vec<TableRow>> {
        debug!(table = %table.name, root = table.root_page, "table scan");
        let mut rows = Vec::new();
        self.walk_table(table.root_page, table, &mut rows)?;
        Ok(rows)
    }

    fn walk_table(
        &mut self,
        page_number: u32,
        table: &TableSchema,
        out: &mut Vec<TableRow>,
    ) -> Result<()> {
        let page = self.page(page_number)?;
        match page.page_type() {
            PageType::TableLeaf => {
                for i in 0..page.cell_count() {
                    let cell = page.table_leaf_cell(i)?;
                    out.push(decode_row(table, cell.row_id, cell.payload)?);
                }
                Ok(())
            }
            PageType::TableInterior => {
                for i in 0..page.cell_count() {
                    let cell = page.table_interior_cell(i)?;
                    self.walk_table(cell.left_child, table, out)?;
                }
                self.walk_table(page.right_most_child()?, table, out)
            }
            other => Err(SqliteError::Corrupt(format!(
                "{other:?} page {page_number} inside the b-tree of table '{}'",
                table.name
            ))),
        }
    }

    /// Probes an index B-tree for every entry whose key equals `target`.
    ///
    /// Entries come back in index order; duplicate keys all match. The
    /// walk stops as soon as it sees a key past `target`, since keys
    /// are ascending.
    pub fn read_index_data(&mut self, root: u32, target: &Value) -> Result<Vec<IndexEntry>> {
        debug!(root, key = ?target, "index probe");
        let mut entries = Vec::new();
        self.probe_index(root, target, &mut entries)?;
        Ok(entries)
    }

    /// Returns true once the walk has moved past the matching window.
    fn probe_index(
        &mut self,
        page_number: u32,
        target: &Value,
        out: &mut Vec<IndexEntry>,
    ) -> Result<bool> {
        let page = self.page(page_number)?;
        match page.page_type() {
            PageType::IndexLeaf => {
                for i in 0..page.cell_count() {
                    let entry = decode_index_entry(page.index_leaf_cell(i)?)?;
                    match entry.key.compare(target)? {
                        Ordering::Less => continue,
                        Ordering::Equal => out.push(entry),
                        Ordering::Greater => return Ok(true),
                    }
                }
                Ok(false)
            }
            PageType::IndexInterior => {
                for i in 0..page.cell_count() {
                    let cell = page.index_interior_cell(i)?;
                    let entry = decode_index_entry(cell.payload)?;
                    // Keys at or below this cell's key live in its child.
                    let order = entry.key.compare(target)?;
                    if order != Ordering::Less && self.probe_index(cell.left_child, target, out)? {
                        return Ok(true);
                    }
                    // The cell itself is an entry, between child and successor.
                    match order {
                        Ordering::Less => continue,
                        Ordering::Equal => out.push(entry),
                        Ordering::Greater => return Ok(true),
                    }
                }
                self.probe_index(page.right_most_child()?, target, out)
            }
            other => Err(SqliteError::Corrupt(format!(
                "{other:?} page {page_number} inside an index b-tree"
            ))),
        }
    }

    /// Walks the table B-tree restricted to the given row-ids, pruning
    /// interior children that cannot contain any of them.
    ///
    /// Rows come back in ascending row-id order regardless of the
    /// order of `row_ids`.
    pub fn index_scan(&mut self, table: &TableSchema, row_ids: &[u64]) -> Result<Vec<TableRow>> {
        let mut wanted = row_ids.to_vec();
        wanted.sort_unstable();
        wanted.dedup();
        debug!(table = %table.name, targets = wanted.len(), "index-driven scan");

        let mut rows = Vec::new();
        if !wanted.is_empty() {
            self.walk_table_filtered(table.root_page, table, &wanted, &mut rows)?;
        }
        Ok(rows)
    }

    fn walk_table_filtered(
        &mut self,
        page_number: u32,
        table: &TableSchema,
        wanted: &[u64],
        out: &mut Vec<TableRow>,
    ) -> Result<()> {
        let page = self.page(page_number)?;
        match page.page_type() {
            PageType::TableLeaf => {
                for i in 0..page.cell_count() {
                    let cell = page.table_leaf_cell(i)?;
                    if wanted.binary_search(&cell.row_id).is_ok() {
                        out.push(decode_row(table, cell.row_id, cell.payload)?);
                    }
                }
                Ok(())
            }
            PageType::TableInterior => {
                let cells: Vec<TableInteriorCell> = (0..page.cell_count())
                    .map(|i| page.table_interior_cell(i))
                    .collect::<Result<_>>()?;

                // Cell row-ids are subtree maxima. For each wanted id,
                // keep the first cell at or past it and the last cell
                // at or before it; the right-most child stands in for
                // ids beyond the last cell.
                let right_most = cells.len();
                let mut children = BTreeSet::new();
                for &id in wanted {
                    // partition_point == cells.len() selects the right-most child.
                    children.insert(cells.partition_point(|c| c.row_id < id));
                    let past_at_or_before = cells.partition_point(|c| c.row_id <= id);
                    if past_at_or_before > 0 {
                        children.insert(past_at_or_before - 1);
                    }
                }

                for child in children {
                    let page_number = if child == right_most {
                        page.right_most_child()?
                    } else {
                        cells[child].left_child
                    };
                    self.walk_table_filtered(page_number, table, wanted, out)?;
                }
                Ok(())
            }
            other => Err(SqliteError::Corrupt(format!(
                "{other:?} page {page_number} inside the b-tree of table '{}'",
                table.name
            ))),
        }
    }
}

/// Decodes a table-leaf payload into a row, substituting the cell's
/// row-id for the identity column's stored NULL.
fn decode_row(table: &TableSchema, row_id: u64, payload: &[u8]) -> Result<TableRow> {
    let record = Record::parse_with_columns(payload, table.columns.len())?;
    let mut values = record.values;
    if let Some(identity) = table.identity_column {
        values[identity] = Value::Int(row_id as i64);
    }
    Ok(TableRow { row_id, values })
}

/// Decodes an index payload `(key columns..., row_id)` into an entry.
///
/// Only the first indexed column takes part in equality probes.
fn decode_index_entry(payload: &[u8]) -> Result<IndexEntry> {
    let record = Record::parse(payload)?;
    let [key, .., last] = record.values.as_slice() else {
        return Err(SqliteError::Corrupt(
            "index record needs a key and a row-id".into(),
        ));
    };
    let Value::Int(row_id) = last else {
        return Err(SqliteError::Corrupt(format!(
            "index record row-id is not an integer: {last:?}"
        )));
    };
    Ok(IndexEntry {
        key: key.clone(),
        row_id: *row_id as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::fixture;
    use crate::sqlite::core::varint::encode_varint;

    fn fruit_table(root_page: u32) -> TableSchema {
        TableSchema {
            name: "fruits".into(),
            root_page,
            columns: vec!["id".into(), "name".into()],
            identity_column: Some(0),
        }
    }

    fn fruit_rows(count: u64) -> Vec<(u64, Vec<u8>)> {
        (1..=count)
            .map(|i| {
                let record =
                    fixture::record(&[Value::Null, Value::Text(format!("fruit-{i:05}"))]);
                (i, record)
            })
            .collect()
    }

    #[test]
    fn single_leaf_scan_yields_rows_in_order() -> Result<()> {
        let (mut db, _file) = fixture::open_single_table_db(4096, &fruit_rows(3));
        let rows = db.table_scan(&fruit_table(2))?;
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].values[1], Value::Text("fruit-00001".into()));
        let ids: Vec<u64> = rows.iter().map(|r| r.row_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        Ok(())
    }

    #[test]
    fn identity_column_takes_the_row_id() -> Result<()> {
        let (mut db, _file) = fixture::open_single_table_db(4096, &fruit_rows(2));
        let rows = db.table_scan(&fruit_table(2))?;
        assert_eq!(rows[0].values[0], Value::Int(1));
        assert_eq!(rows[1].values[0], Value::Int(2));
        Ok(())
    }

    #[test]
    fn multi_page_scan_visits_every_leaf() -> Result<()> {
        // Enough rows at a small page size to force an interior root.
        let (mut db, _file, root) = fixture::open_multi_page_table_db(512, &fruit_rows(200));
        let rows = db.table_scan(&fruit_table(root))?;
        assert_eq!(rows.len(), 200);
        let ids: Vec<u64> = rows.iter().map(|r| r.row_id).collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]), "ascending, no dups");
        Ok(())
    }

    #[test]
    fn index_scan_over_all_row_ids_equals_full_scan() -> Result<()> {
        let (mut db, _file, root) = fixture::open_multi_page_table_db(512, &fruit_rows(200));
        let table = fruit_table(root);
        let full = db.table_scan(&table)?;
        let all_ids: Vec<u64> = full.iter().map(|r| r.row_id).collect();
        let filtered = db.index_scan(&table, &all_ids)?;
        let filtered_ids: Vec<u64> = filtered.iter().map(|r| r.row_id).collect();
        assert_eq!(filtered_ids, all_ids);
        Ok(())
    }

    #[test]
    fn index_scan_ignores_input_order_and_duplicates() -> Result<()> {
        let (mut db, _file, root) = fixture::open_multi_page_table_db(512, &fruit_rows(100));
        let rows = db.index_scan(&fruit_table(root), &[70, 3, 70, 41])?;
        let ids: Vec<u64> = rows.iter().map(|r| r.row_id).collect();
        assert_eq!(ids, vec![3, 41, 70]);
        Ok(())
    }

    #[test]
    fn index_scan_with_no_targets_is_empty() -> Result<()> {
        let (mut db, _file) = fixture::open_single_table_db(4096, &fruit_rows(5));
        assert!(db.index_scan(&fruit_table(2), &[])?.is_empty());
        Ok(())
    }

    #[test]
    fn index_probe_returns_every_duplicate_key() -> Result<()> {
        let keys = [
            ("red", 1),
            ("red", 4),
            ("yellow", 2),
            ("yellow", 3),
            ("yellow", 7),
        ];
        let (mut db, _file, root) = fixture::open_index_db(512, &keys);
        let entries = db.read_index_data(root, &Value::Text("yellow".into()))?;
        let ids: Vec<u64> = entries.iter().map(|e| e.row_id).collect();
        assert_eq!(ids, vec![2, 3, 7]);
        Ok(())
    }

    #[test]
    fn index_probe_misses_cleanly() -> Result<()> {
        let keys = [("red", 1), ("yellow", 2)];
        let (mut db, _file, root) = fixture::open_index_db(512, &keys);
        assert!(db
            .read_index_data(root, &Value::Text("green".into()))?
            .is_empty());
        Ok(())
    }

    #[test]
    fn multi_level_index_probe_finds_entries_on_every_level() -> Result<()> {
        // Many distinct keys at a small page size forces interior pages;
        // separator entries land on them and must still be found.
        let keys: Vec<(String, u64)> = (1..=120)
            .map(|i| (format!("key-{:04}", i / 2), i))
            .collect();
        let borrowed: Vec<(&str, u64)> = keys.iter().map(|(k, i)| (k.as_str(), *i)).collect();
        let (mut db, _file, root) = fixture::open_index_db(512, &borrowed);

        for probe in ["key-0001", "key-0030", "key-0059"] {
            let expected: Vec<u64> = borrowed
                .iter()
                .filter(|(k, _)| *k == probe)
                .map(|(_, i)| *i)
                .collect();
            let entries = db.read_index_data(root, &Value::Text(probe.into()))?;
            let ids: Vec<u64> = entries.iter().map(|e| e.row_id).collect();
            assert_eq!(ids, expected, "probe {probe}");
        }
        Ok(())
    }

    #[test]
    fn short_records_read_as_trailing_nulls() -> Result<()> {
        // Rows written before an ALTER TABLE ADD COLUMN carry one column.
        let rows: Vec<(u64, Vec<u8>)> = vec![
            (1, fixture::record(&[Value::Text("old".into())])),
            (
                2,
                fixture::record(&[Value::Text("new".into()), Value::Int(9)]),
            ),
        ];
        let (mut db, _file) = fixture::open_single_table_db(4096, &rows);
        let table = TableSchema {
            name: "t".into(),
            root_page: 2,
            columns: vec!["name".into(), "score".into()],
            identity_column: None,
        };
        let rows = db.table_scan(&table)?;
        assert_eq!(rows[0].values, vec![Value::Text("old".into()), Value::Null]);
        assert_eq!(rows[1].values, vec![Value::Text("new".into()), Value::Int(9)]);
        Ok(())
    }

    #[test]
    fn index_record_without_row_id_is_corrupt() {
        // A one-column record cannot carry both key and row-id.
        let mut payload = encode_varint(2);
        payload.extend(encode_varint(8));
        assert!(decode_index_entry(&payload).is_err());
    }
}
