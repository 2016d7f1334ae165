//! Test support: builds small but structurally valid SQLite database
//! images (file header, schema page, table and index B-trees) and
//! opens them through the real reader.

use crate::sqlite::core::value::Value;
use crate::sqlite::core::varint::encode_varint;
use crate::sqlite::db::SqliteDatabase;
use std::io::Write;
use tempfile::NamedTempFile;

const FILE_HEADER_SIZE: usize = 100;

/// Encodes values into a record payload (serial-type header + body).
pub fn record(values: &[Value]) -> Vec<u8> {
    let mut types = Vec::new();
    let mut body = Vec::new();

    for value in values {
        match value {
            Value::Null => types.extend(encode_varint(0)),
            Value::Int(0) => types.extend(encode_varint(8)),
            Value::Int(1) => types.extend(encode_varint(9)),
            Value::Int(i) => {
                let (code, width) = int_serial(*i);
                types.extend(encode_varint(code));
                body.extend_from_slice(&i.to_be_bytes()[8 - width..]);
            }
            Value::Float(x) => {
                types.extend(encode_varint(7));
                body.extend_from_slice(&x.to_be_bytes());
            }
            Value::Blob(bytes) => {
                types.extend(encode_varint(12 + 2 * bytes.len() as u64));
                body.extend_from_slice(bytes);
            }
            Value::Text(s) => {
                types.extend(encode_varint(13 + 2 * s.len() as u64));
                body.extend_from_slice(s.as_bytes());
            }
        }
    }

    // The header size varint counts itself; re-encode until stable.
    let mut header_size = types.len() + 1;
    loop {
        let encoded = encode_varint(header_size as u64);
        if encoded.len() + types.len() == header_size {
            let mut payload = encoded;
            payload.extend_from_slice(&types);
            payload.extend_from_slice(&body);
            return payload;
        }
        header_size = types.len() + encoded.len();
    }
}

/// Smallest integer serial type that holds `i`: (code, byte width).
fn int_serial(i: i64) -> (u64, usize) {
    if i8::try_from(i).is_ok() {
        (1, 1)
    } else if i16::try_from(i).is_ok() {
        (2, 2)
    } else if (-(1i64 << 23)..(1i64 << 23)).contains(&i) {
        (3, 3)
    } else if i32::try_from(i).is_ok() {
        (4, 4)
    } else if (-(1i64 << 47)..(1i64 << 47)).contains(&i) {
        (5, 6)
    } else {
        (6, 8)
    }
}

fn table_leaf_cell(row_id: u64, payload: &[u8]) -> Vec<u8> {
    let mut cell = encode_varint(payload.len() as u64);
    cell.extend(encode_varint(row_id));
    cell.extend_from_slice(payload);
    cell
}

fn table_interior_cell(left_child: u32, row_id: u64) -> Vec<u8> {
    let mut cell = left_child.to_be_bytes().to_vec();
    cell.extend(encode_varint(row_id));
    cell
}

fn index_leaf_cell(payload: &[u8]) -> Vec<u8> {
    let mut cell = encode_varint(payload.len() as u64);
    cell.extend_from_slice(payload);
    cell
}

fn index_interior_cell(left_child: u32, payload: &[u8]) -> Vec<u8> {
    let mut cell = left_child.to_be_bytes().to_vec();
    cell.extend(encode_varint(payload.len() as u64));
    cell.extend_from_slice(payload);
    cell
}

/// Lays out one page: header, cell pointer array, cells packed from
/// the page end in pointer order.
fn build_page(
    page_size: usize,
    is_page1: bool,
    type_byte: u8,
    right_most: Option<u32>,
    cells: &[Vec<u8>],
) -> Vec<u8> {
    let header_start = if is_page1 { FILE_HEADER_SIZE } else { 0 };
    let header_size = if right_most.is_some() { 12 } else { 8 };

    let mut page = vec![0u8; page_size];
    page[header_start] = type_byte;
    page[header_start + 3..header_start + 5]
        .copy_from_slice(&(cells.len() as u16).to_be_bytes());
    if let Some(child) = right_most {
        page[header_start + 8..header_start + 12].copy_from_slice(&child.to_be_bytes());
    }

    let mut pointer_at = header_start + header_size;
    let mut content = page_size;
    for cell in cells {
        content -= cell.len();
        page[content..content + cell.len()].copy_from_slice(cell);
        page[pointer_at..pointer_at + 2].copy_from_slice(&(content as u16).to_be_bytes());
        pointer_at += 2;
    }
    assert!(pointer_at <= content, "fixture page overflow");
    page[header_start + 5..header_start + 7].copy_from_slice(&(content as u16).to_be_bytes());

    page
}

/// Greedily packs cells into pages of `page_size`, leaving room for
/// the header and one pointer per cell.
fn chunk_cells(page_size: usize, cells: &[Vec<u8>]) -> Vec<Vec<Vec<u8>>> {
    let budget = page_size - 12;
    let mut chunks = vec![Vec::new()];
    let mut used = 0;
    for cell in cells {
        let cost = cell.len() + 2;
        assert!(cost <= budget, "fixture cell larger than a page");
        if used + cost > budget {
            chunks.push(Vec::new());
            used = 0;
        }
        used += cost;
        chunks.last_mut().unwrap().push(cell.clone());
    }
    chunks
}

/// Builds a table B-tree whose pages start at `first_page`. Returns
/// the root page number and the pages in page-number order.
fn table_btree(
    page_size: usize,
    first_page: u32,
    rows: &[(u64, Vec<u8>)],
) -> (u32, Vec<Vec<u8>>) {
    let cells: Vec<Vec<u8>> = rows
        .iter()
        .map(|(row_id, payload)| table_leaf_cell(*row_id, payload))
        .collect();
    let chunks = chunk_cells(page_size, &cells);

    if chunks.len() == 1 {
        let page = build_page(page_size, false, 0x0d, None, &chunks[0]);
        return (first_page, vec![page]);
    }

    // Row counts per chunk recover each subtree's maximum row-id.
    let mut pages = Vec::new();
    let mut interior_cells = Vec::new();
    let mut row_cursor = 0;
    for (i, chunk) in chunks.iter().enumerate() {
        let page_number = first_page + i as u32;
        pages.push(build_page(page_size, false, 0x0d, None, chunk));
        row_cursor += chunk.len();
        if i + 1 < chunks.len() {
            let max_row_id = rows[row_cursor - 1].0;
            interior_cells.push(table_interior_cell(page_number, max_row_id));
        }
    }

    let right_most = first_page + chunks.len() as u32 - 1;
    let root = first_page + chunks.len() as u32;
    pages.push(build_page(
        page_size,
        false,
        0x05,
        Some(right_most),
        &interior_cells,
    ));
    (root, pages)
}

/// Builds an index B-tree from pre-sorted entry records. When more
/// than one leaf is needed, the last record of each non-final chunk
/// moves up into the interior page as its separator entry.
fn index_btree(page_size: usize, first_page: u32, records: &[Vec<u8>]) -> (u32, Vec<Vec<u8>>) {
    let cells: Vec<Vec<u8>> = records.iter().map(|r| index_leaf_cell(r)).collect();
    let chunks = chunk_cells(page_size, &cells);

    if chunks.len() == 1 {
        let page = build_page(page_size, false, 0x0a, None, &chunks[0]);
        return (first_page, vec![page]);
    }

    let mut pages = Vec::new();
    let mut interior_cells = Vec::new();
    let mut record_cursor = 0;
    for (i, chunk) in chunks.iter().enumerate() {
        let page_number = first_page + i as u32;
        record_cursor += chunk.len();
        let mut chunk = chunk.clone();
        if i + 1 < chunks.len() {
            let separator = &records[record_cursor - 1];
            interior_cells.push(index_interior_cell(page_number, separator));
            chunk.pop();
        }
        pages.push(build_page(page_size, false, 0x0a, None, &chunk));
    }

    let right_most = first_page + chunks.len() as u32 - 1;
    let root = first_page + chunks.len() as u32;
    pages.push(build_page(
        page_size,
        false,
        0x02,
        Some(right_most),
        &interior_cells,
    ));
    (root, pages)
}

/// Assembles the file image: writes the 100-byte header into page 1
/// and concatenates the pages.
fn db_file(page_size: usize, mut pages: Vec<Vec<u8>>) -> Vec<u8> {
    let page_count = pages.len() as u32;
    let page1 = &mut pages[0];
    page1[0..16].copy_from_slice(b"SQLite format 3\0");
    let raw_size: u16 = if page_size == 65536 { 1 } else { page_size as u16 };
    page1[16..18].copy_from_slice(&raw_size.to_be_bytes());
    page1[28..32].copy_from_slice(&page_count.to_be_bytes());
    page1[56..60].copy_from_slice(&1u32.to_be_bytes());
    pages.concat()
}

/// Writes a file image to a temp file and opens it with the reader.
fn open(bytes: &[u8]) -> (SqliteDatabase, NamedTempFile) {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(bytes).unwrap();
    file.flush().unwrap();
    let db = SqliteDatabase::open(file.path()).unwrap();
    (db, file)
}

fn schema_record(kind: &str, name: &str, root_page: u32, sql: &str) -> Vec<u8> {
    record(&[
        Value::Text(kind.into()),
        Value::Text(name.into()),
        Value::Text(name.into()),
        Value::Int(root_page as i64),
        Value::Text(sql.into()),
    ])
}

/// A database whose page 1 holds an empty schema and whose page 2 is a
/// single table leaf; callers supply their own descriptor (root 2).
pub fn open_single_table_db(
    page_size: usize,
    rows: &[(u64, Vec<u8>)],
) -> (SqliteDatabase, NamedTempFile) {
    let cells: Vec<Vec<u8>> = rows
        .iter()
        .map(|(row_id, payload)| table_leaf_cell(*row_id, payload))
        .collect();
    let page1 = build_page(page_size, true, 0x0d, None, &[]);
    let page2 = build_page(page_size, false, 0x0d, None, &cells);
    open(&db_file(page_size, vec![page1, page2]))
}

/// Like `open_single_table_db`, but lets the row volume decide the
/// tree shape; returns the table's root page.
pub fn open_multi_page_table_db(
    page_size: usize,
    rows: &[(u64, Vec<u8>)],
) -> (SqliteDatabase, NamedTempFile, u32) {
    let (root, pages) = table_btree(page_size, 2, rows);
    let mut all = vec![build_page(page_size, true, 0x0d, None, &[])];
    all.extend(pages);
    let (db, file) = open(&db_file(page_size, all));
    (db, file, root)
}

/// A bare index B-tree over `(key, row_id)` entries; returns its root.
pub fn open_index_db(
    page_size: usize,
    keys: &[(&str, u64)],
) -> (SqliteDatabase, NamedTempFile, u32) {
    let mut sorted = keys.to_vec();
    sorted.sort();
    let records: Vec<Vec<u8>> = sorted
        .iter()
        .map(|(key, row_id)| {
            record(&[Value::Text(key.to_string()), Value::Int(*row_id as i64)])
        })
        .collect();
    let (root, pages) = index_btree(page_size, 2, &records);
    let mut all = vec![build_page(page_size, true, 0x0d, None, &[])];
    all.extend(pages);
    let (db, file) = open(&db_file(page_size, all));
    (db, file, root)
}

/// A complete database: one schema row and one B-tree per table.
pub fn open_db_with_schema(
    page_size: usize,
    tables: &[(&str, &str, Vec<(u64, Vec<u8>)>)],
) -> (SqliteDatabase, NamedTempFile) {
    let mut pages: Vec<Vec<u8>> = Vec::new();
    let mut schema_cells = Vec::new();
    let mut next_page = 2;

    for (i, (name, sql, rows)) in tables.iter().enumerate() {
        let (root, tree) = table_btree(page_size, next_page, rows);
        next_page += tree.len() as u32;
        pages.extend(tree);
        schema_cells.push(table_leaf_cell(
            i as u64 + 1,
            &schema_record("table", name, root, sql),
        ));
    }

    let page1 = build_page(page_size, true, 0x0d, None, &schema_cells);
    let mut all = vec![page1];
    all.extend(pages);
    open(&db_file(page_size, all))
}

/// A complete database with one table and one index over it.
#[allow(clippy::too_many_arguments)]
pub fn open_db_with_indexed_table(
    page_size: usize,
    table_name: &str,
    table_sql: &str,
    rows: Vec<(u64, Vec<u8>)>,
    index_name: &str,
    index_sql: &str,
    index_keys: &[(&str, u64)],
) -> (SqliteDatabase, NamedTempFile) {
    let (table_root, table_pages) = table_btree(page_size, 2, &rows);
    let index_first = 2 + table_pages.len() as u32;

    let mut sorted = index_keys.to_vec();
    sorted.sort();
    let records: Vec<Vec<u8>> = sorted
        .iter()
        .map(|(key, row_id)| {
            record(&[Value::Text(key.to_string()), Value::Int(*row_id as i64)])
        })
        .collect();
    let (index_root, index_pages) = index_btree(page_size, index_first, &records);

    let schema_cells = vec![
        table_leaf_cell(1, &schema_record("table", table_name, table_root, table_sql)),
        table_leaf_cell(2, &schema_record("index", index_name, index_root, index_sql)),
    ];
    let page1 = build_page(page_size, true, 0x0d, None, &schema_cells);

    let mut all = vec![page1];
    all.extend(table_pages);
    all.extend(index_pages);
    open(&db_file(page_size, all))
}
