//! Schema objects and CREATE-statement parsing.
//!
//! The `sqlite_schema` table on page 1 has five columns:
//! `[type, name, tbl_name, rootpage, sql]`. Table and index rows are
//! turned into descriptors here; the column lists come from the stored
//! `CREATE` text, restricted to the dialect SQLite itself emits.

use crate::sqlite::core::value::Value;
use crate::sqlite::error::{Result, SqliteError};
use tracing::debug;

/// Column order of the sqlite_schema table.
pub const SCHEMA_COLUMNS: [&str; 5] = ["type", "name", "tbl_name", "rootpage", "sql"];

/// One user table: its root page and the columns declared by its DDL.
#[derive(Debug, Clone)]
pub struct TableSchema {
    pub name: String,
    pub root_page: u32,
    pub columns: Vec<String>,
    /// Index of the `INTEGER PRIMARY KEY` column, if declared. Its
    /// stored value aliases the row-id.
    pub identity_column: Option<usize>,
}

impl TableSchema {
    /// Descriptor for sqlite_schema itself, rooted at page 1.
    pub fn sqlite_schema() -> Self {
        Self {
            name: "sqlite_schema".into(),
            root_page: 1,
            columns: SCHEMA_COLUMNS.iter().map(|c| c.to_string()).collect(),
            identity_column: None,
        }
    }

    /// Position of `name` in the column list, case-insensitively.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.eq_ignore_ascii_case(name))
    }

    /// True for SQLite's own bookkeeping tables (sqlite_sequence etc).
    pub fn is_internal(&self) -> bool {
        self.name.starts_with("sqlite_")
    }
}

/// One index: its root page, target table, and indexed columns.
#[derive(Debug, Clone)]
pub struct IndexSchema {
    pub name: String,
    pub root_page: u32,
    pub table: String,
    pub columns: Vec<String>,
}

/// All table and index descriptors of a database, built once after open.
#[derive(Debug, Default)]
pub struct Schema {
    pub tables: Vec<TableSchema>,
    pub indexes: Vec<IndexSchema>,
}

impl Schema {
    /// Builds the schema from decoded sqlite_schema rows, each a
    /// `[type, name, tbl_name, rootpage, sql]` value list.
    pub fn from_rows(rows: &[Vec<Value>]) -> Result<Self> {
        let mut schema = Schema::default();

        for values in rows {
            let kind = text_column(values, 0)?;
            let name = text_column(values, 1)?;

            match kind.as_str() {
                "table" => {
                    let root_page = root_page_column(values)?;
                    let sql = text_column(values, 4)?;
                    let (columns, identity_column) = parse_create_table(&sql)?;
                    debug!(table = %name, root_page, ?columns, "loaded table");
                    schema.tables.push(TableSchema {
                        name,
                        root_page,
                        columns,
                        identity_column,
                    });
                }
                "index" => {
                    // Auto-indexes store a NULL sql; without DDL there is
                    // no column list, so they cannot drive an index scan.
                    if matches!(values.get(4), Some(Value::Null) | None) {
                        debug!(index = %name, "skipping auto-index without sql");
                        continue;
                    }
                    let root_page = root_page_column(values)?;
                    let sql = text_column(values, 4)?;
                    let (table, columns) = parse_create_index(&sql)?;
                    debug!(index = %name, root_page, table = %table, "loaded index");
                    schema.indexes.push(IndexSchema {
                        name,
                        root_page,
                        table,
                        columns,
                    });
                }
                // Recognized but not represented.
                "view" | "trigger" => continue,
                other => return Err(SqliteError::InvalidSchemaType(other.to_string())),
            }
        }

        Ok(schema)
    }

    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.iter().find(|t| t.name.eq_ignore_ascii_case(name))
    }

    /// User tables: everything except SQLite's internal `sqlite_*` objects.
    pub fn user_tables(&self) -> impl Iterator<Item = &TableSchema> {
        self.tables.iter().filter(|t| !t.is_internal())
    }

    /// Finds an index on `table` whose first indexed column is `column`.
    pub fn index_on(&self, table: &str, column: &str) -> Option<&IndexSchema> {
        self.indexes.iter().find(|i| {
            i.table.eq_ignore_ascii_case(table)
                && i.columns
                    .first()
                    .is_some_and(|c| c.eq_ignore_ascii_case(column))
        })
    }
}

fn text_column(values: &[Value], index: usize) -> Result<String> {
    match values.get(index) {
        Some(Value::Text(s)) => Ok(s.clone()),
        other => Err(SqliteError::Corrupt(format!(
            "schema column '{}' is not text: {other:?}",
            SCHEMA_COLUMNS[index]
        ))),
    }
}

fn root_page_column(values: &[Value]) -> Result<u32> {
    match values.get(3) {
        Some(Value::Int(n)) if *n > 0 => Ok(*n as u32),
        other => Err(SqliteError::Corrupt(format!(
            "schema rootpage is not a positive integer: {other:?}"
        ))),
    }
}

/// First token of a DDL item with identifier quoting stripped.
fn identifier(token: &str) -> String {
    token
        .trim_matches(|c: char| c == '"' || c == '`' || c == '[' || c == ']')
        .to_string()
}

/// Table-level constraint keywords that start a non-column item.
fn is_constraint_keyword(token: &str) -> bool {
    matches!(
        token.to_ascii_uppercase().as_str(),
        "PRIMARY" | "UNIQUE" | "CHECK" | "FOREIGN" | "CONSTRAINT"
    )
}

/// Extracts the ordered column names and the identity column from a
/// `CREATE TABLE name (col type constraints, ...)` statement.
pub fn parse_create_table(sql: &str) -> Result<(Vec<String>, Option<usize>)> {
    let open = sql
        .find('(')
        .ok_or_else(|| SqliteError::Corrupt(format!("CREATE TABLE without column list: {sql}")))?;
    let close = sql
        .rfind(')')
        .filter(|&i| i > open)
        .ok_or_else(|| SqliteError::Corrupt(format!("unbalanced CREATE TABLE: {sql}")))?;

    let mut columns = Vec::new();
    let mut identity_column = None;

    for item in sql[open + 1..close].split(',') {
        let item = item.trim();
        if item.is_empty() {
            continue;
        }
        let mut tokens = item.split_whitespace();
        let Some(first) = tokens.next() else {
            continue;
        };
        if is_constraint_keyword(first) {
            continue;
        }

        if item.to_ascii_uppercase().contains("INTEGER PRIMARY KEY") {
            identity_column = Some(columns.len());
        }
        columns.push(identifier(first));
    }

    Ok((columns, identity_column))
}

/// Extracts the target table and column list from a
/// `CREATE INDEX name ON table (col, ...)` statement.
pub fn parse_create_index(sql: &str) -> Result<(String, Vec<String>)> {
    let open = sql
        .find('(')
        .ok_or_else(|| SqliteError::Corrupt(format!("CREATE INDEX without column list: {sql}")))?;
    let close = sql
        .rfind(')')
        .filter(|&i| i > open)
        .ok_or_else(|| SqliteError::Corrupt(format!("unbalanced CREATE INDEX: {sql}")))?;

    let head: Vec<&str> = sql[..open].split_whitespace().collect();
    let table = match head.as_slice() {
        [.., on, table] if on.eq_ignore_ascii_case("ON") => identifier(table),
        _ => {
            return Err(SqliteError::Corrupt(format!(
                "CREATE INDEX without ON clause: {sql}"
            )))
        }
    };

    let columns = sql[open + 1..close]
        .split(',')
        .map(|c| identifier(c.trim()))
        .filter(|c| !c.is_empty())
        .collect();

    Ok((table, columns))
}
