//! SQL statement execution.
//!
//! The executor resolves the target table, picks between a full table
//! scan and an index-driven scan, applies the equality filter, and
//! projects the requested columns.

use crate::sqlite::core::schema::{Schema, TableSchema};
use crate::sqlite::db::SqliteDatabase;
use crate::sqlite::error::{Result, SqliteError};
use crate::sqlite::scan::TableRow;
use crate::sqlite::statement::{Expression, Predicate, Statement};
use std::cmp::Ordering;
use std::fmt::Display;
use tracing::debug;

/// Result of executing a statement.
#[derive(Debug)]
pub enum ExecuteResult {
    /// Row count, for COUNT(*) queries
    Count(usize),
    /// One formatted line per row, for SELECT queries
    Rows(Vec<String>),
}

impl Display for ExecuteResult {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ExecuteResult::Count(count) => writeln!(f, "{count}"),
            ExecuteResult::Rows(lines) => {
                for line in lines {
                    writeln!(f, "{line}")?;
                }
                Ok(())
            }
        }
    }
}

impl SqliteDatabase {
    /// Executes a parsed statement and returns the result.
    pub fn execute(&mut self, stmt: &Statement) -> Result<ExecuteResult> {
        let schema = self.schema()?;
        let table = schema
            .table(&stmt.from_table)
            .ok_or_else(|| SqliteError::UnknownTable(stmt.from_table.clone()))?
            .clone();

        let rows = self.fetch_rows(&table, &schema, stmt.predicate.as_ref())?;

        if let [Expression::Function(call)] = stmt.selections.as_slice() {
            if call.name.eq_ignore_ascii_case("COUNT") {
                return Ok(ExecuteResult::Count(rows.len()));
            }
            return Err(SqliteError::UnsupportedQuery(format!(
                "unknown function: {}",
                call.name
            )));
        }

        let indices = projection_indices(&stmt.selections, &table)?;
        let lines = rows
            .iter()
            .map(|row| {
                indices
                    .iter()
                    .map(|&i| row.values[i].to_string())
                    .collect::<Vec<_>>()
                    .join("|")
            })
            .collect();
        Ok(ExecuteResult::Rows(lines))
    }

    /// Produces the filtered row set, through an index when one matches
    /// the predicate column, otherwise by scanning.
    fn fetch_rows(
        &mut self,
        table: &TableSchema,
        schema: &Schema,
        predicate: Option<&Predicate>,
    ) -> Result<Vec<TableRow>> {
        let Some(predicate) = predicate else {
            return self.table_scan(table);
        };

        let column = table
            .column_index(&predicate.column)
            .ok_or_else(|| SqliteError::UnknownColumn(predicate.column.clone()))?;

        if let Some(index) = schema.index_on(&table.name, &predicate.column) {
            debug!(index = %index.name, "using index for predicate");
            let entries = self.read_index_data(index.root_page, &predicate.value)?;
            let row_ids: Vec<u64> = entries.iter().map(|e| e.row_id).collect();
            return self.index_scan(table, &row_ids);
        }

        debug!(table = %table.name, "no matching index, filtering a full scan");
        let rows = self.table_scan(table)?;
        let mut matching = Vec::new();
        for row in rows {
            if row.values[column].compare(&predicate.value)? == Ordering::Equal {
                matching.push(row);
            }
        }
        Ok(matching)
    }
}

/// Resolves the projection to column indices; `*` selects every column.
fn projection_indices(selections: &[Expression], table: &TableSchema) -> Result<Vec<usize>> {
    let mut indices = Vec::new();
    for selection in selections {
        match selection {
            Expression::Asterisk => indices.extend(0..table.columns.len()),
            Expression::Column(name) => indices.push(
                table
                    .column_index(name)
                    .ok_or_else(|| SqliteError::UnknownColumn(name.clone()))?,
            ),
            Expression::Function(call) => {
                return Err(SqliteError::UnsupportedQuery(format!(
                    "function {} cannot be mixed with columns",
                    call.name
                )))
            }
        }
    }
    Ok(indices)
}
