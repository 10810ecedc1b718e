//! Row-oriented table of named, dynamically typed columns.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use thiserror::Error;

pub const TIMESTAMP_OUTPUT_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Value {
    Null,
    Int(i64),
    Text(String),
    Timestamp(NaiveDateTime),
    Date(NaiveDate),
}

impl Value {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Int(_) => "int",
            Self::Text(_) => "text",
            Self::Timestamp(_) => "timestamp",
            Self::Date(_) => "date",
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_timestamp(&self, column: &str) -> Result<Option<NaiveDateTime>, TableError> {
        match self {
            Self::Null => Ok(None),
            Self::Timestamp(ts) => Ok(Some(*ts)),
            other => Err(TableError::TypeMismatch {
                column: column.to_string(),
                expected: "timestamp",
                found: other.kind(),
            }),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Int(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
            Self::Timestamp(ts) => write!(f, "{}", ts.format(TIMESTAMP_OUTPUT_FORMAT)),
            Self::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TableError {
    #[error("missing required column '{column}'")]
    MissingColumn { column: String },
    #[error("column '{column}' holds a {found} value where a {expected} was expected")]
    TypeMismatch {
        column: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("duplicate column '{0}'")]
    DuplicateColumn(String),
    #[error("row has {found} values, table has {expected} columns")]
    RowWidth { expected: usize, found: usize },
    #[error("column '{column}' expects {expected} values, got {found}")]
    ColumnLength {
        column: String,
        expected: usize,
        found: usize,
    },
    #[error("duplicate key {key} while pivoting column '{column}'")]
    DuplicateKey { column: String, key: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Result<Self, TableError> {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.as_str()) {
                return Err(TableError::DuplicateColumn(column.clone()));
            }
        }
        Ok(Self {
            columns,
            rows: Vec::new(),
        })
    }

    pub fn from_rows<S: Into<String>>(
        columns: impl IntoIterator<Item = S>,
        rows: Vec<Vec<Value>>,
    ) -> Result<Self, TableError> {
        let mut table = Self::new(columns)?;
        for row in rows {
            table.push_row(row)?;
        }
        Ok(table)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn column_index(&self, name: &str) -> Result<usize, TableError> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| TableError::MissingColumn {
                column: name.to_string(),
            })
    }

    pub fn column_indices(&self, names: &[&str]) -> Result<Vec<usize>, TableError> {
        names.iter().map(|name| self.column_index(name)).collect()
    }

    pub fn require_columns(&self, names: &[&str]) -> Result<(), TableError> {
        self.column_indices(names).map(|_| ())
    }

    pub fn push_row(&mut self, row: Vec<Value>) -> Result<(), TableError> {
        if row.len() != self.columns.len() {
            return Err(TableError::RowWidth {
                expected: self.columns.len(),
                found: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn value(&self, row: usize, column: &str) -> Result<Option<&Value>, TableError> {
        let idx = self.column_index(column)?;
        Ok(self.rows.get(row).map(|r| &r[idx]))
    }

    pub fn column_values(&self, name: &str) -> Result<Vec<&Value>, TableError> {
        let idx = self.column_index(name)?;
        Ok(self.rows.iter().map(|row| &row[idx]).collect())
    }

    pub fn add_column(&mut self, name: &str, values: Vec<Value>) -> Result<(), TableError> {
        if self.has_column(name) {
            return Err(TableError::DuplicateColumn(name.to_string()));
        }
        if values.len() != self.rows.len() {
            return Err(TableError::ColumnLength {
                column: name.to_string(),
                expected: self.rows.len(),
                found: values.len(),
            });
        }
        self.columns.push(name.to_string());
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.push(value);
        }
        Ok(())
    }

    pub fn rename_column(&mut self, old: &str, new: &str) -> Result<(), TableError> {
        let idx = self.column_index(old)?;
        if old != new && self.has_column(new) {
            return Err(TableError::DuplicateColumn(new.to_string()));
        }
        self.columns[idx] = new.to_string();
        Ok(())
    }

    pub fn drop_column(&mut self, name: &str) -> bool {
        let Some(idx) = self.columns.iter().position(|c| c == name) else {
            return false;
        };
        self.columns.remove(idx);
        for row in &mut self.rows {
            row.remove(idx);
        }
        true
    }

    pub fn select(&self, names: &[&str]) -> Result<Table, TableError> {
        let indices = self.column_indices(names)?;
        let mut out = Table::new(names.iter().copied())?;
        out.rows = self
            .rows
            .iter()
            .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
            .collect();
        Ok(out)
    }

    pub fn filter<F>(&self, mut predicate: F) -> Result<Table, TableError>
    where
        F: FnMut(&[Value]) -> Result<bool, TableError>,
    {
        let mut out = Table {
            columns: self.columns.clone(),
            rows: Vec::new(),
        };
        for row in &self.rows {
            if predicate(row)? {
                out.rows.push(row.clone());
            }
        }
        Ok(out)
    }

    pub fn map_column<F, E>(&mut self, name: &str, mut f: F) -> Result<(), E>
    where
        F: FnMut(&Value) -> Result<Value, E>,
        E: From<TableError>,
    {
        let idx = self.column_index(name)?;
        for row in &mut self.rows {
            row[idx] = f(&row[idx])?;
        }
        Ok(())
    }

    pub fn replace_column(&mut self, name: &str, values: Vec<Value>) -> Result<(), TableError> {
        let idx = self.column_index(name)?;
        if values.len() != self.rows.len() {
            return Err(TableError::ColumnLength {
                column: name.to_string(),
                expected: self.rows.len(),
                found: values.len(),
            });
        }
        for (row, value) in self.rows.iter_mut().zip(values) {
            row[idx] = value;
        }
        Ok(())
    }

    pub fn fill_null(&mut self, value: &Value) {
        for cell in self.rows.iter_mut().flatten() {
            if cell.is_null() {
                *cell = value.clone();
            }
        }
    }

    pub fn sort_by_columns(&mut self, keys: &[(&str, SortOrder)]) -> Result<(), TableError> {
        let resolved: Vec<(usize, SortOrder)> = keys
            .iter()
            .map(|(name, order)| self.column_index(name).map(|idx| (idx, *order)))
            .collect::<Result<_, _>>()?;

        self.rows.sort_by(|a, b| {
            for (idx, order) in &resolved {
                let ord = match order {
                    SortOrder::Ascending => a[*idx].cmp(&b[*idx]),
                    SortOrder::Descending => b[*idx].cmp(&a[*idx]),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(raw: &str) -> Value {
        Value::Timestamp(NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").unwrap())
    }

    fn sample() -> Table {
        Table::from_rows(
            ["order_id", "status_code"],
            vec![
                vec![Value::Int(2), Value::text("200")],
                vec![Value::Int(1), Value::Null],
                vec![Value::Int(3), Value::text("500")],
            ],
        )
        .unwrap()
    }

    #[test]
    fn rejects_duplicate_columns_and_ragged_rows() {
        assert_eq!(
            Table::new(["a", "a"]).unwrap_err(),
            TableError::DuplicateColumn("a".to_string())
        );

        let mut table = Table::new(["a", "b"]).unwrap();
        assert_eq!(
            table.push_row(vec![Value::Int(1)]).unwrap_err(),
            TableError::RowWidth {
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn missing_column_is_reported_by_name() {
        let table = sample();
        assert_eq!(
            table.select(&["order_id", "error_code"]).unwrap_err(),
            TableError::MissingColumn {
                column: "error_code".to_string()
            }
        );
    }

    #[test]
    fn sort_is_stable_and_respects_direction() {
        let mut table = Table::from_rows(
            ["k", "n"],
            vec![
                vec![Value::text("a"), Value::Int(1)],
                vec![Value::text("b"), Value::Int(3)],
                vec![Value::text("c"), Value::Int(1)],
            ],
        )
        .unwrap();
        table
            .sort_by_columns(&[("n", SortOrder::Descending)])
            .unwrap();
        let keys: Vec<String> = table.rows().iter().map(|r| r[0].to_string()).collect();
        assert_eq!(keys, vec!["b", "a", "c"]);
    }

    #[test]
    fn fill_null_replaces_every_null_cell() {
        let mut table = sample();
        table.fill_null(&Value::Int(0));
        assert_eq!(table.rows()[1][1], Value::Int(0));
    }

    #[test]
    fn timestamp_accessor_distinguishes_null_and_wrong_type() {
        assert_eq!(Value::Null.as_timestamp("t").unwrap(), None);
        assert!(ts("2024-01-01 10:00:00").as_timestamp("t").unwrap().is_some());
        assert!(matches!(
            Value::text("yesterday").as_timestamp("t").unwrap_err(),
            TableError::TypeMismatch {
                expected: "timestamp",
                found: "text",
                ..
            }
        ));
    }

    #[test]
    fn display_renders_csv_friendly_cells() {
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(ts("2024-01-01 10:00:00").to_string(), "2024-01-01 10:00:00");
        assert_eq!(
            Value::Date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()).to_string(),
            "2024-01-01"
        );
    }
}
