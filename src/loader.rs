//! CSV loading and the preparation steps that run before window labelling.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike};
use thiserror::Error;
use tracing::info;

use crate::relational::{join, JoinKind};
use crate::table::{Table, TableError, Value};

pub const DEVICE_ID: &str = "device_id";
pub const HOUR: &str = "hour";
pub const DATE: &str = "date";

const NAIVE_TIMESTAMP_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];
const OFFSET_TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%z"];

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Table(#[from] TableError),
    #[error("cannot parse '{value}' in column '{column}' as a timestamp")]
    InvalidTimestamp { column: String, value: String },
}

pub fn read_csv_table(
    path: &Path,
    timestamp_columns: &[&str],
    text_columns: &[&str],
) -> Result<Table, LoadError> {
    let file = fs::File::open(path).map_err(|source| LoadError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let table = parse_csv_table(file, timestamp_columns, text_columns)?;

    info!(
        component = "loader",
        event = "loader.read.finish",
        path = %path.display(),
        rows = table.len(),
        columns = table.width()
    );

    Ok(table)
}

pub fn parse_csv_table<R: Read>(
    reader: R,
    timestamp_columns: &[&str],
    text_columns: &[&str],
) -> Result<Table, LoadError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let keep: Vec<usize> = headers
        .iter()
        .enumerate()
        .filter(|(_, name)| !is_index_column(name))
        .map(|(idx, _)| idx)
        .collect();

    let mut raw_columns: Vec<Vec<Option<String>>> = vec![Vec::new(); keep.len()];
    for record in csv_reader.records() {
        let record = record?;
        for (slot, &idx) in keep.iter().enumerate() {
            let field = record.get(idx).unwrap_or_default();
            raw_columns[slot].push((!field.is_empty()).then(|| field.to_string()));
        }
    }

    let names: Vec<&str> = keep.iter().map(|&idx| &headers[idx]).collect();
    let mut typed: Vec<Vec<Value>> = Vec::with_capacity(names.len());
    for (name, raw) in names.iter().zip(raw_columns) {
        let column = if timestamp_columns.contains(name) {
            parse_timestamp_column(name, raw)?
        } else if text_columns.contains(name) {
            text_column(raw)
        } else {
            infer_column(raw)
        };
        typed.push(column);
    }

    for required in timestamp_columns {
        if !names.contains(required) {
            return Err(TableError::MissingColumn {
                column: (*required).to_string(),
            }
            .into());
        }
    }

    let row_count = typed.first().map(Vec::len).unwrap_or(0);
    let mut rows: Vec<Vec<Value>> = (0..row_count)
        .map(|_| Vec::with_capacity(typed.len()))
        .collect();
    for column in typed {
        for (row, value) in rows.iter_mut().zip(column) {
            row.push(value);
        }
    }

    Ok(Table::from_rows(names, rows)?)
}

pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    for format in NAIVE_TIMESTAMP_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(ts);
        }
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.naive_utc());
    }
    for format in OFFSET_TIMESTAMP_FORMATS {
        if let Ok(ts) = DateTime::parse_from_str(raw, format) {
            return Some(ts.naive_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

pub fn fill_missing_forward_backward(table: &mut Table, column: &str) -> Result<(), TableError> {
    let mut values: Vec<Value> = table.column_values(column)?.into_iter().cloned().collect();

    let mut last: Option<Value> = None;
    for value in values.iter_mut() {
        if value.is_null() {
            if let Some(prev) = &last {
                *value = prev.clone();
            }
        } else {
            last = Some(value.clone());
        }
    }

    let mut next: Option<Value> = None;
    for value in values.iter_mut().rev() {
        if value.is_null() {
            if let Some(following) = &next {
                *value = following.clone();
            }
        } else {
            next = Some(value.clone());
        }
    }

    table.replace_column(column, values)
}

pub fn add_hour_date_fields(table: &mut Table, datetime_column: &str) -> Result<(), TableError> {
    let mut hours = Vec::with_capacity(table.len());
    let mut dates = Vec::with_capacity(table.len());
    for value in table.column_values(datetime_column)? {
        match value.as_timestamp(datetime_column)? {
            Some(ts) => {
                hours.push(Value::Int(i64::from(ts.hour())));
                dates.push(Value::Date(ts.date()));
            }
            None => {
                hours.push(Value::Null);
                dates.push(Value::Null);
            }
        }
    }
    table.add_column(HOUR, hours)?;
    table.add_column(DATE, dates)
}

pub fn join_polling_with_orders(polling: &Table, orders: &Table) -> Result<Table, TableError> {
    let joined = join(polling, orders, &[DEVICE_ID, HOUR, DATE], JoinKind::Inner)?;
    info!(
        component = "loader",
        event = "loader.join.finish",
        polling_rows = polling.len(),
        order_rows = orders.len(),
        joined_rows = joined.len(),
        columns = joined.width()
    );
    Ok(joined)
}

fn is_index_column(name: &str) -> bool {
    name.is_empty() || name.starts_with("Unnamed: ")
}

fn infer_column(raw: Vec<Option<String>>) -> Vec<Value> {
    let all_int = raw
        .iter()
        .flatten()
        .all(|field| field.parse::<i64>().is_ok());
    raw.into_iter()
        .map(|field| match field {
            None => Value::Null,
            Some(field) if all_int => field.parse::<i64>().map(Value::Int).unwrap_or(Value::Null),
            Some(field) => Value::Text(field),
        })
        .collect()
}

fn text_column(raw: Vec<Option<String>>) -> Vec<Value> {
    raw.into_iter()
        .map(|field| field.map(Value::Text).unwrap_or(Value::Null))
        .collect()
}

fn parse_timestamp_column(name: &str, raw: Vec<Option<String>>) -> Result<Vec<Value>, LoadError> {
    raw.into_iter()
        .map(|field| match field {
            None => Ok(Value::Null),
            Some(field) => parse_timestamp(&field)
                .map(Value::Timestamp)
                .ok_or_else(|| LoadError::InvalidTimestamp {
                    column: name.to_string(),
                    value: field,
                }),
        })
        .collect()
}
