//! Per-window polling event counts.
//!
//! Every facet is the same combinator: filter a window, group by the facet's
//! keys, count, sort descending by the count. Facets differ in their grouping
//! keys and count column; the no-error facet also recodes null error codes.

use tracing::debug;

use crate::relational::group_count;
use crate::table::{SortOrder, Table, TableError, Value};
use crate::windows::{filter_window, Window, ORDER_CREATION_TIME, POLLING_CREATION_TIME};

pub const ORDER_ID: &str = "order_id";
pub const STATUS_CODE: &str = "status_code";
pub const ERROR_CODE: &str = "error_code";
pub const NO_ERROR_SENTINEL: &str = "NOERRORRESPONSE";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Facet {
    TotalEvents,
    StatusCode,
    ErrorCode,
    NoErrorCode,
}

impl Facet {
    pub const ALL: [Facet; 4] = [
        Facet::TotalEvents,
        Facet::StatusCode,
        Facet::ErrorCode,
        Facet::NoErrorCode,
    ];

    pub fn keys(self) -> &'static [&'static str] {
        match self {
            Self::TotalEvents => &[ORDER_ID],
            Self::StatusCode => &[ORDER_ID, STATUS_CODE],
            Self::ErrorCode | Self::NoErrorCode => &[ORDER_ID, ERROR_CODE],
        }
    }

    pub fn count_column(self, window: Window) -> String {
        let prefix = match self {
            Self::TotalEvents => "total_polling_event",
            Self::StatusCode => "status_code_count",
            Self::ErrorCode => "error_code_count",
            Self::NoErrorCode => "no_error_code_count",
        };
        format!("{prefix}_{}", window.label())
    }
}

pub fn count_in_window(
    labeled: &Table,
    window: Window,
    keys: &[&str],
    count_column: &str,
) -> Result<Table, TableError> {
    labeled.require_columns(keys)?;
    let subset = filter_window(labeled, window)?;
    let mut counts = group_count(&subset, keys, count_column)?;
    counts.sort_by_columns(&[(count_column, SortOrder::Descending)])?;
    Ok(counts)
}

pub fn aggregate(labeled: &Table, window: Window, facet: Facet) -> Result<Table, TableError> {
    labeled.require_columns(&[ORDER_CREATION_TIME, POLLING_CREATION_TIME])?;
    labeled.require_columns(facet.keys())?;
    let count_column = facet.count_column(window);

    let counts = match facet {
        Facet::NoErrorCode => {
            let no_error = no_error_code_rows(labeled)?;
            count_in_window(&no_error, window, facet.keys(), &count_column)?
        }
        _ => count_in_window(labeled, window, facet.keys(), &count_column)?,
    };

    debug!(
        component = "aggregate",
        event = "aggregate.facet.finish",
        window = window.label(),
        facet = ?facet,
        groups = counts.len()
    );

    Ok(counts)
}

pub fn no_error_code_rows(events: &Table) -> Result<Table, TableError> {
    let error_idx = events.column_index(ERROR_CODE)?;
    let mut subset = events.filter(|row| Ok(row[error_idx].is_null()))?;
    subset.map_column(ERROR_CODE, |_| Ok::<_, TableError>(Value::text(NO_ERROR_SENTINEL)))?;
    Ok(subset)
}

pub fn total_event_count(labeled: &Table, window: Window) -> Result<Table, TableError> {
    aggregate(labeled, window, Facet::TotalEvents)
}

pub fn status_code_count(labeled: &Table, window: Window) -> Result<Table, TableError> {
    aggregate(labeled, window, Facet::StatusCode)
}

pub fn error_code_count(labeled: &Table, window: Window) -> Result<Table, TableError> {
    aggregate(labeled, window, Facet::ErrorCode)
}

pub fn no_error_code_count(labeled: &Table, window: Window) -> Result<Table, TableError> {
    aggregate(labeled, window, Facet::NoErrorCode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::windows::label_windows;
    use chrono::NaiveDateTime;

    fn ts(raw: &str) -> Value {
        Value::Timestamp(NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").unwrap())
    }

    fn labeled(rows: &[(&str, &str, i64, Option<&str>)]) -> Table {
        let table = Table::from_rows(
            [
                ORDER_ID,
                ORDER_CREATION_TIME,
                POLLING_CREATION_TIME,
                STATUS_CODE,
                ERROR_CODE,
            ],
            rows.iter()
                .map(|(order, polling, status, error)| {
                    vec![
                        Value::text(*order),
                        ts("2024-01-01 10:00:00"),
                        ts(polling),
                        Value::Int(*status),
                        error.map(Value::text).unwrap_or(Value::Null),
                    ]
                })
                .collect(),
        )
        .unwrap();
        label_windows(&table).unwrap()
    }

    #[test]
    fn count_columns_are_named_per_window() {
        assert_eq!(
            Facet::TotalEvents.count_column(Window::Pre3Min),
            "total_polling_event_pre_3min"
        );
        assert_eq!(
            Facet::NoErrorCode.count_column(Window::Pre1Hr),
            "no_error_code_count_pre_1hr"
        );
    }

    #[test]
    fn totals_are_sorted_descending() {
        let events = labeled(&[
            ("o1", "2024-01-01 09:58:00", 200, None),
            ("o2", "2024-01-01 09:59:00", 200, None),
            ("o2", "2024-01-01 09:59:30", 200, None),
        ]);
        let totals = total_event_count(&events, Window::Pre3Min).unwrap();
        assert_eq!(
            totals.rows(),
            &[
                vec![Value::text("o2"), Value::Int(2)],
                vec![Value::text("o1"), Value::Int(1)],
            ]
        );
    }

    #[test]
    fn error_codes_exclude_nulls_and_no_error_uses_sentinel() {
        let events = labeled(&[
            ("o1", "2024-01-01 09:58:00", 200, None),
            ("o1", "2024-01-01 09:58:30", 500, Some("E1")),
            ("o1", "2024-01-01 09:59:00", 200, None),
        ]);

        let errors = error_code_count(&events, Window::Pre3Min).unwrap();
        assert_eq!(
            errors.rows(),
            &[vec![Value::text("o1"), Value::text("E1"), Value::Int(1)]]
        );

        let no_errors = no_error_code_count(&events, Window::Pre3Min).unwrap();
        assert_eq!(
            no_errors.columns(),
            &[ORDER_ID, ERROR_CODE, "no_error_code_count_pre_3min"]
        );
        assert_eq!(
            no_errors.rows(),
            &[vec![
                Value::text("o1"),
                Value::text(NO_ERROR_SENTINEL),
                Value::Int(2)
            ]]
        );
    }

    #[test]
    fn every_facet_tolerates_an_empty_window() {
        let events = labeled(&[("o1", "2024-01-01 08:00:00", 200, None)]);
        for facet in Facet::ALL {
            let out = aggregate(&events, Window::Post3Min, facet).unwrap();
            assert!(out.is_empty());
            assert_eq!(out.width(), facet.keys().len() + 1);
        }
    }

    #[test]
    fn missing_key_column_fails_even_without_rows() {
        let table = Table::new([ORDER_ID, ORDER_CREATION_TIME, POLLING_CREATION_TIME]).unwrap();
        let events = label_windows(&table).unwrap();
        assert_eq!(
            status_code_count(&events, Window::Pre1Hr).unwrap_err(),
            TableError::MissingColumn {
                column: STATUS_CODE.to_string()
            }
        );
    }
}
