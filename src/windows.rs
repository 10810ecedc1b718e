//! Window labelling and filtering relative to order creation time.

use chrono::{Duration, NaiveDateTime};
use tracing::debug;

use crate::table::{Table, TableError, Value};

pub const ORDER_CREATION_TIME: &str = "order_creation_time";
pub const POLLING_CREATION_TIME: &str = "polling_creation_time";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Window {
    Pre3Min,
    Post3Min,
    Pre1Hr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Before,
    After,
}

impl Window {
    pub const ALL: [Window; 3] = [Window::Pre3Min, Window::Post3Min, Window::Pre1Hr];

    pub fn label(self) -> &'static str {
        match self {
            Self::Pre3Min => "pre_3min",
            Self::Post3Min => "post_3min",
            Self::Pre1Hr => "pre_1hr",
        }
    }

    pub fn bound_column(self) -> &'static str {
        match self {
            Self::Pre3Min => "three_minutes_b4_order_creation_time",
            Self::Post3Min => "three_minutes_after_order_creation_time",
            Self::Pre1Hr => "one_hour_before_order_creation_time",
        }
    }

    pub fn offset(self) -> Duration {
        match self {
            Self::Pre3Min | Self::Post3Min => Duration::minutes(3),
            Self::Pre1Hr => Duration::hours(1),
        }
    }

    pub fn direction(self) -> Direction {
        match self {
            Self::Pre3Min | Self::Pre1Hr => Direction::Before,
            Self::Post3Min => Direction::After,
        }
    }

    pub fn bound_for(self, creation: NaiveDateTime) -> Option<NaiveDateTime> {
        match self.direction() {
            Direction::Before => creation.checked_sub_signed(self.offset()),
            Direction::After => creation.checked_add_signed(self.offset()),
        }
    }

    pub fn contains(
        self,
        creation: NaiveDateTime,
        polling: NaiveDateTime,
        bound: NaiveDateTime,
    ) -> bool {
        match self.direction() {
            Direction::Before => creation >= polling && polling >= bound,
            Direction::After => creation <= polling && polling <= bound,
        }
    }
}

pub fn label_windows(events: &Table) -> Result<Table, TableError> {
    let creation_idx = events.column_index(ORDER_CREATION_TIME)?;

    let mut bounds: Vec<Vec<Value>> = vec![Vec::with_capacity(events.len()); Window::ALL.len()];
    for row in events.rows() {
        let creation = row[creation_idx].as_timestamp(ORDER_CREATION_TIME)?;
        for (slot, window) in Window::ALL.iter().enumerate() {
            let bound = creation
                .and_then(|ts| window.bound_for(ts))
                .map(Value::Timestamp)
                .unwrap_or(Value::Null);
            bounds[slot].push(bound);
        }
    }

    let mut labeled = events.clone();
    for (window, values) in Window::ALL.iter().zip(bounds) {
        labeled.add_column(window.bound_column(), values)?;
    }

    debug!(
        component = "windows",
        event = "windows.label.finish",
        rows = labeled.len(),
        added_columns = ?Window::ALL.map(Window::bound_column)
    );

    Ok(labeled)
}

pub fn filter_window(labeled: &Table, window: Window) -> Result<Table, TableError> {
    let creation_idx = labeled.column_index(ORDER_CREATION_TIME)?;
    let polling_idx = labeled.column_index(POLLING_CREATION_TIME)?;
    let bound_idx = labeled.column_index(window.bound_column())?;

    let subset = labeled.filter(|row| {
        let creation = row[creation_idx].as_timestamp(ORDER_CREATION_TIME)?;
        let polling = row[polling_idx].as_timestamp(POLLING_CREATION_TIME)?;
        let bound = row[bound_idx].as_timestamp(window.bound_column())?;
        Ok(match (creation, polling, bound) {
            (Some(c), Some(p), Some(b)) => window.contains(c, p, b),
            _ => false,
        })
    })?;

    debug!(
        component = "windows",
        event = "windows.filter.finish",
        window = window.label(),
        input_rows = labeled.len(),
        output_rows = subset.len()
    );

    Ok(subset)
}
