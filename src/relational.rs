//! Hashed grouping, joins and pivoting over [`Table`].

use std::collections::{BTreeSet, HashMap};

use crate::table::{Table, TableError, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Outer,
}

pub fn group_count(table: &Table, keys: &[&str], count_column: &str) -> Result<Table, TableError> {
    let key_idx = table.column_indices(keys)?;
    let mut out_columns: Vec<&str> = keys.to_vec();
    out_columns.push(count_column);
    let mut out = Table::new(out_columns)?;

    let mut slots: HashMap<Vec<Value>, usize> = HashMap::new();
    let mut groups: Vec<(Vec<Value>, i64)> = Vec::new();
    for row in table.rows() {
        let key: Vec<Value> = key_idx.iter().map(|&i| row[i].clone()).collect();
        // Null keys are not a group.
        if key.iter().any(Value::is_null) {
            continue;
        }
        match slots.get(&key) {
            Some(&slot) => groups[slot].1 += 1,
            None => {
                slots.insert(key.clone(), groups.len());
                groups.push((key, 1));
            }
        }
    }

    for (mut key, count) in groups {
        key.push(Value::Int(count));
        out.push_row(key)?;
    }
    Ok(out)
}

pub fn join(left: &Table, right: &Table, on: &[&str], kind: JoinKind) -> Result<Table, TableError> {
    let left_keys = left.column_indices(on)?;
    let right_keys = right.column_indices(on)?;

    let right_payload: Vec<usize> = (0..right.width())
        .filter(|idx| !right_keys.contains(idx))
        .collect();

    // Clashing non-key names get `_x` on the left and `_y` on the right.
    let mut columns = Vec::with_capacity(left.width() + right_payload.len());
    for (idx, name) in left.columns().iter().enumerate() {
        let clashes = !left_keys.contains(&idx)
            && right_payload.iter().any(|&r| &right.columns()[r] == name);
        columns.push(if clashes {
            format!("{name}_x")
        } else {
            name.clone()
        });
    }
    for &idx in &right_payload {
        let name = &right.columns()[idx];
        let clashes = left
            .columns()
            .iter()
            .enumerate()
            .any(|(l, left_name)| !left_keys.contains(&l) && left_name == name);
        columns.push(if clashes {
            format!("{name}_y")
        } else {
            name.clone()
        });
    }
    let mut out = Table::new(columns)?;

    let mut index: HashMap<Vec<Value>, Vec<usize>> = HashMap::new();
    for (row_idx, row) in right.rows().iter().enumerate() {
        let key: Vec<Value> = right_keys.iter().map(|&i| row[i].clone()).collect();
        index.entry(key).or_default().push(row_idx);
    }

    let mut right_matched = vec![false; right.len()];
    for left_row in left.rows() {
        let key: Vec<Value> = left_keys.iter().map(|&i| left_row[i].clone()).collect();
        match index.get(&key) {
            Some(matches) => {
                for &right_idx in matches {
                    right_matched[right_idx] = true;
                    let right_row = &right.rows()[right_idx];
                    let mut row = left_row.clone();
                    row.extend(right_payload.iter().map(|&i| right_row[i].clone()));
                    out.push_row(row)?;
                }
            }
            None if kind != JoinKind::Inner => {
                let mut row = left_row.clone();
                row.extend(std::iter::repeat(Value::Null).take(right_payload.len()));
                out.push_row(row)?;
            }
            None => {}
        }
    }

    if kind == JoinKind::Outer {
        for (right_idx, right_row) in right.rows().iter().enumerate() {
            if right_matched[right_idx] {
                continue;
            }
            let mut row = vec![Value::Null; left.width()];
            for (&l, &r) in left_keys.iter().zip(&right_keys) {
                row[l] = right_row[r].clone();
            }
            row.extend(right_payload.iter().map(|&i| right_row[i].clone()));
            out.push_row(row)?;
        }
    }

    Ok(out)
}

pub fn join_all(tables: Vec<Table>, on: &[&str], kind: JoinKind) -> Result<Table, TableError> {
    let mut iter = tables.into_iter();
    let Some(mut acc) = iter.next() else {
        return Table::new(on.iter().copied());
    };
    for table in iter {
        acc = join(&acc, &table, on, kind)?;
    }
    Ok(acc)
}

pub fn pivot_wider(
    table: &Table,
    index: &str,
    key: &str,
    values: &[&str],
) -> Result<Table, TableError> {
    let index_idx = table.column_index(index)?;
    let key_idx = table.column_index(key)?;
    let value_idx = table.column_indices(values)?;

    let mut present: Vec<BTreeSet<Value>> = vec![BTreeSet::new(); values.len()];
    for row in table.rows() {
        for (slot, &v) in value_idx.iter().enumerate() {
            if !row[v].is_null() {
                present[slot].insert(row[key_idx].clone());
            }
        }
    }

    let mut columns = vec![index.to_string()];
    let mut positions: HashMap<(usize, Value), usize> = HashMap::new();
    for (slot, keys) in present.iter().enumerate() {
        for k in keys {
            positions.insert((slot, k.clone()), columns.len());
            columns.push(format!("{}_{}", values[slot], k));
        }
    }
    let width = columns.len();
    let mut out = Table::new(columns)?;

    let mut row_of: HashMap<Value, usize> = HashMap::new();
    let mut rows: Vec<Vec<Value>> = Vec::new();
    for row in table.rows() {
        let id = row[index_idx].clone();
        let target = match row_of.get(&id) {
            Some(&target) => target,
            None => {
                let mut fresh = vec![Value::Null; width];
                fresh[0] = id.clone();
                row_of.insert(id, rows.len());
                rows.push(fresh);
                rows.len() - 1
            }
        };
        for (slot, &v) in value_idx.iter().enumerate() {
            if row[v].is_null() {
                continue;
            }
            let Some(&col) = positions.get(&(slot, row[key_idx].clone())) else {
                continue;
            };
            let cell = &mut rows[target][col];
            if !cell.is_null() {
                return Err(TableError::DuplicateKey {
                    column: values[slot].to_string(),
                    key: format!("({}, {})", row[index_idx], row[key_idx]),
                });
            }
            *cell = row[v].clone();
        }
    }

    for row in rows {
        out.push_row(row)?;
    }
    Ok(out)
}
