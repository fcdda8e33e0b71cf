/// Station chain merging.
///
/// A chain links a primary station to stations whose records continue or
/// overlap it. Merging keeps every primary value and fills the primary's
/// gaps (missing timestamps and null cells) from the chained stations, in
/// link order.

use chrono::NaiveDateTime;
use log::debug;
use std::collections::BTreeMap;

use crate::error::ClideError;
use crate::table::{Table, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainLink {
    /// CliDE station number of the primary station.
    pub primary: String,
    /// CliDE station number filling the primary's gaps.
    pub chained: String,
}

impl ChainLink {
    pub fn new(primary: &str, chained: &str) -> Self {
        Self {
            primary: primary.trim().to_string(),
            chained: chained.trim().to_string(),
        }
    }

    /// Links from a `station_chains` result (`clide_id1`, `clide_id2`).
    /// Rows with a null identifier or linking a station to itself are skipped.
    pub fn from_table(table: &Table) -> Result<Vec<ChainLink>, ClideError> {
        let primary_idx = table.require_column("clide_id1")?;
        let chained_idx = table.require_column("clide_id2")?;

        let mut links = Vec::new();
        for row in table.rows() {
            let (Some(primary), Some(chained)) = (row[primary_idx].as_key(), row[chained_idx].as_key()) else {
                continue;
            };
            let link = ChainLink::new(&primary, &chained);
            if link.primary != link.chained && !links.contains(&link) {
                links.push(link);
            }
        }
        Ok(links)
    }
}

/// Merges chained-station observations into the primary observations.
///
/// Both tables carry `station_no` and `lsd`; every other column is a value
/// column. The output has the primary table's columns, ordered by
/// `lsd, station_no`, and `station_no` always names the primary station.
/// Chained rows whose value columns are all null are ignored.
pub fn merge_chained(primary: &Table, chained: &Table, links: &[ChainLink]) -> Result<Table, ClideError> {
    let columns = if primary.columns().is_empty() {
        chained.columns().to_vec()
    } else {
        primary.columns().to_vec()
    };
    let layout = Table::new(columns.clone());
    let station_idx = layout.require_column("station_no")?;
    let lsd_idx = layout.require_column("lsd")?;

    // Column positions in the chained table, by output column.
    let mapping: Vec<Option<usize>> = columns.iter().map(|c| chained.column_index(c)).collect();
    let chained_station = chained.require_column("station_no")?;
    let chained_lsd = chained.require_column("lsd")?;
    let value_columns: Vec<usize> = (0..columns.len())
        .filter(|&i| i != station_idx && i != lsd_idx)
        .collect();

    let mut merged: BTreeMap<(NaiveDateTime, String), Vec<Value>> = BTreeMap::new();
    for (row_no, row) in primary.rows().iter().enumerate() {
        let lsd = row_time(row, lsd_idx, row_no)?;
        let station = row[station_idx].as_key().unwrap_or_default();
        merged.insert((lsd, station), row.clone());
    }

    let mut filled = 0usize;
    let mut added = 0usize;
    for link in links {
        for (row_no, row) in chained.rows().iter().enumerate() {
            if row[chained_station].as_key().as_deref() != Some(link.chained.as_str()) {
                continue;
            }
            let cells: Vec<Value> = mapping
                .iter()
                .map(|idx| idx.map(|i| row[i].clone()).unwrap_or(Value::Null))
                .collect();
            if value_columns.iter().all(|&i| cells[i].is_null()) {
                continue;
            }

            let lsd = row_time(row, chained_lsd, row_no)?;
            match merged.get_mut(&(lsd, link.primary.clone())) {
                Some(existing) => {
                    for &i in &value_columns {
                        if existing[i].is_null() && !cells[i].is_null() {
                            existing[i] = cells[i].clone();
                            filled += 1;
                        }
                    }
                }
                None => {
                    let mut new_row = cells;
                    new_row[station_idx] = Value::Text(link.primary.clone());
                    merged.insert((lsd, link.primary.clone()), new_row);
                    added += 1;
                }
            }
        }
    }

    debug!(
        "merge_chained: {} links, {} rows added, {} cells filled",
        links.len(),
        added,
        filled
    );

    let rows: Vec<Vec<Value>> = merged.into_values().collect();
    Table::with_rows(columns, rows)
}

fn row_time(row: &[Value], idx: usize, row_no: usize) -> Result<NaiveDateTime, ClideError> {
    row[idx].as_datetime().ok_or_else(|| ClideError::InvalidValue {
        column: "lsd".to_string(),
        row: row_no,
        reason: format!("expected a timestamp, got {:?}", row[idx]),
    })
}
