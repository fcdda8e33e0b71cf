/// Monthly rainfall summaries in the layout the SCOPIC seasonal outlook
/// tool imports.
///
/// Each calendar month touched by `[from, to]` yields one record. Daily
/// rainfall (`obs_daily.rain_24h`) is summed per month; `missing_cons` is the
/// longest run of days inside the window with no rainfall value.

use chrono::{Datelike, NaiveDate};
use log::{debug, info};
use postgres::GenericClient;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use super::aggregate::{Observation, ObservationColumns, Period, longest_missing_run};
use crate::error::ClideError;
use crate::query::{observations, scopic as scopic_query};
use crate::table::{Table, Value};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScopicMonth {
    pub station_no: String,
    pub year: i32,
    pub month: u32,
    /// Rainfall total, `None` when no value exists for the month.
    pub data: Option<f64>,
    /// Days with a rainfall value.
    pub data_count: u32,
    /// Calendar days in the month.
    pub days_in_month: u32,
    /// Longest run of consecutive days without a value.
    pub missing_cons: u32,
}

impl ScopicMonth {
    fn key(&self) -> (i32, u32) {
        (self.year, self.month)
    }
}

/// Monthly records for one station from daily observations.
///
/// Observations for other stations or outside the window are ignored. A
/// window with `from` after `to` yields no months.
pub fn build_monthly(station: &str, daily: &[Observation], from: NaiveDate, to: NaiveDate) -> Vec<ScopicMonth> {
    if from > to {
        return Vec::new();
    }

    let mut by_day: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for obs in daily.iter().filter(|o| o.station_no.eq_ignore_ascii_case(station)) {
        let date = obs.timestamp.date();
        if date < from || date > to {
            continue;
        }
        if let Some(value) = obs.value {
            *by_day.entry(date).or_insert(0.0) += value;
        }
    }

    let mut months = Vec::new();
    let mut month_start = Period::Monthly.start_of(from);
    while month_start <= to {
        let next = Period::Monthly.next_start(month_start);
        let first = month_start.max(from);
        let last = next.pred_opt().unwrap_or(next).min(to);
        let window_days = (last - first).num_days() as usize + 1;

        let mut total = 0.0;
        let mut present = BTreeSet::new();
        for (date, value) in by_day.range(first..=last) {
            total += value;
            present.insert((*date - first).num_days() as usize);
        }

        months.push(ScopicMonth {
            station_no: station.to_string(),
            year: month_start.year(),
            month: month_start.month(),
            data: if present.is_empty() { None } else { Some(total) },
            data_count: present.len() as u32,
            days_in_month: Period::Monthly.days_in(month_start),
            missing_cons: longest_missing_run(&present, window_days) as u32,
        });
        month_start = next;
    }
    months
}

/// Fills months without daily data from `monthly_totals` rows
/// (`year, month, data`).
pub fn fill_from_monthly_totals(months: &mut [ScopicMonth], totals: &Table) -> Result<(), ClideError> {
    let year_idx = totals.require_column("year")?;
    let month_idx = totals.require_column("month")?;
    let data_idx = totals.require_column("data")?;

    let mut lookup: BTreeMap<(i32, u32), f64> = BTreeMap::new();
    for row in totals.rows() {
        let (Some(year), Some(month), Some(data)) = (
            row[year_idx].as_i64(),
            row[month_idx].as_i64(),
            row[data_idx].as_f64(),
        ) else {
            continue;
        };
        lookup.insert((year as i32, month as u32), data);
    }

    let mut filled = 0;
    for month in months.iter_mut().filter(|m| m.data.is_none()) {
        if let Some(total) = lookup.get(&month.key()) {
            month.data = Some(*total);
            filled += 1;
        }
    }
    debug!("filled {} months from obs_monthly", filled);
    Ok(())
}

/// Keeps months whose year lies in `first..=last`.
pub fn restrict_to_years(months: Vec<ScopicMonth>, first: i32, last: i32) -> Vec<ScopicMonth> {
    months
        .into_iter()
        .filter(|m| (first..=last).contains(&m.year))
        .collect()
}

fn daily_rain<C: GenericClient>(
    client: &mut C,
    station: &str,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<Observation>, ClideError> {
    let table = observations::rain_24h(client, &[station.to_string()], from, to)?;
    Observation::from_table(&table, &ObservationColumns::new("rain_24h"))
}

/// SCOPIC months for one station from daily data only.
pub fn scopic<C: GenericClient>(
    client: &mut C,
    station: &str,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<ScopicMonth>, ClideError> {
    if from > to {
        return Err(ClideError::InvalidArgument(format!(
            "from date {} is after to date {}",
            from, to
        )));
    }
    let daily = daily_rain(client, station, from, to)?;
    Ok(build_monthly(station, &daily, from, to))
}

/// SCOPIC months for one station, falling back to `obs_monthly` totals for
/// months without daily data. Restricted to the station's years of record;
/// empty when the station has none.
pub fn scopic_with_monthly<C: GenericClient>(
    client: &mut C,
    station: &str,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<ScopicMonth>, ClideError> {
    let mut months = scopic(client, station, from, to)?;
    let totals = scopic_query::monthly_totals(client, station, from, to)?;
    fill_from_monthly_totals(&mut months, &totals)?;

    match scopic_query::years_of_record(client, station)? {
        Some((first, last)) => Ok(restrict_to_years(months, first, last)),
        None => {
            info!("station {} has no daily or monthly records", station);
            Ok(Vec::new())
        }
    }
}

/// SCOPIC months for several stations, concatenated in input order.
/// Months without any rainfall total are dropped.
pub fn scopic_multi<C: GenericClient>(
    client: &mut C,
    stations: &[String],
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<ScopicMonth>, ClideError> {
    let mut all = Vec::new();
    for station in stations {
        let months = scopic(client, station, from, to)?;
        all.extend(months.into_iter().filter(|m| m.data.is_some()));
    }
    Ok(all)
}

/// Columns: `station_no, year, month, data, data_count, days_in_month, missing_cons`.
pub fn scopic_table(months: &[ScopicMonth]) -> Table {
    let mut table = Table::new([
        "station_no",
        "year",
        "month",
        "data",
        "data_count",
        "days_in_month",
        "missing_cons",
    ]);
    for m in months {
        table.push_built_row(vec![
            Value::Text(m.station_no.clone()),
            Value::Int(i64::from(m.year)),
            Value::Int(i64::from(m.month)),
            Value::from(m.data),
            Value::Int(i64::from(m.data_count)),
            Value::Int(i64::from(m.days_in_month)),
            Value::Int(i64::from(m.missing_cons)),
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn rain(station: &str, date: NaiveDate, value: Option<f64>) -> Observation {
        Observation {
            station_no: station.to_string(),
            timestamp: date.and_hms_opt(9, 0, 0).unwrap(),
            value,
            flag: None,
        }
    }

    #[test]
    fn test_every_month_in_window_has_a_record() {
        let daily = vec![
            rain("85610", day(2023, 1, 5), Some(10.0)),
            rain("85610", day(2023, 1, 6), Some(2.5)),
            rain("85610", day(2023, 3, 1), Some(0.0)),
        ];
        let months = build_monthly("85610", &daily, day(2023, 1, 1), day(2023, 3, 31));
        assert_eq!(months.len(), 3);

        assert_eq!(months[0].data, Some(12.5));
        assert_eq!(months[0].data_count, 2);
        assert_eq!(months[0].days_in_month, 31);
        assert_eq!(months[0].missing_cons, 25);

        assert_eq!(months[1].data, None);
        assert_eq!(months[1].data_count, 0);
        assert_eq!(months[1].days_in_month, 28);
        assert_eq!(months[1].missing_cons, 28);

        assert_eq!(months[2].data, Some(0.0), "a dry month is not missing");
        assert_eq!(months[2].missing_cons, 30);
    }

    #[test]
    fn test_reversed_window_yields_no_months() {
        let daily = vec![rain("85610", day(2023, 1, 10), Some(4.0))];
        assert!(build_monthly("85610", &[], day(2023, 1, 11), day(2023, 1, 10)).is_empty());
        assert!(build_monthly("85610", &daily, day(2023, 3, 1), day(2023, 1, 10)).is_empty());
    }

    #[test]
    fn test_partial_months_only_count_window_days() {
        let daily = vec![rain("85610", day(2023, 1, 20), Some(1.0))];
        let months = build_monthly("85610", &daily, day(2023, 1, 20), day(2023, 1, 25));
        assert_eq!(months.len(), 1);
        assert_eq!(months[0].days_in_month, 31);
        assert_eq!(months[0].missing_cons, 5);
    }

    #[test]
    fn test_null_values_are_missing_days() {
        let daily = vec![
            rain("85610", day(2023, 2, 1), None),
            rain("85610", day(2023, 2, 2), Some(3.0)),
            rain("85611", day(2023, 2, 3), Some(99.0)),
        ];
        let months = build_monthly("85610", &daily, day(2023, 2, 1), day(2023, 2, 28));
        assert_eq!(months[0].data, Some(3.0));
        assert_eq!(months[0].data_count, 1);
        assert_eq!(months[0].missing_cons, 26);
    }

    #[test]
    fn test_monthly_totals_fill_only_empty_months() {
        let mut months = build_monthly(
            "85610",
            &[rain("85610", day(2023, 1, 1), Some(5.0))],
            day(2023, 1, 1),
            day(2023, 2, 28),
        );
        let totals = Table::with_rows(
            ["year", "month", "data"],
            vec![
                vec![Value::Int(2023), Value::Int(1), Value::Float(100.0)],
                vec![Value::Int(2023), Value::Int(2), Value::Float(42.0)],
            ],
        )
        .unwrap();
        fill_from_monthly_totals(&mut months, &totals).unwrap();
        assert_eq!(months[0].data, Some(5.0));
        assert_eq!(months[1].data, Some(42.0));
        assert_eq!(months[1].data_count, 0);
    }

    #[test]
    fn test_restrict_to_years() {
        let months = build_monthly("85610", &[], day(2021, 12, 1), day(2023, 1, 31));
        let kept = restrict_to_years(months, 2022, 2022);
        assert_eq!(kept.len(), 12);
        assert!(kept.iter().all(|m| m.year == 2022));
    }

    #[test]
    fn test_scopic_table_columns() {
        let months = build_monthly("85610", &[], day(2023, 1, 1), day(2023, 3, 31));
        let table = scopic_table(&months);
        assert_eq!(table.len(), 3, "every month becomes a row");
        assert_eq!(
            table.columns(),
            ["station_no", "year", "month", "data", "data_count", "days_in_month", "missing_cons"]
        );
        assert_eq!(table.value(0, "data"), Some(&Value::Null));
        assert_eq!(table.value(0, "missing_cons"), Some(&Value::Int(31)));
    }
}
