/// Period aggregation with a completeness threshold.
///
/// `aggregate` groups observations by (station, period) and reduces each
/// group to a set of statistics. A group is only certified valid when
/// enough of its *expected* observations are usable:
///
/// - expected = days in the period × `observations_per_day`
/// - usable   = non-null value and quality flag not in `rejected_flags`
///
/// Usable values are counted per expected slot (one slot every
/// `86400 / observations_per_day` seconds from the period start). Duplicate
/// rows and rows finer than the configured resolution fill one slot; the
/// first such row in input order supplies the value.
///
/// Null and rejected values therefore still count against completeness.
/// Invalid groups keep their output row, with every statistic `None`, so
/// downstream joins see one row per group present in the input.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::error::ClideError;
use crate::table::{Table, Value};

// ---------------------------------------------------------------------------
// Periods and statistics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Daily,
    Monthly,
    Yearly,
}

impl Period {
    /// First day of the period containing `date`.
    pub fn start_of(self, date: NaiveDate) -> NaiveDate {
        let start = match self {
            Period::Daily => Some(date),
            Period::Monthly => NaiveDate::from_ymd_opt(date.year(), date.month(), 1),
            Period::Yearly => NaiveDate::from_ymd_opt(date.year(), 1, 1),
        };
        start.unwrap_or(date)
    }

    /// First day of the period after the one starting at `start`.
    pub fn next_start(self, start: NaiveDate) -> NaiveDate {
        let next = match self {
            Period::Daily => start.succ_opt(),
            Period::Monthly if start.month() == 12 => NaiveDate::from_ymd_opt(start.year() + 1, 1, 1),
            Period::Monthly => NaiveDate::from_ymd_opt(start.year(), start.month() + 1, 1),
            Period::Yearly => NaiveDate::from_ymd_opt(start.year() + 1, 1, 1),
        };
        next.unwrap_or(NaiveDate::MAX)
    }

    /// Calendar days in the period starting at `start`.
    pub fn days_in(self, start: NaiveDate) -> u32 {
        (self.next_start(start) - start).num_days().max(0) as u32
    }

    /// Unit name for PostgreSQL `date_trunc`.
    pub fn trunc_unit(self) -> &'static str {
        match self {
            Period::Daily => "day",
            Period::Monthly => "month",
            Period::Yearly => "year",
        }
    }

    pub fn label(self, start: NaiveDate) -> String {
        match self {
            Period::Daily => start.format("%Y-%m-%d").to_string(),
            Period::Monthly => start.format("%Y-%m").to_string(),
            Period::Yearly => start.format("%Y").to_string(),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.trunc_unit())
    }
}

impl FromStr for Period {
    type Err = ClideError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" | "day" | "d" => Ok(Period::Daily),
            "monthly" | "month" | "m" => Ok(Period::Monthly),
            "yearly" | "year" | "annual" | "y" => Ok(Period::Yearly),
            other => Err(ClideError::InvalidArgument(format!("unknown period '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Statistic {
    Count,
    Mean,
    Min,
    Max,
    Sum,
}

impl Statistic {
    pub const ALL: [Statistic; 5] = [
        Statistic::Count,
        Statistic::Mean,
        Statistic::Min,
        Statistic::Max,
        Statistic::Sum,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Statistic::Count => "count",
            Statistic::Mean => "mean",
            Statistic::Min => "min",
            Statistic::Max => "max",
            Statistic::Sum => "sum",
        }
    }

    fn compute(self, values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }
        let sum: f64 = values.iter().sum();
        match self {
            Statistic::Count => Some(values.len() as f64),
            Statistic::Mean => Some(sum / values.len() as f64),
            Statistic::Min => values.iter().copied().reduce(f64::min),
            Statistic::Max => values.iter().copied().reduce(f64::max),
            Statistic::Sum => Some(sum),
        }
    }
}

impl FromStr for Statistic {
    type Err = ClideError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "count" => Ok(Statistic::Count),
            "mean" | "avg" => Ok(Statistic::Mean),
            "min" => Ok(Statistic::Min),
            "max" => Ok(Statistic::Max),
            "sum" | "total" => Ok(Statistic::Sum),
            other => Err(ClideError::InvalidArgument(format!("unknown statistic '{}'", other))),
        }
    }
}

/// How many usable observations a period needs to be valid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Completeness {
    /// Fraction of expected observations, truncated: 31 expected at 0.9
    /// requires 27.
    Fraction(f64),
    /// Absolute number of observations, regardless of period length.
    MinCount(usize),
}

impl Completeness {
    pub fn required(self, expected: usize) -> usize {
        match self {
            // Small epsilon so 10 × 0.7 does not truncate to 6.
            Completeness::Fraction(f) => (expected as f64 * f + 1e-9).floor() as usize,
            Completeness::MinCount(n) => n,
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct AggregationSpec {
    pub period: Period,
    pub statistics: Vec<Statistic>,
    pub completeness: Completeness,
    /// Expected observations per day at the source resolution
    /// (1 for daily tables, 24 for hourly, 144 for 10-minute AWS).
    pub observations_per_day: u32,
    /// Longest tolerated run of consecutive missing observations.
    pub max_consecutive_missing: Option<usize>,
    /// Quality flags whose values are excluded from statistics.
    pub rejected_flags: Vec<String>,
}

impl Default for AggregationSpec {
    fn default() -> Self {
        Self {
            period: Period::Monthly,
            statistics: Statistic::ALL.to_vec(),
            completeness: Completeness::Fraction(0.9),
            observations_per_day: 1,
            max_consecutive_missing: None,
            rejected_flags: Vec::new(),
        }
    }
}

impl AggregationSpec {
    pub fn validate(&self) -> Result<(), ClideError> {
        if self.statistics.is_empty() {
            return Err(ClideError::InvalidArgument("no statistics requested".to_string()));
        }
        if self.observations_per_day == 0 || 86_400 % self.observations_per_day != 0 {
            return Err(ClideError::InvalidArgument(format!(
                "observations_per_day must divide a day evenly, got {}",
                self.observations_per_day
            )));
        }
        if let Completeness::Fraction(f) = self.completeness {
            if !(f > 0.0 && f <= 1.0) {
                return Err(ClideError::InvalidArgument(format!(
                    "completeness fraction must be in (0, 1], got {}",
                    f
                )));
            }
        }
        Ok(())
    }

    fn is_rejected(&self, flag: Option<&str>) -> bool {
        flag.is_some_and(|f| {
            let f = f.trim();
            self.rejected_flags.iter().any(|r| r.trim().eq_ignore_ascii_case(f))
        })
    }

    fn interval_seconds(&self) -> i64 {
        86_400 / i64::from(self.observations_per_day)
    }
}

// ---------------------------------------------------------------------------
// Observations
// ---------------------------------------------------------------------------

/// One value of one channel at one station and time.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub station_no: String,
    pub timestamp: NaiveDateTime,
    pub value: Option<f64>,
    pub flag: Option<String>,
}

/// Which table columns hold the observation fields.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationColumns {
    pub station: String,
    pub timestamp: String,
    pub value: String,
    pub flag: Option<String>,
}

impl ObservationColumns {
    /// CliDE layout: `station_no`, `lsd` and the given channel.
    pub fn new(value: &str) -> Self {
        Self {
            station: "station_no".to_string(),
            timestamp: "lsd".to_string(),
            value: value.to_string(),
            flag: None,
        }
    }

    pub fn with_flag(mut self, flag: &str) -> Self {
        self.flag = Some(flag.to_string());
        self
    }
}

impl Observation {
    /// Extracts observations from a query result.
    ///
    /// Null values are kept (they count against completeness); a null or
    /// unparsable station or timestamp is an error.
    pub fn from_table(table: &Table, columns: &ObservationColumns) -> Result<Vec<Observation>, ClideError> {
        let station_idx = table.require_column(&columns.station)?;
        let time_idx = table.require_column(&columns.timestamp)?;
        let value_idx = table.require_column(&columns.value)?;
        let flag_idx = match &columns.flag {
            Some(name) => Some(table.require_column(name)?),
            None => None,
        };

        let mut observations = Vec::with_capacity(table.len());
        for (row_no, row) in table.rows().iter().enumerate() {
            let station_no = row[station_idx].as_key().ok_or_else(|| ClideError::InvalidValue {
                column: columns.station.clone(),
                row: row_no,
                reason: format!("expected a station number, got {:?}", row[station_idx]),
            })?;
            let timestamp = row[time_idx].as_datetime().ok_or_else(|| ClideError::InvalidValue {
                column: columns.timestamp.clone(),
                row: row_no,
                reason: format!("expected a timestamp, got {:?}", row[time_idx]),
            })?;
            let value = match &row[value_idx] {
                Value::Null => None,
                other => Some(other.as_f64().ok_or_else(|| ClideError::InvalidValue {
                    column: columns.value.clone(),
                    row: row_no,
                    reason: format!("expected a number, got {:?}", other),
                })?),
            };
            let flag = flag_idx.and_then(|idx| match &row[idx] {
                Value::Null => None,
                other => Some(other.to_string()),
            });

            observations.push(Observation {
                station_no,
                timestamp,
                value,
                flag,
            });
        }
        Ok(observations)
    }
}

// ---------------------------------------------------------------------------
// Aggregate records
// ---------------------------------------------------------------------------

/// Summary of one (station, period) group.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRecord {
    pub station_no: String,
    pub period: Period,
    pub period_start: NaiveDate,
    /// Expected observation slots holding a usable value (non-null, not
    /// rejected). Several rows in one slot count once.
    pub count: usize,
    /// Observations the calendar says the period should have.
    pub expected: usize,
    /// Longest run of consecutive expected observations with no usable value.
    pub longest_gap: usize,
    pub valid: bool,
    /// Requested statistics, in request order. All `None` when invalid.
    pub values: Vec<(Statistic, Option<f64>)>,
}

impl AggregateRecord {
    pub fn value(&self, statistic: Statistic) -> Option<f64> {
        self.values
            .iter()
            .find(|(s, _)| *s == statistic)
            .and_then(|(_, v)| *v)
    }
}

/// Groups observations by (station, period) and computes the requested
/// statistics. Output is ordered by station, then period start.
pub fn aggregate(observations: &[Observation], spec: &AggregationSpec) -> Result<Vec<AggregateRecord>, ClideError> {
    spec.validate()?;

    let mut groups: BTreeMap<(&str, NaiveDate), Vec<&Observation>> = BTreeMap::new();
    for obs in observations {
        let start = spec.period.start_of(obs.timestamp.date());
        groups.entry((obs.station_no.as_str(), start)).or_default().push(obs);
    }

    let interval = spec.interval_seconds();
    let mut records = Vec::with_capacity(groups.len());
    let mut invalid = 0usize;

    for ((station_no, start), members) in groups {
        let expected = spec.period.days_in(start) as usize * spec.observations_per_day as usize;
        let origin = start.and_hms_opt(0, 0, 0).unwrap_or_default();

        // One value per expected slot; later rows in the same slot are dropped.
        let mut by_slot: BTreeMap<usize, f64> = BTreeMap::new();
        let mut rejected = 0usize;
        let mut collapsed = 0usize;
        for obs in members {
            let Some(value) = obs.value else { continue };
            if spec.is_rejected(obs.flag.as_deref()) {
                rejected += 1;
                continue;
            }
            let offset = (obs.timestamp - origin).num_seconds().div_euclid(interval);
            if offset < 0 || offset as usize >= expected {
                continue;
            }
            if by_slot.contains_key(&(offset as usize)) {
                collapsed += 1;
            } else {
                by_slot.insert(offset as usize, value);
            }
        }

        if rejected > 0 {
            warn!(
                "{} {}: excluded {} flagged value(s)",
                station_no,
                spec.period.label(start),
                rejected
            );
        }
        if collapsed > 0 {
            debug!(
                "{} {}: {} value(s) shared an observation slot and were dropped",
                station_no,
                spec.period.label(start),
                collapsed
            );
        }

        let slots: BTreeSet<usize> = by_slot.keys().copied().collect();
        let values: Vec<f64> = by_slot.into_values().collect();
        let count = values.len();
        let longest_gap = longest_missing_run(&slots, expected);
        let valid = count > 0
            && count >= spec.completeness.required(expected)
            && spec.max_consecutive_missing.is_none_or(|limit| longest_gap <= limit);

        if !valid {
            invalid += 1;
        }

        let stats = spec
            .statistics
            .iter()
            .map(|&stat| (stat, if valid { stat.compute(&values) } else { None }))
            .collect();

        records.push(AggregateRecord {
            station_no: station_no.to_string(),
            period: spec.period,
            period_start: start,
            count,
            expected,
            longest_gap,
            valid,
            values: stats,
        });
    }

    debug!(
        "aggregated {} observations into {} {} groups ({} below completeness)",
        observations.len(),
        records.len(),
        spec.period,
        invalid
    );
    Ok(records)
}

/// Longest run of slots in `0..expected` missing from `present`.
pub(crate) fn longest_missing_run(present: &BTreeSet<usize>, expected: usize) -> usize {
    let mut longest = 0;
    let mut next_expected = 0;
    for &slot in present.range(..expected) {
        longest = longest.max(slot - next_expected);
        next_expected = slot + 1;
    }
    longest.max(expected.saturating_sub(next_expected))
}

/// Table form of aggregate records.
///
/// Columns: `station_no, period, period_start, obs_count, expected,
/// longest_gap, valid` followed by one column per statistic.
pub fn records_to_table(records: &[AggregateRecord], statistics: &[Statistic]) -> Table {
    let mut columns: Vec<String> = [
        "station_no",
        "period",
        "period_start",
        "obs_count",
        "expected",
        "longest_gap",
        "valid",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    columns.extend(statistics.iter().map(|s| s.name().to_string()));

    let mut table = Table::new(columns);
    for record in records {
        let mut row = vec![
            Value::Text(record.station_no.clone()),
            Value::Text(record.period.label(record.period_start)),
            Value::Date(record.period_start),
            Value::Int(record.count as i64),
            Value::Int(record.expected as i64),
            Value::Int(record.longest_gap as i64),
            Value::Bool(record.valid),
        ];
        row.extend(statistics.iter().map(|&s| Value::from(record.value(s))));
        table.push_built_row(row);
    }
    table
}

/// Table-in, table-out aggregation of one channel.
pub fn aggregate_table(
    table: &Table,
    columns: &ObservationColumns,
    spec: &AggregationSpec,
) -> Result<Table, ClideError> {
    let observations = Observation::from_table(table, columns)?;
    let records = aggregate(&observations, spec)?;
    Ok(records_to_table(&records, &spec.statistics))
}

/// Timestamp of the `slot`-th expected observation of a period.
pub(crate) fn slot_time(start: NaiveDate, slot: usize, observations_per_day: u32) -> NaiveDateTime {
    let interval = 86_400 / i64::from(observations_per_day.max(1));
    start.and_hms_opt(0, 0, 0).unwrap_or_default() + Duration::seconds(interval * slot as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn daily(station: &str, start: NaiveDate, values: &[Option<f64>]) -> Vec<Observation> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| Observation {
                station_no: station.to_string(),
                timestamp: slot_time(start, i, 1),
                value: *v,
                flag: None,
            })
            .collect()
    }

    fn january(present: usize) -> Vec<Option<f64>> {
        (0..31).map(|i| if i < present { Some(i as f64) } else { None }).collect()
    }

    #[test]
    fn test_period_boundaries() {
        assert_eq!(Period::Monthly.start_of(day(2024, 2, 17)), day(2024, 2, 1));
        assert_eq!(Period::Monthly.days_in(day(2024, 2, 1)), 29);
        assert_eq!(Period::Monthly.days_in(day(2023, 12, 1)), 31);
        assert_eq!(Period::Yearly.days_in(day(2023, 1, 1)), 365);
        assert_eq!(Period::Daily.days_in(day(2023, 6, 30)), 1);
        assert_eq!(Period::Monthly.label(day(2023, 6, 1)), "2023-06");
    }

    #[test]
    fn test_fraction_threshold_truncates() {
        assert_eq!(Completeness::Fraction(0.9).required(31), 27);
        assert_eq!(Completeness::Fraction(0.9).required(30), 27);
        assert_eq!(Completeness::Fraction(0.7).required(10), 7);
        assert_eq!(Completeness::MinCount(20).required(31), 20);
    }

    #[test]
    fn test_27_of_31_is_valid_at_90_percent() {
        let obs = daily("85610", day(2023, 1, 1), &january(27));
        let records = aggregate(&obs, &AggregationSpec::default()).unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].valid);
        assert_eq!(records[0].count, 27);
        assert_eq!(records[0].expected, 31);
        assert_eq!(records[0].value(Statistic::Count), Some(27.0));
    }

    #[test]
    fn test_26_of_31_is_invalid_at_90_percent() {
        let obs = daily("85610", day(2023, 1, 1), &january(26));
        let records = aggregate(&obs, &AggregationSpec::default()).unwrap();
        assert_eq!(records.len(), 1, "invalid groups keep their row");
        assert!(!records[0].valid);
        assert_eq!(records[0].count, 26);
        for stat in Statistic::ALL {
            assert_eq!(records[0].value(stat), None, "{:?} must be null when invalid", stat);
        }
    }

    #[test]
    fn test_rejected_flags_excluded_but_still_expected() {
        let mut obs = daily("85610", day(2023, 1, 1), &[Some(10.0), Some(20.0), Some(1000.0)]);
        obs[2].flag = Some("X".to_string());
        let spec = AggregationSpec {
            completeness: Completeness::MinCount(2),
            rejected_flags: vec!["x".to_string()],
            ..Default::default()
        };
        let records = aggregate(&obs, &spec).unwrap();
        let r = &records[0];
        assert!(r.valid);
        assert_eq!(r.count, 2);
        assert_eq!(r.expected, 31);
        assert_eq!(r.value(Statistic::Mean), Some(15.0));
        assert_eq!(r.value(Statistic::Max), Some(20.0));
        assert_eq!(r.value(Statistic::Min), Some(10.0));
    }

    #[test]
    fn test_one_row_per_station_period() {
        let mut obs = daily("85610", day(2023, 1, 30), &[Some(1.0), Some(2.0), Some(3.0), Some(4.0)]);
        obs.extend(daily("85611", day(2023, 1, 1), &[Some(5.0)]));
        let records = aggregate(&obs, &AggregationSpec::default()).unwrap();
        let keys: Vec<(String, NaiveDate)> = records
            .iter()
            .map(|r| (r.station_no.clone(), r.period_start))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("85610".to_string(), day(2023, 1, 1)),
                ("85610".to_string(), day(2023, 2, 1)),
                ("85611".to_string(), day(2023, 1, 1)),
            ]
        );
        assert!(records.iter().all(|r| !r.valid));
    }

    #[test]
    fn test_longest_gap_counts_leading_and_trailing_runs() {
        let present: BTreeSet<usize> = [3, 4, 10].into_iter().collect();
        assert_eq!(longest_missing_run(&present, 12), 5);
        assert_eq!(longest_missing_run(&BTreeSet::new(), 31), 31);
        let full: BTreeSet<usize> = (0..31).collect();
        assert_eq!(longest_missing_run(&full, 31), 0);
    }

    #[test]
    fn test_consecutive_missing_limit_invalidates() {
        let mut values = january(31);
        for v in values.iter_mut().skip(10).take(3) {
            *v = None;
        }
        let obs = daily("85610", day(2023, 1, 1), &values);
        let spec = AggregationSpec {
            max_consecutive_missing: Some(2),
            ..Default::default()
        };
        let records = aggregate(&obs, &spec).unwrap();
        assert_eq!(records[0].count, 28);
        assert_eq!(records[0].longest_gap, 3);
        assert!(!records[0].valid, "28/31 meets 90% but a 3-day gap exceeds the limit");
    }

    #[test]
    fn test_hourly_to_daily_uses_fraction_of_slots() {
        let obs: Vec<Observation> = (0..17)
            .map(|h| Observation {
                station_no: "85610".to_string(),
                timestamp: slot_time(day(2023, 3, 1), h, 24),
                value: Some(25.0),
                flag: None,
            })
            .collect();
        let spec = AggregationSpec {
            period: Period::Daily,
            completeness: Completeness::Fraction(0.7),
            observations_per_day: 24,
            ..Default::default()
        };
        let records = aggregate(&obs, &spec).unwrap();
        assert_eq!(records[0].expected, 24);
        assert_eq!(records[0].longest_gap, 7);
        assert!(records[0].valid, "17 >= floor(24 * 0.7) = 16");
    }

    #[test]
    fn test_duplicate_rows_fill_one_slot() {
        let mut obs = daily("85610", day(2023, 1, 1), &january(14));
        obs.retain(|o| o.value.is_some());
        let mut doubled = obs.clone();
        for o in doubled.iter_mut() {
            o.value = o.value.map(|v| v + 100.0);
        }
        obs.extend(doubled);
        assert_eq!(obs.len(), 28);

        let records = aggregate(&obs, &AggregationSpec::default()).unwrap();
        let r = &records[0];
        assert_eq!(r.count, 14);
        assert_eq!(r.expected, 31);
        assert_eq!(r.longest_gap, 17);
        assert!(!r.valid, "14 distinct days of 31 is below 90%");

        let spec = AggregationSpec {
            completeness: Completeness::MinCount(14),
            ..Default::default()
        };
        let r = &aggregate(&obs, &spec).unwrap()[0];
        assert!(r.valid);
        assert_eq!(r.value(Statistic::Count), Some(14.0));
        assert_eq!(r.value(Statistic::Sum), Some(91.0), "first row per day wins");
    }

    #[test]
    fn test_rows_finer_than_resolution_share_slots() {
        // 3-hourly slots, hourly rows 00:00-05:00 cover slots 0 and 1 only.
        let obs: Vec<Observation> = (0..6)
            .map(|h| Observation {
                station_no: "85610".to_string(),
                timestamp: slot_time(day(2023, 3, 1), h, 24),
                value: Some(h as f64),
                flag: None,
            })
            .collect();
        let spec = AggregationSpec {
            period: Period::Daily,
            observations_per_day: 8,
            ..Default::default()
        };
        let r = &aggregate(&obs, &spec).unwrap()[0];
        assert_eq!(r.count, 2);
        assert_eq!(r.expected, 8);
        assert_eq!(r.longest_gap, 6);
        assert!(!r.valid);
    }

    #[test]
    fn test_invalid_spec_rejected() {
        let spec = AggregationSpec {
            completeness: Completeness::Fraction(1.5),
            ..Default::default()
        };
        assert!(aggregate(&[], &spec).is_err());
        let spec = AggregationSpec {
            observations_per_day: 7,
            ..Default::default()
        };
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_records_to_table_has_statistic_columns() {
        let obs = daily("85610", day(2023, 1, 1), &january(31));
        let spec = AggregationSpec {
            statistics: vec![Statistic::Sum, Statistic::Mean],
            ..Default::default()
        };
        let records = aggregate(&obs, &spec).unwrap();
        let table = records_to_table(&records, &spec.statistics);
        assert_eq!(table.len(), records.len());
        assert_eq!(table.columns().last().map(String::as_str), Some("mean"));
        assert_eq!(table.value(0, "sum"), Some(&Value::Float(465.0)));
        assert_eq!(table.value(0, "period"), Some(&Value::Text("2023-01".to_string())));
        assert_eq!(table.value(0, "valid"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_from_table_reads_text_dates_and_flags() {
        let table = Table::with_rows(
            ["station_no", "lsd", "rain_24h", "rain_24h_flag"],
            vec![
                vec![Value::from("85610"), Value::from("2023-01-01"), Value::Float(3.5), Value::Null],
                vec![Value::from("85610"), Value::from("2023-01-02"), Value::Null, Value::from("M")],
            ],
        )
        .unwrap();
        let cols = ObservationColumns::new("rain_24h").with_flag("rain_24h_flag");
        let obs = Observation::from_table(&table, &cols).unwrap();
        assert_eq!(obs.len(), 2);
        assert_eq!(obs[0].value, Some(3.5));
        assert_eq!(obs[1].value, None);
        assert_eq!(obs[1].flag.as_deref(), Some("M"));
    }

    #[test]
    fn test_from_table_rejects_text_values() {
        let table = Table::with_rows(
            ["station_no", "lsd", "rain_24h"],
            vec![vec![Value::from("85610"), Value::from("2023-01-01"), Value::from("trace")]],
        )
        .unwrap();
        let result = Observation::from_table(&table, &ObservationColumns::new("rain_24h"));
        assert!(matches!(result, Err(ClideError::InvalidValue { row: 0, .. })));
    }
}
