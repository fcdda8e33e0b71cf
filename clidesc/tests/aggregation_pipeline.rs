/// Pipeline tests over in-memory tables shaped like CliDE query results:
/// query result → Observation extraction → aggregation → CSV / JSON.
///
/// No database needed.

use chrono::NaiveDate;
use clidesc::analysis::{
    AggregationSpec, Completeness, ObservationColumns, Period, Statistic, aggregate_table,
};
use clidesc::config::ClideConfig;
use clidesc::{Table, Value};

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// obs_daily-shaped result for one station: `days` consecutive days from
/// `start`, rain on every day except those in `missing`.
fn daily_rain(station: &str, start: NaiveDate, days: u32, missing: &[u32]) -> Vec<Vec<Value>> {
    (0..days)
        .map(|i| {
            let date = start + chrono::Duration::days(i64::from(i));
            let rain = if missing.contains(&i) { Value::Null } else { Value::Float(2.0) };
            vec![
                Value::Text(station.to_string()),
                Value::Timestamp(date.and_hms_opt(9, 0, 0).unwrap()),
                rain,
            ]
        })
        .collect()
}

fn obs_table(rows: Vec<Vec<Value>>) -> Table {
    Table::with_rows(["station_no", "lsd", "rain_24h"], rows).unwrap()
}

#[test]
fn test_one_output_row_per_station_month() {
    let mut rows = daily_rain("85610", day(2023, 1, 1), 59, &[]);
    rows.extend(daily_rain("85611", day(2023, 2, 1), 28, &[]));
    let table = obs_table(rows);

    let summary = aggregate_table(&table, &ObservationColumns::new("rain_24h"), &AggregationSpec::default())
        .unwrap();

    let keys: Vec<(String, String)> = summary
        .rows()
        .iter()
        .map(|r| (r[0].to_string(), r[1].to_string()))
        .collect();
    assert_eq!(
        keys,
        vec![
            ("85610".to_string(), "2023-01".to_string()),
            ("85610".to_string(), "2023-02".to_string()),
            ("85611".to_string(), "2023-02".to_string()),
        ]
    );
    assert_eq!(summary.value(0, "sum"), Some(&Value::Float(62.0)));
    assert_eq!(summary.value(1, "count"), Some(&Value::Float(28.0)));
}

#[test]
fn test_completeness_boundary_through_table_layer() {
    // Missing 4 of 31 days: 27 present, valid at 90 %.
    let valid = obs_table(daily_rain("85610", day(2023, 1, 1), 31, &[3, 9, 15, 21]));
    // Missing 5 of 31 days: 26 present, invalid.
    let invalid = obs_table(daily_rain("85610", day(2023, 1, 1), 31, &[3, 9, 15, 21, 27]));

    let cols = ObservationColumns::new("rain_24h");
    let spec = AggregationSpec::default();

    let ok = aggregate_table(&valid, &cols, &spec).unwrap();
    assert_eq!(ok.value(0, "valid"), Some(&Value::Bool(true)));
    assert_eq!(ok.value(0, "mean"), Some(&Value::Float(2.0)));

    let bad = aggregate_table(&invalid, &cols, &spec).unwrap();
    assert_eq!(bad.len(), 1);
    assert_eq!(bad.value(0, "valid"), Some(&Value::Bool(false)));
    assert_eq!(bad.value(0, "obs_count"), Some(&Value::Int(26)), "usable count is reported");
    assert_eq!(bad.value(0, "mean"), Some(&Value::Null));
}

#[test]
fn test_configured_rules_drive_aggregation() {
    let config = ClideConfig::from_toml_str(
        r#"
[aggregation]
period = "yearly"
statistics = ["max"]
min_count = 2
rejected_flags = ["X"]
"#,
    )
    .unwrap();
    let spec = config.aggregation.to_spec().unwrap();
    assert_eq!(spec.period, Period::Yearly);
    assert_eq!(spec.completeness, Completeness::MinCount(2));

    let table = Table::with_rows(
        ["station_no", "lsd", "max_air_temp", "max_air_temp_flag"],
        vec![
            vec![Value::from("85610"), Value::from("2023-03-01"), Value::Float(31.0), Value::Null],
            vec![Value::from("85610"), Value::from("2023-03-02"), Value::Float(32.5), Value::Null],
            vec![Value::from("85610"), Value::from("2023-03-03"), Value::Float(99.9), Value::from("X")],
        ],
    )
    .unwrap();
    let cols = ObservationColumns::new("max_air_temp").with_flag("max_air_temp_flag");
    let summary = aggregate_table(&table, &cols, &spec).unwrap();

    assert_eq!(summary.columns().last().map(String::as_str), Some("max"));
    assert_eq!(summary.value(0, "max"), Some(&Value::Float(32.5)));
    assert_eq!(summary.value(0, "expected"), Some(&Value::Int(365)));
}

#[test]
fn test_empty_input_gives_empty_summary_with_columns() {
    let table = obs_table(Vec::new());
    let spec = AggregationSpec {
        statistics: vec![Statistic::Mean],
        ..Default::default()
    };
    let summary = aggregate_table(&table, &ObservationColumns::new("rain_24h"), &spec).unwrap();
    assert!(summary.is_empty());
    assert_eq!(summary.columns().len(), 8);
}

#[test]
fn test_summary_exports() {
    let table = obs_table(daily_rain("85610", day(2023, 1, 1), 31, &[]));
    let summary = aggregate_table(&table, &ObservationColumns::new("rain_24h"), &AggregationSpec::default())
        .unwrap();

    let mut csv = Vec::new();
    summary.write_csv(&mut csv).unwrap();
    let text = String::from_utf8(csv).unwrap();
    let mut lines = text.lines();
    assert_eq!(
        lines.next(),
        Some("station_no,period,period_start,obs_count,expected,longest_gap,valid,count,mean,min,max,sum")
    );
    assert!(lines.next().unwrap().starts_with("85610,2023-01,2023-01-01,31,31,0,true,"));

    let json = summary.to_json_records();
    assert_eq!(json[0]["station_no"], "85610");
    assert_eq!(json[0]["valid"], true);
}
