#!/usr/bin/env rust
//! Station Report
//!
//! Lists stations for a country (or an explicit selection) with their
//! rainfall totals over a window, e.g. the last 30 days.
//!
//! Usage:
//!   cargo run --bin station_report -- --country WS --days 30
//!   cargo run --bin station_report -- --stations 85610,85611 --from 2024-01-01 --to 2024-01-31 --json
//!
//! Options:
//!   --country CODE    Two-letter country code (e.g. WS, FJ)
//!   --stations LIST   Comma-separated station numbers
//!   --from DATE       First day, YYYY-MM-DD
//!   --to DATE         Last day, YYYY-MM-DD (default: today)
//!   --days N          Window length ending at --to (default: 30, ignored with --from)
//!   --json            Print JSON records instead of a text report
//!   --config PATH     Configuration file (default: clidesc.toml)
//!
//! Environment:
//!   DATABASE_URL - PostgreSQL connection string (overrides [database])

use chrono::{Duration, Local, NaiveDate};
use clidesc::ClideError;
use clidesc::config::{ClideConfig, load_config};
use clidesc::query::observations::rain_totals;
use clidesc::query::stations::{stations, stations_by_country};
use clidesc::query::parse_station_list;
use std::env;
use std::path::Path;

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

/// First day of a `days`-long window ending on `to`.
fn window_start(to: NaiveDate, days: i64) -> Result<NaiveDate, ClideError> {
    Duration::try_days(days.max(1) - 1)
        .and_then(|span| to.checked_sub_signed(span))
        .ok_or_else(|| ClideError::InvalidArgument(format!("--days {} reaches before the calendar starts", days)))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();

    let args: Vec<String> = env::args().collect();
    let country = arg_value(&args, "--country");
    let selection = arg_value(&args, "--stations").map(parse_station_list);
    let json = args.contains(&"--json".to_string());

    let to = match arg_value(&args, "--to") {
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")?,
        None => Local::now().date_naive(),
    };
    let from = match arg_value(&args, "--from") {
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")?,
        None => {
            let days: i64 = arg_value(&args, "--days").unwrap_or("30").parse()?;
            window_start(to, days)?
        }
    };

    if country.is_none() && selection.is_none() {
        eprintln!("Usage: station_report (--country CODE | --stations LIST) [--from DATE] [--to DATE] [--days N] [--json]");
        std::process::exit(2);
    }

    eprintln!("🗺️  Station Report");
    eprintln!("=================\n");

    let config_path = arg_value(&args, "--config").unwrap_or("clidesc.toml");
    let config = if Path::new(config_path).exists() {
        load_config(config_path)?
    } else {
        ClideConfig::default()
    };

    eprintln!("📊 Connecting to database...");
    let mut client = clidesc::db::connect_from_config(&config)
        .and_then(|mut client| {
            clidesc::db::verify_tables(&mut client, &["stations", "obs_daily"])?;
            Ok(client)
        })
        .unwrap_or_else(|e| {
            eprintln!("\n{}\n", e);
            std::process::exit(1);
        });
    eprintln!("✓ Connected\n");

    let station_table = match &selection {
        Some(list) => stations(&mut client, list)?,
        None => stations_by_country(&mut client, &[country.unwrap_or_default().to_string()])?,
    };
    let numbers: Vec<String> = station_table
        .column("station_no")
        .map(|values| values.filter_map(|v| v.as_key()).collect())
        .unwrap_or_default();
    eprintln!("✓ {} station(s)\n", numbers.len());

    if numbers.is_empty() {
        eprintln!("⚠️  No stations matched");
        clidesc::db::close(client)?;
        return Ok(());
    }

    eprintln!("🌧️  Rainfall totals {} to {}...", from, to);
    let totals = rain_totals(&mut client, &numbers, from, to)?;
    clidesc::db::close(client)?;

    if json {
        let report = serde_json::json!({
            "from": from.to_string(),
            "to": to.to_string(),
            "stations": station_table.to_json_records(),
            "rain_totals": totals.to_json_records(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{:<10} {:<30} {:>10} {:>10} {:>10}", "station", "name", "lat", "lon", "rain_mm");
    println!("{}", "-".repeat(74));
    let total_station = totals.require_column("station_no")?;
    for row in 0..station_table.len() {
        let Some(number) = station_table.value(row, "station_no").and_then(|v| v.as_key()) else {
            continue;
        };
        let name = station_table
            .value(row, "name_primary")
            .map(|v| v.to_string())
            .unwrap_or_default();
        let total_row = totals
            .rows()
            .iter()
            .position(|r| r[total_station].as_key().as_deref() == Some(number.as_str()));
        let cell = |column: &str| {
            total_row
                .and_then(|r| totals.value(r, column))
                .and_then(|v| v.as_f64())
                .map(|v| format!("{:.1}", v))
                .unwrap_or_else(|| "-".to_string())
        };
        println!(
            "{:<10} {:<30} {:>10} {:>10} {:>10}",
            number,
            name,
            cell("latitude"),
            cell("longitude"),
            cell("rain_sum")
        );
    }

    Ok(())
}
