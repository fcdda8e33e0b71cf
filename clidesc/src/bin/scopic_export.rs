#!/usr/bin/env rust
//! SCOPIC Export
//!
//! Writes monthly rainfall totals with completeness metadata (data_count,
//! days_in_month, missing_cons) in the CSV layout SCOPIC imports.
//!
//! Usage:
//!   cargo run --bin scopic_export -- --stations 85610,85611 \
//!       --from 1981-01-01 --to 2020-12-31 --output scopic.csv
//!
//! Options:
//!   --stations LIST   Comma-separated station numbers (required)
//!   --from DATE       First day, YYYY-MM-DD (required)
//!   --to DATE         Last day, YYYY-MM-DD (required)
//!   --with-monthly    Fill months without daily data from obs_monthly and
//!                     keep only each station's years of record
//!   --config PATH     Configuration file (default: clidesc.toml)
//!   --output PATH     CSV destination (default: stdout)
//!
//! Environment:
//!   DATABASE_URL - PostgreSQL connection string (overrides [database])

use chrono::NaiveDate;
use clidesc::analysis::scopic::{scopic_multi, scopic_table, scopic_with_monthly};
use clidesc::config::{ClideConfig, load_config};
use clidesc::query::parse_station_list;
use std::env;
use std::fs::File;
use std::io;
use std::path::Path;

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();

    let args: Vec<String> = env::args().collect();
    let (Some(stations), Some(from), Some(to)) = (
        arg_value(&args, "--stations"),
        arg_value(&args, "--from"),
        arg_value(&args, "--to"),
    ) else {
        eprintln!("Usage: scopic_export --stations LIST --from YYYY-MM-DD --to YYYY-MM-DD [--with-monthly]");
        std::process::exit(2);
    };
    let stations = parse_station_list(stations);
    let from = NaiveDate::parse_from_str(from, "%Y-%m-%d")?;
    let to = NaiveDate::parse_from_str(to, "%Y-%m-%d")?;
    let with_monthly = args.contains(&"--with-monthly".to_string());

    eprintln!("🌧️  SCOPIC Export");
    eprintln!("================\n");

    let config_path = arg_value(&args, "--config").unwrap_or("clidesc.toml");
    let config = if Path::new(config_path).exists() {
        load_config(config_path)?
    } else {
        ClideConfig::default()
    };

    eprintln!("📊 Connecting to database...");
    let mut client = clidesc::db::connect_from_config(&config).unwrap_or_else(|e| {
        eprintln!("\n{}\n", e);
        std::process::exit(1);
    });
    eprintln!("✓ Connected\n");

    let months = if with_monthly {
        let mut all = Vec::new();
        for station in &stations {
            eprintln!("📋 {} (daily + monthly)...", station);
            let months = scopic_with_monthly(&mut client, station, from, to)?;
            eprintln!("  ✓ {} months", months.len());
            all.extend(months);
        }
        all
    } else {
        eprintln!("📋 {} station(s), daily data only...", stations.len());
        scopic_multi(&mut client, &stations, from, to)?
    };
    clidesc::db::close(client)?;

    let incomplete = months.iter().filter(|m| m.data_count < m.days_in_month).count();
    eprintln!("\n✓ {} months exported ({} with missing days)\n", months.len(), incomplete);

    let table = scopic_table(&months);
    match arg_value(&args, "--output") {
        Some(path) => {
            table.write_csv(File::create(path)?)?;
            eprintln!("💾 Wrote {}", path);
        }
        None => table.write_csv(io::stdout().lock())?,
    }

    Ok(())
}
