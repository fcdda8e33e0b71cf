#!/usr/bin/env rust
//! Period Summary
//!
//! Aggregates one observation channel per station and period, applying
//! the completeness rules from clidesc.toml, and writes the result as CSV.
//!
//! Usage:
//!   cargo run --bin monthly_summary -- --stations 85610,85611 \
//!       --from 1991-01-01 --to 2020-12-31 --channel rain_24h
//!
//! Options:
//!   --stations LIST     Comma-separated station numbers (required)
//!   --from DATE         First day, YYYY-MM-DD (required)
//!   --to DATE           Last day, YYYY-MM-DD (required)
//!   --channel NAME      Observation column to aggregate (default: rain_24h)
//!   --table NAME        Observation table (default: obs_daily)
//!   --flag-column NAME  Quality flag column checked against rejected_flags
//!   --period P          Override the configured period (daily|monthly|yearly)
//!   --config PATH       Configuration file (default: clidesc.toml)
//!   --output PATH       CSV destination (default: stdout)
//!
//! Environment:
//!   DATABASE_URL - PostgreSQL connection string (overrides [database])
//!   RUST_LOG     - log level, e.g. RUST_LOG=clidesc=debug

use chrono::NaiveDate;
use clidesc::analysis::{ObservationColumns, Period, aggregate_table};
use clidesc::config::{ClideConfig, load_config};
use clidesc::query::observations::{ObsQuery, observations};
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

    // Parse arguments
    let args: Vec<String> = env::args().collect();
    let (Some(stations), Some(from), Some(to)) = (
        arg_value(&args, "--stations"),
        arg_value(&args, "--from"),
        arg_value(&args, "--to"),
    ) else {
        eprintln!("Usage: monthly_summary --stations LIST --from YYYY-MM-DD --to YYYY-MM-DD [--channel NAME]");
        std::process::exit(2);
    };
    let stations = parse_station_list(stations);
    let from = NaiveDate::parse_from_str(from, "%Y-%m-%d")?;
    let to = NaiveDate::parse_from_str(to, "%Y-%m-%d")?;
    let channel = arg_value(&args, "--channel").unwrap_or("rain_24h");
    let table = arg_value(&args, "--table").unwrap_or("obs_daily");
    let flag_column = arg_value(&args, "--flag-column");

    eprintln!("📈 Period Summary");
    eprintln!("=================\n");

    // Load configuration
    let config_path = arg_value(&args, "--config").unwrap_or("clidesc.toml");
    let config = if Path::new(config_path).exists() {
        eprintln!("⚙️  Loading {}...", config_path);
        load_config(config_path)?
    } else {
        eprintln!("⚙️  {} not found, using default aggregation rules", config_path);
        ClideConfig::default()
    };
    let mut spec = config.aggregation.to_spec()?;
    if let Some(period) = arg_value(&args, "--period") {
        spec.period = period.parse::<Period>()?;
    }
    eprintln!("✓ Aggregation rules:");
    eprintln!("  - Period: {}", spec.period);
    eprintln!("  - Completeness: {:?}", spec.completeness);
    eprintln!("  - Observations per day: {}", spec.observations_per_day);
    eprintln!("  - Rejected flags: {:?}\n", spec.rejected_flags);

    // Connect
    eprintln!("📊 Connecting to database...");
    let mut client = clidesc::db::connect_from_config(&config).unwrap_or_else(|e| {
        eprintln!("\n{}\n", e);
        std::process::exit(1);
    });
    eprintln!("✓ Connected\n");

    // Fetch
    eprintln!("📋 Fetching {}.{} for {} station(s), {} to {}...", table, channel, stations.len(), from, to);
    let mut channels = vec![channel.to_string()];
    if let Some(flag) = flag_column {
        channels.push(flag.to_string());
    }
    let query = ObsQuery::new(table, &stations, from, to).channels(&channels);
    let data = observations(&mut client, &query)?;
    eprintln!("✓ {} observations\n", data.len());
    clidesc::db::close(client)?;

    // Aggregate
    let mut columns = ObservationColumns::new(channel);
    if let Some(flag) = flag_column {
        columns = columns.with_flag(flag);
    }
    let summary = aggregate_table(&data, &columns, &spec)?;
    let valid = summary
        .column("valid")
        .map(|values| values.filter(|v| matches!(v, clidesc::Value::Bool(true))).count())
        .unwrap_or(0);
    eprintln!("✓ {} periods, {} meet the completeness rule\n", summary.len(), valid);

    // Write
    match arg_value(&args, "--output") {
        Some(path) => {
            summary.write_csv(File::create(path)?)?;
            eprintln!("💾 Wrote {}", path);
        }
        None => summary.write_csv(io::stdout().lock())?,
    }

    Ok(())
}
