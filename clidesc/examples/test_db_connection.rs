//! Connection smoke check: connects with DATABASE_URL (or clidesc.toml),
//! verifies the core CliDE tables and lists what the database exposes.
//!
//!   cargo run --example test_db_connection

use clidesc::config::{ClideConfig, load_config};
use clidesc::db;
use std::path::Path;

const CLIDE_TABLES: &[&str] = &["stations", "obs_daily", "obs_subdaily", "obs_aws", "obs_monthly"];

fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();

    let config = if Path::new("clidesc.toml").exists() {
        load_config("clidesc.toml")?
    } else {
        ClideConfig::default()
    };

    let mut client = db::connect_from_config(&config).unwrap_or_else(|e| {
        eprintln!("\n{}\n", e);
        std::process::exit(1);
    });
    println!("✓ Connected successfully");

    // Test 1: core tables exist and are readable
    for table in CLIDE_TABLES {
        match db::verify_tables(&mut client, &[table]) {
            Ok(()) => println!("✓ {} readable", table),
            Err(e) => println!("✗ {}", e),
        }
    }

    // Test 2: list everything visible
    let tables = db::list_tables(&mut client)?;
    println!("✓ {} tables and views:", tables.len());
    for name in &tables {
        println!("  - {}", name);
    }

    // Test 3: obs_daily columns
    let columns = db::get_columns(&mut client, "obs_daily")?;
    println!("✓ obs_daily columns: {}", columns.join(", "));

    db::close(client)?;
    Ok(())
}
