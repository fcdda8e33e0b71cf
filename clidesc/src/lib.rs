/// clidesc: typed tabular access to CliDE / CliDEsc climate databases.
///
/// # Module structure
///
/// ```text
/// clidesc
/// ├── error:       ClideError (connection, query, identifier, value errors)
/// ├── table:       Table / Value: query results with a fixed column set, CSV and JSON export
/// ├── config:      clidesc.toml loader ([database], [aggregation])
/// ├── credentials: .pass and R credentials files
/// ├── db:          connect / close / verify_tables / list_tables / get_columns
/// ├── query
/// │   ├── stations:     CliDE station metadata and data-availability filters
/// │   ├── observations: obs_daily, obs_subdaily, obs_aws, rainfall totals, chained series
/// │   ├── scopic:       obs_monthly totals and years of record
/// │   └── clidesc:      CliDEsc "Station" and "StationChain" metadata
/// └── analysis
///     ├── aggregate: (station, period) statistics with a completeness threshold
///     ├── chain:     merging chained station records
///     └── scopic:    monthly rainfall records for the SCOPIC outlook tool
/// ```
///
/// Every query function borrows a caller-owned `postgres` client, issues
/// one parameterized statement and returns a [`table::Table`]. Nothing is
/// cached or retried.

pub mod analysis;
pub mod config;
pub mod credentials;
pub mod db;
pub mod error;
pub mod query;
pub mod table;

pub use error::ClideError;
pub use table::{Table, Value};
