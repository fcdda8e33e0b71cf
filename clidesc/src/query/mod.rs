/// Query layer: one function per parameterized SQL statement.
///
/// Submodules:
/// - `stations`:     CliDE station metadata (`stations` table)
/// - `observations`: daily, sub-daily and AWS observation tables
/// - `scopic`:       monthly rainfall totals and years of record
/// - `clidesc`:      CliDEsc `"Station"` / `"StationChain"` metadata
///
/// Every function takes any `postgres::GenericClient` (a `Client` or an
/// open `Transaction`) owned by the caller, issues its statement once and
/// returns a `Table`. Nothing is retried or cached.

pub mod clidesc;
pub mod observations;
pub mod scopic;
pub mod stations;

use log::{debug, info};
use postgres::GenericClient;
use postgres::types::ToSql;

use crate::error::ClideError;
use crate::table::Table;

/// Inclusive calendar-date filter on the `lsd` column. Binds two `date`
/// parameters at positions `from` and `from + 1`.
pub(crate) fn lsd_between(column: &str, from: usize) -> String {
    format!(
        "{column} >= ${from}::date AND {column} < (${to}::date + 1)",
        column = column,
        from = from,
        to = from + 1
    )
}

/// Prepares and runs one statement, keeping the statement's column set
/// even when no rows match.
pub(crate) fn fetch_table<C: GenericClient>(
    client: &mut C,
    context: &str,
    sql: &str,
    params: &[&(dyn ToSql + Sync)],
) -> Result<Table, ClideError> {
    debug!("{}: {}", context, sql);

    let statement = client
        .prepare(sql)
        .map_err(|e| ClideError::from_postgres(context, e))?;
    let rows = client
        .query(&statement, params)
        .map_err(|e| ClideError::from_postgres(context, e))?;
    let table = Table::from_statement(&statement, &rows)
        .map_err(|e| ClideError::from_postgres(context, e))?;

    if table.is_empty() {
        info!("{}: no rows matched", context);
    }
    Ok(table)
}

/// Runs a lookup whose first column is text and collects the non-null values.
pub(crate) fn fetch_strings<C: GenericClient>(
    client: &mut C,
    context: &str,
    sql: &str,
    params: &[&(dyn ToSql + Sync)],
) -> Result<Vec<String>, ClideError> {
    debug!("{}: {}", context, sql);

    let rows = client
        .query(sql, params)
        .map_err(|e| ClideError::from_postgres(context, e))?;

    let mut values = Vec::with_capacity(rows.len());
    for row in rows {
        let value: Option<String> = row
            .try_get(0)
            .map_err(|e| ClideError::from_postgres(context, e))?;
        values.extend(value);
    }
    Ok(values)
}

/// Validates a table or column name and returns it double-quoted.
///
/// Identifiers cannot be bound as parameters, so anything outside
/// `[A-Za-z_][A-Za-z0-9_]*` is refused rather than escaped.
pub fn quote_ident(name: &str) -> Result<String, ClideError> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if valid_start && valid_rest {
        Ok(format!("\"{}\"", name))
    } else {
        Err(ClideError::InvalidIdentifier(name.to_string()))
    }
}

/// Splits `"85610, 85611,85612"` into station numbers.
///
/// Scripts take stations as a single comma-separated argument; blanks and
/// surrounding whitespace are dropped.
pub fn parse_station_list(stations: &str) -> Vec<String> {
    stations
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Owned copy of a station selection, suitable for binding as `text[]`.
pub(crate) fn station_param(stations: &[String]) -> Vec<String> {
    stations.iter().map(|s| s.trim().to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident_accepts_plain_names() {
        assert_eq!(quote_ident("obs_daily").unwrap(), "\"obs_daily\"");
        assert_eq!(quote_ident("_tmp1").unwrap(), "\"_tmp1\"");
    }

    #[test]
    fn test_quote_ident_rejects_injection() {
        for bad in ["", "1col", "rain; DROP TABLE stations", "a\"b", "lsd,rain_24h", "max tmp"] {
            assert!(
                matches!(quote_ident(bad), Err(ClideError::InvalidIdentifier(_))),
                "{:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_parse_station_list_trims_and_drops_blanks() {
        assert_eq!(
            parse_station_list("85610, 85611 ,,85612"),
            vec!["85610", "85611", "85612"]
        );
        assert!(parse_station_list("  ").is_empty());
    }

    #[test]
    fn test_lsd_between_is_inclusive_of_end_date() {
        let clause = lsd_between("lsd", 2);
        assert_eq!(clause, "lsd >= $2::date AND lsd < ($3::date + 1)");
    }
}
