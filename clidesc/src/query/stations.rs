/// CliDE station metadata queries.
///
/// The `stations` table carries many site-specific columns, so these
/// queries return `stations.*` rather than a fixed projection. Ordering is
/// always explicit so repeated calls give identical tables.

use chrono::{Local, NaiveDate};
use postgres::GenericClient;

use super::{fetch_strings, fetch_table, lsd_between, quote_ident, station_param};
use crate::error::ClideError;
use crate::table::Table;

/// Station metadata for the given station numbers, or every station when
/// the selection is empty.
pub fn stations<C: GenericClient>(client: &mut C, stations: &[String]) -> Result<Table, ClideError> {
    if stations.is_empty() {
        return fetch_table(
            client,
            "stations",
            "SELECT * FROM stations ORDER BY station_no",
            &[],
        );
    }

    let selection = station_param(stations);
    fetch_table(
        client,
        "stations",
        "SELECT * FROM stations WHERE station_no = ANY($1) ORDER BY station_no",
        &[&selection],
    )
}

/// Station metadata for one or more two-letter country codes (e.g. `WS`, `FJ`).
pub fn stations_by_country<C: GenericClient>(
    client: &mut C,
    countries: &[String],
) -> Result<Table, ClideError> {
    let codes: Vec<String> = countries.iter().map(|c| c.trim().to_uppercase()).collect();
    fetch_table(
        client,
        "stations_by_country",
        "SELECT * FROM stations WHERE country_code = ANY($1) ORDER BY country_code, station_no",
        &[&codes],
    )
}

/// Filter for [`stations_comprehensive`].
#[derive(Debug, Clone, Default)]
pub struct StationFilter {
    /// Station numbers to restrict to; empty means all stations.
    pub stations: Vec<String>,
    /// Observation table to count data in (`obs_daily`, `obs_subdaily`, ...).
    /// `None` filters the `stations` table itself by `start_date`.
    pub table: Option<String>,
    /// Channels to count. Empty means every numeric column of `table`.
    pub channels: Vec<String>,
    /// Minimum number of non-null observations per channel.
    pub min_obs: i64,
    /// Require every channel to reach `min_obs` (AND) instead of any (OR).
    pub require_all: bool,
    /// Defaults to 1000-01-01.
    pub from_date: Option<NaiveDate>,
    /// Defaults to today.
    pub to_date: Option<NaiveDate>,
}

impl StationFilter {
    fn observation_table(&self) -> Option<&str> {
        self.table.as_deref().filter(|t| *t != "stations")
    }

    fn date_range(&self) -> (NaiveDate, NaiveDate) {
        let from = self
            .from_date
            .unwrap_or_else(|| NaiveDate::from_ymd_opt(1000, 1, 1).unwrap_or(NaiveDate::MIN));
        let to = self.to_date.unwrap_or_else(|| Local::now().date_naive());
        (from, to)
    }
}

/// Station details with optional data-availability filters.
///
/// Without an observation table, returns stations whose `start_date` falls
/// in the date range. With one, returns `stations.*` plus a
/// `<channel>_obs_count` column per channel for stations with at least
/// `min_obs` observations in the range.
///
/// # Errors
/// `UnknownStation` if a requested station is not in the stations table;
/// `UnknownColumn` if a channel is not a numeric column of the table.
pub fn stations_comprehensive<C: GenericClient>(
    client: &mut C,
    filter: &StationFilter,
) -> Result<Table, ClideError> {
    if !filter.stations.is_empty() {
        let known = fetch_strings(
            client,
            "stations_comprehensive",
            "SELECT DISTINCT station_no::text FROM stations ORDER BY 1",
            &[],
        )?;
        if let Some(unknown) = filter
            .stations
            .iter()
            .find(|s| !known.iter().any(|k| k == s.trim()))
        {
            return Err(ClideError::UnknownStation(unknown.clone()));
        }
    }

    let (from, to) = filter.date_range();
    let selection = station_param(&filter.stations);

    let Some(table) = filter.observation_table() else {
        let sql = start_date_sql(!selection.is_empty());
        return if selection.is_empty() {
            fetch_table(client, "stations_comprehensive", &sql, &[&from, &to])
        } else {
            fetch_table(client, "stations_comprehensive", &sql, &[&from, &to, &selection])
        };
    };

    let numeric = numeric_columns(client, table)?;
    let channels = if filter.channels.is_empty() {
        numeric
    } else {
        if let Some(missing) = filter.channels.iter().find(|c| !numeric.contains(c)) {
            return Err(ClideError::UnknownColumn {
                column: missing.clone(),
                table: table.to_string(),
            });
        }
        filter.channels.clone()
    };

    let sql = observation_counts_sql(table, &channels, filter.require_all, !selection.is_empty())?;
    if selection.is_empty() {
        fetch_table(client, "stations_comprehensive", &sql, &[&from, &to, &filter.min_obs])
    } else {
        fetch_table(
            client,
            "stations_comprehensive",
            &sql,
            &[&from, &to, &filter.min_obs, &selection],
        )
    }
}

/// Stations reporting 10-minute AWS data: readings at every ten-minute mark
/// of the hour appear somewhere in `obs_aws`.
pub fn ten_minute_stations<C: GenericClient>(client: &mut C) -> Result<Table, ClideError> {
    fetch_table(
        client,
        "ten_minute_stations",
        "SELECT id.station_no, stn.name_primary, stn.name_secondary,
                stn.latitude, stn.longitude, stn.country_code
         FROM (
             SELECT DISTINCT station_no FROM obs_aws WHERE to_char(lsd, 'MI') = '10'
             INTERSECT
             SELECT DISTINCT station_no FROM obs_aws WHERE to_char(lsd, 'MI') = '20'
             INTERSECT
             SELECT DISTINCT station_no FROM obs_aws WHERE to_char(lsd, 'MI') = '30'
             INTERSECT
             SELECT DISTINCT station_no FROM obs_aws WHERE to_char(lsd, 'MI') = '40'
             INTERSECT
             SELECT DISTINCT station_no FROM obs_aws WHERE to_char(lsd, 'MI') = '50'
             INTERSECT
             SELECT DISTINCT station_no FROM obs_aws WHERE to_char(lsd, 'MI') = '00'
         ) AS id
         JOIN stations stn ON id.station_no = stn.station_no
         ORDER BY id.station_no",
        &[],
    )
}

/// Names of the `numeric` columns of a table, in table order.
pub fn numeric_columns<C: GenericClient>(
    client: &mut C,
    table: &str,
) -> Result<Vec<String>, ClideError> {
    fetch_strings(
        client,
        "numeric_columns",
        "SELECT column_name::text FROM information_schema.columns
         WHERE table_name::text = $1 AND data_type = 'numeric'
         ORDER BY ordinal_position",
        &[&table],
    )
}

// ---------------------------------------------------------------------------
// SQL builders
// ---------------------------------------------------------------------------

/// Params: `$1` from, `$2` to, `$3` stations (when `by_station`).
fn start_date_sql(by_station: bool) -> String {
    let station_clause = if by_station { "station_no = ANY($3) AND " } else { "" };
    format!(
        "SELECT * FROM stations WHERE {}{} ORDER BY station_no",
        station_clause,
        lsd_between("start_date", 1)
    )
}

/// Params: `$1` from, `$2` to, `$3` min_obs, `$4` stations (when `by_station`).
fn observation_counts_sql(
    table: &str,
    channels: &[String],
    require_all: bool,
    by_station: bool,
) -> Result<String, ClideError> {
    if channels.is_empty() {
        return Err(ClideError::InvalidArgument(format!(
            "table '{}' has no numeric channels to count",
            table
        )));
    }

    let table_ident = quote_ident(table)?;
    let mut selects = Vec::with_capacity(channels.len());
    let mut outputs = Vec::with_capacity(channels.len());
    let mut conditions = Vec::with_capacity(channels.len());

    for channel in channels {
        let column = quote_ident(channel)?;
        let count = quote_ident(&format!("{}_obs_count", channel))?;
        selects.push(format!("COUNT({}) AS {}", column, count));
        outputs.push(format!("counts.{}", count));
        conditions.push(format!("counts.{} >= $3", count));
    }

    let station_clause = if by_station { " AND station_no = ANY($4)" } else { "" };
    let joiner = if require_all { " AND " } else { " OR " };

    Ok(format!(
        "SELECT stations.*, {outputs}
         FROM (
             SELECT station_no, {selects}
             FROM {table}
             WHERE {range}{station_clause}
             GROUP BY station_no
         ) AS counts
         LEFT JOIN stations ON stations.station_no = counts.station_no
         WHERE {conditions}
         ORDER BY counts.station_no",
        outputs = outputs.join(", "),
        selects = selects.join(", "),
        table = table_ident,
        range = lsd_between("lsd", 1),
        station_clause = station_clause,
        conditions = conditions.join(joiner),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_counts_sql_uses_or_by_default() {
        let sql = observation_counts_sql("obs_daily", &channels(&["rain_24h", "max_air_temp"]), false, false)
            .unwrap();
        assert!(sql.contains("COUNT(\"rain_24h\") AS \"rain_24h_obs_count\""));
        assert!(sql.contains("counts.\"rain_24h_obs_count\" >= $3 OR counts.\"max_air_temp_obs_count\" >= $3"));
        assert!(!sql.contains("$4"), "no station parameter without a selection");
    }

    #[test]
    fn test_counts_sql_require_all_uses_and() {
        let sql = observation_counts_sql("obs_daily", &channels(&["rain_24h", "max_air_temp"]), true, true)
            .unwrap();
        assert!(sql.contains(">= $3 AND counts."));
        assert!(sql.contains("station_no = ANY($4)"));
        assert!(sql.contains("FROM \"obs_daily\""));
    }

    #[test]
    fn test_counts_sql_rejects_bad_channel_names() {
        let result = observation_counts_sql("obs_daily", &channels(&["rain_24h) --"]), false, false);
        assert!(matches!(result, Err(ClideError::InvalidIdentifier(_))));
    }

    #[test]
    fn test_counts_sql_needs_channels() {
        assert!(observation_counts_sql("obs_daily", &[], false, false).is_err());
    }

    #[test]
    fn test_start_date_sql_binds_stations_third() {
        assert!(start_date_sql(true).contains("station_no = ANY($3) AND start_date >= $1::date"));
        assert!(!start_date_sql(false).contains("ANY"));
    }

    #[test]
    fn test_filter_defaults_cover_full_record() {
        let filter = StationFilter::default();
        let (from, to) = filter.date_range();
        assert_eq!(from, NaiveDate::from_ymd_opt(1000, 1, 1).unwrap());
        assert!(to >= NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert!(filter.observation_table().is_none());

        let filter = StationFilter {
            table: Some("stations".to_string()),
            ..Default::default()
        };
        assert!(filter.observation_table().is_none());
    }
}
