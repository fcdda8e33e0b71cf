/// Observation table queries (`obs_daily`, `obs_subdaily`, `obs_aws`).
///
/// Result columns are `station_no, lsd, <channels...>` when channels are
/// given, or every column of the table otherwise. Rows are ordered by
/// `lsd, station_no`. `lsd` comes back as a timestamp.

use chrono::NaiveDate;
use postgres::GenericClient;
use std::fmt;

use super::{clidesc, fetch_table, lsd_between, quote_ident, station_param};
use crate::analysis::Period;
use crate::analysis::chain::{ChainLink, merge_chained};
use crate::error::ClideError;
use crate::table::Table;

/// Parameters shared by the observation queries.
#[derive(Debug, Clone)]
pub struct ObsQuery {
    pub table: String,
    pub stations: Vec<String>,
    /// First day, inclusive.
    pub from: NaiveDate,
    /// Last day, inclusive.
    pub to: NaiveDate,
    /// Channel columns; empty selects every column.
    pub channels: Vec<String>,
}

impl ObsQuery {
    pub fn new(table: &str, stations: &[String], from: NaiveDate, to: NaiveDate) -> Self {
        Self {
            table: table.to_string(),
            stations: stations.to_vec(),
            from,
            to,
            channels: Vec::new(),
        }
    }

    pub fn channels<S: AsRef<str>>(mut self, channels: &[S]) -> Self {
        self.channels = channels.iter().map(|c| c.as_ref().to_string()).collect();
        self
    }

    fn validate(&self) -> Result<(), ClideError> {
        if self.stations.is_empty() {
            return Err(ClideError::InvalidArgument(
                "at least one station number is required".to_string(),
            ));
        }
        if self.from > self.to {
            return Err(ClideError::InvalidArgument(format!(
                "from date {} is after to date {}",
                self.from, self.to
            )));
        }
        Ok(())
    }
}

/// Aggregate function applied by the database when `observations_aws`
/// groups rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SqlStatistic {
    #[default]
    Avg,
    Sum,
    Min,
    Max,
}

impl fmt::Display for SqlStatistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlStatistic::Avg => write!(f, "AVG"),
            SqlStatistic::Sum => write!(f, "SUM"),
            SqlStatistic::Min => write!(f, "MIN"),
            SqlStatistic::Max => write!(f, "MAX"),
        }
    }
}

impl std::str::FromStr for SqlStatistic {
    type Err = ClideError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "AVG" | "MEAN" => Ok(SqlStatistic::Avg),
            "SUM" => Ok(SqlStatistic::Sum),
            "MIN" => Ok(SqlStatistic::Min),
            "MAX" => Ok(SqlStatistic::Max),
            other => Err(ClideError::InvalidArgument(format!("unknown statistic '{}'", other))),
        }
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Observations from any CliDE observation table.
pub fn observations<C: GenericClient>(client: &mut C, query: &ObsQuery) -> Result<Table, ClideError> {
    query.validate()?;
    let sql = observations_sql(&query.table, &query.channels)?;
    let stations = station_param(&query.stations);
    fetch_table(client, "observations", &sql, &[&stations, &query.from, &query.to])
}

/// Daily observations (`obs_daily`).
pub fn observations_daily<C: GenericClient, S: AsRef<str>>(
    client: &mut C,
    stations: &[String],
    from: NaiveDate,
    to: NaiveDate,
    channels: &[S],
) -> Result<Table, ClideError> {
    let query = ObsQuery::new("obs_daily", stations, from, to).channels(channels);
    observations(client, &query)
}

/// Sub-daily observations (`obs_subdaily`). Channels are required.
pub fn observations_subdaily<C: GenericClient, S: AsRef<str>>(
    client: &mut C,
    stations: &[String],
    from: NaiveDate,
    to: NaiveDate,
    channels: &[S],
) -> Result<Table, ClideError> {
    if channels.is_empty() {
        return Err(ClideError::InvalidArgument(
            "obs_subdaily queries need at least one channel".to_string(),
        ));
    }
    let query = ObsQuery::new("obs_subdaily", stations, from, to).channels(channels);
    observations(client, &query)
}

/// AWS observations (`obs_aws`), raw or aggregated by the database.
///
/// With a period, rows are grouped per station and `date_trunc`ed `lsd`,
/// and each channel is reduced with `statistic` under its own name.
/// Aggregation needs explicit channels.
pub fn observations_aws<C: GenericClient>(
    client: &mut C,
    stations: &[String],
    from: NaiveDate,
    to: NaiveDate,
    channels: &[String],
    aggregation: Option<Period>,
    statistic: SqlStatistic,
) -> Result<Table, ClideError> {
    let query = ObsQuery::new("obs_aws", stations, from, to).channels(channels);
    query.validate()?;
    let sql = aws_sql(channels, aggregation, statistic)?;
    let stations = station_param(stations);
    fetch_table(client, "observations_aws", &sql, &[&stations, &from, &to])
}

/// The `rain_24h` channel of `obs_daily`.
pub fn rain_24h<C: GenericClient>(
    client: &mut C,
    stations: &[String],
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Table, ClideError> {
    observations_daily(client, stations, from, to, &["rain_24h"])
}

/// Rainfall total per station over a window, with station coordinates.
///
/// Columns: `rain_sum, station_no, latitude, longitude`.
pub fn rain_totals<C: GenericClient>(
    client: &mut C,
    stations: &[String],
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Table, ClideError> {
    ObsQuery::new("obs_daily", stations, from, to).validate()?;
    let sql = format!(
        "SELECT SUM(a.rain_24h) AS rain_sum, a.station_no, b.latitude, b.longitude
         FROM obs_daily a
         LEFT OUTER JOIN stations b ON a.station_no = b.station_no
         WHERE a.station_no = ANY($1) AND {}
         GROUP BY a.station_no, b.latitude, b.longitude
         ORDER BY a.station_no",
        lsd_between("a.lsd", 2)
    );
    let stations = station_param(stations);
    fetch_table(client, "rain_totals", &sql, &[&stations, &from, &to])
}

/// Observations with gaps filled from chained stations.
///
/// Chains are looked up in the CliDEsc database; observations for both the
/// primary and chained stations come from CliDE. See
/// [`merge_chained`] for the fill rule.
pub fn observations_chained<C: GenericClient, D: GenericClient>(
    clide: &mut C,
    clidesc_client: &mut D,
    query: &ObsQuery,
) -> Result<Table, ClideError> {
    let primary = observations(clide, query)?;

    let chains = clidesc::station_chains(clidesc_client, &query.stations)?;
    let links = ChainLink::from_table(&chains)?;
    if links.is_empty() {
        return Ok(primary);
    }

    let mut chained_stations: Vec<String> = Vec::new();
    for link in &links {
        if !chained_stations.contains(&link.chained) {
            chained_stations.push(link.chained.clone());
        }
    }

    let chained_query = ObsQuery {
        stations: chained_stations,
        ..query.clone()
    };
    let chained = observations(clide, &chained_query)?;

    merge_chained(&primary, &chained, &links)
}

// ---------------------------------------------------------------------------
// SQL builders
// ---------------------------------------------------------------------------

/// Params: `$1` stations, `$2` from, `$3` to.
fn observations_sql(table: &str, channels: &[String]) -> Result<String, ClideError> {
    let table = quote_ident(table)?;
    let projection = if channels.is_empty() {
        "*".to_string()
    } else {
        let columns = channels
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Result<Vec<_>, _>>()?;
        format!("station_no, lsd, {}", columns.join(", "))
    };

    Ok(format!(
        "SELECT {} FROM {} WHERE station_no = ANY($1) AND {} ORDER BY lsd, station_no",
        projection,
        table,
        lsd_between("lsd", 2)
    ))
}

/// Params: `$1` stations, `$2` from, `$3` to.
fn aws_sql(
    channels: &[String],
    aggregation: Option<Period>,
    statistic: SqlStatistic,
) -> Result<String, ClideError> {
    let Some(period) = aggregation else {
        return observations_sql("obs_aws", channels);
    };

    if channels.is_empty() {
        return Err(ClideError::InvalidArgument(
            "aggregated AWS queries need explicit channels".to_string(),
        ));
    }

    let reduced = channels
        .iter()
        .map(|c| quote_ident(c).map(|col| format!("{}({}) AS {}", statistic, col, col)))
        .collect::<Result<Vec<_>, _>>()?;
    let bucket = format!("date_trunc('{}', lsd)", period.trunc_unit());

    Ok(format!(
        "SELECT station_no, {bucket} AS lsd, {reduced}
         FROM obs_aws
         WHERE station_no = ANY($1) AND {range}
         GROUP BY station_no, {bucket}
         ORDER BY station_no, lsd",
        bucket = bucket,
        reduced = reduced.join(", "),
        range = lsd_between("obs_aws.lsd", 2),
    ))
}
