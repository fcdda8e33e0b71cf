/// Monthly rainfall lookups backing the SCOPIC product.

use chrono::{Datelike, NaiveDate};
use log::debug;
use postgres::GenericClient;

use super::{fetch_table, lsd_between};
use crate::error::ClideError;
use crate::table::Table;

/// Monthly rainfall totals from `obs_monthly` for one station.
///
/// Columns: `year, month, data`. `from` is widened to the start of its month.
pub fn monthly_totals<C: GenericClient>(
    client: &mut C,
    station: &str,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Table, ClideError> {
    let month_start = from.with_day(1).unwrap_or(from);
    let sql = format!(
        "SELECT EXTRACT(year FROM lsd)::int AS year,
                EXTRACT(month FROM lsd)::int AS month,
                SUM(tot_rain) AS data
         FROM obs_monthly
         WHERE UPPER(station_no) = UPPER($1) AND {}
         GROUP BY 1, 2
         ORDER BY 1, 2",
        lsd_between("lsd", 2)
    );
    fetch_table(client, "monthly_totals", &sql, &[&station, &month_start, &to])
}

/// First and last year with data in either `obs_daily` or `obs_monthly`.
/// `None` when the station has no observations at all.
pub fn years_of_record<C: GenericClient>(
    client: &mut C,
    station: &str,
) -> Result<Option<(i32, i32)>, ClideError> {
    let sql = "SELECT MIN(a.firstyear)::int, MAX(a.lastyear)::int
               FROM (
                   SELECT MIN(EXTRACT(year FROM lsd)) AS firstyear,
                          MAX(EXTRACT(year FROM lsd)) AS lastyear
                   FROM obs_daily WHERE UPPER(station_no) = UPPER($1)
                   UNION
                   SELECT MIN(EXTRACT(year FROM lsd)) AS firstyear,
                          MAX(EXTRACT(year FROM lsd)) AS lastyear
                   FROM obs_monthly WHERE UPPER(station_no) = UPPER($1)
               ) a";
    debug!("years_of_record: {}", sql);

    let row = client
        .query_one(sql, &[&station])
        .map_err(|e| ClideError::from_postgres("years_of_record", e))?;
    let first: Option<i32> = row
        .try_get(0)
        .map_err(|e| ClideError::from_postgres("years_of_record", e))?;
    let last: Option<i32> = row
        .try_get(1)
        .map_err(|e| ClideError::from_postgres("years_of_record", e))?;

    Ok(first.zip(last))
}
