/// CliDEsc database queries.
///
/// CliDEsc uses quoted CamelCase names (`"Station"`, `"Identifier"`,
/// `"StationChain"`). A station's CliDE number is its `"Identifier"`;
/// chains link a primary station (`Station1ID`) to the stations whose
/// records continue it (`Station2ID`).

use postgres::GenericClient;

use super::{fetch_table, station_param};
use crate::error::ClideError;
use crate::table::Table;

const CHAIN_SELECT: &str = r#"SELECT "StationChain"."Station1ID", "StationChain"."Station2ID",
        "Station"."Identifier" AS clide_id1,
        "Station2"."Identifier" AS clide_id2,
        "Station"."Name" AS name1,
        "Station2"."Name" AS name2
 FROM "Station"
 INNER JOIN "StationChain" ON "Station"."ID" = "StationChain"."Station1ID"
 JOIN "Station" AS "Station2" ON "StationChain"."Station2ID" = "Station2"."ID""#;

/// Station chain rows, optionally restricted to the given primary stations.
///
/// Columns: `Station1ID, Station2ID, clide_id1, clide_id2, name1, name2`.
pub fn station_chains<C: GenericClient>(
    client: &mut C,
    stations: &[String],
) -> Result<Table, ClideError> {
    if stations.is_empty() {
        let sql = format!(r#"{} ORDER BY "Station"."Identifier", "StationChain"."Station2ID""#, CHAIN_SELECT);
        return fetch_table(client, "station_chains", &sql, &[]);
    }

    let sql = format!(
        r#"{} WHERE "Station"."Identifier" = ANY($1) ORDER BY "Station"."Identifier", "StationChain"."Station2ID""#,
        CHAIN_SELECT
    );
    let selection = station_param(stations);
    fetch_table(client, "station_chains", &sql, &[&selection])
}

/// `"Station".*` for the given identifiers, or all stations when empty.
///
/// With `chain`, only stations that are the primary of a station chain are
/// returned (restricted to `stations` when given). If no chains match, the
/// selection falls back to `stations` unchanged.
pub fn station_metadata<C: GenericClient>(
    client: &mut C,
    stations: &[String],
    chain: bool,
) -> Result<Table, ClideError> {
    let mut selection = station_param(stations);

    if chain {
        let chains = station_chains(client, &selection)?;
        let primaries: Vec<String> = match chains.column("clide_id1") {
            Some(values) => {
                let mut ids: Vec<String> = Vec::new();
                for id in values.filter_map(|v| v.as_key()) {
                    if !ids.contains(&id) {
                        ids.push(id);
                    }
                }
                ids
            }
            None => Vec::new(),
        };
        if !primaries.is_empty() {
            selection = primaries;
        }
    }

    if selection.is_empty() {
        return fetch_table(
            client,
            "station_metadata",
            r#"SELECT * FROM "Station" ORDER BY "Identifier""#,
            &[],
        );
    }

    fetch_table(
        client,
        "station_metadata",
        r#"SELECT * FROM "Station" WHERE "Identifier" = ANY($1) ORDER BY "Identifier""#,
        &[&selection],
    )
}

/// `"Station".*` for one or more country codes.
pub fn stations_by_class<C: GenericClient>(
    client: &mut C,
    countries: &[String],
) -> Result<Table, ClideError> {
    let codes: Vec<String> = countries.iter().map(|c| c.trim().to_string()).collect();
    fetch_table(
        client,
        "stations_by_class",
        r#"SELECT * FROM "Station" WHERE "CountryCode" = ANY($1) ORDER BY "CountryCode", "Identifier""#,
        &[&codes],
    )
}
