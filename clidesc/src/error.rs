/// Error types for the query and aggregation layers.
///
/// Connection and query failures are surfaced immediately and never
/// retried. Empty results and insufficient data are *not* errors: they show
/// up as zero-row tables and invalid aggregate rows respectively.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClideError {
    /// The connection is closed or the socket failed.
    #[error("database connection unusable during {context}")]
    Connection {
        context: String,
        #[source]
        source: postgres::Error,
    },

    /// The server rejected the statement (bad SQL, missing table, ...).
    #[error("query failed in {context}")]
    Query {
        context: String,
        #[source]
        source: postgres::Error,
    },

    #[error("invalid SQL identifier '{0}'")]
    InvalidIdentifier(String),

    #[error("station number {0} not found in stations table")]
    UnknownStation(String),

    #[error("column '{column}' is not a numeric column of table '{table}'")]
    UnknownColumn { column: String, table: String },

    #[error("table has no column named '{0}'")]
    MissingColumn(String),

    #[error("invalid value in column '{column}' at row {row}: {reason}")]
    InvalidValue {
        column: String,
        row: usize,
        reason: String,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("failed to write CSV output")]
    Csv(#[from] csv::Error),
}

impl ClideError {
    /// Sorts a driver error into the connection or query bucket.
    ///
    /// Closed connections and I/O failures underneath the driver are
    /// connection errors; everything else came back from the server or the
    /// parameter encoder and is reported against the statement.
    pub fn from_postgres(context: &str, err: postgres::Error) -> Self {
        let io_failure = std::error::Error::source(&err)
            .is_some_and(|source| source.is::<std::io::Error>());

        if err.is_closed() || io_failure {
            ClideError::Connection {
                context: context.to_string(),
                source: err,
            }
        } else {
            ClideError::Query {
                context: context.to_string(),
                source: err,
            }
        }
    }

    /// True for failures that mean the connection itself is gone.
    pub fn is_connection(&self) -> bool {
        matches!(self, ClideError::Connection { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_offender() {
        let err = ClideError::UnknownStation("99999".to_string());
        assert_eq!(err.to_string(), "station number 99999 not found in stations table");

        let err = ClideError::UnknownColumn {
            column: "rain_1h".to_string(),
            table: "obs_daily".to_string(),
        };
        assert!(err.to_string().contains("rain_1h"));
        assert!(err.to_string().contains("obs_daily"));
        assert!(!err.is_connection());
    }
}
