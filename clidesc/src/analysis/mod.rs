/// Transformations over query results.
///
/// Submodules:
/// - `aggregate`: (station, period) statistics with a completeness threshold
/// - `chain`:     filling primary station gaps from chained stations
/// - `scopic`:    monthly rainfall records for the SCOPIC outlook tool

pub mod aggregate;
pub mod chain;
pub mod scopic;

pub use aggregate::{
    AggregateRecord, AggregationSpec, Completeness, Observation, ObservationColumns, Period, Statistic,
    aggregate, aggregate_table, records_to_table,
};
