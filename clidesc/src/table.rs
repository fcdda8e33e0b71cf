/// Tabular query results: named columns over rows of loosely typed cells.
///
/// Every query in this crate returns a `Table`. Columns come from the
/// prepared statement, so a query that matches nothing still yields a
/// zero-row table with the documented column set, and callers can check
/// `is_empty()` instead of handling a special case.
///
/// Column lookups are ASCII case-insensitive because PostgreSQL folds
/// unquoted aliases to lower case (`AS LSD` comes back as `lsd`).

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use log::warn;
use postgres::{Row, Statement};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use std::fmt;
use std::io;

use crate::error::ClideError;

// ---------------------------------------------------------------------------
// Cell values
// ---------------------------------------------------------------------------

/// A single cell. SQL NULL and undecodable column types are both `Null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view of the cell. NUMERIC columns are decoded as floats.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Timestamp view of the cell. Dates map to midnight; text is accepted
    /// in `YYYY-MM-DD` or `YYYY-MM-DD HH:MM:SS` form (the shape produced by
    /// `TO_CHAR(lsd, 'yyyy-mm-dd')`).
    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Timestamp(ts) => Some(*ts),
            Value::Date(d) => d.and_hms_opt(0, 0, 0),
            Value::Text(s) => NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                .ok()
                .or_else(|| {
                    NaiveDate::parse_from_str(s, "%Y-%m-%d")
                        .ok()
                        .and_then(|d| d.and_hms_opt(0, 0, 0))
                }),
            _ => None,
        }
    }

    /// Station numbers are stored as text in CliDE but occasionally come
    /// back as integers from computed columns.
    pub fn as_key(&self) -> Option<String> {
        match self {
            Value::Text(s) => Some(s.clone()),
            Value::Int(v) => Some(v.to_string()),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(v) => write!(f, "{}", v),
            Value::Date(v) => write!(f, "{}", v.format("%Y-%m-%d")),
            Value::Timestamp(v) => write!(f, "{}", v.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

impl From<Option<f64>> for Value {
    fn from(v: Option<f64>) -> Self {
        v.map_or(Value::Null, Value::Float)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

// ---------------------------------------------------------------------------
// Row decoding
// ---------------------------------------------------------------------------

/// Decodes one cell by PostgreSQL type name.
fn decode_cell(row: &Row, idx: usize, type_name: &str) -> Result<Value, postgres::Error> {
    let value = match type_name {
        "bool" => row.try_get::<_, Option<bool>>(idx)?.map(Value::Bool),
        "int2" => row.try_get::<_, Option<i16>>(idx)?.map(|v| Value::Int(v.into())),
        "int4" => row.try_get::<_, Option<i32>>(idx)?.map(|v| Value::Int(v.into())),
        "int8" => row.try_get::<_, Option<i64>>(idx)?.map(Value::Int),
        "float4" => row.try_get::<_, Option<f32>>(idx)?.map(|v| Value::Float(v.into())),
        "float8" => row.try_get::<_, Option<f64>>(idx)?.map(Value::Float),
        "numeric" => row
            .try_get::<_, Option<Decimal>>(idx)?
            .and_then(|d| d.to_f64())
            .map(Value::Float),
        "text" | "varchar" | "bpchar" | "name" => {
            row.try_get::<_, Option<String>>(idx)?.map(Value::Text)
        }
        "date" => row.try_get::<_, Option<NaiveDate>>(idx)?.map(Value::Date),
        "timestamp" => row
            .try_get::<_, Option<NaiveDateTime>>(idx)?
            .map(Value::Timestamp),
        "timestamptz" => row
            .try_get::<_, Option<DateTime<Utc>>>(idx)?
            .map(|ts| Value::Timestamp(ts.naive_utc())),
        _ => None,
    };
    Ok(value.unwrap_or(Value::Null))
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// Zero-row table with the given columns.
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Builds a table, rejecting rows whose width does not match.
    pub fn with_rows<S: Into<String>>(
        columns: impl IntoIterator<Item = S>,
        rows: Vec<Vec<Value>>,
    ) -> Result<Self, ClideError> {
        let mut table = Self::new(columns);
        for row in rows {
            table.push_row(row)?;
        }
        Ok(table)
    }

    /// Converts driver rows using the statement's column metadata.
    pub fn from_statement(statement: &Statement, rows: &[Row]) -> Result<Self, postgres::Error> {
        let columns = statement.columns();
        let mut table = Self::new(columns.iter().map(|c| c.name()));

        for column in columns {
            if !is_decodable(column.type_().name()) {
                warn!(
                    "column '{}' has unsupported type '{}', values will be null",
                    column.name(),
                    column.type_().name()
                );
            }
        }

        for row in rows {
            let mut cells = Vec::with_capacity(columns.len());
            for (idx, column) in columns.iter().enumerate() {
                cells.push(decode_cell(row, idx, column.type_().name())?);
            }
            table.rows.push(cells);
        }

        Ok(table)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn push_row(&mut self, row: Vec<Value>) -> Result<(), ClideError> {
        if row.len() != self.columns.len() {
            return Err(ClideError::InvalidArgument(format!(
                "row has {} cells but table has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    /// Appends a row built in this crate from the table's own column list.
    pub(crate) fn push_built_row(&mut self, row: Vec<Value>) {
        debug_assert_eq!(row.len(), self.columns.len(), "row width must match columns");
        self.rows.push(row);
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.eq_ignore_ascii_case(name))
    }

    pub fn require_column(&self, name: &str) -> Result<usize, ClideError> {
        self.column_index(name)
            .ok_or_else(|| ClideError::MissingColumn(name.to_string()))
    }

    /// Cell at `row` in column `name`.
    pub fn value(&self, row: usize, name: &str) -> Option<&Value> {
        let idx = self.column_index(name)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    /// All cells of one column, top to bottom.
    pub fn column(&self, name: &str) -> Option<impl Iterator<Item = &Value>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(move |r| &r[idx]))
    }

    /// Keeps the rows for which `keep` returns true.
    pub fn filter_rows<F>(&self, mut keep: F) -> Table
    where
        F: FnMut(&[Value]) -> bool,
    {
        Table {
            columns: self.columns.clone(),
            rows: self.rows.iter().filter(|r| keep(r)).cloned().collect(),
        }
    }

    /// Appends the rows of `other`, which must have the same columns.
    pub fn append(&mut self, other: Table) -> Result<(), ClideError> {
        let same = self.columns.len() == other.columns.len()
            && self
                .columns
                .iter()
                .zip(&other.columns)
                .all(|(a, b)| a.eq_ignore_ascii_case(b));
        if !same {
            return Err(ClideError::InvalidArgument(format!(
                "cannot append table with columns {:?} to table with columns {:?}",
                other.columns, self.columns
            )));
        }
        self.rows.extend(other.rows);
        Ok(())
    }

    /// Writes a header line and one record per row. Nulls become empty fields.
    pub fn write_csv<W: io::Write>(&self, writer: W) -> Result<(), ClideError> {
        let mut out = csv::Writer::from_writer(writer);
        out.write_record(&self.columns)?;
        for row in &self.rows {
            out.write_record(row.iter().map(|v| v.to_string()))?;
        }
        out.flush().map_err(csv::Error::from)?;
        Ok(())
    }

    /// One JSON object per row, keyed by column name.
    pub fn to_json_records(&self) -> serde_json::Value {
        let records = self
            .rows
            .iter()
            .map(|row| {
                let object = self
                    .columns
                    .iter()
                    .zip(row)
                    .map(|(name, value)| {
                        let json = serde_json::to_value(value).unwrap_or(serde_json::Value::Null);
                        (name.clone(), json)
                    })
                    .collect::<serde_json::Map<_, _>>();
                serde_json::Value::Object(object)
            })
            .collect();
        serde_json::Value::Array(records)
    }
}

fn is_decodable(type_name: &str) -> bool {
    matches!(
        type_name,
        "bool"
            | "int2"
            | "int4"
            | "int8"
            | "float4"
            | "float8"
            | "numeric"
            | "text"
            | "varchar"
            | "bpchar"
            | "name"
            | "date"
            | "timestamp"
            | "timestamptz"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        Table::with_rows(
            ["station_no", "lsd", "rain_24h"],
            vec![
                vec![
                    Value::from("85610"),
                    Value::Timestamp(NaiveDate::from_ymd_opt(2021, 9, 1).unwrap().and_hms_opt(0, 0, 0).unwrap()),
                    Value::Float(12.4),
                ],
                vec![
                    Value::from("85610"),
                    Value::Timestamp(NaiveDate::from_ymd_opt(2021, 9, 2).unwrap().and_hms_opt(0, 0, 0).unwrap()),
                    Value::Null,
                ],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_zero_row_table_keeps_columns() {
        let table = Table::new(["station_no", "lsd"]);
        assert!(table.is_empty());
        assert_eq!(table.columns(), &["station_no".to_string(), "lsd".to_string()]);
    }

    #[test]
    fn test_column_lookup_ignores_case() {
        let table = sample();
        assert_eq!(table.column_index("LSD"), Some(1));
        assert!(table.require_column("rain_3h").is_err());
        assert_eq!(table.value(0, "RAIN_24H"), Some(&Value::Float(12.4)));
    }

    #[test]
    fn test_push_row_rejects_wrong_width() {
        let mut table = Table::new(["a", "b"]);
        assert!(table.push_row(vec![Value::Int(1)]).is_err());
        assert!(table.push_row(vec![Value::Int(1), Value::Null]).is_ok());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_text_dates_parse_as_midnight() {
        let v = Value::Text("2021-09-30".to_string());
        let ts = v.as_datetime().expect("date text should parse");
        assert_eq!(ts.format("%Y-%m-%d %H:%M").to_string(), "2021-09-30 00:00");
        assert!(Value::Text("not a date".to_string()).as_datetime().is_none());
    }

    #[test]
    fn test_csv_output_leaves_nulls_empty() {
        let mut buf = Vec::new();
        sample().write_csv(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "station_no,lsd,rain_24h");
        assert_eq!(lines[1], "85610,2021-09-01 00:00:00,12.4");
        assert_eq!(lines[2], "85610,2021-09-02 00:00:00,");
    }

    #[test]
    fn test_json_records_use_null_for_missing() {
        let json = sample().to_json_records();
        assert_eq!(json[0]["rain_24h"], serde_json::json!(12.4));
        assert!(json[1]["rain_24h"].is_null());
    }

    #[test]
    fn test_append_requires_matching_columns() {
        let mut a = sample();
        let b = sample();
        a.append(b).unwrap();
        assert_eq!(a.len(), 4);
        assert!(a.append(Table::new(["station_no"])).is_err());
    }
}
