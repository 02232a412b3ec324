use chrono::NaiveDate;
use duckdb::Connection;
use duckdb::types::Value;
use serde::Serialize;

use crate::error::Result;
use crate::query::Query;

/// One column value of a result row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
}

pub type Row = Vec<Cell>;

impl Cell {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Int(v) => Some(*v as f64),
            Cell::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }
}

impl From<Value> for Cell {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => Cell::Null,
            Value::Boolean(b) => Cell::Bool(b),
            Value::TinyInt(i) => Cell::Int(i.into()),
            Value::SmallInt(i) => Cell::Int(i.into()),
            Value::Int(i) => Cell::Int(i.into()),
            Value::BigInt(i) => Cell::Int(i),
            Value::UTinyInt(i) => Cell::Int(i.into()),
            Value::USmallInt(i) => Cell::Int(i.into()),
            Value::UInt(i) => Cell::Int(i.into()),
            Value::UBigInt(i) => i64::try_from(i)
                .map(Cell::Int)
                .unwrap_or(Cell::Float(i as f64)),
            Value::HugeInt(i) => i64::try_from(i)
                .map(Cell::Int)
                .unwrap_or(Cell::Float(i as f64)),
            Value::Float(f) => Cell::Float(f.into()),
            Value::Double(f) => Cell::Float(f),
            Value::Decimal(d) => {
                let s = d.to_string();
                s.parse::<f64>().map(Cell::Float).unwrap_or(Cell::Text(s))
            }
            Value::Text(s) | Value::Enum(s) => Cell::Text(s),
            Value::Date32(days) => date_from_epoch_days(days)
                .map(Cell::Date)
                .unwrap_or(Cell::Null),
            other => Cell::Text(format!("{other:?}")),
        }
    }
}

fn date_from_epoch_days(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(1970, 1, 1)?.checked_add_signed(chrono::Duration::days(days.into()))
}

/// Runs `query` and collects every column of every row.
/// Either all rows come back or an error does.
pub fn execute(conn: &Connection, query: &Query) -> Result<Vec<Row>> {
    let mut stmt = conn.prepare(&query.sql)?;
    let mut rows = stmt.query(duckdb::params_from_iter(query.params.iter()))?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let width = row.as_ref().column_count();
        let mut cells = Vec::with_capacity(width);
        for i in 0..width {
            let v: Value = row.get(i)?;
            cells.push(Cell::from(v));
        }
        out.push(cells);
    }
    Ok(out)
}
