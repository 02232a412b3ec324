use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::{MetricError, Result};
use crate::executor::{Cell, Row};

/// One row, fields in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    fields: Vec<(String, Cell)>,
}

impl Record {
    pub fn get(&self, field: &str) -> Option<&Cell> {
        self.fields.iter().find(|(k, _)| k == field).map(|(_, v)| v)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Cell)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (k, v) in &self.fields {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// The shaped output of one metric call.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricResult {
    key: String,
    records: Vec<Record>,
}

impl MetricResult {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl Serialize for MetricResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.key, &self.records)?;
        map.end()
    }
}

/// Pairs each row with `fields`. Rows stay in the order the query returned
/// them.
pub fn shape(
    metric: &'static str,
    key: String,
    fields: &[String],
    rows: Vec<Row>,
) -> Result<MetricResult> {
    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        if row.len() != fields.len() {
            return Err(MetricError::ResultShape {
                metric,
                expected: fields.len(),
                found: row.len(),
            });
        }
        records.push(Record {
            fields: fields.iter().cloned().zip(row).collect(),
        });
    }
    Ok(MetricResult { key, records })
}
