use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::{MetricError, Result};

/// The kinds of input a metric can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Disease,
    State,
    Sex,
    Race,
    Statistic,
    Status,
    Table,
}

impl Dimension {
    pub fn as_str(self) -> &'static str {
        match self {
            Dimension::Disease => "disease",
            Dimension::State => "state",
            Dimension::Sex => "sex",
            Dimension::Race => "race",
            Dimension::Statistic => "statistic",
            Dimension::Status => "status",
            Dimension::Table => "table",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Drops everything outside `[A-Za-z0-9_]`.
pub fn strip_non_word(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect()
}

fn parse_word<T: Copy>(
    dimension: Dimension,
    raw: &str,
    all: &[T],
    name: impl Fn(T) -> &'static str,
) -> Result<T> {
    let cleaned = strip_non_word(raw);
    all.iter()
        .copied()
        .find(|v| name(*v) == cleaned)
        .ok_or_else(|| MetricError::invalid(dimension, raw))
}

/// Tracked conditions. Each one is a boolean column on the subject table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Disease {
    HeartFail,
    AlzRelSen,
    Depression,
    Cancer,
}

impl Disease {
    pub const ALL: [Disease; 4] = [
        Disease::HeartFail,
        Disease::AlzRelSen,
        Disease::Depression,
        Disease::Cancer,
    ];

    /// Also the flag column name.
    pub fn as_str(self) -> &'static str {
        match self {
            Disease::HeartFail => "heart_fail",
            Disease::AlzRelSen => "alz_rel_sen",
            Disease::Depression => "depression",
            Disease::Cancer => "cancer",
        }
    }
}

impl FromStr for Disease {
    type Err = MetricError;

    fn from_str(s: &str) -> Result<Self> {
        parse_word(Dimension::Disease, s, &Self::ALL, Self::as_str)
    }
}

const STATE_CODES: [&str; 51] = [
    "AK", "AL", "AR", "AZ", "CA", "CO", "CT", "DC", "DE", "FL", "GA", "HI", "IA", "ID", "IL",
    "IN", "KS", "KY", "LA", "MA", "MD", "ME", "MI", "MN", "MO", "MS", "MT", "NC", "ND", "NE",
    "NH", "NJ", "NM", "NV", "NY", "OH", "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT",
    "VA", "VT", "WA", "WI", "WV", "WY",
];

/// Stored value of the catch-all state bucket.
const OTHER_STATE: &str = "Othr";

/// A state of residence: one of the 51 postal codes (DC included) or the
/// catch-all bucket. Only constructible by parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct State(&'static str);

impl State {
    pub const OTHER: State = State(OTHER_STATE);

    /// The value as stored in the subject table.
    pub fn code(self) -> &'static str {
        self.0
    }

    pub fn is_other(self) -> bool {
        self.0 == OTHER_STATE
    }

    pub fn all() -> impl Iterator<Item = State> {
        STATE_CODES
            .iter()
            .map(|c| State(*c))
            .chain(std::iter::once(State::OTHER))
    }
}

impl FromStr for State {
    type Err = MetricError;

    fn from_str(s: &str) -> Result<Self> {
        let cleaned = strip_non_word(s).to_ascii_uppercase();
        if cleaned == "OTHR" || cleaned == "OTHER" {
            return Ok(State::OTHER);
        }
        STATE_CODES
            .iter()
            .find(|c| **c == cleaned)
            .map(|c| State(*c))
            .ok_or_else(|| MetricError::invalid(Dimension::State, s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sex {
    Male,
    Female,
}

impl Sex {
    pub const ALL: [Sex; 2] = [Sex::Male, Sex::Female];

    pub fn as_str(self) -> &'static str {
        match self {
            Sex::Male => "male",
            Sex::Female => "female",
        }
    }
}

impl FromStr for Sex {
    type Err = MetricError;

    fn from_str(s: &str) -> Result<Self> {
        parse_word(Dimension::Sex, s, &Self::ALL, Self::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Race {
    White,
    Black,
    Hispanic,
    Others,
}

impl Race {
    pub const ALL: [Race; 4] = [Race::White, Race::Black, Race::Hispanic, Race::Others];

    pub fn as_str(self) -> &'static str {
        match self {
            Race::White => "white",
            Race::Black => "black",
            Race::Hispanic => "hispanic",
            Race::Others => "others",
        }
    }
}

impl FromStr for Race {
    type Err = MetricError;

    fn from_str(s: &str) -> Result<Self> {
        parse_word(Dimension::Race, s, &Self::ALL, Self::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Statistic {
    Mean,
    Median,
    /// Population standard deviation.
    Sd,
}

impl Statistic {
    pub const ALL: [Statistic; 3] = [Statistic::Mean, Statistic::Median, Statistic::Sd];

    pub fn as_str(self) -> &'static str {
        match self {
            Statistic::Mean => "mean",
            Statistic::Median => "median",
            Statistic::Sd => "sd",
        }
    }
}

impl FromStr for Statistic {
    type Err = MetricError;

    fn from_str(s: &str) -> Result<Self> {
        parse_word(Dimension::Statistic, s, &Self::ALL, Self::as_str)
    }
}

/// Alive or dead, derived from whether a date of death is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Alive,
    Dead,
}

impl Status {
    pub const ALL: [Status; 2] = [Status::Alive, Status::Dead];

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Alive => "alive",
            Status::Dead => "dead",
        }
    }

    /// Predicate over the subject alias `s`.
    pub fn predicate(self) -> &'static str {
        match self {
            Status::Alive => "s.dod IS NULL",
            Status::Dead => "s.dod IS NOT NULL",
        }
    }
}

impl FromStr for Status {
    type Err = MetricError;

    fn from_str(s: &str) -> Result<Self> {
        parse_word(Dimension::Status, s, &Self::ALL, Self::as_str)
    }
}

const MAX_IDENT_LEN: usize = 63;

/// A table name that is safe to splice into SQL as a quoted identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableName(String);

impl TableName {
    pub(crate) fn from_static(name: &'static str) -> Self {
        TableName(name.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Double-quoted for use in a FROM clause.
    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.0)
    }
}

impl FromStr for TableName {
    type Err = MetricError;

    fn from_str(s: &str) -> Result<Self> {
        let mut chars = s.chars();
        let head_ok = chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
        let tail_ok = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
        if head_ok && tail_ok && s.len() <= MAX_IDENT_LEN {
            Ok(TableName(s.to_string()))
        } else {
            Err(MetricError::invalid(Dimension::Table, s))
        }
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
