use crate::dimension::Dimension;

pub type Result<T> = std::result::Result<T, MetricError>;

/// Everything that can end a metric call. None of these are retried.
#[derive(Debug, thiserror::Error)]
pub enum MetricError {
    #[error("invalid {dimension}: '{value}'")]
    InvalidInput { dimension: Dimension, value: String },

    #[error("unknown metric '{0}'")]
    UnknownMetric(String),

    #[error("metric {metric} takes {expected} input(s), got {found}")]
    Arity {
        metric: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("database connection failed: {0}")]
    Connection(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("query failed: {0}")]
    QueryExecution(#[from] duckdb::Error),

    #[error("metric {metric} declares {expected} field(s) but a row has {found}")]
    ResultShape {
        metric: &'static str,
        expected: usize,
        found: usize,
    },
}

impl MetricError {
    pub fn invalid(dimension: Dimension, value: impl Into<String>) -> Self {
        Self::InvalidInput {
            dimension,
            value: value.into(),
        }
    }

    /// Opening a database is a connection problem, not a query problem.
    pub fn connection(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Connection(Box::new(err))
    }

    /// True when the caller, not the database, is at fault.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput { .. } | Self::UnknownMetric(_) | Self::Arity { .. }
        )
    }
}

impl From<r2d2::Error> for MetricError {
    fn from(err: r2d2::Error) -> Self {
        Self::connection(err)
    }
}
