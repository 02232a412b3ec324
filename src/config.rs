use std::path::PathBuf;

use crate::error::Result;
use crate::query::{DEFAULT_CLAIM_TABLE, DEFAULT_SUBJECT_TABLE, Tables};

pub const MEMORY_DATABASE: &str = ":memory:";

/// Where the data lives and how many connections to keep open.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// DuckDB file, or `:memory:`.
    pub database: PathBuf,
    /// Open the file read-only. Ignored for in-memory databases.
    pub read_only: bool,
    pub pool_size: u32,
    pub subject_table: String,
    pub claim_table: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from(MEMORY_DATABASE),
            read_only: false,
            pool_size: 4,
            subject_table: DEFAULT_SUBJECT_TABLE.to_string(),
            claim_table: DEFAULT_CLAIM_TABLE.to_string(),
        }
    }
}

impl DbConfig {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            database: path.into(),
            ..Self::default()
        }
    }

    pub fn is_memory(&self) -> bool {
        self.database.as_os_str() == MEMORY_DATABASE
    }

    /// Validates the configured table names.
    pub fn tables(&self) -> Result<Tables> {
        Ok(Tables {
            subject: self.subject_table.parse()?,
            claim: self.claim_table.parse()?,
        })
    }
}
