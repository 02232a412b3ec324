use crate::dimension::{Disease, TableName};

/// Subject and claim tables the metrics read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tables {
    pub subject: TableName,
    pub claim: TableName,
}

pub const DEFAULT_SUBJECT_TABLE: &str = "cmspop";
pub const DEFAULT_CLAIM_TABLE: &str = "cmsclaims";

impl Default for Tables {
    fn default() -> Self {
        Self {
            subject: TableName::from_static(DEFAULT_SUBJECT_TABLE),
            claim: TableName::from_static(DEFAULT_CLAIM_TABLE),
        }
    }
}

impl Tables {
    /// `FROM <subject> AS s LEFT JOIN <claim> AS c ON s.id = c.id`
    pub fn subject_with_claims(&self) -> String {
        format!(
            "{} AS s LEFT JOIN {} AS c ON s.id = c.id",
            self.subject.quoted(),
            self.claim.quoted()
        )
    }

    /// Claims on the left, so subjects without claims drop out.
    pub fn claims_with_subject(&self) -> String {
        format!(
            "{} AS c LEFT JOIN {} AS s ON s.id = c.id",
            self.claim.quoted(),
            self.subject.quoted()
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub sql: String,
    pub params: Vec<String>,
}

impl Query {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Binds the next `?` placeholder.
    pub fn bind(mut self, value: impl Into<String>) -> Self {
        self.params.push(value.into());
        self
    }

    pub fn placeholder_count(&self) -> usize {
        self.sql.matches('?').count()
    }
}

/// Whole years between birth and death, no calendar correction.
pub const AGE_AT_DEATH: &str = "date_diff('day', s.dob, s.dod) // 365";

/// Flag column on the subject alias `s`.
pub fn flag(disease: Disease) -> String {
    format!("s.{}", disease.as_str())
}

/// Exactly `only` is set, or no flag at all when `only` is `None`.
/// Columns are unqualified so the predicate works inside a FILTER clause
/// over a derived table.
pub fn cohort_predicate(only: Option<Disease>) -> String {
    Disease::ALL
        .iter()
        .map(|d| {
            if Some(*d) == only {
                d.as_str().to_string()
            } else {
                format!("NOT {}", d.as_str())
            }
        })
        .collect::<Vec<_>>()
        .join(" AND ")
}

/// Median of `column` over the relation `from`: rows numbered by value,
/// averaging those numbered within `[n/2, n/2 + 1]`. Nulls are left out of
/// both the numbering and `n`.
pub fn median_of(column: &str, from: &str) -> String {
    format!(
        "(SELECT AVG({column}) FROM (\
         SELECT {column}, row_number() OVER (ORDER BY {column}) AS rn, COUNT(*) OVER () AS n \
         FROM {from} WHERE {column} IS NOT NULL) \
         WHERE rn BETWEEN n / 2.0 AND n / 2.0 + 1)"
    )
}

/// Population standard deviation of `column`, given a relation `means`
/// holding its mean under the same name. Must appear in an aggregate
/// context over the rows carrying `column`.
pub fn population_sd(column: &str, rel: &str, means: &str) -> String {
    format!(
        "SQRT(SUM(POWER({rel}.{column} - {means}.{column}, 2)) / COUNT({rel}.{column}))"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_tables_use_historical_names() {
        let t = Tables::default();
        assert_eq!(
            t.subject_with_claims(),
            "\"cmspop\" AS s LEFT JOIN \"cmsclaims\" AS c ON s.id = c.id"
        );
    }

    #[test]
    fn bind_tracks_placeholders() {
        let q = Query::new("SELECT 1 WHERE a = ? AND b = ?").bind("x").bind("y");
        assert_eq!(q.params, vec!["x", "y"]);
        assert_eq!(q.placeholder_count(), 2);
    }

    #[test]
    fn healthy_cohort_excludes_every_flag() {
        assert_eq!(
            cohort_predicate(None),
            "NOT heart_fail AND NOT alz_rel_sen AND NOT depression AND NOT cancer"
        );
    }

    #[test]
    fn single_disease_cohort_excludes_the_rest() {
        assert_eq!(
            cohort_predicate(Some(Disease::Cancer)),
            "NOT heart_fail AND NOT alz_rel_sen AND NOT depression AND cancer"
        );
    }

    #[test]
    fn median_window_bounds() {
        let sql = median_of("age", "cohort");
        assert!(sql.contains("row_number() OVER (ORDER BY age)"));
        assert!(sql.contains("rn BETWEEN n / 2.0 AND n / 2.0 + 1"));
        assert!(sql.contains("WHERE age IS NOT NULL"));
    }
}
