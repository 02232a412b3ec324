use std::time::{Duration, Instant};

use duckdb::{AccessMode, DuckdbConnectionManager};
use r2d2::{Pool, PooledConnection};

use crate::catalog::{self, MetricDef};
use crate::config::DbConfig;
use crate::error::{MetricError, Result};
use crate::executor;
use crate::query::Tables;
use crate::shape::{self, MetricResult};

pub type DbPool = Pool<DuckdbConnectionManager>;

const CONNECTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Runs catalog metrics against a pooled DuckDB database.
///
/// Cloning is cheap; clones share the pool.
#[derive(Clone)]
pub struct MetricService {
    pool: DbPool,
    tables: Tables,
}

impl MetricService {
    pub fn open(cfg: &DbConfig) -> Result<Self> {
        let tables = cfg.tables()?;
        let manager = if cfg.is_memory() {
            DuckdbConnectionManager::memory()
        } else if cfg.read_only {
            let flags = duckdb::Config::default()
                .access_mode(AccessMode::ReadOnly)
                .map_err(MetricError::connection)?;
            DuckdbConnectionManager::file_with_flags(&cfg.database, flags)
        } else {
            DuckdbConnectionManager::file(&cfg.database)
        }
        .map_err(MetricError::connection)?;

        let pool = Pool::builder()
            .max_size(cfg.pool_size.max(1))
            .connection_timeout(CONNECTION_TIMEOUT)
            .build(manager)?;

        tracing::info!(
            "Opened {} (read_only={} pool_size={} subject={} claim={})",
            cfg.database.display(),
            cfg.read_only,
            cfg.pool_size.max(1),
            tables.subject,
            tables.claim
        );
        Ok(Self { pool, tables })
    }

    /// A pooled connection, returned to the pool on drop.
    pub fn connection(&self) -> Result<PooledConnection<DuckdbConnectionManager>> {
        Ok(self.pool.get()?)
    }

    /// Runs the catalog metric `name` with raw, unvalidated inputs.
    pub fn run(&self, name: &str, args: &[&str]) -> Result<MetricResult> {
        self.run_def(catalog::lookup(name)?, args)
    }

    pub fn run_def(&self, def: &'static MetricDef, args: &[&str]) -> Result<MetricResult> {
        // Nothing below this line sees a value that failed validation.
        let inputs = def.validate(args)?;
        let query = def.build(&inputs, &self.tables)?;
        let fields = def.fields(&inputs);
        tracing::debug!("{} sql: {} params: {:?}", def.name, query.sql.trim(), query.params);

        let t0 = Instant::now();
        let rows = {
            let conn = self.connection()?;
            executor::execute(&conn, &query)?
        };
        tracing::info!(
            "{} returned {} rows in {:.1}ms",
            def.name,
            rows.len(),
            t0.elapsed().as_secs_f64() * 1000.0
        );

        shape::shape(def.name, def.result_key(&inputs), &fields, rows)
    }

    pub fn disease_count_by_race(&self, disease: &str) -> Result<MetricResult> {
        self.run("disease_count_by_race", &[disease])
    }

    pub fn max_carrier_bene_ratio(&self, disease: &str, state: &str) -> Result<MetricResult> {
        self.run("max_carrier_bene_ratio", &[disease, state])
    }

    pub fn carrier_reimb_state_avgs(&self, state: &str) -> Result<MetricResult> {
        self.run("carrier_reimb_state_avgs", &[state])
    }

    pub fn avg_death_age_concurrent_disease(
        &self,
        disease1: &str,
        disease2: &str,
    ) -> Result<MetricResult> {
        self.run("avg_death_age_concurrent_disease", &[disease1, disease2])
    }

    pub fn high_low_carrier_reimb_by_race(&self, race: &str) -> Result<MetricResult> {
        self.run("high_low_carrier_reimb_by_race", &[race])
    }

    pub fn max_total_cost_state_status(&self, state: &str, status: &str) -> Result<MetricResult> {
        self.run("max_total_cost_state_status", &[state, status])
    }

    pub fn hmo_mo_gt_avg(&self, state: &str, disease: &str) -> Result<MetricResult> {
        self.run("hmo_mo_gt_avg", &[state, disease])
    }

    pub fn life_expectancy_by_state_sex(&self, state: &str) -> Result<MetricResult> {
        self.run("life_expectancy_by_state_sex", &[state])
    }

    pub fn claims_deviations_by_state(&self, state: &str) -> Result<MetricResult> {
        self.run("claims_deviations_by_state", &[state])
    }

    pub fn stat_by_sex(&self, stat: &str, sex: &str) -> Result<MetricResult> {
        self.run("stat_by_sex", &[stat, sex])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dimension::Dimension;

    /// In-memory service whose tables do not exist: any query that reaches
    /// the database fails with a query error.
    fn empty_service() -> MetricService {
        MetricService::open(&DbConfig::in_memory()).unwrap()
    }

    #[test]
    fn invalid_disease_never_reaches_the_database() {
        let svc = empty_service();
        for bad in ["diabetes", "flu", "", "cancer' OR 1=1 --x"] {
            match svc.disease_count_by_race(bad) {
                Err(MetricError::InvalidInput { dimension, .. }) => {
                    assert_eq!(dimension, Dimension::Disease)
                }
                other => panic!("{bad}: expected InvalidInput, got {other:?}"),
            }
        }
    }

    #[test]
    fn valid_input_does_reach_the_database() {
        let svc = empty_service();
        let err = svc.disease_count_by_race("cancer").unwrap_err();
        assert!(matches!(err, MetricError::QueryExecution(_)));
    }

    #[test]
    fn every_state_scoped_metric_rejects_unknown_states() {
        let svc = empty_service();
        let calls: [fn(&MetricService, &str) -> Result<MetricResult>; 6] = [
            |s, st| s.max_carrier_bene_ratio("cancer", st),
            |s, st| s.carrier_reimb_state_avgs(st),
            |s, st| s.max_total_cost_state_status(st, "alive"),
            |s, st| s.hmo_mo_gt_avg(st, "cancer"),
            |s, st| s.life_expectancy_by_state_sex(st),
            |s, st| s.claims_deviations_by_state(st),
        ];
        for call in calls {
            for bad in ["XX", "PR", "Washington", ""] {
                match call(&svc, bad) {
                    Err(MetricError::InvalidInput { dimension, value }) => {
                        assert_eq!(dimension, Dimension::State);
                        assert_eq!(value, bad);
                    }
                    other => panic!("{bad}: expected InvalidInput, got {other:?}"),
                }
            }
        }
    }

    #[test]
    fn unknown_metric_and_arity_are_client_errors() {
        let svc = empty_service();
        let err = svc.run("nope", &[]).unwrap_err();
        assert!(err.is_client_error());
        let err = svc.run("stat_by_sex", &["mean"]).unwrap_err();
        assert!(matches!(err, MetricError::Arity { .. }));
        assert!(err.is_client_error());
    }

    #[test]
    fn bad_table_config_fails_before_opening() {
        let cfg = DbConfig {
            subject_table: "pop where 1=1".into(),
            ..DbConfig::in_memory()
        };
        assert!(matches!(
            MetricService::open(&cfg),
            Err(MetricError::InvalidInput { .. })
        ));
    }

    #[test]
    fn missing_read_only_file_is_a_connection_error() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = DbConfig {
            read_only: true,
            ..DbConfig::file(dir.path().join("absent.duckdb"))
        };
        assert!(matches!(
            MetricService::open(&cfg),
            Err(MetricError::Connection(_))
        ));
    }
}
