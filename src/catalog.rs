use serde::Serialize;

use crate::dimension::{Dimension, Disease, Race, Sex, State, Statistic, Status};
use crate::error::{MetricError, Result};
use crate::query::{
    AGE_AT_DEATH, Query, Tables, cohort_predicate, flag, median_of, population_sd,
};

/// Validated inputs for one metric call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Inputs {
    diseases: Vec<Disease>,
    state: Option<State>,
    sex: Option<Sex>,
    race: Option<Race>,
    statistic: Option<Statistic>,
    status: Option<Status>,
}

impl Inputs {
    /// Parses `raw[i]` as `dims[i]`. Stops at the first rejected value.
    pub fn parse(dims: &[Dimension], raw: &[&str]) -> Result<Self> {
        let mut inputs = Inputs::default();
        for (dim, value) in dims.iter().zip(raw) {
            match dim {
                Dimension::Disease => inputs.diseases.push(value.parse()?),
                Dimension::State => inputs.state = Some(value.parse()?),
                Dimension::Sex => inputs.sex = Some(value.parse()?),
                Dimension::Race => inputs.race = Some(value.parse()?),
                Dimension::Statistic => inputs.statistic = Some(value.parse()?),
                Dimension::Status => inputs.status = Some(value.parse()?),
                // Tables come from configuration, never from a request.
                Dimension::Table => return Err(MetricError::invalid(*dim, *value)),
            }
        }
        Ok(inputs)
    }

    fn missing(dim: Dimension) -> MetricError {
        MetricError::invalid(dim, "")
    }

    pub fn disease(&self, nth: usize) -> Result<Disease> {
        self.diseases
            .get(nth)
            .copied()
            .ok_or_else(|| Self::missing(Dimension::Disease))
    }

    pub fn state(&self) -> Result<State> {
        self.state.ok_or_else(|| Self::missing(Dimension::State))
    }

    pub fn sex(&self) -> Result<Sex> {
        self.sex.ok_or_else(|| Self::missing(Dimension::Sex))
    }

    pub fn race(&self) -> Result<Race> {
        self.race.ok_or_else(|| Self::missing(Dimension::Race))
    }

    pub fn statistic(&self) -> Result<Statistic> {
        self.statistic
            .ok_or_else(|| Self::missing(Dimension::Statistic))
    }

    pub fn status(&self) -> Result<Status> {
        self.status.ok_or_else(|| Self::missing(Dimension::Status))
    }

    fn render(&self, template: &str) -> String {
        let mut out = template.to_string();
        if let Some(d) = self.diseases.first() {
            out = out.replace("{disease}", d.as_str());
        }
        if let Some(s) = self.statistic {
            out = out.replace("{stat}", s.as_str());
        }
        out
    }
}

type Builder = fn(&Inputs, &Tables) -> Result<Query>;

#[derive(Serialize)]
pub struct MetricDef {
    pub name: &'static str,
    /// axum route; path segments are the inputs in order.
    pub route: &'static str,
    pub summary: &'static str,
    pub result_key: &'static str,
    pub inputs: &'static [Dimension],
    pub fields: &'static [&'static str],
    #[serde(skip)]
    build: Builder,
}

impl std::fmt::Debug for MetricDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricDef").field("name", &self.name).finish()
    }
}

impl MetricDef {
    /// Arity check plus allow-list validation. Never touches the database.
    pub fn validate(&self, raw: &[&str]) -> Result<Inputs> {
        if raw.len() != self.inputs.len() {
            return Err(MetricError::Arity {
                metric: self.name,
                expected: self.inputs.len(),
                found: raw.len(),
            });
        }
        Inputs::parse(self.inputs, raw)
    }

    pub fn build(&self, inputs: &Inputs, tables: &Tables) -> Result<Query> {
        (self.build)(inputs, tables)
    }

    pub fn result_key(&self, inputs: &Inputs) -> String {
        inputs.render(self.result_key)
    }

    pub fn fields(&self, inputs: &Inputs) -> Vec<String> {
        self.fields.iter().map(|f| inputs.render(f)).collect()
    }
}

pub fn lookup(name: &str) -> Result<&'static MetricDef> {
    CATALOG
        .iter()
        .find(|m| m.name == name)
        .ok_or_else(|| MetricError::UnknownMetric(name.to_string()))
}

/// `result_key` and `fields` may contain `{disease}` (first disease input)
/// and `{stat}`, filled in from the validated inputs.
pub static CATALOG: &[MetricDef] = &[
    MetricDef {
        name: "disease_count_by_race",
        route: "/api/v1/freq/:disease",
        summary: "Number of subjects with the disease, per race",
        result_key: "{disease}_count",
        inputs: &[Dimension::Disease],
        fields: &["race", "count"],
        build: disease_count_by_race,
    },
    MetricDef {
        name: "max_carrier_bene_ratio",
        route: "/api/v1/max_carrier_bene/:disease/:state",
        summary: "Subjects with the highest carrier_reimb / bene_resp ratio for a disease in a state",
        result_key: "Max_Carrier_Resp/Bene_Resp",
        inputs: &[Dimension::Disease, Dimension::State],
        fields: &["id", "sex", "state", "carrier_bene_ratio"],
        build: max_carrier_bene_ratio,
    },
    MetricDef {
        name: "carrier_reimb_state_avgs",
        route: "/api/v1/carrier_reimb_avg/:state",
        summary: "State means of carrier reimbursement, beneficiary responsibility and HMO months",
        result_key: "State_Averages",
        inputs: &[Dimension::State],
        fields: &["state", "avg_carrier_reimb", "avg_bene_resp", "avg_hmo_mo"],
        build: carrier_reimb_state_avgs,
    },
    MetricDef {
        name: "avg_death_age_concurrent_disease",
        route: "/api/v1/avg_age_of_death/:disease1/:disease2",
        summary: "Mean age at death per sex for subjects with both diseases",
        result_key: "Average_age_of_death",
        inputs: &[Dimension::Disease, Dimension::Disease],
        fields: &["sex", "avg_age_of_death"],
        build: avg_death_age_concurrent_disease,
    },
    MetricDef {
        name: "high_low_carrier_reimb_by_race",
        route: "/api/v1/max_min_carrier_reimb/:race",
        summary: "States with the lowest and highest total carrier reimbursement for a race",
        result_key: "Total_Carrier_Reimbursements",
        inputs: &[Dimension::Race],
        fields: &["state", "race", "total_carrier_reimb"],
        build: high_low_carrier_reimb_by_race,
    },
    MetricDef {
        name: "max_total_cost_state_status",
        route: "/api/v1/total_cost/:state/:status",
        summary: "Subjects with the highest carrier_reimb + bene_resp in a state, alive or dead",
        result_key: "Max_Total_Cost",
        inputs: &[Dimension::State, Dimension::Status],
        fields: &["id", "state", "status", "total_cost"],
        build: max_total_cost_state_status,
    },
    MetricDef {
        name: "hmo_mo_gt_avg",
        route: "/api/v1/gt_hmo_avg/:state/:disease",
        summary: "Subjects whose HMO months exceed the mean for a disease in a state",
        result_key: "Greater_Than_Average_HMO_MO",
        inputs: &[Dimension::State, Dimension::Disease],
        fields: &["id", "state", "{disease}", "hmo_mo"],
        build: hmo_mo_gt_avg,
    },
    MetricDef {
        name: "life_expectancy_by_state_sex",
        route: "/api/v1/avg_life_expectancy/:state",
        summary: "Mean age at death per sex: healthy subjects against each single-disease cohort",
        result_key: "Life_Expectancies",
        inputs: &[Dimension::State],
        fields: &[
            "state",
            "sex",
            "avg_healthy_life_expectancy",
            "avg_heart_fail_life_expectancy",
            "avg_alz_rel_sen_life_expectancy",
            "avg_depression_life_expectancy",
            "avg_cancer_life_expectancy",
        ],
        build: life_expectancy_by_state_sex,
    },
    MetricDef {
        name: "claims_deviations_by_state",
        route: "/api/v1/deviations/:state",
        summary: "Per-subject deviation of each claims column from the state mean",
        result_key: "deviations",
        inputs: &[Dimension::State],
        fields: &[
            "id",
            "state",
            "carrier_reimb_deviation",
            "bene_resp_deviation",
            "hmo_mo_deviation",
        ],
        build: claims_deviations_by_state,
    },
    MetricDef {
        name: "stat_by_sex",
        route: "/api/v1/stats/:stat/:sex",
        summary: "Mean, median or standard deviation of age at death and claims columns for a sex",
        result_key: "statistic",
        inputs: &[Dimension::Statistic, Dimension::Sex],
        fields: &[
            "sex",
            "{stat}_age",
            "{stat}_carrier_reimb",
            "{stat}_bene_resp",
            "{stat}_hmo_mo",
        ],
        build: stat_by_sex,
    },
];

fn disease_count_by_race(inputs: &Inputs, tables: &Tables) -> Result<Query> {
    let disease = flag(inputs.disease(0)?);
    let subject = tables.subject.quoted();
    Ok(Query::new(format!(
        r#"
        SELECT s.race, COUNT(*) AS count
        FROM {subject} AS s
        WHERE {disease}
        GROUP BY s.race
        ORDER BY s.race
    "#
    )))
}

fn max_carrier_bene_ratio(inputs: &Inputs, tables: &Tables) -> Result<Query> {
    let disease = flag(inputs.disease(0)?);
    let state = inputs.state()?;
    let joined = tables.subject_with_claims();
    let sql = format!(
        r#"
        WITH ratios AS (
          SELECT s.id, s.sex, s.state,
                 CAST(c.carrier_reimb AS DOUBLE) / CAST(c.bene_resp AS DOUBLE) AS ratio
          FROM {joined}
          WHERE c.bene_resp > 0 AND {disease} AND s.state = ?
        )
        SELECT DISTINCT id, sex, state, ROUND(ratio, 2) AS carrier_bene_ratio
        FROM ratios
        WHERE ratio = (SELECT MAX(ratio) FROM ratios)
        ORDER BY id
    "#
    );
    Ok(Query::new(sql).bind(state.code()))
}

fn carrier_reimb_state_avgs(inputs: &Inputs, tables: &Tables) -> Result<Query> {
    let state = inputs.state()?;
    let joined = tables.subject_with_claims();
    let sql = format!(
        r#"
        SELECT s.state,
               CAST(ROUND(AVG(c.carrier_reimb), 2) AS DOUBLE) AS avg_carrier_reimb,
               CAST(ROUND(AVG(c.bene_resp), 2) AS DOUBLE) AS avg_bene_resp,
               CAST(ROUND(AVG(c.hmo_mo), 2) AS DOUBLE) AS avg_hmo_mo
        FROM {joined}
        WHERE s.state = ?
        GROUP BY s.state
    "#
    );
    Ok(Query::new(sql).bind(state.code()))
}

fn avg_death_age_concurrent_disease(inputs: &Inputs, tables: &Tables) -> Result<Query> {
    let first = flag(inputs.disease(0)?);
    let second = flag(inputs.disease(1)?);
    let subject = tables.subject.quoted();
    Ok(Query::new(format!(
        r#"
        SELECT s.sex, CAST(FLOOR(AVG({AGE_AT_DEATH})) AS BIGINT) AS avg_age_of_death
        FROM {subject} AS s
        WHERE s.dod IS NOT NULL AND {first} AND {second}
        GROUP BY s.sex
        ORDER BY s.sex
    "#
    )))
}

fn high_low_carrier_reimb_by_race(inputs: &Inputs, tables: &Tables) -> Result<Query> {
    let race = inputs.race()?;
    let joined = tables.claims_with_subject();
    let sql = format!(
        r#"
        WITH totals AS (
          SELECT s.state, s.race, CAST(SUM(c.carrier_reimb) AS DOUBLE) AS total
          FROM {joined}
          WHERE s.race = ?
          GROUP BY s.state, s.race
        )
        SELECT state, race, ROUND(total, 2) AS total_carrier_reimb
        FROM totals
        WHERE total = (SELECT MIN(total) FROM totals)
           OR total = (SELECT MAX(total) FROM totals)
        ORDER BY total, state
    "#
    );
    Ok(Query::new(sql).bind(race.as_str()))
}

fn max_total_cost_state_status(inputs: &Inputs, tables: &Tables) -> Result<Query> {
    let state = inputs.state()?;
    let status = inputs.status()?.predicate();
    let joined = tables.subject_with_claims();
    let sql = format!(
        r#"
        WITH costs AS (
          SELECT s.id, s.state,
                 CASE WHEN s.dod IS NULL THEN 'alive' ELSE 'dead' END AS status,
                 CAST(c.carrier_reimb + c.bene_resp AS DOUBLE) AS total_cost
          FROM {joined}
          WHERE s.state = ? AND {status}
        )
        SELECT id, state, status, ROUND(total_cost, 2) AS total_cost
        FROM costs
        WHERE total_cost = (SELECT MAX(total_cost) FROM costs)
        ORDER BY id
    "#
    );
    Ok(Query::new(sql).bind(state.code()))
}

fn hmo_mo_gt_avg(inputs: &Inputs, tables: &Tables) -> Result<Query> {
    let state = inputs.state()?;
    let disease = flag(inputs.disease(0)?);
    let joined = tables.subject_with_claims();
    let sql = format!(
        r#"
        WITH cohort AS (
          SELECT s.id, s.state, {disease} AS has_disease, c.hmo_mo
          FROM {joined}
          WHERE s.state = ? AND {disease}
        )
        SELECT id, state, has_disease, hmo_mo
        FROM cohort
        WHERE hmo_mo > (SELECT AVG(hmo_mo) FROM cohort)
        ORDER BY hmo_mo DESC, id
    "#
    );
    Ok(Query::new(sql).bind(state.code()))
}

fn life_expectancy_by_state_sex(inputs: &Inputs, tables: &Tables) -> Result<Query> {
    let state = inputs.state()?;
    let subject = tables.subject.quoted();
    let flags = Disease::ALL
        .iter()
        .map(|d| flag(*d))
        .collect::<Vec<_>>()
        .join(", ");

    let mut cohorts = vec![format!(
        "CAST(FLOOR(AVG(age) FILTER (WHERE {})) AS BIGINT) AS avg_healthy_life_expectancy",
        cohort_predicate(None)
    )];
    for d in Disease::ALL {
        cohorts.push(format!(
            "CAST(FLOOR(AVG(age) FILTER (WHERE {})) AS BIGINT) AS avg_{}_life_expectancy",
            cohort_predicate(Some(d)),
            d.as_str()
        ));
    }
    let cohorts = cohorts.join(",\n               ");

    let sql = format!(
        r#"
        WITH deceased AS (
          SELECT s.state, s.sex, {AGE_AT_DEATH} AS age, {flags}
          FROM {subject} AS s
          WHERE s.dod IS NOT NULL AND s.state = ?
        )
        SELECT state, sex,
               {cohorts}
        FROM deceased
        GROUP BY state, sex
        ORDER BY sex
    "#
    );
    Ok(Query::new(sql).bind(state.code()))
}

fn claims_deviations_by_state(inputs: &Inputs, tables: &Tables) -> Result<Query> {
    let state = inputs.state()?;
    let joined = tables.subject_with_claims();
    let sql = format!(
        r#"
        WITH cohort AS (
          SELECT s.id, s.state, c.carrier_reimb, c.bene_resp, c.hmo_mo
          FROM {joined}
          WHERE s.state = ?
        ),
        means AS (
          SELECT AVG(carrier_reimb) AS carrier_reimb,
                 AVG(bene_resp) AS bene_resp,
                 AVG(hmo_mo) AS hmo_mo
          FROM cohort
        )
        SELECT k.id, k.state,
               CAST(ROUND(k.carrier_reimb - m.carrier_reimb, 2) AS DOUBLE) AS carrier_reimb_deviation,
               CAST(ROUND(k.bene_resp - m.bene_resp, 2) AS DOUBLE) AS bene_resp_deviation,
               CAST(ROUND(k.hmo_mo - m.hmo_mo, 2) AS DOUBLE) AS hmo_mo_deviation
        FROM cohort AS k CROSS JOIN means AS m
        ORDER BY carrier_reimb_deviation, k.id
    "#
    );
    Ok(Query::new(sql).bind(state.code()))
}

const CLAIM_COLUMNS: [&str; 3] = ["carrier_reimb", "bene_resp", "hmo_mo"];

fn stat_by_sex(inputs: &Inputs, tables: &Tables) -> Result<Query> {
    let stat = inputs.statistic()?;
    let sex = inputs.sex()?;
    let joined = tables.subject_with_claims();
    let cohort = format!(
        r#"
        WITH cohort AS (
          SELECT s.sex, {AGE_AT_DEATH} AS age, c.carrier_reimb, c.bene_resp, c.hmo_mo
          FROM {joined}
          WHERE s.sex = ? AND s.dod IS NOT NULL
        )"#
    );

    let sql = match stat {
        Statistic::Mean => {
            let money = CLAIM_COLUMNS
                .iter()
                .map(|col| format!("CAST(ROUND(AVG({col}), 2) AS DOUBLE)"))
                .collect::<Vec<_>>()
                .join(", ");
            format!(
                r#"{cohort}
        SELECT sex, CAST(FLOOR(AVG(age)) AS DOUBLE), {money}
        FROM cohort
        GROUP BY sex
    "#
            )
        }
        Statistic::Median => {
            let age = median_of("age", "cohort");
            let money = CLAIM_COLUMNS
                .iter()
                .map(|col| format!("CAST(ROUND({}, 2) AS DOUBLE)", median_of(col, "cohort")))
                .collect::<Vec<_>>()
                .join(",\n               ");
            format!(
                r#"{cohort}
        SELECT g.sex,
               CAST(FLOOR({age}) AS DOUBLE),
               {money}
        FROM (SELECT DISTINCT sex FROM cohort) AS g
    "#
            )
        }
        Statistic::Sd => {
            let columns = std::iter::once("age")
                .chain(CLAIM_COLUMNS)
                .map(|col| {
                    format!(
                        "CAST(ROUND({}, 2) AS DOUBLE)",
                        population_sd(col, "k", "m")
                    )
                })
                .collect::<Vec<_>>()
                .join(",\n               ");
            format!(
                r#"{cohort},
        means AS (
          SELECT AVG(age) AS age,
                 AVG(carrier_reimb) AS carrier_reimb,
                 AVG(bene_resp) AS bene_resp,
                 AVG(hmo_mo) AS hmo_mo
          FROM cohort
        )
        SELECT k.sex,
               {columns}
        FROM cohort AS k CROSS JOIN means AS m
        GROUP BY k.sex
    "#
            )
        }
    };
    Ok(Query::new(sql).bind(sex.as_str()))
}
