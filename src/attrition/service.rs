use anyhow::Result;
use chrono::{Duration, NaiveDate, Utc};
use moka::future::Cache;
use serde::Serialize;
use sqlx::MySqlPool;
use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tracing::{debug, info};
use utoipa::ToSchema;

use super::features::{
    FEATURE_NAMES, FeatureInput, FeatureVector, RECENT_BONUS_DAYS, RECENT_PAYROLL_DAYS,
    build_features, headcounts,
};
use super::labels::{LabelSource, RISK_THRESHOLD, heuristic_risk, resolve_label};
use super::network::{Network, NetworkError, TrainingConfig, TrainingReport};
use crate::config::Config;
use crate::error::AppError;
use crate::model::employee::{EMPLOYEE_COLUMNS, Employee};
use crate::model::training_data::Outcome;

/// Employee row plus the payroll/bonus recency flags the features need.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AttritionRow {
    #[sqlx(flatten)]
    pub employee: Employee,
    pub recent_payroll: i64,
    pub recent_bonus: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DatasetRow {
    pub employee_id: u64,
    pub name: String,
    pub department: String,
    /// Already resigned or terminated.
    pub has_left: bool,
    #[schema(value_type = Vec<f64>)]
    pub features: FeatureVector,
    pub heuristic_risk: f64,
    pub label: f64,
    #[schema(value_type = String)]
    pub source: LabelSource,
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct Dataset {
    #[schema(value_type = Vec<String>)]
    pub feature_names: Vec<&'static str>,
    pub rows: Vec<DatasetRow>,
}

impl Dataset {
    pub fn build(rows: &[AttritionRow], feedback: &HashMap<u64, Outcome>, today: NaiveDate) -> Self {
        let counts = headcounts(rows.iter().map(|r| &r.employee));

        let rows = rows
            .iter()
            .map(|row| {
                let e = &row.employee;
                let input = FeatureInput {
                    employee: e,
                    department_headcount: counts.get(&e.department).copied().unwrap_or(0),
                    recent_payroll: row.recent_payroll != 0,
                    recent_bonus: row.recent_bonus != 0,
                };
                let features = build_features(&input, today);
                let has_left = e.status.has_left();
                let (label, source) = resolve_label(&features, has_left, feedback.get(&e.id).copied());
                DatasetRow {
                    employee_id: e.id,
                    name: e.full_name(),
                    department: e.department.clone(),
                    has_left,
                    heuristic_risk: heuristic_risk(&features),
                    features,
                    label,
                    source,
                }
            })
            .collect();

        Self {
            feature_names: FEATURE_NAMES.to_vec(),
            rows,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn inputs(&self) -> Vec<Vec<f64>> {
        self.rows.iter().map(|r| r.features.as_slice().to_vec()).collect()
    }

    pub fn labels(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.label).collect()
    }

    pub fn positive_share(&self) -> f64 {
        if self.rows.is_empty() {
            return 0.0;
        }
        self.rows.iter().filter(|r| r.label >= RISK_THRESHOLD).count() as f64 / self.rows.len() as f64
    }

    /// Changes whenever any feature or label changes; keys the prediction cache.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        for row in &self.rows {
            row.employee_id.hash(&mut hasher);
            for x in row.features.as_slice() {
                x.to_bits().hash(&mut hasher);
            }
            row.label.to_bits().hash(&mut hasher);
        }
        hasher.finish()
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Prediction {
    pub employee_id: u64,
    pub name: String,
    pub department: String,
    pub risk: f64,
    pub heuristic_risk: f64,
    pub label: f64,
    #[schema(value_type = String)]
    pub source: LabelSource,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PredictionSet {
    #[schema(value_type = Object)]
    pub report: TrainingReport,
    pub predictions: Vec<Prediction>,
}

impl PredictionSet {
    pub fn risk_for(&self, employee_id: u64) -> Option<f64> {
        self.predictions
            .iter()
            .find(|p| p.employee_id == employee_id)
            .map(|p| p.risk)
    }
}

pub fn training_config(config: &Config) -> TrainingConfig {
    TrainingConfig {
        epochs: config.attrition_epochs,
        learning_rate: config.attrition_learning_rate,
        seed: config.attrition_seed,
        ..TrainingConfig::default()
    }
}

/// Trains on every row and scores current staff, highest risk first.
pub fn train_and_predict(dataset: &Dataset, config: &TrainingConfig) -> Result<PredictionSet, NetworkError> {
    let mut network = Network::attrition(config.seed);
    let report = network.fit(&dataset.inputs(), &dataset.labels(), config)?;

    let mut predictions = Vec::new();
    for row in dataset.rows.iter().filter(|r| !r.has_left) {
        predictions.push(Prediction {
            employee_id: row.employee_id,
            name: row.name.clone(),
            department: row.department.clone(),
            risk: network.predict(row.features.as_slice())?,
            heuristic_risk: row.heuristic_risk,
            label: row.label,
            source: row.source,
        });
    }
    predictions.sort_by(|a, b| b.risk.total_cmp(&a.risk).then(a.employee_id.cmp(&b.employee_id)));

    Ok(PredictionSet { report, predictions })
}

pub async fn load_dataset(pool: &MySqlPool) -> Result<Dataset, sqlx::Error> {
    let today = Utc::now().date_naive();
    let payroll_since = today - Duration::days(RECENT_PAYROLL_DAYS);
    let bonus_since = today - Duration::days(RECENT_BONUS_DAYS);

    let sql = format!(
        r#"
        SELECT {EMPLOYEE_COLUMNS},
            CAST(EXISTS(SELECT 1 FROM salary_records s
                        WHERE s.employee_id = e.id AND s.pay_period >= ?) AS SIGNED) AS recent_payroll,
            CAST(EXISTS(SELECT 1 FROM bonus_records b
                        WHERE b.employee_id = e.id AND b.bonus_date >= ?) AS SIGNED) AS recent_bonus
        FROM employees e
        ORDER BY e.id
        "#
    );
    debug!(sql = %sql, "Loading attrition dataset");

    let rows = sqlx::query_as::<_, AttritionRow>(&sql)
        .bind(payroll_since)
        .bind(bonus_since)
        .fetch_all(pool)
        .await?;

    // oldest first, so the latest verdict per employee wins
    let feedback_rows = sqlx::query_as::<_, (u64, String)>(
        "SELECT employee_id, actual_outcome FROM training_data ORDER BY created_at, id",
    )
    .fetch_all(pool)
    .await?;

    let feedback: HashMap<u64, Outcome> = feedback_rows
        .into_iter()
        .filter_map(|(id, outcome)| outcome.parse::<Outcome>().ok().map(|o| (id, o)))
        .collect();

    Ok(Dataset::build(&rows, &feedback, today))
}

/// Server-side predictions keyed by dataset fingerprint.
#[derive(Clone)]
pub struct PredictionCache {
    inner: Cache<u64, Arc<PredictionSet>>,
}

impl PredictionCache {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(16)
                .time_to_live(std::time::Duration::from_secs(ttl_secs))
                .build(),
        }
    }

    /// Returns cached predictions for `dataset`, training a fresh network on a miss.
    /// Concurrent misses for the same dataset share one training run.
    pub async fn get_or_train(
        &self,
        dataset: Arc<Dataset>,
        config: TrainingConfig,
    ) -> Result<Arc<PredictionSet>, AppError> {
        let key = dataset.fingerprint();
        self.inner
            .try_get_with(key, async move {
                debug!(key, rows = dataset.rows.len(), "Training attrition model");
                let set = actix_web::web::block(move || train_and_predict(&dataset, &config))
                    .await
                    .map_err(|e| e.to_string())?
                    .map_err(|e| e.to_string())?;
                Ok::<_, String>(Arc::new(set))
            })
            .await
            .map_err(|e| AppError::Model(e.to_string()))
    }
}

/// Loads the dataset and returns it with server predictions (`None` when there is nobody to score).
pub async fn predictions(
    pool: &MySqlPool,
    cache: &PredictionCache,
    config: &Config,
) -> Result<(Arc<Dataset>, Option<Arc<PredictionSet>>), AppError> {
    let dataset = Arc::new(load_dataset(pool).await?);
    if dataset.is_empty() {
        return Ok((dataset, None));
    }
    let set = cache.get_or_train(dataset.clone(), training_config(config)).await?;
    Ok((dataset, Some(set)))
}

/// Trains once at startup so the first predictor page load is served from cache.
pub async fn warmup_predictions(pool: &MySqlPool, cache: &PredictionCache, config: &Config) -> Result<()> {
    let (dataset, set) = predictions(pool, cache, config).await?;
    match set {
        Some(set) => log::info!(
            "Attrition model warmup complete: {} rows, accuracy {:.2}",
            dataset.rows.len(),
            set.report.accuracy
        ),
        None => info!("Attrition model warmup skipped: no employees yet"),
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::model::employee::{EmployeeStatus, EmploymentType, sample_employee};

    pub(crate) fn rows() -> Vec<AttritionRow> {
        let mut risky = sample_employee(2);
        risky.performance_rating = Some(1.5);
        risky.overtime_hours = 50.0;
        risky.employment_type = EmploymentType::Contract;
        risky.salary = 1_800.0;

        let mut gone = sample_employee(3);
        gone.status = EmployeeStatus::Resigned;

        vec![
            AttritionRow { employee: sample_employee(1), recent_payroll: 1, recent_bonus: 1 },
            AttritionRow { employee: risky, recent_payroll: 1, recent_bonus: 0 },
            AttritionRow { employee: gone, recent_payroll: 0, recent_bonus: 0 },
        ]
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()
    }

    #[test]
    fn dataset_labels_come_from_the_right_source() {
        let dataset = Dataset::build(&rows(), &HashMap::new(), today());
        let sources: Vec<_> = dataset.rows.iter().map(|r| (r.label, r.source)).collect();
        assert_eq!(
            sources,
            vec![
                (0.0, LabelSource::Heuristic),
                (1.0, LabelSource::Heuristic),
                (1.0, LabelSource::Observed)
            ]
        );
        assert_eq!(dataset.feature_names.len(), 9);
        assert!((dataset.positive_share() - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn feedback_overrides_and_changes_the_fingerprint() {
        let plain = Dataset::build(&rows(), &HashMap::new(), today());
        let feedback = HashMap::from([(2, Outcome::Stayed)]);
        let reviewed = Dataset::build(&rows(), &feedback, today());

        assert_eq!(reviewed.rows[1].source, LabelSource::Feedback);
        assert_eq!(reviewed.rows[1].label, 0.0);
        assert_ne!(plain.fingerprint(), reviewed.fingerprint());
        assert_eq!(plain.fingerprint(), Dataset::build(&rows(), &HashMap::new(), today()).fingerprint());
    }

    #[test]
    fn headcount_ignores_leavers() {
        let dataset = Dataset::build(&rows(), &HashMap::new(), today());
        // two active engineers out of a scale of 25
        assert!((dataset.rows[0].features.team_stability() - 2.0 / 25.0).abs() < 1e-9);
    }

    #[test]
    fn predictions_skip_leavers_and_sort_by_risk() {
        let dataset = Dataset::build(&rows(), &HashMap::new(), today());
        let config = TrainingConfig { epochs: 30, ..TrainingConfig::default() };
        let set = train_and_predict(&dataset, &config).unwrap();

        assert_eq!(set.predictions.len(), 2);
        assert!(set.predictions[0].risk >= set.predictions[1].risk);
        assert!(set.risk_for(3).is_none());
        assert!(set.predictions.iter().all(|p| p.risk > 0.0 && p.risk < 1.0));
    }

    #[test]
    fn empty_dataset_cannot_be_trained() {
        let config = TrainingConfig::default();
        assert_eq!(
            train_and_predict(&Dataset::default(), &config).unwrap_err(),
            NetworkError::EmptyDataset
        );
    }

    #[actix_web::test]
    async fn cache_returns_the_same_set_for_the_same_dataset() {
        let cache = PredictionCache::new(60);
        let dataset = Arc::new(Dataset::build(&rows(), &HashMap::new(), today()));
        let config = TrainingConfig { epochs: 5, ..TrainingConfig::default() };

        let first = cache.get_or_train(dataset.clone(), config).await.unwrap();
        let second = cache.get_or_train(dataset, config).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[actix_web::test]
    async fn concurrent_misses_share_one_training_run() {
        let cache = PredictionCache::new(60);
        let dataset = Arc::new(Dataset::build(&rows(), &HashMap::new(), today()));
        let config = TrainingConfig { epochs: 5, ..TrainingConfig::default() };

        let (a, b) = futures::join!(
            cache.get_or_train(dataset.clone(), config),
            cache.get_or_train(dataset.clone(), config),
        );
        assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
    }

    #[actix_web::test]
    async fn training_failures_are_not_cached() {
        let cache = PredictionCache::new(60);
        let empty = Arc::new(Dataset::default());

        let err = cache.get_or_train(empty.clone(), TrainingConfig::default()).await.unwrap_err();
        assert!(matches!(err, AppError::Model(_)));
        assert!(cache.get_or_train(empty, TrainingConfig::default()).await.is_err());
    }
}
