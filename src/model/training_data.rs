use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{EnumIter, EnumString, IntoStaticStr};

use super::string_enum;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumString, IntoStaticStr, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Stayed,
    Left,
}

string_enum!(Outcome {
    Stayed => "Stayed",
    Left => "Left",
});

impl Outcome {
    pub fn as_label(&self) -> f64 {
        match self {
            Outcome::Stayed => 0.0,
            Outcome::Left => 1.0,
        }
    }
}

/// A reviewer's verdict on a prediction, used as ground truth on later training runs.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TrainingFeedback {
    pub id: u64,
    pub employee_id: u64,
    pub predicted_risk: f64,
    #[sqlx(try_from = "String")]
    pub actual_outcome: Outcome,
    /// JSON array snapshot of the feature vector at feedback time.
    pub features: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}
