use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{EnumIter, EnumString, IntoStaticStr};
use utoipa::ToSchema;

use super::string_enum;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumString, IntoStaticStr, EnumIter, Serialize, Deserialize, ToSchema,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    Increment,
    Promotion,
    Demotion,
    Adjustment,
    Transfer,
}

string_enum!(MovementType {
    Increment => "Increment",
    Promotion => "Promotion",
    Demotion => "Demotion",
    Adjustment => "Adjustment",
    Transfer => "Transfer",
});

impl MovementType {
    /// Checks the direction of the change this movement type allows.
    pub fn validate(&self, previous_salary: f64, new_salary: f64) -> Result<(), &'static str> {
        if !(new_salary > 0.0) {
            return Err("new salary must be greater than zero");
        }
        match self {
            MovementType::Increment | MovementType::Promotion if new_salary <= previous_salary => {
                Err("an increment or promotion must raise the salary")
            }
            MovementType::Demotion if new_salary >= previous_salary => {
                Err("a demotion must lower the salary")
            }
            _ => Ok(()),
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumString, IntoStaticStr, EnumIter, Serialize, Deserialize, ToSchema,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MovementStatus {
    Pending,
    Approved,
    Rejected,
}

string_enum!(MovementStatus {
    Pending => "Pending",
    Approved => "Approved",
    Rejected => "Rejected",
});

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct SalaryMovement {
    pub id: u64,
    pub employee_id: u64,
    #[sqlx(try_from = "String")]
    pub movement_type: MovementType,
    pub previous_salary: f64,
    pub new_salary: f64,
    #[schema(value_type = String, format = "date")]
    pub effective_date: NaiveDate,
    pub reason: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: MovementStatus,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub decided_at: Option<DateTime<Utc>>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}

impl SalaryMovement {
    pub fn change(&self) -> f64 {
        self.new_salary - self.previous_salary
    }

    pub fn change_percent(&self) -> Option<f64> {
        change_percent(self.previous_salary, self.new_salary)
    }
}

pub fn change_percent(previous_salary: f64, new_salary: f64) -> Option<f64> {
    if previous_salary == 0.0 {
        None
    } else {
        Some((new_salary - previous_salary) / previous_salary * 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_percent_relative_to_previous() {
        assert_eq!(change_percent(4_000.0, 4_400.0), Some(10.0));
        assert_eq!(change_percent(4_000.0, 3_000.0), Some(-25.0));
        assert_eq!(change_percent(0.0, 3_000.0), None);
    }

    #[test]
    fn direction_rules_per_type() {
        assert!(MovementType::Increment.validate(4_000.0, 4_100.0).is_ok());
        assert!(MovementType::Increment.validate(4_000.0, 4_000.0).is_err());
        assert!(MovementType::Promotion.validate(4_000.0, 3_900.0).is_err());
        assert!(MovementType::Demotion.validate(4_000.0, 3_500.0).is_ok());
        assert!(MovementType::Demotion.validate(4_000.0, 4_500.0).is_err());
        assert!(MovementType::Transfer.validate(4_000.0, 4_000.0).is_ok());
        assert!(MovementType::Adjustment.validate(4_000.0, 0.0).is_err());
        assert!(MovementType::Adjustment.validate(4_000.0, f64::NAN).is_err());
    }
}
