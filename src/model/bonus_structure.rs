use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{EnumIter, EnumString, IntoStaticStr};

use super::employee::{Employee, EmployeeStatus};
use super::string_enum;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumString, IntoStaticStr, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BonusType {
    Performance,
    Annual,
    Festival,
    Retention,
    Project,
    Referral,
}

string_enum!(BonusType {
    Performance => "Performance",
    Annual => "Annual",
    Festival => "Festival",
    Retention => "Retention",
    Project => "Project",
    Referral => "Referral",
});

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumString, IntoStaticStr, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CalculationMethod {
    Fixed,
    Percentage,
}

string_enum!(CalculationMethod {
    Fixed => "Fixed amount",
    Percentage => "% of monthly salary",
});

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct BonusStructure {
    pub id: u64,
    pub name: String,
    #[sqlx(try_from = "String")]
    pub bonus_type: BonusType,
    #[sqlx(try_from = "String")]
    pub calculation_method: CalculationMethod,
    pub value: f64,
    pub min_performance_rating: Option<f64>,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl BonusStructure {
    /// Bonus this structure pays `employee`, or `None` when they are not eligible.
    pub fn compute_for(&self, employee: &Employee) -> Option<f64> {
        if !self.is_active || employee.status != EmployeeStatus::Active {
            return None;
        }
        if let Some(min) = self.min_performance_rating {
            match employee.performance_rating {
                Some(rating) if rating >= min => {}
                _ => return None,
            }
        }

        let amount = match self.calculation_method {
            CalculationMethod::Fixed => self.value,
            CalculationMethod::Percentage => employee.salary * self.value / 100.0,
        };
        Some((amount * 100.0).round() / 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::employee::sample_employee;

    fn structure(method: CalculationMethod, value: f64, min: Option<f64>) -> BonusStructure {
        BonusStructure {
            id: 1,
            name: "Q4 performance".to_string(),
            bonus_type: BonusType::Performance,
            calculation_method: method,
            value,
            min_performance_rating: min,
            description: None,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn fixed_and_percentage_amounts() {
        let employee = sample_employee(1);
        assert_eq!(structure(CalculationMethod::Fixed, 750.0, None).compute_for(&employee), Some(750.0));
        assert_eq!(
            structure(CalculationMethod::Percentage, 12.5, None).compute_for(&employee),
            Some(625.0)
        );
    }

    #[test]
    fn minimum_rating_gates_eligibility() {
        let mut employee = sample_employee(1);
        let s = structure(CalculationMethod::Fixed, 100.0, Some(4.5));
        assert_eq!(s.compute_for(&employee), None);

        employee.performance_rating = Some(4.5);
        assert_eq!(s.compute_for(&employee), Some(100.0));

        employee.performance_rating = None;
        assert_eq!(s.compute_for(&employee), None);
    }

    #[test]
    fn inactive_structures_and_employees_pay_nothing() {
        let mut employee = sample_employee(1);
        let mut s = structure(CalculationMethod::Fixed, 100.0, None);
        s.is_active = false;
        assert_eq!(s.compute_for(&employee), None);

        s.is_active = true;
        employee.status = EmployeeStatus::Resigned;
        assert_eq!(s.compute_for(&employee), None);
    }
}
