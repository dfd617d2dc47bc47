//! Employee row → normalised feature vector for the attrition model.
//!
//! Every component lies in `[0, 1]` so the same vectors feed the native
//! network and the browser-side TensorFlow.js model without rescaling.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;

use crate::model::employee::{Employee, EmployeeStatus, EmploymentType, months_between, years_between};

pub const FEATURE_COUNT: usize = 9;

pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "age",
    "tenure",
    "salary",
    "satisfaction",
    "work_life_balance",
    "team_stability",
    "recent_payroll",
    "recent_bonus",
    "full_time",
];

/// A salary record this recent marks the employee as on the current payroll.
pub const RECENT_PAYROLL_DAYS: i64 = 60;
/// A bonus this recent counts as "recently rewarded".
pub const RECENT_BONUS_DAYS: i64 = 365;

const AGE_SCALE: f64 = 65.0;
const DEFAULT_AGE: f64 = 35.0;
const TENURE_SCALE_MONTHS: f64 = 120.0;
const SALARY_SCALE: f64 = 20_000.0;
const OVERTIME_SCALE: f64 = 60.0;
const HEADCOUNT_SCALE: f64 = 25.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FeatureVector(pub [f64; FEATURE_COUNT]);

impl FeatureVector {
    pub fn age(&self) -> f64 {
        self.0[0]
    }
    pub fn tenure(&self) -> f64 {
        self.0[1]
    }
    pub fn salary(&self) -> f64 {
        self.0[2]
    }
    pub fn satisfaction(&self) -> f64 {
        self.0[3]
    }
    pub fn work_life_balance(&self) -> f64 {
        self.0[4]
    }
    pub fn team_stability(&self) -> f64 {
        self.0[5]
    }
    pub fn recent_payroll(&self) -> bool {
        self.0[6] > 0.5
    }
    pub fn recent_bonus(&self) -> bool {
        self.0[7] > 0.5
    }
    pub fn full_time(&self) -> bool {
        self.0[8] > 0.5
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Pairs each component with its name, for profile pages.
    pub fn named(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        FEATURE_NAMES.iter().copied().zip(self.0.iter().copied())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FeatureInput<'a> {
    pub employee: &'a Employee,
    /// Active employees in the same department, the employee included.
    pub department_headcount: u32,
    pub recent_payroll: bool,
    pub recent_bonus: bool,
}

pub fn build_features(input: &FeatureInput<'_>, today: NaiveDate) -> FeatureVector {
    let e = input.employee;

    let age = e
        .date_of_birth
        .map(|dob| years_between(dob, today) as f64)
        .unwrap_or(DEFAULT_AGE);
    let tenure_months = months_between(e.hire_date, today) as f64;
    let satisfaction = e
        .performance_rating
        .map(|r| (r - 1.0) / 4.0)
        .unwrap_or(0.5);
    let work_life_balance = 1.0 - e.overtime_hours / OVERTIME_SCALE;

    FeatureVector([
        unit(age / AGE_SCALE),
        unit(tenure_months / TENURE_SCALE_MONTHS),
        unit(e.salary / SALARY_SCALE),
        unit(satisfaction),
        unit(work_life_balance),
        unit(input.department_headcount as f64 / HEADCOUNT_SCALE),
        flag(input.recent_payroll),
        flag(input.recent_bonus),
        flag(e.employment_type == EmploymentType::FullTime),
    ])
}

/// Active headcount per department.
pub fn headcounts<'a, I>(employees: I) -> HashMap<String, u32>
where
    I: IntoIterator<Item = &'a Employee>,
{
    let mut counts = HashMap::new();
    for e in employees {
        if e.status == EmployeeStatus::Active {
            *counts.entry(e.department.clone()).or_insert(0) += 1;
        }
    }
    counts
}

fn unit(value: f64) -> f64 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}

fn flag(value: bool) -> f64 {
    if value { 1.0 } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::employee::sample_employee;
    use proptest::prelude::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()
    }

    #[test]
    fn sample_employee_features() {
        let employee = sample_employee(1);
        let input = FeatureInput {
            employee: &employee,
            department_headcount: 5,
            recent_payroll: true,
            recent_bonus: false,
        };
        let v = build_features(&input, today());

        assert!((v.age() - 35.0 / 65.0).abs() < 1e-9);
        // 2020-01-01 → 2025-06-15 is 65 whole months
        assert!((v.tenure() - 65.0 / 120.0).abs() < 1e-9);
        assert!((v.salary() - 0.25).abs() < 1e-9);
        assert!((v.satisfaction() - 0.75).abs() < 1e-9);
        assert!((v.work_life_balance() - (1.0 - 10.0 / 60.0)).abs() < 1e-9);
        assert!((v.team_stability() - 0.2).abs() < 1e-9);
        assert!(v.recent_payroll());
        assert!(!v.recent_bonus());
        assert!(v.full_time());
    }

    #[test]
    fn missing_optional_fields_use_neutral_defaults() {
        let mut employee = sample_employee(2);
        employee.date_of_birth = None;
        employee.performance_rating = None;
        employee.employment_type = EmploymentType::Contract;
        let input = FeatureInput {
            employee: &employee,
            department_headcount: 0,
            recent_payroll: false,
            recent_bonus: false,
        };
        let v = build_features(&input, today());
        assert!((v.age() - DEFAULT_AGE / AGE_SCALE).abs() < 1e-9);
        assert_eq!(v.satisfaction(), 0.5);
        assert_eq!(v.team_stability(), 0.0);
        assert!(!v.full_time());
    }

    #[test]
    fn future_hire_date_means_zero_tenure() {
        let mut employee = sample_employee(3);
        employee.hire_date = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let input = FeatureInput {
            employee: &employee,
            department_headcount: 1,
            recent_payroll: false,
            recent_bonus: false,
        };
        assert_eq!(build_features(&input, today()).tenure(), 0.0);
    }

    #[test]
    fn headcounts_only_count_active_staff() {
        let mut a = sample_employee(1);
        let b = sample_employee(2);
        let mut c = sample_employee(3);
        a.status = EmployeeStatus::Resigned;
        c.department = "Sales".to_string();

        let counts = headcounts(&[a, b, c]);
        assert_eq!(counts.get("Engineering"), Some(&1));
        assert_eq!(counts.get("Sales"), Some(&1));
    }

    #[test]
    fn names_line_up_with_components() {
        let employee = sample_employee(1);
        let input = FeatureInput {
            employee: &employee,
            department_headcount: 5,
            recent_payroll: false,
            recent_bonus: true,
        };
        let named: Vec<_> = build_features(&input, today()).named().collect();
        assert_eq!(named.len(), FEATURE_COUNT);
        assert_eq!(named[7], ("recent_bonus", 1.0));
    }

    proptest! {
        #[test]
        fn features_stay_in_unit_interval(
            salary in -1_000.0f64..1_000_000.0,
            rating in proptest::option::of(-3.0f64..9.0),
            overtime in -10.0f64..500.0,
            headcount in 0u32..10_000,
            birth_year in 1900i32..2030,
            hire_year in 1950i32..2030,
            payroll in any::<bool>(),
            bonus in any::<bool>(),
        ) {
            let mut employee = sample_employee(9);
            employee.salary = salary;
            employee.performance_rating = rating;
            employee.overtime_hours = overtime;
            employee.date_of_birth = NaiveDate::from_ymd_opt(birth_year, 3, 1);
            employee.hire_date = NaiveDate::from_ymd_opt(hire_year, 7, 1).unwrap();
            let input = FeatureInput {
                employee: &employee,
                department_headcount: headcount,
                recent_payroll: payroll,
                recent_bonus: bonus,
            };
            let v = build_features(&input, today());
            for x in v.as_slice() {
                prop_assert!((0.0..=1.0).contains(x));
            }
        }
    }
}
