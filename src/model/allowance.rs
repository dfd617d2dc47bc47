use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use strum::{EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

use super::string_enum;

/// Department value that makes a rule apply company-wide.
pub const ALL_DEPARTMENTS: &str = "All";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, EnumString, IntoStaticStr, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AllowanceType {
    Housing,
    Transport,
    Meal,
    Medical,
    Communication,
    Other,
}

string_enum!(AllowanceType {
    Housing => "Housing",
    Transport => "Transport",
    Meal => "Meal",
    Medical => "Medical",
    Communication => "Communication",
    Other => "Other",
});

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumString, IntoStaticStr, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Monthly,
    Quarterly,
    Annual,
    OneTime,
}

string_enum!(Frequency {
    Monthly => "Monthly",
    Quarterly => "Quarterly",
    Annual => "Annual",
    OneTime => "One-time",
});

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Allowance {
    pub id: u64,
    pub grade: String,
    pub department: String,
    #[sqlx(try_from = "String")]
    pub allowance_type: AllowanceType,
    pub amount: f64,
    #[sqlx(try_from = "String")]
    pub frequency: Frequency,
    pub effective_date: NaiveDate,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Allowance {
    /// Amount spread over a month; one-time payments do not recur.
    pub fn monthly_equivalent(&self) -> f64 {
        match self.frequency {
            Frequency::Monthly => self.amount,
            Frequency::Quarterly => self.amount / 3.0,
            Frequency::Annual => self.amount / 12.0,
            Frequency::OneTime => 0.0,
        }
    }

    pub fn applies_to(&self, grade: &str, department: &str) -> bool {
        self.is_active
            && self.grade.eq_ignore_ascii_case(grade)
            && (self.department == ALL_DEPARTMENTS || self.department.eq_ignore_ascii_case(department))
    }
}

/// Grade × allowance-type grid of monthly-equivalent amounts.
#[derive(Debug, Default, PartialEq)]
pub struct AllowanceMatrix {
    pub grades: Vec<String>,
    cells: BTreeMap<(String, AllowanceType), f64>,
}

impl AllowanceMatrix {
    /// Builds the grid from active rules for `department` (company-wide rules included).
    /// `None` aggregates every department.
    pub fn build(rules: &[Allowance], department: Option<&str>) -> Self {
        let mut grades = BTreeSet::new();
        let mut cells = BTreeMap::new();

        for rule in rules.iter().filter(|r| r.is_active) {
            if let Some(dept) = department {
                if rule.department != ALL_DEPARTMENTS && !rule.department.eq_ignore_ascii_case(dept) {
                    continue;
                }
            }
            grades.insert(rule.grade.clone());
            *cells
                .entry((rule.grade.clone(), rule.allowance_type))
                .or_insert(0.0) += rule.monthly_equivalent();
        }

        Self {
            grades: grades.into_iter().collect(),
            cells,
        }
    }

    pub fn cell(&self, grade: &str, allowance_type: AllowanceType) -> f64 {
        self.cells
            .get(&(grade.to_string(), allowance_type))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn row_total(&self, grade: &str) -> f64 {
        AllowanceType::iter().map(|t| self.cell(grade, t)).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.grades.is_empty()
    }
}

#[cfg(test)]
pub(crate) fn rule(
    grade: &str,
    department: &str,
    allowance_type: AllowanceType,
    amount: f64,
    frequency: Frequency,
) -> Allowance {
    Allowance {
        id: 1,
        grade: grade.to_string(),
        department: department.to_string(),
        allowance_type,
        amount,
        frequency,
        effective_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        is_active: true,
        created_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monthly_equivalent_spreads_by_frequency() {
        assert_eq!(rule("G1", "All", AllowanceType::Meal, 90.0, Frequency::Monthly).monthly_equivalent(), 90.0);
        assert_eq!(rule("G1", "All", AllowanceType::Meal, 90.0, Frequency::Quarterly).monthly_equivalent(), 30.0);
        assert_eq!(rule("G1", "All", AllowanceType::Meal, 1200.0, Frequency::Annual).monthly_equivalent(), 100.0);
        assert_eq!(rule("G1", "All", AllowanceType::Meal, 500.0, Frequency::OneTime).monthly_equivalent(), 0.0);
    }

    #[test]
    fn matrix_combines_department_and_company_wide_rules() {
        let mut inactive = rule("G2", "Sales", AllowanceType::Housing, 999.0, Frequency::Monthly);
        inactive.is_active = false;
        let rules = vec![
            rule("G1", "Sales", AllowanceType::Housing, 400.0, Frequency::Monthly),
            rule("G1", "All", AllowanceType::Housing, 100.0, Frequency::Monthly),
            rule("G1", "All", AllowanceType::Transport, 300.0, Frequency::Quarterly),
            rule("G1", "Engineering", AllowanceType::Meal, 50.0, Frequency::Monthly),
            inactive,
        ];

        let matrix = AllowanceMatrix::build(&rules, Some("sales"));
        assert_eq!(matrix.grades, vec!["G1".to_string()]);
        assert_eq!(matrix.cell("G1", AllowanceType::Housing), 500.0);
        assert_eq!(matrix.cell("G1", AllowanceType::Transport), 100.0);
        assert_eq!(matrix.cell("G1", AllowanceType::Meal), 0.0);
        assert_eq!(matrix.row_total("G1"), 600.0);

        let all = AllowanceMatrix::build(&rules, None);
        assert_eq!(all.cell("G1", AllowanceType::Meal), 50.0);
        assert!(!all.grades.contains(&"G2".to_string()));
    }

    #[test]
    fn applies_to_matches_grade_and_department() {
        let r = rule("G3", "All", AllowanceType::Medical, 80.0, Frequency::Monthly);
        assert!(r.applies_to("g3", "Finance"));
        assert!(!r.applies_to("G4", "Finance"));

        let scoped = rule("G3", "Finance", AllowanceType::Medical, 80.0, Frequency::Monthly);
        assert!(!scoped.applies_to("G3", "Sales"));
    }
}
