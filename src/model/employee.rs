use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{EnumIter, EnumString, IntoStaticStr};
use utoipa::ToSchema;

use super::string_enum;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumString, IntoStaticStr, EnumIter, Serialize, Deserialize, ToSchema,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EmploymentType {
    FullTime,
    PartTime,
    Contract,
    Intern,
}

string_enum!(EmploymentType {
    FullTime => "Full-time",
    PartTime => "Part-time",
    Contract => "Contract",
    Intern => "Intern",
});

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumString, IntoStaticStr, EnumIter, Serialize, Deserialize, ToSchema,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EmployeeStatus {
    Active,
    OnLeave,
    Resigned,
    Terminated,
}

string_enum!(EmployeeStatus {
    Active => "Active",
    OnLeave => "On leave",
    Resigned => "Resigned",
    Terminated => "Terminated",
});

impl EmployeeStatus {
    /// Employees who have already left the company.
    pub fn has_left(&self) -> bool {
        matches!(self, EmployeeStatus::Resigned | EmployeeStatus::Terminated)
    }
}

/// Column list matching [`Employee`], for `SELECT`s with a table alias.
pub const EMPLOYEE_COLUMNS: &str = "e.id, e.employee_code, e.first_name, e.last_name, e.email, \
     e.phone, e.department, e.position, e.grade, e.employment_type, e.salary, \
     e.performance_rating, e.overtime_hours, e.date_of_birth, e.hire_date, e.status, e.created_at";

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 1,
        "employee_code": "EMP-001",
        "first_name": "John",
        "last_name": "Doe",
        "email": "john.doe@company.com",
        "phone": "+8801712345678",
        "department": "Engineering",
        "position": "Backend Engineer",
        "grade": "G5",
        "employment_type": "full_time",
        "salary": 5200.0,
        "performance_rating": 4.2,
        "overtime_hours": 12.0,
        "date_of_birth": "1991-04-12",
        "hire_date": "2021-01-04",
        "status": "active",
        "created_at": "2024-01-01T00:00:00Z"
    })
)]
pub struct Employee {
    pub id: u64,
    pub employee_code: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub department: String,
    pub position: String,
    pub grade: Option<String>,
    #[sqlx(try_from = "String")]
    pub employment_type: EmploymentType,
    /// Monthly basic salary.
    pub salary: f64,
    /// 1.0 (poor) to 5.0 (outstanding).
    pub performance_rating: Option<f64>,
    /// Average monthly overtime hours.
    pub overtime_hours: f64,
    #[schema(value_type = Option<String>, format = "date")]
    pub date_of_birth: Option<NaiveDate>,
    #[schema(value_type = String, format = "date")]
    pub hire_date: NaiveDate,
    #[sqlx(try_from = "String")]
    pub status: EmployeeStatus,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}

impl Employee {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn age_on(&self, today: NaiveDate) -> Option<u32> {
        self.date_of_birth.map(|dob| years_between(dob, today))
    }
}

/// Whole years from `from` to `to`; zero when `to` precedes `from`.
pub fn years_between(from: NaiveDate, to: NaiveDate) -> u32 {
    if to < from {
        return 0;
    }
    let mut years = to.year() - from.year();
    if (to.month(), to.day()) < (from.month(), from.day()) {
        years -= 1;
    }
    years.max(0) as u32
}

/// Whole months from `from` to `to`; zero when `to` precedes `from`.
pub fn months_between(from: NaiveDate, to: NaiveDate) -> u32 {
    if to < from {
        return 0;
    }
    let mut months = (to.year() - from.year()) * 12 + to.month() as i32 - from.month() as i32;
    if to.day() < from.day() {
        months -= 1;
    }
    months.max(0) as u32
}

#[cfg(test)]
pub(crate) fn sample_employee(id: u64) -> Employee {
    Employee {
        id,
        employee_code: format!("EMP-{id:03}"),
        first_name: "Ada".to_string(),
        last_name: "Lovelace".to_string(),
        email: format!("ada{id}@example.com"),
        phone: None,
        department: "Engineering".to_string(),
        position: "Engineer".to_string(),
        grade: Some("G5".to_string()),
        employment_type: EmploymentType::FullTime,
        salary: 5_000.0,
        performance_rating: Some(4.0),
        overtime_hours: 10.0,
        date_of_birth: NaiveDate::from_ymd_opt(1990, 6, 15),
        hire_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
        status: EmployeeStatus::Active,
        created_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn enums_round_trip_through_storage_strings() {
        assert_eq!(EmploymentType::PartTime.code(), "part_time");
        assert_eq!(
            EmploymentType::try_from("contract".to_string()).unwrap(),
            EmploymentType::Contract
        );
        assert_eq!(EmployeeStatus::OnLeave.code(), "on_leave");
        assert!(EmployeeStatus::try_from("retired".to_string()).is_err());
    }

    #[test]
    fn select_options_can_hold_codes_past_the_iterator() {
        use strum::IntoEnumIterator;

        let options: Vec<(&'static str, &'static str)> =
            EmployeeStatus::iter().map(|s| (s.code(), s.label())).collect();
        assert_eq!(
            options,
            [
                ("active", "Active"),
                ("on_leave", "On leave"),
                ("resigned", "Resigned"),
                ("terminated", "Terminated"),
            ]
        );
    }

    #[test]
    fn leavers_are_resigned_or_terminated() {
        assert!(EmployeeStatus::Resigned.has_left());
        assert!(EmployeeStatus::Terminated.has_left());
        assert!(!EmployeeStatus::OnLeave.has_left());
    }

    #[test]
    fn months_between_counts_whole_months() {
        assert_eq!(months_between(d(2023, 1, 15), d(2023, 2, 14)), 0);
        assert_eq!(months_between(d(2023, 1, 15), d(2023, 2, 15)), 1);
        assert_eq!(months_between(d(2020, 3, 1), d(2024, 3, 1)), 48);
        assert_eq!(months_between(d(2025, 1, 1), d(2024, 1, 1)), 0);
    }

    #[test]
    fn years_between_respects_birthdays() {
        assert_eq!(years_between(d(1990, 6, 15), d(2024, 6, 14)), 33);
        assert_eq!(years_between(d(1990, 6, 15), d(2024, 6, 15)), 34);
    }

    #[test]
    fn full_name_joins_parts() {
        assert_eq!(sample_employee(1).full_name(), "Ada Lovelace");
    }
}
