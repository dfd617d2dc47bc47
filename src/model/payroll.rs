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
pub enum PayStatus {
    Pending,
    Paid,
}

string_enum!(PayStatus {
    Pending => "Pending",
    Paid => "Paid",
});

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumString, IntoStaticStr, EnumIter, Serialize, Deserialize, ToSchema,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BonusStatus {
    Pending,
    Approved,
    Paid,
}

string_enum!(BonusStatus {
    Pending => "Pending",
    Approved => "Approved",
    Paid => "Paid",
});

/// Monthly payroll line for one employee.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SalaryRecord {
    pub id: u64,
    pub employee_id: u64,
    pub pay_period: NaiveDate,
    pub basic_salary: f64,
    pub allowances: f64,
    pub deductions: f64,
    pub net_salary: f64,
    #[sqlx(try_from = "String")]
    pub status: PayStatus,
    pub created_at: DateTime<Utc>,
}

pub fn net_salary(basic_salary: f64, allowances: f64, deductions: f64) -> f64 {
    basic_salary + allowances - deductions
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct BonusRecord {
    pub id: u64,
    pub employee_id: u64,
    pub bonus_type: String,
    pub amount: f64,
    pub bonus_date: NaiveDate,
    pub reason: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: BonusStatus,
    pub created_at: DateTime<Utc>,
}
