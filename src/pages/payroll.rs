use actix_web::{HttpResponse, Responder, web};
use chrono::{Datelike, NaiveDate, Utc};
use serde::Deserialize;
use sqlx::MySqlPool;
use std::fmt::Write;
use strum::IntoEnumIterator;
use tracing::{debug, error, info};

use super::{EmployeeOption, StatusFilter, StatusForm, employee_options, employee_select, or_empty};
use crate::config::Config;
use crate::error::is_constraint_violation;
use crate::model::bonus_structure::BonusType;
use crate::model::payroll::{BonusRecord, BonusStatus, PayStatus, SalaryRecord, net_salary};
use crate::utils::form;
use crate::view::flash::{Flash, FlashQuery};
use crate::view::layout::{Nav, PageContext, html, page};
use crate::view::{action_button, escape, opt_text, select_options, table};

const SALARY_RECORDS: &str = "/payroll/salary-records";
const BONUS_RECORDS: &str = "/payroll/bonus-records";

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SalaryRecordRow {
    #[sqlx(flatten)]
    pub record: SalaryRecord,
    pub employee_name: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BonusRecordRow {
    #[sqlx(flatten)]
    pub record: BonusRecord,
    pub employee_name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SalaryRecordForm {
    pub employee_id: String,
    pub pay_period: String,
    pub basic_salary: String,
    pub allowances: String,
    pub deductions: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewSalaryRecord {
    pub employee_id: u64,
    pub pay_period: NaiveDate,
    pub basic_salary: f64,
    pub allowances: f64,
    pub deductions: f64,
    pub net_salary: f64,
}

/// `2024-05` from a month input, or a full ISO date; stored as the first of the month.
pub fn parse_pay_period(raw: &str) -> Result<NaiveDate, ()> {
    let raw = raw.trim();
    let date = if raw.len() == 7 {
        form::date(&format!("{raw}-01"))?
    } else {
        form::date(raw)?
    };
    NaiveDate::from_ymd_opt(date.year(), date.month(), 1).ok_or(())
}

impl NewSalaryRecord {
    pub fn from_form(f: &SalaryRecordForm) -> Result<Self, ()> {
        let basic_salary = form::number(&f.basic_salary)?;
        let allowances = form::optional_number(&f.allowances)?.unwrap_or(0.0);
        let deductions = form::optional_number(&f.deductions)?.unwrap_or(0.0);
        if basic_salary < 0.0 || allowances < 0.0 || deductions < 0.0 {
            return Err(());
        }
        Ok(Self {
            employee_id: form::required(&f.employee_id)?,
            pay_period: parse_pay_period(&f.pay_period)?,
            basic_salary,
            allowances,
            deductions,
            net_salary: net_salary(basic_salary, allowances, deductions),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct BonusRecordForm {
    pub employee_id: String,
    pub bonus_type: String,
    pub amount: String,
    pub bonus_date: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewBonusRecord {
    pub employee_id: u64,
    pub bonus_type: BonusType,
    pub amount: f64,
    pub bonus_date: NaiveDate,
    pub reason: Option<String>,
}

impl NewBonusRecord {
    pub fn from_form(f: &BonusRecordForm, today: NaiveDate) -> Result<Self, ()> {
        let amount = form::number(&f.amount)?;
        if amount <= 0.0 {
            return Err(());
        }
        Ok(Self {
            employee_id: form::required(&f.employee_id)?,
            bonus_type: form::required(&f.bonus_type)?,
            amount,
            bonus_date: form::optional_date(&f.bonus_date)?.unwrap_or(today),
            reason: form::text(&f.reason),
        })
    }
}

pub async fn list_salary_records(
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    filter: web::Query<StatusFilter>,
    flash: web::Query<FlashQuery>,
) -> impl Responder {
    let status = form::optional::<PayStatus>(&filter.status).ok().flatten();

    let mut sql = String::from(
        r#"
        SELECT s.id, s.employee_id, s.pay_period, s.basic_salary, s.allowances, s.deductions,
               s.net_salary, s.status, s.created_at,
               CONCAT(e.first_name, ' ', e.last_name) AS employee_name
        FROM salary_records s
        JOIN employees e ON e.id = s.employee_id
        "#,
    );
    if status.is_some() {
        sql.push_str(" WHERE s.status = ?");
    }
    sql.push_str(" ORDER BY s.pay_period DESC, s.id DESC");
    debug!(sql = %sql, "Fetching salary records");

    let mut query = sqlx::query_as::<_, SalaryRecordRow>(&sql);
    if let Some(status) = status {
        query = query.bind(status.code());
    }
    let records = or_empty(query.fetch_all(pool.get_ref()).await, "salary records");
    let employees = employee_options(pool.get_ref()).await;

    let ctx = PageContext::new(&config, Nav::SalaryRecords, flash.flash());
    html(render_salary_records(&ctx, &records, &employees, status))
}

fn render_salary_records(
    ctx: &PageContext,
    records: &[SalaryRecordRow],
    employees: &[EmployeeOption],
    status: Option<PayStatus>,
) -> String {
    let mut body = String::new();

    let status_options = select_options(
        PayStatus::iter().map(|s| (s.code(), s.label())),
        status.map(|s| s.code()),
    );
    let _ = write!(
        body,
        r#"<div class="card"><form method="get" action="{SALARY_RECORDS}" class="grid">
<label>Status<select name="status"><option value="">All</option>{status_options}</select></label>
<button type="submit">Filter</button></form></div>"#
    );

    let rows: Vec<String> = records
        .iter()
        .map(|row| {
            let r = &row.record;
            let action = match r.status {
                PayStatus::Pending => action_button(
                    &format!("{SALARY_RECORDS}/{}/paid", r.id),
                    "Mark paid",
                    "small",
                    None,
                ),
                PayStatus::Paid => String::new(),
            };
            format!(
                r#"<tr><td><a href="/employees/{}">{}</a></td><td>{}</td><td class="num">{}</td><td class="num">{}</td><td class="num">{}</td><td class="num"><strong>{}</strong></td><td><span class="badge {}">{}</span></td><td>{action}</td></tr>"#,
                r.employee_id,
                escape(&row.employee_name),
                r.pay_period.format("%Y-%m"),
                ctx.money(r.basic_salary),
                ctx.money(r.allowances),
                ctx.money(r.deductions),
                ctx.money(r.net_salary),
                r.status.code(),
                r.status.label(),
            )
        })
        .collect();

    let total_net: f64 = records.iter().map(|r| r.record.net_salary).sum();
    let _ = write!(
        body,
        r#"<div class="card"><h2>Salary records</h2>{}<p>Total net: <strong>{}</strong></p></div>"#,
        table(
            &["Employee", "Period", "Basic", "Allowances", "Deductions", "Net", "Status", ""],
            &rows,
            "No salary records yet."
        ),
        ctx.money(total_net),
    );

    let _ = write!(
        body,
        r#"<div class="card"><h2>Add salary record</h2>
<form method="post" action="{SALARY_RECORDS}" class="grid">
<label>Employee{select}</label>
<label>Pay period<input type="month" name="pay_period" required></label>
<label>Basic salary<input type="number" step="0.01" min="0" name="basic_salary" required></label>
<label>Allowances<input type="number" step="0.01" min="0" name="allowances" value="0"></label>
<label>Deductions<input type="number" step="0.01" min="0" name="deductions" value="0"></label>
<button type="submit">Add record</button>
</form><p class="muted">Net salary is basic + allowances − deductions.</p></div>"#,
        select = employee_select("employee_id", employees, None),
    );

    page(ctx, "Salary records", &body)
}

pub async fn create_salary_record(pool: web::Data<MySqlPool>, payload: web::Form<SalaryRecordForm>) -> HttpResponse {
    let record = match NewSalaryRecord::from_form(&payload) {
        Ok(r) => r,
        Err(()) => return Flash::InvalidSalaryRecord.redirect(SALARY_RECORDS),
    };

    let result = sqlx::query(
        r#"
        INSERT INTO salary_records
        (employee_id, pay_period, basic_salary, allowances, deductions, net_salary, status)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(record.employee_id)
    .bind(record.pay_period)
    .bind(record.basic_salary)
    .bind(record.allowances)
    .bind(record.deductions)
    .bind(record.net_salary)
    .bind(PayStatus::Pending.code())
    .execute(pool.get_ref())
    .await;

    match result {
        Ok(res) => {
            info!(record_id = res.last_insert_id(), employee_id = record.employee_id, "Salary record created");
            Flash::SalaryRecordAdded.redirect(SALARY_RECORDS)
        }
        // FK failure: the employee was deleted in the meantime
        Err(e) if is_constraint_violation(&e) => Flash::EmployeeNotFound.redirect(SALARY_RECORDS),
        Err(e) => {
            error!(error = %e, "Failed to create salary record");
            Flash::DatabaseError.redirect(SALARY_RECORDS)
        }
    }
}

pub async fn mark_salary_paid(pool: web::Data<MySqlPool>, path: web::Path<u64>) -> HttpResponse {
    let record_id = path.into_inner();

    let result = sqlx::query("UPDATE salary_records SET status = ? WHERE id = ? AND status = ?")
        .bind(PayStatus::Paid.code())
        .bind(record_id)
        .bind(PayStatus::Pending.code())
        .execute(pool.get_ref())
        .await;

    match result {
        Ok(res) if res.rows_affected() == 0 => Flash::RecordNotFound.redirect(SALARY_RECORDS),
        Ok(_) => {
            info!(record_id, "Salary record paid");
            Flash::SalaryRecordPaid.redirect(SALARY_RECORDS)
        }
        Err(e) => {
            error!(error = %e, record_id, "Failed to mark salary record paid");
            Flash::DatabaseError.redirect(SALARY_RECORDS)
        }
    }
}

pub async fn list_bonus_records(
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    filter: web::Query<StatusFilter>,
    flash: web::Query<FlashQuery>,
) -> impl Responder {
    let status = form::optional::<BonusStatus>(&filter.status).ok().flatten();

    let mut sql = String::from(
        r#"
        SELECT b.id, b.employee_id, b.bonus_type, b.amount, b.bonus_date, b.reason, b.status, b.created_at,
               CONCAT(e.first_name, ' ', e.last_name) AS employee_name
        FROM bonus_records b
        JOIN employees e ON e.id = b.employee_id
        "#,
    );
    if status.is_some() {
        sql.push_str(" WHERE b.status = ?");
    }
    sql.push_str(" ORDER BY b.bonus_date DESC, b.id DESC");
    debug!(sql = %sql, "Fetching bonus records");

    let mut query = sqlx::query_as::<_, BonusRecordRow>(&sql);
    if let Some(status) = status {
        query = query.bind(status.code());
    }
    let records = or_empty(query.fetch_all(pool.get_ref()).await, "bonus records");
    let employees = employee_options(pool.get_ref()).await;

    let ctx = PageContext::new(&config, Nav::BonusRecords, flash.flash());
    html(render_bonus_records(&ctx, &records, &employees, status))
}

fn render_bonus_records(
    ctx: &PageContext,
    records: &[BonusRecordRow],
    employees: &[EmployeeOption],
    status: Option<BonusStatus>,
) -> String {
    let mut body = String::new();

    let filter_options = select_options(
        BonusStatus::iter().map(|s| (s.code(), s.label())),
        status.map(|s| s.code()),
    );
    let _ = write!(
        body,
        r#"<div class="card"><form method="get" action="{BONUS_RECORDS}" class="grid">
<label>Status<select name="status"><option value="">All</option>{filter_options}</select></label>
<button type="submit">Filter</button></form></div>"#
    );

    let rows: Vec<String> = records
        .iter()
        .map(|row| {
            let b = &row.record;
            let options = select_options(
                BonusStatus::iter().map(|s| (s.code(), s.label())),
                Some(b.status.code()),
            );
            let bonus_type = b
                .bonus_type
                .parse::<BonusType>()
                .map(|t| t.label().to_string())
                .unwrap_or_else(|_| escape(&b.bonus_type));
            format!(
                r#"<tr><td><a href="/employees/{}">{}</a></td><td>{}</td><td>{bonus_type}</td><td class="num">{}</td><td>{}</td><td><span class="badge {}">{}</span></td><td><form method="post" action="{BONUS_RECORDS}/{}/status" class="inline"><select name="status">{options}</select> <button type="submit" class="small secondary">Set</button></form></td></tr>"#,
                b.employee_id,
                escape(&row.employee_name),
                b.bonus_date,
                ctx.money(b.amount),
                opt_text(b.reason.as_deref()),
                b.status.code(),
                b.status.label(),
                b.id,
            )
        })
        .collect();

    let _ = write!(
        body,
        r#"<div class="card"><h2>Bonus records</h2>{}</div>"#,
        table(
            &["Employee", "Date", "Type", "Amount", "Reason", "Status", "Change status"],
            &rows,
            "No bonus records yet."
        ),
    );

    let type_options = select_options(BonusType::iter().map(|t| (t.code(), t.label())), None);
    let _ = write!(
        body,
        r#"<div class="card"><h2>Add bonus record</h2>
<form method="post" action="{BONUS_RECORDS}" class="grid">
<label>Employee{select}</label>
<label>Type<select name="bonus_type">{type_options}</select></label>
<label>Amount<input type="number" step="0.01" min="0.01" name="amount" required></label>
<label>Date<input type="date" name="bonus_date"></label>
<label>Reason<input name="reason"></label>
<button type="submit">Add bonus</button>
</form></div>"#,
        select = employee_select("employee_id", employees, None),
    );

    page(ctx, "Bonus records", &body)
}

pub async fn create_bonus_record(pool: web::Data<MySqlPool>, payload: web::Form<BonusRecordForm>) -> HttpResponse {
    let record = match NewBonusRecord::from_form(&payload, Utc::now().date_naive()) {
        Ok(r) => r,
        Err(()) => return Flash::InvalidBonusRecord.redirect(BONUS_RECORDS),
    };

    let result = sqlx::query(
        r#"
        INSERT INTO bonus_records (employee_id, bonus_type, amount, bonus_date, reason, status)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(record.employee_id)
    .bind(record.bonus_type.code())
    .bind(record.amount)
    .bind(record.bonus_date)
    .bind(&record.reason)
    .bind(BonusStatus::Pending.code())
    .execute(pool.get_ref())
    .await;

    match result {
        Ok(res) => {
            info!(record_id = res.last_insert_id(), employee_id = record.employee_id, "Bonus record created");
            Flash::BonusRecordAdded.redirect(BONUS_RECORDS)
        }
        Err(e) if is_constraint_violation(&e) => Flash::EmployeeNotFound.redirect(BONUS_RECORDS),
        Err(e) => {
            error!(error = %e, "Failed to create bonus record");
            Flash::DatabaseError.redirect(BONUS_RECORDS)
        }
    }
}

pub async fn set_bonus_status(
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Form<StatusForm>,
) -> HttpResponse {
    let record_id = path.into_inner();
    let status = match form::required::<BonusStatus>(&payload.status) {
        Ok(s) => s,
        Err(()) => return Flash::InvalidBonusRecord.redirect(BONUS_RECORDS),
    };

    let exists = sqlx::query_scalar::<_, u64>("SELECT id FROM bonus_records WHERE id = ?")
        .bind(record_id)
        .fetch_optional(pool.get_ref())
        .await;
    match exists {
        Ok(Some(_)) => {}
        Ok(None) => return Flash::RecordNotFound.redirect(BONUS_RECORDS),
        Err(e) => {
            error!(error = %e, record_id, "Failed to fetch bonus record");
            return Flash::DatabaseError.redirect(BONUS_RECORDS);
        }
    }

    let result = sqlx::query("UPDATE bonus_records SET status = ? WHERE id = ?")
        .bind(status.code())
        .bind(record_id)
        .execute(pool.get_ref())
        .await;

    match result {
        Ok(_) => {
            info!(record_id, status = status.code(), "Bonus status updated");
            Flash::BonusStatusUpdated.redirect(BONUS_RECORDS)
        }
        Err(e) => {
            error!(error = %e, record_id, "Failed to update bonus status");
            Flash::DatabaseError.redirect(BONUS_RECORDS)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pages::test_support::{config, unreachable_pool};
    use actix_web::http::{StatusCode, header};
    use actix_web::{App, test as actix_test};

    #[test]
    fn pay_period_is_normalised_to_the_first_of_the_month() {
        let first = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        assert_eq!(parse_pay_period("2024-05"), Ok(first));
        assert_eq!(parse_pay_period("2024-05-17"), Ok(first));
        assert_eq!(parse_pay_period("May 2024"), Err(()));
    }

    #[test]
    fn salary_record_computes_net_and_rejects_negatives() {
        let form = SalaryRecordForm {
            employee_id: "3".into(),
            pay_period: "2024-05".into(),
            basic_salary: "4000".into(),
            allowances: "350.50".into(),
            deductions: "".into(),
        };
        let record = NewSalaryRecord::from_form(&form).unwrap();
        assert_eq!(record.net_salary, 4350.5);
        assert_eq!(record.deductions, 0.0);

        let negative = SalaryRecordForm {
            deductions: "-1".into(),
            ..form
        };
        assert!(NewSalaryRecord::from_form(&negative).is_err());
    }

    #[test]
    fn bonus_record_requires_a_positive_amount() {
        let today = NaiveDate::from_ymd_opt(2025, 1, 10).unwrap();
        let form = BonusRecordForm {
            employee_id: "3".into(),
            bonus_type: "festival".into(),
            amount: "250".into(),
            ..BonusRecordForm::default()
        };
        let record = NewBonusRecord::from_form(&form, today).unwrap();
        assert_eq!(record.bonus_type, BonusType::Festival);
        assert_eq!(record.bonus_date, today);
        assert_eq!(record.reason, None);

        for amount in ["0", "-10", "abc"] {
            let bad = BonusRecordForm {
                amount: amount.into(),
                employee_id: "3".into(),
                bonus_type: "festival".into(),
                ..BonusRecordForm::default()
            };
            assert!(NewBonusRecord::from_form(&bad, today).is_err(), "{amount}");
        }
    }

    #[actix_web::test]
    async fn bad_bonus_status_is_rejected_before_querying() {
        let app = actix_test::init_service(
            App::new()
                .app_data(unreachable_pool())
                .route("/payroll/bonus-records/{id}/status", web::post().to(set_bonus_status)),
        )
        .await;

        let req = actix_test::TestRequest::post()
            .uri("/payroll/bonus-records/9/status")
            .set_form([("status", "cancelled")])
            .to_request();
        let res = actix_test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            res.headers().get(header::LOCATION).unwrap(),
            "/payroll/bonus-records?flash=invalid_bonus_record"
        );
    }

    #[actix_web::test]
    async fn salary_listing_renders_the_add_form_without_data() {
        let app = actix_test::init_service(
            App::new()
                .app_data(unreachable_pool())
                .app_data(config())
                .route("/payroll/salary-records", web::get().to(list_salary_records)),
        )
        .await;

        let req = actix_test::TestRequest::get().uri("/payroll/salary-records?status=paid").to_request();
        let res = actix_test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = actix_test::read_body(res).await;
        let text = std::str::from_utf8(&body).unwrap();
        assert!(text.contains("No salary records yet."));
        assert!(text.contains(r#"<option value="paid" selected>"#));
        assert!(text.contains("USD 0.00"));
    }
}
