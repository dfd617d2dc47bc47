use actix_web::{HttpResponse, Responder, web};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use sqlx::MySqlPool;
use std::fmt::Write;
use strum::IntoEnumIterator;
use tracing::{debug, error, info, warn};

use super::{EmployeeOption, StatusFilter, employee_options, employee_select, or_empty};
use crate::config::Config;
use crate::model::salary_movement::{MovementStatus, MovementType, SalaryMovement};
use crate::utils::form;
use crate::view::flash::{Flash, FlashQuery};
use crate::view::layout::{Nav, PageContext, html, page};
use crate::view::{action_button, escape, opt_text, percent, select_options, table};

const MOVEMENTS: &str = "/compensation/salary-movements";

pub const MOVEMENT_COLUMNS: &str = "m.id, m.employee_id, m.movement_type, m.previous_salary, m.new_salary, \
     m.effective_date, m.reason, m.status, m.decided_at, m.created_at";

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MovementRow {
    #[sqlx(flatten)]
    pub movement: SalaryMovement,
    pub employee_name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct MovementForm {
    pub employee_id: String,
    pub movement_type: String,
    pub new_salary: String,
    pub effective_date: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MovementRequest {
    pub employee_id: u64,
    pub movement_type: MovementType,
    pub new_salary: f64,
    pub effective_date: NaiveDate,
    pub reason: Option<String>,
}

impl MovementRequest {
    /// Parses the form; direction checks need the current salary and happen in [`MovementRequest::check`].
    pub fn from_form(f: &MovementForm, today: NaiveDate) -> Result<Self, ()> {
        Ok(Self {
            employee_id: form::required(&f.employee_id)?,
            movement_type: form::required(&f.movement_type)?,
            new_salary: form::number(&f.new_salary)?,
            effective_date: form::optional_date(&f.effective_date)?.unwrap_or(today),
            reason: form::text(&f.reason),
        })
    }

    pub fn check(&self, previous_salary: f64) -> Result<(), &'static str> {
        self.movement_type.validate(previous_salary, self.new_salary)
    }
}

/// Movements listing query, optionally restricted to one status.
pub async fn fetch_movements(pool: &MySqlPool, status: Option<MovementStatus>) -> Result<Vec<MovementRow>, sqlx::Error> {
    let mut sql = format!(
        r#"
        SELECT {MOVEMENT_COLUMNS}, CONCAT(e.first_name, ' ', e.last_name) AS employee_name
        FROM salary_movements m
        JOIN employees e ON e.id = m.employee_id
        "#
    );
    if status.is_some() {
        sql.push_str(" WHERE m.status = ?");
    }
    sql.push_str(" ORDER BY m.effective_date DESC, m.id DESC");
    debug!(sql = %sql, "Fetching salary movements");

    let mut query = sqlx::query_as::<_, MovementRow>(&sql);
    if let Some(status) = status {
        query = query.bind(status.code());
    }
    query.fetch_all(pool).await
}

pub async fn list_movements(
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    filter: web::Query<StatusFilter>,
    flash: web::Query<FlashQuery>,
) -> impl Responder {
    let status = form::optional::<MovementStatus>(&filter.status).ok().flatten();
    let movements = or_empty(fetch_movements(pool.get_ref(), status).await, "salary movements");
    let employees = employee_options(pool.get_ref()).await;

    let ctx = PageContext::new(&config, Nav::SalaryMovements, flash.flash());
    html(render_movements(&ctx, &movements, &employees, status))
}

fn render_movements(
    ctx: &PageContext,
    movements: &[MovementRow],
    employees: &[EmployeeOption],
    status: Option<MovementStatus>,
) -> String {
    let mut body = String::new();

    let _ = write!(
        body,
        r#"<div class="card"><form method="get" action="{MOVEMENTS}" class="grid">
<label>Status<select name="status"><option value="">All</option>{}</select></label>
<button type="submit">Filter</button></form></div>"#,
        select_options(
            MovementStatus::iter().map(|s| (s.code(), s.label())),
            status.map(|s| s.code())
        )
    );

    let rows: Vec<String> = movements
        .iter()
        .map(|row| {
            let m = &row.movement;
            let actions = if m.status == MovementStatus::Pending {
                format!(
                    "{} {}",
                    action_button(
                        &format!("{MOVEMENTS}/{}/approve", m.id),
                        "Approve",
                        "small",
                        Some("Approve and update the employee's salary?")
                    ),
                    action_button(&format!("{MOVEMENTS}/{}/reject", m.id), "Reject", "small danger", None),
                )
            } else {
                m.decided_at
                    .map(|d| format!(r#"<span class="muted">{}</span>"#, d.format("%Y-%m-%d")))
                    .unwrap_or_default()
            };
            format!(
                r#"<tr><td><a href="/employees/{}">{}</a></td><td>{}</td><td>{}</td><td class="num">{}</td><td class="num">{}</td><td class="num">{}</td><td>{}</td><td><span class="badge {}">{}</span></td><td>{actions}</td></tr>"#,
                m.employee_id,
                escape(&row.employee_name),
                m.movement_type.label(),
                m.effective_date,
                ctx.money(m.previous_salary),
                ctx.money(m.new_salary),
                m.change_percent().map(percent).unwrap_or_else(|| "&mdash;".into()),
                opt_text(m.reason.as_deref()),
                m.status.code(),
                m.status.label(),
            )
        })
        .collect();

    let _ = write!(
        body,
        r#"<div class="card"><h2>Movements</h2>{}</div>"#,
        table(
            &["Employee", "Type", "Effective", "From", "To", "Change", "Reason", "Status", ""],
            &rows,
            "No salary movements recorded."
        )
    );

    let current: String = employees
        .iter()
        .map(|e| format!("<li>{}: {}</li>", escape(&e.name), ctx.money(e.salary)))
        .collect();
    let _ = write!(
        body,
        r#"<div class="card"><h2>Submit movement</h2>
<form method="post" action="{MOVEMENTS}" class="grid">
<label>Employee{select}</label>
<label>Type<select name="movement_type">{types}</select></label>
<label>New monthly salary<input type="number" step="0.01" min="0.01" name="new_salary" required></label>
<label>Effective date<input type="date" name="effective_date"></label>
<label>Reason<input name="reason"></label>
<button type="submit">Submit for approval</button>
</form>
<details><summary>Current salaries</summary><ul>{current}</ul></details></div>"#,
        select = employee_select("employee_id", employees, None),
        types = select_options(MovementType::iter().map(|t| (t.code(), t.label())), None),
    );

    page(ctx, "Salary movements", &body)
}

pub async fn submit_movement(pool: web::Data<MySqlPool>, payload: web::Form<MovementForm>) -> HttpResponse {
    let request = match MovementRequest::from_form(&payload, Utc::now().date_naive()) {
        Ok(r) => r,
        Err(()) => return Flash::InvalidMovement.redirect(MOVEMENTS),
    };

    let previous_salary = sqlx::query_scalar::<_, f64>("SELECT salary FROM employees WHERE id = ?")
        .bind(request.employee_id)
        .fetch_optional(pool.get_ref())
        .await;
    let previous_salary = match previous_salary {
        Ok(Some(s)) => s,
        Ok(None) => return Flash::EmployeeNotFound.redirect(MOVEMENTS),
        Err(e) => {
            error!(error = %e, employee_id = request.employee_id, "Failed to read current salary");
            return Flash::DatabaseError.redirect(MOVEMENTS);
        }
    };

    if let Err(reason) = request.check(previous_salary) {
        warn!(employee_id = request.employee_id, reason, "Salary movement rejected by validation");
        return Flash::InvalidMovement.redirect(MOVEMENTS);
    }

    let result = sqlx::query(
        r#"
        INSERT INTO salary_movements
        (employee_id, movement_type, previous_salary, new_salary, effective_date, reason, status)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(request.employee_id)
    .bind(request.movement_type.code())
    .bind(previous_salary)
    .bind(request.new_salary)
    .bind(request.effective_date)
    .bind(&request.reason)
    .bind(MovementStatus::Pending.code())
    .execute(pool.get_ref())
    .await;

    match result {
        Ok(res) => {
            info!(movement_id = res.last_insert_id(), employee_id = request.employee_id, "Salary movement submitted");
            Flash::MovementSubmitted.redirect(MOVEMENTS)
        }
        Err(e) => {
            error!(error = %e, "Failed to submit salary movement");
            Flash::DatabaseError.redirect(MOVEMENTS)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decision {
    Done,
    NotFound,
    NotPending,
}

/// Movement row as read under `FOR UPDATE` before approval.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
struct LockedMovement {
    employee_id: u64,
    new_salary: f64,
    status: String,
}

/// Salary change to apply, or the reason the approval stops.
fn approval_step(row: Option<LockedMovement>) -> Result<(u64, f64), Decision> {
    let row = row.ok_or(Decision::NotFound)?;
    if row.status != MovementStatus::Pending.code() {
        return Err(Decision::NotPending);
    }
    Ok((row.employee_id, row.new_salary))
}

/// Approves a pending movement and applies the new salary in one transaction.
async fn approve(pool: &MySqlPool, movement_id: u64) -> Result<Decision, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let row = sqlx::query_as::<_, LockedMovement>(
        "SELECT employee_id, new_salary, status FROM salary_movements WHERE id = ? FOR UPDATE",
    )
    .bind(movement_id)
    .fetch_optional(&mut *tx)
    .await?;

    // dropping `tx` rolls back and releases the lock
    let (employee_id, new_salary) = match approval_step(row) {
        Ok(change) => change,
        Err(decision) => return Ok(decision),
    };

    sqlx::query("UPDATE salary_movements SET status = ?, decided_at = ? WHERE id = ?")
        .bind(MovementStatus::Approved.code())
        .bind(Utc::now())
        .bind(movement_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("UPDATE employees SET salary = ? WHERE id = ?")
        .bind(new_salary)
        .bind(employee_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(Decision::Done)
}

async fn reject(pool: &MySqlPool, movement_id: u64) -> Result<Decision, sqlx::Error> {
    let result = sqlx::query("UPDATE salary_movements SET status = ?, decided_at = ? WHERE id = ? AND status = ?")
        .bind(MovementStatus::Rejected.code())
        .bind(Utc::now())
        .bind(movement_id)
        .bind(MovementStatus::Pending.code())
        .execute(pool)
        .await?;
    if result.rows_affected() > 0 {
        return Ok(Decision::Done);
    }

    let exists = sqlx::query_scalar::<_, u64>("SELECT id FROM salary_movements WHERE id = ?")
        .bind(movement_id)
        .fetch_optional(pool)
        .await?;
    Ok(if exists.is_some() { Decision::NotPending } else { Decision::NotFound })
}

fn decision_redirect(outcome: Result<Decision, sqlx::Error>, movement_id: u64, success: Flash) -> HttpResponse {
    match outcome {
        Ok(Decision::Done) => {
            info!(movement_id, outcome = success.as_ref(), "Salary movement decided");
            success.redirect(MOVEMENTS)
        }
        Ok(Decision::NotFound) => Flash::RecordNotFound.redirect(MOVEMENTS),
        Ok(Decision::NotPending) => Flash::MovementNotPending.redirect(MOVEMENTS),
        Err(e) => {
            error!(error = %e, movement_id, "Failed to decide salary movement");
            Flash::DatabaseError.redirect(MOVEMENTS)
        }
    }
}

pub async fn approve_movement(pool: web::Data<MySqlPool>, path: web::Path<u64>) -> HttpResponse {
    let movement_id = path.into_inner();
    decision_redirect(approve(pool.get_ref(), movement_id).await, movement_id, Flash::MovementApproved)
}

pub async fn reject_movement(pool: web::Data<MySqlPool>, path: web::Path<u64>) -> HttpResponse {
    let movement_id = path.into_inner();
    decision_redirect(reject(pool.get_ref(), movement_id).await, movement_id, Flash::MovementRejected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pages::test_support::{config, unreachable_pool};
    use actix_web::http::{StatusCode, header};
    use actix_web::{App, test as actix_test};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 4, 1).unwrap()
    }

    #[test]
    fn request_parses_and_checks_direction() {
        let form = MovementForm {
            employee_id: "7".into(),
            movement_type: "promotion".into(),
            new_salary: "5500".into(),
            ..MovementForm::default()
        };
        let request = MovementRequest::from_form(&form, today()).unwrap();
        assert_eq!(request.effective_date, today());
        assert!(request.check(5000.0).is_ok());
        assert!(request.check(6000.0).is_err());

        let demotion = MovementRequest {
            movement_type: MovementType::Demotion,
            ..request
        };
        assert!(demotion.check(6000.0).is_ok());
        assert!(demotion.check(5000.0).is_err());
    }

    #[test]
    fn unknown_type_or_missing_employee_is_rejected() {
        let bad_type = MovementForm {
            employee_id: "7".into(),
            movement_type: "bonus".into(),
            new_salary: "5500".into(),
            ..MovementForm::default()
        };
        assert!(MovementRequest::from_form(&bad_type, today()).is_err());

        let no_employee = MovementForm {
            movement_type: "increment".into(),
            new_salary: "5500".into(),
            ..MovementForm::default()
        };
        assert!(MovementRequest::from_form(&no_employee, today()).is_err());
    }

    #[actix_web::test]
    async fn unparsable_submission_redirects_with_error() {
        let app = actix_test::init_service(
            App::new()
                .app_data(unreachable_pool())
                .route("/compensation/salary-movements", web::post().to(submit_movement)),
        )
        .await;

        let req = actix_test::TestRequest::post()
            .uri("/compensation/salary-movements")
            .set_form([("employee_id", "1"), ("movement_type", "increment"), ("new_salary", "lots")])
            .to_request();
        let res = actix_test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            res.headers().get(header::LOCATION).unwrap(),
            "/compensation/salary-movements?flash=invalid_movement"
        );
    }

    fn locked(status: MovementStatus) -> LockedMovement {
        LockedMovement {
            employee_id: 7,
            new_salary: 5500.0,
            status: status.code().to_string(),
        }
    }

    #[test]
    fn only_pending_movements_are_applied() {
        assert_eq!(approval_step(Some(locked(MovementStatus::Pending))), Ok((7, 5500.0)));
        assert_eq!(approval_step(None), Err(Decision::NotFound));
        assert_eq!(approval_step(Some(locked(MovementStatus::Approved))), Err(Decision::NotPending));
        assert_eq!(approval_step(Some(locked(MovementStatus::Rejected))), Err(Decision::NotPending));
    }

    #[test]
    fn each_decision_maps_to_its_flash() {
        let location = |outcome: Result<Decision, sqlx::Error>, success: Flash| {
            decision_redirect(outcome, 5, success)
                .headers()
                .get(header::LOCATION)
                .unwrap()
                .to_str()
                .unwrap()
                .to_string()
        };
        assert_eq!(
            location(Ok(Decision::Done), Flash::MovementApproved),
            "/compensation/salary-movements?flash=movement_approved"
        );
        assert_eq!(
            location(Ok(Decision::Done), Flash::MovementRejected),
            "/compensation/salary-movements?flash=movement_rejected"
        );
        assert_eq!(
            location(Ok(Decision::NotFound), Flash::MovementApproved),
            "/compensation/salary-movements?flash=record_not_found"
        );
        assert_eq!(
            location(Ok(Decision::NotPending), Flash::MovementApproved),
            "/compensation/salary-movements?flash=movement_not_pending"
        );
        assert_eq!(
            location(Err(sqlx::Error::PoolTimedOut), Flash::MovementApproved),
            "/compensation/salary-movements?flash=database_error"
        );
    }

    #[actix_web::test]
    async fn approving_without_a_database_reports_an_error() {
        let app = actix_test::init_service(
            App::new()
                .app_data(unreachable_pool())
                .app_data(config())
                .route("/compensation/salary-movements/{id}/approve", web::post().to(approve_movement)),
        )
        .await;

        let req = actix_test::TestRequest::post()
            .uri("/compensation/salary-movements/5/approve")
            .to_request();
        let res = actix_test::call_service(&app, req).await;
        assert_eq!(
            res.headers().get(header::LOCATION).unwrap(),
            "/compensation/salary-movements?flash=database_error"
        );
    }
}
