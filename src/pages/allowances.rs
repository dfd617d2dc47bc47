use actix_web::{HttpResponse, Responder, web};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use sqlx::MySqlPool;
use std::fmt::Write;
use strum::IntoEnumIterator;
use tracing::{error, info};

use super::or_empty;
use crate::config::Config;
use crate::model::allowance::{ALL_DEPARTMENTS, Allowance, AllowanceMatrix, AllowanceType, Frequency};
use crate::utils::form;
use crate::view::flash::{Flash, FlashQuery};
use crate::view::layout::{Nav, PageContext, html, page};
use crate::view::{action_button, escape, select_options, table};

const ALLOWANCES: &str = "/compensation/allowances";

#[derive(Debug, Default, Deserialize)]
pub struct DepartmentFilter {
    #[serde(default)]
    pub department: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AllowanceForm {
    pub grade: String,
    pub department: String,
    pub allowance_type: String,
    pub amount: String,
    pub frequency: String,
    pub effective_date: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewAllowance {
    pub grade: String,
    pub department: String,
    pub allowance_type: AllowanceType,
    pub amount: f64,
    pub frequency: Frequency,
    pub effective_date: NaiveDate,
}

impl NewAllowance {
    pub fn from_form(f: &AllowanceForm, today: NaiveDate) -> Result<Self, ()> {
        let amount = form::number(&f.amount)?;
        if amount <= 0.0 {
            return Err(());
        }
        Ok(Self {
            grade: form::text(&f.grade).ok_or(())?.to_uppercase(),
            department: form::text(&f.department).ok_or(())?,
            allowance_type: form::required(&f.allowance_type)?,
            amount,
            frequency: form::optional(&f.frequency)?.unwrap_or(Frequency::Monthly),
            effective_date: form::optional_date(&f.effective_date)?.unwrap_or(today),
        })
    }
}

pub async fn allowance_matrix(
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    filter: web::Query<DepartmentFilter>,
    flash: web::Query<FlashQuery>,
) -> impl Responder {
    let rules = or_empty(
        sqlx::query_as::<_, Allowance>(
            r#"
            SELECT id, grade, department, allowance_type, amount, frequency, effective_date, is_active, created_at
            FROM allowance_matrix
            ORDER BY grade, department, allowance_type
            "#,
        )
        .fetch_all(pool.get_ref())
        .await,
        "allowance rules",
    );
    let departments = or_empty(
        sqlx::query_scalar::<_, String>("SELECT DISTINCT department FROM employees ORDER BY department")
            .fetch_all(pool.get_ref())
            .await,
        "departments",
    );

    let department = form::text(&filter.department);
    let ctx = PageContext::new(&config, Nav::Allowances, flash.flash());
    html(render_matrix(&ctx, &rules, &departments, department.as_deref()))
}

fn render_matrix(ctx: &PageContext, rules: &[Allowance], departments: &[String], department: Option<&str>) -> String {
    let mut body = String::new();

    let _ = write!(
        body,
        r#"<div class="card"><form method="get" action="{ALLOWANCES}" class="grid">
<label>Department<select name="department"><option value="">All departments</option>{}</select></label>
<button type="submit">Show matrix</button></form></div>"#,
        select_options(departments.iter().map(|d| (d.as_str(), d.as_str())), department)
    );

    let matrix = AllowanceMatrix::build(rules, department);
    let mut headers = vec!["Grade"];
    headers.extend(AllowanceType::iter().map(|t| t.label()));
    headers.push("Total / month");

    let rows: Vec<String> = matrix
        .grades
        .iter()
        .map(|grade| {
            let mut row = format!("<tr><th>{}</th>", escape(grade));
            for t in AllowanceType::iter() {
                let amount = matrix.cell(grade, t);
                if amount == 0.0 {
                    row.push_str(r#"<td class="num muted">&mdash;</td>"#);
                } else {
                    let _ = write!(row, r#"<td class="num">{}</td>"#, ctx.money(amount));
                }
            }
            let _ = write!(row, r#"<td class="num"><strong>{}</strong></td></tr>"#, ctx.money(matrix.row_total(grade)));
            row
        })
        .collect();

    let scope = department
        .map(|d| format!("{} (plus company-wide rules)", escape(d)))
        .unwrap_or_else(|| "all departments".to_string());
    let _ = write!(
        body,
        r#"<div class="card"><h2>Monthly allowances by grade: {scope}</h2>{}<p class="muted">Quarterly and annual rules are shown as monthly equivalents; one-time rules are excluded.</p></div>"#,
        table(&headers, &rows, "No active allowance rules for this selection.")
    );

    let rule_rows: Vec<String> = rules
        .iter()
        .map(|r| {
            let (state, toggle) = if r.is_active { ("active", "Deactivate") } else { ("inactive", "Activate") };
            format!(
                r#"<tr><td>{}</td><td>{}</td><td>{}</td><td class="num">{}</td><td>{}</td><td>{}</td><td><span class="badge {state}">{state}</span></td><td>{} {}</td></tr>"#,
                escape(&r.grade),
                escape(&r.department),
                r.allowance_type.label(),
                ctx.money(r.amount),
                r.frequency.label(),
                r.effective_date,
                action_button(&format!("{ALLOWANCES}/{}/toggle", r.id), toggle, "small secondary", None),
                action_button(
                    &format!("{ALLOWANCES}/{}/delete", r.id),
                    "Delete",
                    "small danger",
                    Some("Delete this allowance rule?")
                ),
            )
        })
        .collect();
    let _ = write!(
        body,
        r#"<div class="card"><h2>Rules</h2>{}</div>"#,
        table(
            &["Grade", "Department", "Type", "Amount", "Frequency", "Effective", "State", ""],
            &rule_rows,
            "No allowance rules defined yet."
        )
    );

    let _ = write!(
        body,
        r#"<div class="card"><h2>Add rule</h2>
<form method="post" action="{ALLOWANCES}" class="grid">
<label>Grade<input name="grade" required maxlength="20" placeholder="G5"></label>
<label>Department<input name="department" required value="{ALL_DEPARTMENTS}"></label>
<label>Type<select name="allowance_type">{types}</select></label>
<label>Amount<input type="number" step="0.01" min="0.01" name="amount" required></label>
<label>Frequency<select name="frequency">{frequencies}</select></label>
<label>Effective date<input type="date" name="effective_date"></label>
<button type="submit">Add rule</button>
</form><p class="muted">Use "{ALL_DEPARTMENTS}" for rules that apply company-wide.</p></div>"#,
        types = select_options(AllowanceType::iter().map(|t| (t.code(), t.label())), None),
        frequencies = select_options(Frequency::iter().map(|f| (f.code(), f.label())), Some("monthly")),
    );

    page(ctx, "Allowance matrix", &body)
}

pub async fn create_allowance(pool: web::Data<MySqlPool>, payload: web::Form<AllowanceForm>) -> HttpResponse {
    let rule = match NewAllowance::from_form(&payload, Utc::now().date_naive()) {
        Ok(r) => r,
        Err(()) => return Flash::InvalidAllowance.redirect(ALLOWANCES),
    };

    let result = sqlx::query(
        r#"
        INSERT INTO allowance_matrix (grade, department, allowance_type, amount, frequency, effective_date, is_active)
        VALUES (?, ?, ?, ?, ?, ?, TRUE)
        "#,
    )
    .bind(&rule.grade)
    .bind(&rule.department)
    .bind(rule.allowance_type.code())
    .bind(rule.amount)
    .bind(rule.frequency.code())
    .bind(rule.effective_date)
    .execute(pool.get_ref())
    .await;

    match result {
        Ok(res) => {
            info!(rule_id = res.last_insert_id(), grade = %rule.grade, department = %rule.department, "Allowance rule created");
            Flash::AllowanceAdded.redirect(ALLOWANCES)
        }
        Err(e) => {
            error!(error = %e, "Failed to create allowance rule");
            Flash::DatabaseError.redirect(ALLOWANCES)
        }
    }
}

pub async fn toggle_allowance(pool: web::Data<MySqlPool>, path: web::Path<u64>) -> HttpResponse {
    let rule_id = path.into_inner();

    let result = sqlx::query("UPDATE allowance_matrix SET is_active = NOT is_active WHERE id = ?")
        .bind(rule_id)
        .execute(pool.get_ref())
        .await;

    match result {
        Ok(res) if res.rows_affected() == 0 => Flash::RecordNotFound.redirect(ALLOWANCES),
        Ok(_) => {
            info!(rule_id, "Allowance rule toggled");
            Flash::AllowanceToggled.redirect(ALLOWANCES)
        }
        Err(e) => {
            error!(error = %e, rule_id, "Failed to toggle allowance rule");
            Flash::DatabaseError.redirect(ALLOWANCES)
        }
    }
}

pub async fn delete_allowance(pool: web::Data<MySqlPool>, path: web::Path<u64>) -> HttpResponse {
    let rule_id = path.into_inner();

    let result = sqlx::query("DELETE FROM allowance_matrix WHERE id = ?")
        .bind(rule_id)
        .execute(pool.get_ref())
        .await;

    match result {
        Ok(res) if res.rows_affected() == 0 => Flash::RecordNotFound.redirect(ALLOWANCES),
        Ok(_) => {
            info!(rule_id, "Allowance rule deleted");
            Flash::AllowanceDeleted.redirect(ALLOWANCES)
        }
        Err(e) => {
            error!(error = %e, rule_id, "Failed to delete allowance rule");
            Flash::DatabaseError.redirect(ALLOWANCES)
        }
    }
}
