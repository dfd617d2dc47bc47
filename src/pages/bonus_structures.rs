use actix_web::{HttpResponse, Responder, web};
use chrono::Utc;
use serde::Deserialize;
use sqlx::MySqlPool;
use std::fmt::Write;
use strum::IntoEnumIterator;
use tracing::{error, info, warn};

use super::or_empty;
use crate::config::Config;
use crate::model::bonus_structure::{BonusStructure, BonusType, CalculationMethod};
use crate::model::employee::{EMPLOYEE_COLUMNS, Employee};
use crate::model::payroll::BonusStatus;
use crate::utils::form;
use crate::view::flash::{Flash, FlashQuery};
use crate::view::layout::{Nav, PageContext, html, not_found, page};
use crate::view::{action_button, escape, opt_text, select_options, table};

const STRUCTURES: &str = "/compensation/bonus-structures";

const STRUCTURE_COLUMNS: &str = "id, name, bonus_type, calculation_method, value, min_performance_rating, \
     description, is_active, created_at";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StructureForm {
    pub name: String,
    pub bonus_type: String,
    pub calculation_method: String,
    pub value: String,
    pub min_performance_rating: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewStructure {
    pub name: String,
    pub bonus_type: BonusType,
    pub calculation_method: CalculationMethod,
    pub value: f64,
    pub min_performance_rating: Option<f64>,
    pub description: Option<String>,
}

impl NewStructure {
    pub fn from_form(f: &StructureForm) -> Result<Self, ()> {
        let structure = Self {
            name: form::text(&f.name).ok_or(())?,
            bonus_type: form::required(&f.bonus_type)?,
            calculation_method: form::required(&f.calculation_method)?,
            value: form::number(&f.value)?,
            min_performance_rating: form::optional_number(&f.min_performance_rating)?,
            description: form::text(&f.description),
        };

        if structure.value <= 0.0
            || (structure.calculation_method == CalculationMethod::Percentage && structure.value > 100.0)
            || structure
                .min_performance_rating
                .is_some_and(|r| !(1.0..=5.0).contains(&r))
        {
            return Err(());
        }
        Ok(structure)
    }
}

/// One line of a payout preview.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewLine {
    pub employee_id: u64,
    pub name: String,
    pub department: String,
    pub rating: Option<f64>,
    pub amount: Option<f64>,
}

/// Computes the bonus each employee would receive; returns the lines and the total payout.
pub fn preview(structure: &BonusStructure, employees: &[Employee]) -> (Vec<PreviewLine>, f64) {
    let lines: Vec<PreviewLine> = employees
        .iter()
        .map(|e| PreviewLine {
            employee_id: e.id,
            name: e.full_name(),
            department: e.department.clone(),
            rating: e.performance_rating,
            amount: structure.compute_for(e),
        })
        .collect();
    let total = lines.iter().filter_map(|l| l.amount).sum();
    (lines, total)
}

fn describe_value(ctx: &PageContext, s: &BonusStructure) -> String {
    match s.calculation_method {
        CalculationMethod::Fixed => ctx.money(s.value),
        CalculationMethod::Percentage => format!("{:.2}% of salary", s.value),
    }
}

async fn fetch_structure(pool: &MySqlPool, structure_id: u64) -> Result<Option<BonusStructure>, sqlx::Error> {
    sqlx::query_as::<_, BonusStructure>(&format!(
        "SELECT {STRUCTURE_COLUMNS} FROM bonus_structures WHERE id = ?"
    ))
    .bind(structure_id)
    .fetch_optional(pool)
    .await
}

async fn active_employees(pool: &MySqlPool) -> Result<Vec<Employee>, sqlx::Error> {
    sqlx::query_as::<_, Employee>(&format!(
        "SELECT {EMPLOYEE_COLUMNS} FROM employees e WHERE e.status = 'active' ORDER BY e.department, e.last_name"
    ))
    .fetch_all(pool)
    .await
}

pub async fn list_structures(
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    flash: web::Query<FlashQuery>,
) -> impl Responder {
    let structures = or_empty(
        sqlx::query_as::<_, BonusStructure>(&format!(
            "SELECT {STRUCTURE_COLUMNS} FROM bonus_structures ORDER BY is_active DESC, name"
        ))
        .fetch_all(pool.get_ref())
        .await,
        "bonus structures",
    );

    let ctx = PageContext::new(&config, Nav::BonusStructures, flash.flash());
    html(render_structures(&ctx, &structures))
}

fn render_structures(ctx: &PageContext, structures: &[BonusStructure]) -> String {
    let mut body = String::new();

    let rows: Vec<String> = structures
        .iter()
        .map(|s| {
            let (state, toggle) = if s.is_active { ("active", "Deactivate") } else { ("inactive", "Activate") };
            format!(
                r#"<tr><td><strong>{}</strong><br><span class="muted">{}</span></td><td>{}</td><td>{}</td><td class="num">{}</td><td><span class="badge {state}">{state}</span></td><td><a href="{STRUCTURES}/{id}/preview">Preview</a> {}</td></tr>"#,
                escape(&s.name),
                opt_text(s.description.as_deref()),
                s.bonus_type.label(),
                describe_value(ctx, s),
                s.min_performance_rating.map(|r| format!("{r:.1}")).unwrap_or_else(|| "&mdash;".into()),
                action_button(&format!("{STRUCTURES}/{}/toggle", s.id), toggle, "small secondary", None),
                id = s.id,
            )
        })
        .collect();

    let _ = write!(
        body,
        r#"<div class="card"><h2>Structures</h2>{}</div>"#,
        table(
            &["Name", "Type", "Value", "Min. rating", "State", ""],
            &rows,
            "No bonus structures defined yet."
        )
    );

    let _ = write!(
        body,
        r#"<div class="card"><h2>Add structure</h2>
<form method="post" action="{STRUCTURES}" class="grid">
<label>Name<input name="name" required></label>
<label>Type<select name="bonus_type">{types}</select></label>
<label>Calculation<select name="calculation_method">{methods}</select></label>
<label>Value<input type="number" step="0.01" min="0.01" name="value" required></label>
<label>Minimum rating<input type="number" step="0.1" min="1" max="5" name="min_performance_rating"></label>
<label>Description<input name="description"></label>
<button type="submit">Add structure</button>
</form></div>"#,
        types = select_options(BonusType::iter().map(|t| (t.code(), t.label())), None),
        methods = select_options(CalculationMethod::iter().map(|m| (m.code(), m.label())), None),
    );

    page(ctx, "Bonus structures", &body)
}

pub async fn create_structure(pool: web::Data<MySqlPool>, payload: web::Form<StructureForm>) -> HttpResponse {
    let structure = match NewStructure::from_form(&payload) {
        Ok(s) => s,
        Err(()) => return Flash::InvalidStructure.redirect(STRUCTURES),
    };

    let result = sqlx::query(
        r#"
        INSERT INTO bonus_structures
        (name, bonus_type, calculation_method, value, min_performance_rating, description, is_active)
        VALUES (?, ?, ?, ?, ?, ?, TRUE)
        "#,
    )
    .bind(&structure.name)
    .bind(structure.bonus_type.code())
    .bind(structure.calculation_method.code())
    .bind(structure.value)
    .bind(structure.min_performance_rating)
    .bind(&structure.description)
    .execute(pool.get_ref())
    .await;

    match result {
        Ok(res) => {
            info!(structure_id = res.last_insert_id(), name = %structure.name, "Bonus structure created");
            Flash::StructureAdded.redirect(STRUCTURES)
        }
        Err(e) => {
            error!(error = %e, "Failed to create bonus structure");
            Flash::DatabaseError.redirect(STRUCTURES)
        }
    }
}

pub async fn toggle_structure(pool: web::Data<MySqlPool>, path: web::Path<u64>) -> HttpResponse {
    let structure_id = path.into_inner();

    let result = sqlx::query("UPDATE bonus_structures SET is_active = NOT is_active WHERE id = ?")
        .bind(structure_id)
        .execute(pool.get_ref())
        .await;

    match result {
        Ok(res) if res.rows_affected() == 0 => Flash::StructureNotFound.redirect(STRUCTURES),
        Ok(_) => {
            info!(structure_id, "Bonus structure toggled");
            Flash::StructureToggled.redirect(STRUCTURES)
        }
        Err(e) => {
            error!(error = %e, structure_id, "Failed to toggle bonus structure");
            Flash::DatabaseError.redirect(STRUCTURES)
        }
    }
}

pub async fn preview_structure(
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    path: web::Path<u64>,
    flash: web::Query<FlashQuery>,
) -> impl Responder {
    let structure_id = path.into_inner();
    let ctx = PageContext::new(&config, Nav::BonusStructures, flash.flash());

    let structure = match fetch_structure(pool.get_ref(), structure_id).await {
        Ok(Some(s)) => s,
        Ok(None) => return not_found(&ctx, "Bonus structure"),
        Err(e) => {
            error!(error = %e, structure_id, "Failed to fetch bonus structure");
            return not_found(&ctx, "Bonus structure");
        }
    };
    let employees = or_empty(active_employees(pool.get_ref()).await, "active employees");

    html(render_preview(&ctx, &structure, &employees))
}

fn render_preview(ctx: &PageContext, structure: &BonusStructure, employees: &[Employee]) -> String {
    let (lines, total) = preview(structure, employees);
    let eligible = lines.iter().filter(|l| l.amount.is_some()).count();

    let mut body = format!(
        r#"<div class="card"><p><strong>{}</strong> · {} · {}{}</p>{}</div>"#,
        escape(&structure.name),
        structure.bonus_type.label(),
        describe_value(ctx, structure),
        structure
            .min_performance_rating
            .map(|r| format!(" · minimum rating {r:.1}"))
            .unwrap_or_default(),
        if structure.is_active {
            String::new()
        } else {
            r#"<p class="flash error">This structure is inactive, so nobody is eligible.</p>"#.to_string()
        },
    );

    let rows: Vec<String> = lines
        .iter()
        .map(|l| {
            let amount = l
                .amount
                .map(|a| ctx.money(a))
                .unwrap_or_else(|| r#"<span class="muted">not eligible</span>"#.to_string());
            format!(
                r#"<tr><td><a href="/employees/{}">{}</a></td><td>{}</td><td class="num">{}</td><td class="num">{amount}</td></tr>"#,
                l.employee_id,
                escape(&l.name),
                escape(&l.department),
                l.rating.map(|r| format!("{r:.1}")).unwrap_or_else(|| "&mdash;".into()),
            )
        })
        .collect();

    let _ = write!(
        body,
        r#"<div class="card"><h2>Payout preview</h2>{}<p>{eligible} of {} eligible · total payout <strong>{}</strong></p>{}</div>"#,
        table(&["Employee", "Department", "Rating", "Bonus"], &rows, "No active employees."),
        lines.len(),
        ctx.money(total),
        if eligible > 0 {
            action_button(
                &format!("{STRUCTURES}/{}/apply", structure.id),
                "Generate pending bonus records",
                "",
                Some("Create a pending bonus record for every eligible employee?"),
            )
        } else {
            String::new()
        },
    );

    page(ctx, "Bonus preview", &body)
}

pub async fn apply_structure(pool: web::Data<MySqlPool>, path: web::Path<u64>) -> HttpResponse {
    let structure_id = path.into_inner();
    let back = format!("{STRUCTURES}/{structure_id}/preview");

    let structure = match fetch_structure(pool.get_ref(), structure_id).await {
        Ok(Some(s)) => s,
        Ok(None) => return Flash::StructureNotFound.redirect(STRUCTURES),
        Err(e) => {
            error!(error = %e, structure_id, "Failed to fetch bonus structure");
            return Flash::DatabaseError.redirect(STRUCTURES);
        }
    };
    let employees = match active_employees(pool.get_ref()).await {
        Ok(e) => e,
        Err(e) => {
            error!(error = %e, "Failed to fetch active employees");
            return Flash::DatabaseError.redirect(&back);
        }
    };

    let (lines, total) = preview(&structure, &employees);
    let payouts: Vec<(u64, f64)> = lines
        .iter()
        .filter_map(|l| l.amount.map(|a| (l.employee_id, a)))
        .collect();
    if payouts.is_empty() {
        warn!(structure_id, "No eligible employees for bonus structure");
        return Flash::NoEligibleEmployees.redirect(&back);
    }

    match insert_bonuses(pool.get_ref(), &structure, &payouts).await {
        Ok(()) => {
            info!(structure_id, records = payouts.len(), total, "Bonus records generated");
            Flash::BonusesGenerated.redirect("/payroll/bonus-records")
        }
        Err(e) => {
            error!(error = %e, structure_id, "Failed to generate bonus records");
            Flash::DatabaseError.redirect(&back)
        }
    }
}

/// All-or-nothing insert of pending bonus records dated today.
async fn insert_bonuses(pool: &MySqlPool, structure: &BonusStructure, payouts: &[(u64, f64)]) -> Result<(), sqlx::Error> {
    let today = Utc::now().date_naive();
    let mut tx = pool.begin().await?;

    for (employee_id, amount) in payouts {
        sqlx::query(
            r#"
            INSERT INTO bonus_records (employee_id, bonus_type, amount, bonus_date, reason, status)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(employee_id)
        .bind(structure.bonus_type.code())
        .bind(amount)
        .bind(today)
        .bind(&structure.name)
        .bind(BonusStatus::Pending.code())
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await
}
