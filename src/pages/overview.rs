use actix_web::{Responder, web};
use chrono::NaiveDate;
use sqlx::MySqlPool;
use std::cmp::Ordering;
use std::fmt::Write;
use strum::IntoEnumIterator;

use super::or_empty;
use super::payroll::BonusRecordRow;
use super::salary_movements::{MovementRow, fetch_movements};
use crate::config::Config;
use crate::model::bonus_structure::BonusType;
use crate::model::payroll::BonusStatus;
use crate::model::salary_movement::MovementStatus;
use crate::view::flash::FlashQuery;
use crate::view::layout::{Nav, PageContext, html, page};
use crate::view::{escape, opt_text, percent, table};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EventKind {
    Bonus,
    Movement,
}

/// One line of the merged bonus / salary-movement timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineEntry {
    pub date: NaiveDate,
    pub kind: EventKind,
    pub id: u64,
    pub employee_id: u64,
    pub employee_name: String,
    pub description: String,
    pub amount: f64,
    pub change_percent: Option<f64>,
    pub status: &'static str,
    pub status_label: &'static str,
    pub reason: Option<String>,
}

#[derive(Debug, Default, PartialEq)]
pub struct OverviewTotals {
    /// Bonus amount per status, in `BonusStatus` order.
    pub bonus_by_status: Vec<(BonusStatus, f64)>,
    pub net_approved_change: f64,
    pub approved_movements: usize,
}

/// Merges both sources, newest first; same-day events order by id descending.
pub fn timeline(bonuses: &[BonusRecordRow], movements: &[MovementRow]) -> Vec<TimelineEntry> {
    let mut entries: Vec<TimelineEntry> = Vec::with_capacity(bonuses.len() + movements.len());

    for row in bonuses {
        let b = &row.record;
        let description = b
            .bonus_type
            .parse::<BonusType>()
            .map(|t| format!("{} bonus", t.label()))
            .unwrap_or_else(|_| format!("{} bonus", b.bonus_type));
        entries.push(TimelineEntry {
            date: b.bonus_date,
            kind: EventKind::Bonus,
            id: b.id,
            employee_id: b.employee_id,
            employee_name: row.employee_name.clone(),
            description,
            amount: b.amount,
            change_percent: None,
            status: b.status.code(),
            status_label: b.status.label(),
            reason: b.reason.clone(),
        });
    }

    for row in movements {
        let m = &row.movement;
        entries.push(TimelineEntry {
            date: m.effective_date,
            kind: EventKind::Movement,
            id: m.id,
            employee_id: m.employee_id,
            employee_name: row.employee_name.clone(),
            description: m.movement_type.label().to_string(),
            amount: m.change(),
            change_percent: m.change_percent(),
            status: m.status.code(),
            status_label: m.status.label(),
            reason: m.reason.clone(),
        });
    }

    entries.sort_by(|a, b| match b.date.cmp(&a.date) {
        Ordering::Equal => b.id.cmp(&a.id).then(a.kind.cmp(&b.kind)),
        other => other,
    });
    entries
}

pub fn totals(bonuses: &[BonusRecordRow], movements: &[MovementRow]) -> OverviewTotals {
    let bonus_by_status = BonusStatus::iter()
        .map(|status| {
            let sum = bonuses
                .iter()
                .filter(|b| b.record.status == status)
                .map(|b| b.record.amount)
                .sum();
            (status, sum)
        })
        .collect();

    let approved: Vec<&MovementRow> = movements
        .iter()
        .filter(|m| m.movement.status == MovementStatus::Approved)
        .collect();

    OverviewTotals {
        bonus_by_status,
        net_approved_change: approved.iter().map(|m| m.movement.change()).sum(),
        approved_movements: approved.len(),
    }
}

pub async fn compensation_overview(
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    flash: web::Query<FlashQuery>,
) -> impl Responder {
    let (bonuses, movements) = futures::future::join(
        sqlx::query_as::<_, BonusRecordRow>(
            r#"
            SELECT b.id, b.employee_id, b.bonus_type, b.amount, b.bonus_date, b.reason, b.status, b.created_at,
                   CONCAT(e.first_name, ' ', e.last_name) AS employee_name
            FROM bonus_records b
            JOIN employees e ON e.id = b.employee_id
            "#,
        )
        .fetch_all(pool.get_ref()),
        fetch_movements(pool.get_ref(), None),
    )
    .await;
    let bonuses = or_empty(bonuses, "bonus records");
    let movements = or_empty(movements, "salary movements");

    let ctx = PageContext::new(&config, Nav::Overview, flash.flash());
    html(render_overview(&ctx, &timeline(&bonuses, &movements), &totals(&bonuses, &movements)))
}

fn render_overview(ctx: &PageContext, entries: &[TimelineEntry], totals: &OverviewTotals) -> String {
    let mut body = String::from(r#"<div class="stats">"#);
    for (status, amount) in &totals.bonus_by_status {
        let _ = write!(
            body,
            r#"<div class="stat"><div class="value">{}</div><div class="label">{} bonuses</div></div>"#,
            ctx.money(*amount),
            status.label()
        );
    }
    let _ = write!(
        body,
        r#"<div class="stat"><div class="value">{}</div><div class="label">Net approved salary change ({} movements, per month)</div></div></div>"#,
        ctx.money(totals.net_approved_change),
        totals.approved_movements
    );

    let rows: Vec<String> = entries
        .iter()
        .map(|e| {
            let kind = match e.kind {
                EventKind::Bonus => "Bonus",
                EventKind::Movement => "Salary movement",
            };
            let change = e.change_percent.map(|p| format!(" ({})", percent(p))).unwrap_or_default();
            format!(
                r#"<tr><td>{}</td><td>{kind}</td><td><a href="/employees/{}">{}</a></td><td>{}</td><td class="num">{}{change}</td><td>{}</td><td><span class="badge {}">{}</span></td></tr>"#,
                e.date,
                e.employee_id,
                escape(&e.employee_name),
                escape(&e.description),
                ctx.money(e.amount),
                opt_text(e.reason.as_deref()),
                e.status,
                e.status_label,
            )
        })
        .collect();

    let _ = write!(
        body,
        r#"<div class="card"><h2>Timeline</h2>{}</div>"#,
        table(
            &["Date", "Event", "Employee", "Details", "Amount / change", "Reason", "Status"],
            &rows,
            "No bonuses or salary movements yet."
        )
    );

    page(ctx, "Bonuses & salary movements", &body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::payroll::BonusRecord;
    use crate::model::salary_movement::{MovementType, SalaryMovement};
    use chrono::Utc;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 2, d).unwrap()
    }

    fn bonus(id: u64, day: u32, amount: f64, status: BonusStatus) -> BonusRecordRow {
        BonusRecordRow {
            record: BonusRecord {
                id,
                employee_id: 1,
                bonus_type: "performance".into(),
                amount,
                bonus_date: date(day),
                reason: None,
                status,
                created_at: Utc::now(),
            },
            employee_name: "Ada Lovelace".into(),
        }
    }

    fn movement(id: u64, day: u32, prev: f64, new: f64, status: MovementStatus) -> MovementRow {
        MovementRow {
            movement: SalaryMovement {
                id,
                employee_id: 2,
                movement_type: MovementType::Adjustment,
                previous_salary: prev,
                new_salary: new,
                effective_date: date(day),
                reason: Some("market".into()),
                status,
                decided_at: None,
                created_at: Utc::now(),
            },
            employee_name: "Alan Turing".into(),
        }
    }

    #[test]
    fn timeline_is_newest_first_with_id_tiebreak() {
        let bonuses = vec![bonus(1, 3, 100.0, BonusStatus::Paid), bonus(2, 10, 50.0, BonusStatus::Pending)];
        let movements = vec![
            movement(5, 10, 4000.0, 4400.0, MovementStatus::Approved),
            movement(6, 1, 4400.0, 4200.0, MovementStatus::Pending),
        ];

        let entries = timeline(&bonuses, &movements);
        let order: Vec<(EventKind, u64)> = entries.iter().map(|e| (e.kind, e.id)).collect();
        assert_eq!(
            order,
            vec![
                (EventKind::Movement, 5),
                (EventKind::Bonus, 2),
                (EventKind::Bonus, 1),
                (EventKind::Movement, 6),
            ]
        );
        assert_eq!(entries[0].amount, 400.0);
        assert_eq!(entries[1].description, "Performance bonus");
    }

    #[test]
    fn totals_group_bonuses_and_net_approved_changes() {
        let bonuses = vec![
            bonus(1, 1, 100.0, BonusStatus::Paid),
            bonus(2, 2, 250.0, BonusStatus::Paid),
            bonus(3, 3, 75.0, BonusStatus::Approved),
        ];
        let movements = vec![
            movement(1, 1, 4000.0, 4400.0, MovementStatus::Approved),
            movement(2, 2, 4400.0, 4300.0, MovementStatus::Approved),
            movement(3, 3, 4300.0, 9000.0, MovementStatus::Rejected),
        ];

        let t = totals(&bonuses, &movements);
        assert_eq!(
            t.bonus_by_status,
            vec![
                (BonusStatus::Pending, 0.0),
                (BonusStatus::Approved, 75.0),
                (BonusStatus::Paid, 350.0),
            ]
        );
        assert_eq!(t.net_approved_change, 300.0);
        assert_eq!(t.approved_movements, 2);
    }
}
