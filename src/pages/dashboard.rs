use actix_web::{Responder, web};
use chrono::{Datelike, NaiveDate, Utc};
use sqlx::MySqlPool;
use std::fmt::Write;

use super::{or_default, or_empty};
use crate::config::Config;
use crate::view::flash::FlashQuery;
use crate::view::layout::{Nav, PageContext, html, page};
use crate::view::{escape, table};

#[derive(Debug, Default, Clone, PartialEq)]
pub struct DashboardStats {
    pub active_employees: i64,
    pub average_salary: f64,
    pub pending_movements: i64,
    pub active_allowance_rules: i64,
    pub bonuses_this_year: f64,
    pub pending_payroll: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DepartmentSummary {
    pub department: String,
    pub headcount: i64,
    pub average_salary: f64,
}

const LINKS: &[(&str, &str, &str)] = &[
    ("/employees", "Employees", "Directory, profiles and edits"),
    ("/payroll/salary-records", "Salary records", "Monthly payroll lines"),
    ("/payroll/bonus-records", "Bonus records", "One-off and structured bonuses"),
    ("/compensation/allowances", "Allowance matrix", "Grade × type allowance rules"),
    ("/compensation/bonus-structures", "Bonus structures", "Reusable bonus formulas"),
    ("/compensation/salary-movements", "Salary movements", "Increments, promotions and approvals"),
    ("/compensation/overview", "Bonuses & movements", "Combined compensation timeline"),
    ("/attrition", "AI attrition predictor", "Train a model in the browser"),
];

async fn scalar_i64(pool: &MySqlPool, sql: &str, what: &str) -> i64 {
    or_default(sqlx::query_scalar::<_, i64>(sql).fetch_one(pool).await, what)
}

pub async fn load_stats(pool: &MySqlPool, year_start: NaiveDate) -> DashboardStats {
    let bonuses = async {
        or_default(
            sqlx::query_scalar::<_, f64>(
                "SELECT COALESCE(SUM(amount), 0) FROM bonus_records WHERE status IN ('approved', 'paid') AND bonus_date >= ?",
            )
            .bind(year_start)
            .fetch_one(pool)
            .await,
            "bonuses this year",
        )
    };
    let average = async {
        or_default(
            sqlx::query_scalar::<_, f64>("SELECT COALESCE(AVG(salary), 0) FROM employees WHERE status = 'active'")
                .fetch_one(pool)
                .await,
            "average salary",
        )
    };

    let (active_employees, average_salary, pending_movements, active_allowance_rules, bonuses_this_year, pending_payroll) = futures::join!(
        scalar_i64(pool, "SELECT COUNT(*) FROM employees WHERE status = 'active'", "active employees"),
        average,
        scalar_i64(pool, "SELECT COUNT(*) FROM salary_movements WHERE status = 'pending'", "pending movements"),
        scalar_i64(pool, "SELECT COUNT(*) FROM allowance_matrix WHERE is_active", "active allowance rules"),
        bonuses,
        scalar_i64(pool, "SELECT COUNT(*) FROM salary_records WHERE status = 'pending'", "pending payroll"),
    );

    DashboardStats {
        active_employees,
        average_salary,
        pending_movements,
        active_allowance_rules,
        bonuses_this_year,
        pending_payroll,
    }
}

pub async fn dashboard(
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    flash: web::Query<FlashQuery>,
) -> impl Responder {
    let today = Utc::now().date_naive();
    let year_start = NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today);

    let stats = load_stats(pool.get_ref(), year_start).await;
    let departments = or_empty(
        sqlx::query_as::<_, DepartmentSummary>(
            r#"
            SELECT department, COUNT(*) AS headcount, COALESCE(AVG(salary), 0) AS average_salary
            FROM employees
            WHERE status = 'active'
            GROUP BY department
            ORDER BY headcount DESC, department
            "#,
        )
        .fetch_all(pool.get_ref())
        .await,
        "department summary",
    );

    let ctx = PageContext::new(&config, Nav::Dashboard, flash.flash());
    html(render_dashboard(&ctx, &stats, &departments, today.year()))
}

fn render_dashboard(ctx: &PageContext, stats: &DashboardStats, departments: &[DepartmentSummary], year: i32) -> String {
    let figures = [
        (stats.active_employees.to_string(), "Active employees".to_string()),
        (ctx.money(stats.average_salary), "Average monthly salary".to_string()),
        (stats.pending_movements.to_string(), "Salary movements awaiting approval".to_string()),
        (stats.pending_payroll.to_string(), "Unpaid salary records".to_string()),
        (stats.active_allowance_rules.to_string(), "Active allowance rules".to_string()),
        (ctx.money(stats.bonuses_this_year), format!("Bonuses approved or paid in {year}")),
    ];

    let mut body = String::from(r#"<div class="stats">"#);
    for (value, label) in &figures {
        let _ = write!(
            body,
            r#"<div class="stat"><div class="value">{value}</div><div class="label">{}</div></div>"#,
            escape(label)
        );
    }
    body.push_str("</div>");

    let rows: Vec<String> = departments
        .iter()
        .map(|d| {
            format!(
                r#"<tr><td><a href="/employees?department={dept_q}">{dept}</a></td><td class="num">{}</td><td class="num">{}</td></tr>"#,
                d.headcount,
                ctx.money(d.average_salary),
                dept_q = escape(&d.department.replace('&', "%26").replace(' ', "+")),
                dept = escape(&d.department),
            )
        })
        .collect();
    let _ = write!(
        body,
        r#"<div class="card"><h2>Departments</h2>{}</div>"#,
        table(&["Department", "Active staff", "Average salary"], &rows, "No active employees yet.")
    );

    body.push_str(r#"<div class="card"><h2>Go to</h2><div class="stats">"#);
    for (href, title, blurb) in LINKS {
        let _ = write!(
            body,
            r#"<a class="stat" href="{href}"><div class="value">{title}</div><div class="label">{blurb}</div></a>"#
        );
    }
    body.push_str("</div></div>");

    page(ctx, "Dashboard", &body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pages::test_support::{config, unreachable_pool};
    use actix_web::http::StatusCode;
    use actix_web::{App, test as actix_test};

    #[test]
    fn figures_are_formatted() {
        let ctx = PageContext::new(&crate::config::test_config(), Nav::Dashboard, None);
        let stats = DashboardStats {
            active_employees: 42,
            average_salary: 5123.456,
            bonuses_this_year: 12000.0,
            ..DashboardStats::default()
        };
        let departments = vec![DepartmentSummary {
            department: "Customer Success".into(),
            headcount: 7,
            average_salary: 3900.0,
        }];
        let html = render_dashboard(&ctx, &stats, &departments, 2025);
        assert!(html.contains(">42<"));
        assert!(html.contains("USD 5,123.46"));
        assert!(html.contains("USD 12,000.00"));
        assert!(html.contains("Bonuses approved or paid in 2025"));
        assert!(html.contains(r#"href="/employees?department=Customer+Success""#));
    }

    #[actix_web::test]
    async fn dashboard_renders_zeroes_when_the_database_is_unavailable() {
        let app = actix_test::init_service(
            App::new()
                .app_data(unreachable_pool())
                .app_data(config())
                .route("/", web::get().to(dashboard)),
        )
        .await;

        let res = actix_test::call_service(&app, actix_test::TestRequest::get().uri("/").to_request()).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = actix_test::read_body(res).await;
        let text = std::str::from_utf8(&body).unwrap();
        assert!(text.contains("<title>Dashboard · HR Portal</title>"));
        assert!(text.contains("No active employees yet."));
        assert!(text.contains("/attrition"));
    }
}
