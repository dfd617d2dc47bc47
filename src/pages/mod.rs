pub mod allowances;
pub mod attrition;
pub mod bonus_structures;
pub mod dashboard;
pub mod employees;
pub mod overview;
pub mod payroll;
pub mod salary_movements;

use serde::Deserialize;
use sqlx::MySqlPool;
use tracing::{debug, error};

use crate::error::is_missing_table;
use crate::view::escape;

/// Rows of a listing query; failures render as an empty table.
pub(crate) fn or_empty<T>(result: Result<Vec<T>, sqlx::Error>, what: &str) -> Vec<T> {
    match result {
        Ok(rows) => rows,
        Err(e) if is_missing_table(&e) => {
            debug!(what, "Table not created yet, showing no rows");
            Vec::new()
        }
        Err(e) => {
            error!(error = %e, what, "Failed to load rows");
            Vec::new()
        }
    }
}

/// Scalar aggregate; failures render as the default value.
pub(crate) fn or_default<T: Default>(result: Result<T, sqlx::Error>, what: &str) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            error!(error = %e, what, "Failed to load figure");
            T::default()
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct EmployeeOption {
    pub id: u64,
    pub employee_code: String,
    pub name: String,
    pub salary: f64,
}

/// Current (not departed) staff for `<select>` lists.
pub(crate) async fn employee_options(pool: &MySqlPool) -> Vec<EmployeeOption> {
    or_empty(
        sqlx::query_as::<_, EmployeeOption>(
            r#"
            SELECT id, employee_code, CONCAT(first_name, ' ', last_name) AS name, salary
            FROM employees
            WHERE status NOT IN ('resigned', 'terminated')
            ORDER BY first_name, last_name
            "#,
        )
        .fetch_all(pool)
        .await,
        "employee options",
    )
}

pub(crate) fn employee_select(name: &str, options: &[EmployeeOption], selected: Option<u64>) -> String {
    let mut html = format!(r#"<select name="{}" required><option value="">Select employee…</option>"#, escape(name));
    for o in options {
        let marker = if Some(o.id) == selected { " selected" } else { "" };
        html.push_str(&format!(
            r#"<option value="{}"{marker}>{} ({})</option>"#,
            o.id,
            escape(&o.name),
            escape(&o.employee_code)
        ));
    }
    html.push_str("</select>");
    html
}

/// `?status=` style filter where blank means "all".
#[derive(Debug, Default, Deserialize)]
pub struct StatusFilter {
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatusForm {
    #[serde(default)]
    pub status: String,
}
