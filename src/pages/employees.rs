use actix_web::{HttpResponse, Responder, web};
use chrono::{Duration, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use sqlx::MySqlPool;
use std::fmt::Write;
use strum::IntoEnumIterator;
use tracing::{debug, error, info, warn};

use super::{or_default, or_empty};
use crate::attrition::features::{
    FeatureInput, RECENT_BONUS_DAYS, RECENT_PAYROLL_DAYS, build_features,
};
use crate::attrition::labels::heuristic_risk;
use crate::config::Config;
use crate::error::is_constraint_violation;
use crate::model::allowance::Allowance;
use crate::model::employee::{EMPLOYEE_COLUMNS, Employee, EmployeeStatus, EmploymentType};
use crate::model::payroll::{BonusRecord, SalaryRecord};
use crate::model::salary_movement::SalaryMovement;
use crate::utils::db_utils::{build_update_sql, execute_update};
use crate::utils::form;
use crate::view::flash::{Flash, FlashQuery};
use crate::view::layout::{Nav, PageContext, html, not_found, page};
use crate::view::{action_button, escape, opt_text, percent, select_options, table};

/// Columns the edit form (and the JSON API) may change.
pub const EMPLOYEE_UPDATABLE: &[&str] = &[
    "first_name",
    "last_name",
    "email",
    "phone",
    "department",
    "position",
    "grade",
    "employment_type",
    "salary",
    "performance_rating",
    "overtime_hours",
    "date_of_birth",
    "hire_date",
    "status",
];

#[derive(Debug, Default, Deserialize)]
pub struct EmployeeFilter {
    #[serde(default)]
    pub search: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct EmployeeForm {
    pub employee_code: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub department: String,
    pub position: String,
    pub grade: String,
    pub employment_type: String,
    pub salary: String,
    pub performance_rating: String,
    pub overtime_hours: String,
    pub date_of_birth: String,
    pub hire_date: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewEmployee {
    pub employee_code: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub department: String,
    pub position: String,
    pub grade: Option<String>,
    pub employment_type: EmploymentType,
    pub salary: f64,
    pub performance_rating: Option<f64>,
    pub overtime_hours: f64,
    pub date_of_birth: Option<NaiveDate>,
    pub hire_date: NaiveDate,
    pub status: EmployeeStatus,
}

fn valid_rating(rating: Option<f64>) -> bool {
    rating.is_none_or(|r| (1.0..=5.0).contains(&r))
}

impl NewEmployee {
    pub fn from_form(f: &EmployeeForm, today: NaiveDate) -> Result<Self, ()> {
        let employee = Self {
            employee_code: form::text(&f.employee_code).ok_or(())?,
            first_name: form::text(&f.first_name).ok_or(())?,
            last_name: form::text(&f.last_name).ok_or(())?,
            email: form::text(&f.email).ok_or(())?.to_lowercase(),
            phone: form::text(&f.phone),
            department: form::text(&f.department).ok_or(())?,
            position: form::text(&f.position).unwrap_or_else(|| "Staff".to_string()),
            grade: form::text(&f.grade),
            employment_type: form::optional(&f.employment_type)?.unwrap_or(EmploymentType::FullTime),
            salary: form::number(&f.salary)?,
            performance_rating: form::optional_number(&f.performance_rating)?,
            overtime_hours: form::optional_number(&f.overtime_hours)?.unwrap_or(0.0),
            date_of_birth: form::optional_date(&f.date_of_birth)?,
            hire_date: form::optional_date(&f.hire_date)?.unwrap_or(today),
            status: form::optional(&f.status)?.unwrap_or(EmployeeStatus::Active),
        };

        if !form::valid_email(&employee.email)
            || employee.salary < 0.0
            || employee.overtime_hours < 0.0
            || !valid_rating(employee.performance_rating)
            || employee.hire_date > today
            || employee.date_of_birth.is_some_and(|dob| dob >= today)
        {
            return Err(());
        }
        Ok(employee)
    }
}

/// Non-blank fields of the edit form, typed for the dynamic UPDATE.
pub fn update_payload(f: &EmployeeForm, today: NaiveDate) -> Result<Map<String, Value>, ()> {
    let mut map = Map::new();

    let texts = [
        ("first_name", &f.first_name),
        ("last_name", &f.last_name),
        ("phone", &f.phone),
        ("department", &f.department),
        ("position", &f.position),
        ("grade", &f.grade),
    ];
    for (column, raw) in texts {
        if let Some(v) = form::text(raw) {
            map.insert(column.to_string(), Value::String(v));
        }
    }

    if let Some(email) = form::text(&f.email) {
        if !form::valid_email(&email) {
            return Err(());
        }
        map.insert("email".into(), Value::String(email.to_lowercase()));
    }
    if let Some(t) = form::optional::<EmploymentType>(&f.employment_type)? {
        map.insert("employment_type".into(), Value::String(t.code().to_string()));
    }
    if let Some(s) = form::optional::<EmployeeStatus>(&f.status)? {
        map.insert("status".into(), Value::String(s.code().to_string()));
    }
    if let Some(salary) = form::optional_number(&f.salary)? {
        if salary < 0.0 {
            return Err(());
        }
        map.insert("salary".into(), Value::from(salary));
    }
    if let Some(rating) = form::optional_number(&f.performance_rating)? {
        if !valid_rating(Some(rating)) {
            return Err(());
        }
        map.insert("performance_rating".into(), Value::from(rating));
    }
    if let Some(overtime) = form::optional_number(&f.overtime_hours)? {
        if overtime < 0.0 {
            return Err(());
        }
        map.insert("overtime_hours".into(), Value::from(overtime));
    }
    if let Some(dob) = form::optional_date(&f.date_of_birth)? {
        if dob >= today {
            return Err(());
        }
        map.insert("date_of_birth".into(), Value::String(dob.to_string()));
    }
    if let Some(hired) = form::optional_date(&f.hire_date)? {
        if hired > today {
            return Err(());
        }
        map.insert("hire_date".into(), Value::String(hired.to_string()));
    }

    Ok(map)
}

pub async fn list_employees(
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    filter: web::Query<EmployeeFilter>,
    flash: web::Query<FlashQuery>,
) -> impl Responder {
    let mut conditions = Vec::new();
    let mut bindings: Vec<String> = Vec::new();

    if let Some(department) = form::text(&filter.department) {
        conditions.push("e.department = ?");
        bindings.push(department);
    }
    if let Some(status) = form::text(&filter.status) {
        conditions.push("e.status = ?");
        bindings.push(status);
    }
    if let Some(search) = form::text(&filter.search) {
        conditions.push("(e.first_name LIKE ? OR e.last_name LIKE ? OR e.email LIKE ? OR e.employee_code LIKE ?)");
        let like = format!("%{}%", search);
        bindings.extend(std::iter::repeat_n(like, 4));
    }

    let where_clause = if conditions.is_empty() {
        "".to_string()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    let sql = format!("SELECT {EMPLOYEE_COLUMNS} FROM employees e {where_clause} ORDER BY e.id DESC");
    debug!(sql = %sql, bindings = ?bindings, "Fetching employees");

    let mut query = sqlx::query_as::<_, Employee>(&sql);
    for b in &bindings {
        query = query.bind(b);
    }
    let employees = or_empty(query.fetch_all(pool.get_ref()).await, "employees");

    let departments = or_empty(
        sqlx::query_scalar::<_, String>("SELECT DISTINCT department FROM employees ORDER BY department")
            .fetch_all(pool.get_ref())
            .await,
        "departments",
    );

    let ctx = PageContext::new(&config, Nav::Employees, flash.flash());
    html(render_list(&ctx, &employees, &departments, &filter))
}

fn render_list(ctx: &PageContext, employees: &[Employee], departments: &[String], filter: &EmployeeFilter) -> String {
    let mut body = String::new();

    let department_options = select_options(
        departments.iter().map(|d| (d.as_str(), d.as_str())),
        form::text(&filter.department).as_deref(),
    );
    let status_options = select_options(
        EmployeeStatus::iter().map(|s| (s.code(), s.label())),
        form::text(&filter.status).as_deref(),
    );
    let _ = write!(
        body,
        r#"<div class="card"><form method="get" action="/employees" class="grid">
<label>Search<input type="search" name="search" value="{search}" placeholder="Name, email or code"></label>
<label>Department<select name="department"><option value="">All departments</option>{department_options}</select></label>
<label>Status<select name="status"><option value="">Any status</option>{status_options}</select></label>
<button type="submit">Filter</button>
</form></div>"#,
        search = escape(&filter.search),
    );

    let rows: Vec<String> = employees
        .iter()
        .map(|e| {
            format!(
                r#"<tr><td>{code}</td><td><a href="/employees/{id}">{name}</a></td><td>{dept}</td><td>{position}</td><td>{kind}</td><td class="num">{salary}</td><td class="num">{rating}</td><td><span class="badge {status_class}">{status}</span></td><td>{delete}</td></tr>"#,
                id = e.id,
                code = escape(&e.employee_code),
                name = escape(&e.full_name()),
                dept = escape(&e.department),
                position = escape(&e.position),
                kind = e.employment_type.label(),
                salary = ctx.money(e.salary),
                rating = e.performance_rating.map(|r| format!("{r:.1}")).unwrap_or_else(|| "&mdash;".into()),
                status_class = e.status.code(),
                status = e.status.label(),
                delete = action_button(
                    &format!("/employees/{}/delete", e.id),
                    "Delete",
                    "danger small",
                    Some("Delete this employee and all their records?"),
                ),
            )
        })
        .collect();

    let _ = write!(
        body,
        r#"<div class="card"><h2>Employees ({count})</h2>{table}</div>"#,
        count = employees.len(),
        table = table(
            &["Code", "Name", "Department", "Position", "Type", "Monthly salary", "Rating", "Status", ""],
            &rows,
            "No employees yet. Add the first one below.",
        ),
    );

    let type_options = select_options(EmploymentType::iter().map(|t| (t.code(), t.label())), Some("full_time"));
    let _ = write!(
        body,
        r#"<div class="card"><h2>Add employee</h2>
<form method="post" action="/employees" class="grid">
<label>Employee code<input name="employee_code" required maxlength="32"></label>
<label>First name<input name="first_name" required></label>
<label>Last name<input name="last_name" required></label>
<label>Email<input type="email" name="email" required></label>
<label>Phone<input name="phone"></label>
<label>Department<input name="department" required list="departments"></label>
<label>Position<input name="position"></label>
<label>Grade<input name="grade" maxlength="20"></label>
<label>Employment type<select name="employment_type">{type_options}</select></label>
<label>Monthly salary<input type="number" step="0.01" min="0" name="salary" required></label>
<label>Performance rating (1-5)<input type="number" step="0.1" min="1" max="5" name="performance_rating"></label>
<label>Monthly overtime hours<input type="number" step="0.5" min="0" name="overtime_hours" value="0"></label>
<label>Date of birth<input type="date" name="date_of_birth"></label>
<label>Hire date<input type="date" name="hire_date" required></label>
<button type="submit">Add employee</button>
</form>
<datalist id="departments">{datalist}</datalist></div>"#,
        datalist = departments
            .iter()
            .map(|d| format!(r#"<option value="{}">"#, escape(d)))
            .collect::<String>(),
    );

    page(ctx, "Employees", &body)
}

pub async fn create_employee(pool: web::Data<MySqlPool>, payload: web::Form<EmployeeForm>) -> HttpResponse {
    let today = Utc::now().date_naive();
    let employee = match NewEmployee::from_form(&payload, today) {
        Ok(e) => e,
        Err(()) => return Flash::InvalidEmployee.redirect("/employees"),
    };

    let result = sqlx::query(
        r#"
        INSERT INTO employees
        (employee_code, first_name, last_name, email, phone, department, position, grade,
         employment_type, salary, performance_rating, overtime_hours, date_of_birth, hire_date, status)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&employee.employee_code)
    .bind(&employee.first_name)
    .bind(&employee.last_name)
    .bind(&employee.email)
    .bind(&employee.phone)
    .bind(&employee.department)
    .bind(&employee.position)
    .bind(&employee.grade)
    .bind(employee.employment_type.code())
    .bind(employee.salary)
    .bind(employee.performance_rating)
    .bind(employee.overtime_hours)
    .bind(employee.date_of_birth)
    .bind(employee.hire_date)
    .bind(employee.status.code())
    .execute(pool.get_ref())
    .await;

    match result {
        Ok(res) => {
            info!(employee_id = res.last_insert_id(), code = %employee.employee_code, "Employee created");
            Flash::EmployeeAdded.redirect("/employees")
        }
        Err(e) => save_failure(&e, None, "/employees"),
    }
}

/// Redirect for a failed insert or update; SQLSTATE 23000 means the code or email is taken.
fn save_failure(e: &sqlx::Error, employee_id: Option<u64>, back: &str) -> HttpResponse {
    if is_constraint_violation(e) {
        warn!(error = %e, ?employee_id, "Duplicate employee code or email");
        return Flash::DuplicateEmployee.redirect(back);
    }
    error!(error = %e, ?employee_id, "Failed to save employee");
    Flash::DatabaseError.redirect(back)
}

pub async fn fetch_employee(pool: &MySqlPool, employee_id: u64) -> Result<Option<Employee>, sqlx::Error> {
    sqlx::query_as::<_, Employee>(&format!("SELECT {EMPLOYEE_COLUMNS} FROM employees e WHERE e.id = ?"))
        .bind(employee_id)
        .fetch_optional(pool)
        .await
}

pub async fn show_employee(
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    path: web::Path<u64>,
    flash: web::Query<FlashQuery>,
) -> impl Responder {
    let employee_id = path.into_inner();
    let ctx = PageContext::new(&config, Nav::Employees, flash.flash());

    let employee = match fetch_employee(pool.get_ref(), employee_id).await {
        Ok(Some(e)) => e,
        Ok(None) => return not_found(&ctx, "Employee"),
        Err(e) => {
            error!(error = %e, employee_id, "Failed to fetch employee");
            return not_found(&ctx, "Employee");
        }
    };

    let salary_records = or_empty(
        sqlx::query_as::<_, SalaryRecord>(
            r#"
            SELECT id, employee_id, pay_period, basic_salary, allowances, deductions, net_salary, status, created_at
            FROM salary_records WHERE employee_id = ? ORDER BY pay_period DESC, id DESC
            "#,
        )
        .bind(employee_id)
        .fetch_all(pool.get_ref())
        .await,
        "salary records",
    );
    let bonus_records = or_empty(
        sqlx::query_as::<_, BonusRecord>(
            r#"
            SELECT id, employee_id, bonus_type, amount, bonus_date, reason, status, created_at
            FROM bonus_records WHERE employee_id = ? ORDER BY bonus_date DESC, id DESC
            "#,
        )
        .bind(employee_id)
        .fetch_all(pool.get_ref())
        .await,
        "bonus records",
    );
    let movements = or_empty(
        sqlx::query_as::<_, SalaryMovement>(
            r#"
            SELECT id, employee_id, movement_type, previous_salary, new_salary, effective_date,
                   reason, status, decided_at, created_at
            FROM salary_movements WHERE employee_id = ? ORDER BY effective_date DESC, id DESC
            "#,
        )
        .bind(employee_id)
        .fetch_all(pool.get_ref())
        .await,
        "salary movements",
    );
    let allowances = match &employee.grade {
        Some(grade) => or_empty(
            sqlx::query_as::<_, Allowance>(
                r#"
                SELECT id, grade, department, allowance_type, amount, frequency, effective_date, is_active, created_at
                FROM allowance_matrix WHERE grade = ? ORDER BY allowance_type
                "#,
            )
            .bind(grade)
            .fetch_all(pool.get_ref())
            .await,
            "allowances",
        ),
        None => Vec::new(),
    }
    .into_iter()
    .filter(|a| a.applies_to(employee.grade.as_deref().unwrap_or_default(), &employee.department))
    .collect::<Vec<_>>();

    let headcount: i64 = or_default(
        sqlx::query_scalar("SELECT COUNT(*) FROM employees WHERE department = ? AND status = 'active'")
            .bind(&employee.department)
            .fetch_one(pool.get_ref())
            .await,
        "department headcount",
    );

    let today = Utc::now().date_naive();
    let input = FeatureInput {
        employee: &employee,
        department_headcount: headcount.max(0) as u32,
        recent_payroll: salary_records
            .iter()
            .any(|r| r.pay_period >= today - Duration::days(RECENT_PAYROLL_DAYS)),
        recent_bonus: bonus_records
            .iter()
            .any(|b| b.bonus_date >= today - Duration::days(RECENT_BONUS_DAYS)),
    };

    let profile = Profile {
        employee: &employee,
        salary_records: &salary_records,
        bonus_records: &bonus_records,
        movements: &movements,
        allowances: &allowances,
        features: build_features(&input, today),
        today,
    };
    html(render_profile(&ctx, &profile))
}

struct Profile<'a> {
    employee: &'a Employee,
    salary_records: &'a [SalaryRecord],
    bonus_records: &'a [BonusRecord],
    movements: &'a [SalaryMovement],
    allowances: &'a [Allowance],
    features: crate::attrition::features::FeatureVector,
    today: NaiveDate,
}

fn render_profile(ctx: &PageContext, p: &Profile<'_>) -> String {
    let e = p.employee;
    let mut body = String::new();

    let _ = write!(
        body,
        r#"<div class="card"><table>
<tr><th>Code</th><td>{code}</td><th>Email</th><td>{email}</td></tr>
<tr><th>Department</th><td>{dept}</td><th>Position</th><td>{position}</td></tr>
<tr><th>Grade</th><td>{grade}</td><th>Type</th><td>{kind}</td></tr>
<tr><th>Monthly salary</th><td>{salary}</td><th>Rating</th><td>{rating}</td></tr>
<tr><th>Hired</th><td>{hired}</td><th>Status</th><td><span class="badge {status_class}">{status}</span></td></tr>
<tr><th>Phone</th><td>{phone}</td><th>Overtime (h/month)</th><td>{overtime:.1}</td></tr>
<tr><th>Age</th><td>{age}</td><th></th><td></td></tr>
</table></div>"#,
        code = escape(&e.employee_code),
        email = escape(&e.email),
        dept = escape(&e.department),
        position = escape(&e.position),
        grade = opt_text(e.grade.as_deref()),
        kind = e.employment_type.label(),
        salary = ctx.money(e.salary),
        rating = e.performance_rating.map(|r| format!("{r:.1}")).unwrap_or_else(|| "&mdash;".into()),
        hired = e.hire_date,
        status_class = e.status.code(),
        status = e.status.label(),
        phone = opt_text(e.phone.as_deref()),
        overtime = e.overtime_hours,
        age = e.age_on(p.today).map(|a| a.to_string()).unwrap_or_else(|| "&mdash;".into()),
    );

    let salary_rows: Vec<String> = p
        .salary_records
        .iter()
        .map(|r| {
            format!(
                r#"<tr><td>{}</td><td class="num">{}</td><td class="num">{}</td><td class="num">{}</td><td class="num">{}</td><td><span class="badge {}">{}</span></td></tr>"#,
                r.pay_period.format("%Y-%m"),
                ctx.money(r.basic_salary),
                ctx.money(r.allowances),
                ctx.money(r.deductions),
                ctx.money(r.net_salary),
                r.status.code(),
                r.status.label()
            )
        })
        .collect();
    let _ = write!(
        body,
        r#"<div class="card"><h2>Salary records</h2>{}</div>"#,
        table(&["Period", "Basic", "Allowances", "Deductions", "Net", "Status"], &salary_rows, "No salary records.")
    );

    let bonus_rows: Vec<String> = p
        .bonus_records
        .iter()
        .map(|b| {
            format!(
                r#"<tr><td>{}</td><td>{}</td><td class="num">{}</td><td>{}</td><td><span class="badge {}">{}</span></td></tr>"#,
                b.bonus_date,
                escape(&b.bonus_type),
                ctx.money(b.amount),
                opt_text(b.reason.as_deref()),
                b.status.code(),
                b.status.label()
            )
        })
        .collect();
    let _ = write!(
        body,
        r#"<div class="card"><h2>Bonuses</h2>{}</div>"#,
        table(&["Date", "Type", "Amount", "Reason", "Status"], &bonus_rows, "No bonuses.")
    );

    let movement_rows: Vec<String> = p
        .movements
        .iter()
        .map(|m| {
            format!(
                r#"<tr><td>{}</td><td>{}</td><td class="num">{}</td><td class="num">{}</td><td class="num">{}</td><td><span class="badge {}">{}</span></td></tr>"#,
                m.effective_date,
                m.movement_type.label(),
                ctx.money(m.previous_salary),
                ctx.money(m.new_salary),
                m.change_percent().map(percent).unwrap_or_else(|| "&mdash;".into()),
                m.status.code(),
                m.status.label()
            )
        })
        .collect();
    let _ = write!(
        body,
        r#"<div class="card"><h2>Salary movements</h2>{}</div>"#,
        table(&["Effective", "Type", "From", "To", "Change", "Status"], &movement_rows, "No salary movements.")
    );

    let allowance_rows: Vec<String> = p
        .allowances
        .iter()
        .map(|a| {
            format!(
                r#"<tr><td>{}</td><td>{}</td><td class="num">{}</td><td>{}</td><td class="num">{}</td></tr>"#,
                a.allowance_type.label(),
                escape(&a.department),
                ctx.money(a.amount),
                a.frequency.label(),
                ctx.money(a.monthly_equivalent())
            )
        })
        .collect();
    let monthly_total: f64 = p.allowances.iter().map(Allowance::monthly_equivalent).sum();
    let _ = write!(
        body,
        r#"<div class="card"><h2>Applicable allowances</h2>{}<p>Monthly equivalent: <strong>{}</strong></p></div>"#,
        table(&["Type", "Scope", "Amount", "Frequency", "Per month"], &allowance_rows, "No allowance rules match this grade."),
        ctx.money(monthly_total)
    );

    let feature_rows: Vec<String> = p
        .features
        .named()
        .map(|(name, value)| format!(r#"<tr><td>{name}</td><td class="num">{value:.3}</td></tr>"#))
        .collect();
    let _ = write!(
        body,
        r#"<div class="card"><h2>Attrition features</h2>{}<p>Rule-based risk score: <strong>{:.0}%</strong> · <a href="/attrition">Open the predictor</a></p></div>"#,
        table(&["Feature", "Value"], &feature_rows, ""),
        heuristic_risk(&p.features) * 100.0
    );

    let type_options = select_options(
        EmploymentType::iter().map(|t| (t.code(), t.label())),
        Some(e.employment_type.code()),
    );
    let status_options = select_options(
        EmployeeStatus::iter().map(|s| (s.code(), s.label())),
        Some(e.status.code()),
    );
    let _ = write!(
        body,
        r#"<div class="card"><h2>Update</h2><p class="muted">Only filled-in fields are changed.</p>
<form method="post" action="/employees/{id}/update" class="grid">
<label>Department<input name="department" placeholder="{dept}"></label>
<label>Position<input name="position" placeholder="{position}"></label>
<label>Grade<input name="grade" maxlength="20"></label>
<label>Email<input type="email" name="email"></label>
<label>Phone<input name="phone"></label>
<label>Monthly salary<input type="number" step="0.01" min="0" name="salary"></label>
<label>Performance rating<input type="number" step="0.1" min="1" max="5" name="performance_rating"></label>
<label>Monthly overtime hours<input type="number" step="0.5" min="0" name="overtime_hours"></label>
<label>Employment type<select name="employment_type">{type_options}</select></label>
<label>Status<select name="status">{status_options}</select></label>
<button type="submit">Save changes</button>
</form>
<p>{delete}</p></div>"#,
        id = e.id,
        dept = escape(&e.department),
        position = escape(&e.position),
        delete = action_button(
            &format!("/employees/{}/delete", e.id),
            "Delete employee",
            "danger",
            Some("Delete this employee and all their records?"),
        ),
    );

    page(ctx, &e.full_name(), &body)
}

pub async fn update_employee(
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Form<EmployeeForm>,
) -> HttpResponse {
    let employee_id = path.into_inner();
    let back = format!("/employees/{employee_id}");
    let today = Utc::now().date_naive();

    let fields = match update_payload(&payload, today) {
        Ok(fields) if fields.is_empty() => return Flash::NothingToUpdate.redirect(&back),
        Ok(fields) => fields,
        Err(()) => return Flash::InvalidEmployee.redirect(&back),
    };

    match fetch_employee(pool.get_ref(), employee_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return Flash::EmployeeNotFound.redirect("/employees"),
        Err(e) => {
            error!(error = %e, employee_id, "Failed to fetch employee");
            return Flash::DatabaseError.redirect(&back);
        }
    }

    let update = match build_update_sql("employees", &fields, EMPLOYEE_UPDATABLE, "id", employee_id) {
        Ok(update) => update,
        Err(_) => return Flash::InvalidEmployee.redirect(&back),
    };

    match execute_update(pool.get_ref(), update).await {
        Ok(_) => {
            info!(employee_id, fields = ?fields.keys().collect::<Vec<_>>(), "Employee updated");
            Flash::EmployeeUpdated.redirect(&back)
        }
        Err(e) => save_failure(&e, Some(employee_id), &back),
    }
}

pub async fn delete_employee(pool: web::Data<MySqlPool>, path: web::Path<u64>) -> HttpResponse {
    let employee_id = path.into_inner();

    let result = sqlx::query("DELETE FROM employees WHERE id = ?")
        .bind(employee_id)
        .execute(pool.get_ref())
        .await;

    match result {
        Ok(res) if res.rows_affected() == 0 => Flash::EmployeeNotFound.redirect("/employees"),
        Ok(_) => {
            info!(employee_id, "Employee deleted");
            Flash::EmployeeDeleted.redirect("/employees")
        }
        Err(e) => {
            error!(error = %e, employee_id, "Failed to delete employee");
            Flash::DatabaseError.redirect("/employees")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pages::test_support::{config, unreachable_pool};
    use actix_web::http::{StatusCode, header};
    use actix_web::{App, test as actix_test};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()
    }

    fn valid_form() -> EmployeeForm {
        EmployeeForm {
            employee_code: "EMP-100".into(),
            first_name: "Grace".into(),
            last_name: "Hopper".into(),
            email: "Grace@Example.com".into(),
            department: "Engineering".into(),
            salary: "6200".into(),
            performance_rating: "4.5".into(),
            hire_date: "2019-09-01".into(),
            ..EmployeeForm::default()
        }
    }

    #[test]
    fn new_employee_applies_defaults() {
        let e = NewEmployee::from_form(&valid_form(), today()).unwrap();
        assert_eq!(e.email, "grace@example.com");
        assert_eq!(e.position, "Staff");
        assert_eq!(e.employment_type, EmploymentType::FullTime);
        assert_eq!(e.status, EmployeeStatus::Active);
        assert_eq!(e.overtime_hours, 0.0);
        assert_eq!(e.performance_rating, Some(4.5));
        assert_eq!(e.phone, None);
    }

    #[test]
    fn new_employee_validation() {
        let cases: Vec<fn(&mut EmployeeForm)> = vec![
            |f| f.first_name = "  ".into(),
            |f| f.email = "not-an-email".into(),
            |f| f.salary = "-1".into(),
            |f| f.salary = "".into(),
            |f| f.performance_rating = "6".into(),
            |f| f.overtime_hours = "-3".into(),
            |f| f.hire_date = "2030-01-01".into(),
            |f| f.employment_type = "freelance".into(),
        ];
        for mutate in cases {
            let mut f = valid_form();
            mutate(&mut f);
            assert!(NewEmployee::from_form(&f, today()).is_err(), "{f:?} should be rejected");
        }
    }

    #[test]
    fn duplicate_code_or_email_gets_its_own_flash() {
        use crate::error::test_errors::duplicate_key;

        let location = |res: HttpResponse| res.headers().get(header::LOCATION).unwrap().to_str().unwrap().to_string();

        let res = save_failure(&duplicate_key(), None, "/employees");
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(res), "/employees?flash=duplicate_employee");
        assert_eq!(
            location(save_failure(&duplicate_key(), Some(3), "/employees/3")),
            "/employees/3?flash=duplicate_employee"
        );
        assert_eq!(
            location(save_failure(&sqlx::Error::PoolTimedOut, Some(3), "/employees/3")),
            "/employees/3?flash=database_error"
        );
    }

    #[test]
    fn update_payload_keeps_only_filled_fields() {
        let f = EmployeeForm {
            department: "Finance".into(),
            salary: "7000".into(),
            status: "on_leave".into(),
            ..EmployeeForm::default()
        };
        let map = update_payload(&f, today()).unwrap();
        assert_eq!(map.len(), 3);
        assert_eq!(map["department"], Value::String("Finance".into()));
        assert_eq!(map["salary"], Value::from(7000.0));
        assert_eq!(map["status"], Value::String("on_leave".into()));
        assert!(map.keys().all(|k| EMPLOYEE_UPDATABLE.contains(&k.as_str())));

        assert!(update_payload(&EmployeeForm::default(), today()).unwrap().is_empty());
        let bad = EmployeeForm {
            performance_rating: "0.5".into(),
            ..EmployeeForm::default()
        };
        assert!(update_payload(&bad, today()).is_err());
    }

    #[actix_web::test]
    async fn invalid_submission_redirects_with_error_flash() {
        let app = actix_test::init_service(
            App::new()
                .app_data(unreachable_pool())
                .app_data(config())
                .route("/employees", web::post().to(create_employee)),
        )
        .await;

        let req = actix_test::TestRequest::post()
            .uri("/employees")
            .set_form([("first_name", "Grace"), ("email", "nope")])
            .to_request();
        let res = actix_test::call_service(&app, req).await;

        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            res.headers().get(header::LOCATION).unwrap(),
            "/employees?flash=invalid_employee"
        );
    }

    #[actix_web::test]
    async fn listing_degrades_to_an_empty_table_when_the_database_is_down() {
        let app = actix_test::init_service(
            App::new()
                .app_data(unreachable_pool())
                .app_data(config())
                .route("/employees", web::get().to(list_employees)),
        )
        .await;

        let req = actix_test::TestRequest::get()
            .uri("/employees?search=%3Cb%3E&flash=employee_added")
            .to_request();
        let res = actix_test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::OK);

        let body = actix_test::read_body(res).await;
        let text = std::str::from_utf8(&body).unwrap();
        assert!(text.contains("No employees yet."));
        assert!(text.contains("Employee added."));
        assert!(text.contains(r#"value="&lt;b&gt;""#));
        assert!(text.contains(r#"<form method="post" action="/employees""#));
    }

    #[actix_web::test]
    async fn empty_update_is_reported_without_touching_the_database() {
        let app = actix_test::init_service(
            App::new()
                .app_data(unreachable_pool())
                .app_data(config())
                .route("/employees/{id}/update", web::post().to(update_employee)),
        )
        .await;

        let req = actix_test::TestRequest::post()
            .uri("/employees/4/update")
            .set_form([("department", " ")])
            .to_request();
        let res = actix_test::call_service(&app, req).await;
        assert_eq!(
            res.headers().get(header::LOCATION).unwrap(),
            "/employees/4?flash=nothing_to_update"
        );
    }
}
