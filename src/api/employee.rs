use crate::{
    error::{AppError, is_constraint_violation},
    model::employee::{EMPLOYEE_COLUMNS, Employee, EmployeeStatus, EmploymentType},
    pages::employees::{EMPLOYEE_UPDATABLE, fetch_employee},
    utils::{
        db_utils::{build_update_sql, execute_update},
        form,
    },
};
use actix_web::{HttpResponse, Responder, web};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use sqlx::MySqlPool;
use tracing::{debug, info};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Deserialize, IntoParams)]
pub struct EmployeeQuery {
    /// Page number, from 1
    pub page: Option<u32>,
    /// Items per page (1-100)
    pub per_page: Option<u32>,
    pub department: Option<String>,
    pub status: Option<String>,
    /// Matches name, email or employee code
    pub search: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct EmployeeListResponse {
    pub data: Vec<Employee>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 20)]
    pub per_page: u32,
    #[schema(example = 57)]
    pub total: i64,
}

/// Checks a PATCH body against the same rules as the edit form.
pub fn validate_patch(body: &Map<String, Value>, today: NaiveDate) -> Result<(), AppError> {
    let invalid = |field: &str| AppError::Validation(format!("Invalid value for {field}"));

    for (field, value) in body {
        let ok = match (field.as_str(), value) {
            ("first_name" | "last_name" | "department" | "position", Value::String(s)) => !s.trim().is_empty(),
            ("phone" | "grade", Value::String(_) | Value::Null) => true,
            ("email", Value::String(s)) => form::valid_email(s),
            ("employment_type", Value::String(s)) => s.parse::<EmploymentType>().is_ok(),
            ("status", Value::String(s)) => s.parse::<EmployeeStatus>().is_ok(),
            ("salary" | "overtime_hours", Value::Number(n)) => n.as_f64().is_some_and(|v| v >= 0.0),
            ("performance_rating", Value::Null) => true,
            ("performance_rating", Value::Number(n)) => n.as_f64().is_some_and(|v| (1.0..=5.0).contains(&v)),
            ("date_of_birth", Value::Null) => true,
            ("date_of_birth", Value::String(s)) => {
                NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok_and(|d| d < today)
            }
            ("hire_date", Value::String(s)) => {
                NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok_and(|d| d <= today)
            }
            // unknown columns are reported by the UPDATE builder
            (f, _) if !EMPLOYEE_UPDATABLE.contains(&f) => true,
            _ => false,
        };
        if !ok {
            return Err(invalid(field));
        }
    }
    Ok(())
}

/// List employees
#[utoipa::path(
    get,
    path = "/api/employees",
    params(EmployeeQuery),
    responses(
        (status = 200, description = "Paginated employee list", body = EmployeeListResponse),
        (status = 500, description = "Internal server error", body = Object, example = json!({
            "message": "database error"
        }))
    ),
    tag = "Employee"
)]
pub async fn list_employees(
    pool: web::Data<MySqlPool>,
    query: web::Query<EmployeeQuery>,
) -> Result<impl Responder, AppError> {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(20).clamp(1, 100);
    let offset = (page - 1) * per_page;

    // ---------- build WHERE clause dynamically ----------
    let mut conditions = Vec::new();
    let mut bindings: Vec<String> = Vec::new();

    if let Some(department) = query.department.as_deref().filter(|d| !d.is_empty()) {
        conditions.push("e.department = ?");
        bindings.push(department.to_string());
    }

    if let Some(status) = query.status.as_deref().filter(|s| !s.is_empty()) {
        conditions.push("e.status = ?");
        bindings.push(status.to_string());
    }

    if let Some(search) = query.search.as_deref().filter(|s| !s.is_empty()) {
        conditions.push("(e.first_name LIKE ? OR e.last_name LIKE ? OR e.email LIKE ? OR e.employee_code LIKE ?)");
        let like = format!("%{}%", search);
        bindings.extend(std::iter::repeat_n(like, 4));
    }

    let where_clause = if conditions.is_empty() {
        "".to_string()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    // ---------- total count ----------
    let count_sql = format!("SELECT COUNT(*) AS total FROM employees e {}", where_clause);
    debug!(sql = %count_sql, bindings = ?bindings, "Counting employees");

    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    for b in &bindings {
        count_query = count_query.bind(b);
    }
    let total = count_query.fetch_one(pool.get_ref()).await?;

    // ---------- data query ----------
    let data_sql = format!(
        "SELECT {EMPLOYEE_COLUMNS} FROM employees e {} ORDER BY e.id DESC LIMIT ? OFFSET ?",
        where_clause
    );
    debug!(sql = %data_sql, bindings = ?bindings, page, per_page, offset, "Fetching employees");

    let mut data_query = sqlx::query_as::<_, Employee>(&data_sql);
    for b in &bindings {
        data_query = data_query.bind(b);
    }
    data_query = data_query.bind(per_page as i64).bind(offset as i64);

    let employees = data_query.fetch_all(pool.get_ref()).await?;

    Ok(HttpResponse::Ok().json(EmployeeListResponse {
        data: employees,
        page,
        per_page,
        total,
    }))
}

/// Get employee by id
#[utoipa::path(
    get,
    path = "/api/employees/{employee_id}",
    params(
        ("employee_id", Path, description = "Employee ID")
    ),
    responses(
        (status = 200, description = "Employee found", body = Employee),
        (status = 404, description = "Employee not found", body = Object, example = json!({
            "message": "Employee not found"
        }))
    ),
    tag = "Employee"
)]
pub async fn get_employee(pool: web::Data<MySqlPool>, path: web::Path<u64>) -> Result<impl Responder, AppError> {
    let employee_id = path.into_inner();

    let employee = fetch_employee(pool.get_ref(), employee_id)
        .await?
        .ok_or(AppError::NotFound("Employee"))?;

    Ok(HttpResponse::Ok().json(employee))
}

/// Partially update an employee
///
/// Accepts any subset of the editable columns.
#[utoipa::path(
    patch,
    path = "/api/employees/{employee_id}",
    params(
        ("employee_id", Path, description = "Employee ID")
    ),
    request_body(content = Object, example = json!({ "department": "Finance", "salary": 5400.0 })),
    responses(
        (status = 200, description = "Updated employee", body = Employee),
        (status = 400, description = "Invalid field or value", body = Object, example = json!({
            "message": "Field cannot be updated: id"
        })),
        (status = 404, description = "Employee not found", body = Object, example = json!({
            "message": "Employee not found"
        }))
    ),
    tag = "Employee"
)]
pub async fn update_employee(
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> Result<impl Responder, AppError> {
    let employee_id = path.into_inner();

    let Value::Object(fields) = body.into_inner() else {
        return Err(AppError::Validation("Expected a JSON object".into()));
    };
    validate_patch(&fields, Utc::now().date_naive())?;
    let update = build_update_sql("employees", &fields, EMPLOYEE_UPDATABLE, "id", employee_id)?;

    if fetch_employee(pool.get_ref(), employee_id).await?.is_none() {
        return Err(AppError::NotFound("Employee"));
    }

    execute_update(pool.get_ref(), update).await.map_err(|e| {
        if is_constraint_violation(&e) {
            AppError::Validation("Employee code or email already in use".into())
        } else {
            AppError::Database(e)
        }
    })?;
    info!(employee_id, fields = ?fields.keys().collect::<Vec<_>>(), "Employee updated via API");

    let employee = fetch_employee(pool.get_ref(), employee_id)
        .await?
        .ok_or(AppError::NotFound("Employee"))?;
    Ok(HttpResponse::Ok().json(employee))
}

/// Delete an employee and their records
#[utoipa::path(
    delete,
    path = "/api/employees/{employee_id}",
    params(
        ("employee_id", Path, description = "Employee ID")
    ),
    responses(
        (status = 200, description = "Successfully deleted", body = Object, example = json!({
            "message": "Successfully deleted"
        })),
        (status = 404, description = "Employee not found", body = Object, example = json!({
            "message": "Employee not found"
        }))
    ),
    tag = "Employee"
)]
pub async fn delete_employee(pool: web::Data<MySqlPool>, path: web::Path<u64>) -> Result<impl Responder, AppError> {
    let employee_id = path.into_inner();

    let res = sqlx::query("DELETE FROM employees WHERE id = ?")
        .bind(employee_id)
        .execute(pool.get_ref())
        .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound("Employee"));
    }
    info!(employee_id, "Employee deleted via API");

    Ok(HttpResponse::Ok().json(json!({
        "message": "Successfully deleted"
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pages::test_support::unreachable_pool;
    use actix_web::http::StatusCode;
    use actix_web::{App, test as actix_test};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    fn object(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn patch_values_are_validated() {
        assert!(validate_patch(&object(json!({ "salary": 4200.0, "status": "on_leave", "phone": null })), today()).is_ok());

        for bad in [
            json!({ "salary": -1 }),
            json!({ "performance_rating": 9 }),
            json!({ "email": "nobody" }),
            json!({ "email": "@example.com" }),
            json!({ "status": "retired" }),
            json!({ "first_name": "  " }),
            json!({ "hire_date": "2031-01-01" }),
            json!({ "salary": "a lot" }),
        ] {
            assert!(validate_patch(&object(bad.clone()), today()).is_err(), "{bad}");
        }
    }

    #[actix_web::test]
    async fn patch_rejects_non_whitelisted_columns() {
        let app = actix_test::init_service(
            App::new()
                .app_data(unreachable_pool())
                .route("/api/employees/{id}", web::patch().to(update_employee)),
        )
        .await;

        let req = actix_test::TestRequest::patch()
            .uri("/api/employees/1")
            .set_json(json!({ "id": 99 }))
            .to_request();
        let res = actix_test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let body: Value = actix_test::read_body_json(res).await;
        assert_eq!(body["message"], "Field cannot be updated: id");
    }

    #[actix_web::test]
    async fn patch_rejects_arrays() {
        let app = actix_test::init_service(
            App::new()
                .app_data(unreachable_pool())
                .route("/api/employees/{id}", web::patch().to(update_employee)),
        )
        .await;

        let req = actix_test::TestRequest::patch()
            .uri("/api/employees/1")
            .set_json(json!([1, 2]))
            .to_request();
        let res = actix_test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn database_failures_are_json_500s() {
        let app = actix_test::init_service(
            App::new()
                .app_data(unreachable_pool())
                .route("/api/employees/{id}", web::get().to(get_employee)),
        )
        .await;

        let res = actix_test::call_service(&app, actix_test::TestRequest::get().uri("/api/employees/1").to_request()).await;
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = actix_test::read_body_json(res).await;
        assert_eq!(body["message"], "database error");
    }
}
