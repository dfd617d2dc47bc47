use actix_web::{HttpResponse, Responder, web};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use utoipa::{IntoParams, ToSchema};

use crate::error::AppError;
use crate::model::salary_movement::{MovementStatus, SalaryMovement};
use crate::pages::salary_movements::fetch_movements;

#[derive(Debug, Deserialize, IntoParams)]
pub struct MovementQuery {
    /// pending, approved or rejected; omit for all
    pub status: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MovementResponse {
    #[serde(flatten)]
    pub movement: SalaryMovement,
    pub employee_name: String,
    /// `None` when the previous salary was zero.
    pub change_percent: Option<f64>,
}

/// List salary movements
#[utoipa::path(
    get,
    path = "/api/compensation/movements",
    params(MovementQuery),
    responses(
        (status = 200, description = "Movements, newest effective date first", body = Vec<MovementResponse>),
        (status = 400, description = "Unknown status", body = Object, example = json!({
            "message": "Unknown status: archived"
        }))
    ),
    tag = "Compensation"
)]
pub async fn list_movements(
    pool: web::Data<MySqlPool>,
    query: web::Query<MovementQuery>,
) -> Result<impl Responder, AppError> {
    let status = match query.status.as_deref().filter(|s| !s.is_empty()) {
        Some(s) => Some(
            s.parse::<MovementStatus>()
                .map_err(|_| AppError::Validation(format!("Unknown status: {s}")))?,
        ),
        None => None,
    };

    let rows = fetch_movements(pool.get_ref(), status).await?;
    let data: Vec<MovementResponse> = rows
        .into_iter()
        .map(|row| MovementResponse {
            change_percent: row.movement.change_percent(),
            movement: row.movement,
            employee_name: row.employee_name,
        })
        .collect();

    Ok(HttpResponse::Ok().json(data))
}
