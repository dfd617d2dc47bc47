use actix_web::{HttpResponse, Responder, web};
use sqlx::MySqlPool;

use crate::attrition::service::{Dataset, PredictionCache, PredictionSet, load_dataset, predictions};
use crate::config::Config;
use crate::error::AppError;

/// Training dataset
///
/// Normalised feature vectors and training labels for every employee.
#[utoipa::path(
    get,
    path = "/api/attrition/dataset",
    responses(
        (status = 200, description = "Feature names and one row per employee", body = Dataset),
        (status = 500, description = "Internal server error", body = Object)
    ),
    tag = "Attrition"
)]
pub async fn dataset(pool: web::Data<MySqlPool>) -> Result<impl Responder, AppError> {
    let dataset = load_dataset(pool.get_ref()).await?;
    Ok(HttpResponse::Ok().json(dataset))
}

/// Server baseline predictions
///
/// Trains (or reuses a cached) network on the current dataset and scores current staff, highest risk first.
#[utoipa::path(
    get,
    path = "/api/attrition/predictions",
    responses(
        (status = 200, description = "Training report and predictions", body = PredictionSet),
        (status = 404, description = "No employees to train on", body = Object, example = json!({
            "message": "Training data not found"
        })),
        (status = 500, description = "Internal server error", body = Object)
    ),
    tag = "Attrition"
)]
pub async fn predictions_handler(
    pool: web::Data<MySqlPool>,
    cache: web::Data<PredictionCache>,
    config: web::Data<Config>,
) -> Result<impl Responder, AppError> {
    let (_, set) = predictions(pool.get_ref(), cache.get_ref(), &config).await?;
    let set = set.ok_or(AppError::NotFound("Training data"))?;
    Ok(HttpResponse::Ok().json(set.as_ref()))
}
