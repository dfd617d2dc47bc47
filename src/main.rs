use actix_web::middleware::{NormalizePath, from_fn};
use actix_web::web::Data;
use actix_web::{App, HttpServer};
use std::io;

mod api;
mod attrition;
mod config;
mod db;
mod docs;
mod error;
mod model;
mod pages;
mod routes;
mod utils;
mod view;

use config::Config;
use db::{ensure_schema, init_db};

use crate::attrition::service::{PredictionCache, warmup_predictions};
use crate::docs::ApiDoc;
use tracing::{error, info};
use tracing_appender::rolling;
use utoipa::OpenApi; // ← needed for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

#[actix_web::main]
async fn main() -> io::Result<()> {
    let config = Config::from_env().map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, format!("{e:#}")))?;

    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!(addr = %config.server_addr, "Server starting...");

    let pool = init_db(&config.database_url, config.db_max_connections)
        .await
        .map_err(|e| {
            error!(error = %e, "Could not connect to the database");
            io::Error::new(io::ErrorKind::ConnectionRefused, e.to_string())
        })?;

    ensure_schema(&pool).await.map_err(|e| {
        error!(error = %e, "Schema bootstrap failed");
        io::Error::other(e.to_string())
    })?;

    let cache = PredictionCache::new(config.prediction_cache_ttl);
    let limiters = routes::Limiters::from_config(&config)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, format!("{e:#}")))?;

    // Clone values for the closures (avoid move issues)
    let server_addr = config.server_addr.clone();
    let pool_for_warmup = pool.clone();
    let cache_for_warmup = cache.clone();
    let config_for_warmup = config.clone();

    actix_web::rt::spawn(async move {
        if let Err(e) = warmup_predictions(&pool_for_warmup, &cache_for_warmup, &config_for_warmup).await {
            error!(error = %e, "Failed to warm up attrition predictions");
        }
    });

    HttpServer::new(move || {
        App::new()
            .wrap(from_fn(view::responsive::responsive_middleware))
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // ← wildcard {_:.*} to match JS/CSS files
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(Data::new(pool.clone()))
            .app_data(Data::new(config.clone()))
            .app_data(Data::new(cache.clone()))
            // Pages + JSON API, with per-IP rate limiting
            .configure(|cfg| routes::configure(cfg, &config, &limiters))
    })
    .bind(server_addr)?
    .run()
    .await
}
