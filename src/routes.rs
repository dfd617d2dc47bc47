use crate::{
    api,
    config::Config,
    pages::{
        allowances, attrition, bonus_structures, dashboard, employees, overview, payroll,
        salary_movements,
    },
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{guard, web};
use anyhow::{Result, anyhow};
use std::sync::Arc;

type Limiter = Arc<Governor<PeerIpKeyExtractor, NoOpMiddleware>>;

// Helper to build a per-IP limiter
fn build_limiter(requests_per_min: u32) -> Result<Limiter> {
    let per_ms = if requests_per_min == 0 {
        1
    } else {
        (60_000 / requests_per_min as u64).max(1)
    };
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .ok_or_else(|| anyhow!("invalid rate limit: {requests_per_min} requests per minute"))?;
    Ok(Arc::new(Governor::new(&cfg)))
}

/// Per-IP limiters, built once and shared by every worker.
#[derive(Clone)]
pub struct Limiters {
    form: Limiter,
    api: Limiter,
}

impl Limiters {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            form: build_limiter(config.rate_form_per_min)?,
            api: build_limiter(config.rate_api_per_min)?,
        })
    }
}

/// Rate-limited POST resource. Registered before the GET resource on the same path;
/// the guard makes the router fall through for other methods.
macro_rules! form_post {
    ($path:expr, $limiter:expr, $handler:expr) => {
        web::resource($path)
            .guard(guard::Post())
            .wrap($limiter.clone())
            .route(web::post().to($handler))
    };
}

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config, limiters: &Limiters) {
    pages(cfg, &limiters.form);

    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(limiters.api.clone()) // rate limiting
            .service(
                web::scope("/employees")
                    // /employees
                    .service(web::resource("").route(web::get().to(api::employee::list_employees)))
                    // /employees/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(api::employee::get_employee))
                            .route(web::patch().to(api::employee::update_employee))
                            .route(web::delete().to(api::employee::delete_employee)),
                    ),
            )
            .service(
                web::scope("/attrition")
                    .service(web::resource("/dataset").route(web::get().to(api::attrition::dataset)))
                    .service(
                        web::resource("/predictions")
                            .route(web::get().to(api::attrition::predictions_handler)),
                    ),
            )
            .service(
                web::resource("/compensation/movements")
                    .route(web::get().to(api::compensation::list_movements)),
            ),
    );
}

/// Server-rendered pages; every form POST goes through `form_limiter`.
fn pages(cfg: &mut web::ServiceConfig, form_limiter: &Limiter) {
    cfg.service(web::resource("/").route(web::get().to(dashboard::dashboard)))
        // employees
        .service(form_post!("/employees", form_limiter, employees::create_employee))
        .service(web::resource("/employees").route(web::get().to(employees::list_employees)))
        .service(web::resource("/employees/{id}").route(web::get().to(employees::show_employee)))
        .service(form_post!("/employees/{id}/update", form_limiter, employees::update_employee))
        .service(form_post!("/employees/{id}/delete", form_limiter, employees::delete_employee))
        // payroll
        .service(form_post!("/payroll/salary-records", form_limiter, payroll::create_salary_record))
        .service(
            web::resource("/payroll/salary-records").route(web::get().to(payroll::list_salary_records)),
        )
        .service(form_post!("/payroll/salary-records/{id}/paid", form_limiter, payroll::mark_salary_paid))
        .service(form_post!("/payroll/bonus-records", form_limiter, payroll::create_bonus_record))
        .service(web::resource("/payroll/bonus-records").route(web::get().to(payroll::list_bonus_records)))
        .service(form_post!("/payroll/bonus-records/{id}/status", form_limiter, payroll::set_bonus_status))
        // allowance matrix
        .service(form_post!("/compensation/allowances", form_limiter, allowances::create_allowance))
        .service(
            web::resource("/compensation/allowances").route(web::get().to(allowances::allowance_matrix)),
        )
        .service(form_post!("/compensation/allowances/{id}/toggle", form_limiter, allowances::toggle_allowance))
        .service(form_post!("/compensation/allowances/{id}/delete", form_limiter, allowances::delete_allowance))
        // bonus structures
        .service(form_post!(
            "/compensation/bonus-structures",
            form_limiter,
            bonus_structures::create_structure
        ))
        .service(
            web::resource("/compensation/bonus-structures")
                .route(web::get().to(bonus_structures::list_structures)),
        )
        .service(form_post!(
            "/compensation/bonus-structures/{id}/toggle",
            form_limiter,
            bonus_structures::toggle_structure
        ))
        .service(
            web::resource("/compensation/bonus-structures/{id}/preview")
                .route(web::get().to(bonus_structures::preview_structure)),
        )
        .service(form_post!(
            "/compensation/bonus-structures/{id}/apply",
            form_limiter,
            bonus_structures::apply_structure
        ))
        // salary movements
        .service(form_post!(
            "/compensation/salary-movements",
            form_limiter,
            salary_movements::submit_movement
        ))
        .service(
            web::resource("/compensation/salary-movements")
                .route(web::get().to(salary_movements::list_movements)),
        )
        .service(form_post!(
            "/compensation/salary-movements/{id}/approve",
            form_limiter,
            salary_movements::approve_movement
        ))
        .service(form_post!(
            "/compensation/salary-movements/{id}/reject",
            form_limiter,
            salary_movements::reject_movement
        ))
        // overview
        .service(web::resource("/compensation/overview").route(web::get().to(overview::compensation_overview)))
        // attrition
        .service(web::resource("/attrition").route(web::get().to(attrition::attrition_page)))
        .service(form_post!("/attrition/feedback", form_limiter, attrition::record_feedback));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;

    #[test]
    fn limiters_build_from_config() {
        assert!(Limiters::from_config(&test_config()).is_ok());
        assert!(build_limiter(1).is_ok());
        assert!(build_limiter(120_000).is_ok());
    }

    #[test]
    fn zero_rate_is_an_error_not_a_panic() {
        let err = build_limiter(0).err().unwrap();
        assert_eq!(err.to_string(), "invalid rate limit: 0 requests per minute");

        let config = Config {
            rate_api_per_min: 0,
            ..test_config()
        };
        assert!(Limiters::from_config(&config).is_err());
    }
}
