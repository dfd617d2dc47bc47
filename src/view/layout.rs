use actix_web::HttpResponse;
use actix_web::http::header::ContentType;
use std::fmt::Write;

use super::escape;
use super::flash::{Flash, FlashKind};
use crate::config::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nav {
    Dashboard,
    Employees,
    SalaryRecords,
    BonusRecords,
    Allowances,
    BonusStructures,
    SalaryMovements,
    Overview,
    Attrition,
}

const NAV_ITEMS: &[(Nav, &str, &str)] = &[
    (Nav::Dashboard, "/", "Dashboard"),
    (Nav::Employees, "/employees", "Employees"),
    (Nav::SalaryRecords, "/payroll/salary-records", "Salary records"),
    (Nav::BonusRecords, "/payroll/bonus-records", "Bonus records"),
    (Nav::Allowances, "/compensation/allowances", "Allowance matrix"),
    (Nav::BonusStructures, "/compensation/bonus-structures", "Bonus structures"),
    (Nav::SalaryMovements, "/compensation/salary-movements", "Salary movements"),
    (Nav::Overview, "/compensation/overview", "Bonuses & movements"),
    (Nav::Attrition, "/attrition", "AI attrition predictor"),
];

const BASE_CSS: &str = r#"
*{box-sizing:border-box}
body{margin:0;font-family:system-ui,-apple-system,"Segoe UI",Roboto,sans-serif;background:#f4f6fa;color:#1f2933}
header.topbar{background:#1e3a5f;color:#fff;padding:.75rem 1.5rem;display:flex;align-items:center;gap:1rem}
header.topbar .brand{font-weight:700;font-size:1.1rem}
nav.main{background:#274b78;display:flex;flex-wrap:wrap}
nav.main a{color:#dbe7f5;text-decoration:none;padding:.6rem 1rem;font-size:.92rem}
nav.main a.active,nav.main a:hover{background:#17314f;color:#fff}
main{max-width:1200px;margin:1.5rem auto;padding:0 1.5rem}
h1{font-size:1.5rem;margin:0 0 1rem}
h2{font-size:1.15rem;margin:1.5rem 0 .75rem}
.card{background:#fff;border-radius:8px;box-shadow:0 1px 3px rgba(0,0,0,.08);padding:1.25rem;margin-bottom:1.25rem}
.stats{display:grid;grid-template-columns:repeat(auto-fit,minmax(180px,1fr));gap:1rem}
.stat{background:#fff;border-radius:8px;padding:1rem;box-shadow:0 1px 3px rgba(0,0,0,.08)}
.stat .value{font-size:1.4rem;font-weight:700}
.stat .label{color:#616e7c;font-size:.85rem}
table{width:100%;border-collapse:collapse;background:#fff}
th,td{padding:.5rem .6rem;border-bottom:1px solid #e4e7eb;text-align:left;font-size:.9rem}
th{background:#f0f4f8;font-weight:600}
td.num,th.num{text-align:right;font-variant-numeric:tabular-nums}
form.grid{display:grid;grid-template-columns:repeat(auto-fit,minmax(200px,1fr));gap:.75rem;align-items:end}
form.inline{display:inline}
label{display:flex;flex-direction:column;font-size:.85rem;gap:.25rem;color:#3e4c59}
input,select,textarea{padding:.45rem .5rem;border:1px solid #cbd2d9;border-radius:4px;font:inherit}
button{padding:.45rem .9rem;border:0;border-radius:4px;background:#2f80ed;color:#fff;cursor:pointer;font:inherit}
button.danger{background:#d64545}
button.secondary{background:#7b8794}
button.small{padding:.2rem .5rem;font-size:.8rem}
.flash{padding:.75rem 1rem;border-radius:6px;margin-bottom:1rem}
.flash.success{background:#e3f9e5;color:#0e5814}
.flash.error{background:#ffe3e3;color:#8a041a}
.badge{display:inline-block;padding:.1rem .5rem;border-radius:999px;font-size:.75rem;background:#e4e7eb}
.badge.active,.badge.approved,.badge.paid,.badge.stayed{background:#e3f9e5;color:#0e5814}
.badge.pending,.badge.on_leave{background:#fff3c4;color:#8d5b00}
.badge.rejected,.badge.resigned,.badge.terminated,.badge.left{background:#ffe3e3;color:#8a041a}
.risk-high{color:#c62828;font-weight:700}.risk-mid{color:#b26a00}.risk-low{color:#2e7d32}
.muted{color:#7b8794}
"#;

#[derive(Debug, Clone)]
pub struct PageContext {
    pub app_name: String,
    pub currency: String,
    pub active: Nav,
    pub flash: Option<Flash>,
}

impl PageContext {
    pub fn new(config: &Config, active: Nav, flash: Option<Flash>) -> Self {
        Self {
            app_name: config.app_name.clone(),
            currency: config.currency.clone(),
            active,
            flash,
        }
    }

    pub fn money(&self, amount: f64) -> String {
        super::money(amount, &self.currency)
    }
}

/// Wraps `body` in the shared document shell.
pub fn page(ctx: &PageContext, title: &str, body: &str) -> String {
    let mut nav = String::new();
    for (item, href, label) in NAV_ITEMS {
        let class = if *item == ctx.active { r#" class="active""# } else { "" };
        let _ = write!(nav, r#"<a href="{href}"{class}>{label}</a>"#);
    }

    let flash = ctx
        .flash
        .map(|f| {
            let kind = match f.kind() {
                FlashKind::Success => "success",
                FlashKind::Error => "error",
            };
            format!(r#"<div class="flash {kind}" role="status">{}</div>"#, escape(f.message()))
        })
        .unwrap_or_default();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title} · {app}</title>
<style>{BASE_CSS}</style>
</head>
<body>
<header class="topbar"><span class="brand">{app}</span></header>
<nav class="main">{nav}</nav>
<main>
<h1>{title}</h1>
{flash}
{body}
</main>
</body>
</html>"#,
        title = escape(title),
        app = escape(&ctx.app_name),
    )
}

pub fn html(document: String) -> HttpResponse {
    HttpResponse::Ok()
        .content_type(ContentType::html())
        .body(document)
}

pub fn not_found(ctx: &PageContext, what: &str) -> HttpResponse {
    let body = format!(
        r#"<div class="card"><p>{} not found.</p><p><a href="/">Back to the dashboard</a></p></div>"#,
        escape(what)
    );
    HttpResponse::NotFound()
        .content_type(ContentType::html())
        .body(page(ctx, "Not found", &body))
}
