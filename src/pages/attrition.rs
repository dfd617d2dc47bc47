use actix_web::{HttpResponse, Responder, web};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use std::fmt::Write;
use tracing::{error, info, warn};

use super::or_empty;
use crate::attrition::features::FEATURE_NAMES;
use crate::attrition::network::ATTRITION_LAYERS;
use crate::attrition::service::{Dataset, PredictionCache, PredictionSet, load_dataset, predictions};
use crate::config::Config;
use crate::model::training_data::{Outcome, TrainingFeedback};
use crate::utils::form;
use crate::view::flash::{Flash, FlashQuery};
use crate::view::layout::{Nav, PageContext, html, page};
use crate::view::{escape, opt_text, table};

const ATTRITION: &str = "/attrition";
const TFJS_URL: &str = "https://cdn.jsdelivr.net/npm/@tensorflow/tfjs@4.17.0/dist/tf.min.js";
const RECENT_FEEDBACK: u32 = 20;

/// Row shape of the JSON embedded for the browser trainer.
#[derive(Debug, Serialize)]
struct ClientRow<'a> {
    id: u64,
    name: &'a str,
    department: &'a str,
    has_left: bool,
    features: &'a [f64],
    label: f64,
    server_risk: Option<f64>,
}

#[derive(Debug, Serialize)]
struct ClientPayload<'a> {
    feature_names: &'a [&'static str],
    hidden_layers: &'a [usize],
    epochs: usize,
    rows: Vec<ClientRow<'a>>,
}

/// JSON for a `<script type="application/json">` block; `</` is escaped so the data cannot close the tag.
pub fn client_json(dataset: &Dataset, set: Option<&PredictionSet>, epochs: usize) -> String {
    let layers = ATTRITION_LAYERS;
    let payload = ClientPayload {
        feature_names: &FEATURE_NAMES,
        hidden_layers: &layers[1..layers.len() - 1],
        epochs,
        rows: dataset
            .rows
            .iter()
            .map(|r| ClientRow {
                id: r.employee_id,
                name: &r.name,
                department: &r.department,
                has_left: r.has_left,
                features: r.features.as_slice(),
                label: r.label,
                server_risk: set.and_then(|s| s.risk_for(r.employee_id)),
            })
            .collect(),
    };
    serde_json::to_string(&payload)
        .unwrap_or_else(|_| "{}".to_string())
        .replace("</", "<\\/")
}

fn risk_cell(risk: f64) -> String {
    let class = if risk >= 0.7 {
        "risk-high"
    } else if risk >= 0.4 {
        "risk-mid"
    } else {
        "risk-low"
    };
    format!(r#"<span class="{class}">{:.0}%</span>"#, risk * 100.0)
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FeedbackRow {
    #[sqlx(flatten)]
    pub feedback: TrainingFeedback,
    pub employee_name: String,
}

pub async fn attrition_page(
    pool: web::Data<MySqlPool>,
    cache: web::Data<PredictionCache>,
    config: web::Data<Config>,
    flash: web::Query<FlashQuery>,
) -> impl Responder {
    let (dataset, set) = match predictions(pool.get_ref(), cache.get_ref(), &config).await {
        Ok(result) => result,
        Err(e) => {
            error!(error = %e, "Failed to prepare attrition predictions");
            (Default::default(), None)
        }
    };

    let feedback = or_empty(
        sqlx::query_as::<_, FeedbackRow>(
            r#"
            SELECT t.id, t.employee_id, CONCAT(e.first_name, ' ', e.last_name) AS employee_name,
                   t.predicted_risk, t.actual_outcome, t.features, t.notes, t.created_at
            FROM training_data t
            JOIN employees e ON e.id = t.employee_id
            ORDER BY t.created_at DESC, t.id DESC
            LIMIT ?
            "#,
        )
        .bind(RECENT_FEEDBACK)
        .fetch_all(pool.get_ref())
        .await,
        "training feedback",
    );

    let ctx = PageContext::new(&config, Nav::Attrition, flash.flash());
    html(render_page(&ctx, &dataset, set.as_deref(), &feedback, config.attrition_epochs))
}

fn render_page(
    ctx: &PageContext,
    dataset: &Dataset,
    set: Option<&PredictionSet>,
    feedback: &[FeedbackRow],
    epochs: usize,
) -> String {
    let mut body = String::new();

    let leavers = dataset.rows.iter().filter(|r| r.has_left).count();
    let _ = write!(
        body,
        r#"<div class="stats">
<div class="stat"><div class="value">{}</div><div class="label">Employees in the dataset</div></div>
<div class="stat"><div class="value">{leavers}</div><div class="label">Already left</div></div>
<div class="stat"><div class="value">{:.0}%</div><div class="label">Labelled at risk</div></div>
<div class="stat"><div class="value">{}</div><div class="label">Server baseline accuracy</div></div>
</div>"#,
        dataset.rows.len(),
        dataset.positive_share() * 100.0,
        set.map(|s| format!("{:.0}%", s.report.accuracy * 100.0))
            .unwrap_or_else(|| "&mdash;".to_string()),
    );

    if dataset.is_empty() {
        body.push_str(
            r#"<div class="card"><p class="muted">Add employees first: the predictor trains on the current staff list.</p></div>"#,
        );
        return page(ctx, "AI attrition predictor", &body);
    }

    let _ = write!(
        body,
        r#"<div class="card"><h2>Train in the browser</h2>
<p>Trains a {layers} network with TensorFlow.js on the features below ({epochs} epochs, 20% validation split). Nothing leaves your browser.</p>
<p><button type="button" id="train-btn" disabled>Train model</button> <span id="train-status" class="muted">Loading TensorFlow.js…</span></p>
<progress id="train-progress" max="{epochs}" value="0" style="width:100%"></progress>
<p class="muted">Features: {features}</p></div>"#,
        layers = ATTRITION_LAYERS.map(|n| n.to_string()).join("-"),
        features = FEATURE_NAMES.join(", "),
    );

    let predictions = set.map(|s| s.predictions.as_slice()).unwrap_or_default();
    let rows: Vec<String> = predictions
        .iter()
        .map(|p| {
            format!(
                r#"<tr><td><a href="/employees/{id}">{}</a></td><td>{}</td><td class="num">{}</td><td class="num">{}</td><td class="num" id="browser-risk-{id}">&mdash;</td><td>{}</td><td><form method="post" action="{ATTRITION}/feedback" class="inline"><input type="hidden" name="employee_id" value="{id}"><input type="hidden" name="predicted_risk" id="predicted-risk-{id}" value="{:.4}"><input name="notes" placeholder="Notes" size="10"> <button type="submit" name="actual_outcome" value="stayed" class="small secondary">Stayed</button> <button type="submit" name="actual_outcome" value="left" class="small danger">Left</button></form></td></tr>"#,
                escape(&p.name),
                escape(&p.department),
                risk_cell(p.heuristic_risk),
                risk_cell(p.risk),
                p.source.label(),
                p.risk,
                id = p.employee_id,
            )
        })
        .collect();
    let _ = write!(
        body,
        r#"<div class="card"><h2>Current staff</h2>{}</div>"#,
        table(
            &["Employee", "Department", "Rule score", "Server model", "Browser model", "Label source", "Record outcome"],
            &rows,
            "The server model is unavailable; train in the browser instead."
        )
    );

    let feedback_rows: Vec<String> = feedback
        .iter()
        .map(|row| {
            let f = &row.feedback;
            format!(
                r#"<tr><td>{}</td><td><a href="/employees/{}">{}</a></td><td class="num">{}</td><td><span class="badge {}">{}</span></td><td>{}</td></tr>"#,
                f.created_at.format("%Y-%m-%d %H:%M"),
                f.employee_id,
                escape(&row.employee_name),
                risk_cell(f.predicted_risk),
                f.actual_outcome.code(),
                f.actual_outcome.label(),
                opt_text(f.notes.as_deref()),
            )
        })
        .collect();
    let _ = write!(
        body,
        r#"<div class="card"><h2>Recent feedback</h2>{}<p class="muted">Recorded outcomes replace the rule-based labels on the next training run.</p></div>"#,
        table(&["When", "Employee", "Predicted", "Outcome", "Notes"], &feedback_rows, "No feedback recorded yet.")
    );

    let _ = write!(
        body,
        r#"<script type="application/json" id="attrition-data">{}</script>
<script src="{TFJS_URL}"></script>
<script>{TRAINER_JS}</script>"#,
        client_json(dataset, set, epochs)
    );

    page(ctx, "AI attrition predictor", &body)
}

const TRAINER_JS: &str = r#"
(function () {
  var data = JSON.parse(document.getElementById('attrition-data').textContent);
  var btn = document.getElementById('train-btn');
  var status = document.getElementById('train-status');
  var progress = document.getElementById('train-progress');

  if (typeof tf === 'undefined') {
    status.textContent = 'TensorFlow.js could not be loaded.';
    return;
  }
  btn.disabled = false;
  status.textContent = data.rows.length + ' rows ready.';

  function riskClass(r) { return r >= 0.7 ? 'risk-high' : (r >= 0.4 ? 'risk-mid' : 'risk-low'); }

  btn.addEventListener('click', async function () {
    btn.disabled = true;
    progress.value = 0;
    var width = data.feature_names.length;
    var model = tf.sequential();
    data.hidden_layers.forEach(function (units, i) {
      var layer = { units: units, activation: 'relu' };
      if (i === 0) { layer.inputShape = [width]; }
      model.add(tf.layers.dense(layer));
    });
    model.add(tf.layers.dense({ units: 1, activation: 'sigmoid' }));
    model.compile({ optimizer: 'adam', loss: 'binaryCrossentropy', metrics: ['accuracy'] });

    var xs = tf.tensor2d(data.rows.map(function (r) { return r.features; }), [data.rows.length, width]);
    var ys = tf.tensor2d(data.rows.map(function (r) { return [r.label]; }), [data.rows.length, 1]);
    try {
      await model.fit(xs, ys, {
        epochs: data.epochs,
        shuffle: true,
        validationSplit: data.rows.length >= 5 ? 0.2 : 0,
        callbacks: {
          onEpochEnd: function (epoch, logs) {
            progress.value = epoch + 1;
            status.textContent = 'Epoch ' + (epoch + 1) + '/' + data.epochs + ' · loss ' + logs.loss.toFixed(4)
              + (logs.acc !== undefined ? ' · accuracy ' + (logs.acc * 100).toFixed(1) + '%' : '');
          }
        }
      });
      var scores = model.predict(xs).dataSync();
      data.rows.forEach(function (r, i) {
        var cell = document.getElementById('browser-risk-' + r.id);
        if (!cell) { return; }
        var span = document.createElement('span');
        span.className = riskClass(scores[i]);
        span.textContent = (scores[i] * 100).toFixed(0) + '%';
        cell.replaceChildren(span);
        var hidden = document.getElementById('predicted-risk-' + r.id);
        if (hidden) { hidden.value = scores[i].toFixed(4); }
      });
      status.textContent += ' · done. Feedback now records the browser prediction.';
    } catch (err) {
      status.textContent = 'Training failed: ' + err.message;
    } finally {
      xs.dispose();
      ys.dispose();
      btn.disabled = false;
    }
  });
})();
"#;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FeedbackForm {
    pub employee_id: String,
    pub predicted_risk: String,
    pub actual_outcome: String,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewFeedback {
    pub employee_id: u64,
    pub predicted_risk: f64,
    pub actual_outcome: Outcome,
    pub notes: Option<String>,
}

impl NewFeedback {
    pub fn from_form(f: &FeedbackForm) -> Result<Self, ()> {
        let predicted_risk = form::number(&f.predicted_risk)?;
        if !(0.0..=1.0).contains(&predicted_risk) {
            return Err(());
        }
        Ok(Self {
            employee_id: form::required(&f.employee_id)?,
            predicted_risk,
            actual_outcome: form::required(&f.actual_outcome)?,
            notes: form::text(&f.notes),
        })
    }
}

pub async fn record_feedback(pool: web::Data<MySqlPool>, payload: web::Form<FeedbackForm>) -> HttpResponse {
    let feedback = match NewFeedback::from_form(&payload) {
        Ok(f) => f,
        Err(()) => return Flash::InvalidFeedback.redirect(ATTRITION),
    };

    // snapshot the features the prediction was made on
    let dataset = match load_dataset(pool.get_ref()).await {
        Ok(d) => d,
        Err(e) => {
            error!(error = %e, "Failed to load attrition dataset");
            return Flash::DatabaseError.redirect(ATTRITION);
        }
    };
    let Some(row) = dataset.rows.iter().find(|r| r.employee_id == feedback.employee_id) else {
        warn!(employee_id = feedback.employee_id, "Feedback for unknown employee");
        return Flash::InvalidFeedback.redirect(ATTRITION);
    };
    let features = match serde_json::to_string(&row.features) {
        Ok(json) => json,
        Err(e) => {
            error!(error = %e, "Failed to serialise features");
            return Flash::DatabaseError.redirect(ATTRITION);
        }
    };

    let result = sqlx::query(
        r#"
        INSERT INTO training_data (employee_id, predicted_risk, actual_outcome, features, notes)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(feedback.employee_id)
    .bind(feedback.predicted_risk)
    .bind(feedback.actual_outcome.code())
    .bind(features)
    .bind(&feedback.notes)
    .execute(pool.get_ref())
    .await;

    match result {
        Ok(res) => {
            info!(
                feedback_id = res.last_insert_id(),
                employee_id = feedback.employee_id,
                outcome = feedback.actual_outcome.code(),
                "Training feedback recorded"
            );
            Flash::FeedbackSaved.redirect(ATTRITION)
        }
        Err(e) => {
            error!(error = %e, "Failed to record training feedback");
            Flash::DatabaseError.redirect(ATTRITION)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrition::network::TrainingConfig;
    use crate::attrition::service::tests::rows;
    use crate::attrition::service::train_and_predict;
    use crate::config::test_config;
    use crate::pages::test_support::unreachable_pool;
    use actix_web::http::header;
    use actix_web::{App, test as actix_test};
    use chrono::NaiveDate;
    use std::collections::HashMap;

    fn dataset() -> Dataset {
        let mut rows = rows();
        rows[0].employee.last_name = "</script><b>".into();
        Dataset::build(&rows, &HashMap::new(), NaiveDate::from_ymd_opt(2025, 6, 15).unwrap())
    }

    #[test]
    fn embedded_json_cannot_close_the_script_tag() {
        let json = client_json(&dataset(), None, 40);
        assert!(!json.contains("</script>"));
        assert!(json.contains(r#"<\/script>"#));

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["epochs"], 40);
        assert_eq!(value["hidden_layers"], serde_json::json!([16, 8]));
        assert_eq!(value["rows"].as_array().unwrap().len(), 3);
        assert_eq!(value["rows"][0]["features"].as_array().unwrap().len(), 9);
        assert!(value["rows"][0]["server_risk"].is_null());
    }

    #[test]
    fn page_lists_current_staff_with_server_risk() {
        let dataset = dataset();
        let set = train_and_predict(&dataset, &TrainingConfig { epochs: 5, ..TrainingConfig::default() }).unwrap();
        let ctx = PageContext::new(&test_config(), Nav::Attrition, None);

        let html = render_page(&ctx, &dataset, Some(&set), &[], 5);
        assert!(html.contains(TFJS_URL));
        assert!(html.contains(r#"id="browser-risk-1""#));
        assert!(html.contains(r#"id="browser-risk-2""#));
        // leavers are training data only
        assert!(!html.contains(r#"id="browser-risk-3""#));
        assert!(html.contains("9-16-8-1"));
        assert!(html.contains("No feedback recorded yet."));
    }

    #[test]
    fn empty_dataset_explains_what_to_do() {
        let ctx = PageContext::new(&test_config(), Nav::Attrition, None);
        let html = render_page(&ctx, &Dataset::default(), None, &[], 5);
        assert!(html.contains("Add employees first"));
        assert!(!html.contains("attrition-data"));
    }

    #[test]
    fn feedback_form_validation() {
        let ok = FeedbackForm {
            employee_id: "2".into(),
            predicted_risk: "0.73".into(),
            actual_outcome: "left".into(),
            notes: "".into(),
        };
        let parsed = NewFeedback::from_form(&ok).unwrap();
        assert_eq!(parsed.actual_outcome, Outcome::Left);
        assert_eq!(parsed.notes, None);

        for (risk, outcome) in [("1.2", "left"), ("-0.1", "stayed"), ("0.5", "maybe")] {
            let bad = FeedbackForm {
                predicted_risk: risk.into(),
                actual_outcome: outcome.into(),
                employee_id: "2".into(),
                ..FeedbackForm::default()
            };
            assert!(NewFeedback::from_form(&bad).is_err(), "{risk} {outcome}");
        }
    }

    #[actix_web::test]
    async fn invalid_feedback_redirects_to_the_predictor() {
        let app = actix_test::init_service(
            App::new()
                .app_data(unreachable_pool())
                .route("/attrition/feedback", web::post().to(record_feedback)),
        )
        .await;

        let req = actix_test::TestRequest::post()
            .uri("/attrition/feedback")
            .set_form([("employee_id", "2"), ("predicted_risk", "3"), ("actual_outcome", "left")])
            .to_request();
        let res = actix_test::call_service(&app, req).await;
        assert_eq!(
            res.headers().get(header::LOCATION).unwrap(),
            "/attrition?flash=invalid_feedback"
        );
    }
}
