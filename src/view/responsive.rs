//! Post-processes outgoing HTML so every page works on small screens.

use actix_web::body::{self, BoxBody, MessageBody};
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use actix_web::middleware::Next;
use actix_web::web::Data;
use actix_web::Error;
use tracing::{debug, warn};

use crate::config::Config;

const VIEWPORT_META: &str = r#"<meta name="viewport" content="width=device-width, initial-scale=1">"#;
const MARKER: &str = r#"id="responsive-css""#;

const RESPONSIVE_CSS: &str = r#"<style id="responsive-css">
.table-scroll{width:100%;overflow-x:auto;-webkit-overflow-scrolling:touch}
.nav-toggle{display:none;background:transparent;border:1px solid #dbe7f5;color:#fff;margin-left:auto}
img{max-width:100%;height:auto}
@media (max-width:768px){
  main{padding:0 .75rem;margin:1rem auto}
  .nav-toggle{display:inline-block}
  nav.main{display:none;flex-direction:column}
  nav.main.open{display:flex}
  form.grid{grid-template-columns:1fr}
  .stats{grid-template-columns:repeat(2,1fr)}
  th,td{padding:.4rem;font-size:.82rem;white-space:nowrap}
  h1{font-size:1.25rem}
}
</style>"#;

const RESPONSIVE_JS: &str = r#"<script id="responsive-js">
(function(){
  document.querySelectorAll('table').forEach(function(t){
    if(t.parentElement && t.parentElement.classList.contains('table-scroll')) return;
    var w=document.createElement('div');w.className='table-scroll';
    t.parentNode.insertBefore(w,t);w.appendChild(t);
  });
  var bar=document.querySelector('header.topbar'),nav=document.querySelector('nav.main');
  if(bar && nav && !bar.querySelector('.nav-toggle')){
    var b=document.createElement('button');b.type='button';b.className='nav-toggle';b.textContent='Menu';
    b.addEventListener('click',function(){nav.classList.toggle('open');});
    bar.appendChild(b);
  }
})();
</script>"#;

/// Injects the viewport meta, responsive stylesheet and table/nav script.
/// Running it twice leaves the document unchanged.
pub fn inject_responsive(html: &str) -> String {
    if html.contains(MARKER) {
        return html.to_string();
    }

    let mut out = html.to_string();
    let lower = out.to_ascii_lowercase();

    if !lower.contains(r#"name="viewport""#) {
        if let Some(pos) = find_tag_end(&lower, "<head") {
            out.insert_str(pos, VIEWPORT_META);
        }
    }

    let lower = out.to_ascii_lowercase();
    if let Some(pos) = lower.rfind("</head>") {
        out.insert_str(pos, RESPONSIVE_CSS);
    }

    let lower = out.to_ascii_lowercase();
    if let Some(pos) = lower.rfind("</body>") {
        out.insert_str(pos, RESPONSIVE_JS);
    }

    out
}

/// Byte offset just past the `>` of the first `tag` opening element.
fn find_tag_end(lower: &str, tag: &str) -> Option<usize> {
    let start = lower.find(tag)?;
    let rest = &lower[start + tag.len()..];
    // `<header` must not match `<head`
    if !rest.starts_with('>') && !rest.starts_with(char::is_whitespace) {
        return None;
    }
    rest.find('>').map(|i| start + tag.len() + i + 1)
}

pub async fn responsive_middleware(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let enabled = req
        .app_data::<Data<Config>>()
        .map(|c| c.responsive_inject)
        .unwrap_or(true);

    let res = next.call(req).await?;
    if !enabled || !res.status().is_success() || !is_html(&res) {
        return Ok(res);
    }

    let (req, res) = res.into_parts();
    let (mut head, body) = res.into_parts();

    let bytes = match body::to_bytes(body).await {
        Ok(b) => b,
        Err(e) => {
            warn!(error = %e, "Could not buffer HTML body for responsive injection");
            return Err(actix_web::error::ErrorInternalServerError("Failed to render page"));
        }
    };

    let rewritten = match std::str::from_utf8(&bytes) {
        Ok(text) => inject_responsive(text).into_bytes(),
        Err(_) => bytes.to_vec(),
    };
    debug!(before = bytes.len(), after = rewritten.len(), "Responsive injection");

    head.headers_mut().remove(CONTENT_LENGTH);
    let res = head.set_body(rewritten.boxed());
    Ok(ServiceResponse::new(req, res))
}

fn is_html(res: &ServiceResponse<BoxBody>) -> bool {
    res.headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("text/html"))
        .unwrap_or(false)
}
