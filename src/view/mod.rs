pub mod flash;
pub mod layout;
pub mod responsive;

use std::fmt::Write;

/// Escapes text for HTML element content and quoted attributes.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// `1234.5` → `"USD 1,234.50"`.
pub fn money(amount: f64, currency: &str) -> String {
    let negative = amount < 0.0;
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();

    let mut grouped = String::new();
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    format!(
        "{currency} {}{grouped}.{:02}",
        if negative { "-" } else { "" },
        cents % 100
    )
}

pub fn percent(value: f64) -> String {
    format!("{value:+.1}%")
}

/// `<option>` list for a closed set of `(value, label)` pairs.
pub fn select_options<'a, I>(options: I, selected: Option<&str>) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut html = String::new();
    for (value, label) in options {
        let marker = if Some(value) == selected { " selected" } else { "" };
        let _ = write!(
            html,
            r#"<option value="{}"{marker}>{}</option>"#,
            escape(value),
            escape(label)
        );
    }
    html
}

/// Renders a table, or `empty` in a muted paragraph when there are no rows.
pub fn table(headers: &[&str], rows: &[String], empty: &str) -> String {
    if rows.is_empty() {
        return format!(r#"<p class="muted">{}</p>"#, escape(empty));
    }
    let mut html = String::from("<table><thead><tr>");
    for h in headers {
        let _ = write!(html, "<th>{}</th>", escape(h));
    }
    html.push_str("</tr></thead><tbody>");
    for row in rows {
        html.push_str(row);
    }
    html.push_str("</tbody></table>");
    html
}

/// Inline POST form holding a single button, for row actions.
pub fn action_button(action: &str, label: &str, class: &str, confirm: Option<&str>) -> String {
    let onsubmit = confirm
        .map(|msg| format!(r#" onsubmit="return confirm('{}');""#, escape(msg)))
        .unwrap_or_default();
    format!(
        r#"<form method="post" action="{}" class="inline"{onsubmit}><button type="submit" class="{}">{}</button></form>"#,
        escape(action),
        escape(class),
        escape(label)
    )
}

pub fn opt_text(value: Option<&str>) -> String {
    value.map(escape).unwrap_or_else(|| "&mdash;".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_covers_markup_characters() {
        assert_eq!(
            escape(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#39;Jerry&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn money_groups_thousands() {
        assert_eq!(money(1234.5, "USD"), "USD 1,234.50");
        assert_eq!(money(0.0, "EUR"), "EUR 0.00");
        assert_eq!(money(1_000_000.0, "USD"), "USD 1,000,000.00");
        assert_eq!(money(-950.256, "USD"), "USD -950.26");
        assert_eq!(money(999.999, "USD"), "USD 1,000.00");
    }

    #[test]
    fn percent_is_signed() {
        assert_eq!(percent(10.0), "+10.0%");
        assert_eq!(percent(-2.54), "-2.5%");
    }

    #[test]
    fn select_marks_the_current_value() {
        let html = select_options([("a", "Alpha"), ("b", "Beta")], Some("b"));
        assert_eq!(
            html,
            r#"<option value="a">Alpha</option><option value="b" selected>Beta</option>"#
        );
    }

    #[test]
    fn empty_tables_render_a_placeholder() {
        assert_eq!(table(&["Name"], &[], "Nothing yet"), r#"<p class="muted">Nothing yet</p>"#);
        let html = table(&["Name"], &["<tr><td>x</td></tr>".to_string()], "Nothing yet");
        assert!(html.starts_with("<table><thead><tr><th>Name</th>"));
        assert!(html.contains("<tr><td>x</td></tr>"));
    }
}
