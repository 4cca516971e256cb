//! HTML status page.

use axum::{Router, extract::State, response::Html, routing::get};

use crate::api::server::AppState;
use crate::ledger::LedgerEntry;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(index))
}

async fn index(State(state): State<AppState>) -> Html<String> {
    let entries = state.service.ledger().snapshot();
    let logs = state.log_buffer.snapshot();
    Html(render_page(&entries, &logs, state.service.pending_count()))
}

const STYLE: &str = "body { font-family: Arial, sans-serif; margin: 2rem; }
table { border-collapse: collapse; width: 100%; margin-bottom: 1.5rem; }
th, td { border: 1px solid #ddd; padding: 8px; }
th { background-color: #f2f2f2; }
tr:nth-child(even) { background-color: #fafafa; }
.section { margin-bottom: 2rem; }";

fn render_page(entries: &[LedgerEntry], logs: &[String], pending: usize) -> String {
    let rows: String = entries
        .iter()
        .map(|e| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                e.id,
                escape(&e.submitter_display()),
                escape(&e.locator),
                e.status,
                escape(&e.detail),
                e.updated_at
                    .with_timezone(&chrono::Local)
                    .format("%Y-%m-%d %H:%M:%S"),
            )
        })
        .collect();
    let rows = if rows.is_empty() {
        r#"<tr><td colspan="6">No downloads yet.</td></tr>"#.to_string()
    } else {
        rows
    };

    let log_lines: String = logs
        .iter()
        .map(|line| format!("<li>{}</li>", escape(line)))
        .collect();
    let log_lines = if log_lines.is_empty() {
        "<li>No logs yet.</li>".to_string()
    } else {
        log_lines
    };

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>Media Relay - Status</title>
<style>{STYLE}</style>
</head>
<body>
<h1>Download status</h1>
<p>Waiting in queue: {pending}</p>
<div class="section">
<table>
<thead><tr><th>ID</th><th>User</th><th>URL</th><th>Status</th><th>Details</th><th>Last update</th></tr></thead>
<tbody>{rows}</tbody>
</table>
</div>
<div class="section">
<h2>Recent logs</h2>
<ol>{log_lines}</ol>
</div>
</body>
</html>
"#
    )
}

fn escape(text: &str) -> String {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{NewLedgerEntry, StatusLedger};

    #[test]
    fn empty_page_has_placeholders() {
        let html = render_page(&[], &[], 0);
        assert!(html.contains("No downloads yet."));
        assert!(html.contains("No logs yet."));
    }

    #[test]
    fn entries_and_logs_are_escaped() {
        let ledger = StatusLedger::new(5);
        ledger.append(NewLedgerEntry::queued(
            "https://x.example/?a=1&b=<2>",
            Some(1),
            Some("bob".to_string()),
        ));
        let html = render_page(&ledger.snapshot(), &["<script>".to_string()], 2);

        assert!(html.contains("a=1&amp;b=&lt;2&gt;"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("bob"));
        assert!(html.contains("queued"));
        assert!(html.contains("Waiting in queue: 2"));
    }
}
