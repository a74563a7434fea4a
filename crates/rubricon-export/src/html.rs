//! Standalone HTML rendering of an attempt report.
//!
//! Produces a single self-contained file with all CSS inlined, suitable
//! for download or email attachment.

use anyhow::Result;
use std::path::Path;

use rubricon_core::report::{AttemptReport, ReportStatus, SectionKey};
use rubricon_core::summary::{AreaBreakdown, AttemptSummary};

/// Escape a string for safe HTML insertion.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

/// Render an attempt report to a self-contained HTML document.
pub fn render_html(report: &AttemptReport, summary: &AttemptSummary, student_name: &str) -> String {
    let mut html = String::new();

    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("<meta charset=\"utf-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    html.push_str(&format!(
        "<title>Reading diagnostic report: {}</title>\n",
        html_escape(student_name)
    ));
    html.push_str("<style>\n");
    html.push_str(CSS);
    html.push_str("</style>\n");
    html.push_str("</head>\n<body>\n");

    // Header
    html.push_str("<header>\n");
    html.push_str("<h1>Reading Diagnostic Report</h1>\n");
    if report.status == ReportStatus::Draft {
        html.push_str("<p class=\"draft-badge\">DRAFT, not yet published</p>\n");
    }
    let dated = match report.published_at {
        Some(at) => format!("published {}", at.format("%Y-%m-%d")),
        None => format!("generated {}", report.updated_at.format("%Y-%m-%d")),
    };
    html.push_str(&format!(
        "<p class=\"meta\">Student: <strong>{}</strong> | attempt {} | {}</p>\n",
        html_escape(student_name),
        report.attempt_id,
        dated
    ));
    html.push_str("</header>\n");

    // Score dashboard
    html.push_str("<section class=\"dashboard\">\n");
    html.push_str("<h2>Scores</h2>\n");
    html.push_str("<table class=\"summary\">\n");
    html.push_str("<thead><tr><th></th><th>Score</th><th>Detail</th></tr></thead>\n");
    html.push_str("<tbody>\n");
    let total_pct = if summary.total_max > 0 {
        f64::from(summary.total_raw) / f64::from(summary.total_max) * 100.0
    } else {
        0.0
    };
    html.push_str(&format!(
        "<tr><td>Total</td><td>{}/{}</td><td>{:.1}% | {:.0}% of items answered</td></tr>\n",
        summary.total_raw,
        summary.total_max,
        total_pct,
        summary.completion_rate * 100.0
    ));
    html.push_str(&format!(
        "<tr><td>Multiple choice</td><td>{}/{}</td><td>{} correct, {} partial, {} incorrect, {} unanswered</td></tr>\n",
        summary.mcq.raw,
        summary.mcq.max,
        summary.mcq.correct,
        summary.mcq.partial,
        summary.mcq.incorrect,
        summary.mcq.unanswered
    ));
    html.push_str(&format!(
        "<tr><td>Constructed response</td><td>{}/{}</td><td>{} graded, {} awaiting grading</td></tr>\n",
        summary.constructed.raw,
        summary.constructed.max,
        summary.constructed.graded,
        summary.constructed.ungraded
    ));
    html.push_str("</tbody></table>\n");

    if !summary.areas.is_empty() {
        html.push_str(&area_bar_chart(&summary.areas));
    }
    html.push_str("</section>\n");

    // Generated sections, canonical order, skipping empty slots
    for key in SectionKey::ALL {
        let Some(section) = report.sections.get(key) else {
            continue;
        };
        html.push_str(&format!("<article class=\"section-{key}\">\n"));
        html.push_str(&format!("<h2>{}</h2>\n", html_escape(&section.title)));
        for paragraph in section.content.split("\n\n").filter(|p| !p.trim().is_empty()) {
            html.push_str(&format!("<p>{}</p>\n", html_escape(paragraph.trim())));
        }
        html.push_str(&format!(
            "<p class=\"generated-at\">generated {}</p>\n",
            section.generated_at.format("%Y-%m-%d %H:%M UTC")
        ));
        html.push_str("</article>\n");
    }

    // Raw JSON
    html.push_str("<section class=\"raw-data\">\n");
    html.push_str("<details>\n<summary>Raw JSON Data</summary>\n");
    html.push_str("<pre><code>");
    html.push_str(
        &serde_json::to_string_pretty(report)
            .unwrap_or_default()
            .replace('<', "&lt;")
            .replace('>', "&gt;"),
    );
    html.push_str("</code></pre>\n");
    html.push_str("</details>\n</section>\n");

    html.push_str("</body>\n</html>");
    html
}

/// Render and write the report to a file, creating parent directories.
pub fn write_html_report(
    report: &AttemptReport,
    summary: &AttemptSummary,
    student_name: &str,
    path: &Path,
) -> Result<()> {
    let html = render_html(report, summary, student_name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, html)?;
    Ok(())
}

fn area_bar_chart(areas: &[AreaBreakdown]) -> String {
    let bar_height = 30;
    let max_width = 400;
    let padding = 10;
    let label_width = 200;

    let total_height = areas.len() * (bar_height + padding) + padding;

    let mut svg = format!(
        "<svg width=\"{}\" height=\"{}\" xmlns=\"http://www.w3.org/2000/svg\" role=\"img\" aria-label=\"score by area\">\n",
        label_width + max_width + 60,
        total_height
    );

    for (i, area) in areas.iter().enumerate() {
        let y = i * (bar_height + padding) + padding;
        let width = (area.pct / 100.0 * max_width as f64) as usize;

        let color = if area.pct >= 80.0 {
            "#22c55e"
        } else if area.pct >= 50.0 {
            "#eab308"
        } else {
            "#ef4444"
        };

        svg.push_str(&format!(
            "  <text x=\"{}\" y=\"{}\" font-size=\"14\" fill=\"currentColor\" text-anchor=\"end\" dominant-baseline=\"middle\">{}</text>\n",
            label_width - 10,
            y + bar_height / 2,
            html_escape(&area.area)
        ));
        svg.push_str(&format!(
            "  <rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" fill=\"{}\" rx=\"4\"/>\n",
            label_width, y, width, bar_height, color
        ));
        svg.push_str(&format!(
            "  <text x=\"{}\" y=\"{}\" font-size=\"12\" fill=\"currentColor\" dominant-baseline=\"middle\">{}/{} ({:.0}%)</text>\n",
            label_width + width + 8,
            y + bar_height / 2,
            area.raw,
            area.max,
            area.pct
        ));
    }

    svg.push_str("</svg>\n");
    svg
}

const CSS: &str = r#"
:root { --bg: #fff; --fg: #1a1a1a; --border: #e5e7eb; --accent: #2563eb; --draft: #b45309; }
@media (prefers-color-scheme: dark) {
  :root { --bg: #111827; --fg: #f9fafb; --border: #374151; --accent: #60a5fa; --draft: #fbbf24; }
}
body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif; margin: 0 auto; max-width: 56rem; padding: 2rem; background: var(--bg); color: var(--fg); }
h1, h2 { margin-top: 2rem; }
.meta { color: #6b7280; }
.draft-badge { display: inline-block; border: 2px solid var(--draft); color: var(--draft); padding: 0.25rem 0.75rem; border-radius: 6px; font-weight: bold; }
table { border-collapse: collapse; width: 100%; margin: 1rem 0; }
th, td { border: 1px solid var(--border); padding: 0.5rem 1rem; text-align: left; }
th { background: var(--border); }
article { border-top: 1px solid var(--border); margin-top: 2rem; }
.generated-at { color: #6b7280; font-size: 0.8rem; }
pre { overflow-x: auto; padding: 1rem; background: var(--border); border-radius: 8px; }
code { font-family: 'JetBrains Mono', 'Fira Code', monospace; font-size: 0.85rem; }
details { margin: 1rem 0; }
summary { cursor: pointer; font-weight: bold; }
svg { margin: 1rem 0; }
"#;
