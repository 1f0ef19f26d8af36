use anyhow::{Context, Result};
use chrono::Utc;
use std::fs;
use std::path::Path;
use tera::{Context as TeraContext, Tera};

use crate::models::{RunSummary, Severity, ToolRun};

pub struct JsonExporter;

impl JsonExporter {
    pub fn export(run: &ToolRun, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let output = ExportData {
            export_time: Utc::now().to_rfc3339(),
            summary: run.summary(),
            run: run.clone(),
        };

        let json = serde_json::to_string_pretty(&output)?;
        fs::write(path, json).with_context(|| format!("Failed to write to {}", path.display()))?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<ToolRun> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;

        let data: ExportData =
            serde_json::from_str(&content).with_context(|| format!("{} is not an exported run", path.display()))?;
        Ok(data.run)
    }
}

pub struct HtmlExporter;

impl HtmlExporter {
    pub fn export(run: &ToolRun, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let html = Self::render(run)?;
        fs::write(path, html).with_context(|| format!("Failed to write to {}", path.display()))?;
        Ok(())
    }

    pub fn render(run: &ToolRun) -> Result<String> {
        let mut tera = Tera::default();
        tera.add_raw_template("report.html", TEMPLATE)?;

        let summary = run.summary();

        let mut context = TeraContext::new();
        context.insert("tool", &run.tool.as_str());
        context.insert("target", &run.target);
        context.insert("status", &run.status.to_string());
        context.insert("note", &run.note);
        context.insert("started_at", &run.started_at.format("%Y-%m-%d %H:%M:%S UTC").to_string());
        context.insert("duration", &format!("{:.2}s", run.duration_ms as f64 / 1000.0));
        context.insert("dispatched", &run.dispatched);
        context.insert("total_findings", &summary.total_findings);
        context.insert("critical_count", &summary.critical_count);
        context.insert("high_count", &summary.high_count);
        context.insert("medium_count", &summary.medium_count);
        context.insert("low_count", &summary.low_count);
        context.insert("info_count", &summary.info_count);

        let rows: Vec<HtmlRow> = run
            .findings
            .iter()
            .map(|f| HtmlRow {
                severity: f.severity.to_string(),
                severity_class: Self::severity_class(f.severity).to_string(),
                kind: f.kind.to_string(),
                title: f.title.clone(),
                value: f.value.clone(),
                subtitle: f.subtitle.clone(),
            })
            .collect();
        context.insert("rows", &rows);

        Ok(tera.render("report.html", &context)?)
    }

    fn severity_class(severity: Severity) -> &'static str {
        severity.as_str()
    }
}

const TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>probekit {{ tool }} report</title>
    <style>
        * { margin: 0; padding: 0; box-sizing: border-box; }
        body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; background: #0d1117; color: #c9d1d9; line-height: 1.6; }
        .container { max-width: 1200px; margin: 0 auto; padding: 2rem; }
        h1 { color: #58a6ff; margin-bottom: 0.5rem; }
        .subtitle { color: #8b949e; margin-bottom: 2rem; }
        .summary { display: grid; grid-template-columns: repeat(auto-fit, minmax(150px, 1fr)); gap: 1rem; margin-bottom: 2rem; }
        .stat { background: #161b22; border: 1px solid #30363d; border-radius: 6px; padding: 1rem; text-align: center; }
        .stat-value { font-size: 2rem; font-weight: bold; }
        .stat-label { color: #8b949e; font-size: 0.875rem; }
        .critical .stat-value, .high .stat-value { color: #f85149; }
        .medium .stat-value { color: #d29922; }
        .low .stat-value { color: #58a6ff; }
        .info .stat-value { color: #8b949e; }
        table { width: 100%; border-collapse: collapse; background: #161b22; border: 1px solid #30363d; border-radius: 6px; overflow: hidden; }
        th, td { padding: 0.75rem 1rem; text-align: left; border-bottom: 1px solid #30363d; vertical-align: top; }
        th { background: #21262d; color: #c9d1d9; font-weight: 600; }
        tr:hover { background: #21262d; }
        .severity { padding: 0.25rem 0.5rem; border-radius: 4px; font-size: 0.75rem; font-weight: 600; }
        .severity.critical, .severity.high { background: #f8514933; color: #f85149; }
        .severity.medium { background: #d2992233; color: #d29922; }
        .severity.low { background: #58a6ff33; color: #58a6ff; }
        .severity.info { background: #8b949e33; color: #8b949e; }
        .value { font-family: monospace; word-break: break-all; }
        .detail { font-size: 0.875rem; color: #8b949e; }
    </style>
</head>
<body>
    <div class="container">
        <h1>{{ tool }} &middot; {{ target }}</h1>
        <p class="subtitle">Started {{ started_at }} &middot; {{ status }} in {{ duration }} &middot; {{ dispatched }} requests{% if note %} &middot; {{ note }}{% endif %}</p>

        <div class="summary">
            <div class="stat"><div class="stat-value">{{ total_findings }}</div><div class="stat-label">Findings</div></div>
            <div class="stat critical"><div class="stat-value">{{ critical_count }}</div><div class="stat-label">Critical</div></div>
            <div class="stat high"><div class="stat-value">{{ high_count }}</div><div class="stat-label">High</div></div>
            <div class="stat medium"><div class="stat-value">{{ medium_count }}</div><div class="stat-label">Medium</div></div>
            <div class="stat low"><div class="stat-value">{{ low_count }}</div><div class="stat-label">Low</div></div>
            <div class="stat info"><div class="stat-value">{{ info_count }}</div><div class="stat-label">Info</div></div>
        </div>

        <table>
            <thead>
                <tr><th>Severity</th><th>Kind</th><th>Finding</th><th>Value</th></tr>
            </thead>
            <tbody>
                {% for row in rows %}
                <tr>
                    <td><span class="severity {{ row.severity_class }}">{{ row.severity }}</span></td>
                    <td>{{ row.kind }}</td>
                    <td>{{ row.title }}{% if row.subtitle %}<div class="detail">{{ row.subtitle }}</div>{% endif %}</td>
                    <td class="value">{{ row.value }}</td>
                </tr>
                {% endfor %}
            </tbody>
        </table>
    </div>
</body>
</html>"#;

#[derive(serde::Serialize, serde::Deserialize)]
struct ExportData {
    export_time: String,
    run: ToolRun,
    summary: RunSummary,
}

#[derive(serde::Serialize)]
struct HtmlRow {
    severity: String,
    severity_class: String,
    kind: String,
    title: String,
    value: String,
    subtitle: String,
}
