use colored::Colorize;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Rows},
};

use super::groups::GroupView;
use crate::models::{RunStatus, Severity, ToolRun};

const VALUE_WIDTH: usize = 80;

pub struct ConsoleReporter;

#[derive(Tabled)]
struct TableRow {
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Finding")]
    title: String,
    #[tabled(rename = "Value")]
    value: String,
}

impl ConsoleReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn print_table(&self, run: &ToolRun) {
        if run.findings.is_empty() {
            println!("\n{}", "No findings".dimmed());
            return;
        }

        let rows: Vec<TableRow> = run
            .findings
            .iter()
            .map(|f| TableRow {
                severity: Self::colored_severity(f.severity),
                kind: f.kind.to_string(),
                title: if f.subtitle.is_empty() {
                    f.title.clone()
                } else {
                    format!("{}\n{}", f.title, f.subtitle.dimmed())
                },
                value: Self::shorten(&f.value),
            })
            .collect();

        let table = Table::new(rows)
            .with(Style::rounded())
            .with(Modify::new(Rows::first()).with(Alignment::center()))
            .to_string();

        println!("\n{}", table);
    }

    pub fn print_summary(&self, run: &ToolRun) {
        let summary = run.summary();

        println!("\n{}", "Summary".bold().underline());
        let status = match run.status {
            RunStatus::Completed => run.status.to_string().green(),
            RunStatus::Cancelled => run.status.to_string().yellow(),
            RunStatus::Failed => run.status.to_string().red(),
            RunStatus::Running => run.status.to_string().normal(),
        };
        println!(
            "{} {} against {}: {} findings from {} requests in {:.2}s",
            run.tool.as_str().bold(),
            status,
            run.target,
            summary.total_findings,
            summary.dispatched,
            summary.duration_ms as f64 / 1000.0
        );

        if let Some(note) = &summary.note {
            println!("  {}", note.yellow());
        }

        for severity in Severity::ALL {
            let count = summary.count(severity);
            if count > 0 {
                println!("  {}: {}", Self::colored_severity(severity), count);
            }
        }
        println!();
    }

    pub fn print_groups(&self, view: &GroupView<'_>) {
        for entry in view.entries() {
            println!("\n{} ({})", entry.name.bold(), entry.findings.len());
            for finding in &entry.findings {
                let confidence = finding
                    .detail_i64("confidence")
                    .map(|c| format!(" {}%", c))
                    .unwrap_or_default();
                println!("  → {}{}", finding.title, confidence.dimmed());
            }
        }
    }

    fn colored_severity(severity: Severity) -> String {
        match severity {
            Severity::Critical => "CRITICAL".red().bold().to_string(),
            Severity::High => "HIGH".red().to_string(),
            Severity::Medium => "MEDIUM".yellow().to_string(),
            Severity::Low => "LOW".blue().to_string(),
            Severity::Info => "INFO".cyan().to_string(),
        }
    }

    fn shorten(value: &str) -> String {
        if value.chars().count() <= VALUE_WIDTH {
            return value.to_string();
        }
        let head: String = value.chars().take(VALUE_WIDTH - 3).collect();
        format!("{}...", head)
    }
}

impl Default for ConsoleReporter {
    fn default() -> Self {
        Self::new()
    }
}
