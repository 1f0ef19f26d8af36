use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use probekit::cli::{Cli, Commands, GlobalArgs, ReportFormat};
use probekit::http::ReqwestTransport;
use probekit::tools::webtechfp;
use probekit::{ConsoleReporter, Engine, HtmlExporter, JsonExporter, RunRegistry, SettingsStore, ToolId, ToolRun};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.global);

    match cli.command {
        Commands::Report { input } => report(&cli.global, &input),
        command => scan(&cli.global, command).await,
    }
}

fn init_logging(global: &GlobalArgs) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(global.log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn scan(global: &GlobalArgs, command: Commands) -> Result<()> {
    let settings = global.settings()?;
    let transport = Arc::new(ReqwestTransport::new().context("Failed to build HTTP client")?);
    let engine = Engine::new(transport, Arc::new(SettingsStore::new(settings)), Arc::new(RunRegistry::new()))
        .with_progress(!global.no_progress);

    let Some(tool) = command.into_tool(&engine.egress())? else {
        return Ok(());
    };

    println!("{} {} {}", "probekit".bold().cyan(), tool.id().as_str().bold(), tool.target());

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling run");
            on_interrupt.cancel();
        }
    });

    let run = engine.run(tool.as_ref(), cancel).await?;
    present(&run);

    if let Some(output) = &global.output {
        write_run(&run, output, global.format)?;
    }
    Ok(())
}

fn report(global: &GlobalArgs, input: &str) -> Result<()> {
    let run = JsonExporter::load(input)?;
    match &global.output {
        Some(output) => write_run(&run, output, global.format),
        None if global.format == ReportFormat::Html => {
            println!("{}", HtmlExporter::render(&run)?);
            Ok(())
        }
        None => {
            present(&run);
            Ok(())
        }
    }
}

fn present(run: &ToolRun) {
    let reporter = ConsoleReporter::new();
    reporter.print_table(run);
    if run.tool == ToolId::WebTechFp {
        reporter.print_groups(&webtechfp::by_category(&run.findings));
    }
    reporter.print_summary(run);
}

fn write_run(run: &ToolRun, output: &str, format: ReportFormat) -> Result<()> {
    match format {
        ReportFormat::Json => JsonExporter::export(run, output)?,
        ReportFormat::Html => HtmlExporter::export(run, output)?,
    }
    info!(output, "run written");
    println!("{} {}", "Report saved to".green(), output);
    Ok(())
}
