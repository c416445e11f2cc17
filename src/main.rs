use anyhow::{Context, Result};
use arrival_eval::cli::{Cli, OutputFormat};
use arrival_eval::config::EvalConfig;
use arrival_eval::csv_output::CsvOutput;
use arrival_eval::json_output::JsonOutput;
use arrival_eval::pipeline::{Evaluation, Pipeline};
use arrival_eval::record::CsvRecordSource;
use arrival_eval::text_output;
use clap::Parser;
use std::fs;
use std::io::Write;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber; `--debug` raises the level to TRACE
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Render the report in the requested format
fn render(evaluation: &Evaluation, format: OutputFormat) -> Result<String> {
    let rendered = match format {
        OutputFormat::Text => text_output::to_report_string(evaluation),
        OutputFormat::Json => JsonOutput::from_evaluation(evaluation)
            .to_json()
            .context("Failed to serialize JSON report")?,
        OutputFormat::Csv => CsvOutput::new(evaluation.summary_table()).to_csv(),
    };
    Ok(rendered)
}

fn main() -> Result<()> {
    let args = Cli::parse();

    init_tracing(args.debug);

    let mut config = match &args.config {
        Some(path) => EvalConfig::from_file(path)?,
        None => EvalConfig::default(),
    };
    args.apply_overrides(&mut config);

    let pipeline = Pipeline::new(config).context("Invalid configuration")?;

    let source = CsvRecordSource::new(&args.input);
    let evaluation = pipeline
        .run_source(&source, &args.record_filter())
        .with_context(|| format!("Evaluation of {} failed", args.input.display()))?;

    let report = render(&evaluation, args.format)?;

    match &args.output {
        Some(path) => fs::write(path, report)
            .with_context(|| format!("Failed to write report to {}", path.display()))?,
        None => {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(report.as_bytes())
                .context("Failed to write report to stdout")?;
        }
    }

    Ok(())
}
