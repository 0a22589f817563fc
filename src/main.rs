// src/main.rs
use chrono::NaiveDate;
use clap::Parser;
use edinet_digest::config::AppConfig;
use edinet_digest::edinet::{DisclosureHint, FiscalYear, LocateMode, SecurityCode};
use edinet_digest::pipeline::{FiscalYearReport, PipelineRequest, QualitativePipeline};
use edinet_digest::storage::{FileSummaryCache, SummaryStore};
use edinet_digest::summarizer::SummaryOutcome;
use edinet_digest::utils::{self, AppError};
use std::collections::BTreeMap;
use std::path::PathBuf;

// EDINET has no filings outside this range.
const MIN_YEAR: i64 = 2000;
const MAX_YEAR: i64 = 2999;

/// Locate, download and summarize EDINET securities reports
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Securities code of the company (e.g. 7203 or 72030)
    #[arg(short, long)]
    code: String,

    /// Fiscal year to search (repeatable)
    #[arg(
        short,
        long = "year",
        required = true,
        value_parser = clap::value_parser!(FiscalYear).range(MIN_YEAR..=MAX_YEAR)
    )]
    years: Vec<FiscalYear>,

    /// Expected disclosure as YEAR:DISCLOSURE_DATE:PERIOD_END (repeatable)
    #[arg(long = "hint", value_parser = parse_hint)]
    hints: Vec<(FiscalYear, DisclosureHint)>,

    /// Keep searching older years after the first filing is found
    #[arg(long)]
    collect_all: bool,

    /// Skip the LLM summary
    #[arg(long)]
    no_summary: bool,

    /// Remove every cached summary before running
    #[arg(long)]
    clear_cache: bool,

    /// Text-generation model (overrides LLM_MODEL)
    #[arg(long)]
    model: Option<String>,

    /// Directory for downloaded renderings and unpacked packages (overrides WORK_DIR)
    #[arg(long)]
    work_dir: Option<PathBuf>,

    /// Write the reports as JSON to this file
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn parse_hint(raw: &str) -> Result<(FiscalYear, DisclosureHint), String> {
    let parts: Vec<&str> = raw.split(':').map(str::trim).collect();
    let [year, disclosure, period_end] = parts.as_slice() else {
        return Err(format!("expected YEAR:DISCLOSURE_DATE:PERIOD_END, got '{}'", raw));
    };
    let year = year
        .parse::<FiscalYear>()
        .ok()
        .filter(|y| (MIN_YEAR..=MAX_YEAR).contains(&i64::from(*y)))
        .ok_or_else(|| format!("invalid year '{}'", year))?;
    let date = |s: &str| {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| format!("invalid date '{}'", s))
    };
    Ok((
        year,
        DisclosureHint { disclosure_date: date(disclosure)?, period_end: date(period_end)? },
    ))
}

fn print_report(report: &FiscalYearReport) {
    let filing = &report.filing;
    println!("=== FY{} {} ({}) ===", report.fiscal_year, filing.report_kind.label(), filing.doc_id);
    if let Some(name) = &filing.filer_name {
        println!("Filer:       {}", name);
    }
    if let Some(period_end) = filing.period_end {
        println!("Period end:  {}", period_end);
    }
    match &report.package.rendering {
        Some(path) => println!("PDF:         {}", path.display()),
        None => println!("PDF:         -"),
    }
    match &report.package.structured_dir {
        Some(path) => println!("XBRL:        {}", path.display()),
        None => println!("XBRL:        -"),
    }
    let labels: Vec<&str> = report.sections.iter().map(|k| k.label()).collect();
    println!("Sections:    {}", if labels.is_empty() { "-".to_string() } else { labels.join(", ") });
    match &report.summary {
        SummaryOutcome::Summary { text, cached } => {
            println!("Summary{}:", if *cached { " (cached)" } else { "" });
            println!("{}", text);
        }
        SummaryOutcome::Unavailable { reason } => println!("Summary:     unavailable ({})", reason),
    }
    println!();
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // 1. Setup Logging (reads RUST_LOG env var)
    utils::logging::setup_logging();

    // 2. Parse CLI Arguments, then layer them over the environment
    let args = Args::parse();
    tracing::info!("Starting processing for args: {:?}", args);

    let code: SecurityCode = args.code.parse().map_err(AppError::Config)?;
    let mut config = AppConfig::from_env();
    if let Some(model) = args.model {
        config.summarizer.model = model;
    }
    if let Some(work_dir) = args.work_dir {
        config.archive.work_dir = work_dir;
    }

    // 3. Optional cache reset
    if args.clear_cache {
        let removed = FileSummaryCache::new(&config.cache_dir)?.clear()?;
        println!("Removed {} cached summaries", removed);
    }

    // 4. Build and run the pipeline
    let mode = if args.collect_all { LocateMode::CollectAll } else { LocateMode::FirstMatch };
    let today = chrono::Local::now().date_naive();
    let pipeline = QualitativePipeline::from_config(&config, today, mode)?;

    let request = PipelineRequest {
        code,
        fiscal_years: args.years,
        hints: args.hints.into_iter().collect::<BTreeMap<_, _>>(),
        summarize: !args.no_summary,
    };
    let reports = pipeline.run(&request).await?;

    if reports.is_empty() {
        println!("No securities reports found for {}", request.code);
    }
    for report in &reports {
        print_report(report);
    }

    // 5. Optional JSON output
    if let Some(path) = &args.output {
        let json = serde_json::to_string_pretty(&reports)?;
        std::fs::write(path, json)?;
        tracing::info!("Wrote {} reports to {}", reports.len(), path.display());
    }

    tracing::info!("Processing finished. Reports: {}", reports.len());
    Ok(())
}
