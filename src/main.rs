//! Store Sales Prep - command line front end
//!
//! Prepares the demo tables from a dataset directory and prints a preview and a
//! funnel summary.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use store_sales_prep::data::{default_cutoff, DEFAULT_WARMUP_ROWS};
use store_sales_prep::stats::{FunnelStats, GroupFunnelStats, StatsCalculator};
use store_sales_prep::DemoDataLoader;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "store-sales-prep", version, about)]
struct Args {
    /// Directory holding train.csv, transactions.csv and stores.csv
    data_dir: PathBuf,

    /// JSON object of family name to average price, merged over the defaults
    #[arg(long)]
    prices: Option<PathBuf>,

    /// First report date excluded from the sales table
    #[arg(long, value_parser = parse_cutoff)]
    cutoff: Option<NaiveDate>,

    /// Leading rows dropped after the cutoff filter
    #[arg(long, default_value_t = DEFAULT_WARMUP_ROWS)]
    warmup_rows: usize,

    /// Grouping variable to break the funnel summary down by
    #[arg(long)]
    group_by: Option<String>,

    /// Rows of each table to preview
    #[arg(long, default_value_t = 10)]
    rows: usize,

    /// Print the summary as JSON instead of tables
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct Report<'a> {
    sales_rows: usize,
    stores: usize,
    group_variables: &'a [String],
    funnel_variables: &'a [String],
    funnel: Vec<FunnelStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    by_group: Option<Vec<GroupFunnelStats>>,
}

fn parse_cutoff(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| format!("expected YYYY-MM-DD: {e}"))
}

fn read_price_overrides(path: &Path) -> Result<HashMap<String, f64>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading price overrides from {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("parsing price overrides in {}", path.display()))
}

fn print_stats(stats: &[FunnelStats]) {
    println!(
        "{:<32} {:>8} {:>12} {:>12} {:>12} {:>12} {:>12}",
        "variable", "count", "mean", "median", "std", "p05", "p95"
    );
    for s in stats {
        println!(
            "{:<32} {:>8} {:>12.4} {:>12.4} {:>12.4} {:>12.4} {:>12.4}",
            s.variable, s.count, s.mean, s.median, s.std, s.p05, s.p95
        );
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut loader = DemoDataLoader::new()
        .with_cutoff(args.cutoff.unwrap_or_else(default_cutoff))
        .with_warmup_rows(args.warmup_rows);
    if let Some(path) = &args.prices {
        let overrides = read_price_overrides(path)?;
        tracing::info!(overrides = overrides.len(), "applying price overrides");
        loader = loader.with_price_overrides(&overrides);
    }

    let data = loader
        .load(&args.data_dir)
        .with_context(|| format!("preparing demo data from {}", args.data_dir.display()))?;

    let funnel = StatsCalculator::summarize_funnel(&data).context("summarizing funnel")?;
    let by_group = args
        .group_by
        .as_deref()
        .map(|group| StatsCalculator::summarize_by_group(&data, group))
        .transpose()
        .context("summarizing funnel by group")?;

    if args.json {
        let report = Report {
            sales_rows: data.sales.height(),
            stores: data.stores.height(),
            group_variables: &data.group_variables,
            funnel_variables: &data.funnel_variables,
            funnel,
            by_group,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{}", data.sales.head(Some(args.rows)));
    println!("{}", data.stores.head(Some(args.rows)));
    println!("group variables:  {}", data.group_variables.join(", "));
    println!("funnel variables: {}", data.funnel_variables.join(", "));
    println!();
    print_stats(&funnel);
    for group in by_group.iter().flatten() {
        println!();
        println!("{} = {}", group.group_variable, group.group);
        print_stats(&group.stats);
    }

    Ok(())
}
