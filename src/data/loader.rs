//! Demo Data Loader Module
//! Reads the store sales dataset with Polars and runs the preparation pipeline.

use super::openings::{opening_time_column, store_openings};
use super::prices::PriceTable;
use super::processor::{SalesProcessor, FUNNEL_VARIABLES};
use chrono::NaiveDate;
use polars::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Where to get the dataset files.
pub const DATASET_URL: &str =
    "https://www.kaggle.com/competitions/store-sales-time-series-forecasting/data?select=stores.csv";

pub const SALES_FILE: &str = "train.csv";
pub const TRANSACTIONS_FILE: &str = "transactions.csv";
pub const STORES_FILE: &str = "stores.csv";

/// Store identifier column, shared by all three files.
pub const STORE_ID: &str = "store_nbr";

/// Leading rows dropped after the cutoff filter.
pub const DEFAULT_WARMUP_ROWS: usize = 2;

// Numeric columns in train.csv can switch from integral to fractional far into the
// file, so the schema is inferred from every row.
const INFER_SCHEMA_ROWS: Option<usize> = None;

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error(
        "Missing {}, be sure you've downloaded the dataset. See {} to download these files.",
        .path.display(),
        DATASET_URL
    )]
    MissingInput { path: PathBuf },
    #[error("Failed to load CSV: {0}")]
    CsvError(#[from] PolarsError),
}

/// Prepared tables for the funnel demo.
#[derive(Debug, Clone)]
pub struct DemoData {
    /// One row per (store_nbr, report_date) with profit and funnel columns.
    pub sales: DataFrame,
    /// Store reference table with `store_`-prefixed attributes and `opening_time_cat`.
    pub stores: DataFrame,
    /// Store columns to segment by, everything except the store identifier.
    pub group_variables: Vec<String>,
    /// Funnel columns of `sales`, in funnel order.
    pub funnel_variables: Vec<String>,
}

/// Loads the dataset and prepares [`DemoData`].
#[derive(Debug, Clone)]
pub struct DemoDataLoader {
    prices: PriceTable,
    cutoff: NaiveDate,
    warmup_rows: usize,
}

impl Default for DemoDataLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// First day excluded from the sales table.
pub fn default_cutoff() -> NaiveDate {
    NaiveDate::from_ymd_opt(2017, 1, 1).unwrap_or(NaiveDate::MAX)
}

/// Prefix store attribute names with `store_` unless they already start with `store`.
pub fn normalize_store_columns(stores: &mut DataFrame) -> PolarsResult<()> {
    let renames: Vec<(String, String)> = stores
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .filter(|name| !name.starts_with("store"))
        .map(|name| {
            let prefixed = format!("store_{name}");
            (name, prefixed)
        })
        .collect();

    for (name, prefixed) in renames {
        stores.rename(&name, prefixed.into())?;
    }
    Ok(())
}

fn read_csv(path: &Path) -> PolarsResult<DataFrame> {
    LazyCsvReader::new(path)
        .with_infer_schema_length(INFER_SCHEMA_ROWS)
        .with_ignore_errors(true)
        .finish()?
        .collect()
}

impl DemoDataLoader {
    pub fn new() -> Self {
        Self {
            prices: PriceTable::new(),
            cutoff: default_cutoff(),
            warmup_rows: DEFAULT_WARMUP_ROWS,
        }
    }

    /// Merge per-family price overrides over the defaults.
    pub fn with_price_overrides(mut self, overrides: &HashMap<String, f64>) -> Self {
        self.prices.merge(overrides);
        self
    }

    /// Sales rows with a report date on or after `cutoff` are dropped.
    pub fn with_cutoff(mut self, cutoff: NaiveDate) -> Self {
        self.cutoff = cutoff;
        self
    }

    /// Number of leading rows dropped once the cutoff is applied.
    pub fn with_warmup_rows(mut self, warmup_rows: usize) -> Self {
        self.warmup_rows = warmup_rows;
        self
    }

    pub fn prices(&self) -> &PriceTable {
        &self.prices
    }

    /// Load `train.csv`, `transactions.csv` and `stores.csv` from `path` and
    /// prepare the demo tables.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<DemoData, LoaderError> {
        let base_path = path.as_ref();
        let sales_path = base_path.join(SALES_FILE);
        if !sales_path.is_file() {
            return Err(LoaderError::MissingInput { path: sales_path });
        }

        tracing::info!(path = %base_path.display(), "loading store sales dataset");

        let transactions_path = base_path.join(TRANSACTIONS_FILE);
        let stores_path = base_path.join(STORES_FILE);
        let (raw_sales, (raw_transactions, raw_stores)) = rayon::join(
            || read_csv(&sales_path),
            || rayon::join(|| read_csv(&transactions_path), || read_csv(&stores_path)),
        );
        let raw_sales = raw_sales?;
        let raw_transactions = raw_transactions?;
        let mut stores = raw_stores?;

        tracing::debug!(
            sales = raw_sales.height(),
            transactions = raw_transactions.height(),
            stores = stores.height(),
            "read input files"
        );

        normalize_store_columns(&mut stores)?;

        let rows = SalesProcessor::derive_row_profit(&raw_sales, &self.prices)?;
        let daily = SalesProcessor::collapse_store_days(&rows)?;
        tracing::debug!(rows = daily.height(), "collapsed families into store-days");

        let transactions = SalesProcessor::parse_transactions(&raw_transactions)?;
        let daily = SalesProcessor::join_transactions(&daily, &transactions)?;

        let monthly = SalesProcessor::roll_up_months(&daily)?;
        tracing::debug!(rows = monthly.height(), "rolled store-days up to months");

        let openings = store_openings(&monthly)?;
        stores.with_column(opening_time_column(&stores, &openings)?)?;

        let group_variables: Vec<String> = stores
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .filter(|name| name != STORE_ID)
            .collect();
        let funnel_variables: Vec<String> =
            FUNNEL_VARIABLES.iter().map(|name| name.to_string()).collect();

        let monthly = SalesProcessor::add_funnel_ratios(&monthly)?;
        let sales = SalesProcessor::truncate(&monthly, self.cutoff, self.warmup_rows)?;

        tracing::info!(
            sales_rows = sales.height(),
            stores = stores.height(),
            classified_stores = openings.len(),
            "prepared demo data"
        );

        Ok(DemoData {
            sales,
            stores,
            group_variables,
            funnel_variables,
        })
    }
}

/// Load with the default cutoff and warm-up, merging `price_overrides` if given.
pub fn load_demo_data(
    path: impl AsRef<Path>,
    price_overrides: Option<&HashMap<String, f64>>,
) -> Result<DemoData, LoaderError> {
    let loader = match price_overrides {
        Some(overrides) => DemoDataLoader::new().with_price_overrides(overrides),
        None => DemoDataLoader::new(),
    };
    loader.load(path)
}
