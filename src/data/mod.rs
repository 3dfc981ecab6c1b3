//! Data module - dataset loading and the sales preparation pipeline

pub mod calendar;
mod loader;
mod openings;
mod prices;
mod processor;

pub use loader::{
    default_cutoff, load_demo_data, normalize_store_columns, DemoData, DemoDataLoader,
    LoaderError, DATASET_URL, DEFAULT_WARMUP_ROWS, SALES_FILE, STORES_FILE, STORE_ID,
    TRANSACTIONS_FILE,
};
pub use openings::{opening_time_column, store_openings, OpeningTimeCategory};
pub use prices::{PriceTable, BASE_PRICES};
pub use processor::{
    profit_discount_factor, RowProfit, SalesProcessor, BASE_COLUMNS, FUNNEL_VARIABLES,
};
