//! Store Sales Prep - demo data preparation for funnel analytics
//!
//! Loads the Kaggle store sales dataset, derives profit and funnel metrics per store
//! and month, and classifies stores by when they started trading.

pub mod data;
pub mod stats;

pub use data::{load_demo_data, DemoData, DemoDataLoader, LoaderError, PriceTable};
