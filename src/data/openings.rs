//! Store Openings Module
//! Classifies stores by how long after the start of the dataset they began
//! producing profit.

use super::calendar::{date_values, months_between};
use chrono::NaiveDate;
use polars::prelude::*;
use std::collections::BTreeMap;

/// Coarse opening time of a store relative to the first month of data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OpeningTimeCategory {
    AlreadyOpen,
    First24,
    RushOpen,
    BrandNew,
}

impl OpeningTimeCategory {
    pub const ALL: [OpeningTimeCategory; 4] = [
        OpeningTimeCategory::AlreadyOpen,
        OpeningTimeCategory::First24,
        OpeningTimeCategory::RushOpen,
        OpeningTimeCategory::BrandNew,
    ];

    pub fn from_months_since_open(months: i32) -> Self {
        match months {
            i32::MIN..=0 => OpeningTimeCategory::AlreadyOpen,
            1..=23 => OpeningTimeCategory::First24,
            24..=35 => OpeningTimeCategory::RushOpen,
            _ => OpeningTimeCategory::BrandNew,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OpeningTimeCategory::AlreadyOpen => "already open",
            OpeningTimeCategory::First24 => "first_24",
            OpeningTimeCategory::RushOpen => "rush_open",
            OpeningTimeCategory::BrandNew => "brand_new",
        }
    }
}

impl std::fmt::Display for OpeningTimeCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opening category per store from a monthly sales table.
///
/// Expects `store_nbr`, `report_date` and `net_profit` columns. A store's opening
/// month is its earliest report date with nonzero net profit, measured against the
/// earliest report date of the whole table. Stores that never show a nonzero net
/// profit are absent from the result.
pub fn store_openings(
    monthly: &DataFrame,
) -> PolarsResult<BTreeMap<i64, OpeningTimeCategory>> {
    let stores = monthly.column("store_nbr")?.cast(&DataType::Int64)?;
    let stores = stores.i64()?;
    let report_dates = date_values(monthly, "report_date")?;
    let net_profit = monthly.column("net_profit")?.cast(&DataType::Float64)?;
    let net_profit = net_profit.f64()?;

    let Some(dataset_start) = report_dates.iter().flatten().min().copied() else {
        return Ok(BTreeMap::new());
    };

    let mut first_profitable: BTreeMap<i64, NaiveDate> = BTreeMap::new();
    for ((store, date), net) in stores.into_iter().zip(&report_dates).zip(net_profit) {
        // Missing profit compares unequal to zero, so it counts as trading.
        let trading = net.map_or(true, |v| v != 0.0);
        if let (Some(store), Some(date), true) = (store, date, trading) {
            first_profitable
                .entry(store)
                .and_modify(|first| *first = (*first).min(*date))
                .or_insert(*date);
        }
    }

    Ok(first_profitable
        .into_iter()
        .map(|(store, first)| {
            let months = months_between(dataset_start, first);
            (store, OpeningTimeCategory::from_months_since_open(months))
        })
        .collect())
}

/// `opening_time_cat` column aligned with the `store_nbr` column of `stores`.
pub fn opening_time_column(
    stores: &DataFrame,
    openings: &BTreeMap<i64, OpeningTimeCategory>,
) -> PolarsResult<Column> {
    let store_ids = stores.column("store_nbr")?.cast(&DataType::Int64)?;
    let labels: Vec<Option<&str>> = store_ids
        .i64()?
        .into_iter()
        .map(|store| {
            store
                .and_then(|s| openings.get(&s))
                .map(OpeningTimeCategory::as_str)
        })
        .collect();
    Ok(Column::new("opening_time_cat".into(), labels))
}
