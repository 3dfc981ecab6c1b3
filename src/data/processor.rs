//! Sales Processor Module
//! Profit derivation, store-day and monthly roll-ups, funnel ratios and truncation.

use super::calendar::{date_column, date_values, month_end, parse_date, to_epoch_days};
use super::prices::PriceTable;
use chrono::NaiveDate;
use polars::prelude::*;
use std::collections::BTreeSet;

/// Summed measures carried through both roll-ups.
pub const BASE_COLUMNS: [&str; 4] = ["sales", "gross_profit", "promotion_cost", "net_profit"];

/// Derived ratio columns, in funnel order.
pub const FUNNEL_VARIABLES: [&str; 4] = [
    "transactions",
    "items_per_transaction",
    "income_per_item",
    "profit_less_promotions_factor",
];

/// Share of gross profit spent on promotions for one sales row.
///
/// Grows with the log of the promotion count and with the log of the item price,
/// so expensive items on heavy promotion cost the most.
pub fn profit_discount_factor(promotions: f64, price: f64) -> f64 {
    let discount_factor = (promotions + 1.0).log2() / 100.0;
    let price_rarity = (price + 1.0).log2();
    discount_factor * price_rarity
}

/// Profit figures for one sales row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowProfit {
    pub gross_profit: f64,
    pub promotion_cost: f64,
    pub net_profit: f64,
}

impl RowProfit {
    pub fn compute(units: f64, promotions: f64, price: f64) -> Self {
        let gross_profit = units * price;
        let promotion_cost = gross_profit * profit_discount_factor(promotions, price);
        Self {
            gross_profit,
            promotion_cost,
            net_profit: gross_profit - promotion_cost,
        }
    }
}

fn f64_values(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<f64>>> {
    Ok(df
        .column(name)?
        .cast(&DataType::Float64)?
        .f64()?
        .into_iter()
        .collect())
}

fn i64_values(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<i64>>> {
    Ok(df
        .column(name)?
        .cast(&DataType::Int64)?
        .i64()?
        .into_iter()
        .collect())
}

fn parsed_dates(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<NaiveDate>>> {
    Ok(df
        .column(name)?
        .cast(&DataType::String)?
        .str()?
        .into_iter()
        .map(|raw| raw.and_then(parse_date))
        .collect())
}

/// Handles the sales transformation pipeline.
pub struct SalesProcessor;

impl SalesProcessor {
    /// Price every raw sales row and derive its profit columns.
    ///
    /// Output columns: [store_nbr, date, sales, price, gross_profit, promotion_cost, net_profit]
    ///
    /// Families missing from `prices` get a missing price and missing profit figures.
    pub fn derive_row_profit(raw: &DataFrame, prices: &PriceTable) -> PolarsResult<DataFrame> {
        let stores = i64_values(raw, "store_nbr")?;
        let dates = parsed_dates(raw, "date")?;
        let units = f64_values(raw, "sales")?;
        let promotions = f64_values(raw, "onpromotion")?;
        let families = raw.column("family")?.cast(&DataType::String)?;
        let families = families.str()?;

        let mut unpriced: BTreeSet<String> = BTreeSet::new();
        let row_prices: Vec<Option<f64>> = families
            .into_iter()
            .map(|family| {
                let family = family?;
                let price = prices.get(family);
                if price.is_none() {
                    unpriced.insert(family.to_string());
                }
                price
            })
            .collect();
        if !unpriced.is_empty() {
            tracing::warn!(families = ?unpriced, "no price for families, profit left missing");
        }

        let height = raw.height();
        let mut gross_profit: Vec<Option<f64>> = Vec::with_capacity(height);
        let mut promotion_cost: Vec<Option<f64>> = Vec::with_capacity(height);
        let mut net_profit: Vec<Option<f64>> = Vec::with_capacity(height);

        for ((units, promotions), price) in units.iter().zip(&promotions).zip(&row_prices) {
            let gross = match (units, price) {
                (Some(u), Some(p)) => Some(u * p),
                _ => None,
            };
            let profit = match (units, promotions, price) {
                (Some(u), Some(n), Some(p)) => Some(RowProfit::compute(*u, *n, *p)),
                _ => None,
            };
            gross_profit.push(gross);
            promotion_cost.push(profit.map(|p| p.promotion_cost));
            net_profit.push(profit.map(|p| p.net_profit));
        }

        DataFrame::new(vec![
            Column::new("store_nbr".into(), stores),
            date_column("date", &dates)?,
            Column::new("sales".into(), units),
            Column::new("price".into(), row_prices),
            Column::new("gross_profit".into(), gross_profit),
            Column::new("promotion_cost".into(), promotion_cost),
            Column::new("net_profit".into(), net_profit),
        ])
    }

    /// Sum every family within a store-day into one row.
    ///
    /// Keys: (store_nbr, date). Aggregation: sum of [`BASE_COLUMNS`], missing values
    /// skipped. Rows with a missing key are dropped; output is sorted by key.
    pub fn collapse_store_days(rows: &DataFrame) -> PolarsResult<DataFrame> {
        Self::sum_by(rows.clone().lazy(), "date", &BASE_COLUMNS).collect()
    }

    /// Per store-day transaction counts.
    ///
    /// Output columns: [store_nbr, date, transactions]
    pub fn parse_transactions(raw: &DataFrame) -> PolarsResult<DataFrame> {
        let stores = i64_values(raw, "store_nbr")?;
        let dates = parsed_dates(raw, "date")?;
        let transactions = f64_values(raw, "transactions")?;

        DataFrame::new(vec![
            Column::new("store_nbr".into(), stores),
            date_column("date", &dates)?,
            Column::new("transactions".into(), transactions),
        ])
    }

    /// Left join transaction counts onto store-day sales by (store_nbr, date).
    ///
    /// Store-days without a transaction row get zero transactions.
    pub fn join_transactions(
        daily: &DataFrame,
        transactions: &DataFrame,
    ) -> PolarsResult<DataFrame> {
        let keys = [col("store_nbr"), col("date")];
        let transactions = transactions.clone().lazy().select([
            col("store_nbr").cast(DataType::Int64),
            col("date"),
            col("transactions").cast(DataType::Float64),
        ]);

        daily
            .clone()
            .lazy()
            .join(transactions, keys.clone(), keys, JoinArgs::new(JoinType::Left))
            .with_column(col("transactions").fill_null(lit(0.0)))
            .sort_by_exprs([col("store_nbr"), col("date")], SortMultipleOptions::default())
            .collect()
    }

    /// Roll store-days up to store-months.
    ///
    /// Adds `report_date`, the month end of `date`. Keys: (store_nbr, report_date).
    /// Aggregation: sum of [`BASE_COLUMNS`] and `transactions`. Sorted by key.
    pub fn roll_up_months(daily: &DataFrame) -> PolarsResult<DataFrame> {
        let report_dates: Vec<Option<NaiveDate>> = date_values(daily, "date")?
            .into_iter()
            .map(|d| d.map(month_end))
            .collect();

        let mut daily = daily.clone();
        daily.with_column(date_column("report_date", &report_dates)?)?;

        let mut measures = BASE_COLUMNS.to_vec();
        measures.push("transactions");
        Self::sum_by(daily.lazy(), "report_date", &measures).collect()
    }

    /// Add the funnel ratio columns.
    ///
    /// Divisions are unguarded: zero denominators give infinite or NaN ratios.
    pub fn add_funnel_ratios(monthly: &DataFrame) -> PolarsResult<DataFrame> {
        monthly
            .clone()
            .lazy()
            .with_columns([
                (col("sales") / col("transactions")).alias("items_per_transaction"),
                (col("gross_profit") / col("sales")).alias("income_per_item"),
                (col("net_profit") / col("gross_profit")).alias("profit_less_promotions_factor"),
            ])
            .collect()
    }

    /// Keep rows with `report_date` strictly before `cutoff`, then drop the first
    /// `warmup_rows` of what remains in table order.
    pub fn truncate(
        monthly: &DataFrame,
        cutoff: NaiveDate,
        warmup_rows: usize,
    ) -> PolarsResult<DataFrame> {
        let kept = monthly
            .clone()
            .lazy()
            .filter(
                col("report_date")
                    .cast(DataType::Int32)
                    .lt(lit(to_epoch_days(cutoff))),
            )
            .collect()?;

        let remaining = kept.height().saturating_sub(warmup_rows);
        let offset = i64::try_from(warmup_rows).unwrap_or(i64::MAX);
        Ok(kept.slice(offset, remaining))
    }

    fn sum_by(frame: LazyFrame, date_key: &str, measures: &[&str]) -> LazyFrame {
        let keys = [col("store_nbr"), col(date_key)];
        frame
            .filter(col("store_nbr").is_not_null().and(col(date_key).is_not_null()))
            .group_by(keys.clone())
            .agg(measures.iter().map(|m| col(*m).sum()).collect::<Vec<_>>())
            .sort_by_exprs(keys, SortMultipleOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn column_f64(df: &DataFrame, name: &str) -> Vec<Option<f64>> {
        f64_values(df, name).unwrap()
    }

    #[test]
    fn discount_factor_is_zero_without_promotions() {
        assert_eq!(profit_discount_factor(0.0, 50.0), 0.0);
        let profit = RowProfit::compute(4.0, 0.0, 3.0);
        assert_eq!(profit.gross_profit, 12.0);
        assert_eq!(profit.promotion_cost, 0.0);
        assert_eq!(profit.net_profit, 12.0);
    }

    #[test]
    fn discount_factor_scales_with_promotions_and_price() {
        // log2(4) / 100 * log2(8) = 0.02 * 3
        assert!((profit_discount_factor(3.0, 7.0) - 0.06).abs() < 1e-12);
        let profit = RowProfit::compute(10.0, 3.0, 7.0);
        assert!((profit.promotion_cost - 4.2).abs() < 1e-9);
        assert!((profit.net_profit - 65.8).abs() < 1e-9);
    }

    #[test]
    fn profits_non_negative_for_non_negative_inputs() {
        for units in [0.0, 1.0, 7.5, 300.0] {
            for promotions in [0.0, 1.0, 12.0, 700.0] {
                for price in [0.5, 1.5, 28.0, 50.0] {
                    let p = RowProfit::compute(units, promotions, price);
                    assert!(p.gross_profit >= 0.0);
                    assert!(p.promotion_cost >= 0.0);
                }
            }
        }
    }

    #[test]
    fn unpriced_family_leaves_profit_missing() {
        let raw = df!(
            "date" => ["2015-03-01", "2015-03-01"],
            "store_nbr" => [1i64, 1],
            "family" => ["DAIRY", "SPACESHIPS"],
            "sales" => [2.0, 5.0],
            "onpromotion" => [0i64, 0],
        )
        .unwrap();

        let rows = SalesProcessor::derive_row_profit(&raw, &PriceTable::new()).unwrap();
        assert_eq!(column_f64(&rows, "gross_profit"), vec![Some(6.0), None]);

        let daily = SalesProcessor::collapse_store_days(&rows).unwrap();
        assert_eq!(daily.height(), 1);
        assert_eq!(column_f64(&daily, "sales"), vec![Some(7.0)]);
        assert_eq!(column_f64(&daily, "gross_profit"), vec![Some(6.0)]);
    }

    #[test]
    fn unmatched_store_day_gets_zero_transactions() {
        let daily = DataFrame::new(vec![
            Column::new("store_nbr".into(), [1i64, 1]),
            date_column("date", &[Some(ymd(2015, 3, 1)), Some(ymd(2015, 3, 2))]).unwrap(),
            Column::new("sales".into(), [3.0, 4.0]),
        ])
        .unwrap();
        let raw_transactions = df!(
            "date" => ["2015-03-01"],
            "store_nbr" => [1i64],
            "transactions" => [120i64],
        )
        .unwrap();
        let transactions = SalesProcessor::parse_transactions(&raw_transactions).unwrap();

        let joined = SalesProcessor::join_transactions(&daily, &transactions).unwrap();

        assert_eq!(joined.height(), 2);
        assert_eq!(
            column_f64(&joined, "transactions"),
            vec![Some(120.0), Some(0.0)]
        );
    }

    #[test]
    fn monthly_roll_up_has_unique_keys() {
        let dates = [
            Some(ymd(2015, 3, 1)),
            Some(ymd(2015, 3, 31)),
            Some(ymd(2015, 4, 1)),
            Some(ymd(2015, 3, 15)),
        ];
        let daily = DataFrame::new(vec![
            Column::new("store_nbr".into(), [1i64, 1, 1, 2]),
            date_column("date", &dates).unwrap(),
            Column::new("sales".into(), [1.0, 2.0, 4.0, 8.0]),
            Column::new("gross_profit".into(), [1.0, 2.0, 4.0, 8.0]),
            Column::new("promotion_cost".into(), [0.0, 0.0, 0.0, 0.0]),
            Column::new("net_profit".into(), [1.0, 2.0, 4.0, 8.0]),
            Column::new("transactions".into(), [10.0, 10.0, 10.0, 10.0]),
        ])
        .unwrap();

        let monthly = SalesProcessor::roll_up_months(&daily).unwrap();

        assert_eq!(monthly.height(), 3);
        assert_eq!(
            date_values(&monthly, "report_date").unwrap(),
            vec![Some(ymd(2015, 3, 31)), Some(ymd(2015, 4, 30)), Some(ymd(2015, 3, 31))]
        );
        assert_eq!(column_f64(&monthly, "sales"), vec![Some(3.0), Some(4.0), Some(8.0)]);
        assert_eq!(
            column_f64(&monthly, "transactions"),
            vec![Some(20.0), Some(10.0), Some(10.0)]
        );
        let keys: std::collections::HashSet<_> = i64_values(&monthly, "store_nbr")
            .unwrap()
            .into_iter()
            .zip(date_values(&monthly, "report_date").unwrap())
            .collect();
        assert_eq!(keys.len(), monthly.height());
    }

    #[test]
    fn funnel_ratios_do_not_guard_zero_denominators() {
        let monthly = df!(
            "sales" => [10.0, 0.0],
            "gross_profit" => [40.0, 0.0],
            "net_profit" => [30.0, 0.0],
            "transactions" => [5.0, 0.0],
        )
        .unwrap();

        let ratios = SalesProcessor::add_funnel_ratios(&monthly).unwrap();

        assert_eq!(column_f64(&ratios, "items_per_transaction")[0], Some(2.0));
        assert_eq!(column_f64(&ratios, "income_per_item")[0], Some(4.0));
        assert_eq!(column_f64(&ratios, "profit_less_promotions_factor")[0], Some(0.75));
        assert!(column_f64(&ratios, "items_per_transaction")[1].unwrap().is_nan());
    }

    #[test]
    fn truncate_applies_cutoff_then_drops_leading_rows() {
        let dates = [
            Some(ymd(2016, 10, 31)),
            Some(ymd(2016, 11, 30)),
            Some(ymd(2016, 12, 31)),
            Some(ymd(2017, 1, 31)),
            Some(ymd(2016, 12, 31)),
        ];
        let monthly = DataFrame::new(vec![
            Column::new("store_nbr".into(), [1i64, 1, 1, 1, 2]),
            date_column("report_date", &dates).unwrap(),
        ])
        .unwrap();

        let cutoff = ymd(2017, 1, 1);
        let truncated = SalesProcessor::truncate(&monthly, cutoff, 2).unwrap();

        assert_eq!(
            date_values(&truncated, "report_date").unwrap(),
            vec![Some(ymd(2016, 12, 31)), Some(ymd(2016, 12, 31))]
        );
        assert_eq!(i64_values(&truncated, "store_nbr").unwrap(), vec![Some(1), Some(2)]);
        assert_eq!(SalesProcessor::truncate(&monthly, cutoff, 10).unwrap().height(), 0);
    }
}
