//! Statistics Calculator Module
//! Descriptive statistics of the funnel variables, overall and per store group.

use crate::data::{DemoData, STORE_ID};
use polars::prelude::*;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;

/// Descriptive statistics for one funnel variable.
///
/// Only finite values are counted; infinite and NaN ratios from zero denominators
/// are skipped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunnelStats {
    pub variable: String,
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub std: f64,
    pub p05: f64,
    pub p95: f64,
}

impl FunnelStats {
    fn empty(variable: &str) -> Self {
        Self {
            variable: variable.to_string(),
            count: 0,
            mean: f64::NAN,
            median: f64::NAN,
            std: f64::NAN,
            p05: f64::NAN,
            p95: f64::NAN,
        }
    }
}

/// Funnel statistics for one value of a grouping variable.
#[derive(Debug, Clone, Serialize)]
pub struct GroupFunnelStats {
    pub group_variable: String,
    pub group: String,
    pub stats: Vec<FunnelStats>,
}

/// Handles statistical calculations with multi-threading support.
pub struct StatsCalculator;

impl StatsCalculator {
    /// Compute descriptive statistics for an array of values.
    pub fn compute_descriptive_stats(variable: &str, values: &[f64]) -> FunnelStats {
        let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        let n = sorted.len();
        if n == 0 {
            return FunnelStats::empty(variable);
        }
        sorted.sort_by(|a, b| a.total_cmp(b));

        let mean = sorted.iter().sum::<f64>() / n as f64;
        let median = if n % 2 == 0 {
            (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
        } else {
            sorted[n / 2]
        };

        let variance = if n > 1 {
            sorted.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64
        } else {
            0.0
        };

        FunnelStats {
            variable: variable.to_string(),
            count: n,
            mean,
            median,
            std: variance.sqrt(),
            p05: Self::percentile(&sorted, 5.0),
            p95: Self::percentile(&sorted, 95.0),
        }
    }

    /// Calculate percentile using linear interpolation (NumPy compatible).
    fn percentile(sorted_values: &[f64], p: f64) -> f64 {
        let n = sorted_values.len();
        if n == 0 {
            return f64::NAN;
        }
        if n == 1 {
            return sorted_values[0];
        }

        let rank = (p / 100.0) * (n - 1) as f64;
        let lower = rank.floor() as usize;
        let upper = (rank.ceil() as usize).min(n - 1);
        let frac = rank - lower as f64;

        if lower == upper {
            sorted_values[lower]
        } else {
            sorted_values[lower] * (1.0 - frac) + sorted_values[upper] * frac
        }
    }

    fn values(df: &DataFrame, column: &str) -> PolarsResult<Vec<f64>> {
        Ok(df
            .column(column)?
            .cast(&DataType::Float64)?
            .f64()?
            .into_iter()
            .flatten()
            .collect())
    }

    /// Statistics of every funnel variable over the whole sales table, in parallel.
    pub fn summarize_funnel(data: &DemoData) -> PolarsResult<Vec<FunnelStats>> {
        data.funnel_variables
            .par_iter()
            .map(|variable| {
                let values = Self::values(&data.sales, variable)?;
                Ok(Self::compute_descriptive_stats(variable, &values))
            })
            .collect()
    }

    /// Statistics of every funnel variable per value of `group_variable`.
    ///
    /// Sales rows are matched to their store's attribute on `store_nbr`. Stores with
    /// a missing attribute are grouped under `"null"`.
    pub fn summarize_by_group(
        data: &DemoData,
        group_variable: &str,
    ) -> PolarsResult<Vec<GroupFunnelStats>> {
        if !data.group_variables.iter().any(|g| g == group_variable) {
            return Err(PolarsError::ColumnNotFound(
                format!("{group_variable} is not a grouping variable").into(),
            ));
        }

        let attributes = data.stores.clone().lazy().select([
            col(STORE_ID).cast(DataType::Int64),
            col(group_variable).cast(DataType::String),
        ]);
        let joined = data
            .sales
            .clone()
            .lazy()
            .with_column(col(STORE_ID).cast(DataType::Int64))
            .join(
                attributes,
                [col(STORE_ID)],
                [col(STORE_ID)],
                JoinArgs::new(JoinType::Left),
            )
            .collect()?;

        let groups: Vec<String> = joined
            .column(group_variable)?
            .str()?
            .into_iter()
            .map(|g| g.unwrap_or("null").to_string())
            .collect();

        let mut per_group: BTreeMap<&str, BTreeMap<&str, Vec<f64>>> = BTreeMap::new();
        for variable in &data.funnel_variables {
            let column = joined.column(variable)?.cast(&DataType::Float64)?;
            for (group, value) in groups.iter().zip(column.f64()?) {
                if let Some(value) = value {
                    per_group
                        .entry(group.as_str())
                        .or_default()
                        .entry(variable.as_str())
                        .or_default()
                        .push(value);
                }
            }
        }

        Ok(per_group
            .into_par_iter()
            .map(|(group, by_variable)| GroupFunnelStats {
                group_variable: group_variable.to_string(),
                group: group.to_string(),
                stats: data
                    .funnel_variables
                    .iter()
                    .map(|variable| {
                        let values = by_variable
                            .get(variable.as_str())
                            .map(Vec::as_slice)
                            .unwrap_or_default();
                        Self::compute_descriptive_stats(variable, values)
                    })
                    .collect(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo() -> DemoData {
        DemoData {
            sales: df!(
                "store_nbr" => [1i64, 1, 2, 3],
                "transactions" => [10.0, 20.0, 30.0, 40.0],
                "items_per_transaction" => [1.0, f64::INFINITY, 3.0, 5.0],
            )
            .unwrap(),
            stores: df!(
                "store_nbr" => [1i64, 2, 3],
                "store_type" => ["A", "B", "A"],
            )
            .unwrap(),
            group_variables: vec!["store_type".to_string()],
            funnel_variables: vec![
                "transactions".to_string(),
                "items_per_transaction".to_string(),
            ],
        }
    }

    #[test]
    fn descriptive_stats_skip_non_finite_values() {
        let stats = StatsCalculator::compute_descriptive_stats(
            "x",
            &[4.0, 1.0, f64::NAN, 3.0, 2.0, f64::NEG_INFINITY],
        );
        assert_eq!(stats.count, 4);
        assert_eq!(stats.mean, 2.5);
        assert_eq!(stats.median, 2.5);
        assert!((stats.p05 - 1.15).abs() < 1e-12);
        assert!((stats.p95 - 3.85).abs() < 1e-12);
    }

    #[test]
    fn empty_values_give_nan_stats() {
        let stats = StatsCalculator::compute_descriptive_stats("x", &[]);
        assert_eq!(stats.count, 0);
        assert!(stats.mean.is_nan());
    }

    #[test]
    fn summarize_funnel_keeps_variable_order() {
        let summary = StatsCalculator::summarize_funnel(&demo()).unwrap();
        let names: Vec<&str> = summary.iter().map(|s| s.variable.as_str()).collect();
        assert_eq!(names, vec!["transactions", "items_per_transaction"]);
        assert_eq!(summary[0].mean, 25.0);
        assert_eq!(summary[1].count, 3);
    }

    #[test]
    fn summarize_by_group_splits_on_store_attribute() {
        let summary = StatsCalculator::summarize_by_group(&demo(), "store_type").unwrap();

        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].group, "A");
        assert_eq!(summary[0].stats[0].count, 3);
        assert_eq!(summary[0].stats[0].mean, 70.0 / 3.0);
        assert_eq!(summary[1].group, "B");
        assert_eq!(summary[1].stats[1].mean, 3.0);
    }

    #[test]
    fn summarize_by_group_rejects_unknown_variable() {
        assert!(StatsCalculator::summarize_by_group(&demo(), "store_nbr").is_err());
    }
}
