//! Stats module - funnel variable summaries

mod calculator;

pub use calculator::{FunnelStats, GroupFunnelStats, StatsCalculator};
