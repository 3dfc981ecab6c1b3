//! Calendar helpers for the date columns.
//!
//! Dates are stored in polars as `Date`, i.e. days since 1970-01-01 in an `i32`.

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use polars::prelude::*;

/// Days from 0001-01-01 (CE day 1) to 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

pub fn to_epoch_days(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

pub fn from_epoch_days(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days.checked_add(UNIX_EPOCH_DAYS_FROM_CE)?)
}

/// Parse `YYYY-MM-DD`, tolerating a trailing time component.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|dt| dt.date()))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S").map(|dt| dt.date()))
        .ok()
}

/// Last day of the month containing `date`. A month-end date maps to itself.
pub fn month_end(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|first_of_next| first_of_next.pred_opt())
        .unwrap_or(date)
}

/// Whole calendar months from `start` to `end`, ignoring the day of month.
pub fn months_between(start: NaiveDate, end: NaiveDate) -> i32 {
    (end.year() - start.year()) * 12 + end.month() as i32 - start.month() as i32
}

/// Build a `Date` column from optional calendar dates.
pub fn date_column(name: &str, dates: &[Option<NaiveDate>]) -> PolarsResult<Column> {
    let days: Vec<Option<i32>> = dates.iter().map(|d| d.map(to_epoch_days)).collect();
    Column::new(name.into(), days).cast(&DataType::Date)
}

/// Read a `Date` column back into calendar dates.
pub fn date_values(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<NaiveDate>>> {
    let days = df.column(name)?.cast(&DataType::Int32)?;
    Ok(days
        .i32()?
        .into_iter()
        .map(|d| d.and_then(from_epoch_days))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn epoch_days_match_unix_epoch() {
        assert_eq!(to_epoch_days(ymd(1970, 1, 1)), 0);
        assert_eq!(to_epoch_days(ymd(1970, 1, 2)), 1);
        assert_eq!(from_epoch_days(to_epoch_days(ymd(2016, 2, 29))), Some(ymd(2016, 2, 29)));
    }

    #[test]
    fn month_end_rolls_forward_within_month() {
        assert_eq!(month_end(ymd(2013, 1, 1)), ymd(2013, 1, 31));
        assert_eq!(month_end(ymd(2016, 2, 10)), ymd(2016, 2, 29));
        assert_eq!(month_end(ymd(2015, 2, 28)), ymd(2015, 2, 28));
        assert_eq!(month_end(ymd(2016, 12, 31)), ymd(2016, 12, 31));
    }

    #[test]
    fn months_between_counts_calendar_months() {
        assert_eq!(months_between(ymd(2013, 1, 31), ymd(2013, 1, 31)), 0);
        assert_eq!(months_between(ymd(2013, 1, 31), ymd(2013, 2, 28)), 1);
        assert_eq!(months_between(ymd(2013, 1, 31), ymd(2015, 2, 28)), 25);
    }

    #[test]
    fn parse_date_accepts_plain_and_timestamped_values() {
        assert_eq!(parse_date("2013-01-01"), Some(ymd(2013, 1, 1)));
        assert_eq!(parse_date("2013-01-01 00:00:00"), Some(ymd(2013, 1, 1)));
        assert_eq!(parse_date("not a date"), None);
    }

    #[test]
    fn date_column_round_trips_nulls() {
        let dates = [Some(ymd(2014, 5, 31)), None];
        let df = DataFrame::new(vec![date_column("d", &dates).unwrap()]).unwrap();
        assert_eq!(df.column("d").unwrap().dtype(), &DataType::Date);
        assert_eq!(date_values(&df, "d").unwrap(), dates.to_vec());
    }
}
