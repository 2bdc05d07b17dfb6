use crate::error::{BudgetError, Result};
use chrono::{Datelike, Days, Months, NaiveDate};

pub fn first_day_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

pub fn last_day_of_month(year: i32, month: u32) -> NaiveDate {
    let next_month = if month == 12 { 1 } else { month + 1 };
    let next_year = if month == 12 { year + 1 } else { year };

    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.checked_sub_days(Days::new(1)))
        .unwrap_or(NaiveDate::MAX)
}

pub fn month_end(date: NaiveDate) -> NaiveDate {
    last_day_of_month(date.year(), date.month())
}

pub fn shift_months(date: NaiveDate, months: i32) -> Result<NaiveDate> {
    let shifted = if months >= 0 {
        date.checked_add_months(Months::new(months as u32))
    } else {
        date.checked_sub_months(Months::new(months.unsigned_abs()))
    };
    shifted.ok_or_else(|| {
        BudgetError::DateError(format!("Cannot shift {} by {} months", date, months))
    })
}

/// First-of-month dates from the month of `start` through the month of `end`.
pub fn get_month_starts_in_period(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut dates = Vec::new();
    let mut current = first_day_of_month(start);
    while current <= end {
        dates.push(current);
        match current.checked_add_months(Months::new(1)) {
            Some(next) => current = next,
            None => break,
        }
    }
    dates
}

/// Resolved month range for an aggregation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateRange {
    /// First day of the first visible month.
    pub start: NaiveDate,
    /// Last day of the last visible month.
    pub end: NaiveDate,
    /// First day of the first month used for computation. Earlier than
    /// `start` when a moving-average window needs history.
    pub padded_start: NaiveDate,
    /// Every month start from `padded_start` through `end`.
    pub months: Vec<NaiveDate>,
}

impl DateRange {
    pub fn contains_month(&self, month_start: NaiveDate) -> bool {
        month_start >= self.padded_start && month_start <= self.end
    }

    pub fn visible_months(&self) -> impl Iterator<Item = &NaiveDate> {
        self.months.iter().filter(move |m| **m >= self.start)
    }
}

/// Fills missing bounds with the earliest/latest of `dates`, widens them to
/// whole months and pads `window - 1` months in front of the start.
///
/// Returns `None` when a bound is missing and there are no dates to infer it
/// from.
pub fn resolve_date_range<I>(
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    dates: I,
    moving_average_window: Option<usize>,
) -> Result<Option<DateRange>>
where
    I: IntoIterator<Item = NaiveDate>,
{
    let (min, max) = dates
        .into_iter()
        .fold((None, None), |(min, max): (Option<NaiveDate>, Option<NaiveDate>), d| {
            (
                Some(min.map_or(d, |m| m.min(d))),
                Some(max.map_or(d, |m| m.max(d))),
            )
        });

    let (start, end) = match (start_date.or(min), end_date.or(max)) {
        (Some(s), Some(e)) => (first_day_of_month(s), month_end(e)),
        _ => return Ok(None),
    };

    if end < start {
        return Err(BudgetError::DateError(format!(
            "End date {} is before start date {}",
            end, start
        )));
    }

    let padding = match moving_average_window {
        Some(0) => return Err(BudgetError::InvalidWindow(0)),
        Some(w) => i32::try_from(w - 1).map_err(|_| BudgetError::InvalidWindow(w))?,
        None => 0,
    };
    let padded_start = shift_months(start, -padding)?;

    Ok(Some(DateRange {
        start,
        end,
        padded_start,
        months: get_month_starts_in_period(padded_start, end),
    }))
}

/// Trailing mean over `window` values. Positions without a full window are
/// `NaN`.
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<f64> {
    if window == 0 {
        return vec![f64::NAN; values.len()];
    }
    let mut result = Vec::with_capacity(values.len());
    let mut sum = 0.0;
    for (i, v) in values.iter().enumerate() {
        sum += v;
        if i >= window {
            sum -= values[i - window];
        }
        if i + 1 >= window {
            result.push(sum / window as f64);
        } else {
            result.push(f64::NAN);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_last_day_of_month() {
        assert_eq!(last_day_of_month(2023, 2), ymd(2023, 2, 28));
        assert_eq!(last_day_of_month(2024, 2), ymd(2024, 2, 29));
        assert_eq!(last_day_of_month(2023, 12), ymd(2023, 12, 31));
    }

    #[test]
    fn test_month_starts() {
        let months = get_month_starts_in_period(ymd(2022, 11, 15), ymd(2023, 2, 3));
        assert_eq!(
            months,
            vec![ymd(2022, 11, 1), ymd(2022, 12, 1), ymd(2023, 1, 1), ymd(2023, 2, 1)]
        );
    }

    #[test]
    fn test_resolve_date_range_rounds_bounds() {
        let range = resolve_date_range(Some(ymd(2023, 1, 17)), Some(ymd(2023, 3, 2)), [], None)
            .unwrap()
            .unwrap();
        assert_eq!(range.start, ymd(2023, 1, 1));
        assert_eq!(range.end, ymd(2023, 3, 31));
        assert_eq!(range.padded_start, range.start);
        assert_eq!(range.months.len(), 3);
    }

    #[test]
    fn test_resolve_date_range_infers_missing_bounds() {
        let dates = [ymd(2023, 5, 9), ymd(2023, 2, 20), ymd(2023, 4, 1)];
        let range = resolve_date_range(None, None, dates, None).unwrap().unwrap();
        assert_eq!(range.start, ymd(2023, 2, 1));
        assert_eq!(range.end, ymd(2023, 5, 31));

        assert!(resolve_date_range(None, None, [], None).unwrap().is_none());
    }

    #[test]
    fn test_resolve_date_range_pads_for_window() {
        let range = resolve_date_range(Some(ymd(2023, 3, 10)), Some(ymd(2023, 4, 1)), [], Some(3))
            .unwrap()
            .unwrap();
        assert_eq!(range.start, ymd(2023, 3, 1));
        assert_eq!(range.padded_start, ymd(2023, 1, 1));
        assert_eq!(range.months.len(), 4);
        assert_eq!(range.visible_months().count(), 2);

        assert!(matches!(
            resolve_date_range(Some(ymd(2023, 3, 10)), None, [ymd(2023, 4, 1)], Some(0)),
            Err(BudgetError::InvalidWindow(0))
        ));
    }

    #[test]
    fn test_resolve_date_range_rejects_inverted_bounds() {
        let result = resolve_date_range(Some(ymd(2023, 5, 1)), Some(ymd(2023, 2, 1)), [], None);
        assert!(matches!(result, Err(BudgetError::DateError(_))));
    }

    #[test]
    fn test_rolling_mean() {
        let ma = rolling_mean(&[3.0, 6.0, 9.0, 12.0], 3);
        assert!(ma[0].is_nan());
        assert!(ma[1].is_nan());
        assert!((ma[2] - 6.0).abs() < 1e-9);
        assert!((ma[3] - 9.0).abs() < 1e-9);

        let same = rolling_mean(&[1.0, 2.0], 1);
        assert_eq!(same, vec![1.0, 2.0]);
    }
}
