use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};

use crate::data::model::{AnomalySeries, ScalarSeries};
use crate::error::{PipelineError, Result};

/// Standard deviations at or below this (relative to the mean's magnitude)
/// count as zero when normalizing.
const DEGENERATE_STD: f64 = 1e-12;

/// Day-of-year (1..=366) of a calendar date.
///
/// This is the plain ordinal: Feb 29 is day 60 of a leap year and keeps its
/// own slot, so every later day of a leap year sits one ordinal above the
/// same calendar day of a common year, and day 366 only exists in leap years.
pub fn day_of_year(date: NaiveDate) -> u32 {
    date.ordinal()
}

/// Mean and standard deviation of one day-of-year across all years.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DayStats {
    pub mean: f64,
    /// Population standard deviation (divisor = `count`).
    pub std: f64,
    /// Number of years contributing.
    pub count: usize,
}

/// Per-day-of-year statistics of a scalar series.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Climatology {
    days: BTreeMap<u32, DayStats>,
}

impl Climatology {
    pub fn get(&self, day_of_year: u32) -> Option<&DayStats> {
        self.days.get(&day_of_year)
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &DayStats)> + '_ {
        self.days.iter().map(|(&d, s)| (d, s))
    }
}

/// Group `series` by day-of-year and compute mean and population standard
/// deviation of each group.
pub fn climatology(series: &ScalarSeries) -> Climatology {
    let mut groups: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
    for (date, value) in series.iter() {
        groups.entry(day_of_year(date)).or_default().push(value);
    }

    let days = groups
        .into_iter()
        .map(|(doy, values)| {
            let n = values.len() as f64;
            let mean = values.iter().sum::<f64>() / n;
            let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
            (
                doy,
                DayStats {
                    mean,
                    std: var.sqrt(),
                    count: values.len(),
                },
            )
        })
        .collect();
    Climatology { days }
}

/// Subtract the day-of-year mean from every value, and with `normalize`
/// divide by the day-of-year standard deviation.
pub fn anomalize(series: &ScalarSeries, clim: &Climatology, normalize: bool) -> Result<AnomalySeries> {
    let values = series
        .iter()
        .map(|(date, value)| {
            let doy = day_of_year(date);
            let stats = clim.get(doy).ok_or(PipelineError::ClimatologyGap {
                date,
                day_of_year: doy,
            })?;
            let anomaly = value - stats.mean;
            if !normalize {
                return Ok(anomaly);
            }
            if stats.std <= DEGENERATE_STD * stats.mean.abs().max(1.0) {
                return Err(PipelineError::DegenerateVariance { day_of_year: doy });
            }
            Ok(anomaly / stats.std)
        })
        .collect::<Result<Vec<f64>>>()?;

    ScalarSeries::new(series.dates().to_vec(), values)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn daily(start: NaiveDate, values: Vec<f64>) -> ScalarSeries {
        let dates = start.iter_days().take(values.len()).collect();
        ScalarSeries::new(dates, values).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn leap_day_keeps_its_own_day_of_year() {
        assert_eq!(day_of_year(date(2001, 2, 28)), 59);
        assert_eq!(day_of_year(date(2000, 2, 29)), 60);
        assert_eq!(day_of_year(date(2001, 3, 1)), 60);
        assert_eq!(day_of_year(date(2000, 12, 31)), 366);
    }

    #[test]
    fn repeated_seasonal_cycle_has_zero_spread_and_zero_anomalies() {
        // Two common years with the same value for each day-of-year.
        let cycle: Vec<f64> = (1..=365).map(|d| 25.0 + (f64::from(d) / 58.0).sin()).collect();
        let values = [cycle.clone(), cycle].concat();
        let series = daily(date(2001, 1, 1), values);

        let clim = climatology(&series);
        assert_eq!(clim.len(), 365);
        for (_, stats) in clim.iter() {
            assert_eq!(stats.count, 2);
            assert!(stats.std < 1e-12, "std = {}", stats.std);
        }

        let anomalies = anomalize(&series, &clim, false).unwrap();
        assert_eq!(anomalies.len(), series.len());
        assert!(anomalies.values().iter().all(|a| a.abs() < 1e-12));
    }

    #[test]
    fn population_std_and_normalized_anomalies() {
        // Jan 1 of three years: 1, 2, 3 → mean 2, population std sqrt(2/3).
        let series = ScalarSeries::new(
            vec![date(2001, 1, 1), date(2002, 1, 1), date(2003, 1, 1)],
            vec![1.0, 2.0, 3.0],
        )
        .unwrap();
        let clim = climatology(&series);
        let stats = clim.get(1).unwrap();
        assert_eq!(stats.mean, 2.0);
        assert!((stats.std - (2.0f64 / 3.0).sqrt()).abs() < 1e-12);

        let raw = anomalize(&series, &clim, false).unwrap();
        assert_eq!(raw.values(), &[-1.0, 0.0, 1.0]);

        let norm = anomalize(&series, &clim, true).unwrap();
        let expected = 1.0 / (2.0f64 / 3.0).sqrt();
        assert!((norm.values()[2] - expected).abs() < 1e-12);
        assert!((norm.values()[0] + expected).abs() < 1e-12);
    }

    #[test]
    fn normalizing_a_zero_variance_day_fails() {
        let series = ScalarSeries::new(
            vec![date(2001, 1, 1), date(2001, 1, 2), date(2002, 1, 1), date(2002, 1, 2)],
            vec![1.0, 5.0, 3.0, 5.0],
        )
        .unwrap();
        let clim = climatology(&series);
        assert_eq!(clim.get(2).unwrap().std, 0.0);
        assert_eq!(
            anomalize(&series, &clim, true),
            Err(PipelineError::DegenerateVariance { day_of_year: 2 })
        );
        // Without normalization the same data is fine.
        assert!(anomalize(&series, &clim, false).is_ok());
    }

    #[test]
    fn missing_day_of_year_is_a_gap() {
        let base = daily(date(2001, 1, 1), vec![1.0, 2.0]);
        let clim = climatology(&base);
        let later = daily(date(2001, 1, 3), vec![3.0]);
        assert_eq!(
            anomalize(&later, &clim, false),
            Err(PipelineError::ClimatologyGap {
                date: date(2001, 1, 3),
                day_of_year: 3
            })
        );
    }

    #[test]
    fn leap_day_has_fewer_contributing_years() {
        let values = vec![0.0; 365 * 3 + 366];
        let series = daily(date(1999, 1, 1), values);
        let clim = climatology(&series);
        assert_eq!(clim.len(), 366);
        assert_eq!(clim.get(366).unwrap().count, 1);
        assert_eq!(clim.get(60).unwrap().count, 4);
        assert_eq!(clim.get(1).unwrap().count, 4);
    }
}
