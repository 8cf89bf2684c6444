use chrono::{Duration, NaiveDate};

use crate::data::model::{GriddedSeries, IndexSeries, ensure_contiguous};
use crate::error::{PipelineError, Result};

use super::split::SplitRange;
use super::store::IndexedExampleStore;

/// Pair predictor frames with index values `lead_time_days` later.
///
/// For a split `[start, end]` the target slice is `[start, end]` and the
/// predictor slice is `[start - lead, end - lead]`, so example `i` pairs the
/// predictor of `start - lead + i` with the target of `start + i`.
///
/// Nothing is clipped: if the predictor series starts after `start - lead`
/// the call fails instead of quietly producing a shorter, shifted store.
pub fn align<'a>(
    predictor: &'a GriddedSeries,
    target: &'a IndexSeries,
    lead_time_days: u32,
    split: &SplitRange,
) -> Result<IndexedExampleStore<'a>> {
    let lead = Duration::days(i64::from(lead_time_days));
    let shift = |d: NaiveDate| {
        d.checked_sub_signed(lead)
            .ok_or_else(|| PipelineError::InvalidSplit(format!("{d} minus {lead_time_days} days")))
    };
    let predictor_start = shift(split.start())?;
    let predictor_end = shift(split.end())?;

    if let Some(&first) = predictor.dates().first() {
        if predictor_start < first {
            return Err(PipelineError::InsufficientHistory {
                series: "predictor",
                requested: predictor_start,
                available: first,
            });
        }
    }

    let p = date_slice(predictor.dates(), predictor_start, predictor_end);
    let t = date_slice(target.dates(), split.start(), split.end());
    ensure_contiguous(&predictor.dates()[p.clone()])?;
    ensure_contiguous(&target.dates()[t.clone()])?;

    let expected = split.days();
    if p.len() != expected || t.len() != expected {
        return Err(PipelineError::AlignmentMismatch {
            expected,
            predictor: p.len(),
            target: t.len(),
        });
    }

    if let Some((date, _)) = target.dates()[t.clone()]
        .iter()
        .zip(&target.values()[t.clone()])
        .find(|(_, v)| v.is_none())
    {
        return Err(PipelineError::UndefinedTarget { date: *date });
    }

    Ok(IndexedExampleStore::new(
        predictor,
        target,
        p.start,
        t.start,
        expected,
        lead_time_days,
    ))
}

/// Positions of `dates` (sorted) falling inside `[start, end]`.
fn date_slice(dates: &[NaiveDate], start: NaiveDate, end: NaiveDate) -> std::ops::Range<usize> {
    dates.partition_point(|d| *d < start)..dates.partition_point(|d| *d <= end)
}

#[cfg(test)]
mod tests {
    use chrono::Datelike;

    use super::*;
    use crate::data::model::{Channel, Grid};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// Single-cell predictor whose value encodes the day of month.
    fn predictor(start: NaiveDate, days: usize) -> GriddedSeries {
        let dates: Vec<NaiveDate> = start.iter_days().take(days).collect();
        let values = dates.iter().map(|d| f64::from(d.day())).collect();
        GriddedSeries::new(
            dates,
            Grid::new(vec![0.0], vec![0.0]).unwrap(),
            vec![Channel::surface("t2m")],
            values,
        )
        .unwrap()
    }

    fn index(start: NaiveDate, values: Vec<Option<f64>>) -> IndexSeries {
        let dates = start.iter_days().take(values.len()).collect();
        IndexSeries::new(dates, values).unwrap()
    }

    #[test]
    fn lead_time_shifts_predictor_dates_back() {
        let pred = predictor(date(2000, 1, 1), 20);
        let target = index(date(2000, 1, 1), (1..=20).map(|d| Some(f64::from(d) * 0.1)).collect());
        let split = SplitRange::new(date(2000, 1, 6), date(2000, 1, 10)).unwrap();

        let store = align(&pred, &target, 5, &split).unwrap();
        assert_eq!(store.len(), 5);
        for i in 0..5 {
            let ex = store.get(i).unwrap();
            assert_eq!(ex.predictor_date, date(2000, 1, 1 + i as u32));
            assert_eq!(ex.target_date, date(2000, 1, 6 + i as u32));
            assert_eq!(ex.target_date - ex.predictor_date, store.lead_time());
            assert_eq!(ex.snapshot, &[f64::from(1 + i as u32)]);
            assert!((ex.target - f64::from(6 + i as u32) * 0.1).abs() < 1e-12);
        }
    }

    #[test]
    fn zero_lead_time_pairs_same_day() {
        let pred = predictor(date(2000, 1, 1), 10);
        let target = index(date(2000, 1, 1), vec![Some(1.0); 10]);
        let split = SplitRange::new(date(2000, 1, 1), date(2000, 1, 10)).unwrap();
        let store = align(&pred, &target, 0, &split).unwrap();
        assert_eq!(store.len(), 10);
        let last = store.get(9).unwrap();
        assert_eq!(last.predictor_date, last.target_date);
    }

    #[test]
    fn shift_before_first_predictor_date_fails() {
        let pred = predictor(date(2000, 1, 1), 20);
        let target = index(date(2000, 1, 1), vec![Some(0.0); 20]);
        let split = SplitRange::new(date(2000, 1, 4), date(2000, 1, 10)).unwrap();
        assert_eq!(
            align(&pred, &target, 5, &split).unwrap_err(),
            PipelineError::InsufficientHistory {
                series: "predictor",
                requested: date(1999, 12, 30),
                available: date(2000, 1, 1),
            }
        );
    }

    #[test]
    fn target_not_covering_the_split_is_a_mismatch() {
        let pred = predictor(date(2000, 1, 1), 30);
        let target = index(date(2000, 1, 1), vec![Some(0.0); 12]);
        let split = SplitRange::new(date(2000, 1, 6), date(2000, 1, 15)).unwrap();
        assert_eq!(
            align(&pred, &target, 5, &split).unwrap_err(),
            PipelineError::AlignmentMismatch {
                expected: 10,
                predictor: 10,
                target: 7,
            }
        );
    }

    #[test]
    fn predictor_ending_early_is_a_mismatch() {
        let pred = predictor(date(2000, 1, 1), 8);
        let target = index(date(2000, 1, 1), vec![Some(0.0); 20]);
        let split = SplitRange::new(date(2000, 1, 6), date(2000, 1, 15)).unwrap();
        assert!(matches!(
            align(&pred, &target, 5, &split),
            Err(PipelineError::AlignmentMismatch { predictor: 8, target: 10, .. })
        ));
    }

    #[test]
    fn gap_inside_predictor_slice_is_reported() {
        let mut dates: Vec<NaiveDate> = date(2000, 1, 1).iter_days().take(10).collect();
        dates.remove(3);
        let pred = GriddedSeries::new(
            dates,
            Grid::new(vec![0.0], vec![0.0]).unwrap(),
            vec![Channel::surface("t2m")],
            vec![0.0; 9],
        )
        .unwrap();
        let target = index(date(2000, 1, 1), vec![Some(0.0); 10]);
        let split = SplitRange::new(date(2000, 1, 3), date(2000, 1, 8)).unwrap();
        assert_eq!(
            align(&pred, &target, 1, &split).unwrap_err(),
            PipelineError::NonContiguousSeries {
                before: date(2000, 1, 3),
                after: date(2000, 1, 5)
            }
        );
    }

    #[test]
    fn warm_up_days_without_index_value_are_rejected() {
        let pred = predictor(date(2000, 1, 1), 10);
        let target = index(date(2000, 1, 1), vec![None, None, Some(1.0), Some(2.0), Some(3.0)]);
        let split = SplitRange::new(date(2000, 1, 2), date(2000, 1, 5)).unwrap();
        assert_eq!(
            align(&pred, &target, 1, &split).unwrap_err(),
            PipelineError::UndefinedTarget { date: date(2000, 1, 2) }
        );
        let split = SplitRange::new(date(2000, 1, 3), date(2000, 1, 5)).unwrap();
        assert_eq!(align(&pred, &target, 1, &split).unwrap().len(), 3);
    }
}
