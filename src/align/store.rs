use chrono::{Duration, NaiveDate};

use crate::data::model::{Channel, Grid, GriddedSeries, IndexSeries};
use crate::error::{PipelineError, Result};

/// One training example: the predictor frame on `predictor_date` and the
/// index value `lead_time` days later.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignedExample<'a> {
    pub predictor_date: NaiveDate,
    pub target_date: NaiveDate,
    /// All channels of the predictor frame (channel-major, lat × lon each).
    pub snapshot: &'a [f64],
    pub target: f64,
}

/// Random access to the examples of one split.
///
/// The store only holds positions into the two borrowed series; examples are
/// built on every `get`. It never mutates, so any number of threads may read
/// it at once.
#[derive(Debug, Clone, Copy)]
pub struct IndexedExampleStore<'a> {
    predictor: &'a GriddedSeries,
    target: &'a IndexSeries,
    predictor_offset: usize,
    target_offset: usize,
    len: usize,
    lead_time_days: u32,
}

impl<'a> IndexedExampleStore<'a> {
    /// Callers guarantee both slices hold `len` contiguous days starting at
    /// the given offsets.
    pub(crate) fn new(
        predictor: &'a GriddedSeries,
        target: &'a IndexSeries,
        predictor_offset: usize,
        target_offset: usize,
        len: usize,
        lead_time_days: u32,
    ) -> Self {
        IndexedExampleStore {
            predictor,
            target,
            predictor_offset,
            target_offset,
            len,
            lead_time_days,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn lead_time_days(&self) -> u32 {
        self.lead_time_days
    }

    pub fn lead_time(&self) -> Duration {
        Duration::days(i64::from(self.lead_time_days))
    }

    pub fn channels(&self) -> &'a [Channel] {
        self.predictor.channels()
    }

    pub fn grid(&self) -> &'a Grid {
        self.predictor.grid()
    }

    /// Example `i` pairs predictor position `predictor_offset + i` with target
    /// position `target_offset + i`.
    pub fn get(&self, i: usize) -> Result<AlignedExample<'a>> {
        if i >= self.len {
            return Err(PipelineError::IndexOutOfRange {
                index: i,
                len: self.len,
            });
        }
        let p = self.predictor_offset + i;
        let t = self.target_offset + i;
        let target_date = self.target.dates()[t];
        let target = self.target.values()[t]
            .ok_or(PipelineError::UndefinedTarget { date: target_date })?;
        Ok(AlignedExample {
            predictor_date: self.predictor.dates()[p],
            target_date,
            snapshot: self.predictor.snapshot(p),
            target,
        })
    }

    /// All examples in position order, yielding the same result `get` would.
    pub fn iter(&self) -> impl Iterator<Item = Result<AlignedExample<'a>>> + '_ {
        (0..self.len).map(move |i| self.get(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::aligner::align;
    use crate::align::split::SplitRange;

    fn fixtures() -> (GriddedSeries, IndexSeries) {
        let start = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
        let dates: Vec<NaiveDate> = start.iter_days().take(40).collect();
        let grid = Grid::new(vec![1.0, 0.0], vec![0.0, 1.0]).unwrap();
        let channels = vec![Channel::surface("t2m"), Channel::at_level("z", 500)];
        let values = (0..40 * 8).map(f64::from).collect();
        let predictor = GriddedSeries::new(dates.clone(), grid, channels, values).unwrap();
        let target = IndexSeries::new(dates, (0..40).map(|i| Some(f64::from(i))).collect()).unwrap();
        (predictor, target)
    }

    #[test]
    fn get_is_idempotent_and_bounded() {
        let (predictor, target) = fixtures();
        let split = SplitRange::new(
            NaiveDate::from_ymd_opt(2000, 1, 11).unwrap(),
            NaiveDate::from_ymd_opt(2000, 1, 20).unwrap(),
        )
        .unwrap();
        let store = align(&predictor, &target, 7, &split).unwrap();

        assert_eq!(store.len(), 10);
        assert_eq!(store.get(4).unwrap(), store.get(4).unwrap());
        assert_eq!(
            store.get(store.len()),
            Err(PipelineError::IndexOutOfRange { index: 10, len: 10 })
        );

        let first = store.get(0).unwrap();
        // Predictor day 3 (Jan 4), eight values per frame.
        assert_eq!(first.snapshot.len(), 8);
        assert_eq!(first.snapshot[0], 24.0);
        assert_eq!(first.target, 10.0);
        assert_eq!(store.channels().len(), 2);
        let all: Vec<_> = store.iter().collect::<Result<_>>().unwrap();
        assert_eq!(all.len(), 10);
        assert_eq!(all[4], store.get(4).unwrap());
    }

    #[test]
    fn concurrent_readers_see_the_same_examples() {
        let (predictor, target) = fixtures();
        let split = SplitRange::new(
            NaiveDate::from_ymd_opt(2000, 1, 5).unwrap(),
            NaiveDate::from_ymd_opt(2000, 2, 9).unwrap(),
        )
        .unwrap();
        let store = align(&predictor, &target, 3, &split).unwrap();

        let sums: Vec<f64> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|_| s.spawn(|| store.iter().map(|ex| ex.unwrap().target).sum::<f64>()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(sums.windows(2).all(|w| w[0] == w[1]));
        // Targets 4..=39.
        assert_eq!(sums[0], (4..=39).sum::<i32>() as f64);
    }

    #[test]
    fn iteration_surfaces_undefined_targets() {
        let (predictor, _) = fixtures();
        let dates = predictor.dates().to_vec();
        let mut values: Vec<Option<f64>> = (0..40).map(|i| Some(f64::from(i))).collect();
        values[12] = None;
        let target = IndexSeries::new(dates, values).unwrap();
        // Bypasses `align`, which would reject the gap up front.
        let store = IndexedExampleStore::new(&predictor, &target, 0, 10, 5, 10);

        let results: Vec<_> = store.iter().collect();
        assert_eq!(results.len(), 5);
        assert_eq!(
            results[2],
            Err(PipelineError::UndefinedTarget {
                date: NaiveDate::from_ymd_opt(2000, 1, 13).unwrap()
            })
        );
        assert_eq!(results[3].as_ref().unwrap().target, 13.0);
        assert!(store.iter().collect::<Result<Vec<_>>>().is_err());
    }
}
