use crate::data::filter::{BoundingBox, box_indices};
use crate::data::model::{GriddedSeries, ScalarSeries};
use crate::error::{PipelineError, Result};

/// Average one channel of `field` over the cells inside `bbox`, one value per
/// date.
///
/// This is a plain box average: every selected cell has the same weight, no
/// cos(latitude) area weighting is applied. For a narrow equatorial box such
/// as Niño 3.4 the difference is negligible, but it is an approximation of
/// the true area mean.
///
/// Missing (NaN) cells are skipped; a date on which every selected cell is
/// missing is an error.
pub fn reduce(field: &GriddedSeries, channel: &str, bbox: &BoundingBox) -> Result<ScalarSeries> {
    let c = field.channel_index(channel)?;
    let cells = box_indices(field.grid(), bbox)?;

    let mut values = Vec::with_capacity(field.len());
    for (t, &date) in field.dates().iter().enumerate() {
        let frame = field.channel_frame(t, c);
        let (sum, n) = cells
            .iter()
            .map(|&k| frame[k])
            .filter(|v| !v.is_nan())
            .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
        if n == 0 {
            return Err(PipelineError::MissingData { date });
        }
        values.push(sum / n as f64);
    }

    ScalarSeries::new(field.dates().to_vec(), values)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::data::model::{Channel, Grid};

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2000, 1, d).unwrap()
    }

    /// 4×4 grid, latitude stored north → south, cell value = 10·row + col,
    /// plus 100·t on day t.
    fn four_by_four(days: u32) -> GriddedSeries {
        let grid = Grid::new(vec![3.0, 2.0, 1.0, 0.0], vec![10.0, 11.0, 12.0, 13.0]).unwrap();
        let mut values = Vec::new();
        for t in 0..days {
            for row in 0..4 {
                for col in 0..4 {
                    values.push(f64::from(100 * t + 10 * row + col));
                }
            }
        }
        GriddedSeries::new(
            (1..=days).map(date).collect(),
            grid,
            vec![Channel::surface("sst")],
            values,
        )
        .unwrap()
    }

    #[test]
    fn box_average_uses_exactly_the_cells_inside_the_box() {
        let field = four_by_four(2);
        // lat 1..2 → rows 1,2 ; lon 11..12 → cols 1,2
        let bbox = BoundingBox::new((1.0, 2.0), (11.0, 12.0)).unwrap();
        let series = reduce(&field, "sst", &bbox).unwrap();

        assert_eq!(series.len(), field.len());
        // (11 + 12 + 21 + 22) / 4
        assert_eq!(series.values()[0], 16.5);
        assert_eq!(series.values()[1], 116.5);
        assert_eq!(series.dates(), field.dates());
    }

    #[test]
    fn whole_grid_box_matches_full_mean() {
        let field = four_by_four(1);
        let bbox = BoundingBox::new((-90.0, 90.0), (0.0, 360.0)).unwrap();
        let series = reduce(&field, "sst", &bbox).unwrap();
        // mean of 10·row + col over 0..4 × 0..4 = 15 + 1.5
        assert_eq!(series.values()[0], 16.5);
    }

    #[test]
    fn single_cell_box() {
        let field = four_by_four(1);
        let bbox = BoundingBox::new((2.5, 3.5), (12.5, 13.5)).unwrap();
        let series = reduce(&field, "sst", &bbox).unwrap();
        assert_eq!(series.values()[0], 3.0);
    }

    #[test]
    fn missing_cells_are_skipped_but_all_missing_fails() {
        let grid = Grid::new(vec![1.0, 0.0], vec![0.0]).unwrap();
        let field = GriddedSeries::new(
            vec![date(1), date(2)],
            grid,
            vec![Channel::surface("sst")],
            vec![f64::NAN, 4.0, f64::NAN, f64::NAN],
        )
        .unwrap();
        let bbox = BoundingBox::new((0.0, 1.0), (-1.0, 1.0)).unwrap();
        assert_eq!(
            reduce(&field, "sst", &bbox),
            Err(PipelineError::MissingData { date: date(2) })
        );

        let first_day = GriddedSeries::new(
            vec![date(1)],
            field.grid().clone(),
            field.channels().to_vec(),
            field.snapshot(0).to_vec(),
        )
        .unwrap();
        assert_eq!(reduce(&first_day, "sst", &bbox).unwrap().values(), &[4.0]);
    }

    #[test]
    fn unknown_channel_and_empty_box_fail() {
        let field = four_by_four(1);
        let bbox = BoundingBox::new((1.0, 2.0), (11.0, 12.0)).unwrap();
        assert!(matches!(
            reduce(&field, "t2m", &bbox),
            Err(PipelineError::UnknownChannel(_))
        ));

        let outside = BoundingBox::new((40.0, 50.0), (11.0, 12.0)).unwrap();
        assert!(matches!(
            reduce(&field, "sst", &outside),
            Err(PipelineError::EmptySelection { axis: "latitude", .. })
        ));
    }
}
