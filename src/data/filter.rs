use std::ops::Range;

use crate::error::{PipelineError, Result};

use super::model::{Axis, Grid, Orientation};

// ---------------------------------------------------------------------------
// BoundingBox – a closed latitude/longitude rectangle
// ---------------------------------------------------------------------------

/// Closed `[min, max]` box in degrees. Construction rejects unordered bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    lat: (f64, f64),
    lon: (f64, f64),
}

impl BoundingBox {
    pub fn new(lat: (f64, f64), lon: (f64, f64)) -> Result<Self> {
        check_range("latitude", lat)?;
        check_range("longitude", lon)?;
        Ok(BoundingBox { lat, lon })
    }

    pub fn lat(&self) -> (f64, f64) {
        self.lat
    }

    pub fn lon(&self) -> (f64, f64) {
        self.lon
    }

    /// Shift the longitude bounds into the convention used by `grid`
    /// (0..360 when every grid longitude is non-negative, -180..180
    /// otherwise). Returns `Ok(None)` when no shift is needed.
    ///
    /// Boxes that straddle the grid's seam would select a single edge slice
    /// of the grid and are rejected.
    pub fn in_grid_convention(&self, grid: &Grid) -> Result<Option<BoundingBox>> {
        let (grid_min, _) = grid.lon.bounds();
        let (lo, hi) = if grid_min >= 0.0 { (0.0, 360.0) } else { (-180.0, 180.0) };
        let (min, max) = self.lon;
        let shift = if min < lo {
            360.0
        } else if max > hi {
            -360.0
        } else {
            0.0
        };
        let lon = (min + shift, max + shift);
        if lon.0 < lo || lon.1 > hi {
            return Err(PipelineError::LongitudeSeam {
                min,
                max,
                seam: if lo == 0.0 { 0.0 } else { 180.0 },
            });
        }
        if shift == 0.0 {
            return Ok(None);
        }
        Ok(Some(BoundingBox { lat: self.lat, lon }))
    }
}

fn check_range(axis: &'static str, (min, max): (f64, f64)) -> Result<()> {
    // `!(max > min)` also rejects NaN bounds.
    if !(max > min) {
        return Err(PipelineError::InvalidRange { axis, min, max });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Axis selection
// ---------------------------------------------------------------------------

/// Positions of the coordinates of `axis` inside the closed `[min, max]`
/// interval, computed in the axis's own storage order. The result is a
/// contiguous range because the axis is strictly monotonic.
pub fn axis_range(axis: &Axis, min: f64, max: f64) -> Result<Range<usize>> {
    check_range(axis.name(), (min, max))?;
    let v = axis.values();
    let range = match axis.orientation() {
        Orientation::Ascending => {
            v.partition_point(|&x| x < min)..v.partition_point(|&x| x <= max)
        }
        Orientation::Descending => {
            v.partition_point(|&x| x > max)..v.partition_point(|&x| x >= min)
        }
    };
    if range.is_empty() {
        return Err(PipelineError::EmptySelection {
            axis: axis.name(),
            min,
            max,
        });
    }
    Ok(range)
}

/// Flat cell indices (row-major, latitude outer) of every grid cell inside
/// `bbox`.
pub fn box_indices(grid: &Grid, bbox: &BoundingBox) -> Result<Vec<usize>> {
    let (lat_min, lat_max) = bbox.lat;
    let (lon_min, lon_max) = bbox.lon;
    let rows = axis_range(&grid.lat, lat_min, lat_max)?;
    let cols = axis_range(&grid.lon, lon_min, lon_max)?;
    let width = grid.lon.len();
    Ok(rows
        .flat_map(|i| cols.clone().map(move |j| i * width + j))
        .collect())
}
