use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::{PipelineError, Result};

// ---------------------------------------------------------------------------
// Axis – a coordinate vector with an explicit orientation
// ---------------------------------------------------------------------------

/// Storage order of a coordinate axis.
///
/// Reanalysis products commonly store latitude north → south, so the
/// orientation is recorded when the axis is built instead of being assumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Ascending,
    Descending,
}

/// A strictly monotonic coordinate vector (latitude or longitude).
#[derive(Debug, Clone, PartialEq)]
pub struct Axis {
    name: &'static str,
    values: Vec<f64>,
    orientation: Orientation,
}

impl Axis {
    /// Build an axis, detecting its orientation. Fails if the values are not
    /// strictly increasing or strictly decreasing.
    pub fn new(name: &'static str, values: Vec<f64>) -> Result<Self> {
        if values.is_empty() {
            return Err(PipelineError::ShapeMismatch {
                expected: 1,
                actual: 0,
            });
        }
        let orientation = match values.as_slice() {
            [a, b, ..] if b < a => Orientation::Descending,
            _ => Orientation::Ascending,
        };
        for (i, pair) in values.windows(2).enumerate() {
            let ordered = match orientation {
                Orientation::Ascending => pair[0] < pair[1],
                Orientation::Descending => pair[0] > pair[1],
            };
            if !ordered {
                return Err(PipelineError::UnorderedAxis {
                    axis: name,
                    position: i + 1,
                });
            }
        }
        Ok(Axis {
            name,
            values,
            orientation,
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Smallest and largest coordinate, regardless of storage order.
    pub fn bounds(&self) -> (f64, f64) {
        let first = self.values[0];
        let last = self.values[self.values.len() - 1];
        match self.orientation {
            Orientation::Ascending => (first, last),
            Orientation::Descending => (last, first),
        }
    }
}

// ---------------------------------------------------------------------------
// Grid – the fixed latitude × longitude layout shared by every frame
// ---------------------------------------------------------------------------

/// Spatial layout of a field. Cell values are stored row-major, latitude
/// outer: cell `(i, j)` lives at `i * lon.len() + j`.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    pub lat: Axis,
    pub lon: Axis,
}

impl Grid {
    pub fn new(lat: Vec<f64>, lon: Vec<f64>) -> Result<Self> {
        Ok(Grid {
            lat: Axis::new("latitude", lat)?,
            lon: Axis::new("longitude", lon)?,
        })
    }

    /// Number of cells in one channel of one frame.
    pub fn cells(&self) -> usize {
        self.lat.len() * self.lon.len()
    }
}

// ---------------------------------------------------------------------------
// Channel – one variable (optionally at one pressure level)
// ---------------------------------------------------------------------------

/// A variable short code such as `sst` or `t`, plus its pressure level for
/// multi-level variables. Displays as `t_850` / `sst`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Channel {
    pub code: String,
    pub level: Option<u32>,
}

impl Channel {
    pub fn surface(code: impl Into<String>) -> Self {
        Channel {
            code: code.into(),
            level: None,
        }
    }

    pub fn at_level(code: impl Into<String>, level: u32) -> Self {
        Channel {
            code: code.into(),
            level: Some(level),
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.level {
            Some(level) => write!(f, "{}_{level}", self.code),
            None => write!(f, "{}", self.code),
        }
    }
}

// ---------------------------------------------------------------------------
// Frames – common read view used by the writer
// ---------------------------------------------------------------------------

/// Anything that is a sequence of timestamped multi-channel grid frames.
pub trait Frames {
    fn grid(&self) -> &Grid;
    fn channels(&self) -> &[Channel];
    fn frame_count(&self) -> usize;
    fn frame_time(&self, i: usize) -> NaiveDateTime;
    /// All channels of frame `i`, channel-major.
    fn frame(&self, i: usize) -> &[f64];
}

// ---------------------------------------------------------------------------
// GridRecord / RawField – sub-daily data as it comes off disk
// ---------------------------------------------------------------------------

/// One row of a gridded file: a single channel at a single timestamp.
#[derive(Debug, Clone)]
pub struct GridRecord {
    pub time: NaiveDateTime,
    pub channel: Channel,
    pub lat: Vec<f64>,
    pub lon: Vec<f64>,
    /// Row-major lat × lon values; NaN marks a missing cell.
    pub values: Vec<f64>,
}

/// A gridded field at its native (possibly sub-daily) time resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct RawField {
    times: Vec<NaiveDateTime>,
    grid: Grid,
    channels: Vec<Channel>,
    values: Vec<f64>,
}

impl RawField {
    /// Assemble records into a field. Every timestamp must carry every
    /// channel exactly once, all on the same grid.
    pub fn from_records(records: Vec<GridRecord>) -> Result<Self> {
        let first = records
            .first()
            .ok_or_else(|| PipelineError::GridMismatch("no records".into()))?;
        let grid = Grid::new(first.lat.clone(), first.lon.clone())?;
        let cells = grid.cells();

        // Channels keep the order in which they first appear.
        let mut seen = BTreeSet::new();
        let channels: Vec<Channel> = records
            .iter()
            .filter(|r| seen.insert(&r.channel))
            .map(|r| r.channel.clone())
            .collect();

        let mut by_time: BTreeMap<NaiveDateTime, BTreeMap<Channel, Vec<f64>>> = BTreeMap::new();
        for rec in records {
            if rec.lat != grid.lat.values() || rec.lon != grid.lon.values() {
                return Err(PipelineError::GridMismatch(format!(
                    "{} at {} uses a different grid",
                    rec.channel, rec.time
                )));
            }
            if rec.values.len() != cells {
                return Err(PipelineError::ShapeMismatch {
                    expected: cells,
                    actual: rec.values.len(),
                });
            }
            let slot = by_time.entry(rec.time).or_default();
            if slot.contains_key(&rec.channel) {
                return Err(PipelineError::GridMismatch(format!(
                    "duplicate {} at {}",
                    rec.channel, rec.time
                )));
            }
            slot.insert(rec.channel, rec.values);
        }

        let mut times = Vec::with_capacity(by_time.len());
        let mut values = Vec::with_capacity(by_time.len() * channels.len() * cells);
        for (time, mut frame) in by_time {
            for ch in &channels {
                let data = frame.remove(ch).ok_or_else(|| {
                    PipelineError::GridMismatch(format!("{ch} missing at {time}"))
                })?;
                values.extend(data);
            }
            times.push(time);
        }

        Ok(RawField {
            times,
            grid,
            channels,
            values,
        })
    }

    pub fn times(&self) -> &[NaiveDateTime] {
        &self.times
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Keep only the channels accepted by `keep`, preserving order.
    pub fn select_channels(&self, keep: impl Fn(&Channel) -> bool) -> RawField {
        let cells = self.grid.cells();
        let kept: Vec<usize> = (0..self.channels.len())
            .filter(|&c| keep(&self.channels[c]))
            .collect();
        let mut values = Vec::with_capacity(self.times.len() * kept.len() * cells);
        for t in 0..self.times.len() {
            let frame = self.frame(t);
            for &c in &kept {
                values.extend_from_slice(&frame[c * cells..(c + 1) * cells]);
            }
        }
        RawField {
            times: self.times.clone(),
            grid: self.grid.clone(),
            channels: kept.iter().map(|&c| self.channels[c].clone()).collect(),
            values,
        }
    }
}

impl Frames for RawField {
    fn grid(&self) -> &Grid {
        &self.grid
    }

    fn channels(&self) -> &[Channel] {
        &self.channels
    }

    fn frame_count(&self) -> usize {
        self.times.len()
    }

    fn frame_time(&self, i: usize) -> NaiveDateTime {
        self.times[i]
    }

    fn frame(&self, i: usize) -> &[f64] {
        let len = self.channels.len() * self.grid.cells();
        &self.values[i * len..(i + 1) * len]
    }
}

// ---------------------------------------------------------------------------
// GriddedSeries – daily multi-channel field
// ---------------------------------------------------------------------------

/// A daily gridded series: one multi-channel frame per date.
///
/// Dates are strictly increasing. Gaps are allowed here and rejected by the
/// stages that need contiguity (smoothing, alignment).
#[derive(Debug, Clone, PartialEq)]
pub struct GriddedSeries {
    dates: Vec<NaiveDate>,
    grid: Grid,
    channels: Vec<Channel>,
    values: Vec<f64>,
}

impl GriddedSeries {
    pub fn new(
        dates: Vec<NaiveDate>,
        grid: Grid,
        channels: Vec<Channel>,
        values: Vec<f64>,
    ) -> Result<Self> {
        ensure_increasing(&dates)?;
        let expected = dates.len() * channels.len() * grid.cells();
        if values.len() != expected {
            return Err(PipelineError::ShapeMismatch {
                expected,
                actual: values.len(),
            });
        }
        Ok(GriddedSeries {
            dates,
            grid,
            channels,
            values,
        })
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Number of values in one frame (channels × cells).
    pub fn frame_len(&self) -> usize {
        self.channels.len() * self.grid.cells()
    }

    /// All channels of the frame at position `i`.
    pub fn snapshot(&self, i: usize) -> &[f64] {
        let len = self.frame_len();
        &self.values[i * len..(i + 1) * len]
    }

    /// One channel of the frame at position `i`.
    pub fn channel_frame(&self, i: usize, channel: usize) -> &[f64] {
        let cells = self.grid.cells();
        let start = i * self.frame_len() + channel * cells;
        &self.values[start..start + cells]
    }

    /// Position of a channel by its display name (`sst`, `t_850`).
    pub fn channel_index(&self, name: &str) -> Result<usize> {
        self.channels
            .iter()
            .position(|c| c.to_string() == name)
            .ok_or_else(|| PipelineError::UnknownChannel(name.to_string()))
    }

    /// Stack the channels of several series sharing dates and grid.
    pub fn merge_channels(parts: Vec<GriddedSeries>) -> Result<GriddedSeries> {
        let mut iter = parts.into_iter();
        let Some(first) = iter.next() else {
            return Err(PipelineError::GridMismatch("nothing to merge".into()));
        };
        let rest: Vec<GriddedSeries> = iter.collect();
        if rest.is_empty() {
            return Ok(first);
        }
        for part in &rest {
            if part.dates != first.dates {
                return Err(PipelineError::GridMismatch(
                    "merged series cover different dates".into(),
                ));
            }
            if part.grid != first.grid {
                return Err(PipelineError::GridMismatch(
                    "merged series use different grids".into(),
                ));
            }
        }

        let mut channels = first.channels.clone();
        for part in &rest {
            channels.extend(part.channels.iter().cloned());
        }
        let mut values = Vec::with_capacity(first.len() * channels.len() * first.grid.cells());
        for t in 0..first.len() {
            values.extend_from_slice(first.snapshot(t));
            for part in &rest {
                values.extend_from_slice(part.snapshot(t));
            }
        }
        GriddedSeries::new(first.dates.clone(), first.grid.clone(), channels, values)
    }

    /// Concatenate chunks (e.g. one per year) along time.
    pub fn concat_time(parts: Vec<GriddedSeries>) -> Result<GriddedSeries> {
        let mut iter = parts.into_iter();
        let Some(mut acc) = iter.next() else {
            return Err(PipelineError::GridMismatch("nothing to concatenate".into()));
        };
        for part in iter {
            if part.grid != acc.grid || part.channels != acc.channels {
                return Err(PipelineError::GridMismatch(format!(
                    "chunk starting {:?} has a different layout",
                    part.dates.first()
                )));
            }
            acc.dates.extend(part.dates);
            acc.values.extend(part.values);
        }
        ensure_increasing(&acc.dates)?;
        Ok(acc)
    }

    /// Append static fields (taken from the first frame of `statics`) as
    /// extra channels repeated on every date.
    pub fn with_static(&self, statics: &RawField) -> Result<GriddedSeries> {
        if statics.is_empty() {
            return Err(PipelineError::GridMismatch("static field has no frame".into()));
        }
        if statics.grid != self.grid {
            return Err(PipelineError::GridMismatch(
                "static field uses a different grid".into(),
            ));
        }
        let constant = statics.frame(0);
        let mut channels = self.channels.clone();
        channels.extend(statics.channels.iter().cloned());
        let mut values = Vec::with_capacity(self.len() * (self.frame_len() + constant.len()));
        for t in 0..self.len() {
            values.extend_from_slice(self.snapshot(t));
            values.extend_from_slice(constant);
        }
        GriddedSeries::new(self.dates.clone(), self.grid.clone(), channels, values)
    }
}

impl Frames for GriddedSeries {
    fn grid(&self) -> &Grid {
        &self.grid
    }

    fn channels(&self) -> &[Channel] {
        &self.channels
    }

    fn frame_count(&self) -> usize {
        self.dates.len()
    }

    fn frame_time(&self, i: usize) -> NaiveDateTime {
        self.dates[i].and_time(NaiveTime::MIN)
    }

    fn frame(&self, i: usize) -> &[f64] {
        self.snapshot(i)
    }
}

// ---------------------------------------------------------------------------
// ScalarSeries / IndexSeries – one value per date
// ---------------------------------------------------------------------------

/// One scalar per date, e.g. a box average or an anomaly series.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarSeries {
    dates: Vec<NaiveDate>,
    values: Vec<f64>,
}

/// Anomalies share the scalar-series shape.
pub type AnomalySeries = ScalarSeries;

impl ScalarSeries {
    pub fn new(dates: Vec<NaiveDate>, values: Vec<f64>) -> Result<Self> {
        if dates.len() != values.len() {
            return Err(PipelineError::ShapeMismatch {
                expected: dates.len(),
                actual: values.len(),
            });
        }
        ensure_increasing(&dates)?;
        Ok(ScalarSeries { dates, values })
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.dates.iter().copied().zip(self.values.iter().copied())
    }
}

/// The smoothed index. `None` marks dates without a full window of history.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSeries {
    dates: Vec<NaiveDate>,
    values: Vec<Option<f64>>,
}

impl IndexSeries {
    pub fn new(dates: Vec<NaiveDate>, values: Vec<Option<f64>>) -> Result<Self> {
        if dates.len() != values.len() {
            return Err(PipelineError::ShapeMismatch {
                expected: dates.len(),
                actual: values.len(),
            });
        }
        ensure_increasing(&dates)?;
        Ok(IndexSeries { dates, values })
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Value on `date`, if the date is present and defined.
    pub fn get(&self, date: NaiveDate) -> Option<f64> {
        let pos = self.dates.binary_search(&date).ok()?;
        self.values[pos]
    }

    /// First date carrying a defined value.
    pub fn first_defined(&self) -> Option<NaiveDate> {
        self.dates
            .iter()
            .zip(&self.values)
            .find(|(_, v)| v.is_some())
            .map(|(d, _)| *d)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, Option<f64>)> + '_ {
        self.dates.iter().copied().zip(self.values.iter().copied())
    }
}

// -- Date helpers --

fn ensure_increasing(dates: &[NaiveDate]) -> Result<()> {
    match dates.windows(2).position(|w| w[0] >= w[1]) {
        Some(i) => Err(PipelineError::UnorderedTimestamps { position: i + 1 }),
        None => Ok(()),
    }
}

/// Fail on the first pair of neighbouring dates that are not one day apart.
pub fn ensure_contiguous(dates: &[NaiveDate]) -> Result<()> {
    for w in dates.windows(2) {
        if (w[1] - w[0]).num_days() != 1 {
            return Err(PipelineError::NonContiguousSeries {
                before: w[0],
                after: w[1],
            });
        }
    }
    Ok(())
}
