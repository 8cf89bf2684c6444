use chrono::NaiveDate;
use thiserror::Error;

/// Errors raised by the index and alignment core.
///
/// Every variant is a data or configuration problem; none of them is
/// transient, so callers should report and stop rather than retry.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    #[error("invalid {axis} range: max ({max}) must be greater than min ({min})")]
    InvalidRange {
        axis: &'static str,
        min: f64,
        max: f64,
    },

    #[error("{axis} range [{min}, {max}] selects no grid cells")]
    EmptySelection {
        axis: &'static str,
        min: f64,
        max: f64,
    },

    #[error("longitude range [{min}, {max}] crosses the grid's {seam}° seam")]
    LongitudeSeam { min: f64, max: f64, seam: f64 },

    #[error("{axis} coordinates are not strictly monotonic at position {position}")]
    UnorderedAxis { axis: &'static str, position: usize },

    #[error("timestamps are not strictly increasing at position {position}")]
    UnorderedTimestamps { position: usize },

    #[error("expected {expected} values, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("grids or channels of the combined series differ: {0}")]
    GridMismatch(String),

    #[error("unknown channel '{0}'")]
    UnknownChannel(String),

    #[error("every selected cell is missing on {date}")]
    MissingData { date: NaiveDate },

    #[error("no climatology entry for day-of-year {day_of_year} (needed by {date})")]
    ClimatologyGap { date: NaiveDate, day_of_year: u32 },

    #[error("zero variance for day-of-year {day_of_year}, cannot normalize")]
    DegenerateVariance { day_of_year: u32 },

    #[error("rolling window must be positive, got {0}")]
    InvalidWindow(usize),

    #[error("series is not contiguous: {before} is followed by {after}")]
    NonContiguousSeries { before: NaiveDate, after: NaiveDate },

    #[error("{series} series needs data from {requested}, but its first usable date is {available}")]
    InsufficientHistory {
        series: &'static str,
        requested: NaiveDate,
        available: NaiveDate,
    },

    #[error(
        "aligned slices disagree: expected {expected} days, predictor has {predictor}, target has {target}"
    )]
    AlignmentMismatch {
        expected: usize,
        predictor: usize,
        target: usize,
    },

    #[error("target index has no value on {date}")]
    UndefinedTarget { date: NaiveDate },

    #[error("index {index} out of range for store of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("invalid split: {0}")]
    InvalidSplit(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
