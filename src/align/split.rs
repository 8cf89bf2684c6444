use std::fmt;

use chrono::NaiveDate;

use crate::error::{PipelineError, Result};

/// An inclusive calendar-date range `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl SplitRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if end < start {
            return Err(PipelineError::InvalidSplit(format!(
                "end {end} precedes start {start}"
            )));
        }
        Ok(SplitRange { start, end })
    }

    /// January 1st of `start_year` through December 31st of `end_year`.
    pub fn from_years(start_year: i32, end_year: i32) -> Result<Self> {
        let start = NaiveDate::from_ymd_opt(start_year, 1, 1)
            .ok_or_else(|| PipelineError::InvalidSplit(format!("year {start_year} out of range")))?;
        let end = NaiveDate::from_ymd_opt(end_year, 12, 31)
            .ok_or_else(|| PipelineError::InvalidSplit(format!("year {end_year} out of range")))?;
        SplitRange::new(start, end)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of days in the range, both ends included.
    pub fn days(&self) -> usize {
        (self.end - self.start).num_days() as usize + 1
    }
}

impl fmt::Display for SplitRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitKind {
    Train,
    Val,
    Test,
}

impl SplitKind {
    pub fn name(&self) -> &'static str {
        match self {
            SplitKind::Train => "train",
            SplitKind::Val => "val",
            SplitKind::Test => "test",
        }
    }
}

/// Consecutive train / validation / test year ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Splits {
    pub train: SplitRange,
    pub val: SplitRange,
    pub test: SplitRange,
}

impl Splits {
    /// Train covers `[start_train, start_val - 1]`, validation
    /// `[start_val, start_test - 1]` and test `[start_test, end_year]`, all in
    /// whole years.
    pub fn from_years(
        start_train_year: i32,
        start_val_year: i32,
        start_test_year: i32,
        end_year: i32,
    ) -> Result<Self> {
        if !(start_train_year < start_val_year
            && start_val_year < start_test_year
            && start_test_year <= end_year)
        {
            return Err(PipelineError::InvalidSplit(format!(
                "years must satisfy train {start_train_year} < val {start_val_year} \
                 < test {start_test_year} <= end {end_year}"
            )));
        }
        Ok(Splits {
            train: SplitRange::from_years(start_train_year, start_val_year - 1)?,
            val: SplitRange::from_years(start_val_year, start_test_year - 1)?,
            test: SplitRange::from_years(start_test_year, end_year)?,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (SplitKind, SplitRange)> {
        [
            (SplitKind::Train, self.train),
            (SplitKind::Val, self.val),
            (SplitKind::Test, self.test),
        ]
        .into_iter()
    }
}
