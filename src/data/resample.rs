use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::Result;

use super::model::{Frames, GriddedSeries, RawField};

/// How sub-daily frames are collapsed into one frame per calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    /// Cell-wise mean of every frame of the day, ignoring NaN cells.
    #[default]
    Mean,
    /// The first frame of the day.
    Snapshot,
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Aggregation::Mean => write!(f, "mean"),
            Aggregation::Snapshot => write!(f, "snapshot"),
        }
    }
}

impl FromStr for Aggregation {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mean" => Ok(Aggregation::Mean),
            "snapshot" => Ok(Aggregation::Snapshot),
            other => Err(format!("unknown aggregation mode '{other}' (expected mean or snapshot)")),
        }
    }
}

/// Resample a raw field to daily resolution.
///
/// Frames are grouped by calendar date (times are already sorted). A cell
/// that is NaN in every frame of a day stays NaN.
pub fn to_daily(raw: &RawField, mode: Aggregation) -> Result<GriddedSeries> {
    let frame_len = raw.channels().len() * raw.grid().cells();
    let mut dates: Vec<NaiveDate> = Vec::new();
    let mut values: Vec<f64> = Vec::with_capacity(frame_len * raw.len() / 4 + frame_len);

    let mut start = 0;
    while start < raw.len() {
        let day = raw.times()[start].date();
        let end = start
            + raw.times()[start..]
                .iter()
                .take_while(|t| t.date() == day)
                .count();

        match mode {
            Aggregation::Snapshot => values.extend_from_slice(raw.frame(start)),
            Aggregation::Mean => {
                let mut sums = vec![0.0; frame_len];
                let mut counts = vec![0u32; frame_len];
                for i in start..end {
                    for (k, &v) in raw.frame(i).iter().enumerate() {
                        if !v.is_nan() {
                            sums[k] += v;
                            counts[k] += 1;
                        }
                    }
                }
                values.extend(sums.iter().zip(&counts).map(|(&s, &n)| {
                    if n == 0 {
                        f64::NAN
                    } else {
                        s / f64::from(n)
                    }
                }));
            }
        }
        dates.push(day);
        start = end;
    }

    GriddedSeries::new(
        dates,
        raw.grid().clone(),
        raw.channels().to_vec(),
        values,
    )
}
