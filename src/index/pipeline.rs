use crate::config::IndexConfig;
use crate::data::filter::BoundingBox;
use crate::data::model::{AnomalySeries, GriddedSeries, IndexSeries, ScalarSeries};
use crate::error::{PipelineError, Result};

use super::climatology::{Climatology, anomalize, climatology};
use super::reduce::reduce;
use super::smoothing::rolling_mean;

/// Box average → climatology → anomaly → (normalize) → rolling mean.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexPipeline {
    channel: String,
    bbox: BoundingBox,
    window: usize,
    normalize: bool,
}

/// Every intermediate product of one pipeline run.
#[derive(Debug, Clone)]
pub struct IndexRun {
    /// The box actually used, after matching the grid's longitude convention.
    pub bbox: BoundingBox,
    pub box_mean: ScalarSeries,
    pub climatology: Climatology,
    pub anomalies: AnomalySeries,
    pub index: IndexSeries,
}

impl IndexPipeline {
    pub fn new(channel: impl Into<String>, bbox: BoundingBox, window: usize, normalize: bool) -> Result<Self> {
        if window == 0 {
            return Err(PipelineError::InvalidWindow(window));
        }
        Ok(IndexPipeline {
            channel: channel.into(),
            bbox,
            window,
            normalize,
        })
    }

    pub fn from_config(cfg: &IndexConfig) -> Result<Self> {
        let bbox = BoundingBox::new(cfg.lat_range, cfg.lon_range)?;
        IndexPipeline::new(cfg.variable.clone(), bbox, cfg.window, cfg.normalize)
    }

    pub fn run(&self, field: &GriddedSeries) -> Result<IndexRun> {
        let bbox = self.bbox.in_grid_convention(field.grid())?.unwrap_or(self.bbox);
        let box_mean = reduce(field, &self.channel, &bbox)?;
        let climatology = climatology(&box_mean);
        let anomalies = anomalize(&box_mean, &climatology, self.normalize)?;
        let index = rolling_mean(&anomalies, self.window)?;
        Ok(IndexRun {
            bbox,
            box_mean,
            climatology,
            anomalies,
            index,
        })
    }
}
