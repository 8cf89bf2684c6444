//! Pipeline configuration.
//!
//! Everything that used to be a hard-wired constant (box bounds, pressure
//! levels, variable short codes) is a field here, with defaults matching the
//! Niño 3.4 / ERA5 setup. Load overrides from JSON with
//! [`PipelineConfig::from_file`].

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::align::split::Splits;
use crate::data::filter::BoundingBox;
use crate::data::model::Channel;
use crate::data::resample::Aggregation;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub index: IndexConfig,
    pub predictors: PredictorConfig,
    pub splits: SplitConfig,
    pub files: FilePattern,
}

impl PipelineConfig {
    /// Read a JSON config. Missing fields take their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }
}

// ---------------------------------------------------------------------------
// Index computation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Variable code of the field the index is computed from.
    pub variable: String,
    pub lat_range: (f64, f64),
    pub lon_range: (f64, f64),
    /// Length of the trailing rolling mean, in days.
    pub window: usize,
    /// Divide anomalies by the day-of-year standard deviation.
    pub normalize: bool,
    pub aggregation: Aggregation,
}

impl Default for IndexConfig {
    fn default() -> Self {
        // Niño 3.4: 5N-5S, 170W-120W
        Self {
            variable: "sst".to_string(),
            lat_range: (-5.0, 5.0),
            lon_range: (190.0, 240.0),
            window: 30,
            normalize: false,
            aggregation: Aggregation::Mean,
        }
    }
}

impl IndexConfig {
    pub fn bounding_box(&self) -> Result<BoundingBox> {
        Ok(BoundingBox::new(self.lat_range, self.lon_range)?)
    }

    pub fn validate(&self) -> Result<()> {
        self.bounding_box()?;
        if self.window == 0 {
            bail!("rolling window must be at least one day");
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Predictor fields
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictorConfig {
    /// Long variable names; each is also the sub-directory holding its files.
    pub variables: Vec<String>,
    /// Long name → short code used inside the data files.
    pub variable_codes: BTreeMap<String, String>,
    /// Pressure levels (hPa) kept for multi-level variables.
    pub pressure_levels: Vec<u32>,
    pub aggregation: Aggregation,
    /// Static fields broadcast over every date when a constants file is given.
    pub constants: Vec<String>,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        let variables = [
            "2m_temperature",
            "10m_u_component_of_wind",
            "10m_v_component_of_wind",
            "toa_incident_solar_radiation",
            "total_precipitation",
            "geopotential",
            "u_component_of_wind",
            "v_component_of_wind",
            "temperature",
            "relative_humidity",
            "specific_humidity",
        ];
        let codes = [
            ("2m_temperature", "t2m"),
            ("10m_u_component_of_wind", "u10"),
            ("10m_v_component_of_wind", "v10"),
            ("mean_sea_level_pressure", "msl"),
            ("surface_pressure", "sp"),
            ("toa_incident_solar_radiation", "tisr"),
            ("total_precipitation", "tp"),
            ("land_sea_mask", "lsm"),
            ("orography", "orography"),
            ("lattitude", "lat2d"),
            ("geopotential", "z"),
            ("u_component_of_wind", "u"),
            ("v_component_of_wind", "v"),
            ("temperature", "t"),
            ("relative_humidity", "r"),
            ("specific_humidity", "q"),
            ("vorticity", "vo"),
            ("potential_vorticity", "pv"),
            ("total_cloud_cover", "tcc"),
            ("sea_surface_temperature", "sst"),
        ];
        Self {
            variables: variables.iter().map(|v| v.to_string()).collect(),
            variable_codes: codes
                .iter()
                .map(|(name, code)| (name.to_string(), code.to_string()))
                .collect(),
            pressure_levels: vec![50, 250, 500, 600, 700, 850, 925],
            aggregation: Aggregation::Mean,
            constants: vec![
                "land_sea_mask".to_string(),
                "orography".to_string(),
                "lattitude".to_string(),
            ],
        }
    }
}

impl PredictorConfig {
    /// Short code for a long variable name.
    pub fn code(&self, name: &str) -> Result<&str> {
        self.variable_codes
            .get(name)
            .map(String::as_str)
            .with_context(|| format!("no short code configured for variable '{name}'"))
    }

    /// Whether a channel of variable `code` should be kept: surface channels
    /// always, level channels only at configured pressure levels.
    pub fn keeps(&self, code: &str, channel: &Channel) -> bool {
        channel.code == code
            && channel
                .level
                .map_or(true, |l| self.pressure_levels.contains(&l))
    }

    pub fn validate(&self) -> Result<()> {
        if self.variables.is_empty() {
            bail!("at least one predictor variable is required");
        }
        for name in self.variables.iter().chain(&self.constants) {
            self.code(name)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Train / validation / test splits
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    pub start_train_year: i32,
    pub start_val_year: i32,
    pub start_test_year: i32,
    pub end_year: i32,
    pub lead_time_days: u32,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            start_train_year: 1980,
            start_val_year: 2011,
            start_test_year: 2015,
            end_year: 2018,
            lead_time_days: 30,
        }
    }
}

impl SplitConfig {
    pub fn splits(&self) -> Result<Splits> {
        Ok(Splits::from_years(
            self.start_train_year,
            self.start_val_year,
            self.start_test_year,
            self.end_year,
        )?)
    }
}

// ---------------------------------------------------------------------------
// Input file naming
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilePattern {
    /// The year appears twice in every file name (start and end stamp).
    pub year_twice: bool,
}

impl Default for FilePattern {
    fn default() -> Self {
        Self { year_twice: true }
    }
}

/// Check a year range coming from the command line.
pub fn validate_years(start_year: i32, end_year: i32) -> Result<()> {
    if start_year >= end_year {
        bail!("start year ({start_year}) must be before end year ({end_year})");
    }
    Ok(())
}
