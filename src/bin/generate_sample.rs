//! Write a small synthetic data set laid out like the reanalysis archive:
//!
//! ```text
//! <out>/sst/sst_<year>_<year>.parquet                 6-hourly SST
//! <out>/2m_temperature/t2m_<year>_<year>.parquet      6-hourly t2m
//! <out>/temperature/t_<year>_<year>.parquet           6-hourly t at 3 levels
//! <out>/constants.parquet                             lsm, orography, lat2d
//! ```
//!
//! Usage: `generate_sample [OUT_DIR] [START_YEAR] [END_YEAR]`

use std::f64::consts::PI;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate, NaiveDateTime};

use enso_daily::data::model::{Channel, GridRecord, RawField};
use enso_daily::data::writer::write_field;

/// Latitude stored north → south, as in ERA5.
const LATS: [f64; 5] = [10.0, 5.0, 0.0, -5.0, -10.0];
const LONS: [f64; 9] = [170.0, 180.0, 190.0, 200.0, 210.0, 220.0, 230.0, 240.0, 250.0];
const HOURS: [u32; 4] = [0, 6, 12, 18];
const LEVELS: [u32; 3] = [500, 850, 1000];

/// splitmix64 with a Box-Muller normal sampler; deterministic per seed.
struct Noise {
    state: u64,
}

impl Noise {
    fn new(seed: u64) -> Self {
        Noise { state: seed }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    fn uniform(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn gauss(&mut self, std_dev: f64) -> f64 {
        let u1 = self.uniform().max(1e-15);
        let u2 = self.uniform();
        std_dev * (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
    }
}

/// Slow ENSO-like oscillation (period ~3.7 years), in kelvin.
fn enso_signal(time: NaiveDateTime) -> f64 {
    let days = (time.date() - NaiveDate::from_ymd_opt(1979, 1, 1).unwrap_or_default()).num_days();
    1.2 * (2.0 * PI * days as f64 / (3.7 * 365.25)).sin()
}

fn seasonal(time: NaiveDateTime) -> f64 {
    (2.0 * PI * f64::from(time.ordinal()) / 365.25).cos()
}

fn frames(year: i32) -> impl Iterator<Item = NaiveDateTime> {
    let start = NaiveDate::from_ymd_opt(year, 1, 1).unwrap_or_default();
    start
        .iter_days()
        .take_while(move |d| d.year() == year)
        .flat_map(|d| HOURS.into_iter().filter_map(move |h| d.and_hms_opt(h, 0, 0)))
}

fn grid_record(time: NaiveDateTime, channel: Channel, cell: impl Fn(f64, f64) -> f64) -> GridRecord {
    let values = LATS
        .iter()
        .flat_map(|&lat| LONS.iter().map(move |&lon| (lat, lon)))
        .map(|(lat, lon)| cell(lat, lon))
        .collect();
    GridRecord {
        time,
        channel,
        lat: LATS.to_vec(),
        lon: LONS.to_vec(),
        values,
    }
}

fn write_year(dir: &Path, prefix: &str, year: i32, records: Vec<GridRecord>) -> Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let field = RawField::from_records(records)?;
    write_field(&dir.join(format!("{prefix}_{year}_{year}.parquet")), &field)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let out = args.next().unwrap_or_else(|| "sample_data".to_string());
    let start_year: i32 = args.next().as_deref().unwrap_or("1990").parse()?;
    let end_year: i32 = args.next().as_deref().unwrap_or("1993").parse()?;
    let out = Path::new(&out);

    let mut noise = Noise::new(42);

    for year in start_year..=end_year {
        let mut sst = Vec::new();
        let mut t2m = Vec::new();
        let mut t = Vec::new();
        for time in frames(year) {
            let enso = enso_signal(time);
            let season = seasonal(time);

            let eps = noise.gauss(0.05);
            sst.push(grid_record(time, Channel::surface("sst"), |lat, lon| {
                // Warm pool in the west, cold tongue in the east; ENSO warms the east.
                let zonal = 2.0 * (1.0 - (lon - 170.0) / 80.0);
                let land = lat >= 10.0 && lon >= 250.0;
                if land {
                    f64::NAN
                } else {
                    299.0 + zonal + 0.8 * season + enso * (lon - 170.0) / 80.0 + eps
                }
            }));

            let eps = noise.gauss(0.3);
            t2m.push(grid_record(time, Channel::surface("t2m"), |lat, _| {
                298.0 - 0.2 * lat.abs() + 1.5 * season + 0.5 * enso + eps
            }));

            for level in LEVELS {
                let lapse = 6.5e-3 * (1000.0 - f64::from(level)) * 9.0;
                let eps = noise.gauss(0.2);
                t.push(grid_record(time, Channel::at_level("t", level), |lat, _| {
                    295.0 - lapse - 0.1 * lat.abs() + 0.3 * enso + eps
                }));
            }
        }
        write_year(&out.join("sst"), "sst", year, sst)?;
        write_year(&out.join("2m_temperature"), "t2m", year, t2m)?;
        write_year(&out.join("temperature"), "t", year, t)?;
    }

    let epoch = NaiveDate::from_ymd_opt(start_year, 1, 1)
        .unwrap_or_default()
        .and_time(chrono::NaiveTime::MIN);
    let constants = vec![
        grid_record(epoch, Channel::surface("lsm"), |lat, lon| {
            if lat >= 10.0 && lon >= 250.0 { 1.0 } else { 0.0 }
        }),
        grid_record(epoch, Channel::surface("orography"), |_, _| 0.0),
        grid_record(epoch, Channel::surface("lat2d"), |lat, _| lat),
    ];
    write_field(&out.join("constants.parquet"), &RawField::from_records(constants)?)?;

    println!(
        "Wrote synthetic data for {start_year}-{end_year} ({}×{} grid) to {}",
        LATS.len(),
        LONS.len(),
        out.display()
    );
    Ok(())
}
