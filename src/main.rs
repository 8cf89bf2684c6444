//! `enso-daily`: compute a daily ENSO index, assemble daily predictor fields
//! and write lead-time aligned train/val/test examples.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use rayon::prelude::*;

use enso_daily::align::aligner::align;
use enso_daily::config::{PipelineConfig, validate_years};
use enso_daily::data::loader::{load_daily_years, load_file, load_gridded, load_index};
use enso_daily::data::model::GriddedSeries;
use enso_daily::data::resample::Aggregation;
use enso_daily::data::writer::{write_examples, write_field, write_index};
use enso_daily::index::compare::compare;
use enso_daily::index::pipeline::IndexPipeline;

const INDEX_FILE: &str = "enso_daily";
const PREDICTOR_FILE: &str = "era5_daily.parquet";

#[derive(Debug, Parser)]
#[command(name = "enso-daily", version, about)]
struct Cli {
    /// JSON pipeline configuration; flags override its values
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormatArg {
    Parquet,
    Csv,
    Json,
}

impl OutputFormatArg {
    fn extension(self) -> &'static str {
        match self {
            OutputFormatArg::Parquet => "parquet",
            OutputFormatArg::Csv => "csv",
            OutputFormatArg::Json => "json",
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Compute the rolling daily index from gridded SST files
    Index {
        #[arg(long = "data-dir")]
        data_dir: PathBuf,

        #[arg(long = "save-dir")]
        save_dir: PathBuf,

        #[arg(long = "start-year", default_value_t = 1979)]
        start_year: i32,

        #[arg(long = "end-year", default_value_t = 2018)]
        end_year: i32,

        /// Length of the trailing rolling mean in days
        #[arg(long = "n-days-rolling")]
        n_days_rolling: Option<usize>,

        #[arg(long = "lat-min", allow_hyphen_values = true)]
        lat_min: Option<f64>,

        #[arg(long = "lat-max", allow_hyphen_values = true)]
        lat_max: Option<f64>,

        #[arg(long = "lon-min", allow_hyphen_values = true)]
        lon_min: Option<f64>,

        #[arg(long = "lon-max", allow_hyphen_values = true)]
        lon_max: Option<f64>,

        /// Divide anomalies by the day-of-year standard deviation
        /// (`--normalize false` turns off a configured normalisation)
        #[arg(long, num_args = 0..=1, default_missing_value = "true")]
        normalize: Option<bool>,

        /// Variable code inside the data files
        #[arg(long)]
        variable: Option<String>,

        /// mean or snapshot
        #[arg(long)]
        aggregation: Option<Aggregation>,

        /// File names mention the year once instead of twice
        #[arg(long = "year-once", default_value_t = false)]
        year_once: bool,

        #[arg(long, value_enum, default_value_t = OutputFormatArg::Parquet)]
        format: OutputFormatArg,
    },

    /// Aggregate predictor variables to daily fields
    Predictors {
        #[arg(long = "data-dir")]
        data_dir: PathBuf,

        #[arg(long = "save-dir")]
        save_dir: PathBuf,

        #[arg(long = "start-year", default_value_t = 1979)]
        start_year: i32,

        #[arg(long = "end-year", default_value_t = 2019)]
        end_year: i32,

        /// Repeatable variable names (sub-directories of --data-dir)
        #[arg(short = 'v', long = "variables")]
        variables: Vec<String>,

        /// mean or snapshot
        #[arg(long)]
        aggregation: Option<Aggregation>,

        /// Single-frame file with static fields to append
        #[arg(long)]
        constants: Option<PathBuf>,

        /// File names mention the year once instead of twice
        #[arg(long = "year-once", default_value_t = false)]
        year_once: bool,
    },

    /// Write lead-time aligned train/val/test example files
    Align {
        /// Directory holding era5_daily.parquet and enso_daily.parquet
        #[arg(long = "data-dir")]
        data_dir: PathBuf,

        #[arg(long = "save-dir")]
        save_dir: PathBuf,

        /// Override the predictor file location
        #[arg(long)]
        predictors: Option<PathBuf>,

        /// Override the index file location
        #[arg(long)]
        index: Option<PathBuf>,

        #[arg(long = "start-train-year")]
        start_train_year: Option<i32>,

        #[arg(long = "start-val-year")]
        start_val_year: Option<i32>,

        #[arg(long = "start-test-year")]
        start_test_year: Option<i32>,

        #[arg(long = "end-year")]
        end_year: Option<i32>,

        /// Forecast lead time in days
        #[arg(long = "lead-time")]
        lead_time: Option<u32>,
    },

    /// Compare a computed index with a reference index
    Compare {
        #[arg(long)]
        index: PathBuf,

        #[arg(long)]
        reference: PathBuf,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut cfg = match &cli.config {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };

    match cli.command {
        Command::Index {
            data_dir,
            save_dir,
            start_year,
            end_year,
            n_days_rolling,
            lat_min,
            lat_max,
            lon_min,
            lon_max,
            normalize,
            variable,
            aggregation,
            year_once,
            format,
        } => {
            let index = &mut cfg.index;
            if let Some(window) = n_days_rolling {
                index.window = window;
            }
            index.lat_range = (
                lat_min.unwrap_or(index.lat_range.0),
                lat_max.unwrap_or(index.lat_range.1),
            );
            index.lon_range = (
                lon_min.unwrap_or(index.lon_range.0),
                lon_max.unwrap_or(index.lon_range.1),
            );
            if let Some(normalize) = normalize {
                index.normalize = normalize;
            }
            if let Some(variable) = variable {
                index.variable = variable;
            }
            if let Some(aggregation) = aggregation {
                index.aggregation = aggregation;
            }
            cfg.files.year_twice &= !year_once;
            cmd_index(&cfg, &data_dir, &save_dir, start_year, end_year, format)
        }

        Command::Predictors {
            data_dir,
            save_dir,
            start_year,
            end_year,
            variables,
            aggregation,
            constants,
            year_once,
        } => {
            if !variables.is_empty() {
                cfg.predictors.variables = variables;
            }
            if let Some(aggregation) = aggregation {
                cfg.predictors.aggregation = aggregation;
            }
            cfg.files.year_twice &= !year_once;
            cmd_predictors(&cfg, &data_dir, &save_dir, start_year, end_year, constants.as_deref())
        }

        Command::Align {
            data_dir,
            save_dir,
            predictors,
            index,
            start_train_year,
            start_val_year,
            start_test_year,
            end_year,
            lead_time,
        } => {
            let splits = &mut cfg.splits;
            splits.start_train_year = start_train_year.unwrap_or(splits.start_train_year);
            splits.start_val_year = start_val_year.unwrap_or(splits.start_val_year);
            splits.start_test_year = start_test_year.unwrap_or(splits.start_test_year);
            splits.end_year = end_year.unwrap_or(splits.end_year);
            splits.lead_time_days = lead_time.unwrap_or(splits.lead_time_days);

            let predictors = predictors.unwrap_or_else(|| data_dir.join(PREDICTOR_FILE));
            let index = index.unwrap_or_else(|| data_dir.join(format!("{INDEX_FILE}.parquet")));
            cmd_align(&cfg, &predictors, &index, &save_dir)
        }

        Command::Compare { index, reference } => cmd_compare(&index, &reference),
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn cmd_index(
    cfg: &PipelineConfig,
    data_dir: &Path,
    save_dir: &Path,
    start_year: i32,
    end_year: i32,
    format: OutputFormatArg,
) -> Result<()> {
    validate_years(start_year, end_year)?;
    cfg.index.validate()?;
    let pipeline = IndexPipeline::from_config(&cfg.index)?;

    std::fs::create_dir_all(save_dir)
        .with_context(|| format!("creating {}", save_dir.display()))?;

    let variable = cfg.index.variable.as_str();
    let field = load_daily_years(
        data_dir,
        start_year,
        end_year,
        cfg.files.year_twice,
        cfg.index.aggregation,
        |c| c.to_string() == variable,
    )?;

    let run = pipeline.run(&field).context("computing index")?;
    if run.bbox.lon() != cfg.index.lon_range {
        log::warn!(
            "Longitude box {:?} converted to grid convention {:?}",
            cfg.index.lon_range,
            run.bbox.lon()
        );
    }
    log::info!(
        "Climatology over {} days-of-year; index defined from {}",
        run.climatology.len(),
        run.index
            .first_defined()
            .map_or_else(|| "never".to_string(), |d| d.to_string())
    );

    let out = save_dir.join(format!("{INDEX_FILE}.{}", format.extension()));
    write_index(&out, &run.index)
}

fn cmd_predictors(
    cfg: &PipelineConfig,
    data_dir: &Path,
    save_dir: &Path,
    start_year: i32,
    end_year: i32,
    constants: Option<&Path>,
) -> Result<()> {
    validate_years(start_year, end_year)?;
    cfg.predictors.validate()?;

    std::fs::create_dir_all(save_dir)
        .with_context(|| format!("creating {}", save_dir.display()))?;

    let mut per_variable = Vec::with_capacity(cfg.predictors.variables.len());
    for name in &cfg.predictors.variables {
        let code = cfg.predictors.code(name)?;
        let series = load_daily_years(
            &data_dir.join(name),
            start_year,
            end_year,
            cfg.files.year_twice,
            cfg.predictors.aggregation,
            |c| cfg.predictors.keeps(code, c),
        )
        .with_context(|| format!("loading variable {name}"))?;
        per_variable.push(series);
    }
    let mut daily = GriddedSeries::merge_channels(per_variable).context("merging variables")?;

    if let Some(path) = constants {
        let codes = cfg
            .predictors
            .constants
            .iter()
            .map(|name| cfg.predictors.code(name))
            .collect::<Result<Vec<_>>>()?;
        let statics = load_file(path)?.select_channels(|c| codes.contains(&c.code.as_str()));
        log::info!("Adding {} constant fields from {}", codes.len(), path.display());
        daily = daily.with_static(&statics).context("adding constant fields")?;
    }

    write_field(&save_dir.join(PREDICTOR_FILE), &daily)
}

fn cmd_align(cfg: &PipelineConfig, predictors: &Path, index: &Path, save_dir: &Path) -> Result<()> {
    let splits = cfg.splits.splits()?;
    let lead = cfg.splits.lead_time_days;

    let predictor = load_gridded(predictors)?;
    let target = load_index(index)?;
    log::info!(
        "Predictors: {} days × {} channels; index: {} days; lead time {lead} days",
        predictor.len(),
        predictor.channels().len(),
        target.len()
    );

    std::fs::create_dir_all(save_dir)
        .with_context(|| format!("creating {}", save_dir.display()))?;

    let jobs: Vec<_> = splits.iter().collect();
    let sizes = jobs
        .par_iter()
        .map(|(kind, range)| -> Result<(&'static str, usize)> {
            let store = align(&predictor, &target, lead, range)
                .with_context(|| format!("aligning {} split {range}", kind.name()))?;
            write_examples(&save_dir.join(format!("{}.parquet", kind.name())), &store)?;
            Ok((kind.name(), store.len()))
        })
        .collect::<Result<Vec<_>>>()?;

    for (name, len) in sizes {
        log::info!("{name}: {len} examples");
    }
    Ok(())
}

fn cmd_compare(index: &Path, reference: &Path) -> Result<()> {
    let computed = load_index(index)?;
    let reference = load_index(reference)?;
    let cmp = compare(&computed, &reference);
    println!("{cmp}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalize_flag(extra: &[&str]) -> Option<bool> {
        let args = ["enso-daily", "index", "--data-dir", "in", "--save-dir", "out"];
        let cli = Cli::try_parse_from(args.iter().chain(extra).copied()).unwrap();
        match cli.command {
            Command::Index { normalize, .. } => normalize,
            other => panic!("parsed {other:?}"),
        }
    }

    #[test]
    fn normalize_flag_can_switch_either_way() {
        assert_eq!(normalize_flag(&[]), None);
        assert_eq!(normalize_flag(&["--normalize"]), Some(true));
        assert_eq!(normalize_flag(&["--normalize", "false"]), Some(false));
        assert_eq!(normalize_flag(&["--normalize", "--format", "csv"]), Some(true));
        let bad = ["enso-daily", "index", "--data-dir", "in", "--save-dir", "out", "--normalize", "maybe"];
        assert!(Cli::try_parse_from(bad).is_err());
    }
}
