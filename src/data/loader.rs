use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use arrow::array::{Array, AsArray, Float32Array, Float64Array, LargeListArray, ListArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Float64Type, Int64Type, TimeUnit, TimestampSecondType};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde::Deserialize;
use serde_json::Value as JsonValue;

use super::model::{Channel, Frames, GridRecord, GriddedSeries, IndexSeries, RawField};
use super::resample::{Aggregation, to_daily};

const SUPPORTED_EXTENSIONS: &[&str] = &["parquet", "pq", "json", "csv"];

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load a gridded field from a file.  Dispatch by extension.
///
/// Every format carries the same logical columns:
/// * `time`     – timestamp (ISO-8601 text, Date32 or Timestamp)
/// * `variable` – short variable code, e.g. `sst`, `t`
/// * `level`    – pressure level in hPa, null/empty for surface variables
/// * `lat`, `lon` – coordinate vectors (repeated on every row)
/// * `values`   – row-major lat × lon cell values, null/NaN for missing
///
/// Supported formats:
/// * `.parquet` – list columns for `lat`, `lon`, `values` (recommended)
/// * `.json`    – `[{ "time": "...", "variable": "sst", "lat": [...], ... }, ...]`
/// * `.csv`     – list columns as semicolon-separated floats
pub fn load_file(path: &Path) -> Result<RawField> {
    let records = read_records(path)?;
    RawField::from_records(records).with_context(|| format!("assembling {}", path.display()))
}

/// Load a file of daily frames (e.g. one written by `writer::write_field`).
/// Sub-daily input is averaged per date.
pub fn load_gridded(path: &Path) -> Result<GriddedSeries> {
    let raw = load_file(path)?;
    to_daily(&raw, Aggregation::Mean).with_context(|| format!("resampling {}", path.display()))
}

/// Load an index series (`time`, `value` columns).  Dispatch by extension.
pub fn load_index(path: &Path) -> Result<IndexSeries> {
    let rows = match extension(path).as_str() {
        "parquet" | "pq" => load_index_parquet(path)?,
        "json" => {
            let text = std::fs::read_to_string(path).context("reading JSON file")?;
            serde_json::from_str::<Vec<IndexRecord>>(&text).context("parsing JSON index")?
        }
        "csv" => {
            let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
            reader
                .deserialize()
                .enumerate()
                .map(|(i, r)| r.with_context(|| format!("CSV row {i}")))
                .collect::<Result<Vec<IndexRecord>>>()?
        }
        other => bail!("Unsupported file extension: .{other}"),
    };
    let (dates, values) = rows.into_iter().map(|r| (r.time, r.value)).unzip();
    IndexSeries::new(dates, values).with_context(|| format!("validating {}", path.display()))
}

/// Files in `dir` belonging to `year`, sorted by name.
///
/// With `year_twice` the year must occur at least twice in the file name
/// (e.g. `sst_1990010100_1990123123.nc`-style names), which avoids picking
/// up files of neighbouring years that merely mention it once.
pub fn year_files(dir: &Path, year: i32, year_twice: bool) -> Result<Vec<PathBuf>> {
    let needle = year.to_string();
    let wanted = if year_twice { 2 } else { 1 };
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("listing {}", dir.display()))? {
        let path = entry.context("reading directory entry")?.path();
        if !path.is_file() || !SUPPORTED_EXTENSIONS.contains(&extension(&path).as_str()) {
            continue;
        }
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        if name.matches(needle.as_str()).count() >= wanted {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Load one year of data from every matching file in `dir`, combined by
/// timestamp.
pub fn load_year(dir: &Path, year: i32, year_twice: bool) -> Result<RawField> {
    let files = year_files(dir, year, year_twice)?;
    if files.is_empty() {
        bail!("No data files for {year} in {}", dir.display());
    }
    let mut records = Vec::new();
    for path in &files {
        log::debug!("Reading {}", path.display());
        records.extend(read_records(path)?);
    }
    RawField::from_records(records).with_context(|| format!("combining files for {year}"))
}

/// Load `[start_year, end_year]` from `dir`, keep the channels accepted by
/// `keep`, resample each year to daily and concatenate along time.
pub fn load_daily_years(
    dir: &Path,
    start_year: i32,
    end_year: i32,
    year_twice: bool,
    mode: Aggregation,
    keep: impl Fn(&Channel) -> bool,
) -> Result<GriddedSeries> {
    let mut chunks = Vec::new();
    for year in start_year..=end_year {
        let raw = load_year(dir, year, year_twice)?.select_channels(&keep);
        if raw.channels().is_empty() {
            bail!("No requested variables found for {year} in {}", dir.display());
        }
        let daily = to_daily(&raw, mode).with_context(|| format!("resampling {year}"))?;
        log::info!(
            "{}: {year} → {} days, channels {:?}",
            dir.display(),
            daily.len(),
            daily.channels().iter().map(|c| c.to_string()).collect::<Vec<_>>()
        );
        chunks.push(daily);
    }
    GriddedSeries::concat_time(chunks).context("concatenating years")
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}

fn read_records(path: &Path) -> Result<Vec<GridRecord>> {
    match extension(path).as_str() {
        "parquet" | "pq" => load_parquet(path),
        "json" => load_json(path),
        "csv" => load_csv(path),
        other => bail!("Unsupported file extension: .{other}"),
    }
    .with_context(|| format!("loading {}", path.display()))
}

// ---------------------------------------------------------------------------
// Shared parsing helpers
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct IndexRecord {
    time: NaiveDate,
    value: Option<f64>,
}

fn parse_time(s: &str) -> Result<NaiveDateTime> {
    let s = s.trim();
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(t) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(t);
        }
    }
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("'{s}' is not a date or datetime"))?;
    Ok(date.and_time(chrono::NaiveTime::MIN))
}

fn channel(variable: &str, level: Option<u32>) -> Channel {
    match level {
        Some(level) => Channel::at_level(variable, level),
        None => Channel::surface(variable),
    }
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented):
///
/// ```json
/// [
///   {
///     "time": "1990-01-01T06:00:00",
///     "variable": "t",
///     "level": 850,
///     "lat": [5.0, 0.0, -5.0],
///     "lon": [190.0, 195.0],
///     "values": [301.2, 301.5, null, 300.9, 301.0, 301.1]
///   },
///   ...
/// ]
/// ```
fn load_json(path: &Path) -> Result<Vec<GridRecord>> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let rows = root.as_array().context("Expected top-level JSON array")?;

    let mut records = Vec::with_capacity(rows.len());
    for (i, rec) in rows.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;

        let time = obj
            .get("time")
            .and_then(|v| v.as_str())
            .with_context(|| format!("Row {i}: missing 'time'"))
            .and_then(parse_time)?;
        let variable = obj
            .get("variable")
            .and_then(|v| v.as_str())
            .with_context(|| format!("Row {i}: missing 'variable'"))?;
        let level = match obj.get("level") {
            None | Some(JsonValue::Null) => None,
            Some(v) => Some(
                v.as_u64()
                    .and_then(|l| u32::try_from(l).ok())
                    .with_context(|| format!("Row {i}: 'level' is not a pressure level"))?,
            ),
        };

        records.push(GridRecord {
            time,
            channel: channel(variable, level),
            lat: json_array_to_f64(obj.get("lat"), i, "lat")?,
            lon: json_array_to_f64(obj.get("lon"), i, "lon")?,
            values: json_array_to_f64(obj.get("values"), i, "values")?,
        });
    }
    Ok(records)
}

fn json_array_to_f64(val: Option<&JsonValue>, row: usize, col: &str) -> Result<Vec<f64>> {
    let arr = val
        .and_then(|v| v.as_array())
        .with_context(|| format!("Row {row}: missing or invalid '{col}' array"))?;

    arr.iter()
        .enumerate()
        .map(|(j, v)| match v {
            JsonValue::Null => Ok(f64::NAN),
            v => v
                .as_f64()
                .with_context(|| format!("Row {row}, {col}[{j}]: not a number")),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row `time,variable,level,lat,lon,values`.
/// `lat`, `lon` and `values` contain semicolon-separated floats:
///   `"5.0;0.0;-5.0"`; an empty token or `NaN` marks a missing cell.
fn load_csv(path: &Path) -> Result<Vec<GridRecord>> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .with_context(|| format!("CSV missing '{name}' column"))
    };
    let time_idx = column("time")?;
    let var_idx = column("variable")?;
    let lat_idx = column("lat")?;
    let lon_idx = column("lon")?;
    let values_idx = column("values")?;
    let level_idx = headers.iter().position(|h| h == "level");

    let mut records = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        let field = |idx: usize| record.get(idx).unwrap_or("");

        let level = match level_idx.map(field).map(str::trim) {
            None | Some("") => None,
            Some(s) => Some(
                s.parse::<u32>()
                    .with_context(|| format!("Row {row_no}: '{s}' is not a pressure level"))?,
            ),
        };

        records.push(GridRecord {
            time: parse_time(field(time_idx)).with_context(|| format!("Row {row_no}"))?,
            channel: channel(field(var_idx).trim(), level),
            lat: parse_semicolon_floats(field(lat_idx), row_no, "lat")?,
            lon: parse_semicolon_floats(field(lon_idx), row_no, "lon")?,
            values: parse_semicolon_floats(field(values_idx), row_no, "values")?,
        });
    }
    Ok(records)
}

fn parse_semicolon_floats(s: &str, row: usize, col: &str) -> Result<Vec<f64>> {
    s.split(';')
        .enumerate()
        .map(|(j, tok)| {
            let tok = tok.trim();
            if tok.is_empty() {
                return Ok(f64::NAN);
            }
            tok.parse::<f64>()
                .with_context(|| format!("Row {row}, {col}[{j}]: '{tok}' is not a number"))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file of gridded records.
///
/// Expected schema:
/// - `time`: Utf8, Date32 or Timestamp
/// - `variable`: Utf8
/// - `level`: any integer type, nullable (optional column)
/// - `lat`, `lon`, `values`: List<Float64|Float32> or LargeList
fn load_parquet(path: &Path) -> Result<Vec<GridRecord>> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let reader = builder.build().context("building parquet reader")?;

    let mut records = Vec::new();

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let schema = batch.schema();
        let index_of = |name: &str| {
            schema
                .index_of(name)
                .map_err(|_| anyhow::anyhow!("Parquet file missing '{name}' column"))
        };

        let times = extract_times(batch.column(index_of("time")?))?;
        let var_col = batch.column(index_of("variable")?);
        let variables = match var_col.data_type() {
            DataType::Utf8 => var_col.as_string::<i32>(),
            other => bail!("'variable' column must be Utf8, got {other:?}"),
        };
        let levels = match schema.index_of("level") {
            Ok(idx) => Some(cast(batch.column(idx).as_ref(), &DataType::Int64)?),
            Err(_) => None,
        };
        let lat_col = batch.column(index_of("lat")?);
        let lon_col = batch.column(index_of("lon")?);
        let values_col = batch.column(index_of("values")?);

        for (row, time) in times.into_iter().enumerate() {
            let level = match &levels {
                Some(arr) if !arr.is_null(row) => {
                    let raw = arr.as_primitive::<Int64Type>().value(row);
                    Some(u32::try_from(raw).with_context(|| {
                        format!("Row {row}: level {raw} is not a pressure level")
                    })?)
                }
                _ => None,
            };
            if variables.is_null(row) {
                bail!("Row {row}: null 'variable'");
            }
            records.push(GridRecord {
                time,
                channel: channel(variables.value(row), level),
                lat: extract_f64_list(lat_col, row)
                    .with_context(|| format!("Row {row}: failed to read 'lat'"))?,
                lon: extract_f64_list(lon_col, row)
                    .with_context(|| format!("Row {row}: failed to read 'lon'"))?,
                values: extract_f64_list(values_col, row)
                    .with_context(|| format!("Row {row}: failed to read 'values'"))?,
            });
        }
    }

    Ok(records)
}

fn load_index_parquet(path: &Path) -> Result<Vec<IndexRecord>> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .context("reading parquet metadata")?
        .build()
        .context("building parquet reader")?;

    let mut rows = Vec::new();
    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let schema = batch.schema();
        let time_idx = schema
            .index_of("time")
            .map_err(|_| anyhow::anyhow!("Parquet file missing 'time' column"))?;
        let value_idx = schema
            .index_of("value")
            .map_err(|_| anyhow::anyhow!("Parquet file missing 'value' column"))?;

        let times = extract_times(batch.column(time_idx))?;
        let values = cast(batch.column(value_idx).as_ref(), &DataType::Float64)?;
        let values = values.as_primitive::<Float64Type>();
        for (row, time) in times.into_iter().enumerate() {
            let value = (!values.is_null(row)).then(|| values.value(row));
            rows.push(IndexRecord {
                time: time.date(),
                value,
            });
        }
    }
    Ok(rows)
}

// -- Parquet / Arrow helpers --

/// Decode a time column: ISO text is parsed, anything temporal is cast to
/// second-resolution timestamps.
fn extract_times(col: &Arc<dyn Array>) -> Result<Vec<NaiveDateTime>> {
    if col.null_count() > 0 {
        bail!("null value in 'time' column");
    }
    match col.data_type() {
        DataType::Utf8 => col
            .as_string::<i32>()
            .iter()
            .flatten()
            .map(parse_time)
            .collect(),
        DataType::LargeUtf8 => col
            .as_string::<i64>()
            .iter()
            .flatten()
            .map(parse_time)
            .collect(),
        _ => {
            let secs = cast(col.as_ref(), &DataType::Timestamp(TimeUnit::Second, None))
                .context("'time' column is not temporal")?;
            secs.as_primitive::<TimestampSecondType>()
                .values()
                .iter()
                .map(|&s| {
                    DateTime::from_timestamp(s, 0)
                        .map(|dt| dt.naive_utc())
                        .with_context(|| format!("timestamp {s} out of range"))
                })
                .collect()
        }
    }
}

/// Extract a `Vec<f64>` from a List or LargeList column at the given row.
/// Null items become NaN.
fn extract_f64_list(col: &Arc<dyn Array>, row: usize) -> Result<Vec<f64>> {
    if col.is_null(row) {
        bail!("null value in list column");
    }

    let values_array = match col.data_type() {
        DataType::List(_) => {
            let list_arr = col
                .as_any()
                .downcast_ref::<ListArray>()
                .context("expected ListArray")?;
            list_arr.value(row)
        }
        DataType::LargeList(_) => {
            let list_arr = col
                .as_any()
                .downcast_ref::<LargeListArray>()
                .context("expected LargeListArray")?;
            list_arr.value(row)
        }
        other => bail!("Expected List or LargeList column, got {other:?}"),
    };

    // The inner array can be Float64 or Float32
    if let Some(f64_arr) = values_array.as_any().downcast_ref::<Float64Array>() {
        Ok(f64_arr.iter().map(|v| v.unwrap_or(f64::NAN)).collect())
    } else if let Some(f32_arr) = values_array.as_any().downcast_ref::<Float32Array>() {
        Ok(f32_arr.iter().map(|v| v.map_or(f64::NAN, f64::from)).collect())
    } else {
        bail!(
            "List inner type is {:?}, expected Float64 or Float32",
            values_array.data_type()
        )
    }
}
