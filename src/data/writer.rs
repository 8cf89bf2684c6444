use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use arrow::array::{
    ArrayRef, Date32Array, Float64Array, Float64Builder, Int64Array, ListBuilder, StringArray,
    TimestampSecondArray,
};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use parquet::arrow::ArrowWriter;
use serde::Serialize;

use crate::align::store::IndexedExampleStore;

use super::model::{Frames, IndexSeries};

// ---------------------------------------------------------------------------
// Gridded fields
// ---------------------------------------------------------------------------

/// Write any frame sequence as Parquet, one row per (frame, channel), in the
/// layout `loader::load_file` reads back.
pub fn write_field<F: Frames>(path: &Path, field: &F) -> Result<()> {
    let grid = field.grid();
    let cells = grid.cells();
    let channels = field.channels();
    let rows = field.frame_count() * channels.len();

    let mut times = Vec::with_capacity(rows);
    let mut variables = Vec::with_capacity(rows);
    let mut levels = Vec::with_capacity(rows);
    let mut lat_builder = ListBuilder::new(Float64Builder::new());
    let mut lon_builder = ListBuilder::new(Float64Builder::new());
    let mut values_builder = ListBuilder::new(Float64Builder::new());

    for i in 0..field.frame_count() {
        let time = field.frame_time(i).and_utc().timestamp();
        let frame = field.frame(i);
        for (c, ch) in channels.iter().enumerate() {
            times.push(time);
            variables.push(ch.code.as_str());
            levels.push(ch.level.map(i64::from));

            lat_builder.values().append_slice(grid.lat.values());
            lat_builder.append(true);
            lon_builder.values().append_slice(grid.lon.values());
            lon_builder.append(true);
            append_cells(&mut values_builder, &frame[c * cells..(c + 1) * cells]);
        }
    }

    let schema = Arc::new(Schema::new(vec![
        Field::new("time", DataType::Timestamp(TimeUnit::Second, None), false),
        Field::new("variable", DataType::Utf8, false),
        Field::new("level", DataType::Int64, true),
        Field::new("lat", float_list(), false),
        Field::new("lon", float_list(), false),
        Field::new("values", float_list(), false),
    ]));

    let columns: Vec<ArrayRef> = vec![
        Arc::new(TimestampSecondArray::from(times)),
        Arc::new(StringArray::from(variables)),
        Arc::new(Int64Array::from(levels)),
        Arc::new(lat_builder.finish()),
        Arc::new(lon_builder.finish()),
        Arc::new(values_builder.finish()),
    ];
    write_batch(path, schema, columns)?;
    log::info!(
        "Wrote {} frames × {} channels to {}",
        field.frame_count(),
        channels.len(),
        path.display()
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Index series
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct IndexRecord {
    time: NaiveDate,
    value: Option<f64>,
}

/// Write an index series.  Dispatch by extension (`.parquet`, `.csv`,
/// `.json`). Dates without a defined value are written as null / empty.
pub fn write_index(path: &Path, index: &IndexSeries) -> Result<()> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "parquet" | "pq" => {
            let schema = Arc::new(Schema::new(vec![
                Field::new("time", DataType::Date32, false),
                Field::new("value", DataType::Float64, true),
            ]));
            let columns: Vec<ArrayRef> = vec![
                Arc::new(Date32Array::from(
                    index.dates().iter().map(|&d| epoch_days(d)).collect::<Vec<_>>(),
                )),
                Arc::new(Float64Array::from(index.values().to_vec())),
            ];
            write_batch(path, schema, columns)?;
        }
        "csv" => {
            let mut writer = csv::Writer::from_path(path).context("creating CSV")?;
            for (time, value) in index.iter() {
                writer
                    .serialize(IndexRecord { time, value })
                    .context("writing CSV row")?;
            }
            writer.flush().context("flushing CSV")?;
        }
        "json" => {
            let records: Vec<IndexRecord> = index
                .iter()
                .map(|(time, value)| IndexRecord { time, value })
                .collect();
            let file = std::fs::File::create(path).context("creating JSON file")?;
            serde_json::to_writer_pretty(file, &records).context("writing JSON")?;
        }
        other => bail!("Unsupported file extension: .{other}"),
    }
    log::info!("Wrote index with {} dates to {}", index.len(), path.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// Aligned examples
// ---------------------------------------------------------------------------

/// Materialise every example of a store as Parquet rows
/// (`predictor_date`, `target_date`, `target`, `values`). Channel names and
/// coordinates are attached as JSON-encoded schema metadata.
pub fn write_examples(path: &Path, store: &IndexedExampleStore<'_>) -> Result<()> {
    let mut predictor_dates = Vec::with_capacity(store.len());
    let mut target_dates = Vec::with_capacity(store.len());
    let mut targets = Vec::with_capacity(store.len());
    let mut values_builder = ListBuilder::new(Float64Builder::new());

    for example in store.iter() {
        let example = example?;
        predictor_dates.push(epoch_days(example.predictor_date));
        target_dates.push(epoch_days(example.target_date));
        targets.push(example.target);
        append_cells(&mut values_builder, example.snapshot);
    }

    let channel_names: Vec<String> = store.channels().iter().map(|c| c.to_string()).collect();
    let metadata = HashMap::from([
        ("channels".to_string(), serde_json::to_string(&channel_names)?),
        ("lat".to_string(), serde_json::to_string(store.grid().lat.values())?),
        ("lon".to_string(), serde_json::to_string(store.grid().lon.values())?),
        ("lead_time_days".to_string(), store.lead_time_days().to_string()),
    ]);
    let schema = Arc::new(
        Schema::new(vec![
            Field::new("predictor_date", DataType::Date32, false),
            Field::new("target_date", DataType::Date32, false),
            Field::new("target", DataType::Float64, false),
            Field::new("values", float_list(), false),
        ])
        .with_metadata(metadata),
    );
    let columns: Vec<ArrayRef> = vec![
        Arc::new(Date32Array::from(predictor_dates)),
        Arc::new(Date32Array::from(target_dates)),
        Arc::new(Float64Array::from(targets)),
        Arc::new(values_builder.finish()),
    ];
    write_batch(path, schema, columns)?;
    log::info!("Wrote {} examples to {}", store.len(), path.display());
    Ok(())
}

// -- Arrow helpers --

fn float_list() -> DataType {
    DataType::List(Arc::new(Field::new("item", DataType::Float64, true)))
}

/// NaN cells are stored as nulls.
fn append_cells(builder: &mut ListBuilder<Float64Builder>, cells: &[f64]) {
    let values = builder.values();
    for &v in cells {
        if v.is_nan() {
            values.append_null();
        } else {
            values.append_value(v);
        }
    }
    builder.append(true);
}

/// Days since 1970-01-01, the Date32 encoding.
fn epoch_days(date: NaiveDate) -> i32 {
    // `NaiveDate::default()` is the Unix epoch.
    (date - NaiveDate::default()).num_days() as i32
}

fn write_batch(path: &Path, schema: Arc<Schema>, columns: Vec<ArrayRef>) -> Result<()> {
    let batch = RecordBatch::try_new(schema.clone(), columns).context("building record batch")?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let file = std::fs::File::create(path)
        .with_context(|| format!("creating {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing record batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_days_matches_date32_encoding() {
        assert_eq!(epoch_days(NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()), 0);
        assert_eq!(epoch_days(NaiveDate::from_ymd_opt(1970, 1, 31).unwrap()), 30);
        assert_eq!(epoch_days(NaiveDate::from_ymd_opt(1969, 12, 31).unwrap()), -1);
    }
}
