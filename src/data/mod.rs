/// Data layer: core types, loading, resampling, box selection and writing.
///
/// Architecture:
/// ```text
///  .parquet / .json / .csv   (one directory per variable, files per year)
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse files → RawField (sub-daily frames)
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │ resample  │  mean / snapshot per calendar date → GriddedSeries
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  lat/lon box → cell indices (axis orientation aware)
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  writer   │  GriddedSeries / IndexSeries / examples → disk
///   └──────────┘
/// ```

pub mod filter;
pub mod loader;
pub mod model;
pub mod resample;
pub mod writer;
