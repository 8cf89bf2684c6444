//! Daily ENSO index computation and lead-time aligned training examples.
//!
//! The core (`index`, `align`, `data::model`, `data::filter`,
//! `data::resample`) is pure and performs no I/O or logging; `data::loader`
//! and `data::writer` are the file-facing collaborators used by the
//! `enso-daily` binary.

pub mod align;
pub mod config;
pub mod data;
pub mod error;
pub mod index;

pub use error::{PipelineError, Result};
