//! Lead-time alignment of predictor fields with the index.

pub mod aligner;
pub mod split;
pub mod store;
