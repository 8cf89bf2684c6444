//! Daily index computation.
//!
//! ```text
//!  GriddedSeries ─reduce─▶ ScalarSeries ─climatology/anomalize─▶ AnomalySeries
//!                                                                    │
//!                                       IndexSeries ◀─rolling_mean───┘
//! ```

pub mod climatology;
pub mod compare;
pub mod pipeline;
pub mod reduce;
pub mod smoothing;
