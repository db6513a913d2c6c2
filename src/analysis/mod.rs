//! Cost analysis modules.
//!
//! Grouping and ranking live in the aggregator; the spike detector builds
//! a `SpikeReport` on top of them.

pub mod aggregator;
pub mod spikes;

pub use spikes::{DataError, SpikeAnalyzer};
