//! gas-analysis crate
//!
//! Receipt classification against event-pattern policies and integer-exact
//! gas aggregation.

pub mod classify;
pub mod metrics;

pub use classify::{classify, matches, ClassifyOutcome, MatchPolicy, TopicFilter};
pub use metrics::{aggregate, ensure_min_samples, SampleError};
