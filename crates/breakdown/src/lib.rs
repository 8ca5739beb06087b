//! # Breakdown
//!
//! Pure transforms that turn one polled metrics snapshot into display-ready
//! data for the inference dashboard.
//!
//! Two components live here:
//!
//! - [`StageBreakdownReducer`] turns an arbitrary set of named latency-stage
//!   percentages into a bounded "top-N + Other" list that always sums to 100%.
//! - [`SeriesAligner`] turns a rolling history bundle into per-chart
//!   `(labels, values)` pairs sharing one x-axis, and transposes per-instance
//!   snapshots into one series per instance.
//!
//! Neither component holds state between calls. Malformed or missing input
//! degrades to zero or empty output instead of failing.
//!
//! # Examples
//!
//! ```
//! use breakdown::{StageBreakdownReducer, StageSet};
//!
//! let stages: StageSet = [("tokenize", 50.0), ("queue", 30.0), ("inference", 15.0), ("overhead", 5.0)]
//!     .into_iter()
//!     .collect();
//!
//! let buckets = StageBreakdownReducer::default().reduce(&stages);
//! let names: Vec<&str> = buckets.iter().map(|b| b.name.as_str()).collect();
//! assert_eq!(names, ["tokenize", "queue", "inference", "other"]);
//! ```

pub mod aligner;
pub mod reducer;
pub mod series;
pub mod stage;

pub use aligner::*;
pub use reducer::*;
pub use series::*;
pub use stage::*;
use thiserror::Error;

/// Errors that can occur while configuring the breakdown components
#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    /// The reducer was asked to show no named buckets at all
    #[error("max_visible must be at least 1")]
    ZeroMaxVisible,
}
