//! Run-length segmentation of coverage time series.
//!
//! Samples are classified into a closed set of categories, adjacent samples
//! sharing a category are folded into one [`Segment`], and each segment's mean
//! value can be mapped onto a color ramp for timeline rendering.
//!
//! ```
//! use covseg::{color_of, coverage_bands, segment_samples, Sample};
//!
//! let samples = vec![
//!     Sample::new(1, 0.40),
//!     Sample::new(2, 0.45),
//!     Sample::new(3, 0.60),
//!     Sample::new(4, 0.65),
//! ];
//! let segments = segment_samples(&samples, &coverage_bands()).unwrap();
//! assert_eq!(segments.len(), 2);
//! assert_eq!(segments[0].category, "Low");
//! assert_eq!(segments[1].sample_count, 2);
//!
//! let ramp = ["red", "orange", "green"];
//! assert_eq!(*color_of(segments[1].aggregate, &ramp).unwrap(), "orange");
//! ```

use thiserror::Error;

pub mod color;
pub mod config;
pub mod rolling;
pub mod rule;
pub mod sample;
pub mod segment;
pub mod sensor;


pub use color::{color_of, color_of_in, paint, ColoredSegment, Domain, Ramp};
pub use config::{ConfiguredRule, Params, RuleSpec};
pub use rolling::rolling_mean;
pub use rule::{
    coverage_bands, coverage_colors, ClassificationRule, EqualWidthBins, FnRule, ThresholdRule,
};
pub use sample::{LabeledSample, Sample, Segment};
pub use segment::{classify, segment, segment_samples};
pub use sensor::{segment_by_sensor, SensorSample, SensorTimeline};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SegError {
    #[error("rule produced label {label} for sample {index}, which is not in its declared label set")]
    InvalidRule { index: usize, label: String },
    #[error("color ramp is empty")]
    InvalidRamp,
    #[error("invalid value domain [{lo}, {hi}]: bounds must be finite with lo < hi")]
    InvalidDomain { lo: f64, hi: f64 },
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}
