//! Per-sensor timelines for multi-sensor coverage data.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::color::Domain;
use crate::rule::ClassificationRule;
use crate::sample::{Sample, Segment};
use crate::segment::segment_samples;
use crate::SegError;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SensorSample<T> {
    pub sensor: String,
    pub timestamp: T,
    pub value: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SensorTimeline<T, L> {
    pub sensor: String,
    /// The sensor's samples in input order; segment spans index into this.
    pub samples: Vec<Sample<T>>,
    pub segments: Vec<Segment<T, L>>,
    /// Mean value over every sample of the sensor.
    pub mean_value: f64,
}

impl<T, L> SensorTimeline<T, L> {
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Legend text such as `Sensor A (91.2%)`, with the mean shown as its
    /// position within `domain`.
    pub fn legend_label(&self, domain: Domain) -> String {
        format!(
            "{} ({:.1}%)",
            self.sensor,
            domain.normalize(self.mean_value) * 100.0
        )
    }
}

/// Split records by sensor and segment each sensor's series independently.
///
/// Records of one sensor keep their relative input order. The map is keyed by
/// sensor name, which also fixes the display order.
pub fn segment_by_sensor<T, R>(
    records: &[SensorSample<T>],
    rule: &R,
) -> Result<BTreeMap<String, SensorTimeline<T, R::Label>>, SegError>
where
    T: Clone,
    R: ClassificationRule + ?Sized,
{
    let mut grouped: BTreeMap<&str, Vec<Sample<T>>> = BTreeMap::new();
    for record in records {
        grouped
            .entry(record.sensor.as_str())
            .or_default()
            .push(Sample::new(record.timestamp.clone(), record.value));
    }

    let mut out = BTreeMap::new();
    for (sensor, samples) in grouped {
        let segments = segment_samples(&samples, rule)?;
        let mean_value = samples.iter().map(|s| s.value).sum::<f64>() / samples.len() as f64;
        debug!(
            sensor,
            samples = samples.len(),
            segments = segments.len(),
            "built sensor timeline"
        );
        out.insert(
            sensor.to_string(),
            SensorTimeline {
                sensor: sensor.to_string(),
                samples,
                segments,
                mean_value,
            },
        );
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::{coverage_bands, FnRule};

    fn record(sensor: &str, ts: u32, value: f64) -> SensorSample<u32> {
        SensorSample {
            sensor: sensor.to_string(),
            timestamp: ts,
            value,
        }
    }

    #[test]
    fn sensors_are_segmented_independently() {
        let records = vec![
            record("Sensor B", 1, 0.9),
            record("Sensor A", 1, 0.2),
            record("Sensor B", 2, 0.95),
            record("Sensor A", 2, 0.3),
            record("Sensor A", 3, 0.8),
        ];
        let timelines = segment_by_sensor(&records, &coverage_bands()).unwrap();
        let names: Vec<_> = timelines.keys().cloned().collect();
        assert_eq!(names, vec!["Sensor A", "Sensor B"]);

        let a = &timelines["Sensor A"];
        assert_eq!(a.sample_count(), 3);
        assert_eq!(a.segments.len(), 2);
        assert_eq!(a.segments[0].category, "Low");
        assert_eq!(a.segments[0].sample_count, 2);
        assert_eq!(a.segments[1].start, 3);
        assert!((a.mean_value - 13.0 / 30.0).abs() < 1e-12);

        let b = &timelines["Sensor B"];
        assert_eq!(b.segments.len(), 1);
        assert_eq!(b.segments[0].sample_count, 2);
        assert_eq!(b.samples[0].value, 0.9);
        assert_eq!(b.samples[1].value, 0.95);
    }

    #[test]
    fn legend_label_formats_mean() {
        let records = vec![record("Sensor A", 1, 0.9), record("Sensor A", 2, 0.924)];
        let timelines = segment_by_sensor(&records, &coverage_bands()).unwrap();
        assert_eq!(
            timelines["Sensor A"].legend_label(Domain::UNIT),
            "Sensor A (91.2%)"
        );
    }

    #[test]
    fn legend_label_is_relative_to_domain() {
        let records = vec![record("T", 1, -2.0), record("T", 2, 2.0)];
        let rule = FnRule::new(vec![()], |_| ());
        let timelines = segment_by_sensor(&records, &rule).unwrap();
        let domain = Domain::new(-10.0, 10.0).unwrap();
        assert_eq!(timelines["T"].legend_label(domain), "T (50.0%)");

        let records = vec![record("P", 1, 42.0)];
        let timelines = segment_by_sensor(&records, &rule).unwrap();
        assert_eq!(timelines["P"].legend_label(Domain::PERCENT), "P (42.0%)");
    }

    #[test]
    fn rule_errors_propagate() {
        let rule = FnRule::new(vec![0u8], |_| 1u8);
        let records = vec![record("x", 1, 0.5)];
        assert!(matches!(
            segment_by_sensor(&records, &rule),
            Err(SegError::InvalidRule { index: 0, .. })
        ));
        assert!(segment_by_sensor::<u32, _>(&[], &rule).unwrap().is_empty());
    }
}
