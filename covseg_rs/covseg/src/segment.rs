//! Classification and maximal-run segmentation.

use tracing::debug;

use crate::rule::ClassificationRule;
use crate::sample::{LabeledSample, Sample, Segment};
use crate::SegError;

/// Label every sample with `rule`, preserving order.
///
/// Every label is checked against the rule's declared label set before
/// anything is returned.
pub fn classify<T, R>(
    samples: &[Sample<T>],
    rule: &R,
) -> Result<Vec<LabeledSample<T, R::Label>>, SegError>
where
    T: Clone,
    R: ClassificationRule + ?Sized,
{
    samples
        .iter()
        .enumerate()
        .map(|(index, sample)| {
            let category = rule.classify(sample.value);
            if !rule.admits(&category) {
                return Err(SegError::InvalidRule {
                    index,
                    label: format!("{category:?}"),
                });
            }
            Ok(LabeledSample {
                sample: sample.clone(),
                category,
            })
        })
        .collect()
}

/// Running state for the segment currently being extended.
struct OpenRun<T, L> {
    start: T,
    end: T,
    category: L,
    mean: f64,
    count: usize,
    start_index: usize,
}

impl<T, L> OpenRun<T, L> {
    fn close(self) -> Segment<T, L> {
        Segment {
            start: self.start,
            end: self.end,
            category: self.category,
            aggregate: self.mean,
            sample_count: self.count,
            start_index: self.start_index,
        }
    }
}

/// Fold consecutive samples with equal categories into segments.
///
/// A new segment starts at the first sample and wherever the category differs
/// from the previous sample's. Categories compare with `PartialEq` only.
pub fn segment<T, L>(labeled: &[LabeledSample<T, L>]) -> Vec<Segment<T, L>>
where
    T: Clone,
    L: Clone + PartialEq,
{
    let mut segments = Vec::new();
    let mut current: Option<OpenRun<T, L>> = None;

    for (index, item) in labeled.iter().enumerate() {
        match &mut current {
            Some(run) if run.category == item.category => {
                run.end = item.sample.timestamp.clone();
                run.count += 1;
                run.mean += (item.sample.value - run.mean) / run.count as f64;
            }
            _ => {
                if let Some(run) = current.take() {
                    segments.push(run.close());
                }
                current = Some(OpenRun {
                    start: item.sample.timestamp.clone(),
                    end: item.sample.timestamp.clone(),
                    category: item.category.clone(),
                    mean: item.sample.value,
                    count: 1,
                    start_index: index,
                });
            }
        }
    }

    if let Some(run) = current {
        segments.push(run.close());
    }

    debug!(
        samples = labeled.len(),
        segments = segments.len(),
        "segmented labeled series"
    );
    segments
}

/// [`classify`] followed by [`segment`].
pub fn segment_samples<T, R>(
    samples: &[Sample<T>],
    rule: &R,
) -> Result<Vec<Segment<T, R::Label>>, SegError>
where
    T: Clone,
    R: ClassificationRule + ?Sized,
{
    let labeled = classify(samples, rule)?;
    Ok(segment(&labeled))
}
