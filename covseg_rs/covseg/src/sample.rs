use std::ops::Range;

use serde::{Deserialize, Serialize};

/// A single reading: when it was taken and the measured value.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct Sample<T> {
    pub timestamp: T,
    pub value: f64,
}

impl<T> Sample<T> {
    pub fn new(timestamp: T, value: f64) -> Self {
        Self { timestamp, value }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LabeledSample<T, L> {
    pub sample: Sample<T>,
    pub category: L,
}

/// A maximal run of consecutive samples sharing one category.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Segment<T, L> {
    pub start: T,
    pub end: T,
    pub category: L,
    /// Arithmetic mean of the member values.
    pub aggregate: f64,
    pub sample_count: usize,
    /// Position of the first member in the input sequence.
    pub start_index: usize,
}

impl<T, L> Segment<T, L> {
    /// Index range of the members in the sequence this segment was built from.
    pub fn span(&self) -> Range<usize> {
        self.start_index..self.start_index + self.sample_count
    }

    /// Borrow the member samples back out of the original input.
    ///
    /// Returns `None` if `samples` is shorter than the segment's span, which
    /// means the slice is not the sequence the segment came from.
    pub fn members<'a, S>(&self, samples: &'a [S]) -> Option<&'a [S]> {
        samples.get(self.span())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_covers_members() {
        let seg = Segment {
            start: 3,
            end: 5,
            category: "High",
            aggregate: 0.8,
            sample_count: 3,
            start_index: 2,
        };
        assert_eq!(seg.span(), 2..5);
        let values = [0, 1, 2, 3, 4, 5];
        assert_eq!(seg.members(&values), Some(&values[2..5]));
        assert_eq!(seg.members(&values[..4]), None);
    }
}
