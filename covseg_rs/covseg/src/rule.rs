//! Classification rules mapping a value onto a closed, ordered label set.

use std::fmt;

use serde::Serialize;

use crate::color::Domain;
use crate::SegError;

/// A total, deterministic mapping from a value to one of a fixed set of labels.
///
/// Implementations must return a member of [`labels`](Self::labels) for every
/// input, including `NaN` and values outside any nominal range. [`crate::classify`]
/// checks this and reports [`SegError::InvalidRule`] otherwise.
pub trait ClassificationRule {
    type Label: Clone + PartialEq + fmt::Debug;

    fn labels(&self) -> &[Self::Label];

    fn classify(&self, value: f64) -> Self::Label;

    fn admits(&self, label: &Self::Label) -> bool {
        self.labels().contains(label)
    }
}

impl<R: ClassificationRule + ?Sized> ClassificationRule for &R {
    type Label = R::Label;

    fn labels(&self) -> &[Self::Label] {
        (**self).labels()
    }

    fn classify(&self, value: f64) -> Self::Label {
        (**self).classify(value)
    }

    fn admits(&self, label: &Self::Label) -> bool {
        (**self).admits(label)
    }
}

/// Ordered threshold bands: the first band whose exclusive upper bound exceeds
/// the value wins, anything else (including `NaN`) falls into the last label.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct ThresholdRule<L> {
    bounds: Vec<f64>,
    labels: Vec<L>,
}

impl<L> ThresholdRule<L> {
    /// Build from `(upper_exclusive, label)` bands plus the label for values
    /// at or above the last bound.
    pub fn new(bands: Vec<(f64, L)>, otherwise: L) -> Result<Self, SegError> {
        let mut bounds = Vec::with_capacity(bands.len());
        let mut labels = Vec::with_capacity(bands.len() + 1);
        for (bound, label) in bands {
            bounds.push(bound);
            labels.push(label);
        }
        labels.push(otherwise);
        Self::from_parts(bounds, labels)
    }

    /// Build from parallel bound and label lists; `labels` must be one longer
    /// than `bounds`.
    pub fn from_parts(bounds: Vec<f64>, labels: Vec<L>) -> Result<Self, SegError> {
        if labels.len() != bounds.len() + 1 {
            return Err(SegError::InvalidParameter(format!(
                "{} thresholds need {} labels, got {}",
                bounds.len(),
                bounds.len() + 1,
                labels.len()
            )));
        }
        if let Some(bad) = bounds.iter().find(|b| !b.is_finite()) {
            return Err(SegError::InvalidParameter(format!(
                "threshold {bad} is not finite"
            )));
        }
        if let Some(w) = bounds.windows(2).find(|w| w[0] >= w[1]) {
            return Err(SegError::InvalidParameter(format!(
                "thresholds must be strictly increasing ({} then {})",
                w[0], w[1]
            )));
        }
        Ok(Self { bounds, labels })
    }

    pub fn bounds(&self) -> &[f64] {
        &self.bounds
    }
}

impl<L: Clone + PartialEq + fmt::Debug> ClassificationRule for ThresholdRule<L> {
    type Label = L;

    fn labels(&self) -> &[L] {
        &self.labels
    }

    fn classify(&self, value: f64) -> L {
        let idx = self
            .bounds
            .iter()
            .position(|&bound| value < bound)
            .unwrap_or(self.bounds.len());
        self.labels[idx].clone()
    }
}

/// `bins` equal-width bins spanning a domain; the label is the bin index.
///
/// Values below the domain land in bin 0, values at or above `hi` in the last
/// bin, and `NaN` in bin 0.
#[derive(Clone, Debug, PartialEq)]
pub struct EqualWidthBins {
    domain: Domain,
    labels: Vec<usize>,
}

impl EqualWidthBins {
    pub fn new(domain: Domain, bins: usize) -> Result<Self, SegError> {
        if bins == 0 {
            return Err(SegError::InvalidParameter(
                "equal-width binning needs at least one bin".into(),
            ));
        }
        Ok(Self {
            domain,
            labels: (0..bins).collect(),
        })
    }

    pub fn bins(&self) -> usize {
        self.labels.len()
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }

    /// The `[start, end)` value range covered by bin `index`.
    pub fn bounds(&self, index: usize) -> Option<(f64, f64)> {
        if index >= self.bins() {
            return None;
        }
        let width = self.domain.width() / self.bins() as f64;
        let start = self.domain.lo() + width * index as f64;
        let end = if index + 1 == self.bins() {
            self.domain.hi()
        } else {
            start + width
        };
        Some((start, end))
    }
}

impl ClassificationRule for EqualWidthBins {
    type Label = usize;

    fn labels(&self) -> &[usize] {
        &self.labels
    }

    fn classify(&self, value: f64) -> usize {
        let normalized = self.domain.normalize(value);
        let idx = (normalized * self.bins() as f64).floor() as usize;
        idx.min(self.bins() - 1)
    }
}

/// Wraps an arbitrary closure together with the labels it promises to return.
pub struct FnRule<F, L> {
    f: F,
    labels: Vec<L>,
}

impl<F, L> FnRule<F, L>
where
    F: Fn(f64) -> L,
{
    pub fn new(labels: Vec<L>, f: F) -> Self {
        Self { f, labels }
    }
}

impl<F, L> ClassificationRule for FnRule<F, L>
where
    F: Fn(f64) -> L,
    L: Clone + PartialEq + fmt::Debug,
{
    type Label = L;

    fn labels(&self) -> &[L] {
        &self.labels
    }

    fn classify(&self, value: f64) -> L {
        (self.f)(value)
    }
}

/// Three coverage bands over `[0, 1]`: Low below 50%, Medium below 70%, High otherwise.
pub fn coverage_bands() -> ThresholdRule<&'static str> {
    ThresholdRule {
        bounds: vec![0.5, 0.7],
        labels: vec!["Low", "Medium", "High"],
    }
}

/// Four coverage colors over `[0, 1]`, used when the color itself is the category.
pub fn coverage_colors() -> ThresholdRule<&'static str> {
    ThresholdRule {
        bounds: vec![0.5, 0.7, 0.9],
        labels: vec!["red", "orange", "yellowgreen", "green"],
    }
}
