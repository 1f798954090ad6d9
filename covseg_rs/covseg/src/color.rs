//! Mapping aggregate values onto discrete color ramps.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::sample::Segment;
use crate::SegError;

/// A closed value range `[lo, hi]` used to normalize values to `[0, 1]`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "(f64, f64)", into = "(f64, f64)")]
pub struct Domain {
    lo: f64,
    hi: f64,
}

impl Domain {
    /// Fractional coverage.
    pub const UNIT: Domain = Domain { lo: 0.0, hi: 1.0 };
    /// Percentage coverage.
    pub const PERCENT: Domain = Domain { lo: 0.0, hi: 100.0 };

    pub fn new(lo: f64, hi: f64) -> Result<Self, SegError> {
        if !(hi - lo).is_finite() || lo >= hi {
            return Err(SegError::InvalidDomain { lo, hi });
        }
        Ok(Self { lo, hi })
    }

    pub fn lo(&self) -> f64 {
        self.lo
    }

    pub fn hi(&self) -> f64 {
        self.hi
    }

    pub fn width(&self) -> f64 {
        self.hi - self.lo
    }

    /// `(v - lo) / (hi - lo)` clamped to `[0, 1]`; `NaN` maps to 0.
    pub fn normalize(&self, value: f64) -> f64 {
        let t = (value - self.lo) / self.width();
        if t.is_nan() {
            0.0
        } else {
            t.clamp(0.0, 1.0)
        }
    }
}

impl Default for Domain {
    fn default() -> Self {
        Domain::UNIT
    }
}

impl TryFrom<(f64, f64)> for Domain {
    type Error = SegError;

    fn try_from((lo, hi): (f64, f64)) -> Result<Self, Self::Error> {
        Domain::new(lo, hi)
    }
}

impl From<Domain> for (f64, f64) {
    fn from(domain: Domain) -> Self {
        (domain.lo, domain.hi)
    }
}

/// Pick a ramp entry for a value already expressed in `[0, 1]`.
pub fn color_of<C>(value: f64, ramp: &[C]) -> Result<&C, SegError> {
    color_of_in(value, Domain::UNIT, ramp)
}

/// Pick a ramp entry for a value in `domain`.
///
/// The index is `floor(normalized * (len - 1))`, so only values at or above
/// the top of the domain reach the last color. Out-of-domain values clamp.
pub fn color_of_in<C>(value: f64, domain: Domain, ramp: &[C]) -> Result<&C, SegError> {
    let last = ramp.len().checked_sub(1).ok_or(SegError::InvalidRamp)?;
    let idx = (domain.normalize(value) * last as f64).floor() as usize;
    Ok(&ramp[idx.min(last)])
}

/// A non-empty ordered sequence of colors.
#[derive(Clone, Debug, PartialEq)]
pub struct Ramp<C> {
    colors: Vec<C>,
}

impl<C> Ramp<C> {
    pub fn new(colors: Vec<C>) -> Result<Self, SegError> {
        if colors.is_empty() {
            return Err(SegError::InvalidRamp);
        }
        Ok(Self { colors })
    }

    pub fn colors(&self) -> &[C] {
        &self.colors
    }

    pub fn pick(&self, value: f64, domain: Domain) -> &C {
        let last = self.colors.len() - 1;
        let idx = (domain.normalize(value) * last as f64).floor() as usize;
        &self.colors[idx.min(last)]
    }
}

impl Ramp<&'static str> {
    /// Six-step diverging red to green scale.
    pub fn red_yellow_green() -> Self {
        Self {
            colors: vec![
                "#d73027", "#fc8d59", "#fee08b", "#d9ef8b", "#91cf60", "#1a9850",
            ],
        }
    }
}

impl<C> TryFrom<Vec<C>> for Ramp<C> {
    type Error = SegError;

    fn try_from(colors: Vec<C>) -> Result<Self, Self::Error> {
        Ramp::new(colors)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ColoredSegment<T, L, C> {
    #[serde(flatten)]
    pub segment: Segment<T, L>,
    pub color: C,
}

/// Attach a ramp color to every segment based on its aggregate.
pub fn paint<T, L, C: Clone>(
    segments: Vec<Segment<T, L>>,
    domain: Domain,
    ramp: &[C],
) -> Result<Vec<ColoredSegment<T, L, C>>, SegError> {
    if ramp.is_empty() {
        return Err(SegError::InvalidRamp);
    }
    debug!(segments = segments.len(), ramp = ramp.len(), "painting segments");
    segments
        .into_iter()
        .map(|segment| {
            let color = color_of_in(segment.aggregate, domain, ramp)?.clone();
            Ok(ColoredSegment { segment, color })
        })
        .collect()
}
