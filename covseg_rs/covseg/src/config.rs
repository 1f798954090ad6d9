//! Serializable segmentation parameters.

use serde::{Deserialize, Serialize};

use crate::color::{Domain, Ramp};
use crate::rule::{ClassificationRule, EqualWidthBins, ThresholdRule};
use crate::SegError;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleSpec {
    /// `labels` has one more entry than `bounds`; the last label catches
    /// everything at or above the last bound.
    Thresholds {
        bounds: Vec<f64>,
        labels: Vec<String>,
    },
    /// Equal-width bins over [`Params::domain`].
    EqualWidth { bins: usize },
}

impl Default for RuleSpec {
    fn default() -> Self {
        RuleSpec::Thresholds {
            bounds: vec![0.5, 0.7],
            labels: vec!["Low".into(), "Medium".into(), "High".into()],
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Params {
    pub rule: RuleSpec,
    pub domain: Domain,
    pub ramp: Vec<String>,
    pub rolling_window: usize,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            rule: RuleSpec::default(),
            domain: Domain::UNIT,
            ramp: Ramp::red_yellow_green()
                .colors()
                .iter()
                .map(|c| c.to_string())
                .collect(),
            rolling_window: 7,
        }
    }
}

impl Params {
    pub fn validate(&self) -> Result<(), SegError> {
        if self.ramp.is_empty() {
            return Err(SegError::InvalidRamp);
        }
        if self.rolling_window == 0 {
            return Err(SegError::InvalidParameter(
                "rolling_window must be positive".into(),
            ));
        }
        self.build_rule().map(|_| ())
    }

    pub fn build_rule(&self) -> Result<ConfiguredRule, SegError> {
        match &self.rule {
            RuleSpec::Thresholds { bounds, labels } => Ok(ConfiguredRule::Thresholds(
                ThresholdRule::from_parts(bounds.clone(), labels.clone())?,
            )),
            RuleSpec::EqualWidth { bins } => {
                let bins = EqualWidthBins::new(self.domain, *bins)?;
                let names = (0..bins.bins())
                    .filter_map(|i| bins.bounds(i).map(|(lo, hi)| (i, lo, hi)))
                    .map(|(i, lo, hi)| format!("bin {i} [{lo:.2}, {hi:.2})"))
                    .collect();
                Ok(ConfiguredRule::EqualWidth { bins, names })
            }
        }
    }

    pub fn color_ramp(&self) -> Result<Ramp<String>, SegError> {
        Ramp::new(self.ramp.clone())
    }
}

/// A rule built from [`RuleSpec`], labelling with strings either way.
#[derive(Clone, Debug, PartialEq)]
pub enum ConfiguredRule {
    Thresholds(ThresholdRule<String>),
    EqualWidth {
        bins: EqualWidthBins,
        names: Vec<String>,
    },
}

impl ClassificationRule for ConfiguredRule {
    type Label = String;

    fn labels(&self) -> &[String] {
        match self {
            ConfiguredRule::Thresholds(rule) => rule.labels(),
            ConfiguredRule::EqualWidth { names, .. } => names,
        }
    }

    fn classify(&self, value: f64) -> String {
        match self {
            ConfiguredRule::Thresholds(rule) => rule.classify(value),
            ConfiguredRule::EqualWidth { bins, names } => names[bins.classify(value)].clone(),
        }
    }
}
