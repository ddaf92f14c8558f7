use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Label the model vocabulary uses for a failed tyre. The vocabulary itself
/// is owned by the classifier; the relay and client only rely on this one
/// label being distinguishable from the rest.
pub const DEFECTIVE_LABEL: &str = "defective";

/// Verdict produced by the classifier for one image, as it appears on the
/// wire (`class` / `confidence` / `probs`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    #[serde(rename = "class")]
    pub label: String,
    pub confidence: f64,
    #[serde(
        rename = "probs",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub probabilities: Option<HashMap<String, f64>>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidClassification {
    #[error("classification label is empty")]
    EmptyLabel,
    #[error("confidence {0} is outside [0, 1]")]
    ConfidenceOutOfRange(f64),
}

impl Classification {
    pub fn is_defective(&self) -> bool {
        self.label == DEFECTIVE_LABEL
    }

    /// Boundary validation: every classification crossing a process or HTTP
    /// boundary is checked before use.
    pub fn validate(&self) -> Result<(), InvalidClassification> {
        if self.label.trim().is_empty() {
            return Err(InvalidClassification::EmptyLabel);
        }
        if !(0.0..=1.0).contains(&self.confidence) || self.confidence.is_nan() {
            return Err(InvalidClassification::ConfidenceOutOfRange(
                self.confidence,
            ));
        }
        Ok(())
    }
}
