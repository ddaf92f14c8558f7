use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{domain::Classification, error::ApiError};

/// Multipart field the relay reads the image from.
pub const IMAGE_FIELD: &str = "image";

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

impl HealthResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}

/// Loose shape of an `/analyze` response body. A single body may carry a
/// verdict, an embedded error, or neither (a malformed upstream); callers
/// go through [`AnalyzeResponse::embedded_error`] and
/// [`AnalyzeResponse::classification`] rather than trusting fields
/// directly.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalyzeResponse {
    #[serde(default)]
    pub class: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub probs: Option<HashMap<String, f64>>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
}

impl AnalyzeResponse {
    pub fn embedded_error(&self) -> Option<ApiError> {
        self.error.as_ref().map(|error| ApiError {
            error: error.clone(),
            details: self.details.clone(),
        })
    }

    /// The validated verdict, if the body carries one. Bodies with an
    /// embedded error never yield a verdict, and a verdict failing
    /// boundary validation is treated as absent.
    pub fn classification(&self) -> Option<Classification> {
        if self.error.is_some() {
            return None;
        }
        let classification = Classification {
            label: self.class.clone()?,
            confidence: self.confidence?,
            probabilities: self.probs.clone(),
        };
        classification.validate().ok()?;
        Some(classification)
    }
}
