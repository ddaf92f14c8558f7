use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use shared::{
    domain::Classification,
    protocol::{AnalyzeResponse, IMAGE_FIELD},
};
use thiserror::Error;
use tracing::debug;

/// Upper bound on diagnostic text surfaced to the UI.
pub const MAX_DETAIL_CHARS: usize = 500;

/// Image bytes ready for upload.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub mime_type: Option<String>,
}

/// What one analysis attempt produced. Every relay-side failure — bad
/// status, wrong content type, embedded error, malformed body — folds into
/// `Rejected`; only transport faults are errors.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalyzeOutcome {
    Classified(Classification),
    Rejected {
        message: String,
        details: Option<String>,
    },
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("could not reach the analysis service: {0}")]
    Unreachable(#[from] reqwest::Error),
}

#[async_trait]
pub trait AnalyzeBackend: Send + Sync {
    async fn analyze(&self, image: ImageUpload) -> Result<AnalyzeOutcome, RelayError>;
}

/// The one HTTP call of the scan flow: POST the image as a single-field
/// multipart body and republish the relay's answer.
pub struct RelayClient {
    http: reqwest::Client,
    analyze_url: String,
}

impl RelayClient {
    pub fn new(server_url: impl Into<String>) -> Self {
        let server_url = server_url.into();
        Self {
            http: reqwest::Client::new(),
            analyze_url: format!("{}/analyze", server_url.trim_end_matches('/')),
        }
    }
}

#[async_trait]
impl AnalyzeBackend for RelayClient {
    async fn analyze(&self, image: ImageUpload) -> Result<AnalyzeOutcome, RelayError> {
        let form = reqwest::multipart::Form::new().part(IMAGE_FIELD, build_part(image));
        let response = self.http.post(&self.analyze_url).multipart(form).send().await?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("")
            .to_string();
        let text = response.text().await?;
        debug!(%status, %content_type, "analysis response received");

        if !status.is_success() {
            return Ok(AnalyzeOutcome::Rejected {
                message: format!("HTTP {}", status.as_u16()),
                details: truncate_details(&text),
            });
        }
        if !content_type.contains("application/json") {
            return Ok(AnalyzeOutcome::Rejected {
                message: "Non-JSON response".to_string(),
                details: truncate_details(&text),
            });
        }

        let body: AnalyzeResponse = match serde_json::from_str(&text) {
            Ok(body) => body,
            Err(_) => {
                return Ok(AnalyzeOutcome::Rejected {
                    message: "Unexpected response shape".to_string(),
                    details: truncate_details(&text),
                })
            }
        };
        if let Some(err) = body.embedded_error() {
            return Ok(AnalyzeOutcome::Rejected {
                message: err.error,
                details: err.details.as_deref().and_then(truncate_details),
            });
        }
        match body.classification() {
            Some(classification) => Ok(AnalyzeOutcome::Classified(classification)),
            None => Ok(AnalyzeOutcome::Rejected {
                message: "Unexpected response shape".to_string(),
                details: truncate_details(&text),
            }),
        }
    }
}

fn build_part(image: ImageUpload) -> reqwest::multipart::Part {
    let ImageUpload {
        bytes,
        filename,
        mime_type,
    } = image;
    match mime_type {
        Some(mime) => {
            // an unusable declared type degrades to an untyped part
            match reqwest::multipart::Part::bytes(bytes.clone())
                .file_name(filename.clone())
                .mime_str(&mime)
            {
                Ok(part) => part,
                Err(_) => reqwest::multipart::Part::bytes(bytes).file_name(filename),
            }
        }
        None => reqwest::multipart::Part::bytes(bytes).file_name(filename),
    }
}

fn truncate_details(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.chars().take(MAX_DETAIL_CHARS).collect())
}
