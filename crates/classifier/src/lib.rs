use std::{
    path::{Path, PathBuf},
    process::ExitStatus,
};

use async_trait::async_trait;
use shared::{domain::Classification, protocol::AnalyzeResponse};
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

mod fake;

pub use fake::FakeClassifier;

/// How to launch the external model: `<runtime> <script> <image_path>`.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub runtime: PathBuf,
    pub script: PathBuf,
}

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("failed to launch classifier process: {0}")]
    Launch(#[from] std::io::Error),
    #[error("classifier exited with {status}")]
    Failed {
        status: ExitStatus,
        stdout: String,
        stderr: String,
    },
    #[error("classifier output is not a usable verdict: {reason}")]
    MalformedOutput { reason: String, stdout: String },
}

impl ClassifierError {
    /// Diagnostic text for the relay's `details` field.
    pub fn details(&self) -> Option<String> {
        match self {
            ClassifierError::Launch(_) => None,
            ClassifierError::Failed { stdout, stderr, .. } => Some(format!(
                "---- stderr ----\n{stderr}\n---- stdout ----\n{stdout}"
            )),
            ClassifierError::MalformedOutput { stdout, .. } => {
                Some(format!("---- stdout ----\n{stdout}"))
            }
        }
    }
}

#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, image: &Path) -> Result<Classification, ClassifierError>;
}

/// One-shot subprocess classifier. Each call spawns the configured runtime,
/// waits for it to exit and parses the single JSON object it prints.
pub struct ProcessClassifier {
    config: ClassifierConfig,
}

impl ProcessClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Classifier for ProcessClassifier {
    async fn classify(&self, image: &Path) -> Result<Classification, ClassifierError> {
        debug!(
            runtime = %self.config.runtime.display(),
            script = %self.config.script.display(),
            image = %image.display(),
            "invoking classifier"
        );
        let output = Command::new(&self.config.runtime)
            .arg(&self.config.script)
            .arg(image)
            .output()
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if !output.status.success() {
            return Err(ClassifierError::Failed {
                status: output.status,
                stdout,
                stderr,
            });
        }
        parse_verdict(&stdout)
    }
}

/// The script prints exactly one JSON object. An `error` object (which the
/// predict script also emits right before exiting non-zero) is never a
/// verdict, even on a zero exit.
fn parse_verdict(stdout: &str) -> Result<Classification, ClassifierError> {
    let malformed = |reason: String| ClassifierError::MalformedOutput {
        reason,
        stdout: stdout.to_string(),
    };

    let body: AnalyzeResponse = serde_json::from_str(stdout.trim())
        .map_err(|e| malformed(format!("not a JSON object: {e}")))?;
    if let Some(err) = body.embedded_error() {
        return Err(malformed(format!("classifier reported: {}", err.error)));
    }

    let verdict = Classification {
        label: body
            .class
            .ok_or_else(|| malformed("missing `class` field".to_string()))?,
        confidence: body
            .confidence
            .ok_or_else(|| malformed("missing `confidence` field".to_string()))?,
        probabilities: body.probs,
    };
    verdict.validate().map_err(|e| malformed(e.to_string()))?;
    Ok(verdict)
}
