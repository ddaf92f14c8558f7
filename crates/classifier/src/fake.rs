use std::{
    path::{Path, PathBuf},
    sync::Mutex,
};

use async_trait::async_trait;
use shared::domain::Classification;

use crate::{Classifier, ClassifierError};

/// Test stand-in with a preset outcome; records the image paths it was
/// handed so callers can assert what reached the model.
pub struct FakeClassifier {
    outcome: Result<Classification, String>,
    seen: Mutex<Vec<PathBuf>>,
}

impl FakeClassifier {
    pub fn classifying(verdict: Classification) -> Self {
        Self {
            outcome: Ok(verdict),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            outcome: Err(reason.into()),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().expect("seen").len()
    }

    pub fn seen_paths(&self) -> Vec<PathBuf> {
        self.seen.lock().expect("seen").clone()
    }
}

#[async_trait]
impl Classifier for FakeClassifier {
    async fn classify(&self, image: &Path) -> Result<Classification, ClassifierError> {
        self.seen.lock().expect("seen").push(image.to_path_buf());
        match &self.outcome {
            Ok(verdict) => Ok(verdict.clone()),
            Err(reason) => Err(ClassifierError::MalformedOutput {
                reason: reason.clone(),
                stdout: String::new(),
            }),
        }
    }
}
