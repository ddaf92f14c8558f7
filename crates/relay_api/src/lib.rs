use std::{
    io,
    path::{Path, PathBuf},
    sync::Arc,
};

use chrono::Utc;
use classifier::{Classifier, ClassifierError};
use shared::{domain::Classification, error::ApiError};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

/// Raster formats the relay accepts. HEIC/HEIF is rejected up front since
/// server-side decoding is unsupported.
const ALLOWED_SUBTYPES: &[&str] = &["jpeg", "jpg", "png", "webp", "bmp", "gif"];

#[derive(Clone)]
pub struct ApiContext {
    pub classifier: Arc<dyn Classifier>,
    pub policy: UploadPolicy,
}

#[derive(Debug, Clone)]
pub struct UploadPolicy {
    pub uploads_dir: PathBuf,
    pub max_upload_bytes: u64,
    /// When set, uploads are re-encoded as JPEG bounded by this side length
    /// before the classifier sees them.
    pub normalize_max_side: Option<u32>,
}

/// Input the caller refused to forward to the classifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    #[error("No file received. Field name must be 'image'.")]
    MissingImage,
    #[error("HEIC/HEIF not supported on server. Please use the camera capture button (JPEG) or upload a JPG/PNG/WebP.")]
    HeicUnsupported,
    #[error("Unsupported file type. Please upload an image (JPG/PNG/WebP).")]
    UnsupportedType,
    #[error("Image exceeds the {0} byte upload limit.")]
    TooLarge(u64),
    #[error("Cannot read image file. Invalid or corrupted image.")]
    Undecodable,
}

#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error(transparent)]
    Rejected(#[from] UploadError),
    #[error("could not stage upload: {0}")]
    Staging(#[from] io::Error),
    #[error(transparent)]
    Classifier(#[from] ClassifierError),
}

impl AnalyzeError {
    /// Bad input (4xx) as opposed to a classifier or relay fault (5xx).
    pub fn is_client_error(&self) -> bool {
        matches!(self, AnalyzeError::Rejected(_))
    }

    pub fn to_api_error(&self) -> ApiError {
        match self {
            AnalyzeError::Rejected(err) => ApiError::new(err.to_string()),
            AnalyzeError::Staging(err) => {
                ApiError::with_details("Internal Server Error", err.to_string())
            }
            AnalyzeError::Classifier(err) => {
                let details = match err.details() {
                    Some(streams) => format!("{err}\n{streams}"),
                    None => err.to_string(),
                };
                ApiError::with_details("Internal Server Error", details)
            }
        }
    }
}

/// One image as received from the HTTP layer, not yet trusted.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub bytes: Vec<u8>,
    pub filename: Option<String>,
    pub content_type: Option<String>,
}

pub fn validate_upload(image: &UploadedImage, policy: &UploadPolicy) -> Result<(), UploadError> {
    let mime = image
        .content_type
        .as_deref()
        .unwrap_or("")
        .to_ascii_lowercase();
    let ext = extension_of(image.filename.as_deref());

    let is_heic = mime.contains("heic")
        || mime.contains("heif")
        || ext == ".heic"
        || ext == ".heif";
    if is_heic {
        return Err(UploadError::HeicUnsupported);
    }

    let allowed =
        mime.starts_with("image/") && ALLOWED_SUBTYPES.iter().any(|sub| mime.contains(sub));
    if !allowed {
        return Err(UploadError::UnsupportedType);
    }

    if image.bytes.len() as u64 > policy.max_upload_bytes {
        return Err(UploadError::TooLarge(policy.max_upload_bytes));
    }
    Ok(())
}

/// Uploaded bytes staged to disk for the classifier. The file is removed
/// when the guard drops, on success and failure alike.
pub struct StagedUpload {
    path: PathBuf,
}

impl StagedUpload {
    pub async fn write(dir: &Path, ext: &str, bytes: &[u8]) -> io::Result<Self> {
        tokio::fs::create_dir_all(dir).await?;
        let name = format!(
            "img_{}_{}{}",
            Utc::now().timestamp_millis(),
            Uuid::new_v4().simple(),
            ext
        );
        let path = dir.join(name);
        tokio::fs::write(&path, bytes).await?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StagedUpload {
    fn drop(&mut self) {
        if let Err(error) = std::fs::remove_file(&self.path) {
            if error.kind() != io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), %error, "failed to remove staged upload");
            }
        }
    }
}

/// Validate, stage, optionally normalize, classify. Every temp file created
/// here is gone by the time this returns, whatever the outcome.
pub async fn analyze_upload(
    ctx: &ApiContext,
    image: UploadedImage,
) -> Result<Classification, AnalyzeError> {
    validate_upload(&image, &ctx.policy)?;

    let ext = extension_of(image.filename.as_deref());
    let ext = if ext.is_empty() { ".bin".to_string() } else { ext };
    let staged = StagedUpload::write(&ctx.policy.uploads_dir, &ext, &image.bytes).await?;
    info!(
        path = %staged.path().display(),
        size_bytes = image.bytes.len(),
        "image staged"
    );

    let normalized = match ctx.policy.normalize_max_side {
        Some(max_side) => Some(normalize(&staged, &ctx.policy.uploads_dir, max_side).await?),
        None => None,
    };
    let input = normalized
        .as_ref()
        .map(StagedUpload::path)
        .unwrap_or_else(|| staged.path());

    let verdict = ctx.classifier.classify(input).await?;
    Ok(verdict)
}

/// Bounded JPEG re-encode of a staged upload. Decode and encode are
/// CPU-bound, so they run off the async worker threads.
async fn normalize(
    staged: &StagedUpload,
    dir: &Path,
    max_side: u32,
) -> Result<StagedUpload, AnalyzeError> {
    let src = staged.path().to_path_buf();
    let encoded = tokio::task::spawn_blocking(move || -> Result<Vec<u8>, UploadError> {
        let decoded = image::open(&src).map_err(|_| UploadError::Undecodable)?;
        let resized = decoded.resize(max_side, max_side, image::imageops::FilterType::Triangle);
        let mut buf = io::Cursor::new(Vec::new());
        resized
            .to_rgb8()
            .write_to(&mut buf, image::ImageFormat::Jpeg)
            .map_err(|_| UploadError::Undecodable)?;
        Ok(buf.into_inner())
    })
    .await
    .map_err(io::Error::other)??;

    Ok(StagedUpload::write(dir, ".jpg", &encoded).await?)
}

fn extension_of(filename: Option<&str>) -> String {
    filename
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_default()
}
