use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::Arc,
};

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use classifier::{ClassifierConfig, ProcessClassifier};
use relay_api::{analyze_upload, AnalyzeError, ApiContext, UploadError, UploadedImage};
use shared::{
    domain::Classification,
    error::ApiError,
    protocol::{HealthResponse, IMAGE_FIELD},
};
use tower_http::{
    cors::CorsLayer,
    services::{ServeDir, ServeFile},
};
use tracing::{error, info, warn};

mod config;

use config::load_settings;

#[derive(Clone)]
struct AppState {
    api: ApiContext,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let settings = load_settings();
    let classifier = ProcessClassifier::new(ClassifierConfig {
        runtime: PathBuf::from(&settings.classifier_runtime),
        script: PathBuf::from(&settings.classifier_script),
    });
    let state = AppState {
        api: ApiContext {
            classifier: Arc::new(classifier),
            policy: settings.upload_policy(),
        },
    };
    let app = build_router(
        Arc::new(state),
        settings.assets_dir.as_deref().map(Path::new),
        settings.max_upload_bytes,
    );

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "relay listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(
    state: Arc<AppState>,
    assets_dir: Option<&Path>,
    max_upload_bytes: u64,
) -> Router {
    let mut app = Router::new()
        .route("/health", get(health))
        .route("/analyze", post(analyze))
        // Headroom over the policy cap so the policy check, not the
        // framework, produces the user-facing message.
        .layer(DefaultBodyLimit::max(max_upload_bytes as usize + 1024 * 1024))
        .layer(CorsLayer::permissive())
        .with_state(state);

    match assets_dir {
        Some(dir) if dir.join("index.html").is_file() => {
            info!(dir = %dir.display(), "serving client assets");
            let index = ServeFile::new(dir.join("index.html"));
            app = app.fallback_service(ServeDir::new(dir).not_found_service(index));
        }
        Some(dir) => {
            warn!(
                dir = %dir.display(),
                "client assets not found; was the client built?"
            );
        }
        None => {}
    }
    app
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}

async fn analyze(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<Classification>, (StatusCode, Json<ApiError>)> {
    while let Some(field) = multipart.next_field().await.map_err(|err| {
        (
            StatusCode::BAD_REQUEST,
            Json(ApiError::with_details(
                "Malformed multipart body",
                err.to_string(),
            )),
        )
    })? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        let filename = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(|err| {
            (
                StatusCode::BAD_REQUEST,
                Json(ApiError::with_details(
                    "Could not read upload",
                    err.to_string(),
                )),
            )
        })?;

        let upload = UploadedImage {
            bytes: bytes.to_vec(),
            filename,
            content_type,
        };
        let verdict = analyze_upload(&state.api, upload)
            .await
            .map_err(reply_error)?;
        return Ok(Json(verdict));
    }

    Err(reply_error(AnalyzeError::Rejected(UploadError::MissingImage)))
}

fn reply_error(err: AnalyzeError) -> (StatusCode, Json<ApiError>) {
    let status = if err.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        error!(%err, "analyze failed");
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(err.to_api_error()))
}
