use std::{collections::HashMap, fs, path::PathBuf};

use relay_api::UploadPolicy;

const DEFAULT_MAX_UPLOAD_BYTES: u64 = 20 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct Settings {
    pub server_bind: String,
    pub classifier_runtime: String,
    pub classifier_script: String,
    pub uploads_dir: String,
    pub assets_dir: Option<String>,
    pub max_upload_bytes: u64,
    pub normalize_max_side: Option<u32>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "0.0.0.0:3000".into(),
            classifier_runtime: default_runtime(),
            classifier_script: "predict.py".into(),
            uploads_dir: "./uploads".into(),
            assets_dir: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            normalize_max_side: None,
        }
    }
}

impl Settings {
    pub fn upload_policy(&self) -> UploadPolicy {
        UploadPolicy {
            uploads_dir: PathBuf::from(&self.uploads_dir),
            max_upload_bytes: self.max_upload_bytes,
            normalize_max_side: self.normalize_max_side,
        }
    }
}

/// Prefer a project-local virtualenv interpreter when one exists.
fn default_runtime() -> String {
    let venv = PathBuf::from(".venv/bin/python3");
    if venv.is_file() {
        venv.display().to_string()
    } else {
        "python3".into()
    }
}

/// Defaults, overridden by `relay.toml`, overridden by the environment.
pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("relay.toml") {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(&raw) {
            apply_file_values(&mut settings, &file_cfg);
        }
    }

    if let Ok(v) = std::env::var("PORT") {
        if let Ok(port) = v.parse::<u16>() {
            settings.server_bind = format!("0.0.0.0:{port}");
        }
    }
    if let Ok(v) = std::env::var("RELAY_BIND") {
        settings.server_bind = v;
    }
    if let Ok(v) = std::env::var("PYTHON_BIN") {
        settings.classifier_runtime = v;
    }
    if let Ok(v) = std::env::var("PREDICT_SCRIPT") {
        settings.classifier_script = v;
    }
    if let Ok(v) = std::env::var("UPLOADS_DIR") {
        settings.uploads_dir = v;
    }
    if let Ok(v) = std::env::var("CLIENT_DIST") {
        settings.assets_dir = Some(v);
    }
    if let Ok(v) = std::env::var("MAX_UPLOAD_BYTES") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.max_upload_bytes = parsed;
        }
    }
    if let Ok(v) = std::env::var("NORMALIZE_MAX_SIDE") {
        if let Ok(parsed) = v.parse::<u32>() {
            settings.normalize_max_side = Some(parsed);
        }
    }

    settings
}

fn apply_file_values(settings: &mut Settings, file_cfg: &HashMap<String, String>) {
    if let Some(v) = file_cfg.get("bind_addr") {
        settings.server_bind = v.clone();
    }
    if let Some(v) = file_cfg.get("classifier_runtime") {
        settings.classifier_runtime = v.clone();
    }
    if let Some(v) = file_cfg.get("classifier_script") {
        settings.classifier_script = v.clone();
    }
    if let Some(v) = file_cfg.get("uploads_dir") {
        settings.uploads_dir = v.clone();
    }
    if let Some(v) = file_cfg.get("assets_dir") {
        settings.assets_dir = Some(v.clone());
    }
    if let Some(v) = file_cfg.get("max_upload_bytes") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.max_upload_bytes = parsed;
        }
    }
    if let Some(v) = file_cfg.get("normalize_max_side") {
        if let Ok(parsed) = v.parse::<u32>() {
            settings.normalize_max_side = Some(parsed);
        }
    }
}
