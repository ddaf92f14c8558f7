use std::{path::PathBuf, process::ExitCode, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use client_core::{
    derive_view, CaptureController, PreviewRegistry, RelayClient, ScanState, ScanStore,
    UnsupportedCamera,
};

/// Run one scan attempt against a running relay from the terminal.
#[derive(Parser, Debug)]
struct Args {
    #[arg(long, default_value = "http://127.0.0.1:3000")]
    server_url: String,
    /// Image file to submit (the terminal has no camera; the flow falls
    /// back to upload mode).
    #[arg(long)]
    image: PathBuf,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt().init();
    let args = Args::parse();

    let store = Arc::new(ScanStore::new());
    let previews = Arc::new(PreviewRegistry::new());
    let relay = Arc::new(RelayClient::new(args.server_url.clone()));
    let controller = CaptureController::new(
        Arc::clone(&store),
        Arc::clone(&previews),
        relay,
        Arc::new(UnsupportedCamera),
    );

    let _subscription = store.subscribe(|state: &ScanState| {
        println!("view: {:?}", derive_view(state));
        match state {
            ScanState::Processing { image } => println!("analyzing {image}..."),
            ScanState::Result { classification, .. } => {
                println!(
                    "verdict: {} (confidence {:.1}%)",
                    classification.label,
                    classification.confidence * 100.0
                );
                if let Some(probs) = &classification.probabilities {
                    let mut entries: Vec<_> = probs.iter().collect();
                    entries.sort_by(|a, b| b.1.total_cmp(a.1));
                    for (label, prob) in entries {
                        println!("  {label}: {:.1}%", prob * 100.0);
                    }
                }
            }
            ScanState::Error {
                message, details, ..
            } => {
                println!("error: {message}");
                if let Some(details) = details {
                    println!("  {details}");
                }
            }
            _ => {}
        }
    });

    let bytes = std::fs::read(&args.image)
        .with_context(|| format!("could not read {}", args.image.display()))?;
    let filename = args
        .image
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("upload.bin")
        .to_string();
    let mime_type = match args.image.extension().and_then(|ext| ext.to_str()) {
        Some("jpg") | Some("jpeg") => Some("image/jpeg".to_string()),
        Some("png") => Some("image/png".to_string()),
        Some("webp") => Some("image/webp".to_string()),
        Some("gif") => Some("image/gif".to_string()),
        Some("bmp") => Some("image/bmp".to_string()),
        _ => None,
    };

    controller.enter_camera().await;
    controller.select_file(bytes, filename, mime_type).await;

    let failed = matches!(store.snapshot(), ScanState::Error { .. });
    controller.leave().await;
    Ok(if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
