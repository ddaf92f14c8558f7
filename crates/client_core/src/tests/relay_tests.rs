use axum::{
    extract::Multipart,
    http::{header, StatusCode},
    routing::post,
    Router,
};
use tokio::net::TcpListener;

use crate::relay::{
    AnalyzeBackend, AnalyzeOutcome, ImageUpload, RelayClient, RelayError, MAX_DETAIL_CHARS,
};

const VERDICT_BODY: &str =
    r#"{"class":"defective","confidence":0.93,"probs":{"defective":0.93,"good":0.07}}"#;

async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve");
    });
    format!("http://{addr}")
}

fn upload() -> ImageUpload {
    ImageUpload {
        bytes: vec![0xff, 0xd8, 0xff],
        filename: "tyre.jpg".to_string(),
        mime_type: Some("image/jpeg".to_string()),
    }
}

fn rejected(outcome: AnalyzeOutcome) -> (String, Option<String>) {
    match outcome {
        AnalyzeOutcome::Rejected { message, details } => (message, details),
        other => panic!("expected a rejected outcome, got {other:?}"),
    }
}

#[tokio::test]
async fn posts_the_image_under_the_fixed_field_name() {
    let router = Router::new().route(
        "/analyze",
        post(|mut multipart: Multipart| async move {
            let field = multipart
                .next_field()
                .await
                .expect("multipart")
                .expect("one field");
            assert_eq!(field.name(), Some("image"));
            assert_eq!(field.file_name(), Some("tyre.jpg"));
            let bytes = field.bytes().await.expect("bytes");
            assert_eq!(&bytes[..], &[0xff, 0xd8, 0xff]);
            ([(header::CONTENT_TYPE, "application/json")], VERDICT_BODY)
        }),
    );
    let client = RelayClient::new(serve(router).await);

    let outcome = client.analyze(upload()).await.expect("outcome");
    match outcome {
        AnalyzeOutcome::Classified(verdict) => {
            assert_eq!(verdict.label, "defective");
            assert_eq!(verdict.confidence, 0.93);
            assert_eq!(
                verdict.probabilities.as_ref().and_then(|p| p.get("good")),
                Some(&0.07)
            );
        }
        other => panic!("expected a classification, got {other:?}"),
    }
}

#[tokio::test]
async fn error_statuses_become_rejected_outcomes() {
    let router = Router::new().route(
        "/analyze",
        post(|| async {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, "application/json")],
                r#"{"error":"boom"}"#,
            )
        }),
    );
    let client = RelayClient::new(serve(router).await);

    let (message, details) = rejected(client.analyze(upload()).await.expect("outcome"));
    assert_eq!(message, "HTTP 500");
    assert!(details.expect("details").contains("boom"));
}

#[tokio::test]
async fn non_json_success_is_rejected_with_bounded_details() {
    let router = Router::new().route(
        "/analyze",
        post(|| async {
            (
                [(header::CONTENT_TYPE, "text/html")],
                format!("<html>{}</html>", "x".repeat(1000)),
            )
        }),
    );
    let client = RelayClient::new(serve(router).await);

    let (message, details) = rejected(client.analyze(upload()).await.expect("outcome"));
    assert_eq!(message, "Non-JSON response");
    let details = details.expect("details");
    assert_eq!(details.chars().count(), MAX_DETAIL_CHARS);
    assert!(details.starts_with("<html>"));
}

#[tokio::test]
async fn embedded_errors_in_success_bodies_are_rejected() {
    let router = Router::new().route(
        "/analyze",
        post(|| async {
            (
                [(header::CONTENT_TYPE, "application/json")],
                r#"{"error":"Cannot read image file. Invalid or corrupted image.","details":"PIL says no"}"#,
            )
        }),
    );
    let client = RelayClient::new(serve(router).await);

    let (message, details) = rejected(client.analyze(upload()).await.expect("outcome"));
    assert_eq!(message, "Cannot read image file. Invalid or corrupted image.");
    assert_eq!(details.as_deref(), Some("PIL says no"));
}

#[tokio::test]
async fn unexpected_shapes_are_rejected_not_thrown() {
    let router = Router::new().route(
        "/analyze",
        post(|| async { ([(header::CONTENT_TYPE, "application/json")], r#"{"status":"ok"}"#) }),
    );
    let client = RelayClient::new(serve(router).await);

    let (message, _) = rejected(client.analyze(upload()).await.expect("outcome"));
    assert_eq!(message, "Unexpected response shape");
}

#[tokio::test]
async fn out_of_range_confidence_is_an_unexpected_shape() {
    let router = Router::new().route(
        "/analyze",
        post(|| async {
            (
                [(header::CONTENT_TYPE, "application/json")],
                r#"{"class":"defective","confidence":93.0}"#,
            )
        }),
    );
    let client = RelayClient::new(serve(router).await);

    let (message, _) = rejected(client.analyze(upload()).await.expect("outcome"));
    assert_eq!(message, "Unexpected response shape");
}

#[tokio::test]
async fn only_an_unreachable_relay_is_an_error() {
    // discard port: nothing listens there
    let client = RelayClient::new("http://127.0.0.1:9");
    let err = client.analyze(upload()).await.expect_err("unreachable");
    assert!(matches!(err, RelayError::Unreachable(_)));
}
