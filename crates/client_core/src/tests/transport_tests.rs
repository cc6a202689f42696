use super::*;
use axum::{
    extract::{Multipart, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use shared::domain::Statistics;
use std::sync::Arc;
use tokio::{net::TcpListener, sync::Mutex};

#[derive(Debug, Clone, Default)]
struct ReceivedPart {
    name: String,
    file_name: Option<String>,
    content_type: Option<String>,
    bytes: Vec<u8>,
}

#[derive(Clone)]
struct ServiceState {
    extraction_reply: (StatusCode, String),
    export_reply: (StatusCode, Vec<u8>),
    parts: Arc<Mutex<Vec<ReceivedPart>>>,
    exported_texts: Arc<Mutex<Vec<String>>>,
    export_accept: Arc<Mutex<Option<String>>>,
}

impl ServiceState {
    fn new(extraction_reply: (StatusCode, &str), export_reply: (StatusCode, &[u8])) -> Self {
        Self {
            extraction_reply: (extraction_reply.0, extraction_reply.1.to_string()),
            export_reply: (export_reply.0, export_reply.1.to_vec()),
            parts: Arc::new(Mutex::new(Vec::new())),
            exported_texts: Arc::new(Mutex::new(Vec::new())),
            export_accept: Arc::new(Mutex::new(None)),
        }
    }
}

async fn handle_process_image(
    State(state): State<ServiceState>,
    mut multipart: Multipart,
) -> Response {
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map(|b| b.to_vec()).unwrap_or_default();
        state.parts.lock().await.push(ReceivedPart {
            name,
            file_name,
            content_type,
            bytes,
        });
    }
    let (status, body) = state.extraction_reply.clone();
    (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
}

async fn handle_download_docx(
    State(state): State<ServiceState>,
    headers: HeaderMap,
    Json(request): Json<DownloadDocxRequest>,
) -> Response {
    *state.export_accept.lock().await = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    state.exported_texts.lock().await.push(request.text);
    let (status, body) = state.export_reply.clone();
    (status, body).into_response()
}

async fn spawn_service(state: ServiceState) -> anyhow::Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = Router::new()
        .route(PROCESS_IMAGE_PATH, post(handle_process_image))
        .route(DOWNLOAD_DOCX_PATH, post(handle_download_docx))
        .with_state(state);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("http://{addr}"))
}

const HELLO_BODY: &str = r#"{"text":"hello world.","stats":{"word_count":2,"sentence_count":1,"char_count":12,"avg_word_length":5.0}}"#;

fn png_upload() -> ImageUpload {
    ImageUpload::new("scan.png", vec![0x89, b'P', b'N', b'G']).with_mime_type("image/png")
}

#[tokio::test]
async fn sends_image_as_single_file_part() {
    let state = ServiceState::new((StatusCode::OK, HELLO_BODY), (StatusCode::OK, b""));
    let parts = Arc::clone(&state.parts);
    let server_url = spawn_service(state).await.expect("spawn service");
    let backend = HttpProcessingBackend::new(server_url);

    let response = backend
        .process_image(&png_upload())
        .await
        .expect("extraction");
    assert_eq!(response.text, "hello world.");
    assert_eq!(response.stats, Statistics::new(2, 1, 12, 5.0));

    let parts = parts.lock().await;
    assert_eq!(parts.len(), 1);
    assert_eq!(parts[0].name, IMAGE_FIELD_NAME);
    assert_eq!(parts[0].file_name.as_deref(), Some("scan.png"));
    assert_eq!(parts[0].content_type.as_deref(), Some("image/png"));
    assert_eq!(parts[0].bytes, vec![0x89, b'P', b'N', b'G']);
}

#[tokio::test]
async fn unknown_mime_type_is_sent_as_octet_stream() {
    let state = ServiceState::new((StatusCode::OK, HELLO_BODY), (StatusCode::OK, b""));
    let parts = Arc::clone(&state.parts);
    let server_url = spawn_service(state).await.expect("spawn service");
    let backend = HttpProcessingBackend::new(server_url);

    backend
        .process_image(&ImageUpload::new("blob", vec![1, 2, 3]))
        .await
        .expect("extraction");

    let parts = parts.lock().await;
    assert_eq!(
        parts[0].content_type.as_deref(),
        Some("application/octet-stream")
    );
}

#[tokio::test]
async fn trailing_slash_in_server_url_is_ignored() {
    let state = ServiceState::new((StatusCode::OK, HELLO_BODY), (StatusCode::OK, b""));
    let server_url = spawn_service(state).await.expect("spawn service");
    let backend = HttpProcessingBackend::new(format!("{server_url}/"));
    assert_eq!(backend.server_url(), server_url);

    backend
        .process_image(&png_upload())
        .await
        .expect("extraction");
}

#[tokio::test]
async fn non_success_status_carries_service_error_detail() {
    let state = ServiceState::new(
        (StatusCode::BAD_REQUEST, r#"{"error":"No file uploaded"}"#),
        (StatusCode::OK, b""),
    );
    let server_url = spawn_service(state).await.expect("spawn service");
    let backend = HttpProcessingBackend::new(server_url);

    let err = backend
        .process_image(&png_upload())
        .await
        .expect_err("400 must fail");
    match err {
        ExtractionError::Status(exception) => {
            assert_eq!(exception.status, 400);
            assert_eq!(exception.message, "No file uploaded");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn body_without_stats_is_malformed() {
    let state = ServiceState::new(
        (StatusCode::OK, r#"{"text":"orphan"}"#),
        (StatusCode::OK, b""),
    );
    let server_url = spawn_service(state).await.expect("spawn service");
    let backend = HttpProcessingBackend::new(server_url);

    let err = backend
        .process_image(&png_upload())
        .await
        .expect_err("missing stats must fail");
    assert!(matches!(err, ExtractionError::Malformed { .. }), "{err:?}");
}

#[tokio::test]
async fn negative_average_word_length_is_malformed() {
    let state = ServiceState::new(
        (
            StatusCode::OK,
            r#"{"text":"x","stats":{"word_count":1,"sentence_count":1,"char_count":1,"avg_word_length":-2.0}}"#,
        ),
        (StatusCode::OK, b""),
    );
    let server_url = spawn_service(state).await.expect("spawn service");
    let backend = HttpProcessingBackend::new(server_url);

    let err = backend
        .process_image(&png_upload())
        .await
        .expect_err("negative average must fail");
    assert!(matches!(err, ExtractionError::Malformed { .. }), "{err:?}");
}

#[tokio::test]
async fn unreachable_service_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    let backend = HttpProcessingBackend::new(format!("http://{addr}"));

    let err = backend
        .process_image(&png_upload())
        .await
        .expect_err("closed port must fail");
    assert!(matches!(err, ExtractionError::Transport(_)), "{err:?}");
}

#[tokio::test]
async fn export_posts_text_and_returns_document_bytes() {
    let state = ServiceState::new(
        (StatusCode::OK, HELLO_BODY),
        (StatusCode::OK, b"PK\x03\x04docx"),
    );
    let exported_texts = Arc::clone(&state.exported_texts);
    let export_accept = Arc::clone(&state.export_accept);
    let server_url = spawn_service(state).await.expect("spawn service");
    let backend = HttpProcessingBackend::new(server_url);

    let bytes = backend.download_docx("edited text").await.expect("export");
    assert_eq!(bytes, b"PK\x03\x04docx".to_vec());
    assert_eq!(*exported_texts.lock().await, vec!["edited text".to_string()]);
    assert_eq!(export_accept.lock().await.as_deref(), Some(DOCX_MIME_TYPE));
}

#[tokio::test]
async fn export_failure_status_is_reported() {
    let state = ServiceState::new(
        (StatusCode::OK, HELLO_BODY),
        (StatusCode::INTERNAL_SERVER_ERROR, b"renderer crashed"),
    );
    let server_url = spawn_service(state).await.expect("spawn service");
    let backend = HttpProcessingBackend::new(server_url);

    let err = backend
        .download_docx("text")
        .await
        .expect_err("500 must fail");
    match err {
        ExportError::Status(exception) => {
            assert_eq!(exception.status, 500);
            assert_eq!(exception.message, "renderer crashed");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn empty_export_body_is_rejected() {
    let state = ServiceState::new((StatusCode::OK, HELLO_BODY), (StatusCode::OK, b""));
    let server_url = spawn_service(state).await.expect("spawn service");
    let backend = HttpProcessingBackend::new(server_url);

    let err = backend
        .download_docx("text")
        .await
        .expect_err("empty body must fail");
    assert!(matches!(err, ExportError::EmptyDocument), "{err:?}");
}
