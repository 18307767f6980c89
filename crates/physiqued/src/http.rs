use std::sync::Arc;
use std::time::Duration;

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use physique_core::AnalysisReport;
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::config::Config;
use crate::engine::{EngineError, EngineHandle};

/// Multipart field carrying the uploaded image.
const UPLOAD_FIELD: &str = "file";

/// Static facts reported by `GET /status`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusInfo {
    pub version: &'static str,
    pub model: String,
    pub listen_addr: String,
    pub min_pose_score: f32,
    pub exclude_lower_body: bool,
}

impl StatusInfo {
    pub fn from_config(config: &Config) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            model: config.model_path().display().to_string(),
            listen_addr: config.listen_addr.clone(),
            min_pose_score: config.min_pose_score,
            exclude_lower_body: config.exclude_lower_body,
        }
    }
}

/// Shared state for request handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: EngineHandle,
    pub status: Arc<StatusInfo>,
    pub analyze_timeout: Duration,
}

impl AppState {
    pub fn new(engine: EngineHandle, config: &Config) -> Self {
        Self {
            engine,
            status: Arc::new(StatusInfo::from_config(config)),
            analyze_timeout: Duration::from_secs(config.analyze_timeout_secs),
        }
    }
}

/// Failure of one `/analyze` request.
#[derive(Debug)]
pub enum ApiError {
    NoFile,
    Multipart(MultipartError),
    Engine(EngineError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NoFile => StatusCode::BAD_REQUEST,
            ApiError::Multipart(e) => e.status(),
            ApiError::Engine(EngineError::Decode(_)) => StatusCode::BAD_REQUEST,
            ApiError::Engine(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> String {
        match self {
            ApiError::NoFile => "No file uploaded".to_string(),
            ApiError::Multipart(e) => e.body_text(),
            ApiError::Engine(e) => e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.message() }))).into_response()
    }
}

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/analyze", post(analyze))
        .route("/status", get(status))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

async fn status(State(state): State<AppState>) -> Json<StatusInfo> {
    Json(state.status.as_ref().clone())
}

async fn analyze(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<AnalysisReport>, ApiError> {
    let id = Uuid::new_v4();
    // A body that is not multipart/form-data cannot carry a file
    let multipart = multipart.map_err(|e| {
        tracing::info!(request_id = %id, error = %e, "analyze: not a multipart body");
        ApiError::NoFile
    })?;
    let upload = read_upload(multipart).await.map_err(|e| {
        tracing::warn!(request_id = %id, error = %e, "analyze: bad multipart body");
        ApiError::Multipart(e)
    })?;

    let report = analyze_upload(&state, id, upload).await?;
    Ok(Json(report))
}

/// Pull the bytes of the `file` field, if any.
async fn read_upload(mut multipart: Multipart) -> Result<Option<Vec<u8>>, MultipartError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some(UPLOAD_FIELD) {
            return Ok(Some(field.bytes().await?.to_vec()));
        }
    }
    Ok(None)
}

/// Run one uploaded image through the engine.
pub async fn analyze_upload(
    state: &AppState,
    id: Uuid,
    upload: Option<Vec<u8>>,
) -> Result<AnalysisReport, ApiError> {
    let Some(image) = upload.filter(|bytes| !bytes.is_empty()) else {
        tracing::info!(request_id = %id, "analyze: no file uploaded");
        return Err(ApiError::NoFile);
    };

    tracing::info!(request_id = %id, bytes = image.len(), "analyze requested");

    state
        .engine
        .analyze(id, image, state.analyze_timeout)
        .await
        .map_err(|e| {
            match &e {
                EngineError::Decode(_) => {
                    tracing::info!(request_id = %id, error = %e, "analyze rejected")
                }
                _ => tracing::error!(request_id = %id, error = %e, "analyze failed"),
            }
            ApiError::Engine(e)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::spawn_engine;
    use crate::engine::tests::{png_bytes, standing_pose, ScriptedDetector};
    use physique_core::ReportOptions;

    fn state_with(detector: ScriptedDetector) -> AppState {
        let engine = spawn_engine(Box::new(detector), ReportOptions::default());
        AppState::new(engine, &Config::default())
    }

    #[tokio::test]
    async fn missing_file_is_bad_request() {
        let state = state_with(ScriptedDetector::returning(None));

        let err = analyze_upload(&state, Uuid::new_v4(), None).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.message(), "No file uploaded");

        let err = analyze_upload(&state, Uuid::new_v4(), Some(Vec::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NoFile));
    }

    #[tokio::test]
    async fn undecodable_upload_is_bad_request() {
        let state = state_with(ScriptedDetector::returning(None));
        let err = analyze_upload(&state, Uuid::new_v4(), Some(b"GIF89a?".to_vec()))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(err.message().starts_with("failed to decode image"));
    }

    #[tokio::test]
    async fn detector_failure_is_server_error() {
        let mut detector = ScriptedDetector::returning(None);
        detector.fail = true;
        let state = state_with(detector);
        let err = analyze_upload(&state, Uuid::new_v4(), Some(png_bytes()))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn upload_produces_report() {
        let state = state_with(ScriptedDetector::returning(Some(standing_pose())));
        let report = analyze_upload(&state, Uuid::new_v4(), Some(png_bytes()))
            .await
            .unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["body_width"]["body_shape"], "Inverted Triangle");
        assert_eq!(json["model_accuracy"]["key_landmarks_detected"], 5);
    }

    #[test]
    fn status_reflects_config() {
        let config = Config {
            listen_addr: "127.0.0.1:5050".into(),
            exclude_lower_body: true,
            ..Config::default()
        };
        let info = StatusInfo::from_config(&config);
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["listen_addr"], "127.0.0.1:5050");
        assert_eq!(json["exclude_lower_body"], true);
        assert!(json["model"]
            .as_str()
            .unwrap()
            .ends_with("movenet_singlepose_lightning.onnx"));
    }

    // Router-level tests: real listener, raw HTTP/1.1 requests.

    use std::net::SocketAddr;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    const BOUNDARY: &str = "physique-test-boundary";

    async fn serve(state: AppState, max_upload_bytes: usize) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(state, max_upload_bytes))
                .await
                .unwrap();
        });
        addr
    }

    /// Send one request and return the status code and JSON body.
    async fn request(
        addr: SocketAddr,
        method: &str,
        path: &str,
        content_type: Option<&str>,
        body: &[u8],
    ) -> (u16, serde_json::Value) {
        let mut head = format!(
            "{method} {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\
             Content-Length: {}\r\n",
            body.len()
        );
        if let Some(ct) = content_type {
            head.push_str(&format!("Content-Type: {ct}\r\n"));
        }
        head.push_str("\r\n");

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream.write_all(head.as_bytes()).await.unwrap();
        stream.write_all(body).await.unwrap();

        let mut raw = Vec::new();
        stream.read_to_end(&mut raw).await.unwrap();
        let text = String::from_utf8_lossy(&raw);

        let status = text[9..12].parse().unwrap();
        let body = text.split_once("\r\n\r\n").map(|(_, b)| b).unwrap_or("");
        (status, serde_json::from_str(body).unwrap_or(serde_json::Value::Null))
    }

    fn multipart_body(fields: &[(&str, &[u8])]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, data) in fields {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; \
                     filename=\"{name}.bin\"\r\nContent-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn multipart_type() -> String {
        format!("multipart/form-data; boundary={BOUNDARY}")
    }

    #[tokio::test]
    async fn router_analyzes_file_field() {
        let state = state_with(ScriptedDetector::returning(Some(standing_pose())));
        let addr = serve(state, 16 * 1024 * 1024).await;

        let png = png_bytes();
        let body = multipart_body(&[("note", b"ignored".as_slice()), ("file", png.as_slice())]);
        let (status, json) =
            request(addr, "POST", "/analyze", Some(&multipart_type()), &body).await;

        assert_eq!(status, 200);
        assert_eq!(json["body_width"]["body_shape"], "Inverted Triangle");
        assert_eq!(json["skin_color"]["rgb"], json!([198, 134, 66]));
    }

    #[tokio::test]
    async fn router_without_file_field_is_no_file() {
        let state = state_with(ScriptedDetector::returning(None));
        let addr = serve(state, 16 * 1024 * 1024).await;

        let body = multipart_body(&[("image", b"not the file field".as_slice())]);
        let (status, json) =
            request(addr, "POST", "/analyze", Some(&multipart_type()), &body).await;

        assert_eq!(status, 400);
        assert_eq!(json, json!({ "error": "No file uploaded" }));
    }

    #[tokio::test]
    async fn router_non_multipart_post_is_no_file() {
        let state = state_with(ScriptedDetector::returning(None));
        let addr = serve(state, 16 * 1024 * 1024).await;

        let (status, json) = request(addr, "POST", "/analyze", None, b"").await;
        assert_eq!(status, 400);
        assert_eq!(json, json!({ "error": "No file uploaded" }));

        let (status, json) =
            request(addr, "POST", "/analyze", Some("application/json"), b"{}").await;
        assert_eq!(status, 400);
        assert_eq!(json, json!({ "error": "No file uploaded" }));
    }

    #[tokio::test]
    async fn router_rejects_oversized_upload() {
        let state = state_with(ScriptedDetector::returning(None));
        let addr = serve(state, 1024).await;

        let big = vec![0u8; 3000];
        let body = multipart_body(&[("file", big.as_slice())]);
        let (status, json) =
            request(addr, "POST", "/analyze", Some(&multipart_type()), &body).await;

        assert_eq!(status, 413);
        assert!(json["error"].is_string());
    }

    #[tokio::test]
    async fn router_serves_status() {
        let state = state_with(ScriptedDetector::returning(None));
        let addr = serve(state, 1024).await;

        let (status, json) = request(addr, "GET", "/status", None, b"").await;
        assert_eq!(status, 200);
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
        assert_eq!(json["listen_addr"], "0.0.0.0:5000");
    }
}
