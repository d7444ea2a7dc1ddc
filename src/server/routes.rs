//! HTTP routes and router assembly.

use crate::audio::{decode, wav};
use crate::rtc::TokenIssuer;
use crate::server::{AppState, ws};
use axum::Router;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Uploads above this size are rejected outright.
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/api/health", get(health))
        .route("/api/livekit/token", post(issue_token))
        .route("/api/status/mic", post(mic_status))
        .route("/transcribe", post(transcribe_upload))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

type ApiError = (StatusCode, Json<Value>);

fn error_response(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(json!({ "error": message.into() })))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "whisper_loaded": state.engine.is_ready(),
        "model": state.engine.model_name(),
        "livekit_available": state.config.rtc.is_configured(),
        "websocket_mode": true,
    }))
}

#[derive(Debug, Deserialize)]
struct TokenRequest {
    room_name: String,
    participant_name: String,
}

async fn issue_token(
    State(state): State<AppState>,
    Json(request): Json<TokenRequest>,
) -> Result<Json<Value>, ApiError> {
    let rtc = &state.config.rtc;
    let (Some(url), Some(api_key), Some(api_secret)) = (&rtc.url, &rtc.api_key, &rtc.api_secret)
    else {
        return Err(error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "media server not configured",
        ));
    };

    let issuer = TokenIssuer::new(api_key, api_secret, rtc.token_ttl_secs);
    let token = issuer
        .issue(&request.room_name, &request.participant_name)
        .map_err(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    info!(room = %request.room_name, participant = %request.participant_name, "token issued");
    Ok(Json(json!({ "token": token, "livekit_url": url })))
}

/// Client-side microphone state reports, kept for the session audit trail.
async fn mic_status(Json(payload): Json<Value>) -> Json<Value> {
    info!(payload = %payload, "mic status report");
    Json(json!({ "status": "logged" }))
}

/// One-shot transcription of an uploaded file.
async fn transcribe_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let Some(transcriber) = state.engine.get() else {
        return Err(error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "transcription model still loading",
        ));
    };

    let mut upload: Option<(Vec<u8>, Option<String>)> = None;
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        error_response(StatusCode::BAD_REQUEST, format!("invalid multipart body: {}", e))
    })? {
        if field.name() == Some("file") {
            let extension = field
                .file_name()
                .and_then(|name| name.rsplit('.').next().map(|ext| ext.to_lowercase()));
            let bytes = field.bytes().await.map_err(|e| {
                error_response(StatusCode::BAD_REQUEST, format!("upload read failed: {}", e))
            })?;
            upload = Some((bytes.to_vec(), extension));
        }
    }
    let Some((bytes, extension)) = upload else {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "missing 'file' field",
        ));
    };
    if bytes.is_empty() {
        return Err(error_response(StatusCode::BAD_REQUEST, "empty upload"));
    }

    let language = state.config.stt.language.clone();
    let result = tokio::task::spawn_blocking(move || {
        // WAV skips the general container probe
        let samples = if wav::looks_like_wav(&bytes) {
            wav::read_wav(std::io::Cursor::new(bytes))?.into_inference_samples()
        } else {
            let decoded = decode::decode_bytes(&bytes, extension.as_deref())?;
            crate::audio::resample::prepare_for_inference(
                &decoded.samples,
                decoded.channels,
                decoded.sample_rate,
            )
        };
        let duration_ms = samples.len() as u64 * 1000 / crate::defaults::SAMPLE_RATE as u64;
        transcriber
            .transcribe(&samples, &language)
            .map(|r| (r, duration_ms))
    })
    .await
    .map_err(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    match result {
        Ok((result, duration_ms)) => Ok(Json(json!({
            "text": result.text,
            "language": result.language,
            "confidence": result.confidence,
            "duration_ms": duration_ms,
        }))),
        Err(e) => {
            warn!(error = %e, "upload transcription failed");
            Err(error_response(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::stt::{MockTranscriber, SharedEngine};
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app(config: Config, engine: SharedEngine) -> Router {
        router(AppState::new(config, engine))
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_reports_engine_state() {
        let app = app(Config::default(), SharedEngine::empty());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["whisper_loaded"], false);
        assert_eq!(json["livekit_available"], false);
        assert_eq!(json["websocket_mode"], true);
    }

    #[tokio::test]
    async fn health_shows_loaded_model() {
        let engine = SharedEngine::preloaded(Arc::new(MockTranscriber::new("base")));
        let app = app(Config::default(), engine);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let json = body_json(response).await;
        assert_eq!(json["whisper_loaded"], true);
        assert_eq!(json["model"], "base");
    }

    #[tokio::test]
    async fn token_unavailable_without_credentials() {
        let app = app(Config::default(), SharedEngine::empty());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/livekit/token")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        r#"{"room_name":"exam","participant_name":"alice"}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn token_issued_with_credentials() {
        let mut config = Config::default();
        config.rtc.url = Some("wss://media.example.com".to_string());
        config.rtc.api_key = Some("key".to_string());
        config.rtc.api_secret = Some("secret".to_string());

        let app = app(config, SharedEngine::empty());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/livekit/token")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        r#"{"room_name":"exam","participant_name":"alice"}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["livekit_url"], "wss://media.example.com");
        assert_eq!(json["token"].as_str().unwrap().split('.').count(), 3);
    }

    #[tokio::test]
    async fn mic_status_acknowledges() {
        let app = app(Config::default(), SharedEngine::empty());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/status/mic")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"enabled":false}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "logged");
    }

    #[tokio::test]
    async fn transcribe_unavailable_before_model_loads() {
        let app = app(Config::default(), SharedEngine::empty());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/transcribe")
                    .header("content-type", "multipart/form-data; boundary=XBOUNDARY")
                    .body(Body::from(multipart_body(b"anything", "clip.wav")))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    fn multipart_body(file_bytes: &[u8], filename: &str) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(b"--XBOUNDARY\r\n");
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
                filename
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(file_bytes);
        body.extend_from_slice(b"\r\n--XBOUNDARY--\r\n");
        body
    }

    fn wav_fixture() -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = std::io::Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for i in 0..16000 {
                writer
                    .write_sample(if i % 2 == 0 { 8000i16 } else { -8000 })
                    .unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[tokio::test]
    async fn transcribe_returns_text_for_wav_upload() {
        let engine = SharedEngine::preloaded(Arc::new(
            MockTranscriber::new("base").with_response("uploaded speech"),
        ));
        let app = app(Config::default(), engine);
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/transcribe")
                    .header("content-type", "multipart/form-data; boundary=XBOUNDARY")
                    .body(Body::from(multipart_body(&wav_fixture(), "clip.wav")))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["text"], "uploaded speech");
        assert_eq!(json["duration_ms"], 1000);
    }

    #[tokio::test]
    async fn transcribe_rejects_undecodable_upload() {
        let engine = SharedEngine::preloaded(Arc::new(MockTranscriber::new("base")));
        let app = app(Config::default(), engine);
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/transcribe")
                    .header("content-type", "multipart/form-data; boundary=XBOUNDARY")
                    .body(Body::from(multipart_body(b"\xde\xad\xbe\xef", "clip.bin")))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn transcribe_rejects_missing_file_field() {
        let engine = SharedEngine::preloaded(Arc::new(MockTranscriber::new("base")));
        let app = app(Config::default(), engine);
        let body = b"--XBOUNDARY\r\nContent-Disposition: form-data; name=\"other\"\r\n\r\nx\r\n--XBOUNDARY--\r\n";
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/transcribe")
                    .header("content-type", "multipart/form-data; boundary=XBOUNDARY")
                    .body(Body::from(body.to_vec()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
