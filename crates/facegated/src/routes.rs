//! HTTP surface of the daemon.
//!
//! Endpoints:
//! - POST /recognize-face — identify one photo against the gallery
//! - POST /compare-faces  — verify an enrolled photo against a check-in photo
//! - POST /refresh-faces  — rebuild the gallery from the asset library
//! - GET  /status         — service health and gallery state

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::{AllowOrigin, CorsLayer};

use facegate_core::decode;
use facegate_core::GalleryStatus;

use crate::engine::{EngineError, FaceEngine, IdentifyOutcome, VerifyOutcome};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<FaceEngine>,
    pub fetcher: PhotoFetcher,
}

/// Downloads photos referenced by URL in verification requests.
#[derive(Clone)]
pub struct PhotoFetcher {
    http: reqwest::Client,
}

impl PhotoFetcher {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http: reqwest::Client::builder().timeout(timeout).build()?,
        })
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, reqwest::Error> {
        let response = self.http.get(url).send().await?.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }
}

pub fn router(state: AppState, cors: CorsLayer, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/recognize-face", post(recognize_face))
        .route("/compare-faces", post(compare_faces))
        .route("/refresh-faces", post(refresh_faces))
        .route("/status", get(status))
        .layer(cors)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}

/// CORS for the browser frontends allowed to call this service.
/// Credentials are allowed, so the origin list must stay explicit.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring unparsable allowed origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true)
}

#[derive(Deserialize)]
struct RecognizeRequest {
    image: Option<String>,
}

#[derive(Serialize)]
struct MemberInfo {
    name: String,
    #[serde(rename = "lastVisit")]
    last_visit: DateTime<Utc>,
}

async fn recognize_face(
    State(state): State<AppState>,
    Json(request): Json<RecognizeRequest>,
) -> Response {
    let Some(image) = request.image.filter(|s| !s.is_empty()) else {
        return message_reply(StatusCode::BAD_REQUEST, "No image provided");
    };

    let Ok(bytes) = decode_base64_image(&image) else {
        return message_reply(StatusCode::UNSUPPORTED_MEDIA_TYPE, "Invalid image data");
    };
    let probe = match decode::decode_rgb(&bytes) {
        Ok(probe) => probe,
        Err(err) => {
            tracing::debug!(error = %err, "probe image undecodable");
            return message_reply(StatusCode::UNSUPPORTED_MEDIA_TYPE, "Invalid image data");
        }
    };

    match state.engine.identify(&probe).await {
        Ok(IdentifyOutcome::NoFace) => message_reply(StatusCode::NOT_FOUND, "No face detected"),
        Ok(IdentifyOutcome::Decision(decision)) => match decision.matched_name {
            Some(name) if decision.is_match => {
                tracing::info!(name = %name, "face recognized");
                (
                    StatusCode::OK,
                    Json(json!({
                        "success": true,
                        "member": MemberInfo { name, last_visit: Utc::now() },
                    })),
                )
                    .into_response()
            }
            _ => message_reply(StatusCode::NOT_FOUND, "Face not recognized"),
        },
        Err(err) => engine_failure(err),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompareRequest {
    enrolled_photo_url: Option<String>,
    check_in_photo_url: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CompareResponse {
    success: bool,
    is_match: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    confidence: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    face_distance: Option<f32>,
    message: String,
}

async fn compare_faces(
    State(state): State<AppState>,
    Json(request): Json<CompareRequest>,
) -> Response {
    let enrolled_url = request.enrolled_photo_url.filter(|s| !s.is_empty());
    let checkin_url = request.check_in_photo_url.filter(|s| !s.is_empty());
    let (Some(enrolled_url), Some(checkin_url)) = (enrolled_url, checkin_url) else {
        return compare_reply(
            StatusCode::BAD_REQUEST,
            false,
            false,
            None,
            "Both enrolledPhotoUrl and checkInPhotoUrl are required",
        );
    };

    let enrolled = match state.fetcher.fetch(&enrolled_url).await {
        Ok(bytes) => bytes,
        Err(err) => {
            return compare_reply(
                StatusCode::BAD_GATEWAY,
                false,
                false,
                None,
                &format!("Failed to download enrolled photo: {err}"),
            )
        }
    };
    let checkin = match state.fetcher.fetch(&checkin_url).await {
        Ok(bytes) => bytes,
        Err(err) => {
            return compare_reply(
                StatusCode::BAD_GATEWAY,
                false,
                false,
                None,
                &format!("Failed to download check-in photo: {err}"),
            )
        }
    };

    let enrolled = match decode::decode_rgb(&enrolled) {
        Ok(image) => image,
        Err(err) => {
            return compare_reply(
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                false,
                false,
                None,
                &format!("Invalid enrolled image format: {err}"),
            )
        }
    };
    let checkin = match decode::decode_rgb(&checkin) {
        Ok(image) => image,
        Err(err) => {
            return compare_reply(
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                false,
                false,
                None,
                &format!("Invalid check-in image format: {err}"),
            )
        }
    };

    match state.engine.verify(&enrolled, &checkin).await {
        Ok(VerifyOutcome::NoFaceInEnrolled) => compare_reply(
            StatusCode::OK,
            false,
            false,
            None,
            "No face detected in enrolled photo. Please re-enroll with a clear face photo.",
        ),
        Ok(VerifyOutcome::NoFaceInCheckin) => compare_reply(
            StatusCode::OK,
            false,
            false,
            None,
            "No face detected in check-in photo. Please ensure your face is clearly visible and well-lit.",
        ),
        Ok(VerifyOutcome::Decision(decision)) => {
            let message = if decision.is_match {
                "Face match successful"
            } else {
                "Faces do not match"
            };
            compare_reply(
                StatusCode::OK,
                true,
                decision.is_match,
                Some((decision.confidence, decision.distance)),
                message,
            )
        }
        Err(err) => engine_failure(err),
    }
}

async fn refresh_faces(State(state): State<AppState>) -> Response {
    match state.engine.refresh_gallery().await {
        Ok(count) => (
            StatusCode::OK,
            Json(json!({ "success": true, "count": count })),
        )
            .into_response(),
        Err(err) => engine_failure(err),
    }
}

#[derive(Serialize)]
struct StatusResponse {
    status: &'static str,
    message: &'static str,
    version: &'static str,
    time: DateTime<Utc>,
    gallery: GalleryStatus,
}

async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok",
        message: "face recognition service is running",
        version: env!("CARGO_PKG_VERSION"),
        time: Utc::now(),
        gallery: state.engine.gallery_status(),
    })
}

/// Base64 image payload, with or without a `data:image/...;base64,`
/// prefix.
fn decode_base64_image(payload: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let data = match payload.split_once(',') {
        Some((_, data)) => data,
        None => payload,
    };
    STANDARD.decode(data.trim())
}

fn message_reply(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(json!({ "success": false, "message": message })),
    )
        .into_response()
}

fn compare_reply(
    status: StatusCode,
    success: bool,
    is_match: bool,
    scores: Option<(f32, f32)>,
    message: &str,
) -> Response {
    let (confidence, face_distance) = match scores {
        Some((confidence, distance)) => (Some(confidence), Some(distance)),
        None => (None, None),
    };
    (
        status,
        Json(CompareResponse {
            success,
            is_match,
            confidence,
            face_distance,
            message: message.to_string(),
        }),
    )
        .into_response()
}

fn engine_failure(err: EngineError) -> Response {
    let status = match &err {
        EngineError::Oracle(_) | EngineError::Assets(_) => StatusCode::BAD_GATEWAY,
        EngineError::Embedding(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    tracing::error!(error = %err, "request failed");
    message_reply(status, &err.to_string())
}
