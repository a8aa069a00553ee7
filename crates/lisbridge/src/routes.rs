use axum::{
    body::Bytes,
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use lisbridge_core::{ProcessReceipt, RawDeviceMessage};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info};
use uuid::Uuid;

use crate::state::AppState;

pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const APPLICATION_ID_HEADER: &str = "x-application-id";
pub const CLIENT_ID_HEADER: &str = "x-client-id";
pub const APPLICATION_KEY_HEADER: &str = "x-application-key";

const REQUESTED_SUCCESSFULLY: &str = "payload requested successfully";
const REQUESTED_UNSUCCESSFULLY: &str = "payload requested unsuccessfully";

pub fn router(state: AppState) -> Router {
    let device_messages = Router::new()
        .route("/api/v1/device-messages", post(create_device_message))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_application_key,
        ));

    Router::new()
        .route("/healthz", get(healthz))
        .merge(device_messages)
        .with_state(state)
}

/// Error identifiers reported in the failure envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Internal,
    BadRequest,
    Unauthorized,
    MissingClientId,
    MissingApplicationId,
}

impl ErrorKind {
    pub fn error_id(&self) -> u16 {
        match self {
            ErrorKind::Internal => 8000,
            ErrorKind::BadRequest => 8002,
            ErrorKind::Unauthorized => 8012,
            ErrorKind::MissingClientId => 8013,
            ErrorKind::MissingApplicationId => 8015,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ErrorKind::Internal => "Internal server error occurred",
            ErrorKind::BadRequest => {
                "The server could not understand the request due to invalid parameters"
            }
            ErrorKind::Unauthorized => "The request requires user authentication",
            ErrorKind::MissingClientId => "Missing Client ID in the request",
            ErrorKind::MissingApplicationId => "Missing Application ID in the request",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
            ErrorKind::Unauthorized
            | ErrorKind::MissingClientId
            | ErrorKind::MissingApplicationId => StatusCode::UNAUTHORIZED,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorCode {
    pub error_id: u16,
    pub description: &'static str,
}

#[derive(Debug, Serialize)]
pub struct Failure {
    pub success: bool,
    pub message: &'static str,
    pub errors: Vec<String>,
    pub error_code: ErrorCode,
}

#[derive(Debug, Serialize)]
pub struct Success<T> {
    pub success: bool,
    pub message: &'static str,
    pub data: T,
    pub metadata: Option<Value>,
}

#[derive(Debug)]
pub struct ApiError {
    kind: ErrorKind,
    details: Vec<String>,
}

impl ApiError {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            details: Vec::new(),
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.details.push(detail.into());
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut errors = self.details;
        errors.push(self.kind.description().to_string());
        let body = Failure {
            success: false,
            message: REQUESTED_UNSUCCESSFULLY,
            errors,
            error_code: ErrorCode {
                error_id: self.kind.error_id(),
                description: self.kind.description(),
            },
        };
        (self.kind.status(), Json(body)).into_response()
    }
}

/// Caller identity taken from the request headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub request_id: String,
    pub application_id: String,
    pub client_id: String,
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn authorize(headers: &HeaderMap, app_key: &str) -> Result<RequestContext, ApiError> {
    let application_id = header_value(headers, APPLICATION_ID_HEADER)
        .ok_or_else(|| ApiError::new(ErrorKind::MissingApplicationId))?;
    let client_id = header_value(headers, CLIENT_ID_HEADER)
        .ok_or_else(|| ApiError::new(ErrorKind::MissingClientId))?;
    let request_id =
        header_value(headers, REQUEST_ID_HEADER).unwrap_or_else(|| Uuid::new_v4().to_string());

    match header_value(headers, APPLICATION_KEY_HEADER) {
        Some(key) if key == app_key => Ok(RequestContext {
            request_id,
            application_id,
            client_id,
        }),
        _ => Err(ApiError::new(ErrorKind::Unauthorized)),
    }
}

pub async fn require_application_key(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let context = match authorize(request.headers(), &state.app_key) {
        Ok(context) => context,
        Err(err) => return err.into_response(),
    };
    let request_id = context.request_id.clone();
    request.extensions_mut().insert(context);

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

#[derive(Debug, Deserialize)]
pub struct DeviceMessageParams {
    #[serde(default)]
    pub device_id: String,
    #[serde(default)]
    pub device_type_code: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub protocol: String,
}

impl DeviceMessageParams {
    /// Requires every field and decodes the base64 message body.
    pub fn into_raw(self) -> Result<RawDeviceMessage, ApiError> {
        let missing: Vec<&str> = [
            ("device_id", &self.device_id),
            ("device_type_code", &self.device_type_code),
            ("message", &self.message),
            ("protocol", &self.protocol),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(name, _)| name)
        .collect();
        if !missing.is_empty() {
            return Err(ApiError::new(ErrorKind::BadRequest)
                .with_detail(format!("missing fields: {}", missing.join(", "))));
        }

        let bytes = STANDARD.decode(&self.message).map_err(|err| {
            ApiError::new(ErrorKind::BadRequest).with_detail(format!("message is not base64: {err}"))
        })?;
        let message = String::from_utf8(bytes).map_err(|_| {
            ApiError::new(ErrorKind::BadRequest).with_detail("message is not valid UTF-8")
        })?;

        Ok(RawDeviceMessage {
            device_id: self.device_id,
            device_type_code: self.device_type_code,
            protocol: self.protocol,
            message,
        })
    }
}

pub async fn create_device_message(
    State(state): State<AppState>,
    Extension(context): Extension<RequestContext>,
    body: Bytes,
) -> Result<Json<Success<ProcessReceipt>>, ApiError> {
    let params: DeviceMessageParams = serde_json::from_slice(&body).map_err(|err| {
        ApiError::new(ErrorKind::BadRequest).with_detail(format!("invalid request body: {err}"))
    })?;
    let raw = params.into_raw()?;

    let receipt = state.pipeline.process(raw).await.map_err(|err| {
        error!(
            request_id = %context.request_id,
            client_id = %context.client_id,
            error = %err,
            "device message rejected"
        );
        ApiError::new(ErrorKind::Internal).with_detail(err.to_string())
    })?;

    info!(
        request_id = %context.request_id,
        application_id = %context.application_id,
        message_id = %receipt.message_id,
        status = receipt.outcome.status(),
        "device message processed"
    );

    Ok(Json(Success {
        success: true,
        message: REQUESTED_SUCCESSFULLY,
        data: receipt,
        metadata: None,
    }))
}

pub async fn healthz(State(state): State<AppState>) -> Response {
    match state.repository().ping().await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ok" }))).into_response(),
        Err(err) => {
            error!(error = %err, "storage health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unavailable" })),
            )
                .into_response()
        }
    }
}
