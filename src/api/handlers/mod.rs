pub mod health;
pub mod submit;
pub mod verify;

use crate::otp::{OtpError, VerificationWorkflow};
use axum::{
    Json,
    extract::ConnectInfo,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, sync::Arc};
use utoipa::ToSchema;

/// Shared state handed to the OTP handlers.
pub struct ApiState {
    pub workflow: Arc<VerificationWorkflow>,
    pub trust_proxy_headers: bool,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct Message {
    pub message: String,
}

pub(crate) fn message(status: StatusCode, text: &str) -> Response {
    (
        status,
        Json(Message {
            message: text.to_string(),
        }),
    )
        .into_response()
}

/// Status and client-facing message for each workflow failure.
pub(crate) fn otp_error_response(err: OtpError) -> (StatusCode, &'static str) {
    match err {
        OtpError::InvalidPhoneNumber => (StatusCode::BAD_REQUEST, "Invalid phone number format."),
        OtpError::RateLimited => (
            StatusCode::TOO_MANY_REQUESTS,
            "Too many requests, please try again later.",
        ),
        OtpError::DeliveryFailed => (StatusCode::INTERNAL_SERVER_ERROR, "Failed to send OTP."),
        OtpError::VerificationFailed => (StatusCode::BAD_REQUEST, "Invalid OTP or OTP expired."),
        OtpError::NotificationFailed => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to send booking confirmation email.",
        ),
    }
}

/// Address used as the rate-limit key.
///
/// Proxy headers are only honoured when the deployment sits behind a proxy that
/// sets them; otherwise any client could pick its own key.
pub(crate) fn client_address(
    headers: &HeaderMap,
    connect_info: Option<&ConnectInfo<SocketAddr>>,
    trust_proxy_headers: bool,
) -> Option<String> {
    if trust_proxy_headers && let Some(forwarded) = extract_forwarded_ip(headers) {
        return Some(forwarded);
    }
    connect_info.map(|ConnectInfo(addr)| addr.ip().to_string())
}

fn extract_forwarded_ip(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if forwarded.is_some() {
        return forwarded.map(str::to_string);
    }
    headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
