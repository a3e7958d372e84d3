use crate::otp::OtpError;
use super::{ApiState, message, otp_error_response};
use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;

/// The booking page posts the code either as a string or as a bare number.
/// Any other JSON value is kept so it fails verification instead of the body.
#[derive(ToSchema, Serialize, Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum SubmittedCode {
    Number(u64),
    Text(String),
    Other(serde_json::Value),
}

impl SubmittedCode {
    #[must_use]
    pub fn to_text(&self) -> String {
        match self {
            Self::Number(number) => number.to_string(),
            Self::Text(text) => text.clone(),
            Self::Other(value) => value.to_string(),
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    pub mobile_no: String,
    #[serde(default)]
    pub otp: Option<SubmittedCode>,
}

#[utoipa::path(
    post,
    path = "/api/verify",
    request_body = VerifyRequest,
    responses(
        (status = 200, description = "OTP verified and booking forwarded", body = super::Message),
        (status = 400, description = "Invalid phone number, or invalid/expired OTP", body = super::Message),
        (status = 500, description = "Booking email could not be sent", body = super::Message)
    ),
    tag = "otp"
)]
#[instrument(skip_all)]
pub async fn verify(
    state: Extension<Arc<ApiState>>,
    payload: Option<Json<VerifyRequest>>,
) -> impl IntoResponse {
    let request: VerifyRequest = match payload {
        Some(Json(payload)) => payload,
        // An unreadable body carries no usable number.
        None => {
            let (status, text) = otp_error_response(OtpError::InvalidPhoneNumber);
            return message(status, text);
        }
    };

    let code = request
        .otp
        .as_ref()
        .map(SubmittedCode::to_text)
        .unwrap_or_default();

    match state.workflow.verify(&request.mobile_no, &code).await {
        Ok(()) => message(
            StatusCode::OK,
            "OTP verified successfully! Booking request sent.",
        ),
        Err(err) => {
            let (status, text) = otp_error_response(err);
            message(status, text)
        }
    }
}
