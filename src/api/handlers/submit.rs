use crate::otp::OtpError;
use super::{ApiState, client_address, message, otp_error_response};
use axum::{
    Json,
    extract::{ConnectInfo, Extension},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{net::SocketAddr, sync::Arc};
use tracing::instrument;
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub mobile_no: String,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub form_data: Value,
}

#[utoipa::path(
    post,
    path = "/api/submit",
    request_body = SubmitRequest,
    responses(
        (status = 200, description = "OTP sent", body = super::Message),
        (status = 400, description = "Invalid phone number", body = super::Message),
        (status = 429, description = "Rate limited", body = super::Message),
        (status = 500, description = "SMS delivery failed", body = super::Message)
    ),
    tag = "otp"
)]
#[instrument(skip_all)]
pub async fn submit(
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    state: Extension<Arc<ApiState>>,
    payload: Option<Json<SubmitRequest>>,
) -> impl IntoResponse {
    let request: SubmitRequest = match payload {
        Some(Json(payload)) => payload,
        // An unreadable body carries no usable number.
        None => {
            let (status, text) = otp_error_response(OtpError::InvalidPhoneNumber);
            return message(status, text);
        }
    };

    let client = client_address(&headers, connect_info.as_ref(), state.trust_proxy_headers);

    match state
        .workflow
        .issue(client.as_deref(), &request.mobile_no, request.form_data)
        .await
    {
        Ok(()) => message(StatusCode::OK, "OTP sent successfully!"),
        Err(err) => {
            let (status, text) = otp_error_response(err);
            message(status, text)
        }
    }
}
