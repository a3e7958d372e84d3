use super::handlers::{Message, health, submit, verify};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(health::health, submit::submit, verify::verify),
    components(schemas(
        health::Health,
        submit::SubmitRequest,
        verify::VerifyRequest,
        verify::SubmittedCode,
        Message
    )),
    tags(
        (name = "otp", description = "Phone verification for booking requests"),
        (name = "health", description = "Service liveness")
    )
)]
struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}
