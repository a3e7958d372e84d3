//! One-time passcode issuance and verification.

pub mod booking;
pub mod code;
pub mod error;
pub mod phone;
pub mod rate_limit;
pub mod registry;
pub mod workflow;

pub use code::OtpCode;
pub use error::{ConsumeError, OtpError};
pub use phone::{CanonicalNumber, Canonicalizer};
pub use rate_limit::{FixedWindowRateLimiter, NoopRateLimiter, RateLimitDecision, RateLimiter};
pub use registry::{Challenge, OtpRegistry};
pub use workflow::{VerificationWorkflow, WorkflowConfig};
