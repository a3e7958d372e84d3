use thiserror::Error;

/// Failures reported by the verification workflow.
///
/// Transport details are logged where they happen and never carried here.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum OtpError {
    #[error("invalid phone number")]
    InvalidPhoneNumber,
    #[error("too many issuance attempts")]
    RateLimited,
    #[error("failed to deliver OTP")]
    DeliveryFailed,
    #[error("invalid or expired OTP")]
    VerificationFailed,
    #[error("failed to notify operator")]
    NotificationFailed,
}

/// Why a registry lookup did not yield a payload.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeError {
    #[error("no pending challenge")]
    NoSuchChallenge,
    #[error("code mismatch")]
    CodeMismatch,
}

impl From<ConsumeError> for OtpError {
    // Both reasons collapse into one so callers cannot tell which numbers have codes.
    fn from(_: ConsumeError) -> Self {
        Self::VerificationFailed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consume_errors_are_indistinguishable_to_callers() {
        assert_eq!(
            OtpError::from(ConsumeError::NoSuchChallenge),
            OtpError::from(ConsumeError::CodeMismatch)
        );
    }
}
