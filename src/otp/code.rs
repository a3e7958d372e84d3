use rand::Rng;
use std::fmt;

const MIN_CODE: u32 = 100_000;
const MAX_CODE: u32 = 999_999;

/// Six digit one-time passcode. The leading digit is never zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OtpCode(u32);

impl OtpCode {
    /// Draw a code uniformly from `100000..=999999`.
    #[must_use]
    pub fn generate() -> Self {
        Self(rand::thread_rng().gen_range(MIN_CODE..=MAX_CODE))
    }

    /// Parse a code submitted by a visitor.
    ///
    /// Surrounding whitespace is ignored. Anything that is not an unsigned integer
    /// yields `None`; out-of-range values parse but can never match.
    #[must_use]
    pub fn parse(submitted: &str) -> Option<Self> {
        submitted.trim().parse::<u32>().ok().map(Self)
    }

    #[must_use]
    pub fn value(self) -> u32 {
        self.0
    }
}

impl From<u32> for OtpCode {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl fmt::Display for OtpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
