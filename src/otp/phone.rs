//! Phone number canonicalization.
//!
//! Only the 10 digit national number scheme is accepted. The canonical form is the
//! configured calling code followed by those 10 digits, e.g. `+919876543210`.

use super::error::OtpError;
use anyhow::{Result, anyhow};
use regex::Regex;
use std::fmt;

pub const DEFAULT_CALLING_CODE: &str = "+91";

const NATIONAL_NUMBER_DIGITS: usize = 10;

/// Registry key for a verified-format phone number.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CanonicalNumber(String);

impl CanonicalNumber {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug)]
pub struct Canonicalizer {
    calling_code: String,
}

impl Canonicalizer {
    /// # Errors
    /// Returns an error unless `calling_code` is `+` followed by 1-3 digits.
    pub fn new(calling_code: &str) -> Result<Self> {
        let calling_code = calling_code.trim();
        if !valid_calling_code(calling_code) {
            return Err(anyhow!("invalid calling code: {calling_code}"));
        }
        Ok(Self {
            calling_code: calling_code.to_string(),
        })
    }

    #[must_use]
    pub fn calling_code(&self) -> &str {
        &self.calling_code
    }

    /// Strip every non-digit and require exactly 10 digits.
    ///
    /// A literal leading calling code is removed first so canonical output maps to
    /// itself. Nothing else is repaired: 9 or 11 bare digits are rejected.
    ///
    /// # Errors
    /// Returns [`OtpError::InvalidPhoneNumber`] for any other shape of input.
    pub fn canonicalize(&self, raw: &str) -> Result<CanonicalNumber, OtpError> {
        let raw = raw.trim();
        let national = raw.strip_prefix(self.calling_code.as_str()).unwrap_or(raw);

        let digits: String = national.chars().filter(char::is_ascii_digit).collect();
        if digits.len() != NATIONAL_NUMBER_DIGITS {
            return Err(OtpError::InvalidPhoneNumber);
        }

        Ok(CanonicalNumber(format!("{}{digits}", self.calling_code)))
    }
}

impl Default for Canonicalizer {
    fn default() -> Self {
        Self {
            calling_code: DEFAULT_CALLING_CODE.to_string(),
        }
    }
}

/// `+` followed by 1 to 3 digits (ITU country codes).
pub fn valid_calling_code(calling_code: &str) -> bool {
    Regex::new(r"^\+[0-9]{1,3}$").is_ok_and(|regex| regex.is_match(calling_code))
}
