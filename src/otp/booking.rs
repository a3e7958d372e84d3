//! Operator notification built from a verified booking form.

use super::phone::CanonicalNumber;
use crate::notify::EmailMessage;
use serde_json::Value;

pub const BOOKING_SUBJECT: &str = "New Car Booking Request";

// Fields the booking page sends, rendered first and in this order.
const KNOWN_FIELDS: [(&str, &str); 3] = [
    ("name", "Name"),
    ("mobileNo", "Mobile No"),
    ("carRequiredDate", "Car Required Date"),
];

/// Build the email sent to the operator once `verified` proved ownership.
///
/// A missing `mobileNo` falls back to the verified number. Fields beyond the known
/// ones are appended in key order.
#[must_use]
pub fn booking_email(to: &str, verified: &CanonicalNumber, form: &Value) -> EmailMessage {
    let mut body = String::from("New booking request:\n\n");

    match form.as_object() {
        Some(fields) => {
            for (key, label) in KNOWN_FIELDS {
                let value = match fields.get(key).map(render_value) {
                    Some(value) if !value.is_empty() => value,
                    _ if key == "mobileNo" => verified.to_string(),
                    _ => "-".to_string(),
                };
                body.push_str(&format!("{label}: {value}\n"));
            }

            let mut extras: Vec<(&String, &Value)> = fields
                .iter()
                .filter(|(key, _)| !KNOWN_FIELDS.iter().any(|(known, _)| *known == key.as_str()))
                .collect();
            extras.sort_by(|a, b| a.0.cmp(b.0));

            for (key, value) in extras {
                body.push_str(&format!("{key}: {}\n", render_value(value)));
            }
        }
        None => {
            body.push_str(&format!("Mobile No: {verified}\n"));
            if !form.is_null() {
                body.push_str(&format!("Details: {form}\n"));
            }
        }
    }

    EmailMessage {
        to: to.to_string(),
        subject: BOOKING_SUBJECT.to_string(),
        body: body.trim_end().to_string(),
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.trim().to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
