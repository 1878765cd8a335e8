//! Vendor error code translation

use crate::config::VoucherSection;
use serde_json::Value;
use std::collections::BTreeSet;

const FALLBACK_MESSAGE: &str = "Failed to authenticate.";

/// Messages the controller's own portal page shows for each result code
pub const ERROR_HINTS: [(i64, &str); 36] = [
    (0, "ok"),
    (-1, "General error."),
    (-41500, "Invalid authentication type."),
    (-41501, "Failed to authenticate."),
    (-41502, "Voucher code is incorrect."),
    (-41503, "Voucher is expired."),
    (-41504, "Voucher traffic has exceeded the limit."),
    (-41505, "The number of users has reached the limit."),
    (-41506, "Invalid authorization information."),
    (
        -41507,
        "Your authentication times out. You can get authenticated again until the next day.",
    ),
    (-41508, "Local User traffic has exceeded the limit."),
    (-41512, "Local User is expired."),
    (-41513, "Local User is disabled."),
    (-41514, "MAC address is incorrect."),
    (-41515, "Local User Quota has exceeded the limit."),
    (-41516, "The number of users has reached the limit."),
    (-41517, "Incorrect password."),
    (-41518, "This SSID does not exist."),
    (-41519, "Invalid code."),
    (-41520, "The code is expired."),
    (-41521, "The number of users has reached the limit."),
    (-41522, "Failed to validate the code."),
    (-41523, "Failed to send verification code."),
    (-41524, "Authentication failed because the username does not exist."),
    (-41525, "Authentication failed because of wrong password."),
    (-41526, "Authentication failed because the client is invalid."),
    (-41527, "Authentication failed because the local user is invalid."),
    (-41528, "Failed to decrypt data."),
    (-41529, "Incorrect username or password."),
    (-41530, "Connecting to the RADIUS server times out."),
    (-41531, "Your code has reached your Wi-Fi data limit."),
    (-41532, "Your account has reached your Wi-Fi data limit."),
    (-41533, "Form authentication request is invalid."),
    (-43408, "Invalid LDAP configuration."),
    (-43409, "Invalid LDAP credentials."),
    (-41538, "Voucher is not effective."),
];

fn hint_for(code: i64) -> Option<&'static str> {
    ERROR_HINTS
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, msg)| *msg)
}

/// Numeric value of a vendor code that may arrive as a number or a string
pub fn numeric_code(code: &Value) -> Option<i64> {
    match code {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Turns vendor result codes into user-facing sentences
#[derive(Debug, Clone)]
pub struct ErrorTranslator {
    misconfiguration_codes: BTreeSet<i64>,
    misconfiguration_message: String,
}

impl ErrorTranslator {
    pub fn new(section: &VoucherSection) -> Self {
        Self {
            misconfiguration_codes: section.misconfiguration_codes.iter().copied().collect(),
            misconfiguration_message: section.misconfiguration_message.clone(),
        }
    }

    /// Whether `code` means the controller is set up wrong rather than the
    /// user typed something wrong
    pub fn is_misconfiguration(&self, code: i64) -> bool {
        self.misconfiguration_codes.contains(&code)
    }

    pub fn translate(&self, code: Option<&Value>, message: Option<&str>) -> String {
        let key = match code {
            Some(raw) => numeric_code(raw),
            None if message == Some("ok") => Some(0),
            None => Some(-1),
        };

        if key.is_some_and(|n| self.is_misconfiguration(n)) {
            return self.misconfiguration_message.clone();
        }

        key.and_then(hint_for)
            .or(message.filter(|m| !m.is_empty()))
            .unwrap_or(FALLBACK_MESSAGE)
            .to_string()
    }
}

impl Default for ErrorTranslator {
    fn default() -> Self {
        Self::new(&VoucherSection::default())
    }
}
