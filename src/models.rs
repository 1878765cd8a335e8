//! Data models for the Omada portal handshake

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;

/// Authentication modes as numbered by the controller firmware.
///
/// The discriminants are part of the wire contract and must never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AuthType {
    NoAuth = 0,
    SimplePassword = 1,
    ExternalRadius = 2,
    Voucher = 3,
    LocalUser = 5,
    Sms = 6,
    Radius = 8,
    Hotspot = 11,
    FormAuth = 12,
    ExternalLdap = 15,
}

impl AuthType {
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl TryFrom<i64> for AuthType {
    type Error = i64;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::NoAuth),
            1 => Ok(Self::SimplePassword),
            2 => Ok(Self::ExternalRadius),
            3 => Ok(Self::Voucher),
            5 => Ok(Self::LocalUser),
            6 => Ok(Self::Sms),
            8 => Ok(Self::Radius),
            11 => Ok(Self::Hotspot),
            12 => Ok(Self::FormAuth),
            15 => Ok(Self::ExternalLdap),
            other => Err(other),
        }
    }
}

/// Identifiers the gateway put in the portal page URL
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortalIdentity {
    pub client_mac: String,
    pub ap_mac: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_mac: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssid_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub radio_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vid: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin_url: Option<String>,
    #[serde(skip)]
    pub preview_site: Option<String>,
}

/// Body of `POST /portal/auth` for voucher access
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoucherAuthRequest<'a> {
    #[serde(flatten)]
    pub identity: &'a PortalIdentity,
    pub auth_type: u8,
    pub voucher_code: String,
}

/// Portal settings served by `/portal/getPortalPageSetting`
#[derive(Debug, Clone, PartialEq)]
pub struct PortalConfig {
    pub auth_type: AuthType,
    pub hotspot_types: BTreeSet<AuthType>,
    pub button_text: String,
    pub form_auth_button_text: String,
    pub form_auth: Value,
    pub error_state: String,
    pub country_code: String,
    pub landing_url: Option<String>,
}

impl PortalConfig {
    pub fn voucher_enabled(&self) -> bool {
        self.hotspot_types.contains(&AuthType::Voucher)
    }
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            auth_type: AuthType::Voucher,
            hotspot_types: BTreeSet::new(),
            button_text: "Log In".to_string(),
            form_auth_button_text: "Take the Survey".to_string(),
            form_auth: Value::Object(Default::default()),
            error_state: "error".to_string(),
            country_code: "+1".to_string(),
            landing_url: None,
        }
    }
}

/// Uniform envelope for every gateway call.
///
/// `result` is always a JSON object: transport failures and unreadable
/// bodies are folded into it as `{"error": "<tag>"}`. Only `failure` says
/// whether that happened; a gateway body may carry the same strings.
#[derive(Debug, Clone, PartialEq)]
pub struct AjaxResponse {
    pub ok: bool,
    pub http_status: u16,
    pub status_text: String,
    pub result: Value,
    pub raw_text: String,
    pub failure: Option<TransportFailure>,
}

/// Failures the transport reports as data instead of errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportFailure {
    NetworkError,
    Timeout,
    ParseError,
}

impl TransportFailure {
    pub fn tag(self) -> &'static str {
        match self {
            Self::NetworkError => "network_error",
            Self::Timeout => "timeout",
            Self::ParseError => "parse_error",
        }
    }
}

impl std::fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

impl AjaxResponse {
    pub fn transport_failure(&self) -> Option<TransportFailure> {
        self.failure
    }
}

/// Successful voucher submission
#[derive(Debug, Clone, PartialEq)]
pub struct VoucherSuccess {
    pub result: Value,
    pub redirect_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Rejected locally, nothing was sent
    Input,
    Transport(TransportFailure),
    /// The controller answered with a non-zero code
    Vendor,
}

/// Failed voucher submission, carrying the message shown to the user
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct VoucherFailure {
    pub kind: FailureKind,
    pub message: String,
    pub vendor_code: Option<i64>,
    pub raw: Value,
}

impl VoucherFailure {
    /// Text for the persistent hint line
    pub fn hint_text(&self) -> String {
        match self.vendor_code {
            Some(code) => format!("{} (code {})", self.message, code),
            None => self.message.clone(),
        }
    }
}

pub type VoucherOutcome = Result<VoucherSuccess, VoucherFailure>;
