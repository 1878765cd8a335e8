//! Portal settings handshake (`/portal/getPortalPageSetting`)

use super::ready::{ReadySignal, Readiness};
use super::Notifier;
use crate::http::Transport;
use crate::models::{AuthType, PortalConfig, PortalIdentity};
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::sync::Arc;

const VOUCHER_DISABLED: &str =
    "Session invalid: Portal configuration does not allow Voucher access for this SSID/site.";

/// Fetches the portal settings once and decides whether vouchers can be used
pub struct SettingsFetcher {
    transport: Arc<dyn Transport>,
    notifier: Arc<dyn Notifier>,
    settings_url: String,
}

impl SettingsFetcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        notifier: Arc<dyn Notifier>,
        settings_url: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            notifier,
            settings_url: settings_url.into(),
        }
    }

    /// Run the fetch in the background. The returned signal settles exactly
    /// once, whatever the gateway does.
    pub fn spawn(self, identity: PortalIdentity) -> ReadySignal {
        let signal = ReadySignal::new();
        let handle = signal.clone();
        tokio::spawn(async move {
            let readiness = self.fetch(&identity).await;
            handle.resolve(readiness);
        });
        signal
    }

    pub async fn fetch(&self, identity: &PortalIdentity) -> Readiness {
        tracing::info!("Fetching portal settings from {}", self.settings_url);

        let body = serde_json::to_value(identity).unwrap_or_else(|_| json!({}));
        let response = self.transport.post(&self.settings_url, &body).await;
        tracing::debug!(
            "Settings response: HTTP {} {} (ok: {})",
            response.http_status,
            response.status_text,
            response.ok
        );

        let error = response.transport_failure().map(|f| {
            tracing::warn!("Portal settings unavailable: {}", f);
            f.tag().to_string()
        });

        let config = parse_portal_config(&response.result);
        let voucher_enabled = config.voucher_enabled();

        if voucher_enabled {
            tracing::info!(
                "Voucher access enabled (hotspot types: {:?})",
                config.hotspot_types
            );
        } else {
            self.notifier.show_config_error(VOUCHER_DISABLED);
        }

        Readiness {
            config,
            voucher_enabled,
            block_access: !voucher_enabled,
            error,
        }
    }
}

/// Build a `PortalConfig` from the settings response, accepting both the
/// nested `{errorCode, result: {...}}` and the flat shape
pub fn parse_portal_config(payload: &Value) -> PortalConfig {
    let data = payload
        .get("result")
        .filter(|v| v.is_object())
        .unwrap_or(payload);

    let text = |v: Option<&Value>| {
        v.and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    let defaults = PortalConfig::default();

    let hotspot_types: BTreeSet<AuthType> = data
        .pointer("/hotspot/enabledTypes")
        .and_then(Value::as_array)
        .map(|types| {
            types
                .iter()
                .filter_map(Value::as_i64)
                .filter_map(|t| match AuthType::try_from(t) {
                    Ok(auth) => Some(auth),
                    Err(unknown) => {
                        tracing::debug!("Skipping unknown auth type {}", unknown);
                        None
                    }
                })
                .collect()
        })
        .unwrap_or_default();

    let auth_type = data
        .get("authType")
        .and_then(Value::as_i64)
        .and_then(|t| AuthType::try_from(t).ok())
        .unwrap_or(defaults.auth_type);

    let error_state = if payload.get("errorCode").and_then(Value::as_i64) == Some(0) {
        "ok".to_string()
    } else {
        text(payload.get("msg")).unwrap_or(defaults.error_state)
    };

    let country_code = match data.pointer("/sms/countryCode") {
        Some(Value::Number(n)) if n.as_i64() != Some(0) => format!("+{}", n),
        Some(Value::String(s)) if !s.is_empty() => format!("+{}", s.trim_start_matches('+')),
        _ => defaults.country_code,
    };

    PortalConfig {
        auth_type,
        hotspot_types,
        button_text: text(data.pointer("/portalCustomize/buttonText"))
            .unwrap_or(defaults.button_text),
        form_auth_button_text: text(data.pointer("/portalCustomize/formAuthButtonText"))
            .unwrap_or(defaults.form_auth_button_text),
        form_auth: data
            .get("formAuth")
            .filter(|v| v.is_object())
            .cloned()
            .unwrap_or(defaults.form_auth),
        error_state,
        country_code,
        landing_url: text(data.get("landingUrl")),
    }
}
