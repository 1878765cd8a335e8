//! Omada captive portal handshake
//!
//! The gateway serves two JSON endpoints: one describing which
//! authentication methods the SSID allows, and one accepting credentials.
//! This module drives both for voucher access. Presentation is kept behind
//! the `Notifier` and `Navigator` traits so the handshake itself never
//! touches the terminal or a browser.

pub mod errors;
pub mod navigate;
pub mod ready;
pub mod settings;
pub mod voucher;

pub use errors::ErrorTranslator;
pub use navigate::HttpNavigator;
pub use ready::ReadySignal;
pub use settings::SettingsFetcher;
pub use voucher::{SubmitHooks, VoucherSubmitter};

use crate::config::PortalSection;
use crate::parser::{self, ResolveError};
use anyhow::Result;
use async_trait::async_trait;

/// Surface for messages the user has to see
pub trait Notifier: Send + Sync {
    /// Fatal: the portal cannot be used at all. Never dismissed.
    fn show_config_error(&self, message: &str);

    /// Persistent hint next to the voucher form
    fn show_hint(&self, message: &str);

    fn show_transient_error(&self, message: &str);
}

/// Where the client goes once the gateway lets it through
#[async_trait]
pub trait Navigator: Send + Sync {
    /// Navigate without leaving a history entry
    async fn replace(&self, url: &str) -> Result<()>;

    /// Plain navigation, used when `replace` fails
    async fn assign(&self, url: &str);
}

/// Notifier for terminal use. Configuration errors are also logged; hints
/// only go to stderr.
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn show_config_error(&self, message: &str) {
        tracing::error!("Portal configuration error: {}", message);
        eprintln!("error: {}", message);
    }

    fn show_hint(&self, message: &str) {
        eprintln!("{}", message);
    }

    fn show_transient_error(&self, message: &str) {
        eprintln!("{}", message);
    }
}

/// Absolute URLs of the gateway endpoints
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub settings_url: String,
    pub auth_url: String,
}

impl Endpoints {
    pub fn from_page_url(page_url: &str, section: &PortalSection) -> Result<Self, ResolveError> {
        let origin = parser::gateway_origin(page_url)?;
        let join = |path: &str| {
            origin
                .join(path)
                .map(String::from)
                .map_err(|_| ResolveError::InvalidUrl(page_url.to_string()))
        };

        Ok(Self {
            settings_url: join(&section.settings_path)?,
            auth_url: join(&section.auth_path)?,
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Fakes shared by the handshake tests

    use super::*;
    use crate::http::Transport;
    use crate::models::AjaxResponse;
    use serde_json::Value;
    use std::sync::Mutex;

    /// Transport returning canned envelopes and recording every request
    pub struct FakeTransport {
        pub requests: Mutex<Vec<(String, Value)>>,
        response: AjaxResponse,
    }

    impl FakeTransport {
        pub fn replying(result: Value) -> Self {
            Self::with_envelope(AjaxResponse {
                ok: true,
                http_status: 200,
                status_text: "OK".to_string(),
                raw_text: result.to_string(),
                result,
                failure: None,
            })
        }

        pub fn with_envelope(response: AjaxResponse) -> Self {
            Self {
                requests: Mutex::new(Vec::new()),
                response,
            }
        }

        pub fn sent(&self) -> Vec<(String, Value)> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn post(&self, url: &str, body: &Value) -> AjaxResponse {
            self.requests
                .lock()
                .unwrap()
                .push((url.to_string(), body.clone()));
            self.response.clone()
        }
    }

    #[derive(Default)]
    pub struct RecordingNotifier {
        pub config_errors: Mutex<Vec<String>>,
        pub hints: Mutex<Vec<String>>,
        pub transient: Mutex<Vec<String>>,
    }

    impl Notifier for RecordingNotifier {
        fn show_config_error(&self, message: &str) {
            self.config_errors.lock().unwrap().push(message.to_string());
        }

        fn show_hint(&self, message: &str) {
            self.hints.lock().unwrap().push(message.to_string());
        }

        fn show_transient_error(&self, message: &str) {
            self.transient.lock().unwrap().push(message.to_string());
        }
    }

    /// Navigator recording calls; `replace` fails when `fail_replace` is set
    #[derive(Default)]
    pub struct RecordingNavigator {
        pub fail_replace: bool,
        pub calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Navigator for RecordingNavigator {
        async fn replace(&self, url: &str) -> Result<()> {
            self.calls.lock().unwrap().push(format!("replace {}", url));
            if self.fail_replace {
                anyhow::bail!("navigation refused");
            }
            Ok(())
        }

        async fn assign(&self, url: &str) {
            self.calls.lock().unwrap().push(format!("assign {}", url));
        }
    }
}
