//! Voucher submission (`/portal/auth`)

use super::errors::{numeric_code, ErrorTranslator};
use super::{Navigator, Notifier};
use crate::http::Transport;
use crate::models::{
    AuthType, FailureKind, PortalConfig, PortalIdentity, TransportFailure, VoucherAuthRequest,
    VoucherFailure, VoucherOutcome, VoucherSuccess,
};
use serde_json::{json, Value};
use std::sync::Arc;

const INVALID_CODE: &str = "Invalid voucher code.";

/// Lifecycle callbacks around a submission. All methods default to no-ops.
///
/// `on_done` runs after every submission that got past input validation,
/// whatever the outcome.
pub trait SubmitHooks {
    fn on_start(&mut self) {}

    fn on_success(&mut self, _result: &Value) {}

    fn on_error(&mut self, _message: &str, _raw: Option<&Value>) {}

    fn on_done(&mut self) {}
}

impl SubmitHooks for () {}

pub struct VoucherSubmitter {
    transport: Arc<dyn Transport>,
    notifier: Arc<dyn Notifier>,
    navigator: Arc<dyn Navigator>,
    translator: ErrorTranslator,
    identity: PortalIdentity,
    auth_url: String,
    landing_url: Option<String>,
    max_code_length: usize,
}

impl VoucherSubmitter {
    pub fn new(
        transport: Arc<dyn Transport>,
        notifier: Arc<dyn Notifier>,
        navigator: Arc<dyn Navigator>,
        identity: PortalIdentity,
        auth_url: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            notifier,
            navigator,
            translator: ErrorTranslator::default(),
            identity,
            auth_url: auth_url.into(),
            landing_url: None,
            max_code_length: 2000,
        }
    }

    /// Use the landing page from the fetched portal settings as a redirect
    /// fallback
    pub fn with_config(mut self, config: &PortalConfig) -> Self {
        self.landing_url = config.landing_url.clone();
        self
    }

    pub fn with_translator(mut self, translator: ErrorTranslator) -> Self {
        self.translator = translator;
        self
    }

    pub fn with_max_code_length(mut self, max: usize) -> Self {
        self.max_code_length = max;
        self
    }

    pub async fn submit(&self, code: Option<&str>) -> VoucherOutcome {
        self.submit_with(code, &mut ()).await
    }

    /// Submit a voucher code, reporting progress through `hooks`.
    ///
    /// On success the client is sent to the landing page before `on_done`.
    pub async fn submit_with<H>(&self, code: Option<&str>, hooks: &mut H) -> VoucherOutcome
    where
        H: SubmitHooks + Send + ?Sized,
    {
        let code = match code.filter(|c| !c.is_empty()) {
            Some(code) => code,
            None => {
                hooks.on_error(INVALID_CODE, None);
                self.notifier.show_transient_error(INVALID_CODE);
                return Err(VoucherFailure {
                    kind: FailureKind::Input,
                    message: INVALID_CODE.to_string(),
                    vendor_code: None,
                    raw: json!({}),
                });
            }
        };

        hooks.on_start();

        let outcome = self.authenticate(self.sanitize(code)).await;
        match &outcome {
            Ok(success) => {
                tracing::info!("Voucher accepted");
                hooks.on_success(&success.result);
                if let Some(url) = &success.redirect_url {
                    self.redirect(url).await;
                }
            }
            Err(failure) => {
                tracing::debug!(
                    "Voucher rejected ({:?}, code {:?})",
                    failure.kind,
                    failure.vendor_code
                );
                hooks.on_error(&failure.message, Some(&failure.raw));
                self.notifier.show_hint(&failure.hint_text());
            }
        }

        hooks.on_done();
        outcome
    }

    fn sanitize(&self, code: &str) -> String {
        code.trim().chars().take(self.max_code_length).collect()
    }

    async fn authenticate(&self, voucher_code: String) -> VoucherOutcome {
        let request = VoucherAuthRequest {
            identity: &self.identity,
            auth_type: AuthType::Voucher.code(),
            voucher_code,
        };
        let body = serde_json::to_value(&request).unwrap_or_else(|_| json!({}));

        tracing::info!("Submitting voucher to {}", self.auth_url);
        let response = self.transport.post(&self.auth_url, &body).await;
        if !response.ok {
            tracing::debug!(
                "Auth endpoint answered HTTP {}: {}",
                response.http_status,
                response.raw_text
            );
        }

        if let Some(failure) = response.transport_failure() {
            return Err(VoucherFailure {
                kind: FailureKind::Transport(failure),
                message: transport_message(failure).to_string(),
                vendor_code: None,
                raw: response.result,
            });
        }

        self.classify(response.result)
    }

    /// The controller reports its verdict in the body; the HTTP status is not
    /// looked at.
    fn classify(&self, result: Value) -> VoucherOutcome {
        let code = ["errCode", "errorCode", "code"]
            .iter()
            .find_map(|key| result.get(*key).filter(|v| !v.is_null()))
            .cloned();
        let message = ["error", "message", "msg"]
            .iter()
            .find_map(|key| result.get(*key).and_then(Value::as_str).filter(|m| !m.is_empty()))
            .map(str::to_string);

        let vendor_code = code.as_ref().and_then(numeric_code);
        let accepted = (matches!(&code, Some(Value::Number(_))) && vendor_code == Some(0))
            || message.as_deref() == Some("ok");

        if accepted {
            return Ok(VoucherSuccess {
                redirect_url: self.redirect_target(&result),
                result,
            });
        }

        Err(VoucherFailure {
            kind: FailureKind::Vendor,
            message: self.translator.translate(code.as_ref(), message.as_deref()),
            vendor_code,
            raw: result,
        })
    }

    fn redirect_target(&self, result: &Value) -> Option<String> {
        let from_result = |key: &str| {
            result
                .get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        from_result("result")
            .or_else(|| from_result("landingUrl"))
            .or_else(|| self.landing_url.clone().filter(|s| !s.is_empty()))
            .or_else(|| self.identity.origin_url.clone().filter(|s| !s.is_empty()))
    }

    async fn redirect(&self, url: &str) {
        tracing::info!("Redirecting to {}", url);
        if let Err(e) = self.navigator.replace(url).await {
            tracing::warn!("Redirect failed, using fallback: {:#}", e);
            self.navigator.assign(url).await;
        }
    }
}

fn transport_message(failure: TransportFailure) -> &'static str {
    match failure {
        TransportFailure::Timeout => "The gateway did not respond in time. Please try again.",
        TransportFailure::NetworkError => "Network error occurred. Please try again.",
        TransportFailure::ParseError => "The gateway sent an unreadable response. Please try again.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpConfig;
    use crate::http::HttpClient;
    use crate::portal::testing::{FakeTransport, RecordingNavigator, RecordingNotifier};
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Records the order in which hooks fire
    #[derive(Default)]
    struct Trace(Vec<String>);

    impl SubmitHooks for Trace {
        fn on_start(&mut self) {
            self.0.push("start".to_string());
        }

        fn on_success(&mut self, _result: &Value) {
            self.0.push("success".to_string());
        }

        fn on_error(&mut self, message: &str, _raw: Option<&Value>) {
            self.0.push(format!("error: {}", message));
        }

        fn on_done(&mut self) {
            self.0.push("done".to_string());
        }
    }

    struct Harness {
        transport: Arc<FakeTransport>,
        notifier: Arc<RecordingNotifier>,
        navigator: Arc<RecordingNavigator>,
    }

    impl Harness {
        fn replying(result: Value) -> Self {
            Self::with_navigator(result, RecordingNavigator::default())
        }

        fn with_navigator(result: Value, navigator: RecordingNavigator) -> Self {
            Self {
                transport: Arc::new(FakeTransport::replying(result)),
                notifier: Arc::new(RecordingNotifier::default()),
                navigator: Arc::new(navigator),
            }
        }

        fn submitter(&self, origin_url: Option<&str>) -> VoucherSubmitter {
            let identity = PortalIdentity {
                client_mac: "AA-BB".to_string(),
                ap_mac: "CC-DD".to_string(),
                origin_url: origin_url.map(str::to_string),
                ..Default::default()
            };
            VoucherSubmitter::new(
                self.transport.clone(),
                self.notifier.clone(),
                self.navigator.clone(),
                identity,
                "http://gw/portal/auth",
            )
        }

        fn navigations(&self) -> Vec<String> {
            self.navigator.calls.lock().unwrap().clone()
        }
    }

    #[tokio::test]
    async fn test_empty_code_rejected_without_request() {
        let harness = Harness::replying(json!({"errCode": 0}));
        let submitter = harness.submitter(None);

        for code in [Some(""), None] {
            let mut trace = Trace::default();
            let failure = submitter.submit_with(code, &mut trace).await.unwrap_err();
            assert_eq!(failure.kind, FailureKind::Input);
            assert_eq!(trace.0, ["error: Invalid voucher code."]);
        }

        assert!(harness.transport.sent().is_empty());
        assert!(harness.notifier.hints.lock().unwrap().is_empty());
        assert_eq!(
            harness.notifier.transient.lock().unwrap().as_slice(),
            ["Invalid voucher code.", "Invalid voucher code."]
        );
    }

    #[tokio::test]
    async fn test_code_is_trimmed_and_capped() {
        let harness = Harness::replying(json!({"errCode": 0}));
        let submitter = harness.submitter(None);

        submitter.submit(Some("  ABC123  ")).await.unwrap();
        let long = "x".repeat(3000);
        submitter.submit(Some(&long)).await.unwrap();

        let sent = harness.transport.sent();
        assert_eq!(sent[0].0, "http://gw/portal/auth");
        assert_eq!(
            sent[0].1,
            json!({
                "clientMac": "AA-BB",
                "apMac": "CC-DD",
                "authType": 3,
                "voucherCode": "ABC123"
            })
        );
        assert_eq!(sent[1].1["voucherCode"].as_str().unwrap().len(), 2000);
    }

    #[tokio::test]
    async fn test_err_code_zero_is_success() {
        let harness = Harness::replying(json!({"errCode": 0, "result": "https://x"}));
        let mut trace = Trace::default();

        let success = harness
            .submitter(Some("http://origin"))
            .submit_with(Some("ABC"), &mut trace)
            .await
            .unwrap();

        assert_eq!(success.redirect_url.as_deref(), Some("https://x"));
        assert_eq!(trace.0, ["start", "success", "done"]);
        assert_eq!(harness.navigations(), ["replace https://x"]);
        assert!(harness.notifier.hints.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ok_message_is_success() {
        let harness = Harness::replying(json!({"msg": "ok"}));
        assert!(harness.submitter(None).submit(Some("ABC")).await.is_ok());
        assert!(harness.navigations().is_empty());
    }

    #[tokio::test]
    async fn test_wrong_voucher_is_failure() {
        let harness = Harness::replying(json!({"errCode": -41502, "msg": "Voucher invalid"}));
        let mut trace = Trace::default();

        let failure = harness
            .submitter(Some("http://origin"))
            .submit_with(Some("WRONG"), &mut trace)
            .await
            .unwrap_err();

        assert_eq!(failure.kind, FailureKind::Vendor);
        assert_eq!(failure.message, "Voucher code is incorrect.");
        assert_eq!(failure.vendor_code, Some(-41502));
        assert_eq!(trace.0, ["start", "error: Voucher code is incorrect.", "done"]);
        assert_eq!(
            harness.notifier.hints.lock().unwrap().as_slice(),
            ["Voucher code is incorrect. (code -41502)"]
        );
        assert!(harness.navigations().is_empty());
    }

    #[tokio::test]
    async fn test_vendor_message_matching_transport_tag_keeps_code() {
        let harness = Harness::replying(json!({"errCode": -41530, "error": "timeout"}));
        let failure = harness.submitter(None).submit(Some("ABC")).await.unwrap_err();

        assert_eq!(failure.kind, FailureKind::Vendor);
        assert_eq!(failure.vendor_code, Some(-41530));
        assert_eq!(failure.message, "Connecting to the RADIUS server times out.");
        assert_eq!(
            harness.notifier.hints.lock().unwrap().as_slice(),
            ["Connecting to the RADIUS server times out. (code -41530)"]
        );
    }

    #[tokio::test]
    async fn test_misconfiguration_code() {
        let harness = Harness::replying(json!({"errorCode": -41538}));
        let failure = harness.submitter(None).submit(Some("ABC")).await.unwrap_err();
        assert!(failure
            .message
            .starts_with("Voucher authentication failed on the controller."));
    }

    #[tokio::test]
    async fn test_http_error_status_with_zero_code_is_success() {
        let harness = Harness {
            transport: Arc::new(FakeTransport::with_envelope(crate::models::AjaxResponse {
                ok: false,
                http_status: 500,
                status_text: "Internal Server Error".to_string(),
                result: json!({"code": 0}),
                raw_text: String::new(),
                failure: None,
            })),
            notifier: Arc::new(RecordingNotifier::default()),
            navigator: Arc::new(RecordingNavigator::default()),
        };
        assert!(harness.submitter(None).submit(Some("ABC")).await.is_ok());
    }

    #[tokio::test]
    async fn test_redirect_prefers_result_then_landing_then_origin() {
        let harness = Harness::replying(json!({"errCode": 0, "landingUrl": "https://landing"}));
        let outcome = harness.submitter(Some("http://origin")).submit(Some("A")).await;
        assert_eq!(outcome.unwrap().redirect_url.as_deref(), Some("https://landing"));

        let config = PortalConfig {
            landing_url: Some("https://configured".to_string()),
            ..Default::default()
        };
        let harness = Harness::replying(json!({"errCode": 0, "result": {"ok": true}}));
        let outcome = harness
            .submitter(Some("http://origin"))
            .with_config(&config)
            .submit(Some("A"))
            .await;
        assert_eq!(outcome.unwrap().redirect_url.as_deref(), Some("https://configured"));

        let harness = Harness::replying(json!({"errCode": 0}));
        let outcome = harness.submitter(Some("http://origin")).submit(Some("A")).await;
        assert_eq!(outcome.unwrap().redirect_url.as_deref(), Some("http://origin"));
        assert_eq!(harness.navigations(), ["replace http://origin"]);
    }

    #[tokio::test]
    async fn test_redirect_falls_back_to_assign() {
        let navigator = RecordingNavigator {
            fail_replace: true,
            ..Default::default()
        };
        let harness = Harness::with_navigator(json!({"errCode": 0, "result": "https://x"}), navigator);

        harness.submitter(None).submit(Some("A")).await.unwrap();

        assert_eq!(harness.navigations(), ["replace https://x", "assign https://x"]);
    }

    #[tokio::test]
    async fn test_timeout_still_runs_on_done() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/portal/auth"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"errCode": 0}))
                    .set_delay(Duration::from_millis(800)),
            )
            .mount(&server)
            .await;

        let client = HttpClient::new(&HttpConfig {
            timeout_ms: 100,
            connect_timeout: 1,
        })
        .unwrap();
        let notifier = Arc::new(RecordingNotifier::default());
        let navigator = Arc::new(RecordingNavigator::default());
        let submitter = VoucherSubmitter::new(
            Arc::new(client),
            notifier.clone(),
            navigator.clone(),
            PortalIdentity::default(),
            format!("{}/portal/auth", server.uri()),
        );

        let mut trace = Trace::default();
        let failure = submitter
            .submit_with(Some("ABC"), &mut trace)
            .await
            .unwrap_err();

        assert_eq!(failure.kind, FailureKind::Transport(TransportFailure::Timeout));
        assert_eq!(failure.raw, json!({"error": "timeout"}));
        assert_eq!(trace.0.first().map(String::as_str), Some("start"));
        assert_eq!(trace.0.last().map(String::as_str), Some("done"));
        assert!(navigator.calls.lock().unwrap().is_empty());
    }
}
