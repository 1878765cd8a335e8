//! Account API client
//!
//! Users buy vouchers through a separate account service. This client logs
//! in, fetches the user and lists the orders for the current site so a
//! purchased voucher can be redeemed on the portal.

use reqwest::header::AUTHORIZATION;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};

const SITE_NOT_FOUND: &str = "Site not found. Please contact technical support.";

#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    /// The service answered but refused the request
    #[error("{0}")]
    Rejected(String),
    #[error("account service unreachable: {0}")]
    Request(#[from] reqwest::Error),
}

pub type AccountResult<T> = Result<T, AccountError>;

/// A purchased package. Field names follow the account service.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(default)]
    pub package_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub valid_until: Option<String>,
    #[serde(default)]
    pub speed: Option<Value>,
    #[serde(default)]
    voucher_code: Option<String>,
    #[serde(default)]
    voucher: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

impl Order {
    pub fn voucher_code(&self) -> Option<&str> {
        [&self.voucher_code, &self.voucher, &self.code]
            .into_iter()
            .find_map(|c| c.as_deref().filter(|c| !c.is_empty()))
    }

    pub fn label(&self) -> &str {
        self.package_name.as_deref().unwrap_or("Unknown Package")
    }
}

pub struct AccountClient {
    client: Client,
    base_url: String,
}

impl AccountClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> AccountResult<String> {
        let req = self
            .client
            .post(format!("{}/api/auth/login", self.base_url))
            .json(&json!({ "email": email, "password": password }));
        self.token_request(req, "Login failed.").await
    }

    pub async fn sign_up(&self, name: &str, email: &str, password: &str) -> AccountResult<String> {
        let req = self
            .client
            .post(format!("{}/api/auth/signup", self.base_url))
            .json(&json!({ "name": name, "email": email, "password": password }));
        self.token_request(req, "Sign up failed.").await
    }

    pub async fn get_user(&self, token: &str) -> AccountResult<Map<String, Value>> {
        let req = self
            .client
            .get(format!("{}/api/auth/user", self.base_url))
            .header(AUTHORIZATION, bearer(token));
        let (status, body) = send(req).await?;

        if !status.is_success() || status == StatusCode::NO_CONTENT {
            return Err(AccountError::Rejected(extract_error(&body, "Failed to fetch user.")));
        }

        let user = ["data", "user"]
            .iter()
            .find_map(|key| body.get(*key).filter(|v| !v.is_null()))
            .unwrap_or(&body);
        match user.as_object() {
            Some(user) if !user.is_empty() => Ok(user.clone()),
            _ => Err(AccountError::Rejected(
                "No user info returned from server.".to_string(),
            )),
        }
    }

    pub async fn get_orders(&self, token: &str, site_id: &str) -> AccountResult<Vec<Order>> {
        if site_id.is_empty() {
            return Err(AccountError::Rejected(SITE_NOT_FOUND.to_string()));
        }

        let url = format!(
            "{}/api/site-orders?siteId={}",
            self.base_url,
            urlencoding::encode(site_id)
        );
        tracing::debug!("Fetching site orders for {}", site_id);

        let req = self.client.get(url).header(AUTHORIZATION, bearer(token));
        let (status, body) = send(req).await?;

        if !status.is_success() {
            return Err(AccountError::Rejected(extract_error(&body, "Failed to fetch orders.")));
        }

        let orders = match body.pointer("/data/orders") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| match Order::deserialize(item) {
                    Ok(order) => Some(order),
                    Err(e) => {
                        tracing::warn!("Skipping malformed order: {}", e);
                        None
                    }
                })
                .collect(),
            Some(_) => {
                return Err(AccountError::Rejected("Invalid orders payload.".to_string()));
            }
        };

        tracing::debug!("Fetched {} orders", orders.len());
        Ok(orders)
    }

    async fn token_request(&self, req: RequestBuilder, fallback: &str) -> AccountResult<String> {
        let (status, body) = send(req).await?;
        match extract_token(&body) {
            Some(token) if status.is_success() => Ok(token),
            _ => Err(AccountError::Rejected(extract_error(&body, fallback))),
        }
    }
}

async fn send(req: RequestBuilder) -> AccountResult<(StatusCode, Value)> {
    let resp = req
        .header(reqwest::header::ACCEPT, "application/json")
        .send()
        .await?;
    let status = resp.status();
    let text = resp.text().await?;
    let body = serde_json::from_str(&text).unwrap_or(Value::Null);
    Ok((status, body))
}

/// `Authorization` header value; tokens already carrying a scheme are kept
fn bearer(token: &str) -> String {
    let token = token.trim();
    if token.to_lowercase().starts_with("bearer") {
        token.to_string()
    } else {
        format!("Bearer {}", token)
    }
}

fn extract_token(body: &Value) -> Option<String> {
    body.get("token")
        .or_else(|| body.pointer("/data/token"))
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

fn extract_error(body: &Value, fallback: &str) -> String {
    ["error", "message", "msg"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str).filter(|m| !m.is_empty()))
        .unwrap_or(fallback)
        .to_string()
}

/// Session-scoped storage for the account token
pub struct SessionStore {
    path: PathBuf,
}

#[derive(Debug, Default, serde::Serialize, Deserialize)]
struct SessionFile {
    #[serde(rename = "authToken", default, skip_serializing_if = "Option::is_none")]
    auth_token: Option<String>,
}

impl SessionStore {
    /// Store under the per-login runtime directory, which the OS clears at
    /// logout, falling back to the cache directory
    pub fn default_location() -> Self {
        let dir = dirs::runtime_dir()
            .or_else(dirs::cache_dir)
            .unwrap_or_else(std::env::temp_dir);
        Self::at(dir.join("omada-voucher").join("session.json"))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn token(&self) -> Option<String> {
        let contents = std::fs::read_to_string(&self.path).ok()?;
        let session: SessionFile = serde_json::from_str(&contents).ok()?;
        session.auth_token
    }

    pub fn set_token(&self, token: &str) -> anyhow::Result<()> {
        use anyhow::Context;

        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        let session = SessionFile {
            auth_token: Some(token.to_string()),
        };
        std::fs::write(&self.path, serde_json::to_string(&session)?)
            .with_context(|| format!("Failed to write {}", self.path.display()))
    }

    pub fn clear(&self) -> anyhow::Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
