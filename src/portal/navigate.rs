//! Landing page navigation for a headless client

use super::Navigator;
use anyhow::{bail, Result};
use async_trait::async_trait;
use reqwest::Client;

/// Loads the landing page the way a browser would after a successful login.
///
/// `replace` fetches the page with the portal session's client so the
/// gateway sees the follow-up request; `assign` hands the URL to the user.
pub struct HttpNavigator {
    client: Client,
}

impl HttpNavigator {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Navigator for HttpNavigator {
    async fn replace(&self, url: &str) -> Result<()> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            bail!("Landing page returned {}", status);
        }
        tracing::info!("Landing page loaded: {} ({})", resp.url(), status);
        Ok(())
    }

    async fn assign(&self, url: &str) {
        tracing::info!("Open {} to continue", url);
        println!("{}", url);
    }
}
