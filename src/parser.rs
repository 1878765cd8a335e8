//! Portal page URL parsing
//!
//! The gateway redirects the client to its portal page with every identifier
//! it knows about encoded in the query string, and the controller/site ids
//! encoded in the path.

use crate::models::PortalIdentity;
use reqwest::Url;
use std::collections::HashMap;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("invalid portal URL '{0}'")]
    InvalidUrl(String),
    #[error("portal URL is missing the '{0}' parameter")]
    MissingParameter(&'static str),
}

impl PortalIdentity {
    /// Build the identity from the portal page URL
    pub fn from_url(page_url: &str) -> Result<Self, ResolveError> {
        let url = Url::parse(page_url).map_err(|_| ResolveError::InvalidUrl(page_url.to_string()))?;
        let params = query_params(&url);

        let text = |key: &str| params.get(key).cloned();
        let number = |key: &str| {
            let raw = params.get(key)?;
            match raw.parse::<i64>() {
                Ok(n) => Some(n),
                Err(_) => {
                    tracing::warn!("Ignoring non-numeric {}: '{}'", key, raw);
                    None
                }
            }
        };

        Ok(Self {
            client_mac: text("clientMac").ok_or(ResolveError::MissingParameter("clientMac"))?,
            ap_mac: text("apMac").ok_or(ResolveError::MissingParameter("apMac"))?,
            gateway_mac: text("gatewayMac"),
            ssid_name: text("ssidName"),
            radio_id: number("radioId"),
            vid: number("vid"),
            origin_url: text("originUrl"),
            preview_site: text("previewSite"),
        })
    }
}

/// Decoded query parameters; the first occurrence of a key wins and empty
/// values count as absent.
fn query_params(url: &Url) -> HashMap<String, String> {
    let mut params = HashMap::new();
    for (key, value) in url.query_pairs() {
        if value.is_empty() {
            continue;
        }
        params
            .entry(key.into_owned())
            .or_insert_with(|| value.into_owned());
    }
    params
}

/// Scheme, host and port of the gateway serving the portal page
pub fn gateway_origin(page_url: &str) -> Result<Url, ResolveError> {
    let invalid = || ResolveError::InvalidUrl(page_url.to_string());
    let url = Url::parse(page_url).map_err(|_| invalid())?;
    if url.cannot_be_a_base() || url.host_str().is_none() {
        return Err(invalid());
    }
    url.join("/").map_err(|_| invalid())
}

/// Controller, site and portal ids from an Omada portal path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OmadaPathInfo {
    pub controller_id: String,
    pub site_id: String,
    pub portal_id: Option<String>,
}

impl OmadaPathInfo {
    /// Parse `.../portal/entry/{controller}/{site}/{portal}`
    pub fn from_url(page_url: &str) -> Option<Self> {
        let url = Url::parse(page_url).ok()?;
        let segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();

        let entry = (1..segments.len())
            .find(|&i| segments[i] == "entry" && segments[i - 1] == "portal")
            .or_else(|| segments.iter().position(|s| *s == "entry"))?;

        let mut ids = segments[entry + 1..].iter().map(|s| s.to_string());
        let controller_id = ids.next()?;
        let site_id = ids.next()?;

        Some(Self {
            controller_id,
            site_id,
            portal_id: ids.next(),
        })
    }
}
