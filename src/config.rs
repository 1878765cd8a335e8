//! Configuration management
//!
//! This module handles loading configuration from TOML files. Every section
//! is optional; missing values fall back to the defaults the Omada portal
//! page itself uses.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    /// HTTP client settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Gateway endpoints and the default portal page URL
    #[serde(default)]
    pub portal: PortalSection,

    /// Voucher error reporting overrides
    #[serde(default)]
    pub voucher: VoucherSection,

    /// Account API used to look up purchased vouchers
    #[serde(default)]
    pub account: AccountSection,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    /// Request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            connect_timeout: default_connect_timeout(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PortalSection {
    /// Portal page URL the gateway redirected to (with its query string)
    #[serde(default)]
    pub url: String,

    #[serde(default = "default_settings_path")]
    pub settings_path: String,

    #[serde(default = "default_auth_path")]
    pub auth_path: String,

    /// Upper bound on the submitted voucher code, in characters
    #[serde(default = "default_max_voucher_length")]
    pub max_voucher_length: usize,
}

impl Default for PortalSection {
    fn default() -> Self {
        Self {
            url: String::new(),
            settings_path: default_settings_path(),
            auth_path: default_auth_path(),
            max_voucher_length: default_max_voucher_length(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct VoucherSection {
    /// Vendor codes that point at a controller misconfiguration
    #[serde(default = "default_misconfiguration_codes")]
    pub misconfiguration_codes: Vec<i64>,

    #[serde(default = "default_misconfiguration_message")]
    pub misconfiguration_message: String,
}

impl Default for VoucherSection {
    fn default() -> Self {
        Self {
            misconfiguration_codes: default_misconfiguration_codes(),
            misconfiguration_message: default_misconfiguration_message(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AccountSection {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
}

impl Default for AccountSection {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
        }
    }
}

// Default value functions
fn default_timeout_ms() -> u64 {
    15_000
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_settings_path() -> String {
    "/portal/getPortalPageSetting".to_string()
}

fn default_auth_path() -> String {
    "/portal/auth".to_string()
}

fn default_max_voucher_length() -> usize {
    2000
}

fn default_misconfiguration_codes() -> Vec<i64> {
    vec![-41500, -41533, -41538]
}

fn default_misconfiguration_message() -> String {
    "Voucher authentication failed on the controller. \
     Please verify that Voucher is enabled and configured for this SSID/site."
        .to_string()
}

fn default_api_base_url() -> String {
    "https://quota-management--quota-management-3be9d.asia-east1.hosted.app".to_string()
}

impl Config {
    /// Load configuration from `explicit`, or the first file found in the
    /// usual locations, or use defaults if there is none
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        let config_paths = vec![
            PathBuf::from("config.toml"),
            PathBuf::from("/etc/omada-voucher/config.toml"),
            dirs::config_dir()
                .map(|c| c.join("omada-voucher/config.toml"))
                .unwrap_or_default(),
        ];

        for path in &config_paths {
            if path.is_file() {
                return Self::from_file(path);
            }
        }

        tracing::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn from_file(path: &Path) -> Result<Self> {
        tracing::debug!("Loading config from: {}", path.display());
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }
}
