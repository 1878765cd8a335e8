//! omada-voucher - voucher login client for Omada captive portals
//!
//! Performs the portal page's handshake from the command line: fetch the
//! portal settings, check that voucher access is enabled, submit a voucher
//! and follow the gateway to the landing page.

mod account;
mod config;
mod http;
mod models;
mod parser;
mod portal;

use account::{AccountClient, SessionStore};
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use http::HttpClient;
use models::PortalIdentity;
use parser::OmadaPathInfo;
use portal::{
    ConsoleNotifier, Endpoints, ErrorTranslator, HttpNavigator, Notifier, ReadySignal,
    SettingsFetcher, SubmitHooks, VoucherSubmitter,
};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "omada-voucher")]
#[command(about = "Voucher login client for Omada captive portals", long_about = None)]
struct Args {
    /// Config file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Portal page URL the gateway redirected to (overrides portal.url)
    #[arg(short, long)]
    portal_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch the portal settings and report whether vouchers are accepted
    Status,
    /// Authenticate with a voucher code
    Voucher {
        code: String,
    },
    /// Log in to the account service (or sign up when --name is given)
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        name: Option<String>,
    },
    /// Redeem the voucher of a purchased order for this site
    Redeem {
        /// Index of the order to use, as listed
        #[arg(long, default_value_t = 0)]
        order: usize,
    },
    /// Forget the stored account token
    Logout,
}

/// Everything needed to talk to one gateway
struct Session {
    cfg: config::Config,
    page_url: String,
    identity: PortalIdentity,
    endpoints: Endpoints,
    http: Arc<HttpClient>,
    notifier: Arc<ConsoleNotifier>,
}

impl Session {
    fn new(cfg: config::Config, page_url: Option<String>) -> Result<Self> {
        let page_url = page_url
            .or_else(|| Some(cfg.portal.url.clone()).filter(|u| !u.is_empty()))
            .context("No portal URL given; pass --portal-url or set portal.url")?;

        let identity = PortalIdentity::from_url(&page_url)?;
        let endpoints = Endpoints::from_page_url(&page_url, &cfg.portal)?;
        let http = Arc::new(HttpClient::new(&cfg.http)?);

        tracing::debug!("Client {} via AP {}", identity.client_mac, identity.ap_mac);
        if identity.preview_site.as_deref() == Some("true") {
            tracing::warn!("Portal page is in preview mode; the gateway may refuse logins");
        }

        Ok(Self {
            cfg,
            page_url,
            identity,
            endpoints,
            http,
            notifier: Arc::new(ConsoleNotifier),
        })
    }

    fn fetch_settings(&self) -> ReadySignal {
        SettingsFetcher::new(
            self.http.clone(),
            self.notifier.clone(),
            self.endpoints.settings_url.clone(),
        )
        .spawn(self.identity.clone())
    }

    async fn submit_voucher(&self, settings: &ReadySignal, code: &str) -> Result<()> {
        if settings.get().is_none() {
            tracing::info!("Waiting for portal settings...");
        }
        let readiness = settings.wait().await;
        if readiness.block_access {
            bail!("Voucher access is not enabled for this portal");
        }

        let submitter = VoucherSubmitter::new(
            self.http.clone(),
            self.notifier.clone(),
            Arc::new(HttpNavigator::new(self.http.client().clone())),
            self.identity.clone(),
            self.endpoints.auth_url.clone(),
        )
        .with_config(&readiness.config)
        .with_translator(ErrorTranslator::new(&self.cfg.voucher))
        .with_max_code_length(self.cfg.portal.max_voucher_length);

        // The notifier has already shown the reason
        if let Err(failure) = submitter.submit_with(Some(code), &mut ConsoleHooks).await {
            bail!("Voucher authentication failed ({:?})", failure.kind);
        }
        Ok(())
    }

    fn account(&self) -> AccountClient {
        AccountClient::new(self.http.client().clone(), &self.cfg.account.api_base_url)
    }
}

/// Lifecycle output for interactive use. Failures are left to the notifier.
struct ConsoleHooks;

impl SubmitHooks for ConsoleHooks {
    fn on_start(&mut self) {
        tracing::info!("Authenticating...");
    }

    fn on_success(&mut self, _result: &Value) {
        println!("Authentication successful! Redirecting...");
    }

    fn on_done(&mut self) {
        tracing::debug!("Authentication attempt finished");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let cfg = config::Config::load(args.config.as_deref())?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&cfg.logging.level)),
        )
        .init();

    tracing::info!("omada-voucher v{}", env!("CARGO_PKG_VERSION"));

    let store = SessionStore::default_location();
    match args.command {
        Command::Logout => {
            store.clear()?;
            tracing::info!("Logged out ({} removed)", store.path().display());
            Ok(())
        }
        Command::Status => run_status(&Session::new(cfg, args.portal_url)?).await,
        Command::Voucher { code } => {
            let session = Session::new(cfg, args.portal_url)?;
            let settings = session.fetch_settings();
            session.submit_voucher(&settings, &code).await
        }
        Command::Login {
            email,
            password,
            name,
        } => {
            let http = HttpClient::new(&cfg.http)?;
            let account = AccountClient::new(http.client().clone(), &cfg.account.api_base_url);
            run_login(&account, &store, &email, &password, name.as_deref()).await
        }
        Command::Redeem { order } => {
            let session = Session::new(cfg, args.portal_url)?;
            run_redeem(&session, &store, order).await
        }
    }
}

async fn run_status(session: &Session) -> Result<()> {
    let readiness = session.fetch_settings().wait().await;

    if let Some(err) = &readiness.error {
        tracing::warn!("Portal settings could not be loaded: {}", err);
    }
    let config = &readiness.config;
    println!("auth type:      {:?}", config.auth_type);
    println!("hotspot types:  {:?}", config.hotspot_types);
    println!("button text:    {}", config.button_text);
    println!("form auth:      {} ({})", config.form_auth, config.form_auth_button_text);
    println!("gateway state:  {}", config.error_state);
    println!("country code:   {}", config.country_code);
    println!("landing url:    {}", config.landing_url.as_deref().unwrap_or("-"));
    println!("voucher access: {}", if readiness.voucher_enabled { "enabled" } else { "disabled" });

    if readiness.block_access {
        bail!("Voucher access is not enabled for this portal");
    }
    Ok(())
}

async fn run_login(
    account: &AccountClient,
    store: &SessionStore,
    email: &str,
    password: &str,
    name: Option<&str>,
) -> Result<()> {
    let token = match name {
        Some(name) => account.sign_up(name, email, password).await?,
        None => account.login(email, password).await?,
    };
    store.set_token(&token)?;

    match account.get_user(&token).await {
        Ok(user) => {
            let shown = user.get("email").and_then(Value::as_str).unwrap_or(email);
            println!("Logged in as {}", shown);
        }
        Err(e) => {
            tracing::warn!("Could not fetch user info: {}", e);
            println!("Logged in as {}", email);
        }
    }
    Ok(())
}

async fn run_redeem(session: &Session, store: &SessionStore, index: usize) -> Result<()> {
    let token = store
        .token()
        .context("Not authenticated. Run `omada-voucher login` first.")?;
    let path_info = OmadaPathInfo::from_url(&session.page_url)
        .context("Site not found. Please contact technical support.")?;
    tracing::debug!(
        "Controller {} site {} portal {}",
        path_info.controller_id,
        path_info.site_id,
        path_info.portal_id.as_deref().unwrap_or("-")
    );
    let site_id = path_info.site_id;

    // Settings load while the account service is queried
    let settings = session.fetch_settings();
    let orders = session.account().get_orders(&token, &site_id).await?;

    if orders.is_empty() {
        bail!("No orders found.");
    }
    for (i, order) in orders.iter().enumerate() {
        tracing::info!(
            "[{}] {} {} (valid until {}, speed {})",
            i,
            order.label(),
            order.description.as_deref().unwrap_or(""),
            order.valid_until.as_deref().unwrap_or("N/A"),
            order.speed.as_ref().map(|v| v.to_string()).unwrap_or_else(|| "N/A".to_string())
        );
    }

    let order = orders
        .get(index)
        .with_context(|| format!("No order #{} (found {})", index, orders.len()))?;
    let Some(code) = order.voucher_code() else {
        session
            .notifier
            .show_hint("Selected order has no voucher code. Please contact support.");
        bail!("Order '{}' has no voucher code", order.label());
    };

    session.submit_voucher(&settings, code).await
}
