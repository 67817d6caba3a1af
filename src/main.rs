use std::{sync::Arc, time::Duration};

use anyhow::Context;
use clap::Parser;
use emg::{config::LogFormat, AppConfig, AppState, CliArgs};
use erp_client::{ErpClient, OdooClient, ResponseCache};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing(args: &CliArgs) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_level.clone()));

    match args.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init(),
        LogFormat::Console => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    init_tracing(&args);

    let config = AppConfig::from_args(&args);
    info!(
        version = env!("CARGO_PKG_VERSION"),
        erp_url = %config.erp.url,
        "starting ERP MCP gateway"
    );

    if !config.erp_is_configured() {
        warn!("ERP credentials not configured; tools will fail until ODOO_URL, ODOO_DB, ODOO_USERNAME, and ODOO_PASSWORD are set");
    }
    if config.auth.api_keys.is_empty() {
        warn!("no static API keys configured (API_KEYS is empty)");
    }

    let erp: Arc<dyn ErpClient> = Arc::new(
        OdooClient::new(config.erp.clone())
            .context("building ERP client")?
            .with_cache(ResponseCache::new(config.cache_ttl)),
    );

    let state = AppState::new(&config, erp.clone()).context("building tool registry")?;

    // Probe the ERP once at startup; failure is survivable, the health
    // endpoint keeps reporting it.
    if config.erp_is_configured() {
        match erp.authenticate().await {
            Ok(uid) => info!(uid, "ERP connection verified"),
            Err(error) => warn!(error = %error, "ERP authentication failed at startup"),
        }
    }

    // Expired codes and tokens are also rejected at use; this just keeps
    // the tables from growing without bound.
    let oauth = state.oauth.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            oauth.purge_expired();
        }
    });

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "listening");

    axum::serve(listener, emg::router(state))
        .await
        .context("serving HTTP")?;
    Ok(())
}
