// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
use acp_config::ProvisionerSettings;
use acp_provisioner::{AppState, build_app};
use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "acp-provisioner", version, about = "AI control plane key provisioner")]
struct Args {
    /// Bind address.
    #[arg(long, default_value = "0.0.0.0:8100")]
    bind: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let filter = EnvFilter::try_new(&log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let (settings, warnings) = ProvisionerSettings::from_env();
    for w in &warnings {
        warn!("{w}");
    }

    let state = Arc::new(AppState::from_settings(settings));
    let app = build_app(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind(&args.bind)
        .await
        .with_context(|| format!("bind {}", args.bind))?;
    info!(
        bind = %args.bind,
        litellm = %state.settings.litellm.base_url,
        "acp-provisioner listening"
    );

    axum::serve(listener, app).await.context("serve")
}
