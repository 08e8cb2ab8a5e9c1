// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
use acp_config::ReaperSettings;
use acp_reaper::http::{HttpState, build_app};
use acp_reaper::{Reaper, ReaperState};
use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "acp-reaper", version, about = "AI control plane idle workspace reaper")]
struct Args {
    /// Bind address for the health/status surface.
    #[arg(long, default_value = "0.0.0.0:8200")]
    bind: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let filter = EnvFilter::try_new(&log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let (settings, warnings) = ReaperSettings::from_env();
    for w in &warnings {
        warn!("{w}");
    }

    // Without a session token the loop cannot act; keep the process up so
    // the health endpoint can report unhealthy.
    let healthy = settings.coder.session_token.is_some();
    let reaper_state = if healthy {
        let reaper = Reaper::new(settings.clone());
        let state = reaper.state();
        tokio::spawn(reaper.run());
        state
    } else {
        error!("CODER_SESSION_TOKEN is not set; reaper loop disabled");
        Arc::new(RwLock::new(ReaperState::new()))
    };

    let app = build_app(Arc::new(HttpState {
        reaper_state,
        settings: settings.clone(),
        healthy,
    }));

    let listener = tokio::net::TcpListener::bind(&args.bind)
        .await
        .with_context(|| format!("bind {}", args.bind))?;
    info!(
        bind = %args.bind,
        coder = %settings.coder.base_url,
        dry_run = settings.dry_run,
        "acp-reaper listening"
    );

    axum::serve(listener, app).await.context("serve")
}
