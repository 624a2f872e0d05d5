// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::{Context, Result};
use broker_locator::{
    config::Config,
    directory::CloudDnsProvider,
    discovery::KafkaDiscovery,
    reconciler::Reconciler,
    server::{self, AppState},
};
use clap::Parser;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

fn main() -> Result<()> {
    let config = Config::parse();

    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("broker-locator")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(config))
}

async fn async_main(config: Config) -> Result<()> {
    // Respects RUST_LOG (default: info) and RUST_LOG_FORMAT (text or json)
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }

    config.validate()?;

    info!(
        listen_addr = %config.listen_addr(),
        apply_policy = ?config.apply_policy(),
        record_ttl = config.record_ttl,
        project_override = ?config.project,
        zone_override = ?config.zone,
        "Starting broker locator"
    );

    let discovery = if config.discovery_plaintext {
        debug!("Broker discovery will use plaintext connections");
        KafkaDiscovery::plaintext(config.connect_timeout())
    } else {
        let ca_bundle = config.read_ca_bundle().await?;
        debug!(
            extra_ca = config.discovery_ca_file.is_some(),
            "Broker discovery will use TLS"
        );
        KafkaDiscovery::with_tls(ca_bundle.as_deref(), config.connect_timeout())?
    };

    let directories = CloudDnsProvider::new(reqwest::Client::new(), &config.cloud_dns_endpoint)?;

    let state = AppState {
        discovery: Arc::new(discovery),
        directories: Arc::new(directories),
        reconciler: Reconciler::new(config.apply_policy(), config.record_ttl),
        overrides: config.overrides(),
    };

    let listener = TcpListener::bind(config.listen_addr())
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr()))?;
    info!(listen_addr = %config.listen_addr(), "Trigger service listening");

    if let Err(e) = server::serve(listener, state, shutdown_signal()).await {
        error!("Trigger service exited with error: {e}");
        return Err(e.into());
    }

    info!("Broker locator shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C signal"),
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
                info!("Received SIGTERM signal");
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
