// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use aadaudit_webhook::config::{Config, SinkConfig};
use aadaudit_webhook::server;
use anyhow::Result;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
	tracing_subscriber::registry()
		.with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
		.with(tracing_subscriber::fmt::layer().json())
		.init();

	info!(version = env!("CARGO_PKG_VERSION"), "Starting aadaudit-webhook");

	let config = Config::from_env()?;
	info!(
		tenant_id = %config.tenant_id,
		listen_port = config.listen_port,
		metrics_port = config.metrics_port,
		sink = match config.sink {
			SinkConfig::Stdout => "stdout",
			SinkConfig::LogAnalytics(_) => "log-analytics",
		},
		"Loaded configuration"
	);

	server::run(config).await?;
	Ok(())
}
