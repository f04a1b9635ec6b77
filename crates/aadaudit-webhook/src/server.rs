// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
	body::Bytes,
	extract::{DefaultBodyLimit, State},
	http::{header, StatusCode},
	response::{IntoResponse, Response},
	routing::{get, post},
	Json, Router,
};
use serde_json::json;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};

use crate::batch::BatchProcessor;
use crate::config::{Config, SinkConfig};
use crate::directory::DirectoryClient;
use crate::enricher::RecordEnricher;
use crate::graph::{GraphDirectoryClient, GraphSetupError};
use crate::health::{health_router, HealthState};
use crate::metrics::Metrics;
use crate::resolver::IdentityResolver;
use crate::sink::{LogAnalyticsSink, SinkError, StdoutSink, TelemetrySink};

#[derive(Error, Debug)]
pub enum ServerError {
	#[error("failed to set up directory client: {0}")]
	Directory(#[from] GraphSetupError),

	#[error("failed to set up sink: {0}")]
	Sink(#[from] SinkError),

	#[error("failed to register metrics: {0}")]
	Metrics(#[from] prometheus::Error),

	#[error("failed to bind {addr}: {source}")]
	Bind {
		addr: SocketAddr,
		#[source]
		source: std::io::Error,
	},

	#[error("server error: {0}")]
	Serve(#[source] std::io::Error),
}

/// Router serving the audit webhook endpoint.
pub fn audit_router(processor: Arc<BatchProcessor>, max_body_bytes: usize) -> Router {
	Router::new()
		.route("/audits", post(ingest_audits))
		.layer(DefaultBodyLimit::max(max_body_bytes))
		.with_state(processor)
}

/// Router serving `/metrics` and `/health`.
pub fn ops_router(metrics: Arc<Metrics>, health: HealthState) -> Router {
	Router::new()
		.route("/metrics", get(metrics_handler))
		.with_state(metrics)
		.merge(health_router(health))
}

async fn ingest_audits(State(processor): State<Arc<BatchProcessor>>, body: Bytes) -> Response {
	match processor.process_batch(&body).await {
		Ok(report) => (StatusCode::OK, Json(report)).into_response(),
		Err(e) => (
			StatusCode::BAD_REQUEST,
			Json(json!({ "error": e.to_string() })),
		)
			.into_response(),
	}
}

async fn metrics_handler(State(metrics): State<Arc<Metrics>>) -> Response {
	match metrics.encode() {
		Ok(body) => (
			StatusCode::OK,
			[(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
			body,
		)
			.into_response(),
		Err(e) => {
			warn!(error = %e, "failed to encode metrics");
			StatusCode::INTERNAL_SERVER_ERROR.into_response()
		}
	}
}

pub fn build_sink(config: &SinkConfig) -> Result<Arc<dyn TelemetrySink>, SinkError> {
	Ok(match config {
		SinkConfig::Stdout => Arc::new(StdoutSink),
		SinkConfig::LogAnalytics(config) => Arc::new(LogAnalyticsSink::new(config.clone())?),
	})
}

/// Wires the pipeline from configuration and serves until Ctrl-C or SIGTERM.
pub async fn run(config: Config) -> Result<(), ServerError> {
	let metrics = Arc::new(Metrics::new()?);
	let health = HealthState::new();

	let directory: Arc<dyn DirectoryClient> = Arc::new(GraphDirectoryClient::new(config.graph_config())?);
	let resolver = Arc::new(IdentityResolver::new(directory));
	let enricher = RecordEnricher::new(config.user_prefix.clone(), resolver);
	let sink = build_sink(&config.sink)?;
	info!(sink = sink.name(), user_prefix = %config.user_prefix, "audit pipeline ready");

	let processor = Arc::new(BatchProcessor::new(
		enricher,
		sink,
		Arc::clone(&metrics),
		health.clone(),
	));

	let ops_addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
	let ops_listener = bind(ops_addr).await?;
	let ops_app = ops_router(metrics, health);
	let ops_server = tokio::spawn(async move {
		info!(%ops_addr, "metrics and health server listening");
		if let Err(e) = axum::serve(ops_listener, ops_app).await {
			warn!(error = %e, "metrics server error");
		}
	});

	let audit_addr = SocketAddr::from(([0, 0, 0, 0], config.listen_port));
	let audit_listener = bind(audit_addr).await?;
	info!(%audit_addr, "audit webhook listening");

	let result = axum::serve(audit_listener, audit_router(processor, config.max_body_bytes))
		.with_graceful_shutdown(shutdown_signal())
		.await
		.map_err(ServerError::Serve);

	ops_server.abort();
	info!("shutdown complete");
	result
}

async fn bind(addr: SocketAddr) -> Result<TcpListener, ServerError> {
	TcpListener::bind(addr)
		.await
		.map_err(|source| ServerError::Bind { addr, source })
}

async fn shutdown_signal() {
	let ctrl_c = async {
		if let Err(e) = signal::ctrl_c().await {
			error!(error = %e, "failed to install Ctrl+C handler");
			std::future::pending::<()>().await;
		}
	};

	#[cfg(unix)]
	let terminate = async {
		match signal::unix::signal(signal::unix::SignalKind::terminate()) {
			Ok(mut sig) => {
				sig.recv().await;
			}
			Err(e) => {
				error!(error = %e, "failed to install SIGTERM handler");
				std::future::pending::<()>().await;
			}
		}
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => info!("received Ctrl+C, shutting down"),
		_ = terminate => info!("received SIGTERM, shutting down"),
	}
}
