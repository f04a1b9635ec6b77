// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

/// Consecutive sink failures after which the service reports itself degraded.
pub const DEGRADED_AFTER_FAILURES: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
	Healthy,
	Degraded,
}

#[derive(Debug, Clone, Serialize)]
pub struct SinkHealth {
	pub status: HealthStatus,
	pub last_successful_emit: Option<String>,
	pub consecutive_failures: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchHealth {
	pub received: u64,
	pub malformed: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
	pub sink: SinkHealth,
	pub batches: BatchHealth,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
	pub status: HealthStatus,
	pub components: ComponentHealth,
}

#[derive(Clone, Default)]
pub struct HealthState {
	inner: Arc<RwLock<HealthStateInner>>,
}

#[derive(Default)]
struct HealthStateInner {
	last_successful_emit: Option<DateTime<Utc>>,
	consecutive_sink_failures: u64,
	batches_received: u64,
	batches_malformed: u64,
}

impl HealthState {
	pub fn new() -> Self {
		Self::default()
	}

	pub async fn record_successful_emit(&self) {
		let mut inner = self.inner.write().await;
		inner.last_successful_emit = Some(Utc::now());
		inner.consecutive_sink_failures = 0;
	}

	pub async fn record_sink_failure(&self) {
		let mut inner = self.inner.write().await;
		inner.consecutive_sink_failures += 1;
	}

	pub async fn record_batch(&self, malformed: bool) {
		let mut inner = self.inner.write().await;
		inner.batches_received += 1;
		if malformed {
			inner.batches_malformed += 1;
		}
	}

	pub async fn get_health(&self) -> HealthResponse {
		let inner = self.inner.read().await;

		let sink_status = if inner.consecutive_sink_failures >= DEGRADED_AFTER_FAILURES {
			HealthStatus::Degraded
		} else {
			HealthStatus::Healthy
		};

		HealthResponse {
			status: sink_status,
			components: ComponentHealth {
				sink: SinkHealth {
					status: sink_status,
					last_successful_emit: inner.last_successful_emit.map(|t| t.to_rfc3339()),
					consecutive_failures: inner.consecutive_sink_failures,
				},
				batches: BatchHealth {
					received: inner.batches_received,
					malformed: inner.batches_malformed,
				},
			},
		}
	}
}

async fn health_handler(State(state): State<HealthState>) -> impl IntoResponse {
	(StatusCode::OK, Json(state.get_health().await))
}

pub fn health_router(state: HealthState) -> Router {
	Router::new()
		.route("/health", get(health_handler))
		.with_state(state)
}
