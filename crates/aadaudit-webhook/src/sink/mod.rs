// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

pub mod log_analytics;
pub mod stdout;

use async_trait::async_trait;
use thiserror::Error;

use crate::record::EnrichedAuditRecord;

pub use log_analytics::{LogAnalyticsConfig, LogAnalyticsSink};
pub use stdout::StdoutSink;

#[derive(Error, Debug)]
pub enum SinkError {
	#[error("sink transport error: {0}")]
	Transport(String),

	#[error("sink rejected record: {status} - {body}")]
	Rejected { status: u16, body: String },

	#[error("failed to serialize record: {0}")]
	Serialization(#[from] serde_json::Error),

	#[error("invalid sink configuration: {0}")]
	Config(String),
}

/// Destination for enriched records.
///
/// Each call hands over exactly one record. Timeouts belong to the
/// implementation; the caller neither retries nor batches.
#[async_trait]
pub trait TelemetrySink: Send + Sync {
	fn name(&self) -> &str;

	async fn emit(&self, record: EnrichedAuditRecord) -> Result<(), SinkError>;
}
