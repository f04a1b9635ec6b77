// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use tracing::info;

use crate::record::EnrichedAuditRecord;
use crate::sink::{SinkError, TelemetrySink};

/// Marker that separates audit records from diagnostics in the log stream.
pub const RECORD_MARKER: &str = "[AuditRecord]";

/// Writes each record as a single JSON line through the process log.
#[derive(Debug, Default)]
pub struct StdoutSink;

impl StdoutSink {
	pub fn render(record: &EnrichedAuditRecord) -> Result<String, SinkError> {
		Ok(format!("{RECORD_MARKER} {}", serde_json::to_string(record)?))
	}
}

#[async_trait]
impl TelemetrySink for StdoutSink {
	fn name(&self) -> &str {
		"stdout"
	}

	async fn emit(&self, record: EnrichedAuditRecord) -> Result<(), SinkError> {
		let line = Self::render(&record)?;
		info!(target: "aadaudit::record", "{line}");
		Ok(())
	}
}
