// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Per-batch driver: decodes the webhook payload, enriches each record in
//! order and hands the results to the sink.
//!
//! Only a malformed envelope fails a batch. Every other failure is scoped to
//! the record that caused it, logged with that record, and counted in the
//! returned [`ProcessingReport`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::enricher::{EnrichOutcome, RecordEnricher};
use crate::health::HealthState;
use crate::metrics::{Metrics, RecordOutcome};
use crate::record::{AuditEventList, RawAuditRecord};
use crate::sink::TelemetrySink;

#[derive(Error, Debug)]
pub enum BatchError {
	#[error("malformed audit event list: {0}")]
	Malformed(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingReport {
	pub received: usize,
	pub emitted: usize,
	pub skipped: usize,
	pub enrich_failed: usize,
	pub sink_failed: usize,
}

impl ProcessingReport {
	fn new(received: usize) -> Self {
		Self {
			received,
			..Self::default()
		}
	}

	pub fn failed(&self) -> usize {
		self.enrich_failed + self.sink_failed
	}
}

pub struct BatchProcessor {
	enricher: RecordEnricher,
	sink: Arc<dyn TelemetrySink>,
	metrics: Arc<Metrics>,
	health: HealthState,
}

impl BatchProcessor {
	pub fn new(
		enricher: RecordEnricher,
		sink: Arc<dyn TelemetrySink>,
		metrics: Arc<Metrics>,
		health: HealthState,
	) -> Self {
		Self {
			enricher,
			sink,
			metrics,
			health,
		}
	}

	/// Decode one webhook body and process its records.
	#[instrument(skip_all, fields(bytes = raw.len()))]
	pub async fn process_batch(&self, raw: &[u8]) -> Result<ProcessingReport, BatchError> {
		let envelope: AuditEventList = match serde_json::from_slice(raw) {
			Ok(envelope) => envelope,
			Err(e) => {
				warn!(
					error = %e,
					payload = %String::from_utf8_lossy(raw),
					"dropping malformed audit batch"
				);
				self.metrics.record_batch(true, 0);
				self.health.record_batch(true).await;
				return Err(BatchError::Malformed(e));
			}
		};

		let mut report = ProcessingReport::new(envelope.items.len());
		for item in &envelope.items {
			match RawAuditRecord::deserialize(item) {
				Ok(record) => self.process_record(&record, &mut report).await,
				Err(e) => {
					warn!(error = %e, record = %item, "failed to decode audit record");
					report.enrich_failed += 1;
					self.metrics.record_outcome(RecordOutcome::EnrichFailed);
				}
			}
		}

		self.finish(&report).await;
		Ok(report)
	}

	/// Process already-decoded records in their given order.
	pub async fn process(&self, batch: &[RawAuditRecord]) -> ProcessingReport {
		let mut report = ProcessingReport::new(batch.len());
		for record in batch {
			self.process_record(record, &mut report).await;
		}
		self.finish(&report).await;
		report
	}

	async fn process_record(&self, record: &RawAuditRecord, report: &mut ProcessingReport) {
		let enriched = match self.enricher.enrich(record).await {
			Ok(EnrichOutcome::Enriched(enriched)) => enriched,
			Ok(EnrichOutcome::Skipped) => {
				report.skipped += 1;
				self.metrics.record_outcome(RecordOutcome::Skipped);
				return;
			}
			Err(e) => {
				warn!(
					error = %e,
					record = %serde_json::to_string(record).unwrap_or_default(),
					"failed to enrich audit record"
				);
				report.enrich_failed += 1;
				self.metrics.record_outcome(RecordOutcome::EnrichFailed);
				return;
			}
		};

		let request_uri = enriched.request_uri.clone();
		match self.sink.emit(*enriched).await {
			Ok(()) => {
				debug!(sink = self.sink.name(), request_uri = %request_uri, "audit record emitted");
				report.emitted += 1;
				self.metrics.record_outcome(RecordOutcome::Emitted);
				self.health.record_successful_emit().await;
			}
			Err(e) => {
				warn!(
					sink = self.sink.name(),
					error = %e,
					request_uri = %request_uri,
					"failed to emit audit record"
				);
				report.sink_failed += 1;
				self.metrics.record_outcome(RecordOutcome::SinkFailed);
				self.health.record_sink_failure().await;
			}
		}
	}

	async fn finish(&self, report: &ProcessingReport) {
		self.metrics.record_batch(false, report.received);
		self.health.record_batch(false).await;

		let resolver = self.enricher.resolver();
		self
			.metrics
			.set_cache_sizes(resolver.cached_users(), resolver.cached_groups());

		if report.failed() > 0 {
			info!(
				received = report.received,
				emitted = report.emitted,
				skipped = report.skipped,
				enrich_failed = report.enrich_failed,
				sink_failed = report.sink_failed,
				"audit batch processed with failures"
			);
		} else {
			debug!(
				received = report.received,
				emitted = report.emitted,
				skipped = report.skipped,
				"audit batch processed"
			);
		}
	}
}
