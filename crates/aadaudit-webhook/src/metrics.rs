// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use prometheus::{CounterVec, Encoder, GaugeVec, Histogram, HistogramOpts, Opts, Registry, TextEncoder};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
	Emitted,
	Skipped,
	EnrichFailed,
	SinkFailed,
}

impl RecordOutcome {
	pub fn as_label(self) -> &'static str {
		match self {
			RecordOutcome::Emitted => "emitted",
			RecordOutcome::Skipped => "skipped",
			RecordOutcome::EnrichFailed => "enrich_failed",
			RecordOutcome::SinkFailed => "sink_failed",
		}
	}
}

pub struct Metrics {
	registry: Registry,

	pub batches: CounterVec,
	pub batch_records: Histogram,
	pub records: CounterVec,
	pub directory_cache_entries: GaugeVec,
}

impl Metrics {
	pub fn new() -> Result<Self, prometheus::Error> {
		let registry = Registry::new();

		let batches = CounterVec::new(
			Opts::new("aadaudit_batches_total", "Audit batches received"),
			&["outcome"],
		)?;
		registry.register(Box::new(batches.clone()))?;

		let batch_records = Histogram::with_opts(
			HistogramOpts::new("aadaudit_batch_records", "Records per audit batch").buckets(vec![
				1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0,
			]),
		)?;
		registry.register(Box::new(batch_records.clone()))?;

		let records = CounterVec::new(
			Opts::new("aadaudit_records_total", "Audit records processed"),
			&["outcome"],
		)?;
		registry.register(Box::new(records.clone()))?;

		let directory_cache_entries = GaugeVec::new(
			Opts::new(
				"aadaudit_directory_cache_entries",
				"Resolved directory identifiers held in memory",
			),
			&["kind"],
		)?;
		registry.register(Box::new(directory_cache_entries.clone()))?;

		Ok(Metrics {
			registry,
			batches,
			batch_records,
			records,
			directory_cache_entries,
		})
	}

	pub fn record_batch(&self, malformed: bool, record_count: usize) {
		self
			.batches
			.with_label_values(&[if malformed { "malformed" } else { "accepted" }])
			.inc();
		if !malformed {
			self.batch_records.observe(record_count as f64);
		}
	}

	pub fn record_outcome(&self, outcome: RecordOutcome) {
		self.records.with_label_values(&[outcome.as_label()]).inc();
	}

	pub fn set_cache_sizes(&self, users: usize, groups: usize) {
		self
			.directory_cache_entries
			.with_label_values(&["user"])
			.set(users as f64);
		self
			.directory_cache_entries
			.with_label_values(&["group"])
			.set(groups as f64);
	}

	pub fn encode(&self) -> Result<String, prometheus::Error> {
		let encoder = TextEncoder::new();
		let metric_families = self.registry.gather();
		let mut buffer = Vec::new();
		encoder.encode(&metric_families, &mut buffer)?;
		String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
	}
}
