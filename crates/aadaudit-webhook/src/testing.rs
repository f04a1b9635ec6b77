// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Test doubles shared by the unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Barrier;

use crate::directory::{DirectoryClient, DirectoryError, UserAttributes};
use crate::record::{EnrichedAuditRecord, RawAuditRecord, ResolvedIdentity};
use crate::sink::{SinkError, TelemetrySink};

pub const TEST_PREFIX: &str = "https://sts.windows.net/tenant-1/#";

#[derive(Debug, Clone)]
pub enum FakeEntry {
	User(UserAttributes),
	Group(String),
	NotFound,
	Transient,
}

/// Directory that answers from a fixed table and counts every call.
#[derive(Default)]
pub struct FakeDirectory {
	entries: HashMap<String, FakeEntry>,
	delay: Option<Duration>,
	barrier: Option<Arc<Barrier>>,
	user_calls: AtomicUsize,
	group_calls: AtomicUsize,
}

impl FakeDirectory {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with(mut self, object_id: &str, entry: FakeEntry) -> Self {
		self.entries.insert(object_id.to_string(), entry);
		self
	}

	pub fn with_user(self, object_id: &str, display_name: &str, principal_name: &str) -> Self {
		self.with(
			object_id,
			FakeEntry::User(UserAttributes {
				display_name: display_name.to_string(),
				principal_name: principal_name.to_string(),
			}),
		)
	}

	pub fn with_group(self, object_id: &str, display_name: &str) -> Self {
		self.with(object_id, FakeEntry::Group(display_name.to_string()))
	}

	pub fn with_delay(mut self, delay: Duration) -> Self {
		self.delay = Some(delay);
		self
	}

	/// Every lookup waits until `parties` lookups are in flight.
	pub fn with_barrier(mut self, parties: usize) -> Self {
		self.barrier = Some(Arc::new(Barrier::new(parties)));
		self
	}

	pub fn user_calls(&self) -> usize {
		self.user_calls.load(Ordering::SeqCst)
	}

	pub fn group_calls(&self) -> usize {
		self.group_calls.load(Ordering::SeqCst)
	}

	async fn pause(&self) {
		if let Some(delay) = self.delay {
			tokio::time::sleep(delay).await;
		}
		if let Some(barrier) = &self.barrier {
			barrier.wait().await;
		}
	}
}

#[async_trait]
impl DirectoryClient for FakeDirectory {
	async fn lookup_user(&self, object_id: &str) -> Result<UserAttributes, DirectoryError> {
		self.user_calls.fetch_add(1, Ordering::SeqCst);
		self.pause().await;
		match self.entries.get(object_id) {
			Some(FakeEntry::User(attributes)) => Ok(attributes.clone()),
			Some(FakeEntry::Transient) => Err(DirectoryError::Transient("directory unavailable".to_string())),
			_ => Err(DirectoryError::NotFound),
		}
	}

	async fn lookup_group(&self, object_id: &str) -> Result<String, DirectoryError> {
		self.group_calls.fetch_add(1, Ordering::SeqCst);
		self.pause().await;
		match self.entries.get(object_id) {
			Some(FakeEntry::Group(name)) => Ok(name.clone()),
			Some(FakeEntry::Transient) => Err(DirectoryError::Transient("directory unavailable".to_string())),
			_ => Err(DirectoryError::NotFound),
		}
	}
}

/// Sink that keeps every record, optionally refusing some request URIs.
#[derive(Default)]
pub struct RecordingSink {
	records: Mutex<Vec<EnrichedAuditRecord>>,
	reject_uri: Option<String>,
}

impl RecordingSink {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn rejecting(request_uri: &str) -> Self {
		Self {
			records: Mutex::new(Vec::new()),
			reject_uri: Some(request_uri.to_string()),
		}
	}

	pub fn records(&self) -> Vec<EnrichedAuditRecord> {
		self.records.lock().unwrap().clone()
	}
}

#[async_trait]
impl TelemetrySink for RecordingSink {
	fn name(&self) -> &str {
		"recording"
	}

	async fn emit(&self, record: EnrichedAuditRecord) -> Result<(), SinkError> {
		if self.reject_uri.as_deref() == Some(record.request_uri.as_str()) {
			return Err(SinkError::Rejected {
				status: 503,
				body: "unavailable".to_string(),
			});
		}
		self.records.lock().unwrap().push(record);
		Ok(())
	}
}

pub fn raw_event(username: &str, groups: &[&str], request_uri: &str) -> serde_json::Value {
	json!({
		"kind": "Event",
		"level": "Metadata",
		"stage": "ResponseComplete",
		"requestURI": request_uri,
		"verb": "get",
		"user": {"username": username, "groups": groups},
		"sourceIPs": ["10.0.0.4"],
		"userAgent": "kubectl/v1.29.0",
		"objectRef": {"resource": "pods", "namespace": "default", "name": "web-0"},
		"responseStatus": {"code": 200},
		"stageTimestamp": "2024-03-01T10:00:00Z",
		"annotations": {
			"authorization.k8s.io/decision": "allow",
			"authorization.k8s.io/reason": "RBAC"
		}
	})
}

pub fn raw_record(username: &str, groups: &[&str], request_uri: &str) -> RawAuditRecord {
	serde_json::from_value(raw_event(username, groups, request_uri)).unwrap()
}

pub fn enriched_record(request_uri: &str) -> EnrichedAuditRecord {
	EnrichedAuditRecord {
		timestamp: "2024-03-01T10:00:00Z".parse().unwrap(),
		request_uri: request_uri.to_string(),
		level: "Metadata".to_string(),
		stage: "ResponseComplete".to_string(),
		verb: "get".to_string(),
		user_agent: "kubectl/v1.29.0".to_string(),
		source_ip_address: "10.0.0.4".to_string(),
		full_user_name: format!("{TEST_PREFIX}u-1"),
		identity: ResolvedIdentity {
			object_id: "u-1".to_string(),
			display_name: "Ada Lovelace".to_string(),
			principal_name: "ada@contoso.com".to_string(),
			groups: "team-a".to_string(),
		},
		resource_type: "pods".to_string(),
		resource_name: "web-0".to_string(),
		resource_namespace: "default".to_string(),
		response_status: String::new(),
		response_reason: String::new(),
		response_code: 200,
		authorization_decision: "allow".to_string(),
		authorization_reason: "RBAC".to_string(),
	}
}
