// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Kubernetes audit records as received, and the enriched records we emit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Body of one audit webhook POST (`audit.k8s.io/v1` `EventList`).
///
/// Items stay as raw JSON so that one undecodable event does not reject the
/// whole batch.
#[derive(Debug, Deserialize)]
pub struct AuditEventList {
	#[serde(default)]
	pub kind: Option<String>,
	pub items: Vec<serde_json::Value>,
}

/// Identity as reported by the API server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawIdentity {
	#[serde(rename = "username", default)]
	pub subject_name: String,
	#[serde(rename = "groups", default)]
	pub group_identifiers: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRef {
	#[serde(default)]
	pub resource: String,
	#[serde(default)]
	pub namespace: String,
	#[serde(default)]
	pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseStatus {
	#[serde(default)]
	pub status: String,
	#[serde(default)]
	pub reason: String,
	#[serde(default)]
	pub code: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationAnnotations {
	#[serde(rename = "authorization.k8s.io/decision", default)]
	pub decision: String,
	#[serde(rename = "authorization.k8s.io/reason", default)]
	pub reason: String,
}

/// One audit event. Read by the pipeline, never modified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAuditRecord {
	pub stage_timestamp: DateTime<Utc>,
	#[serde(default)]
	pub level: String,
	#[serde(default)]
	pub stage: String,
	#[serde(rename = "requestURI", default)]
	pub request_uri: String,
	#[serde(default)]
	pub verb: String,
	#[serde(default)]
	pub user: RawIdentity,
	#[serde(rename = "sourceIPs", default)]
	pub source_ips: Vec<String>,
	#[serde(default)]
	pub user_agent: String,
	#[serde(default)]
	pub object_ref: Option<ObjectRef>,
	#[serde(default)]
	pub response_status: Option<ResponseStatus>,
	#[serde(default)]
	pub annotations: Option<AuthorizationAnnotations>,
}

/// Directory attributes of the acting user plus the rendered group list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedIdentity {
	#[serde(rename = "userObjectId")]
	pub object_id: String,
	#[serde(rename = "userDisplayName")]
	pub display_name: String,
	#[serde(rename = "userPrincipalName")]
	pub principal_name: String,
	#[serde(rename = "userGroups")]
	pub groups: String,
}

/// The record handed to the telemetry sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedAuditRecord {
	pub timestamp: DateTime<Utc>,
	#[serde(rename = "requestURI")]
	pub request_uri: String,
	pub level: String,
	pub stage: String,
	pub verb: String,
	pub user_agent: String,
	#[serde(rename = "sourceIPAddress")]
	pub source_ip_address: String,
	pub full_user_name: String,
	#[serde(flatten)]
	pub identity: ResolvedIdentity,
	pub resource_type: String,
	pub resource_name: String,
	pub resource_namespace: String,
	pub response_status: String,
	pub response_reason: String,
	pub response_code: i32,
	pub authorization_decision: String,
	pub authorization_reason: String,
}
