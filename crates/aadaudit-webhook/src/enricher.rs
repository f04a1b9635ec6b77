// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Turns one raw audit record into an enriched record, or skips it.

use std::sync::Arc;

use thiserror::Error;

use crate::directory::DirectoryError;
use crate::record::{EnrichedAuditRecord, RawAuditRecord, ResolvedIdentity};
use crate::resolver::IdentityResolver;

/// Joins resolved groups and multiple source addresses. Neither directory
/// display names nor cluster group names contain it.
pub const FIELD_DELIMITER: &str = "|";

/// Group field of a user whose group list is empty.
pub const NO_GROUPS: &str = "NONE";

/// Source address field when the API server reported none.
pub const UNKNOWN_SOURCE: &str = "UNKNOWN";

#[derive(Debug)]
pub enum EnrichOutcome {
	Enriched(Box<EnrichedAuditRecord>),
	/// The subject is not a user of the configured identity provider.
	Skipped,
}

#[derive(Error, Debug)]
pub enum EnrichError {
	#[error("subject name carries the identity-provider prefix but no object identifier")]
	EmptyObjectId,

	#[error("failed to resolve user {object_id}: {source}")]
	User {
		object_id: String,
		#[source]
		source: DirectoryError,
	},

	#[error("failed to resolve group {group}: {source}")]
	Group {
		group: String,
		#[source]
		source: DirectoryError,
	},
}

pub struct RecordEnricher {
	user_prefix: String,
	resolver: Arc<IdentityResolver>,
}

impl RecordEnricher {
	pub fn new(user_prefix: impl Into<String>, resolver: Arc<IdentityResolver>) -> Self {
		Self {
			user_prefix: user_prefix.into(),
			resolver,
		}
	}

	pub fn resolver(&self) -> &IdentityResolver {
		&self.resolver
	}

	/// The object identifier following the identity-provider prefix, or
	/// `None` when the subject does not start with the prefix.
	pub fn object_id<'a>(&self, subject_name: &'a str) -> Option<&'a str> {
		subject_name.strip_prefix(self.user_prefix.as_str())
	}

	pub async fn enrich(&self, record: &RawAuditRecord) -> Result<EnrichOutcome, EnrichError> {
		let Some(object_id) = self.object_id(&record.user.subject_name) else {
			return Ok(EnrichOutcome::Skipped);
		};
		if object_id.is_empty() {
			return Err(EnrichError::EmptyObjectId);
		}

		let user = self
			.resolver
			.resolve_user(object_id)
			.await
			.map_err(|source| EnrichError::User {
				object_id: object_id.to_string(),
				source,
			})?;

		let groups = self.resolve_groups(&record.user.group_identifiers).await?;

		let object_ref = record.object_ref.clone().unwrap_or_default();
		let response = record.response_status.clone().unwrap_or_default();
		let authorization = record.annotations.clone().unwrap_or_default();

		Ok(EnrichOutcome::Enriched(Box::new(EnrichedAuditRecord {
			timestamp: record.stage_timestamp,
			request_uri: record.request_uri.clone(),
			level: record.level.clone(),
			stage: record.stage.clone(),
			verb: record.verb.clone(),
			user_agent: record.user_agent.clone(),
			source_ip_address: join_source_addresses(&record.source_ips),
			full_user_name: record.user.subject_name.clone(),
			identity: ResolvedIdentity {
				object_id: object_id.to_string(),
				display_name: user.display_name,
				principal_name: user.principal_name,
				groups,
			},
			resource_type: object_ref.resource,
			resource_name: object_ref.name,
			resource_namespace: object_ref.namespace,
			response_status: response.status,
			response_reason: response.reason,
			response_code: response.code,
			authorization_decision: authorization.decision,
			authorization_reason: authorization.reason,
		})))
	}

	async fn resolve_groups(&self, groups: &[String]) -> Result<String, EnrichError> {
		if groups.is_empty() {
			return Ok(NO_GROUPS.to_string());
		}

		let mut labels = Vec::with_capacity(groups.len());
		for group in groups {
			let label = self
				.resolver
				.resolve_group_label(group)
				.await
				.map_err(|source| EnrichError::Group {
					group: group.clone(),
					source,
				})?;
			labels.push(label);
		}
		Ok(labels.join(FIELD_DELIMITER))
	}
}

pub fn join_source_addresses(addresses: &[String]) -> String {
	match addresses {
		[] => UNKNOWN_SOURCE.to_string(),
		[only] => only.clone(),
		many => many.join(FIELD_DELIMITER),
	}
}
