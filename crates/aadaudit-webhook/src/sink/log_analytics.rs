// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Azure Monitor HTTP Data Collector API sink.
//!
//! Every request is signed with the workspace shared key:
//!
//! ```text
//! Authorization: SharedKey <workspace-id>:<base64(HMAC-SHA256(key, string-to-sign))>
//! string-to-sign = "POST\n<content-length>\napplication/json\nx-ms-date:<rfc1123-date>\n/api/logs"
//! ```

use std::time::Duration;

use aadaudit_common_secret::{Secret, SecretString};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::Client;
use sha2::Sha256;
use tracing::{debug, instrument};

use crate::record::EnrichedAuditRecord;
use crate::sink::{SinkError, TelemetrySink};

type HmacSha256 = Hmac<Sha256>;

pub const API_VERSION: &str = "2016-04-01";
pub const DEFAULT_LOG_TYPE: &str = "KubernetesAudit";
const RESOURCE: &str = "/api/logs";
const CONTENT_TYPE: &str = "application/json";
const TIME_GENERATED_FIELD: &str = "timestamp";
const MAX_LOG_TYPE_LEN: usize = 100;

#[derive(Debug, Clone)]
pub struct LogAnalyticsConfig {
	pub workspace_id: String,
	/// Base64 primary or secondary workspace key.
	pub shared_key: SecretString,
	pub log_type: String,
	/// Overrides `https://<workspace>.ods.opinsights.azure.com`.
	pub base_url: Option<String>,
	pub timeout: Duration,
}

impl LogAnalyticsConfig {
	pub fn endpoint(&self) -> String {
		let base = match &self.base_url {
			Some(url) => url.trim_end_matches('/').to_string(),
			None => format!("https://{}.ods.opinsights.azure.com", self.workspace_id),
		};
		format!("{base}{RESOURCE}?api-version={API_VERSION}")
	}
}

/// Log types may only contain letters, digits and underscores.
pub fn is_valid_log_type(log_type: &str) -> bool {
	!log_type.is_empty()
		&& log_type.len() <= MAX_LOG_TYPE_LEN
		&& log_type
			.bytes()
			.all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

pub struct LogAnalyticsSink {
	http: Client,
	workspace_id: String,
	key: Secret<Vec<u8>>,
	log_type: String,
	endpoint: String,
}

impl LogAnalyticsSink {
	pub fn new(config: LogAnalyticsConfig) -> Result<Self, SinkError> {
		if !is_valid_log_type(&config.log_type) {
			return Err(SinkError::Config(format!(
				"invalid log type '{}'",
				config.log_type
			)));
		}

		let key = STANDARD
			.decode(config.shared_key.expose().trim())
			.map_err(|e| SinkError::Config(format!("workspace key is not valid base64: {e}")))?;

		let http = aadaudit_common_http::new_client_with_timeout(config.timeout)
			.map_err(|e| SinkError::Config(format!("failed to build HTTP client: {e}")))?;

		Ok(Self {
			http,
			endpoint: config.endpoint(),
			workspace_id: config.workspace_id,
			key: Secret::new(key),
			log_type: config.log_type,
		})
	}

	fn authorization(&self, date: &str, content_length: usize) -> Result<String, SinkError> {
		let signature = sign(self.key.expose(), date, content_length)?;
		Ok(format!("SharedKey {}:{signature}", self.workspace_id))
	}
}

fn string_to_sign(date: &str, content_length: usize) -> String {
	format!("POST\n{content_length}\n{CONTENT_TYPE}\nx-ms-date:{date}\n{RESOURCE}")
}

fn sign(key: &[u8], date: &str, content_length: usize) -> Result<String, SinkError> {
	let mut mac = HmacSha256::new_from_slice(key)
		.map_err(|e| SinkError::Config(format!("unusable workspace key: {e}")))?;
	mac.update(string_to_sign(date, content_length).as_bytes());
	Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

fn rfc1123_now() -> String {
	Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

#[async_trait]
impl TelemetrySink for LogAnalyticsSink {
	fn name(&self) -> &str {
		"log-analytics"
	}

	#[instrument(skip_all, fields(log_type = %self.log_type))]
	async fn emit(&self, record: EnrichedAuditRecord) -> Result<(), SinkError> {
		let body = serde_json::to_vec(&[&record])?;
		let date = rfc1123_now();
		let authorization = self.authorization(&date, body.len())?;

		let response = self
			.http
			.post(&self.endpoint)
			.header("Content-Type", CONTENT_TYPE)
			.header("Log-Type", &self.log_type)
			.header("x-ms-date", &date)
			.header("time-generated-field", TIME_GENERATED_FIELD)
			.header("Authorization", authorization)
			.body(body)
			.send()
			.await
			.map_err(|e| SinkError::Transport(e.to_string()))?;

		let status = response.status();
		if !status.is_success() {
			let body = response.text().await.unwrap_or_default();
			return Err(SinkError::Rejected {
				status: status.as_u16(),
				body,
			});
		}

		debug!(request_uri = %record.request_uri, "record accepted by Log Analytics");
		Ok(())
	}
}
