// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::time::Duration;

use aadaudit_common_secret::SecretString;
use thiserror::Error;

use crate::graph::{GraphConfig, DEFAULT_GRAPH_URL, DEFAULT_LOGIN_URL};
use crate::sink::log_analytics::{is_valid_log_type, DEFAULT_LOG_TYPE};
use crate::sink::LogAnalyticsConfig;

#[derive(Error, Debug)]
pub enum ConfigError {
	#[error("missing required environment variable: {0}")]
	MissingEnvVar(String),

	#[error("invalid value for {name}: {message}")]
	InvalidValue { name: String, message: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

const DEFAULT_LISTEN_PORT: u16 = 8080;
const DEFAULT_METRICS_PORT: u16 = 9090;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone)]
pub enum SinkConfig {
	Stdout,
	LogAnalytics(LogAnalyticsConfig),
}

#[derive(Debug, Clone)]
pub struct Config {
	pub tenant_id: String,
	pub client_id: String,
	pub client_secret: SecretString,
	/// Subject-name prefix identifying users of the tenant.
	pub user_prefix: String,
	pub listen_port: u16,
	pub metrics_port: u16,
	pub sink: SinkConfig,
	pub graph_url: String,
	pub login_url: String,
	pub http_timeout: Duration,
	pub max_body_bytes: usize,
}

impl Config {
	pub fn from_env() -> Result<Self> {
		Self::from_lookup(|name| std::env::var(name).ok())
	}

	/// Builds the configuration from an arbitrary variable source.
	pub fn from_lookup<F>(lookup: F) -> Result<Self>
	where
		F: Fn(&str) -> Option<String>,
	{
		let tenant_id = require(&lookup, "AADAUDIT_TENANT_ID")?;
		let client_id = require(&lookup, "AADAUDIT_CLIENT_ID")?;
		let client_secret = SecretString::new(require(&lookup, "AADAUDIT_CLIENT_SECRET")?);

		let user_prefix = optional(
			&lookup,
			"AADAUDIT_USER_PREFIX",
			format!("https://sts.windows.net/{tenant_id}/#"),
		);

		let listen_port: u16 = optional_parse(&lookup, "AADAUDIT_LISTEN_PORT", DEFAULT_LISTEN_PORT)?;
		let metrics_port: u16 = optional_parse(&lookup, "AADAUDIT_METRICS_PORT", DEFAULT_METRICS_PORT)?;
		if listen_port == metrics_port {
			return Err(ConfigError::InvalidValue {
				name: "AADAUDIT_METRICS_PORT".into(),
				message: format!("must differ from AADAUDIT_LISTEN_PORT ({listen_port})"),
			});
		}

		let timeout_secs: u64 =
			optional_parse(&lookup, "AADAUDIT_HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS)?;
		if timeout_secs == 0 {
			return Err(ConfigError::InvalidValue {
				name: "AADAUDIT_HTTP_TIMEOUT_SECS".into(),
				message: "must be greater than zero".into(),
			});
		}
		let http_timeout = Duration::from_secs(timeout_secs);

		let max_body_bytes: usize =
			optional_parse(&lookup, "AADAUDIT_MAX_BODY_BYTES", DEFAULT_MAX_BODY_BYTES)?;

		let sink = sink_config(&lookup, http_timeout)?;

		Ok(Config {
			tenant_id,
			client_id,
			client_secret,
			user_prefix,
			listen_port,
			metrics_port,
			sink,
			graph_url: optional(&lookup, "AADAUDIT_GRAPH_URL", DEFAULT_GRAPH_URL.to_string()),
			login_url: optional(&lookup, "AADAUDIT_LOGIN_URL", DEFAULT_LOGIN_URL.to_string()),
			http_timeout,
			max_body_bytes,
		})
	}

	pub fn graph_config(&self) -> GraphConfig {
		GraphConfig {
			tenant_id: self.tenant_id.clone(),
			client_id: self.client_id.clone(),
			client_secret: self.client_secret.clone(),
			graph_url: self.graph_url.clone(),
			login_url: self.login_url.clone(),
			timeout: self.http_timeout,
		}
	}
}

fn sink_config<F>(lookup: &F, timeout: Duration) -> Result<SinkConfig>
where
	F: Fn(&str) -> Option<String>,
{
	let workspace_id = present(lookup, "AADAUDIT_WORKSPACE_ID");
	let workspace_key = present(lookup, "AADAUDIT_WORKSPACE_KEY");

	let kind = match present(lookup, "AADAUDIT_SINK") {
		Some(kind) => kind,
		None if workspace_id.is_some() && workspace_key.is_some() => "log-analytics".to_string(),
		None => "stdout".to_string(),
	};

	match kind.as_str() {
		"stdout" => Ok(SinkConfig::Stdout),
		"log-analytics" => {
			let workspace_id =
				workspace_id.ok_or_else(|| ConfigError::MissingEnvVar("AADAUDIT_WORKSPACE_ID".into()))?;
			let workspace_key =
				workspace_key.ok_or_else(|| ConfigError::MissingEnvVar("AADAUDIT_WORKSPACE_KEY".into()))?;

			let log_type = optional(lookup, "AADAUDIT_LOG_TYPE", DEFAULT_LOG_TYPE.to_string());
			if !is_valid_log_type(&log_type) {
				return Err(ConfigError::InvalidValue {
					name: "AADAUDIT_LOG_TYPE".into(),
					message: "only letters, digits and underscores, at most 100 characters".into(),
				});
			}

			Ok(SinkConfig::LogAnalytics(LogAnalyticsConfig {
				workspace_id,
				shared_key: SecretString::new(workspace_key),
				log_type,
				base_url: present(lookup, "AADAUDIT_LOG_ANALYTICS_URL"),
				timeout,
			}))
		}
		other => Err(ConfigError::InvalidValue {
			name: "AADAUDIT_SINK".into(),
			message: format!("unknown sink '{other}', expected 'log-analytics' or 'stdout'"),
		}),
	}
}

/// A variable that is set to a non-blank value.
fn present<F>(lookup: &F, name: &str) -> Option<String>
where
	F: Fn(&str) -> Option<String>,
{
	lookup(name).filter(|value| !value.trim().is_empty())
}

fn require<F>(lookup: &F, name: &str) -> Result<String>
where
	F: Fn(&str) -> Option<String>,
{
	present(lookup, name).ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

fn optional<F>(lookup: &F, name: &str, default: String) -> String
where
	F: Fn(&str) -> Option<String>,
{
	present(lookup, name).unwrap_or(default)
}

fn optional_parse<F, T>(lookup: &F, name: &str, default: T) -> Result<T>
where
	F: Fn(&str) -> Option<String>,
	T: std::str::FromStr,
	T::Err: std::fmt::Display,
{
	match present(lookup, name) {
		Some(val) => val.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
			name: name.to_string(),
			message: e.to_string(),
		}),
		None => Ok(default),
	}
}
