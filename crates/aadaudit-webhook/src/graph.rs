// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Microsoft Graph implementation of [`DirectoryClient`].
//!
//! Authenticates with the OAuth2 client-credentials grant and reuses the
//! access token until shortly before it expires.

use std::time::Duration;

use aadaudit_common_secret::SecretString;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::directory::{DirectoryClient, DirectoryError, UserAttributes};

pub const DEFAULT_GRAPH_URL: &str = "https://graph.microsoft.com";
pub const DEFAULT_LOGIN_URL: &str = "https://login.microsoftonline.com";

/// A cached token is refreshed once it is this close to expiry.
const TOKEN_EXPIRY_SKEW_SECS: i64 = 60;

const USER_SELECT: &str = "displayName,userPrincipalName";
const GROUP_SELECT: &str = "displayName";

#[derive(Debug, Clone)]
pub struct GraphConfig {
	pub tenant_id: String,
	pub client_id: String,
	pub client_secret: SecretString,
	pub graph_url: String,
	pub login_url: String,
	pub timeout: Duration,
}

#[derive(Error, Debug)]
pub enum GraphSetupError {
	#[error("invalid {name} URL '{url}': {source}")]
	InvalidUrl {
		name: &'static str,
		url: String,
		#[source]
		source: url::ParseError,
	},

	#[error("{0} URL cannot carry a path")]
	NotABase(&'static str),

	#[error("failed to build HTTP client: {0}")]
	Http(#[from] reqwest::Error),
}

#[derive(Deserialize)]
struct TokenResponse {
	access_token: String,
	expires_in: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphUser {
	display_name: Option<String>,
	user_principal_name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphGroup {
	display_name: Option<String>,
}

struct CachedToken {
	token: SecretString,
	expires_at: DateTime<Utc>,
}

impl CachedToken {
	fn is_valid(&self) -> bool {
		Utc::now() + chrono::Duration::seconds(TOKEN_EXPIRY_SKEW_SECS) < self.expires_at
	}
}

pub struct GraphDirectoryClient {
	http: Client,
	graph_base: Url,
	token_url: Url,
	client_id: String,
	client_secret: SecretString,
	scope: String,
	cached_token: RwLock<Option<CachedToken>>,
}

fn parse_base(name: &'static str, raw: &str) -> Result<Url, GraphSetupError> {
	let url = Url::parse(raw).map_err(|source| GraphSetupError::InvalidUrl {
		name,
		url: raw.to_string(),
		source,
	})?;
	if url.cannot_be_a_base() {
		return Err(GraphSetupError::NotABase(name));
	}
	Ok(url)
}

impl GraphDirectoryClient {
	pub fn new(config: GraphConfig) -> Result<Self, GraphSetupError> {
		let graph_base = parse_base("graph", &config.graph_url)?;

		let mut token_url = parse_base("login", &config.login_url)?;
		token_url
			.path_segments_mut()
			.map_err(|_| GraphSetupError::NotABase("login"))?
			.pop_if_empty()
			.extend([config.tenant_id.as_str(), "oauth2", "v2.0", "token"]);

		let scope = format!("{}/.default", config.graph_url.trim_end_matches('/'));
		let http = aadaudit_common_http::new_client_with_timeout(config.timeout)?;

		Ok(Self {
			http,
			graph_base,
			token_url,
			client_id: config.client_id,
			client_secret: config.client_secret,
			scope,
			cached_token: RwLock::new(None),
		})
	}

	pub fn token_url(&self) -> &Url {
		&self.token_url
	}

	fn object_url(&self, collection: &str, object_id: &str, select: &str) -> Result<Url, DirectoryError> {
		let mut url = self.graph_base.clone();
		url
			.path_segments_mut()
			.map_err(|_| DirectoryError::Transient("graph URL cannot carry a path".to_string()))?
			.pop_if_empty()
			.extend(["v1.0", collection, object_id]);
		url.set_query(Some(&format!("$select={select}")));
		Ok(url)
	}

	async fn access_token(&self) -> Result<SecretString, DirectoryError> {
		{
			let cached = self.cached_token.read().await;
			if let Some(ref token) = *cached {
				if token.is_valid() {
					return Ok(token.token.clone());
				}
			}
		}

		let mut cached = self.cached_token.write().await;
		if let Some(ref token) = *cached {
			if token.is_valid() {
				return Ok(token.token.clone());
			}
		}

		let response = self.fetch_token().await?;
		let token = SecretString::new(response.access_token);
		let expires_at = Utc::now() + chrono::Duration::seconds(response.expires_in);
		*cached = Some(CachedToken {
			token: token.clone(),
			expires_at,
		});
		debug!(expires_at = %expires_at, "obtained directory access token");
		Ok(token)
	}

	async fn fetch_token(&self) -> Result<TokenResponse, DirectoryError> {
		let form = [
			("grant_type", "client_credentials"),
			("client_id", self.client_id.as_str()),
			("client_secret", self.client_secret.expose().as_str()),
			("scope", self.scope.as_str()),
		];

		let response = self
			.http
			.post(self.token_url.clone())
			.form(&form)
			.send()
			.await
			.map_err(|e| DirectoryError::Token(e.to_string()))?;

		let status = response.status();
		if !status.is_success() {
			let body = response.text().await.unwrap_or_default();
			return Err(DirectoryError::Token(format!("status {status}: {body}")));
		}

		response
			.json()
			.await
			.map_err(|e| DirectoryError::Token(format!("undecodable token response: {e}")))
	}

	/// Drop the cached token if it is still the one the directory rejected.
	/// A token another lookup refreshed in the meantime is kept.
	async fn invalidate_token(&self, rejected: &SecretString) {
		let mut cached = self.cached_token.write().await;
		if cached
			.as_ref()
			.is_some_and(|current| current.token.expose() == rejected.expose())
		{
			*cached = None;
		}
	}

	async fn get_object<T: DeserializeOwned>(&self, url: Url) -> Result<T, DirectoryError> {
		let token = self.access_token().await?;

		let response = self
			.http
			.get(url)
			.bearer_auth(token.expose())
			.send()
			.await
			.map_err(|e| DirectoryError::Transient(e.to_string()))?;

		let status = response.status();
		match status {
			s if s.is_success() => response
				.json()
				.await
				.map_err(|e| DirectoryError::Transient(format!("undecodable directory response: {e}"))),
			// Graph answers 400 for identifiers it cannot parse as object ids.
			StatusCode::NOT_FOUND | StatusCode::BAD_REQUEST => Err(DirectoryError::NotFound),
			StatusCode::UNAUTHORIZED => {
				warn!("directory rejected access token, discarding it");
				self.invalidate_token(&token).await;
				Err(DirectoryError::Transient(format!("status {status}")))
			}
			_ => {
				let body = response.text().await.unwrap_or_default();
				Err(DirectoryError::Transient(format!("status {status}: {body}")))
			}
		}
	}
}

#[async_trait]
impl DirectoryClient for GraphDirectoryClient {
	#[instrument(skip(self))]
	async fn lookup_user(&self, object_id: &str) -> Result<UserAttributes, DirectoryError> {
		let url = self.object_url("users", object_id, USER_SELECT)?;
		let user: GraphUser = self.get_object(url).await?;
		Ok(UserAttributes {
			display_name: user.display_name.unwrap_or_default(),
			principal_name: user.user_principal_name.unwrap_or_default(),
		})
	}

	#[instrument(skip(self))]
	async fn lookup_group(&self, object_id: &str) -> Result<String, DirectoryError> {
		let url = self.object_url("groups", object_id, GROUP_SELECT)?;
		let group: GraphGroup = self.get_object(url).await?;
		match group.display_name.filter(|name| !name.trim().is_empty()) {
			Some(name) => Ok(name),
			None => {
				debug!(object_id, "group has no display name, labelling it by id");
				Ok(object_id.to_string())
			}
		}
	}
}
