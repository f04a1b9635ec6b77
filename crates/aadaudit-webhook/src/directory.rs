// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Contract the identity resolver requires from a directory service.

use async_trait::async_trait;
use thiserror::Error;

/// Human-readable attributes of a directory user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAttributes {
	pub display_name: String,
	pub principal_name: String,
}

#[derive(Error, Debug, Clone)]
pub enum DirectoryError {
	/// The directory has no object with this identifier.
	#[error("directory object not found")]
	NotFound,

	#[error("transient directory error: {0}")]
	Transient(String),

	#[error("failed to obtain directory access token: {0}")]
	Token(String),
}

/// Remote user and group lookups by object identifier.
///
/// Implementations own transport, authentication and timeouts. `NotFound`
/// must only be returned when the directory positively reports that the
/// object does not exist.
#[async_trait]
pub trait DirectoryClient: Send + Sync {
	async fn lookup_user(&self, object_id: &str) -> Result<UserAttributes, DirectoryError>;

	/// Returns the group's display name.
	async fn lookup_group(&self, object_id: &str) -> Result<String, DirectoryError>;
}
