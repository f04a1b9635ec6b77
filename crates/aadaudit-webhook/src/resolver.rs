// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Cache-backed resolution of directory object identifiers.
//!
//! Object identifiers are immutable once the directory assigns them, so
//! resolved entries are never invalidated or evicted. A miss installs a
//! shared in-flight lookup for its key: the map lock is only held long
//! enough to find or create that entry, and every caller that arrives while
//! the lookup runs awaits the same attempt and receives its outcome, error
//! included. Lookups for different keys run in parallel.
//!
//! A failed (non-`NotFound`) lookup removes its entry once it settles, so
//! the next record that needs the identifier tries again.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, warn};

use crate::classifier::is_directory_identifier;
use crate::directory::{DirectoryClient, DirectoryError, UserAttributes};

pub const UNKNOWN_USER_LABEL: &str = "Unknown AAD User ID";
pub const UNKNOWN_GROUP_LABEL: &str = "Unknown AAD Group ID";

/// Label used for an identifier the directory does not know.
pub fn unknown_label(kind_label: &str, object_id: &str) -> String {
	format!("{kind_label}: {object_id}")
}

type Lookup<V> = Shared<BoxFuture<'static, Result<V, DirectoryError>>>;

enum CacheEntry<V> {
	Resolved(V),
	InFlight(Lookup<V>),
}

struct IdentityCache<V> {
	entries: Mutex<HashMap<String, CacheEntry<V>>>,
}

impl<V> IdentityCache<V>
where
	V: Clone + Send + Sync + 'static,
{
	fn new() -> Self {
		Self {
			entries: Mutex::new(HashMap::new()),
		}
	}

	async fn get_or_resolve<F, Fut>(&self, key: &str, resolve: F) -> Result<V, DirectoryError>
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<V, DirectoryError>> + Send + 'static,
	{
		let lookup = {
			let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
			match entries.get(key) {
				Some(CacheEntry::Resolved(value)) => return Ok(value.clone()),
				Some(CacheEntry::InFlight(lookup)) => lookup.clone(),
				None => {
					let lookup = resolve().boxed().shared();
					entries.insert(key.to_string(), CacheEntry::InFlight(lookup.clone()));
					lookup
				}
			}
		};

		let result = lookup.clone().await;
		self.settle(key, &lookup, &result);
		result
	}

	/// Replace the in-flight entry for `key` with its outcome. Every waiter
	/// calls this; only the first one to see `lookup` still installed acts.
	fn settle(&self, key: &str, lookup: &Lookup<V>, result: &Result<V, DirectoryError>) {
		let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
		let current = match entries.get(key) {
			Some(CacheEntry::InFlight(current)) => current,
			_ => return,
		};
		if !current.ptr_eq(lookup) {
			return;
		}
		match result {
			Ok(value) => {
				entries.insert(key.to_string(), CacheEntry::Resolved(value.clone()));
			}
			Err(_) => {
				entries.remove(key);
			}
		}
	}

	/// Number of resolved entries.
	fn len(&self) -> usize {
		self
			.entries
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.values()
			.filter(|entry| matches!(entry, CacheEntry::Resolved(_)))
			.count()
	}

	#[cfg(test)]
	fn tracked_keys(&self) -> usize {
		self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
	}
}

/// Owns the user and group caches and mediates every directory call.
pub struct IdentityResolver {
	directory: Arc<dyn DirectoryClient>,
	users: IdentityCache<UserAttributes>,
	groups: IdentityCache<String>,
}

impl IdentityResolver {
	pub fn new(directory: Arc<dyn DirectoryClient>) -> Self {
		Self {
			directory,
			users: IdentityCache::new(),
			groups: IdentityCache::new(),
		}
	}

	/// Resolve a user object identifier to its display and principal names.
	///
	/// Issues at most one directory lookup per identifier for the lifetime of
	/// the resolver. A user the directory does not know resolves to a cached
	/// placeholder naming the identifier.
	pub async fn resolve_user(&self, object_id: &str) -> Result<UserAttributes, DirectoryError> {
		let directory = Arc::clone(&self.directory);
		let id = object_id.to_string();
		self
			.users
			.get_or_resolve(object_id, move || async move {
				let object_id = id.as_str();
				debug!(object_id, "resolving user from directory");
				match directory.lookup_user(object_id).await {
					Ok(attributes) => Ok(attributes),
					Err(DirectoryError::NotFound) => {
						warn!(object_id, "user not found in directory");
						let label = unknown_label(UNKNOWN_USER_LABEL, object_id);
						Ok(UserAttributes {
							display_name: label.clone(),
							principal_name: label,
						})
					}
					Err(e) => Err(e),
				}
			})
			.await
	}

	/// Resolve one entry of a user's group list to a label.
	///
	/// Cluster-native names (anything not shaped like a directory identifier)
	/// are returned unchanged without a directory call.
	pub async fn resolve_group_label(&self, group: &str) -> Result<String, DirectoryError> {
		if !is_directory_identifier(group) {
			return Ok(group.to_string());
		}

		let directory = Arc::clone(&self.directory);
		let id = group.to_string();
		self
			.groups
			.get_or_resolve(group, move || async move {
				let group = id.as_str();
				debug!(object_id = group, "resolving group from directory");
				match directory.lookup_group(group).await {
					Ok(display_name) => Ok(display_name),
					Err(DirectoryError::NotFound) => {
						warn!(object_id = group, "group not found in directory");
						Ok(unknown_label(UNKNOWN_GROUP_LABEL, group))
					}
					Err(e) => Err(e),
				}
			})
			.await
	}

	pub fn cached_users(&self) -> usize {
		self.users.len()
	}

	pub fn cached_groups(&self) -> usize {
		self.groups.len()
	}
}
