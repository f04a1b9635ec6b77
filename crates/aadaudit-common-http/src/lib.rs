// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Shared HTTP client construction for outbound calls.
//!
//! Both the directory client and the Log Analytics sink build their
//! `reqwest::Client` here so every request carries the same User-Agent and
//! honours the configured timeout.

use std::time::Duration;

use reqwest::{Client, ClientBuilder};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Returns a client builder with the standard User-Agent and connect timeout.
pub fn builder() -> ClientBuilder {
	Client::builder()
		.user_agent(user_agent())
		.connect_timeout(CONNECT_TIMEOUT)
}

/// Builds a client whose requests time out after `timeout`.
pub fn new_client_with_timeout(timeout: Duration) -> reqwest::Result<Client> {
	builder().timeout(timeout).build()
}

/// Format: `aadaudit/{version}`
pub fn user_agent() -> String {
	format!("aadaudit/{}", env!("CARGO_PKG_VERSION"))
}
