// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Kubernetes audit webhook that resolves Azure AD object identifiers.
//!
//! The API server posts audit event batches to `/audits`. Records whose
//! subject belongs to the configured tenant get the user's display and
//! principal names and the display names of their directory groups added,
//! and are then forwarded one by one to a [`sink::TelemetrySink`]. Directory
//! lookups are cached for the life of the process.

pub mod batch;
pub mod classifier;
pub mod config;
pub mod directory;
pub mod enricher;
pub mod graph;
pub mod health;
pub mod metrics;
pub mod record;
pub mod resolver;
pub mod server;
pub mod sink;

#[cfg(test)]
pub(crate) mod testing;

pub use batch::{BatchError, BatchProcessor, ProcessingReport};
pub use classifier::is_directory_identifier;
pub use config::{Config, ConfigError, SinkConfig};
pub use directory::{DirectoryClient, DirectoryError, UserAttributes};
pub use enricher::{EnrichError, EnrichOutcome, RecordEnricher};
pub use graph::{GraphConfig, GraphDirectoryClient};
pub use health::HealthState;
pub use metrics::Metrics;
pub use record::{EnrichedAuditRecord, RawAuditRecord};
pub use resolver::IdentityResolver;
pub use sink::{SinkError, TelemetrySink};
