// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Record directory: where the per-broker A-records are published.
//!
//! The reconciler only needs four operations from a directory, captured by
//! [`RecordDirectory`]. Conditions it branches on (`AlreadyExists`, `NotFound`)
//! come back as typed [`DirectoryError`] variants.
//!
//! # Implementations
//!
//! - [`cloud_dns::CloudDnsDirectory`] - Google Cloud DNS managed zone over REST
//! - [`memory::InMemoryDirectory`] - process-local zone for tests and local runs

pub mod auth;
pub mod cloud_dns;
pub mod memory;

pub use cloud_dns::{CloudDnsDirectory, CloudDnsProvider};
pub use memory::InMemoryDirectory;

use async_trait::async_trait;
use serde::Serialize;
use std::net::Ipv4Addr;
use std::sync::Arc;

use crate::errors::DirectoryError;
use crate::types::ExistingRecord;

/// Managed zone a run writes to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ZoneTarget {
    pub project: String,
    pub zone: String,
}

/// A-record operations the reconciler relies on.
#[async_trait]
pub trait RecordDirectory: Send + Sync {
    /// List every A-record whose name starts with `prefix`.
    ///
    /// # Errors
    ///
    /// Returns an error if the zone cannot be read completely.
    async fn list_by_prefix(&self, prefix: &str) -> Result<Vec<ExistingRecord>, DirectoryError>;

    /// Create an A-record binding `hostname` to `ip`.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::AlreadyExists`] if a record of that name exists,
    /// whatever its address, and another variant for any other failure.
    async fn create(&self, hostname: &str, ip: Ipv4Addr, ttl: u32) -> Result<(), DirectoryError>;

    /// Return the address currently bound to `hostname`.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::NotFound`] if no A-record of that name exists.
    async fn lookup(&self, hostname: &str) -> Result<String, DirectoryError>;

    /// Remove the A-record binding `hostname` to `ip`.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::NotFound`] if no such binding exists.
    async fn delete(&self, hostname: &str, ip: Ipv4Addr) -> Result<(), DirectoryError>;
}

/// Opens a directory for a zone with caller-supplied credentials.
#[async_trait]
pub trait DirectoryProvider: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the credentials cannot be used for this provider.
    async fn open(
        &self,
        target: &ZoneTarget,
        credentials: &[u8],
    ) -> Result<Arc<dyn RecordDirectory>, DirectoryError>;
}

/// Fully-qualified form of a record name (with the trailing dot).
///
/// # Example
///
/// ```rust
/// use broker_locator::directory::fqdn;
///
/// assert_eq!(fqdn("n0.cloud"), "n0.cloud.");
/// assert_eq!(fqdn("n0.cloud."), "n0.cloud.");
/// ```
#[must_use]
pub fn fqdn(hostname: &str) -> String {
    if hostname.ends_with('.') {
        hostname.to_string()
    } else {
        format!("{hostname}.")
    }
}
