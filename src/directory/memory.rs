// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Process-local record directory.
//!
//! Behaves like a managed zone holding only A-records: names are stored fully
//! qualified, `create` refuses existing names, `delete` needs the exact binding.
//! Mutation counters and injected failures make it the directory of choice for
//! reconciler tests.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use super::{fqdn, DirectoryProvider, RecordDirectory, ZoneTarget};
use crate::errors::DirectoryError;
use crate::types::ExistingRecord;

const MEMORY_ENDPOINT: &str = "memory://";

/// In-memory A-record zone.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    records: Mutex<BTreeMap<String, String>>,
    failing: Mutex<HashSet<String>>,
    creates: AtomicUsize,
    deletes: AtomicUsize,
}

impl InMemoryDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a zone that already holds the given `(hostname, data)` records.
    ///
    /// `data` is stored verbatim so zones with non-IPv4 data can be modelled.
    #[must_use]
    pub fn with_records<'a>(records: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let records = records
            .into_iter()
            .map(|(name, data)| (fqdn(name), data.to_string()))
            .collect();
        Self {
            records: Mutex::new(records),
            ..Self::default()
        }
    }

    /// Make every `create` of `hostname` fail with a provider error.
    pub async fn fail_creates_for(&self, hostname: &str) {
        self.failing.lock().await.insert(fqdn(hostname));
    }

    /// Current contents, keyed by fully-qualified name.
    pub async fn snapshot(&self) -> BTreeMap<String, String> {
        self.records.lock().await.clone()
    }

    /// Number of successful `create` calls.
    #[must_use]
    pub fn create_count(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    /// Number of successful `delete` calls.
    #[must_use]
    pub fn delete_count(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordDirectory for InMemoryDirectory {
    async fn list_by_prefix(&self, prefix: &str) -> Result<Vec<ExistingRecord>, DirectoryError> {
        let records = self.records.lock().await;
        Ok(records
            .iter()
            .filter(|(name, _)| name.starts_with(prefix))
            .map(|(name, data)| ExistingRecord::new(name.clone(), data.clone()))
            .collect())
    }

    async fn create(&self, hostname: &str, ip: Ipv4Addr, ttl: u32) -> Result<(), DirectoryError> {
        let name = fqdn(hostname);
        if self.failing.lock().await.contains(&name) {
            return Err(DirectoryError::Provider {
                endpoint: MEMORY_ENDPOINT.to_string(),
                status_code: 500,
                reason: format!("injected failure creating '{name}'"),
            });
        }

        let mut records = self.records.lock().await;
        if records.contains_key(&name) {
            return Err(DirectoryError::AlreadyExists { name });
        }
        debug!(name = %name, ip = %ip, ttl, "Creating in-memory A-record");
        records.insert(name, ip.to_string());
        self.creates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn lookup(&self, hostname: &str) -> Result<String, DirectoryError> {
        let name = fqdn(hostname);
        self.records
            .lock()
            .await
            .get(&name)
            .cloned()
            .ok_or(DirectoryError::NotFound { name })
    }

    async fn delete(&self, hostname: &str, ip: Ipv4Addr) -> Result<(), DirectoryError> {
        let name = fqdn(hostname);
        let mut records = self.records.lock().await;
        if records
            .get(&name)
            .is_some_and(|data| *data == ip.to_string())
        {
            records.remove(&name);
            self.deletes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        } else {
            Err(DirectoryError::NotFound { name })
        }
    }
}

/// Hands out the same shared zone whatever the target or credentials.
#[async_trait]
impl DirectoryProvider for Arc<InMemoryDirectory> {
    async fn open(
        &self,
        target: &ZoneTarget,
        _credentials: &[u8],
    ) -> Result<Arc<dyn RecordDirectory>, DirectoryError> {
        debug!(project = %target.project, zone = %target.zone, "Opening in-memory directory");
        Ok(self.clone())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod memory_tests;
