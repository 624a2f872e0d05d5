// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Reconciliation of broker advertised hosts with published A-records.
//!
//! A run has three phases:
//!
//! 1. **Discover** the brokers and the hostname each one advertises.
//! 2. **Join** them against the existing records under a prefix, using the
//!    broker identity embedded in each record name (see [`crate::identity`]).
//! 3. **Apply** one mapping per advertised hostname, never overwriting a
//!    record that points somewhere else.
//!
//! Discovery and listing failures end the run. Apply outcomes never do: they are
//! collected per hostname in the [`ReconcileReport`].

use futures::stream::{self, StreamExt};
use futures::FutureExt;
use serde::Serialize;
use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::constants::{DEFAULT_APPLY_CONCURRENCY, DEFAULT_DNS_RECORD_TTL_SECS};
use crate::directory::RecordDirectory;
use crate::discovery::{BrokerDiscovery, DiscoveryRequest};
use crate::errors::{DirectoryError, ReconcileError};
use crate::identity::extract_identity;
use crate::metrics;
use crate::types::{
    ApplyOutcome, BrokerId, BrokerRecord, ExistingRecord, JoinResult, MappingReport,
    SkippedRecord, TargetMapping,
};

/// How a batch of mappings is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyPolicy {
    /// Apply sequentially and stop at the first non-success outcome.
    FailFast,
    /// Apply every mapping, at most `concurrency` at a time.
    ApplyAll { concurrency: usize },
}

impl Default for ApplyPolicy {
    fn default() -> Self {
        Self::ApplyAll {
            concurrency: DEFAULT_APPLY_CONCURRENCY,
        }
    }
}

/// Inputs of one run.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub discovery: DiscoveryRequest,
    /// Name prefix of the records carrying broker identities
    pub prefix: String,
}

/// Overall verdict of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Success,
    Conflict,
    Failed,
}

impl ReportStatus {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Conflict => "conflict",
            Self::Failed => "failed",
        }
    }
}

/// Everything a run found and did.
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileReport {
    pub status: ReportStatus,
    pub brokers: Vec<BrokerRecord>,
    pub unresolved: Vec<BrokerId>,
    pub skipped: Vec<SkippedRecord>,
    pub outcomes: Vec<MappingReport>,
    /// True if fail-fast stopped at an unsuccessful mapping
    pub aborted: bool,
}

impl ReconcileReport {
    fn new(
        brokers: Vec<BrokerRecord>,
        join: JoinResult,
        outcomes: Vec<MappingReport>,
        aborted: bool,
    ) -> Self {
        Self {
            status: report_status(&outcomes),
            brokers,
            unresolved: join.unresolved,
            skipped: join.skipped,
            outcomes,
            aborted,
        }
    }

    /// `Success` when every mapping is in place, `Conflict` when some were left
    /// untouched because they point elsewhere, `Failed` when any mutation failed.
    #[must_use]
    pub fn status(&self) -> ReportStatus {
        self.status
    }
}

fn report_status(outcomes: &[MappingReport]) -> ReportStatus {
    if outcomes
        .iter()
        .any(|report| matches!(report.outcome, ApplyOutcome::Failed { .. }))
    {
        ReportStatus::Failed
    } else if outcomes
        .iter()
        .any(|report| matches!(report.outcome, ApplyOutcome::Conflict { .. }))
    {
        ReportStatus::Conflict
    } else {
        ReportStatus::Success
    }
}

/// Join discovered brokers against existing records by broker identity.
///
/// Every existing record contributes `identity -> ip`. Records whose name has no
/// identity, whose data is not an IPv4 address, or whose identity is bound to
/// more than one address are reported in `skipped`. Brokers without a usable
/// record are reported in `unresolved` and never produce a mapping.
///
/// # Example
///
/// ```rust
/// use broker_locator::reconciler::join;
/// use broker_locator::types::{BrokerRecord, ExistingRecord};
///
/// let result = join(
///     &[BrokerRecord::new(1, "b-1.example.com")],
///     &[ExistingRecord::new("x-1.example.com", "10.0.0.1")],
/// );
/// assert_eq!(result.mappings[0].hostname, "b-1.example.com");
/// assert_eq!(result.mappings[0].ip.to_string(), "10.0.0.1");
/// ```
#[must_use]
pub fn join(brokers: &[BrokerRecord], existing: &[ExistingRecord]) -> JoinResult {
    let mut result = JoinResult::default();
    let mut bindings: BTreeMap<BrokerId, Vec<(&str, Ipv4Addr)>> = BTreeMap::new();

    for record in existing {
        let id = match extract_identity(&record.hostname) {
            Ok(id) => id,
            Err(e) => {
                result.skipped.push(SkippedRecord {
                    hostname: record.hostname.clone(),
                    reason: e.to_string(),
                });
                continue;
            }
        };
        let Ok(ip) = record.ip.parse::<Ipv4Addr>() else {
            result.skipped.push(SkippedRecord {
                hostname: record.hostname.clone(),
                reason: format!("record data '{}' is not an IPv4 address", record.ip),
            });
            continue;
        };
        bindings
            .entry(id)
            .or_default()
            .push((record.hostname.as_str(), ip));
    }

    let mut resolved: BTreeMap<BrokerId, Ipv4Addr> = BTreeMap::new();
    for (id, records) in bindings {
        let ip = records[0].1;
        if records.iter().all(|(_, other)| *other == ip) {
            resolved.insert(id, ip);
        } else {
            result.skipped.extend(records.into_iter().map(|(hostname, ip)| {
                SkippedRecord {
                    hostname: hostname.to_string(),
                    reason: format!("identity {id} is bound to conflicting addresses ({ip} here)"),
                }
            }));
        }
    }

    let mut brokers: Vec<&BrokerRecord> = brokers.iter().collect();
    brokers.sort_by_key(|broker| broker.id);
    for broker in brokers {
        match resolved.get(&broker.id) {
            Some(ip) => result.mappings.push(TargetMapping {
                hostname: broker.advertised_host.clone(),
                ip: *ip,
            }),
            None => result.unresolved.push(broker.id),
        }
    }

    result
}

/// Apply one mapping: create the record, or confirm the one already there.
///
/// Never modifies a record that already exists.
pub async fn apply_mapping(
    directory: &dyn RecordDirectory,
    mapping: &TargetMapping,
    ttl: u32,
) -> ApplyOutcome {
    match directory.create(&mapping.hostname, mapping.ip, ttl).await {
        Ok(()) => ApplyOutcome::Created,
        Err(DirectoryError::AlreadyExists { .. }) => {
            match directory.lookup(&mapping.hostname).await {
                Ok(current) if current.parse::<Ipv4Addr>().ok() == Some(mapping.ip) => {
                    ApplyOutcome::NoOpIdempotent
                }
                Ok(current) => ApplyOutcome::Conflict { current },
                Err(error) => ApplyOutcome::Failed { error },
            }
        }
        Err(error) => ApplyOutcome::Failed { error },
    }
}

/// Apply every mapping under `policy`.
///
/// Returns the per-mapping reports in mapping order and whether fail-fast
/// stopped early.
pub async fn apply_all(
    directory: &dyn RecordDirectory,
    mappings: &[TargetMapping],
    ttl: u32,
    policy: ApplyPolicy,
) -> (Vec<MappingReport>, bool) {
    match policy {
        ApplyPolicy::FailFast => {
            let mut reports = Vec::with_capacity(mappings.len());
            for mapping in mappings {
                let report = apply_one(directory, mapping, ttl).await;
                let stop = !report.outcome.is_success();
                reports.push(report);
                if stop {
                    return (reports, true);
                }
            }
            (reports, false)
        }
        ApplyPolicy::ApplyAll { concurrency } => {
            // Futures are built eagerly; axum handlers reject a lazily mapped stream
            let tasks: Vec<_> = mappings
                .iter()
                .enumerate()
                .map(|(index, mapping)| {
                    async move { (index, apply_one(directory, mapping, ttl).await) }.boxed()
                })
                .collect();
            let mut reports: Vec<(usize, MappingReport)> = stream::iter(tasks)
                .buffer_unordered(concurrency.max(1))
                .collect()
                .await;
            reports.sort_by_key(|(index, _)| *index);
            (reports.into_iter().map(|(_, report)| report).collect(), false)
        }
    }
}

async fn apply_one(
    directory: &dyn RecordDirectory,
    mapping: &TargetMapping,
    ttl: u32,
) -> MappingReport {
    let outcome = apply_mapping(directory, mapping, ttl).await;
    metrics::record_outcome(outcome.label());

    match &outcome {
        ApplyOutcome::Created => info!(
            hostname = %mapping.hostname,
            ip = %mapping.ip,
            "Created A-record"
        ),
        ApplyOutcome::NoOpIdempotent => debug!(
            hostname = %mapping.hostname,
            ip = %mapping.ip,
            "A-record already in place"
        ),
        ApplyOutcome::Conflict { current } => warn!(
            hostname = %mapping.hostname,
            desired = %mapping.ip,
            current = %current,
            "A-record points elsewhere, leaving it untouched"
        ),
        ApplyOutcome::Failed { error } => error!(
            hostname = %mapping.hostname,
            ip = %mapping.ip,
            error = %error,
            "Failed to apply A-record"
        ),
    }

    MappingReport {
        hostname: mapping.hostname.clone(),
        ip: mapping.ip,
        outcome,
    }
}

/// Runs discovery, join and apply with one policy and TTL.
#[derive(Debug, Clone, Copy)]
pub struct Reconciler {
    policy: ApplyPolicy,
    ttl: u32,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(ApplyPolicy::default(), DEFAULT_DNS_RECORD_TTL_SECS)
    }
}

impl Reconciler {
    #[must_use]
    pub fn new(policy: ApplyPolicy, ttl: u32) -> Self {
        Self { policy, ttl }
    }

    #[must_use]
    pub fn policy(&self) -> ApplyPolicy {
        self.policy
    }

    /// Run one reconciliation.
    ///
    /// # Errors
    ///
    /// - [`ReconcileError::Discovery`] if the brokers cannot be discovered
    /// - [`ReconcileError::Listing`] if the existing records cannot be listed
    pub async fn run(
        &self,
        discovery: &dyn BrokerDiscovery,
        directory: &dyn RecordDirectory,
        request: &RunRequest,
    ) -> Result<ReconcileReport, ReconcileError> {
        let start = Instant::now();
        let result = self.run_phases(discovery, directory, request).await;

        match &result {
            Ok(report) => metrics::record_run(report.status.label(), start.elapsed()),
            Err(e) => {
                error!(reason = e.status_reason(), error = %e, "Reconciliation failed");
                metrics::record_run_error(e.status_reason(), start.elapsed());
            }
        }
        result
    }

    async fn run_phases(
        &self,
        discovery: &dyn BrokerDiscovery,
        directory: &dyn RecordDirectory,
        request: &RunRequest,
    ) -> Result<ReconcileReport, ReconcileError> {
        let brokers = discovery.discover(&request.discovery).await?;
        info!(brokers = brokers.len(), "Discovered brokers");

        let existing = directory
            .list_by_prefix(&request.prefix)
            .await
            .map_err(ReconcileError::Listing)?;
        debug!(
            prefix = %request.prefix,
            records = existing.len(),
            "Listed existing records"
        );

        let join = join(&brokers, &existing);
        for skipped in &join.skipped {
            warn!(
                hostname = %skipped.hostname,
                reason = %skipped.reason,
                "Skipping existing record"
            );
        }
        for id in &join.unresolved {
            warn!(broker_id = %id, "No published record for broker, leaving it unresolved");
        }
        metrics::record_join(join.unresolved.len(), join.skipped.len());

        let (outcomes, aborted) =
            apply_all(directory, &join.mappings, self.ttl, self.policy).await;
        if aborted {
            warn!(
                applied = outcomes.len(),
                total = join.mappings.len(),
                "Stopped at first unsuccessful mapping"
            );
        }

        let report = ReconcileReport::new(brokers, join, outcomes, aborted);
        info!(
            status = report.status.label(),
            mappings = report.outcomes.len(),
            unresolved = report.unresolved.len(),
            skipped = report.skipped.len(),
            "Reconciliation finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
#[path = "reconciler_tests.rs"]
mod reconciler_tests;
