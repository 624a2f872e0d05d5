// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Data model shared by discovery, the record directory and the reconciler.
//!
//! Every value here lives for a single reconciliation run: it is built from
//! fresh discovery and directory reads and dropped once the run reports.

use serde::Serialize;
use std::fmt;
use std::net::Ipv4Addr;

use crate::errors::DirectoryError;

/// Numeric broker identity (the Kafka `node_id`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct BrokerId(pub i32);

impl fmt::Display for BrokerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A broker as reported by cluster discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrokerRecord {
    pub id: BrokerId,
    pub advertised_host: String,
}

impl BrokerRecord {
    pub fn new(id: i32, advertised_host: impl Into<String>) -> Self {
        Self {
            id: BrokerId(id),
            advertised_host: advertised_host.into(),
        }
    }
}

/// A currently published A-record whose name embeds a broker identity.
///
/// `ip` is the raw record data as returned by the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExistingRecord {
    pub hostname: String,
    pub ip: String,
}

impl ExistingRecord {
    pub fn new(hostname: impl Into<String>, ip: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            ip: ip.into(),
        }
    }
}

/// Desired binding of an advertised broker hostname to an address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetMapping {
    pub hostname: String,
    pub ip: Ipv4Addr,
}

/// Existing record dropped from the join, with the reason it could not be used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRecord {
    pub hostname: String,
    pub reason: String,
}

/// Output of joining discovered brokers against existing records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JoinResult {
    /// Mappings to apply, ordered by broker id
    pub mappings: Vec<TargetMapping>,
    /// Brokers with no usable published record
    pub unresolved: Vec<BrokerId>,
    /// Existing records that could not take part in the join
    pub skipped: Vec<SkippedRecord>,
}

/// Terminal result of applying one mapping.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ApplyOutcome {
    /// The record did not exist and was created
    Created,
    /// The record already existed with the desired address
    NoOpIdempotent,
    /// The record exists but points somewhere else; left untouched
    Conflict { current: String },
    /// The directory rejected the change or could not be read back
    Failed {
        #[serde(serialize_with = "serialize_error")]
        error: DirectoryError,
    },
}

impl ApplyOutcome {
    /// Returns true for outcomes that leave the zone in the desired state.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Created | Self::NoOpIdempotent)
    }

    /// Stable label used for logs and metrics.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::NoOpIdempotent => "noop",
            Self::Conflict { .. } => "conflict",
            Self::Failed { .. } => "failed",
        }
    }
}

fn serialize_error<S: serde::Serializer>(
    error: &DirectoryError,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}

/// Outcome of one mapping, as reported back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MappingReport {
    pub hostname: String,
    pub ip: Ipv4Addr,
    #[serde(flatten)]
    pub outcome: ApplyOutcome,
}
