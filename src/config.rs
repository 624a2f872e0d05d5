// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Process configuration.
//!
//! Every setting is a command-line flag with an environment variable fallback,
//! so the locator runs unchanged as a container (env) or from a shell (flags).

use clap::{Parser, ValueEnum};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::constants::{
    CLOUD_DNS_ENDPOINT, DEFAULT_APPLY_CONCURRENCY, DEFAULT_BIND_ADDRESS,
    DEFAULT_DNS_RECORD_TTL_SECS, DEFAULT_HTTP_PORT, DISCOVERY_CONNECT_TIMEOUT_SECS,
};
use crate::directory::ZoneTarget;
use crate::errors::ConfigError;
use crate::reconciler::ApplyPolicy;

/// Batch behaviour selectable on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PolicyKind {
    /// Apply every mapping and report each outcome
    ApplyAll,
    /// Stop at the first mapping that is not created or already in place
    FailFast,
}

/// Reconciles Cloud DNS A-records with Kafka broker advertised hosts.
#[derive(Parser, Debug, Clone)]
#[command(name = "broker-locator", version, about, long_about = None)]
pub struct Config {
    /// Port of the HTTP trigger service
    #[arg(long, env = "PORT", default_value_t = DEFAULT_HTTP_PORT)]
    pub port: u16,

    /// Address the HTTP trigger service binds to
    #[arg(long, env = "BIND_ADDRESS", default_value = DEFAULT_BIND_ADDRESS)]
    pub bind_address: IpAddr,

    /// GCP project of the managed zone; overrides the request's project
    #[arg(long, env = "PROJECT")]
    pub project: Option<String>,

    /// Managed zone name; overrides the request's zone
    #[arg(long, env = "ZONE")]
    pub zone: Option<String>,

    /// How a batch of mappings is applied
    #[arg(long, env = "APPLY_POLICY", value_enum, default_value_t = PolicyKind::ApplyAll)]
    pub apply_policy: PolicyKind,

    /// Mappings applied at once under apply-all
    #[arg(long, env = "APPLY_CONCURRENCY", default_value_t = DEFAULT_APPLY_CONCURRENCY)]
    pub apply_concurrency: usize,

    /// TTL of created A-records, in seconds
    #[arg(long, env = "RECORD_TTL", default_value_t = DEFAULT_DNS_RECORD_TTL_SECS)]
    pub record_ttl: u32,

    /// Seed broker connect timeout (TCP and TLS handshake), in seconds
    #[arg(
        long,
        env = "DISCOVERY_CONNECT_TIMEOUT_SECS",
        default_value_t = DISCOVERY_CONNECT_TIMEOUT_SECS
    )]
    pub connect_timeout_secs: u64,

    /// PEM bundle of extra CAs trusted for broker TLS
    #[arg(long, env = "DISCOVERY_CA_FILE")]
    pub discovery_ca_file: Option<PathBuf>,

    /// Talk to brokers without TLS (local clusters only)
    #[arg(long, env = "DISCOVERY_PLAINTEXT")]
    pub discovery_plaintext: bool,

    /// Base URL of the Cloud DNS API
    #[arg(long, env = "CLOUD_DNS_ENDPOINT", default_value = CLOUD_DNS_ENDPOINT)]
    pub cloud_dns_endpoint: String,
}

impl Config {
    /// Refuse settings the locator cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending flag.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.apply_concurrency == 0 {
            return Err(ConfigError::Invalid {
                field: "apply-concurrency",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.record_ttl == 0 {
            return Err(ConfigError::Invalid {
                field: "record-ttl",
                reason: "must be at least 1 second".to_string(),
            });
        }
        if self.connect_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "connect-timeout-secs",
                reason: "must be at least 1 second".to_string(),
            });
        }
        if self.discovery_plaintext && self.discovery_ca_file.is_some() {
            return Err(ConfigError::Invalid {
                field: "discovery-ca-file",
                reason: "cannot be combined with --discovery-plaintext".to_string(),
            });
        }
        if url::Url::parse(&self.cloud_dns_endpoint).is_err() {
            return Err(ConfigError::Invalid {
                field: "cloud-dns-endpoint",
                reason: format!("'{}' is not an absolute URL", self.cloud_dns_endpoint),
            });
        }
        Ok(())
    }

    /// Read the extra CA bundle named by `--discovery-ca-file`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the file cannot be read.
    pub async fn read_ca_bundle(&self) -> Result<Option<Vec<u8>>, ConfigError> {
        let Some(path) = &self.discovery_ca_file else {
            return Ok(None);
        };
        tokio::fs::read(path)
            .await
            .map(Some)
            .map_err(|e| ConfigError::Invalid {
                field: "discovery-ca-file",
                reason: format!("cannot read {}: {e}", path.display()),
            })
    }

    #[must_use]
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    #[must_use]
    pub fn apply_policy(&self) -> ApplyPolicy {
        match self.apply_policy {
            PolicyKind::ApplyAll => ApplyPolicy::ApplyAll {
                concurrency: self.apply_concurrency,
            },
            PolicyKind::FailFast => ApplyPolicy::FailFast,
        }
    }

    #[must_use]
    pub fn overrides(&self) -> TargetOverrides {
        TargetOverrides {
            project: self.project.clone(),
            zone: self.zone.clone(),
        }
    }
}

/// Process-wide project and zone that win over the request's.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetOverrides {
    pub project: Option<String>,
    pub zone: Option<String>,
}

impl TargetOverrides {
    /// Pick the zone a request writes to.
    ///
    /// Configured values take precedence; empty strings count as unset.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingTarget`] if neither source names the
    /// project or the zone.
    pub fn resolve(
        &self,
        project: Option<&str>,
        zone: Option<&str>,
    ) -> Result<ZoneTarget, ConfigError> {
        Ok(ZoneTarget {
            project: pick(self.project.as_deref(), project)
                .ok_or(ConfigError::MissingTarget { field: "project" })?,
            zone: pick(self.zone.as_deref(), zone)
                .ok_or(ConfigError::MissingTarget { field: "zone" })?,
        })
    }
}

fn pick(configured: Option<&str>, requested: Option<&str>) -> Option<String> {
    configured
        .filter(|value| !value.is_empty())
        .or_else(|| requested.filter(|value| !value.is_empty()))
        .map(str::to_string)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
