// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Broker discovery over the Kafka protocol.
//!
//! Discovery authenticates to one of the seed brokers with SASL SCRAM-SHA-256
//! (normally over TLS) and reads the cluster's broker list from a `Metadata`
//! request. The result maps each broker's node id to the hostname it advertises.
//!
//! # Example
//!
//! ```rust,no_run
//! use broker_locator::discovery::{BrokerDiscovery, DiscoveryRequest, KafkaDiscovery};
//! use std::time::Duration;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let discovery = KafkaDiscovery::with_tls(None, Duration::from_secs(10))?;
//! let brokers = discovery
//!     .discover(&DiscoveryRequest::new("seed-0.example.com:9092", "admin", "secret"))
//!     .await?;
//! for broker in brokers {
//!     println!("{} -> {}", broker.id, broker.advertised_host);
//! }
//! # Ok(())
//! # }
//! ```

pub mod kafka;
pub mod scram;
pub mod tls;
pub mod wire;

pub use kafka::{parse_seeds, KafkaDiscovery, Seed, Transport};

use async_trait::async_trait;
use std::fmt;

use crate::errors::DiscoveryError;
use crate::types::BrokerRecord;

/// Seed list and SASL credentials for one discovery call.
#[derive(Clone)]
pub struct DiscoveryRequest {
    /// Comma-separated `host[:port]` list
    pub seed: String,
    pub user: String,
    pub password: String,
}

impl DiscoveryRequest {
    pub fn new(
        seed: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            seed: seed.into(),
            user: user.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for DiscoveryRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscoveryRequest")
            .field("seed", &self.seed)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Source of the cluster's current broker identities.
#[async_trait]
pub trait BrokerDiscovery: Send + Sync {
    /// Return every broker in the cluster, ordered by id, ids unique.
    ///
    /// # Errors
    ///
    /// Returns a [`DiscoveryError`] if no seed is reachable, authentication fails
    /// or the broker response cannot be decoded.
    async fn discover(&self, request: &DiscoveryRequest) -> Result<Vec<BrokerRecord>, DiscoveryError>;
}
