// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # broker-locator - Cloud DNS records for Kafka brokers
//!
//! broker-locator keeps per-broker DNS A-records in a Google Cloud DNS managed
//! zone in step with the hostnames a Kafka-compatible cluster advertises.
//!
//! ## Overview
//!
//! Each run:
//!
//! - Discovers the brokers over the Kafka protocol (SASL SCRAM-SHA-256, TLS)
//! - Lists the existing A-records under a name prefix
//! - Joins the two on the broker identity embedded in record names
//!   (`kafka-3.cluster.example.com` carries identity `3`)
//! - Creates one A-record per advertised hostname, never overwriting a record
//!   that points elsewhere
//!
//! ## Modules
//!
//! - [`identity`] - Broker identity extraction from hostnames
//! - [`discovery`] - Kafka broker discovery (wire codec, SCRAM, TLS)
//! - [`directory`] - Record directories (Cloud DNS, in-memory)
//! - [`reconciler`] - Join and apply logic, run orchestration
//! - [`server`] - HTTP trigger service
//! - [`config`] - Command-line and environment configuration
//! - [`metrics`] - Prometheus metrics
//!
//! ## Example
//!
//! ```rust
//! use broker_locator::reconciler::join;
//! use broker_locator::types::{BrokerRecord, ExistingRecord};
//!
//! let result = join(
//!     &[BrokerRecord::new(0, "n0.cloud"), BrokerRecord::new(1, "n1.cloud")],
//!     &[ExistingRecord::new("kafka-0.cloud.", "1.1.1.1")],
//! );
//!
//! assert_eq!(result.mappings.len(), 1);
//! assert_eq!(result.unresolved.len(), 1);
//! ```

pub mod config;
pub mod constants;
pub mod directory;
pub mod discovery;
pub mod errors;
pub mod http_errors;
pub mod identity;
pub mod metrics;
pub mod reconciler;
pub mod server;
pub mod status_reasons;
pub mod types;
