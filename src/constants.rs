// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the broker locator.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// DNS Constants
// ============================================================================

/// TTL applied to every A-record the reconciler creates (5 minutes)
pub const DEFAULT_DNS_RECORD_TTL_SECS: u32 = 300;

/// Record type managed by the reconciler
pub const RECORD_TYPE_A: &str = "A";

// ============================================================================
// Kafka Protocol Constants
// ============================================================================

/// Default Kafka listener port used when a seed address has no port
pub const DEFAULT_KAFKA_PORT: u16 = 9092;

/// Connect-level timeout for dialing a seed broker (TCP + TLS handshake)
pub const DISCOVERY_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Client id sent in every Kafka request header
pub const KAFKA_CLIENT_ID: &str = "broker-locator";

/// SASL mechanism negotiated with the brokers
pub const SASL_MECHANISM_SCRAM_SHA_256: &str = "SCRAM-SHA-256";

/// Upper bound on a single Kafka response frame (16 MiB)
pub const MAX_KAFKA_FRAME_BYTES: usize = 16 * 1024 * 1024;

/// Upper bound on the SCRAM iteration count a server may request
pub const MAX_SCRAM_ITERATIONS: u32 = 1_000_000;

// ============================================================================
// Cloud DNS Constants
// ============================================================================

/// Default Cloud DNS API endpoint
pub const CLOUD_DNS_ENDPOINT: &str = "https://dns.googleapis.com";

/// OAuth2 scope required to read and mutate managed zones
pub const CLOUD_DNS_SCOPE: &str = "https://www.googleapis.com/auth/ndev.clouddns.readwrite";

/// Default OAuth2 token endpoint when a service account key omits `token_uri`
pub const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Grant type for the service-account JWT bearer flow
pub const JWT_BEARER_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Lifetime requested for the signed JWT assertion (1 hour)
pub const JWT_ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Maximum number of pages followed when listing record sets
///
/// Cloud DNS returns at most 1000 record sets per page, so this bounds a
/// single listing at 100k record sets.
pub const MAX_LIST_PAGES: usize = 100;

// ============================================================================
// HTTP Trigger Constants
// ============================================================================

/// Default port for the HTTP trigger
pub const DEFAULT_HTTP_PORT: u16 = 9090;

/// Default bind address for the HTTP trigger
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";

/// Default number of mappings applied concurrently
pub const DEFAULT_APPLY_CONCURRENCY: usize = 1;
