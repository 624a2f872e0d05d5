// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Stable reason codes for failed reconciliation runs.
//!
//! Reasons are programmatic identifiers in CamelCase that explain why a run did
//! not produce a report. They appear as the `reason` field of trigger error
//! responses and as the `reason` label of `broker_locator_errors_total`.
//!
//! # Example Error Response
//!
//! ```json
//! {
//!   "reason": "DiscoveryAuthFailed",
//!   "message": "broker discovery failed: authentication as 'admin' failed against seed-0:9092: ..."
//! }
//! ```
//!
//! See [`crate::http_errors`] for how each reason maps to an HTTP status.

// ============================================================================
// Request Reasons
// ============================================================================

/// The request body is not a valid update request.
pub const REASON_BAD_REQUEST: &str = "BadRequest";

/// Neither the process nor the request names the project or zone.
pub const REASON_MISSING_TARGET: &str = "MissingTarget";

/// The credentials are not base64 or not a usable service-account key.
pub const REASON_INVALID_CREDENTIALS: &str = "InvalidCredentials";

// ============================================================================
// Discovery Reasons
// ============================================================================

/// A seed broker address could not be parsed.
pub const REASON_INVALID_SEED: &str = "InvalidSeed";

/// The brokers refused the SASL credentials or mechanism.
pub const REASON_DISCOVERY_AUTH_FAILED: &str = "DiscoveryAuthFailed";

/// A broker answered with something the Kafka codec could not accept.
pub const REASON_DISCOVERY_PROTOCOL_ERROR: &str = "DiscoveryProtocolError";

/// No seed broker could be reached (connect, TLS or I/O failure).
pub const REASON_DISCOVERY_UNREACHABLE: &str = "DiscoveryUnreachable";

// ============================================================================
// Directory Reasons
// ============================================================================

/// The record directory refused the service-account credentials.
pub const REASON_DIRECTORY_AUTH_FAILED: &str = "DirectoryAuthFailed";

/// Existing records could not be listed completely.
pub const REASON_LISTING_FAILED: &str = "ListingFailed";

/// The record directory could not be opened.
pub const REASON_DIRECTORY_UNAVAILABLE: &str = "DirectoryUnavailable";
