// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Status reason mapping to HTTP status codes.
//!
//! Separates errors in the caller's input (4xx) from failures of the systems
//! the locator talks to (502).
//!
//! # Usage
//!
//! ```rust
//! use broker_locator::http_errors::map_reason_to_http_status;
//!
//! assert_eq!(map_reason_to_http_status("InvalidSeed"), 400);
//! assert_eq!(map_reason_to_http_status("DiscoveryAuthFailed"), 401);
//! assert_eq!(map_reason_to_http_status("ListingFailed"), 502);
//! ```

use crate::status_reasons::{
    REASON_BAD_REQUEST, REASON_DIRECTORY_AUTH_FAILED, REASON_DISCOVERY_AUTH_FAILED,
    REASON_INVALID_CREDENTIALS, REASON_INVALID_SEED, REASON_MISSING_TARGET,
};

/// Map a status reason to the HTTP status code of the error response.
///
/// # Reason Mapping
///
/// | Reason | HTTP Code | Meaning |
/// |--------|-----------|---------|
/// | `BadRequest` | 400 | Malformed or incomplete request body |
/// | `MissingTarget` | 400 | No project or zone to write to |
/// | `InvalidCredentials` | 400 | Credentials are not a base64 service-account key |
/// | `InvalidSeed` | 400 | Seed address cannot be parsed |
/// | `DiscoveryAuthFailed` | 401 | Brokers refused the SASL credentials |
/// | `DirectoryAuthFailed` | 401 | Cloud DNS refused the service account |
/// | Other | 502 | A broker or the record directory failed |
#[must_use]
pub fn map_reason_to_http_status(reason: &str) -> u16 {
    match reason {
        REASON_BAD_REQUEST | REASON_MISSING_TARGET | REASON_INVALID_CREDENTIALS
        | REASON_INVALID_SEED => 400,
        REASON_DISCOVERY_AUTH_FAILED | REASON_DIRECTORY_AUTH_FAILED => 401,
        _ => 502,
    }
}

#[cfg(test)]
#[path = "http_errors_tests.rs"]
mod http_errors_tests;
