// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Broker identity extraction from record names.
//!
//! Per-broker records follow the naming convention `<letters>-<digits>.<suffix>`,
//! e.g. `kafka-2.cluster.example.com.`. The digit run is the broker's node id and
//! is the only thing the reconciler joins on.

use regex::Regex;
use std::sync::LazyLock;

use crate::errors::IdentityError;
use crate::types::BrokerId;

/// Identity pattern, searched anywhere in the hostname.
static IDENTITY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-z]+-([0-9]+)\..+").unwrap());

/// Extract the broker identity embedded in `hostname`.
///
/// # Errors
///
/// Returns [`IdentityError::NoMatch`] if the hostname does not follow the naming
/// convention and [`IdentityError::InvalidId`] if the digits do not fit a broker id.
///
/// # Example
///
/// ```rust
/// use broker_locator::identity::extract_identity;
/// use broker_locator::types::BrokerId;
///
/// assert_eq!(extract_identity("kafka-2.example.com").unwrap(), BrokerId(2));
/// assert!(extract_identity("kafka.example.com").is_err());
/// ```
pub fn extract_identity(hostname: &str) -> Result<BrokerId, IdentityError> {
    let digits = IDENTITY_PATTERN
        .captures(hostname)
        .and_then(|caps| caps.get(1))
        .ok_or_else(|| IdentityError::NoMatch {
            hostname: hostname.to_string(),
        })?
        .as_str();

    digits
        .parse::<i32>()
        .map(BrokerId)
        .map_err(|e| IdentityError::InvalidId {
            hostname: hostname.to_string(),
            digits: digits.to_string(),
            reason: e.to_string(),
        })
}

#[cfg(test)]
#[path = "identity_tests.rs"]
mod identity_tests;
