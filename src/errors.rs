// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for the broker locator.
//!
//! This module provides specialized error types for:
//! - Parsing broker identities out of record names
//! - Broker discovery over the Kafka protocol (connect, TLS, SASL/SCRAM)
//! - Cloud DNS record directory operations
//! - A whole reconciliation run
//! - Process configuration and per-request zone targets
//! - Requests to the HTTP trigger
//!
//! Apply-phase failures are not errors of the run; they are reported per mapping
//! through [`crate::types::ApplyOutcome`].

use thiserror::Error;

use crate::status_reasons::{
    REASON_BAD_REQUEST, REASON_DIRECTORY_AUTH_FAILED, REASON_DIRECTORY_UNAVAILABLE,
    REASON_DISCOVERY_AUTH_FAILED, REASON_DISCOVERY_PROTOCOL_ERROR, REASON_DISCOVERY_UNREACHABLE,
    REASON_INVALID_CREDENTIALS, REASON_INVALID_SEED, REASON_LISTING_FAILED, REASON_MISSING_TARGET,
};

/// A hostname does not carry a usable broker identity.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    /// The hostname does not match `<letters>-<digits>.<suffix>`
    #[error("hostname '{hostname}' does not match the broker naming pattern")]
    NoMatch {
        /// The offending hostname
        hostname: String,
    },

    /// The digits matched but do not fit a broker id
    #[error("hostname '{hostname}' carries an invalid broker id '{digits}': {reason}")]
    InvalidId {
        /// The offending hostname
        hostname: String,
        /// The captured digit run
        digits: String,
        /// Integer parse failure
        reason: String,
    },
}

/// Errors raised while discovering brokers from the cluster.
///
/// Every variant is fatal to a reconciliation run; nothing here is retried.
#[derive(Error, Debug, Clone)]
pub enum DiscoveryError {
    /// The seed list is empty or an entry cannot be parsed
    #[error("invalid seed address '{seed}': {reason}")]
    InvalidSeed {
        /// The seed entry as supplied
        seed: String,
        /// Explanation of what is invalid
        reason: String,
    },

    /// No seed broker accepted a connection within the connect timeout
    #[error("unable to connect to any seed broker ({seeds}): {reason}")]
    Connect {
        /// Comma-separated list of seeds that were tried
        seeds: String,
        /// Last connection failure
        reason: String,
    },

    /// TLS setup or handshake failure
    #[error("TLS failure talking to {endpoint}: {reason}")]
    Tls {
        /// Broker endpoint (host:port)
        endpoint: String,
        /// Reason for the failure
        reason: String,
    },

    /// The broker does not offer the requested SASL mechanism
    #[error("broker {endpoint} does not support {mechanism} (offers: {offered})")]
    UnsupportedMechanism {
        /// Broker endpoint (host:port)
        endpoint: String,
        /// Mechanism we asked for
        mechanism: String,
        /// Mechanisms the broker offered
        offered: String,
    },

    /// Credentials were rejected or the server proof did not verify
    #[error("authentication as '{user}' failed against {endpoint}: {reason}")]
    Auth {
        /// Broker endpoint (host:port)
        endpoint: String,
        /// SASL user name
        user: String,
        /// Broker error message or local verification failure
        reason: String,
    },

    /// The broker sent a response we could not decode
    #[error("malformed response from {endpoint}: {reason}")]
    Protocol {
        /// Broker endpoint (host:port)
        endpoint: String,
        /// What could not be decoded
        reason: String,
    },

    /// I/O failure on an established connection
    #[error("I/O error talking to {endpoint}: {reason}")]
    Io {
        /// Broker endpoint (host:port)
        endpoint: String,
        /// Underlying I/O error
        reason: String,
    },
}

impl DiscoveryError {
    /// Returns true if the failure is a credential problem rather than reachability.
    #[must_use]
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            Self::Auth { .. } | Self::UnsupportedMechanism { .. }
        )
    }
}

/// Errors returned by a record directory.
///
/// `AlreadyExists` and `NotFound` are conditions the reconciler branches on;
/// they are produced from the provider's status codes, never from message text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    /// A record set with this name already exists (HTTP 409)
    #[error("record '{name}' already exists")]
    AlreadyExists {
        /// Fully-qualified record name
        name: String,
    },

    /// The record set does not exist (HTTP 404)
    #[error("record '{name}' not found")]
    NotFound {
        /// Fully-qualified record name
        name: String,
    },

    /// The service-account credentials could not be decoded or used to sign
    #[error("invalid service account credentials: {reason}")]
    InvalidCredentials {
        /// Explanation of what is invalid
        reason: String,
    },

    /// The provider rejected our identity (token exchange or HTTP 401/403)
    #[error("unauthorized by {endpoint} (HTTP {status_code}): {reason}")]
    Unauthorized {
        /// Endpoint that refused the request
        endpoint: String,
        /// HTTP status code
        status_code: u16,
        /// Response body or error message
        reason: String,
    },

    /// Any other non-success response from the provider
    #[error("provider error from {endpoint} (HTTP {status_code}): {reason}")]
    Provider {
        /// Endpoint that returned the error
        endpoint: String,
        /// HTTP status code
        status_code: u16,
        /// Response body or error message
        reason: String,
    },

    /// The request never produced a response
    #[error("HTTP request to {endpoint} failed: {reason}")]
    Transport {
        /// Endpoint that could not be reached
        endpoint: String,
        /// Transport failure
        reason: String,
    },

    /// A success response whose body could not be decoded
    #[error("unexpected response from {endpoint}: {reason}")]
    InvalidResponse {
        /// Endpoint that returned the response
        endpoint: String,
        /// What could not be decoded
        reason: String,
    },

    /// Listing did not finish within the page bound
    #[error("listing record sets in zone '{zone}' exceeded {max_pages} pages")]
    TooManyPages {
        /// Managed zone being listed
        zone: String,
        /// Page bound that was hit
        max_pages: usize,
    },
}

impl DirectoryError {
    /// Returns true if the provider refused our credentials.
    #[must_use]
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            Self::InvalidCredentials { .. } | Self::Unauthorized { .. }
        )
    }
}

/// Errors that end a reconciliation run before or while reading state.
#[derive(Error, Debug, Clone)]
pub enum ReconcileError {
    /// Brokers could not be discovered
    #[error("broker discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),

    /// Existing records could not be listed
    #[error("listing existing records failed: {0}")]
    Listing(#[source] DirectoryError),

    /// The record directory could not be opened
    #[error("opening record directory failed: {0}")]
    Directory(#[source] DirectoryError),
}

impl ReconcileError {
    /// Returns the status reason code for this error.
    ///
    /// Used as the `reason` field of error responses and as a metrics label.
    #[must_use]
    pub fn status_reason(&self) -> &'static str {
        match self {
            Self::Discovery(DiscoveryError::InvalidSeed { .. }) => REASON_INVALID_SEED,
            Self::Discovery(e) if e.is_auth() => REASON_DISCOVERY_AUTH_FAILED,
            Self::Discovery(DiscoveryError::Protocol { .. }) => REASON_DISCOVERY_PROTOCOL_ERROR,
            Self::Discovery(_) => REASON_DISCOVERY_UNREACHABLE,
            Self::Listing(DirectoryError::InvalidCredentials { .. })
            | Self::Directory(DirectoryError::InvalidCredentials { .. }) => {
                REASON_INVALID_CREDENTIALS
            }
            Self::Listing(e) | Self::Directory(e) if e.is_auth() => REASON_DIRECTORY_AUTH_FAILED,
            Self::Listing(_) => REASON_LISTING_FAILED,
            Self::Directory(_) => REASON_DIRECTORY_UNAVAILABLE,
        }
    }
}

/// Invalid process configuration or an incomplete zone target.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A setting holds a value the locator cannot run with
    #[error("invalid value for {field}: {reason}")]
    Invalid {
        /// Flag name of the setting
        field: &'static str,
        /// Why the value was refused
        reason: String,
    },

    /// Neither the process nor the request names the zone to write to
    #[error("no {field} configured and none supplied in the request")]
    MissingTarget {
        /// `project` or `zone`
        field: &'static str,
    },
}

/// Errors of one request to the HTTP trigger.
#[derive(Error, Debug, Clone)]
pub enum TriggerError {
    /// The body is not a usable update request
    #[error("invalid request: {0}")]
    BadRequest(String),

    /// No project or zone to write to
    #[error(transparent)]
    MissingTarget(#[from] ConfigError),

    /// The credentials field could not be decoded
    #[error("credentials are not valid base64: {0}")]
    Credentials(String),

    /// The run itself failed
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
}

impl TriggerError {
    /// Returns the status reason code for this error.
    #[must_use]
    pub fn status_reason(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => REASON_BAD_REQUEST,
            Self::MissingTarget(_) => REASON_MISSING_TARGET,
            Self::Credentials(_) => REASON_INVALID_CREDENTIALS,
            Self::Reconcile(e) => e.status_reason(),
        }
    }
}
