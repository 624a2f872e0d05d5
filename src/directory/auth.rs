// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Google service-account authentication.
//!
//! A service-account key (the JSON document downloaded from IAM) is turned into
//! an OAuth2 access token with the JWT bearer flow: sign an RS256 assertion with
//! the key's private key and exchange it at the key's `token_uri`.

use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, error};

use crate::constants::{GOOGLE_TOKEN_URI, JWT_ASSERTION_LIFETIME_SECS, JWT_BEARER_GRANT_TYPE};
use crate::errors::DirectoryError;

/// Fields of a service-account key the token exchange needs.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default)]
    pub token_uri: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key", &"<redacted>")
            .field("private_key_id", &self.private_key_id)
            .field("token_uri", &self.token_uri)
            .field("project_id", &self.project_id)
            .finish()
    }
}

impl ServiceAccountKey {
    /// Parse a service-account key document.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::InvalidCredentials`] if the document is not a
    /// service-account key.
    pub fn from_json(credentials: &[u8]) -> Result<Self, DirectoryError> {
        let key: Self =
            serde_json::from_slice(credentials).map_err(|e| DirectoryError::InvalidCredentials {
                reason: format!("not a service account key: {e}"),
            })?;
        if key.client_email.is_empty() || key.private_key.is_empty() {
            return Err(DirectoryError::InvalidCredentials {
                reason: "service account key is missing client_email or private_key".to_string(),
            });
        }
        Ok(key)
    }

    /// Token endpoint named by the key, or Google's default one.
    #[must_use]
    pub fn token_uri(&self) -> &str {
        self.token_uri.as_deref().unwrap_or(GOOGLE_TOKEN_URI)
    }
}

/// Claims of the assertion exchanged for an access token.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssertionClaims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

/// Sign the JWT bearer assertion for `key`, issued at `issued_at` (unix seconds).
///
/// # Errors
///
/// Returns [`DirectoryError::InvalidCredentials`] if the private key is not a
/// usable RSA PEM key.
pub fn sign_assertion(
    key: &ServiceAccountKey,
    scope: &str,
    issued_at: i64,
) -> Result<String, DirectoryError> {
    let claims = AssertionClaims {
        iss: key.client_email.clone(),
        scope: scope.to_string(),
        aud: key.token_uri().to_string(),
        iat: issued_at,
        exp: issued_at + JWT_ASSERTION_LIFETIME_SECS,
    };

    let mut header = Header::new(Algorithm::RS256);
    header.kid.clone_from(&key.private_key_id);

    let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes()).map_err(|e| {
        DirectoryError::InvalidCredentials {
            reason: format!("private key is not a valid RSA PEM key: {e}"),
        }
    })?;

    jsonwebtoken::encode(&header, &claims, &encoding_key).map_err(|e| {
        DirectoryError::InvalidCredentials {
            reason: format!("failed to sign assertion: {e}"),
        }
    })
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Exchange a signed assertion for an access token.
///
/// # Errors
///
/// - [`DirectoryError::InvalidCredentials`] if the assertion cannot be signed
/// - [`DirectoryError::Unauthorized`] if the token endpoint rejects the grant
/// - [`DirectoryError::Transport`] / [`DirectoryError::Provider`] for other failures
pub async fn fetch_access_token(
    http: &reqwest::Client,
    key: &ServiceAccountKey,
    scope: &str,
) -> Result<String, DirectoryError> {
    let assertion = sign_assertion(key, scope, Utc::now().timestamp())?;
    let endpoint = key.token_uri().to_string();

    let body = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("grant_type", JWT_BEARER_GRANT_TYPE)
        .append_pair("assertion", &assertion)
        .finish();

    debug!(
        token_uri = %endpoint,
        client_email = %key.client_email,
        "Requesting access token"
    );

    let response = http
        .post(&endpoint)
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(body)
        .send()
        .await
        .map_err(|e| DirectoryError::Transport {
            endpoint: endpoint.clone(),
            reason: e.to_string(),
        })?;

    let status = response.status();
    if !status.is_success() {
        let reason = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        error!(
            token_uri = %endpoint,
            status = %status,
            error = %reason,
            "Access token request failed"
        );
        // The token endpoint answers a bad grant with 400 rather than 401
        return Err(match status.as_u16() {
            400 | 401 | 403 => DirectoryError::Unauthorized {
                endpoint,
                status_code: status.as_u16(),
                reason,
            },
            code => DirectoryError::Provider {
                endpoint,
                status_code: code,
                reason,
            },
        });
    }

    let token: TokenResponse =
        response
            .json()
            .await
            .map_err(|e| DirectoryError::InvalidResponse {
                endpoint: endpoint.clone(),
                reason: format!("malformed token response: {e}"),
            })?;

    debug!(
        token_uri = %endpoint,
        expires_in = ?token.expires_in,
        "Access token issued"
    );

    Ok(token.access_token)
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod auth_tests;
