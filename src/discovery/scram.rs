// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! SCRAM-SHA-256 client (RFC 5802, RFC 7677).
//!
//! The exchange is modelled as two states so a client-final message can only be
//! produced from a parsed server-first message:
//!
//! ```text
//! ScramClient --client_first()--> broker
//!             <--server-first---
//! ScramClient::handle_server_first() -> ScramClientFinal
//! ScramClientFinal --client_final()--> broker
//!                  <--server-final----
//! ScramClientFinal::verify_server_final()
//! ```
//!
//! Channel binding is not used (`n,,` GS2 header).

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::constants::MAX_SCRAM_ITERATIONS;

type HmacSha256 = Hmac<Sha256>;

/// GS2 header for "no channel binding, no authzid"
const GS2_HEADER: &str = "n,,";

/// base64("n,,")
const CHANNEL_BINDING: &str = "biws";

const CLIENT_NONCE_BYTES: usize = 24;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScramError {
    #[error("malformed server message: {0}")]
    Malformed(String),

    #[error("server nonce does not extend the client nonce")]
    NonceMismatch,

    #[error("server requested an unacceptable iteration count {0}")]
    InvalidIterations(u32),

    #[error("server rejected the authentication: {0}")]
    ServerError(String),

    #[error("server signature did not verify")]
    InvalidServerSignature,
}

/// First state of a SCRAM exchange.
pub struct ScramClient {
    password: String,
    client_nonce: String,
    client_first_bare: String,
}

impl ScramClient {
    /// Start an exchange with a random client nonce.
    #[must_use]
    pub fn new(user: &str, password: &str) -> Self {
        let mut raw = [0u8; CLIENT_NONCE_BYTES];
        rand::thread_rng().fill_bytes(&mut raw);
        Self::with_nonce(user, password, &URL_SAFE_NO_PAD.encode(raw))
    }

    /// Start an exchange with a caller-chosen nonce.
    #[must_use]
    pub fn with_nonce(user: &str, password: &str, nonce: &str) -> Self {
        Self {
            password: password.to_string(),
            client_nonce: nonce.to_string(),
            client_first_bare: format!("n={},r={nonce}", escape_username(user)),
        }
    }

    /// The client-first message.
    #[must_use]
    pub fn client_first(&self) -> String {
        format!("{GS2_HEADER}{}", self.client_first_bare)
    }

    /// Consume the server-first message and compute the client proof.
    ///
    /// # Errors
    ///
    /// Returns an error if the message is malformed, the nonce was not extended
    /// from ours or the iteration count is out of bounds.
    pub fn handle_server_first(self, server_first: &str) -> Result<ScramClientFinal, ScramError> {
        let mut nonce = None;
        let mut salt = None;
        let mut iterations = None;

        for attr in server_first.split(',') {
            let (key, value) = attr
                .split_once('=')
                .ok_or_else(|| ScramError::Malformed(format!("attribute '{attr}'")))?;
            match key {
                "m" => {
                    return Err(ScramError::Malformed(
                        "unsupported mandatory extension".to_string(),
                    ))
                }
                "e" => return Err(ScramError::ServerError(value.to_string())),
                "r" => nonce = Some(value),
                "s" => {
                    salt = Some(STANDARD.decode(value).map_err(|e| {
                        ScramError::Malformed(format!("salt is not base64: {e}"))
                    })?);
                }
                "i" => {
                    iterations = Some(value.parse::<u32>().map_err(|e| {
                        ScramError::Malformed(format!("iteration count '{value}': {e}"))
                    })?);
                }
                _ => {}
            }
        }

        let nonce = nonce.ok_or_else(|| ScramError::Malformed("missing nonce".to_string()))?;
        let salt = salt.ok_or_else(|| ScramError::Malformed("missing salt".to_string()))?;
        let iterations = iterations
            .ok_or_else(|| ScramError::Malformed("missing iteration count".to_string()))?;

        if !nonce.starts_with(&self.client_nonce) || nonce.len() == self.client_nonce.len() {
            return Err(ScramError::NonceMismatch);
        }
        if iterations == 0 || iterations > MAX_SCRAM_ITERATIONS {
            return Err(ScramError::InvalidIterations(iterations));
        }

        let salted = salted_password(self.password.as_bytes(), &salt, iterations);
        let client_key = hmac_sha256(&salted, b"Client Key");
        let mut stored_key = [0u8; 32];
        stored_key.copy_from_slice(&Sha256::digest(client_key));
        let server_key = hmac_sha256(&salted, b"Server Key");

        let without_proof = format!("c={CHANNEL_BINDING},r={nonce}");
        let auth_message = format!("{},{server_first},{without_proof}", self.client_first_bare);

        let client_signature = hmac_sha256(&stored_key, auth_message.as_bytes());
        let proof: Vec<u8> = client_key
            .iter()
            .zip(client_signature.iter())
            .map(|(k, s)| k ^ s)
            .collect();

        Ok(ScramClientFinal {
            client_final: format!("{without_proof},p={}", STANDARD.encode(proof)),
            server_key,
            auth_message,
        })
    }
}

/// Second state of a SCRAM exchange.
pub struct ScramClientFinal {
    client_final: String,
    server_key: [u8; 32],
    auth_message: String,
}

impl ScramClientFinal {
    /// The client-final message carrying the proof.
    #[must_use]
    pub fn client_final(&self) -> &str {
        &self.client_final
    }

    /// Check the server-final message.
    ///
    /// # Errors
    ///
    /// Returns an error if the server reports a failure or its signature does not
    /// match the one derived from our salted password.
    pub fn verify_server_final(&self, server_final: &str) -> Result<(), ScramError> {
        if let Some(reason) = server_final.strip_prefix("e=") {
            return Err(ScramError::ServerError(reason.to_string()));
        }
        let encoded = server_final
            .split(',')
            .find_map(|attr| attr.strip_prefix("v="))
            .ok_or_else(|| ScramError::Malformed("missing server signature".to_string()))?;
        let signature = STANDARD
            .decode(encoded)
            .map_err(|e| ScramError::Malformed(format!("server signature is not base64: {e}")))?;

        let mut mac = keyed(&self.server_key);
        mac.update(self.auth_message.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| ScramError::InvalidServerSignature)
    }
}

/// `saslname` escaping from RFC 5802 section 5.1.
fn escape_username(user: &str) -> String {
    user.replace('=', "=3D").replace(',', "=2C")
}

fn keyed(key: &[u8]) -> HmacSha256 {
    HmacSha256::new_from_slice(key).expect("HMAC can take a key of any size")
}

pub(crate) fn hmac_sha256(key: &[u8], data: &[u8]) -> [u8; 32] {
    let mut mac = keyed(key);
    mac.update(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&mac.finalize().into_bytes());
    out
}

/// `Hi()` from RFC 5802: PBKDF2 with HMAC-SHA-256 and a single output block.
pub(crate) fn salted_password(password: &[u8], salt: &[u8], iterations: u32) -> [u8; 32] {
    let prf = keyed(password);

    let mut mac = prf.clone();
    mac.update(salt);
    mac.update(&1u32.to_be_bytes());
    let mut u = [0u8; 32];
    u.copy_from_slice(&mac.finalize().into_bytes());

    let mut result = u;
    for _ in 1..iterations {
        let mut mac = prf.clone();
        mac.update(&u);
        u.copy_from_slice(&mac.finalize().into_bytes());
        for (r, x) in result.iter_mut().zip(u.iter()) {
            *r ^= x;
        }
    }
    result
}

#[cfg(test)]
#[path = "scram_tests.rs"]
mod scram_tests;
