// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Kafka protocol discovery client.
//!
//! Dials the first reachable seed, authenticates with SCRAM-SHA-256 carried in
//! `SaslAuthenticate` frames and reads the broker list from `Metadata`.
//! The connect timeout bounds TCP connect plus TLS handshake; requests on an
//! established connection have no deadline.

use async_trait::async_trait;
use bytes::Bytes;
use rustls::pki_types::ServerName;
use rustls::ClientConfig;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::{debug, info, warn};

use super::scram::ScramClient;
use super::wire::{
    self, MetadataResponse, RequestHeader, SaslAuthenticateResponse, SaslHandshakeResponse,
};
use super::{tls, BrokerDiscovery, DiscoveryRequest};
use crate::constants::{
    DEFAULT_KAFKA_PORT, KAFKA_CLIENT_ID, MAX_KAFKA_FRAME_BYTES, SASL_MECHANISM_SCRAM_SHA_256,
};
use crate::errors::DiscoveryError;
use crate::types::BrokerRecord;

/// How connections to seed brokers are secured.
#[derive(Clone)]
pub enum Transport {
    /// TLS with the given client configuration
    Tls(Arc<ClientConfig>),
    /// Plain TCP, for local clusters
    Plaintext,
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tls(_) => f.write_str("Tls"),
            Self::Plaintext => f.write_str("Plaintext"),
        }
    }
}

/// One entry of a seed list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seed {
    pub host: String,
    pub port: u16,
}

impl fmt::Display for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Parse a comma-separated `host[:port]` seed list.
///
/// IPv6 literals must be bracketed (`[::1]:9092`). Entries without a port use
/// the default Kafka port.
///
/// # Errors
///
/// Returns [`DiscoveryError::InvalidSeed`] for an empty list or an entry that
/// cannot be parsed.
pub fn parse_seeds(list: &str) -> Result<Vec<Seed>, DiscoveryError> {
    let seeds = list
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(parse_seed)
        .collect::<Result<Vec<_>, _>>()?;

    if seeds.is_empty() {
        return Err(DiscoveryError::InvalidSeed {
            seed: list.to_string(),
            reason: "no seed brokers given".to_string(),
        });
    }
    Ok(seeds)
}

fn parse_seed(entry: &str) -> Result<Seed, DiscoveryError> {
    let invalid = |reason: &str| DiscoveryError::InvalidSeed {
        seed: entry.to_string(),
        reason: reason.to_string(),
    };

    let (host, port) = if let Some(rest) = entry.strip_prefix('[') {
        let (host, after) = rest
            .split_once(']')
            .ok_or_else(|| invalid("unterminated IPv6 literal"))?;
        match after {
            "" => (host, None),
            _ => (
                host,
                Some(
                    after
                        .strip_prefix(':')
                        .ok_or_else(|| invalid("expected ':' after IPv6 literal"))?,
                ),
            ),
        }
    } else {
        match entry.split_once(':') {
            Some((_, port)) if port.contains(':') => {
                return Err(invalid("IPv6 literals must be bracketed"))
            }
            Some((host, port)) => (host, Some(port)),
            None => (entry, None),
        }
    };

    if host.is_empty() {
        return Err(invalid("empty host"));
    }
    let port = match port {
        Some(port) => port
            .parse::<u16>()
            .map_err(|e| invalid(&format!("invalid port: {e}")))?,
        None => DEFAULT_KAFKA_PORT,
    };

    Ok(Seed {
        host: host.to_string(),
        port,
    })
}

/// Object-safe alias for the streams discovery runs over.
trait BrokerStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> BrokerStream for T {}

/// Kafka protocol implementation of [`BrokerDiscovery`].
#[derive(Debug, Clone)]
pub struct KafkaDiscovery {
    transport: Transport,
    connect_timeout: Duration,
}

impl KafkaDiscovery {
    #[must_use]
    pub fn new(transport: Transport, connect_timeout: Duration) -> Self {
        Self {
            transport,
            connect_timeout,
        }
    }

    /// Discovery over TLS, trusting the Mozilla roots plus `extra_ca_pem`.
    ///
    /// # Errors
    ///
    /// Returns an error if the extra CA bundle cannot be loaded.
    pub fn with_tls(
        extra_ca_pem: Option<&[u8]>,
        connect_timeout: Duration,
    ) -> Result<Self, DiscoveryError> {
        Ok(Self::new(
            Transport::Tls(tls::client_config(extra_ca_pem)?),
            connect_timeout,
        ))
    }

    /// Discovery over plain TCP.
    #[must_use]
    pub fn plaintext(connect_timeout: Duration) -> Self {
        Self::new(Transport::Plaintext, connect_timeout)
    }

    async fn dial(&self, seed: &Seed) -> Result<Box<dyn BrokerStream>, DiscoveryError> {
        let endpoint = seed.to_string();
        let connect = async {
            let tcp = TcpStream::connect((seed.host.as_str(), seed.port))
                .await
                .map_err(|e| DiscoveryError::Connect {
                    seeds: endpoint.clone(),
                    reason: e.to_string(),
                })?;
            // Small request/response exchanges; don't wait on Nagle
            let _ = tcp.set_nodelay(true);

            match &self.transport {
                Transport::Plaintext => {
                    Ok::<_, DiscoveryError>(Box::new(tcp) as Box<dyn BrokerStream>)
                }
                Transport::Tls(config) => {
                    let server_name = ServerName::try_from(seed.host.clone()).map_err(|e| {
                        DiscoveryError::Tls {
                            endpoint: endpoint.clone(),
                            reason: format!("invalid server name: {e}"),
                        }
                    })?;
                    let stream = TlsConnector::from(Arc::clone(config))
                        .connect(server_name, tcp)
                        .await
                        .map_err(|e| DiscoveryError::Tls {
                            endpoint: endpoint.clone(),
                            reason: e.to_string(),
                        })?;
                    Ok(Box::new(stream) as Box<dyn BrokerStream>)
                }
            }
        };

        tokio::time::timeout(self.connect_timeout, connect)
            .await
            .map_err(|_| DiscoveryError::Connect {
                seeds: endpoint.clone(),
                reason: format!("timed out after {:?}", self.connect_timeout),
            })?
    }
}

#[async_trait]
impl BrokerDiscovery for KafkaDiscovery {
    async fn discover(
        &self,
        request: &DiscoveryRequest,
    ) -> Result<Vec<BrokerRecord>, DiscoveryError> {
        let seeds = parse_seeds(&request.seed)?;
        info!(
            seeds = seeds.len(),
            user = %request.user,
            transport = ?self.transport,
            "Discovering brokers"
        );

        let mut last_error = None;
        for seed in &seeds {
            match self.dial(seed).await {
                Ok(stream) => {
                    debug!(seed = %seed, "Connected to seed broker");
                    let mut conn = BrokerConnection::new(stream, seed.to_string());
                    return fetch_brokers(&mut conn, request).await;
                }
                Err(e) => {
                    warn!(seed = %seed, error = %e, "Seed broker unreachable, trying next");
                    last_error = Some(e);
                }
            }
        }

        let all_seeds = seeds
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        Err(match last_error {
            Some(tls @ DiscoveryError::Tls { .. }) => tls,
            Some(DiscoveryError::Connect { reason, .. }) => DiscoveryError::Connect {
                seeds: all_seeds,
                reason,
            },
            Some(other) => other,
            None => DiscoveryError::InvalidSeed {
                seed: request.seed.clone(),
                reason: "no seed brokers given".to_string(),
            },
        })
    }
}

/// Authenticate on an established connection and read the broker list.
pub(crate) async fn fetch_brokers<S>(
    conn: &mut BrokerConnection<S>,
    request: &DiscoveryRequest,
) -> Result<Vec<BrokerRecord>, DiscoveryError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    conn.authenticate(&request.user, &request.password).await?;
    let metadata = conn.metadata().await?;

    let mut by_id = BTreeMap::new();
    for broker in metadata.brokers {
        if let Some(previous) = by_id.insert(broker.node_id, broker.host) {
            warn!(
                node_id = broker.node_id,
                previous = %previous,
                "Duplicate broker id in metadata, keeping the last entry"
            );
        }
    }
    if by_id.is_empty() {
        warn!(endpoint = %conn.endpoint, "Metadata response listed no brokers");
    }

    let brokers: Vec<BrokerRecord> = by_id
        .into_iter()
        .map(|(id, host)| BrokerRecord::new(id, host))
        .collect();
    info!(
        count = brokers.len(),
        controller_id = metadata.controller_id,
        "Discovered brokers"
    );
    Ok(brokers)
}

/// A connection to one broker speaking length-prefixed Kafka frames.
pub(crate) struct BrokerConnection<S> {
    stream: S,
    endpoint: String,
    next_correlation_id: i32,
}

impl<S> BrokerConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub(crate) fn new(stream: S, endpoint: String) -> Self {
        Self {
            stream,
            endpoint,
            next_correlation_id: 1,
        }
    }

    async fn round_trip(
        &mut self,
        api_key: i16,
        api_version: i16,
        body: &[u8],
    ) -> Result<Bytes, DiscoveryError> {
        let correlation_id = self.next_correlation_id;
        self.next_correlation_id = self.next_correlation_id.wrapping_add(1);

        let frame = wire::encode_request(
            &RequestHeader {
                api_key,
                api_version,
                correlation_id,
                client_id: KAFKA_CLIENT_ID,
            },
            body,
        );
        self.stream
            .write_all(&frame)
            .await
            .map_err(|e| io_error(&self.endpoint, &e))?;
        self.stream
            .flush()
            .await
            .map_err(|e| io_error(&self.endpoint, &e))?;

        let size = self
            .stream
            .read_i32()
            .await
            .map_err(|e| io_error(&self.endpoint, &e))?;
        if size < 4 || size as usize > MAX_KAFKA_FRAME_BYTES {
            return Err(protocol_error(
                &self.endpoint,
                format!("invalid frame size {size}"),
            ));
        }
        let mut buf = vec![0u8; size as usize];
        self.stream
            .read_exact(&mut buf)
            .await
            .map_err(|e| io_error(&self.endpoint, &e))?;

        wire::split_response(Bytes::from(buf), correlation_id)
            .map_err(|e| protocol_error(&self.endpoint, e.to_string()))
    }

    /// SASL handshake followed by the two-round SCRAM exchange.
    pub(crate) async fn authenticate(
        &mut self,
        user: &str,
        password: &str,
    ) -> Result<(), DiscoveryError> {
        let body = self
            .round_trip(
                wire::API_KEY_SASL_HANDSHAKE,
                wire::SASL_HANDSHAKE_VERSION,
                &wire::sasl_handshake_body(SASL_MECHANISM_SCRAM_SHA_256),
            )
            .await?;
        let handshake = SaslHandshakeResponse::decode(body)
            .map_err(|e| protocol_error(&self.endpoint, e.to_string()))?;

        let offered = handshake
            .mechanisms
            .iter()
            .any(|m| m == SASL_MECHANISM_SCRAM_SHA_256);
        if handshake.error_code == wire::ERROR_UNSUPPORTED_SASL_MECHANISM || !offered {
            return Err(DiscoveryError::UnsupportedMechanism {
                endpoint: self.endpoint.clone(),
                mechanism: SASL_MECHANISM_SCRAM_SHA_256.to_string(),
                offered: handshake.mechanisms.join(","),
            });
        }
        if handshake.error_code != wire::ERROR_NONE {
            return Err(protocol_error(
                &self.endpoint,
                format!("SaslHandshake error code {}", handshake.error_code),
            ));
        }

        let client = ScramClient::new(user, password);
        let server_first = self
            .sasl_authenticate(client.client_first().as_bytes(), user)
            .await?;
        let server_first = self.utf8(server_first, "server-first message")?;

        let client_final = client
            .handle_server_first(&server_first)
            .map_err(|e| self.auth_error(user, e.to_string()))?;
        let server_final = self
            .sasl_authenticate(client_final.client_final().as_bytes(), user)
            .await?;
        let server_final = self.utf8(server_final, "server-final message")?;

        client_final
            .verify_server_final(&server_final)
            .map_err(|e| self.auth_error(user, e.to_string()))?;

        debug!(endpoint = %self.endpoint, user = %user, "SASL authentication succeeded");
        Ok(())
    }

    async fn sasl_authenticate(
        &mut self,
        payload: &[u8],
        user: &str,
    ) -> Result<Bytes, DiscoveryError> {
        let body = self
            .round_trip(
                wire::API_KEY_SASL_AUTHENTICATE,
                wire::SASL_AUTHENTICATE_VERSION,
                &wire::sasl_authenticate_body(payload),
            )
            .await?;
        let response = SaslAuthenticateResponse::decode(body)
            .map_err(|e| protocol_error(&self.endpoint, e.to_string()))?;

        match response.error_code {
            wire::ERROR_NONE => Ok(response.auth_bytes),
            wire::ERROR_SASL_AUTHENTICATION_FAILED | wire::ERROR_ILLEGAL_SASL_STATE => {
                let reason = response
                    .error_message
                    .unwrap_or_else(|| format!("error code {}", response.error_code));
                Err(self.auth_error(user, reason))
            }
            code => Err(protocol_error(
                &self.endpoint,
                format!("SaslAuthenticate error code {code}"),
            )),
        }
    }

    pub(crate) async fn metadata(&mut self) -> Result<MetadataResponse, DiscoveryError> {
        let body = self
            .round_trip(
                wire::API_KEY_METADATA,
                wire::METADATA_VERSION,
                &wire::metadata_body(),
            )
            .await?;
        MetadataResponse::decode(body).map_err(|e| protocol_error(&self.endpoint, e.to_string()))
    }

    fn utf8(&self, bytes: Bytes, what: &str) -> Result<String, DiscoveryError> {
        String::from_utf8(bytes.to_vec())
            .map_err(|_| protocol_error(&self.endpoint, format!("{what} is not UTF-8")))
    }

    fn auth_error(&self, user: &str, reason: String) -> DiscoveryError {
        DiscoveryError::Auth {
            endpoint: self.endpoint.clone(),
            user: user.to_string(),
            reason,
        }
    }
}

fn io_error(endpoint: &str, e: &std::io::Error) -> DiscoveryError {
    DiscoveryError::Io {
        endpoint: endpoint.to_string(),
        reason: e.to_string(),
    }
}

fn protocol_error(endpoint: &str, reason: String) -> DiscoveryError {
    DiscoveryError::Protocol {
        endpoint: endpoint.to_string(),
        reason,
    }
}

#[cfg(test)]
#[path = "kafka_tests.rs"]
mod kafka_tests;
