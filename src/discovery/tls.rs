// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! TLS client configuration for broker connections.

use rustls::pki_types::pem::PemObject;
use rustls::pki_types::CertificateDer;
use rustls::{ClientConfig, RootCertStore};
use std::sync::Arc;

use crate::errors::DiscoveryError;

/// Label used in errors raised before any broker is contacted
const CA_BUNDLE_ENDPOINT: &str = "<ca bundle>";

/// Build the client configuration used to dial seed brokers.
///
/// Trusts the Mozilla root set plus every certificate in `extra_ca_pem`, which is
/// how clusters fronted by a private CA are reached.
///
/// # Errors
///
/// Returns [`DiscoveryError::Tls`] if the extra bundle cannot be parsed or holds a
/// certificate rustls refuses.
pub fn client_config(extra_ca_pem: Option<&[u8]>) -> Result<Arc<ClientConfig>, DiscoveryError> {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    if let Some(pem) = extra_ca_pem {
        let certs = CertificateDer::pem_slice_iter(pem)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| tls_error(format!("failed to parse CA bundle: {e}")))?;
        if certs.is_empty() {
            return Err(tls_error("CA bundle holds no certificates".to_string()));
        }
        for cert in certs {
            roots
                .add(cert)
                .map_err(|e| tls_error(format!("failed to add CA certificate: {e}")))?;
        }
    }

    let config = ClientConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .map_err(|e| tls_error(e.to_string()))?
    .with_root_certificates(roots)
    .with_no_client_auth();

    Ok(Arc::new(config))
}

fn tls_error(reason: String) -> DiscoveryError {
    DiscoveryError::Tls {
        endpoint: CA_BUNDLE_ENDPOINT.to_string(),
        reason,
    }
}
