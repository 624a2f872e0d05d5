// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Google Cloud DNS record directory.
//!
//! Talks to the Cloud DNS v1 REST API:
//!
//! - `GET  .../managedZones/{zone}/rrsets` (paginated) to list records
//! - `GET  .../managedZones/{zone}/rrsets/{name}/A` to look one up
//! - `POST .../managedZones/{zone}/changes` to create or delete
//!
//! Every call carries a bearer token obtained once per directory from the
//! caller's service-account key.

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};
use url::Url;

use super::auth::{fetch_access_token, ServiceAccountKey};
use super::{fqdn, DirectoryProvider, RecordDirectory, ZoneTarget};
use crate::constants::{CLOUD_DNS_SCOPE, MAX_LIST_PAGES, RECORD_TYPE_A};
use crate::errors::DirectoryError;
use crate::types::ExistingRecord;

/// One resource record set as the API represents it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceRecordSet {
    pub name: String,
    #[serde(rename = "type")]
    pub record_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,
    #[serde(default)]
    pub rrdatas: Vec<String>,
}

impl ResourceRecordSet {
    fn a_record(hostname: &str, ip: Ipv4Addr, ttl: Option<u32>) -> Self {
        Self {
            name: fqdn(hostname),
            record_type: RECORD_TYPE_A.to_string(),
            ttl,
            rrdatas: vec![ip.to_string()],
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    rrsets: Vec<ResourceRecordSet>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Default, Serialize)]
struct Change {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    additions: Vec<ResourceRecordSet>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    deletions: Vec<ResourceRecordSet>,
}

/// Google API error envelope: `{"error": {"code", "message", "errors": [{"reason"}]}}`
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ErrorItem>,
}

#[derive(Debug, Deserialize)]
struct ErrorItem {
    #[serde(default)]
    reason: String,
}

/// Opens [`CloudDnsDirectory`] instances against one API endpoint.
#[derive(Debug, Clone)]
pub struct CloudDnsProvider {
    http: reqwest::Client,
    base_url: Url,
}

impl CloudDnsProvider {
    /// # Errors
    ///
    /// Returns [`DirectoryError::InvalidResponse`] if `endpoint` is not an absolute
    /// URL that can carry a path.
    pub fn new(http: reqwest::Client, endpoint: &str) -> Result<Self, DirectoryError> {
        let base_url = Url::parse(endpoint).map_err(|e| DirectoryError::InvalidResponse {
            endpoint: endpoint.to_string(),
            reason: format!("invalid Cloud DNS endpoint: {e}"),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(DirectoryError::InvalidResponse {
                endpoint: endpoint.to_string(),
                reason: "Cloud DNS endpoint cannot be used as a base URL".to_string(),
            });
        }
        Ok(Self { http, base_url })
    }
}

#[async_trait]
impl DirectoryProvider for CloudDnsProvider {
    async fn open(
        &self,
        target: &ZoneTarget,
        credentials: &[u8],
    ) -> Result<Arc<dyn RecordDirectory>, DirectoryError> {
        let key = ServiceAccountKey::from_json(credentials)?;
        debug!(
            project = %target.project,
            zone = %target.zone,
            client_email = %key.client_email,
            "Opening Cloud DNS directory"
        );
        Ok(Arc::new(CloudDnsDirectory::new(
            self.http.clone(),
            self.base_url.clone(),
            target.clone(),
            key,
        )))
    }
}

/// Kind of call a failed response belongs to.
#[derive(Debug, Clone, Copy)]
enum Operation<'a> {
    List,
    /// `GET rrsets/{name}/A`
    Read(&'a str),
    /// `changes` carrying additions
    Add(&'a str),
    /// `changes` carrying deletions
    Remove,
}

/// A Cloud DNS managed zone.
#[derive(Debug)]
pub struct CloudDnsDirectory {
    http: reqwest::Client,
    base_url: Url,
    target: ZoneTarget,
    key: ServiceAccountKey,
    token: OnceCell<String>,
}

impl CloudDnsDirectory {
    #[must_use]
    pub fn new(
        http: reqwest::Client,
        base_url: Url,
        target: ZoneTarget,
        key: ServiceAccountKey,
    ) -> Self {
        Self {
            http,
            base_url,
            target,
            key,
            token: OnceCell::new(),
        }
    }

    /// `{base}/dns/v1/projects/{project}/managedZones/{zone}/{segments...}`
    fn zone_url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // cannot_be_a_base was rejected when the provider was built
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty()
                .extend([
                    "dns",
                    "v1",
                    "projects",
                    self.target.project.as_str(),
                    "managedZones",
                    self.target.zone.as_str(),
                ])
                .extend(segments);
        }
        url
    }

    async fn bearer_token(&self) -> Result<&str, DirectoryError> {
        let token = self
            .token
            .get_or_try_init(|| fetch_access_token(&self.http, &self.key, CLOUD_DNS_SCOPE))
            .await?;
        Ok(token.as_str())
    }

    /// Send an authenticated request and map non-success statuses to typed errors.
    async fn send(
        &self,
        request: RequestBuilder,
        url: &Url,
        operation: Operation<'_>,
    ) -> Result<Response, DirectoryError> {
        let token = self.bearer_token().await?;
        let response = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| DirectoryError::Transport {
                endpoint: url.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(status_error(status, url, &body, operation))
    }

    async fn decode<T: DeserializeOwned>(response: Response, url: &Url) -> Result<T, DirectoryError> {
        response
            .json::<T>()
            .await
            .map_err(|e| DirectoryError::InvalidResponse {
                endpoint: url.to_string(),
                reason: e.to_string(),
            })
    }

    async fn submit_change(
        &self,
        change: &Change,
        operation: Operation<'_>,
    ) -> Result<(), DirectoryError> {
        let url = self.zone_url(&["changes"]);
        info!(
            url = %url,
            change = ?change,
            "Submitting Cloud DNS change"
        );
        self.send(self.http.post(url.clone()).json(change), &url, operation)
            .await?;
        Ok(())
    }

    async fn get_rrset(&self, hostname: &str) -> Result<ResourceRecordSet, DirectoryError> {
        let name = fqdn(hostname);
        let url = self.zone_url(&["rrsets", &name, RECORD_TYPE_A]);
        let response = self
            .send(self.http.get(url.clone()), &url, Operation::Read(&name))
            .await?;
        Self::decode(response, &url).await
    }
}

#[async_trait]
impl RecordDirectory for CloudDnsDirectory {
    async fn list_by_prefix(&self, prefix: &str) -> Result<Vec<ExistingRecord>, DirectoryError> {
        let url = self.zone_url(&["rrsets"]);
        let mut records = Vec::new();
        let mut page_token: Option<String> = None;
        let mut page_count = 0;

        loop {
            if page_count == MAX_LIST_PAGES {
                error!(
                    zone = %self.target.zone,
                    max_pages = MAX_LIST_PAGES,
                    "Record set listing did not terminate"
                );
                return Err(DirectoryError::TooManyPages {
                    zone: self.target.zone.clone(),
                    max_pages: MAX_LIST_PAGES,
                });
            }
            page_count += 1;

            let mut page_url = url.clone();
            if let Some(token) = &page_token {
                page_url.query_pairs_mut().append_pair("pageToken", token);
            }
            let response = self
                .send(self.http.get(page_url.clone()), &page_url, Operation::List)
                .await?;
            let page: ListResponse = Self::decode(response, &page_url).await?;

            let rrsets_in_page = page.rrsets.len();
            records.extend(
                page.rrsets
                    .into_iter()
                    .filter(|rrset| rrset.record_type == RECORD_TYPE_A)
                    .filter(|rrset| rrset.name.starts_with(prefix))
                    .filter_map(|rrset| match rrset.rrdatas.into_iter().next() {
                        Some(ip) => Some(ExistingRecord::new(rrset.name, ip)),
                        None => {
                            warn!(name = %rrset.name, "Dropping A record set with no data");
                            None
                        }
                    }),
            );

            debug!(
                page = page_count,
                rrsets_in_page,
                total_records = records.len(),
                "Fetched record set page from Cloud DNS"
            );

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        debug!(
            zone = %self.target.zone,
            prefix,
            total_records = records.len(),
            total_pages = page_count,
            "Completed record set listing"
        );

        Ok(records)
    }

    async fn create(&self, hostname: &str, ip: Ipv4Addr, ttl: u32) -> Result<(), DirectoryError> {
        let change = Change {
            additions: vec![ResourceRecordSet::a_record(hostname, ip, Some(ttl))],
            ..Change::default()
        };
        self.submit_change(&change, Operation::Add(&fqdn(hostname)))
            .await
    }

    async fn lookup(&self, hostname: &str) -> Result<String, DirectoryError> {
        let name = fqdn(hostname);
        let rrset = self.get_rrset(hostname).await?;
        rrset
            .rrdatas
            .into_iter()
            .next()
            .ok_or_else(|| DirectoryError::InvalidResponse {
                endpoint: self.zone_url(&["rrsets", &name, RECORD_TYPE_A]).to_string(),
                reason: format!("record set '{name}' has no data"),
            })
    }

    async fn delete(&self, hostname: &str, ip: Ipv4Addr) -> Result<(), DirectoryError> {
        let name = fqdn(hostname);
        // Deletions must match the stored record set exactly, including its TTL
        let current = self.get_rrset(hostname).await?;
        if current.rrdatas != [ip.to_string()] {
            return Err(DirectoryError::NotFound { name });
        }
        let change = Change {
            deletions: vec![current],
            ..Change::default()
        };
        self.submit_change(&change, Operation::Remove).await
    }
}

/// Map a non-success response to the error the reconciler branches on.
///
/// Only additions can collide and only record reads can miss; any other
/// failure of a zone call is a provider failure.
fn status_error(
    status: StatusCode,
    url: &Url,
    body: &str,
    operation: Operation<'_>,
) -> DirectoryError {
    let envelope = serde_json::from_str::<ErrorEnvelope>(body).ok();
    let reason = envelope
        .as_ref()
        .filter(|env| !env.error.message.is_empty())
        .map_or_else(|| body.to_string(), |env| env.error.message.clone());
    let has_reason = |wanted: &str| {
        envelope
            .as_ref()
            .is_some_and(|env| env.error.errors.iter().any(|item| item.reason == wanted))
    };

    error!(
        url = %url,
        status = %status,
        error = %reason,
        "Cloud DNS request failed"
    );

    match (status, operation) {
        (StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN, _) => DirectoryError::Unauthorized {
            endpoint: url.to_string(),
            status_code: status.as_u16(),
            reason,
        },
        (StatusCode::CONFLICT, Operation::Add(name)) => DirectoryError::AlreadyExists {
            name: name.to_string(),
        },
        (_, Operation::Add(name)) if has_reason("alreadyExists") => {
            DirectoryError::AlreadyExists {
                name: name.to_string(),
            }
        }
        (StatusCode::NOT_FOUND, Operation::Read(name)) => DirectoryError::NotFound {
            name: name.to_string(),
        },
        _ => DirectoryError::Provider {
            endpoint: url.to_string(),
            status_code: status.as_u16(),
            reason,
        },
    }
}

#[cfg(test)]
#[path = "cloud_dns_tests.rs"]
mod cloud_dns_tests;
