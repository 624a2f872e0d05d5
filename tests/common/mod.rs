// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Common test utilities for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use broker_locator::directory::{CloudDnsProvider, DirectoryProvider, RecordDirectory, ZoneTarget};
use broker_locator::discovery::{BrokerDiscovery, DiscoveryRequest};
use broker_locator::errors::DiscoveryError;
use broker_locator::types::BrokerRecord;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

pub const PROJECT: &str = "proj";
pub const ZONE: &str = "zone-1";
pub const PRIVATE_KEY: &str = include_str!("../fixtures/test_service_account_key.pem");

/// Discovery that returns a fixed broker list.
pub struct StaticDiscovery(pub Vec<BrokerRecord>);

#[async_trait]
impl BrokerDiscovery for StaticDiscovery {
    async fn discover(
        &self,
        _request: &DiscoveryRequest,
    ) -> Result<Vec<BrokerRecord>, DiscoveryError> {
        Ok(self.0.clone())
    }
}

/// Discovery of the two-broker cluster used across the tests.
pub fn two_brokers() -> StaticDiscovery {
    StaticDiscovery(vec![
        BrokerRecord::new(0, "n0.cloud"),
        BrokerRecord::new(1, "n1.cloud"),
    ])
}

/// Service-account key document whose token endpoint is on `server`.
pub fn service_account_json(server: &MockServer) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "type": "service_account",
        "project_id": PROJECT,
        "client_email": "locator@proj.iam.gserviceaccount.com",
        "private_key": PRIVATE_KEY,
        "token_uri": format!("{}/token", server.uri()),
    }))
    .unwrap()
}

/// Stateful stand-in for one Cloud DNS managed zone.
///
/// Serves the list (two record sets per page), get and change endpoints,
/// answering duplicate additions with 409 like the real API.
#[derive(Clone, Default)]
pub struct FakeCloudDns {
    records: Arc<Mutex<BTreeMap<String, Value>>>,
    changes: Arc<Mutex<usize>>,
}

const PAGE_SIZE: usize = 2;

impl FakeCloudDns {
    pub fn with_a_records(records: &[(&str, &str)]) -> Self {
        let fake = Self::default();
        {
            let mut stored = fake.records.lock().unwrap();
            for (name, ip) in records {
                stored.insert(
                    (*name).to_string(),
                    json!({"name": name, "type": "A", "ttl": 300, "rrdatas": [ip]}),
                );
            }
        }
        fake
    }

    /// Address bound to `name`, if any.
    pub fn address(&self, name: &str) -> Option<String> {
        self.records
            .lock()
            .unwrap()
            .get(name)
            .and_then(|rrset| rrset["rrdatas"][0].as_str().map(str::to_string))
    }

    /// Number of accepted change requests.
    pub fn change_count(&self) -> usize {
        *self.changes.lock().unwrap()
    }

    /// Start a mock server serving this zone and the OAuth token endpoint.
    pub async fn start(&self) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"access_token": "test-token", "expires_in": 3600})),
            )
            .mount(&server)
            .await;
        Mock::given(path_regex(format!(
            "^/dns/v1/projects/{PROJECT}/managedZones/{ZONE}/"
        )))
        .respond_with(self.clone())
        .mount(&server)
        .await;
        server
    }

    /// Open a Cloud DNS directory against `server`.
    pub async fn open(server: &MockServer) -> Arc<dyn RecordDirectory> {
        CloudDnsProvider::new(reqwest::Client::new(), &server.uri())
            .unwrap()
            .open(
                &ZoneTarget {
                    project: PROJECT.to_string(),
                    zone: ZONE.to_string(),
                },
                &service_account_json(server),
            )
            .await
            .unwrap()
    }

    fn list(&self, request: &Request) -> ResponseTemplate {
        let start: usize = request
            .url
            .query_pairs()
            .find(|(key, _)| key == "pageToken")
            .and_then(|(_, token)| token.parse().ok())
            .unwrap_or(0);

        let records = self.records.lock().unwrap();
        let page: Vec<Value> = records.values().skip(start).take(PAGE_SIZE).cloned().collect();
        let mut body = json!({"kind": "dns#resourceRecordSetsListResponse", "rrsets": page});
        if start + PAGE_SIZE < records.len() {
            body["nextPageToken"] = json!((start + PAGE_SIZE).to_string());
        }
        ResponseTemplate::new(200).set_body_json(body)
    }

    fn get(&self, name: &str) -> ResponseTemplate {
        match self.records.lock().unwrap().get(name) {
            Some(rrset) => ResponseTemplate::new(200).set_body_json(rrset),
            None => error(404, "notFound", &format!("The resource '{name}' was not found")),
        }
    }

    fn change(&self, request: &Request) -> ResponseTemplate {
        let Ok(change) = serde_json::from_slice::<Value>(&request.body) else {
            return error(400, "invalid", "malformed change");
        };
        let mut records = self.records.lock().unwrap();

        let empty = Vec::new();
        let additions = change["additions"].as_array().unwrap_or(&empty);
        let deletions = change["deletions"].as_array().unwrap_or(&empty);

        for rrset in additions {
            let name = rrset["name"].as_str().unwrap_or_default();
            if records.contains_key(name) {
                return error(
                    409,
                    "alreadyExists",
                    &format!("The resource '{name} (A)' already exists"),
                );
            }
        }
        for rrset in deletions {
            let name = rrset["name"].as_str().unwrap_or_default();
            if records.get(name) != Some(rrset) {
                return error(404, "notFound", &format!("The resource '{name}' was not found"));
            }
        }

        for rrset in deletions {
            records.remove(rrset["name"].as_str().unwrap_or_default());
        }
        for rrset in additions {
            records.insert(
                rrset["name"].as_str().unwrap_or_default().to_string(),
                rrset.clone(),
            );
        }
        *self.changes.lock().unwrap() += 1;

        ResponseTemplate::new(200).set_body_json(json!({"kind": "dns#change", "status": "pending"}))
    }
}

impl Respond for FakeCloudDns {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let segments: Vec<&str> = request
            .url
            .path_segments()
            .map(Iterator::collect)
            .unwrap_or_default();
        // dns/v1/projects/{p}/managedZones/{z}/...
        match (request.method.as_str(), &segments[6..]) {
            ("GET", ["rrsets"]) => self.list(request),
            ("GET", ["rrsets", name, "A"]) => self.get(name),
            ("POST", ["changes"]) => self.change(request),
            _ => ResponseTemplate::new(405),
        }
    }
}

fn error(code: u16, reason: &str, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(code).set_body_json(json!({
        "error": {"code": code, "message": message, "errors": [{"reason": reason, "message": message}]},
    }))
}
