// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `cloud_dns.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PRIVATE_KEY: &str = include_str!("../../tests/fixtures/test_service_account_key.pem");
    const RRSETS: &str = "/dns/v1/projects/proj/managedZones/zone-1/rrsets";
    const CHANGES: &str = "/dns/v1/projects/proj/managedZones/zone-1/changes";

    async fn directory(server: &MockServer) -> Arc<dyn RecordDirectory> {
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"access_token": "test-token", "expires_in": 3600})),
            )
            .mount(server)
            .await;

        let credentials = serde_json::to_vec(&json!({
            "client_email": "locator@proj.iam.gserviceaccount.com",
            "private_key": PRIVATE_KEY,
            "token_uri": format!("{}/token", server.uri()),
        }))
        .unwrap();

        let provider = CloudDnsProvider::new(reqwest::Client::new(), &server.uri()).unwrap();
        provider
            .open(
                &ZoneTarget {
                    project: "proj".to_string(),
                    zone: "zone-1".to_string(),
                },
                &credentials,
            )
            .await
            .unwrap()
    }

    fn rrset(name: &str, record_type: &str, data: &str) -> serde_json::Value {
        json!({"name": name, "type": record_type, "ttl": 300, "rrdatas": [data], "kind": "dns#resourceRecordSet"})
    }

    #[test]
    fn test_provider_rejects_invalid_endpoint() {
        let err = CloudDnsProvider::new(reqwest::Client::new(), "not a url").unwrap_err();
        assert!(matches!(err, DirectoryError::InvalidResponse { .. }));

        let err = CloudDnsProvider::new(reqwest::Client::new(), "mailto:dns@example.com").unwrap_err();
        assert!(matches!(err, DirectoryError::InvalidResponse { .. }));
    }

    #[tokio::test]
    async fn test_open_rejects_bad_credentials() {
        let provider =
            CloudDnsProvider::new(reqwest::Client::new(), "https://dns.googleapis.com").unwrap();
        let target = ZoneTarget {
            project: "proj".to_string(),
            zone: "zone-1".to_string(),
        };
        let err = provider.open(&target, b"{}").await.err().unwrap();
        assert!(err.is_auth());
    }

    #[tokio::test]
    async fn test_list_follows_every_page_and_filters() {
        let server = MockServer::start().await;
        let dir = directory(&server).await;

        Mock::given(method("GET"))
            .and(path(RRSETS))
            .and(query_param("pageToken", "page-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "rrsets": [
                    rrset("n2.cloud.", "A", "10.0.0.12"),
                    rrset("other.cloud.", "A", "10.0.0.99"),
                ],
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(RRSETS))
            .and(header("authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "rrsets": [
                    rrset("cloud.", "NS", "ns1.example.com."),
                    rrset("n0.cloud.", "A", "10.0.0.10"),
                    rrset("n1.cloud.", "AAAA", "fd00::1"),
                    rrset("n1.cloud.", "A", "10.0.0.11"),
                ],
                "nextPageToken": "page-2",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let records = dir.list_by_prefix("n").await.unwrap();
        assert_eq!(
            records,
            vec![
                ExistingRecord::new("n0.cloud.", "10.0.0.10"),
                ExistingRecord::new("n1.cloud.", "10.0.0.11"),
                ExistingRecord::new("n2.cloud.", "10.0.0.12"),
            ]
        );
    }

    #[tokio::test]
    async fn test_list_fails_when_pages_never_end() {
        let server = MockServer::start().await;
        let dir = directory(&server).await;

        Mock::given(method("GET"))
            .and(path(RRSETS))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "rrsets": [],
                "nextPageToken": "again",
            })))
            .mount(&server)
            .await;

        let err = dir.list_by_prefix("n").await.unwrap_err();
        assert_eq!(
            err,
            DirectoryError::TooManyPages {
                zone: "zone-1".to_string(),
                max_pages: MAX_LIST_PAGES,
            }
        );
    }

    #[tokio::test]
    async fn test_list_unauthorized() {
        let server = MockServer::start().await;
        let dir = directory(&server).await;

        Mock::given(method("GET"))
            .and(path(RRSETS))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "error": {"code": 403, "message": "Forbidden", "errors": [{"reason": "forbidden"}]},
            })))
            .mount(&server)
            .await;

        let err = dir.list_by_prefix("n").await.unwrap_err();
        match err {
            DirectoryError::Unauthorized {
                status_code,
                reason,
                ..
            } => {
                assert_eq!(status_code, 403);
                assert_eq!(reason, "Forbidden");
            }
            other => panic!("expected Unauthorized, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_create_posts_addition() {
        let server = MockServer::start().await;
        let dir = directory(&server).await;

        Mock::given(method("POST"))
            .and(path(CHANGES))
            .and(body_json(json!({
                "additions": [{"name": "n0.cloud.", "type": "A", "ttl": 300, "rrdatas": ["10.0.0.10"]}],
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "pending"})))
            .expect(1)
            .mount(&server)
            .await;

        dir.create("n0.cloud", Ipv4Addr::new(10, 0, 0, 10), 300)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_create_conflict_is_already_exists() {
        let server = MockServer::start().await;
        let dir = directory(&server).await;

        Mock::given(method("POST"))
            .and(path(CHANGES))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "error": {
                    "code": 409,
                    "message": "The resource 'entity.change.additions[0]' named 'n0.cloud. (A)' already exists",
                    "errors": [{"reason": "alreadyExists"}],
                },
            })))
            .mount(&server)
            .await;

        let err = dir
            .create("n0.cloud.", Ipv4Addr::new(10, 0, 0, 10), 300)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            DirectoryError::AlreadyExists {
                name: "n0.cloud.".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_create_server_error_is_provider_error() {
        let server = MockServer::start().await;
        let dir = directory(&server).await;

        Mock::given(method("POST"))
            .and(path(CHANGES))
            .respond_with(ResponseTemplate::new(500).set_body_string("backend unavailable"))
            .mount(&server)
            .await;

        let err = dir
            .create("n0.cloud.", Ipv4Addr::new(10, 0, 0, 10), 300)
            .await
            .unwrap_err();
        match err {
            DirectoryError::Provider {
                status_code,
                reason,
                ..
            } => {
                assert_eq!(status_code, 500);
                assert_eq!(reason, "backend unavailable");
            }
            other => panic!("expected Provider, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_create_already_exists_reason_without_conflict_status() {
        let server = MockServer::start().await;
        let dir = directory(&server).await;

        Mock::given(method("POST"))
            .and(path(CHANGES))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {
                    "code": 400,
                    "message": "The resource 'n0.cloud. (A)' already exists",
                    "errors": [{"reason": "alreadyExists"}],
                },
            })))
            .mount(&server)
            .await;

        let err = dir
            .create("n0.cloud", Ipv4Addr::new(10, 0, 0, 10), 300)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            DirectoryError::AlreadyExists {
                name: "n0.cloud.".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_create_in_missing_zone_is_provider_error() {
        let server = MockServer::start().await;
        let dir = directory(&server).await;

        Mock::given(method("POST"))
            .and(path(CHANGES))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": {
                    "code": 404,
                    "message": "The 'parameters.managedZone' resource named 'zone-1' does not exist.",
                    "errors": [{"reason": "notFound"}],
                },
            })))
            .mount(&server)
            .await;

        let err = dir
            .create("n0.cloud", Ipv4Addr::new(10, 0, 0, 10), 300)
            .await
            .unwrap_err();
        match err {
            DirectoryError::Provider { status_code, .. } => assert_eq!(status_code, 404),
            other => panic!("expected Provider, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_delete_conflict_is_provider_error() {
        let server = MockServer::start().await;
        let dir = directory(&server).await;

        Mock::given(method("GET"))
            .and(path(format!("{RRSETS}/n0.cloud./A")))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(rrset("n0.cloud.", "A", "10.0.0.10")),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(CHANGES))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "error": {"code": 409, "message": "conflicting change", "errors": [{"reason": "conflict"}]},
            })))
            .mount(&server)
            .await;

        let err = dir
            .delete("n0.cloud", Ipv4Addr::new(10, 0, 0, 10))
            .await
            .unwrap_err();
        match err {
            DirectoryError::Provider { status_code, .. } => assert_eq!(status_code, 409),
            other => panic!("expected Provider, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_lookup_returns_first_address() {
        let server = MockServer::start().await;
        let dir = directory(&server).await;

        Mock::given(method("GET"))
            .and(path(format!("{RRSETS}/n0.cloud./A")))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(rrset("n0.cloud.", "A", "10.0.0.77")),
            )
            .mount(&server)
            .await;

        assert_eq!(dir.lookup("n0.cloud").await.unwrap(), "10.0.0.77");
    }

    #[tokio::test]
    async fn test_lookup_missing_is_not_found() {
        let server = MockServer::start().await;
        let dir = directory(&server).await;

        Mock::given(method("GET"))
            .and(path(format!("{RRSETS}/n9.cloud./A")))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": {"code": 404, "message": "not found", "errors": [{"reason": "notFound"}]},
            })))
            .mount(&server)
            .await;

        assert_eq!(
            dir.lookup("n9.cloud.").await.unwrap_err(),
            DirectoryError::NotFound {
                name: "n9.cloud.".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_delete_posts_exact_record_set() {
        let server = MockServer::start().await;
        let dir = directory(&server).await;

        Mock::given(method("GET"))
            .and(path(format!("{RRSETS}/n0.cloud./A")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "n0.cloud.", "type": "A", "ttl": 60, "rrdatas": ["10.0.0.10"],
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(CHANGES))
            .and(body_json(json!({
                "deletions": [{"name": "n0.cloud.", "type": "A", "ttl": 60, "rrdatas": ["10.0.0.10"]}],
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "pending"})))
            .expect(1)
            .mount(&server)
            .await;

        dir.delete("n0.cloud", Ipv4Addr::new(10, 0, 0, 10))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_delete_other_address_is_not_found() {
        let server = MockServer::start().await;
        let dir = directory(&server).await;

        Mock::given(method("GET"))
            .and(path(format!("{RRSETS}/n0.cloud./A")))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(rrset("n0.cloud.", "A", "10.0.0.99")),
            )
            .mount(&server)
            .await;

        let err = dir
            .delete("n0.cloud", Ipv4Addr::new(10, 0, 0, 10))
            .await
            .unwrap_err();
        assert!(matches!(err, DirectoryError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_token_is_fetched_once_per_directory() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"access_token": "test-token"})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(RRSETS))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"rrsets": []})))
            .expect(2)
            .mount(&server)
            .await;

        let credentials = serde_json::to_vec(&json!({
            "client_email": "locator@proj.iam.gserviceaccount.com",
            "private_key": PRIVATE_KEY,
            "token_uri": format!("{}/token", server.uri()),
        }))
        .unwrap();
        let provider = CloudDnsProvider::new(reqwest::Client::new(), &server.uri()).unwrap();
        let dir = provider
            .open(
                &ZoneTarget {
                    project: "proj".to_string(),
                    zone: "zone-1".to_string(),
                },
                &credentials,
            )
            .await
            .unwrap();

        assert!(dir.list_by_prefix("n").await.unwrap().is_empty());
        assert!(dir.list_by_prefix("n").await.unwrap().is_empty());
    }
}
