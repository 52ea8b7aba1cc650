//! Integration tests for the feature-service client against wiremock.

use serde_json::{json, Map, Value};
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use skidway_core::secrets::PortalCredentials;
use skidway_features::{
    Feature, FeatureServiceClient, FeatureServiceError, PortalAuth, PortalToken,
};

fn client() -> FeatureServiceClient {
    let auth = PortalAuth::new(
        PortalToken::Static {
            token: "test-token".to_string(),
        },
        reqwest::Client::new(),
    );
    FeatureServiceClient::new(auth, reqwest::Client::new())
}

fn feature(pairs: &[(&str, Value)]) -> Feature {
    let mut attributes = Map::new();
    for (k, v) in pairs {
        attributes.insert((*k).to_string(), v.clone());
    }
    Feature::from_attributes(attributes)
}

#[tokio::test]
async fn query_follows_transfer_limit_pagination() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/layers/0/query"))
        .and(query_param("resultOffset", "0"))
        .and(query_param("token", "test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "features": [
                { "attributes": { "objectid": 1, "site_id": "7" } },
                { "attributes": { "objectid": 2, "site_id": "9" } }
            ],
            "exceededTransferLimit": true
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/layers/0/query"))
        .and(query_param("resultOffset", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "features": [
                { "attributes": { "objectid": 3, "site_id": "12" } }
            ],
            "exceededTransferLimit": false
        })))
        .mount(&server)
        .await;

    let url = format!("{}/layers/0", server.uri());
    let features = client().query(&url, "1=1").await.unwrap();
    assert_eq!(features.len(), 3);
    assert_eq!(features[2].attributes["site_id"], json!("12"));
}

#[tokio::test]
async fn query_surfaces_tunneled_service_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/layers/0/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": { "code": 400, "message": "Invalid query parameters." }
        })))
        .mount(&server)
        .await;

    let url = format!("{}/layers/0", server.uri());
    let err = client().query(&url, "bogus").await.unwrap_err();
    match err {
        FeatureServiceError::Service { code, message } => {
            assert_eq!(code, 400);
            assert_eq!(message, "Invalid query parameters.");
        }
        other => panic!("expected Service error, got: {other:?}"),
    }
}

#[tokio::test]
async fn invalid_token_code_maps_to_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/layers/0/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": { "code": 498, "message": "Invalid token." }
        })))
        .mount(&server)
        .await;

    let url = format!("{}/layers/0", server.uri());
    let err = client().query(&url, "1=1").await.unwrap_err();
    assert!(matches!(err, FeatureServiceError::Auth(_)));
}

#[tokio::test]
async fn layer_fields_parses_schema() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/layers/1"))
        .and(query_param("f", "json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "survey_responses",
            "fields": [
                { "name": "objectid", "alias": "OBJECTID", "type": "esriFieldTypeOID" },
                { "name": "globalid", "alias": "GlobalID", "type": "esriFieldTypeGlobalID" },
                { "name": "q1_gallons", "alias": "1. Gallons collected", "type": "esriFieldTypeDouble" }
            ]
        })))
        .mount(&server)
        .await;

    let url = format!("{}/layers/1", server.uri());
    let fields = client().layer_fields(&url).await.unwrap();
    assert_eq!(fields.len(), 3);
    assert_eq!(fields[2].name, "q1_gallons");
    assert_eq!(fields[2].alias, "1. Gallons collected");
}

#[tokio::test]
async fn add_features_posts_edits_and_counts_results() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/layers/0/applyEdits"))
        .and(body_string_contains("adds="))
        .and(body_string_contains("token=test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "addResults": [
                { "objectId": 101, "success": true },
                { "objectId": 102, "success": true }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}/layers/0", server.uri());
    let outcome = client()
        .add_features(
            &url,
            &[
                feature(&[("site_id", json!("7"))]),
                feature(&[("site_id", json!("9"))]),
            ],
        )
        .await
        .unwrap();
    assert_eq!(outcome.added, 2);
    assert_eq!(outcome.updated, 0);
}

#[tokio::test]
async fn add_features_skips_request_when_empty() {
    let server = MockServer::start().await;
    // No mock mounted: any request would 404 and fail the call.
    let url = format!("{}/layers/0", server.uri());
    let outcome = client().add_features(&url, &[]).await.unwrap();
    assert_eq!(outcome, Default::default());
}

#[tokio::test]
async fn rejected_update_fails_with_edit_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/layers/0/applyEdits"))
        .and(body_string_contains("updates="))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "updateResults": [
                {
                    "objectId": 55,
                    "success": false,
                    "error": { "code": 1000, "description": "Value out of range." }
                }
            ]
        })))
        .mount(&server)
        .await;

    let url = format!("{}/layers/0", server.uri());
    let err = client()
        .update_features(&url, &[feature(&[("objectid", json!(55))])])
        .await
        .unwrap_err();
    match err {
        FeatureServiceError::EditRejected { key, message } => {
            assert_eq!(key, "55");
            assert_eq!(message, "Value out of range.");
        }
        other => panic!("expected EditRejected, got: {other:?}"),
    }
}

#[tokio::test]
async fn portal_credentials_generate_and_reuse_a_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sharing/rest/generateToken"))
        .and(body_string_contains("username=skid_user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            // Expires far in the future so the cache stays warm.
            "token": "portal-token",
            "expires": 4_102_444_800_000_i64
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/layers/0/query"))
        .and(query_param("token", "portal-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "features": [],
            "exceededTransferLimit": false
        })))
        .expect(2)
        .mount(&server)
        .await;

    let auth = PortalAuth::new(
        PortalToken::Portal {
            credentials: PortalCredentials {
                username: "skid_user".to_string(),
                password: "hunter2".to_string(),
                portal_url: server.uri(),
            },
        },
        reqwest::Client::new(),
    );
    let client = FeatureServiceClient::new(auth, reqwest::Client::new());

    let url = format!("{}/layers/0", server.uri());
    client.query(&url, "1=1").await.unwrap();
    client.query(&url, "1=1").await.unwrap();
}

#[tokio::test]
async fn add_features_splits_large_batches_into_chunks() {
    let server = MockServer::start().await;
    // 101 features force a second applyEdits call for the tail feature.
    let batch: Vec<Feature> = (0..=100)
        .map(|i| feature(&[("site_id", json!(format!("site-{i}")))]))
        .collect();

    Mock::given(method("POST"))
        .and(path("/layers/0/applyEdits"))
        .and(body_string_contains("site-100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "addResults": [{ "objectId": 200, "success": true }]
        })))
        .expect(1)
        .mount(&server)
        .await;
    let first_chunk_results: Vec<Value> = (0..100)
        .map(|i| json!({ "objectId": i, "success": true }))
        .collect();
    Mock::given(method("POST"))
        .and(path("/layers/0/applyEdits"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "addResults": first_chunk_results
        })))
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}/layers/0", server.uri());
    let outcome = client().add_features(&url, &batch).await.unwrap();
    assert_eq!(outcome.added, 101);
}

#[tokio::test]
async fn rejected_chunk_stops_the_remaining_edits() {
    let server = MockServer::start().await;
    let batch: Vec<Feature> = (0..=100)
        .map(|i| feature(&[("site_id", json!(format!("site-{i}")))]))
        .collect();

    let mut failed_results: Vec<Value> = (0..100)
        .map(|i| json!({ "objectId": i, "success": true }))
        .collect();
    failed_results[3] = json!({ "success": false, "error": { "code": 1000, "description": "bad value" } });
    Mock::given(method("POST"))
        .and(path("/layers/0/applyEdits"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "addResults": failed_results
        })))
        .mount(&server)
        .await;

    let url = format!("{}/layers/0", server.uri());
    let err = client().add_features(&url, &batch).await.unwrap_err();
    assert!(matches!(err, FeatureServiceError::EditRejected { .. }));

    // The second chunk is never sent once the first one fails.
    let requests = server.received_requests().await.unwrap();
    let edits = requests
        .iter()
        .filter(|r| r.url.path().ends_with("/applyEdits"))
        .count();
    assert_eq!(edits, 1);
}
