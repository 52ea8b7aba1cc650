//! Integration tests for the Sheets client against a wiremock server.

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use skidway_sheets::{SheetsAuth, SheetsClient, SheetsCredentials, SheetsError};

const SPREADSHEET_ID: &str = "1AbCdEf";

fn client(server: &MockServer) -> SheetsClient {
    let auth = SheetsAuth::new(
        SheetsCredentials::Static {
            token: "test-token".to_string(),
        },
        reqwest::Client::new(),
    );
    SheetsClient::with_base_url(
        server.uri(),
        SPREADSHEET_ID.to_string(),
        auth,
        reqwest::Client::new(),
    )
}

#[tokio::test]
async fn read_tab_builds_rowset_from_values() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!(
            "/v4/spreadsheets/{SPREADSHEET_ID}/values/'UOCCs'"
        )))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "range": "'UOCCs'!A1:C3",
            "values": [
                ["ID", "Name", "County"],
                ["7", "Moab Transfer Station", "Grand"],
                ["9", "Logan Landfill", "Cache"]
            ]
        })))
        .mount(&server)
        .await;

    let rows = client(&server).read_tab("UOCCs").await.unwrap();
    assert_eq!(rows.header(), &["ID", "Name", "County"]);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows.text(0, "County").as_deref(), Some("Grand"));
}

#[tokio::test]
async fn read_tab_tolerates_empty_tab() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!(
            "/v4/spreadsheets/{SPREADSHEET_ID}/values/'Empty'"
        )))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "range": "'Empty'!A1" })))
        .mount(&server)
        .await;

    let rows = client(&server).read_tab("Empty").await.unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn append_rows_posts_raw_values() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!(
            "/v4/spreadsheets/{SPREADSHEET_ID}/values/'Responses':append"
        )))
        .and(query_param("valueInputOption", "RAW"))
        .and(body_partial_json(json!({
            "values": [["abc-1", "SLCoHD"]]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "updates": { "updatedRows": 1 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    client(&server)
        .append_rows("Responses", &[vec![json!("abc-1"), json!("SLCoHD")]])
        .await
        .unwrap();
}

#[tokio::test]
async fn append_rows_skips_request_when_empty() {
    let server = MockServer::start().await;
    // No mock mounted: any request would 404 and fail the call.
    client(&server).append_rows("Responses", &[]).await.unwrap();
}

#[tokio::test]
async fn ensure_tab_creates_only_missing_tabs() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/v4/spreadsheets/{SPREADSHEET_ID}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sheets": [
                { "properties": { "title": "All Responses" } },
                { "properties": { "title": "SLCoHD" } }
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/v4/spreadsheets/{SPREADSHEET_ID}:batchUpdate")))
        .and(body_partial_json(json!({
            "requests": [{ "addSheet": { "properties": { "title": "BRHD" } } }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "replies": [{}] })))
        .expect(1)
        .mount(&server)
        .await;

    let c = client(&server);
    assert!(!c.ensure_tab("SLCoHD").await.unwrap());
    assert!(c.ensure_tab("BRHD").await.unwrap());
}

#[tokio::test]
async fn rate_limit_maps_to_typed_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!(
            "/v4/spreadsheets/{SPREADSHEET_ID}/values/'UOCCs'"
        )))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("Retry-After", "17")
                .set_body_string("slow down"),
        )
        .mount(&server)
        .await;

    let err = client(&server).read_tab("UOCCs").await.unwrap_err();
    match err {
        SheetsError::RateLimited { retry_after_secs } => {
            assert_eq!(retry_after_secs, Some(17));
        }
        other => panic!("expected RateLimited, got: {other:?}"),
    }
}

#[tokio::test]
async fn not_found_maps_to_typed_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!(
            "/v4/spreadsheets/{SPREADSHEET_ID}/values/'Missing'"
        )))
        .respond_with(ResponseTemplate::new(404).set_body_string("Unable to parse range"))
        .mount(&server)
        .await;

    let err = client(&server).read_tab("Missing").await.unwrap_err();
    assert!(matches!(err, SheetsError::NotFound(_)));
}

#[tokio::test]
async fn server_error_surfaces_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!(
            "/v4/spreadsheets/{SPREADSHEET_ID}/values/'UOCCs'"
        )))
        .respond_with(ResponseTemplate::new(503).set_body_string("backend unavailable"))
        .mount(&server)
        .await;

    let err = client(&server).read_tab("UOCCs").await.unwrap_err();
    match err {
        SheetsError::Api { status, .. } => assert_eq!(status, 503),
        other => panic!("expected Api error, got: {other:?}"),
    }
}
