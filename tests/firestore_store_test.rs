use httpmock::prelude::*;
use httpmock::Method::PATCH;
use port_portal::adapters::firestore::FirestoreStore;
use port_portal::api::vessels::get_vessels;
use port_portal::api::ApiRequest;
use port_portal::domain::model::{collections, Fields, Vessel};
use port_portal::{DocumentStore, PortalError};
use serde_json::json;

const DOCS: &str = "/projects/png-ports/databases/(default)/documents";

fn store(server: &MockServer) -> FirestoreStore {
    FirestoreStore::new(server.base_url(), "png-ports").with_api_key(Some("web-key".to_string()))
}

fn vessel_doc(id: &str, name: &str, port: &str) -> serde_json::Value {
    json!({
        "name": format!("projects/png-ports/databases/(default)/documents/vessels/{}", id),
        "fields": {
            "vesselName": { "stringValue": name },
            "portName": { "stringValue": port },
            "arrivalDate": { "timestampValue": "2024-03-04T00:00:00Z" },
            "cargoQuantity": { "integerValue": "320" },
            "cargoType": { "stringValue": "Containers" }
        }
    })
}

#[tokio::test]
async fn test_list_follows_page_tokens() {
    let server = MockServer::start();
    // 帶 pageToken 的請求先定義
    let second = server.mock(|when, then| {
        when.method(GET)
            .path(format!("{}/vessels", DOCS))
            .query_param("pageToken", "page-2");
        then.status(200).json_body(json!({
            "documents": [vessel_doc("v2", "MV Sepik", "Madang")]
        }));
    });
    let first = server.mock(|when, then| {
        when.method(GET)
            .path(format!("{}/vessels", DOCS))
            .query_param("pageSize", "300")
            .query_param("key", "web-key");
        then.status(200).json_body(json!({
            "documents": [vessel_doc("v1", "MV Kumul", "Lae")],
            "nextPageToken": "page-2"
        }));
    });

    let docs = store(&server).list(collections::VESSELS).await.unwrap();
    first.assert();
    second.assert();

    assert_eq!(docs.len(), 2);
    assert_eq!(docs[0].id, "v1");
    let vessel = Vessel::from_document(&docs[0]);
    assert_eq!(vessel.vessel_name, "MV Kumul");
    assert_eq!(vessel.total_cargo(), 320.0);
    assert_eq!(docs[1].id, "v2");
}

#[tokio::test]
async fn test_empty_collection() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path(format!("{}/hods", DOCS));
        then.status(200).json_body(json!({}));
    });
    assert!(store(&server).list(collections::HODS).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_get_missing_document_is_none() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path(format!("{}/users/nobody", DOCS));
        then.status(404).json_body(json!({ "error": { "code": 404, "message": "not found" } }));
    });
    assert!(store(&server).get(collections::USERS, "nobody").await.unwrap().is_none());
}

#[tokio::test]
async fn test_update_sends_field_mask_and_bearer_token() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(PATCH)
            .path(format!("{}/vessels/v1", DOCS))
            .query_param("updateMask.fieldPaths", "clearanceIssuedOn")
            .query_param("currentDocument.exists", "true")
            .header("authorization", "Bearer id-token-1")
            .json_body(json!({
                "fields": { "clearanceIssuedOn": { "stringValue": "2024-03-05" } }
            }));
        then.status(200).json_body(vessel_doc("v1", "MV Kumul", "Lae"));
    });

    let store = store(&server);
    store.set_id_token(Some("id-token-1".to_string())).await;
    let mut patch = Fields::new();
    patch.insert("clearanceIssuedOn".to_string(), json!("2024-03-05"));
    store.update(collections::VESSELS, "v1", patch).await.unwrap();
    mock.assert();
}

#[tokio::test]
async fn test_update_missing_document_is_not_found() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(PATCH).path(format!("{}/vessels/ghost", DOCS));
        then.status(404).json_body(json!({ "error": { "message": "No document to update" } }));
    });

    let mut patch = Fields::new();
    patch.insert("berth".to_string(), json!("B1"));
    let err = store(&server)
        .update(collections::VESSELS, "ghost", patch)
        .await
        .unwrap_err();
    assert!(matches!(err, PortalError::NotFound { .. }));
}

#[tokio::test]
async fn test_add_returns_generated_id() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path(format!("{}/weeklyPerformances", DOCS))
            .json_body(json!({ "fields": { "vesselsHandled": { "integerValue": "9" } } }));
        then.status(200).json_body(json!({
            "name": "projects/png-ports/databases/(default)/documents/weeklyPerformances/AbC123",
            "fields": { "vesselsHandled": { "integerValue": "9" } }
        }));
    });

    let mut data = Fields::new();
    data.insert("vesselsHandled".to_string(), json!(9));
    let id = store(&server)
        .add(collections::WEEKLY_PERFORMANCES, data)
        .await
        .unwrap();
    mock.assert();
    assert_eq!(id, "AbC123");
}

#[tokio::test]
async fn test_permission_denied_maps_to_auth_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path(format!("{}/users", DOCS));
        then.status(403).json_body(json!({
            "error": { "code": 403, "message": "Missing or insufficient permissions." }
        }));
    });

    let err = store(&server).list(collections::USERS).await.unwrap_err();
    match err {
        PortalError::AuthError { message } => {
            assert_eq!(message, "Missing or insufficient permissions.")
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_server_errors_count_as_network_failures() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path(format!("{}/users/u1", DOCS));
        then.status(503).body("upstream unavailable");
    });

    let err = store(&server).get(collections::USERS, "u1").await.unwrap_err();
    assert!(err.is_network());
}

#[tokio::test]
async fn test_get_vessels_over_firestore() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path(format!("{}/vessels", DOCS));
        then.status(200).json_body(json!({
            "documents": [vessel_doc("v1", "MV Kumul", "Lae"), vessel_doc("v2", "MV Sepik", "Madang")]
        }));
    });

    let request = ApiRequest::new("GET")
        .with_header("X-Api-Key", "k")
        .with_query("port", "madang");
    let response = get_vessels(&store(&server), "k", &request).await;
    assert_eq!(response.status_code, 200);

    let body = response.body_json().unwrap();
    assert_eq!(body["count"], json!(1));
    assert_eq!(body["data"][0]["id"], json!("v2"));
    assert_eq!(body["data"][0]["cargoQuantity"], json!(320));
}

#[tokio::test]
async fn test_get_vessels_reports_backend_failure() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path(format!("{}/vessels", DOCS));
        then.status(500).json_body(json!({ "error": { "message": "internal" } }));
    });

    let request = ApiRequest::new("GET").with_header("x-api-key", "k");
    let response = get_vessels(&store(&server), "k", &request).await;
    assert_eq!(response.status_code, 500);
    assert_eq!(response.body_json().unwrap()["success"], json!(false));
    assert_eq!(response.headers["Access-Control-Allow-Origin"], "*");
}
