use super::{ApiRequest, ApiResponse};
use crate::domain::model::{collections, Document, Vessel};
use crate::domain::ports::DocumentStore;
use crate::report::PortSelection;
use serde_json::{json, Value};

pub const API_KEY_HEADER: &str = "x-api-key";

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes().zip(b.bytes()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn authorized(request: &ApiRequest, api_key: &str) -> bool {
    // 未設定金鑰時一律拒絕
    if api_key.is_empty() {
        return false;
    }
    request
        .header(API_KEY_HEADER)
        .is_some_and(|provided| constant_time_eq(provided, api_key))
}

fn matches_port(doc: &Document, port: &PortSelection) -> bool {
    if port.is_all() {
        return true;
    }
    let vessel = Vessel::from_document(doc);
    port.matches(vessel.port_name.as_deref(), vessel.port_id.as_deref())
}

/// `GET /getVessels`: every vessel document as `{ success, count, data }`.
pub async fn get_vessels<D: DocumentStore>(
    store: &D,
    api_key: &str,
    request: &ApiRequest,
) -> ApiResponse {
    let method = request.http_method.to_ascii_uppercase();
    if method == "OPTIONS" {
        return ApiResponse::empty(204);
    }
    if method != "GET" {
        return ApiResponse::json(
            405,
            json!({ "success": false, "error": "Method not allowed" }),
        );
    }
    if !authorized(request, api_key) {
        tracing::warn!("🚫 getVessels rejected: missing or invalid API key");
        return ApiResponse::json(401, json!({ "success": false, "error": "Unauthorized" }));
    }

    let port = request
        .query("port")
        .map(PortSelection::parse)
        .unwrap_or(PortSelection::All);

    match store.list(collections::VESSELS).await {
        Ok(documents) => {
            let data: Vec<Value> = documents
                .iter()
                .filter(|doc| matches_port(doc, &port))
                .map(Document::to_json_with_id)
                .collect();
            tracing::info!("🚢 getVessels returned {} vessel(s) for {}", data.len(), port);
            ApiResponse::json(
                200,
                json!({ "success": true, "count": data.len(), "data": data }),
            )
        }
        Err(e) => {
            tracing::error!("❌ getVessels failed: {}", e);
            ApiResponse::json(500, json!({ "success": false, "error": e.to_string() }))
        }
    }
}
