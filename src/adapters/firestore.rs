//! Firestore REST (v1) document store.
//!
//! Documents travel as typed values (`stringValue`, `integerValue`, `mapValue`, ...);
//! this adapter converts them to and from plain JSON so the rest of the crate only
//! sees schemaless field bags.

use crate::domain::model::{Document, Fields};
use crate::domain::ports::DocumentStore;
use crate::utils::error::{PortalError, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tokio::sync::RwLock;

pub const DEFAULT_BASE_URL: &str = "https://firestore.googleapis.com/v1";
const PAGE_SIZE: &str = "300";

#[derive(Debug, Deserialize)]
struct RawDocument {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    documents: Vec<RawDocument>,
    next_page_token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FirestoreStore {
    client: Client,
    base_url: String,
    project_id: String,
    database: String,
    api_key: Option<String>,
    id_token: Arc<RwLock<Option<String>>>,
}

impl FirestoreStore {
    pub fn new(base_url: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            project_id: project_id.into(),
            database: "(default)".to_string(),
            api_key: None,
            id_token: Arc::new(RwLock::new(None)),
        }
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|k| !k.trim().is_empty());
        self
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn with_id_token(mut self, token: Option<String>) -> Self {
        self.id_token = Arc::new(RwLock::new(token.filter(|t| !t.trim().is_empty())));
        self
    }

    /// 登入後設定 ID token，之後的請求帶 Bearer
    pub async fn set_id_token(&self, token: Option<String>) {
        *self.id_token.write().await = token;
    }

    fn documents_url(&self) -> String {
        format!(
            "{}/projects/{}/databases/{}/documents",
            self.base_url, self.project_id, self.database
        )
    }

    fn collection_url(&self, collection: &str) -> String {
        format!("{}/{}", self.documents_url(), collection)
    }

    fn document_url(&self, collection: &str, id: &str) -> String {
        format!("{}/{}/{}", self.documents_url(), collection, id)
    }

    async fn authorize(&self, mut request: RequestBuilder) -> RequestBuilder {
        if let Some(key) = &self.api_key {
            request = request.query(&[("key", key.as_str())]);
        }
        if let Some(token) = self.id_token.read().await.as_deref() {
            request = request.bearer_auth(token);
        }
        request
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = self.authorize(request).await.send().await?;
        tracing::debug!("Firestore response status: {}", response.status());
        Ok(response)
    }
}

/// 非 2xx 轉為錯誤，盡量取出 Google API 的 error.message
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or(body);

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(PortalError::AuthError { message });
    }
    Err(PortalError::RemoteError {
        status: status.as_u16(),
        message,
    })
}

fn document_id(name: &str) -> String {
    name.rsplit('/').next().unwrap_or(name).to_string()
}

fn into_document(raw: RawDocument) -> Document {
    Document::new(document_id(&raw.name), decode_fields(&raw.fields))
}

/// Firestore field path：非單純識別字需用反引號
fn field_path(key: &str) -> String {
    let simple = key
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if simple {
        key.to_string()
    } else {
        format!("`{}`", key.replace('\\', "\\\\").replace('`', "\\`"))
    }
}

pub fn decode_fields(fields: &Map<String, Value>) -> Fields {
    fields
        .iter()
        .map(|(k, v)| (k.clone(), decode_value(v)))
        .collect()
}

pub fn decode_value(value: &Value) -> Value {
    let Some(map) = value.as_object() else {
        return Value::Null;
    };
    let Some((kind, inner)) = map.iter().next() else {
        return Value::Null;
    };
    match kind.as_str() {
        "nullValue" => Value::Null,
        "booleanValue" => inner.clone(),
        // integerValue 以字串傳輸 (int64)
        "integerValue" => match inner {
            Value::String(s) => s.parse::<i64>().map(Value::from).unwrap_or(Value::Null),
            other => other.clone(),
        },
        "doubleValue" => match inner {
            Value::String(s) => s
                .parse::<f64>()
                .ok()
                .and_then(|f| serde_json::Number::from_f64(f).map(Value::Number))
                .unwrap_or(Value::Null),
            other => other.clone(),
        },
        "timestampValue" | "stringValue" | "bytesValue" | "referenceValue" => inner.clone(),
        "geoPointValue" => inner.clone(),
        "arrayValue" => Value::Array(
            inner["values"]
                .as_array()
                .map(|values| values.iter().map(decode_value).collect())
                .unwrap_or_default(),
        ),
        "mapValue" => Value::Object(
            inner["fields"]
                .as_object()
                .map(decode_fields)
                .unwrap_or_default(),
        ),
        other => {
            tracing::warn!("Unknown Firestore value type '{}'", other);
            Value::Null
        }
    }
}

pub fn encode_fields(fields: &Fields) -> Map<String, Value> {
    fields
        .iter()
        .map(|(k, v)| (k.clone(), encode_value(v)))
        .collect()
}

pub fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => match n.as_i64() {
            Some(i) => json!({ "integerValue": i.to_string() }),
            None => json!({ "doubleValue": n.as_f64().unwrap_or(0.0) }),
        },
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => {
            json!({ "arrayValue": { "values": items.iter().map(encode_value).collect::<Vec<_>>() } })
        }
        Value::Object(map) => json!({ "mapValue": { "fields": encode_fields(map) } }),
    }
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    async fn list(&self, collection: &str) -> Result<Vec<Document>> {
        let url = self.collection_url(collection);
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self.client.get(&url).query(&[("pageSize", PAGE_SIZE)]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }
            let response = check_status(self.send(request).await?).await?;
            let page: ListResponse = response.json().await?;

            tracing::debug!(
                "Fetched {} document(s) from '{}'",
                page.documents.len(),
                collection
            );
            documents.extend(page.documents.into_iter().map(into_document));

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) if page_token.as_deref() == Some(token.as_str()) => {
                    return Err(PortalError::processing(format!(
                        "Firestore repeated page token while listing '{}'",
                        collection
                    )));
                }
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(documents)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let request = self.client.get(self.document_url(collection, id));
        let response = self.send(request).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let raw: RawDocument = check_status(response).await?.json().await?;
        Ok(Some(into_document(raw)))
    }

    async fn add(&self, collection: &str, data: Fields) -> Result<String> {
        let request = self
            .client
            .post(self.collection_url(collection))
            .json(&json!({ "fields": encode_fields(&data) }));
        let raw: RawDocument = check_status(self.send(request).await?).await?.json().await?;
        let id = document_id(&raw.name);
        tracing::debug!("Created {}/{}", collection, id);
        Ok(id)
    }

    async fn set(&self, collection: &str, id: &str, data: Fields) -> Result<()> {
        let request = self
            .client
            .patch(self.document_url(collection, id))
            .json(&json!({ "fields": encode_fields(&data) }));
        check_status(self.send(request).await?).await?;
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, data: Fields) -> Result<()> {
        let mut params: Vec<(&str, String)> = data
            .keys()
            .map(|k| ("updateMask.fieldPaths", field_path(k)))
            .collect();
        params.push(("currentDocument.exists", "true".to_string()));

        let request = self
            .client
            .patch(self.document_url(collection, id))
            .query(&params)
            .json(&json!({ "fields": encode_fields(&data) }));
        let response = self.send(request).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(PortalError::not_found(collection, id));
        }
        check_status(response).await?;
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        let request = self.client.delete(self.document_url(collection, id));
        check_status(self.send(request).await?).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_typed_values() {
        let raw = json!({
            "vesselName": { "stringValue": "MV Kumul" },
            "cargoQuantity": { "integerValue": "320" },
            "demurragesCollected": { "doubleValue": 1500.5 },
            "clearanceIssuedOn": { "timestampValue": "2024-03-05T00:00:00Z" },
            "berth": { "nullValue": null },
            "cargo": { "arrayValue": { "values": [
                { "mapValue": { "fields": { "type": { "stringValue": "Logs" }, "quantity": { "integerValue": "80" } } } }
            ] } },
            "charges": { "arrayValue": {} }
        });
        let fields = decode_fields(raw.as_object().unwrap());

        assert_eq!(fields["vesselName"], json!("MV Kumul"));
        assert_eq!(fields["cargoQuantity"], json!(320));
        assert_eq!(fields["demurragesCollected"], json!(1500.5));
        assert_eq!(fields["clearanceIssuedOn"], json!("2024-03-05T00:00:00Z"));
        assert_eq!(fields["berth"], Value::Null);
        assert_eq!(fields["cargo"], json!([{ "type": "Logs", "quantity": 80 }]));
        assert_eq!(fields["charges"], json!([]));
    }

    #[test]
    fn test_encode_then_decode_preserves_nested_shape() {
        let original = json!({
            "portName": "Lae",
            "vesselsHandled": 12,
            "revenue": 99.5,
            "approved": true,
            "cargoBreakdown": { "Containers": 300 },
            "tags": ["north", null]
        });
        let fields = original.as_object().unwrap().clone();
        let encoded = encode_fields(&fields);
        assert_eq!(encoded["vesselsHandled"], json!({ "integerValue": "12" }));
        assert_eq!(Value::Object(decode_fields(&encoded)), original);
    }

    #[test]
    fn test_field_path_quoting() {
        assert_eq!(field_path("clearanceIssuedOn"), "clearanceIssuedOn");
        assert_eq!(field_path("cargo-type"), "`cargo-type`");
        assert_eq!(field_path("2024"), "`2024`");
    }

    #[test]
    fn test_document_id_from_resource_name() {
        assert_eq!(
            document_id("projects/p/databases/(default)/documents/vessels/abc123"),
            "abc123"
        );
    }
}
