//! HTTP-style request/response envelopes for the outbound functions.
//!
//! The shapes follow the API Gateway proxy event so the same handler runs behind
//! Lambda and in plain unit tests.

pub mod vessels;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

pub const CORS_ALLOW_ORIGIN: &str = "*";
pub const CORS_ALLOW_METHODS: &str = "GET, OPTIONS";
pub const CORS_ALLOW_HEADERS: &str = "Content-Type, x-api-key";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiRequest {
    #[serde(default, alias = "method")]
    pub http_method: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub headers: HashMap<String, String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub query_string_parameters: HashMap<String, String>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl ApiRequest {
    pub fn new(method: &str) -> Self {
        Self {
            http_method: method.to_string(),
            ..Self::default()
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_query(mut self, name: &str, value: &str) -> Self {
        self.query_string_parameters
            .insert(name.to_string(), value.to_string());
        self
    }

    /// header 名稱不分大小寫
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn query(&self, name: &str) -> Option<&str> {
        self.query_string_parameters
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse {
    pub status_code: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status_code: u16, body: Option<&Value>) -> Self {
        let mut headers = HashMap::from([
            (
                "Access-Control-Allow-Origin".to_string(),
                CORS_ALLOW_ORIGIN.to_string(),
            ),
            (
                "Access-Control-Allow-Methods".to_string(),
                CORS_ALLOW_METHODS.to_string(),
            ),
            (
                "Access-Control-Allow-Headers".to_string(),
                CORS_ALLOW_HEADERS.to_string(),
            ),
        ]);
        if body.is_some() {
            headers.insert("Content-Type".to_string(), "application/json".to_string());
        }
        Self {
            status_code,
            headers,
            body: body.map(Value::to_string).unwrap_or_default(),
        }
    }

    pub fn json(status_code: u16, body: Value) -> Self {
        Self::new(status_code, Some(&body))
    }

    pub fn empty(status_code: u16) -> Self {
        Self::new(status_code, None)
    }

    pub fn body_json(&self) -> Option<Value> {
        serde_json::from_str(&self.body).ok()
    }
}
