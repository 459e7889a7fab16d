use crate::adapters::firestore::{FirestoreStore, DEFAULT_BASE_URL};
use crate::utils::error::{PortalError, Result};
use crate::utils::validation::{validate_non_empty_string, validate_url, Validate};
use std::collections::HashMap;

/// getVessels 函式的環境變數設定
#[derive(Debug, Clone)]
pub struct LambdaConfig {
    pub project_id: String,
    pub firebase_api_key: Option<String>,
    pub firestore_url: String,
    pub access_token: Option<String>,
    pub vessels_api_key: String,
}

impl LambdaConfig {
    pub fn from_env() -> Result<Self> {
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::from_vars(&vars)
    }

    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self> {
        let get = |name: &str| vars.get(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        Ok(Self {
            project_id: get("FIREBASE_PROJECT_ID").ok_or_else(|| PortalError::ConfigError {
                message: "FIREBASE_PROJECT_ID environment variable is required".to_string(),
            })?,
            firebase_api_key: get("FIREBASE_API_KEY"),
            firestore_url: get("FIRESTORE_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            access_token: get("FIRESTORE_ACCESS_TOKEN"),
            // 未設定時所有請求都會得到 401
            vessels_api_key: get("VESSELS_API_KEY").unwrap_or_default(),
        })
    }

    pub fn document_store(&self) -> FirestoreStore {
        FirestoreStore::new(&self.firestore_url, &self.project_id)
            .with_api_key(self.firebase_api_key.clone())
            .with_id_token(self.access_token.clone())
    }
}

impl Validate for LambdaConfig {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("FIREBASE_PROJECT_ID", &self.project_id)?;
        validate_url("FIRESTORE_BASE_URL", &self.firestore_url)?;
        if self.vessels_api_key.is_empty() {
            tracing::warn!("VESSELS_API_KEY is not set; every getVessels request will be rejected");
        }
        Ok(())
    }
}
