#[cfg(feature = "cli")]
pub mod cli;
pub mod lambda;

use crate::adapters::email::{HttpMailer, DEFAULT_EMAIL_ENDPOINT};
use crate::adapters::firestore::{FirestoreStore, DEFAULT_BASE_URL};
use crate::adapters::identity::{IdentityClient, DEFAULT_IDENTITY_URL};
use crate::adapters::json_store::JsonFileStore;
use crate::adapters::storage::LocalStorage;
use crate::adapters::{AnyStorage, AnyStore};
use crate::core::report_pipeline::OutputSettings;
use crate::report::ReportFormat;
use crate::services::files::{UploadPolicy, DEFAULT_ALLOWED_EXTENSIONS};
use crate::services::invitations::InvitationSettings;
use crate::services::session::{RetryPolicy, RoleCache};
use crate::utils::error::{PortalError, Result};
use crate::utils::validation::{
    validate_non_empty_string, validate_path, validate_positive_number, validate_range,
    validate_required_field, validate_url, Validate,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortalConfig {
    #[serde(default)]
    pub firebase: FirebaseConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub email: Option<EmailConfig>,
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirebaseConfig {
    #[serde(default)]
    pub project_id: String,
    pub api_key: Option<String>,
    #[serde(default = "default_firestore_url")]
    pub firestore_url: String,
    #[serde(default = "default_identity_url")]
    pub identity_url: String,
    /// 預先取得的 ID token (服務帳號或測試用)
    pub access_token: Option<String>,
}

impl Default for FirebaseConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            api_key: None,
            firestore_url: default_firestore_url(),
            identity_url: default_identity_url(),
            access_token: None,
        }
    }
}

fn default_firestore_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_identity_url() -> String {
    DEFAULT_IDENTITY_URL.to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Firestore,
    Json,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default)]
    pub kind: SourceKind,
    /// kind = "json" 時的匯出資料夾
    pub json_dir: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    Local,
    S3,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub kind: StorageKind,
    #[serde(default = "default_local_path")]
    pub local_path: String,
    pub s3_bucket: Option<String>,
    #[serde(default)]
    pub s3_prefix: String,
    #[serde(default = "default_region")]
    pub s3_region: String,
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: usize,
    pub allowed_extensions: Option<Vec<String>>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            kind: StorageKind::Local,
            local_path: default_local_path(),
            s3_bucket: None,
            s3_prefix: String::new(),
            s3_region: default_region(),
            max_upload_mb: default_max_upload_mb(),
            allowed_extensions: None,
        }
    }
}

fn default_local_path() -> String {
    "./output".to_string()
}

fn default_region() -> String {
    "ap-southeast-2".to_string()
}

fn default_max_upload_mb() -> usize {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    #[serde(default = "default_email_endpoint")]
    pub endpoint: String,
    pub service_id: String,
    pub public_key: String,
    pub private_key: Option<String>,
    pub port_template_id: String,
    pub hod_template_id: String,
}

fn default_email_endpoint() -> String {
    DEFAULT_EMAIL_ENDPOINT.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_app_url")]
    pub url: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            url: default_app_url(),
        }
    }
}

fn default_app_url() -> String {
    "http://localhost:5173".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiConfig {
    pub vessels_api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: usize,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_role_cache")]
    pub role_cache_path: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            retry_attempts: default_retry_attempts(),
            retry_base_delay_ms: default_retry_delay_ms(),
            role_cache_path: default_role_cache(),
        }
    }
}

fn default_retry_attempts() -> usize {
    3
}

fn default_retry_delay_ms() -> u64 {
    500
}

fn default_role_cache() -> String {
    ".portal/role-cache.json".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default = "default_formats")]
    pub formats: Vec<String>,
    #[serde(default = "default_report_prefix")]
    pub output_prefix: String,
    #[serde(default)]
    pub monitoring: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            formats: default_formats(),
            output_prefix: default_report_prefix(),
            monitoring: false,
        }
    }
}

fn default_formats() -> Vec<String> {
    vec!["xlsx".to_string()]
}

fn default_report_prefix() -> String {
    "reports".to_string()
}

fn env_var_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}")
            .unwrap_or_else(|e| panic!("env var pattern must compile: {}", e))
    })
}

impl PortalConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(PortalError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = Self::substitute_env_vars(content);
        Ok(toml::from_str(&processed)?)
    }

    /// 替換環境變數 (例如 ${FIREBASE_API_KEY})，未設定的保留原樣
    fn substitute_env_vars(content: &str) -> String {
        env_var_pattern()
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .into_owned()
    }

    pub fn document_store(&self) -> Result<AnyStore> {
        match self.source.kind {
            SourceKind::Firestore => {
                let store = FirestoreStore::new(&self.firebase.firestore_url, &self.firebase.project_id)
                    .with_api_key(self.firebase.api_key.clone())
                    .with_id_token(self.firebase.access_token.clone());
                Ok(AnyStore::Firestore(store))
            }
            SourceKind::Json => {
                let dir = validate_required_field("source.json_dir", &self.source.json_dir)?;
                Ok(AnyStore::JsonFiles(JsonFileStore::new(dir)))
            }
        }
    }

    pub async fn blob_storage(&self) -> Result<AnyStorage> {
        match self.storage.kind {
            StorageKind::Local => Ok(AnyStorage::Local(LocalStorage::new(&self.storage.local_path))),
            #[cfg(feature = "s3")]
            StorageKind::S3 => {
                let bucket = validate_required_field("storage.s3_bucket", &self.storage.s3_bucket)?;
                Ok(AnyStorage::S3(
                    crate::adapters::s3::S3Storage::from_region(
                        bucket.clone(),
                        self.storage.s3_prefix.clone(),
                        self.storage.s3_region.clone(),
                    )
                    .await,
                ))
            }
            #[cfg(not(feature = "s3"))]
            StorageKind::S3 => Err(PortalError::ConfigError {
                message: "storage.kind = \"s3\" requires building with the `s3` feature".to_string(),
            }),
        }
    }

    pub fn identity_client(&self) -> Result<IdentityClient> {
        let api_key = validate_required_field("firebase.api_key", &self.firebase.api_key)?;
        Ok(IdentityClient::new(&self.firebase.identity_url, api_key.as_str()))
    }

    pub fn mailer(&self) -> Result<HttpMailer> {
        let email = validate_required_field("email", &self.email)?;
        Ok(HttpMailer::new(&email.endpoint, &email.service_id, &email.public_key)
            .with_private_key(email.private_key.clone()))
    }

    pub fn invitation_settings(&self) -> Result<InvitationSettings> {
        let email = validate_required_field("email", &self.email)?;
        Ok(InvitationSettings {
            app_url: self.app.url.clone(),
            port_template_id: email.port_template_id.clone(),
            hod_template_id: email.hod_template_id.clone(),
        })
    }

    pub fn output_settings(&self) -> Result<OutputSettings> {
        let formats = self
            .report
            .formats
            .iter()
            .map(|f| f.parse::<ReportFormat>())
            .collect::<Result<Vec<_>>>()?;
        Ok(OutputSettings {
            formats,
            prefix: self.report.output_prefix.clone(),
        })
    }

    pub fn upload_policy(&self) -> UploadPolicy {
        UploadPolicy {
            allowed_extensions: self.storage.allowed_extensions.clone().unwrap_or_else(|| {
                DEFAULT_ALLOWED_EXTENSIONS.iter().map(|e| e.to_string()).collect()
            }),
            max_bytes: self.storage.max_upload_mb as u64 * 1024 * 1024,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.session.retry_attempts as u32,
            base_delay: Duration::from_millis(self.session.retry_base_delay_ms),
        }
    }

    pub fn role_cache(&self) -> RoleCache {
        RoleCache::new(&self.session.role_cache_path)
    }
}

impl Validate for PortalConfig {
    fn validate(&self) -> Result<()> {
        match self.source.kind {
            SourceKind::Firestore => {
                validate_non_empty_string("firebase.project_id", &self.firebase.project_id)?;
                validate_url("firebase.firestore_url", &self.firebase.firestore_url)?;
            }
            SourceKind::Json => {
                let dir = validate_required_field("source.json_dir", &self.source.json_dir)?;
                validate_path("source.json_dir", dir)?;
            }
        }
        validate_url("firebase.identity_url", &self.firebase.identity_url)?;

        match self.storage.kind {
            StorageKind::Local => validate_path("storage.local_path", &self.storage.local_path)?,
            StorageKind::S3 => {
                let bucket = validate_required_field("storage.s3_bucket", &self.storage.s3_bucket)?;
                validate_non_empty_string("storage.s3_bucket", bucket)?;
            }
        }
        validate_positive_number("storage.max_upload_mb", self.storage.max_upload_mb, 1)?;

        if let Some(email) = &self.email {
            validate_url("email.endpoint", &email.endpoint)?;
            validate_non_empty_string("email.service_id", &email.service_id)?;
            validate_non_empty_string("email.public_key", &email.public_key)?;
            validate_non_empty_string("email.port_template_id", &email.port_template_id)?;
            validate_non_empty_string("email.hod_template_id", &email.hod_template_id)?;
        }
        validate_url("app.url", &self.app.url)?;

        validate_range("session.retry_attempts", self.session.retry_attempts, 1, 10)?;
        validate_range("session.retry_base_delay_ms", self.session.retry_base_delay_ms, 1, 60_000)?;

        if self.report.formats.is_empty() {
            return Err(PortalError::InvalidConfigValueError {
                field: "report.formats".to_string(),
                value: "[]".to_string(),
                reason: "At least one output format is required".to_string(),
            });
        }
        self.output_settings()?;
        Ok(())
    }
}
