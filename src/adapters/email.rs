use crate::domain::model::Fields;
use crate::domain::ports::Mailer;
use crate::utils::error::{PortalError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

pub const DEFAULT_EMAIL_ENDPOINT: &str = "https://api.emailjs.com/api/v1.0/email/send";

/// Transactional email over an EmailJS-compatible HTTP API.
#[derive(Debug, Clone)]
pub struct HttpMailer {
    client: Client,
    endpoint: String,
    service_id: String,
    public_key: String,
    private_key: Option<String>,
}

impl HttpMailer {
    pub fn new(
        endpoint: impl Into<String>,
        service_id: impl Into<String>,
        public_key: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            service_id: service_id.into(),
            public_key: public_key.into(),
            private_key: None,
        }
    }

    /// 伺服器端呼叫需要 private key (accessToken)
    pub fn with_private_key(mut self, private_key: Option<String>) -> Self {
        self.private_key = private_key.filter(|k| !k.trim().is_empty());
        self
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, template_id: &str, params: Fields) -> Result<()> {
        let mut body = json!({
            "service_id": self.service_id,
            "template_id": template_id,
            "user_id": self.public_key,
            "template_params": params,
        });
        if let Some(key) = &self.private_key {
            body["accessToken"] = json!(key);
        }

        tracing::debug!("Sending email with template '{}'", template_id);
        let response = self.client.post(&self.endpoint).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(PortalError::RemoteError {
                status: status.as_u16(),
                message: format!("Email delivery failed: {}", message),
            });
        }
        Ok(())
    }
}
