use crate::utils::error::{PortalError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const DEFAULT_IDENTITY_URL: &str = "https://identitytoolkit.googleapis.com/v1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub id_token: String,
    #[serde(default)]
    pub refresh_token: String,
    pub local_id: String,
    #[serde(default)]
    pub email: String,
}

/// Email/password accounts on the hosted identity service.
#[derive(Debug, Clone)]
pub struct IdentityClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl IdentityClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession> {
        tracing::debug!("Signing in {}", email);
        self.call("accounts:signInWithPassword", email, password).await
    }

    /// 接受邀請時建立帳號
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<AuthSession> {
        tracing::debug!("Creating account for {}", email);
        self.call("accounts:signUp", email, password).await
    }

    async fn call(&self, method: &str, email: &str, password: &str) -> Result<AuthSession> {
        let response = self
            .client
            .post(format!("{}/{}", self.base_url, method))
            .query(&[("key", self.api_key.as_str())])
            .json(&json!({
                "email": email,
                "password": password,
                "returnSecureToken": true,
            }))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let body: Value = response.json().await.unwrap_or(Value::Null);
        let code = body["error"]["message"]
            .as_str()
            .unwrap_or("UNKNOWN_ERROR")
            .to_string();
        if status.is_server_error() {
            return Err(PortalError::RemoteError {
                status: status.as_u16(),
                message: code,
            });
        }
        Err(PortalError::AuthError {
            message: describe_auth_error(&code),
        })
    }
}

fn describe_auth_error(code: &str) -> String {
    // 錯誤碼可能帶說明，例如 "WEAK_PASSWORD : Password should be at least 6 characters"
    let key = code.split(':').next().unwrap_or(code).trim();
    match key {
        "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" => {
            "Invalid email or password".to_string()
        }
        "USER_DISABLED" => "This account has been disabled".to_string(),
        "EMAIL_EXISTS" => "An account already exists for this email".to_string(),
        "WEAK_PASSWORD" => "Password should be at least 6 characters".to_string(),
        "TOO_MANY_ATTEMPTS_TRY_LATER" => "Too many attempts, try again later".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[tokio::test]
    async fn test_sign_in_returns_session() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/v1/accounts:signInWithPassword")
                .query_param("key", "web-key")
                .json_body_partial(r#"{"email":"admin@portauthority.pg","returnSecureToken":true}"#);
            then.status(200).json_body(serde_json::json!({
                "idToken": "token-abc",
                "refreshToken": "refresh-xyz",
                "localId": "uid-42",
                "email": "admin@portauthority.pg",
                "expiresIn": "3600"
            }));
        });

        let client = IdentityClient::new(server.url("/v1"), "web-key");
        let session = client.sign_in("admin@portauthority.pg", "hunter22").await.unwrap();

        mock.assert();
        assert_eq!(session.local_id, "uid-42");
        assert_eq!(session.id_token, "token-abc");
    }

    #[tokio::test]
    async fn test_bad_credentials_map_to_auth_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/v1/accounts:signInWithPassword");
            then.status(400)
                .json_body(serde_json::json!({ "error": { "code": 400, "message": "INVALID_LOGIN_CREDENTIALS" } }));
        });

        let client = IdentityClient::new(server.url("/v1"), "web-key");
        let err = client.sign_in("x@y.pg", "wrong").await.unwrap_err();
        assert!(matches!(err, PortalError::AuthError { ref message } if message == "Invalid email or password"));
        assert!(!err.is_network());
    }

    #[test]
    fn test_describe_auth_error_strips_detail() {
        assert_eq!(
            describe_auth_error("WEAK_PASSWORD : Password should be at least 6 characters"),
            "Password should be at least 6 characters"
        );
    }
}
