use crate::domain::model::{collections, Document, Fields, Role, UserProfile};
use crate::domain::ports::{DocumentStore, Mailer};
use crate::utils::error::{PortalError, Result};
use crate::utils::validation::{require_text, validate_email};
use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::{json, Value};
use url::Url;

pub const STATUS_INVITED: &str = "invited";
pub const STATUS_ACTIVE: &str = "active";
const TOKEN_LEN: usize = 32;

#[derive(Debug, Clone)]
pub struct InvitationSettings {
    /// 前端網址，邀請連結指向 `<app_url>/accept-invitation`
    pub app_url: String,
    pub port_template_id: String,
    pub hod_template_id: String,
}

#[derive(Debug, Clone)]
pub struct PortInvite {
    pub name: String,
    pub email: String,
    pub location: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HodInvite {
    pub name: String,
    pub email: String,
    pub department: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Invitation {
    pub id: String,
    pub role: Role,
    pub email: String,
    pub token: String,
    pub link: String,
}

pub struct InvitationService<D: DocumentStore, M: Mailer> {
    store: D,
    mailer: M,
    settings: InvitationSettings,
}

fn collection_for(role: Role) -> Result<&'static str> {
    match role {
        Role::Port => Ok(collections::PORTS),
        Role::Hod => Ok(collections::HODS),
        Role::Admin => Err(PortalError::validation(
            "Administrators cannot be onboarded by invitation",
        )),
    }
}

fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect()
}

impl<D: DocumentStore, M: Mailer> InvitationService<D, M> {
    pub fn new(store: D, mailer: M, settings: InvitationSettings) -> Self {
        Self {
            store,
            mailer,
            settings,
        }
    }

    pub fn invitation_link(&self, token: &str, role: Role) -> Result<String> {
        let mut url = Url::parse(&self.settings.app_url).map_err(|e| {
            PortalError::InvalidConfigValueError {
                field: "app.url".to_string(),
                value: self.settings.app_url.clone(),
                reason: e.to_string(),
            }
        })?;
        url.path_segments_mut()
            .map_err(|_| PortalError::ConfigError {
                message: "app.url cannot be a base URL".to_string(),
            })?
            .pop_if_empty()
            .push("accept-invitation");
        url.query_pairs_mut()
            .append_pair("token", token)
            .append_pair("role", role.as_str());
        Ok(url.to_string())
    }

    async fn ensure_unique_email(&self, collection: &str, email: &str) -> Result<()> {
        let taken = self.store.list(collection).await?.iter().any(|doc| {
            doc.text(&["email"])
                .is_some_and(|existing| existing.eq_ignore_ascii_case(email))
        });
        if taken {
            return Err(PortalError::validation(format!(
                "An invitation for {} already exists",
                email
            )));
        }
        Ok(())
    }

    pub async fn invite_port(&self, invite: PortInvite) -> Result<Invitation> {
        require_text("Port name", &invite.name)?;
        validate_email(&invite.email)?;

        let mut data = Fields::new();
        data.insert("portName".to_string(), json!(invite.name.trim()));
        if let Some(location) = invite.location.as_deref().filter(|l| !l.trim().is_empty()) {
            data.insert("location".to_string(), json!(location.trim()));
        }
        self.create_and_send(Role::Port, invite.name.trim(), &invite.email, data)
            .await
    }

    pub async fn invite_hod(&self, invite: HodInvite) -> Result<Invitation> {
        require_text("Name", &invite.name)?;
        require_text("Department", &invite.department)?;
        validate_email(&invite.email)?;

        let mut data = Fields::new();
        data.insert("name".to_string(), json!(invite.name.trim()));
        data.insert("department".to_string(), json!(invite.department.trim()));
        self.create_and_send(Role::Hod, invite.name.trim(), &invite.email, data)
            .await
    }

    async fn create_and_send(
        &self,
        role: Role,
        display_name: &str,
        email: &str,
        mut data: Fields,
    ) -> Result<Invitation> {
        let collection = collection_for(role)?;
        let email = email.trim().to_ascii_lowercase();
        self.ensure_unique_email(collection, &email).await?;

        let token = generate_token();
        let link = self.invitation_link(&token, role)?;
        data.insert("email".to_string(), json!(email));
        data.insert("status".to_string(), json!(STATUS_INVITED));
        data.insert("inviteToken".to_string(), json!(token));
        data.insert("invitedAt".to_string(), json!(Utc::now().to_rfc3339()));

        let id = self.store.add(collection, data).await?;
        tracing::info!("✉️ Created {} invitation {} for {}", role.as_str(), id, email);

        let template_id = match role {
            Role::Port => &self.settings.port_template_id,
            _ => &self.settings.hod_template_id,
        };
        let mut params = Fields::new();
        params.insert("to_email".to_string(), json!(email));
        params.insert("to_name".to_string(), json!(display_name));
        params.insert("role".to_string(), json!(role.as_str()));
        params.insert("invite_link".to_string(), json!(link));

        if let Err(e) = self.mailer.send(template_id, params).await {
            // 寄信失敗就撤回，避免留下收不到連結的邀請
            tracing::error!("Invitation email to {} failed: {}", email, e);
            if let Err(cleanup) = self.store.delete(collection, &id).await {
                tracing::warn!("Could not withdraw invitation {}: {}", id, cleanup);
            }
            return Err(e);
        }

        Ok(Invitation {
            id,
            role,
            email,
            token,
            link,
        })
    }

    /// 依 token 找出待接受的邀請
    pub async fn find_invitation(&self, token: &str) -> Result<(Role, Document)> {
        require_text("Invitation token", token)?;
        for role in [Role::Port, Role::Hod] {
            let collection = collection_for(role)?;
            let found = self.store.list(collection).await?.into_iter().find(|doc| {
                doc.data.get("inviteToken").and_then(Value::as_str) == Some(token)
            });
            if let Some(doc) = found {
                return Ok((role, doc));
            }
        }
        Err(PortalError::not_found("invitations", token))
    }

    /// 啟用帳號：邀請文件改為 active 並建立 users/<uid>
    pub async fn accept_invitation(&self, token: &str, uid: &str) -> Result<UserProfile> {
        require_text("User id", uid)?;
        let (role, doc) = self.find_invitation(token).await?;
        if doc.text(&["status"]).as_deref() != Some(STATUS_INVITED) {
            return Err(PortalError::validation("This invitation has already been used"));
        }
        let collection = collection_for(role)?;
        let now = Utc::now().to_rfc3339();

        let mut patch = Fields::new();
        patch.insert("status".to_string(), json!(STATUS_ACTIVE));
        patch.insert("uid".to_string(), json!(uid));
        patch.insert("inviteToken".to_string(), Value::Null);
        patch.insert("acceptedAt".to_string(), json!(now));
        self.store.update(collection, &doc.id, patch).await?;

        let profile = UserProfile {
            uid: uid.to_string(),
            email: doc.text(&["email"]).unwrap_or_default(),
            role,
            port_id: (role == Role::Port).then(|| doc.id.clone()),
            display_name: doc.text(&["portName", "name"]),
        };
        let mut data = match serde_json::to_value(&profile)? {
            Value::Object(map) => map,
            _ => Fields::new(),
        };
        data.insert("createdAt".to_string(), json!(now));
        self.store.set(collections::USERS, uid, data).await?;

        tracing::info!("✅ {} accepted {} invitation {}", profile.email, role.as_str(), doc.id);
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryStore;
    use async_trait::async_trait;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[derive(Clone, Default)]
    struct RecordingMailer {
        sent: Arc<Mutex<Vec<(String, Fields)>>>,
        fail: bool,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, template_id: &str, params: Fields) -> Result<()> {
            if self.fail {
                return Err(PortalError::RemoteError {
                    status: 502,
                    message: "mail relay down".to_string(),
                });
            }
            self.sent.lock().await.push((template_id.to_string(), params));
            Ok(())
        }
    }

    fn settings() -> InvitationSettings {
        InvitationSettings {
            app_url: "https://portal.example.pg/".to_string(),
            port_template_id: "tpl_port".to_string(),
            hod_template_id: "tpl_hod".to_string(),
        }
    }

    #[tokio::test]
    async fn test_invite_port_stores_document_and_sends_email() {
        let store = MemoryStore::new();
        let mailer = RecordingMailer::default();
        let service = InvitationService::new(store.clone(), mailer.clone(), settings());

        let invitation = service
            .invite_port(PortInvite {
                name: "Lae".to_string(),
                email: "Harbour@Lae.pg".to_string(),
                location: Some("Morobe".to_string()),
            })
            .await
            .unwrap();

        assert_eq!(invitation.email, "harbour@lae.pg");
        assert_eq!(invitation.token.len(), TOKEN_LEN);
        assert!(invitation
            .link
            .starts_with("https://portal.example.pg/accept-invitation?token="));
        assert!(invitation.link.ends_with("&role=port"));

        let doc = store.get(collections::PORTS, &invitation.id).await.unwrap().unwrap();
        assert_eq!(doc.data["status"], json!(STATUS_INVITED));
        assert_eq!(doc.data["location"], json!("Morobe"));

        let sent = mailer.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "tpl_port");
        assert_eq!(sent[0].1["invite_link"], json!(invitation.link));
    }

    #[tokio::test]
    async fn test_duplicate_email_is_rejected() {
        let store = MemoryStore::new();
        store
            .insert(collections::HODS, "h1", json!({ "name": "Kila", "email": "kila@pa.pg" }))
            .await;
        let service = InvitationService::new(store, RecordingMailer::default(), settings());

        let err = service
            .invite_hod(HodInvite {
                name: "Kila Again".to_string(),
                email: "KILA@pa.pg".to_string(),
                department: "Marine".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, PortalError::ValidationError { .. }));
    }

    #[tokio::test]
    async fn test_failed_email_withdraws_invitation() {
        let store = MemoryStore::new();
        let mailer = RecordingMailer {
            fail: true,
            ..Default::default()
        };
        let service = InvitationService::new(store.clone(), mailer, settings());

        let result = service
            .invite_port(PortInvite {
                name: "Wewak".to_string(),
                email: "ops@wewak.pg".to_string(),
                location: None,
            })
            .await;
        assert!(result.is_err());
        assert_eq!(store.count(collections::PORTS).await, 0);
    }

    #[tokio::test]
    async fn test_accept_invitation_creates_profile_once() {
        let store = MemoryStore::new();
        let service = InvitationService::new(store.clone(), RecordingMailer::default(), settings());
        let invitation = service
            .invite_hod(HodInvite {
                name: "Mary Kila".to_string(),
                email: "mary@pa.pg".to_string(),
                department: "Finance".to_string(),
            })
            .await
            .unwrap();

        let profile = service.accept_invitation(&invitation.token, "uid-9").await.unwrap();
        assert_eq!(profile.role, Role::Hod);
        assert_eq!(profile.port_id, None);
        assert_eq!(profile.display_name.as_deref(), Some("Mary Kila"));

        let user = store.get(collections::USERS, "uid-9").await.unwrap().unwrap();
        assert_eq!(user.data["role"], json!("hod"));

        // token 已清除，再次使用找不到
        let again = service.accept_invitation(&invitation.token, "uid-9").await;
        assert!(matches!(again, Err(PortalError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_invalid_email_never_reaches_store() {
        let store = MemoryStore::new();
        let service = InvitationService::new(store.clone(), RecordingMailer::default(), settings());
        let err = service
            .invite_port(PortInvite {
                name: "Kimbe".to_string(),
                email: "kimbe-at-port".to_string(),
                location: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.severity(), crate::utils::error::ErrorSeverity::Low);
        assert_eq!(store.count(collections::PORTS).await, 0);
    }
}
