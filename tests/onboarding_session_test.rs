use httpmock::prelude::*;
use port_portal::adapters::email::HttpMailer;
use port_portal::adapters::firestore::FirestoreStore;
use port_portal::adapters::identity::IdentityClient;
use port_portal::adapters::memory::MemoryStore;
use port_portal::domain::model::{collections, Role, UserProfile};
use port_portal::services::invitations::{HodInvite, InvitationService, InvitationSettings, PortInvite};
use port_portal::services::session::{RetryPolicy, RoleCache, SessionService};
use port_portal::{DocumentStore, PortalError};
use serde_json::json;
use std::time::Duration;
use tempfile::TempDir;

fn settings() -> InvitationSettings {
    InvitationSettings {
        app_url: "https://portal.example.pg".to_string(),
        port_template_id: "tpl_port".to_string(),
        hod_template_id: "tpl_hod".to_string(),
    }
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        attempts: 3,
        base_delay: Duration::from_millis(1),
    }
}

#[tokio::test]
async fn test_port_invitation_round_trip() {
    let server = MockServer::start();
    let email_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/api/v1.0/email/send")
            .body_contains("tpl_port")
            .body_contains("harbour@lae.example.pg")
            .body_contains("accept-invitation?token=");
        then.status(200).body("OK");
    });

    let store = MemoryStore::new();
    let mailer = HttpMailer::new(server.url("/api/v1.0/email/send"), "service_x", "pk");
    let service = InvitationService::new(store.clone(), mailer, settings());

    let invitation = service
        .invite_port(PortInvite {
            name: "Lae".to_string(),
            email: "Harbour@Lae.example.pg".to_string(),
            location: Some("Morobe".to_string()),
        })
        .await
        .unwrap();
    email_mock.assert();
    assert_eq!(invitation.email, "harbour@lae.example.pg");
    assert!(invitation
        .link
        .starts_with("https://portal.example.pg/accept-invitation?token="));
    assert!(invitation.link.ends_with("&role=port"));

    // 同一信箱不可重複邀請
    let again = service
        .invite_port(PortInvite {
            name: "Lae".to_string(),
            email: "harbour@lae.example.pg".to_string(),
            location: None,
        })
        .await;
    assert!(matches!(again, Err(PortalError::ValidationError { .. })));

    let profile = service
        .accept_invitation(&invitation.token, "uid-lae")
        .await
        .unwrap();
    assert_eq!(profile.role, Role::Port);
    assert_eq!(profile.port_id.as_deref(), Some(invitation.id.as_str()));

    let user = store.get(collections::USERS, "uid-lae").await.unwrap().unwrap();
    assert_eq!(UserProfile::from_document(&user), Some(profile));
    let port = store.get(collections::PORTS, &invitation.id).await.unwrap().unwrap();
    assert_eq!(port.data["status"], json!("active"));

    // token 只能用一次
    assert!(service.accept_invitation(&invitation.token, "uid-2").await.is_err());
}

#[tokio::test]
async fn test_failed_email_withdraws_invitation() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/send");
        then.status(400).body("The template ID is invalid");
    });

    let store = MemoryStore::new();
    let service = InvitationService::new(
        store.clone(),
        HttpMailer::new(server.url("/send"), "svc", "pk"),
        settings(),
    );
    let result = service
        .invite_hod(HodInvite {
            name: "Dr. Kila".to_string(),
            email: "kila@health.example.pg".to_string(),
            department: "Health".to_string(),
        })
        .await;

    assert!(matches!(result, Err(PortalError::RemoteError { status: 400, .. })));
    assert_eq!(store.count(collections::HODS).await, 0);
}

fn sign_in_mock(server: &MockServer) -> httpmock::Mock<'_> {
    server.mock(|when, then| {
        when.method(POST)
            .path("/identity/accounts:signInWithPassword")
            .query_param("key", "web-key");
        then.status(200).json_body(json!({
            "idToken": "id-token",
            "refreshToken": "refresh",
            "localId": "uid-lae",
            "email": "harbour@lae.example.pg"
        }));
    })
}

#[tokio::test]
async fn test_login_refreshes_role_cache() {
    let server = MockServer::start();
    sign_in_mock(&server);
    server.mock(|when, then| {
        when.method(GET)
            .path("/projects/p/databases/(default)/documents/users/uid-lae");
        then.status(200).json_body(json!({
            "name": "projects/p/databases/(default)/documents/users/uid-lae",
            "fields": {
                "email": { "stringValue": "harbour@lae.example.pg" },
                "role": { "stringValue": "port" },
                "portId": { "stringValue": "lae" }
            }
        }));
    });

    let dir = TempDir::new().unwrap();
    let cache = RoleCache::new(dir.path().join("roles.json"));
    let service = SessionService::new(
        IdentityClient::new(server.url("/identity"), "web-key"),
        FirestoreStore::new(server.base_url(), "p"),
    )
    .with_cache(cache.clone())
    .with_retry(fast_retry());

    let signed_in = service.login("harbour@lae.example.pg", "pw").await.unwrap();
    assert!(!signed_in.from_cache);
    assert_eq!(signed_in.profile.role, Role::Port);
    assert_eq!(signed_in.profile.port_id.as_deref(), Some("lae"));

    let cached = cache.get("uid-lae").await.unwrap().unwrap();
    assert_eq!(cached, signed_in.profile);
}

#[tokio::test]
async fn test_profile_lookup_retries_then_uses_cache() {
    let server = MockServer::start();
    sign_in_mock(&server);
    let profile_mock = server.mock(|when, then| {
        when.method(GET)
            .path("/projects/p/databases/(default)/documents/users/uid-lae");
        then.status(503).body("unavailable");
    });

    let dir = TempDir::new().unwrap();
    let cache = RoleCache::new(dir.path().join("roles.json"));
    cache
        .put(&UserProfile {
            uid: "uid-lae".to_string(),
            email: "harbour@lae.example.pg".to_string(),
            role: Role::Port,
            port_id: Some("lae".to_string()),
            display_name: Some("Lae".to_string()),
        })
        .await
        .unwrap();

    let service = SessionService::new(
        IdentityClient::new(server.url("/identity"), "web-key"),
        FirestoreStore::new(server.base_url(), "p"),
    )
    .with_cache(cache)
    .with_retry(fast_retry());

    let signed_in = service.login("harbour@lae.example.pg", "pw").await.unwrap();
    profile_mock.assert_hits(3);
    assert!(signed_in.from_cache);
    assert_eq!(signed_in.profile.role, Role::Port);
}

#[tokio::test]
async fn test_profile_lookup_without_cache_surfaces_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET)
            .path("/projects/p/databases/(default)/documents/users/uid-x");
        then.status(503).body("unavailable");
    });

    let service = SessionService::new(
        IdentityClient::new(server.url("/identity"), "web-key"),
        FirestoreStore::new(server.base_url(), "p"),
    )
    .with_retry(fast_retry());

    let err = service.load_profile("uid-x").await.unwrap_err();
    assert!(err.is_network());
}

#[tokio::test]
async fn test_wrong_password_is_not_retried() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path("/identity/accounts:signInWithPassword");
        then.status(400)
            .json_body(json!({ "error": { "code": 400, "message": "INVALID_PASSWORD" } }));
    });

    let service = SessionService::new(
        IdentityClient::new(server.url("/identity"), "web-key"),
        MemoryStore::new(),
    )
    .with_retry(fast_retry());

    let err = service.login("harbour@lae.example.pg", "nope").await.unwrap_err();
    mock.assert_hits(1);
    assert!(matches!(err, PortalError::AuthError { .. }));
}
