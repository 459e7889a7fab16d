//! Sign-in plus role lookup with retry and an on-disk role cache.
//!
//! Profile reads are retried with exponential backoff on network failures only;
//! when every attempt fails the last known profile for the uid is served instead.

use crate::adapters::identity::{AuthSession, IdentityClient};
use crate::domain::model::{collections, UserProfile};
use crate::domain::ports::DocumentStore;
use crate::utils::error::{PortalError, Result};
use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// 第 n 次重試前的等待時間 (500ms, 1s, 2s ...)
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(retry.saturating_sub(1)))
    }

    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_network() && attempt < attempts => {
                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        "⚠️ {} failed (attempt {}/{}): {}; retrying in {:?}",
                        label,
                        attempt,
                        attempts,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// uid → 最近一次成功讀到的使用者資料
#[derive(Debug, Clone)]
pub struct RoleCache {
    path: PathBuf,
}

impl RoleCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn load_all(&self) -> Result<HashMap<String, UserProfile>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get(&self, uid: &str) -> Result<Option<UserProfile>> {
        Ok(self.load_all().await?.remove(uid))
    }

    pub async fn put(&self, profile: &UserProfile) -> Result<()> {
        // 快取檔壞掉就重建
        let mut all = self.load_all().await.unwrap_or_default();
        all.insert(profile.uid.clone(), profile.clone());
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, serde_json::to_vec_pretty(&all)?).await?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SignedIn {
    pub session: AuthSession,
    pub profile: UserProfile,
    /// 資料來自本機快取 (遠端讀取失敗)
    pub from_cache: bool,
}

pub struct SessionService<D: DocumentStore> {
    identity: IdentityClient,
    store: D,
    cache: Option<RoleCache>,
    retry: RetryPolicy,
}

impl<D: DocumentStore> SessionService<D> {
    pub fn new(identity: IdentityClient, store: D) -> Self {
        Self {
            identity,
            store,
            cache: None,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_cache(mut self, cache: RoleCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession> {
        self.retry
            .run("sign-in", || self.identity.sign_in(email, password))
            .await
    }

    /// 讀取 users/<uid>，失敗時回退到快取
    pub async fn load_profile(&self, uid: &str) -> Result<(UserProfile, bool)> {
        let remote = self
            .retry
            .run("profile lookup", || self.store.get(collections::USERS, uid))
            .await;

        match remote {
            Ok(Some(doc)) => {
                let profile = UserProfile::from_document(&doc).ok_or_else(|| {
                    PortalError::AuthError {
                        message: format!("User {} has no recognised role", uid),
                    }
                })?;
                if let Some(cache) = &self.cache {
                    if let Err(e) = cache.put(&profile).await {
                        tracing::warn!("Could not update role cache: {}", e);
                    }
                }
                Ok((profile, false))
            }
            Ok(None) => Err(PortalError::AuthError {
                message: format!("No profile found for user {}", uid),
            }),
            Err(e) if e.is_network() => {
                let cached = match &self.cache {
                    Some(cache) => cache.get(uid).await.unwrap_or_else(|err| {
                        tracing::warn!("Role cache unreadable: {}", err);
                        None
                    }),
                    None => None,
                };
                match cached {
                    Some(profile) => {
                        tracing::warn!("📦 Using cached role '{}' for {}", profile.role.as_str(), uid);
                        Ok((profile, true))
                    }
                    None => Err(e),
                }
            }
            Err(e) => Err(e),
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<SignedIn> {
        let session = self.sign_in(email, password).await?;
        let (profile, from_cache) = self.load_profile(&session.local_id).await?;
        tracing::info!("🔐 Signed in {} as {}", session.email, profile.role.as_str());
        Ok(SignedIn {
            session,
            profile,
            from_cache,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::Role;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tempfile::TempDir;

    fn network_error() -> PortalError {
        PortalError::RemoteError {
            status: 503,
            message: "unavailable".to_string(),
        }
    }

    fn fast() -> RetryPolicy {
        RetryPolicy {
            attempts: 3,
            base_delay: Duration::from_millis(1),
        }
    }

    #[test]
    fn test_delay_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for(2), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(3), Duration::from_millis(2000));
    }

    #[tokio::test]
    async fn test_retry_until_success() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let value = fast()
            .run("op", move || async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(network_error())
                } else {
                    Ok(7)
                }
            })
            .await
            .unwrap();
        assert_eq!(value, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_no_retry_for_non_network_errors() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<()> = fast()
            .run("op", move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(PortalError::validation("bad"))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_attempts() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<()> = fast()
            .run("op", move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(network_error())
            })
            .await;
        assert!(result.unwrap_err().is_network());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_role_cache_round_trip() {
        let dir = TempDir::new().unwrap();
        let cache = RoleCache::new(dir.path().join("cache").join("roles.json"));
        assert!(cache.get("u1").await.unwrap().is_none());

        let profile = UserProfile {
            uid: "u1".to_string(),
            email: "ops@lae.example".to_string(),
            role: Role::Port,
            port_id: Some("lae".to_string()),
            display_name: None,
        };
        cache.put(&profile).await.unwrap();
        assert_eq!(cache.get("u1").await.unwrap(), Some(profile));
    }
}
