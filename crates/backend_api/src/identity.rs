use async_trait::async_trait;
use models::Role;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{ApiError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub user_id: String,
    pub email: String,
    pub role: Option<Role>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub full_name: Option<String>,
}

/// Identity collaborator: accounts, sessions and roles.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str, full_name: Option<&str>) -> Result<String>;
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session>;
    async fn sign_out(&self, token: &str) -> Result<()>;
    async fn user_for_token(&self, token: &str) -> Result<Option<User>>;
    async fn user(&self, user_id: &str) -> Result<Option<User>>;
    async fn role_of(&self, user_id: &str) -> Result<Option<Role>>;
    async fn assign_role(&self, user_id: &str, role: Role) -> Result<()>;
    async fn update_email(&self, user_id: &str, email: &str) -> Result<()>;
}

struct Account {
    user: User,
    password_digest: String,
    role: Option<Role>,
}

#[derive(Default)]
struct Directory {
    accounts: HashMap<String, Account>,
    sessions: HashMap<String, String>,
}

impl Directory {
    fn by_email(&self, email: &str) -> Option<&Account> {
        self.accounts
            .values()
            .find(|a| a.user.email.eq_ignore_ascii_case(email))
    }
}

fn digest(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

/// Process-local accounts with sha256 password digests and random bearer
/// tokens. Nothing survives a restart.
#[derive(Clone, Default)]
pub struct InMemoryIdentity {
    inner: Arc<RwLock<Directory>>,
}

impl InMemoryIdentity {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentity {
    async fn sign_up(&self, email: &str, password: &str, full_name: Option<&str>) -> Result<String> {
        let email = email.trim();
        let mut dir = self.inner.write().await;
        if dir.by_email(email).is_some() {
            return Err(ApiError::UserExists(email.to_string()));
        }
        let id = uuid::Uuid::new_v4().to_string();
        dir.accounts.insert(
            id.clone(),
            Account {
                user: User {
                    id: id.clone(),
                    email: email.to_string(),
                    full_name: full_name.map(str::to_string),
                },
                password_digest: digest(password),
                role: None,
            },
        );
        Ok(id)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let mut dir = self.inner.write().await;
        let account = dir
            .by_email(email.trim())
            .filter(|a| a.password_digest == digest(password))
            .ok_or(ApiError::InvalidCredentials)?;
        let session = Session {
            access_token: uuid::Uuid::new_v4().to_string(),
            user_id: account.user.id.clone(),
            email: account.user.email.clone(),
            role: account.role,
        };
        dir.sessions
            .insert(session.access_token.clone(), session.user_id.clone());
        tracing::info!(user_id = %session.user_id, "signed in");
        Ok(session)
    }

    async fn sign_out(&self, token: &str) -> Result<()> {
        let mut dir = self.inner.write().await;
        dir.sessions.remove(token);
        Ok(())
    }

    async fn user_for_token(&self, token: &str) -> Result<Option<User>> {
        let dir = self.inner.read().await;
        Ok(dir
            .sessions
            .get(token)
            .and_then(|id| dir.accounts.get(id))
            .map(|a| a.user.clone()))
    }

    async fn user(&self, user_id: &str) -> Result<Option<User>> {
        let dir = self.inner.read().await;
        Ok(dir.accounts.get(user_id).map(|a| a.user.clone()))
    }

    async fn role_of(&self, user_id: &str) -> Result<Option<Role>> {
        let dir = self.inner.read().await;
        Ok(dir.accounts.get(user_id).and_then(|a| a.role))
    }

    async fn assign_role(&self, user_id: &str, role: Role) -> Result<()> {
        let mut dir = self.inner.write().await;
        let account = dir
            .accounts
            .get_mut(user_id)
            .ok_or_else(|| ApiError::BadRequest(format!("unknown user {}", user_id)))?;
        account.role = Some(role);
        Ok(())
    }

    async fn update_email(&self, user_id: &str, email: &str) -> Result<()> {
        let mut dir = self.inner.write().await;
        if dir
            .by_email(email)
            .is_some_and(|a| a.user.id != user_id)
        {
            return Err(ApiError::UserExists(email.to_string()));
        }
        let account = dir
            .accounts
            .get_mut(user_id)
            .ok_or_else(|| ApiError::BadRequest(format!("unknown user {}", user_id)))?;
        account.user.email = email.to_string();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sign_up_and_sign_in() {
        let id = InMemoryIdentity::new();
        let user_id = id.sign_up("admin@example.com", "secret", None).await.unwrap();
        id.assign_role(&user_id, Role::Admin).await.unwrap();

        let session = id.sign_in("Admin@Example.com", "secret").await.unwrap();
        assert_eq!(session.user_id, user_id);
        assert_eq!(session.role, Some(Role::Admin));

        let user = id.user_for_token(&session.access_token).await.unwrap().unwrap();
        assert_eq!(user.email, "admin@example.com");
    }

    #[tokio::test]
    async fn test_wrong_password_is_rejected() {
        let id = InMemoryIdentity::new();
        id.sign_up("a@b.ru", "right", None).await.unwrap();
        assert!(matches!(
            id.sign_in("a@b.ru", "wrong").await,
            Err(ApiError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_duplicate_email_is_rejected() {
        let id = InMemoryIdentity::new();
        id.sign_up("a@b.ru", "x", None).await.unwrap();
        assert!(id.sign_up("a@b.ru", "y", None).await.is_err());
    }

    #[tokio::test]
    async fn test_sign_out_invalidates_token() {
        let id = InMemoryIdentity::new();
        id.sign_up("a@b.ru", "x", Some("Анна")).await.unwrap();
        let session = id.sign_in("a@b.ru", "x").await.unwrap();
        id.sign_out(&session.access_token).await.unwrap();
        assert!(id.user_for_token(&session.access_token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_email() {
        let id = InMemoryIdentity::new();
        let user_id = id.sign_up("old@b.ru", "x", None).await.unwrap();
        id.update_email(&user_id, "new@b.ru").await.unwrap();
        assert_eq!(id.user(&user_id).await.unwrap().unwrap().email, "new@b.ru");
        assert!(id.user("nobody").await.unwrap().is_none());
        assert!(id.sign_in("new@b.ru", "x").await.is_ok());
        assert!(id.sign_in("old@b.ru", "x").await.is_err());
    }
}
