//! User store.
//!
//! The gate and the account handlers reach users through the
//! [`UserRepository`] trait. `PgUserRepository` is the production store;
//! `InMemoryUserRepository` backs local runs without `DATABASE_URL` and tests.
//!
//! Emails are stored and looked up exactly as given; callers normalize them
//! (see `services::user_service::normalize_email`).

use crate::errors::GatewayError;
use crate::models::{NewUser, User};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Message returned when email or contact is already taken.
pub const DUPLICATE_USER_MESSAGE: &str = "Email or contact already exists";

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Look up a user by email.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, GatewayError>;

    /// Insert a user.
    ///
    /// Returns `GatewayError::Conflict` when the email or contact is taken.
    async fn create(&self, new_user: NewUser) -> Result<User, GatewayError>;

    /// Cheap connectivity probe for readiness checks.
    async fn health_check(&self) -> Result<(), GatewayError>;
}

/// PostgreSQL-backed store (see `migrations/` for the schema).
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, GatewayError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, contact, address, password_hash, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| GatewayError::Database(format!("Failed to fetch user by email: {}", e)))?;

        Ok(user)
    }

    async fn create(&self, new_user: NewUser) -> Result<User, GatewayError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, name, email, contact, address, password_hash, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW())
            RETURNING id, name, email, contact, address, password_hash, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new_user.name)
        .bind(&new_user.email)
        .bind(&new_user.contact)
        .bind(&new_user.address)
        .bind(&new_user.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                GatewayError::Conflict(DUPLICATE_USER_MESSAGE.to_string())
            }
            _ => GatewayError::Database(format!("Failed to create user: {}", e)),
        })?;

        Ok(user)
    }

    async fn health_check(&self) -> Result<(), GatewayError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| GatewayError::Database(format!("Health check failed: {}", e)))?;
        Ok(())
    }
}

/// Process-local store keyed by email.
#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<String, User>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, GatewayError> {
        Ok(self.users.read().await.get(email).cloned())
    }

    async fn create(&self, new_user: NewUser) -> Result<User, GatewayError> {
        let mut users = self.users.write().await;

        let contact_taken = new_user.contact.as_ref().is_some_and(|contact| {
            users
                .values()
                .any(|u| u.contact.as_deref() == Some(contact.as_str()))
        });
        if users.contains_key(&new_user.email) || contact_taken {
            return Err(GatewayError::Conflict(DUPLICATE_USER_MESSAGE.to_string()));
        }

        let user = User {
            id: Uuid::new_v4(),
            name: new_user.name,
            email: new_user.email,
            contact: new_user.contact,
            address: new_user.address,
            password_hash: new_user.password_hash,
            created_at: Utc::now(),
        };
        users.insert(user.email.clone(), user.clone());

        Ok(user)
    }

    async fn health_check(&self) -> Result<(), GatewayError> {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn new_user(email: &str, contact: Option<&str>) -> NewUser {
        NewUser {
            name: "Ada Shopper".to_string(),
            email: email.to_string(),
            contact: contact.map(ToString::to_string),
            address: Some("1 Market St".to_string()),
            password_hash: None,
        }
    }

    #[tokio::test]
    async fn test_create_then_find() {
        let repo = InMemoryUserRepository::new();
        assert!(repo.is_empty().await);

        let created = repo
            .create(new_user("ada@example.com", Some("+15550100")))
            .await
            .unwrap();
        let found = repo.find_by_email("ada@example.com").await.unwrap().unwrap();

        assert_eq!(found.id, created.id);
        assert_eq!(found.address.as_deref(), Some("1 Market St"));
        assert_eq!(repo.len().await, 1);
    }

    #[tokio::test]
    async fn test_find_missing_returns_none() {
        let repo = InMemoryUserRepository::new();
        assert!(repo.find_by_email("nobody@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let repo = InMemoryUserRepository::new();
        repo.create(new_user("ada@example.com", None)).await.unwrap();

        let err = repo
            .create(new_user("ada@example.com", None))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Conflict(ref msg) if msg == DUPLICATE_USER_MESSAGE));
    }

    #[tokio::test]
    async fn test_duplicate_contact_conflicts() {
        let repo = InMemoryUserRepository::new();
        repo.create(new_user("ada@example.com", Some("+15550100")))
            .await
            .unwrap();

        let err = repo
            .create(new_user("bob@example.com", Some("+15550100")))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Conflict(_)));

        // Missing contacts never collide with each other.
        repo.create(new_user("carol@example.com", None)).await.unwrap();
        repo.create(new_user("dave@example.com", None)).await.unwrap();
    }

    #[tokio::test]
    async fn test_health_check_is_ok() {
        assert!(InMemoryUserRepository::new().health_check().await.is_ok());
    }
}
