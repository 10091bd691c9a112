//! User repository for database operations
//!
//! The auth service only sees the [`UserStore`] trait. `PgUserRepository` is
//! the production implementation; `InMemoryUserStore` backs router tests and
//! local tooling.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use folio_shared::{validation::validate_username, PublicUser, UpdateProfileRequest};
use parking_lot::RwLock;
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

/// User record from database
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRecord {
    pub id: Uuid,
    pub username: String,
    /// Encoded Argon2id hash
    pub password: String,
    pub email: String,
    pub first_name: String,
    pub last_name: Option<String>,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRecord {
    /// Strip the credential for API responses
    pub fn to_public(&self) -> PublicUser {
        PublicUser {
            id: self.id.to_string(),
            username: self.username.clone(),
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            is_admin: self.is_admin,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Credential lookup and password persistence
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Look up a user by login identifier (username)
    async fn get_credential(&self, identifier: &str) -> Result<Option<UserRecord>>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>>;

    /// Replace the stored hash; returns false if the user does not exist
    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> Result<bool>;

    /// Overwrite name and email; `None` if the user does not exist
    async fn update_profile(
        &self,
        id: Uuid,
        profile: &UpdateProfileRequest,
    ) -> Result<Option<UserRecord>>;
}

const USER_COLUMNS: &str =
    "id, username, password, email, first_name, last_name, is_admin, created_at, updated_at";

/// Postgres-backed user store
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a user; used for seeding and integration tests
    pub async fn create(
        &self,
        username: &str,
        password_hash: &str,
        email: &str,
        first_name: &str,
        is_admin: bool,
    ) -> Result<UserRecord> {
        validate_username(username).map_err(anyhow::Error::msg)?;

        let user = sqlx::query_as::<_, UserRecord>(&format!(
            r#"
            INSERT INTO users (username, password, email, first_name, is_admin)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(username)
        .bind(password_hash)
        .bind(email)
        .bind(first_name)
        .bind(is_admin)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }
}

#[async_trait]
impl UserStore for PgUserRepository {
    async fn get_credential(&self, identifier: &str) -> Result<Option<UserRecord>> {
        let user = sqlx::query_as::<_, UserRecord>(&format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE username = $1
            "#
        ))
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>> {
        let user = sqlx::query_as::<_, UserRecord>(&format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE id = $1
            "#
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(password_hash)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_profile(
        &self,
        id: Uuid,
        profile: &UpdateProfileRequest,
    ) -> Result<Option<UserRecord>> {
        let user = sqlx::query_as::<_, UserRecord>(&format!(
            r#"
            UPDATE users
            SET first_name = $2, last_name = $3, email = $4, updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&profile.first_name)
        .bind(&profile.last_name)
        .bind(&profile.email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }
}

/// Process-local user store
#[derive(Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<Uuid, UserRecord>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a user and return the stored record
    pub fn insert(
        &self,
        username: &str,
        password_hash: &str,
        email: &str,
        is_admin: bool,
    ) -> UserRecord {
        let now = Utc::now();
        let record = UserRecord {
            id: Uuid::new_v4(),
            username: username.to_string(),
            password: password_hash.to_string(),
            email: email.to_string(),
            first_name: username.to_string(),
            last_name: None,
            is_admin,
            created_at: now,
            updated_at: now,
        };
        self.users.write().insert(record.id, record.clone());
        record
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn get_credential(&self, identifier: &str) -> Result<Option<UserRecord>> {
        Ok(self
            .users
            .read()
            .values()
            .find(|user| user.username == identifier)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>> {
        Ok(self.users.read().get(&id).cloned())
    }

    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> Result<bool> {
        let mut users = self.users.write();
        match users.get_mut(&id) {
            Some(user) => {
                user.password = password_hash.to_string();
                user.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_profile(
        &self,
        id: Uuid,
        profile: &UpdateProfileRequest,
    ) -> Result<Option<UserRecord>> {
        let mut users = self.users.write();
        Ok(users.get_mut(&id).map(|user| {
            user.first_name = profile.first_name.clone();
            user.last_name = profile.last_name.clone();
            user.email = profile.email.clone();
            user.updated_at = Utc::now();
            user.clone()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_lookup_by_username() {
        let store = InMemoryUserStore::new();
        let admin = store.insert("admin", "$argon2id$...", "admin@example.com", true);

        let found = store.get_credential("admin").await.unwrap().unwrap();
        assert_eq!(found.id, admin.id);
        assert!(store.get_credential("Admin").await.unwrap().is_none());
        assert!(store.find_by_id(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_in_memory_update_password() {
        let store = InMemoryUserStore::new();
        let user = store.insert("editor", "old", "editor@example.com", false);

        assert!(store.update_password_hash(user.id, "new").await.unwrap());
        assert_eq!(store.find_by_id(user.id).await.unwrap().unwrap().password, "new");
        assert!(!store.update_password_hash(Uuid::new_v4(), "x").await.unwrap());
    }

    #[tokio::test]
    async fn test_in_memory_update_profile() {
        let store = InMemoryUserStore::new();
        let user = store.insert("admin", "hash", "old@example.com", true);
        let update = UpdateProfileRequest {
            first_name: "Ada".to_string(),
            last_name: Some("Lovelace".to_string()),
            email: "ada@example.com".to_string(),
        };

        let updated = store.update_profile(user.id, &update).await.unwrap().unwrap();
        assert_eq!(updated.first_name, "Ada");
        assert_eq!(updated.last_name.as_deref(), Some("Lovelace"));
        assert_eq!(updated.email, "ada@example.com");
        assert_eq!(updated.password, "hash");
        assert!(store.update_profile(Uuid::new_v4(), &update).await.unwrap().is_none());
    }

    #[test]
    fn test_public_view_drops_password() {
        let store = InMemoryUserStore::new();
        let user = store.insert("admin", "secret-hash", "admin@example.com", true);
        let public = serde_json::to_string(&user.to_public()).unwrap();
        assert!(!public.contains("secret-hash"));
        assert!(public.contains("\"is_admin\":true"));
    }
}
