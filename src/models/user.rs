use bcrypt::{hash, verify};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::store::KeyValueStore;

pub const USER_KEY_PREFIX: &str = "user:";
const BCRYPT_COST: u32 = 10;

/// A registered account, stored as JSON at `user:{email}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub email: String,
    /// bcrypt hash of the password.
    pub password: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// The part of a `User` that is safe to return to clients.
#[derive(Debug, Serialize, Deserialize)]
pub struct UserProfile {
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            email: user.email.clone(),
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

pub fn user_key(email: &str) -> String {
    format!("{}{}", USER_KEY_PREFIX, email)
}

impl User {
    /// Creates an account with a freshly hashed password.
    pub fn new(email: &str, password: &str) -> Result<Self, AppError> {
        Ok(Self {
            email: email.to_string(),
            password: hash_password(password)?,
            created_at: Utc::now(),
            updated_at: None,
        })
    }

    pub fn check_password(&self, candidate: &str) -> Result<bool, AppError> {
        verify(candidate, &self.password)
            .map_err(|e| AppError::InternalServerError(format!("Failed to verify password: {}", e)))
    }

    pub fn set_password(&mut self, password: &str) -> Result<(), AppError> {
        self.password = hash_password(password)?;
        self.updated_at = Some(Utc::now());
        Ok(())
    }

    pub async fn find(store: &dyn KeyValueStore, email: &str) -> Result<Option<Self>, AppError> {
        match store.get(&user_key(email)).await? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    pub async fn exists(store: &dyn KeyValueStore, email: &str) -> Result<bool, AppError> {
        Ok(store.get(&user_key(email)).await?.is_some())
    }

    pub async fn save(&self, store: &dyn KeyValueStore) -> Result<(), AppError> {
        let json = serde_json::to_string(self)?;
        store.set(&user_key(&self.email), &json, None).await?;
        Ok(())
    }

    /// Addresses of every registered account, read from the `user:` key namespace.
    pub async fn all_emails(store: &dyn KeyValueStore) -> Result<Vec<String>, AppError> {
        let mut emails: Vec<String> = store
            .keys_with_prefix(USER_KEY_PREFIX)
            .await?
            .into_iter()
            .filter_map(|key| key.strip_prefix(USER_KEY_PREFIX).map(str::to_string))
            .collect();
        emails.sort();
        Ok(emails)
    }
}

fn hash_password(password: &str) -> Result<String, AppError> {
    hash(password, BCRYPT_COST)
        .map_err(|e| AppError::InternalServerError(format!("Failed to hash password: {}", e)))
}
