use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{model::UserIdentity, PortalError};

use super::{Credentials, IdentityProvider};

/// Email/password accounts kept in the portal's own database.
///
/// Used when no Firebase key is configured, and by the test suites.
#[derive(Clone)]
pub struct LocalIdentity {
    db_pool: SqlitePool,
}

fn hashing(err: impl std::fmt::Display) -> PortalError {
    PortalError::Hashing(err.to_string())
}

/// Argon2id with a fresh random salt, encoded as a PHC string.
fn hash_password(password: &str) -> Result<String, PortalError> {
    let salt = SaltString::encode_b64(&rand::random::<[u8; 16]>()).map_err(hashing)?;
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(hashing)?
        .to_string())
}

fn verify_password(password: &str, stored: &str) -> Result<bool, PortalError> {
    let parsed = PasswordHash::new(stored).map_err(hashing)?;
    Ok(Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
}

/// Argon2 is deliberately slow; keep it off the async workers.
async fn off_runtime<T, F>(work: F) -> Result<T, PortalError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, PortalError> + Send + 'static,
{
    tokio::task::spawn_blocking(work).await.map_err(hashing)?
}

impl LocalIdentity {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentity {
    async fn sign_in(&self, credentials: &Credentials) -> Result<UserIdentity, PortalError> {
        let row: Option<(String, String)> =
            sqlx::query_as("SELECT uid,password_hash FROM credentials WHERE email=?")
                .bind(credentials.email())
                .fetch_optional(&self.db_pool)
                .await?;

        let refused = || PortalError::Auth("Invalid email or password.".to_owned());
        let Some((uid, stored)) = row else {
            return Err(refused());
        };

        let password = credentials.password().to_owned();
        if !off_runtime(move || verify_password(&password, &stored)).await? {
            return Err(refused());
        }
        Ok(UserIdentity { id: uid, email: Some(credentials.email().to_owned()) })
    }

    async fn sign_up(&self, credentials: &Credentials) -> Result<UserIdentity, PortalError> {
        let uid = Uuid::now_v7().simple().to_string();
        let password = credentials.password().to_owned();
        let password_hash = off_runtime(move || hash_password(&password)).await?;

        let inserted = sqlx::query("INSERT INTO credentials (uid,email,password_hash) VALUES (?,?,?) ON CONFLICT(email) DO NOTHING")
            .bind(&uid)
            .bind(credentials.email())
            .bind(&password_hash)
            .execute(&self.db_pool)
            .await?;

        if inserted.rows_affected() == 0 {
            return Err(PortalError::Auth("An account with this email already exists.".to_owned()));
        }
        Ok(UserIdentity { id: uid, email: Some(credentials.email().to_owned()) })
    }

    async fn sign_out(&self, uid: &str) -> Result<(), PortalError> {
        tracing::debug!(%uid, "local sign-out");
        Ok(())
    }

    async fn send_password_reset(&self, email: &str) -> Result<(), PortalError> {
        let known = sqlx::query("SELECT 1 FROM credentials WHERE email=?")
            .bind(email)
            .fetch_optional(&self.db_pool)
            .await?
            .is_some();
        if !known {
            return Err(PortalError::Auth("No account exists for this email.".to_owned()));
        }
        // no mail transport locally; the operator resets by hand
        tracing::info!(%email, "password reset requested");
        Ok(())
    }
}
