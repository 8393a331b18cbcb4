use sqlx::SqlitePool;

use crate::{
    model::{Profile, Role},
    PortalError,
};

#[derive(Clone)]
pub struct ProfileStore {
    db_pool: SqlitePool,
}

impl ProfileStore {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self { db_pool }
    }

    pub async fn get(&self, uid: &str) -> Result<Profile, PortalError> {
        let row: Option<(String, String, Option<String>)> =
            sqlx::query_as("SELECT role,name,email FROM profiles WHERE uid=?")
                .bind(uid)
                .fetch_optional(&self.db_pool)
                .await?;

        let Some((role, name, email)) = row else {
            return Err(PortalError::not_found("profile", uid));
        };
        Ok(Profile { uid: uid.to_owned(), role: role.parse()?, name, email })
    }

    /// Profiles are written once; a second create for the same uid fails.
    pub async fn create(&self, profile: &Profile) -> Result<(), PortalError> {
        sqlx::query("INSERT INTO profiles (uid,role,name,email) VALUES (?,?,?,?)")
            .bind(&profile.uid)
            .bind(profile.role.as_str())
            .bind(&profile.name)
            .bind(&profile.email)
            .execute(&self.db_pool)
            .await?;
        Ok(())
    }

    pub async fn count(&self, role: Role) -> Result<i64, PortalError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM profiles WHERE role=?")
            .bind(role.as_str())
            .fetch_one(&self.db_pool)
            .await?;
        Ok(count)
    }

    /// Display names for `uids`, in the given order. Unknown ids map to
    /// `None`.
    pub async fn names(&self, uids: &[String]) -> Result<Vec<(String, Option<String>)>, PortalError> {
        let mut names = Vec::with_capacity(uids.len());
        for uid in uids {
            let name: Option<(String,)> = sqlx::query_as("SELECT name FROM profiles WHERE uid=?")
                .bind(uid)
                .fetch_optional(&self.db_pool)
                .await?;
            names.push((uid.clone(), name.map(|(name,)| name)));
        }
        Ok(names)
    }
}
