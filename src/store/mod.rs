//! Document storage: profiles, notices, events and their attachments.
//!
//! Write access rules live here, next to the queries, the way a hosted
//! document store enforces them in its security rules: admins write
//! notices and events, students only ever touch their own ledger entry.

mod blobs;
mod events;
mod notices;
mod profiles;

use std::str::FromStr;

use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    SqlitePool,
};

pub use blobs::{attachment_path, BlobStore};
pub use events::{EventRepository, Ledger, LedgerStrategy};
pub use notices::NoticeRepository;
pub use profiles::ProfileStore;

use crate::{
    model::{Profile, Role},
    PortalError,
};

pub async fn connect(database_url: &str) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal);

    let db_pool = SqlitePoolOptions::new()
        .max_connections(16)
        .connect_with(options)
        .await?;
    sqlx::migrate!().run(&db_pool).await?;
    Ok(db_pool)
}

pub(crate) fn require_admin(actor: &Profile, action: &str) -> Result<(), PortalError> {
    if actor.role != Role::Admin {
        tracing::warn!(uid = %actor.uid, action, "non-admin write rejected");
        return Err(PortalError::Permission(format!("only admins may {action}")));
    }
    Ok(())
}

/// Students register themselves and nobody else.
pub(crate) fn require_self(actor: &Profile, student_id: &str) -> Result<(), PortalError> {
    if actor.role != Role::Student || actor.uid != student_id {
        tracing::warn!(uid = %actor.uid, student_id, "foreign ledger write rejected");
        return Err(PortalError::Permission(
            "students may only change their own registration".to_owned(),
        ));
    }
    Ok(())
}
