use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::{
    guard::Resolution,
    identity::IdentityProvider,
    model::{Profile, UserIdentity},
    store::ProfileStore,
    PortalError,
};

pub const USER_ID: &str = "user_id";
pub const EMAIL: &str = "email";
pub const FLASH: &str = "flash";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Success,
    Error,
}

/// A one-shot message shown on the next rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub description: Option<String>,
}

impl Notification {
    pub fn success(title: impl Into<String>) -> Self {
        Self { kind: NotificationKind::Success, title: title.into(), description: None }
    }

    pub fn error(title: impl Into<String>) -> Self {
        Self { kind: NotificationKind::Error, title: title.into(), description: None }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// The signed-in user of one browser session.
///
/// Begins on login, ends on sign-out; nothing else writes the identity keys.
#[derive(Clone)]
pub struct SessionContext {
    session: Session,
}

impl SessionContext {
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    pub async fn begin(&self, identity: &UserIdentity) -> Result<(), PortalError> {
        self.session.cycle_id().await?;
        self.session.insert(USER_ID, &identity.id).await?;
        self.session.insert(EMAIL, &identity.email).await?;
        tracing::info!(uid = %identity.id, "session started");
        Ok(())
    }

    pub async fn identity(&self) -> Result<Option<UserIdentity>, PortalError> {
        let Some(id) = self.session.get::<String>(USER_ID).await? else {
            return Ok(None);
        };
        let email = self.session.get::<Option<String>>(EMAIL).await?.flatten();
        Ok(Some(UserIdentity { id, email }))
    }

    /// Looks up the profile behind this session. A lookup that fails for
    /// transient reasons leaves the resolution pending; any other failure is
    /// final.
    pub async fn resolve(&self, profiles: &ProfileStore) -> Resolution {
        let identity = match self.identity().await {
            Ok(Some(identity)) => identity,
            Ok(None) => return Resolution::Anonymous,
            Err(err) => {
                tracing::warn!(error = %err, "session unreadable");
                return Resolution::Failed;
            },
        };

        match profiles.get(&identity.id).await {
            Ok(profile) => Resolution::Resolved { identity, profile: Some(profile) },
            Err(PortalError::NotFound { .. }) => Resolution::Resolved { identity, profile: None },
            Err(err) if err.is_transient() => Resolution::Pending,
            Err(err) => {
                tracing::error!(error = %err, "profile lookup failed");
                Resolution::Failed
            },
        }
    }

    /// Signs out with the identity provider and drops every session key.
    /// Pending notifications survive so the login page can show them.
    pub async fn end(&self, identity: &dyn IdentityProvider) -> Result<(), PortalError> {
        let flash = self.session.get::<Notification>(FLASH).await?;
        if let Some(user) = self.identity().await? {
            if let Err(err) = identity.sign_out(&user.id).await {
                tracing::warn!(uid = %user.id, error = %err, "identity provider sign-out failed");
            }
            tracing::info!(uid = %user.id, "session ended");
        }
        self.session.flush().await?;
        if let Some(flash) = flash {
            self.session.insert(FLASH, flash).await?;
        }
        Ok(())
    }

    pub async fn notify(&self, notification: Notification) -> Result<(), PortalError> {
        self.session.insert(FLASH, notification).await?;
        Ok(())
    }

    pub async fn take_notification(&self) -> Result<Option<Notification>, PortalError> {
        Ok(self.session.remove::<Notification>(FLASH).await?)
    }
}

/// Convenience for handlers that already hold a profile.
pub(crate) fn display_name(profile: &Profile) -> &str {
    if profile.name.is_empty() {
        profile.email.as_deref().unwrap_or(&profile.uid)
    } else {
        &profile.name
    }
}
