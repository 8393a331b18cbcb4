//! Identity providers: who a set of credentials belongs to.

mod firebase;
mod local;

use std::sync::Arc;

use async_trait::async_trait;

pub use firebase::FirebaseIdentity;
pub use local::LocalIdentity;

use crate::{
    model::{Profile, Role, UserIdentity},
    store::ProfileStore,
    PortalError,
};

pub const MIN_PASSWORD_LEN: usize = 6;

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self, credentials: &Credentials) -> Result<UserIdentity, PortalError>;

    async fn sign_up(&self, credentials: &Credentials) -> Result<UserIdentity, PortalError>;

    async fn sign_out(&self, uid: &str) -> Result<(), PortalError>;

    async fn send_password_reset(&self, email: &str) -> Result<(), PortalError>;
}

pub type Identity = Arc<dyn IdentityProvider>;

/// Email and password that passed the login form's checks.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    email: String,
    password: String,
}

impl Credentials {
    pub fn parse(email: &str, password: &str) -> Result<Self, PortalError> {
        let email = parse_email(email)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(PortalError::validation(
                "password",
                format!("Password must be at least {MIN_PASSWORD_LEN} characters."),
            ));
        }
        Ok(Self { email, password: password.to_owned() })
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"***")
            .finish()
    }
}

pub fn parse_email(raw: &str) -> Result<String, PortalError> {
    let email = raw.trim();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        },
        None => false,
    };
    if !valid || email.chars().any(char::is_whitespace) {
        return Err(PortalError::validation("email", "Invalid email address."));
    }
    Ok(email.to_lowercase())
}

/// Signs in and checks that the profile holds the role picked on the login
/// form. On mismatch the fresh identity is signed out again.
pub async fn sign_in_as(
    identity: &dyn IdentityProvider,
    profiles: &ProfileStore,
    credentials: &Credentials,
    role: Role,
) -> Result<(UserIdentity, Profile), PortalError> {
    let user = identity.sign_in(credentials).await?;

    match profiles.get(&user.id).await {
        Ok(profile) if profile.role == role => Ok((user, profile)),
        Ok(_) | Err(PortalError::NotFound { .. }) => {
            tracing::info!(uid = %user.id, %role, "login with wrong role");
            identity.sign_out(&user.id).await?;
            Err(PortalError::RoleMismatch(role))
        },
        Err(err) => Err(err),
    }
}

/// Creates the identity and its profile in one go.
pub async fn sign_up_as(
    identity: &dyn IdentityProvider,
    profiles: &ProfileStore,
    credentials: &Credentials,
    name: &str,
    role: Role,
) -> Result<(UserIdentity, Profile), PortalError> {
    let name = name.trim();
    if name.chars().count() < 2 {
        return Err(PortalError::validation("name", "Name must be at least 2 characters."));
    }

    let user = identity.sign_up(credentials).await?;
    let profile = Profile {
        uid: user.id.clone(),
        role,
        name: name.to_owned(),
        email: user.email.clone(),
    };
    profiles.create(&profile).await?;
    tracing::info!(uid = %user.id, %role, "signed up");
    Ok((user, profile))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("student@college.edu")]
    #[case("  Mixed.Case@Example.org ")]
    fn accepts_addresses(#[case] raw: &str) {
        let creds = Credentials::parse(raw, "secret1").unwrap();
        assert_eq!(creds.email(), raw.trim().to_lowercase());
    }

    #[rstest]
    #[case("")]
    #[case("no-at-sign")]
    #[case("a@b")]
    #[case("@college.edu")]
    #[case("a@@college.edu")]
    #[case("a b@college.edu")]
    fn rejects_malformed_addresses(#[case] raw: &str) {
        let err = Credentials::parse(raw, "secret1").unwrap_err();
        assert!(matches!(err, PortalError::Validation { field: "email", .. }));
    }

    #[test]
    fn short_passwords_fail_validation() {
        let err = Credentials::parse("a@college.edu", "12345").unwrap_err();
        assert!(matches!(err, PortalError::Validation { field: "password", .. }));
    }

    #[test]
    fn debug_hides_password() {
        let creds = Credentials::parse("a@college.edu", "hunter22").unwrap();
        assert!(!format!("{creds:?}").contains("hunter22"));
    }
}
