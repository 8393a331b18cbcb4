//! Route-group access control.
//!
//! Every student and admin page runs [`authorize`] through one of the
//! [`StudentSession`] / [`AdminSession`] extractors. A session that asks for
//! the wrong persona is signed out and sent back to the login page; there is
//! no separate access-denied page.

use std::marker::PhantomData;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
    response::{Html, IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use crate::{
    identity::Identity,
    include_res,
    model::{Profile, Role, UserIdentity},
    session::{Notification, SessionContext},
    store::ProfileStore,
};

pub const LOGIN: &str = "/login";

/// What is known about the current session's user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Identity or profile lookup has not finished.
    Pending,
    Anonymous,
    /// `profile` is `None` when the identity has no profile document.
    Resolved {
        identity: UserIdentity,
        profile: Option<Profile>,
    },
    /// The lookup failed for a reason waiting will not fix.
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Pending,
    Allow(Profile),
    Redirect {
        target: &'static str,
        sign_out: bool,
    },
    /// Sign out and tell the user why on the login page.
    Fail,
}

pub fn authorize(resolution: Resolution, required: Role) -> Decision {
    match resolution {
        Resolution::Pending => Decision::Pending,
        Resolution::Anonymous => Decision::Redirect { target: LOGIN, sign_out: false },
        Resolution::Resolved { profile: Some(profile), .. } if profile.role == required => {
            Decision::Allow(profile)
        },
        Resolution::Resolved { .. } => Decision::Redirect { target: LOGIN, sign_out: true },
        Resolution::Failed => Decision::Fail,
    }
}

pub trait RequiredRole: Send + Sync + 'static {
    const ROLE: Role;
}

pub struct StudentOnly;
pub struct AdminOnly;

impl RequiredRole for StudentOnly {
    const ROLE: Role = Role::Student;
}

impl RequiredRole for AdminOnly {
    const ROLE: Role = Role::Admin;
}

/// A session that passed the guard for role `R`.
pub struct Guarded<R> {
    pub ctx: SessionContext,
    pub profile: Profile,
    _role: PhantomData<R>,
}

pub type StudentSession = Guarded<StudentOnly>;
pub type AdminSession = Guarded<AdminOnly>;

impl<R, S> FromRequestParts<S> for Guarded<R>
where
    R: RequiredRole,
    S: Send + Sync,
    ProfileStore: FromRef<S>,
    Identity: FromRef<S>,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(IntoResponse::into_response)?;
        let ctx = SessionContext::new(session);
        let profiles = ProfileStore::from_ref(state);

        match authorize(ctx.resolve(&profiles).await, R::ROLE) {
            Decision::Allow(profile) => Ok(Guarded { ctx, profile, _role: PhantomData }),
            Decision::Pending => Err(loading_page(parts.uri.path())),
            Decision::Redirect { target, sign_out } => {
                if sign_out {
                    tracing::info!(required = %R::ROLE, path = %parts.uri.path(), "role mismatch, signing out");
                    let identity = Identity::from_ref(state);
                    if let Err(err) = ctx.end(identity.as_ref()).await {
                        tracing::warn!(error = %err, "could not end session");
                    }
                }
                Err(Redirect::to(target).into_response())
            },
            Decision::Fail => {
                let identity = Identity::from_ref(state);
                if let Err(err) = ctx.end(identity.as_ref()).await {
                    tracing::warn!(error = %err, "could not end session");
                }
                let notice = Notification::error("Something went wrong")
                    .describe("We could not load your profile. Please sign in again.");
                if let Err(err) = ctx.notify(notice).await {
                    tracing::warn!(error = %err, "could not store notification");
                }
                Err(Redirect::to(LOGIN).into_response())
            },
        }
    }
}

fn loading_page(path: &str) -> Response {
    Html(
        crate::res::Template::new(include_res!(str, "/pages/loading.html"))
            .with("path", &crate::res::escape(path))
            .render()
    ).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn resolved(role: Option<Role>) -> Resolution {
        Resolution::Resolved {
            identity: UserIdentity { id: "u1".into(), email: Some("u1@college.edu".into()) },
            profile: role.map(|role| Profile {
                uid: "u1".into(),
                role,
                name: "Uma".into(),
                email: Some("u1@college.edu".into()),
            }),
        }
    }

    #[rstest]
    #[case(Role::Student)]
    #[case(Role::Admin)]
    fn pending_never_redirects(#[case] required: Role) {
        assert_eq!(authorize(Resolution::Pending, required), Decision::Pending);
    }

    #[rstest]
    #[case(Role::Student)]
    #[case(Role::Admin)]
    fn anonymous_goes_to_login_without_sign_out(#[case] required: Role) {
        assert_eq!(
            authorize(Resolution::Anonymous, required),
            Decision::Redirect { target: LOGIN, sign_out: false }
        );
    }

    #[rstest]
    #[case(Role::Student, Role::Admin)]
    #[case(Role::Admin, Role::Student)]
    fn wrong_role_signs_out(#[case] actual: Role, #[case] required: Role) {
        assert_eq!(
            authorize(resolved(Some(actual)), required),
            Decision::Redirect { target: LOGIN, sign_out: true }
        );
    }

    #[test]
    fn missing_profile_counts_as_mismatch() {
        assert_eq!(
            authorize(resolved(None), Role::Student),
            Decision::Redirect { target: LOGIN, sign_out: true }
        );
    }

    #[rstest]
    #[case(Role::Student)]
    #[case(Role::Admin)]
    fn failed_lookup_is_not_left_pending(#[case] required: Role) {
        assert_eq!(authorize(Resolution::Failed, required), Decision::Fail);
    }

    #[rstest]
    #[case(Role::Student)]
    #[case(Role::Admin)]
    fn matching_role_is_allowed(#[case] role: Role) {
        match authorize(resolved(Some(role)), role) {
            Decision::Allow(profile) => assert_eq!(profile.role, role),
            other => panic!("expected allow, got {other:?}"),
        }
    }
}
