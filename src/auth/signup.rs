use axum::{debug_handler, extract::State, response::{Html, IntoResponse, Redirect, Response}, Form};
use serde::Deserialize;
use tower_sessions::Session;

use crate::{
    identity::{self, Credentials, Identity},
    include_res,
    model::Role,
    res,
    session::{Notification, SessionContext},
    store::ProfileStore,
    AppResult, AppState,
};

#[derive(Deserialize)]
pub(crate) struct SignupForm {
    name: String,
    email: String,
    password: String,
}

async fn signup_page(session: Session, role: Role) -> AppResult<Html<String>> {
    let notification = SessionContext::new(session).take_notification().await?;
    let (heading, action) = match role {
        Role::Student => ("Create a Student Account", "/signup"),
        Role::Admin => ("Create an Admin Account", "/signup/admin"),
    };

    Ok(Html(res::page(
        "Sign up",
        "",
        notification,
        &res::Template::new(include_res!(str, "/pages/signup.html"))
            .with("heading", heading)
            .with("action", action)
            .render(),
    )))
}

async fn signup(
    identity: Identity,
    profiles: ProfileStore,
    session: Session,
    SignupForm { name, email, password }: SignupForm,
    role: Role,
) -> AppResult<Response> {
    let ctx = SessionContext::new(session);

    let created = match Credentials::parse(&email, &password) {
        Ok(credentials) => identity::sign_up_as(identity.as_ref(), &profiles, &credentials, &name, role).await,
        Err(err) => Err(err),
    };

    match created {
        Ok((user, _)) => {
            ctx.begin(&user).await?;
            ctx.notify(Notification::success("Account created!")).await?;
            Ok(Redirect::to(role.landing()).into_response())
        },
        Err(err) => {
            tracing::info!(%email, %role, error = %err, "signup failed");
            ctx.notify(Notification::error("Sign Up Failed").describe(err.to_string())).await?;
            let back = match role {
                Role::Student => "/signup",
                Role::Admin => "/signup/admin",
            };
            Ok(Redirect::to(back).into_response())
        },
    }
}

#[debug_handler]
pub(crate) async fn student_page(session: Session) -> AppResult<Html<String>> {
    signup_page(session, Role::Student).await
}

#[debug_handler]
pub(crate) async fn admin_page(session: Session) -> AppResult<Html<String>> {
    signup_page(session, Role::Admin).await
}

#[debug_handler(state = AppState)]
pub(crate) async fn student_signup(
    State(identity): State<Identity>,
    State(profiles): State<ProfileStore>,
    session: Session,
    Form(form): Form<SignupForm>,
) -> AppResult<Response> {
    signup(identity, profiles, session, form, Role::Student).await
}

#[debug_handler(state = AppState)]
pub(crate) async fn admin_signup(
    State(identity): State<Identity>,
    State(profiles): State<ProfileStore>,
    session: Session,
    Form(form): Form<SignupForm>,
) -> AppResult<Response> {
    signup(identity, profiles, session, form, Role::Admin).await
}
