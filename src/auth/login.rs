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
    AppResult, AppState, PortalError,
};

#[derive(Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    pub role: Role,
}

#[debug_handler]
pub async fn login_page(session: Session) -> AppResult<Html<String>> {
    let ctx = SessionContext::new(session);
    let notification = ctx.take_notification().await?;

    Ok(Html(res::page(
        "Login",
        "",
        notification,
        include_res!(str, "/pages/login.html"),
    )))
}

#[debug_handler(state = AppState)]
pub async fn login(
    State(identity): State<Identity>,
    State(profiles): State<ProfileStore>,
    session: Session,
    Form(LoginForm { email, password, role }): Form<LoginForm>,
) -> AppResult<Response> {
    let ctx = SessionContext::new(session);

    let signed_in = match Credentials::parse(&email, &password) {
        Ok(credentials) => identity::sign_in_as(identity.as_ref(), &profiles, &credentials, role).await,
        Err(err) => Err(err),
    };

    match signed_in {
        Ok((user, profile)) => {
            ctx.begin(&user).await?;
            ctx.notify(Notification::success("Success!").describe("Logged in successfully.")).await?;
            Ok(Redirect::to(profile.role.landing()).into_response())
        },
        Err(err) => {
            tracing::info!(%email, %role, error = %err, "login failed");
            if matches!(err, PortalError::RoleMismatch(_)) {
                ctx.end(identity.as_ref()).await?;
            }
            ctx.notify(Notification::error("Login Failed").describe(err.to_string())).await?;
            Ok(Redirect::to(crate::guard::LOGIN).into_response())
        },
    }
}
