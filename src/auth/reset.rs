use axum::{debug_handler, extract::State, response::Redirect, Form};
use serde::Deserialize;
use tower_sessions::Session;

use crate::{
    guard::LOGIN,
    identity::{parse_email, Identity},
    session::{Notification, SessionContext},
    AppResult, AppState,
};

#[derive(Deserialize)]
pub(crate) struct ResetForm {
    email: String,
}

#[debug_handler(state = AppState)]
pub(crate) async fn password_reset(
    State(identity): State<Identity>,
    session: Session,
    Form(ResetForm { email }): Form<ResetForm>,
) -> AppResult<Redirect> {
    let ctx = SessionContext::new(session);

    if email.trim().is_empty() {
        ctx.notify(
            Notification::error("Email Required")
                .describe("Please enter your email address to reset your password."),
        ).await?;
        return Ok(Redirect::to(LOGIN));
    }

    let sent = match parse_email(&email) {
        Ok(email) => identity.send_password_reset(&email).await,
        Err(err) => Err(err),
    };

    let notification = match sent {
        Ok(()) => Notification::success("Password Reset Email Sent")
            .describe("Please check your inbox for instructions to reset your password."),
        Err(err) => {
            tracing::info!(error = %err, "password reset failed");
            Notification::error("Password Reset Failed").describe(err.to_string())
        },
    };
    ctx.notify(notification).await?;
    Ok(Redirect::to(LOGIN))
}
