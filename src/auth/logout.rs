use axum::{debug_handler, extract::State, response::Redirect};
use tower_sessions::Session;

use crate::{guard::LOGIN, identity::Identity, session::SessionContext, AppResult, AppState};

#[debug_handler(state = AppState)]
pub async fn logout(
    State(identity): State<Identity>,
    session: Session,
) -> AppResult<Redirect> {
    SessionContext::new(session).end(identity.as_ref()).await?;
    Ok(Redirect::to(LOGIN))
}
