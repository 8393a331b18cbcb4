use axum::{debug_handler, extract::State, response::{IntoResponse, Redirect, Response}};
use tower_sessions::Session;

use crate::{
    guard::{Resolution, LOGIN},
    include_res,
    session::SessionContext,
    store::ProfileStore,
    AppResult, AppState,
};

/// Sends each visitor to the home of their role.
#[debug_handler(state = AppState)]
pub async fn index(
    State(profiles): State<ProfileStore>,
    session: Session,
) -> AppResult<Response> {
    let ctx = SessionContext::new(session);

    let response = match ctx.resolve(&profiles).await {
        Resolution::Resolved { profile: Some(profile), .. } => {
            Redirect::to(profile.role.landing()).into_response()
        },
        Resolution::Pending => {
            let page = crate::res::Template::new(include_res!(str, "/pages/loading.html")).with("path", "/").render();
            axum::response::Html(page).into_response()
        },
        Resolution::Anonymous | Resolution::Failed | Resolution::Resolved { profile: None, .. } => {
            Redirect::to(LOGIN).into_response()
        },
    };
    Ok(response)
}
