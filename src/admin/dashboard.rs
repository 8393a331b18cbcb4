use axum::{debug_handler, extract::State, response::Html};

use crate::{
    guard::AdminSession,
    include_res,
    model::Role,
    res,
    session::display_name,
    store::{EventRepository, NoticeRepository, ProfileStore},
    AppResult, AppState,
};

#[debug_handler(state = AppState)]
pub(crate) async fn dashboard(
    AdminSession { ctx, profile, .. }: AdminSession,
    State(notices): State<NoticeRepository>,
    State(events): State<EventRepository>,
    State(profiles): State<ProfileStore>,
) -> AppResult<Html<String>> {
    let notification = ctx.take_notification().await?;

    let content = res::Template::new(include_res!(str, "/pages/admin_dashboard.html"))
        .with("notices", &notices.count().await?.to_string())
        .with("events", &events.count().await?.to_string())
        .with("registrations", &events.registration_total().await?.to_string())
        .with("students", &profiles.count(Role::Student).await?.to_string())
        .render();

    Ok(Html(res::page("Admin Dashboard", &res::admin_nav(display_name(&profile)), notification, &content)))
}
