use axum::{debug_handler, extract::State, response::Html};
use futures_util::future::try_join;

use crate::{
    guard::StudentSession,
    include_res,
    model::EventOrder,
    res,
    session::{display_name, Notification},
    store::{EventRepository, NoticeRepository},
    AppResult, AppState,
};

use super::{event_card, notice_card};

const RECENT: u32 = 3;

#[debug_handler(state = AppState)]
pub(crate) async fn dashboard(
    StudentSession { ctx, profile, .. }: StudentSession,
    State(notices): State<NoticeRepository>,
    State(events): State<EventRepository>,
) -> AppResult<Html<String>> {
    let mut notification = ctx.take_notification().await?;

    let (notice_cards, event_cards) = match try_join(
        notices.list(None, Some(RECENT)),
        events.list(EventOrder::Ascending, Some(RECENT)),
    ).await {
        Ok((notices, events)) => (
            notices.iter().map(notice_card).collect::<String>(),
            events.iter().map(|event| event_card(&profile.uid, event)).collect::<String>(),
        ),
        Err(err) => {
            tracing::warn!(error = %err, "could not load dashboard");
            notification = Some(Notification::error("Failed to load the dashboard"));
            (String::new(), String::new())
        },
    };

    let content = res::Template::new(include_res!(str, "/pages/student_dashboard.html"))
        .with("name", &res::escape(display_name(&profile)))
        .with("notices", &notice_cards)
        .with("events", &event_cards)
        .render();

    Ok(Html(res::page("Dashboard", &res::student_nav(display_name(&profile)), notification, &content)))
}
