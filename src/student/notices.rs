use axum::{debug_handler, extract::{Query, State}, response::Html};
use serde::Deserialize;

use crate::{
    guard::StudentSession,
    include_res,
    model::{Notice, NoticeCategory},
    res,
    session::display_name,
    store::NoticeRepository,
    AppResult, AppState,
};

#[derive(Deserialize)]
pub(crate) struct NoticesQuery {
    category: Option<String>,
}

pub fn notice_card(notice: &Notice) -> String {
    res::Template::new(include_res!(str, "/pages/notice_card.html"))
        .with("title", &res::escape(&notice.title))
        .with("category", notice.category.as_str())
        .with("created_at", &res::date(notice.created_at))
        .with("attachment", &res::attachment_link(notice.file_url.as_deref()))
        .with("description", &res::markdown(&notice.description))
        .render()
}

pub(crate) fn category_tabs(base: &str, selected: Option<NoticeCategory>) -> String {
    let mut tabs = format!(
        r#"<a href="{base}" class="tab{}">All</a>"#,
        if selected.is_none() { " active" } else { "" }
    );
    for category in NoticeCategory::ALL {
        tabs += &format!(
            r#"<a href="{base}?category={category}" class="tab{}">{category}</a>"#,
            if selected == Some(category) { " active" } else { "" }
        );
    }
    tabs
}

#[debug_handler(state = AppState)]
pub(crate) async fn notices(
    StudentSession { ctx, profile, .. }: StudentSession,
    State(repo): State<NoticeRepository>,
    Query(NoticesQuery { category }): Query<NoticesQuery>,
) -> AppResult<Html<String>> {
    // unknown categories fall back to the unfiltered list
    let filter = category.as_deref().and_then(|c| c.parse::<NoticeCategory>().ok());

    let mut notification = ctx.take_notification().await?;
    let cards = match repo.list(filter, None).await {
        Ok(notices) if notices.is_empty() => res::Template::new(include_res!(str, "/pages/empty.html"))
            .with("message", "No notices to show.")
            .render(),
        Ok(notices) => notices.iter().map(notice_card).collect(),
        Err(err) => {
            tracing::warn!(error = %err, "could not load notices");
            notification = Some(crate::session::Notification::error("Failed to fetch notices"));
            String::new()
        },
    };

    let content = res::Template::new(include_res!(str, "/pages/notices.html"))
        .with("tabs", &category_tabs("/notices", filter))
        .with("cards", &cards)
        .render();

    Ok(Html(res::page("Notices", &res::student_nav(display_name(&profile)), notification, &content)))
}
