use axum::{debug_handler, extract::{Multipart, Path, Query, State}, response::{Html, Redirect}};
use serde::Deserialize;

use crate::{
    guard::AdminSession,
    include_res,
    model::{Notice, NoticeCategory},
    res,
    session::{display_name, Notification, SessionContext},
    store::{BlobStore, NoticeRepository},
    student::notice_card,
    views::forms::{NoticeForm, RawForm},
    AppResult, AppState, PortalError,
};

const BACK: &str = "/admin/notices";

#[derive(Deserialize)]
pub(crate) struct NoticesQuery {
    category: Option<String>,
}

fn category_options(selected: NoticeCategory) -> String {
    NoticeCategory::ALL
        .iter()
        .map(|category| format!(
            r#"<option value="{category}"{}>{category}</option>"#,
            if *category == selected { " selected" } else { "" }
        ))
        .collect()
}

fn notice_row(notice: &Notice) -> String {
    res::Template::new(include_res!(str, "/pages/admin_notice_row.html"))
        .with("id", &res::escape(&notice.id))
        .with("title", &res::escape(&notice.title))
        .with("category", notice.category.as_str())
        .with("created_at", &res::date(notice.created_at))
        .with("options", &category_options(notice.category))
        .with("attachment", &res::attachment_link(notice.file_url.as_deref()))
        .with("preview", &notice_card(notice))
        .with("description_raw", &res::escape(&notice.description))
        .render()
}

/// Reports how a write went on the next page.
pub(crate) async fn settle(
    ctx: &SessionContext,
    result: Result<(), PortalError>,
    success: &str,
) -> AppResult<()> {
    let notification = match result {
        Ok(()) => Notification::success(success),
        Err(err @ PortalError::Validation { .. }) => Notification::error("Please fix the form").describe(err.to_string()),
        Err(err) => {
            tracing::warn!(error = %err, "admin write failed");
            Notification::error("Operation Failed").describe(err.to_string())
        },
    };
    ctx.notify(notification).await?;
    Ok(())
}

#[debug_handler(state = AppState)]
pub(crate) async fn notices(
    AdminSession { ctx, profile, .. }: AdminSession,
    State(repo): State<NoticeRepository>,
    Query(NoticesQuery { category }): Query<NoticesQuery>,
) -> AppResult<Html<String>> {
    let filter = category.as_deref().and_then(|c| c.parse::<NoticeCategory>().ok());
    let mut notification = ctx.take_notification().await?;

    let rows = match repo.list(filter, None).await {
        Ok(notices) => notices.iter().map(notice_row).collect::<String>(),
        Err(err) => {
            tracing::warn!(error = %err, "could not load notices");
            notification = Some(Notification::error("Failed to fetch notices"));
            String::new()
        },
    };

    let content = res::Template::new(include_res!(str, "/pages/admin_notices.html"))
        .with("tabs", &crate::student::category_tabs(BACK, filter))
        .with("options", &category_options(NoticeCategory::Academic))
        .with("rows", &rows)
        .render();

    Ok(Html(res::page("Manage Notices", &res::admin_nav(display_name(&profile)), notification, &content)))
}

#[debug_handler(state = AppState)]
pub(crate) async fn create_notice(
    AdminSession { ctx, profile, .. }: AdminSession,
    State(repo): State<NoticeRepository>,
    State(blobs): State<BlobStore>,
    multipart: Multipart,
) -> AppResult<Redirect> {
    let form = RawForm::read(multipart).await?;

    let result = async {
        let new = NoticeForm::validate(&form)?.into_new(&form, &blobs).await?;
        let attachment = new.file_url.clone();
        let saved = repo.create(&profile, new).await.map(|_| ());
        super::discard_on_error(&blobs, attachment, saved).await
    }.await;

    settle(&ctx, result, "Notice created successfully!").await?;
    Ok(Redirect::to(BACK))
}

#[debug_handler(state = AppState)]
pub(crate) async fn update_notice(
    AdminSession { ctx, profile, .. }: AdminSession,
    State(repo): State<NoticeRepository>,
    State(blobs): State<BlobStore>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> AppResult<Redirect> {
    let form = RawForm::read(multipart).await?;

    let result = async {
        let patch = NoticeForm::validate(&form)?.into_patch(&form, &blobs).await?;
        let attachment = patch.file_url.clone();
        let saved = repo.update(&profile, &id, patch).await;
        super::discard_on_error(&blobs, attachment, saved).await
    }.await;

    settle(&ctx, result, "Notice updated successfully!").await?;
    Ok(Redirect::to(BACK))
}

#[debug_handler(state = AppState)]
pub(crate) async fn delete_notice(
    AdminSession { ctx, profile, .. }: AdminSession,
    State(repo): State<NoticeRepository>,
    Path(id): Path<String>,
) -> AppResult<Redirect> {
    let result = repo.delete(&profile, &id).await;
    settle(&ctx, result, "Notice deleted successfully!").await?;
    Ok(Redirect::to(BACK))
}
