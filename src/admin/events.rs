use axum::{debug_handler, extract::{Multipart, Path, State}, response::{Html, Redirect}};

use crate::{
    guard::AdminSession,
    include_res,
    model::{Event, EventOrder},
    res,
    session::{display_name, Notification},
    store::{BlobStore, EventRepository, ProfileStore},
    views::forms::{EventForm, RawForm},
    AppResult, AppState,
};

use super::notices::settle;

const BACK: &str = "/admin/events";

fn event_row(event: &Event) -> String {
    res::Template::new(include_res!(str, "/pages/admin_event_row.html"))
        .with("id", &res::escape(&event.id))
        .with("name", &res::escape(&event.name))
        .with("date", &res::date(event.date))
        .with("date_input", &res::date_input(event.date))
        .with("venue", &res::escape(&event.venue))
        .with("organizer", &res::escape(&event.organizer))
        .with("count", &event.registered_students.len().to_string())
        .with("attachment", &res::attachment_link(event.file_url.as_deref()))
        .with("description_raw", &res::escape(&event.description))
        .render()
}

#[debug_handler(state = AppState)]
pub(crate) async fn events(
    AdminSession { ctx, profile, .. }: AdminSession,
    State(repo): State<EventRepository>,
) -> AppResult<Html<String>> {
    let mut notification = ctx.take_notification().await?;

    let rows = match repo.list(EventOrder::Descending, None).await {
        Ok(events) if events.is_empty() => res::Template::new(include_res!(str, "/pages/empty.html"))
            .with("message", "No events have been created yet.")
            .render(),
        Ok(events) => events.iter().map(event_row).collect(),
        Err(err) => {
            tracing::warn!(error = %err, "could not load events");
            notification = Some(Notification::error("Failed to fetch events"));
            String::new()
        },
    };

    let content = res::Template::new(include_res!(str, "/pages/admin_events.html")).with("rows", &rows).render();
    Ok(Html(res::page("Manage Events", &res::admin_nav(display_name(&profile)), notification, &content)))
}

#[debug_handler(state = AppState)]
pub(crate) async fn create_event(
    AdminSession { ctx, profile, .. }: AdminSession,
    State(repo): State<EventRepository>,
    State(blobs): State<BlobStore>,
    multipart: Multipart,
) -> AppResult<Redirect> {
    let form = RawForm::read(multipart).await?;

    let result = async {
        let new = EventForm::validate(&form)?.into_new(&form, &blobs).await?;
        let attachment = new.file_url.clone();
        let saved = repo.create(&profile, new).await.map(|_| ());
        super::discard_on_error(&blobs, attachment, saved).await
    }.await;

    settle(&ctx, result, "Event created successfully!").await?;
    Ok(Redirect::to(BACK))
}

#[debug_handler(state = AppState)]
pub(crate) async fn update_event(
    AdminSession { ctx, profile, .. }: AdminSession,
    State(repo): State<EventRepository>,
    State(blobs): State<BlobStore>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> AppResult<Redirect> {
    let form = RawForm::read(multipart).await?;

    let result = async {
        let patch = EventForm::validate(&form)?.into_patch(&form, &blobs).await?;
        let attachment = patch.file_url.clone();
        let saved = repo.update(&profile, &id, patch).await;
        super::discard_on_error(&blobs, attachment, saved).await
    }.await;

    settle(&ctx, result, "Event updated successfully!").await?;
    Ok(Redirect::to(BACK))
}

#[debug_handler(state = AppState)]
pub(crate) async fn delete_event(
    AdminSession { ctx, profile, .. }: AdminSession,
    State(repo): State<EventRepository>,
    Path(id): Path<String>,
) -> AppResult<Redirect> {
    let result = repo.delete(&profile, &id).await;
    settle(&ctx, result, "Event deleted successfully!").await?;
    Ok(Redirect::to(BACK))
}

/// Lists who signed up, in registration order. Students whose profile is gone
/// are shown by id.
#[debug_handler(state = AppState)]
pub(crate) async fn participants(
    AdminSession { ctx, profile, .. }: AdminSession,
    State(repo): State<EventRepository>,
    State(profiles): State<ProfileStore>,
    Path(id): Path<String>,
) -> AppResult<Html<String>> {
    let notification = ctx.take_notification().await?;
    let event = repo.get(&id).await?;

    let rows = if event.registered_students.is_empty() {
        r#"<tr><td colspan="3" class="muted">No students have registered yet.</td></tr>"#.to_owned()
    } else {
        profiles
            .names(&event.registered_students)
            .await?
            .into_iter()
            .enumerate()
            .map(|(i, (uid, name))| format!(
                "<tr><td>{}</td><td>{}</td><td><code>{}</code></td></tr>",
                i + 1,
                res::escape(name.as_deref().unwrap_or("Unknown student")),
                res::escape(&uid),
            ))
            .collect()
    };

    let content = res::Template::new(include_res!(str, "/pages/participants.html"))
        .with("name", &res::escape(&event.name))
        .with("date", &res::date(event.date))
        .with("count", &event.registered_students.len().to_string())
        .with("rows", &rows)
        .render();

    Ok(Html(res::page("Participants", &res::admin_nav(display_name(&profile)), notification, &content)))
}
