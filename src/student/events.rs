use axum::{debug_handler, extract::{Path, State}, response::{Html, Redirect}, Form};
use serde::Deserialize;

use crate::{
    guard::StudentSession,
    include_res,
    model::{Event, RegistrationState},
    res,
    session::{display_name, Notification},
    store::EventRepository,
    views::{EventBoard, RegistrationCard},
    AppResult, AppState, PortalError,
};

#[derive(Deserialize)]
pub(crate) struct ToggleForm {
    /// Registration state the page showed when the button was pressed.
    registered: bool,
}

pub fn event_card(viewer_id: &str, event: &Event) -> String {
    let card = RegistrationCard::for_viewer(viewer_id, event);
    let registered = card.displayed().is_registered();

    res::Template::new(include_res!(str, "/pages/event_card.html"))
        .with("id", &res::escape(&event.id))
        .with("name", &res::escape(&event.name))
        .with("date", &res::date(event.date))
        .with("venue", &res::escape(&event.venue))
        .with("organizer", &res::escape(&event.organizer))
        .with("count", &event.registered_students.len().to_string())
        .with("registered", if registered { "true" } else { "false" })
        .with("button_class", if registered { "outline" } else { "primary" })
        .with("button", if registered { "Registered ✓" } else { "Register" })
        .with("attachment", &res::attachment_link(event.file_url.as_deref()))
        .with("description", &res::markdown(&event.description))
        .render()
}

#[debug_handler(state = AppState)]
pub(crate) async fn events(
    StudentSession { ctx, profile, .. }: StudentSession,
    State(board): State<EventBoard>,
    State(repo): State<EventRepository>,
) -> AppResult<Html<String>> {
    let mut notification = ctx.take_notification().await?;

    let cards = match board.snapshot(&repo).await {
        Ok(events) if events.is_empty() => res::Template::new(include_res!(str, "/pages/empty.html"))
            .with("message", "There are no upcoming events scheduled at the moment.")
            .render(),
        Ok(events) => events.iter().map(|event| event_card(&profile.uid, event)).collect(),
        Err(err) => {
            tracing::warn!(error = %err, "could not load events");
            notification = Some(Notification::error("Failed to fetch events"));
            String::new()
        },
    };

    let content = res::Template::new(include_res!(str, "/pages/events.html")).with("cards", &cards).render();
    Ok(Html(res::page("Events", &res::student_nav(display_name(&profile)), notification, &content)))
}

#[debug_handler(state = AppState)]
pub(crate) async fn toggle_registration(
    StudentSession { ctx, profile, .. }: StudentSession,
    State(repo): State<EventRepository>,
    Path(event_id): Path<String>,
    Form(ToggleForm { registered }): Form<ToggleForm>,
) -> AppResult<Redirect> {
    let mut card = RegistrationCard::new(RegistrationState::from_membership(registered));

    let event_name = match repo.get(&event_id).await {
        Ok(event) => event.name,
        Err(PortalError::NotFound { .. }) => {
            ctx.notify(Notification::error("Registration Failed").describe("This event no longer exists.")).await?;
            return Ok(Redirect::to("/events"));
        },
        Err(err) => return Err(err.into()),
    };

    let notification = match card.toggle(&repo, &profile, &event_id).await {
        Some(Ok(RegistrationState::Registered)) => Notification::success("Registration Successful!")
            .describe(format!("You are now registered for {event_name}.")),
        Some(Ok(RegistrationState::Unregistered)) => Notification::success("Successfully Unregistered")
            .describe(format!("You are no longer registered for {event_name}.")),
        Some(Err(_)) | None => Notification::error("Registration Failed")
            .describe("Could not update your registration."),
    };
    ctx.notify(notification).await?;
    Ok(Redirect::to("/events"))
}
