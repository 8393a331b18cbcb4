mod dashboard;
mod events;
mod notices;

use axum::{routing::{get, post}, Router};

use crate::{store::BlobStore, AppState, PortalError};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard::dashboard))
        .route("/notices", get(notices::notices).post(notices::create_notice))
        .route("/notices/{id}", post(notices::update_notice))
        .route("/notices/{id}/delete", post(notices::delete_notice))
        .route("/events", get(events::events).post(events::create_event))
        .route("/events/{id}", post(events::update_event))
        .route("/events/{id}/delete", post(events::delete_event))
        .route("/events/{id}/participants", get(events::participants))
}

/// Drops a freshly stored attachment when the write it belonged to failed.
async fn discard_on_error(
    blobs: &BlobStore,
    attachment: Option<String>,
    result: Result<(), PortalError>,
) -> Result<(), PortalError> {
    if result.is_err() {
        if let Some(url) = attachment {
            blobs.discard(&url).await;
        }
    }
    result
}
