mod dashboard;
mod events;
mod notices;

use axum::{routing::{get, post}, Router};

use crate::AppState;

pub use events::event_card;
pub use notices::notice_card;
pub(crate) use notices::category_tabs;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard::dashboard))
        .route("/notices", get(notices::notices))
        .route("/events", get(events::events))
        .route("/events/{id}/registration", post(events::toggle_registration))
}
