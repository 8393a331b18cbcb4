pub mod admin;
pub mod auth;
pub mod config;
pub mod error;
pub mod feed;
pub mod guard;
pub mod identity;
pub mod index;
pub mod model;
pub mod res;
pub mod session;
pub mod store;
pub mod student;
pub mod views;

use axum::{extract::FromRef, response::{IntoResponse, Response}, routing::get, Router};
use serde_json::Value;
use sqlx::SqlitePool;
use tower_http::{services::ServeDir, trace::TraceLayer};

pub use error::PortalError;

use crate::{
    feed::ChangeFeed,
    identity::Identity,
    store::{BlobStore, EventRepository, LedgerStrategy, NoticeRepository, ProfileStore},
    views::EventBoard,
};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub identity: Identity,
    pub profiles: ProfileStore,
    pub notices: NoticeRepository,
    pub events: EventRepository,
    pub blobs: BlobStore,
    pub board: EventBoard,
}

impl AppState {
    pub fn new(
        db_pool: SqlitePool,
        identity: Identity,
        blobs: BlobStore,
        strategy: LedgerStrategy,
    ) -> AppState {
        let feed = ChangeFeed::new();
        let board = EventBoard::subscribe(&feed);
        AppState {
            profiles: ProfileStore::new(db_pool.clone()),
            notices: NoticeRepository::new(db_pool.clone(), feed.clone()),
            events: EventRepository::new(db_pool, feed, strategy),
            identity,
            blobs,
            board,
        }
    }
}

/// Builds the full router. Session handling is layered on by the caller so
/// tests can supply their own store.
pub fn app(state: AppState) -> Router {
    let files = ServeDir::new(state.blobs.root());

    Router::new()
        .route("/", get(index::index))
        .merge(auth::router())
        .merge(student::router())
        .nest("/admin", admin::router())
        .nest_service("/files", files)
        .route("/style.css", get(res::stylesheet))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

pub trait GetField {
    fn get_str_field(&self, field: &str) -> Result<String, PortalError>;
    fn get_obj_field(&self, field: &str) -> Result<&Value, PortalError>;
}

impl GetField for serde_json::Value {
    fn get_str_field(&self, field: &str) -> Result<String, PortalError> {
        Ok(
            self.get(field)
            .ok_or_else(|| PortalError::Upstream(format!("expected {field} in {self}")))?
            .as_str()
            .ok_or_else(|| PortalError::Upstream(format!("expected {field} in {self} to be string")))?
            .to_owned()
        )
    }

    fn get_obj_field(&self, field: &str) -> Result<&Value, PortalError> {
        self.get(field)
        .ok_or_else(|| PortalError::Upstream(format!("expected {field} in {self}")))
    }
}

pub type AppResult<T> = Result<T, AppError>;
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Some(err) = self.0.downcast_ref::<PortalError>() {
            tracing::warn!(error = %err, "request failed");
            return (err.status_code(), err.to_string()).into_response();
        }

        tracing::error!(error = %self.0, backtrace = %self.0.backtrace(), "unhandled error");
        (axum::http::StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong.").into_response()
    }
}

impl From<String> for AppError {
    fn from(err: String) -> Self {
        Self(anyhow::Error::msg(err))
    }
}

impl From<&str> for AppError {
    fn from(err: &str) -> Self {
        Self(anyhow::Error::msg(err.to_owned()))
    }
}

macro_rules! apperr_impl {
    ($E:ty) => {
        impl From<$E> for AppError {
            fn from(err: $E) -> Self {
                Self(anyhow::Error::from(err))
            }
        }
    };
}

apperr_impl!(PortalError);
apperr_impl!(serde_json::Error);
apperr_impl!(sqlx::Error);
apperr_impl!(tower_sessions::session::Error);
apperr_impl!(axum::Error);
apperr_impl!(axum::extract::multipart::MultipartError);

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use http_body_util::BodyExt;

    use super::*;

    async fn body(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn unhandled_errors_stay_on_the_server() {
        let response = AppError::from("disk on fire at /var/lib/portal").into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body(response).await, "Something went wrong.");
    }

    #[tokio::test]
    async fn portal_errors_keep_their_status() {
        let response = AppError::from(PortalError::not_found("event", "e1")).into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body(response).await, "event e1 not found");
    }
}
