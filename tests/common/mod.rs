#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, Response, StatusCode},
    Router,
};
use campus_portal::{
    identity::{Credentials, IdentityProvider, LocalIdentity},
    model::{NewEvent, NewNotice, NoticeCategory, Profile, Role, UserIdentity},
    store::{self, BlobStore, LedgerStrategy},
    AppState, PortalError,
};
use http_body_util::BodyExt;
use sqlx::SqlitePool;
use tempfile::TempDir;
use time::macros::datetime;
use tower::ServiceExt;
use tower_sessions::{MemoryStore, SessionManagerLayer};

/// A throwaway database and blob directory. Dropping it removes both.
pub struct Harness {
    pub dir: TempDir,
    pub db_pool: SqlitePool,
    pub state: AppState,
    pub sign_outs: Arc<Mutex<Vec<String>>>,
}

pub async fn harness(strategy: LedgerStrategy) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("portal.db").display());
    let db_pool = store::connect(&url).await.unwrap();

    let sign_outs = Arc::new(Mutex::new(Vec::new()));
    let identity = Arc::new(RecordingIdentity {
        inner: LocalIdentity::new(db_pool.clone()),
        sign_outs: sign_outs.clone(),
    });
    let blobs = BlobStore::new(dir.path().join("blobs"));

    let state = AppState::new(db_pool.clone(), identity, blobs, strategy);
    Harness { dir, db_pool, state, sign_outs }
}

impl Harness {
    pub async fn profile(&self, uid: &str, role: Role) -> Profile {
        let profile = Profile {
            uid: uid.to_owned(),
            role,
            name: format!("{uid} name"),
            email: Some(format!("{uid}@college.edu")),
        };
        self.state.profiles.create(&profile).await.unwrap();
        profile
    }

    pub async fn event(&self, admin: &Profile, name: &str) -> String {
        self.state
            .events
            .create(admin, NewEvent {
                name: name.to_owned(),
                description: "Everyone is welcome to join.".to_owned(),
                date: datetime!(2030-03-14 09:30 UTC),
                venue: "Main Hall".to_owned(),
                organizer: "Student Council".to_owned(),
                file_url: None,
            })
            .await
            .unwrap()
    }

    pub async fn notice(&self, admin: &Profile, title: &str, category: NoticeCategory) -> String {
        self.state
            .notices
            .create(admin, NewNotice {
                title: title.to_owned(),
                description: "Please read this carefully.".to_owned(),
                category,
                file_url: None,
            })
            .await
            .unwrap()
    }

    pub fn sign_outs(&self) -> Vec<String> {
        self.sign_outs.lock().unwrap().clone()
    }

    /// The full router with an in-memory session store.
    pub fn app(&self) -> Router {
        let session_layer = SessionManagerLayer::new(MemoryStore::default()).with_secure(false);
        campus_portal::app(self.state.clone()).layer(session_layer)
    }
}

/// Local accounts, remembering every sign-out the portal asks for.
pub struct RecordingIdentity {
    inner: LocalIdentity,
    sign_outs: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl IdentityProvider for RecordingIdentity {
    async fn sign_in(&self, credentials: &Credentials) -> Result<UserIdentity, PortalError> {
        self.inner.sign_in(credentials).await
    }

    async fn sign_up(&self, credentials: &Credentials) -> Result<UserIdentity, PortalError> {
        self.inner.sign_up(credentials).await
    }

    async fn sign_out(&self, uid: &str) -> Result<(), PortalError> {
        self.sign_outs.lock().unwrap().push(uid.to_owned());
        self.inner.sign_out(uid).await
    }

    async fn send_password_reset(&self, email: &str) -> Result<(), PortalError> {
        self.inner.send_password_reset(email).await
    }
}

/// A browser stand-in that carries the session cookie between requests.
pub struct Browser {
    app: Router,
    cookie: Option<String>,
}

impl Browser {
    pub fn new(app: Router) -> Self {
        Self { app, cookie: None }
    }

    pub async fn send(&mut self, mut request: Request<Body>) -> Response<Body> {
        if let Some(cookie) = &self.cookie {
            request.headers_mut().insert(header::COOKIE, cookie.parse().unwrap());
        }

        let response = self.app.clone().oneshot(request).await.unwrap();
        if let Some(set) = response.headers().get(header::SET_COOKIE) {
            let pair = set.to_str().unwrap().split(';').next().unwrap().to_owned();
            self.cookie = Some(pair);
        }
        response
    }

    pub async fn get(&mut self, uri: &str) -> Response<Body> {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    pub async fn post_form(&mut self, uri: &str, form: &str) -> Response<Body> {
        self.send(
            Request::post(uri)
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(form.to_owned()))
                .unwrap(),
        )
        .await
    }

    pub async fn post_multipart(&mut self, uri: &str, fields: &[(&str, &str)], file: Option<(&str, &[u8])>) -> Response<Body> {
        const BOUNDARY: &str = "portal-test-boundary";
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n").as_bytes(),
            );
        }
        if let Some((filename, bytes)) = file {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
                     Content-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        self.send(
            Request::post(uri)
                .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
                .body(Body::from(body))
                .unwrap(),
        )
        .await
    }
}

pub fn location(response: &Response<Body>) -> &str {
    assert_eq!(response.status(), StatusCode::SEE_OTHER, "expected a redirect");
    response.headers().get(header::LOCATION).unwrap().to_str().unwrap()
}

pub async fn text(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}
