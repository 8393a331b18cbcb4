use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::{model::UserIdentity, GetField, PortalError};

use super::{Credentials, IdentityProvider};

const IDENTITY_TOOLKIT: &str = "https://identitytoolkit.googleapis.com/v1";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OobRequest<'a> {
    request_type: &'static str,
    email: &'a str,
}

/// Email/password accounts on Firebase Authentication, through the
/// Identity Toolkit REST API.
#[derive(Clone)]
pub struct FirebaseIdentity {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl FirebaseIdentity {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self, PortalError> {
        Self::with_base_url(IDENTITY_TOOLKIT, api_key, timeout)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, PortalError> {
        let http_client = reqwest::ClientBuilder::new()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            api_key: api_key.into(),
        })
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/accounts:{method}?key={}", self.base_url, self.api_key)
    }

    async fn call<B: Serialize + Sync>(&self, method: &str, body: &B) -> Result<Value, PortalError> {
        let response = self.http_client
            .post(self.endpoint(method))
            .json(body)
            .send()
            .await?;
        let status = response.status();
        let body: Value = response.json().await?;

        if status.is_success() {
            return Ok(body);
        }
        let code = body
            .get_obj_field("error")
            .and_then(|error| error.get_str_field("message"))
            .unwrap_or_else(|_| status.to_string());
        Err(refusal(&code))
    }

    async fn password_call(&self, method: &str, credentials: &Credentials) -> Result<UserIdentity, PortalError> {
        let body = self.call(method, &PasswordRequest {
            email: credentials.email(),
            password: credentials.password(),
            return_secure_token: true,
        }).await?;

        Ok(UserIdentity {
            id: body.get_str_field("localId")?,
            email: body.get_str_field("email").ok(),
        })
    }
}

/// Maps Identity Toolkit error codes onto the messages the login page shows.
fn refusal(code: &str) -> PortalError {
    // codes sometimes carry a suffix, e.g. "WEAK_PASSWORD : Password should be ..."
    let code = code.split(" : ").next().unwrap_or(code).trim();
    match code {
        "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" => {
            PortalError::Auth("Invalid email or password.".to_owned())
        },
        "USER_DISABLED" => PortalError::Auth("This account has been disabled.".to_owned()),
        "EMAIL_EXISTS" => PortalError::Auth("An account with this email already exists.".to_owned()),
        "WEAK_PASSWORD" => PortalError::validation("password", "Password is too weak."),
        "TOO_MANY_ATTEMPTS_TRY_LATER" => PortalError::Network("Too many attempts, try again later.".to_owned()),
        other => PortalError::Upstream(other.to_owned()),
    }
}

#[async_trait]
impl IdentityProvider for FirebaseIdentity {
    async fn sign_in(&self, credentials: &Credentials) -> Result<UserIdentity, PortalError> {
        self.password_call("signInWithPassword", credentials).await
    }

    async fn sign_up(&self, credentials: &Credentials) -> Result<UserIdentity, PortalError> {
        self.password_call("signUp", credentials).await
    }

    async fn sign_out(&self, uid: &str) -> Result<(), PortalError> {
        // the server never holds Firebase tokens, so there is nothing to revoke
        tracing::debug!(%uid, "firebase sign-out");
        Ok(())
    }

    async fn send_password_reset(&self, email: &str) -> Result<(), PortalError> {
        self.call("sendOobCode", &OobRequest { request_type: "PASSWORD_RESET", email }).await?;
        Ok(())
    }
}
