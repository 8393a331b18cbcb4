mod login;
mod logout;
mod reset;
mod signup;

use axum::{routing::{get, post}, Router};

use crate::AppState;

pub use login::{login, login_page};
pub use logout::logout;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", get(login::login_page).post(login::login))
        .route("/logout", post(logout::logout))
        .route("/password-reset", post(reset::password_reset))
        .route("/signup", get(signup::student_page).post(signup::student_signup))
        .route("/signup/admin", get(signup::admin_page).post(signup::admin_signup))
}
