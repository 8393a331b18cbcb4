//! View models behind the student and admin pages.

mod board;
pub mod forms;
mod registration;

pub use board::EventBoard;
pub use registration::{is_registered, CardState, RegistrationCard};
