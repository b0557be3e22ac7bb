pub mod account;
pub mod editor;
pub mod notify;
pub mod runner;

use crate::form::FormResult;

pub use notify::{Notification, NotificationLog, Notifier};

pub const VALIDATION_FAILED: &str = "Form validation failed";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission<T> {
    /// Validation failed; nothing was sent to the backend.
    Invalid(FormResult),
    /// The backend refused; carries the message shown to the user.
    Failed(String),
    Done(T),
}

impl<T> Submission<T> {
    pub fn is_done(&self) -> bool {
        matches!(self, Submission::Done(_))
    }

    pub fn done(self) -> Option<T> {
        match self {
            Submission::Done(value) => Some(value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Home,
    Login,
    VerifyEmail,
}
