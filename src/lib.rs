use bot::state::ChatState;
use teloxide::{dispatching::dialogue::InMemStorage, prelude::Dialogue};

pub mod auth;
pub mod bot;
pub mod config;
pub mod database;
pub mod error;
pub mod form;
pub mod logging;
pub mod modal;
pub mod views;

pub type UserDialogue = Dialogue<ChatState, InMemStorage<ChatState>>;
pub type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync + 'static>>;
