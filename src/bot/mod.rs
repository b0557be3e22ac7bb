//! Telegram front-end. Each chat gets its own modal coordinator, rendered as
//! messages with reply keyboards.

pub mod account;
pub mod commands;
pub mod editor;
pub mod keyboard;
pub mod runner;
pub mod session;
pub mod state;

use std::sync::Arc;

use teloxide::dispatching::dialogue::{self, InMemStorage};
use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::dptree;
use teloxide::prelude::Requester;
use teloxide::types::{Message, Update};
use teloxide::Bot;
use tracing::{debug, info, instrument};

use crate::form::{FieldErrors, FormResult};
use crate::modal::{ActionType, CancelReason, ModalKind, Settlement};
use crate::{HandlerResult, UserDialogue};
use commands::Command;
use keyboard::{
    ADD_QUESTION, DELETE_QUESTION, LIST_QUIZZES, LOGIN, LOGOUT, NEW_QUIZ, SIGNUP, TAKE_QUIZ,
};
use session::App;
use state::ChatState;

pub use session::ChatSession;

pub fn schema() -> UpdateHandler<Box<dyn std::error::Error + Send + Sync + 'static>> {
    use dptree::case;

    let command_handler = teloxide::filter_command::<Command, _>()
        .branch(case![Command::Help].endpoint(commands::help))
        .branch(case![Command::Start].endpoint(commands::start))
        .branch(case![Command::Cancel].endpoint(commands::cancel))
        .branch(case![Command::Signup].endpoint(account::signup))
        .branch(case![Command::Login].endpoint(account::login))
        .branch(case![Command::Logout].endpoint(commands::logout))
        .branch(case![Command::ResetPassword].endpoint(account::resetpassword))
        .branch(case![Command::Password].endpoint(account::password))
        .branch(case![Command::WhoAmI].endpoint(commands::whoami))
        .branch(case![Command::NewQuiz].endpoint(editor::newquiz))
        .branch(case![Command::Quizzes].endpoint(commands::quizzes))
        .branch(case![Command::AddQuestion].endpoint(editor::addquestion))
        .branch(case![Command::DeleteQuestion].endpoint(editor::deletequestion))
        .branch(case![Command::Play].endpoint(runner::play));

    let handler = Update::filter_message()
        .branch(command_handler)
        .branch(dptree::filter(has_active_modal).endpoint(modal_input))
        .branch(case![ChatState::Start].endpoint(choose_what_to_do))
        .endpoint(invalid_state);

    let callback_handler = Update::filter_callback_query()
        .branch(case![ChatState::Playing { run }].endpoint(runner::take_answer));

    dialogue::enter::<Update, InMemStorage<ChatState>, ChatState, _>()
        .branch(handler)
        .branch(callback_handler)
}

fn has_active_modal(msg: Message, app: Arc<App>) -> bool {
    app.has_active_modal(msg.chat.id)
}

#[instrument(level = "debug", skip_all, fields(chat_id = %msg.chat.id))]
async fn modal_input(bot: Bot, msg: Message, app: Arc<App>) -> HandlerResult {
    let session = app.session(&bot, msg.chat.id);
    let Some(active) = session.modal.active() else {
        return Ok(());
    };
    let request = &active.request;
    let text = msg.text().unwrap_or_default();

    let settlement = match (request.action_for_label(text), request.kind()) {
        (Some(action), _) if action.kind == ActionType::Cancel => {
            session.modal.cancel(request.id(), CancelReason::CancelButtonClick)
        }
        (Some(action), ModalKind::Dialog) => session.modal.act(request.id(), action.kind, None),
        (_, ModalKind::Prompt) => session.modal.confirm(request.id(), Some(text)),
        (None, ModalKind::Dialog) => {
            let labels: Vec<&str> = request.actions().iter().map(|a| a.label.as_str()).collect();
            bot.send_message(msg.chat.id, format!("Please choose one of: {}", labels.join(", ")))
                .await?;
            return Ok(());
        }
    };
    debug!(?settlement, "modal input handled");
    if settlement == Settlement::Stale {
        info!("reply arrived after the modal closed");
    }
    Ok(())
}

async fn choose_what_to_do(
    bot: Bot,
    msg: Message,
    dialogue: UserDialogue,
    app: Arc<App>,
) -> HandlerResult {
    match msg.text() {
        Some(TAKE_QUIZ) => runner::play(bot, msg, dialogue, app).await,
        Some(LIST_QUIZZES) => commands::quizzes(bot, msg, app).await,
        Some(NEW_QUIZ) => editor::newquiz(bot, msg, app).await,
        Some(ADD_QUESTION) => editor::addquestion(bot, msg, app).await,
        Some(DELETE_QUESTION) => editor::deletequestion(bot, msg, app).await,
        Some(LOGIN) => account::login(bot, msg, app).await,
        Some(SIGNUP) => account::signup(bot, msg, app).await,
        Some(LOGOUT) => commands::logout(bot, msg, app).await,
        _ => invalid_state(bot, msg).await,
    }
}

#[instrument(level = "info", skip_all, fields(chat_id = %msg.chat.id))]
async fn invalid_state(bot: Bot, msg: Message) -> HandlerResult {
    info!(text = ?msg.text(), "invalid input");
    bot.send_message(
        msg.chat.id,
        "Unable to handle the message. Enter /help to see usages.",
    )
    .await?;
    Ok(())
}

pub(crate) fn describe_failures(result: &FormResult) -> String {
    let mut lines = Vec::new();
    collect_failures(result.errors(), String::new(), &mut lines);
    if lines.is_empty() {
        return "Form validation failed".to_owned();
    }
    format!("Please fix:\n{}", lines.join("\n"))
}

fn collect_failures(errors: &FieldErrors, path: String, lines: &mut Vec<String>) {
    let child = |key: &str| {
        if path.is_empty() {
            key.to_owned()
        } else {
            format!("{path}.{key}")
        }
    };
    match errors {
        FieldErrors::Rules(_) => {
            for rule in errors.failed_rules() {
                lines.push(format!("{path}: {rule}"));
            }
        }
        FieldErrors::Fields(fields) => {
            for (name, nested) in fields {
                collect_failures(nested, child(name), lines);
            }
        }
        FieldErrors::Items(items) => {
            for (idx, nested) in items.iter().enumerate() {
                collect_failures(nested, child(&(idx + 1).to_string()), lines);
            }
        }
    }
}
