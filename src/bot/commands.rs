use std::future::Future;
use std::sync::Arc;

use teloxide::payloads::SendMessageSetters;
use teloxide::prelude::Requester;
use teloxide::types::{ChatId, Message};
use teloxide::utils::command::BotCommands;
use teloxide::Bot;
use tracing::{debug, error, info_span, instrument, Instrument};

use super::keyboard::action_keyboard;
use super::session::App;
use super::state::ChatState;
use crate::error::FlowError;
use crate::modal::CancelReason;
use crate::{HandlerResult, UserDialogue};

#[derive(Debug, Clone, BotCommands)]
#[command(rename_rule = "lowercase")]
pub enum Command {
    #[command(description = "display help.")]
    Help,
    #[command(description = "start the bot.")]
    Start,
    #[command(description = "close the open question or stop the quiz.")]
    Cancel,
    #[command(description = "create an account.")]
    Signup,
    #[command(description = "log in.")]
    Login,
    #[command(description = "log out.")]
    Logout,
    #[command(description = "send a password reset email.")]
    ResetPassword,
    #[command(description = "change your password.")]
    Password,
    #[command(description = "show who is logged in.")]
    WhoAmI,
    #[command(description = "create a new quiz.")]
    NewQuiz,
    #[command(description = "list available quizzes.")]
    Quizzes,
    #[command(description = "add a question to a quiz.")]
    AddQuestion,
    #[command(description = "delete a question from a quiz.")]
    DeleteQuestion,
    #[command(description = "take a quiz.")]
    Play,
}

/// Runs a chat flow in the background so the dispatcher keeps delivering the
/// chat's messages while the flow waits on a modal.
pub(crate) fn spawn_flow<F>(bot: Bot, chat_id: ChatId, name: &'static str, flow: F)
where
    F: Future<Output = Result<(), FlowError>> + Send + 'static,
{
    tokio::spawn(
        async move {
            match flow.await {
                Ok(()) => debug!("flow finished"),
                Err(err) if err.is_cancellation() => debug!(%err, "flow cancelled"),
                Err(err) => {
                    error!(%err, "flow failed");
                    if let Err(err) = bot.send_message(chat_id, err.to_string()).await {
                        error!(%err, "failed to report flow error");
                    }
                }
            }
        }
        .instrument(info_span!("flow", flow = name, %chat_id)),
    );
}

pub(crate) async fn help(bot: Bot, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, Command::descriptions().to_string())
        .await?;
    Ok(())
}

pub(crate) async fn start(
    bot: Bot,
    msg: Message,
    dialogue: UserDialogue,
    app: Arc<App>,
) -> HandlerResult {
    let session = app.session(&bot, msg.chat.id);
    // A new session publishes its first auth state from a background task.
    session.auth.initial_auth_state().await;
    let greeting = match session.auth.user() {
        Some(user) => format!("Hi, {}! Please choose what to do:", user.username()),
        None => "Please choose what to do:".to_owned(),
    };
    bot.send_message(msg.chat.id, greeting)
        .reply_markup(action_keyboard(session.auth.user().is_some()))
        .await?;
    dialogue.update(ChatState::Start).await?;
    Ok(())
}

#[instrument(level = "info", skip_all, fields(chat_id = %msg.chat.id))]
pub(crate) async fn cancel(
    bot: Bot,
    dialogue: UserDialogue,
    msg: Message,
    app: Arc<App>,
) -> HandlerResult {
    let session = app.session(&bot, msg.chat.id);
    session.modal.cancel_active(CancelReason::EscapeKeyDown);
    bot.send_message(msg.chat.id, "Cancelled.")
        .reply_markup(action_keyboard(session.auth.user().is_some()))
        .await?;
    dialogue.update(ChatState::Start).await?;
    Ok(())
}

pub(crate) async fn whoami(bot: Bot, msg: Message, app: Arc<App>) -> HandlerResult {
    let session = app.session(&bot, msg.chat.id);
    let text = match session.auth.user() {
        Some(user) => format!("Logged in as {} ({})", user.username(), user.account.email),
        None => "You are not logged in.".to_owned(),
    };
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

pub(crate) async fn logout(bot: Bot, msg: Message, app: Arc<App>) -> HandlerResult {
    let session = app.session(&bot, msg.chat.id);
    session.auth.logout();
    bot.send_message(msg.chat.id, "Logged out.")
        .reply_markup(action_keyboard(false))
        .await?;
    Ok(())
}

pub(crate) async fn quizzes(bot: Bot, msg: Message, app: Arc<App>) -> HandlerResult {
    let quizzes = app.repository().quizzes().await?;
    let text = if quizzes.is_empty() {
        "No available quizzes.".to_owned()
    } else {
        quizzes
            .iter()
            .map(|quiz| format!("• {} (by {})", quiz.title(), quiz.author()))
            .collect::<Vec<_>>()
            .join("\n")
    };
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}
