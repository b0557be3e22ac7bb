use std::sync::Arc;

use teloxide::payloads::SendMessageSetters;
use teloxide::prelude::Requester;
use teloxide::types::Message;
use teloxide::Bot;

use super::commands::spawn_flow;
use super::keyboard::action_keyboard;
use super::session::{App, ChatSession};
use super::describe_failures;
use crate::auth::Signup;
use crate::error::FlowError;
use crate::modal::ModalSpec;
use crate::views::account::{
    change_password, reset_password, LoginForm, LoginView, SignupView,
};
use crate::views::{Route, Submission};
use crate::HandlerResult;

pub(crate) async fn signup(bot: Bot, msg: Message, app: Arc<App>) -> HandlerResult {
    let session = app.session(&bot, msg.chat.id);
    spawn_flow(bot.clone(), msg.chat.id, "signup", signup_flow(bot, session));
    Ok(())
}

pub(crate) async fn login(bot: Bot, msg: Message, app: Arc<App>) -> HandlerResult {
    let session = app.session(&bot, msg.chat.id);
    spawn_flow(bot.clone(), msg.chat.id, "login", login_flow(bot, session));
    Ok(())
}

pub(crate) async fn resetpassword(bot: Bot, msg: Message, app: Arc<App>) -> HandlerResult {
    let session = app.session(&bot, msg.chat.id);
    spawn_flow(bot.clone(), msg.chat.id, "resetpassword", async move {
        reset_password(&session.auth, &session.modal, &*session.notifier).await?;
        Ok(())
    });
    Ok(())
}

pub(crate) async fn password(bot: Bot, msg: Message, app: Arc<App>) -> HandlerResult {
    let session = app.session(&bot, msg.chat.id);
    if session.auth.user().is_none() {
        bot.send_message(msg.chat.id, "Please /login first.").await?;
        return Ok(());
    }
    spawn_flow(bot.clone(), msg.chat.id, "password", async move {
        change_password(&session.auth, &session.modal, &*session.notifier).await?;
        Ok(())
    });
    Ok(())
}

async fn signup_flow(bot: Bot, session: Arc<ChatSession>) -> Result<(), FlowError> {
    let modal = &session.modal;
    let data = Signup {
        username: modal.prompt(ModalSpec::prompt("Sign up", "Username")).await?,
        email: modal.prompt(ModalSpec::prompt("Sign up", "Email")).await?,
        password: modal.prompt(ModalSpec::prompt("Sign up", "Password")).await?,
    };

    let mut view = SignupView::new(
        session.auth.clone(),
        session.modal.clone(),
        session.notifier.clone(),
    );
    match view.submit(&data).await {
        Submission::Invalid(result) => {
            bot.send_message(session.chat_id, describe_failures(&result))
                .await?;
        }
        Submission::Done(Route::Login) => {
            bot.send_message(session.chat_id, "Once verified, log in with /login.")
                .reply_markup(action_keyboard(false))
                .await?;
        }
        Submission::Failed(_) | Submission::Done(_) => {}
    }
    Ok(())
}

async fn login_flow(bot: Bot, session: Arc<ChatSession>) -> Result<(), FlowError> {
    let modal = &session.modal;
    let data = LoginForm {
        email: modal.prompt(ModalSpec::prompt("Log in", "Email")).await?,
        password: modal.prompt(ModalSpec::prompt("Log in", "Password")).await?,
    };

    let mut view = LoginView::new(session.auth.clone(), session.notifier.clone());
    match view.submit(&data).await {
        Submission::Invalid(result) => {
            bot.send_message(session.chat_id, describe_failures(&result))
                .await?;
        }
        Submission::Done(Route::Home) => {
            bot.send_message(session.chat_id, "Welcome! Please choose what to do:")
                .reply_markup(action_keyboard(true))
                .await?;
        }
        Submission::Done(Route::VerifyEmail) => {
            session.auth.resend_email_verification().await?;
            bot.send_message(
                session.chat_id,
                "We sent the verification link again. Log in once your email is verified.",
            )
            .await?;
        }
        Submission::Failed(_) | Submission::Done(Route::Login) => {}
    }
    Ok(())
}
