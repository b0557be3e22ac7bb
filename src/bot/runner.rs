use std::sync::Arc;

use teloxide::dispatching::dialogue::GetChatId;
use teloxide::payloads::SendMessageSetters;
use teloxide::prelude::Requester;
use teloxide::types::{CallbackQuery, ChatId, Message, ReplyMarkup};
use teloxide::Bot;
use tracing::{debug, info, instrument};

use super::commands::spawn_flow;
use super::keyboard::{action_keyboard, answers_keyboard, parse_answer};
use super::session::{App, ChatSession};
use super::state::ChatState;
use crate::database::QuizRepository;
use crate::error::FlowError;
use crate::modal::ModalSpec;
use crate::views::runner::QuizRun;
use crate::{HandlerResult, UserDialogue};

pub(crate) async fn play(
    bot: Bot,
    msg: Message,
    dialogue: UserDialogue,
    app: Arc<App>,
) -> HandlerResult {
    let session = app.session(&bot, msg.chat.id);
    let repository = app.repository().clone();
    spawn_flow(
        bot.clone(),
        msg.chat.id,
        "play",
        play_flow(bot, session, repository, dialogue),
    );
    Ok(())
}

async fn play_flow(
    bot: Bot,
    session: Arc<ChatSession>,
    repository: QuizRepository,
    dialogue: UserDialogue,
) -> Result<(), FlowError> {
    let title = session
        .modal
        .prompt(ModalSpec::prompt("Take a quiz", "Quiz title"))
        .await?;
    let Some(quiz) = repository.find_quiz_by_title(&title).await? else {
        bot.send_message(session.chat_id, format!("Quiz with name '{}' not found.", title.trim()))
            .await?;
        return Ok(());
    };

    bot.send_message(session.chat_id, quiz.to_string())
        .reply_markup(ReplyMarkup::kb_remove())
        .await?;
    let Some(run) = QuizRun::start(quiz) else {
        bot.send_message(session.chat_id, "Sorry, no questions for that quiz available.")
            .await?;
        return Ok(());
    };

    info!(quiz = run.quiz().title(), total = run.total(), "quiz started");
    dialogue
        .update(ChatState::Playing { run: run.clone() })
        .await?;
    ask(&bot, session.chat_id, &run).await?;
    Ok(())
}

async fn ask(bot: &Bot, chat_id: ChatId, run: &QuizRun) -> Result<(), teloxide::RequestError> {
    if let Some(question) = run.current() {
        bot.send_message(
            chat_id,
            format!("Question #{}/{}\n{}", run.number(), run.total(), question.label()),
        )
        .reply_markup(answers_keyboard(run.position(), question))
        .await?;
    }
    Ok(())
}

#[instrument(level = "info", skip_all, fields(quiz = run.quiz().title()))]
pub(crate) async fn take_answer(
    bot: Bot,
    dialogue: UserDialogue,
    q: CallbackQuery,
    mut run: QuizRun,
    app: Arc<App>,
) -> HandlerResult {
    bot.answer_callback_query(&q.id).await?;
    let Some(chat_id) = q.chat_id() else {
        return Ok(());
    };

    let Some((position, option)) = q.data.as_deref().and_then(parse_answer) else {
        return Ok(());
    };
    let Some(right) = run.answer(position, option) else {
        debug!(position, option, "ignoring answer for another question");
        return Ok(());
    };
    let label = run
        .current()
        .and_then(|question| question.options().get(option))
        .map(|option| option.label.clone())
        .unwrap_or_default();
    let verdict = if right {
        format!("Given answer {label}. Answer is correct.✅")
    } else {
        format!("Given answer {label}. Answer is incorrect.❌")
    };

    match q.message.as_ref().and_then(|message| message.regular_message()) {
        Some(message) => {
            let text = message.text().unwrap_or_default();
            bot.edit_message_text(chat_id, message.id, format!("{text}\n{verdict}"))
                .await?;
        }
        None => {
            bot.send_message(chat_id, verdict).await?;
        }
    }

    if run.advance() {
        ask(&bot, chat_id, &run).await?;
        dialogue.update(ChatState::Playing { run }).await?;
        return Ok(());
    }

    info!(score = run.score(), total = run.total(), "quiz completed");
    bot.send_message(
        chat_id,
        format!(
            "Congratulations! You completed the quiz!\nYour result is {}/{}",
            run.score(),
            run.total()
        ),
    )
    .reply_markup(action_keyboard(app.session(&bot, chat_id).auth.user().is_some()))
    .await?;
    dialogue.update(ChatState::Start).await?;
    Ok(())
}
