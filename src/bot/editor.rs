use std::sync::Arc;

use teloxide::prelude::Requester;
use teloxide::types::Message;
use teloxide::Bot;
use tracing::info;

use super::commands::spawn_flow;
use super::describe_failures;
use super::session::{App, ChatSession};
use crate::auth::CurrentUser;
use crate::database::quiz::{Quiz, BLANK_OPTIONS};
use crate::database::QuizRepository;
use crate::error::FlowError;
use crate::modal::ModalSpec;
use crate::views::editor::{create_quiz, QuestionEditor};
use crate::views::Submission;
use crate::HandlerResult;

/// Typed into the description prompt to leave it empty.
const NO_DESCRIPTION: &str = "-";

pub(crate) async fn newquiz(bot: Bot, msg: Message, app: Arc<App>) -> HandlerResult {
    let session = app.session(&bot, msg.chat.id);
    let Some(user) = signed_in(&bot, &session).await? else {
        return Ok(());
    };
    let repository = app.repository().clone();
    spawn_flow(
        bot.clone(),
        msg.chat.id,
        "newquiz",
        new_quiz_flow(bot, session, repository, user),
    );
    Ok(())
}

pub(crate) async fn addquestion(bot: Bot, msg: Message, app: Arc<App>) -> HandlerResult {
    let session = app.session(&bot, msg.chat.id);
    if signed_in(&bot, &session).await?.is_none() {
        return Ok(());
    }
    let repository = app.repository().clone();
    spawn_flow(
        bot.clone(),
        msg.chat.id,
        "addquestion",
        add_question_flow(bot, session, repository),
    );
    Ok(())
}

pub(crate) async fn deletequestion(bot: Bot, msg: Message, app: Arc<App>) -> HandlerResult {
    let session = app.session(&bot, msg.chat.id);
    if signed_in(&bot, &session).await?.is_none() {
        return Ok(());
    }
    let repository = app.repository().clone();
    spawn_flow(
        bot.clone(),
        msg.chat.id,
        "deletequestion",
        delete_question_flow(bot, session, repository),
    );
    Ok(())
}

async fn signed_in(
    bot: &Bot,
    session: &ChatSession,
) -> Result<Option<CurrentUser>, teloxide::RequestError> {
    let user = session.auth.user();
    if user.is_none() {
        bot.send_message(session.chat_id, "Please /login first.")
            .await?;
    }
    Ok(user)
}

async fn new_quiz_flow(
    bot: Bot,
    session: Arc<ChatSession>,
    repository: QuizRepository,
    user: CurrentUser,
) -> Result<(), FlowError> {
    let modal = &session.modal;
    let title = modal.prompt(ModalSpec::prompt("New quiz", "Title")).await?;
    let description = modal
        .prompt(ModalSpec::prompt(
            "New quiz",
            format!("Description ({NO_DESCRIPTION} for none)"),
        ))
        .await?;
    let description = match description.trim() {
        NO_DESCRIPTION => "",
        other => other,
    };

    let quiz = Quiz::new(title.trim(), description, user.username());
    match create_quiz(&repository, &*session.notifier, quiz).await {
        Submission::Done(id) => {
            info!(quiz = %id, "quiz created from chat");
            bot.send_message(
                session.chat_id,
                format!("Add questions to '{}' with /addquestion.", title.trim()),
            )
            .await?;
        }
        Submission::Invalid(result) => {
            bot.send_message(session.chat_id, describe_failures(&result))
                .await?;
        }
        Submission::Failed(_) => {}
    }
    Ok(())
}

/// Prompts for a quiz title. `None` once the user was told no such quiz exists.
async fn choose_quiz(
    bot: &Bot,
    session: &ChatSession,
    repository: &QuizRepository,
) -> Result<Option<Quiz>, FlowError> {
    let title = session
        .modal
        .prompt(ModalSpec::prompt("Choose a quiz", "Quiz title"))
        .await?;
    let quiz = repository.find_quiz_by_title(&title).await?;
    if quiz.is_none() {
        bot.send_message(session.chat_id, format!("Quiz with name '{}' not found.", title.trim()))
            .await?;
    }
    Ok(quiz)
}

async fn add_question_flow(
    bot: Bot,
    session: Arc<ChatSession>,
    repository: QuizRepository,
) -> Result<(), FlowError> {
    let Some(quiz) = choose_quiz(&bot, &session, &repository).await? else {
        return Ok(());
    };

    let mut editor = QuestionEditor::new_question(
        repository,
        session.modal.clone(),
        session.notifier.clone(),
        quiz.id(),
    );
    let modal = &session.modal;

    let label = modal
        .prompt(ModalSpec::prompt("New question", "Question"))
        .await?;
    editor.question_mut().set_label(label.trim());
    for idx in 0..BLANK_OPTIONS {
        let option = modal
            .prompt(ModalSpec::prompt("New question", format!("Answer #{}", idx + 1)))
            .await?;
        editor.question_mut().set_option_label(idx, option.trim());
    }
    let right = modal
        .prompt(ModalSpec::prompt(
            "New question",
            format!("Number of the right answer (1-{BLANK_OPTIONS})"),
        ))
        .await?;
    // An unparsable number leaves the right answer unset and fails validation.
    if let Some(idx) = right.trim().parse::<usize>().ok().and_then(|n| n.checked_sub(1)) {
        editor.question_mut().set_right_answer(idx);
    }

    if let Submission::Invalid(result) = editor.submit().await {
        bot.send_message(session.chat_id, describe_failures(&result))
            .await?;
    }
    Ok(())
}

async fn delete_question_flow(
    bot: Bot,
    session: Arc<ChatSession>,
    repository: QuizRepository,
) -> Result<(), FlowError> {
    let Some(quiz) = choose_quiz(&bot, &session, &repository).await? else {
        return Ok(());
    };
    let label = session
        .modal
        .prompt(ModalSpec::prompt("Delete question", "Question"))
        .await?;
    let Some(question) = repository.find_question_by_label(quiz.id(), &label).await? else {
        bot.send_message(
            session.chat_id,
            format!("Question '{}' not found in '{}'.", label.trim(), quiz.title()),
        )
        .await?;
        return Ok(());
    };

    let editor = QuestionEditor::open(
        repository,
        session.modal.clone(),
        session.notifier.clone(),
        quiz.id(),
        question.id(),
    )
    .await?;
    if let Some(mut editor) = editor {
        editor.delete().await;
    }
    Ok(())
}
