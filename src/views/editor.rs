use std::sync::Arc;

use tracing::{debug, instrument, warn};

use super::{Notification, Notifier, Submission, VALIDATION_FAILED};
use crate::database::quiz::{Question, Quiz};
use crate::database::{QuizRepository, StoreResult, Subscription};
use crate::form::{required, FieldRules, Form, FormResult, Ruleset};
use crate::modal::{ModalCoordinator, ModalSpec, Severity};

pub fn question_rules() -> Ruleset {
    FieldRules::new()
        .field("label", required())
        .field("options", FieldRules::new().field("label", required()))
        .field("rightAnswer", required())
        .into()
}

pub fn quiz_rules() -> Ruleset {
    FieldRules::new()
        .field("title", required())
        .field("author", required())
        .into()
}

pub fn delete_question_dialog() -> ModalSpec {
    ModalSpec::dialog("Delete question?")
        .message("Data will be lost")
        .severity(Severity::Error)
}

pub struct QuestionEditor {
    repository: QuizRepository,
    modal: ModalCoordinator,
    notifier: Arc<dyn Notifier>,
    quiz_id: String,
    question: Question,
    stored: Option<Subscription>,
    edited: bool,
    form: Form,
}

impl QuestionEditor {
    /// A blank question that is stored under a fresh id on first submit.
    pub fn new_question(
        repository: QuizRepository,
        modal: ModalCoordinator,
        notifier: Arc<dyn Notifier>,
        quiz_id: impl Into<String>,
    ) -> Self {
        Self::with_question(repository, modal, notifier, quiz_id.into(), Question::blank())
    }

    pub async fn open(
        repository: QuizRepository,
        modal: ModalCoordinator,
        notifier: Arc<dyn Notifier>,
        quiz_id: impl Into<String>,
        question_id: &str,
    ) -> StoreResult<Option<Self>> {
        let quiz_id = quiz_id.into();
        let stored = repository.watch_question(&quiz_id, question_id).await?;
        let Some(question) = repository.question(&quiz_id, question_id).await? else {
            return Ok(None);
        };
        let mut editor = Self::with_question(repository, modal, notifier, quiz_id, question);
        editor.stored = Some(stored);
        Ok(Some(editor))
    }

    fn with_question(
        repository: QuizRepository,
        modal: ModalCoordinator,
        notifier: Arc<dyn Notifier>,
        quiz_id: String,
        question: Question,
    ) -> Self {
        Self {
            repository,
            modal,
            notifier,
            quiz_id,
            question,
            stored: None,
            edited: false,
            form: Form::new(question_rules()),
        }
    }

    pub fn question(&self) -> &Question {
        &self.question
    }

    pub fn question_mut(&mut self) -> &mut Question {
        self.edited = true;
        &mut self.question
    }

    /// Takes over changes stored since the question was loaded. Unsaved local
    /// edits win over them. A question removed from the store becomes new again.
    /// `true` when the question changed.
    pub fn sync(&mut self) -> bool {
        let Some(stored) = self.stored.as_mut() else {
            return false;
        };
        if !stored.catch_up() {
            return false;
        }
        match stored.current().cloned() {
            None => {
                debug!(question = %self.question.id(), "question removed from the store");
                self.question.set_id(String::new());
                self.stored = None;
                true
            }
            Some(_) if self.edited => {
                debug!(question = %self.question.id(), "keeping local edits over stored change");
                false
            }
            Some(value) => match serde_json::from_value::<Question>(value) {
                Ok(mut fresh) => {
                    fresh.set_id(self.question.id());
                    self.question = fresh;
                    true
                }
                Err(err) => {
                    warn!(error = %err, "ignoring malformed stored question");
                    false
                }
            },
        }
    }

    pub fn form(&self) -> Option<&FormResult> {
        self.form.form()
    }

    pub fn is_new(&self) -> bool {
        self.question.id().is_empty()
    }

    #[instrument(level = "info", skip(self), fields(quiz = %self.quiz_id, question = %self.question.id()))]
    pub async fn submit(&mut self) -> Submission<String> {
        self.sync();
        let result = self.form.validate_fields(&self.question);
        if !result.is_valid() {
            self.notifier
                .notify(Notification::error(VALIDATION_FAILED))
                .await;
            return Submission::Invalid(result);
        }

        match self
            .repository
            .save_question(&self.quiz_id, self.question.clone())
            .await
        {
            Ok(id) => {
                self.question.set_id(id.clone());
                self.edited = false;
                match self.stored.as_mut() {
                    Some(stored) => {
                        stored.catch_up();
                    }
                    None => match self.repository.watch_question(&self.quiz_id, &id).await {
                        Ok(stored) => self.stored = Some(stored),
                        Err(err) => warn!(error = %err, "saved question is not followed"),
                    },
                }
                self.notifier
                    .notify(Notification::success("Question saved"))
                    .await;
                Submission::Done(id)
            }
            Err(err) => {
                warn!(error = %err, "question not saved");
                let message = err.to_string();
                self.notifier.notify(Notification::error(message.clone())).await;
                Submission::Failed(message)
            }
        }
    }

    /// Asks for confirmation, then removes the question. `true` once removed.
    /// A question that was never stored has nothing to delete.
    #[instrument(level = "info", skip(self), fields(quiz = %self.quiz_id, question = %self.question.id()))]
    pub async fn delete(&mut self) -> bool {
        self.sync();
        if self.is_new() {
            return false;
        }
        if let Err(err) = self.modal.dialog(delete_question_dialog()).await {
            debug!(reason = ?err.reason(), "question kept");
            return false;
        }

        match self
            .repository
            .delete_question(&self.quiz_id, self.question.id())
            .await
        {
            Ok(()) => {
                self.notifier
                    .notify(Notification::success("Question deleted"))
                    .await;
                true
            }
            Err(err) => {
                warn!(error = %err, "question not deleted");
                self.notifier.notify(Notification::error(err.to_string())).await;
                false
            }
        }
    }
}

#[instrument(level = "info", skip_all, fields(title = quiz.title()))]
pub async fn create_quiz(
    repository: &QuizRepository,
    notifier: &dyn Notifier,
    quiz: Quiz,
) -> Submission<String> {
    let result = Form::new(quiz_rules()).validate_fields(&quiz);
    if !result.is_valid() {
        notifier
            .notify(Notification::error(VALIDATION_FAILED))
            .await;
        return Submission::Invalid(result);
    }

    match repository.create_quiz(quiz).await {
        Ok(id) => {
            notifier.notify(Notification::success("Quiz created")).await;
            Submission::Done(id)
        }
        Err(err) => {
            let message = err.to_string();
            notifier.notify(Notification::error(message.clone())).await;
            Submission::Failed(message)
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::form::validate;

    #[test]
    fn blank_question_fails_every_field() {
        let value = serde_json::to_value(Question::blank()).unwrap();
        let result = validate(&question_rules(), &value);

        assert!(!result.is_valid());
        assert!(result.failed("label", "required"));
        assert!(result.failed("rightAnswer", "required"));
        for idx in 0..4 {
            assert!(result.failed(&format!("options.{idx}.label"), "required"));
        }
    }

    #[test]
    fn only_missing_option_is_reported() {
        let data = json!({
            "label": "Capital of France?",
            "options": [{ "label": "Paris" }, { "label": "" }],
            "rightAnswer": "0"
        });
        let result = validate(&question_rules(), &data);
        assert!(!result.failed("options.0.label", "required"));
        assert!(result.failed("options.1.label", "required"));
        assert!(!result.failed("label", "required"));
    }

    #[test]
    fn quiz_needs_title_and_author() {
        let value = serde_json::to_value(Quiz::new("", "", "kim")).unwrap();
        let result = validate(&quiz_rules(), &value);
        assert!(result.failed("title", "required"));
        assert!(!result.failed("author", "required"));
    }
}
