use teloxide::types::{
    InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup, ReplyMarkup,
};

use crate::database::quiz::Question;
use crate::modal::{ActionType, ModalKind, ModalRequest};

pub(crate) const TAKE_QUIZ: &str = "Take a quiz📝";
pub(crate) const LIST_QUIZZES: &str = "Browse quizzes📚";
pub(crate) const NEW_QUIZ: &str = "Create a new quiz🏗️";
pub(crate) const ADD_QUESTION: &str = "Add a question✏️";
pub(crate) const DELETE_QUESTION: &str = "Delete a question🗑️";
pub(crate) const LOGIN: &str = "Log in🔑";
pub(crate) const SIGNUP: &str = "Sign up📝";
pub(crate) const LOGOUT: &str = "Log out🚪";

/// One button per action label. Prompts take free text, so only their
/// cancel actions become buttons.
pub(crate) fn modal_markup(request: &ModalRequest) -> ReplyMarkup {
    let buttons: Vec<KeyboardButton> = request
        .actions()
        .iter()
        .filter(|action| request.kind() == ModalKind::Dialog || action.kind == ActionType::Cancel)
        .map(|action| KeyboardButton::new(action.label.clone()))
        .collect();

    if buttons.is_empty() {
        return ReplyMarkup::kb_remove();
    }
    ReplyMarkup::Keyboard(KeyboardMarkup::new(vec![buttons]))
}

/// Inline answer buttons; the callback data is `{position}:{option}`.
pub(crate) fn answers_keyboard(position: usize, question: &Question) -> InlineKeyboardMarkup {
    let keyboard: Vec<Vec<InlineKeyboardButton>> = question
        .options()
        .iter()
        .enumerate()
        .map(|(idx, option)| {
            vec![InlineKeyboardButton::callback(
                option.label.clone(),
                format!("{position}:{idx}"),
            )]
        })
        .collect();

    InlineKeyboardMarkup::new(keyboard)
}

pub(crate) fn parse_answer(data: &str) -> Option<(usize, usize)> {
    let (position, option) = data.split_once(':')?;
    Some((position.parse().ok()?, option.parse().ok()?))
}

pub(crate) fn action_keyboard(signed_in: bool) -> KeyboardMarkup {
    let mut keyboard = vec![vec![
        KeyboardButton::new(TAKE_QUIZ),
        KeyboardButton::new(LIST_QUIZZES),
    ]];

    if signed_in {
        keyboard.push(vec![KeyboardButton::new(NEW_QUIZ)]);
        keyboard.push(vec![
            KeyboardButton::new(ADD_QUESTION),
            KeyboardButton::new(DELETE_QUESTION),
        ]);
        keyboard.push(vec![KeyboardButton::new(LOGOUT)]);
    } else {
        keyboard.push(vec![KeyboardButton::new(LOGIN), KeyboardButton::new(SIGNUP)]);
    }

    KeyboardMarkup::new(keyboard)
}

#[cfg(test)]
mod tests {
    use teloxide::types::InlineKeyboardButtonKind;

    use super::*;
    use crate::modal::{ModalAction, ModalSpec};

    fn labels(markup: ReplyMarkup) -> Vec<String> {
        match markup {
            ReplyMarkup::Keyboard(keyboard) => keyboard
                .keyboard
                .into_iter()
                .flatten()
                .map(|button| button.text)
                .collect(),
            _ => Vec::new(),
        }
    }

    #[test]
    fn dialog_shows_every_action() {
        let request = ModalRequest::from_spec(ModalSpec::dialog("Delete question?"));
        assert_eq!(labels(modal_markup(&request)), vec!["Cancel", "Confirm"]);
    }

    #[test]
    fn prompt_shows_only_cancel_actions() {
        let request = ModalRequest::from_spec(ModalSpec::prompt("New quiz", "Title"));
        assert_eq!(labels(modal_markup(&request)), vec!["Cancel"]);

        let confirm_only = ModalRequest::from_spec(
            ModalSpec::prompt("New quiz", "Title").actions(vec![ModalAction::confirm("Save")]),
        );
        assert!(matches!(modal_markup(&confirm_only), ReplyMarkup::KeyboardRemove(_)));
    }

    #[test]
    fn answer_buttons_carry_question_position_and_option() {
        let mut question = Question::blank();
        question.set_option_label(2, "Lima");
        let markup = answers_keyboard(3, &question);
        assert_eq!(markup.inline_keyboard.len(), 4);

        let button = &markup.inline_keyboard[2][0];
        assert_eq!(button.text, "Lima");
        let InlineKeyboardButtonKind::CallbackData(data) = &button.kind else {
            panic!("answer buttons are callback buttons");
        };
        assert_eq!(parse_answer(data), Some((3, 2)));
    }

    #[test]
    fn malformed_answer_data_is_rejected() {
        assert_eq!(parse_answer("2"), None);
        assert_eq!(parse_answer("x:1"), None);
        assert_eq!(parse_answer("1:"), None);
    }
}
