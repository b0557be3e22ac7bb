use std::fmt;

use serde::{Deserialize, Serialize};

pub const BLANK_OPTIONS: usize = 4;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    #[serde(default)]
    id: String,
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    author: String,
    #[serde(skip)]
    questions: Vec<Question>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    #[serde(default)]
    id: String,
    label: String,
    #[serde(default)]
    options: Vec<QuestionOption>,
    #[serde(default)]
    right_answer: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QuestionOption {
    pub label: String,
    #[serde(default)]
    pub right: bool,
}

impl fmt::Display for Quiz {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.title)?;
        if !self.description.is_empty() {
            writeln!(f, "{}", self.description)?;
        }
        write!(f, "By {}\nQuestions: {}", self.author, self.questions.len())?;
        for question in &self.questions {
            write!(f, "\n\n{}", question)?;
        }
        Ok(())
    }
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label)?;
        for (i, option) in self.options.iter().enumerate() {
            write!(f, "\n{}) {}", i + 1, option)?;
        }
        Ok(())
    }
}

impl fmt::Display for QuestionOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label, if self.right { 'V' } else { 'X' })
    }
}

impl Quiz {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        author: impl Into<String>,
    ) -> Self {
        Self {
            id: String::new(),
            title: title.into(),
            description: description.into(),
            author: author.into(),
            questions: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn add_question(&mut self, question: Question) {
        self.questions.push(question);
    }
}

impl Question {
    pub fn blank() -> Self {
        Self {
            id: String::new(),
            label: String::new(),
            options: vec![QuestionOption::default(); BLANK_OPTIONS],
            right_answer: String::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = label.into();
    }

    pub fn options(&self) -> &[QuestionOption] {
        &self.options
    }

    pub fn set_option_label(&mut self, index: usize, label: impl Into<String>) -> bool {
        match self.options.get_mut(index) {
            Some(option) => {
                option.label = label.into();
                true
            }
            None => false,
        }
    }

    /// Marks exactly one option as right. Returns false when `index` is out of range.
    pub fn set_right_answer(&mut self, index: usize) -> bool {
        if index >= self.options.len() {
            return false;
        }
        for (i, option) in self.options.iter_mut().enumerate() {
            option.right = i == index;
        }
        self.right_answer = index.to_string();
        true
    }

    pub fn right_answer(&self) -> &str {
        &self.right_answer
    }

    pub fn right_option(&self) -> Option<usize> {
        self.options.iter().position(|option| option.right)
    }

    pub fn is_right(&self, index: usize) -> bool {
        self.options.get(index).is_some_and(|option| option.right)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_question_has_four_empty_options() {
        let question = Question::blank();
        assert_eq!(question.options().len(), BLANK_OPTIONS);
        assert!(question.options().iter().all(|o| o.label.is_empty() && !o.right));
        assert_eq!(question.right_option(), None);
    }

    #[test]
    fn choosing_right_answer_marks_a_single_option() {
        let mut question = Question::blank();
        assert!(question.set_right_answer(1));
        assert!(question.set_right_answer(3));
        assert_eq!(question.right_option(), Some(3));
        assert_eq!(question.right_answer(), "3");
        assert_eq!(question.options().iter().filter(|o| o.right).count(), 1);
        assert!(!question.set_right_answer(4));
    }

    #[test]
    fn question_serialises_with_camel_case_keys() {
        let mut question = Question::blank();
        question.set_label("Capital of Peru?");
        question.set_right_answer(0);
        let value = serde_json::to_value(&question).unwrap();
        assert_eq!(value["rightAnswer"], "0");
        assert_eq!(value["options"][0]["right"], true);
    }

    #[test]
    fn display_marks_right_option() {
        let mut question = Question::blank();
        question.set_label("2 + 2?");
        question.set_option_label(0, "4");
        question.set_right_answer(0);
        assert!(question.to_string().starts_with("2 + 2?\n1) 4 (V)\n2)  (X)"));
    }
}
