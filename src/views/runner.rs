use crate::database::quiz::{Question, Quiz};

/// A question can be played once it has options and one of them is right.
pub fn is_playable(question: &Question) -> bool {
    !question.options().is_empty() && question.right_option().is_some()
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuizRun {
    quiz: Quiz,
    curr_idx: usize,
    score: u32,
    answered: bool,
}

impl QuizRun {
    /// `None` when the quiz has no playable question.
    pub fn start(quiz: Quiz) -> Option<Self> {
        let first = quiz.questions().iter().position(is_playable)?;
        Some(Self {
            quiz,
            curr_idx: first,
            score: 0,
            answered: false,
        })
    }

    pub fn quiz(&self) -> &Quiz {
        &self.quiz
    }

    pub fn current(&self) -> Option<&Question> {
        self.quiz.questions().get(self.curr_idx)
    }

    /// Index of the current question within the quiz. Answer buttons carry it
    /// so taps on an earlier question can be told apart.
    pub fn position(&self) -> usize {
        self.curr_idx
    }

    /// 1-based position of the current question among the playable ones.
    pub fn number(&self) -> usize {
        self.quiz.questions()[..self.curr_idx.min(self.quiz.questions().len())]
            .iter()
            .filter(|question| is_playable(question))
            .count()
            + 1
    }

    /// Scores the chosen option of the question at `position`. `None` unless
    /// that is the current, still unanswered question and `option` exists.
    pub fn answer(&mut self, position: usize, option: usize) -> Option<bool> {
        if position != self.curr_idx {
            return None;
        }
        let question = self.current()?;
        if self.answered || option >= question.options().len() {
            return None;
        }
        let right = question.is_right(option);
        self.answered = true;
        if right {
            self.score += 1;
        }
        Some(right)
    }

    /// Moves to the next playable question. `false` once the run is over.
    pub fn advance(&mut self) -> bool {
        if self.is_finished() {
            return false;
        }
        let next = self.quiz.questions()[self.curr_idx + 1..]
            .iter()
            .position(is_playable);
        self.answered = false;
        match next {
            Some(offset) => {
                self.curr_idx += offset + 1;
                true
            }
            None => {
                self.curr_idx = self.quiz.questions().len();
                false
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.current().is_none()
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn total(&self) -> usize {
        self.quiz.questions().iter().filter(|q| is_playable(q)).count()
    }
}
