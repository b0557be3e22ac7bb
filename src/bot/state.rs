use crate::views::runner::QuizRun;

#[derive(Debug, Clone, Default)]
pub enum ChatState {
    #[default]
    Start,
    Playing {
        run: QuizRun,
    },
}
