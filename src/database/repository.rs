use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, instrument};

use super::quiz::{Question, Quiz};
use super::{new_key, DocumentStore, StoreError, StoreResult, Subscription};
use crate::auth::UserProfile;

/// Layout: `quizzes/{quiz}`, `quizzes/{quiz}/questions/{question}`, `users/{uid}`.
#[derive(Clone)]
pub struct QuizRepository {
    store: Arc<dyn DocumentStore>,
}

fn quiz_path(quiz_id: &str) -> String {
    format!("quizzes/{quiz_id}")
}

fn questions_path(quiz_id: &str) -> String {
    format!("quizzes/{quiz_id}/questions")
}

fn question_path(quiz_id: &str, question_id: &str) -> String {
    format!("quizzes/{quiz_id}/questions/{question_id}")
}

fn user_path(uid: &str) -> String {
    format!("users/{uid}")
}

fn decode<T: DeserializeOwned>(path: &str, value: Value) -> StoreResult<T> {
    serde_json::from_value(value).map_err(|source| StoreError::Malformed {
        path: path.to_owned(),
        source,
    })
}

fn encode<T: Serialize>(path: &str, value: &T) -> StoreResult<Value> {
    serde_json::to_value(value).map_err(|source| StoreError::Malformed {
        path: path.to_owned(),
        source,
    })
}

impl QuizRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// All quizzes, without their questions.
    pub async fn quizzes(&self) -> StoreResult<Vec<Quiz>> {
        let mut quizzes = Vec::new();
        for (key, value) in self.store.children("quizzes").await? {
            let mut quiz: Quiz = decode(&quiz_path(&key), value)?;
            quiz.set_id(key);
            quizzes.push(quiz);
        }
        Ok(quizzes)
    }

    pub async fn quiz(&self, quiz_id: &str) -> StoreResult<Option<Quiz>> {
        let path = quiz_path(quiz_id);
        let Some(value) = self.store.read(&path).await? else {
            return Ok(None);
        };
        let mut quiz: Quiz = decode(&path, value)?;
        quiz.set_id(quiz_id);
        for question in self.questions(quiz_id).await? {
            quiz.add_question(question);
        }
        Ok(Some(quiz))
    }

    pub async fn find_quiz_by_title(&self, title: &str) -> StoreResult<Option<Quiz>> {
        let found = self
            .quizzes()
            .await?
            .into_iter()
            .find(|quiz| quiz.title().eq_ignore_ascii_case(title.trim()));
        match found {
            Some(quiz) => self.quiz(quiz.id()).await,
            None => Ok(None),
        }
    }

    #[instrument(level = "info", skip(self, quiz), fields(title = quiz.title()))]
    pub async fn create_quiz(&self, mut quiz: Quiz) -> StoreResult<String> {
        let key = new_key();
        quiz.set_id(key.clone());
        let path = quiz_path(&key);
        self.store.write(&path, encode(&path, &quiz)?).await?;
        info!(quiz = %key, "quiz created");
        Ok(key)
    }

    pub async fn delete_quiz(&self, quiz_id: &str) -> StoreResult<()> {
        self.store.remove(&quiz_path(quiz_id)).await
    }

    pub async fn questions(&self, quiz_id: &str) -> StoreResult<Vec<Question>> {
        let mut questions = Vec::new();
        for (key, value) in self.store.children(&questions_path(quiz_id)).await? {
            let mut question: Question = decode(&question_path(quiz_id, &key), value)?;
            question.set_id(key);
            questions.push(question);
        }
        Ok(questions)
    }

    pub async fn question(&self, quiz_id: &str, question_id: &str) -> StoreResult<Option<Question>> {
        let path = question_path(quiz_id, question_id);
        match self.store.read(&path).await? {
            Some(value) => {
                let mut question: Question = decode(&path, value)?;
                question.set_id(question_id);
                Ok(Some(question))
            }
            None => Ok(None),
        }
    }

    pub async fn find_question_by_label(
        &self,
        quiz_id: &str,
        label: &str,
    ) -> StoreResult<Option<Question>> {
        Ok(self
            .questions(quiz_id)
            .await?
            .into_iter()
            .find(|question| question.label().eq_ignore_ascii_case(label.trim())))
    }

    #[instrument(level = "info", skip(self, question))]
    pub async fn save_question(&self, quiz_id: &str, mut question: Question) -> StoreResult<String> {
        if question.id().is_empty() {
            question.set_id(new_key());
        }
        let id = question.id().to_owned();
        let path = question_path(quiz_id, &id);
        self.store.write(&path, encode(&path, &question)?).await?;
        info!(question = %id, "question saved");
        Ok(id)
    }

    #[instrument(level = "info", skip(self))]
    pub async fn delete_question(&self, quiz_id: &str, question_id: &str) -> StoreResult<()> {
        self.store.remove(&question_path(quiz_id, question_id)).await
    }

    pub async fn watch_question(&self, quiz_id: &str, question_id: &str) -> StoreResult<Subscription> {
        self.store.subscribe(&question_path(quiz_id, question_id)).await
    }

    pub async fn user_profile(&self, uid: &str) -> StoreResult<Option<UserProfile>> {
        let path = user_path(uid);
        match self.store.read(&path).await? {
            Some(value) => decode(&path, value).map(Some),
            None => Ok(None),
        }
    }

    pub async fn write_user_profile(&self, uid: &str, profile: &UserProfile) -> StoreResult<()> {
        let path = user_path(uid);
        self.store.write(&path, encode(&path, profile)?).await
    }

    pub async fn watch_user_profile(&self, uid: &str) -> StoreResult<Subscription> {
        self.store.subscribe(&user_path(uid)).await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::database::MemoryStore;

    fn repository() -> QuizRepository {
        QuizRepository::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn new_question_gets_generated_id() {
        let repo = repository();
        let quiz_id = repo.create_quiz(Quiz::new("Capitals", "", "kim")).await.unwrap();

        let mut question = Question::blank();
        question.set_label("Capital of Chile?");
        let id = repo.save_question(&quiz_id, question).await.unwrap();

        let stored = repo.question(&quiz_id, &id).await.unwrap().unwrap();
        assert_eq!(stored.id(), id);
        assert_eq!(stored.label(), "Capital of Chile?");

        let quiz = repo.find_quiz_by_title("capitals").await.unwrap().unwrap();
        assert_eq!(quiz.questions().len(), 1);
    }

    #[tokio::test]
    async fn questions_list_in_creation_order() {
        let repo = repository();
        let quiz_id = repo.create_quiz(Quiz::new("Capitals", "", "kim")).await.unwrap();
        let labels: Vec<String> = (0..8).map(|idx| format!("Q{idx}")).collect();
        for label in &labels {
            let mut question = Question::blank();
            question.set_label(label);
            repo.save_question(&quiz_id, question).await.unwrap();
        }

        let quiz = repo.quiz(&quiz_id).await.unwrap().unwrap();
        let stored: Vec<&str> = quiz.questions().iter().map(Question::label).collect();
        assert_eq!(stored, labels);
    }

    #[tokio::test]
    async fn saving_existing_question_overwrites_it() {
        let repo = repository();
        let mut question = Question::blank();
        question.set_label("v1");
        let id = repo.save_question("q", question).await.unwrap();

        let mut question = repo.question("q", &id).await.unwrap().unwrap();
        question.set_label("v2");
        assert_eq!(repo.save_question("q", question).await.unwrap(), id);
        assert_eq!(repo.questions("q").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn deleting_quiz_removes_questions() {
        let repo = repository();
        let quiz_id = repo.create_quiz(Quiz::new("Rivers", "", "kim")).await.unwrap();
        repo.save_question(&quiz_id, Question::blank()).await.unwrap();

        repo.delete_quiz(&quiz_id).await.unwrap();
        assert!(repo.quiz(&quiz_id).await.unwrap().is_none());
        assert!(repo.questions(&quiz_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn malformed_documents_are_reported() {
        let repo = repository();
        repo.store().write("quizzes/bad", json!(7)).await.unwrap();
        assert!(matches!(
            repo.quizzes().await,
            Err(StoreError::Malformed { .. })
        ));
    }
}
