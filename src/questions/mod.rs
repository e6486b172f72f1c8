//! Security question enrollment: records, the dynamic form, rendering and storage.

pub mod form;
pub mod models;
pub mod render;
pub mod store;

pub use form::{FormData, FormErrors, SecurityQuestionsForm, ValidatedAnswers, initial_from_answers};
pub use models::{AnswerSubmission, SecurityAnswer, SecurityQuestion};
pub use store::{AccountStore, PgAccountStore, SessionUser, StoreError};

/// Path served by the form handler.
pub const QUESTIONS_PATH: &str = "/account/questions/";

/// Request-independent settings of the enrollment form.
#[derive(Clone, Debug)]
pub struct QuestionsConfig {
    max_questions: usize,
    success_url: String,
}

impl QuestionsConfig {
    #[must_use]
    pub fn new(max_questions: usize) -> Self {
        Self {
            max_questions,
            success_url: QUESTIONS_PATH.to_string(),
        }
    }

    #[must_use]
    pub fn with_success_url(mut self, success_url: impl Into<String>) -> Self {
        self.success_url = success_url.into();
        self
    }

    /// Number of question slots rendered, and the maximum answers a user keeps.
    #[must_use]
    pub const fn max_questions(&self) -> usize {
        self.max_questions
    }

    #[must_use]
    pub fn success_url(&self) -> &str {
        &self.success_url
    }
}

impl Default for QuestionsConfig {
    fn default() -> Self {
        Self::new(3)
    }
}

/// Accepts local absolute paths only, so the redirect cannot leave the site.
#[must_use]
pub fn valid_success_url(url: &str) -> bool {
    url.starts_with('/') && !url.starts_with("//") && !url.contains(['\\', '\r', '\n'])
}
