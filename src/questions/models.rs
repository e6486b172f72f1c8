//! Records read and written by the enrollment flow.

use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;
use uuid::Uuid;

/// Longest question text accepted by the `security_questions` table.
pub const QUESTION_MAX_LEN: usize = 255;

/// A predefined prompt managed by administrators.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SecurityQuestion {
    pub id: i64,
    pub question: String,
    /// The user must type their own question text when picking this entry.
    pub is_other: bool,
    pub is_active: bool,
    pub is_test_record: bool,
}

impl SecurityQuestion {
    #[must_use]
    pub fn new(id: i64, question: impl Into<String>) -> Self {
        Self {
            id,
            question: question.into(),
            is_other: false,
            is_active: true,
            is_test_record: false,
        }
    }

    #[must_use]
    pub const fn other(mut self) -> Self {
        self.is_other = true;
        self
    }

    #[must_use]
    pub const fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

impl fmt::Display for SecurityQuestion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.question)
    }
}

/// A stored answer owned by a user profile.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct SecurityAnswer {
    pub user_id: Uuid,
    pub question_id: i64,
    pub question_other: Option<String>,
    pub answer: String,
}

/// An accepted question/override/answer triple coming out of the form.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct AnswerSubmission {
    pub question_id: i64,
    pub question_other: String,
    pub answer: String,
}

impl AnswerSubmission {
    /// Empty overrides are stored as `NULL`.
    #[must_use]
    pub fn question_other(&self) -> Option<&str> {
        Some(self.question_other.as_str()).filter(|value| !value.is_empty())
    }

    #[must_use]
    pub fn into_answer(self, user_id: Uuid) -> SecurityAnswer {
        let question_other = self.question_other().map(ToString::to_string);
        SecurityAnswer {
            user_id,
            question_id: self.question_id,
            question_other,
            answer: self.answer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_displays_its_text() {
        let question = SecurityQuestion::new(7, "Name of your first pet?");
        assert_eq!(question.to_string(), "Name of your first pet?");
        assert!(question.is_active);
        assert!(!question.is_other);
    }

    #[test]
    fn builders_flip_flags() {
        let question = SecurityQuestion::new(1, "Other").other().inactive();
        assert!(question.is_other);
        assert!(!question.is_active);
    }

    #[test]
    fn empty_override_becomes_none() {
        let user_id = Uuid::new_v4();
        let submission = AnswerSubmission {
            question_id: 3,
            question_other: String::new(),
            answer: "blue".to_string(),
        };
        let answer = submission.into_answer(user_id);
        assert_eq!(answer.question_other, None);
        assert_eq!(answer.user_id, user_id);
        assert_eq!(answer.answer, "blue");
    }
}
