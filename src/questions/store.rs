//! Persistence for questions, answers and the session lookup used by handlers.
//!
//! Handlers only see the `AccountStore` trait; `PgAccountStore` is the SQL
//! implementation wired by the server.

use sqlx::{Connection, PgPool, Row};
use std::{future::Future, pin::Pin};
use thiserror::Error;
use tracing::{Instrument, debug, info_span};
use uuid::Uuid;

use super::models::{AnswerSubmission, SecurityAnswer, SecurityQuestion};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("security question {0} is not active")]
    InactiveQuestion(i64),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// User resolved from a session token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionUser {
    pub user_id: Uuid,
    pub email: String,
}

pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

pub trait AccountStore: Send + Sync {
    /// Active questions ordered by id.
    fn active_questions(&self) -> StoreFuture<'_, Vec<SecurityQuestion>>;

    /// Stored answers for `user_id`, in the order they were saved.
    fn answers_for(&self, user_id: Uuid) -> StoreFuture<'_, Vec<SecurityAnswer>>;

    /// Replace every stored answer of `user_id` with `answers`.
    fn set_answers<'a>(
        &'a self,
        user_id: Uuid,
        answers: &'a [AnswerSubmission],
    ) -> StoreFuture<'a, ()>;

    /// Resolve a hashed session token into its user, ignoring expired sessions.
    fn lookup_session<'a>(&'a self, token_hash: &'a [u8]) -> StoreFuture<'a, Option<SessionUser>>;

    fn ping(&self) -> StoreFuture<'_, ()>;
}

#[derive(Clone, Debug)]
pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl AccountStore for PgAccountStore {
    fn active_questions(&self) -> StoreFuture<'_, Vec<SecurityQuestion>> {
        Box::pin(fetch_active_questions(&self.pool))
    }

    fn answers_for(&self, user_id: Uuid) -> StoreFuture<'_, Vec<SecurityAnswer>> {
        Box::pin(fetch_answers(&self.pool, user_id))
    }

    fn set_answers<'a>(
        &'a self,
        user_id: Uuid,
        answers: &'a [AnswerSubmission],
    ) -> StoreFuture<'a, ()> {
        Box::pin(replace_answers(&self.pool, user_id, answers))
    }

    fn lookup_session<'a>(&'a self, token_hash: &'a [u8]) -> StoreFuture<'a, Option<SessionUser>> {
        Box::pin(fetch_session(&self.pool, token_hash))
    }

    fn ping(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let acquire_span = info_span!(
                "db.acquire",
                db.system = "postgresql",
                db.operation = "ACQUIRE"
            );
            let mut conn = self.pool.acquire().instrument(acquire_span).await?;
            let ping_span = info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
            conn.ping().instrument(ping_span).await?;
            Ok(())
        })
    }
}

async fn fetch_active_questions(pool: &PgPool) -> Result<Vec<SecurityQuestion>, StoreError> {
    let query = r"
        SELECT id, question, is_other, is_active, is_test_record
        FROM security_questions
        WHERE is_active = TRUE
        ORDER BY id
    ";
    let rows = sqlx::query(query).fetch_all(pool).await?;
    Ok(rows
        .into_iter()
        .map(|row| SecurityQuestion {
            id: row.get("id"),
            question: row.get("question"),
            is_other: row.get("is_other"),
            is_active: row.get("is_active"),
            is_test_record: row.get("is_test_record"),
        })
        .collect())
}

async fn fetch_answers(pool: &PgPool, user_id: Uuid) -> Result<Vec<SecurityAnswer>, StoreError> {
    let query = r"
        SELECT user_id, question_id, question_other, answer
        FROM security_answers
        WHERE user_id = $1
        ORDER BY id
    ";
    let rows = sqlx::query(query).bind(user_id).fetch_all(pool).await?;
    Ok(rows
        .into_iter()
        .map(|row| SecurityAnswer {
            user_id: row.get("user_id"),
            question_id: row.get("question_id"),
            question_other: row.get("question_other"),
            answer: row.get("answer"),
        })
        .collect())
}

/// Delete and re-insert inside one transaction so a failed insert keeps the old answers.
async fn replace_answers(
    pool: &PgPool,
    user_id: Uuid,
    answers: &[AnswerSubmission],
) -> Result<(), StoreError> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM security_answers WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    // The SELECT guards against questions deactivated after the form was rendered.
    let insert = r"
        INSERT INTO security_answers (user_id, question_id, question_other, answer)
        SELECT $1, id, $3, $4
        FROM security_questions
        WHERE id = $2 AND is_active = TRUE
    ";
    for answer in answers {
        let result = sqlx::query(insert)
            .bind(user_id)
            .bind(answer.question_id)
            .bind(answer.question_other())
            .bind(&answer.answer)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            let _ = tx.rollback().await;
            return Err(StoreError::InactiveQuestion(answer.question_id));
        }
    }

    tx.commit().await?;

    debug!("stored {} security answer(s) for {}", answers.len(), user_id);

    Ok(())
}

async fn fetch_session(
    pool: &PgPool,
    token_hash: &[u8],
) -> Result<Option<SessionUser>, StoreError> {
    let query = r"
        SELECT s.user_id, u.email
        FROM user_sessions s
        JOIN users u ON u.id = s.user_id
        WHERE s.session_hash = $1 AND s.expires_at > NOW()
        LIMIT 1
    ";
    let row = sqlx::query(query)
        .bind(token_hash)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|row| SessionUser {
        user_id: row.get("user_id"),
        email: row.get("email"),
    }))
}
