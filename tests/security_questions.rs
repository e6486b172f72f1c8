//! End-to-end tests for the security questions page.
//!
//! The axum router is exercised with an in-memory `AccountStore`, so these
//! tests need neither a database nor a network.

use anyhow::{Context, Result};
use axum::{
    body::{to_bytes, Body},
    http::{
        header::{CONTENT_TYPE, COOKIE, LOCATION},
        Request, StatusCode,
    },
    response::Response,
    Router,
};
use enroll::{
    api::{self, handlers::principal::hash_session_token},
    questions::{
        form::{FIELD_REQUIRED, NO_ANSWERS},
        store::StoreFuture,
        AccountStore, AnswerSubmission, QuestionsConfig, SecurityAnswer, SecurityQuestion,
        SessionUser, StoreError,
    },
};
use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
};
use tower::ServiceExt;
use uuid::Uuid;

const SESSION: &str = "session-token";

#[derive(Default)]
struct MemoryStore {
    questions: Vec<SecurityQuestion>,
    answers: Mutex<HashMap<Uuid, Vec<SecurityAnswer>>>,
    sessions: HashMap<Vec<u8>, SessionUser>,
    // Questions deactivated after the form was loaded.
    retired: Mutex<HashSet<i64>>,
    database_down: bool,
}

impl MemoryStore {
    fn with_user(user_id: Uuid) -> Self {
        let mut sessions = HashMap::new();
        sessions.insert(
            hash_session_token(SESSION),
            SessionUser {
                user_id,
                email: "alice@example.com".to_string(),
            },
        );
        Self {
            questions: vec![
                SecurityQuestion::new(1, "What was the name of your first pet?"),
                SecurityQuestion::new(2, "In what city were you born?"),
                SecurityQuestion::new(3, "Write your own question").other(),
                SecurityQuestion::new(4, "Retired question").inactive(),
            ],
            sessions,
            ..Self::default()
        }
    }

    fn stored(&self, user_id: Uuid) -> Vec<SecurityAnswer> {
        self.answers
            .lock()
            .map(|answers| answers.get(&user_id).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    fn seed(&self, user_id: Uuid, answers: Vec<SecurityAnswer>) {
        if let Ok(mut stored) = self.answers.lock() {
            stored.insert(user_id, answers);
        }
    }
}

impl AccountStore for MemoryStore {
    fn active_questions(&self) -> StoreFuture<'_, Vec<SecurityQuestion>> {
        let questions = self
            .questions
            .iter()
            .filter(|question| question.is_active)
            .cloned()
            .collect();
        Box::pin(async move { Ok(questions) })
    }

    fn answers_for(&self, user_id: Uuid) -> StoreFuture<'_, Vec<SecurityAnswer>> {
        let answers = self.stored(user_id);
        Box::pin(async move { Ok(answers) })
    }

    fn set_answers<'a>(
        &'a self,
        user_id: Uuid,
        answers: &'a [AnswerSubmission],
    ) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let retired = self.retired.lock().map(|r| r.clone()).unwrap_or_default();
            for answer in answers {
                let active = self
                    .questions
                    .iter()
                    .any(|q| q.id == answer.question_id && q.is_active);
                if !active || retired.contains(&answer.question_id) {
                    return Err(StoreError::InactiveQuestion(answer.question_id));
                }
            }
            let answers = answers
                .iter()
                .cloned()
                .map(|answer| answer.into_answer(user_id))
                .collect();
            self.seed(user_id, answers);
            Ok(())
        })
    }

    fn lookup_session<'a>(&'a self, token_hash: &'a [u8]) -> StoreFuture<'a, Option<SessionUser>> {
        let user = self.sessions.get(token_hash).cloned();
        Box::pin(async move { Ok(user) })
    }

    fn ping(&self) -> StoreFuture<'_, ()> {
        let down = self.database_down;
        Box::pin(async move {
            if down {
                Err(StoreError::Database(sqlx::Error::PoolTimedOut))
            } else {
                Ok(())
            }
        })
    }
}

fn app(store: Arc<MemoryStore>, config: QuestionsConfig) -> Router {
    api::router(store, config)
}

fn get_form(session: Option<&str>) -> Result<Request<Body>> {
    let mut builder = Request::builder().method("GET").uri("/account/questions/");
    if let Some(token) = session {
        builder = builder.header(COOKIE, format!("enroll_session={token}"));
    }
    builder.body(Body::empty()).context("build GET request")
}

fn post_form(pairs: &[(&str, &str)]) -> Result<Request<Body>> {
    let body = pairs
        .iter()
        .map(|(key, value)| format!("{key}={}", encode(value)))
        .collect::<Vec<_>>()
        .join("&");
    Request::builder()
        .method("POST")
        .uri("/account/questions/")
        .header(COOKIE, format!("enroll_session={SESSION}"))
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .context("build POST request")
}

fn encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

async fn body_text(response: Response) -> Result<String> {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .context("read body")?;
    String::from_utf8(bytes.to_vec()).context("utf-8 body")
}

#[tokio::test]
async fn form_requires_session() -> Result<()> {
    let store = Arc::new(MemoryStore::with_user(Uuid::new_v4()));
    let app = app(store, QuestionsConfig::default());

    let response = app.clone().oneshot(get_form(None)?).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app.oneshot(get_form(Some("unknown"))?).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn form_renders_configured_slots() -> Result<()> {
    let store = Arc::new(MemoryStore::with_user(Uuid::new_v4()));
    let response = app(store, QuestionsConfig::new(4))
        .oneshot(get_form(Some(SESSION))?)
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("text/html")));

    let html = body_text(response).await?;
    assert_eq!(html.matches("<select ").count(), 4);
    assert_eq!(html.matches(r#"name="q_other_"#).count(), 4);
    assert_eq!(html.matches(r#"name="answer_"#).count(), 4);
    assert!(html.contains("Select a question #4 ..."));
    assert!(!html.contains("Retired question"));
    Ok(())
}

#[tokio::test]
async fn form_prepopulates_stored_answers() -> Result<()> {
    let user_id = Uuid::new_v4();
    let store = Arc::new(MemoryStore::with_user(user_id));
    store.seed(
        user_id,
        vec![
            SecurityAnswer {
                user_id,
                question_id: 2,
                question_other: None,
                answer: "Lisbon".to_string(),
            },
            SecurityAnswer {
                user_id,
                question_id: 3,
                question_other: Some("Favourite author?".to_string()),
                answer: "Ms. Lane".to_string(),
            },
        ],
    );

    let response = app(store, QuestionsConfig::new(3))
        .oneshot(get_form(Some(SESSION))?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let html = body_text(response).await?;
    assert!(html.contains(r#"<select name="question_0" id="id_question_0" data-slot="0" required>"#));
    assert!(html.contains(r#"<select name="question_1" id="id_question_1" data-slot="1" required>"#));
    assert!(html.contains(r#"<select name="question_2" id="id_question_2" data-slot="2">"#));
    assert!(html.contains(r#"<option value="2" data-is-other="0" selected>"#));
    assert!(html.contains(r#"<option value="3" data-is-other="1" selected>"#));
    assert!(html.contains(r#"value="Favourite author?""#));
    // Stored answers are never echoed back.
    assert!(!html.contains("Lisbon"));
    assert!(!html.contains("Ms. Lane"));
    Ok(())
}

#[tokio::test]
async fn valid_submission_is_stored_and_redirects() -> Result<()> {
    let user_id = Uuid::new_v4();
    let store = Arc::new(MemoryStore::with_user(user_id));

    let response = app(store.clone(), QuestionsConfig::new(3))
        .oneshot(post_form(&[
            ("question_0", "-1"),
            ("q_other_0", ""),
            ("answer_0", ""),
            ("question_1", "1"),
            ("q_other_1", ""),
            ("answer_1", "Rex"),
            ("question_2", "-1"),
            ("q_other_2", ""),
            ("answer_2", ""),
        ])?)
        .await?;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok()),
        Some("/account/questions/")
    );
    assert_eq!(
        store.stored(user_id),
        [SecurityAnswer {
            user_id,
            question_id: 1,
            question_other: None,
            answer: "Rex".to_string(),
        }]
    );
    Ok(())
}

#[tokio::test]
async fn submission_replaces_previous_answers() -> Result<()> {
    let user_id = Uuid::new_v4();
    let store = Arc::new(MemoryStore::with_user(user_id));
    store.seed(
        user_id,
        vec![
            SecurityAnswer {
                user_id,
                question_id: 1,
                question_other: None,
                answer: "Rex".to_string(),
            },
            SecurityAnswer {
                user_id,
                question_id: 2,
                question_other: None,
                answer: "Lisbon".to_string(),
            },
        ],
    );

    let config = QuestionsConfig::new(2).with_success_url("/account/");
    let response = app(store.clone(), config)
        .oneshot(post_form(&[
            ("question_0", "3"),
            ("q_other_0", "First concert?"),
            ("answer_0", "Blur"),
            ("question_1", "-1"),
        ])?)
        .await?;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok()),
        Some("/account/")
    );
    assert_eq!(
        store.stored(user_id),
        [SecurityAnswer {
            user_id,
            question_id: 3,
            question_other: Some("First concert?".to_string()),
            answer: "Blur".to_string(),
        }]
    );
    Ok(())
}

#[tokio::test]
async fn submission_without_selection_is_rejected() -> Result<()> {
    let user_id = Uuid::new_v4();
    let store = Arc::new(MemoryStore::with_user(user_id));

    let response = app(store.clone(), QuestionsConfig::new(2))
        .oneshot(post_form(&[("question_0", "-1"), ("question_1", "-1")])?)
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await?;
    assert!(html.contains(NO_ANSWERS));
    assert!(store.stored(user_id).is_empty());
    Ok(())
}

#[tokio::test]
async fn other_question_without_text_is_rejected() -> Result<()> {
    let user_id = Uuid::new_v4();
    let store = Arc::new(MemoryStore::with_user(user_id));

    let response = app(store.clone(), QuestionsConfig::new(1))
        .oneshot(post_form(&[
            ("question_0", "3"),
            ("q_other_0", ""),
            ("answer_0", "Blur"),
        ])?)
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await?;
    assert!(html.contains(FIELD_REQUIRED));
    // Submitted values survive the round trip.
    assert!(html.contains(r#"value="Blur""#));
    assert!(html.contains(r#"<option value="3" data-is-other="1" selected>"#));
    assert!(store.stored(user_id).is_empty());
    Ok(())
}

#[tokio::test]
async fn blank_answer_is_rejected() -> Result<()> {
    let user_id = Uuid::new_v4();
    let store = Arc::new(MemoryStore::with_user(user_id));

    let response = app(store.clone(), QuestionsConfig::new(1))
        .oneshot(post_form(&[("question_0", "2"), ("answer_0", "   ")])?)
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await?;
    assert!(html.contains(FIELD_REQUIRED));
    assert!(store.stored(user_id).is_empty());
    Ok(())
}

#[tokio::test]
async fn inactive_question_is_an_invalid_choice() -> Result<()> {
    let user_id = Uuid::new_v4();
    let store = Arc::new(MemoryStore::with_user(user_id));

    let response = app(store.clone(), QuestionsConfig::new(1))
        .oneshot(post_form(&[("question_0", "4"), ("answer_0", "x")])?)
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await?;
    assert!(html.contains("Select a valid choice. 4 is not one of the available choices."));
    assert!(store.stored(user_id).is_empty());
    Ok(())
}

#[tokio::test]
async fn question_retired_during_submission_conflicts() -> Result<()> {
    let user_id = Uuid::new_v4();
    let store = Arc::new(MemoryStore::with_user(user_id));
    if let Ok(mut retired) = store.retired.lock() {
        retired.insert(2);
    }

    let response = app(store.clone(), QuestionsConfig::new(1))
        .oneshot(post_form(&[("question_0", "2"), ("answer_0", "Porto")])?)
        .await?;

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let html = body_text(response).await?;
    assert!(html.contains("no longer available"));
    assert!(store.stored(user_id).is_empty());
    Ok(())
}

#[tokio::test]
async fn health_reports_database_status() -> Result<()> {
    let store = Arc::new(MemoryStore::with_user(Uuid::new_v4()));
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .context("build health request")?;
    let response = app(store, QuestionsConfig::default())
        .oneshot(request)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-app"));
    let body: serde_json::Value = serde_json::from_str(&body_text(response).await?)?;
    assert_eq!(body["database"], "ok");
    assert_eq!(body["name"], "enroll");

    let down = Arc::new(MemoryStore {
        database_down: true,
        ..MemoryStore::default()
    });
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .context("build health request")?;
    let response = app(down, QuestionsConfig::default()).oneshot(request).await?;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    Ok(())
}

#[tokio::test]
async fn request_id_is_propagated() -> Result<()> {
    let store = Arc::new(MemoryStore::with_user(Uuid::new_v4()));
    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", "req-123")
        .body(Body::empty())
        .context("build request")?;
    let response = app(store.clone(), QuestionsConfig::default())
        .oneshot(request)
        .await?;
    assert_eq!(
        response
            .headers()
            .get("x-request-id")
            .and_then(|value| value.to_str().ok()),
        Some("req-123")
    );

    let response = app(store, QuestionsConfig::default())
        .oneshot(get_form(None)?)
        .await?;
    assert!(response.headers().contains_key("x-request-id"));
    Ok(())
}

#[tokio::test]
async fn openapi_document_is_served() -> Result<()> {
    let store = Arc::new(MemoryStore::with_user(Uuid::new_v4()));
    let request = Request::builder()
        .uri("/openapi.json")
        .body(Body::empty())
        .context("build request")?;
    let response = app(store, QuestionsConfig::default())
        .oneshot(request)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let doc: serde_json::Value = serde_json::from_str(&body_text(response).await?)?;
    assert!(doc["paths"]["/account/questions/"]["post"].is_object());
    Ok(())
}
