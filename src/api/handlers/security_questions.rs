//! Security questions page.
//!
//! Flow Overview:
//! 1) Authenticate via session token.
//! 2) Build the form from the active questions and the user's stored answers.
//! 3) GET renders it; POST validates, replaces the stored answers and redirects.

use axum::{
    extract::{Extension, Form},
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
};
use std::sync::Arc;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use super::principal::require_auth;
use crate::questions::{
    AccountStore, AnswerSubmission, FormData, FormErrors, QUESTIONS_PATH, QuestionsConfig,
    SecurityQuestionsForm, StoreError,
    form::NON_FIELD_ERRORS,
    initial_from_answers,
    render::render_page,
};

const QUESTION_UNAVAILABLE: &str = "One of the selected questions is no longer available.";

#[utoipa::path(
    get,
    path = "/account/questions/",
    responses(
        (status = 200, description = "Security questions form, pre-populated from stored answers.", body = String, content_type = "text/html"),
        (status = 401, description = "Missing or invalid session."),
    ),
    tag = "questions"
)]
#[instrument(skip_all)]
pub async fn show(
    headers: HeaderMap,
    Extension(store): Extension<Arc<dyn AccountStore>>,
    Extension(config): Extension<Arc<QuestionsConfig>>,
) -> Response {
    let principal = match require_auth(&headers, store.as_ref()).await {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    match load_form(store.as_ref(), &config, principal.user_id).await {
        Ok(form) => Html(render_page(&form, None, None, QUESTIONS_PATH)).into_response(),
        Err(err) => {
            error!("Failed to load security questions form: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/account/questions/",
    request_body(
        content = String,
        content_type = "application/x-www-form-urlencoded",
        description = "`question_{i}`, `q_other_{i}` and `answer_{i}` for every slot."
    ),
    responses(
        (status = 200, description = "Form re-rendered with validation errors.", body = String, content_type = "text/html"),
        (status = 303, description = "Answers stored, redirect to the success path."),
        (status = 409, description = "A selected question was deactivated meanwhile."),
        (status = 401, description = "Missing or invalid session."),
    ),
    tag = "questions"
)]
#[instrument(skip_all)]
pub async fn submit(
    headers: HeaderMap,
    Extension(store): Extension<Arc<dyn AccountStore>>,
    Extension(config): Extension<Arc<QuestionsConfig>>,
    Form(data): Form<FormData>,
) -> Response {
    let principal = match require_auth(&headers, store.as_ref()).await {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    let form = match load_form(store.as_ref(), &config, principal.user_id).await {
        Ok(form) => form,
        Err(err) => {
            error!("Failed to load security questions form: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let validated = match form.validate(&data) {
        Ok(validated) => validated,
        Err(errors) => {
            debug!("Security questions rejected: {errors}");
            return Html(render_page(&form, Some(&data), Some(&errors), QUESTIONS_PATH))
                .into_response();
        }
    };

    let answers: Vec<AnswerSubmission> = validated.answers().collect();
    match store.set_answers(principal.user_id, &answers).await {
        Ok(()) => {
            info!(
                user_id = %principal.user_id,
                answers = answers.len(),
                "Security answers updated"
            );
            Redirect::to(config.success_url()).into_response()
        }
        Err(StoreError::InactiveQuestion(id)) => {
            // Deactivated between load and save; show the refreshed form.
            debug!("Question {id} deactivated during submission");
            let mut errors = FormErrors::default();
            errors.add(NON_FIELD_ERRORS, QUESTION_UNAVAILABLE);
            match load_form(store.as_ref(), &config, principal.user_id).await {
                Ok(form) => (
                    StatusCode::CONFLICT,
                    Html(render_page(&form, Some(&data), Some(&errors), QUESTIONS_PATH)),
                )
                    .into_response(),
                Err(err) => {
                    error!("Failed to reload security questions form: {err}");
                    StatusCode::INTERNAL_SERVER_ERROR.into_response()
                }
            }
        }
        Err(err) => {
            error!("Failed to store security answers: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn load_form(
    store: &dyn AccountStore,
    config: &QuestionsConfig,
    user_id: Uuid,
) -> Result<SecurityQuestionsForm, StoreError> {
    let questions = store.active_questions().await?;
    let answers = store.answers_for(user_id).await?;

    Ok(SecurityQuestionsForm::new(
        &questions,
        config.max_questions(),
        initial_from_answers(&answers),
    ))
}
