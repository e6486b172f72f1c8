//! # Enroll (Security Question Enrollment)
//!
//! `enroll` lets signed-in users pick security questions from an
//! administrator-managed bank, or write their own, and store answers that
//! are later used to verify their identity during account recovery.
//!
//! ## Form Model
//!
//! The form is generated per request. It offers a configured number of slots,
//! each made of a question selector, a custom question text used when the
//! chosen entry is an "other" question, and the answer.
//!
//! - **Required slots:** Slots that already hold a stored answer must keep a
//!   selection; the "not selected" entry still counts as a selection.
//! - **At least one answer:** A submission must select at least one question,
//!   answer it, and provide the custom text for "other" questions.
//! - **Replace semantics:** A valid submission replaces every stored answer of
//!   the user in one transaction.
//!
//! Sessions are issued by the identity service. This crate only resolves them.

pub mod api;
pub mod cli;
pub mod questions;
pub mod vault;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
