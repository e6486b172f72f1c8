//! API handlers for the enrollment service.

pub mod health;
pub mod principal;
pub mod security_questions;
