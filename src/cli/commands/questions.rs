use crate::questions::{valid_success_url, QuestionsConfig, QUESTIONS_PATH};
use anyhow::{anyhow, Result};
use clap::{builder::ValueParser, Arg, ArgMatches, Command};

pub const ARG_MAX_QUESTIONS: &str = "max-questions";
pub const ARG_SUCCESS_URL: &str = "success-url";

#[must_use]
pub fn validator_success_url() -> ValueParser {
    ValueParser::from(move |url: &str| -> std::result::Result<String, String> {
        if valid_success_url(url) {
            Ok(url.to_string())
        } else {
            Err("must be a local path starting with '/'".to_string())
        }
    })
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_MAX_QUESTIONS)
                .long(ARG_MAX_QUESTIONS)
                .help("Number of security question slots offered to each user")
                .env("ENROLL_MAX_QUESTIONS")
                .default_value("3")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new(ARG_SUCCESS_URL)
                .long(ARG_SUCCESS_URL)
                .help("Where to redirect after answers are saved")
                .env("ENROLL_SUCCESS_URL")
                .default_value(QUESTIONS_PATH)
                .value_parser(validator_success_url()),
        )
}

/// Build the form settings from parsed arguments.
///
/// # Errors
/// Returns an error if the defaulted arguments are missing from `matches`.
pub fn parse(matches: &ArgMatches) -> Result<QuestionsConfig> {
    let max_questions = matches
        .get_one::<usize>(ARG_MAX_QUESTIONS)
        .copied()
        .ok_or_else(|| anyhow!("missing required argument: --{ARG_MAX_QUESTIONS}"))?;
    let success_url = matches
        .get_one::<String>(ARG_SUCCESS_URL)
        .cloned()
        .ok_or_else(|| anyhow!("missing required argument: --{ARG_SUCCESS_URL}"))?;

    Ok(QuestionsConfig::new(max_questions).with_success_url(success_url))
}
