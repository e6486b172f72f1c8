//! Map validated CLI arguments to the action executed by the binary.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{questions, vault};
use anyhow::{Context, Result};

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;

    let questions = questions::parse(matches)?;
    let vault = vault::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        questions,
        vault,
    }))
}
