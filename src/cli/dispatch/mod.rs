use crate::cli::{
    actions::{Action, server::Args},
    commands::lockout::{ARG_LOCKOUT_MAX_ATTEMPTS, ARG_LOCKOUT_MINUTES},
};
use anyhow::{Context, Result};

/// # Errors
/// Returns an error if required arguments are missing.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;
    let lockout_max_attempts = matches
        .get_one::<u32>(ARG_LOCKOUT_MAX_ATTEMPTS)
        .copied()
        .unwrap_or(5);
    let lockout_minutes = matches
        .get_one::<u64>(ARG_LOCKOUT_MINUTES)
        .copied()
        .unwrap_or(5);

    Ok(Action::Server(Args {
        port,
        dsn,
        lockout_max_attempts,
        lockout_minutes,
    }))
}
