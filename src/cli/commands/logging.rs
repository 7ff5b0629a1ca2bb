//! `-v`/`IDLINK_LOG_LEVEL` handling.
//!
//! The count and the level names share one scale: `error` is the quiet
//! default, each step up adds detail. Sign-in decisions (unknown user,
//! lockout, password mismatch) log at `debug`, so operators chasing a
//! refused sign-in want `-vvv`.

use clap::{Arg, ArgAction, Command, builder::ValueParser};
use tracing::Level;

pub const ARG_VERBOSITY: &str = "verbosity";
pub const ENV_LOG_LEVEL: &str = "IDLINK_LOG_LEVEL";

/// Level names in verbosity order; the index is the `-v` count.
const LEVEL_NAMES: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

#[must_use]
pub fn validator_log_level() -> ValueParser {
    ValueParser::from(move |level: &str| -> std::result::Result<u8, String> {
        if let Ok(count) = level.parse::<u8>() {
            return Ok(count);
        }

        let wanted = level.trim().to_lowercase();
        LEVEL_NAMES
            .iter()
            .position(|name| *name == wanted)
            .and_then(|index| u8::try_from(index).ok())
            .ok_or_else(|| format!("invalid log level '{level}', expected one of {LEVEL_NAMES:?}"))
    })
}

/// Tracing level for a verbosity count. `None` keeps the subscriber default
/// (errors only).
#[must_use]
pub const fn level_for(verbosity: u8) -> Option<Level> {
    match verbosity {
        0 => None,
        1 => Some(Level::WARN),
        2 => Some(Level::INFO),
        3 => Some(Level::DEBUG),
        _ => Some(Level::TRACE),
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command.arg(
        Arg::new(ARG_VERBOSITY)
            .short('v')
            .long("verbose")
            .help("Verbosity of idlink logs: error, warn, info, debug (sign-in decisions), trace")
            .env(ENV_LOG_LEVEL)
            .global(true)
            .action(ArgAction::Count)
            .value_parser(validator_log_level()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_names_map_to_counts() {
        let parser = |value: &str| {
            let command = Command::new("idlink").arg(
                Arg::new("level")
                    .long("level")
                    .value_parser(validator_log_level()),
            );
            command
                .try_get_matches_from(["idlink", "--level", value])
                .map(|matches| matches.get_one::<u8>("level").copied())
        };
        assert_eq!(parser("DEBUG").ok().flatten(), Some(3));
        assert_eq!(parser(" warn ").ok().flatten(), Some(1));
        assert_eq!(parser("2").ok().flatten(), Some(2));
        assert!(parser("loud").is_err());
    }

    #[test]
    fn verbosity_levels() {
        assert_eq!(level_for(0), None);
        assert_eq!(level_for(1), Some(Level::WARN));
        assert_eq!(level_for(2), Some(Level::INFO));
        assert_eq!(level_for(3), Some(Level::DEBUG));
        assert_eq!(level_for(9), Some(Level::TRACE));
    }
}
