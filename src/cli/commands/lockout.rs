use clap::{Arg, Command};

pub const ARG_LOCKOUT_MAX_ATTEMPTS: &str = "lockout-max-attempts";
pub const ARG_LOCKOUT_MINUTES: &str = "lockout-minutes";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_LOCKOUT_MAX_ATTEMPTS)
                .long(ARG_LOCKOUT_MAX_ATTEMPTS)
                .help("Consecutive failed password checks before an account is locked")
                .default_value("5")
                .env("IDLINK_LOCKOUT_MAX_ATTEMPTS")
                .value_parser(clap::value_parser!(u32).range(1..)),
        )
        .arg(
            Arg::new(ARG_LOCKOUT_MINUTES)
                .long(ARG_LOCKOUT_MINUTES)
                .help("How long a locked account stays locked, in minutes")
                .default_value("5")
                .env("IDLINK_LOCKOUT_MINUTES")
                .value_parser(clap::value_parser!(u64)),
        )
}
