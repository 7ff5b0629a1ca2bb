use crate::{api, cli::telemetry, store::LockoutPolicy};
use anyhow::Result;
use std::time::Duration;
use tracing::info;
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub lockout_max_attempts: u32,
    pub lockout_minutes: u64,
}

impl Args {
    #[must_use]
    pub fn lockout_policy(&self) -> LockoutPolicy {
        LockoutPolicy::new()
            .with_max_failed_attempts(self.lockout_max_attempts)
            .with_lockout_duration(Duration::from_secs(self.lockout_minutes.saturating_mul(60)))
    }
}

/// Execute the server action.
/// # Errors
/// Returns an error if the database is unreachable or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let lockout = args.lockout_policy();
    let result = api::new(args.port, args.dsn, lockout).await;

    telemetry::shutdown_tracer();

    result
}

fn log_startup_args(args: &Args) {
    let entries = [
        ("listen", format!("tcp:{}", args.port)),
        ("dsn", redact_dsn(&args.dsn)),
        ("lockout_max_attempts", args.lockout_max_attempts.to_string()),
        ("lockout_minutes", args.lockout_minutes.to_string()),
    ];

    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!(
        "{} {} - {}\n\nStartup configuration:",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        short_commit(crate::GIT_COMMIT_HASH)
    );
    for (key, value) in entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ =
            std::fmt::Write::write_fmt(&mut message, format_args!("\n  {key}:{padding} {value}"));
    }
    info!("{message}");
}

fn redact_dsn(dsn: &str) -> String {
    match Url::parse(dsn) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("REDACTED"));
            }
            parsed.to_string()
        }
        Err(_) => "invalid-dsn".to_string(),
    }
}

fn short_commit(hash: &str) -> String {
    let trimmed = hash.trim();
    if trimmed.len() > 7 {
        trimmed[..7].to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redact_dsn_hides_password() {
        let redacted = redact_dsn("postgres://idlink:s3cret@db:5432/idlink");
        assert!(!redacted.contains("s3cret"));
        assert!(redacted.contains("REDACTED"));
        assert!(redacted.contains("idlink:REDACTED@db:5432"));
    }

    #[test]
    fn redact_dsn_handles_garbage() {
        assert_eq!(redact_dsn("not a url"), "invalid-dsn");
    }

    #[test]
    fn short_commit_truncates() {
        assert_eq!(short_commit("0123456789"), "0123456");
        assert_eq!(short_commit("abc"), "abc");
    }

    #[test]
    fn lockout_policy_from_args() {
        let args = Args {
            port: 8080,
            dsn: String::new(),
            lockout_max_attempts: 3,
            lockout_minutes: 15,
        };
        let policy = args.lockout_policy();
        assert_eq!(policy.max_failed_attempts(), 3);
        assert_eq!(policy.lockout_duration(), Duration::from_secs(900));
    }
}
