//! Diagnostic logging for `gitbug`.
//!
//! Logs always go to stderr so stdout stays clean for command output.
//! `GITBUG_LOG` takes an `EnvFilter` directive and wins over `-v`/`-q`;
//! `GITBUG_LOG_FORMAT=json` switches to one JSON object per line.

use std::str::FromStr;

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

pub const ENV_LOG: &str = "GITBUG_LOG";
pub const ENV_LOG_FORMAT: &str = "GITBUG_LOG_FORMAT";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "compact" | "text" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

/// Filter directive used when `GITBUG_LOG` is not set.
#[must_use]
pub fn default_directive(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        return "error";
    }
    match verbose {
        0 => "warn",
        1 => "gitbug=info,gitbug_lib=info,warn",
        2 => "gitbug=debug,gitbug_lib=debug,info",
        _ => "gitbug=trace,gitbug_lib=trace,debug",
    }
}

/// Install the global subscriber.
///
/// `format` overrides `GITBUG_LOG_FORMAT`.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_logging(
    verbose: u8,
    quiet: bool,
    format: Option<LogFormat>,
) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_env(ENV_LOG)
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose, quiet)));

    let format = format.unwrap_or_else(|| {
        std::env::var(ENV_LOG_FORMAT)
            .ok()
            .and_then(|f| f.parse().ok())
            .unwrap_or_default()
    });

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        LogFormat::Compact => registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .try_init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive() {
        assert_eq!(default_directive(0, false), "warn");
        assert_eq!(default_directive(5, true), "error");
        assert!(default_directive(1, false).contains("gitbug_lib=info"));
        assert!(default_directive(9, false).starts_with("gitbug=trace"));
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("Compact".parse::<LogFormat>().unwrap(), LogFormat::Compact);
        assert!("xml".parse::<LogFormat>().is_err());
    }
}
