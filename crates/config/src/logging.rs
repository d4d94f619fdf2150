//! Subscriber setup for binaries and test harnesses.
//!
//! Library crates only emit through `tracing`; whoever owns `main` calls
//! [`init`] once.

use tracing_subscriber::EnvFilter;

/// Environment variable that overrides the configured filter.
pub const LOG_ENV: &str = "SEMTAB_LOG";

/// Filter directives in effect: `SEMTAB_LOG` if set and non-empty, else `configured`.
pub fn effective_filter(configured: &str) -> String {
    match std::env::var(LOG_ENV) {
        Ok(value) if !value.trim().is_empty() => value,
        _ => configured.to_string(),
    }
}

/// Install a `fmt` subscriber on stderr.
///
/// Returns `false` if a global subscriber was already set. Invalid
/// directives fall back to `info`.
pub fn init(filter: &str) -> bool {
    let directives = effective_filter(filter);
    let env_filter = EnvFilter::try_new(&directives).unwrap_or_else(|e| {
        eprintln!("invalid log filter {directives:?}: {e}; using \"info\"");
        EnvFilter::new("info")
    });

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_harmless() {
        init("debug");
        assert!(!init("debug"));
        tracing::debug!(column = "City", "logging initialised");
    }

    #[test]
    fn configured_filter_used_without_env() {
        if std::env::var(LOG_ENV).is_err() {
            assert_eq!(effective_filter("semtab_enrich=debug"), "semtab_enrich=debug");
        }
    }
}
