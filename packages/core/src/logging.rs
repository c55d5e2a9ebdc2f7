use tracing_subscriber::{fmt, EnvFilter};

/// Used when `RUST_LOG` is unset or unparsable. Booking decisions are
/// logged at `info`; sqlx statement logging is turned down.
pub const DEFAULT_LOG_FILTER: &str = "info,sqlx=warn";

/// Build the filter from a raw `RUST_LOG` value.
///
/// Returns the filter plus the rejected directive, if any, so the caller can
/// report it once the subscriber is installed.
pub fn build_filter(raw: Option<&str>) -> (EnvFilter, Option<String>) {
    match raw.map(str::trim).filter(|r| !r.is_empty()) {
        None => (EnvFilter::new(DEFAULT_LOG_FILTER), None),
        Some(directives) => match EnvFilter::try_new(directives) {
            Ok(filter) => (filter, None),
            Err(_) => (EnvFilter::new(DEFAULT_LOG_FILTER), Some(directives.to_string())),
        },
    }
}

/// Install the global subscriber. Call once, first thing in `main`.
pub fn init_logging() {
    let raw = std::env::var("RUST_LOG").ok();
    let (filter, rejected) = build_filter(raw.as_deref());

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    if let Some(directives) = rejected {
        tracing::warn!(
            "Ignoring invalid RUST_LOG '{}', using '{}'",
            directives,
            DEFAULT_LOG_FILTER
        );
    }
    tracing::info!("Logging initialized");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_or_blank_uses_default() {
        for raw in [None, Some(""), Some("   ")] {
            let (filter, rejected) = build_filter(raw);
            assert_eq!(filter.to_string(), EnvFilter::new(DEFAULT_LOG_FILTER).to_string());
            assert!(rejected.is_none());
        }
    }

    #[test]
    fn valid_directives_are_kept() {
        let (filter, rejected) = build_filter(Some("appointme_scheduler=debug"));
        assert_eq!(filter.to_string(), "appointme_scheduler=debug");
        assert!(rejected.is_none());
    }

    #[test]
    fn invalid_directives_fall_back_and_are_reported() {
        let (filter, rejected) = build_filter(Some("info,sqlx=loud"));
        assert_eq!(filter.to_string(), EnvFilter::new(DEFAULT_LOG_FILTER).to_string());
        assert_eq!(rejected.as_deref(), Some("info,sqlx=loud"));
    }
}
