// ── Tracing setup ──

use tracing_subscriber::EnvFilter;

use crate::ConfigError;

/// Filter used when neither `RUST_LOG` nor a profile sets one.
pub const DEFAULT_FILTER: &str = "simplisafe=info";

/// Filter for a `-v` count: warn, info, debug, then trace.
pub fn filter_for_verbosity(verbosity: u8) -> String {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    format!("simplisafe={level}")
}

/// Install the global fmt subscriber. `RUST_LOG` wins over `filter`.
pub fn init(filter: &str, json: bool) -> Result<(), ConfigError> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false);

    let result = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| ConfigError::Logging(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_maps_to_levels() {
        assert_eq!(filter_for_verbosity(0), "simplisafe=warn");
        assert_eq!(filter_for_verbosity(2), "simplisafe=debug");
        assert_eq!(filter_for_verbosity(9), "simplisafe=trace");
    }

    #[test]
    fn second_init_reports_an_error() {
        // Whichever test installs first wins; a second install must fail
        // cleanly rather than panic.
        let _ = init(DEFAULT_FILTER, false);
        assert!(matches!(init(DEFAULT_FILTER, true), Err(ConfigError::Logging(_))));
    }
}
