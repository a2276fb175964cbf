//! Logging facade over `tracing`

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber: an env-filtered fmt layer.
///
/// `RUST_LOG` takes precedence; `default_filter` applies when it is unset
/// (e.g. `"info"` or `"info,svckit=debug"`). Calling this more than once is
/// a no-op, so test binaries may call it freely.
pub fn init(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_init_is_harmless() {
        init("debug");
        init("info");
        tracing::debug!("still alive");
    }
}
