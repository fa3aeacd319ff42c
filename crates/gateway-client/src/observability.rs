use once_cell::sync::OnceCell;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

static INIT: OnceCell<()> = OnceCell::new();

fn resolve_env_filter() -> tracing_subscriber::EnvFilter {
    if let Ok(level) = std::env::var("GATEWAY_LOG_LEVEL")
        && let Ok(filter) = tracing_subscriber::EnvFilter::try_new(level)
    {
        return filter;
    }
    tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
}

fn json_requested() -> bool {
    std::env::var("GATEWAY_LOG_FORMAT")
        .map(|format| format.trim().eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// Installs a process-wide `tracing` subscriber once.
///
/// Library code only emits events; applications and demos call this.
///
/// Environment variables:
/// - `GATEWAY_LOG_LEVEL`: level/filter override (`info`, `gateway_client=debug`, ...).
/// - `RUST_LOG`: fallback filter when `GATEWAY_LOG_LEVEL` is unset or invalid.
/// - `GATEWAY_LOG_FORMAT=json`: JSON lines on stderr instead of compact console output.
///
/// A subscriber installed elsewhere first is left in place.
pub fn init_tracing() {
    INIT.get_or_init(|| {
        let env_filter = resolve_env_filter();
        if json_requested() {
            let json_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .with_target(false)
                .with_writer(std::io::stderr);
            let _ = tracing_subscriber::registry()
                .with(env_filter)
                .with(json_layer)
                .try_init();
        } else {
            let console_layer = tracing_subscriber::fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr);
            let _ = tracing_subscriber::registry()
                .with(env_filter)
                .with(console_layer)
                .try_init();
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        init_tracing();
        init_tracing();
        tracing::info!("tracing initialized twice without panicking");
    }
}
