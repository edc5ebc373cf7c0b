use std::sync::OnceLock;

static JSON_MODE: OnceLock<bool> = OnceLock::new();

pub fn set_json_mode(v: bool) {
    let _ = JSON_MODE.set(v);
}

/// Whether commands emit a JSON envelope on stdout.
pub fn json_mode() -> bool {
    *JSON_MODE.get().unwrap_or(&false)
}

const LOG_FORMAT_VAR: &str = "FEEDVIEW_LOG_FORMAT";
// sqlx logs every statement at info; the poller would flood the view
const DEFAULT_FILTER: &str = "info,sqlx=warn";

pub fn logs_are_json() -> bool {
    matches!(std::env::var(LOG_FORMAT_VAR).as_deref(), Ok("json"))
}

/// Logs go to stderr so stdout stays free for envelopes and rendered pages.
/// `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let fmt_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);
    let registry = tracing_subscriber::registry().with(filter);
    let _ = if logs_are_json() {
        registry.with(fmt_layer.json().flatten_event(true)).try_init()
    } else {
        registry.with(fmt_layer.compact()).try_init()
    };
}
