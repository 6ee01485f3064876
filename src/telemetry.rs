//! Log output setup.
//!
//! Library code only emits `tracing` events and spans; the binary decides
//! where they go. The filter comes from `RUST_LOG` and defaults to `info`.

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber: human-readable lines, or JSON lines when
/// `json` is set.
pub fn init_tracing(json: bool) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());

    let pretty = (!json).then(|| fmt::layer().with_target(true).with_thread_names(true));
    let structured = json.then(|| {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(pretty)
        .with(structured)
        .try_init()
}
