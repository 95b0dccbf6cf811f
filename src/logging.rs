//! Diagnostic logging.
//!
//! Per-page events (`debug!` per rendered page, `warn!` per failed page) and
//! stage boundaries (`info!`) go through `tracing`. The CLI's own report is
//! plain stdout (see [`crate::output`]); logs go to stderr so the two never
//! interleave in piped output.
//!
//! The filter comes from `RUST_LOG` when set, e.g. `RUST_LOG=docweld=debug`.

use tracing_subscriber::{
    Layer, filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "docweld=info";

pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_filter(filter),
        )
        .init();
}
