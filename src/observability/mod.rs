//! Tracing setup.
//!
//! The crate only emits `tracing` events and spans; installing a subscriber is
//! left to the host. With the `subscriber` feature, [`init_tracing`] installs a
//! console subscriber filtered by `RUST_LOG` (or the given fallback directive).

/// Install a global fmt subscriber.
///
/// `default_directive` is used when `RUST_LOG` is unset or invalid, e.g.
/// `"tool_search=debug"`. Returns `false` if a global subscriber already exists.
#[cfg(feature = "subscriber")]
pub fn init_tracing(default_directive: &str) -> bool {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .is_ok()
}
