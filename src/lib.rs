pub mod api;
pub mod config;
pub mod credentials; // Delegated service-account tokens for mail and archive
pub mod pipeline;
pub mod settings; // Routing table + sink toggles, read per run

use tracing_subscriber::EnvFilter;

/// Initialize tracing from `RUST_LOG`, falling back to the default filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();
}
