pub mod api;
pub mod coding;
pub mod config;
pub mod db;
pub mod models;
pub mod prescriptions;
pub mod validation;

use tracing_subscriber::EnvFilter;

pub use prescriptions::{PrescriptionService, ProcessingResult};

/// Install the global tracing subscriber. `RUST_LOG` wins over the default filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();
}
