//! Tracing setup
//!
//! One fmt layer to stdout, filtered by `RUST_LOG` with an `info` fallback.
//! Init is idempotent so library tests and embedding binaries can both call
//! it without coordinating.

use once_cell::sync::OnceCell;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

static INIT: OnceCell<()> = OnceCell::new();

pub fn init_logging() {
    INIT.get_or_init(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false))
            .init();
    });
}
