//! evreplay - record raw Android input events and replay them byte-exact.
//!
//! A capture streams `/dev/input/eventN` from the device through a privileged
//! shell, the frozen byte stream is decoded into kernel `input_event` records,
//! grouped, batched into blobs, and turned into a device script that writes
//! the blobs straight back onto the input node.

pub mod capture;
pub mod commands;
pub mod events;
pub mod planning;
pub mod project;
pub mod utils;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize logging
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "evreplay=info,evreplay_lib=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::debug!("evreplay v{}", env!("CARGO_PKG_VERSION"));
}
