pub mod config;
pub mod message;
pub mod snapshot;
pub mod telemetry;

pub use config::Config;
pub use message::{FALLBACK_KEY, MessageFields};
pub use snapshot::{InboundRequest, RequestSnapshot, SnapshotError};
pub use telemetry::init_tracing;
