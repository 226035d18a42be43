//! The log writer façade.
//!
//! Composes the shared arena and the cross-process lock into the three-call
//! surface the rest of the host uses: `init`, `write`, `flush`.

mod config;
mod log;

pub use config::{LogConfig, DEFAULT_CHUNK_CAPACITY, DEFAULT_FLUSH_RETRIES};
pub use log::LogWriter;
