//! Live client state for the transcription backend.
//!
//! Keeps in-memory project and audio-file lists in step with the backend by
//! combining three sources: REST fetches, a server-push event stream per
//! channel and a polling fallback that runs only while something is still
//! processing.
//!
//! # Architecture
//!
//! - `stream`: reconnecting line-delimited event stream client
//! - `events`: decoding of stream payloads into domain events
//! - `domain`: entities and normalization of loosely-typed backend records
//! - `store`: project and file reducers with fetch sequencing
//! - `poll`: silent refresh while anything is processing
//! - `api`: REST client and error mapping
//! - `sync`: wiring of the above per channel
//! - `auth`, `config`: collaborators and settings

pub mod api;
pub mod auth;
pub mod config;
pub mod domain;
pub mod events;
pub mod poll;
pub mod store;
pub mod stream;
pub mod sync;

#[cfg(test)]
pub(crate) mod testing;

const DEFAULT_LOG_FILTER: &str = "scribeline=debug,scribeline_lib=debug,info";

/// Install the global `tracing` subscriber. `RUST_LOG` overrides the default
/// filter. Calling it twice is harmless.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
