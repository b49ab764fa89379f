//! Port definitions (trait abstractions) for external systems.
//!
//! Adapters implement these traits; the supervisor, runtime controller and
//! tunnel client only ever see the trait objects.

mod config_store;
mod event_emitter;
mod inference;

pub use config_store::{ConfigStore, ConfigStoreError, InMemoryConfigStore};
pub use event_emitter::{EventEmitter, NoopEmitter};
pub use inference::InferencePort;
