//! Event emitter trait.
//!
//! Components hold an `Arc<dyn EventEmitter>` and never see channel types.

use crate::events::BridgeEvent;

/// Sink for bridge events.
///
/// Implementations must not block: emission happens from inside output
/// readers and process monitors.
pub trait EventEmitter: Send + Sync {
    fn emit(&self, event: BridgeEvent);
}

/// Emitter that discards everything, for tests and one-shot CLI commands.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEmitter;

impl NoopEmitter {
    pub const fn new() -> Self {
        Self
    }
}

impl EventEmitter for NoopEmitter {
    fn emit(&self, _event: BridgeEvent) {}
}
