//! Pod worker supervision.
//!
//! # Structure
//!
//! - `supervisor` - Lifecycle state machine, readiness race, crash recovery
//! - `locator` - Bundled / development / PATH executable resolution
//! - `output` - Structured vs plain classification of worker output lines
//! - `log_ring` - Bounded buffer of captured log entries

mod locator;
mod log_ring;
mod output;
mod supervisor;

pub use locator::{DEFAULT_WORKER_COMMAND, ExecutableLocator};
pub use log_ring::{DEFAULT_LOG_CAPACITY, LogRing};
pub use output::{ParsedLine, PlainRecord, StructuredRecord, parse_line};
pub use supervisor::{
    NO_TOKEN_MESSAGE, PodSupervisor, SupervisorPolicy, is_unexpected_exit, worker_args,
};
