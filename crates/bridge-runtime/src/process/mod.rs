//! OS process primitives shared by the pod supervisor and runtime launcher.

mod shutdown;
mod stream;

pub use shutdown::{GRACEFUL_SIGNAL, terminate_child};
pub use stream::{OutputStream, spawn_line_reader};
