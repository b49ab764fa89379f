//! Terminal formatting helpers.

mod progress;
mod tables;

pub use progress::PullProgressBar;
pub use tables::{format_bytes, print_separator, truncate_string};
