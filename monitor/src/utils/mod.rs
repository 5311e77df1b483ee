//! Shared utilities.
//!
//! - [`timer`]: deadline-based one-shot timers driven by the host loop

pub mod timer;

pub use timer::{earliest, to_delta, Timer};
