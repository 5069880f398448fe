//! Poll-based tailing of the watched file.
//!
//! The watcher never relies on OS change notifications. Every poll it compares the
//! file's size (and, on Unix, its identity) with what has been indexed:
//!
//! - larger: index the new bytes, if following or nothing is indexed yet
//! - smaller, or a different file: the log was recreated; drop every row, reopen
//! - gone: wait for it to come back, then start over

pub mod state;
pub(crate) mod worker;

pub use state::{WatchOutcome, WatchState};
pub(crate) use worker::keep_watching;
