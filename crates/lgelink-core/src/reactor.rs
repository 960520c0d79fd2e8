//! Event loop interface
//!
//! The engine owns no threads and never blocks. It is driven by an event
//! loop that watches the serial descriptor and one timer per descriptor,
//! and calls [`Engine::handle`](crate::protocol::Engine::handle) with
//! `ready = true` when the descriptor is readable or `ready = false` when
//! the armed timer expired. Each call runs to completion before the next,
//! which is what keeps engine state single-writer.

use std::io;
use std::os::unix::io::RawFd;
use std::time::{Duration, Instant};

/// Event loop services consumed by the engine
pub trait Reactor {
    /// Start watching `fd` for readability
    fn register(&mut self, fd: RawFd) -> io::Result<()>;

    /// Stop watching `fd` and drop its timer
    fn deregister(&mut self, fd: RawFd) -> io::Result<()>;

    /// Replace the timer for `fd` so that it fires `after` from now
    fn arm_timeout(&mut self, fd: RawFd, after: Duration);

    /// Current loop time
    fn now(&self) -> Instant;
}
