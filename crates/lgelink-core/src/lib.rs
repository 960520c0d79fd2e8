//! # lgelink Core Library
//!
//! Serial control engine for LG displays.
//!
//! This library provides:
//! - The RS-232 command telegram codec and reply parser
//! - A bounded command queue with settle/verify handling for slow commands
//! - A non-blocking engine driven by an external event loop
//! - Serial line set-up and line configuration
//!
//! ## Example
//!
//! ```rust,ignore
//! use lgelink_core::{config::LineConfig, protocol::Engine};
//!
//! let config = LineConfig::load("/etc/lgelink.json")?;
//!
//! // Open the line and register it with the daemon's event loop
//! let mut engine = Engine::open(&mut reactor, &config)?;
//! engine.switch_on(&mut reactor, &config)?;
//!
//! // From the event loop, whenever the line is readable or its timer fires:
//! match engine.handle(&mut reactor, ready, now)? {
//!     Outcome::Shutdown => reactor.stop(),
//!     _ => {}
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod config;
pub mod protocol;
pub mod reactor;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::LineConfig;
    pub use crate::protocol::{
        Engine, LineChannel, Outcome, Phase, ProtocolError, QueueEntry, RetryPolicy,
        SerialChannel,
    };
    pub use crate::reactor::Reactor;
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
