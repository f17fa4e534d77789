//! # netapp-example
//!
//! A small extension showing how applications build on the lifecycle:
//!
//! - a counter incremented once per second by a periodic timer
//! - a `count` CLI command and a `count:` line in `status`
//! - an HTTP endpoint answering every request with the counter value
//!
//! The counter is a shared atomic, so the HTTP server can run on an async
//! runtime while the application loop runs on its own thread.
//!
//! ```rust,ignore
//! let counter = CounterExtension::new();
//! let router = netapp_example::http::create_router(counter.handle());
//! let app = NetworkApplication::new(settings, platform).with_extension(counter);
//! ```

pub mod counter;
pub mod http;

pub use counter::{CounterExtension, SharedCount, COUNT_INTERVAL_MS};
pub use http::create_router;
