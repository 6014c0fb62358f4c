//! Standby: hold requests until the files they ask for exist.
//!
//! A [`Waiter`] watches one output directory. Callers ask it to wait for an
//! artifact by name; if the file is already there the wait returns at once,
//! otherwise it blocks until a filesystem event for that name arrives, the
//! caller gives up, or the waiter shuts down.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use standby::Waiter;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let waiter = Arc::new(Waiter::new("/out", r"^output-.*\.dat$")?);
//!
//! // Watch in the background
//! let serving = Arc::clone(&waiter);
//! tokio::spawn(async move { serving.serve().await });
//!
//! // Block until /out/output-1.dat exists, or give up after five seconds
//! waiter.wait_timeout("output-1.dat", Duration::from_secs(5)).await?;
//!
//! // Put the same waiting in front of an axum router
//! let app: axum::Router = waiter.handle(axum::Router::new());
//! # let _ = app;
//! waiter.close();
//! # Ok(())
//! # }
//! ```
//!
//! # Semantics
//!
//! - Names whose base name doesn't match the pattern never block.
//! - Waiters on the same name share one [`PendingLock`]; a single event
//!   releases all of them.
//! - Releases happen a settle delay after the event, so writers that announce
//!   a file before flushing it get a moment to finish.
//! - After [`Waiter::close`] nothing blocks: in-flight waits resolve with
//!   [`WaitError::Closed`] and new ones pass straight through.

pub mod error;
pub mod locks;
pub mod middleware;
pub mod waiter;

pub use error::{WaitError, WaiterError};
pub use locks::{LockTable, PendingLock};
pub use middleware::{wait_for_artifact, Handleable};
pub use waiter::{Waiter, DEFAULT_SETTLE_DELAY};
