//! # gpsd-fix
//!
//! A Rust client for gpsd (the GPS service daemon) that turns its reports
//! into mode-aware fix records.
//!
//! ## Overview
//!
//! gpsd monitors GPS receivers attached to a host and serves their data as
//! newline-delimited JSON on TCP port 2947. This crate:
//!
//! - opens a session to gpsd and re-opens it on demand ([`session`])
//! - polls the latest report on request
//! - parses it into a [`fix::FixRecord`] whose fields are only reachable
//!   when the fix mode makes them meaningful
//! - derives position, speed, movement, precision, time and map links
//!
//! Sessions fail fast; waiting for a receiver to warm up is left to the
//! caller, with [`retry::RetryPolicy`] as the usual tool.
//!
//! ## Example
//!
//! ```no_run
//! use gpsd_fix::{retry::RetryPolicy, session::{SessionConfig, blocking::Session}};
//!
//! fn main() -> gpsd_fix::Result<()> {
//!     let mut session = Session::new(SessionConfig::default());
//!     session.connect()?;
//!
//!     let fix = RetryPolicy::default().run(|_| session.fetch_current())?;
//!     match fix.position() {
//!         Ok((lat, lon)) => println!("lat {lat}, lon {lon}: {}", fix.map_url()?),
//!         Err(e) => println!("no position yet: {e}"),
//!     }
//!     Ok(())
//! }
//! ```

use crate::error::GpsdError;

/// Low-level clients pairing gpsd requests with their replies
pub mod client;

/// Error types used throughout the library
pub mod error;

/// Typed fix records and derived quantities
pub mod fix;

/// Protocol definitions and message parsing for gpsd JSON protocol
pub mod protocol;

/// Caller-side bounded retry
pub mod retry;

/// Session managers owning the connection to gpsd
pub mod session;

/// Convenience type alias for Results with GpsdError
pub type Result<T> = core::result::Result<T, GpsdError>;
