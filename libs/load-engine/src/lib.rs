//! Rate-controlled load generator for the CRUD API.
//!
//! Four independent streams (one per operation kind) read the live
//! [`LoadConfig`] on every tick; the config is swapped at runtime through
//! the control API without restarting any stream.

pub mod config;
pub mod control;
pub mod dispatch;
pub mod error;
pub mod generator;
pub mod payload;

pub use config::{ConfigController, LoadConfig, Shape};
pub use dispatch::{DEFAULT_REQUEST_TIMEOUT, Dispatcher, HttpDispatcher};
pub use error::LoadError;
pub use generator::{IDLE_POLL, LoadGenerator, StreamCounters};
pub use payload::{IdTracker, OpRequest};
