//! `sw-domain` — types shared by every spotweb crate: the error taxonomy,
//! client configuration, and structured trace events.

pub mod config;
pub mod error;
pub mod trace;

pub use error::{Error, Result};
