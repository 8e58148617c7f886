//! Common utilities for carlink
//!
//! Shared functionality between the link core and the bridge binary:
//! logging setup, a small shared error type, and test helpers.

pub mod error;
pub mod logging;
pub mod test_utils;

pub use error::{Error, Result};
pub use logging::setup_logging;
