//! Error handling foundation for tmail.
//!
//! Only the `Result` alias lives here. Each crate owns its domain error
//! enums; layers that talk to the outside world wrap them in a rootcause
//! `Report` so context can be attached as the error travels up.

use rootcause::Report;

/// A Result type alias using rootcause's Report for error handling.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;
