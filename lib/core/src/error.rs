//! Error handling foundation for the switchyard workspace.
//!
//! This module provides only the `Result` type alias using rootcause.
//! Each crate defines its own domain-specific error types in their own
//! error modules; binaries wrap them in a `Report` with layer-appropriate
//! context as errors propagate up the stack.

use rootcause::Report;

/// A Result type alias using rootcause's Report for error handling.
///
/// `C` is the context type the report is rooted at.
pub type Result<T, C> = std::result::Result<T, Report<C>>;
