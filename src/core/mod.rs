//! Core types shared by every module.
//!
//! - [`ExtendsError`] - the error taxonomy of the resolution path
//! - [`ErrorContext`] / [`user_friendly_error`] - CLI-facing error reporting
//! - [`ResolveContext`] - cancellation and deadline for one resolution run

pub mod context;
pub mod error;

pub use context::ResolveContext;
pub use error::{ErrorContext, ExtendsError, user_friendly_error};
