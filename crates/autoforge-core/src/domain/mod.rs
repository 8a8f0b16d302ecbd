//! Domain layer for the autoforge engine.
//!
//! The richer models (parsed diffs, validation results, workspaces) live
//! in their own modules; this layer holds the error taxonomy shared by
//! all of them.

pub mod error;

pub use error::{EngineError, Result};
