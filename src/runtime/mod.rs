//! Runtime for replaying transform programs against responses.
//!
//! This module provides the interpreter, the per-match value trace, the
//! path-query wrapper used by navigation and the compiler configuration loader.

pub mod config_loader;
pub mod interpreter;
pub mod jsonpath;
pub mod trace;

// Re-export key types
pub use config_loader::{ShapeConfig, DIRECTIVE_ENV};
pub use interpreter::Transformer;
pub use trace::Trace;
