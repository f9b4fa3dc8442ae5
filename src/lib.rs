//! Marionette – An embeddable behaviour-scripting runtime for simulated actors
//!
//! This crate provides the pieces a host server needs to drive scripted
//! non-player actors:
//! - Keyword tables for script actions, host events and actor controllers
//! - A concurrently readable live set of actor instances with isolated teardown
//! - Compact text codecs for angles, block positions and world locations
//! - One-shot migrations that import actors from other NPC systems
//! - A script library that reloads from disk on a fixed interval

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

/// Runtime core modules
pub mod runtime;

// Re-export key types for convenience
pub use runtime::{Runtime, RuntimeConfig};

/// Current version of the Marionette runtime
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
