//! The adapter wraps an engine and exposes it through the coupling interface.
//!
//! The adapter owns the variable and grid registries and the engine itself.
//! Callers initialize it with a configuration file, alternate value reads and writes
//! with time stepping, then finalize it. Only one adapter may drive a given engine
//! instance at a time.

mod adapter;

#[cfg(test)]
mod tests;

// Public re-exports
pub use adapter::{ModelAdapter, Phase};
