//! Prompt construction.
//!
//! Turns a task kind and an analysis configuration into the instruction
//! sent to the generation backend.

pub mod builder;

pub use builder::{build, build_combined};
