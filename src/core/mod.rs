//! Core domain models for pipelines
//!
//! This module defines blocks, pipelines, their YAML mirror and the errors
//! raised while editing them.

pub mod block;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod slug;

pub use block::*;
pub use error::PipelineError;
pub use pipeline::*;
