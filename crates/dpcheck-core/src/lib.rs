//! Core infrastructure for dpcheck.
//!
//! This crate provides language-agnostic infrastructure:
//! - Snapshot model (symbols, declarations, bound syntax, structural types)
//! - Symbol graph adapter (`SemanticModel`)
//! - Patch IR (hash-anchored edits, atomic patch sets)
//! - Diagnostics, analyzer options and error types
//! - Text position utilities

pub mod adapter;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod model;
pub mod patch;
pub mod text;
pub mod types;

pub use tokio_util::sync::CancellationToken;
