//! dpcheck: dependency-property checks and fixes for WPF code.
//!
//! Recognizes the dependency-property declaration pattern in a symbol-table
//! snapshot of C# code, reports naming and consistency violations as
//! diagnostics, and synthesizes hash-anchored patches that fix them.

// Core infrastructure - re-exported from dpcheck-core
pub use dpcheck_core::adapter;
pub use dpcheck_core::config;
pub use dpcheck_core::diagnostics;
pub use dpcheck_core::error;
pub use dpcheck_core::model;
pub use dpcheck_core::patch;
pub use dpcheck_core::text;
pub use dpcheck_core::types;
pub use dpcheck_core::CancellationToken;

// The dependency-property engine
pub use dpcheck_wpf::{fixes, fixture, known, names, pattern, recognizer, registration, rules, validation};
pub use dpcheck_wpf::{Analyzer, CodeAction, Recognizer};

// Front door
pub mod cli;
pub mod output;
