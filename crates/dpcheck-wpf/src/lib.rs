//! Dependency-property analysis for dpcheck.
//!
//! This crate provides the WPF-specific layer on top of `dpcheck-core`:
//! - Registration call parsing and the pattern recognizer
//! - Naming, structural and equality rules with the analysis driver
//! - Rename and equality code fixes
//! - A C# fixture front end that builds snapshots from source text

pub mod fixes;
pub mod fixture;
pub mod known;
pub mod names;
pub mod pattern;
pub mod recognizer;
pub mod registration;
pub mod rules;
pub mod validation;

pub use fixes::{CodeAction, FixEdit, FixError};
pub use pattern::{Miss, PatternInstance};
pub use recognizer::Recognizer;
pub use rules::{Analyzer, Finding, Remedy};
