//! A small C# front end that builds snapshots from source text.
//!
//! The fixture parses a subset of C# (types, fields, properties, methods,
//! constructors, and the statements and expressions dependency-property code
//! is written with), binds names against a metadata-only slice of the WPF
//! framework, and produces a [`SymbolTable`] with exact spans. It backs the
//! crate's tests and the CLI's `--source` input; a real integration builds
//! the table from its compiler instead.
//!
//! ```
//! use dpcheck_wpf::fixture::Fixture;
//!
//! let fixture = Fixture::parse(&[(
//!     "Foo.cs",
//!     "public class FooControl : Control { public int Bar { get; set; } }",
//! )])
//! .unwrap();
//! let bar = fixture.property("FooControl", "Bar");
//! assert_eq!(fixture.table().symbols[bar.index()].name, "Bar");
//! ```

mod binder;
mod framework;
mod lexer;
mod parser;

use std::collections::HashMap;

use thiserror::Error;
use tracing::debug;

use dpcheck_core::model::{SymbolId, SymbolKind, SymbolTable};
use dpcheck_core::patch::{FileId, Span};
use dpcheck_core::text::byte_offset_to_position;

pub use parser::ParseError;

/// A source file the fixture could not parse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FixtureError {
    #[error("{path}:{line}:{col}: {message}")]
    Parse {
        path: String,
        message: String,
        line: u32,
        col: u32,
    },
}

/// A bound snapshot built from C# source.
#[derive(Debug, Clone)]
pub struct Fixture {
    table: SymbolTable,
}

impl Fixture {
    /// Parse and bind `(path, content)` pairs into one snapshot.
    pub fn parse(files: &[(&str, &str)]) -> Result<Self, FixtureError> {
        let mut table = SymbolTable::new();
        framework::install(&mut table);

        let mut parsed = Vec::with_capacity(files.len());
        for (path, content) in files {
            let file = table.add_file(*path, *content);
            let types = parser::Parser::new(content)
                .and_then(parser::Parser::parse)
                .map_err(|err| {
                    let (line, col) = byte_offset_to_position(content.as_bytes(), err.offset);
                    FixtureError::Parse {
                        path: path.to_string(),
                        message: err.message,
                        line,
                        col,
                    }
                })?;
            parsed.push((file, types));
        }

        let table = binder::bind(table, parsed);
        debug!(files = files.len(), symbols = table.symbols.len(), "fixture bound");
        Ok(Fixture { table })
    }

    /// The snapshot.
    pub fn table(&self) -> &SymbolTable {
        &self.table
    }

    pub fn into_table(self) -> SymbolTable {
        self.table
    }

    /// Current text of every file, keyed for patch application.
    pub fn contents(&self) -> HashMap<FileId, String> {
        self.table
            .files
            .iter()
            .map(|f| (f.file_id, f.content.clone()))
            .collect()
    }

    // ========== Lookup helpers ==========

    /// Source type by simple or fully-qualified name.
    ///
    /// # Panics
    ///
    /// If no source type has that name.
    pub fn type_named(&self, name: &str) -> SymbolId {
        self.table
            .symbols
            .iter()
            .find(|s| {
                s.kind == SymbolKind::Type
                    && s.is_source()
                    && (s.name == name || s.qualified_name.as_deref() == Some(name))
            })
            .map(|s| s.symbol_id)
            .unwrap_or_else(|| panic!("no source type named '{name}'"))
    }

    /// Member of a source type by name, any kind except constructors.
    ///
    /// # Panics
    ///
    /// If the type or member does not exist.
    pub fn member(&self, ty: &str, name: &str) -> SymbolId {
        self.find_member(ty, name, |_| true)
    }

    /// # Panics
    ///
    /// If the type has no field `name`.
    pub fn field(&self, ty: &str, name: &str) -> SymbolId {
        self.find_member(ty, name, |kind| kind == SymbolKind::Field)
    }

    /// # Panics
    ///
    /// If the type has no property `name`.
    pub fn property(&self, ty: &str, name: &str) -> SymbolId {
        self.find_member(ty, name, |kind| kind == SymbolKind::Property)
    }

    /// First method `name` of the type.
    ///
    /// # Panics
    ///
    /// If the type has no method `name`.
    pub fn method(&self, ty: &str, name: &str) -> SymbolId {
        self.find_member(ty, name, |kind| kind == SymbolKind::Method)
    }

    fn find_member(&self, ty: &str, name: &str, accept: impl Fn(SymbolKind) -> bool) -> SymbolId {
        let owner = self.type_named(ty);
        self.table.symbols[owner.index()]
            .members
            .iter()
            .map(|id| &self.table.symbols[id.index()])
            .find(|s| s.name == name && s.kind != SymbolKind::Constructor && accept(s.kind))
            .map(|s| s.symbol_id)
            .unwrap_or_else(|| panic!("no member '{name}' on '{ty}'"))
    }

    /// # Panics
    ///
    /// If no file has that path.
    pub fn file(&self, path: &str) -> FileId {
        self.table
            .files
            .iter()
            .find(|f| f.path == path)
            .map(|f| f.file_id)
            .unwrap_or_else(|| panic!("no file '{path}'"))
    }

    /// Span of the `nth` occurrence of `needle` in a file.
    ///
    /// # Panics
    ///
    /// If the file does not exist or has fewer occurrences.
    pub fn span_of(&self, path: &str, needle: &str, nth: usize) -> Span {
        let content = &self.table.files[self.file(path).index()].content;
        let (start, _) = content
            .match_indices(needle)
            .nth(nth)
            .unwrap_or_else(|| panic!("'{needle}' occurs fewer than {} times in '{path}'", nth + 1));
        Span::new(start as u32, (start + needle.len()) as u32)
    }
}
