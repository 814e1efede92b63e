//! Snapshot model: the host's parsed program as plain data.
//!
//! A [`SymbolTable`] holds every source file and every symbol the analyzers
//! may ask about, including framework (metadata) symbols that have no source
//! declaration. Ids are dense indices, so lookups are O(1) and the whole
//! table round-trips through JSON.
//!
//! The table is immutable once handed to the analyzers; all queries go
//! through the [`SemanticModel`](crate::adapter::SemanticModel) trait.

pub mod syntax;
pub mod types;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::SnapshotError;
use crate::patch::FileId;

pub use syntax::{
    Accessor, Argument, BinaryOp, Body, DeclKind, Declaration, Expr, ExprKind, Stmt, StmtKind,
    TypeSyntax,
};
pub use types::TypeRef;

// ============================================================================
// Identifiers
// ============================================================================

/// Identifier of a symbol: its index in [`SymbolTable::symbols`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SymbolId(pub u32);

impl SymbolId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sym_{}", self.0)
    }
}

// ============================================================================
// Symbols
// ============================================================================

/// What kind of entity a symbol is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Type,
    Field,
    Property,
    Method,
    Constructor,
    Parameter,
    Local,
}

/// Classification of a type symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    Class,
    Struct,
    Interface,
    Enum,
    Delegate,
}

impl TypeKind {
    /// Classes, interfaces and delegates have reference semantics.
    pub fn is_reference_type(self) -> bool {
        matches!(self, TypeKind::Class | TypeKind::Interface | TypeKind::Delegate)
    }
}

/// A declared entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symbol {
    pub symbol_id: SymbolId,
    pub kind: SymbolKind,
    /// Simple name.
    pub name: String,
    /// Fully-qualified name (types only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualified_name: Option<String>,
    /// Containing type, or containing method for parameters and locals.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<SymbolId>,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub is_readonly: bool,
    #[serde(default)]
    pub is_const: bool,
    /// Field, property, parameter or local type; method return type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ty: Option<TypeRef>,
    /// Classification (types only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_kind: Option<TypeKind>,
    /// Base class (types only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_type: Option<TypeRef>,
    /// Members in declaration order (types only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<SymbolId>,
    /// Parameters in order (methods and constructors only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<SymbolId>,
    /// Source declaration; `None` for framework symbols.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub declaration: Option<Declaration>,
}

impl Symbol {
    /// Create a symbol. The id is assigned by [`SymbolTable::add_symbol`].
    pub fn new(kind: SymbolKind, name: impl Into<String>) -> Self {
        Symbol {
            symbol_id: SymbolId(0),
            kind,
            name: name.into(),
            qualified_name: None,
            container: None,
            is_static: false,
            is_readonly: false,
            is_const: false,
            ty: None,
            type_kind: None,
            base_type: None,
            members: Vec::new(),
            parameters: Vec::new(),
            declaration: None,
        }
    }

    /// A type symbol named by its fully-qualified name.
    pub fn type_named(qualified: &str, type_kind: TypeKind) -> Self {
        let simple = qualified.rsplit('.').next().unwrap_or(qualified);
        let mut symbol = Symbol::new(SymbolKind::Type, simple);
        symbol.qualified_name = Some(qualified.to_string());
        symbol.type_kind = Some(type_kind);
        symbol
    }

    pub fn with_container(mut self, container: SymbolId) -> Self {
        self.container = Some(container);
        self
    }

    pub fn with_type(mut self, ty: TypeRef) -> Self {
        self.ty = Some(ty);
        self
    }

    pub fn with_base_type(mut self, base: TypeRef) -> Self {
        self.base_type = Some(base);
        self
    }

    pub fn with_static(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn with_readonly(mut self) -> Self {
        self.is_readonly = true;
        self
    }

    pub fn with_const(mut self) -> Self {
        self.is_const = true;
        self.is_static = true;
        self
    }

    pub fn with_declaration(mut self, declaration: Declaration) -> Self {
        self.declaration = Some(declaration);
        self
    }

    /// True if declared in source.
    pub fn is_source(&self) -> bool {
        self.declaration.is_some()
    }

    /// The type this symbol declares, as a [`TypeRef`] (types only).
    pub fn as_type_ref(&self) -> Option<TypeRef> {
        match self.kind {
            SymbolKind::Type => Some(TypeRef::named(
                self.qualified_name.as_deref().unwrap_or(&self.name),
            )),
            _ => None,
        }
    }
}

// ============================================================================
// Source files
// ============================================================================

/// A source file in the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    pub file_id: FileId,
    pub path: String,
    pub content: String,
}

// ============================================================================
// SymbolTable
// ============================================================================

/// The whole snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SymbolTable {
    #[serde(default)]
    pub files: Vec<SourceFile>,
    #[serde(default)]
    pub symbols: Vec<Symbol>,
}

impl SymbolTable {
    /// Create an empty table.
    pub fn new() -> Self {
        SymbolTable::default()
    }

    /// Add a source file.
    pub fn add_file(&mut self, path: impl Into<String>, content: impl Into<String>) -> FileId {
        let file_id = FileId(self.files.len() as u32);
        self.files.push(SourceFile {
            file_id,
            path: path.into(),
            content: content.into(),
        });
        file_id
    }

    /// Add a symbol, assigning its id. If the symbol has a container of
    /// kind `Type`, it is appended to that type's members.
    pub fn add_symbol(&mut self, mut symbol: Symbol) -> SymbolId {
        let id = SymbolId(self.symbols.len() as u32);
        symbol.symbol_id = id;
        let container = symbol.container;
        let is_parameter = symbol.kind == SymbolKind::Parameter;
        self.symbols.push(symbol);

        if let Some(parent) = container.and_then(|c| self.symbols.get_mut(c.index())) {
            match parent.kind {
                SymbolKind::Type => parent.members.push(id),
                SymbolKind::Method | SymbolKind::Constructor if is_parameter => {
                    parent.parameters.push(id)
                }
                _ => {}
            }
        }
        id
    }

    /// Look up a symbol.
    pub fn get(&self, id: SymbolId) -> Option<&Symbol> {
        self.symbols.get(id.index())
    }

    /// Look up a symbol for modification.
    pub fn get_mut(&mut self, id: SymbolId) -> Option<&mut Symbol> {
        self.symbols.get_mut(id.index())
    }

    /// Find a type symbol by fully-qualified name.
    pub fn find_type(&self, qualified: &str) -> Option<SymbolId> {
        self.symbols
            .iter()
            .find(|s| s.kind == SymbolKind::Type && s.qualified_name.as_deref() == Some(qualified))
            .map(|s| s.symbol_id)
    }

    /// Parse a snapshot from JSON and check its ids are dense.
    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        let table: SymbolTable = serde_json::from_str(json)?;
        table.validate()?;
        Ok(table)
    }

    /// Check that ids match positions and references stay in range.
    pub fn validate(&self) -> Result<(), SnapshotError> {
        for (i, file) in self.files.iter().enumerate() {
            if file.file_id.index() != i {
                return Err(SnapshotError::Inconsistent {
                    message: format!("file '{}' has id {} at index {}", file.path, file.file_id, i),
                });
            }
        }
        let in_range = |id: SymbolId| id.index() < self.symbols.len();
        for (i, symbol) in self.symbols.iter().enumerate() {
            if symbol.symbol_id.index() != i {
                return Err(SnapshotError::Inconsistent {
                    message: format!(
                        "symbol '{}' has id {} at index {}",
                        symbol.name, symbol.symbol_id, i
                    ),
                });
            }
            let dangling = symbol
                .container
                .into_iter()
                .chain(symbol.members.iter().copied())
                .chain(symbol.parameters.iter().copied())
                .find(|id| !in_range(*id));
            if let Some(id) = dangling {
                return Err(SnapshotError::Inconsistent {
                    message: format!("symbol '{}' refers to missing {}", symbol.name, id),
                });
            }
            if let Some(decl) = &symbol.declaration {
                if decl.file.index() >= self.files.len() {
                    return Err(SnapshotError::Inconsistent {
                        message: format!("symbol '{}' declared in missing {}", symbol.name, decl.file),
                    });
                }
            }
        }
        Ok(())
    }
}
