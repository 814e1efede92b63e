//! Symbol graph adapter.
//!
//! [`SemanticModel`] is the query surface the analyzers use to look at the
//! host's parsed program. Every query is a pure function of an immutable
//! snapshot: no side effects, no errors. Anything the host could not resolve
//! shows up as `None` or an empty result, because missing and half-typed code
//! is the normal case while a user is editing.
//!
//! [`SymbolTable`] implements the trait directly. A real compiler integration
//! implements it over its own semantic model instead.
//!
//! # Example
//!
//! ```
//! use dpcheck_core::adapter::SemanticModel;
//! use dpcheck_core::model::{Symbol, SymbolKind, SymbolTable, TypeKind, TypeRef};
//!
//! let mut table = SymbolTable::new();
//! let base = table.add_symbol(Symbol::type_named("System.Windows.DependencyObject", TypeKind::Class));
//! let control = table.add_symbol(
//!     Symbol::type_named("Demo.FooControl", TypeKind::Class)
//!         .with_base_type(TypeRef::named("System.Windows.DependencyObject")),
//! );
//! let field = table.add_symbol(Symbol::new(SymbolKind::Field, "FooProperty").with_container(control));
//!
//! assert_eq!(table.members_of(control, false), vec![field]);
//! assert!(table.is_assignable_to(control, "System.Windows.DependencyObject"));
//! assert_eq!(table.base_type_of(control), Some(base));
//! ```

use std::collections::HashSet;

use crate::model::{DeclKind, Declaration, Expr, SourceFile, Symbol, SymbolId, SymbolKind, SymbolTable, TypeRef};
use crate::patch::{FileId, Span};

/// Base-type chains longer than this are treated as cyclic.
const MAX_BASE_DEPTH: usize = 64;

/// One occurrence of a symbol's name in source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Reference {
    pub file: FileId,
    pub span: Span,
    /// True for the declaring identifier itself.
    pub is_declaration: bool,
}

/// Read-only queries over a parsed snapshot.
///
/// Implementations must be safe to query from several threads at once.
pub trait SemanticModel: Send + Sync {
    /// Look up a symbol.
    fn symbol(&self, id: SymbolId) -> Option<&Symbol>;

    /// All source files in the snapshot.
    fn files(&self) -> &[SourceFile];

    /// Look up a source file.
    fn file(&self, id: FileId) -> Option<&SourceFile> {
        self.files().get(id.index())
    }

    /// Source declaration of a symbol. `None` for framework symbols.
    fn declaration_of(&self, id: SymbolId) -> Option<&Declaration> {
        self.symbol(id)?.declaration.as_ref()
    }

    /// Members of a type in declaration order. With `inherited`, members of
    /// base types follow the type's own members.
    fn members_of(&self, ty: SymbolId, inherited: bool) -> Vec<SymbolId>;

    /// The symbol an identifier or member access is bound to.
    fn resolve_identifier(&self, expr: &Expr) -> Option<SymbolId> {
        expr.referenced_symbol().filter(|id| self.symbol(*id).is_some())
    }

    /// Type of an expression after implicit conversion.
    ///
    /// Falls back to the declared type of the referenced symbol.
    fn type_of(&self, expr: &Expr) -> Option<TypeRef> {
        if let Some(ty) = &expr.ty {
            return Some(ty.clone());
        }
        let symbol = self.symbol(self.resolve_identifier(expr)?)?;
        match symbol.kind {
            SymbolKind::Field | SymbolKind::Property | SymbolKind::Local | SymbolKind::Parameter => {
                symbol.ty.clone()
            }
            _ => None,
        }
    }

    /// The type symbol a [`TypeRef`] names.
    fn type_symbol(&self, ty: &TypeRef) -> Option<SymbolId>;

    /// Base class of a type symbol.
    fn base_type_of(&self, ty: SymbolId) -> Option<SymbolId> {
        let base = self.symbol(ty)?.base_type.as_ref()?;
        self.type_symbol(base)
    }

    /// Declaration and every bound reference of a symbol, ordered by file
    /// then position.
    fn references_to(&self, id: SymbolId) -> Vec<Reference>;

    /// Symbols declared in a file, ordered by position.
    fn declarations_in(&self, file: FileId) -> Vec<SymbolId>;

    /// The symbol whose declaring identifier or bound reference covers
    /// `offset`.
    fn symbol_at(&self, file: FileId, offset: u32) -> Option<SymbolId>;

    /// The innermost member (field, property, method or constructor)
    /// declaration covering `offset`, falling back to the innermost type.
    fn enclosing_declaration(&self, file: FileId, offset: u32) -> Option<SymbolId>;

    /// The type containing a member, following containers upward.
    fn containing_type(&self, id: SymbolId) -> Option<SymbolId> {
        let mut current = self.symbol(id)?.container?;
        for _ in 0..MAX_BASE_DEPTH {
            let symbol = self.symbol(current)?;
            if symbol.kind == SymbolKind::Type {
                return Some(current);
            }
            current = symbol.container?;
        }
        None
    }

    /// True if the type is `qualified` or derives from it.
    fn is_assignable_to(&self, ty: SymbolId, qualified: &str) -> bool {
        let mut current = Some(ty);
        for _ in 0..MAX_BASE_DEPTH {
            let Some(id) = current else {
                return false;
            };
            let Some(symbol) = self.symbol(id) else {
                return false;
            };
            if symbol.qualified_name.as_deref() == Some(qualified) {
                return true;
            }
            current = self.base_type_of(id);
        }
        false
    }
}

impl SemanticModel for SymbolTable {
    fn symbol(&self, id: SymbolId) -> Option<&Symbol> {
        self.get(id)
    }

    fn files(&self) -> &[SourceFile] {
        &self.files
    }

    fn members_of(&self, ty: SymbolId, inherited: bool) -> Vec<SymbolId> {
        let Some(symbol) = self.get(ty) else {
            return Vec::new();
        };
        let mut members = symbol.members.clone();
        if inherited {
            let mut seen = HashSet::from([ty]);
            let mut base = self.base_type_of(ty);
            while let Some(id) = base {
                if !seen.insert(id) || seen.len() > MAX_BASE_DEPTH {
                    break;
                }
                if let Some(base_symbol) = self.get(id) {
                    members.extend(base_symbol.members.iter().copied());
                }
                base = self.base_type_of(id);
            }
        }
        members
    }

    fn type_symbol(&self, ty: &TypeRef) -> Option<SymbolId> {
        let name = ty.name()?;
        self.find_type(name)
    }

    fn references_to(&self, id: SymbolId) -> Vec<Reference> {
        let mut refs = Vec::new();
        if let Some(decl) = self.declaration_of(id) {
            refs.push(Reference {
                file: decl.file,
                span: decl.name_span,
                is_declaration: true,
            });
        }
        for symbol in &self.symbols {
            let Some(decl) = &symbol.declaration else {
                continue;
            };
            decl.walk_exprs(&mut |expr| {
                if expr.referenced_symbol() == Some(id) {
                    if let Some(span) = expr.name_span() {
                        refs.push(Reference {
                            file: decl.file,
                            span,
                            is_declaration: false,
                        });
                    }
                }
            });
        }
        refs.sort_by_key(|r| (r.file, r.span.start, r.span.end));
        refs.dedup_by_key(|r| (r.file, r.span));
        refs
    }

    fn declarations_in(&self, file: FileId) -> Vec<SymbolId> {
        let mut found: Vec<(u32, SymbolId)> = self
            .symbols
            .iter()
            .filter_map(|s| {
                let decl = s.declaration.as_ref()?;
                (decl.file == file).then_some((decl.span.start, s.symbol_id))
            })
            .collect();
        found.sort();
        found.into_iter().map(|(_, id)| id).collect()
    }

    fn symbol_at(&self, file: FileId, offset: u32) -> Option<SymbolId> {
        let covers = |span: Span| span.start <= offset && offset < span.end.max(span.start + 1);

        let mut best: Option<(u32, SymbolId)> = None;
        let mut consider = |span: Span, id: SymbolId| {
            if covers(span) && best.map_or(true, |(len, _)| span.len() < len) {
                best = Some((span.len(), id));
            }
        };

        for symbol in &self.symbols {
            let Some(decl) = &symbol.declaration else {
                continue;
            };
            if decl.file != file {
                continue;
            }
            consider(decl.name_span, symbol.symbol_id);
            decl.walk_exprs(&mut |expr| {
                if let (Some(id), Some(span)) = (expr.referenced_symbol(), expr.name_span()) {
                    consider(span, id);
                }
            });
        }
        best.map(|(_, id)| id)
    }

    fn enclosing_declaration(&self, file: FileId, offset: u32) -> Option<SymbolId> {
        let mut member: Option<(u32, SymbolId)> = None;
        let mut ty: Option<(u32, SymbolId)> = None;
        for symbol in &self.symbols {
            let Some(decl) = &symbol.declaration else {
                continue;
            };
            if decl.file != file || decl.span.start > offset || offset >= decl.span.end {
                continue;
            }
            let slot = match (&decl.kind, symbol.kind) {
                (DeclKind::Type, _) => &mut ty,
                (_, SymbolKind::Field | SymbolKind::Property | SymbolKind::Method | SymbolKind::Constructor) => {
                    &mut member
                }
                _ => continue,
            };
            if slot.map_or(true, |(len, _)| decl.span.len() < len) {
                *slot = Some((decl.span.len(), symbol.symbol_id));
            }
        }
        member.or(ty).map(|(_, id)| id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Argument, ExprKind, TypeKind, TypeSyntax};

    // "class Foo : DependencyObject { int BarProperty = Make(BarProperty); }"
    const SRC: &str = "class Foo : DependencyObject { int BarProperty = Make(BarProperty); }";

    fn span_of(needle: &str, nth: usize) -> Span {
        let start = SRC.match_indices(needle).nth(nth).unwrap().0 as u32;
        Span::new(start, start + needle.len() as u32)
    }

    fn table() -> (SymbolTable, SymbolId, SymbolId, SymbolId) {
        let mut table = SymbolTable::new();
        let file = table.add_file("Foo.cs", SRC);
        let dobj = table.add_symbol(Symbol::type_named("System.Windows.DependencyObject", TypeKind::Class));
        table.add_symbol(
            Symbol::new(SymbolKind::Method, "GetValue").with_container(dobj),
        );
        let foo = table.add_symbol(
            Symbol::type_named("Foo", TypeKind::Class)
                .with_base_type(TypeRef::named("System.Windows.DependencyObject"))
                .with_declaration(Declaration {
                    file,
                    span: Span::new(0, SRC.len() as u32),
                    name_span: span_of("Foo", 0),
                    kind: DeclKind::Type,
                }),
        );
        let make = table.add_symbol(Symbol::new(SymbolKind::Method, "Make").with_container(foo));

        let field_id = SymbolId(table.symbols.len() as u32);
        let reference = Expr::new(
            span_of("BarProperty", 1),
            ExprKind::Identifier {
                name: "BarProperty".into(),
                symbol: Some(field_id),
            },
        );
        let call_span = span_of("Make(BarProperty)", 0);
        let initializer = Expr::new(
            call_span,
            ExprKind::Invocation {
                callee: Box::new(Expr::new(
                    span_of("Make", 0),
                    ExprKind::Identifier {
                        name: "Make".into(),
                        symbol: Some(make),
                    },
                )),
                args: vec![Argument {
                    name: None,
                    expr: reference,
                }],
            },
        );
        let field = table.add_symbol(
            Symbol::new(SymbolKind::Field, "BarProperty")
                .with_container(foo)
                .with_type(TypeRef::named("int"))
                .with_declaration(Declaration {
                    file,
                    span: span_of("int BarProperty = Make(BarProperty);", 0),
                    name_span: span_of("BarProperty", 0),
                    kind: DeclKind::Field {
                        type_syntax: TypeSyntax {
                            ty: TypeRef::named("int"),
                            span: span_of("int", 0),
                        },
                        initializer: Some(initializer),
                    },
                }),
        );
        assert_eq!(field, field_id);
        (table, foo, make, field)
    }

    mod members {
        use super::*;

        #[test]
        fn own_members_in_declaration_order() {
            let (table, foo, make, field) = table();
            assert_eq!(table.members_of(foo, false), vec![make, field]);
        }

        #[test]
        fn inherited_members_follow_own_members() {
            let (table, foo, _, _) = table();
            let all = table.members_of(foo, true);
            assert_eq!(all.len(), 3);
            assert_eq!(table.symbol(all[2]).unwrap().name, "GetValue");
        }

        #[test]
        fn containing_type_of_member() {
            let (table, foo, _, field) = table();
            assert_eq!(table.containing_type(field), Some(foo));
        }
    }

    mod references {
        use super::*;

        #[test]
        fn declaration_then_uses() {
            let (table, _, _, field) = table();
            let refs = table.references_to(field);
            assert_eq!(refs.len(), 2);
            assert!(refs[0].is_declaration);
            assert_eq!(refs[1].span, span_of("BarProperty", 1));
        }

        #[test]
        fn symbol_at_prefers_innermost() {
            let (table, _, make, field) = table();
            let file = FileId(0);
            assert_eq!(table.symbol_at(file, span_of("BarProperty", 1).start), Some(field));
            assert_eq!(table.symbol_at(file, span_of("Make", 0).start + 1), Some(make));
            assert_eq!(table.symbol_at(file, 200), None);
        }

        #[test]
        fn enclosing_declaration_prefers_members() {
            let (table, foo, _, field) = table();
            let file = FileId(0);
            assert_eq!(table.enclosing_declaration(file, span_of("Make", 0).start), Some(field));
            assert_eq!(table.enclosing_declaration(file, 2), Some(foo));
        }
    }

    mod types {
        use super::*;

        #[test]
        fn type_of_falls_back_to_declared_type() {
            let (table, _, _, field) = table();
            let expr = Expr::new(
                Span::new(0, 0),
                ExprKind::Identifier {
                    name: "BarProperty".into(),
                    symbol: Some(field),
                },
            );
            assert_eq!(table.type_of(&expr), Some(TypeRef::named("int")));
        }

        #[test]
        fn unresolved_identifier_has_no_type() {
            let (table, _, _, _) = table();
            let expr = Expr::new(
                Span::new(0, 0),
                ExprKind::Identifier {
                    name: "Nope".into(),
                    symbol: Some(SymbolId(999)),
                },
            );
            assert_eq!(table.resolve_identifier(&expr), None);
            assert_eq!(table.type_of(&expr), None);
        }

        #[test]
        fn cyclic_base_types_terminate() {
            let mut table = SymbolTable::new();
            let a = table.add_symbol(
                Symbol::type_named("A", TypeKind::Class).with_base_type(TypeRef::named("B")),
            );
            table.add_symbol(Symbol::type_named("B", TypeKind::Class).with_base_type(TypeRef::named("A")));
            assert!(!table.is_assignable_to(a, "C"));
            assert_eq!(table.members_of(a, true).len(), 0);
        }
    }
}
