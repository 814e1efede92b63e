//! Name binding for parsed fixture sources.
//!
//! Binding runs in three passes over every file at once:
//!
//! 1. declare a symbol for every type, nested types included;
//! 2. resolve base types, then declare fields, properties, methods,
//!    constructors and their parameters;
//! 3. allocate locals and bind every identifier, member access, invocation
//!    and object creation inside each member.
//!
//! Overloads are chosen by argument count and argument shape. Method groups
//! and lambdas passed to a delegate parameter get the delegate as their
//! converted type.

use std::collections::HashMap;

use dpcheck_core::adapter::SemanticModel;
use dpcheck_core::model::types::{canonical_name, keyword_alias};
use dpcheck_core::model::{
    Argument, BinaryOp, Body, DeclKind, Declaration, Expr, ExprKind, Stmt, StmtKind, Symbol,
    SymbolId, SymbolKind, SymbolTable, TypeKind, TypeRef, TypeSyntax,
};
use dpcheck_core::patch::FileId;

use super::parser::{LocalDecl, Member, MemberKind, TypeDecl};
use crate::known;

/// Bind parsed files into `table`, which already holds the framework
/// symbols and the source files.
pub fn bind(table: SymbolTable, files: Vec<(FileId, Vec<TypeDecl>)>) -> SymbolTable {
    let mut flat = Vec::new();
    for (file, types) in files {
        for decl in types {
            flatten(file, decl, None, &mut flat);
        }
    }

    let mut binder = Binder {
        table,
        pending: Vec::new(),
    };
    let ids = binder.declare_types(&flat);
    binder.resolve_base_types(&flat, &ids);
    for (ty, owner) in flat.into_iter().zip(ids) {
        let owner_type = binder.table.get(owner).and_then(Symbol::as_type_ref);
        for member in ty.decl.members {
            binder.declare_member(ty.file, owner, owner_type.clone(), member);
        }
    }
    for pending in std::mem::take(&mut binder.pending) {
        binder.bind_member(pending);
    }
    binder.table
}

struct FlatType {
    file: FileId,
    decl: TypeDecl,
    parent: Option<usize>,
}

fn flatten(file: FileId, mut decl: TypeDecl, parent: Option<usize>, out: &mut Vec<FlatType>) {
    let nested = std::mem::take(&mut decl.nested);
    let index = out.len();
    out.push(FlatType { file, decl, parent });
    for inner in nested {
        flatten(file, inner, Some(index), out);
    }
}

/// A declared member waiting for its body to be bound.
struct PendingMember {
    symbol: SymbolId,
    owner: SymbolId,
    file: FileId,
    parameters: Vec<(String, SymbolId)>,
    locals: Vec<LocalDecl>,
}

/// Names visible inside one member.
struct Scope {
    owner: SymbolId,
    names: HashMap<String, SymbolId>,
    /// Real symbols for the parser's placeholder local ids.
    locals: Vec<SymbolId>,
}

impl Scope {
    fn local(&self, placeholder: SymbolId) -> SymbolId {
        self.locals
            .get(placeholder.index())
            .copied()
            .unwrap_or(placeholder)
    }
}

/// What a name or member access refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Bound {
    Symbol(SymbolId),
    /// A method group.
    Methods(Vec<SymbolId>),
    Namespace(String),
    Nothing,
}

impl Bound {
    fn symbol(&self) -> Option<SymbolId> {
        match self {
            Bound::Symbol(id) => Some(*id),
            Bound::Methods(methods) => methods.first().copied(),
            _ => None,
        }
    }
}

struct Binder {
    table: SymbolTable,
    pending: Vec<PendingMember>,
}

impl Binder {
    // ========== Declarations ==========

    fn declare_types(&mut self, flat: &[FlatType]) -> Vec<SymbolId> {
        let mut ids: Vec<SymbolId> = Vec::with_capacity(flat.len());
        for ty in flat {
            let decl = &ty.decl;
            let mut symbol = Symbol::type_named(&decl.qualified_name(), decl.type_kind)
                .with_declaration(Declaration {
                    file: ty.file,
                    span: decl.span,
                    name_span: decl.name_span,
                    kind: DeclKind::Type,
                });
            if decl.modifiers.is_static {
                symbol = symbol.with_static();
            }
            if let Some(parent) = ty.parent.and_then(|p| ids.get(p)) {
                symbol = symbol.with_container(*parent);
            }
            ids.push(self.table.add_symbol(symbol));
        }
        ids
    }

    fn resolve_base_types(&mut self, flat: &[FlatType], ids: &[SymbolId]) {
        for (ty, &id) in flat.iter().zip(ids) {
            if ty.decl.type_kind != TypeKind::Class {
                continue;
            }
            let base = ty
                .decl
                .base_types
                .iter()
                .map(|b| self.resolve_type(&b.ty, Some(id)))
                .find(|b| self.type_kind_of(b) == Some(TypeKind::Class))
                .unwrap_or_else(|| TypeRef::named(known::OBJECT));
            if let Some(symbol) = self.table.get_mut(id) {
                symbol.base_type = Some(base);
            }
        }
    }

    fn declare_member(&mut self, file: FileId, owner: SymbolId, owner_type: Option<TypeRef>, member: Member) {
        let Member {
            name,
            name_span,
            span,
            modifiers,
            kind,
            locals,
        } = member;

        let mut params = Vec::new();
        let mut setter_value = None;
        let (mut symbol, decl_kind) = match kind {
            MemberKind::Field {
                type_syntax,
                initializer,
            } => {
                let type_syntax = self.resolve_syntax(type_syntax, owner);
                (
                    Symbol::new(SymbolKind::Field, &name).with_type(type_syntax.ty.clone()),
                    DeclKind::Field {
                        type_syntax,
                        initializer,
                    },
                )
            }
            MemberKind::EnumMember => {
                let ty = owner_type.unwrap_or(TypeRef::Unknown);
                (
                    Symbol::new(SymbolKind::Field, &name).with_type(ty.clone()),
                    DeclKind::Field {
                        type_syntax: TypeSyntax { ty, span: name_span },
                        initializer: None,
                    },
                )
            }
            MemberKind::Property {
                type_syntax,
                getter,
                setter,
            } => {
                let type_syntax = self.resolve_syntax(type_syntax, owner);
                if setter.is_some() {
                    setter_value = Some(type_syntax.ty.clone());
                }
                (
                    Symbol::new(SymbolKind::Property, &name).with_type(type_syntax.ty.clone()),
                    DeclKind::Property {
                        type_syntax,
                        getter,
                        setter,
                    },
                )
            }
            MemberKind::Method {
                return_type,
                params: method_params,
                body,
            } => {
                let return_type = self.resolve_syntax(return_type, owner);
                params = method_params;
                (
                    Symbol::new(SymbolKind::Method, &name).with_type(return_type.ty.clone()),
                    DeclKind::Method {
                        return_type: Some(return_type),
                        body,
                    },
                )
            }
            MemberKind::Constructor {
                params: ctor_params,
                body,
            } => {
                params = ctor_params;
                (
                    Symbol::new(SymbolKind::Constructor, &name),
                    DeclKind::Method {
                        return_type: None,
                        body,
                    },
                )
            }
        };

        symbol.is_static = modifiers.is_static;
        symbol.is_readonly = modifiers.is_readonly;
        symbol.is_const = modifiers.is_const;
        let symbol = symbol.with_container(owner).with_declaration(Declaration {
            file,
            span,
            name_span,
            kind: decl_kind,
        });
        let id = self.table.add_symbol(symbol);

        let mut parameters = Vec::new();
        for param in params {
            let type_syntax = self.resolve_syntax(param.type_syntax, owner);
            let param_id = self.table.add_symbol(
                Symbol::new(SymbolKind::Parameter, &param.name)
                    .with_container(id)
                    .with_type(type_syntax.ty.clone())
                    .with_declaration(Declaration {
                        file,
                        span: param.span,
                        name_span: param.name_span,
                        kind: DeclKind::Parameter {
                            type_syntax: Some(type_syntax),
                        },
                    }),
            );
            parameters.push((param.name, param_id));
        }
        if let Some(ty) = setter_value {
            // Implicit `value`; it has no declaring identifier.
            let value = self.table.add_symbol(
                Symbol::new(SymbolKind::Parameter, "value")
                    .with_container(id)
                    .with_type(ty),
            );
            parameters.push(("value".to_string(), value));
        }

        self.pending.push(PendingMember {
            symbol: id,
            owner,
            file,
            parameters,
            locals,
        });
    }

    // ========== Bodies ==========

    fn bind_member(&mut self, pending: PendingMember) {
        let PendingMember {
            symbol: member,
            owner,
            file,
            parameters,
            locals,
        } = pending;

        let mut scope = Scope {
            owner,
            names: parameters.into_iter().collect(),
            locals: Vec::with_capacity(locals.len()),
        };
        for local in locals {
            let type_syntax = local.type_syntax.map(|ts| self.resolve_syntax(ts, owner));
            let mut symbol = Symbol::new(local.kind, &local.name);
            symbol.ty = type_syntax.as_ref().map(|ts| ts.ty.clone());
            let kind = match local.kind {
                SymbolKind::Parameter => DeclKind::Parameter { type_syntax },
                _ => DeclKind::Local,
            };
            let id = self.table.add_symbol(symbol.with_declaration(Declaration {
                file,
                span: local.name_span,
                name_span: local.name_span,
                kind,
            }));
            // Set after insertion so lambda parameters stay out of the
            // member's parameter list.
            if let Some(symbol) = self.table.get_mut(id) {
                symbol.container = Some(member);
            }
            scope.locals.push(id);
            scope.names.entry(local.name).or_insert(id);
        }

        let Some(mut decl) = self
            .table
            .get_mut(member)
            .and_then(|s| s.declaration.take())
        else {
            return;
        };
        match &mut decl.kind {
            DeclKind::Field {
                initializer: Some(init),
                ..
            } => {
                self.bind_expr(init, &scope);
            }
            DeclKind::Property { getter, setter, .. } => {
                for accessor in [getter, setter].into_iter().flatten() {
                    if let Some(body) = &mut accessor.body {
                        self.bind_body(body, &scope);
                    }
                }
            }
            DeclKind::Method {
                body: Some(body), ..
            } => self.bind_body(body, &scope),
            _ => {}
        }
        if let Some(symbol) = self.table.get_mut(member) {
            symbol.declaration = Some(decl);
        }
    }

    fn bind_body(&mut self, body: &mut Body, scope: &Scope) {
        match body {
            Body::Expression(expr) => {
                self.bind_expr(expr, scope);
            }
            Body::Block(stmts) => {
                for stmt in stmts {
                    self.bind_stmt(stmt, scope);
                }
            }
        }
    }

    fn bind_stmt(&mut self, stmt: &mut Stmt, scope: &Scope) {
        match &mut stmt.kind {
            StmtKind::Expr { expr } => {
                self.bind_expr(expr, scope);
            }
            StmtKind::Return { value: Some(value) } => {
                self.bind_expr(value, scope);
            }
            StmtKind::Local {
                symbol,
                initializer,
            } => {
                *symbol = scope.local(*symbol);
                if let Some(init) = initializer {
                    self.bind_expr(init, scope);
                    let untyped = self.table.get(*symbol).is_some_and(|s| s.ty.is_none());
                    if untyped {
                        let inferred = self.infer_type(init, scope);
                        if let Some(local) = self.table.get_mut(*symbol) {
                            local.ty = inferred;
                        }
                    }
                }
            }
            StmtKind::If {
                condition,
                then,
                otherwise,
            } => {
                self.bind_expr(condition, scope);
                self.bind_stmt(then, scope);
                if let Some(otherwise) = otherwise {
                    self.bind_stmt(otherwise, scope);
                }
            }
            StmtKind::Block { stmts } => {
                for stmt in stmts {
                    self.bind_stmt(stmt, scope);
                }
            }
            _ => {}
        }
    }

    fn bind_expr(&mut self, expr: &mut Expr, scope: &Scope) -> Bound {
        let mut converted = None;
        let bound = match &mut expr.kind {
            ExprKind::Identifier { name, symbol } => {
                let bound = self.lookup_name(name, scope);
                *symbol = bound.symbol();
                bound
            }
            ExprKind::MemberAccess {
                target,
                name,
                symbol,
                ..
            } => {
                let target_bound = self.bind_expr(target, scope);
                let bound = self.lookup_member(&target_bound, target, name, scope);
                *symbol = bound.symbol();
                bound
            }
            ExprKind::Invocation { callee, args } => {
                for arg in args.iter_mut() {
                    self.bind_expr(&mut arg.expr, scope);
                }
                let candidates = match self.bind_expr(callee, scope) {
                    Bound::Methods(methods) => methods,
                    _ => Vec::new(),
                };
                if let Some(chosen) = self.select_overload(&candidates, args, scope) {
                    if let ExprKind::Identifier { symbol, .. } | ExprKind::MemberAccess { symbol, .. } =
                        &mut callee.kind
                    {
                        *symbol = Some(chosen);
                    }
                    self.convert_arguments(chosen, args);
                }
                Bound::Nothing
            }
            ExprKind::ObjectCreation {
                type_syntax,
                args,
                constructor,
            } => {
                type_syntax.ty = self.resolve_type(&type_syntax.ty, Some(scope.owner));
                for arg in args.iter_mut() {
                    self.bind_expr(&mut arg.expr, scope);
                }
                let ty = type_syntax.ty.clone();
                if let Some(type_id) = self.table.type_symbol(&ty) {
                    if self.type_kind_of(&ty) == Some(TypeKind::Delegate) {
                        for arg in args.iter_mut() {
                            if self.is_function_value(&arg.expr) {
                                arg.expr.ty = Some(ty.clone());
                            }
                        }
                    } else {
                        let constructors: Vec<SymbolId> = self
                            .table
                            .members_of(type_id, false)
                            .into_iter()
                            .filter(|id| {
                                self.table
                                    .get(*id)
                                    .is_some_and(|s| s.kind == SymbolKind::Constructor)
                            })
                            .collect();
                        *constructor = self.select_overload(&constructors, args, scope);
                        if let Some(chosen) = *constructor {
                            self.convert_arguments(chosen, args);
                        }
                    }
                }
                converted = Some(ty);
                Bound::Nothing
            }
            ExprKind::Cast {
                type_syntax,
                operand,
            } => {
                type_syntax.ty = self.resolve_type(&type_syntax.ty, Some(scope.owner));
                self.bind_expr(operand, scope);
                Bound::Nothing
            }
            ExprKind::TypeOf { type_syntax } => {
                type_syntax.ty = self.resolve_type(&type_syntax.ty, Some(scope.owner));
                Bound::Nothing
            }
            ExprKind::NameOf { operand } | ExprKind::Not { operand } => {
                self.bind_expr(operand, scope);
                Bound::Nothing
            }
            ExprKind::Binary { left, right, .. } => {
                self.bind_expr(left, scope);
                self.bind_expr(right, scope);
                Bound::Nothing
            }
            ExprKind::Assign { target, value } => {
                self.bind_expr(target, scope);
                self.bind_expr(value, scope);
                Bound::Nothing
            }
            ExprKind::Lambda { parameters, body } => {
                for parameter in parameters.iter_mut() {
                    *parameter = scope.local(*parameter);
                }
                self.bind_body(body, scope);
                Bound::Nothing
            }
            _ => Bound::Nothing,
        };
        if converted.is_some() {
            expr.ty = converted;
        }
        bound
    }

    // ========== Lookup ==========

    /// Members named `name`, inherited ones included. Constructors are not
    /// found by name.
    fn members_named(&self, ty: SymbolId, name: &str) -> Vec<SymbolId> {
        self.table
            .members_of(ty, true)
            .into_iter()
            .filter(|id| {
                self.table
                    .get(*id)
                    .is_some_and(|s| s.name == name && s.kind != SymbolKind::Constructor)
            })
            .collect()
    }

    fn bound_members(&self, found: Vec<SymbolId>) -> Bound {
        let is_method = |id: &SymbolId| {
            self.table
                .get(*id)
                .is_some_and(|s| s.kind == SymbolKind::Method)
        };
        if found.is_empty() {
            Bound::Nothing
        } else if found.iter().all(is_method) {
            Bound::Methods(found)
        } else {
            found
                .into_iter()
                .find(|id| !is_method(id))
                .map_or(Bound::Nothing, Bound::Symbol)
        }
    }

    fn enclosing_types(&self, start: SymbolId) -> Vec<SymbolId> {
        let mut chain = vec![start];
        let mut current = start;
        while let Some(outer) = self
            .table
            .get(current)
            .and_then(|s| s.container)
            .filter(|c| self.table.get(*c).is_some_and(|s| s.kind == SymbolKind::Type))
        {
            chain.push(outer);
            current = outer;
        }
        chain
    }

    fn lookup_name(&self, name: &str, scope: &Scope) -> Bound {
        if let Some(id) = scope.names.get(name) {
            return Bound::Symbol(*id);
        }
        for ty in self.enclosing_types(scope.owner) {
            let found = self.members_named(ty, name);
            if !found.is_empty() {
                return self.bound_members(found);
            }
        }
        if let Some(ty) = self.resolve_type_name(name, Some(scope.owner)) {
            return Bound::Symbol(ty);
        }
        if self.is_namespace(name) {
            return Bound::Namespace(name.to_string());
        }
        Bound::Nothing
    }

    fn lookup_member(&self, target_bound: &Bound, target: &Expr, name: &str, scope: &Scope) -> Bound {
        match target_bound {
            Bound::Namespace(namespace) => {
                let qualified = format!("{namespace}.{name}");
                if let Some(ty) = self.table.find_type(&qualified) {
                    Bound::Symbol(ty)
                } else if self.is_namespace(&qualified) {
                    Bound::Namespace(qualified)
                } else {
                    Bound::Nothing
                }
            }
            Bound::Symbol(id) if self.table.get(*id).is_some_and(|s| s.kind == SymbolKind::Type) => {
                self.bound_members(self.members_named(*id, name))
            }
            _ => {
                let Some(ty) = self.infer_type(target, scope) else {
                    return Bound::Nothing;
                };
                let Some(type_id) = self.table.type_symbol(&ty) else {
                    return Bound::Nothing;
                };
                self.bound_members(self.members_named(type_id, name))
            }
        }
    }

    fn is_namespace(&self, prefix: &str) -> bool {
        let dotted = format!("{prefix}.");
        self.table.symbols.iter().any(|s| {
            s.kind == SymbolKind::Type
                && s.qualified_name
                    .as_deref()
                    .is_some_and(|q| q.starts_with(&dotted))
        }) && self.table.find_type(prefix).is_none()
    }

    /// Find a type by the name written in source: a nested type visible from
    /// `context`, a fully-qualified name, or a unique-enough suffix. Source
    /// types win over framework types.
    fn resolve_type_name(&self, name: &str, context: Option<SymbolId>) -> Option<SymbolId> {
        let canonical = canonical_name(name);
        if canonical != name {
            return self.table.find_type(canonical);
        }
        if !name.contains('.') {
            for ty in context.map(|c| self.enclosing_types(c)).unwrap_or_default() {
                let nested = self.members_named(ty, name).into_iter().find(|id| {
                    self.table
                        .get(*id)
                        .is_some_and(|s| s.kind == SymbolKind::Type)
                });
                if nested.is_some() {
                    return nested;
                }
            }
        }
        if let Some(id) = self.table.find_type(name) {
            return Some(id);
        }
        let suffix = format!(".{name}");
        self.table
            .symbols
            .iter()
            .filter(|s| {
                s.kind == SymbolKind::Type
                    && s.qualified_name
                        .as_deref()
                        .is_some_and(|q| q.ends_with(&suffix))
            })
            .min_by_key(|s| !s.is_source())
            .map(|s| s.symbol_id)
    }

    fn resolve_type(&self, ty: &TypeRef, context: Option<SymbolId>) -> TypeRef {
        match ty {
            TypeRef::Named { name, args } => {
                let args: Vec<TypeRef> = args.iter().map(|a| self.resolve_type(a, context)).collect();
                if keyword_alias(name).is_some() || name == "var" {
                    return TypeRef::generic(name, args);
                }
                if matches!(name.as_str(), "Nullable" | "System.Nullable") && args.len() == 1 {
                    return args.into_iter().next().map_or(TypeRef::Unknown, TypeRef::nullable);
                }
                match self
                    .resolve_type_name(name, context)
                    .and_then(|id| self.table.get(id))
                    .and_then(|s| s.qualified_name.as_deref())
                {
                    Some(qualified) => TypeRef::generic(qualified, args),
                    None => TypeRef::Unknown,
                }
            }
            TypeRef::Nullable { inner } => {
                let inner = self.resolve_type(inner, context);
                // `string?` annotates a reference type; the type itself is
                // unchanged.
                if self.is_reference_type(&inner) {
                    inner
                } else {
                    TypeRef::nullable(inner)
                }
            }
            TypeRef::Array { element, rank } => TypeRef::Array {
                element: Box::new(self.resolve_type(element, context)),
                rank: *rank,
            },
            TypeRef::Pointer { pointee } => TypeRef::Pointer {
                pointee: Box::new(self.resolve_type(pointee, context)),
            },
            TypeRef::Unknown => TypeRef::Unknown,
        }
    }

    fn resolve_syntax(&self, syntax: TypeSyntax, owner: SymbolId) -> TypeSyntax {
        TypeSyntax {
            ty: self.resolve_type(&syntax.ty, Some(owner)),
            span: syntax.span,
        }
    }

    fn type_kind_of(&self, ty: &TypeRef) -> Option<TypeKind> {
        self.table
            .get(self.table.type_symbol(ty)?)
            .and_then(|s| s.type_kind)
    }

    fn is_reference_type(&self, ty: &TypeRef) -> bool {
        if ty.is_named(known::STRING) || ty.is_named(known::OBJECT) {
            return true;
        }
        !ty.is_builtin_value_type() && self.type_kind_of(ty).is_some_and(TypeKind::is_reference_type)
    }

    // ========== Types of expressions ==========

    fn infer_type(&self, expr: &Expr, scope: &Scope) -> Option<TypeRef> {
        if let Some(ty) = &expr.ty {
            return Some(ty.clone());
        }
        match &expr.kind {
            ExprKind::StringLiteral { .. } | ExprKind::NameOf { .. } => Some(TypeRef::named(known::STRING)),
            ExprKind::Literal { text } => literal_type(text),
            ExprKind::Identifier { symbol, .. } | ExprKind::MemberAccess { symbol, .. } => {
                let symbol = self.table.get((*symbol)?)?;
                match symbol.kind {
                    SymbolKind::Field | SymbolKind::Property | SymbolKind::Local | SymbolKind::Parameter => {
                        symbol.ty.clone()
                    }
                    _ => None,
                }
            }
            ExprKind::Invocation { callee, .. } => {
                let method = self.table.get(callee.referenced_symbol()?)?;
                (method.kind == SymbolKind::Method)
                    .then(|| method.ty.clone())
                    .flatten()
            }
            ExprKind::ObjectCreation { type_syntax, .. } | ExprKind::Cast { type_syntax, .. } => {
                Some(type_syntax.ty.clone())
            }
            ExprKind::TypeOf { .. } => Some(TypeRef::named("System.Type")),
            ExprKind::Binary {
                op: BinaryOp::Eq | BinaryOp::NotEq | BinaryOp::And | BinaryOp::Or,
                ..
            }
            | ExprKind::Not { .. } => Some(TypeRef::named("bool")),
            ExprKind::Assign { value, .. } => self.infer_type(value, scope),
            ExprKind::This => self.table.get(scope.owner).and_then(Symbol::as_type_ref),
            _ => None,
        }
    }

    /// A lambda or a method group.
    fn is_function_value(&self, expr: &Expr) -> bool {
        match &expr.kind {
            ExprKind::Lambda { .. } => true,
            ExprKind::Identifier { .. } | ExprKind::MemberAccess { .. } => expr
                .referenced_symbol()
                .and_then(|id| self.table.get(id))
                .is_some_and(|s| s.kind == SymbolKind::Method),
            _ => false,
        }
    }

    // ========== Overloads ==========

    fn select_overload(&self, candidates: &[SymbolId], args: &[Argument], scope: &Scope) -> Option<SymbolId> {
        if let [only] = candidates {
            return Some(*only);
        }
        let mut best: Option<(u32, SymbolId)> = None;
        for &candidate in candidates {
            let Some(score) = self.applicability(candidate, args, scope) else {
                continue;
            };
            if best.map_or(true, |(top, _)| score > top) {
                best = Some((score, candidate));
            }
        }
        best.map(|(_, id)| id)
    }

    fn applicability(&self, candidate: SymbolId, args: &[Argument], scope: &Scope) -> Option<u32> {
        let params = &self.table.get(candidate)?.parameters;
        if params.len() != args.len() {
            return None;
        }
        let mapping = map_arguments(&self.table, params, args)?;
        let mut score = 0;
        for (arg, param) in args.iter().zip(mapping) {
            let param_ty = self.table.get(param)?.ty.as_ref()?;
            score += self.compatibility(param_ty, &arg.expr, scope)?;
        }
        Some(score)
    }

    /// How well `arg` converts to `param`: 3 for identity, 2 for a
    /// reference or nullable conversion, 1 for anything looser.
    fn compatibility(&self, param: &TypeRef, arg: &Expr, scope: &Scope) -> Option<u32> {
        let param_is_delegate = self.type_kind_of(param) == Some(TypeKind::Delegate);
        if self.is_function_value(arg) {
            return param_is_delegate.then_some(1);
        }
        if matches!(&arg.kind, ExprKind::Literal { text } if text == "null") {
            let accepts_null = !param.is_builtin_value_type() || matches!(param, TypeRef::Nullable { .. });
            return accepts_null.then_some(1);
        }
        let Some(arg_ty) = self.infer_type(arg, scope) else {
            return (!param_is_delegate).then_some(1);
        };
        if arg_ty.same_type(param) {
            return Some(3);
        }
        if param_is_delegate {
            return None;
        }
        if param.is_named(known::OBJECT) {
            return Some(1);
        }
        if let TypeRef::Nullable { inner } = param {
            if inner.same_type(&arg_ty) {
                return Some(2);
            }
        }
        if let (Some(arg_type), Some(param_name)) = (self.table.type_symbol(&arg_ty), param.name()) {
            if self.table.is_assignable_to(arg_type, param_name) {
                return Some(2);
            }
        }
        if (arg_ty.is_builtin_value_type() && param.is_builtin_value_type()) || arg_ty.is_unknown() {
            return Some(1);
        }
        None
    }

    /// Give method groups and lambdas the delegate type they convert to.
    fn convert_arguments(&self, chosen: SymbolId, args: &mut [Argument]) {
        let Some(params) = self.table.get(chosen).map(|s| s.parameters.clone()) else {
            return;
        };
        let Some(mapping) = map_arguments(&self.table, &params, args) else {
            return;
        };
        for (arg, param) in args.iter_mut().zip(mapping) {
            if !self.is_function_value(&arg.expr) {
                continue;
            }
            let param_ty = self.table.get(param).and_then(|p| p.ty.clone());
            if let Some(ty) = param_ty {
                if self.type_kind_of(&ty) == Some(TypeKind::Delegate) {
                    arg.expr.ty = Some(ty);
                }
            }
        }
    }
}

/// The parameter each argument binds to: named arguments by name,
/// positional ones by position. `None` if an argument has no parameter or
/// two arguments bind the same one.
fn map_arguments(table: &SymbolTable, params: &[SymbolId], args: &[Argument]) -> Option<Vec<SymbolId>> {
    let mut mapping = Vec::with_capacity(args.len());
    for (index, arg) in args.iter().enumerate() {
        let param = match &arg.name {
            Some(name) => params
                .iter()
                .copied()
                .find(|p| table.get(*p).is_some_and(|s| &s.name == name))?,
            None => *params.get(index)?,
        };
        if mapping.contains(&param) {
            return None;
        }
        mapping.push(param);
    }
    Some(mapping)
}

fn literal_type(text: &str) -> Option<TypeRef> {
    let name = match text {
        "true" | "false" => "bool",
        "null" => return None,
        _ if text.starts_with('\'') => "char",
        _ if text.starts_with(|c: char| c.is_ascii_digit() || c == '-' || c == '.') => {
            let hex = text.contains("0x") || text.contains("0X");
            let fractional = text.contains('.')
                || (!hex && text.ends_with(['f', 'F', 'd', 'D', 'm', 'M']));
            if fractional {
                "double"
            } else {
                "int"
            }
        }
        _ => return None,
    };
    Some(TypeRef::named(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::Fixture;

    fn invocation_target(fx: &Fixture, ty: &str, member: &str) -> Option<SymbolId> {
        let decl = fx.table().declaration_of(fx.member(ty, member)).unwrap();
        let mut found = None;
        decl.walk_exprs(&mut |e| {
            if let ExprKind::Invocation { callee, .. } = &e.kind {
                found = found.or(callee.referenced_symbol());
            }
        });
        found
    }

    #[test]
    fn base_type_chain_reaches_dependency_object() {
        let fx = Fixture::parse(&[("Foo.cs", "class FooControl : Control { }")]).unwrap();
        let foo = fx.type_named("FooControl");
        assert!(fx.table().is_assignable_to(foo, known::DEPENDENCY_OBJECT));
    }

    #[test]
    fn register_overload_by_arity() {
        let src = r#"class FooControl : Control
{
    public static readonly DependencyProperty BarProperty = DependencyProperty.Register(
        "Bar", typeof(int), typeof(FooControl), new PropertyMetadata(1));
}"#;
        let fx = Fixture::parse(&[("Foo.cs", src)]).unwrap();
        let register = invocation_target(&fx, "FooControl", "BarProperty").unwrap();
        let symbol = fx.table().symbol(register).unwrap();
        assert_eq!(symbol.name, "Register");
        assert_eq!(symbol.parameters.len(), 4);
    }

    #[test]
    fn set_value_picks_key_overload() {
        let src = r#"class FooControl : Control
{
    private static readonly DependencyPropertyKey BarPropertyKey = DependencyProperty.RegisterReadOnly(
        "Bar", typeof(int), typeof(FooControl), new PropertyMetadata(1));

    public int Bar { get => 0; private set => SetValue(BarPropertyKey, value); }
}"#;
        let fx = Fixture::parse(&[("Foo.cs", src)]).unwrap();
        let decl = fx.table().declaration_of(fx.property("FooControl", "Bar")).unwrap();
        let mut targets = Vec::new();
        decl.walk_exprs(&mut |e| {
            if let ExprKind::Invocation { callee, .. } = &e.kind {
                targets.extend(callee.referenced_symbol());
            }
        });
        let set_value = fx.table().symbol(targets[0]).unwrap();
        let first = fx.table().symbol(set_value.parameters[0]).unwrap();
        assert!(first.ty.as_ref().unwrap().is_named(known::DEPENDENCY_PROPERTY_KEY));
    }

    #[test]
    fn method_group_argument_gets_delegate_type() {
        let src = r#"class FooControl : Control
{
    static readonly PropertyMetadata Meta = new PropertyMetadata(0, OnChanged);
    static void OnChanged(DependencyObject d, DependencyPropertyChangedEventArgs e) { }
}"#;
        let fx = Fixture::parse(&[("Foo.cs", src)]).unwrap();
        let decl = fx.table().declaration_of(fx.field("FooControl", "Meta")).unwrap();
        let DeclKind::Field {
            initializer: Some(init),
            ..
        } = &decl.kind
        else {
            panic!("expected field initializer");
        };
        let ExprKind::ObjectCreation { args, constructor, .. } = &init.kind else {
            panic!("expected object creation");
        };
        assert!(constructor.is_some());
        assert_eq!(args[1].expr.referenced_symbol(), Some(fx.method("FooControl", "OnChanged")));
        assert!(args[1]
            .expr
            .ty
            .as_ref()
            .unwrap()
            .is_named(known::PROPERTY_CHANGED_CALLBACK));
    }

    #[test]
    fn keyword_types_and_nullable() {
        let src = "class C { int? A; string? B; List<int> C1; Missing D; }";
        let fx = Fixture::parse(&[("C.cs", src)]).unwrap();
        let ty = |name: &str| fx.table().symbol(fx.field("C", name)).unwrap().ty.clone().unwrap();
        assert_eq!(ty("A"), TypeRef::nullable(TypeRef::named("int")));
        assert_eq!(ty("B"), TypeRef::named("string"));
        assert_eq!(
            ty("C1"),
            TypeRef::generic("System.Collections.Generic.List", vec![TypeRef::named("int")])
        );
        assert!(ty("D").is_unknown());
    }

    #[test]
    fn locals_and_var_inference() {
        let src = r#"class C
{
    static string M()
    {
        var s = "x";
        return s;
    }
}"#;
        let fx = Fixture::parse(&[("C.cs", src)]).unwrap();
        let method = fx.method("C", "M");
        let local = fx
            .table()
            .symbols
            .iter()
            .find(|s| s.kind == SymbolKind::Local && s.name == "s")
            .unwrap();
        assert_eq!(local.container, Some(method));
        assert!(local.ty.as_ref().unwrap().is_named(known::STRING));
        let refs = fx.table().references_to(local.symbol_id);
        assert_eq!(refs.len(), 2);
    }

    #[test]
    fn nested_and_namespace_qualified_types() {
        let src = r#"namespace Demo
{
    class Outer
    {
        class Inner { }
        Inner Field;
        System.Windows.DependencyProperty Qualified;
    }
}"#;
        let fx = Fixture::parse(&[("C.cs", src)]).unwrap();
        let ty = |name: &str| fx.table().symbol(fx.field("Outer", name)).unwrap().ty.clone().unwrap();
        assert_eq!(ty("Field"), TypeRef::named("Demo.Outer.Inner"));
        assert_eq!(ty("Qualified"), TypeRef::named(known::DEPENDENCY_PROPERTY));
    }
}
