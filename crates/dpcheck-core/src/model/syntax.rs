//! Bound syntax: declarations, statements and expressions.
//!
//! This is the slice of the host's syntax tree the analyzers look at. Every
//! node carries its byte span; identifiers carry the symbol the host bound
//! them to (or `None` when resolution failed).

use serde::{Deserialize, Serialize};

use super::types::TypeRef;
use super::SymbolId;
use crate::patch::{FileId, Span};

// ============================================================================
// Declarations
// ============================================================================

/// Where and how a source symbol is declared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Declaration {
    /// File containing the declaration.
    pub file: FileId,
    /// The whole declaration, modifiers included.
    pub span: Span,
    /// The declared identifier.
    pub name_span: Span,
    /// Kind-specific syntax.
    pub kind: DeclKind,
}

/// Kind-specific parts of a declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeclKind {
    Type,
    Field {
        type_syntax: TypeSyntax,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        initializer: Option<Expr>,
    },
    Property {
        type_syntax: TypeSyntax,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        getter: Option<Accessor>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        setter: Option<Accessor>,
    },
    Method {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        return_type: Option<TypeSyntax>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        body: Option<Body>,
    },
    Parameter {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        type_syntax: Option<TypeSyntax>,
    },
    Local,
}

impl Declaration {
    /// Visit every expression in the declaration, outermost first.
    pub fn walk_exprs<'a>(&'a self, f: &mut dyn FnMut(&'a Expr)) {
        match &self.kind {
            DeclKind::Field {
                initializer: Some(init),
                ..
            } => init.walk(f),
            DeclKind::Property { getter, setter, .. } => {
                for accessor in [getter, setter].into_iter().flatten() {
                    if let Some(body) = &accessor.body {
                        body.walk_exprs(f);
                    }
                }
            }
            DeclKind::Method {
                body: Some(body), ..
            } => body.walk_exprs(f),
            _ => {}
        }
    }
}

/// A type as written in source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeSyntax {
    /// The resolved type.
    pub ty: TypeRef,
    /// Span of the type syntax.
    pub span: Span,
}

/// A `get` or `set` accessor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Accessor {
    pub span: Span,
    /// `None` for auto-accessors (`get;`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Body>,
}

/// A member body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Body {
    /// `=> expr`
    Expression(Expr),
    /// `{ ... }`
    Block(Vec<Stmt>),
}

impl Body {
    /// Visit every expression in the body, outermost first.
    pub fn walk_exprs<'a>(&'a self, f: &mut dyn FnMut(&'a Expr)) {
        match self {
            Body::Expression(expr) => expr.walk(f),
            Body::Block(stmts) => {
                for stmt in stmts {
                    stmt.walk_exprs(f);
                }
            }
        }
    }

    /// Expressions this body can return: the expression of an expression
    /// body, or the value of each `return` statement.
    pub fn returned_exprs(&self) -> Vec<&Expr> {
        match self {
            Body::Expression(expr) => vec![expr],
            Body::Block(stmts) => {
                let mut out = Vec::new();
                for stmt in stmts {
                    stmt.walk_stmts(&mut |s| {
                        if let StmtKind::Return { value: Some(value) } = &s.kind {
                            out.push(value);
                        }
                    });
                }
                out
            }
        }
    }
}

// ============================================================================
// Statements
// ============================================================================

/// A statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stmt {
    pub span: Span,
    #[serde(flatten)]
    pub kind: StmtKind,
}

/// Statement kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stmt", rename_all = "snake_case")]
pub enum StmtKind {
    Expr {
        expr: Expr,
    },
    Return {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<Expr>,
    },
    Local {
        symbol: SymbolId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        initializer: Option<Expr>,
    },
    If {
        condition: Expr,
        then: Box<Stmt>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        otherwise: Option<Box<Stmt>>,
    },
    Block {
        stmts: Vec<Stmt>,
    },
    /// Anything the analyzers do not look into.
    Other,
}

impl Stmt {
    /// Visit this statement and every nested statement, outermost first.
    pub fn walk_stmts<'a>(&'a self, f: &mut dyn FnMut(&'a Stmt)) {
        f(self);
        match &self.kind {
            StmtKind::If {
                then, otherwise, ..
            } => {
                then.walk_stmts(f);
                if let Some(otherwise) = otherwise {
                    otherwise.walk_stmts(f);
                }
            }
            StmtKind::Block { stmts } => {
                for stmt in stmts {
                    stmt.walk_stmts(f);
                }
            }
            _ => {}
        }
    }

    /// Visit every expression in this statement and its nested statements.
    pub fn walk_exprs<'a>(&'a self, f: &mut dyn FnMut(&'a Expr)) {
        self.walk_stmts(&mut |stmt| match &stmt.kind {
            StmtKind::Expr { expr } => expr.walk(f),
            StmtKind::Return { value: Some(value) } => value.walk(f),
            StmtKind::Local {
                initializer: Some(init),
                ..
            } => init.walk(f),
            StmtKind::If { condition, .. } => condition.walk(f),
            _ => {}
        });
    }
}

// ============================================================================
// Expressions
// ============================================================================

/// An expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub span: Span,
    #[serde(flatten)]
    pub kind: ExprKind,
    /// Type after implicit conversion, e.g. the delegate type a method group
    /// converts to when passed as a callback.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ty: Option<TypeRef>,
}

/// Binary operators the analyzers distinguish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Eq,
    NotEq,
    And,
    Or,
    Other,
}

/// A call or constructor argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Argument {
    /// Name of a named argument (`name: expr`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub expr: Expr,
}

/// Expression kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "expr", rename_all = "snake_case")]
pub enum ExprKind {
    /// `"text"`, with escapes resolved.
    StringLiteral { value: String },
    /// Numeric, boolean, `null` or `default` literal, as written.
    Literal { text: String },
    /// `nameof(operand)`
    NameOf { operand: Box<Expr> },
    /// `typeof(T)`
    TypeOf { type_syntax: TypeSyntax },
    /// A simple name.
    Identifier {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        symbol: Option<SymbolId>,
    },
    /// `target.name`
    MemberAccess {
        target: Box<Expr>,
        name: String,
        name_span: Span,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        symbol: Option<SymbolId>,
    },
    /// `callee(args)`
    Invocation { callee: Box<Expr>, args: Vec<Argument> },
    /// `new T(args)`
    ObjectCreation {
        type_syntax: TypeSyntax,
        args: Vec<Argument>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        constructor: Option<SymbolId>,
    },
    /// `(T)operand`
    Cast {
        type_syntax: TypeSyntax,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// `!operand`
    Not { operand: Box<Expr> },
    /// `target = value`
    Assign { target: Box<Expr>, value: Box<Expr> },
    /// `(params) => body`
    Lambda {
        #[serde(default)]
        parameters: Vec<SymbolId>,
        body: Box<Body>,
    },
    This,
    /// Anything the analyzers do not look into.
    Other,
}

impl Expr {
    /// Create an expression without a converted type.
    pub fn new(span: Span, kind: ExprKind) -> Self {
        Expr {
            span,
            kind,
            ty: None,
        }
    }

    /// Visit this expression and all sub-expressions, outermost first.
    pub fn walk<'a>(&'a self, f: &mut dyn FnMut(&'a Expr)) {
        f(self);
        match &self.kind {
            ExprKind::NameOf { operand }
            | ExprKind::Cast { operand, .. }
            | ExprKind::Not { operand } => operand.walk(f),
            ExprKind::MemberAccess { target, .. } => target.walk(f),
            ExprKind::Invocation { callee, args } => {
                callee.walk(f);
                for arg in args {
                    arg.expr.walk(f);
                }
            }
            ExprKind::ObjectCreation { args, .. } => {
                for arg in args {
                    arg.expr.walk(f);
                }
            }
            ExprKind::Binary { left, right, .. } => {
                left.walk(f);
                right.walk(f);
            }
            ExprKind::Assign { target, value } => {
                target.walk(f);
                value.walk(f);
            }
            ExprKind::Lambda { body, .. } => body.walk_exprs(f),
            _ => {}
        }
    }

    /// Symbol the expression names directly: the bound symbol of an
    /// identifier or member access.
    pub fn referenced_symbol(&self) -> Option<SymbolId> {
        match &self.kind {
            ExprKind::Identifier { symbol, .. } | ExprKind::MemberAccess { symbol, .. } => *symbol,
            _ => None,
        }
    }

    /// Span of the name token of an identifier or member access.
    pub fn name_span(&self) -> Option<Span> {
        match &self.kind {
            ExprKind::Identifier { .. } => Some(self.span),
            ExprKind::MemberAccess { name_span, .. } => Some(*name_span),
            _ => None,
        }
    }

    /// Name of an identifier or member access.
    pub fn simple_name(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Identifier { name, .. } | ExprKind::MemberAccess { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Strip casts.
    pub fn without_casts(&self) -> &Expr {
        let mut expr = self;
        while let ExprKind::Cast { operand, .. } = &expr.kind {
            expr = operand;
        }
        expr
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(name: &str, start: u32, symbol: Option<u32>) -> Expr {
        Expr::new(
            Span::new(start, start + name.len() as u32),
            ExprKind::Identifier {
                name: name.to_string(),
                symbol: symbol.map(SymbolId),
            },
        )
    }

    // GetValue(FooProperty)
    fn get_value_call() -> Expr {
        Expr::new(
            Span::new(0, 21),
            ExprKind::Invocation {
                callee: Box::new(ident("GetValue", 0, Some(1))),
                args: vec![Argument {
                    name: None,
                    expr: ident("FooProperty", 9, Some(2)),
                }],
            },
        )
    }

    #[test]
    fn walk_visits_outermost_first() {
        let call = get_value_call();
        let mut names = Vec::new();
        call.walk(&mut |e| names.push(e.simple_name().unwrap_or("<call>").to_string()));
        assert_eq!(names, vec!["<call>", "GetValue", "FooProperty"]);
    }

    #[test]
    fn returned_exprs_finds_nested_returns() {
        let ret = Stmt {
            span: Span::new(0, 30),
            kind: StmtKind::Return {
                value: Some(get_value_call()),
            },
        };
        let body = Body::Block(vec![Stmt {
            span: Span::new(0, 40),
            kind: StmtKind::Block { stmts: vec![ret] },
        }]);
        assert_eq!(body.returned_exprs().len(), 1);
    }

    #[test]
    fn without_casts_strips_nested_casts() {
        let inner = get_value_call();
        let cast = Expr::new(
            Span::new(0, 30),
            ExprKind::Cast {
                type_syntax: TypeSyntax {
                    ty: TypeRef::named("int"),
                    span: Span::new(1, 4),
                },
                operand: Box::new(inner.clone()),
            },
        );
        assert_eq!(cast.without_casts(), &inner);
    }

    #[test]
    fn expression_json_is_flat() {
        let json = serde_json::to_value(ident("Foo", 3, Some(7))).unwrap();
        assert_eq!(json["expr"], "identifier");
        assert_eq!(json["symbol"], 7);
        assert_eq!(json["span"]["start"], 3);
    }
}
