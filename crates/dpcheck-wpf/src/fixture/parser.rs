//! Recursive descent parser for the C# subset the fixture front end reads.
//!
//! The parser builds the core syntax types directly, with every identifier
//! unbound and every type named as written. Locals and lambda parameters are
//! collected per member; a `Local` statement or lambda refers to them by
//! index until the binder allocates real symbols.
//!
//! Statements and expressions outside the subset (loops, `switch`, `try`,
//! object initializers, ...) are skipped as `Other` rather than rejected.

use dpcheck_core::model::{
    Accessor, Argument, BinaryOp, Body, Expr, ExprKind, Stmt, StmtKind, SymbolId, SymbolKind,
    TypeKind, TypeRef, TypeSyntax,
};
use dpcheck_core::patch::Span;

use super::lexer::{Lexer, Token, TokenKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    pub offset: u32,
}

impl ParseError {
    fn new(message: impl Into<String>, offset: u32) -> Self {
        ParseError {
            message: message.into(),
            offset,
        }
    }
}

type PResult<T> = Result<T, ParseError>;

// ============================================================================
// Parsed declarations
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub is_static: bool,
    pub is_readonly: bool,
    pub is_const: bool,
}

#[derive(Debug, Clone)]
pub struct TypeDecl {
    /// Enclosing namespace and types, dot-separated.
    pub qualifier: Option<String>,
    pub name: String,
    pub name_span: Span,
    pub span: Span,
    pub type_kind: TypeKind,
    pub modifiers: Modifiers,
    pub base_types: Vec<TypeSyntax>,
    pub members: Vec<Member>,
    pub nested: Vec<TypeDecl>,
}

impl TypeDecl {
    pub fn qualified_name(&self) -> String {
        match &self.qualifier {
            Some(q) => format!("{q}.{}", self.name),
            None => self.name.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Member {
    pub name: String,
    pub name_span: Span,
    pub span: Span,
    pub modifiers: Modifiers,
    pub kind: MemberKind,
    /// Locals and lambda parameters, indexed by placeholder id.
    pub locals: Vec<LocalDecl>,
}

#[derive(Debug, Clone)]
pub enum MemberKind {
    Field {
        type_syntax: TypeSyntax,
        initializer: Option<Expr>,
    },
    Property {
        type_syntax: TypeSyntax,
        getter: Option<Accessor>,
        setter: Option<Accessor>,
    },
    Method {
        return_type: TypeSyntax,
        params: Vec<Param>,
        body: Option<Body>,
    },
    Constructor {
        params: Vec<Param>,
        body: Option<Body>,
    },
    EnumMember,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub name_span: Span,
    pub span: Span,
    pub type_syntax: TypeSyntax,
}

#[derive(Debug, Clone)]
pub struct LocalDecl {
    pub name: String,
    pub name_span: Span,
    pub kind: SymbolKind,
    /// `None` for `var` and untyped lambda parameters.
    pub type_syntax: Option<TypeSyntax>,
}

// ============================================================================
// Parser
// ============================================================================

const MODIFIERS: &[&str] = &[
    "public", "private", "protected", "internal", "static", "readonly", "const", "partial",
    "abstract", "sealed", "virtual", "override", "new", "extern", "unsafe", "volatile", "async",
    "required", "file",
];

const TYPE_KEYWORDS: &[&str] = &["class", "struct", "interface", "enum", "record"];

const SKIPPED_STATEMENTS: &[&str] = &[
    "for", "foreach", "while", "do", "switch", "try", "catch", "finally", "using", "lock",
    "checked", "unchecked", "unsafe", "fixed", "break", "continue", "goto", "yield", "throw",
];

pub struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    current: usize,
    locals: Vec<LocalDecl>,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str) -> PResult<Self> {
        let tokens = Lexer::new(source)
            .tokenize()
            .map_err(|(message, offset)| ParseError::new(message, offset))?;
        Ok(Parser {
            source,
            tokens,
            current: 0,
            locals: Vec::new(),
        })
    }

    /// Parse a compilation unit into its type declarations.
    pub fn parse(mut self) -> PResult<Vec<TypeDecl>> {
        let mut types = Vec::new();
        self.parse_namespace_body(None, &mut types, true)?;
        Ok(types)
    }

    // ========== Token helpers ==========

    fn peek(&self) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[self.current.min(last)]
    }

    fn peek_at(&self, offset: usize) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.current + offset).min(last)]
    }

    fn kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    fn text(&self, token: &Token) -> &'a str {
        &self.source[token.span.range()]
    }

    fn peek_text(&self) -> &'a str {
        let token = self.peek();
        if token.kind == TokenKind::Ident {
            self.text(token)
        } else {
            ""
        }
    }

    fn at_word(&self, word: &str) -> bool {
        self.peek_text() == word
    }

    fn at(&self, kind: &TokenKind) -> bool {
        self.kind() == kind
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.current += 1;
        }
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_word(&mut self, word: &str) -> bool {
        if self.at_word(word) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> PResult<Token> {
        if self.at(kind) {
            Ok(self.advance())
        } else {
            Err(self.error(format!("expected {what}")))
        }
    }

    fn expect_ident(&mut self) -> PResult<(String, Span)> {
        if self.at(&TokenKind::Ident) {
            let token = self.advance();
            let text = self.text(&token);
            Ok((text.trim_start_matches('@').to_string(), token.span))
        } else {
            Err(self.error("expected identifier"))
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        let token = self.peek();
        let found = if token.kind == TokenKind::Eof {
            "end of file".to_string()
        } else {
            format!("'{}'", self.text(token))
        };
        ParseError::new(format!("{}, found {found}", message.into()), token.span.start)
    }

    fn prev_end(&self) -> u32 {
        self.current
            .checked_sub(1)
            .map_or(0, |i| self.tokens[i].span.end)
    }

    fn span_from(&self, start: u32) -> Span {
        Span::new(start, self.prev_end().max(start))
    }

    /// Skip a bracketed group starting at the current opening token.
    fn skip_balanced(&mut self) -> PResult<()> {
        let mut depth = 0usize;
        loop {
            match self.kind() {
                TokenKind::LParen | TokenKind::LBrace | TokenKind::LBracket => depth += 1,
                TokenKind::RParen | TokenKind::RBrace | TokenKind::RBracket => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        self.advance();
                        return Ok(());
                    }
                }
                TokenKind::Eof => return Err(self.error("unbalanced brackets")),
                _ => {}
            }
            self.advance();
        }
    }

    /// Skip to the end of the current statement or member: a `;` or a
    /// closing brace at depth zero.
    fn skip_statement(&mut self) -> PResult<()> {
        loop {
            match self.kind() {
                TokenKind::Semi => {
                    self.advance();
                    return Ok(());
                }
                TokenKind::LBrace => {
                    self.skip_balanced()?;
                    if !self.at(&TokenKind::Semi) && !self.at_word("while") && !self.at(&TokenKind::Assign) {
                        return Ok(());
                    }
                }
                TokenKind::LParen | TokenKind::LBracket => self.skip_balanced()?,
                TokenKind::RBrace | TokenKind::Eof => return Ok(()),
                _ => {
                    self.advance();
                }
            }
        }
    }

    // ========== Namespaces and types ==========

    fn parse_namespace_body(
        &mut self,
        namespace: Option<String>,
        out: &mut Vec<TypeDecl>,
        top_level: bool,
    ) -> PResult<()> {
        let mut namespace = namespace;
        loop {
            if self.at(&TokenKind::Eof) {
                return if top_level {
                    Ok(())
                } else {
                    Err(self.error("expected '}'"))
                };
            }
            if !top_level && self.eat(&TokenKind::RBrace) {
                return Ok(());
            }
            if self.eat_word("using") || self.eat_word("extern") {
                self.skip_statement()?;
                continue;
            }
            if self.eat_word("namespace") {
                let name = self.parse_dotted_name()?;
                let full = match &namespace {
                    Some(outer) => format!("{outer}.{name}"),
                    None => name,
                };
                if self.eat(&TokenKind::Semi) {
                    namespace = Some(full);
                } else {
                    self.expect(&TokenKind::LBrace, "'{'")?;
                    self.parse_namespace_body(Some(full), out, false)?;
                }
                continue;
            }
            let start = self.skip_attributes()?;
            let modifiers = self.parse_modifiers()?;
            if TYPE_KEYWORDS.contains(&self.peek_text()) {
                let decl = self.parse_type_decl(namespace.clone(), modifiers, start)?;
                out.push(decl);
            } else if self.eat_word("delegate") {
                self.skip_statement()?;
            } else {
                return Err(self.error("expected type declaration"));
            }
        }
    }

    fn parse_dotted_name(&mut self) -> PResult<String> {
        let (mut name, _) = self.expect_ident()?;
        while self.eat(&TokenKind::Dot) {
            let (part, _) = self.expect_ident()?;
            name.push('.');
            name.push_str(&part);
        }
        Ok(name)
    }

    /// Skip `[...]` attribute lists; returns the offset after them.
    fn skip_attributes(&mut self) -> PResult<u32> {
        while self.at(&TokenKind::LBracket) {
            self.skip_balanced()?;
        }
        Ok(self.peek().span.start)
    }

    fn parse_modifiers(&mut self) -> PResult<Modifiers> {
        let mut modifiers = Modifiers::default();
        loop {
            if self.at(&TokenKind::LBracket) {
                self.skip_balanced()?;
                continue;
            }
            let word = self.peek_text();
            if !MODIFIERS.contains(&word) {
                return Ok(modifiers);
            }
            // `new T(...)` and `record struct` are not modifiers.
            if word == "new" && self.peek_at(1).kind != TokenKind::Ident {
                return Ok(modifiers);
            }
            match word {
                "static" => modifiers.is_static = true,
                "readonly" => modifiers.is_readonly = true,
                "const" => {
                    modifiers.is_const = true;
                    modifiers.is_static = true;
                }
                _ => {}
            }
            self.advance();
        }
    }

    fn parse_type_decl(
        &mut self,
        qualifier: Option<String>,
        modifiers: Modifiers,
        start: u32,
    ) -> PResult<TypeDecl> {
        let keyword = self.advance();
        let mut type_kind = match self.text(&keyword) {
            "struct" => TypeKind::Struct,
            "interface" => TypeKind::Interface,
            "enum" => TypeKind::Enum,
            _ => TypeKind::Class,
        };
        if self.text(&keyword) == "record" && self.eat_word("struct") {
            type_kind = TypeKind::Struct;
        } else if self.text(&keyword) == "record" {
            self.eat_word("class");
        }
        let (name, name_span) = self.expect_ident()?;
        if self.at(&TokenKind::Lt) {
            self.skip_type_parameters()?;
        }
        if self.at(&TokenKind::LParen) {
            self.skip_balanced()?;
        }

        let mut base_types = Vec::new();
        if self.eat(&TokenKind::Colon) {
            loop {
                base_types.push(self.parse_type()?);
                if self.at(&TokenKind::LParen) {
                    self.skip_balanced()?;
                }
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        while !self.at(&TokenKind::LBrace) && !self.at(&TokenKind::Semi) {
            if self.at(&TokenKind::Eof) {
                return Err(self.error("expected type body"));
            }
            self.advance();
        }

        let nested_qualifier = match &qualifier {
            Some(q) => format!("{q}.{name}"),
            None => name.clone(),
        };
        let mut members = Vec::new();
        let mut nested = Vec::new();
        if self.eat(&TokenKind::LBrace) {
            if type_kind == TypeKind::Enum {
                self.parse_enum_members(&mut members)?;
            } else {
                while !self.eat(&TokenKind::RBrace) {
                    if self.at(&TokenKind::Eof) {
                        return Err(self.error("expected '}'"));
                    }
                    self.parse_member(&name, &nested_qualifier, &mut members, &mut nested)?;
                }
            }
        }
        self.eat(&TokenKind::Semi);

        Ok(TypeDecl {
            qualifier,
            name,
            name_span,
            span: self.span_from(start),
            type_kind,
            modifiers,
            base_types,
            members,
            nested,
        })
    }

    fn skip_type_parameters(&mut self) -> PResult<()> {
        let mut depth = 0usize;
        loop {
            match self.kind() {
                TokenKind::Lt => depth += 1,
                TokenKind::Gt => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        self.advance();
                        return Ok(());
                    }
                }
                TokenKind::Eof => return Err(self.error("unterminated type parameters")),
                _ => {}
            }
            self.advance();
        }
    }

    fn parse_enum_members(&mut self, out: &mut Vec<Member>) -> PResult<()> {
        loop {
            if self.eat(&TokenKind::RBrace) {
                return Ok(());
            }
            let start = self.skip_attributes()?;
            let (name, name_span) = self.expect_ident()?;
            if self.eat(&TokenKind::Assign) {
                self.locals.clear();
                self.parse_expr()?;
            }
            out.push(Member {
                name,
                name_span,
                span: self.span_from(start),
                modifiers: Modifiers {
                    is_static: true,
                    is_readonly: false,
                    is_const: true,
                },
                kind: MemberKind::EnumMember,
                locals: Vec::new(),
            });
            if !self.eat(&TokenKind::Comma) {
                self.expect(&TokenKind::RBrace, "'}'")?;
                return Ok(());
            }
        }
    }

    // ========== Members ==========

    fn parse_member(
        &mut self,
        type_name: &str,
        qualifier: &str,
        members: &mut Vec<Member>,
        nested: &mut Vec<TypeDecl>,
    ) -> PResult<()> {
        let start = self.skip_attributes()?;
        let modifiers = self.parse_modifiers()?;
        self.locals.clear();

        if TYPE_KEYWORDS.contains(&self.peek_text()) {
            let decl = self.parse_type_decl(Some(qualifier.to_string()), modifiers, start)?;
            nested.push(decl);
            return Ok(());
        }
        if self.eat_word("delegate") || self.eat_word("event") || self.at(&TokenKind::Punct) {
            return self.skip_statement();
        }

        // Constructor
        if self.at_word(type_name) && self.peek_at(1).kind == TokenKind::LParen {
            let (name, name_span) = self.expect_ident()?;
            let params = self.parse_parameters()?;
            if self.eat(&TokenKind::Colon) {
                self.advance();
                self.skip_balanced()?;
            }
            let body = self.parse_body()?;
            members.push(Member {
                name,
                name_span,
                span: self.span_from(start),
                modifiers,
                kind: MemberKind::Constructor { params, body },
                locals: std::mem::take(&mut self.locals),
            });
            return Ok(());
        }

        let type_syntax = self.parse_type()?;
        if self.at_word("operator") || self.at_word("this") {
            return self.skip_member();
        }
        let (mut name, mut name_span) = self.expect_ident()?;
        // Explicit interface implementation: `IFoo.Bar`.
        while self.at(&TokenKind::Dot) && self.peek_at(1).kind == TokenKind::Ident {
            self.advance();
            (name, name_span) = self.expect_ident()?;
        }
        if self.at(&TokenKind::Lt) {
            self.skip_type_parameters()?;
        }

        match self.kind() {
            TokenKind::LParen => {
                let params = self.parse_parameters()?;
                while self.at_word("where") {
                    while !self.at(&TokenKind::LBrace)
                        && !self.at(&TokenKind::Arrow)
                        && !self.at(&TokenKind::Semi)
                        && !self.at(&TokenKind::Eof)
                    {
                        self.advance();
                    }
                }
                let body = self.parse_body()?;
                members.push(Member {
                    name,
                    name_span,
                    span: self.span_from(start),
                    modifiers,
                    kind: MemberKind::Method {
                        return_type: type_syntax,
                        params,
                        body,
                    },
                    locals: std::mem::take(&mut self.locals),
                });
            }
            TokenKind::LBrace => {
                let (getter, setter) = self.parse_accessors()?;
                if self.eat(&TokenKind::Assign) {
                    self.parse_expr()?;
                    self.expect(&TokenKind::Semi, "';'")?;
                }
                members.push(Member {
                    name,
                    name_span,
                    span: self.span_from(start),
                    modifiers,
                    kind: MemberKind::Property {
                        type_syntax,
                        getter,
                        setter,
                    },
                    locals: std::mem::take(&mut self.locals),
                });
            }
            TokenKind::Arrow => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect(&TokenKind::Semi, "';'")?;
                let getter = Accessor {
                    span: expr.span,
                    body: Some(Body::Expression(expr)),
                };
                members.push(Member {
                    name,
                    name_span,
                    span: self.span_from(start),
                    modifiers,
                    kind: MemberKind::Property {
                        type_syntax,
                        getter: Some(getter),
                        setter: None,
                    },
                    locals: std::mem::take(&mut self.locals),
                });
            }
            _ => self.parse_field_declarators(start, modifiers, type_syntax, name, name_span, members)?,
        }
        Ok(())
    }

    fn skip_member(&mut self) -> PResult<()> {
        while !self.at(&TokenKind::LBrace) && !self.at(&TokenKind::Semi) && !self.at(&TokenKind::Arrow) {
            if self.at(&TokenKind::Eof) {
                return Err(self.error("unexpected end of member"));
            }
            if self.at(&TokenKind::LParen) || self.at(&TokenKind::LBracket) {
                self.skip_balanced()?;
            } else {
                self.advance();
            }
        }
        self.skip_statement()
    }

    fn parse_field_declarators(
        &mut self,
        start: u32,
        modifiers: Modifiers,
        type_syntax: TypeSyntax,
        name: String,
        name_span: Span,
        members: &mut Vec<Member>,
    ) -> PResult<()> {
        let mut declarators = vec![(name, name_span, None)];
        loop {
            if self.eat(&TokenKind::Assign) {
                let init = self.parse_expr()?;
                if let Some(last) = declarators.last_mut() {
                    last.2 = Some(init);
                }
            }
            if self.eat(&TokenKind::Comma) {
                let (name, name_span) = self.expect_ident()?;
                declarators.push((name, name_span, None));
                continue;
            }
            self.expect(&TokenKind::Semi, "';'")?;
            break;
        }
        let span = self.span_from(start);
        let locals = std::mem::take(&mut self.locals);
        for (name, name_span, initializer) in declarators {
            members.push(Member {
                name,
                name_span,
                span,
                modifiers,
                kind: MemberKind::Field {
                    type_syntax: type_syntax.clone(),
                    initializer,
                },
                locals: locals.clone(),
            });
        }
        Ok(())
    }

    fn parse_parameters(&mut self) -> PResult<Vec<Param>> {
        self.expect(&TokenKind::LParen, "'('")?;
        let mut params = Vec::new();
        if self.eat(&TokenKind::RParen) {
            return Ok(params);
        }
        loop {
            let start = self.skip_attributes()?;
            while ["ref", "out", "in", "params", "this", "scoped"].contains(&self.peek_text()) {
                self.advance();
            }
            let type_syntax = self.parse_type()?;
            let (name, name_span) = self.expect_ident()?;
            if self.eat(&TokenKind::Assign) {
                self.parse_expr()?;
            }
            params.push(Param {
                name,
                name_span,
                span: self.span_from(start),
                type_syntax,
            });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RParen, "')'")?;
        Ok(params)
    }

    /// `{ get ...; set ...; }`
    fn parse_accessors(&mut self) -> PResult<(Option<Accessor>, Option<Accessor>)> {
        self.expect(&TokenKind::LBrace, "'{'")?;
        let mut getter = None;
        let mut setter = None;
        while !self.eat(&TokenKind::RBrace) {
            let start = self.skip_attributes()?;
            while ["private", "protected", "internal", "public", "readonly"].contains(&self.peek_text()) {
                self.advance();
            }
            let (word, _) = self.expect_ident()?;
            let body = self.parse_body()?;
            let accessor = Accessor {
                span: self.span_from(start),
                body,
            };
            match word.as_str() {
                "get" => getter = Some(accessor),
                "set" | "init" => setter = Some(accessor),
                _ => {}
            }
        }
        Ok((getter, setter))
    }

    /// A member body: `{ ... }`, `=> expr;`, or `;`.
    fn parse_body(&mut self) -> PResult<Option<Body>> {
        if self.eat(&TokenKind::Semi) {
            return Ok(None);
        }
        if self.eat(&TokenKind::Arrow) {
            let expr = self.parse_expr()?;
            self.expect(&TokenKind::Semi, "';'")?;
            return Ok(Some(Body::Expression(expr)));
        }
        Ok(Some(Body::Block(self.parse_block()?)))
    }

    fn parse_block(&mut self) -> PResult<Vec<Stmt>> {
        self.expect(&TokenKind::LBrace, "'{'")?;
        let mut stmts = Vec::new();
        while !self.eat(&TokenKind::RBrace) {
            if self.at(&TokenKind::Eof) {
                return Err(self.error("expected '}'"));
            }
            stmts.push(self.parse_statement()?);
        }
        Ok(stmts)
    }

    // ========== Statements ==========

    fn parse_statement(&mut self) -> PResult<Stmt> {
        let start = self.peek().span.start;
        if self.at(&TokenKind::LBrace) {
            let stmts = self.parse_block()?;
            return Ok(Stmt {
                span: self.span_from(start),
                kind: StmtKind::Block { stmts },
            });
        }
        if self.eat(&TokenKind::Semi) {
            return Ok(Stmt {
                span: self.span_from(start),
                kind: StmtKind::Other,
            });
        }
        if self.eat_word("return") {
            let value = if self.at(&TokenKind::Semi) {
                None
            } else {
                Some(self.parse_expr()?)
            };
            self.expect(&TokenKind::Semi, "';'")?;
            return Ok(Stmt {
                span: self.span_from(start),
                kind: StmtKind::Return { value },
            });
        }
        if self.eat_word("if") {
            self.expect(&TokenKind::LParen, "'('")?;
            let condition = self.parse_expr()?;
            self.expect(&TokenKind::RParen, "')'")?;
            let then = Box::new(self.parse_statement()?);
            let otherwise = if self.eat_word("else") {
                Some(Box::new(self.parse_statement()?))
            } else {
                None
            };
            return Ok(Stmt {
                span: self.span_from(start),
                kind: StmtKind::If {
                    condition,
                    then,
                    otherwise,
                },
            });
        }
        if SKIPPED_STATEMENTS.contains(&self.peek_text())
            && !matches!(self.peek_at(1).kind, TokenKind::Dot | TokenKind::Assign)
        {
            self.advance();
            if self.at(&TokenKind::LParen) {
                self.skip_balanced()?;
            }
            if self.at(&TokenKind::LBrace) {
                self.skip_balanced()?;
                self.eat(&TokenKind::Semi);
            } else {
                self.skip_statement()?;
            }
            return Ok(Stmt {
                span: self.span_from(start),
                kind: StmtKind::Other,
            });
        }
        if let Some(stmt) = self.try_parse_local_declaration(start)? {
            return Ok(stmt);
        }
        let expr = self.parse_expr()?;
        self.expect(&TokenKind::Semi, "';'")?;
        Ok(Stmt {
            span: self.span_from(start),
            kind: StmtKind::Expr { expr },
        })
    }

    /// `var x = e;`, `T x = e, y;`, `const T x = e;`
    fn try_parse_local_declaration(&mut self, start: u32) -> PResult<Option<Stmt>> {
        let saved = self.current;
        let saved_locals = self.locals.len();
        self.eat_word("const");
        let Ok(type_syntax) = self.parse_type() else {
            self.current = saved;
            return Ok(None);
        };
        let is_declarator = self.at(&TokenKind::Ident)
            && matches!(
                self.peek_at(1).kind,
                TokenKind::Assign | TokenKind::Semi | TokenKind::Comma
            );
        if !is_declarator {
            self.current = saved;
            self.locals.truncate(saved_locals);
            return Ok(None);
        }

        let declared = (!type_syntax.ty.is_named("var")).then_some(type_syntax);
        let mut stmts = Vec::new();
        loop {
            let decl_start = self.peek().span.start;
            let (name, name_span) = self.expect_ident()?;
            let initializer = if self.eat(&TokenKind::Assign) {
                Some(self.parse_expr()?)
            } else {
                None
            };
            let symbol = self.declare_local(name, name_span, SymbolKind::Local, declared.clone());
            stmts.push(Stmt {
                span: self.span_from(decl_start),
                kind: StmtKind::Local {
                    symbol,
                    initializer,
                },
            });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::Semi, "';'")?;
        let span = self.span_from(start);
        let stmt = if stmts.len() == 1 {
            let mut only = stmts.remove(0);
            only.span = span;
            only
        } else {
            Stmt {
                span,
                kind: StmtKind::Block { stmts },
            }
        };
        Ok(Some(stmt))
    }

    fn declare_local(
        &mut self,
        name: String,
        name_span: Span,
        kind: SymbolKind,
        type_syntax: Option<TypeSyntax>,
    ) -> SymbolId {
        let id = SymbolId(self.locals.len() as u32);
        self.locals.push(LocalDecl {
            name,
            name_span,
            kind,
            type_syntax,
        });
        id
    }

    // ========== Types ==========

    /// Parse type syntax. Names are left as written; the binder resolves
    /// them.
    fn parse_type(&mut self) -> PResult<TypeSyntax> {
        let start = self.peek().span.start;
        if self.at(&TokenKind::LParen) {
            return Err(self.error("tuple types are not supported"));
        }
        let (first, _) = self.expect_ident()?;
        let mut name = first;
        if name == "global" && self.eat(&TokenKind::ColonColon) {
            name = self.expect_ident()?.0;
        }
        let mut args = Vec::new();
        loop {
            if self.at(&TokenKind::Lt) {
                args = self.parse_type_arguments()?;
            }
            if self.at(&TokenKind::Dot) && self.peek_at(1).kind == TokenKind::Ident {
                self.advance();
                let (part, _) = self.expect_ident()?;
                name.push('.');
                name.push_str(&part);
                args.clear();
                continue;
            }
            break;
        }
        let mut ty = TypeRef::generic(&name, args);
        loop {
            if self.at(&TokenKind::Question) && !self.question_is_conditional() {
                self.advance();
                ty = TypeRef::nullable(ty);
            } else if self.at(&TokenKind::Star) {
                self.advance();
                ty = TypeRef::Pointer {
                    pointee: Box::new(ty),
                };
            } else if self.at(&TokenKind::LBracket)
                && matches!(self.peek_at(1).kind, TokenKind::RBracket | TokenKind::Comma)
            {
                self.advance();
                let mut rank = 1;
                while self.eat(&TokenKind::Comma) {
                    rank += 1;
                }
                self.expect(&TokenKind::RBracket, "']'")?;
                ty = TypeRef::Array {
                    element: Box::new(ty),
                    rank,
                };
            } else {
                break;
            }
        }
        Ok(TypeSyntax {
            ty,
            span: self.span_from(start),
        })
    }

    /// A `?` after a type is nullable unless an expression follows it, as in
    /// `a ? b : c`. Speculative callers restore on a wrong guess.
    fn question_is_conditional(&self) -> bool {
        match &self.peek_at(1).kind {
            TokenKind::Ident => matches!(self.peek_at(2).kind, TokenKind::Colon | TokenKind::Dot),
            TokenKind::Str(_) | TokenKind::Number | TokenKind::Char | TokenKind::LParen => true,
            _ => false,
        }
    }

    fn parse_type_arguments(&mut self) -> PResult<Vec<TypeRef>> {
        self.expect(&TokenKind::Lt, "'<'")?;
        let mut args = Vec::new();
        if self.eat(&TokenKind::Gt) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_type()?.ty);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::Gt, "'>'")?;
        Ok(args)
    }

    // ========== Expressions ==========

    pub(super) fn parse_expr(&mut self) -> PResult<Expr> {
        let start = self.peek().span.start;
        let target = self.parse_conditional()?;
        if self.eat(&TokenKind::Assign) {
            let value = self.parse_expr()?;
            return Ok(Expr::new(
                self.span_from(start),
                ExprKind::Assign {
                    target: Box::new(target),
                    value: Box::new(value),
                },
            ));
        }
        if self.at(&TokenKind::Punct) && self.text(self.peek()).ends_with('=') {
            self.advance();
            let value = self.parse_expr()?;
            return Ok(Expr::new(
                self.span_from(start),
                ExprKind::Binary {
                    op: BinaryOp::Other,
                    left: Box::new(target),
                    right: Box::new(value),
                },
            ));
        }
        Ok(target)
    }

    fn parse_conditional(&mut self) -> PResult<Expr> {
        let start = self.peek().span.start;
        let condition = self.parse_binary(0)?;
        if !self.eat(&TokenKind::Question) {
            return Ok(condition);
        }
        let when_true = self.parse_expr()?;
        self.expect(&TokenKind::Colon, "':'")?;
        let when_false = self.parse_expr()?;
        // Kept as nested binaries so references inside stay visible.
        let branches = Expr::new(
            when_true.span.cover(when_false.span),
            ExprKind::Binary {
                op: BinaryOp::Other,
                left: Box::new(when_true),
                right: Box::new(when_false),
            },
        );
        Ok(Expr::new(
            self.span_from(start),
            ExprKind::Binary {
                op: BinaryOp::Other,
                left: Box::new(condition),
                right: Box::new(branches),
            },
        ))
    }

    /// Binary operators by precedence level, loosest first.
    fn binary_op(&self, level: u8) -> Option<BinaryOp> {
        let token = self.peek();
        match (level, &token.kind) {
            (0, TokenKind::Punct) if self.text(token) == "??" => Some(BinaryOp::Other),
            (1, TokenKind::OrOr) => Some(BinaryOp::Or),
            (2, TokenKind::AndAnd) => Some(BinaryOp::And),
            (3, TokenKind::Punct) if matches!(self.text(token), "|" | "^" | "&") => {
                Some(BinaryOp::Other)
            }
            (4, TokenKind::EqEq) => Some(BinaryOp::Eq),
            (4, TokenKind::NotEq) => Some(BinaryOp::NotEq),
            (5, TokenKind::Lt | TokenKind::Gt) => Some(BinaryOp::Other),
            (5, TokenKind::Punct) if matches!(self.text(token), "<=" | ">=") => Some(BinaryOp::Other),
            (6, TokenKind::Punct) if matches!(self.text(token), "<<") => Some(BinaryOp::Other),
            (7, TokenKind::Minus) => Some(BinaryOp::Other),
            (7, TokenKind::Punct) if self.text(token) == "+" => Some(BinaryOp::Other),
            (8, TokenKind::Star) => Some(BinaryOp::Other),
            (8, TokenKind::Punct) if matches!(self.text(token), "/" | "%") => Some(BinaryOp::Other),
            _ => None,
        }
    }

    fn parse_binary(&mut self, level: u8) -> PResult<Expr> {
        if level > 8 {
            return self.parse_unary();
        }
        let start = self.peek().span.start;
        let mut left = self.parse_binary(level + 1)?;
        loop {
            if level == 5 && (self.at_word("is") || self.at_word("as")) {
                self.advance();
                self.eat_word("not");
                if self.at_word("null") {
                    self.advance();
                } else {
                    self.parse_type()?;
                    if self.at(&TokenKind::Ident) && self.peek_at(1).kind != TokenKind::Ident {
                        self.advance();
                    }
                }
                left = Expr::new(
                    self.span_from(start),
                    ExprKind::Binary {
                        op: BinaryOp::Other,
                        left: Box::new(left),
                        right: Box::new(Expr::new(self.span_from(start), ExprKind::Other)),
                    },
                );
                continue;
            }
            let Some(op) = self.binary_op(level) else {
                return Ok(left);
            };
            self.advance();
            let right = self.parse_binary(level + 1)?;
            left = Expr::new(
                self.span_from(start),
                ExprKind::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
            );
        }
    }

    fn parse_unary(&mut self) -> PResult<Expr> {
        let start = self.peek().span.start;
        if self.eat(&TokenKind::Bang) {
            let operand = self.parse_unary()?;
            return Ok(Expr::new(
                self.span_from(start),
                ExprKind::Not {
                    operand: Box::new(operand),
                },
            ));
        }
        if self.eat(&TokenKind::Minus) {
            let operand = self.parse_unary()?;
            let kind = match &operand.kind {
                ExprKind::Literal { text } => ExprKind::Literal {
                    text: format!("-{text}"),
                },
                _ => ExprKind::Binary {
                    op: BinaryOp::Other,
                    left: Box::new(Expr::new(Span::new(start, start), ExprKind::Other)),
                    right: Box::new(operand),
                },
            };
            return Ok(Expr::new(self.span_from(start), kind));
        }
        if self.at(&TokenKind::Punct) && matches!(self.text(self.peek()), "+" | "~" | "++" | "--" | "&") {
            self.advance();
            return self.parse_unary();
        }
        if self.at_word("await") && self.peek_at(1).kind == TokenKind::Ident {
            self.advance();
            return self.parse_unary();
        }
        if self.at(&TokenKind::LParen) {
            if let Some(cast) = self.try_parse_cast(start)? {
                return Ok(cast);
            }
        }
        self.parse_postfix()
    }

    /// `(T)operand`, when the parenthesized part is a type and an operand
    /// follows.
    fn try_parse_cast(&mut self, start: u32) -> PResult<Option<Expr>> {
        let saved = self.current;
        self.advance();
        let Ok(type_syntax) = self.parse_type() else {
            self.current = saved;
            return Ok(None);
        };
        if !self.eat(&TokenKind::RParen) {
            self.current = saved;
            return Ok(None);
        }
        let operand_follows = match &self.peek().kind {
            TokenKind::Ident => !matches!(self.peek_text(), "is" | "as"),
            TokenKind::Str(_)
            | TokenKind::Number
            | TokenKind::Char
            | TokenKind::LParen
            | TokenKind::Bang => true,
            _ => false,
        };
        if !operand_follows {
            self.current = saved;
            return Ok(None);
        }
        let operand = self.parse_unary()?;
        Ok(Some(Expr::new(
            self.span_from(start),
            ExprKind::Cast {
                type_syntax,
                operand: Box::new(operand),
            },
        )))
    }

    fn parse_postfix(&mut self) -> PResult<Expr> {
        let start = self.peek().span.start;
        let mut expr = self.parse_primary()?;
        loop {
            match self.kind() {
                TokenKind::Dot => {
                    self.advance();
                    expr = self.finish_member_access(start, expr)?;
                }
                TokenKind::Question if self.peek_at(1).kind == TokenKind::Dot => {
                    self.advance();
                    self.advance();
                    expr = self.finish_member_access(start, expr)?;
                }
                TokenKind::Bang if matches!(self.peek_at(1).kind, TokenKind::Dot) => {
                    self.advance();
                }
                TokenKind::LParen => {
                    let args = self.parse_arguments(&TokenKind::LParen, &TokenKind::RParen)?;
                    expr = Expr::new(
                        self.span_from(start),
                        ExprKind::Invocation {
                            callee: Box::new(expr),
                            args,
                        },
                    );
                }
                TokenKind::LBracket => {
                    let args = self.parse_arguments(&TokenKind::LBracket, &TokenKind::RBracket)?;
                    let mut parts = vec![expr];
                    parts.extend(args.into_iter().map(|a| a.expr));
                    expr = self.fold_other(start, parts);
                }
                TokenKind::Punct if matches!(self.text(self.peek()), "++" | "--") => {
                    self.advance();
                }
                TokenKind::Lt => {
                    // Generic method name: `Foo<T>(...)`.
                    let saved = self.current;
                    if self.parse_type_arguments().is_ok() && self.at(&TokenKind::LParen) {
                        continue;
                    }
                    self.current = saved;
                    return Ok(expr);
                }
                _ => return Ok(expr),
            }
        }
    }

    fn finish_member_access(&mut self, start: u32, target: Expr) -> PResult<Expr> {
        let (name, name_span) = self.expect_ident()?;
        Ok(Expr::new(
            self.span_from(start),
            ExprKind::MemberAccess {
                target: Box::new(target),
                name,
                name_span,
                symbol: None,
            },
        ))
    }

    /// Chain expressions the binder does not model into binaries so that
    /// identifiers inside are still bound and found by reference search.
    fn fold_other(&self, start: u32, parts: Vec<Expr>) -> Expr {
        let span = self.span_from(start);
        let mut parts = parts.into_iter();
        let Some(mut folded) = parts.next() else {
            return Expr::new(span, ExprKind::Other);
        };
        for part in parts {
            folded = Expr::new(
                span,
                ExprKind::Binary {
                    op: BinaryOp::Other,
                    left: Box::new(folded),
                    right: Box::new(part),
                },
            );
        }
        folded
    }

    fn parse_arguments(&mut self, open: &TokenKind, close: &TokenKind) -> PResult<Vec<Argument>> {
        self.expect(open, "'('")?;
        let mut args = Vec::new();
        if self.eat(close) {
            return Ok(args);
        }
        loop {
            let name = if self.at(&TokenKind::Ident) && self.peek_at(1).kind == TokenKind::Colon {
                let (name, _) = self.expect_ident()?;
                self.advance();
                Some(name)
            } else {
                None
            };
            while ["ref", "out", "in"].contains(&self.peek_text()) {
                self.advance();
            }
            let expr = self.parse_expr()?;
            args.push(Argument { name, expr });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(close, "closing bracket")?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        let start = self.peek().span.start;
        let token = self.peek().clone();
        match &token.kind {
            TokenKind::Str(value) => {
                self.advance();
                Ok(Expr::new(
                    token.span,
                    ExprKind::StringLiteral {
                        value: value.clone(),
                    },
                ))
            }
            TokenKind::Number | TokenKind::Char => {
                self.advance();
                Ok(self.literal(token.span))
            }
            TokenKind::LParen => {
                if self.lambda_follows_parens() {
                    return self.parse_lambda(start);
                }
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(&TokenKind::RParen, "')'")?;
                Ok(inner)
            }
            TokenKind::Ident => self.parse_word(start),
            _ => Err(self.error("expected expression")),
        }
    }

    fn literal(&self, span: Span) -> Expr {
        Expr::new(
            span,
            ExprKind::Literal {
                text: self.source[span.range()].to_string(),
            },
        )
    }

    fn parse_word(&mut self, start: u32) -> PResult<Expr> {
        let word = self.peek_text();
        match word {
            "true" | "false" | "null" => {
                let token = self.advance();
                Ok(self.literal(token.span))
            }
            "this" | "base" => {
                self.advance();
                Ok(Expr::new(self.span_from(start), ExprKind::This))
            }
            "default" => {
                self.advance();
                if self.at(&TokenKind::LParen) {
                    self.skip_balanced()?;
                }
                Ok(self.literal(self.span_from(start)))
            }
            "typeof" if self.peek_at(1).kind == TokenKind::LParen => {
                self.advance();
                self.advance();
                let type_syntax = self.parse_type()?;
                self.expect(&TokenKind::RParen, "')'")?;
                Ok(Expr::new(self.span_from(start), ExprKind::TypeOf { type_syntax }))
            }
            "nameof" if self.peek_at(1).kind == TokenKind::LParen => {
                self.advance();
                self.advance();
                let operand = self.parse_expr()?;
                self.expect(&TokenKind::RParen, "')'")?;
                Ok(Expr::new(
                    self.span_from(start),
                    ExprKind::NameOf {
                        operand: Box::new(operand),
                    },
                ))
            }
            "sizeof" | "checked" | "unchecked" if self.peek_at(1).kind == TokenKind::LParen => {
                self.advance();
                self.skip_balanced()?;
                Ok(Expr::new(self.span_from(start), ExprKind::Other))
            }
            "new" => self.parse_new(start),
            "async" | "static" if self.lambda_after_modifier() => {
                self.advance();
                if self.at_word("static") {
                    self.advance();
                }
                self.parse_lambda(self.peek().span.start)
            }
            _ if self.peek_at(1).kind == TokenKind::Arrow => self.parse_lambda(start),
            _ => {
                let (name, span) = self.expect_ident()?;
                Ok(Expr::new(span, ExprKind::Identifier { name, symbol: None }))
            }
        }
    }

    fn lambda_after_modifier(&self) -> bool {
        match &self.peek_at(1).kind {
            TokenKind::Ident => self.peek_at(2).kind == TokenKind::Arrow,
            TokenKind::LParen => true,
            _ => false,
        }
    }

    fn parse_new(&mut self, start: u32) -> PResult<Expr> {
        self.advance();
        if self.at(&TokenKind::LBracket) || self.at(&TokenKind::LBrace) {
            self.skip_balanced()?;
            if self.at(&TokenKind::LBrace) {
                self.skip_balanced()?;
            }
            return Ok(Expr::new(self.span_from(start), ExprKind::Other));
        }
        let type_syntax = if self.at(&TokenKind::LParen) {
            TypeSyntax {
                ty: TypeRef::Unknown,
                span: Span::new(self.peek().span.start, self.peek().span.start),
            }
        } else {
            self.parse_type()?
        };
        if self.at(&TokenKind::LBracket) {
            self.skip_balanced()?;
            if self.at(&TokenKind::LBrace) {
                self.skip_balanced()?;
            }
            return Ok(Expr::new(self.span_from(start), ExprKind::Other));
        }
        let args = if self.at(&TokenKind::LParen) {
            self.parse_arguments(&TokenKind::LParen, &TokenKind::RParen)?
        } else {
            Vec::new()
        };
        if self.at(&TokenKind::LBrace) {
            self.skip_balanced()?;
        }
        Ok(Expr::new(
            self.span_from(start),
            ExprKind::ObjectCreation {
                type_syntax,
                args,
                constructor: None,
            },
        ))
    }

    fn lambda_follows_parens(&self) -> bool {
        let mut depth = 0usize;
        let mut i = self.current;
        while let Some(token) = self.tokens.get(i) {
            match token.kind {
                TokenKind::LParen => depth += 1,
                TokenKind::RParen => {
                    depth -= 1;
                    if depth == 0 {
                        return self
                            .tokens
                            .get(i + 1)
                            .is_some_and(|t| t.kind == TokenKind::Arrow);
                    }
                }
                TokenKind::Eof | TokenKind::Semi | TokenKind::LBrace => return false,
                _ => {}
            }
            i += 1;
        }
        false
    }

    /// `x => body` or `(a, b) => body`.
    fn parse_lambda(&mut self, start: u32) -> PResult<Expr> {
        let mut parameters = Vec::new();
        if self.eat(&TokenKind::LParen) {
            while !self.eat(&TokenKind::RParen) {
                // `(int x)` or `(x)`; `_` discards are ordinary names here.
                let first = self.parse_type()?;
                let (name, name_span, type_syntax) = if self.at(&TokenKind::Ident) {
                    let (name, span) = self.expect_ident()?;
                    (name, span, Some(first))
                } else {
                    let name = first.ty.name().unwrap_or("_").to_string();
                    (name, first.span, None)
                };
                parameters.push(self.declare_local(name, name_span, SymbolKind::Parameter, type_syntax));
                if !self.eat(&TokenKind::Comma) {
                    self.expect(&TokenKind::RParen, "')'")?;
                    break;
                }
            }
        } else {
            let (name, span) = self.expect_ident()?;
            parameters.push(self.declare_local(name, span, SymbolKind::Parameter, None));
        }
        self.expect(&TokenKind::Arrow, "'=>'")?;
        let body = if self.at(&TokenKind::LBrace) {
            Body::Block(self.parse_block()?)
        } else {
            Body::Expression(self.parse_expr()?)
        };
        Ok(Expr::new(
            self.span_from(start),
            ExprKind::Lambda {
                parameters,
                body: Box::new(body),
            },
        ))
    }
}
