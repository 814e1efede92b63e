//! Structural type references.
//!
//! `TypeRef` is the host's resolved type, reduced to the shape needed for
//! identity comparison: a fully-qualified name with generic arguments, plus
//! nullable, array and pointer wrappers. Keyword aliases (`int`, `string`,
//! ...) are canonicalized to their `System.*` names on construction so that
//! `int` and `System.Int32` compare equal.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Keyword aliases and the framework types they stand for.
const ALIASES: &[(&str, &str)] = &[
    ("bool", "System.Boolean"),
    ("byte", "System.Byte"),
    ("sbyte", "System.SByte"),
    ("char", "System.Char"),
    ("decimal", "System.Decimal"),
    ("double", "System.Double"),
    ("float", "System.Single"),
    ("int", "System.Int32"),
    ("uint", "System.UInt32"),
    ("long", "System.Int64"),
    ("ulong", "System.UInt64"),
    ("short", "System.Int16"),
    ("ushort", "System.UInt16"),
    ("object", "System.Object"),
    ("string", "System.String"),
    ("void", "System.Void"),
];

/// Canonical name for `name`, resolving keyword aliases.
pub fn canonical_name(name: &str) -> &str {
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == name)
        .map_or(name, |(_, full)| *full)
}

/// Keyword alias for a canonical name, if it has one.
pub fn keyword_alias(name: &str) -> Option<&'static str> {
    ALIASES
        .iter()
        .find(|(_, full)| *full == name)
        .map(|(alias, _)| *alias)
}

/// A resolved type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeRef {
    /// A named type, optionally generic.
    Named {
        name: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        args: Vec<TypeRef>,
    },
    /// `T?` for value types, or an annotated reference type.
    Nullable { inner: Box<TypeRef> },
    /// `T[]`, `T[,]`, ...
    Array { element: Box<TypeRef>, rank: u32 },
    /// `T*`
    Pointer { pointee: Box<TypeRef> },
    /// The host could not resolve the type.
    Unknown,
}

impl TypeRef {
    /// A non-generic named type.
    pub fn named(name: &str) -> Self {
        TypeRef::Named {
            name: canonical_name(name).to_string(),
            args: Vec::new(),
        }
    }

    /// A generic instantiation.
    pub fn generic(name: &str, args: Vec<TypeRef>) -> Self {
        TypeRef::Named {
            name: canonical_name(name).to_string(),
            args,
        }
    }

    /// Wrap in `Nullable`.
    pub fn nullable(inner: TypeRef) -> Self {
        TypeRef::Nullable {
            inner: Box::new(inner),
        }
    }

    /// Wrap in a single-dimension array.
    pub fn array(element: TypeRef) -> Self {
        TypeRef::Array {
            element: Box::new(element),
            rank: 1,
        }
    }

    /// The canonical name of a named type.
    pub fn name(&self) -> Option<&str> {
        match self {
            TypeRef::Named { name, .. } => Some(name),
            _ => None,
        }
    }

    /// True if this is the named type `qualified` (generic arguments ignored).
    pub fn is_named(&self, qualified: &str) -> bool {
        self.name() == Some(canonical_name(qualified))
    }

    /// True if any part of the type is unresolved.
    pub fn is_unknown(&self) -> bool {
        match self {
            TypeRef::Unknown => true,
            TypeRef::Named { args, .. } => args.iter().any(TypeRef::is_unknown),
            TypeRef::Nullable { inner } => inner.is_unknown(),
            TypeRef::Array { element, .. } => element.is_unknown(),
            TypeRef::Pointer { pointee } => pointee.is_unknown(),
        }
    }

    /// Structural identity.
    ///
    /// Generic arguments, nullability, array rank and pointer depth all
    /// matter. An unresolved type is never identical to anything.
    pub fn same_type(&self, other: &TypeRef) -> bool {
        if self.is_unknown() || other.is_unknown() {
            return false;
        }
        self == other
    }

    /// True for the built-in value types and `Nullable<T>`.
    ///
    /// Anything else needs a symbol lookup to classify.
    pub fn is_builtin_value_type(&self) -> bool {
        match self {
            TypeRef::Nullable { .. } | TypeRef::Pointer { .. } => true,
            TypeRef::Named { name, .. } => {
                keyword_alias(name).is_some()
                    && !matches!(name.as_str(), "System.Object" | "System.String" | "System.Void")
            }
            _ => false,
        }
    }

    /// Parse C# type syntax such as `int?`, `Foo<Bar>`, `string[]` or
    /// `System.Collections.Generic.List<int>[,]`.
    pub fn parse(text: &str) -> Option<TypeRef> {
        let mut parser = TypeParser {
            bytes: text.as_bytes(),
            pos: 0,
        };
        let ty = parser.parse_type()?;
        parser.skip_ws();
        (parser.pos == parser.bytes.len()).then_some(ty)
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Named { name, args } => {
                write!(f, "{}", keyword_alias(name).unwrap_or(name))?;
                if !args.is_empty() {
                    write!(f, "<")?;
                    for (i, arg) in args.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}", arg)?;
                    }
                    write!(f, ">")?;
                }
                Ok(())
            }
            TypeRef::Nullable { inner } => write!(f, "{}?", inner),
            TypeRef::Array { element, rank } => {
                let commas = ",".repeat(rank.saturating_sub(1) as usize);
                write!(f, "{}[{}]", element, commas)
            }
            TypeRef::Pointer { pointee } => write!(f, "{}*", pointee),
            TypeRef::Unknown => write!(f, "?"),
        }
    }
}

struct TypeParser<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> TypeParser<'a> {
    fn skip_ws(&mut self) {
        while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn eat(&mut self, byte: u8) -> bool {
        self.skip_ws();
        if self.bytes.get(self.pos) == Some(&byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn ident(&mut self) -> Option<&'a str> {
        self.skip_ws();
        let bytes = self.bytes;
        let start = self.pos;
        while self.pos < bytes.len()
            && (bytes[self.pos].is_ascii_alphanumeric() || bytes[self.pos] == b'_')
        {
            self.pos += 1;
        }
        if start == self.pos || bytes[start].is_ascii_digit() {
            return None;
        }
        std::str::from_utf8(&bytes[start..self.pos]).ok()
    }

    fn parse_type(&mut self) -> Option<TypeRef> {
        let mut first = self.ident()?;
        if first == "global" {
            let save = self.pos;
            if self.eat(b':') && self.eat(b':') {
                first = self.ident()?;
            } else {
                self.pos = save;
            }
        }
        let mut name = first.to_string();
        loop {
            let save = self.pos;
            if !self.eat(b'.') {
                self.pos = save;
                break;
            }
            name.push('.');
            name.push_str(self.ident()?);
        }

        let mut args = Vec::new();
        if self.eat(b'<') {
            loop {
                args.push(self.parse_type()?);
                if self.eat(b'>') {
                    break;
                }
                if !self.eat(b',') {
                    return None;
                }
            }
        }

        let mut ty = TypeRef::generic(&name, args);
        loop {
            if self.eat(b'?') {
                ty = TypeRef::nullable(ty);
            } else if self.eat(b'*') {
                ty = TypeRef::Pointer {
                    pointee: Box::new(ty),
                };
            } else if self.eat(b'[') {
                let mut rank = 1;
                while self.eat(b',') {
                    rank += 1;
                }
                if !self.eat(b']') {
                    return None;
                }
                ty = TypeRef::Array {
                    element: Box::new(ty),
                    rank,
                };
            } else {
                break;
            }
        }
        Some(ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod identity {
        use super::*;

        #[test]
        fn aliases_are_canonical() {
            assert!(TypeRef::named("int").same_type(&TypeRef::named("System.Int32")));
            assert!(TypeRef::named("string").is_named("System.String"));
        }

        #[test]
        fn nullability_is_significant() {
            let int = TypeRef::named("int");
            let nullable = TypeRef::nullable(TypeRef::named("int"));
            assert!(!int.same_type(&nullable));
        }

        #[test]
        fn generic_arguments_are_compared() {
            let a = TypeRef::parse("Foo<Bar>").unwrap();
            let b = TypeRef::parse("Foo<Bar>").unwrap();
            let c = TypeRef::parse("Foo<Baz>").unwrap();
            assert!(a.same_type(&b));
            assert!(!a.same_type(&c));
        }

        #[test]
        fn array_rank_is_compared() {
            let a = TypeRef::parse("int[]").unwrap();
            let b = TypeRef::parse("int[,]").unwrap();
            assert!(!a.same_type(&b));
        }

        #[test]
        fn unknown_is_never_identical() {
            assert!(!TypeRef::Unknown.same_type(&TypeRef::Unknown));
            let partial = TypeRef::generic("Foo", vec![TypeRef::Unknown]);
            assert!(!partial.same_type(&partial.clone()));
        }
    }

    mod parsing {
        use super::*;

        #[test]
        fn parses_nested_generics() {
            let ty = TypeRef::parse("System.Collections.Generic.Dictionary<string, List<int?>>")
                .unwrap();
            assert_eq!(
                ty.to_string(),
                "System.Collections.Generic.Dictionary<string, List<int?>>"
            );
        }

        #[test]
        fn strips_global_qualifier() {
            let ty = TypeRef::parse("global::System.Windows.Media.Brush").unwrap();
            assert!(ty.is_named("System.Windows.Media.Brush"));
        }

        #[test]
        fn rejects_garbage() {
            assert!(TypeRef::parse("Foo<").is_none());
            assert!(TypeRef::parse("1abc").is_none());
            assert!(TypeRef::parse("Foo Bar").is_none());
        }
    }

    mod display {
        use super::*;

        #[test]
        fn uses_keyword_form() {
            assert_eq!(TypeRef::named("System.Int32").to_string(), "int");
            assert_eq!(TypeRef::parse("double[,]").unwrap().to_string(), "double[,]");
        }
    }

    #[test]
    fn builtin_value_types() {
        assert!(TypeRef::named("int").is_builtin_value_type());
        assert!(TypeRef::parse("Brush?").unwrap().is_builtin_value_type());
        assert!(!TypeRef::named("string").is_builtin_value_type());
        assert!(!TypeRef::named("Foo").is_builtin_value_type());
    }

    #[test]
    fn serializes_with_kind_tag() {
        let json = serde_json::to_string(&TypeRef::named("int")).unwrap();
        assert_eq!(json, r#"{"kind":"named","name":"System.Int32"}"#);
    }
}
