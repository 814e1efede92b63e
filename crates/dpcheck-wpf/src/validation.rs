//! C# identifier validation.
//!
//! A rename fix only registers when the name it proposes is a legal C#
//! identifier; registered names come from string literals and may contain
//! anything.

use thiserror::Error;

/// Error for validation failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// Invalid C# identifier.
    #[error("invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: String },
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Reserved C# keywords. Contextual keywords (`value`, `var`, `nameof`, ...)
/// are legal identifiers and are not listed.
pub const CSHARP_KEYWORDS: &[&str] = &[
    "abstract", "as", "base", "bool", "break", "byte", "case", "catch", "char", "checked",
    "class", "const", "continue", "decimal", "default", "delegate", "do", "double", "else",
    "enum", "event", "explicit", "extern", "false", "finally", "fixed", "float", "for",
    "foreach", "goto", "if", "implicit", "in", "int", "interface", "internal", "is", "lock",
    "long", "namespace", "new", "null", "object", "operator", "out", "override", "params",
    "private", "protected", "public", "readonly", "ref", "return", "sbyte", "sealed", "short",
    "sizeof", "stackalloc", "static", "string", "struct", "switch", "this", "throw", "true",
    "try", "typeof", "uint", "ulong", "unchecked", "unsafe", "ushort", "using", "virtual",
    "void", "volatile", "while",
];

/// Check if a name is a reserved C# keyword.
pub fn is_csharp_keyword(name: &str) -> bool {
    CSHARP_KEYWORDS.contains(&name)
}

/// Validate that a string is a valid C# identifier.
///
/// # Examples
///
/// ```
/// use dpcheck_wpf::validation::validate_csharp_identifier;
///
/// assert!(validate_csharp_identifier("FooProperty").is_ok());
/// assert!(validate_csharp_identifier("_foo").is_ok());
/// assert!(validate_csharp_identifier("").is_err());
/// assert!(validate_csharp_identifier("Foo Bar").is_err());
/// assert!(validate_csharp_identifier("class").is_err());
/// ```
pub fn validate_csharp_identifier(name: &str) -> ValidationResult<()> {
    let invalid = |reason: String| ValidationError::InvalidName {
        name: name.to_string(),
        reason,
    };

    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return Err(invalid("name cannot be empty".to_string()));
    };
    if !first.is_alphabetic() && first != '_' {
        return Err(invalid("must start with letter or underscore".to_string()));
    }
    if let Some(ch) = chars.find(|ch| !ch.is_alphanumeric() && *ch != '_') {
        return Err(invalid(format!("invalid character: '{}'", ch)));
    }
    if is_csharp_keyword(name) {
        return Err(invalid("cannot use C# keyword as identifier".to_string()));
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    mod valid_identifiers {
        use super::*;

        #[test]
        fn conventional_names() {
            assert!(validate_csharp_identifier("BarProperty").is_ok());
            assert!(validate_csharp_identifier("OnBarChanged").is_ok());
            assert!(validate_csharp_identifier("BarValidateValue").is_ok());
        }

        #[test]
        fn underscores_and_digits() {
            assert!(validate_csharp_identifier("_bar").is_ok());
            assert!(validate_csharp_identifier("Bar2Property").is_ok());
        }

        #[test]
        fn contextual_keywords_allowed() {
            assert!(validate_csharp_identifier("value").is_ok());
            assert!(validate_csharp_identifier("nameof").is_ok());
        }

        #[test]
        fn unicode_letters() {
            assert!(validate_csharp_identifier("Größe").is_ok());
        }
    }

    mod invalid_identifiers {
        use super::*;

        #[test]
        fn empty_name() {
            let err = validate_csharp_identifier("").unwrap_err();
            assert_eq!(err.to_string(), "invalid name '': name cannot be empty");
        }

        #[test]
        fn starts_with_digit() {
            assert!(validate_csharp_identifier("1Bar").is_err());
        }

        #[test]
        fn registered_names_with_punctuation() {
            assert!(validate_csharp_identifier("Bar-Baz").is_err());
            assert!(validate_csharp_identifier("Bar.BazProperty").is_err());
            assert!(validate_csharp_identifier("On Bar Changed").is_err());
        }

        #[test]
        fn keywords_rejected() {
            assert!(validate_csharp_identifier("class").is_err());
            assert!(validate_csharp_identifier("string").is_err());
            assert!(!is_csharp_keyword("String"));
        }
    }
}
