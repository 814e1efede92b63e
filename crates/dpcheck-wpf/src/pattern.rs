//! The recovered dependency-property pattern.
//!
//! A [`PatternInstance`] is one registration plus everything linked to it by
//! convention: the field holding the registration result, the public
//! companion of a read-only key field, the CLR property wrapper or the
//! attached `Get`/`Set` methods, and the callback methods named in the
//! metadata. It is rebuilt from the snapshot on every query and never cached.

use serde::Serialize;
use thiserror::Error;

use dpcheck_core::model::{SymbolId, TypeRef};
use dpcheck_core::patch::{FileId, Span};

use crate::registration::{CallbackKind, RegistrationCall};

/// Why recovery produced no pattern.
///
/// None of these are errors: most fields and properties are simply not part
/// of a dependency-property declaration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Miss {
    /// The code does not have the shape of the pattern.
    #[error("not a dependency property: {0}")]
    NotAPattern(String),
    /// More than one candidate fits; guessing would risk a false positive.
    #[error("ambiguous: {0}")]
    Ambiguous(String),
    /// The host could not resolve something the pattern depends on.
    #[error("unresolved: {0}")]
    Unresolved(String),
    /// The cancellation signal fired.
    #[error("cancelled")]
    Cancelled,
}

impl Miss {
    pub fn not_a_pattern(reason: impl Into<String>) -> Self {
        Miss::NotAPattern(reason.into())
    }

    pub fn ambiguous(reason: impl Into<String>) -> Self {
        Miss::Ambiguous(reason.into())
    }

    pub fn unresolved(reason: impl Into<String>) -> Self {
        Miss::Unresolved(reason.into())
    }
}

/// A static field holding a registration result or its public companion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackingField {
    pub symbol: SymbolId,
    pub name: String,
    pub file: FileId,
    pub name_span: Span,
    pub declared_type: Option<TypeRef>,
    /// Holds a `DependencyPropertyKey` from a read-only registration.
    pub is_key_field: bool,
}

/// The instance property exposing a dependency property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClrPropertyWrapper {
    pub symbol: SymbolId,
    pub name: String,
    pub file: FileId,
    pub name_span: Span,
    /// The whole property declaration.
    pub decl_span: Span,
    pub declared_type: TypeRef,
    /// Span of the property's type syntax.
    pub type_span: Span,
    /// Field passed to `GetValue` in the getter.
    pub getter_field: Option<SymbolId>,
    /// Field passed to `SetValue`/`SetCurrentValue` in the setter.
    pub setter_field: Option<SymbolId>,
}

/// Which attached-property accessor a static method is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessorKind {
    Get,
    Set,
}

/// A static `Get{Name}` / `Set{Name}` method of an attached property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClrAccessorMethod {
    pub symbol: SymbolId,
    pub kind: AccessorKind,
    pub name: String,
    pub file: FileId,
    pub name_span: Span,
}

/// A callback method named in the registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallbackMethod {
    pub kind: CallbackKind,
    /// The method.
    pub method: SymbolId,
    /// The identifier naming the method at the registration site.
    pub identifier: String,
    pub file: FileId,
    pub identifier_span: Span,
    /// Registered as this callback kind by more than one registration in the
    /// same type.
    pub shared: bool,
}

/// A recovered dependency-property declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatternInstance {
    /// The containing type.
    pub owner: SymbolId,
    pub registration: RegistrationCall,
    /// The field holding the registration result (the key field for
    /// read-only registrations).
    pub field: BackingField,
    /// `{Key}.DependencyProperty` companion of a key field.
    pub public_field: Option<BackingField>,
    pub property: Option<ClrPropertyWrapper>,
    pub get_method: Option<ClrAccessorMethod>,
    pub set_method: Option<ClrAccessorMethod>,
    pub callbacks: Vec<CallbackMethod>,
}

impl PatternInstance {
    /// The registered name.
    pub fn registered_name(&self) -> &str {
        &self.registration.registered_name
    }

    /// True if `field` is the registration field or its public companion.
    pub fn owns_field(&self, field: SymbolId) -> bool {
        self.field.symbol == field
            || self
                .public_field
                .as_ref()
                .is_some_and(|public| public.symbol == field)
    }

    /// Expected name of the field holding the registration result.
    pub fn expected_field_name(&self) -> String {
        if self.field.is_key_field {
            crate::names::key_field(self.registered_name())
        } else {
            crate::names::backing_field(self.registered_name())
        }
    }
}
