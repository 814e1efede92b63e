//! Framework types and members the recognizer matches on.
//!
//! Everything is matched by fully-qualified name of the containing type plus
//! member name, never by simple name alone, so a user type that happens to be
//! called `DependencyProperty` does not confuse the recognizer.

use dpcheck_core::adapter::SemanticModel;
use dpcheck_core::model::{SymbolId, TypeRef};

pub const DEPENDENCY_OBJECT: &str = "System.Windows.DependencyObject";
pub const DEPENDENCY_PROPERTY: &str = "System.Windows.DependencyProperty";
pub const DEPENDENCY_PROPERTY_KEY: &str = "System.Windows.DependencyPropertyKey";
pub const DEPENDENCY_PROPERTY_CHANGED_EVENT_ARGS: &str =
    "System.Windows.DependencyPropertyChangedEventArgs";

pub const PROPERTY_METADATA: &str = "System.Windows.PropertyMetadata";
pub const UI_PROPERTY_METADATA: &str = "System.Windows.UIPropertyMetadata";
pub const FRAMEWORK_PROPERTY_METADATA: &str = "System.Windows.FrameworkPropertyMetadata";
pub const FRAMEWORK_PROPERTY_METADATA_OPTIONS: &str =
    "System.Windows.FrameworkPropertyMetadataOptions";

pub const PROPERTY_CHANGED_CALLBACK: &str = "System.Windows.PropertyChangedCallback";
pub const COERCE_VALUE_CALLBACK: &str = "System.Windows.CoerceValueCallback";
pub const VALIDATE_VALUE_CALLBACK: &str = "System.Windows.ValidateValueCallback";

pub const OBJECT: &str = "System.Object";
pub const STRING: &str = "System.String";

/// Metadata types, most derived last.
pub const METADATA_TYPES: &[&str] = &[
    PROPERTY_METADATA,
    UI_PROPERTY_METADATA,
    FRAMEWORK_PROPERTY_METADATA,
];

/// `DependencyProperty.Register*` method names.
pub const REGISTER_METHODS: &[&str] = &[
    "Register",
    "RegisterReadOnly",
    "RegisterAttached",
    "RegisterAttachedReadOnly",
];

/// Member of `DependencyPropertyKey` exposing the public property.
pub const KEY_DEPENDENCY_PROPERTY: &str = "DependencyProperty";

pub const GET_VALUE: &str = "GetValue";
pub const SET_VALUE: &str = "SetValue";
pub const SET_CURRENT_VALUE: &str = "SetCurrentValue";

/// True if `symbol` is the member `name` declared on the type `container`.
pub fn is_member_of(model: &dyn SemanticModel, symbol: SymbolId, container: &str, name: &str) -> bool {
    let Some(member) = model.symbol(symbol) else {
        return false;
    };
    if member.name != name {
        return false;
    }
    member
        .container
        .and_then(|c| model.symbol(c))
        .and_then(|c| c.qualified_name.as_deref())
        == Some(container)
}

/// True if `ty` names one of the metadata types.
pub fn is_metadata_type(ty: &TypeRef) -> bool {
    METADATA_TYPES.iter().any(|name| ty.is_named(name))
}

/// True if `ty` is `DependencyProperty` or `DependencyPropertyKey`.
pub fn is_dependency_property_type(ty: &TypeRef) -> bool {
    ty.is_named(DEPENDENCY_PROPERTY) || ty.is_named(DEPENDENCY_PROPERTY_KEY)
}
