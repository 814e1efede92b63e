//! Structural consistency rules: rules relating two recovered components.

use super::{Finding, Remedy, WPF0012, WPF0032};
use crate::pattern::{Miss, PatternInstance};
use crate::recognizer::Recognizer;

/// The wrapper's declared type must be the registered type.
///
/// Types are compared structurally, so `int?` differs from `int` and
/// `List<Foo>` equals `List<Foo>`. Nothing is reported when either side did
/// not resolve.
pub fn check_type(
    recognizer: &Recognizer<'_>,
    instance: &PatternInstance,
    findings: &mut Vec<Finding>,
) -> Result<(), Miss> {
    let Some(property) = &instance.property else {
        return Ok(());
    };
    let registered = &instance.registration.registered_type;
    if property.declared_type.is_unknown() || registered.is_unknown() {
        return Ok(());
    }
    recognizer.check_cancelled()?;
    if property.declared_type.same_type(registered) {
        return Ok(());
    }
    findings.push(Finding {
        descriptor: &WPF0012,
        file: property.file,
        span: property.type_span,
        args: vec![property.name.clone(), registered.to_string()],
        remedy: Remedy::None,
    });
    Ok(())
}

/// Getter and setter must use the same registration once key-field
/// indirection is removed from both.
pub fn check_same_property(
    recognizer: &Recognizer<'_>,
    instance: &PatternInstance,
    findings: &mut Vec<Finding>,
) {
    let Some(property) = &instance.property else {
        return;
    };
    let (Some(getter), Some(setter)) = (property.getter_field, property.setter_field) else {
        return;
    };
    if recognizer.normalize_field(getter) == recognizer.normalize_field(setter) {
        return;
    }
    findings.push(Finding {
        descriptor: &WPF0032,
        file: property.file,
        span: property.decl_span,
        args: vec![property.name.clone()],
        remedy: Remedy::None,
    });
}
