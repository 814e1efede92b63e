//! Naming convention rules.
//!
//! Each rule compares one identifier of a recovered instance with the name
//! derived from the registered name, and proposes a rename when they differ.

use dpcheck_core::diagnostics::DiagnosticDescriptor;
use dpcheck_core::model::SymbolId;
use dpcheck_core::patch::{FileId, Span};

use super::{Finding, Remedy, WPF0001, WPF0002, WPF0003, WPF0004, WPF0005, WPF0006, WPF0007};
use crate::names;
use crate::pattern::{AccessorKind, PatternInstance};
use crate::recognizer::Recognizer;
use crate::registration::CallbackKind;

/// Rules triggered by a static field: the field's own name, and for the
/// registration field, the accessor methods and callbacks.
pub fn check_field(
    recognizer: &Recognizer<'_>,
    field: SymbolId,
    instance: &PatternInstance,
    findings: &mut Vec<Finding>,
) {
    let registered = instance.registered_name();

    if let Some(public) = instance.public_field.as_ref().filter(|p| p.symbol == field) {
        findings.extend(mismatch(
            &WPF0001,
            public.symbol,
            public.file,
            public.name_span,
            &public.name,
            names::backing_field(registered),
        ));
        return;
    }
    if instance.field.symbol != field {
        return;
    }

    let descriptor = if instance.field.is_key_field {
        &WPF0002
    } else {
        &WPF0001
    };
    findings.extend(mismatch(
        descriptor,
        field,
        instance.field.file,
        instance.field.name_span,
        &instance.field.name,
        instance.expected_field_name(),
    ));

    for accessor in [&instance.get_method, &instance.set_method].into_iter().flatten() {
        let expected = match accessor.kind {
            AccessorKind::Get => names::get_method(registered),
            AccessorKind::Set => names::set_method(registered),
        };
        findings.extend(mismatch(
            &WPF0004,
            accessor.symbol,
            accessor.file,
            accessor.name_span,
            &accessor.name,
            expected,
        ));
    }

    for callback in &instance.callbacks {
        if callback.shared {
            continue;
        }
        let in_source = recognizer
            .model()
            .symbol(callback.method)
            .is_some_and(|method| method.is_source());
        if !in_source {
            continue;
        }
        let descriptor = match callback.kind {
            CallbackKind::PropertyChanged => &WPF0005,
            CallbackKind::CoerceValue => &WPF0006,
            CallbackKind::ValidateValue => &WPF0007,
        };
        findings.extend(mismatch(
            descriptor,
            callback.method,
            callback.file,
            callback.identifier_span,
            &callback.identifier,
            names::callback(callback.kind, registered),
        ));
    }
}

/// The CLR wrapper must carry the registered name.
pub fn check_property(instance: &PatternInstance, findings: &mut Vec<Finding>) {
    let Some(property) = &instance.property else {
        return;
    };
    findings.extend(mismatch(
        &WPF0003,
        property.symbol,
        property.file,
        property.name_span,
        &property.name,
        instance.registered_name().to_string(),
    ));
}

fn mismatch(
    descriptor: &'static DiagnosticDescriptor,
    target: SymbolId,
    file: FileId,
    span: Span,
    actual: &str,
    expected: String,
) -> Option<Finding> {
    if actual == expected {
        return None;
    }
    Some(Finding {
        descriptor,
        file,
        span,
        args: vec![actual.to_string(), expected.clone()],
        remedy: Remedy::Rename {
            target,
            new_name: expected,
        },
    })
}
