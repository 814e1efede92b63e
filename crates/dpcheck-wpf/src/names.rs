//! Naming conventions derived from a registered name.
//!
//! All comparisons are exact and case-sensitive.

use crate::registration::CallbackKind;

/// `{Name}Property`
pub fn backing_field(registered: &str) -> String {
    format!("{registered}Property")
}

/// `{Name}PropertyKey`
pub fn key_field(registered: &str) -> String {
    format!("{registered}PropertyKey")
}

/// `Get{Name}`
pub fn get_method(registered: &str) -> String {
    format!("Get{registered}")
}

/// `Set{Name}`
pub fn set_method(registered: &str) -> String {
    format!("Set{registered}")
}

/// `On{Name}Changed`, `Coerce{Name}` or `{Name}ValidateValue`.
pub fn callback(kind: CallbackKind, registered: &str) -> String {
    match kind {
        CallbackKind::PropertyChanged => format!("On{registered}Changed"),
        CallbackKind::CoerceValue => format!("Coerce{registered}"),
        CallbackKind::ValidateValue => format!("{registered}ValidateValue"),
    }
}

/// Field names tried, in order, when looking up the field behind a CLR
/// property called `property`.
pub fn field_candidates(property: &str) -> [String; 2] {
    [key_field(property), backing_field(property)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_names() {
        assert_eq!(backing_field("Bar"), "BarProperty");
        assert_eq!(key_field("Bar"), "BarPropertyKey");
        assert_eq!(field_candidates("Bar"), ["BarPropertyKey", "BarProperty"]);
    }

    #[test]
    fn accessor_method_names() {
        assert_eq!(get_method("Bar"), "GetBar");
        assert_eq!(set_method("Bar"), "SetBar");
    }

    #[test]
    fn callback_names() {
        assert_eq!(callback(CallbackKind::PropertyChanged, "Bar"), "OnBarChanged");
        assert_eq!(callback(CallbackKind::CoerceValue, "Bar"), "CoerceBar");
        assert_eq!(callback(CallbackKind::ValidateValue, "Bar"), "BarValidateValue");
    }
}
