//! Framework symbols the fixture binds against.
//!
//! A metadata-only slice of `System` and `System.Windows`: enough of the
//! dependency-property API, its metadata types and callback delegates, and
//! the common element base classes for user controls to bind. None of these
//! symbols has a source declaration.

use dpcheck_core::model::{Symbol, SymbolId, SymbolKind, SymbolTable, TypeKind, TypeRef};

use crate::known;

const OBJECT: &str = known::OBJECT;
const STRING: &str = known::STRING;
const BOOL: &str = "bool";
const TYPE: &str = "System.Type";
const VOID: &str = "void";
const DP: &str = known::DEPENDENCY_PROPERTY;
const DP_KEY: &str = known::DEPENDENCY_PROPERTY_KEY;
const DEPENDENCY_OBJECT: &str = known::DEPENDENCY_OBJECT;
const METADATA: &str = known::PROPERTY_METADATA;
const OPTIONS: &str = known::FRAMEWORK_PROPERTY_METADATA_OPTIONS;
const CHANGED: &str = known::PROPERTY_CHANGED_CALLBACK;
const COERCE: &str = known::COERCE_VALUE_CALLBACK;
const VALIDATE: &str = known::VALIDATE_VALUE_CALLBACK;

struct Builder<'t> {
    table: &'t mut SymbolTable,
}

impl Builder<'_> {
    fn ty(&mut self, qualified: &str, kind: TypeKind, base: Option<&str>) -> SymbolId {
        let mut symbol = Symbol::type_named(qualified, kind);
        if let Some(base) = base {
            symbol = symbol.with_base_type(TypeRef::named(base));
        }
        self.table.add_symbol(symbol)
    }

    fn parameters(&mut self, owner: SymbolId, params: &[(&str, &str)]) {
        for (name, ty) in params {
            self.table.add_symbol(
                Symbol::new(SymbolKind::Parameter, *name)
                    .with_container(owner)
                    .with_type(TypeRef::named(ty)),
            );
        }
    }

    fn method(&mut self, owner: SymbolId, name: &str, returns: &str, params: &[(&str, &str)]) -> SymbolId {
        let id = self.table.add_symbol(
            Symbol::new(SymbolKind::Method, name)
                .with_container(owner)
                .with_type(TypeRef::named(returns)),
        );
        self.parameters(id, params);
        id
    }

    fn static_method(&mut self, owner: SymbolId, name: &str, returns: &str, params: &[(&str, &str)]) -> SymbolId {
        let id = self.method(owner, name, returns, params);
        if let Some(symbol) = self.table.get_mut(id) {
            symbol.is_static = true;
        }
        id
    }

    fn constructor(&mut self, owner: SymbolId, params: &[(&str, &str)]) {
        let name = self
            .table
            .get(owner)
            .map(|s| s.name.clone())
            .unwrap_or_default();
        let id = self
            .table
            .add_symbol(Symbol::new(SymbolKind::Constructor, name).with_container(owner));
        self.parameters(id, params);
    }

    fn property(&mut self, owner: SymbolId, name: &str, ty: &str) {
        self.table.add_symbol(
            Symbol::new(SymbolKind::Property, name)
                .with_container(owner)
                .with_type(TypeRef::named(ty)),
        );
    }

    fn static_field(&mut self, owner: SymbolId, name: &str, ty: &str) {
        self.table.add_symbol(
            Symbol::new(SymbolKind::Field, name)
                .with_container(owner)
                .with_type(TypeRef::named(ty))
                .with_static()
                .with_readonly(),
        );
    }

    fn enum_members(&mut self, owner: SymbolId, qualified: &str, names: &[&str]) {
        for name in names {
            self.table.add_symbol(
                Symbol::new(SymbolKind::Field, *name)
                    .with_container(owner)
                    .with_type(TypeRef::named(qualified))
                    .with_const(),
            );
        }
    }
}

/// Add the framework symbols to `table`.
pub fn install(table: &mut SymbolTable) {
    let mut b = Builder { table };
    system(&mut b);
    dependency_properties(&mut b);
    metadata(&mut b);
    elements(&mut b);
}

fn system(b: &mut Builder<'_>) {
    let object = b.ty(OBJECT, TypeKind::Class, None);
    b.static_method(object, "Equals", BOOL, &[("objA", OBJECT), ("objB", OBJECT)]);
    b.static_method(object, "ReferenceEquals", BOOL, &[("objA", OBJECT), ("objB", OBJECT)]);
    b.method(object, "Equals", BOOL, &[("obj", OBJECT)]);
    b.method(object, "GetHashCode", "int", &[]);
    b.method(object, "ToString", STRING, &[]);

    let string = b.ty(STRING, TypeKind::Class, Some(OBJECT));
    b.static_method(string, "Concat", STRING, &[("str0", STRING), ("str1", STRING)]);
    b.static_method(string, "Concat", STRING, &[("str0", STRING), ("str1", STRING), ("str2", STRING)]);
    b.static_method(string, "Equals", BOOL, &[("a", STRING), ("b", STRING)]);
    b.static_method(string, "IsNullOrEmpty", BOOL, &[("value", STRING)]);
    b.method(string, "Equals", BOOL, &[("value", STRING)]);
    b.property(string, "Length", "int");

    b.ty(TYPE, TypeKind::Class, Some(OBJECT));
    b.ty("System.EventArgs", TypeKind::Class, Some(OBJECT));
    b.ty("System.Collections.IEnumerable", TypeKind::Interface, None);
    b.ty("System.Collections.Generic.IEnumerable", TypeKind::Interface, None);
    b.ty("System.Collections.Generic.List", TypeKind::Class, Some(OBJECT));
    b.ty("System.Collections.ObjectModel.ObservableCollection", TypeKind::Class, Some(OBJECT));
}

fn dependency_properties(b: &mut Builder<'_>) {
    let dp = b.ty(DP, TypeKind::Class, Some(OBJECT));
    let base = [("name", STRING), ("propertyType", TYPE), ("ownerType", TYPE)];
    let with_metadata = [
        ("name", STRING),
        ("propertyType", TYPE),
        ("ownerType", TYPE),
        ("typeMetadata", METADATA),
    ];
    let with_validate = [
        ("name", STRING),
        ("propertyType", TYPE),
        ("ownerType", TYPE),
        ("typeMetadata", METADATA),
        ("validateValueCallback", VALIDATE),
    ];
    for name in ["Register", "RegisterAttached"] {
        b.static_method(dp, name, DP, &base);
        b.static_method(dp, name, DP, &with_metadata);
        b.static_method(dp, name, DP, &with_validate);
    }
    for name in ["RegisterReadOnly", "RegisterAttachedReadOnly"] {
        b.static_method(dp, name, DP_KEY, &with_metadata);
        b.static_method(dp, name, DP_KEY, &with_validate);
    }
    b.method(dp, "AddOwner", DP, &[("ownerType", TYPE)]);
    b.method(dp, "OverrideMetadata", VOID, &[("forType", TYPE), ("typeMetadata", METADATA)]);
    b.property(dp, "Name", STRING);
    b.property(dp, "PropertyType", TYPE);
    b.property(dp, "OwnerType", TYPE);
    b.static_field(dp, "UnsetValue", OBJECT);

    let key = b.ty(DP_KEY, TypeKind::Class, Some(OBJECT));
    b.property(key, known::KEY_DEPENDENCY_PROPERTY, DP);

    let args = b.ty(known::DEPENDENCY_PROPERTY_CHANGED_EVENT_ARGS, TypeKind::Struct, None);
    b.property(args, "OldValue", OBJECT);
    b.property(args, "NewValue", OBJECT);
    b.property(args, "Property", DP);

    b.ty(CHANGED, TypeKind::Delegate, None);
    b.ty(COERCE, TypeKind::Delegate, None);
    b.ty(VALIDATE, TypeKind::Delegate, None);

    let dobj = b.ty(DEPENDENCY_OBJECT, TypeKind::Class, Some(OBJECT));
    b.method(dobj, known::GET_VALUE, OBJECT, &[("dp", DP)]);
    b.method(dobj, known::SET_VALUE, VOID, &[("dp", DP), ("value", OBJECT)]);
    b.method(dobj, known::SET_VALUE, VOID, &[("key", DP_KEY), ("value", OBJECT)]);
    b.method(dobj, known::SET_CURRENT_VALUE, VOID, &[("dp", DP), ("value", OBJECT)]);
    b.method(dobj, "ClearValue", VOID, &[("dp", DP)]);
    b.method(dobj, "ClearValue", VOID, &[("key", DP_KEY)]);
    b.method(dobj, "CoerceValue", VOID, &[("dp", DP)]);
    b.method(dobj, "InvalidateProperty", VOID, &[("dp", DP)]);
}

fn metadata(b: &mut Builder<'_>) {
    let common: [&[(&str, &str)]; 5] = [
        &[],
        &[("defaultValue", OBJECT)],
        &[("propertyChangedCallback", CHANGED)],
        &[("defaultValue", OBJECT), ("propertyChangedCallback", CHANGED)],
        &[
            ("defaultValue", OBJECT),
            ("propertyChangedCallback", CHANGED),
            ("coerceValueCallback", COERCE),
        ],
    ];

    let property_metadata = b.ty(METADATA, TypeKind::Class, Some(OBJECT));
    for params in common {
        b.constructor(property_metadata, params);
    }
    b.property(property_metadata, "DefaultValue", OBJECT);

    let ui = b.ty(known::UI_PROPERTY_METADATA, TypeKind::Class, Some(METADATA));
    for params in common {
        b.constructor(ui, params);
    }
    b.constructor(
        ui,
        &[
            ("defaultValue", OBJECT),
            ("propertyChangedCallback", CHANGED),
            ("coerceValueCallback", COERCE),
            ("isAnimationProhibited", BOOL),
        ],
    );

    let options = b.ty(OPTIONS, TypeKind::Enum, None);
    b.enum_members(
        options,
        OPTIONS,
        &[
            "None",
            "AffectsMeasure",
            "AffectsArrange",
            "AffectsParentMeasure",
            "AffectsParentArrange",
            "AffectsRender",
            "Inherits",
            "OverridesInheritanceBehavior",
            "NotDataBindable",
            "BindsTwoWayByDefault",
            "Journal",
            "SubPropertiesDoNotAffectRender",
        ],
    );

    let framework = b.ty(
        known::FRAMEWORK_PROPERTY_METADATA,
        TypeKind::Class,
        Some(known::UI_PROPERTY_METADATA),
    );
    for params in common {
        b.constructor(framework, params);
    }
    let extra: [&[(&str, &str)]; 4] = [
        &[("propertyChangedCallback", CHANGED), ("coerceValueCallback", COERCE)],
        &[("defaultValue", OBJECT), ("flags", OPTIONS)],
        &[
            ("defaultValue", OBJECT),
            ("flags", OPTIONS),
            ("propertyChangedCallback", CHANGED),
        ],
        &[
            ("defaultValue", OBJECT),
            ("flags", OPTIONS),
            ("propertyChangedCallback", CHANGED),
            ("coerceValueCallback", COERCE),
        ],
    ];
    for params in extra {
        b.constructor(framework, params);
    }
}

fn elements(b: &mut Builder<'_>) {
    b.ty("System.Windows.Media.Visual", TypeKind::Class, Some(DEPENDENCY_OBJECT));
    b.ty("System.Windows.UIElement", TypeKind::Class, Some("System.Windows.Media.Visual"));
    b.ty("System.Windows.FrameworkElement", TypeKind::Class, Some("System.Windows.UIElement"));
    b.ty(
        "System.Windows.Controls.Control",
        TypeKind::Class,
        Some("System.Windows.FrameworkElement"),
    );
    b.ty(
        "System.Windows.Controls.ContentControl",
        TypeKind::Class,
        Some("System.Windows.Controls.Control"),
    );
    b.ty(
        "System.Windows.Controls.UserControl",
        TypeKind::Class,
        Some("System.Windows.Controls.ContentControl"),
    );
    b.ty("System.Windows.Window", TypeKind::Class, Some("System.Windows.Controls.ContentControl"));
    b.ty("System.Windows.Media.Brush", TypeKind::Class, Some(DEPENDENCY_OBJECT));
    b.ty("System.Windows.Thickness", TypeKind::Struct, None);
    let visibility = b.ty("System.Windows.Visibility", TypeKind::Enum, None);
    b.enum_members(visibility, "System.Windows.Visibility", &["Visible", "Hidden", "Collapsed"]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use dpcheck_core::adapter::SemanticModel;

    #[test]
    fn control_derives_from_dependency_object() {
        let mut table = SymbolTable::new();
        install(&mut table);
        let control = table.find_type("System.Windows.Controls.Control").unwrap();
        assert!(table.is_assignable_to(control, DEPENDENCY_OBJECT));
    }

    #[test]
    fn register_overloads_by_arity() {
        let mut table = SymbolTable::new();
        install(&mut table);
        let dp = table.find_type(DP).unwrap();
        let arities: Vec<usize> = table
            .members_of(dp, false)
            .into_iter()
            .filter_map(|id| table.symbol(id))
            .filter(|s| s.name == "Register")
            .map(|s| s.parameters.len())
            .collect();
        assert_eq!(arities, vec![3, 4, 5]);
    }
}
