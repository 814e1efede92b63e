//! Dependency-property pattern recognizer.
//!
//! Recovery is all-or-nothing: any step that cannot be resolved, or that
//! has more than one candidate, turns the whole recovery into a [`Miss`].
//! Rules never see a partially recovered instance.
//!
//! Two entry points converge on the same instance:
//!
//! - [`Recognizer::recover_from_field`] starts at the static field holding
//!   the registration (or its `.DependencyProperty` companion).
//! - [`Recognizer::recover_from_property`] starts at a CLR property wrapper
//!   and finds the field by naming convention, falling back to the field
//!   the setter writes, then the field the getter reads.

use std::collections::HashMap;

use tracing::debug;

use dpcheck_core::adapter::SemanticModel;
use dpcheck_core::model::{Body, DeclKind, Expr, ExprKind, Symbol, SymbolId, SymbolKind};
use dpcheck_core::patch::FileId;
use dpcheck_core::CancellationToken;

use crate::known;
use crate::names;
use crate::pattern::{
    AccessorKind, BackingField, CallbackMethod, ClrAccessorMethod, ClrPropertyWrapper, Miss,
    PatternInstance,
};
use crate::registration::{parse_registration, CallbackKind, RegistrationCall};

/// Recovers [`PatternInstance`]s from a snapshot.
///
/// Holds only borrowed, read-only state; cheap to create per query.
pub struct Recognizer<'a> {
    model: &'a dyn SemanticModel,
    cancel: &'a CancellationToken,
}

impl<'a> Recognizer<'a> {
    pub fn new(model: &'a dyn SemanticModel, cancel: &'a CancellationToken) -> Self {
        Recognizer { model, cancel }
    }

    pub fn model(&self) -> &'a dyn SemanticModel {
        self.model
    }

    pub(crate) fn check_cancelled(&self) -> Result<(), Miss> {
        if self.cancel.is_cancelled() {
            Err(Miss::Cancelled)
        } else {
            Ok(())
        }
    }

    // ========================================================================
    // Entry points
    // ========================================================================

    /// Recover the instance a static field belongs to, or `None`.
    pub fn recover_from_field(&self, field: SymbolId) -> Option<PatternInstance> {
        match self.try_recover_from_field(field) {
            Ok(instance) => Some(instance),
            Err(miss) => {
                debug!(field = %self.name_of(field), %miss, "no pattern from field");
                None
            }
        }
    }

    /// Recover the instance a CLR property wraps, or `None`.
    pub fn recover_from_property(&self, property: SymbolId) -> Option<PatternInstance> {
        match self.try_recover_from_property(property) {
            Ok(instance) => Some(instance),
            Err(miss) => {
                debug!(property = %self.name_of(property), %miss, "no pattern from property");
                None
            }
        }
    }

    /// Recover from a static field, reporting why recovery failed.
    pub fn try_recover_from_field(&self, field: SymbolId) -> Result<PatternInstance, Miss> {
        self.check_cancelled()?;
        let symbol = self.static_field(field)?;
        let owner = self
            .model
            .containing_type(field)
            .ok_or_else(|| Miss::unresolved(format!("container of '{}'", symbol.name)))?;

        let (registration_field, registration) = self.registration_of(field)?;
        let field_info = self.backing_field(registration_field, registration.is_read_only())?;

        let public_field = if registration.is_read_only() {
            if registration_field == field {
                self.companion_of(owner, registration_field)?
            } else {
                Some(self.backing_field(field, false)?)
            }
        } else {
            None
        };

        let mut instance = PatternInstance {
            owner,
            registration,
            field: field_info,
            public_field,
            property: None,
            get_method: None,
            set_method: None,
            callbacks: Vec::new(),
        };

        if instance.registration.is_attached() {
            instance.get_method = self.attached_accessor(owner, registration_field, AccessorKind::Get)?;
            instance.set_method = self.attached_accessor(owner, registration_field, AccessorKind::Set)?;
        } else {
            instance.property = self.wrapper_for_field(owner, registration_field, &instance)?;
        }
        instance.callbacks = self.callbacks_of(owner, &instance.registration)?;
        Ok(instance)
    }

    /// Recover from a CLR property, reporting why recovery failed.
    pub fn try_recover_from_property(&self, property: SymbolId) -> Result<PatternInstance, Miss> {
        self.check_cancelled()?;
        let wrapper = self.potential_wrapper(property)?;
        let owner = self
            .model
            .containing_type(property)
            .ok_or_else(|| Miss::unresolved(format!("container of '{}'", wrapper.name)))?;

        let field = match self.field_by_name(owner, &wrapper.name)? {
            Some(field) => field,
            None => wrapper
                .setter_field
                .or(wrapper.getter_field)
                .ok_or_else(|| Miss::not_a_pattern("property accesses no field"))?,
        };

        let mut instance = self.try_recover_from_field(field)?;
        if instance.registration.is_attached() {
            return Err(Miss::not_a_pattern("attached property has no CLR wrapper"));
        }
        instance.property = Some(wrapper);
        Ok(instance)
    }

    // ========================================================================
    // Fields
    // ========================================================================

    fn static_field(&self, field: SymbolId) -> Result<&'a Symbol, Miss> {
        let symbol = self
            .model
            .symbol(field)
            .ok_or_else(|| Miss::unresolved(format!("{field}")))?;
        if symbol.kind != SymbolKind::Field || !symbol.is_static {
            return Err(Miss::not_a_pattern(format!("'{}' is not a static field", symbol.name)));
        }
        Ok(symbol)
    }

    /// The registration behind a field: its own, or the one of the key
    /// field a `.DependencyProperty` companion reads.
    fn registration_of(&self, field: SymbolId) -> Result<(SymbolId, RegistrationCall), Miss> {
        let registration_field = self.key_field_of(field).unwrap_or(field);
        let (file, value) = self.registration_value(registration_field)?;
        let registration = parse_registration(self.model, file, value)?;
        Ok((registration_field, registration))
    }

    /// The value assigned to a static field: its initializer, or the single
    /// assignment in a static constructor.
    pub fn registration_value(&self, field: SymbolId) -> Result<(FileId, &'a Expr), Miss> {
        let decl = self
            .model
            .declaration_of(field)
            .ok_or_else(|| Miss::not_a_pattern("field is not declared in source"))?;
        if let DeclKind::Field {
            initializer: Some(init),
            ..
        } = &decl.kind
        {
            return Ok((decl.file, init.without_casts()));
        }

        let owner = self
            .model
            .containing_type(field)
            .ok_or_else(|| Miss::unresolved("field container"))?;
        let mut assigned = Vec::new();
        for member in self.model.members_of(owner, false) {
            let Some(ctor) = self.model.symbol(member) else {
                continue;
            };
            if ctor.kind != SymbolKind::Constructor || !ctor.is_static {
                continue;
            }
            let Some(ctor_decl) = self.model.declaration_of(member) else {
                continue;
            };
            let DeclKind::Method {
                body: Some(body), ..
            } = &ctor_decl.kind
            else {
                continue;
            };
            body.walk_exprs(&mut |expr| {
                if let ExprKind::Assign { target, value } = &expr.kind {
                    if self.model.resolve_identifier(target) == Some(field) {
                        assigned.push((ctor_decl.file, value.without_casts()));
                    }
                }
            });
        }
        match assigned.as_slice() {
            [single] => Ok(*single),
            [] => Err(Miss::not_a_pattern("field is never assigned")),
            _ => Err(Miss::ambiguous("field is assigned more than once")),
        }
    }

    /// The key field a `{Key}.DependencyProperty` companion reads.
    pub fn key_field_of(&self, field: SymbolId) -> Option<SymbolId> {
        let (_, value) = self.registration_value(field).ok()?;
        let ExprKind::MemberAccess { target, symbol, .. } = &value.kind else {
            return None;
        };
        let member = (*symbol)?;
        if !known::is_member_of(
            self.model,
            member,
            known::DEPENDENCY_PROPERTY_KEY,
            known::KEY_DEPENDENCY_PROPERTY,
        ) {
            return None;
        }
        let key = self.model.resolve_identifier(target)?;
        let key_symbol = self.model.symbol(key)?;
        (key_symbol.kind == SymbolKind::Field && key_symbol.is_static && key != field)
            .then_some(key)
    }

    /// A field with key-field indirection removed.
    pub fn normalize_field(&self, field: SymbolId) -> SymbolId {
        self.key_field_of(field).unwrap_or(field)
    }

    fn backing_field(&self, field: SymbolId, is_key_field: bool) -> Result<BackingField, Miss> {
        let symbol = self.static_field(field)?;
        let decl = self
            .model
            .declaration_of(field)
            .ok_or_else(|| Miss::not_a_pattern("field is not declared in source"))?;
        Ok(BackingField {
            symbol: field,
            name: symbol.name.clone(),
            file: decl.file,
            name_span: decl.name_span,
            declared_type: symbol.ty.clone(),
            is_key_field,
        })
    }

    /// The single `.DependencyProperty` companion of a key field.
    fn companion_of(&self, owner: SymbolId, key: SymbolId) -> Result<Option<BackingField>, Miss> {
        self.check_cancelled()?;
        let companions: Vec<SymbolId> = self
            .static_fields(owner)
            .filter(|candidate| *candidate != key && self.key_field_of(*candidate) == Some(key))
            .collect();
        match companions.as_slice() {
            [] => Ok(None),
            [single] => Ok(Some(self.backing_field(*single, false)?)),
            _ => Err(Miss::ambiguous("key field has more than one companion")),
        }
    }

    fn static_fields(&self, owner: SymbolId) -> impl Iterator<Item = SymbolId> + '_ {
        self.model
            .members_of(owner, false)
            .into_iter()
            .filter(|id| {
                self.model
                    .symbol(*id)
                    .is_some_and(|s| s.kind == SymbolKind::Field && s.is_static && s.is_source())
            })
    }

    /// Field found by the `{Name}PropertyKey` / `{Name}Property` convention.
    fn field_by_name(&self, owner: SymbolId, property: &str) -> Result<Option<SymbolId>, Miss> {
        self.check_cancelled()?;
        for candidate in names::field_candidates(property) {
            let found: Vec<SymbolId> = self
                .static_fields(owner)
                .filter(|id| self.model.symbol(*id).is_some_and(|s| s.name == candidate))
                .collect();
            match found.as_slice() {
                [] => continue,
                [single] => return Ok(Some(*single)),
                _ => return Err(Miss::ambiguous(format!("more than one field '{candidate}'"))),
            }
        }
        Ok(None)
    }

    // ========================================================================
    // CLR property wrappers
    // ========================================================================

    /// Read a property as a CLR wrapper: an instance property of a
    /// `DependencyObject` whose accessors call `GetValue`/`SetValue` with a
    /// static field.
    pub fn potential_wrapper(&self, property: SymbolId) -> Result<ClrPropertyWrapper, Miss> {
        let symbol = self
            .model
            .symbol(property)
            .ok_or_else(|| Miss::unresolved(format!("{property}")))?;
        if symbol.kind != SymbolKind::Property || symbol.is_static {
            return Err(Miss::not_a_pattern(format!(
                "'{}' is not an instance property",
                symbol.name
            )));
        }
        let owner = self
            .model
            .containing_type(property)
            .ok_or_else(|| Miss::unresolved(format!("container of '{}'", symbol.name)))?;
        if !self.model.is_assignable_to(owner, known::DEPENDENCY_OBJECT) {
            return Err(Miss::not_a_pattern("container is not a DependencyObject"));
        }
        let decl = self
            .model
            .declaration_of(property)
            .ok_or_else(|| Miss::not_a_pattern("property is not declared in source"))?;
        let DeclKind::Property {
            type_syntax,
            getter,
            setter,
        } = &decl.kind
        else {
            return Err(Miss::not_a_pattern("declaration is not a property"));
        };

        let getter_field = getter
            .as_ref()
            .and_then(|a| a.body.as_ref())
            .and_then(|body| self.accessed_field(body, &[known::GET_VALUE]));
        let setter_field = setter
            .as_ref()
            .and_then(|a| a.body.as_ref())
            .and_then(|body| self.accessed_field(body, &[known::SET_VALUE, known::SET_CURRENT_VALUE]));
        if getter_field.is_none() && setter_field.is_none() {
            return Err(Miss::not_a_pattern(format!(
                "'{}' does not call GetValue or SetValue",
                symbol.name
            )));
        }

        Ok(ClrPropertyWrapper {
            symbol: property,
            name: symbol.name.clone(),
            file: decl.file,
            name_span: decl.name_span,
            decl_span: decl.span,
            declared_type: type_syntax.ty.clone(),
            type_span: type_syntax.span,
            getter_field,
            setter_field,
        })
    }

    /// First static field passed to one of the `DependencyObject` methods
    /// `methods` in `body`.
    fn accessed_field(&self, body: &Body, methods: &[&str]) -> Option<SymbolId> {
        let mut found = None;
        body.walk_exprs(&mut |expr| {
            if found.is_some() {
                return;
            }
            let ExprKind::Invocation { callee, args } = &expr.kind else {
                return;
            };
            let Some(method) = self.model.resolve_identifier(callee) else {
                return;
            };
            if !methods
                .iter()
                .any(|name| known::is_member_of(self.model, method, known::DEPENDENCY_OBJECT, name))
            {
                return;
            }
            let field = args
                .first()
                .and_then(|arg| self.model.resolve_identifier(arg.expr.without_casts()))
                .filter(|id| {
                    self.model
                        .symbol(*id)
                        .is_some_and(|s| s.kind == SymbolKind::Field && s.is_static)
                });
            found = field;
        });
        found
    }

    /// The single property wrapping `field`. When several do, the one named
    /// after the registration wins.
    fn wrapper_for_field(
        &self,
        owner: SymbolId,
        field: SymbolId,
        instance: &PatternInstance,
    ) -> Result<Option<ClrPropertyWrapper>, Miss> {
        self.check_cancelled()?;
        let mut wrappers = Vec::new();
        for member in self.model.members_of(owner, false) {
            let Some(symbol) = self.model.symbol(member) else {
                continue;
            };
            if symbol.kind != SymbolKind::Property || symbol.is_static {
                continue;
            }
            let Ok(wrapper) = self.potential_wrapper(member) else {
                continue;
            };
            let uses_field = [wrapper.getter_field, wrapper.setter_field]
                .into_iter()
                .flatten()
                .any(|accessed| self.normalize_field(accessed) == field);
            if uses_field {
                wrappers.push(wrapper);
            }
        }
        if wrappers.len() > 1 {
            wrappers.retain(|w| w.name == instance.registered_name());
            if wrappers.len() != 1 {
                return Err(Miss::ambiguous("more than one property wraps the field"));
            }
        }
        Ok(wrappers.pop())
    }

    // ========================================================================
    // Attached property accessors
    // ========================================================================

    /// The single static method calling `GetValue` (or `SetValue`) with
    /// `field`.
    fn attached_accessor(
        &self,
        owner: SymbolId,
        field: SymbolId,
        kind: AccessorKind,
    ) -> Result<Option<ClrAccessorMethod>, Miss> {
        self.check_cancelled()?;
        let methods: &[&str] = match kind {
            AccessorKind::Get => &[known::GET_VALUE],
            AccessorKind::Set => &[known::SET_VALUE],
        };
        let mut found = Vec::new();
        for member in self.model.members_of(owner, false) {
            let Some(symbol) = self.model.symbol(member) else {
                continue;
            };
            if symbol.kind != SymbolKind::Method || !symbol.is_static {
                continue;
            }
            let Some(decl) = self.model.declaration_of(member) else {
                continue;
            };
            let DeclKind::Method {
                body: Some(body), ..
            } = &decl.kind
            else {
                continue;
            };
            let accessed = self.accessed_field(body, methods);
            if accessed.is_some_and(|accessed| self.normalize_field(accessed) == field) {
                found.push(ClrAccessorMethod {
                    symbol: member,
                    kind,
                    name: symbol.name.clone(),
                    file: decl.file,
                    name_span: decl.name_span,
                });
            }
        }
        match found.len() {
            0 => Ok(None),
            1 => Ok(found.pop()),
            _ => Err(Miss::ambiguous(format!("more than one {kind:?} accessor"))),
        }
    }

    // ========================================================================
    // Callbacks
    // ========================================================================

    fn callbacks_of(
        &self,
        owner: SymbolId,
        registration: &RegistrationCall,
    ) -> Result<Vec<CallbackMethod>, Miss> {
        if registration.callbacks().next().is_none() {
            return Ok(Vec::new());
        }
        let usage = self.callback_usage(owner)?;
        Ok(registration
            .callbacks()
            .map(|arg| CallbackMethod {
                kind: arg.kind,
                method: arg.method,
                identifier: arg.identifier.clone(),
                file: arg.file,
                identifier_span: arg.identifier_span,
                shared: usage.get(&(arg.kind, arg.method)).copied().unwrap_or(0) > 1,
            })
            .collect())
    }

    /// How many registrations in `owner` use each method as each kind of
    /// callback.
    fn callback_usage(&self, owner: SymbolId) -> Result<HashMap<(CallbackKind, SymbolId), usize>, Miss> {
        self.check_cancelled()?;
        let mut usage = HashMap::new();
        for field in self.static_fields(owner) {
            let Ok((file, value)) = self.registration_value(field) else {
                continue;
            };
            let Ok(registration) = parse_registration(self.model, file, value) else {
                continue;
            };
            for arg in registration.callbacks() {
                *usage.entry((arg.kind, arg.method)).or_insert(0) += 1;
            }
        }
        Ok(usage)
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn name_of(&self, id: SymbolId) -> String {
        self.model
            .symbol(id)
            .map_or_else(|| id.to_string(), |s| s.name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::Fixture;

    fn recognize<T>(src: &str, f: impl FnOnce(&Recognizer<'_>, &Fixture) -> T) -> T {
        let fixture = Fixture::parse(&[("Foo.cs", src)]).unwrap();
        let cancel = CancellationToken::new();
        let recognizer = Recognizer::new(fixture.table(), &cancel);
        f(&recognizer, &fixture)
    }

    mod from_field {
        use super::*;

        #[test]
        fn plain_registration_with_wrapper() {
            let src = r#"
using System.Windows;
public class FooControl : Control
{
    public static readonly DependencyProperty BarProperty = DependencyProperty.Register(
        "Bar", typeof(int), typeof(FooControl), new PropertyMetadata(default(int), OnBarChanged));

    public int Bar
    {
        get => (int)GetValue(BarProperty);
        set => SetValue(BarProperty, value);
    }

    private static void OnBarChanged(DependencyObject d, DependencyPropertyChangedEventArgs e) { }
}
"#;
            recognize(src, |r, fx| {
                let instance = r.try_recover_from_field(fx.field("FooControl", "BarProperty")).unwrap();
                assert_eq!(instance.registered_name(), "Bar");
                assert!(!instance.field.is_key_field);
                assert_eq!(instance.property.as_ref().unwrap().name, "Bar");
                assert_eq!(instance.callbacks.len(), 1);
                assert_eq!(instance.callbacks[0].identifier, "OnBarChanged");
                assert!(!instance.callbacks[0].shared);
            });
        }

        #[test]
        fn unrelated_static_field_is_not_a_pattern() {
            let src = r#"
public class FooControl : Control
{
    public static readonly string BarProperty = string.Concat("a", "b");
    public static readonly int Count = 3;
}
"#;
            recognize(src, |r, fx| {
                assert!(matches!(
                    r.try_recover_from_field(fx.field("FooControl", "BarProperty")),
                    Err(Miss::NotAPattern(_) | Miss::Unresolved(_))
                ));
                assert!(r.recover_from_field(fx.field("FooControl", "Count")).is_none());
            });
        }

        #[test]
        fn non_constant_name_is_not_a_pattern() {
            let src = r#"
public class FooControl : Control
{
    private static string name = "Bar";
    public static readonly DependencyProperty BarProperty =
        DependencyProperty.Register(name, typeof(int), typeof(FooControl));
}
"#;
            recognize(src, |r, fx| {
                assert!(r.recover_from_field(fx.field("FooControl", "BarProperty")).is_none());
            });
        }

        #[test]
        fn key_field_and_companion_converge() {
            let src = r#"
public class FooControl : Control
{
    private static readonly DependencyPropertyKey BazPropertyKey = DependencyProperty.RegisterReadOnly(
        nameof(Baz), typeof(string), typeof(FooControl), new PropertyMetadata(null));

    public static readonly DependencyProperty BazProperty = BazPropertyKey.DependencyProperty;

    public string Baz
    {
        get => (string)GetValue(BazProperty);
        private set => SetValue(BazPropertyKey, value);
    }
}
"#;
            recognize(src, |r, fx| {
                let key = fx.field("FooControl", "BazPropertyKey");
                let public = fx.field("FooControl", "BazProperty");
                let from_key = r.try_recover_from_field(key).unwrap();
                let from_public = r.try_recover_from_field(public).unwrap();
                assert_eq!(from_key, from_public);
                assert!(from_key.field.is_key_field);
                assert_eq!(from_key.field.symbol, key);
                assert_eq!(from_key.public_field.as_ref().unwrap().symbol, public);
                assert_eq!(from_key.property.as_ref().unwrap().name, "Baz");
                assert_eq!(r.normalize_field(public), key);
            });
        }

        #[test]
        fn static_constructor_assignment() {
            let src = r#"
public class FooControl : Control
{
    public static readonly DependencyProperty BarProperty;

    static FooControl()
    {
        BarProperty = DependencyProperty.Register("Bar", typeof(int), typeof(FooControl));
    }
}
"#;
            recognize(src, |r, fx| {
                let instance = r.try_recover_from_field(fx.field("FooControl", "BarProperty")).unwrap();
                assert_eq!(instance.registered_name(), "Bar");
                assert!(instance.property.is_none());
            });
        }

        #[test]
        fn two_wrappers_without_name_match_is_ambiguous() {
            let src = r#"
public class FooControl : Control
{
    public static readonly DependencyProperty BarProperty =
        DependencyProperty.Register("Bar", typeof(int), typeof(FooControl));

    public int First { get => (int)GetValue(BarProperty); set => SetValue(BarProperty, value); }
    public int Second { get => (int)GetValue(BarProperty); set => SetValue(BarProperty, value); }
}
"#;
            recognize(src, |r, fx| {
                assert!(matches!(
                    r.try_recover_from_field(fx.field("FooControl", "BarProperty")),
                    Err(Miss::Ambiguous(_))
                ));
            });
        }

        #[test]
        fn attached_accessors() {
            let src = r#"
public static class Attached
{
    public static readonly DependencyProperty BarProperty = DependencyProperty.RegisterAttached(
        "Bar", typeof(int), typeof(Attached), new PropertyMetadata(0));

    public static void SetBar(DependencyObject element, int value) => element.SetValue(BarProperty, value);

    public static int GetBar(DependencyObject element) => (int)element.GetValue(BarProperty);
}
"#;
            recognize(src, |r, fx| {
                let instance = r.try_recover_from_field(fx.field("Attached", "BarProperty")).unwrap();
                assert!(instance.registration.is_attached());
                assert_eq!(instance.get_method.as_ref().unwrap().name, "GetBar");
                assert_eq!(instance.set_method.as_ref().unwrap().name, "SetBar");
                assert!(instance.property.is_none());
            });
        }

        #[test]
        fn shared_callback_is_marked() {
            let src = r#"
public class FooControl : Control
{
    public static readonly DependencyProperty BarProperty = DependencyProperty.Register(
        "Bar", typeof(int), typeof(FooControl), new PropertyMetadata(0, OnValueChanged));

    public static readonly DependencyProperty BazProperty = DependencyProperty.Register(
        "Baz", typeof(int), typeof(FooControl), new PropertyMetadata(0, OnValueChanged));

    private static void OnValueChanged(DependencyObject d, DependencyPropertyChangedEventArgs e) { }
}
"#;
            recognize(src, |r, fx| {
                let instance = r.try_recover_from_field(fx.field("FooControl", "BarProperty")).unwrap();
                assert!(instance.callbacks[0].shared);
            });
        }

        #[test]
        fn cancelled_token_misses() {
            let fixture = Fixture::parse(&[(
                "Foo.cs",
                "public class FooControl : Control { public static readonly DependencyProperty BarProperty = DependencyProperty.Register(\"Bar\", typeof(int), typeof(FooControl)); }",
            )])
            .unwrap();
            let cancel = CancellationToken::new();
            cancel.cancel();
            let r = Recognizer::new(fixture.table(), &cancel);
            assert_eq!(
                r.try_recover_from_field(fixture.field("FooControl", "BarProperty")),
                Err(Miss::Cancelled)
            );
        }
    }

    mod from_property {
        use super::*;

        #[test]
        fn setter_traced_field_with_unconventional_name() {
            let src = r#"
public class FooControl : Control
{
    public static readonly DependencyProperty Storage =
        DependencyProperty.Register("Bar", typeof(int), typeof(FooControl));

    public int Bar
    {
        get { return (int)this.GetValue(Storage); }
        set { this.SetValue(Storage, value); }
    }
}
"#;
            recognize(src, |r, fx| {
                let instance = r.try_recover_from_property(fx.property("FooControl", "Bar")).unwrap();
                assert_eq!(instance.field.name, "Storage");
                assert_eq!(instance.registered_name(), "Bar");
            });
        }

        #[test]
        fn naming_wins_over_tracing() {
            let src = r#"
public class FooControl : Control
{
    public static readonly DependencyProperty QuxProperty =
        DependencyProperty.Register("Qux", typeof(int), typeof(FooControl));

    public static readonly DependencyProperty OtherQuxProperty =
        DependencyProperty.Register("OtherQux", typeof(int), typeof(FooControl));

    public int Qux
    {
        get => (int)GetValue(QuxProperty);
        set => SetValue(OtherQuxProperty, value);
    }
}
"#;
            recognize(src, |r, fx| {
                let instance = r.try_recover_from_property(fx.property("FooControl", "Qux")).unwrap();
                assert_eq!(instance.field.name, "QuxProperty");
                let wrapper = instance.property.unwrap();
                assert_eq!(wrapper.getter_field, Some(fx.field("FooControl", "QuxProperty")));
                assert_eq!(wrapper.setter_field, Some(fx.field("FooControl", "OtherQuxProperty")));
            });
        }

        #[test]
        fn plain_property_is_not_a_pattern() {
            let src = r#"
public class FooControl : Control
{
    public static readonly DependencyProperty BarProperty =
        DependencyProperty.Register("Bar", typeof(int), typeof(FooControl));

    public int Bar { get; set; }
}
"#;
            recognize(src, |r, fx| {
                assert!(r.recover_from_property(fx.property("FooControl", "Bar")).is_none());
            });
        }

        #[test]
        fn not_a_dependency_object() {
            let src = r#"
public class Plain
{
    public static readonly DependencyProperty BarProperty =
        DependencyProperty.Register("Bar", typeof(int), typeof(Plain));

    public int Bar { get => 1; set { } }
}
"#;
            recognize(src, |r, fx| {
                assert!(matches!(
                    r.try_recover_from_property(fx.property("Plain", "Bar")),
                    Err(Miss::NotAPattern(_))
                ));
            });
        }

        #[test]
        fn shared_field_without_name_match_is_ambiguous() {
            let src = r#"
public class FooControl : Control
{
    public static readonly DependencyProperty BarProperty =
        DependencyProperty.Register("Bar", typeof(int), typeof(FooControl));

    public int First { get => (int)GetValue(BarProperty); set => SetValue(BarProperty, value); }
    public int Second { get => (int)GetValue(BarProperty); set => SetValue(BarProperty, value); }
}
"#;
            recognize(src, |r, fx| {
                for name in ["First", "Second"] {
                    assert!(matches!(
                        r.try_recover_from_property(fx.property("FooControl", name)),
                        Err(Miss::Ambiguous(_))
                    ));
                }
            });
        }
    }
}
