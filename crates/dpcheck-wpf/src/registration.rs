//! Registration calls: `DependencyProperty.Register*(...)`.
//!
//! Parsing a registration extracts the registered name and type (which must
//! be compile-time constants), the owner type, and the callbacks named in
//! the metadata and validate arguments. Callback arguments are followed
//! through one level of indirection: a local variable, a static field, or a
//! wrapper method returning the delegate.

use serde::Serialize;
use tracing::trace;

use dpcheck_core::adapter::SemanticModel;
use dpcheck_core::model::{
    Argument, Body, DeclKind, Expr, ExprKind, StmtKind, SymbolId, SymbolKind, TypeRef,
};
use dpcheck_core::patch::{FileId, Span};

use crate::known;
use crate::pattern::Miss;

/// Which `Register*` overload family was called.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationKind {
    Register,
    RegisterReadOnly,
    RegisterAttached,
    RegisterAttachedReadOnly,
}

impl RegistrationKind {
    /// Kind for a `DependencyProperty` method name.
    pub fn from_method_name(name: &str) -> Option<Self> {
        match name {
            "Register" => Some(RegistrationKind::Register),
            "RegisterReadOnly" => Some(RegistrationKind::RegisterReadOnly),
            "RegisterAttached" => Some(RegistrationKind::RegisterAttached),
            "RegisterAttachedReadOnly" => Some(RegistrationKind::RegisterAttachedReadOnly),
            _ => None,
        }
    }

    /// Read-only registrations return a `DependencyPropertyKey`.
    pub fn is_read_only(self) -> bool {
        matches!(
            self,
            RegistrationKind::RegisterReadOnly | RegistrationKind::RegisterAttachedReadOnly
        )
    }

    pub fn is_attached(self) -> bool {
        matches!(
            self,
            RegistrationKind::RegisterAttached | RegistrationKind::RegisterAttachedReadOnly
        )
    }
}

/// The framework hook a callback implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackKind {
    PropertyChanged,
    CoerceValue,
    ValidateValue,
}

impl CallbackKind {
    /// Kind for a delegate type.
    pub fn from_delegate_type(ty: &TypeRef) -> Option<Self> {
        if ty.is_named(known::PROPERTY_CHANGED_CALLBACK) {
            Some(CallbackKind::PropertyChanged)
        } else if ty.is_named(known::COERCE_VALUE_CALLBACK) {
            Some(CallbackKind::CoerceValue)
        } else if ty.is_named(known::VALIDATE_VALUE_CALLBACK) {
            Some(CallbackKind::ValidateValue)
        } else {
            None
        }
    }

    /// Kind for a named argument of a metadata constructor.
    fn from_parameter_name(name: &str) -> Option<Self> {
        match name {
            "propertyChangedCallback" => Some(CallbackKind::PropertyChanged),
            "coerceValueCallback" => Some(CallbackKind::CoerceValue),
            "validateValueCallback" => Some(CallbackKind::ValidateValue),
            _ => None,
        }
    }
}

/// A callback argument resolved to the method it names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallbackArg {
    pub kind: CallbackKind,
    pub method: SymbolId,
    /// The identifier naming the method.
    pub identifier: String,
    pub file: FileId,
    pub identifier_span: Span,
}

/// The metadata object passed to a registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Metadata {
    pub span: Span,
    pub metadata_type: TypeRef,
    /// Span of the default value argument.
    pub default_value: Option<Span>,
    pub property_changed_callback: Option<CallbackArg>,
    pub coerce_value_callback: Option<CallbackArg>,
}

/// A parsed `DependencyProperty.Register*` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrationCall {
    pub kind: RegistrationKind,
    pub file: FileId,
    /// The invocation.
    pub span: Span,
    pub registered_name: String,
    /// Span of the name argument.
    pub name_span: Span,
    pub registered_type: TypeRef,
    /// Span of the type inside `typeof(...)`.
    pub registered_type_span: Span,
    pub owner_type: Option<TypeRef>,
    pub metadata: Option<Metadata>,
    pub validate_value_callback: Option<CallbackArg>,
}

impl RegistrationCall {
    pub fn is_read_only(&self) -> bool {
        self.kind.is_read_only()
    }

    pub fn is_attached(&self) -> bool {
        self.kind.is_attached()
    }

    /// Every callback argument, metadata callbacks first.
    pub fn callbacks(&self) -> impl Iterator<Item = &CallbackArg> {
        self.metadata
            .iter()
            .flat_map(|m| [&m.property_changed_callback, &m.coerce_value_callback])
            .chain(std::iter::once(&self.validate_value_callback))
            .flatten()
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// Parse `expr` as a registration call.
pub fn parse_registration(
    model: &dyn SemanticModel,
    file: FileId,
    expr: &Expr,
) -> Result<RegistrationCall, Miss> {
    let expr = expr.without_casts();
    let ExprKind::Invocation { callee, args } = &expr.kind else {
        return Err(Miss::not_a_pattern("initializer is not an invocation"));
    };
    let method = model
        .resolve_identifier(callee)
        .ok_or_else(|| Miss::unresolved(format!("callee '{}'", callee.simple_name().unwrap_or("?"))))?;
    let kind = model
        .symbol(method)
        .and_then(|m| RegistrationKind::from_method_name(&m.name))
        .filter(|_| {
            known::REGISTER_METHODS
                .iter()
                .any(|name| known::is_member_of(model, method, known::DEPENDENCY_PROPERTY, name))
        })
        .ok_or_else(|| Miss::not_a_pattern("callee is not DependencyProperty.Register*"))?;

    let name_arg = argument(args, 0, &["name"])
        .ok_or_else(|| Miss::not_a_pattern("registration has no name argument"))?;
    let registered_name = constant_string(model, &name_arg.expr)
        .ok_or_else(|| Miss::not_a_pattern("registered name is not a constant"))?;

    let type_arg = argument(args, 1, &["propertyType"])
        .ok_or_else(|| Miss::not_a_pattern("registration has no type argument"))?;
    let ExprKind::TypeOf { type_syntax } = &type_arg.expr.kind else {
        return Err(Miss::not_a_pattern("registered type is not a typeof expression"));
    };
    if type_syntax.ty.is_unknown() {
        return Err(Miss::unresolved("registered type"));
    }

    let owner_type = argument(args, 2, &["ownerType"]).and_then(|arg| match &arg.expr.kind {
        ExprKind::TypeOf { type_syntax } => Some(type_syntax.ty.clone()),
        _ => None,
    });

    let metadata = match argument(args, 3, &["typeMetadata", "defaultMetadata"]) {
        Some(arg) => parse_metadata(model, file, &arg.expr)?,
        None => None,
    };

    let validate_value_callback = match argument(args, 4, &["validateValueCallback"]) {
        Some(arg) => resolve_callback(model, file, &arg.expr, CallbackKind::ValidateValue, 1)?,
        None => None,
    };

    trace!(name = %registered_name, ?kind, "parsed registration");
    Ok(RegistrationCall {
        kind,
        file,
        span: expr.span,
        registered_name,
        name_span: name_arg.expr.span,
        registered_type: type_syntax.ty.clone(),
        registered_type_span: type_syntax.span,
        owner_type,
        metadata,
        validate_value_callback,
    })
}

/// The argument bound to parameter `index`, or to one of `names` when
/// passed by name.
fn argument<'a>(args: &'a [Argument], index: usize, names: &[&str]) -> Option<&'a Argument> {
    if let Some(named) = args
        .iter()
        .find(|a| a.name.as_deref().is_some_and(|n| names.contains(&n)))
    {
        return Some(named);
    }
    let positional = args.get(index)?;
    let all_positional = args[..=index].iter().all(|a| a.name.is_none());
    all_positional.then_some(positional)
}

/// Compile-time value of a string expression: a literal, `nameof(X)`, or a
/// `const string` field initialized with either.
pub fn constant_string(model: &dyn SemanticModel, expr: &Expr) -> Option<String> {
    constant_string_inner(model, expr, 1)
}

fn constant_string_inner(model: &dyn SemanticModel, expr: &Expr, hops: u8) -> Option<String> {
    match &expr.kind {
        ExprKind::StringLiteral { value } => Some(value.clone()),
        ExprKind::NameOf { operand } => operand.simple_name().map(str::to_string),
        ExprKind::Identifier { .. } | ExprKind::MemberAccess { .. } if hops > 0 => {
            let id = model.resolve_identifier(expr)?;
            let symbol = model.symbol(id)?;
            if symbol.kind != SymbolKind::Field || !symbol.is_const {
                return None;
            }
            match &model.declaration_of(id)?.kind {
                DeclKind::Field {
                    initializer: Some(init),
                    ..
                } => constant_string_inner(model, init, hops - 1),
                _ => None,
            }
        }
        _ => None,
    }
}

fn parse_metadata(
    model: &dyn SemanticModel,
    file: FileId,
    expr: &Expr,
) -> Result<Option<Metadata>, Miss> {
    let Some((file, expr)) = follow_value(model, file, expr.without_casts(), 1)? else {
        return Ok(None);
    };
    let ExprKind::ObjectCreation {
        type_syntax, args, ..
    } = &expr.kind
    else {
        return Ok(None);
    };
    if !known::is_metadata_type(&type_syntax.ty) {
        return Ok(None);
    }

    let mut metadata = Metadata {
        span: expr.span,
        metadata_type: type_syntax.ty.clone(),
        default_value: None,
        property_changed_callback: None,
        coerce_value_callback: None,
    };
    for (index, arg) in args.iter().enumerate() {
        let kind = callback_kind_of(model, &arg.expr)
            .or_else(|| arg.name.as_deref().and_then(CallbackKind::from_parameter_name));
        match kind {
            Some(CallbackKind::PropertyChanged) => {
                metadata.property_changed_callback =
                    resolve_callback(model, file, &arg.expr, CallbackKind::PropertyChanged, 1)?;
            }
            Some(CallbackKind::CoerceValue) => {
                metadata.coerce_value_callback =
                    resolve_callback(model, file, &arg.expr, CallbackKind::CoerceValue, 1)?;
            }
            Some(CallbackKind::ValidateValue) => {}
            None if index == 0 && arg.name.is_none() => metadata.default_value = Some(arg.expr.span),
            None if arg.name.as_deref() == Some("defaultValue") => {
                metadata.default_value = Some(arg.expr.span)
            }
            None => {}
        }
    }
    Ok(Some(metadata))
}

/// Callback kind of an argument, from its converted type or the delegate
/// it constructs.
fn callback_kind_of(model: &dyn SemanticModel, expr: &Expr) -> Option<CallbackKind> {
    if let Some(kind) = model
        .type_of(expr)
        .and_then(|ty| CallbackKind::from_delegate_type(&ty))
    {
        return Some(kind);
    }
    match &expr.kind {
        ExprKind::ObjectCreation { type_syntax, .. } | ExprKind::Cast { type_syntax, .. } => {
            CallbackKind::from_delegate_type(&type_syntax.ty)
        }
        _ => None,
    }
}

/// Resolve a callback argument to the method it names.
///
/// `Ok(None)` when the argument is not a method reference (a lambda, `null`,
/// a parameter). `Err` when it names something the host could not resolve.
pub fn resolve_callback(
    model: &dyn SemanticModel,
    file: FileId,
    expr: &Expr,
    kind: CallbackKind,
    hops: u8,
) -> Result<Option<CallbackArg>, Miss> {
    let expr = expr.without_casts();
    match &expr.kind {
        ExprKind::Identifier { name, .. } | ExprKind::MemberAccess { name, .. } => {
            let id = model
                .resolve_identifier(expr)
                .ok_or_else(|| Miss::unresolved(format!("callback '{name}'")))?;
            let Some(symbol) = model.symbol(id) else {
                return Err(Miss::unresolved(format!("callback '{name}'")));
            };
            match symbol.kind {
                SymbolKind::Method => Ok(Some(CallbackArg {
                    kind,
                    method: id,
                    identifier: name.clone(),
                    file,
                    identifier_span: expr.name_span().unwrap_or(expr.span),
                })),
                SymbolKind::Local | SymbolKind::Field if hops > 0 => {
                    match follow_value(model, file, expr, hops)? {
                        Some((file, value)) => resolve_callback(model, file, value, kind, hops - 1),
                        None => Ok(None),
                    }
                }
                _ => Ok(None),
            }
        }
        ExprKind::ObjectCreation {
            type_syntax, args, ..
        } if CallbackKind::from_delegate_type(&type_syntax.ty).is_some() => match args.as_slice() {
            [single] => resolve_callback(model, file, &single.expr, kind, hops),
            _ => Ok(None),
        },
        ExprKind::Invocation { .. } if hops > 0 => match follow_value(model, file, expr, hops)? {
            Some((file, value)) => resolve_callback(model, file, value, kind, hops - 1),
            None => Ok(None),
        },
        _ => Ok(None),
    }
}

/// Follow one level of indirection: a local's initializer, a static
/// readonly field's initializer, or the single value a source method
/// returns. Anything else is returned unchanged.
pub fn follow_value<'m>(
    model: &'m dyn SemanticModel,
    file: FileId,
    expr: &'m Expr,
    hops: u8,
) -> Result<Option<(FileId, &'m Expr)>, Miss> {
    if hops == 0 {
        return Ok(Some((file, expr)));
    }
    let target = match &expr.kind {
        ExprKind::Identifier { .. } | ExprKind::MemberAccess { .. } => model.resolve_identifier(expr),
        ExprKind::Invocation { callee, args } if args.is_empty() => model.resolve_identifier(callee),
        _ => return Ok(Some((file, expr))),
    };
    let Some(target) = target else {
        return Err(Miss::unresolved(format!(
            "'{}'",
            expr.simple_name().unwrap_or("expression")
        )));
    };
    let Some(symbol) = model.symbol(target) else {
        return Err(Miss::unresolved("expression target"));
    };
    match symbol.kind {
        SymbolKind::Local => Ok(local_initializer(model, target)),
        SymbolKind::Field if symbol.is_static && (symbol.is_readonly || symbol.is_const) => {
            match model.declaration_of(target) {
                Some(decl) => match &decl.kind {
                    DeclKind::Field {
                        initializer: Some(init),
                        ..
                    } => Ok(Some((decl.file, init.without_casts()))),
                    _ => Ok(None),
                },
                None => Ok(None),
            }
        }
        SymbolKind::Method if matches!(expr.kind, ExprKind::Invocation { .. }) => {
            let Some(decl) = model.declaration_of(target) else {
                return Ok(None);
            };
            let DeclKind::Method {
                body: Some(body), ..
            } = &decl.kind
            else {
                return Ok(None);
            };
            match body.returned_exprs().as_slice() {
                [single] => Ok(Some((decl.file, single.without_casts()))),
                [] => Ok(None),
                _ => Err(Miss::ambiguous(format!(
                    "'{}' returns more than one value",
                    symbol.name
                ))),
            }
        }
        _ => Ok(Some((file, expr))),
    }
}

/// Initializer of a local variable, found in the member declaring it.
pub fn local_initializer<'m>(
    model: &'m dyn SemanticModel,
    local: SymbolId,
) -> Option<(FileId, &'m Expr)> {
    let member = model.symbol(local)?.container?;
    let decl = model.declaration_of(member)?;
    let bodies: Vec<&Body> = match &decl.kind {
        DeclKind::Method { body, .. } => body.iter().collect(),
        DeclKind::Property { getter, setter, .. } => [getter, setter]
            .into_iter()
            .flatten()
            .filter_map(|accessor| accessor.body.as_ref())
            .collect(),
        _ => Vec::new(),
    };
    let mut found = None;
    for body in bodies {
        let Body::Block(stmts) = body else {
            continue;
        };
        for stmt in stmts {
            stmt.walk_stmts(&mut |s| {
                if let StmtKind::Local {
                    symbol,
                    initializer: Some(init),
                } = &s.kind
                {
                    if *symbol == local && found.is_none() {
                        found = Some(init.without_casts());
                    }
                }
            });
        }
    }
    found.map(|init| (decl.file, init))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_from_method_name() {
        assert_eq!(
            RegistrationKind::from_method_name("RegisterAttachedReadOnly"),
            Some(RegistrationKind::RegisterAttachedReadOnly)
        );
        assert_eq!(RegistrationKind::from_method_name("AddOwner"), None);
        assert!(RegistrationKind::RegisterReadOnly.is_read_only());
        assert!(!RegistrationKind::RegisterReadOnly.is_attached());
        assert!(RegistrationKind::RegisterAttached.is_attached());
    }

    #[test]
    fn callback_kind_from_delegate_type() {
        let ty = TypeRef::named(known::COERCE_VALUE_CALLBACK);
        assert_eq!(CallbackKind::from_delegate_type(&ty), Some(CallbackKind::CoerceValue));
        assert_eq!(CallbackKind::from_delegate_type(&TypeRef::named("System.Action")), None);
    }

    mod arguments {
        use super::*;

        fn arg(name: Option<&str>) -> Argument {
            Argument {
                name: name.map(str::to_string),
                expr: Expr::new(Span::default(), ExprKind::Other),
            }
        }

        #[test]
        fn positional_lookup() {
            let args = vec![arg(None), arg(None)];
            assert!(std::ptr::eq(argument(&args, 1, &["propertyType"]).unwrap(), &args[1]));
            assert!(argument(&args, 2, &["ownerType"]).is_none());
        }

        #[test]
        fn named_lookup_wins() {
            let args = vec![arg(None), arg(Some("ownerType")), arg(Some("propertyType"))];
            assert!(std::ptr::eq(argument(&args, 1, &["propertyType"]).unwrap(), &args[2]));
        }

        #[test]
        fn positional_after_named_is_rejected() {
            let args = vec![arg(Some("name")), arg(None)];
            assert!(argument(&args, 1, &["propertyType"]).is_none());
        }
    }
}
