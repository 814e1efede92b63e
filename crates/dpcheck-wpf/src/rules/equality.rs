//! Equality rules for property setters.
//!
//! A setter that starts with `if (<value equals field>) return;` should
//! compare reference types with `ReferenceEquals` (WPF1016) or, when a
//! project prefers it, with `object.Equals` (WPF1017). `string` is exempt:
//! its `==` already compares by value.

use dpcheck_core::adapter::SemanticModel;
use dpcheck_core::model::{
    Body, BinaryOp, DeclKind, Expr, ExprKind, Stmt, StmtKind, SymbolId, SymbolKind, TypeRef,
};

use super::{Finding, Remedy, WPF1016, WPF1017};
use crate::known;
use crate::pattern::Miss;
use crate::recognizer::Recognizer;

/// How a guard compares `value` with the stored value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// `==` or `!=`
    Operator,
    /// `Equals(a, b)` or `object.Equals(a, b)`
    ObjectEquals,
    /// `ReferenceEquals(a, b)`
    ReferenceEquals,
    /// `a.Equals(b)`
    InstanceEquals,
}

/// A recognized `if (...) return;` guard.
#[derive(Debug, Clone, PartialEq)]
pub struct SetterGuard<'a> {
    pub condition: &'a Expr,
    pub comparison: Comparison,
    /// True when the guard returns if the values differ.
    pub negated: bool,
    /// The field the getter returns.
    pub field: SymbolId,
}

/// Report a reference-type setter guard that does not use the preferred
/// equality.
pub fn check_setter_guard(
    recognizer: &Recognizer<'_>,
    property: SymbolId,
    findings: &mut Vec<Finding>,
) -> Result<(), Miss> {
    let model = recognizer.model();
    let Some(symbol) = model.symbol(property) else {
        return Ok(());
    };
    let Some(ty) = &symbol.ty else {
        return Ok(());
    };
    recognizer.check_cancelled()?;
    if !is_reference_type(model, ty) {
        return Ok(());
    }
    let Some(guard) = setter_guard(model, property) else {
        return Ok(());
    };
    let Some(decl) = model.declaration_of(property) else {
        return Ok(());
    };
    let Some(field) = model.symbol(guard.field) else {
        return Ok(());
    };

    let field_access = if field.name.starts_with('_') {
        field.name.clone()
    } else {
        format!("this.{}", field.name)
    };
    let remedy = Remedy::EqualityGuard {
        file: decl.file,
        condition: guard.condition.span,
        field_access,
        negated: guard.negated,
    };

    if guard.comparison != Comparison::ReferenceEquals {
        findings.push(Finding {
            descriptor: &WPF1016,
            file: decl.file,
            span: guard.condition.span,
            args: vec![symbol.name.clone()],
            remedy: remedy.clone(),
        });
    }
    if guard.comparison != Comparison::ObjectEquals {
        findings.push(Finding {
            descriptor: &WPF1017,
            file: decl.file,
            span: guard.condition.span,
            args: vec![symbol.name.clone()],
            remedy,
        });
    }
    Ok(())
}

/// Reference types other than `string`. Unresolved types are not.
fn is_reference_type(model: &dyn SemanticModel, ty: &TypeRef) -> bool {
    match ty {
        TypeRef::Array { .. } => true,
        TypeRef::Named { .. } if ty.is_named(known::STRING) => false,
        TypeRef::Named { .. } if ty.is_builtin_value_type() => false,
        TypeRef::Named { .. } => model
            .type_symbol(ty)
            .and_then(|id| model.symbol(id))
            .and_then(|s| s.type_kind)
            .is_some_and(|kind| kind.is_reference_type()),
        _ => false,
    }
}

/// The guard the setter of `property` starts with, comparing `value` with
/// the field the getter returns or with the property itself.
pub fn setter_guard(model: &dyn SemanticModel, property: SymbolId) -> Option<SetterGuard<'_>> {
    let decl = model.declaration_of(property)?;
    let DeclKind::Property {
        getter: Some(getter),
        setter: Some(setter),
        ..
    } = &decl.kind
    else {
        return None;
    };
    let field = returned_field(model, property, getter.body.as_ref()?)?;
    let Body::Block(stmts) = setter.body.as_ref()? else {
        return None;
    };
    let StmtKind::If {
        condition,
        then,
        otherwise: None,
    } = &stmts.first()?.kind
    else {
        return None;
    };
    if !is_bare_return(then) {
        return None;
    }
    let (comparison, negated) = comparison(model, condition, &[field, property])?;
    Some(SetterGuard {
        condition,
        comparison,
        negated,
        field,
    })
}

/// `return;` or `{ return; }`
pub fn is_bare_return(stmt: &Stmt) -> bool {
    match &stmt.kind {
        StmtKind::Return { value: None } => true,
        StmtKind::Block { stmts } => matches!(stmts.as_slice(), [single] if is_bare_return(single)),
        _ => false,
    }
}

/// The field of the same type a getter returns.
fn returned_field(model: &dyn SemanticModel, property: SymbolId, body: &Body) -> Option<SymbolId> {
    let returned = body.returned_exprs();
    let [returned] = returned.as_slice() else {
        return None;
    };
    let field = model.resolve_identifier(returned.without_casts())?;
    let symbol = model.symbol(field)?;
    let same_type = model.containing_type(field) == model.containing_type(property);
    (symbol.kind == SymbolKind::Field && symbol.is_source() && same_type).then_some(field)
}

/// Classify a condition comparing `value` with one of `members`.
fn comparison(
    model: &dyn SemanticModel,
    condition: &Expr,
    members: &[SymbolId],
) -> Option<(Comparison, bool)> {
    let compares = |a: &Expr, b: &Expr| {
        (is_value(model, a) && is_member(model, b, members))
            || (is_member(model, a, members) && is_value(model, b))
    };

    match &condition.kind {
        ExprKind::Not { operand } => {
            comparison(model, operand, members).map(|(kind, negated)| (kind, !negated))
        }
        ExprKind::Binary { op, left, right } if matches!(op, BinaryOp::Eq | BinaryOp::NotEq) => {
            compares(left, right).then_some((Comparison::Operator, *op == BinaryOp::NotEq))
        }
        ExprKind::Invocation { callee, args } => {
            let method = model.resolve_identifier(callee)?;
            let symbol = model.symbol(method)?;
            let from_object = known::is_member_of(model, method, known::OBJECT, &symbol.name);
            match (symbol.name.as_str(), symbol.is_static, args.as_slice()) {
                ("ReferenceEquals", true, [a, b]) if from_object => {
                    compares(&a.expr, &b.expr).then_some((Comparison::ReferenceEquals, false))
                }
                ("Equals", true, [a, b]) if from_object => {
                    compares(&a.expr, &b.expr).then_some((Comparison::ObjectEquals, false))
                }
                ("Equals", false, [arg]) => {
                    let ExprKind::MemberAccess { target, .. } = &callee.kind else {
                        return None;
                    };
                    compares(target, &arg.expr).then_some((Comparison::InstanceEquals, false))
                }
                _ => None,
            }
        }
        _ => None,
    }
}

fn is_value(model: &dyn SemanticModel, expr: &Expr) -> bool {
    model
        .resolve_identifier(expr.without_casts())
        .and_then(|id| model.symbol(id))
        .is_some_and(|s| s.kind == SymbolKind::Parameter && s.name == "value")
}

fn is_member(model: &dyn SemanticModel, expr: &Expr, members: &[SymbolId]) -> bool {
    model
        .resolve_identifier(expr.without_casts())
        .is_some_and(|id| members.contains(&id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::Fixture;
    use dpcheck_core::CancellationToken;

    fn view_model(ty: &str, field: &str, condition: &str) -> String {
        format!(
            r#"
public class Foo {{ }}

public class ViewModel
{{
    private {ty} {field};

    public {ty} Bar
    {{
        get {{ return this.{field}; }}
        set
        {{
            if ({condition}) return;
            this.{field} = value;
        }}
    }}
}}
"#
        )
    }

    fn findings(src: &str) -> Vec<Finding> {
        let fx = Fixture::parse(&[("ViewModel.cs", src)]).unwrap();
        let cancel = CancellationToken::new();
        let recognizer = Recognizer::new(fx.table(), &cancel);
        let mut out = Vec::new();
        check_setter_guard(&recognizer, fx.property("ViewModel", "Bar"), &mut out).unwrap();
        out
    }

    fn ids(src: &str) -> Vec<&'static str> {
        findings(src).iter().map(Finding::rule_id).collect()
    }

    mod forms {
        use super::*;

        #[test]
        fn operator_equality_fires_both() {
            assert_eq!(ids(&view_model("Foo", "bar", "value == this.bar")), vec!["WPF1016", "WPF1017"]);
        }

        #[test]
        fn reference_equals_satisfies_first_rule() {
            assert_eq!(ids(&view_model("Foo", "bar", "ReferenceEquals(value, this.bar)")), vec!["WPF1017"]);
        }

        #[test]
        fn object_equals_satisfies_second_rule() {
            assert_eq!(ids(&view_model("Foo", "bar", "Equals(value, this.bar)")), vec!["WPF1016"]);
            assert_eq!(ids(&view_model("Foo", "bar", "object.Equals(this.bar, value)")), vec!["WPF1016"]);
        }

        #[test]
        fn instance_equals_in_either_order() {
            assert_eq!(ids(&view_model("Foo", "bar", "value.Equals(this.bar)")), vec!["WPF1016", "WPF1017"]);
            assert_eq!(ids(&view_model("Foo", "bar", "this.bar.Equals(value)")), vec!["WPF1016", "WPF1017"]);
        }

        #[test]
        fn comparison_with_the_property_itself() {
            assert_eq!(ids(&view_model("Foo", "bar", "value == this.Bar")), vec!["WPF1016", "WPF1017"]);
        }

        #[test]
        fn unrelated_condition_is_ignored() {
            assert!(ids(&view_model("Foo", "bar", "value == null")).is_empty());
        }
    }

    mod types {
        use super::*;

        #[test]
        fn value_types_and_string_are_exempt() {
            assert!(ids(&view_model("int", "bar", "value == this.bar")).is_empty());
            assert!(ids(&view_model("string", "bar", "value == this.bar")).is_empty());
            assert!(ids(&view_model("int?", "bar", "value == this.bar")).is_empty());
        }

        #[test]
        fn arrays_are_reference_types() {
            assert_eq!(ids(&view_model("int[]", "bar", "value == this.bar")).len(), 2);
        }
    }

    mod remedy {
        use super::*;

        #[test]
        fn underscore_field_is_accessed_bare() {
            let found = findings(&view_model("Foo", "_bar", "value != _bar"));
            let Remedy::EqualityGuard {
                field_access,
                negated,
                ..
            } = &found[0].remedy
            else {
                panic!("expected an equality remedy");
            };
            assert_eq!(field_access, "_bar");
            assert!(*negated);
        }

        #[test]
        fn plain_field_is_accessed_through_this() {
            let src = view_model("Foo", "bar", "!(value == bar)");
            let found = findings(&src);
            let Remedy::EqualityGuard {
                field_access,
                negated,
                condition,
                ..
            } = &found[0].remedy
            else {
                panic!("expected an equality remedy");
            };
            assert_eq!(field_access, "this.bar");
            assert!(*negated);
            assert_eq!(&src[condition.range()], "!(value == bar)");
        }
    }

    #[test]
    fn bare_return_shapes() {
        let ret = Stmt {
            span: Default::default(),
            kind: StmtKind::Return { value: None },
        };
        let block = Stmt {
            span: Default::default(),
            kind: StmtKind::Block { stmts: vec![ret.clone()] },
        };
        assert!(is_bare_return(&ret));
        assert!(is_bare_return(&block));
        assert!(!is_bare_return(&Stmt {
            span: Default::default(),
            kind: StmtKind::Other,
        }));
    }
}
