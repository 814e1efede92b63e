//! Rename fixes for the naming rules.

use dpcheck_core::adapter::SemanticModel;
use dpcheck_core::model::{SymbolId, SymbolKind};
use dpcheck_core::patch::{Edit, PatchSet};

use super::{anchor, CodeAction, FixEdit, FixError};
use crate::rules::Finding;
use crate::validation::validate_csharp_identifier;

/// The rename action for a naming finding.
pub fn action(
    model: &dyn SemanticModel,
    finding: &Finding,
    target: SymbolId,
    new_name: String,
) -> Result<CodeAction, FixError> {
    let symbol = model.symbol(target).ok_or_else(|| FixError::NoLongerApplies {
        rule_id: finding.rule_id().to_string(),
        file: finding.file,
        span: finding.span,
    })?;
    if !symbol.is_source() {
        return Err(FixError::NotInSource {
            rule_id: finding.rule_id().to_string(),
            name: symbol.name.clone(),
        });
    }
    let equivalence_key = match symbol.kind {
        SymbolKind::Field => "rename_field",
        SymbolKind::Property => "rename_property",
        _ => "rename_method",
    };
    Ok(CodeAction {
        title: format!("Rename to: {new_name}"),
        equivalence_key,
        diagnostic_id: finding.rule_id().to_string(),
        edit: FixEdit::Rename { target, new_name },
    })
}

/// Edits renaming `target` at its declaration and every reference.
///
/// Declines when the name is not a valid identifier or when another member
/// of the containing type already has it.
pub fn patch(model: &dyn SemanticModel, target: SymbolId, new_name: &str) -> Result<PatchSet, FixError> {
    validate_csharp_identifier(new_name).map_err(|err| FixError::InvalidIdentifier {
        name: new_name.to_string(),
        reason: err.to_string(),
    })?;

    let symbol = model.symbol(target).ok_or_else(|| FixError::NotInSource {
        rule_id: String::new(),
        name: target.to_string(),
    })?;
    if !symbol.is_source() {
        return Err(FixError::NotInSource {
            rule_id: String::new(),
            name: symbol.name.clone(),
        });
    }
    if let Some(owner) = model.containing_type(target) {
        let taken = model.members_of(owner, false).into_iter().any(|member| {
            member != target && model.symbol(member).is_some_and(|m| m.name == new_name)
        });
        if taken {
            let container = model
                .symbol(owner)
                .map(|o| o.qualified_name.clone().unwrap_or_else(|| o.name.clone()))
                .unwrap_or_default();
            return Err(FixError::Collision {
                name: new_name.to_string(),
                container,
            });
        }
    }

    let mut patch = PatchSet::new();
    for reference in model.references_to(target) {
        let Some(file) = model.file(reference.file) else {
            continue;
        };
        let anchor = anchor(file.file_id, &file.content, reference.span)?;
        let edit = Edit::replace(patch.next_edit_id(), file.file_id, anchor, new_name);
        patch = patch
            .with_file_path(file.file_id, file.path.clone())
            .with_edit(edit);
    }
    let conflicts = patch.detect_conflicts();
    if !conflicts.is_empty() {
        return Err(FixError::Stale { conflicts });
    }
    patch.sort_edits();
    Ok(patch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::Fixture;

    const SRC: &str = r#"
public class FooControl : Control
{
    public static readonly DependencyProperty Error = DependencyProperty.Register(
        "Bar", typeof(int), typeof(FooControl));

    public int Bar
    {
        get => (int)GetValue(Error);
        set => SetValue(Error, value);
    }

    public static readonly DependencyProperty Existing = DependencyProperty.Register(
        "Existing", typeof(int), typeof(FooControl));
}
"#;

    #[test]
    fn renames_declaration_and_references() {
        let fx = Fixture::parse(&[("Foo.cs", SRC)]).unwrap();
        let patch = patch(fx.table(), fx.field("FooControl", "Error"), "BarProperty").unwrap();
        assert_eq!(patch.edit_count(), 3);
        let out = patch.materialize(&fx.contents());
        assert!(out.edits.iter().all(|e| e.old_text == "Error" && e.new_text == "BarProperty"));
        assert_eq!(out.edits[0].line, 4);
    }

    #[test]
    fn rejects_keyword() {
        let fx = Fixture::parse(&[("Foo.cs", SRC)]).unwrap();
        let err = patch(fx.table(), fx.field("FooControl", "Error"), "class").unwrap_err();
        assert!(matches!(err, FixError::InvalidIdentifier { .. }));
    }

    #[test]
    fn rejects_collision_with_sibling() {
        let fx = Fixture::parse(&[("Foo.cs", SRC)]).unwrap();
        let err = patch(fx.table(), fx.field("FooControl", "Error"), "Existing").unwrap_err();
        assert_eq!(
            err,
            FixError::Collision {
                name: "Existing".to_string(),
                container: "FooControl".to_string(),
            }
        );
    }

    #[test]
    fn framework_symbols_are_not_renamed() {
        let fx = Fixture::parse(&[("Foo.cs", SRC)]).unwrap();
        let get_value = fx
            .table()
            .symbols
            .iter()
            .find(|s| s.name == "GetValue")
            .unwrap()
            .symbol_id;
        let err = patch(fx.table(), get_value, "Fetch").unwrap_err();
        assert!(matches!(err, FixError::NotInSource { .. }));
    }
}
