//! End-to-end scenarios: analyze a snapshot, fix what is fixable, analyze
//! the result again.

use std::collections::HashMap;

use dpcheck_core::config::{AnalyzerOptions, ReportDiagnostic};
use dpcheck_core::diagnostics::{Diagnostic, Severity};
use dpcheck_core::patch::FileId;
use dpcheck_core::CancellationToken;
use dpcheck_wpf::fixes::{apply, code_action};
use dpcheck_wpf::fixture::Fixture;
use dpcheck_wpf::{Analyzer, Recognizer};

fn analyze(fx: &Fixture, options: &AnalyzerOptions) -> Vec<Diagnostic> {
    Analyzer::new(options.clone())
        .unwrap()
        .analyze(fx.table(), &CancellationToken::new())
        .unwrap()
}

fn ids(diagnostics: &[Diagnostic]) -> Vec<&str> {
    diagnostics.iter().map(|d| d.rule_id.as_str()).collect()
}

/// Apply the fix for `diagnostic` and return every file's new text by path.
fn fix(fx: &Fixture, diagnostic: &Diagnostic, options: &AnalyzerOptions) -> Vec<(String, String)> {
    let action = code_action(fx.table(), diagnostic, options, &CancellationToken::new())
        .unwrap_or_else(|| panic!("no fix for {diagnostic}"));
    let patch = action.compute_patch(fx.table()).unwrap();
    let updated: HashMap<FileId, String> = apply(&patch, &fx.contents()).unwrap();
    fx.table()
        .files
        .iter()
        .map(|f| (f.path.clone(), updated[&f.file_id].clone()))
        .collect()
}

fn reparse(files: &[(String, String)]) -> Fixture {
    let borrowed: Vec<(&str, &str)> = files.iter().map(|(p, c)| (p.as_str(), c.as_str())).collect();
    Fixture::parse(&borrowed).unwrap()
}

const CONVENTIONAL: &str = r#"
namespace Demo
{
    public class FooControl : Control
    {
        public static readonly DependencyProperty BarProperty = DependencyProperty.Register(
            nameof(Bar),
            typeof(int),
            typeof(FooControl),
            new PropertyMetadata(1, OnBarChanged, CoerceBar),
            BarValidateValue);

        private static readonly DependencyPropertyKey BazPropertyKey = DependencyProperty.RegisterReadOnly(
            nameof(Baz),
            typeof(string),
            typeof(FooControl),
            new PropertyMetadata(null));

        public static readonly DependencyProperty BazProperty = BazPropertyKey.DependencyProperty;

        public int Bar
        {
            get { return (int)this.GetValue(BarProperty); }
            set { this.SetValue(BarProperty, value); }
        }

        public string Baz
        {
            get { return (string)this.GetValue(BazProperty); }
            protected set { this.SetValue(BazPropertyKey, value); }
        }

        private static void OnBarChanged(DependencyObject d, DependencyPropertyChangedEventArgs e)
        {
        }

        private static object CoerceBar(DependencyObject d, object baseValue)
        {
            return baseValue;
        }

        private static bool BarValidateValue(object value)
        {
            return true;
        }
    }
}
"#;

#[test]
fn conventional_code_is_clean() {
    let fx = Fixture::parse(&[("FooControl.cs", CONVENTIONAL)]).unwrap();
    let diagnostics = analyze(&fx, &AnalyzerOptions::default());
    assert!(diagnostics.is_empty(), "{diagnostics:?}");
}

#[test]
fn recovery_agrees_from_field_and_property() {
    let fx = Fixture::parse(&[("FooControl.cs", CONVENTIONAL)]).unwrap();
    let cancel = CancellationToken::new();
    let recognizer = Recognizer::new(fx.table(), &cancel);
    for (field, property) in [("BarProperty", "Bar"), ("BazPropertyKey", "Baz")] {
        let from_field = recognizer
            .try_recover_from_field(fx.field("FooControl", field))
            .unwrap();
        let from_property = recognizer
            .try_recover_from_property(fx.property("FooControl", property))
            .unwrap();
        assert_eq!(from_field.registered_name(), property);
        assert_eq!(from_field.registered_name(), from_property.registered_name());
        assert_eq!(from_field.field.symbol, from_property.field.symbol);
    }
}

#[test]
fn wrapper_type_must_match_registration() {
    let src = r#"
public class FooControl : Control
{
    public static readonly DependencyProperty FooProperty = DependencyProperty.Register(
        "Foo", typeof(int), typeof(FooControl), new PropertyMetadata(default(int)));

    public string Foo
    {
        get => (string)GetValue(FooProperty);
        set => SetValue(FooProperty, value);
    }
}
"#;
    let fx = Fixture::parse(&[("FooControl.cs", src)]).unwrap();
    let diagnostics = analyze(&fx, &AnalyzerOptions::default());
    assert_eq!(ids(&diagnostics), vec!["WPF0012"]);
    let diagnostic = &diagnostics[0];
    assert_eq!(diagnostic.severity, Severity::Error);
    assert_eq!(diagnostic.message, "Property 'Foo' must be of type int");
    assert_eq!(diagnostic.span, fx.span_of("FooControl.cs", "string", 0));
    assert_eq!((diagnostic.location.line, diagnostic.location.col), (7, 12));
    assert!(code_action(fx.table(), diagnostic, &AnalyzerOptions::default(), &CancellationToken::new()).is_none());
}

#[test]
fn field_shared_by_two_wrappers_is_not_reported() {
    let src = r#"
public class FooControl : Control
{
    public static readonly DependencyProperty BarProperty =
        DependencyProperty.Register("Bar", typeof(int), typeof(FooControl));

    public int First { get => (int)GetValue(BarProperty); set => SetValue(BarProperty, value); }
    public int Second { get => (int)GetValue(BarProperty); set => SetValue(BarProperty, value); }
}
"#;
    let fx = Fixture::parse(&[("FooControl.cs", src)]).unwrap();
    assert!(analyze(&fx, &AnalyzerOptions::default()).is_empty());
}

#[test]
fn getter_and_setter_must_use_one_registration() {
    let src = r#"
public class FooControl : Control
{
    public static readonly DependencyProperty QuxProperty = DependencyProperty.Register(
        nameof(Qux), typeof(int), typeof(FooControl));

    public static readonly DependencyProperty OtherQuxProperty = DependencyProperty.Register(
        "OtherQux", typeof(int), typeof(FooControl));

    public int Qux
    {
        get { return (int)GetValue(QuxProperty); }
        set { SetValue(OtherQuxProperty, value); }
    }
}
"#;
    let fx = Fixture::parse(&[("FooControl.cs", src)]).unwrap();
    let diagnostics = analyze(&fx, &AnalyzerOptions::default());
    assert_eq!(ids(&diagnostics), vec!["WPF0032"]);
    assert_eq!(
        diagnostics[0].message,
        "Property 'Qux' must access same dependency property in getter and setter"
    );
}

mod rename_fixes {
    use super::*;

    const MISNAMED: &str = r#"
public class FooControl : Control
{
    public static readonly DependencyProperty Error = DependencyProperty.Register(
        "Bar", typeof(int), typeof(FooControl), new PropertyMetadata(0, null, CoerceBarValue));

    public int Bar
    {
        get => (int)GetValue(Error);
        set => SetValue(Error, value);
    }

    private static object CoerceBarValue(DependencyObject d, object baseValue) => baseValue;
}
"#;

    const USER: &str = r#"
public class MainView
{
    public object Read(FooControl control)
    {
        return control.GetValue(FooControl.Error);
    }
}
"#;

    #[test]
    fn field_and_callback_are_reported() {
        let fx = Fixture::parse(&[("FooControl.cs", MISNAMED)]).unwrap();
        let diagnostics = analyze(&fx, &AnalyzerOptions::default());
        assert_eq!(ids(&diagnostics), vec!["WPF0001", "WPF0006"]);
        assert_eq!(diagnostics[0].message, "Field 'Error' should be named 'BarProperty'");
        assert_eq!(diagnostics[1].message, "Method 'CoerceBarValue' should be named 'CoerceBar'");
    }

    #[test]
    fn renaming_the_callback_silences_the_rule() {
        let options = AnalyzerOptions::default();
        let fx = Fixture::parse(&[("FooControl.cs", MISNAMED)]).unwrap();
        let diagnostics = analyze(&fx, &options);
        let coerce = diagnostics.iter().find(|d| d.rule_id == "WPF0006").unwrap();

        let fixed = reparse(&fix(&fx, coerce, &options));
        let again = analyze(&fixed, &options);
        assert_eq!(ids(&again), vec!["WPF0001"]);
        fixed.method("FooControl", "CoerceBar");
    }

    #[test]
    fn renaming_the_field_updates_every_file() {
        let options = AnalyzerOptions::default();
        let fx = Fixture::parse(&[("FooControl.cs", MISNAMED), ("MainView.cs", USER)]).unwrap();
        let diagnostics = analyze(&fx, &options);
        let field = diagnostics.iter().find(|d| d.rule_id == "WPF0001").unwrap();

        let files = fix(&fx, field, &options);
        assert!(files[1].1.contains("return control.GetValue(FooControl.BarProperty);"));
        let fixed = reparse(&files);
        assert_eq!(ids(&analyze(&fixed, &options)), vec!["WPF0006"]);
    }

    #[test]
    fn fixing_everything_reaches_a_fixed_point() {
        let options = AnalyzerOptions::default();
        let mut fx = Fixture::parse(&[("FooControl.cs", MISNAMED), ("MainView.cs", USER)]).unwrap();
        for _ in 0..4 {
            let diagnostics = analyze(&fx, &options);
            let Some(first) = diagnostics.first() else {
                return;
            };
            fx = reparse(&fix(&fx, first, &options));
        }
        panic!("fixes did not converge");
    }
}

mod options {
    use super::*;

    const SRC: &str = r#"
public class FooControl : Control
{
    public static readonly DependencyProperty Error = DependencyProperty.Register(
        "Bar", typeof(int), typeof(FooControl));
}
"#;

    #[test]
    fn overrides_from_json() {
        let options = AnalyzerOptions::from_json(
            r#"{ "specific_diagnostic_options": { "WPF0001": "error" } }"#,
        )
        .unwrap();
        let fx = Fixture::parse(&[("FooControl.cs", SRC)]).unwrap();
        let diagnostics = analyze(&fx, &options);
        assert_eq!(diagnostics[0].severity, Severity::Error);

        let options = options.with_override("WPF0001", ReportDiagnostic::Suppress);
        assert!(analyze(&fx, &options).is_empty());
    }

    #[test]
    fn excluded_globs_are_skipped() {
        let options = AnalyzerOptions::from_json(r#"{ "exclude": ["legacy/**"] }"#).unwrap();
        let fx = Fixture::parse(&[("legacy/FooControl.cs", SRC)]).unwrap();
        assert!(analyze(&fx, &options).is_empty());
        assert_eq!(analyze(&fx, &AnalyzerOptions::default()).len(), 1);
    }
}

#[test]
fn cancellation_stops_analysis() {
    let fx = Fixture::parse(&[("FooControl.cs", CONVENTIONAL)]).unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let analyzer = Analyzer::new(AnalyzerOptions::default()).unwrap();
    assert!(analyzer.analyze(fx.table(), &cancel).is_err());
}
