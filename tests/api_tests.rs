//! The library surface: `parse` / `to_css`, the `Compiler` builder and the
//! collaborator hooks.

use lessrs::{
    parse, to_css, Compiler, ErrorKind, LessOptions, ScriptEvaluator, ScriptValue,
};

struct Shouting;

impl ScriptEvaluator for Shouting {
    fn evaluate(&self, expression: &str) -> Result<ScriptValue, String> {
        match expression {
            "1 + 1" => Ok(ScriptValue::Number(2.0)),
            "fail" => Err("boom".to_string()),
            other => Ok(ScriptValue::Text(other.to_uppercase())),
        }
    }
}

#[test]
fn parse_then_to_css() {
    let options = LessOptions::default();
    let sheet = parse("@w: 2px;\n.a { width: @w * 2; }", &options).unwrap();
    assert!(sheet.imports().is_empty());
    let out = to_css(&sheet, &options).unwrap();
    assert_eq!(out.css, ".a {\n  width: 4px;\n}\n");
    assert_eq!(out.map, None);

    // A parsed sheet can be rendered again with other options.
    let compressed = LessOptions {
        compress: true,
        ..LessOptions::default()
    };
    assert_eq!(to_css(&sheet, &compressed).unwrap().css, ".a{width:4px}");
}

#[test]
fn parse_errors_carry_position() {
    let err = parse(".a { color: red;\n", &LessOptions::default()).unwrap_err();
    let text = err.describe();
    assert!(text.contains("line"), "{text}");
}

#[test]
fn scripts_need_opt_in() {
    let source = ".a { b: `1 + 1`; }";
    let err = Compiler::default()
        .with_script_evaluator(Shouting)
        .render(source)
        .unwrap_err();
    assert_eq!(err.message(), "Inline JavaScript is not enabled");

    let options = LessOptions {
        javascript_enabled: true,
        ..LessOptions::default()
    };
    let err = Compiler::new(options).render(source).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Syntax);
}

#[test]
fn scripts_are_evaluated_with_variables_substituted() {
    let options = LessOptions {
        javascript_enabled: true,
        ..LessOptions::default()
    };
    let out = Compiler::new(options)
        .with_script_evaluator(Shouting)
        .render("@n: 3;\n.a { b: `1 + 1`; c: ~`hello @{n}`; }")
        .unwrap();
    assert_eq!(out.css, ".a {\n  b: 2;\n  c: HELLO 3;\n}\n");
}

#[test]
fn script_failures_are_errors() {
    let options = LessOptions {
        javascript_enabled: true,
        ..LessOptions::default()
    };
    let err = Compiler::new(options)
        .with_script_evaluator(Shouting)
        .render(".a { b: `fail`; }")
        .unwrap_err();
    assert_eq!(err.message(), "JavaScript evaluation error: boom");
}

#[test]
fn options_from_json_config() {
    let options = LessOptions::from_json(r#"{"compress": true, "modifyVars": {"c": "blue"}}"#).unwrap();
    let out = Compiler::new(options).render("@c: red;\n.a { color: @c; }").unwrap();
    assert_eq!(out.css, ".a{color:blue}");
}
