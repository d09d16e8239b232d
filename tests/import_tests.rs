//! `@import` handling against an in-memory file set.

use lessrs::{Compiler, CompileOutput, ErrorKind, LessError, LessOptions, MemoryFileManager};

fn files() -> MemoryFileManager {
    MemoryFileManager::new()
        .with_file("vars.less", "@color: red;")
        .with_file("box.less", ".box { color: @color; }")
        .with_file("a.less", "@import \"b\";\n.a { x: 1; }")
        .with_file("b.less", "@import \"a\";\n.b { y: 2; }")
        .with_file("raw.css", ".raw { z: 3; }")
        .with_file("lib/theme.less", ".theme { t: 1; }")
}

fn render(source: &str) -> Result<CompileOutput, LessError> {
    Compiler::new(LessOptions::default())
        .with_file_manager(files())
        .render(source)
}

fn css(source: &str) -> String {
    render(source)
        .unwrap_or_else(|e| panic!("{}", lessrs::render_error(e)))
        .css
}

#[test]
fn imported_variables_and_rules() {
    assert_eq!(
        css("@import \"vars\";\n@import \"box\";"),
        ".box {\n  color: red;\n}\n"
    );
}

#[test]
fn files_are_imported_once_by_default() {
    assert_eq!(
        css("@import \"vars\";\n@import \"box\";\n@import \"box.less\";"),
        ".box {\n  color: red;\n}\n"
    );
}

#[test]
fn multiple_imports_repeat() {
    assert_eq!(
        css("@import \"vars\";\n@import (multiple) \"box\";\n@import (multiple) \"box\";"),
        ".box {\n  color: red;\n}\n.box {\n  color: red;\n}\n"
    );
}

#[test]
fn mutually_recursive_imports_terminate() {
    let out = render("@import \"a\";").unwrap();
    assert_eq!(out.css, ".b {\n  y: 2;\n}\n.a {\n  x: 1;\n}\n");
    assert_eq!(out.imports, vec!["a.less".to_string(), "b.less".to_string()]);
}

#[test]
fn css_imports_are_left_in_place_and_hoisted() {
    assert_eq!(
        css(".a { b: c; }\n@import \"print.css\";"),
        "@import \"print.css\";\n.a {\n  b: c;\n}\n"
    );
    assert_eq!(css("@import (css) \"box\";"), "@import \"box\";\n");
}

#[test]
fn less_option_compiles_css_files() {
    assert_eq!(css("@import (less) \"raw.css\";"), ".raw {\n  z: 3;\n}\n");
}

#[test]
fn inline_option_copies_text() {
    assert_eq!(css("@import (inline) \"raw.css\";"), ".raw { z: 3; }\n");
}

#[test]
fn optional_missing_import_is_skipped() {
    assert_eq!(
        css("@import (optional) \"nope\";\n.a { b: c; }"),
        ".a {\n  b: c;\n}\n"
    );
}

#[test]
fn missing_import_is_a_file_error() {
    let err = render("@import \"nope\";").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::File);
    assert!(err.message().starts_with("'nope.less' wasn't found"));
}

#[test]
fn reference_import_hides_rules_but_allows_mixins() {
    assert_eq!(
        css("@import (reference) \"box\";\n@color: blue;\n.c { .box(); }"),
        ".c {\n  color: blue;\n}\n"
    );
}

#[test]
fn interpolated_path() {
    assert_eq!(
        css("@dir: \"lib\";\n@import \"@{dir}/theme\";"),
        ".theme {\n  t: 1;\n}\n"
    );
}

#[test]
fn import_with_media_features() {
    assert_eq!(
        css("@import \"lib/theme\" screen;"),
        "@media screen {\n  .theme {\n    t: 1;\n  }\n}\n"
    );
}
