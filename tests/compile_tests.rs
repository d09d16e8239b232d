//! End-to-end compilation through the public API.

mod common;

use common::{compile, compile_err, compile_with, compressed};
use lessrs::{ErrorKind, LessOptions};

// ============================================================================
// PLAIN CSS AND FORMATTING
// ============================================================================

#[test]
fn plain_css_passes_through() {
    assert_eq!(
        compile("a > b { margin: 0 auto; }\n.c, .d { color: #fff; }"),
        "a > b {\n  margin: 0 auto;\n}\n.c,\n.d {\n  color: #fff;\n}\n"
    );
}

#[test]
fn custom_property_raw_values_keep_quotes() {
    assert_eq!(
        compile(":root { --json: { \"a\": [1, 2] }; --s: 'x' \"y\"; }"),
        ":root {\n  --json: { \"a\": [1, 2] };\n  --s: 'x' \"y\";\n}\n"
    );
}

#[test]
fn block_comments_kept_line_comments_dropped() {
    assert_eq!(
        compile("/* keep */\n.a { b: c; } // drop"),
        "/* keep */\n.a {\n  b: c;\n}\n"
    );
}

#[test]
fn compress_removes_whitespace() {
    assert_eq!(compressed(".a { color: red; }\n.b { x: y; }"), ".a{color:red}.b{x:y}");
}

#[test]
fn empty_rulesets_are_dropped() {
    assert_eq!(compile(".a { }\n.b { c: d; }"), ".b {\n  c: d;\n}\n");
}

// ============================================================================
// VARIABLES AND OPERATIONS
// ============================================================================

#[test]
fn unit_arithmetic() {
    assert_eq!(compile(".x { width: 1px + 2; }"), ".x {\n  width: 3px;\n}\n");
    assert_eq!(
        compile(".x { a: 2px + 3px; b: 2px * 3; }"),
        ".x {\n  a: 5px;\n  b: 6px;\n}\n"
    );
}

#[test]
fn division_needs_parens_by_default() {
    assert_eq!(
        compile(".a { b: 4px / 2; c: (4px / 2); }"),
        ".a {\n  b: 4px / 2;\n  c: 2px;\n}\n"
    );
}

#[test]
fn math_always_divides_everywhere() {
    let options = LessOptions {
        math: lessrs::MathMode::Always,
        ..LessOptions::default()
    };
    assert_eq!(
        compile_with(".a { b: 4px / 2; }", &options).css,
        ".a {\n  b: 2px;\n}\n"
    );
}

#[test]
fn color_arithmetic() {
    assert_eq!(compile(".a { c: #111 + #222; }"), ".a {\n  c: #333333;\n}\n");
}

#[test]
fn variables_are_lazy_and_scoped() {
    assert_eq!(
        compile(".a { @v: 1; b: @v; } .c { d: @v; } @v: 2;"),
        ".a {\n  b: 1;\n}\n.c {\n  d: 2;\n}\n"
    );
}

#[test]
fn recursive_variable_is_a_name_error() {
    let err = compile_err("@a: @a;\n.x { v: @a; }");
    assert_eq!(err.kind(), ErrorKind::Name);
    assert_eq!(err.message(), "Recursive variable definition for @a");
}

#[test]
fn undefined_variable_is_a_name_error() {
    let err = compile_err(".x { v: @nope; }");
    assert_eq!(err.kind(), ErrorKind::Name);
    assert_eq!(err.message(), "variable @nope is undefined");
}

#[test]
fn interpolation() {
    assert_eq!(
        compile("@n: \"world\"; @s: banner; @p: color;\n.@{s} { b: \"hello @{n}\"; @{p}: red; background-@{p}: blue; }"),
        ".banner {\n  b: \"hello world\";\n  color: red;\n  background-color: blue;\n}\n"
    );
}

#[test]
fn escaped_values_are_unquoted() {
    assert_eq!(
        compile(".a { b: ~\"calc(100% - 10px)\"; }"),
        ".a {\n  b: calc(100% - 10px);\n}\n"
    );
}

#[test]
fn property_accessor() {
    assert_eq!(
        compile(".a { color: red; background: $color; }"),
        ".a {\n  color: red;\n  background: red;\n}\n"
    );
}

#[test]
fn merged_properties() {
    assert_eq!(
        compile(".a { b+: 1; b+: 2; c+_: x; c+_: y; }"),
        ".a {\n  b: 1, 2;\n  c: x y;\n}\n"
    );
}

// ============================================================================
// FUNCTIONS
// ============================================================================

#[test]
fn builtin_functions() {
    assert_eq!(
        compile(".x { c: darken(#ffffff, 10%); p: percentage(0.5); }"),
        ".x {\n  c: #e6e6e6;\n  p: 50%;\n}\n"
    );
    assert_eq!(
        compile("@list: a, b;\n.x { n: length(@list); e: extract(@list, 2); }"),
        ".x {\n  n: 2;\n  e: b;\n}\n"
    );
}

#[test]
fn overflowing_numbers_print_as_infinity() {
    assert_eq!(
        compile(".x { a: pow(2, 2000); }"),
        ".x {\n  a: Infinity;\n}\n"
    );
}

#[test]
fn unknown_functions_stay_css() {
    assert_eq!(
        compile(".x { t: translate(10px, 20px); }"),
        ".x {\n  t: translate(10px, 20px);\n}\n"
    );
}

// ============================================================================
// NESTING AND SELECTORS
// ============================================================================

#[test]
fn parent_selector_after_child() {
    assert_eq!(compile(".a{ .b & {color:red;} }"), ".b .a {\n  color: red;\n}\n");
}

#[test]
fn nested_rulesets_are_flattened() {
    assert_eq!(
        compile(".a { color: red; .b { color: blue; } &:hover { color: green; } }"),
        ".a {\n  color: red;\n}\n.a .b {\n  color: blue;\n}\n.a:hover {\n  color: green;\n}\n"
    );
}

#[test]
fn media_bubbles_out_of_rulesets() {
    assert_eq!(
        compile(".a { color: red; @media screen { color: blue; } }"),
        ".a {\n  color: red;\n}\n@media screen {\n  .a {\n    color: blue;\n  }\n}\n"
    );
}

#[test]
fn css_guards() {
    assert_eq!(
        compile("@m: dark;\n.a when (@m = dark) { b: c; }\n.d when (@m = light) { e: f; }"),
        ".a {\n  b: c;\n}\n"
    );
}

// ============================================================================
// MIXINS
// ============================================================================

#[test]
fn mixin_guards_with_default() {
    assert_eq!(
        compile(".m(@a) when (@a > 1) { big: @a; }\n.m(@a) when (default()) { small: @a; }\n.x { .m(3); .m(0); }"),
        ".x {\n  big: 3;\n  small: 0;\n}\n"
    );
}

#[test]
fn ambiguous_default_is_an_error() {
    let err = compile_err(
        ".m(@x) when (default()) { a: 1; }\n.m(@x) when not (default()) { b: 2; }\n.c { .m(1); }",
    );
    assert_eq!(err.kind(), ErrorKind::Runtime);
    assert!(err.message().starts_with("Ambiguous use of `default()`"));
}

#[test]
fn recursive_mixin_loop() {
    assert_eq!(
        compile(".loop(@i) when (@i > 0) { .w-@{i} { width: (@i * 10px); } .loop(@i - 1); }\n.loop(2);"),
        ".w-2 {\n  width: 20px;\n}\n.w-1 {\n  width: 10px;\n}\n"
    );
}

#[test]
fn self_calling_ruleset_mixin_terminates() {
    let err = compile_err(".a { color: red; .a; }");
    assert_eq!(err.kind(), ErrorKind::Runtime);
    assert!(err.message().starts_with("No matching definition was found"));
}

#[test]
fn self_calling_mixin_hits_the_depth_limit() {
    let err = compile_err(".m() {.m();} .c{.m();}");
    assert_eq!(err.kind(), ErrorKind::Runtime);
    assert_eq!(err.message(), "Maximum mixin call depth exceeded");
}

#[test]
fn namespaced_mixin() {
    assert_eq!(
        compile("#ns { .m() { c: d; } }\n.a { #ns > .m(); }"),
        ".a {\n  c: d;\n}\n"
    );
}

#[test]
fn detached_ruleset_call() {
    assert_eq!(
        compile("@d: { color: red; };\n.a { @d(); }"),
        ".a {\n  color: red;\n}\n"
    );
}

// ============================================================================
// EXTEND
// ============================================================================

#[test]
fn extend_appends_selector() {
    assert_eq!(
        compile("@c: red; .a:extend(.b){} .b{color:@c;}"),
        ".b,\n.a {\n  color: red;\n}\n"
    );
}

#[test]
fn extend_all_rewrites_compound_selectors() {
    assert_eq!(
        compile(".a.b { x: y; }\n.c:extend(.a all) {}"),
        ".a.b,\n.c.b {\n  x: y;\n}\n"
    );
}

#[test]
fn circular_extend_terminates() {
    let out = compile(".a:extend(.b) { x: 1; }\n.b:extend(.a) { y: 2; }");
    assert!(out.contains("x: 1;"));
    assert!(out.contains("y: 2;"));
}

#[test]
fn unmatched_extend_warns() {
    let out = compile_with(".a:extend(.missing) { b: c; }", &LessOptions::default());
    assert_eq!(out.warnings, vec!["extend '.missing' has no matches".to_string()]);
    assert_eq!(out.css, ".a {\n  b: c;\n}\n");
}

// ============================================================================
// ERRORS
// ============================================================================

#[test]
fn unclosed_block_is_a_parse_error() {
    let err = compile_err(".a { color: red;");
    assert!(matches!(err.kind(), ErrorKind::Parse | ErrorKind::Syntax));
}

#[test]
fn properties_at_root_are_rejected() {
    let err = compile_err("color: red;");
    assert_eq!(err.kind(), ErrorKind::Syntax);
    assert!(err.message().contains("Properties must be inside selector blocks"));
}
