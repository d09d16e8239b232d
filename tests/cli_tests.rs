//! `lessc` end to end.

use std::{fs, path::PathBuf};

use assert_cmd::Command;
use predicates::{prelude::PredicateBooleanExt, str::contains};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn scratch(name: &str) -> PathBuf {
    let dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join("lessc");
    fs::create_dir_all(&dir).unwrap();
    dir.join(name)
}

fn lessc() -> Command {
    Command::cargo_bin("lessc").unwrap()
}

#[test]
fn compiles_to_stdout() {
    let expected = fs::read_to_string(fixture("mixins.css")).unwrap();
    lessc()
        .arg(fixture("mixins.less"))
        .assert()
        .success()
        .stdout(expected);
}

#[test]
fn compress_flag() {
    lessc()
        .arg(fixture("mixins.less"))
        .arg("--compress")
        .assert()
        .success()
        .stdout(".box{border:4px solid black}.panel{border:2px dashed black}");
}

#[test]
fn writes_output_and_source_map() {
    let out = scratch("site.css");
    lessc()
        .arg(fixture("basics.less"))
        .arg(&out)
        .arg("--source-map")
        .assert()
        .success();
    let css = fs::read_to_string(&out).unwrap();
    assert!(css.starts_with("/* Header */\n.header {"));
    assert!(css.ends_with("/*# sourceMappingURL=site.css.map */"));
    let map = fs::read_to_string(scratch("site.css.map")).unwrap();
    assert!(map.contains("basics.less"));
}

#[test]
fn global_and_modify_vars() {
    let input = scratch("vars.less");
    fs::write(&input, "@w: 1px;\n.a { width: @w; color: @c; }").unwrap();
    lessc()
        .arg(&input)
        .args(["--global-var", "c=red", "--modify-var", "w=5px"])
        .assert()
        .success()
        .stdout(".a {\n  width: 5px;\n  color: red;\n}\n");
}

#[test]
fn warnings_go_to_stderr() {
    let input = scratch("warn.less");
    fs::write(&input, ".a:extend(.nothing) { b: c; }").unwrap();
    lessc()
        .arg(&input)
        .assert()
        .success()
        .stdout(".a {\n  b: c;\n}\n")
        .stderr(contains("extend '.nothing' has no matches"));
}

#[test]
fn lint_writes_nothing() {
    lessc()
        .arg(fixture("basics.less"))
        .arg("--lint")
        .assert()
        .success()
        .stdout("");
}

#[test]
fn errors_are_rendered_and_exit_nonzero() {
    let input = scratch("bad.less");
    fs::write(&input, ".a { color: @missing; }").unwrap();
    lessc()
        .arg(&input)
        .assert()
        .failure()
        .code(1)
        .stderr(contains("variable @missing is undefined").and(contains("less::name")));
}

#[test]
fn runaway_mixin_recursion_is_an_error() {
    let input = scratch("rec.less");
    fs::write(&input, ".m() {.m();} .c{.m();}").unwrap();
    lessc()
        .arg(&input)
        .assert()
        .failure()
        .code(1)
        .stderr(contains("Maximum mixin call depth exceeded"));
}

#[test]
fn missing_input_fails() {
    lessc()
        .arg(scratch("does-not-exist.less"))
        .assert()
        .failure()
        .stderr(contains("wasn't found"));
}
