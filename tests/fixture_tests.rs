//! Compiles every `tests/fixtures/**/*.less` and compares it with the
//! sibling `.css` file. Files starting with `_` are partials pulled in by
//! imports and are not compiled on their own.

use std::path::{Path, PathBuf};

use lessrs::{cli::output::diff_text, render_file, LessOptions};
use walkdir::WalkDir;

fn fixtures_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures")
}

fn discover_fixtures(dir: &Path) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().map_or(false, |ext| ext == "less"))
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map_or(false, |n| !n.starts_with('_'))
        })
        .collect();
    found.sort();
    found
}

#[test]
fn fixtures_match_expected_css() {
    let fixtures = discover_fixtures(&fixtures_dir());
    assert!(!fixtures.is_empty(), "no fixtures found");

    let mut failures = Vec::new();
    for less in &fixtures {
        let expected_path = less.with_extension("css");
        let expected = std::fs::read_to_string(&expected_path)
            .unwrap_or_else(|e| panic!("missing {}: {e}", expected_path.display()));
        match render_file(less, &LessOptions::default()) {
            Ok(out) if out.css == expected => {}
            Ok(out) => failures.push(format!(
                "{}:\n{}",
                less.display(),
                diff_text(&expected, &out.css)
            )),
            Err(e) => failures.push(format!("{}:\n{}", less.display(), lessrs::render_error(e))),
        }
    }
    assert!(failures.is_empty(), "{} fixture(s) failed:\n{}", failures.len(), failures.join("\n"));
}

#[test]
fn imports_fixture_lists_loaded_files() {
    let out = render_file(fixtures_dir().join("imports.less"), &LessOptions::default()).unwrap();
    assert_eq!(out.imports.len(), 2);
    assert!(out.imports[0].ends_with("_colors.less"));
    assert!(out.imports[1].ends_with("_mixins.less"));
}
