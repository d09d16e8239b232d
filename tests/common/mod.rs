//! Shared helpers for the integration tests.
#![allow(dead_code)]

use lessrs::{render, CompileOutput, LessError, LessOptions};

/// Compiles with default options, panicking with the rendered diagnostic on
/// failure.
pub fn compile(source: &str) -> String {
    compile_with(source, &LessOptions::default()).css
}

pub fn compile_with(source: &str, options: &LessOptions) -> CompileOutput {
    render(source, options).unwrap_or_else(|e| panic!("{}", lessrs::render_error(e)))
}

pub fn compile_err(source: &str) -> LessError {
    match render(source, &LessOptions::default()) {
        Ok(out) => panic!("expected an error, got:\n{}", out.css),
        Err(e) => e,
    }
}

pub fn compressed(source: &str) -> String {
    let options = LessOptions {
        compress: true,
        ..LessOptions::default()
    };
    compile_with(source, &options).css
}
