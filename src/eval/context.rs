//! Evaluation state: the frame stack plus the ambient flags that change how
//! values evaluate (math mode, calc, important scope, media bubbling).

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::rc::Rc;

use crate::diagnostics::LessResult;
use crate::functions::FunctionRegistry;
use crate::options::{LessOptions, MathMode, RewriteUrls};
use crate::tree::{FrameRef, Media, Node, Ruleset, SourcePos};
use crate::visitors::import::ImportManager;
use crate::{err_at, err_msg};

/// Evaluates backtick expressions. Without one, inline scripts are a syntax error.
pub trait ScriptEvaluator {
    fn evaluate(&self, expression: &str) -> Result<ScriptValue, String>;
}

/// What a script returned.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptValue {
    Number(f64),
    Text(String),
    List(Vec<String>),
}

/// Result of `default()` while guards are being checked.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum DefaultState {
    /// Outside guard evaluation: `default()` stays a plain CSS call.
    #[default]
    Unset,
    Value(bool),
    Error(String),
}

/// One enclosing `@media`/`@container` while its body is evaluated.
#[derive(Debug, Clone)]
pub struct MediaScope {
    pub name: String,
    pub features: Node,
}

pub struct EvalContext {
    /// Innermost first.
    pub frames: Vec<FrameRef>,
    pub math: MathMode,
    pub strict_units: bool,
    pub strict_imports: bool,
    pub import_multiple: bool,
    pub javascript_enabled: bool,
    pub rewrite_urls: RewriteUrls,
    pub url_args: Option<String>,
    /// One entry per declaration being evaluated; set when an `!important`
    /// variable is read.
    pub important_scope: Vec<bool>,
    pub parens_stack: Vec<bool>,
    pub calc_stack: Vec<bool>,
    pub in_calc: bool,
    pub math_on: bool,
    pub default_func: DefaultState,
    /// Root function scope; each evaluated ruleset inherits from the nearest frame's.
    pub registry: Rc<FunctionRegistry>,
    pub media_blocks: Option<Vec<Media>>,
    pub media_path: Option<Vec<MediaScope>>,
    pub warnings: Vec<String>,
    pub imports: Option<Rc<RefCell<ImportManager>>>,
    pub script: Option<Rc<dyn ScriptEvaluator>>,
    /// `once` imports already spliced in, by resolved filename.
    pub imported_once: HashSet<String>,
    evaluating: HashSet<(String, (usize, usize))>,
    depth: usize,
    max_depth: usize,
    /// Every frame created during this compile, emptied afterwards.
    arena: Vec<FrameRef>,
}

impl fmt::Debug for EvalContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvalContext")
            .field("frames", &self.frames.len())
            .field("math", &self.math)
            .field("math_on", &self.math_on)
            .field("in_calc", &self.in_calc)
            .field("depth", &self.depth)
            .finish()
    }
}

impl EvalContext {
    pub fn new(options: &LessOptions, registry: Rc<FunctionRegistry>) -> Self {
        Self {
            frames: Vec::new(),
            math: options.math,
            strict_units: options.strict_units,
            strict_imports: options.strict_imports,
            import_multiple: options.import_multiple,
            javascript_enabled: options.javascript_enabled,
            rewrite_urls: options.rewrite_urls,
            url_args: options.url_args.clone(),
            important_scope: Vec::new(),
            parens_stack: Vec::new(),
            calc_stack: Vec::new(),
            in_calc: false,
            math_on: true,
            default_func: DefaultState::Unset,
            registry,
            media_blocks: None,
            media_path: None,
            warnings: Vec::new(),
            imports: None,
            script: None,
            imported_once: HashSet::new(),
            evaluating: HashSet::new(),
            depth: 0,
            max_depth: options.max_depth,
            arena: Vec::new(),
        }
    }

    pub fn with_imports(mut self, imports: Rc<RefCell<ImportManager>>) -> Self {
        self.imports = Some(imports);
        self
    }

    pub fn with_script(mut self, script: Option<Rc<dyn ScriptEvaluator>>) -> Self {
        self.script = script;
        self
    }

    // ------------------------------------------------------------------
    // Frames
    // ------------------------------------------------------------------

    /// Wraps `ruleset` as a frame owned by this compile.
    pub fn new_frame(&mut self, ruleset: Ruleset) -> FrameRef {
        let frame = ruleset.into_frame();
        self.arena.push(Rc::clone(&frame));
        frame
    }

    pub fn push_frame(&mut self, frame: FrameRef) {
        self.frames.insert(0, frame);
    }

    pub fn pop_frame(&mut self) {
        if !self.frames.is_empty() {
            self.frames.remove(0);
        }
    }

    /// Runs `f` with `frames` as the whole stack, restoring the previous
    /// stack afterwards even on error.
    pub fn with_frames<T>(
        &mut self,
        frames: Vec<FrameRef>,
        f: impl FnOnce(&mut Self) -> LessResult<T>,
    ) -> LessResult<T> {
        let saved = std::mem::replace(&mut self.frames, frames);
        let result = f(self);
        self.frames = saved;
        result
    }

    /// Function scope of the innermost frame.
    pub fn functions(&self) -> Rc<FunctionRegistry> {
        self.frames
            .iter()
            .find_map(|f| f.borrow().functions.clone())
            .unwrap_or_else(|| Rc::clone(&self.registry))
    }

    /// Empties every frame so captured scopes cannot keep each other alive.
    pub fn release_frames(&mut self) {
        for frame in self.arena.drain(..) {
            if let Ok(mut rs) = frame.try_borrow_mut() {
                rs.rules.clear();
                rs.reset_cache();
            }
        }
    }

    // ------------------------------------------------------------------
    // Math
    // ------------------------------------------------------------------

    pub fn is_math_on(&self, op: Option<&str>) -> bool {
        if !self.math_on {
            return false;
        }
        if op == Some("/") && self.math != MathMode::Always && self.parens_stack.is_empty() {
            return false;
        }
        if self.math > MathMode::ParensDivision {
            return !self.parens_stack.is_empty();
        }
        true
    }

    pub fn in_parens(&mut self) {
        self.parens_stack.push(true);
    }

    pub fn out_of_parens(&mut self) {
        self.parens_stack.pop();
    }

    pub fn enter_calc(&mut self) {
        self.calc_stack.push(true);
        self.in_calc = true;
    }

    pub fn exit_calc(&mut self) {
        self.calc_stack.pop();
        if self.calc_stack.is_empty() {
            self.in_calc = false;
        }
    }

    // ------------------------------------------------------------------
    // Guards
    // ------------------------------------------------------------------

    /// Value of `default()`: `None` leaves the call as CSS.
    pub fn default_value(&self) -> LessResult<Option<bool>> {
        match &self.default_func {
            DefaultState::Unset => Ok(None),
            DefaultState::Value(v) => Ok(Some(*v)),
            DefaultState::Error(message) => Err(err_msg!(Syntax, message.clone())),
        }
    }

    // ------------------------------------------------------------------
    // Recursion guards
    // ------------------------------------------------------------------

    pub fn enter_depth(&mut self, pos: &SourcePos) -> LessResult<()> {
        self.depth += 1;
        if self.depth > self.max_depth {
            self.depth -= 1;
            return Err(err_at!(Runtime, pos, "Maximum mixin call depth exceeded"));
        }
        Ok(())
    }

    pub fn exit_depth(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Marks a reference as being evaluated; `false` if it already was.
    pub fn begin_evaluating(&mut self, name: &str, pos: &SourcePos) -> bool {
        self.evaluating.insert((name.to_string(), pos.key()))
    }

    pub fn end_evaluating(&mut self, name: &str, pos: &SourcePos) {
        self.evaluating.remove(&(name.to_string(), pos.key()));
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{}", message);
        self.warnings.push(message);
    }

    // ------------------------------------------------------------------
    // Urls
    // ------------------------------------------------------------------

    pub fn path_requires_rewrite(&self, path: &str) -> bool {
        match self.rewrite_urls {
            RewriteUrls::Local => is_path_local_relative(path),
            RewriteUrls::Off | RewriteUrls::All => is_path_relative(path),
        }
    }

    pub fn rewrite_path(&self, path: &str, rootpath: &str) -> String {
        let mut new_path = normalize_path(&format!("{rootpath}{path}"));
        if is_path_local_relative(path)
            && is_path_relative(rootpath)
            && !is_path_local_relative(&new_path)
        {
            new_path = format!("./{new_path}");
        }
        new_path
    }
}

pub fn is_path_relative(path: &str) -> bool {
    if path.starts_with('/') || path.starts_with('#') {
        return false;
    }
    match path.find(':') {
        Some(i) => !path[..i]
            .chars()
            .all(|c| c.is_ascii_alphabetic() || c == '-') || i == 0,
        None => true,
    }
}

pub fn is_path_local_relative(path: &str) -> bool {
    path.starts_with('.')
}

/// Relative path from `base` to `dir` with a trailing `/`, or `""` when equal.
pub fn path_diff(dir: &Path, base: &Path) -> String {
    let dir: Vec<_> = dir.components().collect();
    let base: Vec<_> = base.components().collect();
    let common = dir.iter().zip(&base).take_while(|(a, b)| a == b).count();
    let mut out = String::new();
    for _ in common..base.len() {
        out.push_str("../");
    }
    for part in &dir[common..] {
        out.push_str(&part.as_os_str().to_string_lossy());
        out.push('/');
    }
    out
}

/// Resolves `.` and `..` segments; leading `..` that cannot be resolved are kept.
pub fn normalize_path(path: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "." => {}
            ".." => {
                if out.is_empty() || out.last() == Some(&"..") {
                    out.push(segment);
                } else {
                    out.pop();
                }
            }
            other => out.push(other),
        }
    }
    out.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(options: &LessOptions) -> EvalContext {
        EvalContext::new(options, Rc::new(FunctionRegistry::with_builtins()))
    }

    #[test]
    fn test_division_needs_parens_by_default() {
        let mut c = ctx(&LessOptions::default());
        assert!(c.is_math_on(Some("+")));
        assert!(!c.is_math_on(Some("/")));
        c.in_parens();
        assert!(c.is_math_on(Some("/")));
        c.out_of_parens();
        c.math_on = false;
        assert!(!c.is_math_on(Some("+")));
    }

    #[test]
    fn test_parens_mode_requires_parens_everywhere() {
        let options = LessOptions {
            math: MathMode::Parens,
            ..LessOptions::default()
        };
        let mut c = ctx(&options);
        assert!(!c.is_math_on(Some("*")));
        c.in_parens();
        assert!(c.is_math_on(Some("*")));
    }

    #[test]
    fn test_depth_limit() {
        let options = LessOptions {
            max_depth: 2,
            ..LessOptions::default()
        };
        let mut c = ctx(&options);
        let pos = SourcePos::default();
        assert!(c.enter_depth(&pos).is_ok());
        assert!(c.enter_depth(&pos).is_ok());
        let err = c.enter_depth(&pos).unwrap_err();
        assert_eq!(err.message(), "Maximum mixin call depth exceeded");
    }

    #[test]
    fn test_path_helpers() {
        assert_eq!(normalize_path("a/./b/../c"), "a/c");
        assert_eq!(normalize_path("../../a"), "../../a");
        assert!(is_path_relative("img/a.png"));
        assert!(!is_path_relative("http://x/a.png"));
        assert!(!is_path_relative("/abs.png"));
        assert!(!is_path_relative("data:image/png"));
        let mut c = ctx(&LessOptions::default());
        c.rewrite_urls = RewriteUrls::Local;
        assert!(c.path_requires_rewrite("./a.png"));
        assert!(!c.path_requires_rewrite("a.png"));
        assert_eq!(c.rewrite_path("./a.png", "sub/"), "./sub/a.png");
        assert_eq!(c.rewrite_path("../a.png", "sub/"), "./a.png");
        assert_eq!(path_diff(Path::new("a/b/c"), Path::new("a")), "b/c/");
        assert_eq!(path_diff(Path::new("a"), Path::new("a/b")), "../");
        assert_eq!(path_diff(Path::new("a"), Path::new("a")), "");
    }
}
