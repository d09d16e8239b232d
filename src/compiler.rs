use std::{cell::RefCell, path::Path, rc::Rc};

use tracing::debug;

use crate::{
    eval::{evaluate, EvalContext, ScriptEvaluator},
    functions::{FnResult, FunctionRegistry},
    options::LessOptions,
    output::{gen_css, GenContext, OutputSink, SourceMapSink, StringSink},
    parser::{normalize_source, parse_stylesheet},
    tree::{FileInfo, Node, Ruleset},
    visitors::{
        join_selectors, mark_visible, process_extends, to_css_tree, FileManager, FsFileManager,
        ImportManager,
    },
    LessResult,
};

// ============================================================================
// COMPILE RESULTS
// ============================================================================

/// A parsed stylesheet whose literal imports are already loaded.
///
/// The import manager is kept so that imports whose path depends on a
/// variable can still be loaded while the sheet is evaluated.
#[derive(Debug, Clone)]
pub struct Stylesheet {
    pub root: Ruleset,
    imports: Rc<RefCell<ImportManager>>,
}

impl Stylesheet {
    /// Files loaded so far, in load order.
    pub fn imports(&self) -> Vec<String> {
        self.imports.borrow().files().to_vec()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompileOutput {
    pub css: String,
    /// Source map JSON, when one was requested.
    pub map: Option<String>,
    /// Every file pulled in through `@import`.
    pub imports: Vec<String>,
    pub warnings: Vec<String>,
}

// ============================================================================
// COMPILER - parse, evaluate, lower, generate
// ============================================================================

/// Runs the whole pipeline with one set of options and collaborators.
pub struct Compiler {
    options: LessOptions,
    file_manager: Rc<dyn FileManager>,
    script: Option<Rc<dyn ScriptEvaluator>>,
    functions: FunctionRegistry,
}

impl Compiler {
    pub fn new(options: LessOptions) -> Self {
        Self {
            options,
            file_manager: Rc::new(FsFileManager),
            script: None,
            functions: FunctionRegistry::with_builtins(),
        }
    }

    pub fn options(&self) -> &LessOptions {
        &self.options
    }

    pub fn with_file_manager(mut self, file_manager: impl FileManager + 'static) -> Self {
        self.file_manager = Rc::new(file_manager);
        self
    }

    /// Evaluator for backtick expressions; only consulted when
    /// `javascript_enabled` is set.
    pub fn with_script_evaluator(mut self, evaluator: impl ScriptEvaluator + 'static) -> Self {
        self.script = Some(Rc::new(evaluator));
        self
    }

    /// Adds a function callable from stylesheets. Shadows a builtin of the
    /// same name.
    pub fn with_function<F>(mut self, name: &str, function: F) -> Self
    where
        F: Fn(&[Node]) -> FnResult + 'static,
    {
        self.functions.register_custom(name, function);
        self
    }

    pub fn parse(&self, source: &str) -> LessResult<Stylesheet> {
        self.parse_named(&self.options.filename, source)
    }

    /// Loads `path` through the file manager and parses it.
    pub fn parse_file(&self, path: &Path) -> LessResult<Stylesheet> {
        let loaded = self
            .file_manager
            .load(&path.to_string_lossy(), Path::new(""), &self.options)?;
        self.parse_named(&loaded.filename, &loaded.contents)
    }

    fn parse_named(&self, filename: &str, source: &str) -> LessResult<Stylesheet> {
        let text = format!(
            "{}{}{}",
            LessOptions::vars_source(&self.options.global_vars),
            normalize_source(source),
            LessOptions::vars_source(&self.options.modify_vars),
        );
        let file = Rc::new(FileInfo::new(filename, &text));
        debug!(filename, bytes = text.len(), "parsing");
        let mut root = parse_stylesheet(
            &file,
            self.options.chunk_input,
            self.options.dump_line_numbers.is_some(),
        )?;

        let mut manager = ImportManager::new(self.file_manager.clone(), &self.options);
        manager.process(&mut root)?;
        debug!(imports = manager.files().len(), "imports loaded");

        Ok(Stylesheet {
            root,
            imports: Rc::new(RefCell::new(manager)),
        })
    }

    pub fn to_css(&self, sheet: &Stylesheet) -> LessResult<CompileOutput> {
        let options = &self.options;
        let mut ctx = EvalContext::new(options, Rc::new(self.functions.clone()))
            .with_imports(sheet.imports.clone())
            .with_script(self.script.clone());
        if let Some(file) = &sheet.root.pos.file {
            ctx.imported_once.insert(file.filename.clone());
        }

        let mut root = evaluate(sheet.root.clone(), &mut ctx)?;
        let mut warnings = std::mem::take(&mut ctx.warnings);

        debug!("lowering");
        join_selectors(&mut root);
        mark_visible(&mut root);
        warnings.extend(process_extends(&mut root)?);
        to_css_tree(&mut root, options.compress)?;

        debug!(source_map = options.source_map, "generating");
        let root = Node::Ruleset(Box::new(root));
        let mut gen = GenContext::new(options);
        let (mut css, map) = if options.source_map {
            let mut sink = SourceMapSink::new();
            generate(&root, &mut gen, &mut sink)?;
            let map = sink.to_json(&options.source_map_options, None);
            (sink.into_css(), Some(map))
        } else {
            let mut sink = StringSink::new();
            generate(&root, &mut gen, &mut sink)?;
            (sink.into_string(), None)
        };
        if map.is_some() {
            if let Some(url) = &options.source_map_options.source_map_url {
                css.push_str(&format!("/*# sourceMappingURL={url} */"));
            }
        }

        Ok(CompileOutput {
            css,
            map,
            imports: sheet.imports(),
            warnings,
        })
    }

    pub fn render(&self, source: &str) -> LessResult<CompileOutput> {
        let sheet = self.parse(source)?;
        self.to_css(&sheet)
    }

    pub fn render_file(&self, path: &Path) -> LessResult<CompileOutput> {
        let sheet = self.parse_file(path)?;
        self.to_css(&sheet)
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new(LessOptions::default())
    }
}

fn generate(root: &Node, gen: &mut GenContext, sink: &mut dyn OutputSink) -> LessResult<()> {
    gen_css(root, gen, sink)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Dimension;
    use crate::visitors::MemoryFileManager;

    #[test]
    fn test_global_and_modify_vars() {
        let mut options = LessOptions::default();
        options.global_vars.insert("base".into(), "10px".into());
        options.modify_vars.insert("@color".into(), "blue".into());
        let out = Compiler::new(options)
            .render("@color: red;\n.a { width: @base; color: @color; }")
            .unwrap();
        assert_eq!(out.css, ".a {\n  width: 10px;\n  color: blue;\n}\n");
    }

    #[test]
    fn test_imports_are_listed() {
        let files = MemoryFileManager::new().with_file("lib.less", ".lib { a: b; }");
        let out = Compiler::default()
            .with_file_manager(files)
            .render("@import \"lib\";\n.main { c: d; }")
            .unwrap();
        assert_eq!(out.imports, vec!["lib.less".to_string()]);
        assert_eq!(out.css, ".lib {\n  a: b;\n}\n.main {\n  c: d;\n}\n");
    }

    #[test]
    fn test_user_function() {
        let out = Compiler::default()
            .with_function("twice", |args: &[Node]| match args.first() {
                Some(Node::Dimension(d)) => {
                    Ok(Some(Node::Dimension(Dimension::new(d.value * 2.0, d.unit.clone()))))
                }
                _ => Ok(None),
            })
            .render(".a { width: twice(4px); }")
            .unwrap();
        assert_eq!(out.css, ".a {\n  width: 8px;\n}\n");
    }

    #[test]
    fn test_source_map_comment() {
        let mut options = LessOptions::default();
        options.source_map = true;
        options.source_map_options.source_map_url = Some("out.css.map".into());
        let out = Compiler::new(options).render(".a { b: c; }").unwrap();
        assert!(out.css.ends_with("/*# sourceMappingURL=out.css.map */"));
        let map = out.map.unwrap();
        assert!(map.contains("\"version\":3"));
        assert!(map.contains("input"));
    }
}
