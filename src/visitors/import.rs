//! Loading `@import` targets before evaluation.
//!
//! Every file is parsed once per import statement and attached to the
//! statement as its root; evaluation later splices the root in. Literal
//! targets are loaded in declaration order. Targets that interpolate a
//! variable are tried after all literal targets of the same file, against
//! that file's top-level variables; those that still cannot be resolved
//! are left for evaluation, where the full scope is known.

use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;

use miette::NamedSource;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{info, trace};

use crate::diagnostics::LessResult;
use crate::eval::context::normalize_path;
use crate::eval::{eval_node, EvalContext};
use crate::functions::FunctionRegistry;
use crate::options::LessOptions;
use crate::parser::{normalize_source, parse_stylesheet};
use crate::tree::{FileInfo, Import, Node, Ruleset};
use crate::err_msg;

/// Contents of a resolved import target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedFile {
    /// Resolved name; also the key for `once` imports.
    pub filename: String,
    pub contents: String,
}

/// Where import targets come from.
pub trait FileManager {
    /// Loads `path` as written in the import, relative to `current_dir`
    /// (the directory of the importing file) or one of `options.paths`.
    fn load(&self, path: &str, current_dir: &Path, options: &LessOptions) -> LessResult<LoadedFile>;
}

/// Candidate locations, in search order.
fn candidates(path: &str, current_dir: &Path, options: &LessOptions) -> Vec<PathBuf> {
    if Path::new(path).is_absolute() {
        return vec![PathBuf::from(path)];
    }
    std::iter::once(current_dir.join(path))
        .chain(options.paths.iter().map(|dir| dir.join(path)))
        .collect()
}

fn display(path: &Path) -> String {
    normalize_path(&path.to_string_lossy())
}

fn not_found(path: &str, tried: &[String]) -> crate::LessError {
    err_msg!(File, "'{}' wasn't found. Tried - {}", path, tried.join(","))
}

/// Reads targets from disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsFileManager;

impl FileManager for FsFileManager {
    fn load(&self, path: &str, current_dir: &Path, options: &LessOptions) -> LessResult<LoadedFile> {
        let bare = path.split('?').next().unwrap_or(path);
        let mut tried = Vec::new();
        for candidate in candidates(bare, current_dir, options) {
            match fs::read_to_string(&candidate) {
                Ok(contents) => {
                    return Ok(LoadedFile {
                        filename: display(&candidate),
                        contents,
                    })
                }
                Err(_) => tried.push(display(&candidate)),
            }
        }
        Err(not_found(path, &tried))
    }
}

/// Serves targets from a map of normalised filenames; for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryFileManager {
    files: HashMap<String, String>,
}

impl MemoryFileManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, filename: &str, contents: &str) -> Self {
        self.insert(filename, contents);
        self
    }

    pub fn insert(&mut self, filename: &str, contents: &str) {
        self.files.insert(normalize_path(filename), contents.to_string());
    }
}

impl FileManager for MemoryFileManager {
    fn load(&self, path: &str, current_dir: &Path, options: &LessOptions) -> LessResult<LoadedFile> {
        let mut tried = Vec::new();
        for candidate in candidates(path, current_dir, options) {
            let key = display(&candidate);
            if let Some(contents) = self.files.get(&key) {
                return Ok(LoadedFile {
                    filename: key,
                    contents: contents.clone(),
                });
            }
            tried.push(key);
        }
        Err(not_found(path, &tried))
    }
}

static HAS_EXTENSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\.[a-z]*$)|([?;].*)$").expect("static regex"));

/// `foo` is looked up as `foo.less`; anything with an extension or a query
/// is taken as written.
pub fn with_less_extension(path: &str) -> String {
    if HAS_EXTENSION.is_match(path) {
        path.to_string()
    } else {
        format!("{path}.less")
    }
}

// ============================================================================
// SEQUENCING
// ============================================================================

/// Position of a node in a rule tree: child indices from the top level down.
pub type Address = Vec<usize>;

/// Import statements of one file, in the order they are resolved: literal
/// targets first, in declaration order, then interpolated ones.
#[derive(Debug, Default)]
pub struct ImportSequencer {
    literal: VecDeque<Address>,
    variable: VecDeque<Address>,
}

impl ImportSequencer {
    /// Finds every import statement in `rules`, including those nested in
    /// rulesets, media blocks, mixin bodies and detached rulesets.
    pub fn collect(rules: &[Node]) -> Self {
        let mut sequencer = Self::default();
        sequencer.walk(rules, &mut Vec::new());
        sequencer
    }

    fn walk(&mut self, rules: &[Node], address: &mut Address) {
        for (i, node) in rules.iter().enumerate() {
            address.push(i);
            match node {
                Node::Import(import) if import.is_variable_import() => {
                    self.variable.push_back(address.clone())
                }
                Node::Import(_) => self.literal.push_back(address.clone()),
                other => {
                    if let Some(children) = children(other) {
                        self.walk(children, address);
                    }
                }
            }
            address.pop();
        }
    }

    pub fn len(&self) -> usize {
        self.literal.len() + self.variable.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Iterator for ImportSequencer {
    /// The statement's address and whether its target is interpolated.
    type Item = (Address, bool);

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(address) = self.literal.pop_front() {
            return Some((address, false));
        }
        self.variable.pop_front().map(|address| (address, true))
    }
}

fn children(node: &Node) -> Option<&Vec<Node>> {
    match node {
        Node::Ruleset(rs) => Some(&rs.rules),
        Node::Media(media) => Some(&media.rules),
        Node::AtRule(at) => at.rules.as_ref(),
        Node::MixinDefinition(def) => Some(&def.rules),
        Node::Declaration(decl) => match decl.value.as_ref() {
            Node::DetachedRuleset(dr) => Some(&dr.ruleset.rules),
            _ => None,
        },
        _ => None,
    }
}

fn children_mut(node: &mut Node) -> Option<&mut Vec<Node>> {
    match node {
        Node::Ruleset(rs) => Some(&mut rs.rules),
        Node::Media(media) => Some(&mut media.rules),
        Node::AtRule(at) => at.rules.as_mut(),
        Node::MixinDefinition(def) => Some(&mut Rc::make_mut(def).rules),
        Node::Declaration(decl) => match decl.value.as_mut() {
            Node::DetachedRuleset(dr) => Some(&mut dr.ruleset.rules),
            _ => None,
        },
        _ => None,
    }
}

fn import_at<'a>(rules: &'a mut [Node], address: &[usize]) -> Option<&'a mut Import> {
    let (first, rest) = address.split_first()?;
    let node = rules.get_mut(*first)?;
    if rest.is_empty() {
        return match node {
            Node::Import(import) => Some(import),
            _ => None,
        };
    }
    import_at(children_mut(node)?, rest)
}

// ============================================================================
// MANAGER
// ============================================================================

/// Resolves and parses import targets, and remembers every file loaded.
pub struct ImportManager {
    file_manager: Rc<dyn FileManager>,
    options: LessOptions,
    /// Directory of the entry file.
    entry_dir: PathBuf,
    /// Resolved filenames in load order, without duplicates.
    files: Vec<String>,
    /// Files being processed, outermost first.
    stack: Vec<String>,
}

impl std::fmt::Debug for ImportManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImportManager")
            .field("files", &self.files)
            .field("stack", &self.stack)
            .finish()
    }
}

impl ImportManager {
    pub fn new(file_manager: Rc<dyn FileManager>, options: &LessOptions) -> Self {
        Self {
            file_manager,
            options: options.clone(),
            entry_dir: PathBuf::new(),
            files: Vec::new(),
            stack: Vec::new(),
        }
    }

    /// Every file loaded through an import so far.
    pub fn files(&self) -> &[String] {
        &self.files
    }

    /// Loads the imports of an entry stylesheet, recursively.
    pub fn process(&mut self, root: &mut Ruleset) -> LessResult<()> {
        if let Some(file) = &root.pos.file {
            self.entry_dir = file.current_directory.clone();
            self.stack.push(file.filename.clone());
        }
        let result = self.process_rules(&mut root.rules);
        self.stack.clear();
        result
    }

    fn process_rules(&mut self, rules: &mut Vec<Node>) -> LessResult<()> {
        let sequencer = ImportSequencer::collect(rules);
        if sequencer.is_empty() {
            return Ok(());
        }
        trace!(imports = sequencer.len(), "sequencing imports");
        for (address, interpolated) in sequencer {
            if interpolated {
                let scope = Ruleset::root(rules.clone());
                let Some(import) = import_at(rules, &address) else {
                    continue;
                };
                if !interpolate_path(import, scope, &self.options) {
                    continue;
                }
                self.resolve(import)?;
            } else if let Some(import) = import_at(rules, &address) {
                self.resolve(import)?;
            }
        }
        Ok(())
    }

    /// Loads one import's target and, for Less targets, parses it and its
    /// own imports. Plain CSS imports are left alone.
    pub fn resolve(&mut self, import: &mut Import) -> LessResult<()> {
        if import.css && !import.options.inline {
            return Ok(());
        }
        let Some(path) = import.path_text() else {
            return Ok(());
        };
        if import.is_variable_import() {
            return Ok(());
        }
        let path = if import.css { path } else { with_less_extension(&path) };
        let (current_dir, parent_reference) = match &import.pos.file {
            Some(file) => (file.current_directory.clone(), file.reference),
            None => (self.entry_dir.clone(), false),
        };

        let loaded = match self.file_manager.load(&path, &current_dir, &self.options) {
            Ok(loaded) => loaded,
            Err(e) if import.options.optional => {
                info!(path = %path, error = %e.message(), "skipping optional import");
                return Ok(());
            }
            Err(e) => return Err(e.located(&import.pos)),
        };
        trace!(filename = %loaded.filename, "loaded import");
        if !self.files.contains(&loaded.filename) {
            self.files.push(loaded.filename.clone());
        }

        let multiple = import.options.multiple || self.options.import_multiple;
        import.once_key = (!multiple).then(|| loaded.filename.clone());
        import.imported_filename = Some(loaded.filename.clone());
        if import.options.inline {
            import.inline_text = Some(loaded.contents);
            return Ok(());
        }

        let contents = normalize_source(&loaded.contents);
        let current_directory = Path::new(&loaded.filename)
            .parent()
            .map(PathBuf::from)
            .unwrap_or_default();
        let file = Rc::new(FileInfo {
            filename: loaded.filename.clone(),
            current_directory,
            entry_path: self.entry_dir.clone(),
            reference: import.options.reference || parent_reference,
            source: Arc::new(NamedSource::new(&loaded.filename, contents)),
        });
        let mut root = parse_stylesheet(
            &file,
            self.options.chunk_input,
            self.options.dump_line_numbers.is_some(),
        )?;

        if !self.stack.contains(&loaded.filename) {
            self.stack.push(loaded.filename);
            let result = self.process_rules(&mut root.rules);
            self.stack.pop();
            result?;
        }
        import.root = Some(Box::new(root));
        Ok(())
    }
}

/// Evaluates an interpolated target against the top-level variables of its
/// file; `false` leaves it for evaluation.
fn interpolate_path(import: &mut Import, scope: Ruleset, options: &LessOptions) -> bool {
    let mut ctx = EvalContext::new(options, Rc::new(FunctionRegistry::with_builtins()));
    let frame = ctx.new_frame(scope);
    ctx.push_frame(frame);
    let evaluated = eval_node(&import.path, &mut ctx);
    ctx.release_frames();
    match evaluated {
        Ok(path) => {
            import.path = Box::new(path);
            import.refresh_css();
            trace!(path = ?import.path_text(), "interpolated import path");
            true
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_stylesheet;

    fn parse(filename: &str, text: &str) -> Ruleset {
        let file = Rc::new(FileInfo::new(filename, text));
        parse_stylesheet(&file, false, false).unwrap()
    }

    fn manager(files: MemoryFileManager) -> ImportManager {
        ImportManager::new(Rc::new(files), &LessOptions::default())
    }

    fn first_import(root: &Ruleset) -> &Import {
        root.rules
            .iter()
            .find_map(|n| match n {
                Node::Import(i) => Some(i),
                _ => None,
            })
            .unwrap()
    }

    #[test]
    fn test_less_extension() {
        assert_eq!(with_less_extension("a"), "a.less");
        assert_eq!(with_less_extension("dir/a.less"), "dir/a.less");
        assert_eq!(with_less_extension("a.css"), "a.css");
        assert_eq!(with_less_extension("a?v=1"), "a?v=1");
    }

    #[test]
    fn test_sequencer_orders_literal_before_interpolated() {
        let root = parse(
            "main.less",
            "@import \"@{x}.less\";\n.a { @import \"b\"; }\n@import \"c\";\n@x: d;",
        );
        let order: Vec<(Address, bool)> = ImportSequencer::collect(&root.rules).collect();
        assert_eq!(order.len(), 3);
        assert!(!order[0].1 && !order[1].1 && order[2].1);
        assert_eq!(order[2].0, vec![0]);
    }

    #[test]
    fn test_resolves_relative_to_importing_file() {
        let files = MemoryFileManager::new()
            .with_file("lib/a.less", "@import \"b\";\n.a { color: red; }")
            .with_file("lib/b.less", ".b { color: blue; }");
        let mut root = parse("main.less", "@import \"lib/a\";");
        let mut manager = manager(files);
        manager.process(&mut root).unwrap();
        assert_eq!(manager.files(), &["lib/a.less".to_string(), "lib/b.less".to_string()]);
        let import = first_import(&root);
        assert_eq!(import.once_key.as_deref(), Some("lib/a.less"));
        let nested = first_import(import.root.as_ref().unwrap());
        assert!(nested.root.is_some());
    }

    #[test]
    fn test_interpolated_target_uses_top_level_variables() {
        let files = MemoryFileManager::new().with_file("theme/dark.less", "@bg: black;");
        let mut root = parse("main.less", "@dir: theme;\n@import \"@{dir}/dark\";");
        manager(files).process(&mut root).unwrap();
        assert!(first_import(&root).root.is_some());
    }

    #[test]
    fn test_missing_target_and_optional() {
        let mut root = parse("main.less", "@import \"nope\";");
        let err = manager(MemoryFileManager::new()).process(&mut root).unwrap_err();
        assert!(err.message().contains("'nope.less' wasn't found"));

        let mut root = parse("main.less", "@import (optional) \"nope\";");
        manager(MemoryFileManager::new()).process(&mut root).unwrap();
        assert!(first_import(&root).root.is_none());
    }

    #[test]
    fn test_inline_and_css_targets() {
        let files = MemoryFileManager::new().with_file("raw.css", "a{b:c}");
        let mut root = parse("main.less", "@import (inline) \"raw.css\";\n@import \"plain.css\";");
        let mut manager = manager(files);
        manager.process(&mut root).unwrap();
        assert_eq!(first_import(&root).inline_text.as_deref(), Some("a{b:c}"));
        assert_eq!(manager.files().len(), 1);
    }

    #[test]
    fn test_recursive_import_terminates() {
        let files = MemoryFileManager::new()
            .with_file("a.less", "@import \"b\";")
            .with_file("b.less", "@import \"a\";");
        let mut root = parse("main.less", "@import \"a\";");
        let mut manager = manager(files);
        manager.process(&mut root).unwrap();
        assert_eq!(manager.files().len(), 2);
    }

    #[test]
    fn test_multiple_clears_once_key() {
        let files = MemoryFileManager::new().with_file("a.less", ".a { x: y; }");
        let mut root = parse("main.less", "@import (multiple) \"a\";");
        manager(files).process(&mut root).unwrap();
        assert!(first_import(&root).once_key.is_none());
    }
}
