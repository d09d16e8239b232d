//! # Function Library
//!
//! Builtin functions callable from values: `lighten(@c, 10%)`, `unit(5, px)`,
//! `if((@a > 0), x, y)`. A call whose name is not registered, or whose
//! function declines by returning `Ok(None)`, is kept as a plain CSS call.
//!
//! ## Module Structure
//!
//! - **`helpers`**: argument extraction and error construction
//! - **`color`**: channel accessors and HSL/HSV manipulation
//! - **`blend`**: photoshop-style blend modes
//! - **`math`**: rounding, trigonometry and `min`/`max`
//! - **`number`**: unit handling
//! - **`string`**: escaping, formatting and `replace`
//! - **`types`**: `is*` type tests
//! - **`list`**: `length`, `extract`, `range`, `each`
//! - **`logic`**: `if`, `boolean`, `default`, `style`
//!
//! ## Calling Conventions
//!
//! The variant chosen at registration decides what a function receives:
//!
//! 1. **`Pure`**: evaluated arguments only.
//! 2. **`Contextual`**: evaluated arguments plus the evaluation context, for
//!    functions that read scope or evaluate rulesets (`default`, `each`).
//! 3. **`SpecialForm`**: unevaluated arguments plus the context; the function
//!    evaluates what it needs (`if`, `isdefined`).
//! 4. **`Custom`**: user functions registered through the compiler builder.

use std::fmt;
use std::rc::Rc;

use im::HashMap;

use crate::diagnostics::LessResult;
use crate::eval::EvalContext;
use crate::tree::{Node, SourcePos};

pub mod blend;
pub mod color;
pub mod helpers;
pub mod list;
pub mod logic;
pub mod math;
pub mod number;
pub mod string;
pub mod types;

// ============================================================================
// FUNCTION TYPES
// ============================================================================

/// Result of a builtin: `None` keeps the call as literal CSS.
pub type FnResult = LessResult<Option<Node>>;

pub type PureFn = fn(args: &[Node]) -> FnResult;

pub type ContextFn = fn(ctx: &mut EvalContext, args: &[Node], pos: &SourcePos) -> FnResult;

pub type CustomFn = Rc<dyn Fn(&[Node]) -> FnResult>;

#[derive(Clone)]
pub enum Function {
    Pure(PureFn),
    Contextual(ContextFn),
    SpecialForm(ContextFn),
    Custom(CustomFn),
}

impl Function {
    /// Whether arguments are evaluated before the call.
    pub fn evaluates_args(&self) -> bool {
        !matches!(self, Function::SpecialForm(_))
    }

    pub fn call(&self, ctx: &mut EvalContext, args: &[Node], pos: &SourcePos) -> FnResult {
        match self {
            Function::Pure(f) => f(args),
            Function::Contextual(f) | Function::SpecialForm(f) => f(ctx, args, pos),
            Function::Custom(f) => f(args),
        }
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Function::Pure(_) => "Pure",
            Function::Contextual(_) => "Contextual",
            Function::SpecialForm(_) => "SpecialForm",
            Function::Custom(_) => "Custom",
        };
        write!(f, "Function::{kind}")
    }
}

// ============================================================================
// REGISTRY
// ============================================================================

/// A scope of named functions. Lookups that miss fall back to the parent
/// scope, so every evaluated ruleset can hold a cheap child scope.
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, Function>,
    parent: Option<Rc<FunctionRegistry>>,
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.functions.len())
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A root scope holding every builtin.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        register_all(&mut registry);
        registry
    }

    pub fn register(&mut self, name: &str, function: Function) {
        self.functions.insert(name.to_ascii_lowercase(), function);
    }

    pub fn register_custom(&mut self, name: &str, function: impl Fn(&[Node]) -> FnResult + 'static) {
        self.register(name, Function::Custom(Rc::new(function)));
    }

    pub fn lookup(&self, name: &str) -> Option<Function> {
        match self.functions.get(name) {
            Some(f) => Some(f.clone()),
            None => self.parent.as_ref().and_then(|p| p.lookup(name)),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// An empty scope inheriting from `parent`.
    pub fn inherit(parent: &Rc<FunctionRegistry>) -> Rc<FunctionRegistry> {
        Rc::new(FunctionRegistry {
            functions: HashMap::new(),
            parent: Some(Rc::clone(parent)),
        })
    }

    /// Names registered in this scope only, sorted.
    pub fn local_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.functions.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Registers every builtin domain.
pub fn register_all(registry: &mut FunctionRegistry) {
    color::register_color_functions(registry);
    blend::register_blend_functions(registry);
    math::register_math_functions(registry);
    number::register_number_functions(registry);
    string::register_string_functions(registry);
    types::register_type_functions(registry);
    list::register_list_functions(registry);
    logic::register_logic_functions(registry);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Dimension;

    #[test]
    fn test_child_scope_falls_back_to_parent() {
        let root = Rc::new(FunctionRegistry::with_builtins());
        let child = FunctionRegistry::inherit(&root);
        assert!(child.contains("lighten"));
        assert!(child.local_names().is_empty());
        assert!(!child.contains("no-such-function"));
    }

    #[test]
    fn test_custom_function_shadows_builtin() {
        let mut registry = FunctionRegistry::with_builtins();
        registry.register_custom("PI", |_| Ok(Some(Node::Dimension(Dimension::unitless(3.0)))));
        assert!(matches!(registry.lookup("pi"), Some(Function::Custom(_))));
        assert!(registry.lookup("if").is_some_and(|f| !f.evaluates_args()));
    }
}
