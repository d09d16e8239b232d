//! # Evaluation
//!
//! Turns a parsed stylesheet into a tree of plain values: variables are
//! resolved, operations computed, mixin calls and detached rulesets
//! expanded, guards decided and media blocks bubbled to the top.
//!
//! ## Module Structure
//!
//! - **`context`**: the frame stack and the flags values evaluate under
//! - **`value`**: strings, urls, calls, operations and guards
//! - **`lookup`**: variables, properties and namespace lookups
//! - **`ruleset`**: rulesets, selectors, declarations, imports, at-rules
//! - **`mixin`**: mixin matching, guard grouping and parameter binding
//! - **`media`**: media/container bubbling
//!
//! ## Scope
//!
//! Frames are shared `Rc<RefCell<Ruleset>>` handles, innermost first. A
//! frame is only borrowed for the duration of a lookup or a write; nothing
//! holds a borrow across a nested evaluation.

use tracing::debug;

use crate::diagnostics::LessResult;
use crate::tree::{Extend, Node, Ruleset};

pub mod context;
mod lookup;
mod media;
mod mixin;
mod ruleset;
mod value;

pub use context::{
    path_diff, DefaultState, EvalContext, MediaScope, ScriptEvaluator, ScriptValue,
};
pub use lookup::{call_detached, is_variable_defined};
pub use ruleset::{eval_declaration, eval_ruleset, eval_selector};
pub use value::{compare_nodes, guard_passes};

/// Evaluates a whole stylesheet. The frames created along the way are
/// released afterwards.
pub fn evaluate(root: Ruleset, ctx: &mut EvalContext) -> LessResult<Ruleset> {
    debug!(rules = root.rules.len(), "evaluating stylesheet");
    let result = eval_ruleset(&root, ctx);
    ctx.release_frames();
    result
}

/// Evaluates one node in the current scope.
pub fn eval_node(node: &Node, ctx: &mut EvalContext) -> LessResult<Node> {
    match node {
        Node::Anonymous(_)
        | Node::Keyword(_)
        | Node::Color(_)
        | Node::Dimension(_)
        | Node::UnicodeDescriptor(_)
        | Node::Comment(_)
        | Node::Import(_) => Ok(node.clone()),
        Node::Quoted(q) => value::eval_quoted(q, ctx),
        Node::Url(url) => value::eval_url(url, ctx),
        Node::Call(call) => value::eval_call(call, ctx),
        Node::Variable(var) => lookup::eval_variable(var, ctx),
        Node::Property(prop) => lookup::eval_property(prop, ctx),
        Node::Operation(op) => value::eval_operation(op, ctx),
        Node::Negative(inner) => value::eval_negative(inner, ctx),
        Node::Expression(expr) => value::eval_expression(expr, ctx),
        Node::Value(v) => value::eval_value(v, ctx),
        Node::Paren(inner) => Ok(Node::Paren(Box::new(eval_node(inner, ctx)?))),
        Node::Assignment(a) => value::eval_assignment(a, ctx),
        Node::Attribute(attr) => Ok(Node::Attribute(value::eval_attribute(attr, ctx)?)),
        Node::Condition(cond) => Ok(Node::boolean(value::eval_condition(cond, ctx)?)),
        Node::JavaScript(js) => value::eval_javascript(js, ctx),
        Node::NamespaceValue(ns) => lookup::eval_namespace_value(ns, ctx),
        Node::DetachedRuleset(dr) => Ok(lookup::eval_detached(dr, ctx)),
        Node::VariableCall(call) => Ok(Node::Ruleset(Box::new(lookup::eval_variable_call(
            call, ctx,
        )?))),
        Node::Declaration(decl) => Ok(Node::Declaration(eval_declaration(decl, ctx)?)),
        Node::Ruleset(rs) => Ok(Node::Ruleset(Box::new(eval_ruleset(rs, ctx)?))),
        Node::MixinDefinition(def) => Ok(mixin::eval_definition(def, ctx)),
        Node::MixinCall(call) => {
            let rules = mixin::eval_mixin_call(call, ctx)?;
            Ok(Node::Ruleset(Box::new(Ruleset::new(None, rules))))
        }
        Node::Extend(extend) => Ok(Node::Extend(Extend {
            selector: eval_selector(&extend.selector, ctx)?,
            ..extend.renew()
        })),
        Node::AtRule(at) => ruleset::eval_at_rule(at, ctx),
        Node::Media(media) => media::eval_media(media, ctx),
    }
}

