//! Rulesets and the rule-level nodes evaluated inside them.
//!
//! A ruleset body is evaluated in four passes over its own frame: imports
//! are spliced in, mixin definitions capture their scope, mixin and
//! detached ruleset calls are expanded in place, and finally every other
//! rule is evaluated. `&`-only children are folded into the parent last.

use crate::diagnostics::LessResult;
use crate::eval::context::{normalize_path, DefaultState, EvalContext};
use crate::eval::value::{eval_attribute, guard_passes, rootpath};
use crate::eval::{eval_node, lookup, mixin};
use crate::functions::helpers::css;
use crate::functions::FunctionRegistry;
use crate::options::MathMode;
use crate::output::{selector_css, GenContext};
use crate::parser::{parse_node, Parsed, Production};
use crate::tree::{
    Anonymous, AtRule, DeclName, Declaration, Element, ElementValue, Extend, FrameRef, Import,
    Media, Node, Ruleset, Selector, Variable,
};
use crate::{err_at, err_msg};

// ============================================================================
// RULESETS
// ============================================================================

pub fn eval_ruleset(rs: &Ruleset, ctx: &mut EvalContext) -> LessResult<Ruleset> {
    let (selectors, passing) = match &rs.selectors {
        Some(selectors) if !selectors.is_empty() => {
            let (selectors, passing) = eval_selectors(selectors, ctx)?;
            (Some(selectors), passing)
        }
        other => (other.clone(), true),
    };

    let rules = if passing { rs.rules.clone() } else { Vec::new() };
    let mut evaluated = Ruleset::new(selectors, rules);
    evaluated.id = rs.id;
    evaluated.root = rs.root;
    evaluated.first_root = rs.first_root;
    evaluated.allow_imports = rs.allow_imports;
    evaluated.multi_media = rs.multi_media;
    evaluated.debug_info = rs.debug_info.clone();
    evaluated.visibility = rs.visibility;
    evaluated.pos = rs.pos.clone();
    evaluated.functions = Some(FunctionRegistry::inherit(&ctx.functions()));

    let frame = ctx.new_frame(evaluated);
    ctx.push_frame(frame.clone());
    let media_block_count = ctx.media_blocks.as_ref().map_or(0, Vec::len);
    let result = eval_body(&frame, ctx);
    ctx.pop_frame();
    result?;

    let evaluated = frame.borrow().clone();
    if let (Some(blocks), Some(selectors)) = (ctx.media_blocks.as_mut(), &evaluated.selectors) {
        for block in blocks.iter_mut().skip(media_block_count) {
            bubble_selectors(block, selectors);
        }
    }
    Ok(evaluated)
}

fn eval_body(frame: &FrameRef, ctx: &mut EvalContext) -> LessResult<()> {
    let imports_allowed = {
        let f = frame.borrow();
        f.root || f.allow_imports || !ctx.strict_imports
    };
    if imports_allowed {
        eval_imports(frame, ctx)?;
    }

    // Definitions first, so calls anywhere in the block see their closures.
    let len = frame.borrow().rules.len();
    for i in 0..len {
        let def = match &frame.borrow().rules[i] {
            Node::MixinDefinition(def) => Some(def.clone()),
            _ => None,
        };
        if let Some(def) = def {
            let value = mixin::eval_definition(&def, ctx);
            let mut f = frame.borrow_mut();
            f.rules[i] = value;
            f.reset_cache();
        }
    }

    expand_calls(frame, ctx)?;

    let mut i = 0;
    while i < frame.borrow().rules.len() {
        let rule = {
            let f = frame.borrow();
            match &f.rules[i] {
                Node::MixinDefinition(_) | Node::DetachedRuleset(_) => None,
                other => Some(other.clone()),
            }
        };
        if let Some(rule) = rule {
            let value = eval_node(&rule, ctx)?;
            let mut f = frame.borrow_mut();
            f.rules[i] = value;
            f.reset_cache();
        }
        i += 1;
    }

    let mut f = frame.borrow_mut();
    let rules = std::mem::take(&mut f.rules);
    f.rules = fold_parent_rulesets(rules);
    f.reset_cache();
    Ok(())
}

/// Replaces mixin calls and `@dr();` calls with the rules they produce.
fn expand_calls(frame: &FrameRef, ctx: &mut EvalContext) -> LessResult<()> {
    enum Call {
        Mixin(crate::tree::MixinCall),
        Detached(crate::tree::VariableCall),
    }
    let mut i = 0;
    loop {
        let call = {
            let f = frame.borrow();
            match f.rules.get(i) {
                None => break,
                Some(Node::MixinCall(call)) => Some(Call::Mixin(call.clone())),
                Some(Node::VariableCall(call)) => Some(Call::Detached(call.clone())),
                Some(_) => None,
            }
        };
        let rules = match call {
            None => {
                i += 1;
                continue;
            }
            Some(Call::Mixin(call)) => {
                let rules = mixin::eval_mixin_call(&call, ctx)?;
                let f = frame.borrow();
                // The caller's own variables win over the mixin's.
                rules
                    .into_iter()
                    .filter(|r| match r {
                        Node::Declaration(d) if d.variable => f.variable(d.name_str()).is_none(),
                        _ => true,
                    })
                    .collect::<Vec<_>>()
            }
            Some(Call::Detached(call)) => {
                let result = lookup::eval_variable_call(&call, ctx)?;
                result
                    .rules
                    .into_iter()
                    .filter(|r| !r.is_variable_declaration())
                    .map(|r| if call.important { make_important(r) } else { r })
                    .collect()
            }
        };
        let count = rules.len();
        let mut f = frame.borrow_mut();
        f.rules.splice(i..=i, rules);
        f.reset_cache();
        i += count;
    }
    Ok(())
}

/// `& { ... }` children merge into the parent; their variables stay local.
fn fold_parent_rulesets(rules: Vec<Node>) -> Vec<Node> {
    let mut folded = Vec::with_capacity(rules.len());
    for rule in rules {
        match rule {
            Node::Ruleset(rs)
                if rs
                    .selectors
                    .as_ref()
                    .is_some_and(|s| s.len() == 1 && s[0].is_just_parent_selector()) =>
            {
                let rs = *rs;
                for mut sub in rs.rules {
                    sub.copy_visibility(&rs.visibility);
                    if !sub.is_variable_declaration() {
                        folded.push(sub);
                    }
                }
            }
            other => folded.push(other),
        }
    }
    folded
}

/// Media blocks produced while this ruleset was evaluated get wrapped in a
/// ruleset carrying its selectors.
fn bubble_selectors(block: &mut Media, selectors: &[Selector]) {
    let Some(first) = block.rules.first().cloned() else {
        return;
    };
    block.rules = vec![Node::Ruleset(Box::new(Ruleset::new(
        Some(selectors.to_vec()),
        vec![first],
    )))];
}

/// Applies `!important` to every declaration in `rule`, recursing into
/// nested rulesets.
pub(super) fn make_important(rule: Node) -> Node {
    match rule {
        Node::Declaration(d) => Node::Declaration(d.make_important()),
        Node::Ruleset(mut rs) => {
            rs.rules = std::mem::take(&mut rs.rules)
                .into_iter()
                .map(make_important)
                .collect();
            Node::Ruleset(rs)
        }
        other => other,
    }
}

// ============================================================================
// SELECTORS
// ============================================================================

/// Evaluates guards and interpolation. Returns whether any selector's
/// guard passed.
fn eval_selectors(
    selectors: &[Selector],
    ctx: &mut EvalContext,
) -> LessResult<(Vec<Selector>, bool)> {
    let saved = std::mem::replace(
        &mut ctx.default_func,
        DefaultState::Error(
            "it is currently only allowed in parametric mixin guards,".to_string(),
        ),
    );
    let result = selectors
        .iter()
        .map(|s| eval_selector(s, ctx))
        .collect::<LessResult<Vec<_>>>();
    ctx.default_func = saved;
    let mut evaluated = result?;
    let passing = evaluated.iter().any(|s| s.evald_condition);

    if evaluated.iter().any(Selector::has_variable_element) {
        evaluated = reparse_selectors(evaluated)?;
    }
    Ok((evaluated, passing))
}

/// Interpolated selectors are printed and parsed again so that the
/// substituted text can contribute combinators and commas.
fn reparse_selectors(selectors: Vec<Selector>) -> LessResult<Vec<Selector>> {
    let mut gen = GenContext::inline(false);
    gen.first_selector = true;
    let mut parts = Vec::with_capacity(selectors.len());
    for sel in &selectors {
        parts.push(selector_css(sel, &mut gen)?);
    }
    let first = &selectors[0];
    let parsed = parse_node(
        &parts.join(","),
        Production::Selectors,
        first.pos.index,
        first.pos.file.clone(),
    )?;
    let Some(Parsed::Selectors(mut reparsed)) = parsed else {
        return Ok(selectors);
    };
    if reparsed.len() == selectors.len() {
        for (new, old) in reparsed.iter_mut().zip(&selectors) {
            new.evald_condition = old.evald_condition;
            new.extend_list = old.extend_list.clone();
        }
    }
    Ok(reparsed)
}

pub fn eval_selector(selector: &Selector, ctx: &mut EvalContext) -> LessResult<Selector> {
    let evald_condition = match &selector.condition {
        Some(condition) => guard_passes(condition, ctx)?,
        None => selector.evald_condition,
    };
    let elements = selector
        .elements
        .iter()
        .map(|e| eval_element(e, ctx))
        .collect::<LessResult<Vec<_>>>()?;
    let extend_list = selector
        .extend_list
        .iter()
        .map(|e| {
            Ok(Extend {
                selector: eval_selector(&e.selector, ctx)?,
                ..e.renew()
            })
        })
        .collect::<LessResult<Vec<_>>>()?;
    let mut evaluated = selector.derive(elements);
    evaluated.extend_list = extend_list;
    evaluated.evald_condition = evald_condition;
    Ok(evaluated)
}

fn eval_element(element: &Element, ctx: &mut EvalContext) -> LessResult<Element> {
    let value = match &element.value {
        ElementValue::Variable(name) => {
            let var = Node::Variable(Variable::new(name.clone(), element.pos.clone()));
            match eval_node(&var, ctx)? {
                Node::Quoted(q) => ElementValue::Text(q.value),
                other => ElementValue::Text(css(&other)),
            }
        }
        ElementValue::Attribute(attr) => ElementValue::Attribute(eval_attribute(attr, ctx)?),
        ElementValue::Paren(selectors) => ElementValue::Paren(
            selectors
                .iter()
                .map(|s| eval_selector(s, ctx))
                .collect::<LessResult<Vec<_>>>()?,
        ),
        ElementValue::Text(_) => element.value.clone(),
    };
    Ok(Element {
        value,
        ..element.clone()
    })
}

// ============================================================================
// DECLARATIONS
// ============================================================================

pub fn eval_declaration(decl: &Declaration, ctx: &mut EvalContext) -> LessResult<Declaration> {
    let (name, variable) = match &decl.name {
        DeclName::Plain(name) => (name.clone(), decl.variable),
        DeclName::Interpolated(parts) => {
            let mut name = String::new();
            for part in parts {
                let value = eval_node(part, ctx).map_err(|e| e.located(&decl.pos))?;
                name.push_str(&css(&value));
            }
            (name, false)
        }
    };

    // `font: 12px/1.5` is a shorthand, never a division.
    let saved_math = ctx.math;
    if name == "font" && ctx.math == MathMode::Always {
        ctx.math = MathMode::ParensDivision;
    }
    ctx.important_scope.push(false);
    let value = eval_node(&decl.value, ctx);
    let important_from_variable = ctx.important_scope.pop().unwrap_or(false);
    ctx.math = saved_math;
    let value = value.map_err(|e| e.located(&decl.pos))?;

    if !variable && matches!(value, Node::DetachedRuleset(_)) {
        return Err(err_at!(
            Syntax,
            &decl.pos,
            "Rulesets cannot be evaluated on a property."
        ));
    }
    let important = if decl.important.is_empty() && important_from_variable {
        " !important".to_string()
    } else {
        decl.important.clone()
    };
    Ok(Declaration {
        name: DeclName::Plain(name),
        value: Box::new(value),
        important,
        variable,
        ..decl.clone()
    })
}

// ============================================================================
// IMPORTS
// ============================================================================

/// Splices every import of `frame` for its evaluated contents.
fn eval_imports(frame: &FrameRef, ctx: &mut EvalContext) -> LessResult<()> {
    let mut i = 0;
    loop {
        let import = {
            let f = frame.borrow();
            match f.rules.get(i) {
                None => break,
                Some(Node::Import(import)) => Some(import.clone()),
                Some(_) => None,
            }
        };
        let Some(import) = import else {
            i += 1;
            continue;
        };
        let nodes = eval_import(import, ctx)?;
        let count = nodes.len();
        let mut f = frame.borrow_mut();
        f.rules.splice(i..=i, nodes);
        f.reset_cache();
        i += count;
    }
    Ok(())
}

fn eval_import(mut import: Import, ctx: &mut EvalContext) -> LessResult<Vec<Node>> {
    if import.root.is_none() && import.inline_text.is_none() && import.is_variable_import() {
        load_variable_import(&mut import, ctx).map_err(|e| e.located(&import.pos))?;
    }
    let mut nodes = import_contents(&import, ctx).map_err(|e| e.located(&import.pos))?;
    if import.options.reference || import.visibility.blocks_visibility() {
        for node in &mut nodes {
            node.add_visibility_block();
        }
    }
    Ok(nodes)
}

/// An import whose path needed interpolation is loaded now that the
/// variables are known.
fn load_variable_import(import: &mut Import, ctx: &mut EvalContext) -> LessResult<()> {
    let path = eval_node(&import.path, ctx)?;
    import.path = Box::new(path);
    import.refresh_css();
    if import.css && !import.options.inline {
        return Ok(());
    }
    match ctx.imports.clone() {
        Some(manager) => manager.borrow_mut().resolve(import),
        None => Err(err_msg!(
            File,
            "'{}' wasn't found: no file manager is configured",
            import.path_text().unwrap_or_default()
        )),
    }
}

fn import_contents(import: &Import, ctx: &mut EvalContext) -> LessResult<Vec<Node>> {
    if let Some(key) = &import.once_key {
        if !ctx.imported_once.insert(key.clone()) {
            return Ok(Vec::new());
        }
    }

    if import.options.inline {
        let Some(text) = &import.inline_text else {
            return Ok(Vec::new());
        };
        let mut contents = Anonymous::new(text.clone()).at(import.pos.clone());
        contents.rules_visible = true;
        let contents = Node::Anonymous(contents);
        return Ok(match &import.features {
            Some(features) => vec![wrap_in_media(import, features, vec![contents])],
            None => vec![contents],
        });
    }

    if import.css {
        let features = import
            .features
            .as_ref()
            .map(|f| eval_node(f, ctx))
            .transpose()?;
        let mut css_import = import.clone();
        css_import.path = Box::new(eval_import_path(import, ctx)?);
        css_import.features = features.map(Box::new);
        return Ok(vec![Node::Import(css_import)]);
    }

    let Some(root) = &import.root else {
        return Ok(Vec::new());
    };
    let frame = ctx.new_frame(Ruleset::new(None, root.rules.clone()));
    eval_imports(&frame, ctx)?;
    let rules = std::mem::take(&mut frame.borrow_mut().rules);
    Ok(match &import.features {
        Some(features) => vec![wrap_in_media(import, features, rules)],
        None => rules,
    })
}

/// `@import "x" screen;` scopes the contents to the media query.
fn wrap_in_media(import: &Import, features: &Node, rules: Vec<Node>) -> Node {
    let mut media = Media::new("@media", features.clone(), rules, import.pos.clone());
    media.visibility = import.visibility;
    Node::Media(media)
}

/// A pass-through CSS import keeps its path relative to the entry file.
fn eval_import_path(import: &Import, ctx: &mut EvalContext) -> LessResult<Node> {
    let mut path = eval_node(&import.path, ctx)?;
    if let Node::Quoted(q) = &mut path {
        let root = rootpath(&import.pos, ctx);
        q.value = if import.pos.file.is_some() && ctx.path_requires_rewrite(&q.value) {
            ctx.rewrite_path(&q.value, &root)
        } else {
            normalize_path(&q.value)
        };
    }
    Ok(path)
}

// ============================================================================
// AT-RULES
// ============================================================================

/// Media queries inside an at-rule body bubble only up to the at-rule.
pub(super) fn eval_at_rule(at: &AtRule, ctx: &mut EvalContext) -> LessResult<Node> {
    let saved_path = ctx.media_path.replace(Vec::new());
    let saved_blocks = ctx.media_blocks.replace(Vec::new());
    let result = eval_at_rule_parts(at, ctx);
    ctx.media_path = saved_path;
    ctx.media_blocks = saved_blocks;
    let (value, rules) = result?;
    Ok(Node::AtRule(AtRule {
        value,
        rules,
        ..at.clone()
    }))
}

type AtRuleParts = (Option<Box<Node>>, Option<Vec<Node>>);

fn eval_at_rule_parts(at: &AtRule, ctx: &mut EvalContext) -> LessResult<AtRuleParts> {
    let value = match &at.value {
        Some(v) => Some(Box::new(eval_node(v, ctx)?)),
        None => None,
    };
    let rules = match &at.rules {
        Some(rules) => {
            let mut evaluated = Vec::with_capacity(rules.len());
            for rule in rules {
                match rule {
                    Node::Ruleset(rs) => {
                        let mut body = eval_ruleset(rs, ctx)?;
                        body.root = true;
                        evaluated.push(Node::Ruleset(Box::new(body)));
                    }
                    other => evaluated.push(eval_node(other, ctx)?),
                }
            }
            Some(evaluated)
        }
        None => None,
    };
    Ok((value, rules))
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::options::LessOptions;
    use crate::tree::{FileInfo, SourcePos};

    fn eval_source(source: &str) -> LessResult<Ruleset> {
        let file = Rc::new(FileInfo::new("test.less", source));
        let root = crate::parser::parse_stylesheet(&file, false, false)?;
        let mut ctx =
            EvalContext::new(&LessOptions::default(), Rc::new(FunctionRegistry::with_builtins()));
        crate::eval::evaluate(root, &mut ctx)
    }

    fn child(rs: &Ruleset, index: usize) -> &Ruleset {
        match &rs.rules[index] {
            Node::Ruleset(r) => r,
            other => panic!("expected a ruleset, got {}", other.type_name()),
        }
    }

    #[test]
    fn test_declaration_values_are_evaluated() {
        let root = eval_source("@w: 10px; .a { width: @w * 2; }").unwrap();
        let a = child(&root, 1);
        let Node::Declaration(d) = &a.rules[0] else { panic!() };
        assert_eq!(css(&d.value), "20px");
    }

    #[test]
    fn test_failed_guard_empties_ruleset() {
        let root = eval_source(".a when (1 = 2) { color: red; }").unwrap();
        assert!(child(&root, 0).rules.is_empty());
    }

    #[test]
    fn test_interpolated_selector_is_reparsed() {
        let root = eval_source("@n: b; .a-@{n} .c { x: y; }").unwrap();
        let a = child(&root, 1);
        let selectors = a.selectors.as_ref().unwrap();
        assert_eq!(selectors[0].elements.len(), 2);
        assert_eq!(selectors[0].elements[0].value.as_text(), Some(".a-b"));
    }

    #[test]
    fn test_parent_only_ruleset_is_folded() {
        let root = eval_source(".a { & { @v: 1; color: red; } }").unwrap();
        let a = child(&root, 0);
        assert_eq!(a.rules.len(), 1);
        assert!(matches!(&a.rules[0], Node::Declaration(d) if d.name_str() == "color"));
    }

    #[test]
    fn test_detached_ruleset_on_property_is_rejected() {
        let err = eval_source("@dr: { a: b; }; .a { color: @dr; }").unwrap_err();
        assert_eq!(err.message(), "Rulesets cannot be evaluated on a property.");
    }

    #[test]
    fn test_important_variable_marks_declaration() {
        let mut ctx =
            EvalContext::new(&LessOptions::default(), Rc::new(FunctionRegistry::with_builtins()));
        let var = Declaration::new("@c", Node::keyword("red"), SourcePos::default())
            .with_important(Some("!important"));
        let frame = ctx.new_frame(Ruleset::root(vec![Node::Declaration(var)]));
        ctx.push_frame(frame);
        let decl = Declaration::new(
            "color",
            Node::Variable(Variable::new("@c", SourcePos::default())),
            SourcePos::default(),
        );
        let evaluated = eval_declaration(&decl, &mut ctx).unwrap();
        assert_eq!(evaluated.important, " !important");
    }
}
