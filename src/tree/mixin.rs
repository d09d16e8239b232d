//! Mixin definitions and call sites.

use crate::tree::ruleset::FrameRef;
use crate::tree::selector::{Element, Selector};
use crate::tree::{next_id, Node, SourcePos, Visibility};

/// One formal parameter. A parameter without a name is a pattern that the
/// argument in its position must equal.
#[derive(Debug, Clone)]
pub struct MixinParam {
    pub name: Option<String>,
    pub value: Option<Node>,
    pub variadic: bool,
}

#[derive(Debug, Clone)]
pub struct MixinDefinition {
    pub name: String,
    pub selectors: Vec<Selector>,
    pub params: Vec<MixinParam>,
    pub condition: Option<Box<Node>>,
    pub variadic: bool,
    pub arity: usize,
    /// Params that are patterns or have no default.
    pub required: usize,
    pub optional_params: Vec<String>,
    pub rules: Vec<Node>,
    /// Scope captured when the definition was evaluated.
    pub frames: Option<Vec<FrameRef>>,
    pub id: usize,
    pub pos: SourcePos,
    pub visibility: Visibility,
}

impl MixinDefinition {
    pub fn new(
        name: &str,
        params: Vec<MixinParam>,
        rules: Vec<Node>,
        condition: Option<Node>,
        variadic: bool,
        pos: SourcePos,
    ) -> Self {
        let name = if name.is_empty() {
            "anonymous mixin"
        } else {
            name
        };
        let mut optional_params = Vec::new();
        let mut required = 0;
        for p in &params {
            match (&p.name, &p.value) {
                (Some(n), Some(_)) => optional_params.push(n.clone()),
                _ => required += 1,
            }
        }
        Self {
            name: name.to_string(),
            selectors: vec![Selector::new(
                vec![Element::text("", name)],
                pos.clone(),
            )],
            arity: params.len(),
            params,
            condition: condition.map(Box::new),
            variadic,
            required,
            optional_params,
            rules,
            frames: None,
            id: next_id(),
            pos,
            visibility: Visibility::default(),
        }
    }

    /// Wraps a ruleset body so it can be called like a parameterless mixin.
    pub fn from_ruleset(rules: Vec<Node>, id: usize, visibility: Visibility, pos: SourcePos) -> Self {
        let mut def = Self::new("", Vec::new(), rules, None, false, pos);
        def.id = id;
        def.visibility = visibility;
        def
    }
}

#[derive(Debug, Clone)]
pub struct MixinArg {
    pub name: Option<String>,
    pub value: Node,
    /// `@list...` spreads the list into positional arguments.
    pub expand: bool,
}

#[derive(Debug, Clone)]
pub struct MixinCall {
    pub selector: Selector,
    pub arguments: Vec<MixinArg>,
    pub important: bool,
    pub pos: SourcePos,
    pub visibility: Visibility,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Dimension;

    #[test]
    fn test_required_counts_patterns_and_bare_params() {
        let params = vec![
            MixinParam {
                name: None,
                value: Some(Node::keyword("dark")),
                variadic: false,
            },
            MixinParam {
                name: Some("@a".into()),
                value: None,
                variadic: false,
            },
            MixinParam {
                name: Some("@b".into()),
                value: Some(Node::Dimension(Dimension::unitless(2.0))),
                variadic: false,
            },
        ];
        let def = MixinDefinition::new(".m", params, Vec::new(), None, false, SourcePos::default());
        assert_eq!(def.required, 2);
        assert_eq!(def.arity, 3);
        assert_eq!(def.optional_params, vec!["@b".to_string()]);
        assert_eq!(def.selectors[0].mixin_elements(), vec![".m"]);
    }
}
