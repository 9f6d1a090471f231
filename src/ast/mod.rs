//! The canonical syntax tree every dialect is translated into.
//!
//! Nodes live in an arena and refer to each other by [`NodeId`]. A [`Group`] holds alternatives,
//! each alternative is a `Sequence` of terms, and any term may carry a [`Quantifier`].

pub mod builder;
pub mod calls;

use std::collections::BTreeMap;
use std::fmt;

use crate::charset::{write_class, write_code_point, CodePointSet};

pub use builder::{AstBuilder, QuantifierError};
pub use calls::expand_subexpression_calls;

pub type NodeId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quantifier {
    pub lower: u32,
    /// `None` is unbounded.
    pub upper: Option<u32>,
    pub greedy: bool,
    pub possessive: bool,
}

impl Quantifier {
    pub fn new(lower: u32, upper: Option<u32>) -> Self {
        Quantifier {
            lower,
            upper,
            greedy: true,
            possessive: false,
        }
    }

    pub fn star() -> Self {
        Self::new(0, None)
    }

    pub fn plus() -> Self {
        Self::new(1, None)
    }

    pub fn optional() -> Self {
        Self::new(0, Some(1))
    }

    pub fn lazy(self) -> Self {
        Quantifier {
            greedy: false,
            ..self
        }
    }

    pub fn possessive(self) -> Self {
        Quantifier {
            possessive: true,
            ..self
        }
    }

    /// Combines two back to back quantifiers on the same atom.
    pub fn merge(&self, next: &Quantifier) -> Quantifier {
        let upper = match (self.upper, next.upper) {
            (Some(a), Some(b)) => Some(a.max(b)),
            _ => None,
        };
        Quantifier {
            lower: self.lower.max(next.lower),
            upper,
            greedy: self.greedy && next.greedy,
            possessive: self.possessive || next.possessive,
        }
    }
}

impl fmt::Display for Quantifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.lower, self.upper) {
            (0, None) => write!(f, "*")?,
            (1, None) => write!(f, "+")?,
            (0, Some(1)) => write!(f, "?")?,
            (n, None) => write!(f, "{{{},}}", n)?,
            (n, Some(m)) if n == m => write!(f, "{{{}}}", n)?,
            (n, Some(m)) => write!(f, "{{{},{}}}", n, m)?,
        }
        if self.possessive {
            write!(f, "+")
        } else if !self.greedy {
            write!(f, "?")
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookAroundKind {
    Ahead,
    Behind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssertionKind {
    /// Start of input.
    Caret,
    /// End of input.
    Dollar,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub alternatives: Vec<NodeId>,
    pub capture: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Group(Group),
    Sequence(Vec<NodeId>),
    CharacterClass(CodePointSet),
    Assertion(AssertionKind),
    LookAround {
        kind: LookAroundKind,
        negated: bool,
        group: NodeId,
    },
    BackReference {
        groups: Vec<u32>,
        ignore_case: bool,
    },
    SubexpressionCall {
        group: u32,
        name: Option<String>,
    },
    /// Never matches.
    Dead,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub quantifier: Option<Quantifier>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegexAst {
    nodes: Vec<Node>,
    root: NodeId,
    group_count: u32,
}

impl RegexAst {
    /// A tree whose root group has one empty alternative.
    pub fn new() -> Self {
        let mut ast = RegexAst {
            nodes: vec![],
            root: 0,
            group_count: 0,
        };
        let root = ast.add_node(
            NodeKind::Group(Group {
                alternatives: vec![],
                capture: Some(0),
            }),
            None,
        );
        let seq = ast.add_node(NodeKind::Sequence(vec![]), Some(root));
        ast.group_mut(root).alternatives.push(seq);
        ast.root = root;
        ast
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of capture groups, not counting the whole match.
    pub fn group_count(&self) -> u32 {
        self.group_count
    }

    pub(crate) fn set_group_count(&mut self, count: u32) {
        self.group_count = count;
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub(crate) fn add_node(&mut self, kind: NodeKind, parent: Option<NodeId>) -> NodeId {
        self.nodes.push(Node {
            kind,
            parent,
            quantifier: None,
        });
        self.nodes.len() - 1
    }

    /// The group payload of `id`.
    ///
    /// Panics if `id` is not a group; callers only pass ids they created as groups.
    pub(crate) fn group_mut(&mut self, id: NodeId) -> &mut Group {
        match &mut self.nodes[id].kind {
            NodeKind::Group(g) => g,
            other => unreachable!("node {} is not a group: {:?}", id, other),
        }
    }

    pub(crate) fn sequence_mut(&mut self, id: NodeId) -> &mut Vec<NodeId> {
        match &mut self.nodes[id].kind {
            NodeKind::Sequence(terms) => terms,
            other => unreachable!("node {} is not a sequence: {:?}", id, other),
        }
    }

    /// Ids of the nodes directly below `id`.
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        match &self.nodes[id].kind {
            NodeKind::Group(g) => g.alternatives.clone(),
            NodeKind::Sequence(terms) => terms.clone(),
            NodeKind::LookAround { group, .. } => vec![*group],
            _ => vec![],
        }
    }

    /// Every node reachable from the root, parents before children.
    pub fn preorder(&self) -> Vec<NodeId> {
        let mut out = vec![];
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.children(id).into_iter().rev());
        }
        out
    }

    /// The capture group nodes by number. The root is group 0.
    pub fn capture_groups(&self) -> BTreeMap<u32, NodeId> {
        let mut groups = BTreeMap::new();
        for id in self.preorder() {
            if let NodeKind::Group(Group {
                capture: Some(n), ..
            }) = &self.nodes[id].kind
            {
                groups.entry(*n).or_insert(id);
            }
        }
        groups
    }

    /// Copies the subtree under `id`, attaching the copy to `parent`.
    pub(crate) fn deep_copy(&mut self, id: NodeId, parent: Option<NodeId>) -> NodeId {
        let node = self.nodes[id].clone();
        let copy = self.add_node(node.kind.clone(), parent);
        self.nodes[copy].quantifier = node.quantifier;
        let kind = match node.kind {
            NodeKind::Group(g) => NodeKind::Group(Group {
                alternatives: g
                    .alternatives
                    .iter()
                    .map(|&a| self.deep_copy(a, Some(copy)))
                    .collect(),
                capture: g.capture,
            }),
            NodeKind::Sequence(terms) => NodeKind::Sequence(
                terms
                    .iter()
                    .map(|&t| self.deep_copy(t, Some(copy)))
                    .collect(),
            ),
            NodeKind::LookAround {
                kind,
                negated,
                group,
            } => NodeKind::LookAround {
                kind,
                negated,
                group: self.deep_copy(group, Some(copy)),
            },
            other => other,
        };
        self.nodes[copy].kind = kind;
        copy
    }

    /// The capture groups enclosing `id`, innermost first, ending with the root.
    pub fn enclosing_captures(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = vec![];
        let mut cur = self.nodes[id].parent;
        while let Some(p) = cur {
            if let NodeKind::Group(Group {
                capture: Some(_), ..
            }) = self.nodes[p].kind
            {
                out.push(p);
            }
            cur = self.nodes[p].parent;
        }
        out
    }

    fn fmt_node(&self, id: NodeId, out: &mut String) {
        let node = &self.nodes[id];
        match &node.kind {
            NodeKind::Group(g) => {
                if id == self.root {
                    self.fmt_alternatives(g, out);
                } else {
                    out.push_str(if g.capture.is_some() { "(" } else { "(?:" });
                    self.fmt_alternatives(g, out);
                    out.push(')');
                }
            }
            NodeKind::Sequence(terms) => {
                for (i, &t) in terms.iter().enumerate() {
                    // `\1` then `0` must not read back as `\10`.
                    let wrap = self.is_bare_reference(t)
                        && terms.get(i + 1).map_or(false, |&next| self.is_digit(next));
                    if wrap {
                        out.push_str("(?:");
                    }
                    self.fmt_node(t, out);
                    if wrap {
                        out.push(')');
                    }
                }
            }
            NodeKind::CharacterClass(set) => match set.single_code_point() {
                Some(c) => write_code_point(out, c, false),
                None => write_class(out, set),
            },
            NodeKind::Assertion(AssertionKind::Caret) => out.push('^'),
            NodeKind::Assertion(AssertionKind::Dollar) => out.push('$'),
            NodeKind::LookAround {
                kind,
                negated,
                group,
            } => {
                out.push_str(match (kind, negated) {
                    (LookAroundKind::Ahead, false) => "(?=",
                    (LookAroundKind::Ahead, true) => "(?!",
                    (LookAroundKind::Behind, false) => "(?<=",
                    (LookAroundKind::Behind, true) => "(?<!",
                });
                if let NodeKind::Group(g) = &self.nodes[*group].kind {
                    self.fmt_alternatives(g, out);
                }
                out.push(')');
            }
            NodeKind::BackReference {
                groups,
                ignore_case,
            } => {
                if *ignore_case {
                    out.push_str("(?i:");
                }
                match groups.as_slice() {
                    [n] => out.push_str(&format!("\\{}", n)),
                    _ => {
                        let list: Vec<String> = groups.iter().map(u32::to_string).collect();
                        out.push_str(&format!("\\k<{}>", list.join(",")));
                    }
                }
                if *ignore_case {
                    out.push(')');
                }
            }
            NodeKind::SubexpressionCall { group, .. } => out.push_str(&format!("\\g<{}>", group)),
            NodeKind::Dead => out.push_str("[]"),
        }
        if let Some(q) = &node.quantifier {
            out.push_str(&q.to_string());
        }
    }

    fn is_bare_reference(&self, id: NodeId) -> bool {
        let node = &self.nodes[id];
        node.quantifier.is_none()
            && matches!(
                &node.kind,
                NodeKind::BackReference { groups, ignore_case: false } if groups.len() == 1
            )
    }

    fn is_digit(&self, id: NodeId) -> bool {
        match &self.nodes[id].kind {
            NodeKind::CharacterClass(set) => set
                .single_code_point()
                .map_or(false, |c| ('0' as u32..='9' as u32).contains(&c)),
            _ => false,
        }
    }

    fn fmt_alternatives(&self, group: &Group, out: &mut String) {
        for (i, &alt) in group.alternatives.iter().enumerate() {
            if i > 0 {
                out.push('|');
            }
            self.fmt_node(alt, out);
        }
    }
}

impl Default for RegexAst {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RegexAst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        self.fmt_node(self.root, &mut out);
        write!(f, "{}", out)
    }
}

/// Capture group names and the group numbers carrying them, in definition order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamedGroups {
    names: BTreeMap<String, Vec<u32>>,
}

impl NamedGroups {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, group: u32) {
        self.names.entry(name.to_string()).or_default().push(group);
    }

    pub fn get(&self, name: &str) -> Option<&[u32]> {
        self.names.get(name).map(Vec::as_slice)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    /// Whether `name` labels more than one group.
    pub fn is_multiplexed(&self, name: &str) -> bool {
        self.get(name).map_or(false, |g| g.len() > 1)
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u32])> {
        self.names.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

impl fmt::Display for NamedGroups {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, groups)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            let list: Vec<String> = groups.iter().map(u32::to_string).collect();
            write!(f, "{} => {}", name, list.join("|"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    macro_rules! test_quantifier {
        ($name:ident, $q:expr, $text:expr) => {
            #[test]
            fn $name() {
                assert_eq!($q.to_string(), $text);
            }
        };
    }

    test_quantifier!(print_star, Quantifier::star(), "*");
    test_quantifier!(print_lazy_plus, Quantifier::plus().lazy(), "+?");
    test_quantifier!(print_exact, Quantifier::new(3, Some(3)), "{3}");
    test_quantifier!(print_open, Quantifier::new(2, None), "{2,}");
    test_quantifier!(print_possessive, Quantifier::optional().possessive(), "?+");
    test_quantifier!(print_bounded, Quantifier::new(2, Some(5)), "{2,5}");

    #[test]
    fn merge_quantifiers() {
        let merged = Quantifier::new(1, Some(3)).merge(&Quantifier::new(2, Some(5)).lazy());
        assert_eq!(merged, Quantifier::new(2, Some(5)).lazy());
        let merged = Quantifier::optional().merge(&Quantifier::star());
        assert_eq!(merged, Quantifier::star());
    }

    #[test]
    fn empty_tree() {
        let ast = RegexAst::new();
        assert_eq!(ast.to_string(), "");
        assert_eq!(ast.capture_groups().len(), 1);
    }

    #[test]
    fn deep_copy_is_independent() {
        let mut ast = RegexAst::new();
        let root_seq = ast.group_mut(ast.root()).alternatives[0];
        let class = ast.add_node(
            NodeKind::CharacterClass(CodePointSet::from_code_point('a' as u32)),
            Some(root_seq),
        );
        ast.sequence_mut(root_seq).push(class);
        let copy = ast.deep_copy(root_seq, None);
        ast.node_mut(class).quantifier = Some(Quantifier::star());
        let copied_class = ast.children(copy)[0];
        assert_ne!(copied_class, class);
        assert_eq!(ast.node(copied_class).quantifier, None);
        assert_eq!(ast.node(copied_class).parent, Some(copy));
    }

    #[test]
    fn named_groups() {
        let mut names = NamedGroups::new();
        names.insert("a", 1);
        names.insert("b", 2);
        names.insert("a", 3);
        assert!(names.is_multiplexed("a"));
        assert!(!names.is_multiplexed("b"));
        assert_eq!(names.get("a"), Some(&[1, 3][..]));
        assert_eq!(names.to_string(), "a => 1|3, b => 2");
    }
}
