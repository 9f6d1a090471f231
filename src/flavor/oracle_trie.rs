//! Case-insensitive bracket expressions for Oracle.
//!
//! Under case-insensitive matching a bracket expression can match whole strings (`[ß]` matches
//! `ss`). Oracle tries those strings in order and commits to the first one that matches: once a
//! complete string has matched, longer strings sharing it as a prefix are never preferred. The
//! strings are collected in a trie whose nodes are codepoint sets, and the trie is emitted as an
//! alternation where a node that both ends a string and continues into longer ones only stops
//! early when none of the continuations can follow.

use crate::ast::{AstBuilder, LookAroundKind};
use crate::casefold::{closure, closure_multi_code_point, unfold_string, CaseFoldAlgorithm};
use crate::charset::{CodePointSet, Range};
use crate::error::Result;

pub const ROOT: usize = 0;

#[derive(Debug, Clone)]
struct TrieNode {
    set: CodePointSet,
    children: Vec<usize>,
    /// A string ends here.
    end: bool,
}

impl TrieNode {
    fn new(set: CodePointSet) -> Self {
        TrieNode {
            set,
            children: vec![],
            end: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClassTrie {
    nodes: Vec<TrieNode>,
}

impl Default for ClassTrie {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassTrie {
    pub fn new() -> Self {
        ClassTrie {
            nodes: vec![TrieNode::new(CodePointSet::empty())],
        }
    }

    /// The children of `parent` that together cover `set`, splitting existing children and
    /// adding a new one as needed. With `end`, they are all marked as ending a string.
    ///
    /// `None` when `parent` already ends a string, so nothing may be added below it.
    pub fn get_or_add_children(
        &mut self,
        parent: usize,
        set: &CodePointSet,
        end: bool,
    ) -> Option<Vec<usize>> {
        if parent != ROOT && self.nodes[parent].end {
            return None;
        }
        let mut remaining = set.clone();
        let mut result = vec![];
        let mut i = 0;
        while i < self.nodes[parent].children.len() && !remaining.is_empty() {
            let child = self.nodes[parent].children[i];
            let parts = self.nodes[child].set.intersect_and_subtract(&remaining);
            if !parts.intersection.is_empty() {
                if !parts.left_only.is_empty() {
                    let copy = self.deep_copy(child);
                    self.nodes[copy].set = parts.left_only;
                    self.nodes[parent].children.insert(i + 1, copy);
                }
                self.nodes[child].set = parts.intersection;
                result.push(child);
                remaining = parts.right_only;
            }
            i += 1;
        }
        if !remaining.is_empty() {
            let leaf = if end {
                self.nodes[parent]
                    .children
                    .iter()
                    .copied()
                    .find(|&c| self.nodes[c].end && self.nodes[c].children.is_empty())
            } else {
                None
            };
            match leaf {
                Some(leaf) => {
                    self.nodes[leaf].set = self.nodes[leaf].set.union(&remaining);
                    if !result.contains(&leaf) {
                        result.push(leaf);
                    }
                }
                None => {
                    self.nodes.push(TrieNode::new(remaining));
                    let id = self.nodes.len() - 1;
                    self.nodes[parent].children.push(id);
                    result.push(id);
                }
            }
        }
        if end {
            for &n in &result {
                self.nodes[n].end = true;
            }
        }
        Some(result)
    }

    /// Inserts the string whose characters come from `steps`, one set per position. Returns
    /// false when the whole string was pruned by a shorter one.
    pub fn add_string(&mut self, steps: &[CodePointSet]) -> bool {
        let mut frontier = vec![ROOT];
        for (i, step) in steps.iter().enumerate() {
            let end = i + 1 == steps.len();
            let mut next = vec![];
            for &node in &frontier {
                for child in self.get_or_add_children(node, step, end).unwrap_or_default() {
                    if !next.contains(&child) {
                        next.push(child);
                    }
                }
            }
            if next.is_empty() {
                return false;
            }
            frontier = next;
        }
        true
    }

    fn deep_copy(&mut self, id: usize) -> usize {
        let node = self.nodes[id].clone();
        let children = node.children.iter().map(|&c| self.deep_copy(c)).collect();
        self.nodes.push(TrieNode { children, ..node });
        self.nodes.len() - 1
    }

    pub fn generate(&self, builder: &mut AstBuilder) {
        let children = &self.nodes[ROOT].children;
        match children.as_slice() {
            [] => {
                builder.add_dead();
            }
            [only] if self.nodes[*only].children.is_empty() => {
                builder.add_char_class(self.nodes[*only].set.clone());
            }
            _ => {
                builder.push_group();
                self.emit_alternatives(children, builder);
                builder.pop_group();
            }
        }
    }

    fn emit_alternatives(&self, ids: &[usize], builder: &mut AstBuilder) {
        for (i, &id) in ids.iter().enumerate() {
            if i > 0 {
                builder.next_alternative();
            }
            self.emit_node(id, builder);
        }
    }

    fn emit_node(&self, id: usize, builder: &mut AstBuilder) {
        let node = &self.nodes[id];
        builder.add_char_class(node.set.clone());
        if node.children.is_empty() {
            return;
        }
        builder.push_group();
        self.emit_alternatives(&node.children, builder);
        if node.end {
            let follow = node
                .children
                .iter()
                .fold(CodePointSet::empty(), |acc, &c| acc.union(&self.nodes[c].set));
            builder.next_alternative();
            builder.push_look_around(LookAroundKind::Ahead, true);
            builder.add_char_class(follow);
            builder.pop_group();
        }
        builder.pop_group();
    }
}

/// Emits a case-insensitive bracket expression over `set`.
///
/// Strings some member folds to are tried before single characters. A negated expression
/// matches one character outside the closure, as long as none of those strings matches here.
pub fn emit_class(
    set: &CodePointSet,
    negated: bool,
    algorithm: CaseFoldAlgorithm,
    full: Range,
    builder: &mut AstBuilder,
) -> Result<()> {
    let closed = closure(set, algorithm, |_, _| true).clip(full);
    let mut strings: Vec<Vec<u32>> = vec![];
    for (_, folded) in closure_multi_code_point(&closed, algorithm) {
        if !strings.contains(&folded) {
            strings.push(folded);
        }
    }
    log::trace!("class trie over {:?} with {} strings", closed, strings.len());

    if negated {
        let singles = closed.invert(full);
        if strings.is_empty() {
            builder.add_char_class(singles);
            return Ok(());
        }
        builder.push_group();
        builder.push_look_around(LookAroundKind::Ahead, true);
        for (i, s) in strings.iter().enumerate() {
            if i > 0 {
                builder.next_alternative();
            }
            unfold_string(s, algorithm, full, true, builder)?;
        }
        builder.pop_group();
        builder.add_char_class(singles);
        builder.pop_group();
        return Ok(());
    }

    let mut trie = ClassTrie::new();
    for s in &strings {
        let steps: Vec<CodePointSet> = s
            .iter()
            .map(|&c| closure(&CodePointSet::from_code_point(c), algorithm, |_, _| true).clip(full))
            .collect();
        if steps.iter().all(|step| !step.is_empty()) {
            trie.add_string(&steps);
        }
    }
    trie.add_string(&[closed]);
    trie.generate(builder);
    Ok(())
}
