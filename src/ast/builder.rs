use super::{AssertionKind, Group, LookAroundKind, NodeId, NodeKind, Quantifier, RegexAst};
use crate::casefold::UnfoldSink;
use crate::charset::CodePointSet;
use crate::error::Result;

/// Why a quantifier could not be attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantifierError {
    NothingToRepeat,
    /// The previous term is already quantified and this dialect doesn't merge quantifiers.
    MultipleRepeat,
}

/// Zero-width assertions the dialects translate `^`, `$` and friends into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anchor {
    Start,
    End,
    /// `(?:^|(?<=T))`
    LineStart(CodePointSet),
    /// `(?:$|(?=T))`
    LineEnd(CodePointSet),
    /// `(?:$|(?=\n$))`
    EndOrFinalNewline,
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    group: NodeId,
    /// The node standing in the parent sequence: the group, or the look-around holding it.
    term: NodeId,
    sequence: NodeId,
}

/// Builds a [`RegexAst`] one operation at a time, in pattern order.
#[derive(Debug)]
pub struct AstBuilder {
    ast: RegexAst,
    frames: Vec<Frame>,
    last_term: Option<NodeId>,
    group_count: u32,
    merge_quantifiers: bool,
}

impl Default for AstBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AstBuilder {
    pub fn new() -> Self {
        let ast = RegexAst::new();
        let root = ast.root();
        let sequence = ast.children(root)[0];
        AstBuilder {
            ast,
            frames: vec![Frame {
                group: root,
                term: root,
                sequence,
            }],
            last_term: None,
            group_count: 0,
            merge_quantifiers: false,
        }
    }

    /// Combine back to back quantifiers instead of rejecting the second one.
    pub fn with_quantifier_merging(mut self, merge: bool) -> Self {
        self.merge_quantifiers = merge;
        self
    }

    fn top(&self) -> Frame {
        self.frames[self.frames.len() - 1]
    }

    fn add_term(&mut self, kind: NodeKind) -> NodeId {
        let sequence = self.top().sequence;
        let id = self.ast.add_node(kind, Some(sequence));
        self.ast.sequence_mut(sequence).push(id);
        self.last_term = Some(id);
        id
    }

    fn open(
        &mut self,
        capture: Option<u32>,
        look_around: Option<(LookAroundKind, bool)>,
    ) -> NodeId {
        let parent_sequence = self.top().sequence;
        let group_kind = NodeKind::Group(Group {
            alternatives: vec![],
            capture,
        });
        let (term, group) = match look_around {
            None => {
                let group = self.add_term(group_kind);
                (group, group)
            }
            Some((kind, negated)) => {
                let term = self.add_term(NodeKind::LookAround {
                    kind,
                    negated,
                    group: 0,
                });
                let group = self.ast.add_node(group_kind, Some(term));
                if let NodeKind::LookAround { group: g, .. } = &mut self.ast.node_mut(term).kind {
                    *g = group;
                }
                (term, group)
            }
        };
        debug_assert_eq!(self.ast.node(term).parent, Some(parent_sequence));
        let sequence = self.ast.add_node(NodeKind::Sequence(vec![]), Some(group));
        self.ast.group_mut(group).alternatives.push(sequence);
        self.frames.push(Frame {
            group,
            term,
            sequence,
        });
        self.last_term = None;
        group
    }

    pub fn push_group(&mut self) -> NodeId {
        self.open(None, None)
    }

    /// Opens the next capture group and returns its number.
    pub fn push_capture_group(&mut self) -> u32 {
        self.group_count += 1;
        let number = self.group_count;
        self.open(Some(number), None);
        number
    }

    pub fn push_look_around(&mut self, kind: LookAroundKind, negated: bool) -> NodeId {
        self.open(None, Some((kind, negated)))
    }

    /// Starts the next alternative of the innermost group.
    pub fn next_alternative(&mut self) {
        let group = self.top().group;
        let sequence = self.ast.add_node(NodeKind::Sequence(vec![]), Some(group));
        self.ast.group_mut(group).alternatives.push(sequence);
        let top = self.frames.len() - 1;
        self.frames[top].sequence = sequence;
        self.last_term = None;
    }

    fn close(&mut self) -> NodeId {
        let frame = match self.frames.pop() {
            Some(frame) if !self.frames.is_empty() => frame,
            _ => unreachable!("closing the root group"),
        };
        self.last_term = Some(frame.term);
        frame.term
    }

    /// Closes the innermost group. `None` when only the root is open.
    pub fn pop_group(&mut self) -> Option<NodeId> {
        (self.frames.len() > 1).then(|| self.close())
    }

    /// Open groups, not counting the root.
    pub fn depth(&self) -> usize {
        self.frames.len() - 1
    }

    /// Numbers of the capture groups currently open.
    pub fn open_capture_groups(&self) -> Vec<u32> {
        self.frames[1..]
            .iter()
            .filter_map(|f| match &self.ast.node(f.group).kind {
                NodeKind::Group(g) => g.capture,
                _ => None,
            })
            .collect()
    }

    pub fn group_count(&self) -> u32 {
        self.group_count
    }

    /// An empty set becomes a dead node.
    pub fn add_char_class(&mut self, set: CodePointSet) -> NodeId {
        if set.is_empty() {
            self.add_dead()
        } else {
            self.add_term(NodeKind::CharacterClass(set))
        }
    }

    pub fn add_code_point(&mut self, c: u32) -> NodeId {
        self.add_char_class(CodePointSet::from_code_point(c))
    }

    pub fn add_dead(&mut self) -> NodeId {
        self.add_term(NodeKind::Dead)
    }

    pub fn add_back_reference(&mut self, groups: Vec<u32>, ignore_case: bool) -> NodeId {
        self.add_term(NodeKind::BackReference {
            groups,
            ignore_case,
        })
    }

    pub fn add_subexpression_call(&mut self, group: u32, name: Option<String>) -> NodeId {
        self.add_term(NodeKind::SubexpressionCall { group, name })
    }

    /// Anchors can't be quantified.
    pub fn add_anchor(&mut self, anchor: &Anchor) {
        match anchor {
            Anchor::Start => {
                self.add_term(NodeKind::Assertion(AssertionKind::Caret));
            }
            Anchor::End => {
                self.add_term(NodeKind::Assertion(AssertionKind::Dollar));
            }
            Anchor::LineStart(terminators) => {
                self.push_group();
                self.add_term(NodeKind::Assertion(AssertionKind::Caret));
                self.next_alternative();
                self.push_look_around(LookAroundKind::Behind, false);
                self.add_char_class(terminators.clone());
                self.close();
                self.close();
            }
            Anchor::LineEnd(terminators) => {
                self.push_group();
                self.add_term(NodeKind::Assertion(AssertionKind::Dollar));
                self.next_alternative();
                self.push_look_around(LookAroundKind::Ahead, false);
                self.add_char_class(terminators.clone());
                self.close();
                self.close();
            }
            Anchor::EndOrFinalNewline => {
                self.push_group();
                self.add_term(NodeKind::Assertion(AssertionKind::Dollar));
                self.next_alternative();
                self.push_look_around(LookAroundKind::Ahead, false);
                self.add_code_point('\n' as u32);
                self.add_term(NodeKind::Assertion(AssertionKind::Dollar));
                self.close();
                self.close();
            }
        }
        self.last_term = None;
    }

    fn add_look_around_class(&mut self, kind: LookAroundKind, negated: bool, set: &CodePointSet) {
        self.push_look_around(kind, negated);
        self.add_char_class(set.clone());
        self.close();
    }

    /// `\b` or `\B` over the word characters `word`.
    pub fn add_word_boundary(&mut self, word: &CodePointSet, negated: bool) {
        self.push_group();
        self.add_look_around_class(LookAroundKind::Behind, false, word);
        self.add_look_around_class(LookAroundKind::Ahead, !negated, word);
        self.next_alternative();
        self.add_look_around_class(LookAroundKind::Behind, true, word);
        self.add_look_around_class(LookAroundKind::Ahead, negated, word);
        self.close();
        self.last_term = None;
    }

    pub fn has_last_term(&self) -> bool {
        self.last_term.is_some()
    }

    /// The look-around the last term is, if it is one.
    pub fn last_term_look_around(&self) -> Option<LookAroundKind> {
        match self.ast.node(self.last_term?).kind {
            NodeKind::LookAround { kind, .. } => Some(kind),
            _ => None,
        }
    }

    pub fn add_quantifier(
        &mut self,
        quantifier: Quantifier,
    ) -> std::result::Result<(), QuantifierError> {
        let term = self.last_term.ok_or(QuantifierError::NothingToRepeat)?;
        match self.ast.node(term).quantifier {
            None => self.ast.node_mut(term).quantifier = Some(quantifier),
            Some(_) if !self.merge_quantifiers => return Err(QuantifierError::MultipleRepeat),
            Some(existing) if existing.lower > 1 => {
                let group = self.wrap_in_group(term);
                self.ast.node_mut(group).quantifier = Some(quantifier);
                self.last_term = Some(group);
            }
            Some(existing) => {
                self.ast.node_mut(term).quantifier = Some(existing.merge(&quantifier));
            }
        }
        Ok(())
    }

    /// Replaces `term` in its sequence with a non-capturing group holding just `term`.
    fn wrap_in_group(&mut self, term: NodeId) -> NodeId {
        let parent = self.ast.node(term).parent;
        let group = self.ast.add_node(
            NodeKind::Group(Group {
                alternatives: vec![],
                capture: None,
            }),
            parent,
        );
        let sequence = self.ast.add_node(NodeKind::Sequence(vec![term]), Some(group));
        self.ast.group_mut(group).alternatives.push(sequence);
        self.ast.node_mut(term).parent = Some(sequence);
        if let Some(parent) = parent {
            for t in self.ast.sequence_mut(parent).iter_mut() {
                if *t == term {
                    *t = group;
                }
            }
        }
        group
    }

    /// The finished tree, or the number of groups still open.
    pub fn finish(mut self) -> std::result::Result<RegexAst, usize> {
        if self.depth() > 0 {
            return Err(self.depth());
        }
        self.ast.set_group_count(self.group_count);
        Ok(self.ast)
    }
}

impl UnfoldSink for AstBuilder {
    fn class(&mut self, set: CodePointSet) -> Result<()> {
        self.add_char_class(set);
        Ok(())
    }

    fn dead(&mut self) -> Result<()> {
        self.add_dead();
        Ok(())
    }

    fn begin_alternation(&mut self) -> Result<()> {
        self.push_group();
        Ok(())
    }

    fn next_alternative(&mut self) -> Result<()> {
        AstBuilder::next_alternative(self);
        Ok(())
    }

    fn end_alternation(&mut self) -> Result<()> {
        self.close();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(s: &str) -> Vec<u32> {
        s.chars().map(u32::from).collect()
    }

    macro_rules! test_build {
        ($name:ident, |$b:ident| $body:block, $expected:expr) => {
            test_build!($name, AstBuilder::new(), |$b| $body, $expected);
        };
        ($name:ident, $builder:expr, |$b:ident| $body:block, $expected:expr) => {
            #[test]
            fn $name() {
                let mut $b = $builder;
                $body
                assert_eq!($b.finish().unwrap().to_string(), $expected);
            }
        };
    }

    test_build!(
        groups_and_alternatives,
        |b| {
            for c in chars("ab") {
                b.add_code_point(c);
            }
            b.next_alternative();
            assert_eq!(b.push_capture_group(), 1);
            b.add_code_point('c' as u32);
            b.pop_group();
            b.push_group();
            b.pop_group();
        },
        "ab|(c)(?:)"
    );

    test_build!(
        reference_before_digit,
        |b| {
            b.push_capture_group();
            b.add_code_point('a' as u32);
            b.pop_group();
            b.add_back_reference(vec![1], false);
            b.add_code_point('0' as u32);
            b.add_back_reference(vec![1], false);
            b.add_quantifier(Quantifier::star()).unwrap();
            b.add_code_point('5' as u32);
            b.add_back_reference(vec![1], false);
            b.add_code_point('x' as u32);
        },
        "(a)(?:\\1)0\\1*5\\1x"
    );

    test_build!(
        quantified_class,
        |b| {
            b.add_code_point('a' as u32);
            b.add_quantifier(Quantifier::new(2, Some(5))).unwrap();
        },
        "a{2,5}"
    );

    test_build!(
        merged_quantifiers,
        AstBuilder::new().with_quantifier_merging(true),
        |b| {
            b.add_code_point('a' as u32);
            b.add_quantifier(Quantifier::new(1, Some(3))).unwrap();
            b.add_quantifier(Quantifier::new(2, Some(5)).lazy()).unwrap();
        },
        "a{2,5}?"
    );

    test_build!(
        wrapped_when_lower_bound_exceeds_one,
        AstBuilder::new().with_quantifier_merging(true),
        |b| {
            b.add_code_point('a' as u32);
            b.add_quantifier(Quantifier::new(2, Some(2))).unwrap();
            b.add_quantifier(Quantifier::star()).unwrap();
        },
        "(?:a{2})*"
    );

    test_build!(
        word_boundary,
        |b| {
            b.add_word_boundary(&CodePointSet::from_range('a' as u32, 'z' as u32), false);
        },
        "(?:(?<=[a-z])(?![a-z])|(?<![a-z])(?=[a-z]))"
    );

    test_build!(
        non_word_boundary,
        |b| {
            b.add_word_boundary(&CodePointSet::from_code_point('w' as u32), true);
        },
        "(?:(?<=w)(?=w)|(?<!w)(?!w))"
    );

    test_build!(
        anchors,
        |b| {
            b.add_anchor(&Anchor::LineStart(CodePointSet::from_code_point('\n' as u32)));
            b.add_anchor(&Anchor::EndOrFinalNewline);
        },
        "(?:^|(?<=\\u{a}))(?:$|(?=\\u{a}$))"
    );

    test_build!(
        empty_class_is_dead,
        |b| {
            b.add_char_class(CodePointSet::empty());
            b.add_back_reference(vec![1, 2], true);
        },
        "[](?i:\\k<1,2>)"
    );

    #[test]
    fn quantifier_errors() {
        let mut b = AstBuilder::new();
        assert_eq!(
            b.add_quantifier(Quantifier::star()),
            Err(QuantifierError::NothingToRepeat)
        );
        b.add_anchor(&Anchor::Start);
        assert_eq!(
            b.add_quantifier(Quantifier::star()),
            Err(QuantifierError::NothingToRepeat)
        );
        b.add_code_point('x' as u32);
        b.add_quantifier(Quantifier::star()).unwrap();
        assert_eq!(
            b.add_quantifier(Quantifier::plus()),
            Err(QuantifierError::MultipleRepeat)
        );
    }

    #[test]
    fn unbalanced_groups() {
        let mut b = AstBuilder::new();
        assert_eq!(b.pop_group(), None);
        b.push_capture_group();
        b.push_look_around(LookAroundKind::Ahead, true);
        assert_eq!(b.open_capture_groups(), vec![1]);
        assert_eq!(b.finish().unwrap_err(), 2);
    }
}
