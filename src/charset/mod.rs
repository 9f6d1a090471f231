//! Sets of codepoints stored as sorted, disjoint, non-adjacent inclusive ranges.
//!
//! Two sets holding the same codepoints always have the same ranges, so `==` compares contents.
//! Every operation here is a single merge-like sweep over the two range lists.

mod accumulator;

pub use accumulator::{AccumulatorPool, CodePointSetAccumulator};

use std::cmp::{max, min};
use std::fmt;

pub const MAX_CODE_POINT: u32 = 0x10FFFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Range {
    pub lo: u32,
    pub hi: u32,
}

impl Range {
    pub fn new(lo: u32, hi: u32) -> Self {
        debug_assert!(lo <= hi, "inverted range {lo:#x}-{hi:#x}");
        Range { lo, hi }
    }

    pub fn single(c: u32) -> Self {
        Range { lo: c, hi: c }
    }

    pub fn contains(&self, c: u32) -> bool {
        self.lo <= c && c <= self.hi
    }

    pub fn size(&self) -> u64 {
        (self.hi - self.lo) as u64 + 1
    }

    fn touches(&self, other: &Range) -> bool {
        self.lo <= other.hi.saturating_add(1) && other.lo <= self.hi.saturating_add(1)
    }
}

/// The three parts of two sets, computed in one sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntersectAndSubtract {
    pub intersection: CodePointSet,
    /// Left minus right.
    pub left_only: CodePointSet,
    /// Right minus left.
    pub right_only: CodePointSet,
}

#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct CodePointSet {
    ranges: Vec<Range>,
}

/// Pushes a range onto a list being built in ascending order, merging with the last range when
/// they touch.
fn push_merged(ranges: &mut Vec<Range>, r: Range) {
    if let Some(last) = ranges.last_mut() {
        if last.touches(&r) {
            last.lo = min(last.lo, r.lo);
            last.hi = max(last.hi, r.hi);
            return;
        }
    }
    ranges.push(r);
}

impl CodePointSet {
    pub fn empty() -> Self {
        CodePointSet { ranges: vec![] }
    }

    pub fn from_code_point(c: u32) -> Self {
        CodePointSet {
            ranges: vec![Range::single(c)],
        }
    }

    pub fn from_range(lo: u32, hi: u32) -> Self {
        CodePointSet {
            ranges: vec![Range::new(lo, hi)],
        }
    }

    /// Builds a set from ranges in any order; overlapping and adjacent ranges are merged.
    pub fn from_ranges<I: IntoIterator<Item = Range>>(ranges: I) -> Self {
        let mut ranges: Vec<Range> = ranges.into_iter().collect();
        ranges.sort_unstable();
        let mut out = Vec::with_capacity(ranges.len());
        for r in ranges {
            push_merged(&mut out, r);
        }
        CodePointSet { ranges: out }
    }

    pub fn from_code_points<I: IntoIterator<Item = u32>>(code_points: I) -> Self {
        Self::from_ranges(code_points.into_iter().map(Range::single))
    }

    /// Wraps ranges that are already canonical.
    pub(crate) fn from_canonical(ranges: Vec<Range>) -> Self {
        debug_assert!(ranges.windows(2).all(|w| w[0].hi.saturating_add(1) < w[1].lo));
        CodePointSet { ranges }
    }

    pub fn ranges(&self) -> &[Range] {
        &self.ranges
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn contains(&self, c: u32) -> bool {
        self.ranges
            .binary_search_by(|r| {
                if r.hi < c {
                    std::cmp::Ordering::Less
                } else if r.lo > c {
                    std::cmp::Ordering::Greater
                } else {
                    std::cmp::Ordering::Equal
                }
            })
            .is_ok()
    }

    /// Number of codepoints in the set.
    pub fn size(&self) -> u64 {
        self.ranges.iter().map(Range::size).sum()
    }

    pub fn min(&self) -> Option<u32> {
        self.ranges.first().map(|r| r.lo)
    }

    pub fn max(&self) -> Option<u32> {
        self.ranges.last().map(|r| r.hi)
    }

    /// The only codepoint in the set, if it holds exactly one.
    pub fn single_code_point(&self) -> Option<u32> {
        match self.ranges.as_slice() {
            [r] if r.lo == r.hi => Some(r.lo),
            _ => None,
        }
    }

    pub fn matches_single_char(&self) -> bool {
        self.single_code_point().is_some()
    }

    pub fn matches_everything(&self, full: Range) -> bool {
        matches!(self.ranges.as_slice(), [r] if r.lo <= full.lo && r.hi >= full.hi)
    }

    pub fn is_ascii_only(&self) -> bool {
        self.max().map_or(true, |m| m < 0x80)
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.ranges.iter().flat_map(|r| r.lo..=r.hi)
    }

    pub fn union(&self, other: &CodePointSet) -> CodePointSet {
        let (a, b) = (&self.ranges, &other.ranges);
        let mut out = Vec::with_capacity(a.len() + b.len());
        let (mut i, mut j) = (0, 0);
        while i < a.len() || j < b.len() {
            let next = if j >= b.len() || (i < a.len() && a[i].lo <= b[j].lo) {
                i += 1;
                a[i - 1]
            } else {
                j += 1;
                b[j - 1]
            };
            push_merged(&mut out, next);
        }
        CodePointSet { ranges: out }
    }

    pub fn intersect(&self, other: &CodePointSet) -> CodePointSet {
        let (a, b) = (&self.ranges, &other.ranges);
        let mut out = vec![];
        let (mut i, mut j) = (0, 0);
        while i < a.len() && j < b.len() {
            let lo = max(a[i].lo, b[j].lo);
            let hi = min(a[i].hi, b[j].hi);
            if lo <= hi {
                out.push(Range::new(lo, hi));
            }
            if a[i].hi < b[j].hi {
                i += 1;
            } else {
                j += 1;
            }
        }
        CodePointSet { ranges: out }
    }

    pub fn subtract(&self, other: &CodePointSet) -> CodePointSet {
        self.intersect_and_subtract(other).left_only
    }

    /// Complement relative to `full`; codepoints outside `full` are dropped.
    pub fn invert(&self, full: Range) -> CodePointSet {
        let mut out = vec![];
        let mut next = full.lo;
        let mut exhausted = false;
        for r in &self.ranges {
            if r.hi < full.lo {
                continue;
            }
            if r.lo > full.hi {
                break;
            }
            if r.lo > next {
                out.push(Range::new(next, r.lo - 1));
            }
            if r.hi >= full.hi {
                exhausted = true;
                break;
            }
            next = max(next, r.hi + 1);
        }
        if !exhausted && next <= full.hi {
            out.push(Range::new(next, full.hi));
        }
        CodePointSet { ranges: out }
    }

    pub fn intersect_and_subtract(&self, other: &CodePointSet) -> IntersectAndSubtract {
        let (a, b) = (&self.ranges, &other.ranges);
        let mut inter = vec![];
        let mut left = vec![];
        let mut right = vec![];
        let (mut i, mut j) = (0, 0);
        let mut cur_a = a.first().copied();
        let mut cur_b = b.first().copied();
        loop {
            match (cur_a, cur_b) {
                (None, None) => break,
                (Some(ra), None) => {
                    push_merged(&mut left, ra);
                    i += 1;
                    cur_a = a.get(i).copied();
                }
                (None, Some(rb)) => {
                    push_merged(&mut right, rb);
                    j += 1;
                    cur_b = b.get(j).copied();
                }
                (Some(mut ra), Some(mut rb)) => {
                    if ra.hi < rb.lo {
                        push_merged(&mut left, ra);
                        i += 1;
                        cur_a = a.get(i).copied();
                        continue;
                    }
                    if rb.hi < ra.lo {
                        push_merged(&mut right, rb);
                        j += 1;
                        cur_b = b.get(j).copied();
                        continue;
                    }
                    if ra.lo < rb.lo {
                        push_merged(&mut left, Range::new(ra.lo, rb.lo - 1));
                        ra.lo = rb.lo;
                    } else if rb.lo < ra.lo {
                        push_merged(&mut right, Range::new(rb.lo, ra.lo - 1));
                        rb.lo = ra.lo;
                    }
                    let hi = min(ra.hi, rb.hi);
                    push_merged(&mut inter, Range::new(ra.lo, hi));
                    if ra.hi == hi {
                        i += 1;
                        cur_a = a.get(i).copied();
                    } else {
                        ra.lo = hi + 1;
                        cur_a = Some(ra);
                    }
                    if rb.hi == hi {
                        j += 1;
                        cur_b = b.get(j).copied();
                    } else {
                        rb.lo = hi + 1;
                        cur_b = Some(rb);
                    }
                }
            }
        }
        IntersectAndSubtract {
            intersection: CodePointSet { ranges: inter },
            left_only: CodePointSet { ranges: left },
            right_only: CodePointSet { ranges: right },
        }
    }

    pub fn intersects(&self, other: &CodePointSet) -> bool {
        !self.intersect(other).is_empty()
    }

    pub fn is_subset_of(&self, other: &CodePointSet) -> bool {
        self.subtract(other).is_empty()
    }

    /// Restricts the set to the codepoints in `full`.
    pub fn clip(&self, full: Range) -> CodePointSet {
        self.intersect(&CodePointSet::from_range(full.lo, full.hi))
    }

    /// Renders the set in ECMAScript `u`-mode syntax: a bare (escaped) character for a single
    /// codepoint, otherwise a bracketed class.
    pub fn to_pattern_string(&self) -> String {
        let mut out = String::new();
        match self.single_code_point() {
            Some(c) => write_code_point(&mut out, c, false),
            None => write_class(&mut out, self),
        }
        out
    }
}

const SYNTAX_CHARS: &str = "^$\\.*+?()[]{}|/";
const CLASS_SYNTAX_CHARS: &str = "\\]-^[";

/// Writes one codepoint in a form both our printer and the ECMAScript lexer read back the same.
pub(crate) fn write_code_point(out: &mut String, c: u32, in_class: bool) {
    let ch = char::from_u32(c).filter(|ch| ch.is_ascii_graphic() || *ch == ' ');
    match ch {
        Some(ch) => {
            let special = if in_class {
                CLASS_SYNTAX_CHARS
            } else {
                SYNTAX_CHARS
            };
            if special.contains(ch) {
                out.push('\\');
            }
            out.push(ch);
        }
        None => out.push_str(&format!("\\u{{{:x}}}", c)),
    }
}

pub(crate) fn write_class(out: &mut String, set: &CodePointSet) {
    out.push('[');
    for r in set.ranges() {
        write_code_point(out, r.lo, true);
        if r.hi > r.lo {
            if r.hi > r.lo + 1 {
                out.push('-');
            }
            write_code_point(out, r.hi, true);
        }
    }
    out.push(']');
}

impl fmt::Debug for CodePointSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = String::new();
        write_class(&mut s, self);
        write!(f, "{}", s)
    }
}

impl fmt::Display for CodePointSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_pattern_string())
    }
}

impl FromIterator<Range> for CodePointSet {
    fn from_iter<T: IntoIterator<Item = Range>>(iter: T) -> Self {
        CodePointSet::from_ranges(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    fn set(ranges: &[(u32, u32)]) -> CodePointSet {
        CodePointSet::from_ranges(ranges.iter().map(|&(lo, hi)| Range::new(lo, hi)))
    }

    fn is_canonical(s: &CodePointSet) -> bool {
        s.ranges().iter().all(|r| r.lo <= r.hi)
            && s.ranges().windows(2).all(|w| w[0].hi + 1 < w[1].lo)
    }

    const FULL: Range = Range { lo: 0, hi: 255 };

    #[test]
    fn canonicalizes_overlapping_and_adjacent() {
        let s = set(&[(10, 20), (5, 9), (15, 30), (40, 40), (41, 45)]);
        assert_eq!(s.ranges(), &[Range::new(5, 30), Range::new(40, 45)]);
    }

    #[test]
    fn union_intersect_subtract() {
        let a = set(&[(0, 10), (20, 30)]);
        let b = set(&[(5, 25)]);
        assert_eq!(a.union(&b), set(&[(0, 30)]));
        assert_eq!(a.intersect(&b), set(&[(5, 10), (20, 25)]));
        assert_eq!(a.subtract(&b), set(&[(0, 4), (26, 30)]));
        assert_eq!(b.subtract(&a), set(&[(11, 19)]));
    }

    #[test]
    fn invert_relative_to_encoding() {
        let a = set(&[(0x41, 0x5A)]);
        assert_eq!(
            a.invert(Range::new(0, 0x7F)),
            set(&[(0, 0x40), (0x5B, 0x7F)])
        );
        assert_eq!(CodePointSet::empty().invert(FULL), set(&[(0, 255)]));
        assert_eq!(set(&[(0, 0x10FFFF)]).invert(FULL), CodePointSet::empty());
        assert_eq!(set(&[(200, 300)]).invert(FULL), set(&[(0, 199)]));
    }

    #[test]
    fn intersect_and_subtract_splits() {
        let a = set(&[(b's' as u32, b's' as u32), (0xDF, 0xDF)]);
        let b = set(&[(b'S' as u32, b'S' as u32), (b's' as u32, b's' as u32)]);
        let parts = a.intersect_and_subtract(&b);
        assert_eq!(parts.intersection, CodePointSet::from_code_point('s' as u32));
        assert_eq!(parts.left_only, CodePointSet::from_code_point(0xDF));
        assert_eq!(parts.right_only, CodePointSet::from_code_point('S' as u32));
    }

    #[test]
    fn single_char_queries() {
        assert_eq!(set(&[(7, 7)]).single_code_point(), Some(7));
        assert!(!set(&[(7, 8)]).matches_single_char());
        assert!(set(&[(0, 255)]).matches_everything(FULL));
        assert!(set(&[(3, 9)]).contains(9));
        assert!(!set(&[(3, 9), (20, 22)]).contains(15));
        assert_eq!(set(&[(3, 9), (20, 22)]).size(), 10);
    }

    #[test]
    fn pattern_strings() {
        assert_eq!(CodePointSet::from_code_point('a' as u32).to_pattern_string(), "a");
        assert_eq!(CodePointSet::from_code_point('.' as u32).to_pattern_string(), "\\.");
        assert_eq!(set(&[(0x61, 0x7A), (0x2D, 0x2D)]).to_pattern_string(), "[\\-a-z]");
        assert_eq!(set(&[(0x61, 0x62)]).to_pattern_string(), "[ab]");
        assert_eq!(CodePointSet::from_code_point(0xDF).to_pattern_string(), "\\u{df}");
        assert_eq!(CodePointSet::empty().to_pattern_string(), "[]");
    }

    fn arb_set() -> impl Strategy<Value = CodePointSet> {
        proptest::collection::vec((0u32..256, 0u32..16), 0..8).prop_map(|v| {
            CodePointSet::from_ranges(
                v.into_iter()
                    .map(|(lo, len)| Range::new(lo, (lo + len).min(255))),
            )
        })
    }

    fn model(s: &CodePointSet) -> BTreeSet<u32> {
        s.iter().collect()
    }

    proptest! {
        #[test]
        fn union_commutes(a in arb_set(), b in arb_set()) {
            prop_assert_eq!(a.union(&b), b.union(&a));
        }

        #[test]
        fn intersect_with_inverse_is_empty(a in arb_set()) {
            prop_assert!(a.intersect(&a.invert(FULL)).is_empty());
        }

        #[test]
        fn subtract_self_is_empty(a in arb_set()) {
            prop_assert!(a.subtract(&a).is_empty());
        }

        #[test]
        fn operations_stay_canonical(a in arb_set(), b in arb_set()) {
            prop_assert!(is_canonical(&a.union(&b)));
            prop_assert!(is_canonical(&a.intersect(&b)));
            prop_assert!(is_canonical(&a.subtract(&b)));
            prop_assert!(is_canonical(&a.invert(FULL)));
            let parts = a.intersect_and_subtract(&b);
            prop_assert!(is_canonical(&parts.intersection));
            prop_assert!(is_canonical(&parts.left_only));
            prop_assert!(is_canonical(&parts.right_only));
        }

        #[test]
        fn agrees_with_btreeset(a in arb_set(), b in arb_set()) {
            let (ma, mb) = (model(&a), model(&b));
            prop_assert_eq!(model(&a.union(&b)), ma.union(&mb).copied().collect::<BTreeSet<_>>());
            prop_assert_eq!(model(&a.intersect(&b)), ma.intersection(&mb).copied().collect::<BTreeSet<_>>());
            let parts = a.intersect_and_subtract(&b);
            prop_assert_eq!(model(&parts.left_only), ma.difference(&mb).copied().collect::<BTreeSet<_>>());
            prop_assert_eq!(model(&parts.right_only), mb.difference(&ma).copied().collect::<BTreeSet<_>>());
        }
    }
}
