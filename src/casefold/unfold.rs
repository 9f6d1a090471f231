//! Case-insensitive matching of literal strings under multi-codepoint folds.
//!
//! A literal run is folded, every substring some codepoint folds to is located with the fold
//! trie, and the run is emitted as character classes plus alternations that either take such an
//! unfolding or skip it. The alternation nesting is bounded by [`MAX_UNFOLD_DEPTH`].

use super::{data, CaseFoldAlgorithm};
use crate::charset::{CodePointSet, Range};
use crate::error::{RegexError, Result};

pub const MAX_UNFOLD_DEPTH: usize = 8;

/// Receives the matcher for an unfolded string.
pub trait UnfoldSink {
    /// Matches one character out of `set`.
    fn class(&mut self, set: CodePointSet) -> Result<()>;
    /// Matches nothing.
    fn dead(&mut self) -> Result<()>;
    fn begin_alternation(&mut self) -> Result<()>;
    fn next_alternative(&mut self) -> Result<()>;
    fn end_alternation(&mut self) -> Result<()>;
}

#[derive(Debug, Clone)]
struct Unfolding {
    start: usize,
    end: usize,
    set: CodePointSet,
}

struct Unfolder<'a, S: UnfoldSink> {
    sink: &'a mut S,
    /// One class per folded position.
    singles: Vec<CodePointSet>,
    /// Sorted by start, then by length.
    multis: Vec<Unfolding>,
    skipped: Vec<bool>,
    drop_ascii_on_start: bool,
}

fn ascii() -> CodePointSet {
    CodePointSet::from_range(0, 0x7F)
}

impl<'a, S: UnfoldSink> Unfolder<'a, S> {
    fn filter(&self, position: usize, set: &CodePointSet) -> CodePointSet {
        if self.drop_ascii_on_start && position == 0 {
            set.subtract(&ascii())
        } else {
            set.clone()
        }
    }

    /// Emits the class for one position. Returns false when the branch became dead.
    fn single(&mut self, position: usize) -> Result<bool> {
        let set = self.filter(position, &self.singles[position]);
        if set.is_empty() {
            self.sink.dead()?;
            return Ok(false);
        }
        self.sink.class(set)?;
        Ok(true)
    }

    fn singles(&mut self, from: usize, to: usize) -> Result<bool> {
        for i in from..to {
            if !self.single(i)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn emit(&mut self, position: usize, end: usize, depth: usize) -> Result<()> {
        let next = (0..self.multis.len()).find(|&k| {
            let u = &self.multis[k];
            !self.skipped[k] && u.start >= position && u.end <= end
        });
        let k = match next {
            None => {
                self.singles(position, end)?;
                return Ok(());
            }
            Some(k) => k,
        };
        let u = self.multis[k].clone();
        if !self.singles(position, u.start)? {
            return Ok(());
        }
        if depth >= MAX_UNFOLD_DEPTH {
            return Err(RegexError::unsupported(
                "case insensitive literal with too many multi-codepoint foldings",
            ));
        }
        self.sink.begin_alternation()?;
        let taken = self.filter(u.start, &u.set);
        if taken.is_empty() {
            self.sink.dead()?;
        } else {
            self.sink.class(taken)?;
            self.emit(u.end, end, depth + 1)?;
        }
        self.sink.next_alternative()?;
        self.skipped[k] = true;
        self.emit(u.start, end, depth + 1)?;
        self.skipped[k] = false;
        self.sink.end_alternation()
    }
}

/// Emits a matcher for `code_points` under case-insensitive comparison with `algorithm`.
///
/// Codepoints outside `encoding` are matched literally and never take part in an unfolding. With
/// `drop_ascii_on_start`, ASCII alternatives at the first position are left out.
pub fn unfold_string<S: UnfoldSink>(
    code_points: &[u32],
    algorithm: CaseFoldAlgorithm,
    encoding: Range,
    drop_ascii_on_start: bool,
    sink: &mut S,
) -> Result<()> {
    let table = data::table(algorithm);
    let full = CodePointSet::from_range(encoding.lo, encoding.hi);

    let mut folded = vec![];
    let mut fixed = vec![];
    for &c in code_points {
        if encoding.contains(c) {
            for f in table.full_fold(c) {
                folded.push(f);
                fixed.push(false);
            }
        } else {
            folded.push(c);
            fixed.push(true);
        }
    }

    let mut singles = Vec::with_capacity(folded.len());
    let mut multis = vec![];
    for start in 0..folded.len() {
        let mut single = CodePointSet::from_code_point(folded[start]);
        if !fixed[start] {
            let stop = (start..folded.len())
                .find(|&i| fixed[i])
                .unwrap_or(folded.len());
            for (len, members) in table.trie.prefixes(&folded[start..stop]) {
                let set = CodePointSet::from_code_points(members.iter().copied()).intersect(&full);
                if set.is_empty() {
                    continue;
                }
                if len == 1 {
                    single = set;
                } else {
                    multis.push(Unfolding {
                        start,
                        end: start + len,
                        set,
                    });
                }
            }
        }
        singles.push(single);
    }

    let mut unfolder = Unfolder {
        sink,
        singles,
        skipped: vec![false; multis.len()],
        multis,
        drop_ascii_on_start,
    };

    let mut segment_start = 0;
    let mut reach = 0;
    for i in 0..folded.len() {
        for u in unfolder.multis.iter().filter(|u| u.start == i) {
            reach = reach.max(u.end);
        }
        if reach <= i + 1 {
            unfolder.emit(segment_start, i + 1, 0)?;
            segment_start = i + 1;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Renders the emitted matcher as pattern text.
    #[derive(Default)]
    struct TextSink(String);

    impl UnfoldSink for TextSink {
        fn class(&mut self, set: CodePointSet) -> Result<()> {
            self.0.push_str(&set.to_pattern_string());
            Ok(())
        }
        fn dead(&mut self) -> Result<()> {
            self.0.push_str("[]");
            Ok(())
        }
        fn begin_alternation(&mut self) -> Result<()> {
            self.0.push_str("(?:");
            Ok(())
        }
        fn next_alternative(&mut self) -> Result<()> {
            self.0.push('|');
            Ok(())
        }
        fn end_alternation(&mut self) -> Result<()> {
            self.0.push(')');
            Ok(())
        }
    }

    fn unfold(s: &str, encoding: Range, drop_ascii: bool) -> Result<String> {
        let code_points: Vec<u32> = s.chars().map(u32::from).collect();
        let mut sink = TextSink::default();
        unfold_string(&code_points, CaseFoldAlgorithm::Ruby, encoding, drop_ascii, &mut sink)?;
        Ok(sink.0)
    }

    const UNICODE: Range = Range { lo: 0, hi: 0x10FFFF };
    const ASCII: Range = Range { lo: 0, hi: 0x7F };

    macro_rules! test_unfold {
        ($name:ident, $input:expr, $encoding:expr, $drop:expr, $expected:expr) => {
            #[test]
            fn $name() {
                assert_eq!(unfold($input, $encoding, $drop).unwrap(), $expected);
            }
        };
    }

    test_unfold!(plain_letters, "ab", UNICODE, false, "[Aa][Bb]");
    test_unfold!(digits_untouched, "1", UNICODE, false, "1");
    test_unfold!(
        sharp_s,
        "ß",
        UNICODE,
        false,
        "(?:[\\u{df}\\u{1e9e}]|[Ss\\u{17f}][Ss\\u{17f}])"
    );
    test_unfold!(
        double_s,
        "ss",
        UNICODE,
        false,
        "(?:[\\u{df}\\u{1e9e}]|[Ss\\u{17f}][Ss\\u{17f}])"
    );
    test_unfold!(sharp_s_in_ascii, "ß", ASCII, false, "\\u{df}");
    test_unfold!(dead_first_segment, "ab", ASCII, true, "[][Bb]");

    #[test]
    fn dropping_ascii_on_start() {
        assert_eq!(
            unfold("ss", UNICODE, true).unwrap(),
            "(?:[\\u{df}\\u{1e9e}]|\\u{17f}[Ss\\u{17f}])"
        );
        assert_eq!(unfold("a", UNICODE, true).unwrap(), "[]");
    }

    #[test]
    fn depth_is_bounded() {
        let err = unfold(&"s".repeat(40), UNICODE, false).unwrap_err();
        assert!(err.is_unsupported());
    }
}
