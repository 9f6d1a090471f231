//! Oracle Database's `REGEXP_*` syntax: POSIX extended expressions with a few Perl additions.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use unicode_normalization::char::decompose_canonical;

use crate::ast::builder::Anchor;
use crate::casefold::CaseFoldAlgorithm;
use crate::charset::{CodePointSet, CodePointSetAccumulator, MAX_CODE_POINT};
use crate::flags::{OracleFlags, RegexFlags};
use crate::lexer::{Dialect, ErrorKind};
use crate::unicode::{ascii_digits, ascii_space, ascii_word, newline, posix_class, PropertyLookup};

#[derive(Debug, Clone, Copy, Default)]
pub struct OracleDialect;

impl OracleDialect {
    fn full() -> CodePointSet {
        CodePointSet::from_range(0, MAX_CODE_POINT)
    }

    fn named(
        name: &str,
        properties: &dyn PropertyLookup,
        fallback: fn() -> CodePointSet,
    ) -> CodePointSet {
        posix_class(name, true, properties).unwrap_or_else(fallback)
    }
}

/// The first character of the canonical decomposition of `c`.
fn base_character(c: char) -> char {
    let mut base = None;
    decompose_canonical(c, |d| {
        base.get_or_insert(d);
    });
    base.unwrap_or(c)
}

/// Every character that decomposes, keyed by its base character.
static DECOMPOSED: Lazy<HashMap<char, Vec<char>>> = Lazy::new(|| {
    let mut map: HashMap<char, Vec<char>> = HashMap::new();
    for c in (0..=MAX_CODE_POINT).filter_map(char::from_u32) {
        let base = base_character(c);
        if base != c {
            map.entry(base).or_default().push(c);
        }
    }
    map
});

impl Dialect for OracleDialect {
    type Flags = OracleFlags;

    fn name(&self) -> &'static str {
        "Oracle"
    }

    fn parse_flags(&self, flags: &str) -> Result<OracleFlags, String> {
        OracleFlags::parse(flags)
    }

    fn message(&self, kind: &ErrorKind) -> String {
        use ErrorKind::*;
        match kind {
            UnterminatedGroup | UnmatchedParenthesis => {
                "ORA-12725: unmatched parentheses in regular expression"
            }
            UnterminatedClass => "ORA-12726: unmatched bracket in regular expression",
            InvalidGroupReference(_) | LookbehindGroupReference | UnknownGroupName(_) => {
                "ORA-12727: invalid back reference in regular expression"
            }
            RangeOutOfOrder(_) | InvalidClassEscape => {
                "ORA-12728: invalid range in regular expression"
            }
            InvalidPosixClass => "ORA-12729: invalid character class in regular expression",
            InvalidEquivalenceClass => {
                "ORA-12730: invalid equivalence class in regular expression"
            }
            InvalidCollationElement => "ORA-12731: invalid collation class in regular expression",
            QuantifierOutOfOrder | QuantifierTooLarge | IncompleteQuantifier => {
                "ORA-12732: invalid interval value in regular expression"
            }
            _ => "ORA-12722: regular expression internal error",
        }
        .to_string()
    }

    fn fold_algorithm(&self, _flags: OracleFlags) -> Option<CaseFoldAlgorithm> {
        Some(CaseFoldAlgorithm::OracleDb)
    }

    fn verbose_comments(&self) -> bool {
        false
    }
    fn posix_classes(&self) -> bool {
        true
    }
    fn max_backreference_digits(&self) -> usize {
        1
    }
    fn lookbehinds(&self) -> bool {
        false
    }
    fn lookaheads(&self) -> bool {
        false
    }
    fn non_capturing_groups(&self) -> bool {
        false
    }
    fn lone_quantifier_literal(&self) -> bool {
        true
    }
    fn merge_double_quantifiers(&self) -> bool {
        true
    }
    fn escapes_in_classes(&self) -> bool {
        false
    }
    fn leading_bracket_literal(&self) -> bool {
        true
    }
    fn hex_escapes(&self) -> bool {
        false
    }
    fn word_boundaries(&self) -> bool {
        false
    }
    fn class_trie(&self) -> bool {
        true
    }

    /// Backslash followed by anything else is that character.
    fn char_escape(&self, _c: char, _flags: OracleFlags) -> Option<u32> {
        None
    }

    fn shorthand_class(
        &self,
        c: char,
        _flags: OracleFlags,
        properties: &dyn PropertyLookup,
    ) -> Option<CodePointSet> {
        let full = Self::full();
        let digit = || Self::named("digit", properties, ascii_digits);
        let space = || Self::named("space", properties, ascii_space);
        let word = || Self::named("word", properties, ascii_word);
        Some(match c {
            'd' => digit(),
            'D' => full.subtract(&digit()),
            's' => space(),
            'S' => full.subtract(&space()),
            'w' => word(),
            'W' => full.subtract(&word()),
            _ => return None,
        })
    }

    fn word_set(&self, _flags: OracleFlags, properties: &dyn PropertyLookup) -> CodePointSet {
        Self::named("word", properties, ascii_word)
    }

    fn dot_set(&self, flags: OracleFlags) -> CodePointSet {
        if flags.dot_all() {
            Self::full()
        } else {
            Self::full().subtract(&newline())
        }
    }

    fn caret(&self, flags: OracleFlags) -> Anchor {
        if flags.multiline() {
            Anchor::LineStart(newline())
        } else {
            Anchor::Start
        }
    }

    fn dollar(&self, flags: OracleFlags) -> Anchor {
        if flags.multiline() {
            Anchor::LineEnd(newline())
        } else {
            Anchor::EndOrFinalNewline
        }
    }

    fn input_anchor(&self, c: char) -> Option<Anchor> {
        match c {
            'A' => Some(Anchor::Start),
            'Z' => Some(Anchor::EndOrFinalNewline),
            'z' => Some(Anchor::End),
            _ => None,
        }
    }

    /// Every character whose canonical decomposition starts with the same base character.
    fn equivalence_class(&self, c: u32) -> Result<CodePointSet, ErrorKind> {
        let c = char::from_u32(c).ok_or(ErrorKind::InvalidEquivalenceClass)?;
        let base = base_character(c);
        let mut acc = CodePointSetAccumulator::new();
        acc.add_code_point(c as u32);
        acc.add_code_point(base as u32);
        for &member in DECOMPOSED.get(&base).into_iter().flatten() {
            acc.add_code_point(member as u32);
        }
        Ok(acc.to_code_point_set())
    }

    fn unknown_escape(&self, c: char, _flags: OracleFlags, _in_class: bool) -> Result<u32, ErrorKind> {
        Ok(c as u32)
    }

    fn class_escape_in_range(&self, text: &str, _flags: OracleFlags) -> Result<(), ErrorKind> {
        Err(ErrorKind::RangeOutOfOrder(text.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RegexError;
    use crate::parser::parse_tokens;
    use crate::ParserOptions;

    fn parse(pattern: &str, flags: &str) -> Result<String, RegexError> {
        parse_tokens(&OracleDialect, pattern, flags, &ParserOptions::default(), false)
            .map(|p| p.ast.to_string())
    }

    macro_rules! test_ora {
        ($name:ident, $pattern:expr, $flags:expr, $expected:expr) => {
            #[test]
            fn $name() {
                assert_eq!(parse($pattern, $flags).unwrap(), $expected);
            }
        };
    }

    macro_rules! test_ora_error {
        ($name:ident, $pattern:expr, $message:expr) => {
            #[test]
            fn $name() {
                match parse($pattern, "") {
                    Err(RegexError::Syntax(e)) => assert_eq!(e.message, $message),
                    other => panic!("expected a syntax error, got {:?}", other),
                }
            }
        };
    }

    test_ora!(backslash_literal_in_class, "[\\n]", "", "[\\\\n]");
    test_ora!(escaped_letter_is_literal, "\\n", "", "n");
    test_ora!(single_digit_references, "(a)\\10", "", "(a)(?:\\1)0");
    test_ora!(input_anchors, "\\Aa\\z", "", "^a$");
    test_ora!(final_newline_anchor, "a\\Z", "", "a(?:$|(?=\\u{a}$))");
    test_ora!(posix_class, "[[:xdigit:]]", "", "[0-9A-Fa-f]");
    test_ora!(question_mark_after_paren, "(?a)", "", "(\\?a)");
    test_ora!(ignore_case_overridden, "a", "ic", "a");
    test_ora_error!(unmatched_paren, "(a", "ORA-12725: unmatched parentheses in regular expression");
    test_ora_error!(unmatched_bracket, "[a", "ORA-12726: unmatched bracket in regular expression");
    test_ora_error!(bad_range, "[z-a]", "ORA-12728: invalid range in regular expression");
    test_ora_error!(
        bad_posix_class,
        "[[:alphabet:]]",
        "ORA-12729: invalid character class in regular expression"
    );
    test_ora_error!(
        bad_interval,
        "a{3,2}",
        "ORA-12732: invalid interval value in regular expression"
    );

    #[test]
    fn equivalence_class_contains_accented_letters() {
        let set = OracleDialect.equivalence_class('e' as u32).unwrap();
        for c in ['e', 'é', 'è', 'ê', 'ë'] {
            assert!(set.contains(c as u32), "{}", c);
        }
        assert!(!set.contains('E' as u32));
        assert!(!set.contains('a' as u32));
        assert_eq!(OracleDialect.equivalence_class('é' as u32).unwrap(), set);
    }

    #[test]
    fn equivalence_class_reaches_supplementary_planes() {
        let set = OracleDialect.equivalence_class(0x4E3D).unwrap();
        assert!(set.contains(0x2F800));
        let set = OracleDialect.equivalence_class(0x1D157).unwrap();
        assert!(set.contains(0x1D15E));
    }
}
