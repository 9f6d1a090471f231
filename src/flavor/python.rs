//! Python's `re` module, for `str` and `bytes` patterns.

use crate::ast::builder::Anchor;
use crate::casefold::CaseFoldAlgorithm;
use crate::charset::{CodePointSet, MAX_CODE_POINT};
use crate::flags::{PythonFlags, PythonFlagsError, RegexFlags};
use crate::lexer::{Dialect, ErrorKind, InlineFlagSyntax, NamedGroupSyntax};
use crate::unicode::{ascii_digits, ascii_space, ascii_word, newline, PropertyLookup};

/// Repetition counts at or above this are rejected.
const MAXREPEAT: u64 = 0xFFFF_FFFF;

#[derive(Debug, Clone, Copy)]
pub struct PythonDialect {
    str_pattern: bool,
}

impl Default for PythonDialect {
    fn default() -> Self {
        PythonDialect { str_pattern: true }
    }
}

impl PythonDialect {
    /// `str_pattern` is false for `bytes` patterns.
    pub fn new(str_pattern: bool) -> Self {
        PythonDialect { str_pattern }
    }

    fn full() -> CodePointSet {
        CodePointSet::from_range(0, MAX_CODE_POINT)
    }

    fn digits(flags: PythonFlags, properties: &dyn PropertyLookup) -> CodePointSet {
        if flags.unicode() {
            properties.get_property("Nd").unwrap_or_else(ascii_digits)
        } else {
            ascii_digits()
        }
    }

    /// `str.isspace()` also counts the information separators U+001C to U+001F.
    fn space(flags: PythonFlags, properties: &dyn PropertyLookup) -> CodePointSet {
        if flags.unicode() {
            properties
                .get_property("White_Space")
                .unwrap_or_else(ascii_space)
                .union(&CodePointSet::from_range(0x1C, 0x1F))
        } else {
            ascii_space()
        }
    }

    fn word(flags: PythonFlags, properties: &dyn PropertyLookup) -> CodePointSet {
        if flags.unicode() {
            properties
                .get_property("Alnum")
                .map(|s| s.union(&CodePointSet::from_code_point('_' as u32)))
                .unwrap_or_else(ascii_word)
        } else {
            ascii_word()
        }
    }
}

impl Dialect for PythonDialect {
    type Flags = PythonFlags;

    fn name(&self) -> &'static str {
        "Python"
    }

    fn parse_flags(&self, flags: &str) -> Result<PythonFlags, String> {
        PythonFlags::parse(flags)?
            .fixup(self.str_pattern)
            .map_err(|e| {
                match e {
                    PythonFlagsError::IncompatibleTypeFlags => {
                        "ASCII, LOCALE and UNICODE flags are incompatible"
                    }
                    PythonFlagsError::LocaleWithStr => "cannot use LOCALE flag with a str pattern",
                    PythonFlagsError::UnicodeWithBytes => {
                        "cannot use UNICODE flag with a bytes pattern"
                    }
                }
                .to_string()
            })
    }

    fn message(&self, kind: &ErrorKind) -> String {
        use ErrorKind::*;
        match kind {
            UnterminatedGroup => "missing ), unterminated subpattern".to_string(),
            UnmatchedParenthesis => "unbalanced parenthesis".to_string(),
            InvalidGroup => "unknown extension".to_string(),
            UnknownExtension(text) => format!("unknown extension {}", text),
            MissingGroupName => "missing group name".to_string(),
            InvalidGroupName(name) => format!("bad character in group name '{}'", name),
            DuplicateGroupName {
                name,
                group,
                previous,
            } => format!(
                "redefinition of group name '{}' as group {}; was group {}",
                name, group, previous
            ),
            UnterminatedName => "missing >, unterminated name".to_string(),
            UnknownGroupName(name) => format!("unknown group name '{}'", name),
            InvalidNamedReference => "missing group name".to_string(),
            InvalidGroupReference(n) => format!("invalid group reference {}", n),
            LookbehindGroupReference => {
                "cannot refer to group defined in the same lookbehind subpattern".to_string()
            }
            UnterminatedComment => "missing ), unterminated comment".to_string(),
            UnknownFlag(_) => "unknown flag".to_string(),
            MissingFlag => "missing flag".to_string(),
            MissingFlagTerminator => "missing -, : or )".to_string(),
            MissingColon => "missing :".to_string(),
            GlobalFlagsNotAtStart => "global flags not at the start of the expression".to_string(),
            CannotTurnOffTypeFlag => {
                "bad inline flag: cannot turn off flags 'a', 'u' and 'L'".to_string()
            }
            FlagTurnedOnAndOff | RepeatedFlag => {
                "bad inline flag: flag turned on and off".to_string()
            }
            IncompatibleTypeFlags => {
                "bad inline flag: flags 'a', 'u' and 'L' are incompatible".to_string()
            }
            LocaleFlagWithStr => {
                "bad inline flag: cannot use 'L' flag with a str pattern".to_string()
            }
            UnicodeFlagWithBytes => {
                "bad inline flag: cannot use 'u' flag with a bytes pattern".to_string()
            }
            NothingToRepeat | LoneQuantifierBrackets | IncompleteQuantifier => {
                "nothing to repeat".to_string()
            }
            MultipleRepeat => "multiple repeat".to_string(),
            QuantifierOutOfOrder => "min repeat greater than max repeat".to_string(),
            QuantifierTooLarge => "the repetition number is too large".to_string(),
            UnterminatedClass => "unterminated character set".to_string(),
            RangeOutOfOrder(text) => format!("bad character range {}", text),
            InvalidClassEscape | InvalidPosixClass | InvalidEquivalenceClass
            | InvalidCollationElement => "bad character range".to_string(),
            TrailingBackslash => "bad escape (end of pattern)".to_string(),
            BadEscape(text) => format!("bad escape {}", text),
            IncompleteEscape(text) => format!("incomplete escape {}", text),
            InvalidUnicodeEscape | InvalidDecimalEscape | InvalidPropertyName => {
                "bad escape".to_string()
            }
            OctalOutOfRange(text) => format!("octal escape value {} outside of range 0-0o377", text),
            UnterminatedCharacterName => "missing }, unterminated name".to_string(),
        }
    }

    fn fold_algorithm(&self, flags: PythonFlags) -> Option<CaseFoldAlgorithm> {
        if flags.contains(PythonFlags::LOCALE) {
            None
        } else if flags.unicode() {
            Some(CaseFoldAlgorithm::PythonUnicode)
        } else {
            Some(CaseFoldAlgorithm::PythonAscii)
        }
    }

    fn inline_flag(&self, c: char) -> Option<PythonFlags> {
        PythonFlags::from_char(c)
    }

    /// A type flag replaces the one in effect.
    fn add_flags(&self, flags: PythonFlags, added: PythonFlags) -> PythonFlags {
        if added.type_flag().is_empty() {
            flags.add(added)
        } else {
            (flags - PythonFlags::TYPE_FLAGS).add(added)
        }
    }

    fn remove_flags(&self, flags: PythonFlags, removed: PythonFlags) -> PythonFlags {
        flags.without(removed)
    }

    fn is_type_flag(&self, c: char) -> bool {
        PythonFlags::is_type_flag(c)
    }

    fn check_inline_flags(&self, flags: PythonFlags) -> Result<(), ErrorKind> {
        if self.str_pattern && flags.contains(PythonFlags::LOCALE) {
            return Err(ErrorKind::LocaleFlagWithStr);
        }
        if !self.str_pattern && flags.contains(PythonFlags::UNICODE) {
            return Err(ErrorKind::UnicodeFlagWithBytes);
        }
        if flags.type_flag().bits().count_ones() > 1 {
            return Err(ErrorKind::IncompatibleTypeFlags);
        }
        Ok(())
    }

    fn octal_escapes(&self, _flags: PythonFlags) -> bool {
        true
    }
    fn three_digit_octal(&self) -> bool {
        true
    }
    fn lower_bound_optional(&self) -> bool {
        true
    }
    fn max_backreference_digits(&self) -> usize {
        2
    }
    fn named_group_syntax(&self) -> NamedGroupSyntax {
        NamedGroupSyntax::Python
    }
    fn inline_flag_syntax(&self) -> InlineFlagSyntax {
        InlineFlagSyntax::Python
    }
    fn comment_groups(&self) -> bool {
        true
    }
    fn possessive_quantifiers(&self) -> bool {
        true
    }
    fn atomic_groups(&self) -> bool {
        true
    }
    fn conditional_groups(&self) -> bool {
        true
    }
    fn leading_bracket_literal(&self) -> bool {
        true
    }
    fn short_unicode_escapes(&self, _flags: PythonFlags) -> bool {
        self.str_pattern
    }
    fn long_unicode_escapes(&self, _flags: PythonFlags) -> bool {
        self.str_pattern
    }
    fn named_char_escapes(&self) -> bool {
        self.str_pattern
    }
    fn lookbehind_group_references(&self) -> bool {
        false
    }

    fn char_escape(&self, c: char, _flags: PythonFlags) -> Option<u32> {
        match c {
            'a' => Some(0x07),
            'f' => Some(0x0C),
            'n' => Some(0x0A),
            'r' => Some(0x0D),
            't' => Some(0x09),
            'v' => Some(0x0B),
            _ => None,
        }
    }

    fn shorthand_class(
        &self,
        c: char,
        flags: PythonFlags,
        properties: &dyn PropertyLookup,
    ) -> Option<CodePointSet> {
        let full = Self::full();
        Some(match c {
            'd' => Self::digits(flags, properties),
            'D' => full.subtract(&Self::digits(flags, properties)),
            's' => Self::space(flags, properties),
            'S' => full.subtract(&Self::space(flags, properties)),
            'w' => Self::word(flags, properties),
            'W' => full.subtract(&Self::word(flags, properties)),
            _ => return None,
        })
    }

    fn word_set(&self, flags: PythonFlags, properties: &dyn PropertyLookup) -> CodePointSet {
        Self::word(flags, properties)
    }

    fn dot_set(&self, flags: PythonFlags) -> CodePointSet {
        if flags.dot_all() {
            Self::full()
        } else {
            Self::full().subtract(&newline())
        }
    }

    fn caret(&self, flags: PythonFlags) -> Anchor {
        if flags.multiline() {
            Anchor::LineStart(newline())
        } else {
            Anchor::Start
        }
    }

    fn dollar(&self, flags: PythonFlags) -> Anchor {
        if flags.multiline() {
            Anchor::LineEnd(newline())
        } else {
            Anchor::EndOrFinalNewline
        }
    }

    fn input_anchor(&self, c: char) -> Option<Anchor> {
        match c {
            'A' => Some(Anchor::Start),
            'Z' => Some(Anchor::End),
            _ => None,
        }
    }

    fn unknown_escape(&self, c: char, _flags: PythonFlags, _in_class: bool) -> Result<u32, ErrorKind> {
        if c.is_ascii_alphanumeric() {
            Err(ErrorKind::BadEscape(format!("\\{}", c)))
        } else {
            Ok(c as u32)
        }
    }

    fn class_escape_in_range(&self, text: &str, _flags: PythonFlags) -> Result<(), ErrorKind> {
        Err(ErrorKind::RangeOutOfOrder(text.to_string()))
    }

    /// Counts are compared as unsigned 32-bit values and stored with the top bit cleared, the
    /// way `sre` reads them.
    fn quantifier_bounds(
        &self,
        lower: u64,
        upper: Option<u64>,
    ) -> Result<(u32, Option<u32>), ErrorKind> {
        if lower >= MAXREPEAT || upper.map_or(false, |u| u >= MAXREPEAT) {
            return Err(ErrorKind::QuantifierTooLarge);
        }
        if let Some(upper) = upper {
            if upper < lower {
                return Err(ErrorKind::QuantifierOutOfOrder);
            }
        }
        let store = |v: u64| (v as u32) & 0x7FFF_FFFF;
        Ok((store(lower), upper.map(store)))
    }
}
