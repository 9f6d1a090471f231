//! ECMAScript regular expressions, the canonical dialect every other one is measured against.
//!
//! Without the `u` flag the Annex B grammar applies: legacy octal escapes, identity escapes of
//! any character and literal brackets.

use crate::ast::builder::Anchor;
use crate::ast::LookAroundKind;
use crate::casefold::{closure, CaseFoldAlgorithm};
use crate::charset::{CodePointSet, MAX_CODE_POINT};
use crate::flags::{EcmaScriptFlags, RegexFlags};
use crate::lexer::{Dialect, ErrorKind, InlineFlagSyntax, NamedGroupSyntax};
use crate::unicode::{
    ascii_digits, ascii_word, ecmascript_line_terminators, ecmascript_space, PropertyLookup,
};

/// Characters `\` may escape in `u` mode.
const SYNTAX_CHARACTERS: &str = "^$\\.*+?()[]{}|/";

#[derive(Debug, Clone, Copy, Default)]
pub struct EcmaScriptDialect {
    /// Accepts the extensions other dialects are rewritten into: duplicate group names and
    /// `\g<n>` calls.
    internal: bool,
}

impl EcmaScriptDialect {
    pub fn internal() -> Self {
        EcmaScriptDialect { internal: true }
    }

    fn full() -> CodePointSet {
        CodePointSet::from_range(0, MAX_CODE_POINT)
    }

    /// `\w`, extended by case closure under `u` and `i` as `WordCharacters` requires.
    fn word(flags: EcmaScriptFlags) -> CodePointSet {
        if flags.unicode() && flags.ignore_case() {
            closure(&ascii_word(), CaseFoldAlgorithm::EcmaScriptUnicode, |_, _| true)
        } else {
            ascii_word()
        }
    }
}

impl Dialect for EcmaScriptDialect {
    type Flags = EcmaScriptFlags;

    fn name(&self) -> &'static str {
        "ECMAScript"
    }

    fn parse_flags(&self, flags: &str) -> Result<EcmaScriptFlags, String> {
        EcmaScriptFlags::parse(flags)
    }

    fn message(&self, kind: &ErrorKind) -> String {
        use ErrorKind::*;
        match kind {
            UnterminatedGroup => "Unterminated group",
            UnmatchedParenthesis => "Unmatched ')'",
            MissingGroupName | InvalidGroupName(_) | UnterminatedName => {
                "Invalid capture group name"
            }
            DuplicateGroupName { .. } => "Duplicate capture group name",
            UnknownGroupName(_) => "Invalid named capture referenced",
            InvalidNamedReference => "Invalid named reference",
            InvalidGroupReference(_) | LookbehindGroupReference => "Invalid escape",
            RepeatedFlag => "Repeated flag",
            InvalidGroup
            | UnknownExtension(_)
            | UnterminatedComment
            | UnknownFlag(_)
            | MissingFlag
            | MissingFlagTerminator
            | MissingColon
            | GlobalFlagsNotAtStart
            | CannotTurnOffTypeFlag
            | FlagTurnedOnAndOff
            | IncompatibleTypeFlags
            | LocaleFlagWithStr
            | UnicodeFlagWithBytes => "Invalid group",
            NothingToRepeat | MultipleRepeat => "Nothing to repeat",
            QuantifierOutOfOrder => "numbers out of order in {} quantifier",
            QuantifierTooLarge | IncompleteQuantifier => "Incomplete quantifier",
            LoneQuantifierBrackets => "Lone quantifier brackets",
            UnterminatedClass => "Unterminated character class",
            RangeOutOfOrder(_) => "Range out of order in character class",
            InvalidClassEscape | InvalidPosixClass | InvalidEquivalenceClass
            | InvalidCollationElement => "Invalid class escape",
            TrailingBackslash => "\\ at end of pattern",
            BadEscape(_) | IncompleteEscape(_) | OctalOutOfRange(_) | UnterminatedCharacterName => {
                "Invalid escape"
            }
            InvalidUnicodeEscape => "Invalid Unicode escape",
            InvalidDecimalEscape => "Invalid decimal escape",
            InvalidPropertyName => "Invalid property name",
        }
        .to_string()
    }

    fn fold_algorithm(&self, flags: EcmaScriptFlags) -> Option<CaseFoldAlgorithm> {
        Some(if flags.unicode() {
            CaseFoldAlgorithm::EcmaScriptUnicode
        } else {
            CaseFoldAlgorithm::EcmaScriptNonUnicode
        })
    }

    fn inline_flag(&self, c: char) -> Option<EcmaScriptFlags> {
        EcmaScriptFlags::from_modifier(c)
    }
    fn add_flags(&self, flags: EcmaScriptFlags, added: EcmaScriptFlags) -> EcmaScriptFlags {
        flags.add(added)
    }
    fn remove_flags(&self, flags: EcmaScriptFlags, removed: EcmaScriptFlags) -> EcmaScriptFlags {
        flags.without(removed)
    }

    fn octal_escapes(&self, flags: EcmaScriptFlags) -> bool {
        !flags.unicode()
    }
    fn braces_literal_when_invalid(&self, flags: EcmaScriptFlags) -> bool {
        !flags.unicode()
    }
    fn backreferences_checked_at_lex(&self) -> bool {
        true
    }
    fn named_group_syntax(&self) -> NamedGroupSyntax {
        NamedGroupSyntax::Angle
    }
    fn inline_flag_syntax(&self) -> InlineFlagSyntax {
        InlineFlagSyntax::Modifiers
    }
    fn property_escapes(&self, flags: EcmaScriptFlags) -> bool {
        flags.unicode()
    }
    fn control_escapes(&self) -> bool {
        true
    }
    fn short_unicode_escapes(&self, _flags: EcmaScriptFlags) -> bool {
        true
    }
    fn braced_unicode_escapes(&self, flags: EcmaScriptFlags) -> bool {
        flags.unicode()
    }
    fn join_surrogate_escapes(&self, flags: EcmaScriptFlags) -> bool {
        flags.unicode()
    }
    fn split_astral_literals(&self, flags: EcmaScriptFlags) -> bool {
        !flags.unicode()
    }
    fn named_references(&self, flags: EcmaScriptFlags) -> bool {
        flags.unicode() || self.internal
    }
    fn subexpression_calls(&self) -> bool {
        self.internal
    }
    fn duplicate_group_names(&self) -> bool {
        self.internal
    }
    fn null_escape(&self) -> bool {
        true
    }
    fn valid_group_name(&self, name: &str) -> bool {
        let mut chars = name.chars();
        chars
            .next()
            .map_or(false, |c| c == '$' || c == '_' || c.is_alphabetic())
            && chars.all(|c| {
                c == '$' || c == '_' || c == '\u{200c}' || c == '\u{200d}' || c.is_alphanumeric()
            })
    }
    fn forward_references(&self) -> bool {
        true
    }
    fn open_group_reference_is_dead(&self) -> bool {
        false
    }
    fn quantifiable_look_around(&self, kind: LookAroundKind, flags: EcmaScriptFlags) -> bool {
        kind == LookAroundKind::Ahead && !flags.unicode()
    }

    fn shorthand_class(
        &self,
        c: char,
        flags: EcmaScriptFlags,
        _properties: &dyn PropertyLookup,
    ) -> Option<CodePointSet> {
        let full = Self::full();
        Some(match c {
            'd' => ascii_digits(),
            'D' => full.subtract(&ascii_digits()),
            's' => ecmascript_space(),
            'S' => full.subtract(&ecmascript_space()),
            'w' => Self::word(flags),
            'W' => full.subtract(&Self::word(flags)),
            _ => return None,
        })
    }

    fn word_set(&self, flags: EcmaScriptFlags, _properties: &dyn PropertyLookup) -> CodePointSet {
        Self::word(flags)
    }

    fn dot_set(&self, flags: EcmaScriptFlags) -> CodePointSet {
        if flags.dot_all() {
            Self::full()
        } else {
            Self::full().subtract(&ecmascript_line_terminators())
        }
    }

    fn caret(&self, flags: EcmaScriptFlags) -> Anchor {
        if flags.multiline() {
            Anchor::LineStart(ecmascript_line_terminators())
        } else {
            Anchor::Start
        }
    }

    fn dollar(&self, flags: EcmaScriptFlags) -> Anchor {
        if flags.multiline() {
            Anchor::LineEnd(ecmascript_line_terminators())
        } else {
            Anchor::End
        }
    }

    fn unknown_escape(
        &self,
        c: char,
        flags: EcmaScriptFlags,
        in_class: bool,
    ) -> Result<u32, ErrorKind> {
        if !flags.unicode() || SYNTAX_CHARACTERS.contains(c) || (in_class && c == '-') {
            Ok(c as u32)
        } else {
            Err(ErrorKind::BadEscape(format!("\\{}", c)))
        }
    }

    fn incomplete_hex_escape(&self, text: &str, flags: EcmaScriptFlags) -> Result<(), ErrorKind> {
        if flags.unicode() {
            Err(ErrorKind::BadEscape(text.to_string()))
        } else {
            Ok(())
        }
    }

    fn incomplete_unicode_escape(&self, _text: &str, flags: EcmaScriptFlags) -> Result<(), ErrorKind> {
        if flags.unicode() {
            Err(ErrorKind::InvalidUnicodeEscape)
        } else {
            Ok(())
        }
    }

    fn invalid_control_escape(&self, flags: EcmaScriptFlags) -> Result<(), ErrorKind> {
        if flags.unicode() {
            Err(ErrorKind::BadEscape("\\c".to_string()))
        } else {
            Ok(())
        }
    }

    fn invalid_backreference(&self, number: u32, flags: EcmaScriptFlags) -> Result<(), ErrorKind> {
        if flags.unicode() {
            Err(ErrorKind::BadEscape(format!("\\{}", number)))
        } else {
            Ok(())
        }
    }

    fn lone_bracket(&self, _c: char, flags: EcmaScriptFlags) -> Result<(), ErrorKind> {
        if flags.unicode() {
            Err(ErrorKind::LoneQuantifierBrackets)
        } else {
            Ok(())
        }
    }

    fn class_escape_in_range(&self, _text: &str, flags: EcmaScriptFlags) -> Result<(), ErrorKind> {
        if flags.unicode() {
            Err(ErrorKind::InvalidClassEscape)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RegexError;
    use crate::parser::parse_tokens;
    use crate::ParserOptions;

    fn parse(pattern: &str, flags: &str) -> Result<String, RegexError> {
        parse_tokens(
            &EcmaScriptDialect::default(),
            pattern,
            flags,
            &ParserOptions::default(),
            false,
        )
        .map(|p| p.ast.to_string())
    }

    macro_rules! test_es {
        ($name:ident, $pattern:expr, $flags:expr, $expected:expr) => {
            #[test]
            fn $name() {
                assert_eq!(parse($pattern, $flags).unwrap(), $expected);
            }
        };
    }

    macro_rules! test_es_error {
        ($name:ident, $pattern:expr, $flags:expr, $message:expr) => {
            #[test]
            fn $name() {
                match parse($pattern, $flags) {
                    Err(RegexError::Syntax(e)) => assert_eq!(e.message, $message),
                    other => panic!("expected a syntax error, got {:?}", other),
                }
            }
        };
    }

    #[test]
    fn unicode_properties() {
        for pattern in ["\\p{Lt}", "\\p{Script=Greek}", "\\P{gc=Nd}", "[\\p{sc=Grek}a]"] {
            assert!(parse(pattern, "u").is_ok(), "{}", pattern);
        }
    }

    test_es_error!(unknown_property, "\\p{Klingon}", "u", "Invalid property name");
    test_es_error!(empty_property, "\\p{}", "u", "Invalid property name");

    #[derive(Debug)]
    struct NoProperties;

    impl PropertyLookup for NoProperties {
        fn get_property(&self, _name: &str) -> Option<CodePointSet> {
            None
        }
    }

    #[test]
    fn missing_property_data_is_unsupported() {
        let options = ParserOptions {
            properties: std::sync::Arc::new(NoProperties),
            ..ParserOptions::default()
        };
        let dialect = EcmaScriptDialect::default();
        let err = parse_tokens(&dialect, "\\p{Lt}", "u", &options, false).unwrap_err();
        assert!(err.is_unsupported());
        assert!(parse_tokens(&dialect, "\\p{Lt}", "u", &options, true).is_ok());
        let err = parse_tokens(&dialect, "\\p{Klingon}", "u", &options, true).unwrap_err();
        assert!(err.is_syntax());
    }

    test_es!(annex_b_octal, "\\101", "", "A");
    test_es!(annex_b_identity_escape, "\\q", "", "q");
    test_es!(annex_b_lone_brace, "a{", "", "a\\{");
    test_es!(annex_b_lone_bracket, "]", "", "\\]");
    test_es!(invalid_reference_is_octal, "\\1", "", "\\u{1}");
    test_es!(forward_reference, "\\1(a)", "", "\\1(a)");
    test_es!(braced_unicode, "\\u{1F600}", "u", "\\u{1f600}");
    test_es!(null_escape, "\\0", "u", "\\u{0}");
    test_es!(dot_all, ".", "s", "[\\u{0}-\\u{10ffff}]");
    test_es!(quantified_lookahead, "(?=a)*", "", "(?=a)*");
    test_es!(modifier_group, "(?i:a)b", "", "(?:[Aa])b");
    test_es!(
        unicode_ignore_case_word,
        "\\w",
        "iu",
        "[0-9A-Z_a-z\\u{17f}\\u{212a}]"
    );
    test_es!(non_unicode_ignore_case_word, "\\w", "i", "[0-9A-Z_a-z]");
    test_es!(
        named_reference_before_group,
        "\\k<a>(?<a>x)",
        "",
        "\\1(x)"
    );

    test_es_error!(unicode_incomplete_quantifier, "a{", "u", "Incomplete quantifier");
    test_es_error!(unicode_lone_bracket, "a]", "u", "Lone quantifier brackets");
    test_es_error!(unicode_bad_reference, "\\1", "u", "Invalid escape");
    test_es_error!(quantified_lookahead_in_unicode, "(?=a)*", "u", "Nothing to repeat");
    test_es_error!(unknown_name, "(?<a>x)\\k<b>", "", "Invalid named capture referenced");
    test_es_error!(bad_modifier, "(?x:a)", "", "Invalid group");
    test_es_error!(repeated_modifier, "(?ii:a)", "", "Repeated flag");
    test_es_error!(unicode_class_escape_range, "[\\d-z]", "u", "Invalid class escape");
    test_es_error!(unterminated_group, "(a", "", "Unterminated group");
    test_es_error!(bad_flags, "a", "gq", "Invalid flags 'gq'");

    #[test]
    fn duplicate_names_in_internal_mode() {
        let parsed = parse_tokens(
            &EcmaScriptDialect::internal(),
            "(?<a>x)|(?<a>y)\\k<a>",
            "u",
            &ParserOptions::default(),
            false,
        )
        .unwrap();
        assert_eq!(parsed.ast.to_string(), "(x)|(y)\\k<1,2>");
        assert!(parsed.named_groups.is_multiplexed("a"));
    }

    #[test]
    fn valid_names() {
        let d = EcmaScriptDialect::default();
        assert!(d.valid_group_name("$a1"));
        assert!(d.valid_group_name("_"));
        assert!(!d.valid_group_name("1a"));
        assert!(!d.valid_group_name("a-b"));
    }
}
