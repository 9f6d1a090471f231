//! The hooks a dialect plugs into the shared [`Lexer`](super::Lexer) and parser.
//!
//! The lexer owns the grammar everything has in common. Whatever differs between dialects is a
//! method here: feature toggles with the common default, the shorthand sets, anchor semantics and
//! the policy for each edge case and error.

use crate::ast::builder::Anchor;
use crate::ast::LookAroundKind;
use crate::casefold::CaseFoldAlgorithm;
use crate::charset::CodePointSet;
use crate::flags::RegexFlags;
use crate::unicode::{resolve_property, PropertyError, PropertyLookup};

/// Everything that can go wrong while lexing or parsing, independent of how a dialect words it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    UnterminatedGroup,
    UnmatchedParenthesis,
    InvalidGroup,
    /// `(?` followed by something unknown; holds the extension text.
    UnknownExtension(String),
    MissingGroupName,
    InvalidGroupName(String),
    DuplicateGroupName {
        name: String,
        group: u32,
        previous: u32,
    },
    UnterminatedName,
    UnknownGroupName(String),
    InvalidNamedReference,
    InvalidGroupReference(u32),
    LookbehindGroupReference,
    UnterminatedComment,

    UnknownFlag(char),
    MissingFlag,
    MissingFlagTerminator,
    MissingColon,
    GlobalFlagsNotAtStart,
    CannotTurnOffTypeFlag,
    FlagTurnedOnAndOff,
    RepeatedFlag,
    IncompatibleTypeFlags,
    LocaleFlagWithStr,
    UnicodeFlagWithBytes,

    NothingToRepeat,
    MultipleRepeat,
    QuantifierOutOfOrder,
    QuantifierTooLarge,
    IncompleteQuantifier,
    LoneQuantifierBrackets,

    UnterminatedClass,
    /// Holds the range as written, e.g. `z-a`.
    RangeOutOfOrder(String),
    InvalidClassEscape,
    InvalidPosixClass,
    InvalidEquivalenceClass,
    InvalidCollationElement,

    TrailingBackslash,
    /// Holds the escape as written, e.g. `\q`.
    BadEscape(String),
    IncompleteEscape(String),
    InvalidUnicodeEscape,
    InvalidDecimalEscape,
    OctalOutOfRange(String),
    InvalidPropertyName,
    UnterminatedCharacterName,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamedGroupSyntax {
    None,
    /// `(?<name>...)`, referenced with `\k<name>`.
    Angle,
    /// `(?P<name>...)`, referenced with `(?P=name)`.
    Python,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InlineFlagSyntax {
    None,
    /// `(?ims-ims:...)` only.
    Modifiers,
    /// `(?flags)` at the start of the pattern plus `(?flags-flags:...)`.
    Python,
}

pub trait Dialect: std::fmt::Debug {
    type Flags: RegexFlags;

    fn name(&self) -> &'static str;

    fn parse_flags(&self, flags: &str) -> Result<Self::Flags, String>;

    /// Error text for `kind`.
    fn message(&self, kind: &ErrorKind) -> String;

    /// `None` when case-insensitive matching uses locale data instead of a fold table.
    fn fold_algorithm(&self, flags: Self::Flags) -> Option<CaseFoldAlgorithm>;

    // Inline flags.

    fn inline_flag(&self, _c: char) -> Option<Self::Flags> {
        None
    }
    fn add_flags(&self, flags: Self::Flags, _added: Self::Flags) -> Self::Flags {
        flags
    }
    fn remove_flags(&self, flags: Self::Flags, _removed: Self::Flags) -> Self::Flags {
        flags
    }
    fn is_type_flag(&self, _c: char) -> bool {
        false
    }
    /// Validates flags produced by an inline group.
    fn check_inline_flags(&self, _flags: Self::Flags) -> Result<(), ErrorKind> {
        Ok(())
    }

    // Feature toggles.

    fn unicode_mode(&self, flags: Self::Flags) -> bool {
        flags.unicode()
    }
    fn verbose_mode(&self, flags: Self::Flags) -> bool {
        flags.extended()
    }
    /// Whether `#` starts a comment in verbose mode.
    fn verbose_comments(&self) -> bool {
        true
    }
    fn posix_classes(&self) -> bool {
        false
    }
    fn octal_escapes(&self, _flags: Self::Flags) -> bool {
        false
    }
    /// Whether `\NNN` with three octal digits is an octal escape rather than a back-reference.
    fn three_digit_octal(&self) -> bool {
        false
    }
    fn braces_literal_when_invalid(&self, _flags: Self::Flags) -> bool {
        true
    }
    /// Whether `{,n}` is a quantifier.
    fn lower_bound_optional(&self) -> bool {
        false
    }
    fn max_backreference_digits(&self) -> usize {
        usize::MAX
    }
    /// Whether back-references past the last group in the pattern are detected while lexing.
    fn backreferences_checked_at_lex(&self) -> bool {
        false
    }
    fn lookbehinds(&self) -> bool {
        true
    }
    fn lookaheads(&self) -> bool {
        true
    }
    fn non_capturing_groups(&self) -> bool {
        true
    }
    fn named_group_syntax(&self) -> NamedGroupSyntax {
        NamedGroupSyntax::None
    }
    fn inline_flag_syntax(&self) -> InlineFlagSyntax {
        InlineFlagSyntax::None
    }
    fn comment_groups(&self) -> bool {
        false
    }
    fn possessive_quantifiers(&self) -> bool {
        false
    }
    fn lazy_quantifiers(&self) -> bool {
        true
    }
    fn atomic_groups(&self) -> bool {
        false
    }
    fn conditional_groups(&self) -> bool {
        false
    }
    /// Whether a quantifier with nothing before it is literal text.
    fn lone_quantifier_literal(&self) -> bool {
        false
    }
    fn merge_double_quantifiers(&self) -> bool {
        false
    }
    /// Whether `\` escapes anything inside brackets.
    fn escapes_in_classes(&self) -> bool {
        true
    }
    /// Whether `[]...]` starts with a literal `]`.
    fn leading_bracket_literal(&self) -> bool {
        false
    }
    fn property_escapes(&self, _flags: Self::Flags) -> bool {
        false
    }
    fn control_escapes(&self) -> bool {
        false
    }
    fn hex_escapes(&self) -> bool {
        true
    }
    /// `\uHHHH`
    fn short_unicode_escapes(&self, _flags: Self::Flags) -> bool {
        false
    }
    /// `\u{H...}`
    fn braced_unicode_escapes(&self, _flags: Self::Flags) -> bool {
        false
    }
    /// `\UHHHHHHHH`
    fn long_unicode_escapes(&self, _flags: Self::Flags) -> bool {
        false
    }
    /// Whether `😀` is read as one codepoint.
    fn join_surrogate_escapes(&self, _flags: Self::Flags) -> bool {
        false
    }
    /// Whether pattern characters above U+FFFF are split into UTF-16 surrogates.
    fn split_astral_literals(&self, _flags: Self::Flags) -> bool {
        false
    }
    fn named_references(&self, _flags: Self::Flags) -> bool {
        false
    }
    fn subexpression_calls(&self) -> bool {
        false
    }
    fn duplicate_group_names(&self) -> bool {
        false
    }
    fn word_boundaries(&self) -> bool {
        true
    }
    /// Whether `\b` inside brackets is a backspace.
    fn backspace_in_class(&self) -> bool {
        true
    }
    /// Whether `\0` is NUL when octal escapes are off. A digit after it is then an error.
    fn null_escape(&self) -> bool {
        false
    }
    /// `\N{NAME}`
    fn named_char_escapes(&self) -> bool {
        false
    }
    fn valid_group_name(&self, name: &str) -> bool {
        let mut chars = name.chars();
        chars
            .next()
            .map_or(false, |c| c == '_' || c.is_alphabetic())
            && chars.all(|c| c == '_' || c.is_alphanumeric())
    }
    /// Whether back-references may point at groups further right.
    fn forward_references(&self) -> bool {
        false
    }
    /// Whether a reference into a group that is still open never matches.
    fn open_group_reference_is_dead(&self) -> bool {
        true
    }
    /// Whether lookbehinds may refer to groups opened inside them.
    fn lookbehind_group_references(&self) -> bool {
        true
    }
    fn quantifiable_look_around(&self, _kind: LookAroundKind, _flags: Self::Flags) -> bool {
        true
    }
    /// Whether case-insensitive classes go through the ordered class trie.
    fn class_trie(&self) -> bool {
        false
    }

    // Sets and anchors.

    /// Simple one-character escapes: `\n`, `\t` and friends.
    fn char_escape(&self, c: char, _flags: Self::Flags) -> Option<u32> {
        match c {
            'f' => Some(0x0C),
            'n' => Some(0x0A),
            'r' => Some(0x0D),
            't' => Some(0x09),
            'v' => Some(0x0B),
            _ => None,
        }
    }
    /// `\d`, `\s`, `\w` and their negations, plus any dialect extras.
    fn shorthand_class(
        &self,
        c: char,
        flags: Self::Flags,
        properties: &dyn PropertyLookup,
    ) -> Option<CodePointSet>;
    fn word_set(&self, flags: Self::Flags, properties: &dyn PropertyLookup) -> CodePointSet;
    fn dot_set(&self, flags: Self::Flags) -> CodePointSet;
    fn caret(&self, flags: Self::Flags) -> Anchor;
    fn dollar(&self, flags: Self::Flags) -> Anchor;
    /// `\A`, `\Z`, `\z` and similar.
    fn input_anchor(&self, _c: char) -> Option<Anchor> {
        None
    }
    fn property(
        &self,
        name: &str,
        negated: bool,
        properties: &dyn PropertyLookup,
        full: &CodePointSet,
    ) -> Result<CodePointSet, PropertyError> {
        let set = resolve_property(properties, name)?;
        Ok(if negated { full.subtract(&set) } else { set })
    }
    /// `[=c=]` inside brackets.
    fn equivalence_class(&self, _c: u32) -> Result<CodePointSet, ErrorKind> {
        Err(ErrorKind::InvalidEquivalenceClass)
    }

    // Edge cases and errors.

    /// An escape the grammar doesn't know; `Ok` is the literal character it stands for.
    fn unknown_escape(&self, c: char, flags: Self::Flags, in_class: bool) -> Result<u32, ErrorKind>;
    /// `\x` without two hex digits; `Ok` means a literal `x`.
    fn incomplete_hex_escape(&self, text: &str, _flags: Self::Flags) -> Result<(), ErrorKind> {
        Err(ErrorKind::IncompleteEscape(text.to_string()))
    }
    /// `\u` without a valid body; `Ok` means a literal `u`.
    fn incomplete_unicode_escape(&self, text: &str, _flags: Self::Flags) -> Result<(), ErrorKind> {
        Err(ErrorKind::IncompleteEscape(text.to_string()))
    }
    /// `\c` without a control letter; `Ok` means a literal backslash.
    fn invalid_control_escape(&self, _flags: Self::Flags) -> Result<(), ErrorKind> {
        Err(ErrorKind::BadEscape("\\c".to_string()))
    }
    /// A back-reference past the last group; `Ok` means reading it as octal or identity escape.
    fn invalid_backreference(&self, number: u32, _flags: Self::Flags) -> Result<(), ErrorKind> {
        Err(ErrorKind::InvalidGroupReference(number))
    }
    /// A lone `]`, `{` or `}`; `Ok` means literal.
    fn lone_bracket(&self, _c: char, _flags: Self::Flags) -> Result<(), ErrorKind> {
        Ok(())
    }
    /// A shorthand class as a range endpoint; `Ok` means the `-` is literal.
    fn class_escape_in_range(&self, _text: &str, _flags: Self::Flags) -> Result<(), ErrorKind> {
        Err(ErrorKind::InvalidClassEscape)
    }
    /// Turns parsed `{lower,upper}` values into stored bounds.
    fn quantifier_bounds(
        &self,
        lower: u64,
        upper: Option<u64>,
    ) -> Result<(u32, Option<u32>), ErrorKind> {
        let clamp = |v: u64| v.min(u32::MAX as u64) as u32;
        if let Some(upper) = upper {
            if upper < lower {
                return Err(ErrorKind::QuantifierOutOfOrder);
            }
        }
        Ok((clamp(lower), upper.map(clamp)))
    }
}
