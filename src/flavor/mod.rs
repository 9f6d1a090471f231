//! The source dialects and what sets them apart.

pub mod ecmascript;
pub mod oracle;
pub mod oracle_trie;
pub mod python;
pub mod ruby;

use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;

use crate::encoding::Encoding;
use crate::error::{RegexError, Result};
use crate::flags::EcmaScriptFlags;
use crate::parser::{parse_tokens, ParsedAst};
use crate::ParserOptions;

use ecmascript::EcmaScriptDialect;
use oracle::OracleDialect;
use python::PythonDialect;

bitflags! {
    /// Matching semantics that differ between flavors, for the engine that runs the tree.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RegexTraits: u8 {
        /// A back-reference to a group that didn't participate fails instead of matching empty.
        const BACKREFS_TO_UNMATCHED_FAIL = 1 << 0;
        /// Captures inside a loop body survive into the next iteration.
        const NESTED_CAPTURE_GROUPS_KEPT_ON_LOOP_REENTRY = 1 << 1;
        const EMPTY_CHECKS_MONITOR_CAPTURE_GROUPS = 1 << 2;
        const FAILING_EMPTY_CHECKS_DONT_BACKTRACK = 1 << 3;
        const LOOKBEHINDS_MATCH_RIGHT_TO_LEFT = 1 << 4;
        const MUST_ADVANCE_AFTER_EMPTY_MATCH = 1 << 5;
        const CASE_INSENSITIVE_BACKREFS_USE_FULL_FOLDING = 1 << 6;
    }
}

impl RegexTraits {
    pub const ECMASCRIPT: Self = Self::LOOKBEHINDS_MATCH_RIGHT_TO_LEFT;
    pub const PYTHON: Self = Self::BACKREFS_TO_UNMATCHED_FAIL
        .union(Self::NESTED_CAPTURE_GROUPS_KEPT_ON_LOOP_REENTRY)
        .union(Self::FAILING_EMPTY_CHECKS_DONT_BACKTRACK)
        .union(Self::MUST_ADVANCE_AFTER_EMPTY_MATCH);
    pub const RUBY: Self = Self::BACKREFS_TO_UNMATCHED_FAIL
        .union(Self::NESTED_CAPTURE_GROUPS_KEPT_ON_LOOP_REENTRY)
        .union(Self::EMPTY_CHECKS_MONITOR_CAPTURE_GROUPS)
        .union(Self::FAILING_EMPTY_CHECKS_DONT_BACKTRACK)
        .union(Self::CASE_INSENSITIVE_BACKREFS_USE_FULL_FOLDING);
    pub const ORACLE: Self = Self::BACKREFS_TO_UNMATCHED_FAIL
        .union(Self::NESTED_CAPTURE_GROUPS_KEPT_ON_LOOP_REENTRY)
        .union(Self::CASE_INSENSITIVE_BACKREFS_USE_FULL_FOLDING);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flavor {
    EcmaScript,
    Python,
    Ruby,
    Oracle,
}

impl Flavor {
    pub const ALL: [Flavor; 4] = [
        Flavor::EcmaScript,
        Flavor::Python,
        Flavor::Ruby,
        Flavor::Oracle,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Flavor::EcmaScript => "ecmascript",
            Flavor::Python => "python",
            Flavor::Ruby => "ruby",
            Flavor::Oracle => "oracle",
        }
    }

    pub fn traits(&self) -> RegexTraits {
        match self {
            Flavor::EcmaScript => RegexTraits::ECMASCRIPT,
            Flavor::Python => RegexTraits::PYTHON,
            Flavor::Ruby => RegexTraits::RUBY,
            Flavor::Oracle => RegexTraits::ORACLE,
        }
    }

    /// Parses `pattern` into the canonical tree. With `silent`, constructs that can't be
    /// translated are tolerated instead of raising [`RegexError::Unsupported`].
    pub(crate) fn parse(
        &self,
        pattern: &str,
        flags: &str,
        options: &ParserOptions,
        silent: bool,
    ) -> Result<ParsedAst> {
        match self {
            Flavor::EcmaScript => {
                let dialect = EcmaScriptDialect::default();
                let parsed = EcmaScriptFlags::parse(flags)
                    .map_err(|message| RegexError::syntax(message, 0))?;
                if parsed.contains(EcmaScriptFlags::UNICODE_SETS) && !silent {
                    return Err(RegexError::unsupported("unicode sets mode"));
                }
                parse_tokens(&dialect, pattern, flags, options, silent)
            }
            Flavor::Python => {
                let dialect = PythonDialect::new(options.encoding != Encoding::Latin1);
                parse_tokens(&dialect, pattern, flags, options, silent)
            }
            Flavor::Oracle => parse_tokens(&OracleDialect, pattern, flags, options, silent),
            Flavor::Ruby => ruby::parse(pattern, flags, options, silent),
        }
    }

    /// Only looks for syntax errors. Ruby patterns are checked without writing the rewrite.
    pub(crate) fn validate(&self, pattern: &str, flags: &str, options: &ParserOptions) -> Result<()> {
        match self {
            Flavor::Ruby => ruby::validate(pattern, flags, options),
            _ => self.parse(pattern, flags, options, true).map(|_| ()),
        }
    }
}

impl fmt::Display for Flavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Flavor {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ecmascript" | "js" | "javascript" => Ok(Flavor::EcmaScript),
            "python" | "py" => Ok(Flavor::Python),
            "ruby" | "onigmo" => Ok(Flavor::Ruby),
            "oracle" | "oracledb" => Ok(Flavor::Oracle),
            _ => Err(format!("unknown flavor {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flavor_names_round_trip() {
        for flavor in Flavor::ALL {
            assert_eq!(flavor.name().parse::<Flavor>(), Ok(flavor));
        }
        assert_eq!("JS".parse::<Flavor>(), Ok(Flavor::EcmaScript));
        assert!("perl".parse::<Flavor>().is_err());
    }

    #[test]
    fn traits_per_flavor() {
        assert!(!Flavor::EcmaScript
            .traits()
            .contains(RegexTraits::BACKREFS_TO_UNMATCHED_FAIL));
        assert!(Flavor::Python
            .traits()
            .contains(RegexTraits::MUST_ADVANCE_AFTER_EMPTY_MATCH));
        assert!(Flavor::Ruby
            .traits()
            .contains(RegexTraits::EMPTY_CHECKS_MONITOR_CAPTURE_GROUPS));
        assert!(Flavor::Oracle
            .traits()
            .contains(RegexTraits::CASE_INSENSITIVE_BACKREFS_USE_FULL_FOLDING));
    }

    #[test]
    fn unicode_sets_are_unsupported() {
        let err = Flavor::EcmaScript
            .parse("a", "v", &ParserOptions::default(), false)
            .unwrap_err();
        assert!(err.is_unsupported());
        assert!(Flavor::EcmaScript
            .parse("a", "v", &ParserOptions::default(), true)
            .is_ok());
    }

    #[test]
    fn bad_flags_beat_unicode_sets() {
        for flags in ["vq", "uv", "vv"] {
            let err = Flavor::EcmaScript
                .parse("a", flags, &ParserOptions::default(), false)
                .unwrap_err();
            assert!(err.is_syntax(), "{}: {:?}", flags, err);
        }
        let err = validate_es("a", "vq").unwrap_err();
        assert!(err.is_syntax());
    }

    fn validate_es(pattern: &str, flags: &str) -> Result<()> {
        Flavor::EcmaScript.validate(pattern, flags, &ParserOptions::default())
    }
}
