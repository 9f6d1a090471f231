//! Translates regular expressions written for several engines into one canonical syntax tree.
//!
//! Each [`Flavor`] keeps its own escapes, class semantics, group rules, case folding and error
//! messages. The resulting [`RegexAst`] matches exactly what the source engine would, so the
//! engine that compiles it doesn't need to know where a pattern came from.

pub mod ast;
pub mod casefold;
pub mod charset;
pub mod encoding;
pub mod error;
pub mod flags;
pub mod flavor;
pub mod lexer;
pub mod unicode;

mod parser;

use std::sync::Arc;

pub use ast::{NamedGroups, RegexAst};
pub use charset::CodePointSet;
pub use encoding::Encoding;
pub use error::{RegexError, Result, SyntaxError, UnsupportedError};
pub use flavor::{Flavor, RegexTraits};
use unicode::{PropertyLookup, StdProperties};

/// Settings shared by every flavor.
#[derive(Debug, Clone)]
pub struct ParserOptions {
    /// Encoding of the subject strings. Classes and case folding are clipped to its range.
    pub encoding: Encoding,
    /// Treat atomic groups as plain groups and possessive quantifiers as greedy ones.
    pub ignore_atomic_groups: bool,
    /// Locale for Python's `re.LOCALE`. `None` means the C locale.
    pub locale: Option<String>,
    pub properties: Arc<dyn PropertyLookup>,
}

impl Default for ParserOptions {
    fn default() -> Self {
        ParserOptions {
            encoding: Encoding::default(),
            ignore_atomic_groups: false,
            locale: None,
            properties: Arc::new(StdProperties),
        }
    }
}

impl ParserOptions {
    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    pub fn ignoring_atomic_groups(mut self) -> Self {
        self.ignore_atomic_groups = true;
        self
    }
}

/// A pattern translated into the canonical tree.
#[derive(Debug, Clone)]
pub struct ParsedRegex {
    pub ast: RegexAst,
    pub named_groups: NamedGroups,
    pub traits: RegexTraits,
    pub flavor: Flavor,
}

pub fn parse(pattern: &str, flags: &str, flavor: Flavor, encoding: Encoding) -> Result<ParsedRegex> {
    parse_with(
        pattern,
        flags,
        flavor,
        &ParserOptions::default().with_encoding(encoding),
    )
}

pub fn parse_with(
    pattern: &str,
    flags: &str,
    flavor: Flavor,
    options: &ParserOptions,
) -> Result<ParsedRegex> {
    log::debug!(
        "parsing /{}/{} as {} ({})",
        pattern,
        flags,
        flavor,
        options.encoding.name()
    );
    let parsed = flavor.parse(pattern, flags, options, false)?;
    Ok(ParsedRegex {
        ast: parsed.ast,
        named_groups: parsed.named_groups,
        traits: flavor.traits(),
        flavor,
    })
}

/// Checks `pattern` for syntax errors. Constructs that parse but can't be translated are fine.
pub fn validate(pattern: &str, flags: &str, flavor: Flavor) -> std::result::Result<(), SyntaxError> {
    log::debug!("validating /{}/{} as {}", pattern, flags, flavor);
    match flavor.validate(pattern, flags, &ParserOptions::default()) {
        Ok(()) | Err(RegexError::Unsupported(_)) => Ok(()),
        Err(RegexError::Syntax(e)) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    macro_rules! test_parse {
        ($name:ident, $flavor:expr, $pattern:expr, $flags:expr, $expected:expr) => {
            #[test]
            fn $name() {
                let parsed = parse($pattern, $flags, $flavor, Encoding::Utf16).unwrap();
                assert_eq!(parsed.ast.to_string(), $expected);
            }
        };
    }

    test_parse!(ecmascript_literal, Flavor::EcmaScript, "ab|c", "", "ab|c");
    test_parse!(python_group, Flavor::Python, "(?P<x>a)(?P=x)", "", "(a)\\1");
    test_parse!(ruby_group, Flavor::Ruby, "(?<x>a)\\k<x>", "", "(a)(?:\\1)");
    test_parse!(oracle_interval, Flavor::Oracle, "a{2}", "", "a{2}");

    #[test]
    fn traits_follow_flavor() {
        let parsed = parse("a", "", Flavor::Python, Encoding::Utf16).unwrap();
        assert_eq!(parsed.traits, RegexTraits::PYTHON);
        assert_eq!(parsed.flavor, Flavor::Python);
    }

    #[test]
    fn named_groups_are_reported() {
        let parsed = parse("(?<a>x)(?<b>y)", "", Flavor::EcmaScript, Encoding::Utf16).unwrap();
        assert_eq!(parsed.named_groups.to_string(), "a => 1, b => 2");
    }

    #[test]
    fn validation_ignores_unsupported_constructs() {
        assert!(validate("(?>a)", "", Flavor::Python).is_ok());
        assert!(validate("(?>a)", "", Flavor::Ruby).is_ok());
        assert!(validate("a", "v", Flavor::EcmaScript).is_ok());
        let err = validate("(a", "", Flavor::Python).unwrap_err();
        assert_eq!(err.message, "missing ), unterminated subpattern");
        assert_eq!(err.position, 0);
    }

    #[test]
    fn unsupported_constructs_fail_parsing() {
        let err = parse("(?>a)", "", Flavor::Python, Encoding::Utf16).unwrap_err();
        assert!(err.is_unsupported());
        let options = ParserOptions::default().ignoring_atomic_groups();
        assert!(parse_with("(?>a)", "", Flavor::Python, &options).is_ok());
    }
}
