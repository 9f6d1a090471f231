//! Unicode property lookups.
//!
//! The property database is supplied by the embedder through [`PropertyLookup`]. [`StdProperties`]
//! is the built-in provider, backed by the Unicode tables that ship with `regex-syntax`: general
//! categories, scripts, script extensions and the binary properties, under their long names,
//! short aliases and `Name=Value` forms.

use std::collections::HashMap;
use std::sync::Mutex;

use once_cell::sync::Lazy;
use regex_syntax::hir::{Class, HirKind, Literal};
use regex_syntax::ParserBuilder;

use crate::charset::{CodePointSet, Range};

pub trait PropertyLookup: Send + Sync + std::fmt::Debug {
    /// The set of codepoints carrying property `name` (`Alphabetic`, `Lu`, `Script=Greek`, ...).
    fn get_property(&self, name: &str) -> Option<CodePointSet>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct StdProperties;

static PROPERTY_CACHE: Lazy<Mutex<HashMap<String, Option<CodePointSet>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Looks `name` up in the `regex-syntax` tables by parsing `\p{name}`.
fn unicode_table(name: &str) -> Option<CodePointSet> {
    if name.is_empty() || name.contains(|c: char| matches!(c, '{' | '}' | '\\' | '!' | '^')) {
        return None;
    }
    let hir = ParserBuilder::new()
        .build()
        .parse(&format!("\\p{{{}}}", name))
        .ok()?;
    match hir.kind() {
        HirKind::Class(Class::Unicode(class)) => Some(CodePointSet::from_ranges(
            class
                .ranges()
                .iter()
                .map(|r| Range::new(r.start() as u32, r.end() as u32)),
        )),
        HirKind::Literal(Literal::Unicode(c)) => Some(CodePointSet::from_code_point(*c as u32)),
        _ => None,
    }
}

/// Sets that aren't Unicode properties but are named like one.
fn derived_property(name: &str) -> Option<CodePointSet> {
    match name.to_ascii_lowercase().as_str() {
        // `str.isalnum()`: letters plus every numeric character.
        "alnum" => Some(unicode_table("L")?.union(&unicode_table("N")?)),
        _ => None,
    }
}

impl PropertyLookup for StdProperties {
    fn get_property(&self, name: &str) -> Option<CodePointSet> {
        let mut cache = PROPERTY_CACHE.lock().unwrap_or_else(|e| e.into_inner());
        cache
            .entry(name.to_string())
            .or_insert_with(|| {
                log::debug!("building property set {}", name);
                derived_property(name).or_else(|| unicode_table(name))
            })
            .clone()
    }
}

/// Why a property escape couldn't be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyError {
    /// No Unicode property has this name.
    Unknown,
    /// A real property that the lookup in use doesn't provide.
    Unavailable(String),
}

/// Resolves `name` through `properties`, telling apart names that don't exist from properties the
/// lookup simply lacks.
pub fn resolve_property(
    properties: &dyn PropertyLookup,
    name: &str,
) -> Result<CodePointSet, PropertyError> {
    if let Some(set) = properties.get_property(name) {
        return Ok(set);
    }
    match StdProperties.get_property(name) {
        Some(_) => Err(PropertyError::Unavailable(name.to_string())),
        None => Err(PropertyError::Unknown),
    }
}

fn set_of(chars: &[(char, char)]) -> CodePointSet {
    CodePointSet::from_ranges(chars.iter().map(|&(lo, hi)| Range::new(lo as u32, hi as u32)))
}

pub fn ascii_digits() -> CodePointSet {
    set_of(&[('0', '9')])
}

pub fn ascii_word() -> CodePointSet {
    set_of(&[('0', '9'), ('A', 'Z'), ('_', '_'), ('a', 'z')])
}

pub fn ascii_space() -> CodePointSet {
    set_of(&[('\t', '\r'), (' ', ' ')])
}

pub fn hex_digits() -> CodePointSet {
    set_of(&[('0', '9'), ('A', 'F'), ('a', 'f')])
}

/// ECMAScript `WhiteSpace` plus `LineTerminator`.
pub fn ecmascript_space() -> CodePointSet {
    set_of(&[
        ('\t', '\r'),
        (' ', ' '),
        ('\u{a0}', '\u{a0}'),
        ('\u{1680}', '\u{1680}'),
        ('\u{2000}', '\u{200a}'),
        ('\u{2028}', '\u{2029}'),
        ('\u{202f}', '\u{202f}'),
        ('\u{205f}', '\u{205f}'),
        ('\u{3000}', '\u{3000}'),
        ('\u{feff}', '\u{feff}'),
    ])
}

pub fn ecmascript_line_terminators() -> CodePointSet {
    set_of(&[('\n', '\n'), ('\r', '\r'), ('\u{2028}', '\u{2029}')])
}

pub fn newline() -> CodePointSet {
    CodePointSet::from_code_point('\n' as u32)
}

/// POSIX bracket class names shared by Ruby and Oracle. `unicode` selects the Unicode meaning
/// of the classes over the ASCII one.
pub fn posix_class(
    name: &str,
    unicode: bool,
    properties: &dyn PropertyLookup,
) -> Option<CodePointSet> {
    let ascii = match name {
        "alpha" => set_of(&[('A', 'Z'), ('a', 'z')]),
        "digit" => ascii_digits(),
        "alnum" => set_of(&[('0', '9'), ('A', 'Z'), ('a', 'z')]),
        "upper" => set_of(&[('A', 'Z')]),
        "lower" => set_of(&[('a', 'z')]),
        "space" => ascii_space(),
        "blank" => set_of(&[('\t', '\t'), (' ', ' ')]),
        "punct" => set_of(&[('!', '/'), (':', '@'), ('[', '`'), ('{', '~')]),
        "cntrl" => set_of(&[('\0', '\x1f'), ('\x7f', '\x7f')]),
        "graph" => set_of(&[('!', '~')]),
        "print" => set_of(&[(' ', '~')]),
        "xdigit" => hex_digits(),
        "word" => ascii_word(),
        "ascii" => set_of(&[('\0', '\x7f')]),
        _ => return None,
    };
    if !unicode {
        return Some(ascii);
    }
    let unicode_set = match name {
        "alpha" => properties.get_property("Alphabetic"),
        "digit" => properties.get_property("Nd"),
        "alnum" => properties.get_property("Alnum"),
        "upper" => properties.get_property("Uppercase"),
        "lower" => properties.get_property("Lowercase"),
        "space" => properties.get_property("White_Space"),
        "cntrl" => properties.get_property("Cc"),
        "word" => properties
            .get_property("Alnum")
            .map(|s| s.union(&CodePointSet::from_code_point('_' as u32))),
        _ => None,
    };
    Some(unicode_set.unwrap_or(ascii))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn std_properties() {
        let props = StdProperties;
        let upper = props.get_property("Lu").unwrap();
        assert!(upper.contains('A' as u32));
        assert!(upper.contains('Ä' as u32));
        assert!(!upper.contains('a' as u32));
        let space = props.get_property("White_Space").unwrap();
        assert!(space.contains(0x3000));
        assert!(props.get_property("General_Category=Lu").is_some());
        assert!(props.get_property("Script=Klingon").is_none());
    }

    macro_rules! test_property {
        ($name:ident, $property:expr, [$($inside:expr),*], [$($outside:expr),*]) => {
            #[test]
            fn $name() {
                let set = StdProperties.get_property($property).unwrap();
                $(assert!(set.contains($inside), "{:#x} in {}", $inside, $property);)*
                $(assert!(!set.contains($outside), "{:#x} not in {}", $outside, $property);)*
            }
        };
    }

    test_property!(
        decimal_digits,
        "Nd",
        [0x30, 0x39, 0x660, 0xFF10],
        [0xB2, 0xBD, 0x2162, 0x2460]
    );
    test_property!(numbers, "N", [0x30, 0xB2, 0xBD, 0x2162], [0x41]);
    test_property!(titlecase, "Lt", [0x1C5], [0x41, 0x61]);
    test_property!(greek_script, "Script=Greek", [0x3B1, 0x3A9], [0x61]);
    test_property!(greek_alias, "sc=Grek", [0x3B1], [0x61]);
    test_property!(alnum_counts_numerics, "Alnum", [0x41, 0xE9, 0x30, 0xB2], [0x5F, 0x20]);

    #[derive(Debug)]
    struct OnlyDigits;

    impl PropertyLookup for OnlyDigits {
        fn get_property(&self, name: &str) -> Option<CodePointSet> {
            (name == "Nd").then(ascii_digits)
        }
    }

    #[test]
    fn unknown_and_unavailable_properties() {
        assert_eq!(resolve_property(&OnlyDigits, "Nd"), Ok(ascii_digits()));
        assert_eq!(
            resolve_property(&OnlyDigits, "Lt"),
            Err(PropertyError::Unavailable("Lt".to_string()))
        );
        assert_eq!(resolve_property(&OnlyDigits, "Klingon"), Err(PropertyError::Unknown));
        assert_eq!(resolve_property(&StdProperties, "Greek!"), Err(PropertyError::Unknown));
        assert!(resolve_property(&StdProperties, "Lt").is_ok());
    }

    #[test]
    fn posix_classes() {
        let props = StdProperties;
        let alpha = posix_class("alpha", false, &props).unwrap();
        assert!(alpha.contains('q' as u32));
        assert!(!alpha.contains('é' as u32));
        let alpha = posix_class("alpha", true, &props).unwrap();
        assert!(alpha.contains('é' as u32));
        assert!(posix_class("alphabet", false, &props).is_none());
    }

    #[test]
    fn shorthands() {
        assert!(ascii_word().contains('_' as u32));
        assert!(ecmascript_space().contains(0xFEFF));
        assert_eq!(ascii_space().size(), 6);
    }
}
