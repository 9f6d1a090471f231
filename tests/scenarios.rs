use std::sync::Arc;

use regex_flavors::ast::{NodeKind, Quantifier};
use regex_flavors::flavor::ruby;
use regex_flavors::unicode::PropertyLookup;
use regex_flavors::{
    parse, parse_with, validate, CodePointSet, Encoding, Flavor, ParserOptions, RegexError,
};

fn syntax_error(result: Result<impl std::fmt::Debug, RegexError>) -> (String, usize) {
    match result {
        Err(RegexError::Syntax(e)) => (e.message, e.position),
        other => panic!("expected a syntax error, got {:?}", other),
    }
}

#[test]
fn bounded_quantifier_on_a_literal() {
    let parsed = parse("a{2,5}", "", Flavor::EcmaScript, Encoding::Utf16).unwrap();
    assert_eq!(parsed.ast.to_string(), "a{2,5}");
    let quantified: Vec<_> = parsed
        .ast
        .preorder()
        .into_iter()
        .filter_map(|id| {
            let node = parsed.ast.node(id);
            match (&node.kind, node.quantifier) {
                (NodeKind::CharacterClass(set), Some(q)) => Some((set.single_code_point(), q)),
                _ => None,
            }
        })
        .collect();
    assert_eq!(quantified, vec![(Some('a' as u32), Quantifier::new(2, Some(5)))]);
}

#[test]
fn double_quantifiers_merge_for_oracle() {
    let parsed = parse("a{1,3}{2,5}?", "", Flavor::Oracle, Encoding::Utf16).unwrap();
    assert_eq!(parsed.ast.to_string(), "a{2,5}?");
}

#[test]
fn sharp_s_stays_alone_in_ascii() {
    let options = ParserOptions::default().with_encoding(Encoding::Ascii);
    let translated = ruby::translate("(?i)ß", "", &options).unwrap();
    assert_eq!(translated.pattern, "(?:\\u{df})");
    let parsed = parse_with("(?i)ß", "", Flavor::Ruby, &options).unwrap();
    assert_eq!(parsed.ast.to_string(), "(?:\\u{df})");
}

#[test]
fn oracle_class_guards_the_longer_string() {
    let parsed = parse("[sß]", "i", Flavor::Oracle, Encoding::Utf16).unwrap();
    assert_eq!(
        parsed.ast.to_string(),
        "(?:[Ss\\u{17f}](?:[Ss\\u{17f}]|(?![Ss\\u{17f}]))|[\\u{df}\\u{1e9e}])"
    );
}

#[test]
fn reference_without_groups() {
    let (message, position) = syntax_error(parse("\\1", "", Flavor::Python, Encoding::Utf16));
    assert_eq!(message, "invalid group reference 1");
    assert_eq!(position, 0);
}

#[test]
fn reference_into_open_group_is_dead() {
    let parsed = parse("(a\\1)", "", Flavor::Python, Encoding::Utf16).unwrap();
    assert_eq!(parsed.ast.to_string(), "(a[])");
}

#[test]
fn redefined_group_name() {
    let (message, position) =
        syntax_error(parse("(?P<a>x)(?P<a>y)", "", Flavor::Python, Encoding::Utf16));
    assert_eq!(message, "redefinition of group name 'a' as group 2; was group 1");
    assert_eq!(position, 8);
}

#[test]
fn mutually_recursive_calls() {
    let err = parse(
        "(?<a>x\\g<b>)(?<b>y\\g<a>)",
        "",
        Flavor::Ruby,
        Encoding::Utf16,
    )
    .unwrap_err();
    assert_eq!(
        err,
        RegexError::unsupported("recursive subexpression calls are not supported")
    );
    assert!(validate("(?<a>x\\g<b>)(?<b>y\\g<a>)", "", Flavor::Ruby).is_ok());
}

#[test]
fn every_flavor_parses_a_plain_pattern() {
    for flavor in Flavor::ALL {
        let parsed = parse("ab*|c", "", flavor, Encoding::Utf8).unwrap();
        assert_eq!(parsed.ast.to_string(), "ab*|c", "{}", flavor);
        assert_eq!(parsed.traits, flavor.traits());
    }
}

#[derive(Debug)]
struct OnlyZero;

impl PropertyLookup for OnlyZero {
    fn get_property(&self, name: &str) -> Option<CodePointSet> {
        (name == "Nd").then(|| CodePointSet::from_code_point('0' as u32))
    }
}

#[test]
fn shorthands_use_the_supplied_property_lookup() {
    let options = ParserOptions {
        properties: Arc::new(OnlyZero),
        ..ParserOptions::default()
    };
    for flavor in [Flavor::Python, Flavor::Oracle] {
        let parsed = parse_with("\\d", "", flavor, &options).unwrap();
        assert_eq!(parsed.ast.to_string(), "0", "{}", flavor);
    }
}

#[test]
fn python_digits_exclude_other_numerics() {
    let parsed = parse("\\d", "", Flavor::Python, Encoding::Utf32).unwrap();
    let class = parsed
        .ast
        .preorder()
        .into_iter()
        .find_map(|id| match &parsed.ast.node(id).kind {
            NodeKind::CharacterClass(set) => Some(set.clone()),
            _ => None,
        })
        .unwrap();
    for numeric in [0xB2, 0xBD, 0x2162, 0x2460] {
        assert!(!class.contains(numeric), "{:#x}", numeric);
    }
}

#[test]
fn valid_properties_pass_validation() {
    assert!(validate("\\p{Script=Greek}", "u", Flavor::EcmaScript).is_ok());
    assert!(validate("\\p{Lt}", "u", Flavor::EcmaScript).is_ok());
    assert!(validate("\\p{Greek}", "", Flavor::Ruby).is_ok());
    let result = parse("\\p{Nope}", "u", Flavor::EcmaScript, Encoding::Utf16);
    let (message, position) = syntax_error(result);
    assert_eq!((message.as_str(), position), ("Invalid property name", 0));
}

#[test]
fn bad_flags_are_reported_before_unicode_sets() {
    let result = parse("a", "vq", Flavor::EcmaScript, Encoding::Utf16);
    let (message, position) = syntax_error(result);
    assert_eq!(position, 0);
    assert!(message.starts_with("Invalid flags"), "{}", message);
}
