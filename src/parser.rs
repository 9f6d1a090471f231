//! Token-driven parser shared by the ECMAScript, Python and Oracle dialects.
//!
//! Tokens are turned into [`AstBuilder`] calls one at a time. Literal characters are buffered and
//! flushed as one run right before the next non-literal token, since case-insensitive unfolding
//! has to see the whole run.

use std::sync::Arc;

use crate::ast::{AstBuilder, LookAroundKind, NamedGroups, Quantifier, QuantifierError, RegexAst};
use crate::casefold::{closure, locale_fold_data, unfold_string, LocaleFoldData};
use crate::charset::{AccumulatorPool, CodePointSet};
use crate::error::{RegexError, Result};
use crate::flags::RegexFlags;
use crate::flavor::oracle_trie;
use crate::lexer::{ClassItem, Dialect, ErrorKind, Lexer, Token, TokenKind};
use crate::ParserOptions;

/// The locale assumed for `re.LOCALE` when the options name none.
const DEFAULT_LOCALE: &str = "C";

#[derive(Debug, Clone)]
pub(crate) struct ParsedAst {
    pub ast: RegexAst,
    pub named_groups: NamedGroups,
}

#[derive(Debug, Clone, Copy)]
enum ScopeKind {
    Group,
    Capture,
    LookAhead,
    /// Remembers how many capture groups were opened before the lookbehind.
    LookBehind { groups_before: u32 },
}

#[derive(Debug, Clone, Copy)]
struct Scope {
    kind: ScopeKind,
    position: usize,
}

pub(crate) struct RegexParser<'a, D: Dialect> {
    dialect: &'a D,
    lexer: Lexer<'a, D>,
    builder: AstBuilder,
    options: &'a ParserOptions,
    silent: bool,
    literals: Vec<u32>,
    literal_flags: D::Flags,
    named_groups: NamedGroups,
    scopes: Vec<Scope>,
    pool: AccumulatorPool,
    locale: Option<Arc<LocaleFoldData>>,
}

impl<'a, D: Dialect> RegexParser<'a, D> {
    pub fn new(
        dialect: &'a D,
        pattern: &str,
        flags: D::Flags,
        options: &'a ParserOptions,
        silent: bool,
    ) -> Self {
        RegexParser {
            dialect,
            lexer: Lexer::new(dialect, pattern, flags, options.properties.as_ref(), silent),
            builder: AstBuilder::new().with_quantifier_merging(dialect.merge_double_quantifiers()),
            options,
            silent,
            literals: vec![],
            literal_flags: flags,
            named_groups: NamedGroups::new(),
            scopes: vec![],
            pool: AccumulatorPool::new(),
            locale: None,
        }
    }

    pub fn parse(mut self) -> Result<ParsedAst> {
        log::debug!(
            "parsing {} pattern, {} groups",
            self.dialect.name(),
            self.lexer.total_groups()
        );
        while let Some(token) = self.lexer.next_token()? {
            match token.kind {
                TokenKind::Literal(c) => self.buffer_literal(c),
                TokenKind::Quantifier { quantifier, text } => {
                    self.flush_all_but_last()?;
                    self.quantify(quantifier, &text, token.position)?;
                }
                kind => {
                    self.flush_literals()?;
                    self.handle(Token {
                        kind,
                        position: token.position,
                    })?;
                }
            }
        }
        self.flush_literals()?;
        if let Some(scope) = self.scopes.last() {
            return Err(self.lexer.error(ErrorKind::UnterminatedGroup, scope.position));
        }
        let position = self.lexer.position();
        let ast = self
            .builder
            .finish()
            .map_err(|_| self.lexer.error(ErrorKind::UnterminatedGroup, position))?;
        Ok(ParsedAst {
            ast,
            named_groups: self.named_groups,
        })
    }

    fn unsupported(&self, feature: &str) -> Result<()> {
        if self.silent {
            Ok(())
        } else {
            Err(RegexError::unsupported(feature))
        }
    }

    fn handle(&mut self, token: Token) -> Result<()> {
        let position = token.position;
        let flags = self.lexer.flags();
        match token.kind {
            TokenKind::CharClass(set) => {
                let set = self.case_closure(&set, flags)?;
                self.builder
                    .add_char_class(set.clip(self.options.encoding.full_range()));
            }
            TokenKind::ClassBegin { negated } => self.parse_class(negated, position)?,
            TokenKind::CaptureGroupBegin { name } => {
                let number = self.builder.push_capture_group();
                if let Some(name) = name {
                    let previous = self.named_groups.get(&name).and_then(|g| g.first().copied());
                    if let Some(previous) = previous {
                        if !self.dialect.duplicate_group_names() {
                            let kind = ErrorKind::DuplicateGroupName {
                                name,
                                group: number,
                                previous,
                            };
                            return Err(self.lexer.error(kind, position));
                        }
                    }
                    self.named_groups.insert(&name, number);
                }
                self.open(ScopeKind::Capture, position);
            }
            TokenKind::GroupBegin => {
                self.builder.push_group();
                self.open(ScopeKind::Group, position);
            }
            TokenKind::AtomicGroupBegin => {
                if !self.options.ignore_atomic_groups {
                    self.unsupported("atomic groups")?;
                }
                self.builder.push_group();
                self.open(ScopeKind::Group, position);
            }
            TokenKind::ConditionalGroupBegin => {
                self.unsupported("conditional back-reference groups")?;
                self.builder.push_group();
                self.open(ScopeKind::Group, position);
            }
            TokenKind::LookAroundBegin { kind, negated } => {
                self.builder.push_look_around(kind, negated);
                let scope = match kind {
                    LookAroundKind::Ahead => ScopeKind::LookAhead,
                    LookAroundKind::Behind => ScopeKind::LookBehind {
                        groups_before: self.builder.group_count(),
                    },
                };
                self.open(scope, position);
            }
            TokenKind::GroupEnd => {
                self.scopes.pop();
                if self.builder.pop_group().is_none() {
                    return Err(self.lexer.error(ErrorKind::UnmatchedParenthesis, position));
                }
            }
            TokenKind::Alternation => self.builder.next_alternative(),
            TokenKind::Anchor(anchor) => self.builder.add_anchor(&anchor),
            TokenKind::WordBoundary { negated } => {
                let word = self.dialect.word_set(flags, self.options.properties.as_ref());
                let word = self.case_closure(&word, flags)?;
                let word = word.clip(self.options.encoding.full_range());
                self.builder.add_word_boundary(&word, negated);
            }
            TokenKind::BackReference(number) => self.numbered_reference(number, position)?,
            TokenKind::NamedBackReference(name) => {
                let groups = if self.dialect.forward_references() {
                    self.lexer.groups_named(&name)
                } else {
                    self.named_groups
                        .get(&name)
                        .map(<[u32]>::to_vec)
                        .unwrap_or_default()
                };
                if groups.is_empty() {
                    return Err(self.lexer.error(ErrorKind::UnknownGroupName(name), position));
                }
                self.checked_reference(groups, position)?;
            }
            TokenKind::SubexpressionCall(group) => {
                self.builder.add_subexpression_call(group, None);
            }
            TokenKind::Literal(c) => self.buffer_literal(c),
            TokenKind::Quantifier { quantifier, text } => {
                self.quantify(quantifier, &text, position)?
            }
            TokenKind::ClassItem(_) | TokenKind::ClassEnd => {
                return Err(self.lexer.error(ErrorKind::UnterminatedClass, position));
            }
        }
        Ok(())
    }

    fn open(&mut self, kind: ScopeKind, position: usize) {
        self.scopes.push(Scope { kind, position });
    }

    fn buffer_literal(&mut self, c: u32) {
        if self.literals.is_empty() {
            self.literal_flags = self.lexer.flags();
        }
        self.literals.push(c);
    }

    fn flush_literals(&mut self) -> Result<()> {
        let run = std::mem::take(&mut self.literals);
        self.emit_literals(&run)
    }

    /// Flushes the buffered run except its last character, which then stands alone as the term
    /// a quantifier applies to.
    fn flush_all_but_last(&mut self) -> Result<()> {
        let mut run = std::mem::take(&mut self.literals);
        let Some(last) = run.pop() else {
            return Ok(());
        };
        self.emit_literals(&run)?;
        self.emit_literals(&[last])
    }

    fn emit_literals(&mut self, run: &[u32]) -> Result<()> {
        if run.is_empty() {
            return Ok(());
        }
        let flags = self.literal_flags;
        let full = self.options.encoding.full_range();
        if !flags.ignore_case() {
            for &c in run {
                self.builder
                    .add_char_class(CodePointSet::from_code_point(c).clip(full));
            }
            return Ok(());
        }
        match self.dialect.fold_algorithm(flags) {
            Some(algorithm) if algorithm.has_multi_code_point_folds() => {
                unfold_string(run, algorithm, full, false, &mut self.builder)?;
            }
            _ => {
                for &c in run {
                    let set = self.case_closure(&CodePointSet::from_code_point(c), flags)?;
                    self.builder.add_char_class(set.clip(full));
                }
            }
        }
        Ok(())
    }

    fn case_closure(&mut self, set: &CodePointSet, flags: D::Flags) -> Result<CodePointSet> {
        if !flags.ignore_case() {
            return Ok(set.clone());
        }
        match self.dialect.fold_algorithm(flags) {
            Some(algorithm) => Ok(closure(set, algorithm, |_, _| true)),
            None => Ok(match self.locale_data()? {
                Some(data) => data.closure(set),
                None => set.clone(),
            }),
        }
    }

    /// Case data for `re.LOCALE`. `None` only while validating, when the locale is unknown.
    fn locale_data(&mut self) -> Result<Option<Arc<LocaleFoldData>>> {
        if self.locale.is_none() {
            let locale = self.options.locale.as_deref().unwrap_or(DEFAULT_LOCALE);
            match locale_fold_data(locale) {
                Ok(data) => self.locale = Some(data),
                Err(_) if self.silent => return Ok(None),
                Err(e) => return Err(e.into()),
            }
        }
        Ok(self.locale.clone())
    }

    fn quantify(&mut self, quantifier: Quantifier, text: &str, position: usize) -> Result<()> {
        let flags = self.lexer.flags();
        if let Some(kind) = self.builder.last_term_look_around() {
            if !self.dialect.quantifiable_look_around(kind, flags) {
                return Err(self.lexer.error(ErrorKind::NothingToRepeat, position));
            }
        }
        match self.builder.add_quantifier(quantifier) {
            Ok(()) => Ok(()),
            Err(QuantifierError::NothingToRepeat) if self.dialect.lone_quantifier_literal() => {
                for c in text.chars() {
                    self.buffer_literal(c as u32);
                }
                Ok(())
            }
            Err(QuantifierError::NothingToRepeat) => {
                Err(self.lexer.error(ErrorKind::NothingToRepeat, position))
            }
            Err(QuantifierError::MultipleRepeat) => {
                Err(self.lexer.error(ErrorKind::MultipleRepeat, position))
            }
        }
    }

    fn parse_class(&mut self, negated: bool, position: usize) -> Result<()> {
        let flags = self.lexer.flags();
        let mut acc = self.pool.take();
        loop {
            let token = self.lexer.next_token()?;
            match token.map(|t| t.kind) {
                Some(TokenKind::ClassItem(ClassItem::Char(c))) => acc.add_code_point(c),
                Some(TokenKind::ClassItem(ClassItem::Range(lo, hi))) => {
                    acc.add_set(&CodePointSet::from_range(lo, hi))
                }
                Some(TokenKind::ClassItem(ClassItem::Set(set))) => acc.add_set(&set),
                Some(TokenKind::ClassEnd) => break,
                _ => {
                    self.pool.give_back(acc);
                    return Err(self.lexer.error(ErrorKind::UnterminatedClass, position));
                }
            }
        }
        let set = acc.to_code_point_set();
        self.pool.give_back(acc);
        let full = self.options.encoding.full_range();

        if flags.ignore_case() && self.dialect.class_trie() {
            if let Some(algorithm) = self.dialect.fold_algorithm(flags) {
                return oracle_trie::emit_class(&set, negated, algorithm, full, &mut self.builder);
            }
        }
        let set = self.case_closure(&set, flags)?;
        let set = if negated {
            set.invert(full)
        } else {
            set.clip(full)
        };
        self.builder.add_char_class(set);
        Ok(())
    }

    fn numbered_reference(&mut self, number: u32, position: usize) -> Result<()> {
        let seen = self.builder.group_count();
        let forward = self.dialect.forward_references() && number <= self.lexer.total_groups();
        if number == 0 || (number > seen && !forward) {
            return Err(self
                .lexer
                .error(ErrorKind::InvalidGroupReference(number), position));
        }
        self.checked_reference(vec![number], position)
    }

    /// Adds a back-reference to `groups` once the dialect's legality rules are satisfied.
    fn checked_reference(&mut self, groups: Vec<u32>, position: usize) -> Result<()> {
        let open = self.builder.open_capture_groups();
        if self.dialect.open_group_reference_is_dead() && groups.iter().all(|g| open.contains(g)) {
            self.builder.add_dead();
            return Ok(());
        }
        if !self.dialect.lookbehind_group_references() {
            let outermost = self.scopes.iter().find_map(|s| match s.kind {
                ScopeKind::LookBehind { groups_before } => Some(groups_before),
                _ => None,
            });
            if let Some(before) = outermost {
                if groups.iter().any(|&g| g > before) {
                    return Err(self
                        .lexer
                        .error(ErrorKind::LookbehindGroupReference, position));
                }
            }
        }
        let ignore_case = self.lexer.flags().ignore_case();
        self.builder.add_back_reference(groups, ignore_case);
        Ok(())
    }
}

/// Parses `pattern` with `dialect`, reading the flags string with the dialect's rules.
pub(crate) fn parse_tokens<D: Dialect>(
    dialect: &D,
    pattern: &str,
    flags: &str,
    options: &ParserOptions,
    silent: bool,
) -> Result<ParsedAst> {
    let flags = dialect
        .parse_flags(flags)
        .map_err(|message| RegexError::syntax(message, 0))?;
    RegexParser::new(dialect, pattern, flags, options, silent).parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::Encoding;
    use crate::flavor::ecmascript::EcmaScriptDialect;
    use crate::flavor::oracle::OracleDialect;
    use crate::flavor::python::PythonDialect;

    fn es(pattern: &str, flags: &str) -> Result<ParsedAst> {
        parse_tokens(
            &EcmaScriptDialect::default(),
            pattern,
            flags,
            &ParserOptions::default(),
            false,
        )
    }

    fn py(pattern: &str, flags: &str) -> Result<ParsedAst> {
        parse_tokens(
            &PythonDialect::default(),
            pattern,
            flags,
            &ParserOptions::default(),
            false,
        )
    }

    fn ora(pattern: &str, flags: &str) -> Result<ParsedAst> {
        parse_tokens(
            &OracleDialect,
            pattern,
            flags,
            &ParserOptions::default(),
            false,
        )
    }

    macro_rules! test_parse {
        ($name:ident, $parsed:expr, $expected:expr) => {
            #[test]
            fn $name() {
                match $parsed {
                    Ok(parsed) => assert_eq!(parsed.ast.to_string(), $expected),
                    Err(e) => panic!("failed to parse: {}", e),
                }
            }
        };
    }

    macro_rules! test_error {
        ($name:ident, $parsed:expr, $message:expr, $position:expr) => {
            #[test]
            fn $name() {
                match $parsed {
                    Err(RegexError::Syntax(e)) => {
                        assert_eq!(e.message, $message);
                        assert_eq!(e.position, $position);
                    }
                    other => panic!("expected a syntax error, got {:?}", other.map(|p| p.ast)),
                }
            }
        };
    }

    test_parse!(single_char, es("a", ""), "a");
    test_parse!(bounded_repeat, es("a{2,5}", ""), "a{2,5}");
    test_parse!(quantifier_takes_last_literal, es("abc+", ""), "abc+");
    test_parse!(lazy_star, es("a*?b", ""), "a*?b");
    test_parse!(alternation, es("ab|c", ""), "ab|c");
    test_parse!(capture_groups, es("(a)(?:b)", ""), "(a)(?:b)");
    test_parse!(look_arounds, es("(?=a)(?<!b)", ""), "(?=a)(?<!b)");
    test_parse!(class_range, es("[a-c]", ""), "[a-c]");
    test_parse!(
        negated_class,
        parse_tokens(
            &EcmaScriptDialect::default(),
            "[^a]",
            "",
            &ParserOptions::default().with_encoding(Encoding::Ascii),
            false
        ),
        "[\\u{0}-`b-\\u{7f}]"
    );
    test_parse!(ignore_case_literal, es("a", "i"), "[Aa]");
    test_parse!(ignore_case_class, es("[a-b]", "i"), "[ABab]");
    test_parse!(
        scoped_ignore_case,
        es("a(?i:b)c", ""),
        "a(?:[Bb])c"
    );
    test_parse!(
        multiline_caret,
        es("^a", "m"),
        "(?:^|(?<=[\\u{a}\\u{d}\\u{2028}\\u{2029}]))a"
    );
    test_parse!(back_reference, es("(a)\\1", ""), "(a)\\1");
    test_parse!(
        es_reference_to_open_group_is_kept,
        es("(a\\1)", ""),
        "(a\\1)"
    );
    test_parse!(named_reference, es("(?<x>a)\\k<x>", ""), "(a)\\1");

    test_parse!(python_dollar, py("a$", ""), "a(?:$|(?=\\u{a}$))");
    test_parse!(python_open_group_reference, py("(a\\1)", ""), "(a[])");
    test_parse!(python_named_reference, py("(?P<n>a)(?P=n)", ""), "(a)\\1");
    test_parse!(python_possessive, py("a*+", ""), "a*+");
    test_parse!(python_global_flags, py("(?i)k", ""), "[Kk\\u{212a}]");
    test_parse!(python_ascii_ignore_case, py("k", "ia"), "[Kk]");
    test_parse!(python_comment, py("a(?#x)b", ""), "ab");

    test_parse!(oracle_lone_quantifier, ora("*a", ""), "\\*a");
    test_parse!(oracle_merged_quantifiers, ora("a{1,3}{2,5}?", ""), "a{2,5}?");
    test_parse!(oracle_wrapped_quantifier, ora("a{2}*", ""), "(?:a{2})*");

    test_error!(
        unterminated_group,
        py("(a", ""),
        "missing ), unterminated subpattern",
        0
    );
    test_error!(nothing_to_repeat, es("*", ""), "Nothing to repeat", 0);
    test_error!(python_multiple_repeat, py("a**", ""), "multiple repeat", 2);
    test_error!(
        invalid_group_reference,
        py("\\1", ""),
        "invalid group reference 1",
        0
    );
    test_error!(
        lookbehind_reference,
        py("(?<=(a)\\1)", ""),
        "cannot refer to group defined in the same lookbehind subpattern",
        7
    );
    test_error!(
        python_duplicate_name,
        py("(?P<a>x)(?P<a>y)", ""),
        "redefinition of group name 'a' as group 2; was group 1",
        8
    );
    test_error!(
        es_duplicate_name,
        es("(?<a>x)(?<a>y)", ""),
        "Duplicate capture group name",
        7
    );
    test_error!(
        lookbehind_quantifier,
        es("(?<=a)*", ""),
        "Nothing to repeat",
        6
    );
    test_error!(
        oracle_bad_reference,
        ora("(a)\\2", ""),
        "ORA-12727: invalid back reference in regular expression",
        3
    );

    #[test]
    fn atomic_groups_are_unsupported_unless_ignored() {
        let err = py("(?>a)", "").unwrap_err();
        assert_eq!(err, RegexError::unsupported("atomic groups"));
        let options = ParserOptions {
            ignore_atomic_groups: true,
            ..ParserOptions::default()
        };
        let parsed = parse_tokens(&PythonDialect::default(), "(?>a)", "", &options, false).unwrap();
        assert_eq!(parsed.ast.to_string(), "(?:a)");
    }

    #[test]
    fn silent_mode_accepts_unsupported() {
        let parsed = parse_tokens(
            &PythonDialect::default(),
            "(a)(?(1)b|c)",
            "",
            &ParserOptions::default(),
            true,
        )
        .unwrap();
        assert_eq!(parsed.ast.group_count(), 1);
    }

    #[test]
    fn named_groups_table() {
        let parsed = py("(?P<a>x)(y)(?P<b>z)", "").unwrap();
        assert_eq!(parsed.named_groups.to_string(), "a => 1, b => 3");
    }
}
