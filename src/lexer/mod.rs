//! The tokenizer shared by the token-driven dialects.
//!
//! [`Lexer`] walks the pattern by codepoint and produces [`Token`]s on demand. The grammar common
//! to all dialects lives here; everything a dialect does differently is asked of its [`Dialect`].
//! Scoped inline flags are tracked on a [`FlagsStack`] that mirrors group nesting, so the flags
//! in effect for the token just returned are always [`Lexer::flags`].

mod dialect;

pub use dialect::{Dialect, ErrorKind, InlineFlagSyntax, NamedGroupSyntax};

use std::collections::VecDeque;

use crate::ast::builder::Anchor;
use crate::ast::{LookAroundKind, Quantifier};
use crate::charset::{CodePointSet, MAX_CODE_POINT};
use crate::error::{RegexError, Result};
use crate::flags::FlagsStack;
use crate::unicode::{posix_class, PropertyError, PropertyLookup};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassItem {
    Char(u32),
    Range(u32, u32),
    Set(CodePointSet),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Literal(u32),
    /// `.`, `\d`, `\p{..}` and other single-character sets outside brackets.
    CharClass(CodePointSet),
    ClassBegin {
        negated: bool,
    },
    ClassItem(ClassItem),
    ClassEnd,
    /// `text` is the quantifier as written, for dialects that treat a lone one as literal text.
    Quantifier {
        quantifier: Quantifier,
        text: String,
    },
    CaptureGroupBegin {
        name: Option<String>,
    },
    GroupBegin,
    AtomicGroupBegin,
    LookAroundBegin {
        kind: LookAroundKind,
        negated: bool,
    },
    ConditionalGroupBegin,
    GroupEnd,
    Alternation,
    Anchor(Anchor),
    WordBoundary {
        negated: bool,
    },
    BackReference(u32),
    NamedBackReference(String),
    SubexpressionCall(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: usize,
}

#[derive(Debug)]
enum Atom {
    Char(u32),
    Set(CodePointSet),
}

impl Atom {
    fn into_item(self) -> ClassItem {
        match self {
            Atom::Char(c) => ClassItem::Char(c),
            Atom::Set(set) => ClassItem::Set(set),
        }
    }
}

#[derive(Debug)]
struct ClassState {
    start: usize,
    first: bool,
}

fn octal_digit(c: Option<char>) -> Option<u32> {
    c.and_then(|c| c.to_digit(8))
}

fn surrogates(c: u32) -> (u32, u32) {
    let v = c - 0x10000;
    (0xD800 + (v >> 10), 0xDC00 + (v & 0x3FF))
}

#[derive(Debug)]
pub struct Lexer<'a, D: Dialect> {
    dialect: &'a D,
    properties: &'a dyn PropertyLookup,
    pattern: Vec<char>,
    index: usize,
    flags: FlagsStack<D::Flags>,
    class: Option<ClassState>,
    pending: VecDeque<Token>,
    emitted: bool,
    group_count: u32,
    group_names: Vec<(String, u32)>,
    silent: bool,
}

impl<'a, D: Dialect> Lexer<'a, D> {
    pub fn new(
        dialect: &'a D,
        pattern: &str,
        flags: D::Flags,
        properties: &'a dyn PropertyLookup,
        silent: bool,
    ) -> Self {
        let mut lexer = Lexer {
            dialect,
            properties,
            pattern: pattern.chars().collect(),
            index: 0,
            flags: FlagsStack::new(flags),
            class: None,
            pending: VecDeque::new(),
            emitted: false,
            group_count: 0,
            group_names: vec![],
            silent,
        };
        lexer.prescan();
        lexer
    }

    /// Flags in effect at the current position.
    pub fn flags(&self) -> D::Flags {
        self.flags.current()
    }

    pub fn global_flags(&self) -> D::Flags {
        self.flags.global()
    }

    pub fn position(&self) -> usize {
        self.index
    }

    /// Capture groups in the whole pattern.
    pub fn total_groups(&self) -> u32 {
        self.group_count
    }

    /// Numbers of the groups called `name`, in pattern order.
    pub fn groups_named(&self, name: &str) -> Vec<u32> {
        self.group_names
            .iter()
            .filter(|(n, _)| n == name)
            .map(|&(_, g)| g)
            .collect()
    }

    pub fn error(&self, kind: ErrorKind, position: usize) -> RegexError {
        RegexError::syntax(self.dialect.message(&kind), position)
    }

    pub fn next_token(&mut self) -> Result<Option<Token>> {
        loop {
            if let Some(token) = self.pending.pop_front() {
                log::trace!("{} token {:?}", self.dialect.name(), token);
                return Ok(Some(token));
            }
            if let Some(class) = &self.class {
                if self.peek().is_none() {
                    return Err(self.error(ErrorKind::UnterminatedClass, class.start));
                }
                self.lex_class_item()?;
                continue;
            }
            self.skip_verbose();
            if self.peek().is_none() {
                return Ok(None);
            }
            self.lex()?;
        }
    }

    fn peek(&self) -> Option<char> {
        self.pattern.get(self.index).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.pattern.get(self.index + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.index += 1;
        Some(c)
    }

    fn eat(&mut self, c: char) -> bool {
        let hit = self.peek() == Some(c);
        if hit {
            self.index += 1;
        }
        hit
    }

    fn text(&self, start: usize) -> String {
        self.pattern[start..self.index].iter().collect()
    }

    fn emit(&mut self, kind: TokenKind, position: usize) {
        self.emitted = true;
        self.pending.push_back(Token { kind, position });
    }

    fn emit_literal(&mut self, c: char, position: usize) {
        let c = c as u32;
        if c > 0xFFFF && self.dialect.split_astral_literals(self.flags()) {
            let (hi, lo) = surrogates(c);
            self.emit(TokenKind::Literal(hi), position);
            self.emit(TokenKind::Literal(lo), position);
        } else {
            self.emit(TokenKind::Literal(c), position);
        }
    }

    /// Pushes a scope for the group being opened; `)` pops it.
    fn open(&mut self, kind: TokenKind, position: usize) {
        self.flags.push_current();
        self.emit(kind, position);
    }

    /// Counts capture groups and collects group names ahead of time, so references can look
    /// forward.
    fn prescan(&mut self) {
        let angle = self.dialect.named_group_syntax() == NamedGroupSyntax::Angle;
        let python = self.dialect.named_group_syntax() == NamedGroupSyntax::Python;
        let p = &self.pattern;
        let mut count = 0;
        let mut names = vec![];
        let mut in_class = false;
        let mut i = 0;
        while i < p.len() {
            match p[i] {
                '\\' if !in_class || self.dialect.escapes_in_classes() => i += 1,
                '[' if !in_class => {
                    in_class = true;
                    if self.dialect.leading_bracket_literal() {
                        if p.get(i + 1) == Some(&'^') {
                            i += 1;
                        }
                        if p.get(i + 1) == Some(&']') {
                            i += 1;
                        }
                    }
                }
                ']' if in_class => in_class = false,
                '(' if !in_class => {
                    if p.get(i + 1) != Some(&'?') {
                        count += 1;
                    } else {
                        let name_start = if angle
                            && p.get(i + 2) == Some(&'<')
                            && !matches!(p.get(i + 3), Some(&'=') | Some(&'!'))
                        {
                            Some(i + 3)
                        } else if python && p.get(i + 2) == Some(&'P') && p.get(i + 3) == Some(&'<')
                        {
                            Some(i + 4)
                        } else {
                            None
                        };
                        if let Some(s) = name_start {
                            count += 1;
                            if let Some(len) = p[s..].iter().position(|&c| c == '>') {
                                names.push((p[s..s + len].iter().collect(), count));
                            }
                        }
                    }
                }
                _ => {}
            }
            i += 1;
        }
        self.group_count = count;
        self.group_names = names;
    }

    fn skip_verbose(&mut self) {
        if !self.dialect.verbose_mode(self.flags()) {
            return;
        }
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.index += 1;
            } else if c == '#' && self.dialect.verbose_comments() {
                while let Some(c) = self.advance() {
                    if c == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    fn lex(&mut self) -> Result<()> {
        let start = self.index;
        let Some(c) = self.advance() else {
            return Ok(());
        };
        let flags = self.flags();
        match c {
            '\\' => self.lex_escape(start)?,
            '[' => {
                let negated = self.eat('^');
                self.class = Some(ClassState { start, first: true });
                self.emit(TokenKind::ClassBegin { negated }, start);
            }
            '(' => self.lex_group(start)?,
            ')' => {
                if self.flags.pop().is_none() {
                    return Err(self.error(ErrorKind::UnmatchedParenthesis, start));
                }
                self.emit(TokenKind::GroupEnd, start);
            }
            '|' => self.emit(TokenKind::Alternation, start),
            '.' => self.emit(TokenKind::CharClass(self.dialect.dot_set(flags)), start),
            '^' => self.emit(TokenKind::Anchor(self.dialect.caret(flags)), start),
            '$' => self.emit(TokenKind::Anchor(self.dialect.dollar(flags)), start),
            '*' => self.lex_quantifier(start, 0, None),
            '+' => self.lex_quantifier(start, 1, None),
            '?' => self.lex_quantifier(start, 0, Some(1)),
            '{' => match self.interval() {
                Some((lower, upper)) => {
                    let (lower, upper) = self
                        .dialect
                        .quantifier_bounds(lower, upper)
                        .map_err(|k| self.error(k, start))?;
                    self.lex_quantifier(start, lower, upper);
                }
                None if self.dialect.braces_literal_when_invalid(flags) => {
                    self.emit_literal('{', start)
                }
                None => return Err(self.error(ErrorKind::IncompleteQuantifier, start)),
            },
            '}' | ']' => {
                self.dialect
                    .lone_bracket(c, flags)
                    .map_err(|k| self.error(k, start))?;
                self.emit_literal(c, start);
            }
            c => self.emit_literal(c, start),
        }
        Ok(())
    }

    fn digits(&mut self) -> Option<u64> {
        let start = self.index;
        let mut value: u64 = 0;
        while let Some(d) = self.peek().and_then(|c| c.to_digit(10)) {
            value = value.saturating_mul(10).saturating_add(d as u64);
            self.index += 1;
        }
        (self.index > start).then_some(value)
    }

    /// The body of `{n}`, `{n,}`, `{n,m}` or `{,m}` after the brace. Leaves the position alone
    /// when there is none.
    fn interval(&mut self) -> Option<(u64, Option<u64>)> {
        let save = self.index;
        let lower = self.digits();
        let bounds = if self.eat(',') {
            let upper = self.digits();
            if lower.is_none() && !self.dialect.lower_bound_optional() {
                None
            } else {
                Some((lower.unwrap_or(0), upper))
            }
        } else {
            lower.map(|l| (l, Some(l)))
        };
        match bounds {
            Some(bounds) if self.eat('}') => Some(bounds),
            _ => {
                self.index = save;
                None
            }
        }
    }

    fn lex_quantifier(&mut self, start: usize, lower: u32, upper: Option<u32>) {
        let mut quantifier = Quantifier::new(lower, upper);
        if self.dialect.lazy_quantifiers() && self.eat('?') {
            quantifier = quantifier.lazy();
        } else if self.dialect.possessive_quantifiers() && self.eat('+') {
            quantifier = quantifier.possessive();
        }
        let text = self.text(start);
        self.emit(TokenKind::Quantifier { quantifier, text }, start);
    }

    fn uses_named_references(&self) -> bool {
        self.dialect.named_group_syntax() == NamedGroupSyntax::Angle
            && (self.dialect.named_references(self.flags()) || !self.group_names.is_empty())
    }

    fn lex_escape(&mut self, start: usize) -> Result<()> {
        let Some(c) = self.advance() else {
            return Err(self.error(ErrorKind::TrailingBackslash, start));
        };
        match c {
            '1'..='9' => return self.lex_back_reference(start, c),
            'b' | 'B' if self.dialect.word_boundaries() => {
                self.emit(TokenKind::WordBoundary { negated: c == 'B' }, start);
                return Ok(());
            }
            'k' if self.uses_named_references() => {
                let name = self.reference_name(start)?;
                if self.groups_named(&name).is_empty() {
                    return Err(self.error(ErrorKind::UnknownGroupName(name), start));
                }
                self.emit(TokenKind::NamedBackReference(name), start);
                return Ok(());
            }
            'g' if self.dialect.subexpression_calls() => {
                let group = match (self.eat('<'), self.digits(), self.eat('>')) {
                    (true, Some(n), true) => n.min(u32::MAX as u64) as u32,
                    _ => return Err(self.error(ErrorKind::BadEscape(self.text(start)), start)),
                };
                self.emit(TokenKind::SubexpressionCall(group), start);
                return Ok(());
            }
            _ => {}
        }
        if let Some(anchor) = self.dialect.input_anchor(c) {
            self.emit(TokenKind::Anchor(anchor), start);
            return Ok(());
        }
        match self.atom_escape(start, c, false)? {
            Atom::Char(v) => self.emit(TokenKind::Literal(v), start),
            Atom::Set(set) => self.emit(TokenKind::CharClass(set), start),
        }
        Ok(())
    }

    /// `<name>` after `\k`.
    fn reference_name(&mut self, start: usize) -> Result<String> {
        if !self.eat('<') {
            return Err(self.error(ErrorKind::InvalidNamedReference, start));
        }
        let name_start = self.index;
        while let Some(c) = self.advance() {
            if c == '>' {
                let name: String = self.pattern[name_start..self.index - 1].iter().collect();
                if !name.is_empty() {
                    return Ok(name);
                }
                break;
            }
        }
        Err(self.error(ErrorKind::InvalidNamedReference, start))
    }

    fn lex_back_reference(&mut self, start: usize, first: char) -> Result<()> {
        let flags = self.flags();
        if self.dialect.three_digit_octal()
            && first <= '7'
            && octal_digit(self.peek()).is_some()
            && octal_digit(self.peek_at(1)).is_some()
        {
            self.index -= 1;
            let value = self.octal(start, 3)?;
            self.emit(TokenKind::Literal(value), start);
            return Ok(());
        }
        let mut number = first.to_digit(10).unwrap_or(0);
        let mut digits = 1;
        while digits < self.dialect.max_backreference_digits() {
            match self.peek().and_then(|c| c.to_digit(10)) {
                Some(d) => {
                    number = number.saturating_mul(10).saturating_add(d);
                    self.index += 1;
                    digits += 1;
                }
                None => break,
            }
        }
        if self.dialect.backreferences_checked_at_lex() && number > self.group_count {
            self.dialect
                .invalid_backreference(number, flags)
                .map_err(|k| self.error(k, start))?;
            self.index = start + 1;
            let value = self.legacy_octal();
            self.emit(TokenKind::Literal(value), start);
            return Ok(());
        }
        self.emit(TokenKind::BackReference(number), start);
        Ok(())
    }

    /// Annex B octal: up to three digits while the value stays within a byte. `8` and `9` stand
    /// for themselves.
    fn legacy_octal(&mut self) -> u32 {
        let Some(first) = self.advance() else {
            return 0;
        };
        let Some(mut value) = first.to_digit(8) else {
            return first as u32;
        };
        for _ in 0..2 {
            match octal_digit(self.peek()) {
                Some(d) if value * 8 + d <= 0o377 => {
                    value = value * 8 + d;
                    self.index += 1;
                }
                _ => break,
            }
        }
        value
    }

    /// Up to `max` octal digits; values above a byte are an error.
    fn octal(&mut self, start: usize, max: usize) -> Result<u32> {
        let mut value = 0;
        for _ in 0..max {
            match octal_digit(self.peek()) {
                Some(d) => {
                    value = value * 8 + d;
                    self.index += 1;
                }
                None => break,
            }
        }
        if value > 0o377 {
            return Err(self.error(ErrorKind::OctalOutOfRange(self.text(start)), start));
        }
        Ok(value)
    }

    /// Exactly `count` hex digits, or nothing consumed.
    fn hex(&mut self, count: usize) -> Option<u32> {
        let digits: Vec<u32> = self.pattern[self.index..]
            .iter()
            .take(count)
            .map_while(|c| c.to_digit(16))
            .collect();
        if digits.len() < count {
            return None;
        }
        self.index += count;
        Some(digits.iter().fold(0, |v, d| v * 16 + d))
    }

    /// The escape text an incomplete hex escape error quotes: the escape and the digits present.
    fn partial_hex(&self, start: usize, count: usize) -> String {
        let digits: String = self.pattern[self.index..]
            .iter()
            .take(count)
            .take_while(|c| c.is_ascii_hexdigit())
            .collect();
        format!("{}{}", self.text(start), digits)
    }

    fn atom_escape(&mut self, start: usize, c: char, in_class: bool) -> Result<Atom> {
        let flags = self.flags();
        if in_class && c == 'b' && self.dialect.backspace_in_class() {
            return Ok(Atom::Char(0x08));
        }
        if let Some(set) = self.dialect.shorthand_class(c, flags, self.properties) {
            return Ok(Atom::Set(set));
        }
        if let Some(v) = self.dialect.char_escape(c, flags) {
            return Ok(Atom::Char(v));
        }
        match c {
            '0' if self.dialect.octal_escapes(flags) => {
                self.index -= 1;
                let value = if self.dialect.three_digit_octal() {
                    self.octal(start, 3)?
                } else {
                    self.legacy_octal()
                };
                return Ok(Atom::Char(value));
            }
            '0' if self.dialect.null_escape() => {
                if self.peek().map_or(false, |c| c.is_ascii_digit()) {
                    return Err(self.error(ErrorKind::InvalidDecimalEscape, start));
                }
                return Ok(Atom::Char(0));
            }
            '1'..='7' if in_class && self.dialect.octal_escapes(flags) => {
                self.index -= 1;
                let value = if self.dialect.three_digit_octal() {
                    self.octal(start, 3)?
                } else {
                    self.legacy_octal()
                };
                return Ok(Atom::Char(value));
            }
            'x' if self.dialect.hex_escapes() => {
                if let Some(v) = self.hex(2) {
                    return Ok(Atom::Char(v));
                }
                let text = self.partial_hex(start, 2);
                self.dialect
                    .incomplete_hex_escape(&text, flags)
                    .map_err(|k| self.error(k, start))?;
                return Ok(Atom::Char('x' as u32));
            }
            'u' if self.dialect.braced_unicode_escapes(flags) && self.peek() == Some('{') => {
                return self.braced_unicode_escape(start);
            }
            'u' if self.dialect.short_unicode_escapes(flags) => {
                return self.short_unicode_escape(start);
            }
            'U' if self.dialect.long_unicode_escapes(flags) => {
                let Some(v) = self.hex(8) else {
                    let text = self.partial_hex(start, 8);
                    return Err(self.error(ErrorKind::IncompleteEscape(text), start));
                };
                if v > MAX_CODE_POINT {
                    return Err(self.error(ErrorKind::BadEscape(self.text(start)), start));
                }
                return Ok(Atom::Char(v));
            }
            'c' if self.dialect.control_escapes() => match self.peek() {
                Some(l) if l.is_ascii_alphabetic() => {
                    self.index += 1;
                    return Ok(Atom::Char(l as u32 % 32));
                }
                _ => {
                    self.dialect
                        .invalid_control_escape(flags)
                        .map_err(|k| self.error(k, start))?;
                    self.index = start + 1;
                    return Ok(Atom::Char('\\' as u32));
                }
            },
            'p' | 'P' if self.dialect.property_escapes(flags) => {
                return self.property_escape(start, c == 'P');
            }
            'N' if self.dialect.named_char_escapes() => return self.named_char_escape(start),
            _ => {}
        }
        let v = self
            .dialect
            .unknown_escape(c, flags, in_class)
            .map_err(|k| self.error(k, start))?;
        Ok(Atom::Char(v))
    }

    fn braced_unicode_escape(&mut self, start: usize) -> Result<Atom> {
        self.index += 1;
        let digits_start = self.index;
        let mut value: u64 = 0;
        while let Some(d) = self.peek().and_then(|c| c.to_digit(16)) {
            value = (value * 16 + d as u64).min(u64::from(u32::MAX));
            self.index += 1;
        }
        if self.index == digits_start || !self.eat('}') || value > MAX_CODE_POINT as u64 {
            return Err(self.error(ErrorKind::InvalidUnicodeEscape, start));
        }
        Ok(Atom::Char(value as u32))
    }

    fn short_unicode_escape(&mut self, start: usize) -> Result<Atom> {
        let flags = self.flags();
        let Some(v) = self.hex(4) else {
            let text = self.partial_hex(start, 4);
            self.dialect
                .incomplete_unicode_escape(&text, flags)
                .map_err(|k| self.error(k, start))?;
            return Ok(Atom::Char('u' as u32));
        };
        if self.dialect.join_surrogate_escapes(flags)
            && (0xD800..=0xDBFF).contains(&v)
            && self.peek() == Some('\\')
            && self.peek_at(1) == Some('u')
        {
            let save = self.index;
            self.index += 2;
            match self.hex(4) {
                Some(lo) if (0xDC00..=0xDFFF).contains(&lo) => {
                    return Ok(Atom::Char(0x10000 + ((v - 0xD800) << 10) + (lo - 0xDC00)));
                }
                _ => self.index = save,
            }
        }
        Ok(Atom::Char(v))
    }

    fn property_escape(&mut self, start: usize, negated: bool) -> Result<Atom> {
        let invalid = |lexer: &Self| lexer.error(ErrorKind::InvalidPropertyName, start);
        if !self.eat('{') {
            return Err(invalid(self));
        }
        let name_start = self.index;
        while self.peek().map_or(false, |c| c != '}') {
            self.index += 1;
        }
        if !self.eat('}') || self.index - 1 == name_start {
            return Err(invalid(self));
        }
        let name: String = self.pattern[name_start..self.index - 1].iter().collect();
        let full = CodePointSet::from_range(0, MAX_CODE_POINT);
        let resolved = self.dialect.property(&name, negated, self.properties, &full);
        match resolved {
            Ok(set) => Ok(Atom::Set(set)),
            Err(PropertyError::Unknown) => Err(invalid(self)),
            Err(PropertyError::Unavailable(_)) if self.silent => Ok(Atom::Set(if negated {
                full
            } else {
                CodePointSet::empty()
            })),
            Err(PropertyError::Unavailable(name)) => Err(RegexError::unsupported(format!(
                "Unicode property {}",
                name
            ))),
        }
    }

    fn named_char_escape(&mut self, start: usize) -> Result<Atom> {
        if !self.eat('{') {
            return Err(self.error(ErrorKind::IncompleteEscape(self.text(start)), start));
        }
        while let Some(c) = self.advance() {
            if c == '}' {
                if self.silent {
                    return Ok(Atom::Char(0xFFFD));
                }
                return Err(RegexError::unsupported("named character escapes"));
            }
        }
        Err(self.error(ErrorKind::UnterminatedCharacterName, start))
    }

    fn lex_group(&mut self, start: usize) -> Result<()> {
        if !self.dialect.non_capturing_groups() || !self.eat('?') {
            self.open(TokenKind::CaptureGroupBegin { name: None }, start);
            return Ok(());
        }
        let syntax = self.dialect.named_group_syntax();
        let c = self.peek();
        match c {
            Some(':') => {
                self.index += 1;
                self.open(TokenKind::GroupBegin, start);
            }
            Some('=') | Some('!') if self.dialect.lookaheads() => {
                self.index += 1;
                let kind = LookAroundKind::Ahead;
                let negated = c == Some('!');
                self.open(TokenKind::LookAroundBegin { kind, negated }, start);
            }
            Some('<')
                if self.dialect.lookbehinds()
                    && matches!(self.peek_at(1), Some('=') | Some('!')) =>
            {
                let negated = self.peek_at(1) == Some('!');
                self.index += 2;
                let kind = LookAroundKind::Behind;
                self.open(TokenKind::LookAroundBegin { kind, negated }, start);
            }
            Some('<') if syntax == NamedGroupSyntax::Angle => {
                self.index += 1;
                let name = self.group_name('>')?;
                self.open(TokenKind::CaptureGroupBegin { name: Some(name) }, start);
            }
            Some('P') if syntax == NamedGroupSyntax::Python => {
                self.index += 1;
                match self.advance() {
                    Some('<') => {
                        let name = self.group_name('>')?;
                        self.open(TokenKind::CaptureGroupBegin { name: Some(name) }, start);
                    }
                    Some('=') => {
                        let name = self.group_name(')')?;
                        self.emit(TokenKind::NamedBackReference(name), start);
                    }
                    other => {
                        let text = format!("?P{}", other.map(String::from).unwrap_or_default());
                        return Err(self.error(ErrorKind::UnknownExtension(text), start));
                    }
                }
            }
            Some('#') if self.dialect.comment_groups() => loop {
                match self.advance() {
                    Some(')') => break,
                    Some(_) => {}
                    None => return Err(self.error(ErrorKind::UnterminatedComment, start)),
                }
            },
            Some('>') if self.dialect.atomic_groups() => {
                self.index += 1;
                self.open(TokenKind::AtomicGroupBegin, start);
            }
            Some('(') if self.dialect.conditional_groups() => {
                self.index += 1;
                loop {
                    match self.advance() {
                        Some(')') => break,
                        Some(_) => {}
                        None => return Err(self.error(ErrorKind::UnterminatedName, start)),
                    }
                }
                self.open(TokenKind::ConditionalGroupBegin, start);
            }
            _ => match self.dialect.inline_flag_syntax() {
                InlineFlagSyntax::Modifiers => self.lex_modifiers(start)?,
                InlineFlagSyntax::Python => self.lex_python_flags(start)?,
                InlineFlagSyntax::None => {
                    return Err(self.error(ErrorKind::InvalidGroup, start));
                }
            },
        }
        Ok(())
    }

    /// A group name up to `terminator`, which is consumed.
    fn group_name(&mut self, terminator: char) -> Result<String> {
        let name_start = self.index;
        loop {
            match self.advance() {
                None => return Err(self.error(ErrorKind::UnterminatedName, name_start)),
                Some(c) if c == terminator => break,
                Some(_) => {}
            }
        }
        let name: String = self.pattern[name_start..self.index - 1].iter().collect();
        if name.is_empty() {
            Err(self.error(ErrorKind::MissingGroupName, name_start))
        } else if !self.dialect.valid_group_name(&name) {
            Err(self.error(ErrorKind::InvalidGroupName(name), name_start))
        } else {
            Ok(name)
        }
    }

    /// `(?ims-ims:`
    fn lex_modifiers(&mut self, start: usize) -> Result<()> {
        let none = D::Flags::default();
        let (mut added, mut removed) = (none, none);
        let mut seen = vec![];
        let mut dash = false;
        loop {
            let c = self.advance();
            match c {
                Some(':') => break,
                Some('-') if !dash => dash = true,
                Some(c) => {
                    let Some(flag) = self.dialect.inline_flag(c) else {
                        return Err(self.error(ErrorKind::InvalidGroup, start));
                    };
                    if seen.contains(&c) {
                        return Err(self.error(ErrorKind::RepeatedFlag, start));
                    }
                    seen.push(c);
                    if dash {
                        removed = removed | flag;
                    } else {
                        added = added | flag;
                    }
                }
                None => return Err(self.error(ErrorKind::InvalidGroup, start)),
            }
        }
        if (dash && removed == none) || (added == none && removed == none) {
            return Err(self.error(ErrorKind::InvalidGroup, start));
        }
        let flags = self.scoped_flags(added, removed);
        self.flags.push(flags);
        self.emit(TokenKind::GroupBegin, start);
        Ok(())
    }

    fn scoped_flags(&self, added: D::Flags, removed: D::Flags) -> D::Flags {
        let flags = self.dialect.add_flags(self.flags(), added);
        self.dialect.remove_flags(flags, removed)
    }

    fn flag_error(&self, c: Option<char>, otherwise: ErrorKind, start: usize) -> RegexError {
        match c {
            Some(c) if c.is_alphabetic() => self.error(ErrorKind::UnknownFlag(c), start),
            _ => self.error(otherwise, start),
        }
    }

    /// `(?flags)` and `(?flags-flags:`, Python style.
    fn lex_python_flags(&mut self, start: usize) -> Result<()> {
        let none = D::Flags::default();
        let (mut added, mut removed) = (none, none);
        let mut c = self.advance();
        if c != Some('-') {
            match c {
                Some(f) if self.dialect.inline_flag(f).is_some() => {}
                Some('<') => {
                    let next = self.peek().map(String::from).unwrap_or_default();
                    let text = format!("?<{}", next);
                    return Err(self.error(ErrorKind::UnknownExtension(text), start));
                }
                other => {
                    let text = format!("?{}", other.map(String::from).unwrap_or_default());
                    return Err(self.error(ErrorKind::UnknownExtension(text), start));
                }
            }
            while let Some(flag) = c.and_then(|f| self.dialect.inline_flag(f)) {
                added = added | flag;
                self.dialect
                    .check_inline_flags(added)
                    .map_err(|k| self.error(k, start))?;
                c = self.advance();
                match c {
                    Some(')') | Some('-') | Some(':') => break,
                    Some(f) if self.dialect.inline_flag(f).is_some() => {}
                    _ => return Err(self.flag_error(c, ErrorKind::MissingFlagTerminator, start)),
                }
            }
        }
        if c == Some(')') {
            if self.emitted || self.flags.depth() > 0 {
                return Err(self.error(ErrorKind::GlobalFlagsNotAtStart, start));
            }
            let global = self.dialect.add_flags(self.flags.global(), added);
            self.flags.set_global(global);
            return Ok(());
        }
        if c == Some('-') {
            c = self.advance();
            if c.and_then(|f| self.dialect.inline_flag(f)).is_none() {
                return Err(self.flag_error(c, ErrorKind::MissingFlag, start));
            }
            while let Some(f) = c {
                let Some(flag) = self.dialect.inline_flag(f) else {
                    break;
                };
                if self.dialect.is_type_flag(f) {
                    return Err(self.error(ErrorKind::CannotTurnOffTypeFlag, start));
                }
                removed = removed | flag;
                c = self.advance();
                match c {
                    Some(':') => break,
                    Some(f) if self.dialect.inline_flag(f).is_some() => {}
                    _ => return Err(self.flag_error(c, ErrorKind::MissingColon, start)),
                }
            }
        }
        if (added & removed) != none {
            return Err(self.error(ErrorKind::FlagTurnedOnAndOff, start));
        }
        let flags = self.scoped_flags(added, removed);
        self.flags.push(flags);
        self.emit(TokenKind::GroupBegin, start);
        Ok(())
    }

    fn lex_class_item(&mut self) -> Result<()> {
        let flags = self.flags();
        let first = match &mut self.class {
            Some(state) => std::mem::replace(&mut state.first, false),
            None => return Ok(()),
        };
        let start = self.index;
        if self.peek() == Some(']') && !(first && self.dialect.leading_bracket_literal()) {
            self.index += 1;
            self.class = None;
            self.emit(TokenKind::ClassEnd, start);
            return Ok(());
        }
        let lo = self.class_atom()?;
        if self.peek() != Some('-') || matches!(self.peek_at(1), None | Some(']')) {
            self.emit(TokenKind::ClassItem(lo.into_item()), start);
            return Ok(());
        }
        self.index += 1;
        let hi = self.class_atom()?;
        match (lo, hi) {
            (Atom::Char(a), Atom::Char(b)) => {
                if a > b {
                    return Err(self.error(ErrorKind::RangeOutOfOrder(self.text(start)), start));
                }
                self.emit(TokenKind::ClassItem(ClassItem::Range(a, b)), start);
            }
            (lo, hi) => {
                self.dialect
                    .class_escape_in_range(&self.text(start), flags)
                    .map_err(|k| self.error(k, start))?;
                self.emit(TokenKind::ClassItem(lo.into_item()), start);
                self.emit(TokenKind::ClassItem(ClassItem::Char('-' as u32)), start);
                self.emit(TokenKind::ClassItem(hi.into_item()), start);
            }
        }
        Ok(())
    }

    fn class_atom(&mut self) -> Result<Atom> {
        let start = self.index;
        let flags = self.flags();
        let Some(c) = self.advance() else {
            let class_start = self.class.as_ref().map_or(start, |s| s.start);
            return Err(self.error(ErrorKind::UnterminatedClass, class_start));
        };
        match c {
            '\\' if self.dialect.escapes_in_classes() => {
                let Some(e) = self.advance() else {
                    return Err(self.error(ErrorKind::TrailingBackslash, start));
                };
                self.atom_escape(start, e, true)
            }
            '[' if self.dialect.posix_classes()
                && matches!(self.peek(), Some(':') | Some('=') | Some('.')) =>
            {
                self.bracket_expression(start)
            }
            c if c as u32 > 0xFFFF && self.dialect.split_astral_literals(flags) => {
                let (hi, lo) = surrogates(c as u32);
                Ok(Atom::Set(CodePointSet::from_code_points([hi, lo])))
            }
            c => Ok(Atom::Char(c as u32)),
        }
    }

    /// `[:name:]`, `[=c=]` or `[.c.]` inside brackets; the opening `[` is consumed. Without the
    /// closing delimiter the `[` is literal.
    fn bracket_expression(&mut self, start: usize) -> Result<Atom> {
        let Some(kind) = self.advance() else {
            return Ok(Atom::Char('[' as u32));
        };
        let body_start = self.index;
        let close = (body_start..self.pattern.len().saturating_sub(1))
            .find(|&i| self.pattern[i] == kind && self.pattern[i + 1] == ']');
        let Some(close) = close else {
            self.index = start + 1;
            return Ok(Atom::Char('[' as u32));
        };
        let body: Vec<char> = self.pattern[body_start..close].to_vec();
        self.index = close + 2;
        let single = match body.as_slice() {
            [c] => Some(*c as u32),
            _ => None,
        };
        match kind {
            ':' => {
                let name: String = body.iter().collect();
                let unicode = self.dialect.unicode_mode(self.flags());
                posix_class(&name, unicode, self.properties)
                    .map(Atom::Set)
                    .ok_or_else(|| self.error(ErrorKind::InvalidPosixClass, start))
            }
            '=' => single
                .ok_or(ErrorKind::InvalidEquivalenceClass)
                .and_then(|c| self.dialect.equivalence_class(c))
                .map(Atom::Set)
                .map_err(|k| self.error(k, start)),
            _ => single
                .map(Atom::Char)
                .ok_or_else(|| self.error(ErrorKind::InvalidCollationElement, start)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::{EcmaScriptFlags, PythonFlags, RegexFlags};
    use crate::flavor::ecmascript::EcmaScriptDialect;
    use crate::flavor::python::PythonDialect;
    use crate::unicode::StdProperties;

    fn lex_all<D: Dialect>(dialect: &D, pattern: &str, flags: D::Flags) -> Result<Vec<TokenKind>> {
        let mut lexer = Lexer::new(dialect, pattern, flags, &StdProperties, false);
        let mut tokens = vec![];
        while let Some(token) = lexer.next_token()? {
            tokens.push(token.kind);
        }
        Ok(tokens)
    }

    fn es(pattern: &str, flags: &str) -> Result<Vec<TokenKind>> {
        let flags = EcmaScriptFlags::parse(flags).unwrap();
        lex_all(&EcmaScriptDialect::default(), pattern, flags)
    }

    fn py(pattern: &str) -> Result<Vec<TokenKind>> {
        let flags = PythonFlags::UNICODE;
        lex_all(&PythonDialect::default(), pattern, flags)
    }

    fn lit(c: char) -> TokenKind {
        TokenKind::Literal(c as u32)
    }

    fn message(result: Result<Vec<TokenKind>>) -> (String, usize) {
        match result {
            Err(RegexError::Syntax(e)) => (e.message, e.position),
            other => panic!("expected a syntax error, got {:?}", other),
        }
    }

    macro_rules! test_lex {
        ($name:ident, $tokens:expr, [$($expected:expr),* $(,)?]) => {
            #[test]
            fn $name() {
                assert_eq!($tokens.unwrap(), vec![$($expected),*]);
            }
        };
    }

    test_lex!(literals, es("ab", ""), [lit('a'), lit('b')]);

    test_lex!(
        interval,
        es("a{2,5}?", ""),
        [
            lit('a'),
            TokenKind::Quantifier {
                quantifier: Quantifier::new(2, Some(5)).lazy(),
                text: "{2,5}?".to_string()
            }
        ]
    );

    test_lex!(
        invalid_interval_is_literal,
        es("a{,5}", ""),
        [lit('a'), lit('{'), lit(','), lit('5'), lit('}')]
    );

    test_lex!(
        python_open_lower_bound,
        py("a{,5}"),
        [
            lit('a'),
            TokenKind::Quantifier {
                quantifier: Quantifier::new(0, Some(5)),
                text: "{,5}".to_string()
            }
        ]
    );

    test_lex!(
        legacy_octal_for_missing_group,
        es("\\1\\8", ""),
        [TokenKind::Literal(1), lit('8')]
    );

    test_lex!(
        forward_reference,
        es("\\1(a)", ""),
        [
            TokenKind::BackReference(1),
            TokenKind::CaptureGroupBegin { name: None },
            lit('a'),
            TokenKind::GroupEnd
        ]
    );

    test_lex!(
        surrogate_escapes_join_in_unicode_mode,
        es("\\uD83D\\uDE00", "u"),
        [TokenKind::Literal(0x1F600)]
    );

    test_lex!(
        astral_literal_splits_without_unicode,
        es("\u{1F600}", ""),
        [TokenKind::Literal(0xD83D), TokenKind::Literal(0xDE00)]
    );

    test_lex!(
        class_range,
        es("[^a-c]", ""),
        [
            TokenKind::ClassBegin { negated: true },
            TokenKind::ClassItem(ClassItem::Range('a' as u32, 'c' as u32)),
            TokenKind::ClassEnd
        ]
    );

    test_lex!(
        python_leading_bracket,
        py("[]a]"),
        [
            TokenKind::ClassBegin { negated: false },
            TokenKind::ClassItem(ClassItem::Char(']' as u32)),
            TokenKind::ClassItem(ClassItem::Char('a' as u32)),
            TokenKind::ClassEnd
        ]
    );

    test_lex!(
        python_octal,
        py("\\101\\0"),
        [lit('A'), TokenKind::Literal(0)]
    );

    test_lex!(
        python_named_group_and_reference,
        py("(?P<x>a)(?P=x)"),
        [
            TokenKind::CaptureGroupBegin {
                name: Some("x".to_string())
            },
            lit('a'),
            TokenKind::GroupEnd,
            TokenKind::NamedBackReference("x".to_string())
        ]
    );

    test_lex!(
        python_comment_group,
        py("a(?#comment)b"),
        [lit('a'), lit('b')]
    );

    #[test]
    fn python_global_flags() {
        let dialect = PythonDialect::default();
        let mut lexer = Lexer::new(&dialect, "(?i)a", PythonFlags::UNICODE, &StdProperties, false);
        assert_eq!(lexer.next_token().unwrap().unwrap().kind, lit('a'));
        assert!(lexer.flags().ignore_case());
    }

    #[test]
    fn scoped_flags_follow_groups() {
        let dialect = EcmaScriptDialect::default();
        let flags = EcmaScriptFlags::empty();
        let mut lexer = Lexer::new(&dialect, "(?i:a)b", flags, &StdProperties, false);
        assert_eq!(lexer.next_token().unwrap().unwrap().kind, TokenKind::GroupBegin);
        assert!(lexer.flags().ignore_case());
        lexer.next_token().unwrap();
        assert_eq!(lexer.next_token().unwrap().unwrap().kind, TokenKind::GroupEnd);
        assert!(!lexer.flags().ignore_case());
    }

    #[test]
    fn errors() {
        assert_eq!(
            message(py("a(?i)")),
            (
                "global flags not at the start of the expression".to_string(),
                1
            )
        );
        assert_eq!(
            message(py("(?-a:x)")),
            (
                "bad inline flag: cannot turn off flags 'a', 'u' and 'L'".to_string(),
                0
            )
        );
        assert_eq!(
            message(py("(?i-i:x)")),
            ("bad inline flag: flag turned on and off".to_string(), 0)
        );
        assert_eq!(message(py("\\q")), ("bad escape \\q".to_string(), 0));
        assert_eq!(message(py("\\x4")), ("incomplete escape \\x4".to_string(), 0));
        assert_eq!(
            message(py("[z-a]")),
            ("bad character range z-a".to_string(), 1)
        );
        assert_eq!(
            message(py("\\777")),
            (
                "octal escape value \\777 outside of range 0-0o377".to_string(),
                0
            )
        );
        assert_eq!(message(es("a)", "")), ("Unmatched ')'".to_string(), 1));
        assert_eq!(
            message(es("[a", "")),
            ("Unterminated character class".to_string(), 0)
        );
        assert_eq!(message(es("\\q", "u")), ("Invalid escape".to_string(), 0));
        assert_eq!(
            message(es("a{2,1}", "")),
            ("numbers out of order in {} quantifier".to_string(), 1)
        );
        assert_eq!(message(es("(?<1>a)", "")).0, "Invalid capture group name");
    }
}
