//! Ruby (Onigmo) patterns, rewritten into canonical pattern text.
//!
//! Several Onigmo rules reach further than a lexer hook can see. Named groups change which
//! plain groups capture, an open-ended `(?i)` extends past the alternatives that follow it, and
//! case folding depends on how a character got into a class. So the translator walks the
//! pattern itself: once to collect the group names, and once more to write canonical text with
//! case insensitivity already expanded. That text is parsed by the canonical dialect and the
//! subexpression calls are inlined afterwards.

mod sink;

pub use sink::{NullSink, PatternSink, RubySink};

use crate::ast::{expand_subexpression_calls, NamedGroups};
use crate::casefold::{
    ascii_boundary_predicate, closure, closure_multi_code_point, unfold_string, CaseFoldAlgorithm,
    UnfoldSink,
};
use crate::charset::{CodePointSet, CodePointSetAccumulator, Range, MAX_CODE_POINT};
use crate::error::{RegexError, Result};
use crate::flags::{RegexFlags, RubyFlags};
use crate::flavor::ecmascript::EcmaScriptDialect;
use crate::parser::{parse_tokens, ParsedAst};
use crate::unicode::{
    ascii_digits, ascii_space, ascii_word, hex_digits, newline, posix_class, resolve_property,
    PropertyError,
};
use crate::ParserOptions;

/// Largest bound Onigmo accepts in `{n,m}`.
const MAX_REPEAT: u64 = 100_000;

const ALGORITHM: CaseFoldAlgorithm = CaseFoldAlgorithm::Ruby;

/// A Ruby pattern rewritten in the canonical dialect.
#[derive(Debug, Clone)]
pub struct TranslatedPattern {
    pub pattern: String,
    pub flags: String,
    pub named_groups: NamedGroups,
}

/// Rewrites `pattern` into canonical pattern text.
pub fn translate(pattern: &str, flags: &str, options: &ParserOptions) -> Result<TranslatedPattern> {
    translate_with(pattern, flags, options, false)
}

fn translate_with(
    pattern: &str,
    flags: &str,
    options: &ParserOptions,
    silent: bool,
) -> Result<TranslatedPattern> {
    let mut sink = PatternSink::new();
    let named_groups = run_passes(pattern, flags, options, silent, &mut sink)?;
    let pattern = sink.into_string();
    log::debug!("ruby pattern rewritten as /{}/u", pattern);
    Ok(TranslatedPattern {
        pattern,
        flags: "u".to_string(),
        named_groups,
    })
}

pub(crate) fn parse(
    pattern: &str,
    flags: &str,
    options: &ParserOptions,
    silent: bool,
) -> Result<ParsedAst> {
    let translated = translate_with(pattern, flags, options, silent)?;
    let mut parsed = parse_tokens(
        &EcmaScriptDialect::internal(),
        &translated.pattern,
        &translated.flags,
        options,
        silent,
    )?;
    expand_subexpression_calls(&mut parsed.ast)?;
    Ok(parsed)
}

/// Checks `pattern` without producing any output.
pub(crate) fn validate(pattern: &str, flags: &str, options: &ParserOptions) -> Result<()> {
    run_passes(pattern, flags, options, true, &mut NullSink).map(|_| ())
}

fn run_passes<S: RubySink + UnfoldSink>(
    pattern: &str,
    flags: &str,
    options: &ParserOptions,
    silent: bool,
    sink: &mut S,
) -> Result<NamedGroups> {
    let flags = RubyFlags::parse(flags).map_err(|message| RegexError::syntax(message, 0))?;
    let table = Translator::new(pattern, flags, options, true, None, &mut NullSink).run()?;
    Translator::new(pattern, flags, options, silent, Some(&table), sink).run()?;
    Ok(table.names)
}

/// Group names found by the first pass. Named groups are numbered among themselves.
#[derive(Debug, Default)]
struct GroupTable {
    names: NamedGroups,
    named: u32,
    unnamed: u32,
}

impl GroupTable {
    fn has_names(&self) -> bool {
        self.named > 0
    }

    fn capture_count(&self) -> u32 {
        if self.has_names() {
            self.named
        } else {
            self.unnamed
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    Group,
    Capture(u32),
    LookAround,
}

#[derive(Debug)]
struct Frame {
    kind: FrameKind,
    /// Flags to restore when the group closes.
    flags: RubyFlags,
    /// Groups opened by `(?imx)` inside this one.
    implicit: usize,
    position: usize,
    out_start: usize,
}

#[derive(Debug)]
struct ParsedClass {
    set: CodePointSet,
    /// Members that may fold across the ASCII boundary.
    foldable: CodePointSet,
    negated: bool,
}

impl ParsedClass {
    fn resolved(&self, full: Range) -> CodePointSet {
        if self.negated {
            self.set.invert(full)
        } else {
            self.set.clone()
        }
    }
}

enum ClassItem {
    Char(u32),
    Set(CodePointSet),
}

enum Reference {
    Number(u32),
    Relative(i64),
    Name(String),
}

struct Translator<'a, S: RubySink + UnfoldSink> {
    chars: Vec<char>,
    index: usize,
    sink: &'a mut S,
    options: &'a ParserOptions,
    silent: bool,
    /// What the first pass found; `None` during that pass.
    known: Option<&'a GroupTable>,
    table: GroupTable,
    flags: RubyFlags,
    frames: Vec<Frame>,
    groups_seen: u32,
    literals: Vec<u32>,
    literal_flags: RubyFlags,
    term_start: Option<usize>,
    term_quantified: bool,
    calls: Vec<(u32, usize)>,
}

impl<'a, S: RubySink + UnfoldSink> Translator<'a, S> {
    fn new(
        pattern: &str,
        flags: RubyFlags,
        options: &'a ParserOptions,
        silent: bool,
        known: Option<&'a GroupTable>,
        sink: &'a mut S,
    ) -> Self {
        Translator {
            chars: pattern.chars().collect(),
            index: 0,
            sink,
            options,
            silent,
            known,
            table: GroupTable::default(),
            flags,
            frames: vec![],
            groups_seen: 0,
            literals: vec![],
            literal_flags: flags,
            term_start: None,
            term_quantified: false,
            calls: vec![],
        }
    }

    fn error(&self, message: impl Into<String>, position: usize) -> RegexError {
        RegexError::syntax(message, position)
    }

    fn unsupported(&self, feature: &str) -> Result<()> {
        if self.silent {
            Ok(())
        } else {
            Err(RegexError::unsupported(feature))
        }
    }

    fn full(&self) -> Range {
        self.options.encoding.full_range()
    }

    fn has_names(&self) -> bool {
        self.known.map_or(false, GroupTable::has_names)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.index).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.index + offset).copied()
    }

    fn next(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.index += 1;
        Some(c)
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.index += 1;
            true
        } else {
            false
        }
    }

    fn number(&mut self) -> Option<u64> {
        let start = self.index;
        let mut value: u64 = 0;
        while let Some(d) = self.peek().and_then(|c| c.to_digit(10)) {
            value = value.saturating_mul(10).saturating_add(d as u64);
            self.index += 1;
        }
        (self.index > start).then_some(value)
    }

    fn run(mut self) -> Result<GroupTable> {
        self.frames.push(Frame {
            kind: FrameKind::Group,
            flags: self.flags,
            implicit: 0,
            position: 0,
            out_start: 0,
        });
        while let Some(c) = self.next() {
            let start = self.index - 1;
            if self.flags.extended() {
                if c.is_ascii_whitespace() {
                    continue;
                }
                if c == '#' {
                    while self.next().map_or(false, |c| c != '\n') {}
                    continue;
                }
            }
            match c {
                '\\' => self.escape(start)?,
                '[' => {
                    let class = self.class(start)?;
                    self.emit_class(class, true)?;
                }
                '(' => self.open_group(start)?,
                ')' => self.close_group(start)?,
                '|' => {
                    self.anchor("|")?;
                }
                '*' | '+' | '?' => {
                    let text = c.to_string();
                    self.quantifier(text, false, start)?;
                }
                '{' => match self.interval(start)? {
                    Some((text, exact)) => self.quantifier(text, exact, start)?,
                    None => self.literal('{' as u32)?,
                },
                '^' => self.anchor("(?:^|(?<=\\n))")?,
                '$' => self.anchor("(?:$|(?=\\n))")?,
                '.' => {
                    let dot = if self.flags.dot_all() {
                        CodePointSet::from_range(0, MAX_CODE_POINT)
                    } else {
                        CodePointSet::from_range(0, MAX_CODE_POINT).subtract(&newline())
                    };
                    self.begin_atom()?;
                    self.sink.push_class(&dot.clip(self.full()));
                }
                _ => self.literal(c as u32)?,
            }
        }
        self.flush()?;
        if self.frames.len() > 1 {
            let position = self.frames.last().map_or(0, |f| f.position);
            return Err(self.error("end pattern with unmatched parenthesis", position));
        }
        if let Some(root) = self.frames.pop() {
            for _ in 0..root.implicit {
                self.sink.push_str(")");
            }
        }
        if let Some(known) = self.known {
            for &(group, position) in &self.calls {
                if group > known.capture_count() {
                    return Err(self.error(format!("undefined group <{}> reference", group), position));
                }
            }
        }
        Ok(self.table)
    }

    fn literal(&mut self, c: u32) -> Result<()> {
        if !self.literals.is_empty() && self.literal_flags != self.flags {
            self.flush()?;
        }
        if self.literals.is_empty() {
            self.literal_flags = self.flags;
        }
        self.literals.push(c);
        Ok(())
    }

    /// Writes out buffered literals. The last one becomes the term a quantifier applies to.
    fn flush(&mut self) -> Result<()> {
        let Some(last) = self.literals.pop() else {
            return Ok(());
        };
        let run = std::mem::take(&mut self.literals);
        let flags = self.literal_flags;
        self.emit_run(&run, flags)?;
        self.term_start = Some(self.sink.mark());
        self.term_quantified = false;
        self.emit_run(&[last], flags)
    }

    fn emit_run(&mut self, run: &[u32], flags: RubyFlags) -> Result<()> {
        let full = self.full();
        if run.is_empty() {
            return Ok(());
        }
        if !flags.ignore_case() {
            for &c in run {
                self.sink.push_code_point(c);
            }
            return Ok(());
        }
        if flags.ascii() {
            let none = CodePointSet::empty();
            for &c in run {
                let set = CodePointSet::from_code_point(c);
                let closed = closure(&set, ALGORITHM, ascii_boundary_predicate(&none)).clip(full);
                if closed.is_empty() {
                    self.sink.push_code_point(c);
                } else {
                    self.sink.push_class(&closed);
                }
            }
            return Ok(());
        }
        unfold_string(run, ALGORITHM, full, false, &mut *self.sink)
    }

    /// Starts a quantifiable term.
    fn begin_atom(&mut self) -> Result<()> {
        self.flush()?;
        self.term_start = Some(self.sink.mark());
        self.term_quantified = false;
        Ok(())
    }

    /// Writes something nothing may repeat.
    fn anchor(&mut self, text: &str) -> Result<()> {
        self.flush()?;
        self.sink.push_str(text);
        self.term_start = None;
        Ok(())
    }

    fn quantifier(&mut self, mut text: String, exact: bool, position: usize) -> Result<()> {
        if !exact {
            if self.eat('?') {
                text.push('?');
            } else if text.len() == 1 && self.eat('+') {
                if !self.options.ignore_atomic_groups {
                    self.unsupported("possessive quantifiers")?;
                }
            }
        }
        self.flush()?;
        let Some(start) = self.term_start else {
            return Err(self.error("target of repeat operator is not specified", position));
        };
        if self.term_quantified {
            self.sink.wrap_from(start);
        }
        self.sink.push_str(&text);
        self.term_quantified = true;
        Ok(())
    }

    /// An interval after `{`, with whether both bounds are equal. `None` leaves the brace literal.
    fn interval(&mut self, position: usize) -> Result<Option<(String, bool)>> {
        let save = self.index;
        let lower = self.number();
        let (upper, exact) = if self.eat(',') {
            (self.number(), false)
        } else {
            (lower, true)
        };
        if !self.eat('}') || (lower.is_none() && upper.is_none()) {
            self.index = save;
            return Ok(None);
        }
        let low = lower.unwrap_or(0);
        if low > MAX_REPEAT || upper.map_or(false, |u| u > MAX_REPEAT) {
            return Err(self.error("too big number for repeat range", position));
        }
        if upper.map_or(false, |u| u < low) {
            return Err(self.error("upper is smaller than lower in repeat range", position));
        }
        let text = match (exact, upper) {
            (true, _) => format!("{{{}}}", low),
            (false, None) => format!("{{{},}}", low),
            (false, Some(u)) => format!("{{{},{}}}", low, u),
        };
        Ok(Some((text, upper == Some(low))))
    }

    fn escape(&mut self, start: usize) -> Result<()> {
        let Some(c) = self.next() else {
            return Err(self.error("end pattern at escape", start));
        };
        match c {
            'd' | 'D' | 's' | 'S' | 'w' | 'W' | 'h' | 'H' => {
                let set = self.shorthand(c).unwrap_or_else(CodePointSet::empty);
                let class = ParsedClass {
                    set,
                    foldable: CodePointSet::empty(),
                    negated: false,
                };
                self.emit_class(class, false)
            }
            'p' | 'P' => {
                let set = self.property(c, start)?;
                let class = ParsedClass {
                    set,
                    foldable: CodePointSet::empty(),
                    negated: false,
                };
                self.emit_class(class, false)
            }
            'A' => self.anchor("^"),
            'z' => self.anchor("$"),
            'Z' => self.anchor("(?:$|(?=\\n$))"),
            'b' | 'B' => self.word_boundary(c == 'B'),
            'G' => {
                if start != 0 {
                    self.unsupported("\\G not at the start of the pattern")?;
                }
                self.anchor("")
            }
            'K' => {
                self.unsupported("\\K")?;
                self.anchor("")
            }
            'X' => {
                self.unsupported("\\X")?;
                self.begin_atom()?;
                let full = CodePointSet::from_range(0, MAX_CODE_POINT).clip(self.full());
                self.sink.push_class(&full);
                Ok(())
            }
            'R' => {
                self.begin_atom()?;
                self.sink
                    .push_str("(?:\\r\\n|[\\n\\v\\f\\r\\u{85}\\u{2028}\\u{2029}])");
                Ok(())
            }
            'k' => self.named_backreference(start),
            'g' => self.call(start),
            '1'..='9' => self.numbered_escape(c, start),
            _ => {
                let c = self.escaped_code_point(c, start)?;
                self.literal(c)
            }
        }
    }

    /// The codepoint an escape stands for, outside or inside a class.
    fn escaped_code_point(&mut self, c: char, start: usize) -> Result<u32> {
        Ok(match c {
            't' => 0x09,
            'n' => 0x0A,
            'v' => 0x0B,
            'f' => 0x0C,
            'r' => 0x0D,
            'a' => 0x07,
            'e' => 0x1B,
            '0' => self.octal(0, 2),
            'x' => self.hex_escape(start)?,
            'u' => self.unicode_escape(start)?,
            'c' => self.control(start)?,
            'C' => {
                if !self.eat('-') {
                    return Err(self.error("invalid control-code syntax", start));
                }
                self.control(start)?
            }
            'M' => {
                if !self.eat('-') {
                    return Err(self.error("invalid meta-code syntax", start));
                }
                let Some(c) = self.next() else {
                    return Err(self.error("end pattern at meta", start));
                };
                let c = if c == '\\' {
                    let Some(e) = self.next() else {
                        return Err(self.error("end pattern at meta", start));
                    };
                    self.escaped_code_point(e, start)?
                } else {
                    c as u32
                };
                (c & 0xFF) | 0x80
            }
            _ => c as u32,
        })
    }

    fn octal(&mut self, initial: u32, max_digits: usize) -> u32 {
        let mut value = initial;
        for _ in 0..max_digits {
            match self.peek().and_then(|c| c.to_digit(8)) {
                Some(d) => {
                    value = value * 8 + d;
                    self.index += 1;
                }
                None => break,
            }
        }
        value
    }

    fn hex_digits(&mut self, max: usize) -> Option<u32> {
        let start = self.index;
        let mut value: u32 = 0;
        while self.index - start < max {
            match self.peek().and_then(|c| c.to_digit(16)) {
                Some(d) => {
                    value = value.saturating_mul(16).saturating_add(d);
                    self.index += 1;
                }
                None => break,
            }
        }
        (self.index > start).then_some(value)
    }

    fn hex_escape(&mut self, start: usize) -> Result<u32> {
        if self.eat('{') {
            let value = self.hex_digits(8);
            if !self.eat('}') {
                return Err(self.error("invalid code point value", start));
            }
            return self.checked_code_point(value, start);
        }
        self.hex_digits(2)
            .ok_or_else(|| self.error("invalid hex escape", start))
    }

    fn unicode_escape(&mut self, start: usize) -> Result<u32> {
        if self.eat('{') {
            while self.eat(' ') {}
            let value = self.hex_digits(8);
            while self.eat(' ') {}
            if !self.eat('}') {
                return Err(self.error("invalid Unicode list", start));
            }
            return self.checked_code_point(value, start);
        }
        let before = self.index;
        match self.hex_digits(4) {
            Some(value) if self.index - before == 4 => Ok(value),
            _ => Err(self.error("invalid Unicode escape", start)),
        }
    }

    fn checked_code_point(&self, value: Option<u32>, start: usize) -> Result<u32> {
        match value {
            Some(v) if v <= MAX_CODE_POINT => Ok(v),
            _ => Err(self.error("invalid code point value", start)),
        }
    }

    fn control(&mut self, start: usize) -> Result<u32> {
        let Some(c) = self.next() else {
            return Err(self.error("end pattern at control", start));
        };
        let c = if c == '\\' {
            let Some(e) = self.next() else {
                return Err(self.error("end pattern at control", start));
            };
            self.escaped_code_point(e, start)?
        } else {
            c as u32
        };
        Ok(if c == '?' as u32 { 0x7F } else { c & 0x9F })
    }

    /// `\1` to `\9` always refer to groups. Longer numbers that don't are octal escapes.
    fn numbered_escape(&mut self, first: char, start: usize) -> Result<()> {
        let digits_start = self.index - 1;
        self.index = digits_start;
        let n = self.number().unwrap_or(0);
        if n <= 9 || n <= self.groups_seen as u64 {
            return self.backreference(n.min(u32::MAX as u64) as u32, start);
        }
        self.index = digits_start + 1;
        match first.to_digit(8) {
            Some(d) => {
                let c = self.octal(d, 2);
                self.literal(c)
            }
            None => Err(self.error("invalid backref number/name", start)),
        }
    }

    fn is_open(&self, group: u32) -> bool {
        self.frames
            .iter()
            .any(|f| f.kind == FrameKind::Capture(group))
    }

    fn backreference(&mut self, group: u32, start: usize) -> Result<()> {
        if self.known.is_some() {
            if self.has_names() {
                return Err(self.error("numbered backref/call is not allowed. (use name)", start));
            }
            if group == 0 || group > self.groups_seen {
                return Err(self.error("invalid backref number/name", start));
            }
        }
        self.begin_atom()?;
        if self.is_open(group) {
            self.sink.push_str("[]");
        } else {
            let text = format!("(?{}:\\{})", self.case_modifier(), group);
            self.sink.push_str(&text);
        }
        Ok(())
    }

    fn case_modifier(&self) -> &'static str {
        if self.flags.ignore_case() {
            "i"
        } else {
            ""
        }
    }

    /// The body of `<...>` or `'...'` after `\k` or `\g`.
    fn reference_body(&mut self, start: usize, what: &str) -> Result<String> {
        let close = match self.next() {
            Some('<') => '>',
            Some('\'') => '\'',
            _ => return Err(self.error(format!("invalid {} syntax", what), start)),
        };
        let mut body = String::new();
        loop {
            match self.next() {
                Some(c) if c == close => return Ok(body),
                Some(c) => body.push(c),
                None => return Err(self.error(format!("invalid group name <{}>", body), start)),
            }
        }
    }

    /// Splits `name+1` or `-2` into its parts. The level suffix is returned separately.
    fn parse_reference(&self, body: &str, start: usize) -> Result<(Reference, Option<i64>)> {
        if body.is_empty() {
            return Err(self.error("group name is empty", start));
        }
        let split = body
            .char_indices()
            .skip(1)
            .find(|&(_, c)| c == '+' || c == '-')
            .map(|(i, _)| i);
        let (head, level) = match split {
            Some(i) => {
                let level = body[i..]
                    .parse::<i64>()
                    .map_err(|_| self.error(format!("invalid group name <{}>", body), start))?;
                (&body[..i], Some(level))
            }
            None => (body, None),
        };
        let reference = if head.starts_with(|c: char| c == '-' || c == '+') {
            let n = head
                .parse::<i64>()
                .map_err(|_| self.error(format!("invalid group name <{}>", body), start))?;
            Reference::Relative(n)
        } else if head.starts_with(|c: char| c.is_ascii_digit()) {
            let n = head
                .parse::<u32>()
                .map_err(|_| self.error(format!("invalid group name <{}>", body), start))?;
            Reference::Number(n)
        } else {
            if !valid_name(head) {
                return Err(self.error(format!("invalid group name <{}>", head), start));
            }
            Reference::Name(head.to_string())
        };
        Ok((reference, level))
    }

    fn relative_group(&self, n: i64, start: usize) -> Result<u32> {
        let seen = self.groups_seen as i64;
        let group = if n < 0 { seen + 1 + n } else { seen + n };
        if n == 0 || group < 1 {
            return Err(self.error("invalid backref number/name", start));
        }
        Ok(group.min(u32::MAX as i64) as u32)
    }

    fn named_backreference(&mut self, start: usize) -> Result<()> {
        let body = self.reference_body(start, "backref")?;
        let (reference, level) = self.parse_reference(&body, start)?;
        if level.is_some() {
            self.unsupported("backreferences with recursion level")?;
        }
        match reference {
            Reference::Number(n) => self.backreference(n, start),
            Reference::Relative(n) => {
                let group = self.relative_group(n, start)?;
                self.backreference(group, start)
            }
            Reference::Name(name) => {
                let groups = match self.known {
                    Some(known) => match known.names.get(&name) {
                        Some(groups) => groups.to_vec(),
                        None => {
                            return Err(self.error(
                                format!("undefined name <{}> reference", name),
                                start,
                            ))
                        }
                    },
                    None => vec![],
                };
                self.begin_atom()?;
                if !groups.is_empty() && groups.iter().all(|&g| self.is_open(g)) {
                    self.sink.push_str("[]");
                } else {
                    let text = format!("(?{}:\\k<{}>)", self.case_modifier(), name);
                    self.sink.push_str(&text);
                }
                Ok(())
            }
        }
    }

    fn call(&mut self, start: usize) -> Result<()> {
        let body = self.reference_body(start, "call")?;
        let (reference, level) = self.parse_reference(&body, start)?;
        if level.is_some() {
            return Err(self.error(format!("invalid group name <{}>", body), start));
        }
        let group = match reference {
            Reference::Name(name) => match self.known {
                Some(known) => match known.names.get(&name) {
                    Some([group]) => *group,
                    Some(_) => {
                        return Err(self.error(format!("multiplex defined name <{}> call", name), start))
                    }
                    None => {
                        return Err(self.error(format!("undefined name <{}> call", name), start))
                    }
                },
                None => 0,
            },
            Reference::Number(n) => {
                if n != 0 && self.has_names() {
                    return Err(self.error("numbered backref/call is not allowed. (use name)", start));
                }
                n
            }
            Reference::Relative(n) => {
                if self.has_names() {
                    return Err(self.error("numbered backref/call is not allowed. (use name)", start));
                }
                self.relative_group(n, start)?
            }
        };
        self.calls.push((group, start));
        self.begin_atom()?;
        let text = format!("\\g<{}>", group);
        self.sink.push_str(&text);
        Ok(())
    }

    fn shorthand(&self, c: char) -> Option<CodePointSet> {
        let props = self.options.properties.as_ref();
        let unicode = self.flags.unicode();
        let base = match c.to_ascii_lowercase() {
            'd' if unicode => props.get_property("Nd").unwrap_or_else(ascii_digits),
            'd' => ascii_digits(),
            's' if unicode => props.get_property("White_Space").unwrap_or_else(ascii_space),
            's' => ascii_space(),
            'w' if unicode => posix_class("word", true, props).unwrap_or_else(ascii_word),
            'w' => ascii_word(),
            'h' => hex_digits(),
            _ => return None,
        };
        Some(if c.is_ascii_uppercase() {
            CodePointSet::from_range(0, MAX_CODE_POINT).subtract(&base)
        } else {
            base
        })
    }

    fn property(&mut self, c: char, start: usize) -> Result<CodePointSet> {
        if !self.eat('{') {
            return Err(self.error("invalid character property name {}", start));
        }
        let negated = self.eat('^') != (c == 'P');
        let mut name = String::new();
        loop {
            match self.next() {
                Some('}') => break,
                Some(c) => name.push(c),
                None => {
                    return Err(self.error(
                        format!("invalid character property name {{{}}}", name),
                        start,
                    ))
                }
            }
        }
        let props = self.options.properties.as_ref();
        let set = match resolve_property(props, &name) {
            Ok(set) => set,
            Err(e) => match posix_class(&name.to_ascii_lowercase(), true, props) {
                Some(set) => set,
                None if matches!(e, PropertyError::Unavailable(_)) => {
                    self.unsupported(&format!("character property {}", name))?;
                    CodePointSet::empty()
                }
                None => {
                    return Err(self.error(
                        format!("invalid character property name {{{}}}", name),
                        start,
                    ))
                }
            },
        };
        Ok(if negated {
            CodePointSet::from_range(0, MAX_CODE_POINT).subtract(&set)
        } else {
            set
        })
    }

    fn word_boundary(&mut self, negated: bool) -> Result<()> {
        let word = self
            .shorthand('w')
            .unwrap_or_else(ascii_word)
            .clip(self.full());
        self.flush()?;
        let (after_word, after_other) = if negated {
            ("(?=", "(?!")
        } else {
            ("(?!", "(?=")
        };
        self.sink.push_str("(?:(?<=");
        self.sink.push_class(&word);
        self.sink.push_str(")");
        self.sink.push_str(after_word);
        self.sink.push_class(&word);
        self.sink.push_str(")|(?<!");
        self.sink.push_class(&word);
        self.sink.push_str(")");
        self.sink.push_str(after_other);
        self.sink.push_class(&word);
        self.sink.push_str("))");
        self.term_start = None;
        Ok(())
    }

    fn class(&mut self, start: usize) -> Result<ParsedClass> {
        let negated = self.eat('^');
        let mut parts: Vec<(CodePointSet, CodePointSet)> = vec![];
        let mut set = CodePointSetAccumulator::new();
        let mut foldable = CodePointSetAccumulator::new();
        let mut has_items = false;
        let mut first = true;
        loop {
            let Some(c) = self.next() else {
                return Err(self.error("premature end of char-class", start));
            };
            let item_start = self.index - 1;
            let item = match c {
                ']' if first => {
                    if !self.chars[self.index..].contains(&']') {
                        return Err(self.error("empty char-class", start));
                    }
                    ClassItem::Char(']' as u32)
                }
                ']' => break,
                '[' => match self.posix_bracket(item_start)? {
                    Some(posix) => ClassItem::Set(posix),
                    None => {
                        let nested = self.class(item_start)?;
                        if !nested.negated {
                            foldable.add_set(&nested.foldable);
                        }
                        ClassItem::Set(nested.resolved(self.full()))
                    }
                },
                '&' if self.peek() == Some('&') => {
                    self.index += 1;
                    if has_items {
                        parts.push((set.to_code_point_set(), foldable.to_code_point_set()));
                    }
                    set.clear();
                    foldable.clear();
                    has_items = false;
                    first = false;
                    continue;
                }
                '\\' => self.class_escape(item_start)?,
                _ => ClassItem::Char(c as u32),
            };
            first = false;
            has_items = true;
            match item {
                ClassItem::Set(s) => set.add_set(&s),
                ClassItem::Char(lo) => {
                    let range = self.peek() == Some('-')
                        && self.peek_at(1).map_or(false, |c| c != ']');
                    if !range {
                        set.add_code_point(lo);
                        foldable.add_code_point(lo);
                        continue;
                    }
                    self.index += 1;
                    let hi_start = self.index;
                    let hi = match self.next() {
                        Some('\\') => self.class_escape(hi_start)?,
                        Some('[') => {
                            return Err(self.error("char-class value at end of range", hi_start))
                        }
                        Some(c) => ClassItem::Char(c as u32),
                        None => return Err(self.error("premature end of char-class", start)),
                    };
                    let ClassItem::Char(hi) = hi else {
                        return Err(self.error("char-class value at end of range", hi_start));
                    };
                    if hi < lo {
                        return Err(self.error("empty range in char class", item_start));
                    }
                    set.add_range(Range::new(lo, hi));
                    foldable.add_range(Range::new(lo, hi));
                }
            }
        }
        if has_items {
            parts.push((set.to_code_point_set(), foldable.to_code_point_set()));
        }
        let mut parts = parts.into_iter();
        let (set, foldable) = match parts.next() {
            None => (CodePointSet::empty(), CodePointSet::empty()),
            Some(head) => parts.fold(head, |(s, f), (s2, f2)| {
                let s = s.intersect(&s2);
                let f = s.intersect(&f.union(&f2));
                (s, f)
            }),
        };
        Ok(ParsedClass {
            set,
            foldable,
            negated,
        })
    }

    /// `[:name:]` after the `[`, or `None` when this is a nested class instead.
    fn posix_bracket(&mut self, start: usize) -> Result<Option<CodePointSet>> {
        if self.peek() != Some(':') {
            return Ok(None);
        }
        let save = self.index;
        self.index += 1;
        let negated = self.eat('^');
        let mut name = String::new();
        while let Some(c) = self.peek().filter(|c| c.is_ascii_alphabetic()) {
            name.push(c);
            self.index += 1;
        }
        if !(self.eat(':') && self.eat(']')) {
            self.index = save;
            return Ok(None);
        }
        let props = self.options.properties.as_ref();
        let set = posix_class(&name, !self.flags.ascii(), props)
            .ok_or_else(|| self.error("invalid POSIX bracket type", start))?;
        Ok(Some(if negated {
            CodePointSet::from_range(0, MAX_CODE_POINT).subtract(&set)
        } else {
            set
        }))
    }

    fn class_escape(&mut self, start: usize) -> Result<ClassItem> {
        let Some(c) = self.next() else {
            return Err(self.error("premature end of char-class", start));
        };
        Ok(match c {
            'd' | 'D' | 's' | 'S' | 'w' | 'W' | 'h' | 'H' => {
                ClassItem::Set(self.shorthand(c).unwrap_or_else(CodePointSet::empty))
            }
            'p' | 'P' => ClassItem::Set(self.property(c, start)?),
            'b' => ClassItem::Char(0x08),
            '1'..='7' => {
                let first = c.to_digit(8).unwrap_or(0);
                ClassItem::Char(self.octal(first, 2))
            }
            _ => ClassItem::Char(self.escaped_code_point(c, start)?),
        })
    }

    /// Writes a class, closing it under case folding first. With `strings`, a case-insensitive
    /// class also matches the strings its members fold to.
    fn emit_class(&mut self, class: ParsedClass, strings: bool) -> Result<()> {
        self.begin_atom()?;
        let full = self.full();
        let ParsedClass {
            set,
            foldable,
            negated,
        } = class;
        let mut folded_strings: Vec<Vec<u32>> = vec![];
        let set = if self.flags.ignore_case() {
            let foldable = if self.flags.ascii() {
                CodePointSet::empty()
            } else {
                foldable
            };
            let closed = closure(&set, ALGORITHM, ascii_boundary_predicate(&foldable)).clip(full);
            if strings && !negated && !self.flags.ascii() {
                for (_, folded) in closure_multi_code_point(&closed, ALGORITHM) {
                    if !folded_strings.contains(&folded) {
                        folded_strings.push(folded);
                    }
                }
            }
            closed
        } else {
            set.clip(full)
        };
        let singles = if negated { set.invert(full) } else { set };

        let steps: Vec<Vec<CodePointSet>> = folded_strings
            .iter()
            .map(|s| {
                s.iter()
                    .map(|&c| {
                        closure(&CodePointSet::from_code_point(c), ALGORITHM, |_, _| true)
                            .clip(full)
                    })
                    .collect::<Vec<_>>()
            })
            .filter(|steps| steps.iter().all(|step| !step.is_empty()))
            .collect();
        if steps.is_empty() {
            self.sink.push_class(&singles);
            return Ok(());
        }
        self.sink.push_str("(?:");
        for string in &steps {
            for step in string {
                self.sink.push_class(step);
            }
            self.sink.push_str("|");
        }
        self.sink.push_class(&singles);
        self.sink.push_str(")");
        Ok(())
    }

    fn push_frame(&mut self, kind: FrameKind, text: &str, position: usize) {
        self.frames.push(Frame {
            kind,
            flags: self.flags,
            implicit: 0,
            position,
            out_start: self.sink.mark(),
        });
        self.sink.push_str(text);
        self.term_start = None;
    }

    fn open_group(&mut self, start: usize) -> Result<()> {
        if self.peek() == Some('?') && self.peek_at(1) == Some('#') {
            self.index += 2;
            while let Some(c) = self.next() {
                if c == ')' {
                    return Ok(());
                }
            }
            return Err(self.error("end pattern in group", start));
        }
        self.flush()?;
        if !self.eat('?') {
            if self.known.is_none() {
                self.table.unnamed += 1;
            }
            if self.has_names() {
                self.push_frame(FrameKind::Group, "(?:", start);
            } else {
                self.groups_seen += 1;
                self.push_frame(FrameKind::Capture(self.groups_seen), "(", start);
            }
            return Ok(());
        }
        let Some(c) = self.next() else {
            return Err(self.error("end pattern in group", start));
        };
        match c {
            ':' => self.push_frame(FrameKind::Group, "(?:", start),
            '=' => self.push_frame(FrameKind::LookAround, "(?=", start),
            '!' => self.push_frame(FrameKind::LookAround, "(?!", start),
            '>' => {
                if !self.options.ignore_atomic_groups {
                    self.unsupported("atomic groups")?;
                }
                self.push_frame(FrameKind::Group, "(?:", start);
            }
            '~' => {
                self.unsupported("absent operator")?;
                self.push_frame(FrameKind::Group, "(?:", start);
            }
            '(' => {
                self.unsupported("conditional groups")?;
                while let Some(c) = self.next() {
                    if c == ')' {
                        self.push_frame(FrameKind::Group, "(?:", start);
                        return Ok(());
                    }
                }
                return Err(self.error("end pattern in group", start));
            }
            '<' if self.eat('=') => self.push_frame(FrameKind::LookAround, "(?<=", start),
            '<' if self.eat('!') => self.push_frame(FrameKind::LookAround, "(?<!", start),
            '<' | '\'' => self.named_group(if c == '<' { '>' } else { '\'' }, start)?,
            '-' | 'i' | 'm' | 'x' | 'a' | 'd' | 'u' => {
                self.index -= 1;
                self.options_group(start)?;
            }
            _ => return Err(self.error("undefined group option", start)),
        }
        Ok(())
    }

    fn named_group(&mut self, close: char, start: usize) -> Result<()> {
        let mut name = String::new();
        loop {
            match self.next() {
                Some(c) if c == close => break,
                Some(c) => name.push(c),
                None => return Err(self.error(format!("invalid group name <{}>", name), start)),
            }
        }
        if name.is_empty() {
            return Err(self.error("group name is empty", start));
        }
        if !valid_name(&name) {
            return Err(self.error(format!("invalid group name <{}>", name), start));
        }
        if self.known.is_none() {
            self.table.named += 1;
            let number = self.table.named;
            self.table.names.insert(&name, number);
        }
        self.groups_seen += 1;
        let text = format!("(?<{}>", name);
        self.push_frame(FrameKind::Capture(self.groups_seen), &text, start);
        Ok(())
    }

    /// `(?imx-imx)` for the rest of the enclosing group, or `(?imx-imx:...)`.
    fn options_group(&mut self, start: usize) -> Result<()> {
        let mut flags = self.flags;
        let mut removing = false;
        loop {
            let Some(c) = self.next() else {
                return Err(self.error("end pattern in group", start));
            };
            match c {
                '-' if !removing => removing = true,
                ')' => {
                    if let Some(frame) = self.frames.last_mut() {
                        frame.implicit += 1;
                    }
                    self.sink.push_str("(?:");
                    self.flags = flags;
                    self.term_start = None;
                    return Ok(());
                }
                ':' => {
                    self.push_frame(FrameKind::Group, "(?:", start);
                    self.flags = flags;
                    return Ok(());
                }
                _ => match RubyFlags::from_char(c) {
                    Some(f) if RubyFlags::is_type_flag(c) && !removing => flags = flags.add(f),
                    Some(f) if !RubyFlags::is_type_flag(c) => {
                        flags = if removing { flags.without(f) } else { flags.add(f) };
                    }
                    _ => return Err(self.error("undefined group option", start)),
                },
            }
        }
    }

    fn close_group(&mut self, start: usize) -> Result<()> {
        self.flush()?;
        if self.frames.len() <= 1 {
            return Err(self.error("unmatched close parenthesis", start));
        }
        let Some(frame) = self.frames.pop() else {
            return Ok(());
        };
        for _ in 0..frame.implicit {
            self.sink.push_str(")");
        }
        self.sink.push_str(")");
        self.flags = frame.flags;
        if frame.kind == FrameKind::LookAround {
            self.term_start = None;
        } else {
            self.term_start = Some(frame.out_start);
            self.term_quantified = false;
        }
        Ok(())
    }
}

/// Onigmo group names: word characters, not starting with a digit.
fn valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .map_or(false, |c| c == '_' || c.is_alphabetic())
        && chars.all(|c| c == '_' || c.is_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::Encoding;
    use crate::unicode::PropertyLookup;

    fn rewrite(pattern: &str) -> Result<String> {
        rewrite_with(pattern, &ParserOptions::default())
    }

    fn rewrite_with(pattern: &str, options: &ParserOptions) -> Result<String> {
        translate(pattern, "", options).map(|t| t.pattern)
    }

    macro_rules! test_rewrite {
        ($name:ident, $pattern:expr, $expected:expr) => {
            #[test]
            fn $name() {
                assert_eq!(rewrite($pattern).unwrap(), $expected);
            }
        };
    }

    macro_rules! test_ruby_error {
        ($name:ident, $pattern:expr, $message:expr, $position:expr) => {
            #[test]
            fn $name() {
                match rewrite($pattern) {
                    Err(RegexError::Syntax(e)) => {
                        assert_eq!(e.message, $message);
                        assert_eq!(e.position, $position);
                    }
                    other => panic!("expected a syntax error, got {:?}", other),
                }
            }
        };
    }

    macro_rules! test_unsupported {
        ($name:ident, $pattern:expr) => {
            #[test]
            fn $name() {
                let err = rewrite($pattern).unwrap_err();
                assert!(err.is_unsupported(), "{:?}", err);
                assert!(validate($pattern, "", &ParserOptions::default()).is_ok());
            }
        };
    }

    test_rewrite!(alternation, "a|b", "a|b");
    test_rewrite!(line_anchors, "^a$", "(?:^|(?<=\\n))a(?:$|(?=\\n))");
    test_rewrite!(input_anchors, "\\Aa\\z", "^a$");
    test_rewrite!(final_newline_anchor, "a\\Z", "a(?:$|(?=\\n$))");
    test_rewrite!(plain_groups_stop_capturing, "(a)(?<n>b)", "(?:a)(?<n>b)");
    test_rewrite!(numbered_backreference, "(a)\\1", "(a)(?:\\1)");
    test_rewrite!(reference_into_open_group, "(a\\1)", "(a[])");
    test_rewrite!(relative_backreference, "(a)(b)\\k<-2>", "(a)(b)(?:\\1)");
    test_rewrite!(octal_escape, "\\101", "A");
    test_rewrite!(open_ended_options, "a(?i)b|c", "a(?:[Bb]|[Cc])");
    test_rewrite!(scoped_options, "(?i:k)", "(?:[Kk\\u{212a}])");
    test_rewrite!(ascii_range_folding, "(?ia:k)", "(?:[Kk])");
    test_rewrite!(options_end_with_group, "(a(?i)b)c", "(a(?:[Bb]))c");
    test_rewrite!(case_insensitive_backreference, "(a)(?i:\\1)", "(a)(?:(?i:\\1))");
    test_rewrite!(double_quantifier, "a**", "(?:a*)*");
    test_rewrite!(exact_interval_then_question, "a{2}?", "(?:a{2})?");
    test_rewrite!(lazy_interval, "a{2,3}?", "a{2,3}?");
    test_rewrite!(fixed_interval_then_question, "a{2,2}?", "(?:a{2,2})?");
    test_rewrite!(quantifier_binds_last_char, "ab*", "ab*");
    test_rewrite!(open_lower_bound, "a{,3}", "a{0,3}");
    test_rewrite!(lone_brace, "a{x", "a\\{x");
    test_rewrite!(comment_group, "a(?#x)*", "a*");
    test_rewrite!(extended_mode, "(?x) a b # c\n", "(?:ab)");
    test_rewrite!(hex_digit_shorthand, "\\h", "[0-9A-Fa-f]");
    test_rewrite!(class_intersection, "[a-c&&b-d]", "[bc]");
    test_rewrite!(ascii_posix_bracket, "(?a)[[:digit:]x]", "(?:[0-9x])");
    test_rewrite!(nested_class, "[a[^\\x00-y]]", "[az-\\u{10ffff}]");
    test_rewrite!(leading_bracket, "[]a]", "[\\]a]");
    test_rewrite!(start_anchor_at_start, "\\Ga", "a");
    test_rewrite!(call_by_name, "(?<a>x)\\g<a>", "(?<a>x)\\g<1>");
    test_rewrite!(relative_call, "(x)\\g<-1>", "(x)\\g<1>");
    test_rewrite!(
        sharp_s_literal,
        "(?i)ß",
        "(?:(?:[\\u{df}\\u{1e9e}]|[Ss\\u{17f}][Ss\\u{17f}]))"
    );
    test_rewrite!(
        sharp_s_class,
        "(?i)[ß]",
        "(?:(?:[Ss\\u{17f}][Ss\\u{17f}]|[\\u{df}\\u{1e9e}]))"
    );
    test_rewrite!(
        word_boundary,
        "\\b",
        "(?:(?<=[0-9A-Z_a-z])(?![0-9A-Z_a-z])|(?<![0-9A-Z_a-z])(?=[0-9A-Z_a-z]))"
    );

    test_ruby_error!(unterminated_group, "a(b", "end pattern with unmatched parenthesis", 1);
    test_ruby_error!(unmatched_close, "a)", "unmatched close parenthesis", 1);
    test_ruby_error!(nothing_to_repeat, "*a", "target of repeat operator is not specified", 0);
    test_ruby_error!(unterminated_class, "[a", "premature end of char-class", 0);
    test_ruby_error!(empty_range, "x[b-a]", "empty range in char class", 2);
    test_ruby_error!(
        numbered_reference_with_names,
        "(?<a>x)\\1",
        "numbered backref/call is not allowed. (use name)",
        7
    );
    test_ruby_error!(reference_to_later_group, "\\2(a)(b)", "invalid backref number/name", 0);
    test_ruby_error!(undefined_name, "(?<a>x)\\k<b>", "undefined name <b> reference", 7);
    test_ruby_error!(undefined_call, "\\g<b>", "undefined name <b> call", 0);
    test_ruby_error!(
        multiplexed_call,
        "(?<a>x)(?<a>y)\\g<a>",
        "multiplex defined name <a> call",
        14
    );
    test_ruby_error!(undefined_group_call, "\\g<2>(a)", "undefined group <2> reference", 0);
    test_ruby_error!(bad_option, "(?z)", "undefined group option", 0);
    test_ruby_error!(bad_property, "\\p{Foo}", "invalid character property name {Foo}", 0);
    test_ruby_error!(
        bounds_out_of_order,
        "a{3,2}",
        "upper is smaller than lower in repeat range",
        1
    );
    test_ruby_error!(too_big_repeat, "a{100001}", "too big number for repeat range", 1);
    test_ruby_error!(trailing_backslash, "a\\", "end pattern at escape", 1);
    test_ruby_error!(empty_name, "(?<>a)", "group name is empty", 0);
    test_ruby_error!(bad_posix_bracket, "[[:alphabet:]]", "invalid POSIX bracket type", 1);

    test_unsupported!(atomic_group, "(?>a)");
    test_unsupported!(possessive, "a*+");
    test_unsupported!(grapheme_cluster, "\\X");
    test_unsupported!(keep, "a\\Kb");
    test_unsupported!(absent, "(?~a)");
    test_unsupported!(conditional, "(a)(?(1)b|c)");
    test_unsupported!(start_anchor_later, "a\\G");
    test_unsupported!(reference_with_level, "(?<a>x)\\k<a+1>");

    #[test]
    fn script_properties() {
        for pattern in ["\\p{Greek}", "\\p{^Greek}", "\\P{Greek}", "[\\p{Lt}a]"] {
            assert!(rewrite(pattern).is_ok(), "{}", pattern);
        }
    }

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
        let err = rewrite_with("\\p{Greek}", &options).unwrap_err();
        assert!(err.is_unsupported(), "{:?}", err);
        assert!(validate("\\p{Greek}", "", &options).is_ok());
        assert!(validate("\\p{Foo}", "", &options).is_err());
    }

    #[test]
    fn bad_top_level_flags() {
        let err = translate("a", "q", &ParserOptions::default()).unwrap_err();
        assert_eq!(err, RegexError::syntax("unknown regexp option: q", 0));
    }

    #[test]
    fn ignoring_atomic_groups() {
        let options = ParserOptions {
            ignore_atomic_groups: true,
            ..ParserOptions::default()
        };
        assert_eq!(rewrite_with("(?>a)b*+", &options).unwrap(), "(?:a)b*");
    }

    #[test]
    fn duplicate_names_multiplex() {
        let t = translate("(?<a>x)|(?<a>y)\\k<a>", "", &ParserOptions::default()).unwrap();
        assert_eq!(t.pattern, "(?<a>x)|(?<a>y)(?:\\k<a>)");
        assert_eq!(t.flags, "u");
        assert_eq!(t.named_groups.to_string(), "a => 1|2");
    }

    #[test]
    fn folding_stays_inside_the_encoding() {
        let ascii = ParserOptions::default().with_encoding(Encoding::Ascii);
        assert_eq!(rewrite_with("(?i)ß", &ascii).unwrap(), "(?:\\u{df})");
        assert_eq!(rewrite_with(".", &ascii).unwrap(), "[\\u{0}-\\u{9}\\u{b}-\\u{7f}]");
    }

    #[test]
    fn dot_matches_newline_with_m() {
        let options = ParserOptions::default().with_encoding(Encoding::Ascii);
        let t = translate(".", "m", &options).unwrap();
        assert_eq!(t.pattern, "[\\u{0}-\\u{7f}]");
    }

    #[test]
    fn parse_inlines_calls() {
        let parsed = parse("(a)\\g<1>", "", &ParserOptions::default(), false).unwrap();
        assert_eq!(parsed.ast.to_string(), "(a)(a)");
        assert_eq!(parsed.ast.group_count(), 1);
    }

    #[test]
    fn recursive_call_is_unsupported() {
        let err = parse("(a\\g<1>)", "", &ParserOptions::default(), false).unwrap_err();
        assert!(err.is_unsupported());
    }

    #[test]
    fn validation_reports_syntax_errors() {
        let err = validate("(?>a)(", "", &ParserOptions::default()).unwrap_err();
        assert!(err.is_syntax());
    }
}
