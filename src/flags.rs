//! Per-dialect flag values and the scoping stack shared by every parser.
//!
//! Flag values are immutable; `add`/`remove` return new values. [`FlagsStack`] tracks which value
//! is in effect: the top of the stack, or the global flags when nothing is pushed.

use std::fmt;
use std::ops::{BitAnd, BitOr, Sub};

use bitflags::bitflags;

pub trait RegexFlags:
    Copy
    + Eq
    + Default
    + fmt::Debug
    + BitOr<Output = Self>
    + BitAnd<Output = Self>
    + Sub<Output = Self>
{
    fn ignore_case(&self) -> bool;
    fn multiline(&self) -> bool;
    fn dot_all(&self) -> bool;
    fn extended(&self) -> bool {
        false
    }
    fn unicode(&self) -> bool {
        false
    }
    fn ascii(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone)]
pub struct FlagsStack<F: RegexFlags> {
    global: F,
    stack: Vec<F>,
}

impl<F: RegexFlags> FlagsStack<F> {
    pub fn new(global: F) -> Self {
        FlagsStack {
            global,
            stack: vec![],
        }
    }

    pub fn current(&self) -> F {
        self.stack.last().copied().unwrap_or(self.global)
    }

    pub fn global(&self) -> F {
        self.global
    }

    pub fn set_global(&mut self, flags: F) {
        self.global = flags;
    }

    pub fn push(&mut self, flags: F) {
        self.stack.push(flags);
    }

    /// Pushes the current flags again, so the matching `pop` is unconditional.
    pub fn push_current(&mut self) {
        self.push(self.current());
    }

    /// Replaces the flags of the innermost scope.
    pub fn replace_current(&mut self, flags: F) {
        match self.stack.last_mut() {
            Some(top) => *top = flags,
            None => self.global = flags,
        }
    }

    pub fn pop(&mut self) -> Option<F> {
        self.stack.pop()
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }
}

fn duplicate_or_unknown(seen: u32, bit: u32) -> bool {
    seen & bit != 0
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EcmaScriptFlags: u16 {
        const HAS_INDICES = 1 << 0;
        const GLOBAL      = 1 << 1;
        const IGNORE_CASE = 1 << 2;
        const MULTILINE   = 1 << 3;
        const DOT_ALL     = 1 << 4;
        const UNICODE     = 1 << 5;
        const STICKY      = 1 << 6;
        const UNICODE_SETS = 1 << 7;
    }
}

impl EcmaScriptFlags {
    pub fn from_char(c: char) -> Option<Self> {
        Some(match c {
            'd' => Self::HAS_INDICES,
            'g' => Self::GLOBAL,
            'i' => Self::IGNORE_CASE,
            'm' => Self::MULTILINE,
            's' => Self::DOT_ALL,
            'u' => Self::UNICODE,
            'y' => Self::STICKY,
            'v' => Self::UNICODE_SETS,
            _ => return None,
        })
    }

    /// Flags allowed inside a `(?ims-ims:...)` modifier group.
    pub fn from_modifier(c: char) -> Option<Self> {
        match c {
            'i' | 'm' | 's' => Self::from_char(c),
            _ => None,
        }
    }

    pub fn parse(flags: &str) -> Result<Self, String> {
        let mut result = Self::empty();
        let mut seen = 0;
        for c in flags.chars() {
            let flag = Self::from_char(c).ok_or_else(|| format!("Invalid flags '{}'", flags))?;
            if duplicate_or_unknown(seen, flag.bits() as u32) {
                return Err(format!("Repeated flag '{}'", c));
            }
            seen |= flag.bits() as u32;
            result |= flag;
        }
        if result.contains(Self::UNICODE | Self::UNICODE_SETS) {
            return Err(format!("Invalid flags '{}'", flags));
        }
        Ok(result)
    }

    pub fn add(self, other: Self) -> Self {
        self | other
    }

    pub fn without(self, other: Self) -> Self {
        self - other
    }
}

impl RegexFlags for EcmaScriptFlags {
    fn ignore_case(&self) -> bool {
        self.contains(Self::IGNORE_CASE)
    }
    fn multiline(&self) -> bool {
        self.contains(Self::MULTILINE)
    }
    fn dot_all(&self) -> bool {
        self.contains(Self::DOT_ALL)
    }
    fn unicode(&self) -> bool {
        self.intersects(Self::UNICODE | Self::UNICODE_SETS)
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PythonFlags: u16 {
        const IGNORE_CASE = 1 << 0;
        const LOCALE      = 1 << 1;
        const MULTILINE   = 1 << 2;
        const DOT_ALL     = 1 << 3;
        const UNICODE     = 1 << 4;
        const VERBOSE     = 1 << 5;
        const ASCII       = 1 << 6;
        const TYPE_FLAGS  = Self::LOCALE.bits() | Self::UNICODE.bits() | Self::ASCII.bits();
    }
}

/// Why a set of Python flags was rejected; the parser turns these into `re` error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PythonFlagsError {
    IncompatibleTypeFlags,
    LocaleWithStr,
    UnicodeWithBytes,
}

impl PythonFlags {
    pub fn from_char(c: char) -> Option<Self> {
        Some(match c {
            'i' => Self::IGNORE_CASE,
            'L' => Self::LOCALE,
            'm' => Self::MULTILINE,
            's' => Self::DOT_ALL,
            'u' => Self::UNICODE,
            'x' => Self::VERBOSE,
            'a' => Self::ASCII,
            _ => return None,
        })
    }

    pub fn is_type_flag(c: char) -> bool {
        matches!(c, 'a' | 'L' | 'u')
    }

    pub fn parse(flags: &str) -> Result<Self, String> {
        flags.chars().try_fold(Self::empty(), |acc, c| {
            Self::from_char(c)
                .map(|f| acc | f)
                .ok_or_else(|| format!("unknown flag {}", c))
        })
    }

    pub fn add(self, other: Self) -> Self {
        self | other
    }

    pub fn without(self, other: Self) -> Self {
        self - other
    }

    pub fn type_flag(&self) -> Self {
        *self & Self::TYPE_FLAGS
    }

    /// Checks type flag exclusivity and fills in the default: `u` for str patterns, nothing for
    /// bytes patterns.
    pub fn fixup(self, str_pattern: bool) -> Result<Self, PythonFlagsError> {
        if self.type_flag().bits().count_ones() > 1 {
            return Err(PythonFlagsError::IncompatibleTypeFlags);
        }
        if str_pattern {
            if self.contains(Self::LOCALE) {
                return Err(PythonFlagsError::LocaleWithStr);
            }
            if !self.contains(Self::ASCII) {
                return Ok(self | Self::UNICODE);
            }
        } else if self.contains(Self::UNICODE) {
            return Err(PythonFlagsError::UnicodeWithBytes);
        }
        Ok(self)
    }
}

impl RegexFlags for PythonFlags {
    fn ignore_case(&self) -> bool {
        self.contains(Self::IGNORE_CASE)
    }
    fn multiline(&self) -> bool {
        self.contains(Self::MULTILINE)
    }
    fn dot_all(&self) -> bool {
        self.contains(Self::DOT_ALL)
    }
    fn extended(&self) -> bool {
        self.contains(Self::VERBOSE)
    }
    fn unicode(&self) -> bool {
        self.contains(Self::UNICODE)
    }
    fn ascii(&self) -> bool {
        self.contains(Self::ASCII)
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RubyFlags: u8 {
        const IGNORE_CASE = 1 << 0;
        /// Ruby's `m`: dot matches newline.
        const MULTILINE   = 1 << 1;
        const EXTENDED    = 1 << 2;
        const ASCII_RANGE = 1 << 3;
        const DEFAULT     = 1 << 4;
        const UNICODE     = 1 << 5;
        const TYPE_FLAGS  = Self::ASCII_RANGE.bits() | Self::DEFAULT.bits() | Self::UNICODE.bits();
    }
}

impl RubyFlags {
    pub fn from_char(c: char) -> Option<Self> {
        Some(match c {
            'i' => Self::IGNORE_CASE,
            'm' => Self::MULTILINE,
            'x' => Self::EXTENDED,
            'a' => Self::ASCII_RANGE,
            'd' => Self::DEFAULT,
            'u' => Self::UNICODE,
            _ => return None,
        })
    }

    pub fn is_type_flag(c: char) -> bool {
        matches!(c, 'a' | 'd' | 'u')
    }

    /// Top-level flags accept only the option letters; the type flags come from inline groups.
    pub fn parse(flags: &str) -> Result<Self, String> {
        flags.chars().try_fold(Self::empty(), |acc, c| match c {
            'i' | 'm' | 'x' => Ok(acc | Self::from_char(c).unwrap_or_default()),
            _ => Err(format!("unknown regexp option: {}", flags)),
        })
    }

    /// Setting a type flag replaces whichever type flag was active.
    pub fn add(self, other: Self) -> Self {
        if other.intersects(Self::TYPE_FLAGS) {
            (self - Self::TYPE_FLAGS) | other
        } else {
            self | other
        }
    }

    pub fn without(self, other: Self) -> Self {
        self - other
    }
}

impl RegexFlags for RubyFlags {
    fn ignore_case(&self) -> bool {
        self.contains(Self::IGNORE_CASE)
    }
    fn multiline(&self) -> bool {
        false
    }
    fn dot_all(&self) -> bool {
        self.contains(Self::MULTILINE)
    }
    fn extended(&self) -> bool {
        self.contains(Self::EXTENDED)
    }
    fn unicode(&self) -> bool {
        self.contains(Self::UNICODE)
    }
    fn ascii(&self) -> bool {
        self.contains(Self::ASCII_RANGE)
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct OracleFlags: u8 {
        const IGNORE_CASE = 1 << 0;
        const DOT_ALL     = 1 << 1;
        const MULTILINE   = 1 << 2;
        const EXTENDED    = 1 << 3;
    }
}

impl OracleFlags {
    /// `match_param` semantics: `i` and `c` override each other, the last one wins. Anything
    /// outside `icnmx` is rejected.
    pub fn parse(flags: &str) -> Result<Self, String> {
        let mut result = Self::empty();
        for c in flags.chars() {
            match c {
                'i' => result |= Self::IGNORE_CASE,
                'c' => result -= Self::IGNORE_CASE,
                'n' => result |= Self::DOT_ALL,
                'm' => result |= Self::MULTILINE,
                'x' => result |= Self::EXTENDED,
                _ => return Err("ORA-01760: illegal argument for function".to_string()),
            }
        }
        Ok(result)
    }
}

impl RegexFlags for OracleFlags {
    fn ignore_case(&self) -> bool {
        self.contains(Self::IGNORE_CASE)
    }
    fn multiline(&self) -> bool {
        self.contains(Self::MULTILINE)
    }
    fn dot_all(&self) -> bool {
        self.contains(Self::DOT_ALL)
    }
    fn extended(&self) -> bool {
        self.contains(Self::EXTENDED)
    }
    fn unicode(&self) -> bool {
        true
    }
}
