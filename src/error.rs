use std::fmt;

/// A pattern that is not well formed according to its dialect.
///
/// `position` is the codepoint offset into the original pattern; `message` is the dialect's own
/// error text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub message: String,
    pub position: usize,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, position: usize) -> Self {
        SyntaxError {
            message: message.into(),
            position,
        }
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at position {}", self.message, self.position)
    }
}

impl std::error::Error for SyntaxError {}

/// A well formed pattern that uses something we can't translate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsupportedError {
    pub feature: String,
}

impl UnsupportedError {
    pub fn new(feature: impl Into<String>) -> Self {
        UnsupportedError {
            feature: feature.into(),
        }
    }
}

impl fmt::Display for UnsupportedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unsupported: {}", self.feature)
    }
}

impl std::error::Error for UnsupportedError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegexError {
    Syntax(SyntaxError),
    Unsupported(UnsupportedError),
}

impl RegexError {
    pub fn syntax(message: impl Into<String>, position: usize) -> Self {
        RegexError::Syntax(SyntaxError::new(message, position))
    }

    pub fn unsupported(feature: impl Into<String>) -> Self {
        RegexError::Unsupported(UnsupportedError::new(feature))
    }

    pub fn is_syntax(&self) -> bool {
        matches!(self, RegexError::Syntax(_))
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, RegexError::Unsupported(_))
    }
}

impl fmt::Display for RegexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegexError::Syntax(e) => write!(f, "Syntax error: {}", e),
            RegexError::Unsupported(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for RegexError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RegexError::Syntax(e) => Some(e),
            RegexError::Unsupported(e) => Some(e),
        }
    }
}

impl From<SyntaxError> for RegexError {
    fn from(e: SyntaxError) -> Self {
        RegexError::Syntax(e)
    }
}

impl From<UnsupportedError> for RegexError {
    fn from(e: UnsupportedError) -> Self {
        RegexError::Unsupported(e)
    }
}

pub type Result<T> = std::result::Result<T, RegexError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_syntax() {
        let e = RegexError::syntax("nothing to repeat", 3);
        assert_eq!(e.to_string(), "Syntax error: nothing to repeat at position 3");
        assert!(e.is_syntax());
    }

    #[test]
    fn display_unsupported() {
        let e: RegexError = UnsupportedError::new("atomic groups").into();
        assert_eq!(e.to_string(), "Unsupported: atomic groups");
        assert!(e.is_unsupported());
    }
}
