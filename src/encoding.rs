use crate::charset::{CodePointSet, Range};

/// Target encoding of the matched text. Determines which codepoints can occur at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Encoding {
    Utf8,
    #[default]
    Utf16,
    Utf32,
    Latin1,
    Ascii,
}

impl Encoding {
    pub fn max_code_point(&self) -> u32 {
        match self {
            Encoding::Utf8 | Encoding::Utf16 | Encoding::Utf32 => 0x10FFFF,
            Encoding::Latin1 => 0xFF,
            Encoding::Ascii => 0x7F,
        }
    }

    pub fn full_range(&self) -> Range {
        Range::new(0, self.max_code_point())
    }

    pub fn full_set(&self) -> CodePointSet {
        CodePointSet::from_range(0, self.max_code_point())
    }

    pub fn contains(&self, c: u32) -> bool {
        c <= self.max_code_point()
    }

    pub fn is_unicode(&self) -> bool {
        self.max_code_point() == 0x10FFFF
    }

    pub fn name(&self) -> &'static str {
        match self {
            Encoding::Utf8 => "UTF-8",
            Encoding::Utf16 => "UTF-16",
            Encoding::Utf32 => "UTF-32",
            Encoding::Latin1 => "LATIN-1",
            Encoding::Ascii => "ASCII",
        }
    }
}

impl std::str::FromStr for Encoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "utf8" => Ok(Encoding::Utf8),
            "utf16" => Ok(Encoding::Utf16),
            "utf32" => Ok(Encoding::Utf32),
            "latin1" | "iso88591" | "bytes" => Ok(Encoding::Latin1),
            "ascii" | "usascii" => Ok(Encoding::Ascii),
            _ => Err(format!("unknown encoding {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges() {
        assert_eq!(Encoding::Ascii.full_range(), Range::new(0, 0x7F));
        assert_eq!(Encoding::Latin1.max_code_point(), 0xFF);
        assert!(Encoding::Utf8.contains(0x1F600));
        assert!(!Encoding::Latin1.contains(0x100));
    }

    #[test]
    fn parse_names() {
        assert_eq!("UTF-8".parse::<Encoding>(), Ok(Encoding::Utf8));
        assert_eq!("latin_1".parse::<Encoding>(), Ok(Encoding::Latin1));
        assert!("ebcdic".parse::<Encoding>().is_err());
    }
}
