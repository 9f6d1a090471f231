//! Case data for Python's `re.LOCALE` flag.
//!
//! Locale patterns are bytes patterns, so the data covers one single-byte charset. Lookups go
//! through a small process-wide LRU cache.

use std::sync::{Arc, Mutex};

use once_cell::sync::Lazy;

use crate::charset::{CodePointSet, CodePointSetAccumulator};
use crate::error::UnsupportedError;

pub const LOCALE_CACHE_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Charset {
    Ascii,
    Latin1,
    Latin9,
}

impl Charset {
    fn from_locale(locale: &str) -> Option<Charset> {
        if matches!(locale, "C" | "POSIX") {
            return Some(Charset::Ascii);
        }
        let charset = match locale.split_once('.') {
            Some((_, rest)) => rest.split('@').next().unwrap_or(rest),
            None => return Some(Charset::Latin1),
        };
        match charset
            .to_ascii_lowercase()
            .replace(['-', '_'], "")
            .as_str()
        {
            "iso88591" | "latin1" => Some(Charset::Latin1),
            "iso885915" | "latin9" => Some(Charset::Latin9),
            "ascii" | "usascii" | "ansix3.41968" => Some(Charset::Ascii),
            _ => None,
        }
    }

    fn decode(&self, byte: u8) -> Option<char> {
        match self {
            Charset::Ascii if byte >= 0x80 => None,
            Charset::Latin9 => Some(match byte {
                0xA4 => '\u{20AC}',
                0xA6 => '\u{160}',
                0xA8 => '\u{161}',
                0xB4 => '\u{17D}',
                0xB8 => '\u{17E}',
                0xBC => '\u{152}',
                0xBD => '\u{153}',
                0xBE => '\u{178}',
                b => b as char,
            }),
            _ => Some(byte as char),
        }
    }

    fn encode(&self, c: char) -> Option<u8> {
        (0..=255u8).find(|&b| self.decode(b) == Some(c))
    }
}

/// Lower and upper case mappings of every byte of one charset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocaleFoldData {
    locale: String,
    lower: [u8; 256],
    upper: [u8; 256],
}

fn single_mapping(mut mapped: impl Iterator<Item = char>) -> Option<char> {
    match (mapped.next(), mapped.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}

impl LocaleFoldData {
    pub fn new(locale: &str) -> Result<Self, UnsupportedError> {
        let charset = Charset::from_locale(locale)
            .ok_or_else(|| UnsupportedError::new(format!("locale {} is not supported", locale)))?;
        let mut lower = [0u8; 256];
        let mut upper = [0u8; 256];
        for b in 0..=255u8 {
            lower[b as usize] = b;
            upper[b as usize] = b;
            let Some(c) = charset.decode(b) else {
                continue;
            };
            if let Some(l) = single_mapping(c.to_lowercase()).and_then(|l| charset.encode(l)) {
                lower[b as usize] = l;
            }
            if let Some(u) = single_mapping(c.to_uppercase()).and_then(|u| charset.encode(u)) {
                upper[b as usize] = u;
            }
        }
        Ok(LocaleFoldData {
            locale: locale.to_string(),
            lower,
            upper,
        })
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub fn lower(&self, b: u8) -> u8 {
        self.lower[b as usize]
    }

    pub fn upper(&self, b: u8) -> u8 {
        self.upper[b as usize]
    }

    /// Adds the case variants of every byte in `set`; codepoints above 0xFF are kept as they are.
    pub fn closure(&self, set: &CodePointSet) -> CodePointSet {
        let mut acc = CodePointSetAccumulator::new();
        acc.add_set(set);
        for c in set.iter().take_while(|&c| c <= 0xFF) {
            let b = c as u8;
            let key = self.lower(self.upper(b));
            for other in 0..=255u8 {
                if self.lower(self.upper(other)) == key {
                    acc.add_code_point(other as u32);
                }
            }
        }
        acc.to_code_point_set()
    }
}

/// Least recently used cache of locale data, most recent entry last.
#[derive(Debug)]
pub struct LocaleCache {
    capacity: usize,
    entries: Vec<Arc<LocaleFoldData>>,
}

impl LocaleCache {
    pub fn new(capacity: usize) -> Self {
        LocaleCache {
            capacity,
            entries: Vec::with_capacity(capacity),
        }
    }

    pub fn get(&mut self, locale: &str) -> Result<Arc<LocaleFoldData>, UnsupportedError> {
        if let Some(i) = self.entries.iter().position(|e| e.locale() == locale) {
            let entry = self.entries.remove(i);
            self.entries.push(entry.clone());
            return Ok(entry);
        }
        log::debug!("locale cache miss for {}", locale);
        let entry = Arc::new(LocaleFoldData::new(locale)?);
        if self.entries.len() >= self.capacity {
            self.entries.remove(0);
        }
        self.entries.push(entry.clone());
        Ok(entry)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, locale: &str) -> bool {
        self.entries.iter().any(|e| e.locale() == locale)
    }
}

static LOCALE_CACHE: Lazy<Mutex<LocaleCache>> =
    Lazy::new(|| Mutex::new(LocaleCache::new(LOCALE_CACHE_CAPACITY)));

/// Case data for `locale` from the shared cache.
pub fn locale_fold_data(locale: &str) -> Result<Arc<LocaleFoldData>, UnsupportedError> {
    LOCALE_CACHE
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .get(locale)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latin1_mappings() {
        let data = LocaleFoldData::new("en_US.ISO-8859-1").unwrap();
        assert_eq!(data.lower(b'A'), b'a');
        assert_eq!(data.upper(0xE9), 0xC9);
        // ÿ upper-cases to U+0178, which Latin-1 lacks.
        assert_eq!(data.upper(0xFF), 0xFF);
        let closed = data.closure(&CodePointSet::from_code_point(0xE9));
        assert_eq!(closed, CodePointSet::from_code_points([0xC9, 0xE9]));
    }

    #[test]
    fn latin9_has_extra_letters() {
        let data = LocaleFoldData::new("fr_FR.ISO-8859-15").unwrap();
        assert_eq!(data.upper(0xFF), 0xBE);
        assert_eq!(data.lower(0xA6), 0xA8);
    }

    #[test]
    fn c_locale_is_ascii() {
        let data = LocaleFoldData::new("C").unwrap();
        assert_eq!(data.upper(0xE9), 0xE9);
        assert_eq!(data.upper(b'q'), b'Q');
    }

    #[test]
    fn unknown_charset() {
        let err = LocaleFoldData::new("ja_JP.EUC-JP").unwrap_err();
        assert_eq!(err.feature, "locale ja_JP.EUC-JP is not supported");
    }

    #[test]
    fn cache_evicts_least_recent() {
        let mut cache = LocaleCache::new(2);
        cache.get("C").unwrap();
        cache.get("en_US").unwrap();
        cache.get("C").unwrap();
        cache.get("fr_FR.latin9").unwrap();
        assert_eq!(cache.len(), 2);
        assert!(cache.contains("C"));
        assert!(!cache.contains("en_US"));
    }
}
