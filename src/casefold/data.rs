//! Fold tables, derived once from the case mappings the standard library ships.

use std::collections::{BTreeMap, HashMap};

use once_cell::sync::Lazy;

use super::trie::CaseFoldTrie;
use super::CaseFoldAlgorithm;
use crate::charset::MAX_CODE_POINT;

/// One cased codepoint with its full mappings.
#[derive(Debug)]
struct CaseEntry {
    code_point: u32,
    lower: Vec<u32>,
    upper: Vec<u32>,
    full: Vec<u32>,
}

/// `lower(upper(c))`, repeated until it stops changing (U+1E9E goes to U+00DF, then to "ss").
fn full_fold_of(c: char) -> Vec<u32> {
    let mut current = vec![c];
    for _ in 0..4 {
        let next: Vec<char> = current
            .iter()
            .flat_map(|c| c.to_uppercase())
            .flat_map(char::to_lowercase)
            .collect();
        if next == current {
            break;
        }
        current = next;
    }
    current.into_iter().map(u32::from).collect()
}

static CASE_DATA: Lazy<Vec<CaseEntry>> = Lazy::new(|| {
    let mut entries = vec![];
    for c in (0..=MAX_CODE_POINT).filter_map(char::from_u32) {
        let lower: Vec<u32> = c.to_lowercase().map(u32::from).collect();
        let upper: Vec<u32> = c.to_uppercase().map(u32::from).collect();
        if lower == [c as u32] && upper == [c as u32] {
            continue;
        }
        let full = full_fold_of(c);
        entries.push(CaseEntry {
            code_point: c as u32,
            lower,
            upper,
            full,
        });
    }
    log::debug!("loaded case data for {} codepoints", entries.len());
    entries
});

#[derive(Debug)]
pub(crate) struct FoldClass {
    /// What every member folds to.
    pub key: Vec<u32>,
    /// Sorted.
    pub members: Vec<u32>,
}

/// Equivalence classes of one fold algorithm, restricted to codepoints whose class is not just
/// themselves.
#[derive(Debug)]
pub(crate) struct FoldTable {
    pub classes: Vec<FoldClass>,
    pub class_of: BTreeMap<u32, usize>,
    /// Single-codepoint fold, only where it differs from the codepoint.
    pub single: BTreeMap<u32, u32>,
    pub trie: CaseFoldTrie,
}

fn single_or_self(mapping: &[u32], c: u32) -> u32 {
    match mapping {
        [m] => *m,
        _ => c,
    }
}

fn simple_fold(e: &CaseEntry) -> u32 {
    match e.full.as_slice() {
        [f] => *f,
        _ => single_or_self(&e.lower, e.code_point),
    }
}

fn raw_key(e: &CaseEntry, algorithm: CaseFoldAlgorithm) -> Vec<u32> {
    let c = e.code_point;
    match algorithm {
        CaseFoldAlgorithm::EcmaScriptNonUnicode => match e.upper.as_slice() {
            [u] if !(c >= 0x80 && *u < 0x80) => vec![*u],
            _ => vec![c],
        },
        CaseFoldAlgorithm::EcmaScriptUnicode | CaseFoldAlgorithm::PythonUnicode => {
            vec![simple_fold(e)]
        }
        CaseFoldAlgorithm::PythonAscii => match char::from_u32(c) {
            Some(ch) if ch.is_ascii_alphabetic() => vec![ch.to_ascii_lowercase() as u32],
            _ => vec![c],
        },
        CaseFoldAlgorithm::Ruby | CaseFoldAlgorithm::OracleDb => e.full.clone(),
    }
}

/// Follows single-codepoint mappings until they stop changing.
fn settle(mut c: u32, map: &HashMap<u32, u32>) -> u32 {
    for _ in 0..4 {
        match map.get(&c) {
            Some(&next) if next != c => c = next,
            _ => break,
        }
    }
    c
}

impl FoldTable {
    fn build(algorithm: CaseFoldAlgorithm) -> FoldTable {
        let data = &*CASE_DATA;
        let raw: HashMap<u32, Vec<u32>> = data
            .iter()
            .map(|e| (e.code_point, raw_key(e, algorithm)))
            .collect();
        let raw_single: HashMap<u32, u32> = raw
            .iter()
            .filter_map(|(&c, k)| match k.as_slice() {
                [s] => Some((c, *s)),
                _ => None,
            })
            .collect();
        let simple: HashMap<u32, u32> = data
            .iter()
            .map(|e| (e.code_point, simple_fold(e)))
            .collect();

        let mut grouped: HashMap<Vec<u32>, Vec<u32>> = HashMap::new();
        let mut single = BTreeMap::new();
        for e in data {
            let c = e.code_point;
            let key = match raw[&c].as_slice() {
                [_] => vec![settle(c, &raw_single)],
                multi => multi.to_vec(),
            };
            let folded = match key.as_slice() {
                [k] => *k,
                _ if algorithm.has_multi_code_point_folds() => settle(c, &simple),
                _ => c,
            };
            if folded != c {
                single.insert(c, folded);
            }
            let members = grouped.entry(key.clone()).or_default();
            members.push(c);
            if let [k] = key.as_slice() {
                members.push(*k);
            }
        }

        let mut groups: Vec<(Vec<u32>, Vec<u32>)> = grouped
            .into_iter()
            .filter_map(|(key, mut members)| {
                members.sort_unstable();
                members.dedup();
                let trivial = members.len() == 1 && key == members;
                (!trivial).then_some((key, members))
            })
            .collect();
        groups.sort();

        let mut class_of = BTreeMap::new();
        let mut trie = CaseFoldTrie::new();
        let mut classes = Vec::with_capacity(groups.len());
        for (key, members) in groups {
            for &m in &members {
                class_of.insert(m, classes.len());
                trie.insert(&key, m);
            }
            classes.push(FoldClass { key, members });
        }
        log::debug!(
            "built {:?} fold table: {} classes, {} trie keys",
            algorithm,
            classes.len(),
            trie.len()
        );
        FoldTable {
            classes,
            class_of,
            single,
            trie,
        }
    }

    pub fn fold_code_point(&self, c: u32) -> u32 {
        self.single.get(&c).copied().unwrap_or(c)
    }

    /// What `c` folds to, possibly several codepoints.
    pub fn full_fold(&self, c: u32) -> Vec<u32> {
        match self.class_of.get(&c) {
            Some(&i) => self.classes[i].key.clone(),
            None => vec![c],
        }
    }

    pub fn class(&self, c: u32) -> Option<&FoldClass> {
        self.class_of.get(&c).map(|&i| &self.classes[i])
    }
}

macro_rules! fold_table {
    ($name:ident, $algorithm:expr) => {
        static $name: Lazy<FoldTable> = Lazy::new(|| FoldTable::build($algorithm));
    };
}

fold_table!(ECMASCRIPT_NON_UNICODE, CaseFoldAlgorithm::EcmaScriptNonUnicode);
fold_table!(ECMASCRIPT_UNICODE, CaseFoldAlgorithm::EcmaScriptUnicode);
fold_table!(PYTHON_UNICODE, CaseFoldAlgorithm::PythonUnicode);
fold_table!(PYTHON_ASCII, CaseFoldAlgorithm::PythonAscii);
fold_table!(RUBY, CaseFoldAlgorithm::Ruby);
fold_table!(ORACLE_DB, CaseFoldAlgorithm::OracleDb);

pub(crate) fn table(algorithm: CaseFoldAlgorithm) -> &'static FoldTable {
    match algorithm {
        CaseFoldAlgorithm::EcmaScriptNonUnicode => &ECMASCRIPT_NON_UNICODE,
        CaseFoldAlgorithm::EcmaScriptUnicode => &ECMASCRIPT_UNICODE,
        CaseFoldAlgorithm::PythonUnicode => &PYTHON_UNICODE,
        CaseFoldAlgorithm::PythonAscii => &PYTHON_ASCII,
        CaseFoldAlgorithm::Ruby => &RUBY,
        CaseFoldAlgorithm::OracleDb => &ORACLE_DB,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cp(c: char) -> u32 {
        c as u32
    }

    #[test]
    fn full_folds() {
        let t = table(CaseFoldAlgorithm::Ruby);
        assert_eq!(t.full_fold(cp('ß')), vec![cp('s'), cp('s')]);
        assert_eq!(t.full_fold(0x1E9E), vec![cp('s'), cp('s')]);
        assert_eq!(t.full_fold(cp('A')), vec![cp('a')]);
        assert_eq!(t.full_fold(cp('1')), vec![cp('1')]);
        assert_eq!(t.fold_code_point(0x1E9E), cp('ß'));
        assert_eq!(t.fold_code_point(cp('ß')), cp('ß'));
    }

    #[test]
    fn ecmascript_canonicalize_keeps_non_ascii_apart() {
        let t = table(CaseFoldAlgorithm::EcmaScriptNonUnicode);
        assert_eq!(t.fold_code_point(cp('a')), cp('A'));
        assert_eq!(t.fold_code_point(cp('ſ')), cp('ſ'));
        assert_eq!(t.fold_code_point(0x212A), 0x212A);
        let u = table(CaseFoldAlgorithm::EcmaScriptUnicode);
        assert_eq!(u.fold_code_point(cp('ſ')), cp('s'));
        assert_eq!(u.fold_code_point(0x212A), cp('k'));
    }

    #[test]
    fn python_ascii_only_letters() {
        let t = table(CaseFoldAlgorithm::PythonAscii);
        assert_eq!(t.fold_code_point(cp('Q')), cp('q'));
        assert_eq!(t.fold_code_point(cp('É')), cp('É'));
        assert_eq!(t.class(cp('q')).map(|c| c.members.len()), Some(2));
    }

    #[test]
    fn classes_include_their_key() {
        let t = table(CaseFoldAlgorithm::PythonUnicode);
        let class = t.class(cp('S')).unwrap();
        assert_eq!(class.members, vec![cp('S'), cp('s'), cp('ſ')]);
        assert_eq!(class.key, vec![cp('s')]);
    }
}
