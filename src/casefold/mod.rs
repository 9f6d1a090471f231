//! Case folding and case closure over [`CodePointSet`]s.
//!
//! Each dialect family folds differently; [`CaseFoldAlgorithm`] names the table. The tables and
//! their unfolding tries are built lazily on first use and are read-only afterwards.

mod data;
pub mod locale;
mod trie;
mod unfold;

pub use locale::{locale_fold_data, LocaleCache, LocaleFoldData};
pub use trie::CaseFoldTrie;
pub use unfold::{unfold_string, UnfoldSink, MAX_UNFOLD_DEPTH};

use crate::charset::{CodePointSet, CodePointSetAccumulator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaseFoldAlgorithm {
    /// `Canonicalize` without the `u` flag: upper-case, never mapping non-ASCII to ASCII.
    EcmaScriptNonUnicode,
    EcmaScriptUnicode,
    PythonUnicode,
    PythonAscii,
    Ruby,
    OracleDb,
}

impl CaseFoldAlgorithm {
    pub const ALL: [CaseFoldAlgorithm; 6] = [
        CaseFoldAlgorithm::EcmaScriptNonUnicode,
        CaseFoldAlgorithm::EcmaScriptUnicode,
        CaseFoldAlgorithm::PythonUnicode,
        CaseFoldAlgorithm::PythonAscii,
        CaseFoldAlgorithm::Ruby,
        CaseFoldAlgorithm::OracleDb,
    ];

    /// Whether a single codepoint may fold to several (`ß` to `ss`).
    pub fn has_multi_code_point_folds(&self) -> bool {
        matches!(self, CaseFoldAlgorithm::Ruby | CaseFoldAlgorithm::OracleDb)
    }

    pub fn trie(&self) -> &'static CaseFoldTrie {
        &data::table(*self).trie
    }
}

pub fn fold_code_point(c: u32, algorithm: CaseFoldAlgorithm) -> u32 {
    data::table(algorithm).fold_code_point(c)
}

/// The fold of `c` as a sequence. Longer than one codepoint only for multi-codepoint folds.
pub fn full_fold(c: u32, algorithm: CaseFoldAlgorithm) -> Vec<u32> {
    data::table(algorithm).full_fold(c)
}

/// Replaces every codepoint of `set` with its single-codepoint fold.
pub fn fold(set: &CodePointSet, algorithm: CaseFoldAlgorithm) -> CodePointSet {
    let table = data::table(algorithm);
    let mut removed = vec![];
    let mut added = vec![];
    for r in set.ranges() {
        for (&c, &f) in table.single.range(r.lo..=r.hi) {
            removed.push(c);
            added.push(f);
        }
    }
    if removed.is_empty() {
        return set.clone();
    }
    set.subtract(&CodePointSet::from_code_points(removed))
        .union(&CodePointSet::from_code_points(added))
}

/// Adds to `set` everything that folds like one of its members, as long as
/// `accept(member, candidate)` allows it.
pub fn closure<F>(set: &CodePointSet, algorithm: CaseFoldAlgorithm, accept: F) -> CodePointSet
where
    F: Fn(u32, u32) -> bool,
{
    let table = data::table(algorithm);
    let mut acc = CodePointSetAccumulator::new();
    acc.add_set(set);
    for r in set.ranges() {
        for (&c, &i) in table.class_of.range(r.lo..=r.hi) {
            for &m in &table.classes[i].members {
                if m != c && !acc.contains(m) && accept(c, m) {
                    acc.add_code_point(m);
                }
            }
        }
    }
    acc.to_code_point_set()
}

/// Members of `set` whose fold is several codepoints, paired with that fold.
pub fn closure_multi_code_point(
    set: &CodePointSet,
    algorithm: CaseFoldAlgorithm,
) -> Vec<(u32, Vec<u32>)> {
    let table = data::table(algorithm);
    let mut out = vec![];
    for r in set.ranges() {
        for (&c, &i) in table.class_of.range(r.lo..=r.hi) {
            let key = &table.classes[i].key;
            if key.len() > 1 {
                out.push((c, key.clone()));
            }
        }
    }
    out
}

/// Accept predicate that keeps ASCII and non-ASCII codepoints apart unless `fully_foldable`
/// holds the source codepoint.
pub fn ascii_boundary_predicate(fully_foldable: &CodePointSet) -> impl Fn(u32, u32) -> bool + '_ {
    move |from, to| (from < 0x80) == (to < 0x80) || fully_foldable.contains(from)
}
