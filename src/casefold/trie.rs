use std::collections::BTreeMap;

/// Maps folded codepoint sequences back to the codepoints that fold to them.
#[derive(Debug, Clone)]
pub struct CaseFoldTrie {
    nodes: Vec<TrieNode>,
    keys: usize,
}

#[derive(Debug, Clone, Default)]
struct TrieNode {
    children: BTreeMap<u32, usize>,
    code_points: Vec<u32>,
}

impl Default for CaseFoldTrie {
    fn default() -> Self {
        Self::new()
    }
}

impl CaseFoldTrie {
    pub fn new() -> Self {
        CaseFoldTrie {
            nodes: vec![TrieNode::default()],
            keys: 0,
        }
    }

    pub fn insert(&mut self, folded: &[u32], code_point: u32) {
        let mut node = 0;
        for &c in folded {
            node = match self.nodes[node].children.get(&c) {
                Some(&next) => next,
                None => {
                    self.nodes.push(TrieNode::default());
                    let next = self.nodes.len() - 1;
                    self.nodes[node].children.insert(c, next);
                    next
                }
            };
        }
        let values = &mut self.nodes[node].code_points;
        if values.is_empty() {
            self.keys += 1;
        }
        if let Err(i) = values.binary_search(&code_point) {
            values.insert(i, code_point);
        }
    }

    /// The codepoints folding to exactly `folded`.
    pub fn get(&self, folded: &[u32]) -> Option<&[u32]> {
        let mut node = 0;
        for c in folded {
            node = *self.nodes[node].children.get(c)?;
        }
        let values = &self.nodes[node].code_points;
        (!values.is_empty()).then_some(values.as_slice())
    }

    /// Every key that is a prefix of `text`, as `(length, codepoints)`, shortest first.
    pub fn prefixes(&self, text: &[u32]) -> Vec<(usize, &[u32])> {
        let mut out = vec![];
        let mut node = 0;
        for (i, c) in text.iter().enumerate() {
            match self.nodes[node].children.get(c) {
                Some(&next) => node = next,
                None => break,
            }
            let values = &self.nodes[node].code_points;
            if !values.is_empty() {
                out.push((i + 1, values.as_slice()));
            }
        }
        out
    }

    /// Number of distinct folded sequences.
    pub fn len(&self) -> usize {
        self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_shortest_first() {
        let mut trie = CaseFoldTrie::new();
        trie.insert(&[0x73], 0x53);
        trie.insert(&[0x73], 0x73);
        trie.insert(&[0x73, 0x73], 0xDF);
        trie.insert(&[0x73, 0x74], 0xFB06);
        assert_eq!(trie.len(), 3);
        assert_eq!(
            trie.prefixes(&[0x73, 0x73, 0x61]),
            vec![(1, &[0x53, 0x73][..]), (2, &[0xDF][..])]
        );
        assert_eq!(trie.get(&[0x73, 0x74]), Some(&[0xFB06][..]));
        assert_eq!(trie.get(&[0x74]), None);
        assert!(trie.prefixes(&[0x61]).is_empty());
    }
}
