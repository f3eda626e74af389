//! Keyword prefix tree.
//!
//! A `KEYWORD` node owns one trie holding the keywords it may match. Lookup is
//! longest-match: `if` and `ifdef` both inserted, input `ifdefx` resolves to
//! `ifdef`.

use crate::KeywordId;

#[derive(Debug, Clone, Default)]
struct TrieNode {
    /// Sorted by byte.
    edges: Vec<(u8, usize)>,
    keyword: Option<KeywordId>,
}

#[derive(Debug, Clone)]
pub(crate) struct KeywordTrie {
    nodes: Vec<TrieNode>,
    caseless: bool,
}

impl KeywordTrie {
    pub(crate) fn new(caseless: bool) -> Self {
        Self { nodes: vec![TrieNode::default()], caseless }
    }

    pub(crate) fn is_caseless(&self) -> bool {
        self.caseless
    }

    pub(crate) fn insert(&mut self, word: &[u8], keyword: KeywordId) {
        let mut at = 0;
        for &b in word {
            let b = self.fold(b);
            at = match self.nodes[at].edges.binary_search_by_key(&b, |&(e, _)| e) {
                Ok(k) => self.nodes[at].edges[k].1,
                Err(k) => {
                    let next = self.nodes.len();
                    self.nodes.push(TrieNode::default());
                    self.nodes[at].edges.insert(k, (b, next));
                    next
                }
            };
        }
        self.nodes[at].keyword = Some(keyword);
    }

    /// Longest keyword starting at `pos`, as `(end, keyword)`.
    pub(crate) fn longest_match(&self, text: &[u8], pos: usize) -> Option<(usize, KeywordId)> {
        let mut at = 0;
        let mut best = None;
        let mut i = pos;
        while let Some(&b) = text.get(i) {
            let b = self.fold(b);
            match self.nodes[at].edges.binary_search_by_key(&b, |&(e, _)| e) {
                Ok(k) => at = self.nodes[at].edges[k].1,
                Err(_) => break,
            }
            i += 1;
            if let Some(keyword) = self.nodes[at].keyword {
                best = Some((i, keyword));
            }
        }
        best
    }

    /// Every stored keyword with its (folded) spelling, in byte order.
    pub(crate) fn words(&self) -> Vec<(Vec<u8>, KeywordId)> {
        let mut out = Vec::new();
        let mut stack = vec![(0usize, Vec::new())];
        while let Some((at, prefix)) = stack.pop() {
            if let Some(keyword) = self.nodes[at].keyword {
                out.push((prefix.clone(), keyword));
            }
            for &(b, next) in self.nodes[at].edges.iter().rev() {
                let mut word = prefix.clone();
                word.push(b);
                stack.push((next, word));
            }
        }
        out
    }

    fn fold(&self, b: u8) -> u8 {
        if self.caseless { b.to_ascii_lowercase() } else { b }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trie(caseless: bool, words: &[&str]) -> KeywordTrie {
        let mut t = KeywordTrie::new(caseless);
        for (k, w) in words.iter().enumerate() {
            t.insert(w.as_bytes(), KeywordId(k as u32));
        }
        t
    }

    #[test]
    fn prefers_longest_keyword() {
        let t = trie(false, &["if", "ifdef", "in"]);
        assert_eq!(t.longest_match(b"ifdefx", 0), Some((5, KeywordId(1))));
        assert_eq!(t.longest_match(b"ifd", 0), Some((2, KeywordId(0))));
        assert_eq!(t.longest_match(b"x in", 2), Some((4, KeywordId(2))));
        assert_eq!(t.longest_match(b"i", 0), None);
    }

    #[test]
    fn caseless_lookup_folds_both_sides() {
        let t = trie(true, &["Select", "FROM"]);
        assert_eq!(t.longest_match(b"SELECT *", 0), Some((6, KeywordId(0))));
        assert_eq!(t.longest_match(b"from", 0), Some((4, KeywordId(1))));
        let strict = trie(false, &["Select"]);
        assert_eq!(strict.longest_match(b"SELECT", 0), None);
    }

    #[test]
    fn lists_words_in_byte_order() {
        let t = trie(false, &["b", "ab", "a"]);
        let words: Vec<_> = t.words().into_iter().map(|(w, _)| String::from_utf8(w).unwrap()).collect();
        assert_eq!(words, ["a", "ab", "b"]);
    }
}
