use fst::raw::CompiledAddr;
use fst::{Set, SetBuilder};

use crate::error::CubeErrorKind;
use crate::CubeResult;

/// A compact handle identifying one dawg node.
pub type DawgNodeRef = CompiledAddr;

/// One outgoing dawg transition, already decoded to a full Unicode scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DawgChild {
    pub ch: char,
    pub node: DawgNodeRef,
    pub end_of_word: bool,
    pub terminal: bool,
}

/// A directed acyclic word graph over the word list, stored as an fst. The
/// generative fan-out enumerates outgoing transitions one Unicode scalar at
/// a time by walking the underlying byte transitions.
pub struct WordDawg {
    set: Set<Vec<u8>>,
}

impl std::fmt::Debug for WordDawg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WordDawg")
            .field("word_count", &self.word_count())
            .finish()
    }
}

impl WordDawg {
    /// Builds a dawg from words in any order. Duplicates collapse.
    pub fn from_words<I, S>(words: I) -> CubeResult<WordDawg>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut sorted: Vec<String> = words
            .into_iter()
            .map(|word| word.as_ref().to_string())
            .collect();
        sorted.sort();
        sorted.dedup();

        let mut builder = SetBuilder::memory();
        for word in &sorted {
            builder
                .insert(word)
                .map_err(|err| CubeErrorKind::Serialize.with_error(anyhow::anyhow!(err)))?;
        }
        let bytes = builder
            .into_inner()
            .map_err(|err| CubeErrorKind::Serialize.with_error(anyhow::anyhow!(err)))?;
        let set =
            Set::new(bytes).map_err(|err| CubeErrorKind::Decode.with_error(anyhow::anyhow!(err)))?;
        Ok(WordDawg { set })
    }

    pub fn word_count(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    pub fn contains(&self, word: &str) -> bool {
        self.set.contains(word)
    }

    /// The root node.
    pub fn root(&self) -> DawgNodeRef {
        self.set.as_fst().root().addr()
    }

    /// Whether a word may end at this node.
    pub fn end_of_word(&self, node: DawgNodeRef) -> bool {
        self.set.as_fst().node(node).is_final()
    }

    /// Whether the node has no outgoing transitions.
    pub fn terminal(&self, node: DawgNodeRef) -> bool {
        self.set.as_fst().node(node).is_empty()
    }

    /// All outgoing transitions of a node, decoded to characters.
    pub fn children(&self, node: DawgNodeRef) -> Vec<DawgChild> {
        let fst = self.set.as_fst();
        let mut children = Vec::new();
        for transition in fst.node(node).transitions() {
            let lead = transition.inp;
            let extra_bytes = match utf8_len(lead) {
                Some(len) => len - 1,
                // continuation byte in lead position: not valid utf-8
                None => continue,
            };
            let mut buf = [0u8; 4];
            buf[0] = lead;
            self.collect_scalars(transition.addr, extra_bytes, &mut buf, 1, &mut children);
        }
        children
    }

    fn collect_scalars(
        &self,
        addr: DawgNodeRef,
        remaining: usize,
        buf: &mut [u8; 4],
        depth: usize,
        children: &mut Vec<DawgChild>,
    ) {
        if remaining == 0 {
            if let Ok(text) = std::str::from_utf8(&buf[..depth]) {
                if let Some(ch) = text.chars().next() {
                    children.push(DawgChild {
                        ch,
                        node: addr,
                        end_of_word: self.end_of_word(addr),
                        terminal: self.terminal(addr),
                    });
                }
            }
            return;
        }
        let fst = self.set.as_fst();
        for transition in fst.node(addr).transitions() {
            buf[depth] = transition.inp;
            self.collect_scalars(transition.addr, remaining - 1, buf, depth + 1, children);
        }
    }

    /// Follows the transition labeled with one character.
    pub fn child(&self, node: DawgNodeRef, ch: char) -> Option<DawgChild> {
        let fst = self.set.as_fst();
        let mut buf = [0u8; 4];
        let bytes = ch.encode_utf8(&mut buf).as_bytes();
        let mut addr = node;
        for &byte in bytes {
            let fst_node = fst.node(addr);
            let idx = fst_node.find_input(byte)?;
            addr = fst_node.transition(idx).addr;
        }
        Some(DawgChild {
            ch,
            node: addr,
            end_of_word: self.end_of_word(addr),
            terminal: self.terminal(addr),
        })
    }
}

fn utf8_len(lead: u8) -> Option<usize> {
    match lead {
        0x00..=0x7f => Some(1),
        0xc0..=0xdf => Some(2),
        0xe0..=0xef => Some(3),
        0xf0..=0xf7 => Some(4),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roots_and_children() {
        let dawg = WordDawg::from_words(["cab", "cat", "car", "dog"]).unwrap();
        assert_eq!(dawg.word_count(), 4);

        let root_children = dawg.children(dawg.root());
        let chars: Vec<char> = root_children.iter().map(|child| child.ch).collect();
        assert_eq!(chars, vec!['c', 'd']);
        assert!(root_children.iter().all(|child| !child.end_of_word));
    }

    #[test]
    fn test_end_of_word_and_terminal() {
        let dawg = WordDawg::from_words(["do", "dog"]).unwrap();
        let d = dawg.child(dawg.root(), 'd').unwrap();
        let o = dawg.child(d.node, 'o').unwrap();
        assert!(o.end_of_word);
        assert!(!o.terminal);
        let g = dawg.child(o.node, 'g').unwrap();
        assert!(g.end_of_word);
        assert!(g.terminal);
        assert!(dawg.child(g.node, 'x').is_none());
    }

    #[test]
    fn test_multibyte_children() {
        let dawg = WordDawg::from_words(["über", "üben", "out"]).unwrap();
        let chars: Vec<char> = dawg.children(dawg.root()).iter().map(|c| c.ch).collect();
        assert_eq!(chars, vec!['o', 'ü']);
        let u = dawg.child(dawg.root(), 'ü').unwrap();
        let b = dawg.child(u.node, 'b').unwrap();
        let e = dawg.child(b.node, 'e').unwrap();
        let next: Vec<char> = dawg.children(e.node).iter().map(|c| c.ch).collect();
        assert_eq!(next, vec!['n', 'r']);
    }

    #[test]
    fn test_empty_dawg() {
        let dawg = WordDawg::from_words(Vec::<String>::new()).unwrap();
        assert!(dawg.is_empty());
        assert!(dawg.children(dawg.root()).is_empty());
        assert!(!dawg.contains("any"));
    }

    #[test]
    fn test_contains() {
        let dawg = WordDawg::from_words(["cab", "cab", "cat"]).unwrap();
        assert_eq!(dawg.word_count(), 2);
        assert!(dawg.contains("cab"));
        assert!(!dawg.contains("ca"));
    }
}
