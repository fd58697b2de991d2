use std::sync::Arc;

use crate::altlist::CharAltList;
use crate::charset::CharSet;
use crate::dawg::WordDawg;
use crate::error::CubeErrorKind;
use crate::langmod::{EdgeKind, LangEdge, LangModel};
use crate::CubeResult;

/// A language model over an ad-hoc word list. Used by the word-cost oracle,
/// which recognizes against a model containing a single candidate string.
/// No punctuation, number or out-of-dictionary machinery is attached.
pub struct WordListLangModel {
    char_set: Arc<CharSet>,
    words: Vec<String>,
    dawg: Option<WordDawg>,
}

impl WordListLangModel {
    pub fn new(char_set: Arc<CharSet>) -> Self {
        WordListLangModel {
            char_set,
            words: Vec::new(),
            dawg: None,
        }
    }

    /// Adds a word, keeping only characters the charset supports. Words
    /// with no supported rendering are silently ignored.
    pub fn add_string(&mut self, word: &str) -> CubeResult<()> {
        if word.is_empty() {
            return Err(CubeErrorKind::Args.with_error(anyhow::anyhow!("empty word")));
        }
        if !word
            .chars()
            .all(|ch| self.char_set.class_id_char(ch).is_some())
        {
            return Ok(());
        }
        self.words.push(word.to_string());
        self.dawg = Some(WordDawg::from_words(&self.words)?);
        Ok(())
    }

    pub fn word_count(&self) -> usize {
        self.words.len()
    }

    fn dawg_children(&self, node: crate::dawg::DawgNodeRef, out: &mut Vec<LangEdge>) {
        let dawg = match &self.dawg {
            Some(dawg) => dawg,
            None => return,
        };
        for child in dawg.children(node) {
            if let Some(class_id) = self.char_set.class_id_char(child.ch) {
                out.push(LangEdge {
                    kind: EdgeKind::Word {
                        dawg: 0,
                        node: child.node,
                        at_root: false,
                        end_of_word: child.end_of_word,
                        terminal: child.terminal,
                        lead_punc: false,
                        trail_punc_cnt: 0,
                    },
                    class_id,
                    text: child.ch.to_string(),
                    root: false,
                    path_cost: 0,
                });
            }
        }
    }
}

impl LangModel for WordListLangModel {
    fn root(&self) -> Option<LangEdge> {
        None
    }

    fn edges(&self, _alt_list: Option<&CharAltList>, parent: Option<&LangEdge>) -> Vec<LangEdge> {
        let mut out = Vec::new();
        match parent {
            None => {
                if let Some(dawg) = &self.dawg {
                    self.dawg_children(dawg.root(), &mut out);
                    for edge in &mut out {
                        edge.root = true;
                    }
                }
            }
            Some(LangEdge {
                kind: EdgeKind::Word { node, terminal, .. },
                ..
            }) => {
                if !*terminal {
                    self.dawg_children(*node, &mut out);
                }
            }
            Some(_) => {}
        }
        out
    }

    fn is_valid_sequence(&self, sequence: &[char], eow_flag: bool) -> bool {
        let dawg = match &self.dawg {
            Some(dawg) => dawg,
            None => return false,
        };
        let mut node = dawg.root();
        let mut child = None;
        for &ch in sequence {
            child = dawg.child(node, ch);
            match child {
                Some(child) => node = child.node,
                None => return false,
            }
        }
        match child {
            Some(child) => !eow_flag || child.end_of_word,
            None => false,
        }
    }

    fn is_leading_punc(&self, _ch: char) -> bool {
        false
    }

    fn is_trailing_punc(&self, _ch: char) -> bool {
        false
    }

    fn is_digit(&self, _ch: char) -> bool {
        false
    }

    fn ood_enabled(&self) -> bool {
        false
    }

    fn numeric_enabled(&self) -> bool {
        false
    }

    fn word_list_enabled(&self) -> bool {
        true
    }

    fn punc_enabled(&self) -> bool {
        false
    }

    fn set_ood(&mut self, _enabled: bool) {}

    fn set_numeric(&mut self, _enabled: bool) {}

    fn set_word_list(&mut self, _enabled: bool) {}

    fn set_punc(&mut self, _enabled: bool) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charset::tests::latin_charset;

    #[test]
    fn test_single_word_model() {
        let charset = Arc::new(latin_charset());
        let mut model = WordListLangModel::new(charset);
        model.add_string("cab").unwrap();

        assert_eq!(model.word_count(), 1);
        assert!(model.is_valid_sequence(&['c', 'a', 'b'], true));
        assert!(!model.is_valid_sequence(&['c', 'a'], true));
        assert!(!model.is_valid_sequence(&['b', 'a', 'c'], true));

        let root_edges = model.edges(None, None);
        assert_eq!(root_edges.len(), 1);
        assert_eq!(root_edges[0].text, "c");
        assert!(root_edges[0].root);
    }

    #[test]
    fn test_unsupported_word_ignored() {
        let charset = Arc::new(latin_charset());
        let mut model = WordListLangModel::new(charset);
        model.add_string("zoo").unwrap();
        assert_eq!(model.word_count(), 0);
        assert!(model.edges(None, None).is_empty());
    }

    #[test]
    fn test_empty_word_rejected() {
        let charset = Arc::new(latin_charset());
        let mut model = WordListLangModel::new(charset);
        assert!(model.add_string("").is_err());
    }
}
