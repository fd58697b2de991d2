use std::sync::Arc;

use crate::altlist::CharAltList;
use crate::charset::CharSet;
use crate::cost::{prob_to_cost, MIN_PROB_COST};
use crate::dawg::{DawgNodeRef, WordDawg};
use crate::error::CubeErrorKind;
use crate::tuning::TuningParams;
use crate::CubeResult;

// Number state machine geometry. The literal order is fixed: leading
// punctuation, trailing punctuation, digits, operators, alphas.
const NUM_STATE_CNT: usize = 4;
const NUM_LITERAL_CNT: usize = 5;
const NUM_TRM: i32 = -99;
const NUM_STATE_MACHINE: [[i32; NUM_LITERAL_CNT]; NUM_STATE_CNT] = [
    [0, 1, 1, NUM_TRM, NUM_TRM],
    [NUM_TRM, 1, 1, 3, 2],
    [NUM_TRM, NUM_TRM, 1, NUM_TRM, 2],
    [NUM_TRM, NUM_TRM, 3, NUM_TRM, 2],
];
const NUM_MAX_REPEAT: [i64; NUM_STATE_CNT] = [3, 32, 8, 3];

/// The language-model state carried by an edge, and the part of an edge
/// that defines its identity for path merging.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    /// A transition inside a word dawg. Punctuation wrappers ride on the
    /// same variant: leading punctuation marks the whole path, trailing
    /// punctuation counts how many marks were appended after the word.
    Word {
        dawg: usize,
        node: DawgNodeRef,
        at_root: bool,
        end_of_word: bool,
        terminal: bool,
        lead_punc: bool,
        trail_punc_cnt: u16,
    },
    /// A state of the number state machine.
    Number { state: usize, literal: usize, repeat: i64 },
    /// The out-of-dictionary fallback, which accepts any single character.
    Ood,
}

/// An edge of the generative language model: the character class consumed,
/// the state reached, and the cost of taking the transition.
#[derive(Debug, Clone)]
pub struct LangEdge {
    pub kind: EdgeKind,
    pub class_id: usize,
    pub text: String,
    pub root: bool,
    pub path_cost: i32,
}

/// Identity of an edge for converging search paths: two edges from
/// different parents with equal identity reach the same language state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EdgeIdentity {
    kind: EdgeKind,
    class_id: usize,
}

impl LangEdge {
    pub fn is_ood(&self) -> bool {
        matches!(self.kind, EdgeKind::Ood)
    }

    pub fn is_number(&self) -> bool {
        matches!(self.kind, EdgeKind::Number { .. })
    }

    /// A path may terminate at any OOD or number edge, at trailing
    /// punctuation, or where the dawg runs out.
    pub fn is_terminal(&self) -> bool {
        match &self.kind {
            EdgeKind::Word {
                terminal,
                trail_punc_cnt,
                ..
            } => *terminal || *trail_punc_cnt > 0,
            EdgeKind::Number { .. } | EdgeKind::Ood => true,
        }
    }

    pub fn is_eow(&self) -> bool {
        match &self.kind {
            EdgeKind::Word { end_of_word, .. } => self.is_terminal() || *end_of_word,
            EdgeKind::Number { .. } | EdgeKind::Ood => true,
        }
    }

    pub fn identity(&self) -> EdgeIdentity {
        EdgeIdentity {
            kind: self.kind.clone(),
            class_id: self.class_id,
        }
    }

    pub fn is_identical(&self, other: &LangEdge) -> bool {
        self.kind == other.kind && self.class_id == other.class_id
    }
}

/// A generative trie over character classes. From any state the model
/// enumerates the allowed next characters together with end-of-word and
/// cost information.
pub trait LangModel: Send + Sync {
    /// The root sentinel edge, if the model has one.
    fn root(&self) -> Option<LangEdge>;

    /// All edges fanning out of `parent` (the root when `None`), optionally
    /// restricted by a character alternates list.
    fn edges(&self, alt_list: Option<&CharAltList>, parent: Option<&LangEdge>) -> Vec<LangEdge>;

    /// Whether the character sequence is accepted by the model, requiring a
    /// valid end-of-word when `eow_flag` is set.
    fn is_valid_sequence(&self, sequence: &[char], eow_flag: bool) -> bool;

    fn is_leading_punc(&self, ch: char) -> bool;
    fn is_trailing_punc(&self, ch: char) -> bool;
    fn is_digit(&self, ch: char) -> bool;

    fn ood_enabled(&self) -> bool;
    fn numeric_enabled(&self) -> bool;
    fn word_list_enabled(&self) -> bool;
    fn punc_enabled(&self) -> bool;
    fn set_ood(&mut self, enabled: bool);
    fn set_numeric(&mut self, enabled: bool);
    fn set_word_list(&mut self, enabled: bool);
    fn set_punc(&mut self, enabled: bool);
}

/// The full language model: word dawgs, the number state machine,
/// punctuation wrappers around both, and the out-of-dictionary fallback.
/// The character sets come from the `.cube.lm` file; the word dawg is
/// compiled from the word-frequency list.
pub struct SystemLangModel {
    char_set: Arc<CharSet>,
    lead_punc: Vec<char>,
    trail_punc: Vec<char>,
    num_lead_punc: Vec<char>,
    num_trail_punc: Vec<char>,
    operators: Vec<char>,
    digits: Vec<char>,
    alphas: Vec<char>,
    word_dawgs: Vec<WordDawg>,
    has_case: bool,
    ood_enabled: bool,
    numeric_enabled: bool,
    word_list_enabled: bool,
    punc_enabled: bool,
    /// OOD fan-out only considers classes at least this likely.
    max_ood_shape_cost: i32,
    ood_cost: i32,
    num_cost: i32,
}

impl SystemLangModel {
    pub fn new(
        char_set: Arc<CharSet>,
        lm_params: &str,
        word_dawgs: Vec<WordDawg>,
        params: &TuningParams,
        has_case: bool,
    ) -> CubeResult<SystemLangModel> {
        let mut model = SystemLangModel {
            char_set,
            lead_punc: Vec::new(),
            trail_punc: Vec::new(),
            num_lead_punc: Vec::new(),
            num_trail_punc: Vec::new(),
            operators: Vec::new(),
            digits: Vec::new(),
            alphas: Vec::new(),
            word_dawgs,
            has_case,
            ood_enabled: true,
            numeric_enabled: true,
            word_list_enabled: true,
            punc_enabled: true,
            max_ood_shape_cost: prob_to_cost(1e-4),
            ood_cost: (params.ood_wgt * MIN_PROB_COST as f64) as i32,
            num_cost: (params.num_wgt * MIN_PROB_COST as f64) as i32,
        };
        model.load_lang_model_elements(lm_params)?;
        Ok(model)
    }

    /// Re-derives the per-edge signal costs after the tuning parameters are
    /// loaded.
    pub fn set_signal_weights(&mut self, params: &TuningParams) {
        self.ood_cost = (params.ood_wgt * MIN_PROB_COST as f64) as i32;
        self.num_cost = (params.num_wgt * MIN_PROB_COST as f64) as i32;
    }

    /// Parses the `.cube.lm` key = value character sets. Characters outside
    /// the charset are removed.
    fn load_lang_model_elements(&mut self, lm_params: &str) -> CubeResult<()> {
        for line in lm_params.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let (key, val) = line.split_once('=').ok_or_else(|| {
                CubeErrorKind::Parse
                    .with_error(anyhow::anyhow!("invalid format in line: {}", line))
            })?;
            let chars = self.supported_chars(val.trim());
            match key.trim() {
                "LeadPunc" => self.lead_punc = chars,
                "TrailPunc" => self.trail_punc = chars,
                "NumLeadPunc" => self.num_lead_punc = chars,
                "NumTrailPunc" => self.num_trail_punc = chars,
                "Operators" => self.operators = chars,
                "Digits" => self.digits = chars,
                "Alphas" => self.alphas = chars,
                _ => {
                    return Err(CubeErrorKind::Parse
                        .with_error(anyhow::anyhow!("unknown key in line: {}", line)));
                }
            }
        }
        Ok(())
    }

    fn supported_chars(&self, val: &str) -> Vec<char> {
        val.chars()
            .filter(|&ch| self.char_set.class_id_char(ch).is_some())
            .collect()
    }

    fn number_literal(&self, literal: usize) -> &[char] {
        match literal {
            0 => &self.num_lead_punc,
            1 => &self.num_trail_punc,
            2 => &self.digits,
            3 => &self.operators,
            _ => &self.alphas,
        }
    }

    /// Edges consuming each character of `chars`, all carrying the same
    /// target state.
    fn literal_edges(&self, chars: &[char], kind: &EdgeKind, out: &mut Vec<LangEdge>) {
        for &ch in chars {
            if let Some(class_id) = self.char_set.class_id_char(ch) {
                out.push(LangEdge {
                    kind: kind.clone(),
                    class_id,
                    text: ch.to_string(),
                    root: false,
                    path_cost: self.edge_cost(kind),
                });
            }
        }
    }

    fn edge_cost(&self, kind: &EdgeKind) -> i32 {
        match kind {
            EdgeKind::Ood => self.ood_cost,
            EdgeKind::Number { .. } => self.num_cost,
            EdgeKind::Word { .. } => 0,
        }
    }

    /// Fan-out of the out-of-dictionary state: one edge per class whose
    /// shape cost is low enough.
    fn ood_edges(&self, alt_list: Option<&CharAltList>, out: &mut Vec<LangEdge>) {
        for class_id in 0..self.char_set.class_count() {
            let cheap_enough = match alt_list {
                Some(alt_list) => alt_list.class_cost(class_id) <= self.max_ood_shape_cost,
                None => true,
            };
            if !cheap_enough {
                continue;
            }
            let text = match self.char_set.class_string(class_id) {
                Some(text) => text.to_string(),
                None => continue,
            };
            out.push(LangEdge {
                kind: EdgeKind::Ood,
                class_id,
                text,
                root: false,
                path_cost: self.ood_cost,
            });
        }
    }

    /// Fan-out of the number state machine.
    fn number_edges(&self, state: usize, repeat: i64, out: &mut Vec<LangEdge>) {
        if state >= NUM_STATE_CNT {
            return;
        }
        for (literal, &new_state) in NUM_STATE_MACHINE[state].iter().enumerate() {
            if new_state == NUM_TRM {
                continue;
            }
            let new_state = new_state as usize;
            let new_repeat = if new_state == state { repeat + 1 } else { 1 };
            if new_repeat > NUM_MAX_REPEAT[state] {
                continue;
            }
            let kind = EdgeKind::Number {
                state: new_state,
                literal,
                repeat: new_repeat,
            };
            self.literal_edges(self.number_literal(literal), &kind, out);
        }
    }

    /// Fan-out of a word-dawg node: the dawg children, plus upper-case
    /// duplicates of lower-case first characters when fanning from the
    /// root of a cased script.
    fn dawg_children(
        &self,
        dawg_idx: usize,
        node: DawgNodeRef,
        lead_punc: bool,
        root_flag: bool,
        out: &mut Vec<LangEdge>,
    ) {
        let dawg = &self.word_dawgs[dawg_idx];
        let children = dawg.children(node);
        for child in &children {
            if let Some(class_id) = self.char_set.class_id_char(child.ch) {
                out.push(LangEdge {
                    kind: EdgeKind::Word {
                        dawg: dawg_idx,
                        node: child.node,
                        at_root: false,
                        end_of_word: child.end_of_word,
                        terminal: child.terminal,
                        lead_punc,
                        trail_punc_cnt: 0,
                    },
                    class_id,
                    text: child.ch.to_string(),
                    root: false,
                    path_cost: 0,
                });
            }
        }
        if root_flag && self.has_case {
            for child in &children {
                if !child.ch.is_lowercase() {
                    continue;
                }
                let mut uppercase = child.ch.to_uppercase();
                let upper_ch = match (uppercase.next(), uppercase.next()) {
                    (Some(upper_ch), None) => upper_ch,
                    _ => continue,
                };
                if let Some(class_id) = self.char_set.class_id_char(upper_ch) {
                    out.push(LangEdge {
                        kind: EdgeKind::Word {
                            dawg: dawg_idx,
                            node: child.node,
                            at_root: false,
                            end_of_word: child.end_of_word,
                            terminal: child.terminal,
                            lead_punc,
                            trail_punc_cnt: 0,
                        },
                        class_id,
                        text: upper_ch.to_string(),
                        root: false,
                        path_cost: 0,
                    });
                }
            }
        }
    }

    /// Fan-out of one word dawg from its root, including the leading
    /// punctuation wrappers.
    fn dawg_root_edges(&self, dawg_idx: usize, out: &mut Vec<LangEdge>) {
        if self.punc_enabled {
            let kind = EdgeKind::Word {
                dawg: dawg_idx,
                node: self.word_dawgs[dawg_idx].root(),
                at_root: true,
                end_of_word: false,
                terminal: false,
                lead_punc: true,
                trail_punc_cnt: 0,
            };
            let lead_punc = self.lead_punc.clone();
            self.literal_edges(&lead_punc, &kind, out);
        }
        if self.word_list_enabled {
            self.dawg_children(dawg_idx, self.word_dawgs[dawg_idx].root(), false, true, out);
        }
    }

    /// Fan-out of a non-root word edge: trailing punctuation and the
    /// hyphen-and-restart branch at end-of-word, then the dawg children.
    fn word_edge_fanout(&self, parent: &LangEdge, out: &mut Vec<LangEdge>) {
        let (dawg_idx, node, at_root, end_of_word, lead_punc, trail_punc_cnt) = match &parent.kind {
            EdgeKind::Word {
                dawg,
                node,
                at_root,
                end_of_word,
                lead_punc,
                trail_punc_cnt,
                ..
            } => (
                *dawg,
                *node,
                *at_root,
                *end_of_word,
                *lead_punc,
                *trail_punc_cnt,
            ),
            _ => return,
        };

        if trail_punc_cnt > 0 {
            // a trailing-punctuation edge generates more trailing punctuation
            if self.punc_enabled {
                let kind = EdgeKind::Word {
                    dawg: dawg_idx,
                    node,
                    at_root: false,
                    end_of_word: false,
                    terminal: true,
                    lead_punc,
                    trail_punc_cnt: trail_punc_cnt + 1,
                };
                let trail_punc = self.trail_punc.clone();
                self.literal_edges(&trail_punc, &kind, out);
            }
            return;
        }

        if at_root {
            // a leading-punctuation or restart edge continues at the dawg root
            if self.word_list_enabled {
                self.dawg_children(dawg_idx, self.word_dawgs[dawg_idx].root(), lead_punc, false, out);
            }
            return;
        }

        if end_of_word && self.punc_enabled {
            // trailing punctuation
            let kind = EdgeKind::Word {
                dawg: dawg_idx,
                node,
                at_root: false,
                end_of_word: false,
                terminal: true,
                lead_punc,
                trail_punc_cnt: 1,
            };
            let trail_punc = self.trail_punc.clone();
            self.literal_edges(&trail_punc, &kind, out);
            // a hyphen and a restart at the root
            let restart_kind = EdgeKind::Word {
                dawg: dawg_idx,
                node: self.word_dawgs[dawg_idx].root(),
                at_root: true,
                end_of_word: false,
                terminal: false,
                lead_punc,
                trail_punc_cnt: 0,
            };
            self.literal_edges(&['-', '/'], &restart_kind, out);
        }

        if self.word_list_enabled && !self.word_dawgs[dawg_idx].terminal(node) {
            self.dawg_children(dawg_idx, node, lead_punc, false, out);
        }
    }

    fn is_valid_sequence_from(
        &self,
        parent: Option<&LangEdge>,
        sequence: &[char],
        eow_flag: bool,
    ) -> bool {
        let (first, rest) = match sequence.split_first() {
            Some(split) => split,
            None => return false,
        };
        for edge in self.edges(None, parent) {
            if edge.text.chars().next() != Some(*first) {
                continue;
            }
            if rest.is_empty() {
                if !eow_flag || edge.is_eow() {
                    return true;
                }
            } else if self.is_valid_sequence_from(Some(&edge), rest, eow_flag) {
                return true;
            }
        }
        false
    }
}

impl LangModel for SystemLangModel {
    fn root(&self) -> Option<LangEdge> {
        None
    }

    fn edges(&self, alt_list: Option<&CharAltList>, parent: Option<&LangEdge>) -> Vec<LangEdge> {
        let mut out = Vec::new();
        match parent {
            None => {
                // instantiate every machine from its start state
                for dawg_idx in 0..self.word_dawgs.len() {
                    self.dawg_root_edges(dawg_idx, &mut out);
                }
                if self.numeric_enabled {
                    self.number_edges(0, 0, &mut out);
                }
                // OOD goes last so its flat paths never shadow real ones
                if self.ood_enabled {
                    self.ood_edges(alt_list, &mut out);
                }
                for edge in &mut out {
                    edge.root = true;
                }
            }
            Some(parent) => match &parent.kind {
                EdgeKind::Ood => {
                    if self.ood_enabled {
                        self.ood_edges(alt_list, &mut out);
                    }
                }
                EdgeKind::Number { state, repeat, .. } => {
                    if self.numeric_enabled {
                        self.number_edges(*state, *repeat, &mut out);
                    }
                }
                EdgeKind::Word { .. } => self.word_edge_fanout(parent, &mut out),
            },
        }
        out
    }

    fn is_valid_sequence(&self, sequence: &[char], eow_flag: bool) -> bool {
        self.is_valid_sequence_from(None, sequence, eow_flag)
    }

    fn is_leading_punc(&self, ch: char) -> bool {
        self.lead_punc.contains(&ch)
    }

    fn is_trailing_punc(&self, ch: char) -> bool {
        self.trail_punc.contains(&ch)
    }

    fn is_digit(&self, ch: char) -> bool {
        self.digits.contains(&ch)
    }

    fn ood_enabled(&self) -> bool {
        self.ood_enabled
    }

    fn numeric_enabled(&self) -> bool {
        self.numeric_enabled
    }

    fn word_list_enabled(&self) -> bool {
        self.word_list_enabled
    }

    fn punc_enabled(&self) -> bool {
        self.punc_enabled
    }

    fn set_ood(&mut self, enabled: bool) {
        self.ood_enabled = enabled;
    }

    fn set_numeric(&mut self, enabled: bool) {
        self.numeric_enabled = enabled;
    }

    fn set_word_list(&mut self, enabled: bool) {
        self.word_list_enabled = enabled;
    }

    fn set_punc(&mut self, enabled: bool) {
        self.punc_enabled = enabled;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::charset::tests::latin_charset;

    pub(crate) const LM_PARAMS: &str = "LeadPunc=-\nTrailPunc=.-\nNumLeadPunc=-\nNumTrailPunc=.\n\
                                        Operators=-\nDigits=012\nAlphas=abcde\n";

    /// A language model over the test charset with no word dawg.
    pub(crate) fn bare_lang_model(char_set: &CharSet) -> SystemLangModel {
        SystemLangModel::new(
            Arc::new(char_set.clone()),
            LM_PARAMS,
            Vec::new(),
            &TuningParams::default(),
            true,
        )
        .unwrap()
    }

    /// A language model with a word dawg over the given words.
    pub(crate) fn dawg_lang_model(char_set: &CharSet, words: &[&str]) -> SystemLangModel {
        SystemLangModel::new(
            Arc::new(char_set.clone()),
            LM_PARAMS,
            vec![WordDawg::from_words(words).unwrap()],
            &TuningParams::default(),
            true,
        )
        .unwrap()
    }

    fn texts(edges: &[LangEdge]) -> Vec<String> {
        edges.iter().map(|edge| edge.text.clone()).collect()
    }

    #[test]
    fn test_root_edges_marked() {
        let charset = latin_charset();
        let model = dawg_lang_model(&charset, &["cab"]);
        let edges = model.edges(None, None);
        assert!(!edges.is_empty());
        assert!(edges.iter().all(|edge| edge.root));
    }

    #[test]
    fn test_dawg_walk() {
        let charset = latin_charset();
        let mut model = dawg_lang_model(&charset, &["cab", "cad"]);
        model.set_ood(false);
        model.set_numeric(false);
        model.set_punc(false);

        let root_edges = model.edges(None, None);
        assert_eq!(texts(&root_edges), vec!["c", "C"]);
        let c_edge = &root_edges[0];
        assert!(!c_edge.is_eow());

        let a_edges = model.edges(None, Some(c_edge));
        assert_eq!(texts(&a_edges), vec!["a"]);
        let last_edges = model.edges(None, Some(&a_edges[0]));
        assert_eq!(texts(&last_edges), vec!["b", "d"]);
        assert!(last_edges.iter().all(|edge| edge.is_eow()));
        assert!(last_edges.iter().all(|edge| edge.is_terminal()));
    }

    #[test]
    fn test_number_machine_accepts_digit_runs() {
        let charset = latin_charset();
        let mut model = bare_lang_model(&charset);
        model.set_ood(false);
        model.set_punc(false);
        model.set_word_list(false);

        assert!(model.is_valid_sequence(&['0', '1', '2'], true));
        assert!(model.is_valid_sequence(&['-', '1'], true));
        // alphas terminate the machine from the entry state
        assert!(!model.is_valid_sequence(&['a', '1'], true));
    }

    #[test]
    fn test_number_machine_repeat_limit() {
        let charset = latin_charset();
        let mut model = bare_lang_model(&charset);
        model.set_ood(false);
        model.set_punc(false);
        model.set_word_list(false);

        // at most 3 leading punctuation marks in state 0
        assert!(model.is_valid_sequence(&['-', '-', '-', '1'], true));
        assert!(!model.is_valid_sequence(&['-', '-', '-', '-', '1'], true));
    }

    #[test]
    fn test_ood_accepts_anything() {
        let charset = latin_charset();
        let mut model = bare_lang_model(&charset);
        model.set_numeric(false);
        model.set_punc(false);
        model.set_word_list(false);

        assert!(model.is_valid_sequence(&['e', '2', 'B'], true));
        let edges = model.edges(None, None);
        assert_eq!(edges.len(), charset.class_count());
        assert!(edges.iter().all(|edge| edge.is_ood()));
        assert!(edges.iter().all(|edge| edge.path_cost == MIN_PROB_COST));
    }

    #[test]
    fn test_ood_filtered_by_alt_list() {
        let charset = latin_charset();
        let mut model = bare_lang_model(&charset);
        model.set_numeric(false);
        model.set_punc(false);
        model.set_word_list(false);

        let mut alt_list = CharAltList::new(charset.class_count(), 4);
        alt_list.insert(1, 0);
        alt_list.insert(2, prob_to_cost(1e-5));
        let edges = model.edges(Some(&alt_list), None);
        // only class 1 survives the shape-cost gate
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].class_id, 1);
    }

    #[test]
    fn test_trailing_punctuation_wrapper() {
        let charset = latin_charset();
        let mut model = dawg_lang_model(&charset, &["cab"]);
        model.set_ood(false);
        model.set_numeric(false);

        assert!(model.is_valid_sequence(&['c', 'a', 'b', '.'], true));
        assert!(model.is_valid_sequence(&['c', 'a', 'b', '.', '.'], true));
        assert!(!model.is_valid_sequence(&['c', '.', 'a', 'b'], true));
    }

    #[test]
    fn test_leading_punctuation_wrapper() {
        let charset = latin_charset();
        let mut model = dawg_lang_model(&charset, &["cab"]);
        model.set_ood(false);
        model.set_numeric(false);

        assert!(model.is_valid_sequence(&['-', 'c', 'a', 'b'], true));
    }

    #[test]
    fn test_hyphen_restart() {
        let charset = latin_charset();
        let mut model = dawg_lang_model(&charset, &["cab", "bad"]);
        model.set_ood(false);
        model.set_numeric(false);

        assert!(model.is_valid_sequence(&['c', 'a', 'b', '-', 'b', 'a', 'd'], true));
    }

    #[test]
    fn test_eow_gate() {
        let charset = latin_charset();
        let mut model = dawg_lang_model(&charset, &["cab"]);
        model.set_ood(false);
        model.set_numeric(false);
        model.set_punc(false);

        assert!(!model.is_valid_sequence(&['c', 'a'], true));
        assert!(model.is_valid_sequence(&['c', 'a'], false));
    }

    #[test]
    fn test_word_list_toggle() {
        let charset = latin_charset();
        let mut model = dawg_lang_model(&charset, &["cab"]);
        model.set_ood(false);
        model.set_numeric(false);
        model.set_punc(false);
        model.set_word_list(false);
        assert!(model.edges(None, None).is_empty());
    }
}
