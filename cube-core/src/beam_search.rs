use crate::altlist::{CharAltList, WordAltList};
use crate::context::RecoContext;
use crate::cost::{MIN_PROB_COST, WORST_COST};
use crate::langmod::{LangEdge, LangModel};
use crate::sample::CharSample;
use crate::search_column::{NodeId, SearchColumn, SearchNode};
use crate::search_object::SearchObject;

/// Width-limited search over the segmentation lattice. Columns are indexed
/// by ending segment; every column holds the surviving partial paths ending
/// there. The search explores all groupings of consecutive segments into
/// characters jointly with all language-model decisions.
pub struct BeamSearch<'a> {
    cntxt: &'a RecoContext,
    word_mode: bool,
    seg_pt_cnt: i32,
    columns: Vec<SearchColumn>,
    nodes: Vec<SearchNode>,
    best_presorted_node: Option<NodeId>,
}

impl<'a> BeamSearch<'a> {
    pub fn new(cntxt: &'a RecoContext, word_mode: bool) -> BeamSearch<'a> {
        BeamSearch {
            cntxt,
            word_mode,
            seg_pt_cnt: 0,
            columns: Vec::new(),
            nodes: Vec::new(),
            best_presorted_node: None,
        }
    }

    /// Frees the lattice of the previous search.
    fn cleanup(&mut self) {
        self.columns.clear();
        self.nodes.clear();
        self.best_presorted_node = None;
    }

    pub fn word_mode(&self) -> bool {
        self.word_mode
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, col: usize) -> Option<&SearchColumn> {
        self.columns.get(col)
    }

    pub fn node(&self, node_id: NodeId) -> &SearchNode {
        &self.nodes[node_id.0 as usize]
    }

    /// The best node of the last search, remembered before the alternates
    /// were sorted.
    pub fn best_presorted_node(&self) -> Option<NodeId> {
        self.best_presorted_node
    }

    /// The cheapest node of the last column.
    pub fn best_node(&self) -> Option<NodeId> {
        self.columns.last()?.best_node(&self.nodes)
    }

    /// Runs the search against a language model (the context's by default)
    /// and returns the ranked word alternates. Structural failures
    /// (unusable segmentation, exhausted lattice) yield an empty list.
    pub fn search(
        &mut self,
        srch_obj: &mut SearchObject,
        lang_mod: Option<&dyn LangModel>,
    ) -> WordAltList {
        let lang_mod = lang_mod.unwrap_or_else(|| self.cntxt.lang_mod());
        self.cleanup();

        let seg_pt_cnt = match srch_obj.seg_pt_count() {
            Some(seg_pt_cnt) => seg_pt_cnt,
            None => return WordAltList::new(),
        };
        self.seg_pt_cnt = seg_pt_cnt;

        let beam_width = self.cntxt.params().beam_width.max(1) as usize;
        let max_seg_per_char = self.cntxt.params().max_seg_per_char;

        for end_seg in 1..=seg_pt_cnt + 1 {
            let mut col = SearchColumn::new((end_seg - 1) as usize, beam_width);

            let init_seg = 0.max(end_seg - max_seg_per_char);
            for strt_seg in init_seg..end_seg {
                // the shape recognizer's verdict on this segment range; a
                // range with no classification is skipped
                let alt_list = match srch_obj.recognize(strt_seg - 1, end_seg - 1) {
                    Some(alt_list) if alt_list.alt_count() > 0 => alt_list,
                    _ => continue,
                };

                // cost of the range containing no internal spaces
                let contig_cost = srch_obj.no_space_cost_range(strt_seg - 1, end_seg - 1);

                let parents: Vec<Option<NodeId>> = if strt_seg == 0 {
                    vec![None]
                } else {
                    self.columns[(strt_seg - 1) as usize]
                        .node_ids()
                        .iter()
                        .map(|&node_id| Some(node_id))
                        .collect()
                };

                for parent in parents {
                    let parent_edge: Option<LangEdge> = match parent {
                        None => lang_mod.root(),
                        Some(parent_id) => Some(self.nodes[parent_id.0 as usize].edge.clone()),
                    };

                    // in phrase mode, the cost of not splitting before this
                    // character
                    let no_space_cost = if !self.word_mode && strt_seg > 0 {
                        srch_obj.no_space_cost(strt_seg - 1)
                    } else {
                        0
                    };

                    if contig_cost + no_space_cost < MIN_PROB_COST {
                        self.create_children(
                            &mut col,
                            lang_mod,
                            parent,
                            parent_edge.as_ref(),
                            &alt_list,
                            contig_cost + no_space_cost,
                        );
                    }

                    // in phrase mode, paths at a valid end-of-word may pay
                    // for a space and restart the language model at its root
                    if !self.word_mode && strt_seg > 0 {
                        let parent_id = parent.expect("non-zero start has parents");
                        if self.nodes[parent_id.0 as usize].edge.is_eow() {
                            let space_cost = srch_obj.space_cost(strt_seg - 1);
                            if contig_cost + space_cost < MIN_PROB_COST {
                                self.create_children(
                                    &mut col,
                                    lang_mod,
                                    parent,
                                    None,
                                    &alt_list,
                                    contig_cost + space_cost,
                                );
                            }
                        }
                    }
                }
            }

            col.prune(&self.nodes);
            col.free_hash_table();
            self.columns.push(col);
        }

        self.create_word_alt_list(srch_obj)
    }

    /// Grows the children of one parent into the ending column.
    fn create_children(
        &mut self,
        out_col: &mut SearchColumn,
        lang_mod: &dyn LangModel,
        parent: Option<NodeId>,
        parent_edge: Option<&LangEdge>,
        alt_list: &CharAltList,
        extra_cost: i32,
    ) {
        let final_col = out_col.col_idx() as i32 >= self.seg_pt_cnt;
        for edge in lang_mod.edges(Some(alt_list), parent_edge) {
            // only end-of-word paths may end at the last column, unless the
            // input is flagged noisy
            if final_col && !self.cntxt.noisy_input() && !edge.is_eow() {
                continue;
            }
            let reco_cost = alt_list.class_cost(edge.class_id).max(0) + extra_cost;
            if reco_cost >= WORST_COST {
                continue;
            }
            out_col.add_node(&mut self.nodes, edge, reco_cost, parent);
        }
    }

    /// Assembles the ranked alternates from the last column, combining the
    /// four cost streams under the tuned weights.
    fn create_word_alt_list(&mut self, srch_obj: &mut SearchObject) -> WordAltList {
        let mut alt_list = WordAltList::new();
        let node_ids = match self.columns.last() {
            Some(last_col) => last_col.node_ids().to_vec(),
            None => return alt_list,
        };

        let params = self.cntxt.params();
        let mut best_cost: Option<i32> = None;
        for node_id in node_ids {
            let recognition_cost = self.nodes[node_id.0 as usize].best_cost;
            let (samples, path_str) = match self.backtrack(srch_obj, node_id) {
                Some(backtracked) => backtracked,
                None => continue,
            };
            let path_chars: Vec<char> = path_str.chars().collect();

            let size_cost = match self.cntxt.size_model() {
                Some(size_model) => size_model.cost(&samples, self.cntxt.char_set()),
                None => 0,
            };
            let bigram_cost = match self.cntxt.bigrams() {
                Some(bigrams) => bigrams.cost(&path_chars, self.cntxt.char_set()),
                None => 0,
            };
            let unigram_cost = match self.cntxt.unigrams() {
                Some(unigrams) => {
                    unigrams.cost(&path_chars, self.cntxt.lang_mod(), self.cntxt.char_set())
                }
                None => 0,
            };

            let cost = (size_cost as f64 * params.size_wgt
                + bigram_cost as f64 * params.char_bigrams_wgt
                + unigram_cost as f64 * params.word_unigrams_wgt
                + recognition_cost as f64 * params.reco_wgt) as i32;

            alt_list.insert(path_str, cost, Some(node_id));
            if best_cost.map_or(true, |best| cost < best) {
                best_cost = Some(cost);
                self.best_presorted_node = Some(node_id);
            }
        }

        alt_list.sort();
        alt_list
    }

    /// Walks the parent chain of a lattice node and rebuilds, in reading
    /// order, the character samples of the path (labeled with their edge
    /// strings) and the path's string. Language-model restarts contribute an
    /// implicit space to the string.
    pub fn backtrack(
        &self,
        srch_obj: &mut SearchObject,
        node_id: NodeId,
    ) -> Option<(Vec<CharSample>, String)> {
        let mut chain = Vec::new();
        let mut walk = Some(node_id);
        while let Some(walk_id) = walk {
            chain.push(walk_id);
            walk = self.nodes[walk_id.0 as usize].parent;
        }

        let mut samples = Vec::with_capacity(chain.len());
        let mut path_str = String::new();
        for &walk_id in chain.iter().rev() {
            let node = &self.nodes[walk_id.0 as usize];
            let st_col = match node.parent {
                Some(parent_id) => self.nodes[parent_id.0 as usize].col_idx as i32 + 1,
                None => 0,
            };
            let st_seg_pt = st_col - 1;
            let end_seg_pt = (node.col_idx as i32).min(self.seg_pt_cnt);
            let samp = srch_obj.char_sample(st_seg_pt, end_seg_pt)?;
            let mut samp = (*samp).clone();
            samp.set_label(node.edge.text.as_str());

            // a root edge under a parent marks a language-model restart
            if node.edge.root && node.parent.is_some() {
                path_str.push(' ');
            }
            path_str.push_str(&node.edge.text);
            samples.push(samp);
        }
        Some((samples, path_str))
    }
}
