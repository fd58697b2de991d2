use std::collections::HashMap;

use serde::Serialize;

use crate::langmod::{EdgeIdentity, LangEdge};

/// Bins of the pruning cost histogram.
const SCORE_BINS: usize = 1024;

/// Index of a lattice node in the beam search's node arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct NodeId(pub u32);

/// One lattice node: a language-model edge consumed at a column, a parent
/// in an earlier column, and the accumulated path costs.
#[derive(Debug, Clone)]
pub struct SearchNode {
    pub parent: Option<NodeId>,
    pub edge: LangEdge,
    pub col_idx: usize,
    /// recognition cost of this character alone
    pub reco_cost: i32,
    /// best accumulated cost of any path reaching this node
    pub best_cost: i32,
    /// accumulated language-model cost along the best path
    pub lang_mod_cost: i32,
}

impl SearchNode {
    /// Re-parents the node if the new path is cheaper. The incoming edge
    /// must be identical to the node's; the caller passes the new parent's
    /// accumulated cost.
    pub fn update_parent(
        &mut self,
        new_parent: Option<NodeId>,
        new_parent_best_cost: i32,
        new_parent_lang_mod_cost: i32,
        new_reco_cost: i32,
        new_edge: &LangEdge,
    ) -> bool {
        if !self.edge.is_identical(new_edge) {
            return false;
        }
        let new_path_cost = new_parent_best_cost + new_reco_cost + self.edge.path_cost;
        if new_path_cost < self.best_cost {
            self.parent = new_parent;
            self.reco_cost = new_reco_cost;
            self.best_cost = new_path_cost;
            self.lang_mod_cost = new_parent_lang_mod_cost + self.edge.path_cost;
            return true;
        }
        false
    }
}

/// A lattice column: the nodes of all paths ending at one segment index.
/// During construction a hash map merges paths that reach the same
/// language-model state from the same parent; out-of-dictionary edges are
/// never merged since their state is not unique. After pruning the map is
/// freed to cut peak memory.
pub struct SearchColumn {
    col_idx: usize,
    max_node_cnt: usize,
    node_ids: Vec<NodeId>,
    node_hash: Option<HashMap<(EdgeIdentity, Option<NodeId>), NodeId>>,
    min_cost: i32,
    max_cost: i32,
}

impl SearchColumn {
    pub fn new(col_idx: usize, max_node_cnt: usize) -> SearchColumn {
        SearchColumn {
            col_idx,
            max_node_cnt,
            node_ids: Vec::new(),
            node_hash: Some(HashMap::new()),
            min_cost: i32::MAX,
            max_cost: 0,
        }
    }

    pub fn col_idx(&self) -> usize {
        self.col_idx
    }

    pub fn node_count(&self) -> usize {
        self.node_ids.len()
    }

    pub fn node_ids(&self) -> &[NodeId] {
        &self.node_ids
    }

    /// Adds a node for an edge taken from a parent, converging with an
    /// equivalent node when one exists. Returns the affected node, or
    /// `None` when the candidate was rejected or did not improve.
    pub fn add_node(
        &mut self,
        arena: &mut Vec<SearchNode>,
        edge: LangEdge,
        reco_cost: i32,
        parent: Option<NodeId>,
    ) -> Option<NodeId> {
        let (parent_best_cost, parent_lang_mod_cost) = match parent {
            Some(parent_id) => {
                let parent_node = &arena[parent_id.0 as usize];
                (parent_node.best_cost, parent_node.lang_mod_cost)
            }
            None => (0, 0),
        };

        let hash_key = (edge.identity(), parent);
        let existing = if edge.is_ood() {
            None
        } else {
            self.node_hash
                .as_ref()
                .and_then(|node_hash| node_hash.get(&hash_key))
                .copied()
        };

        let node_id = match existing {
            Some(node_id) => {
                if !arena[node_id.0 as usize].update_parent(
                    parent,
                    parent_best_cost,
                    parent_lang_mod_cost,
                    reco_cost,
                    &edge,
                ) {
                    return None;
                }
                node_id
            }
            None => {
                let best_cost = parent_best_cost + reco_cost + edge.path_cost;
                // a node costlier than everything in a full column would be
                // pruned anyway
                if self.node_ids.len() >= self.max_node_cnt && best_cost > self.max_cost {
                    return None;
                }
                let node_id = NodeId(arena.len() as u32);
                let lang_mod_cost = parent_lang_mod_cost + edge.path_cost;
                arena.push(SearchNode {
                    parent,
                    edge,
                    col_idx: self.col_idx,
                    reco_cost,
                    best_cost,
                    lang_mod_cost,
                });
                if let Some(node_hash) = self.node_hash.as_mut() {
                    if !arena[node_id.0 as usize].edge.is_ood() {
                        node_hash.insert(hash_key, node_id);
                    }
                }
                self.node_ids.push(node_id);
                node_id
            }
        };

        let best_cost = arena[node_id.0 as usize].best_cost;
        self.min_cost = self.min_cost.min(best_cost);
        self.max_cost = self.max_cost.max(best_cost);
        Some(node_id)
    }

    /// Histogram pruning: node costs are binned over `[min_cost, max_cost]`
    /// and bins are kept from cheap to costly until the beam width is
    /// reached.
    pub fn prune(&mut self, arena: &[SearchNode]) {
        if self.node_ids.len() <= self.max_node_cnt {
            return;
        }

        let cost_range = (self.max_cost - self.min_cost + 1) as f64;
        let mut score_bins = [0usize; SCORE_BINS];
        for &node_id in &self.node_ids {
            let best_cost = arena[node_id.0 as usize].best_cost;
            let cost_bin = (((best_cost - self.min_cost) as f64 * SCORE_BINS as f64 / cost_range)
                as usize)
                .min(SCORE_BINS - 1);
            score_bins[cost_bin] += 1;
        }

        // find the cost at which the beam width is exceeded
        let mut pruning_cost = 0;
        let mut new_node_cnt = 0;
        for (cost_bin, &bin_cnt) in score_bins.iter().enumerate() {
            if new_node_cnt > 0 && new_node_cnt + bin_cnt > self.max_node_cnt {
                pruning_cost =
                    self.min_cost + (cost_bin as f64 * cost_range / SCORE_BINS as f64) as i32;
                break;
            }
            new_node_cnt += bin_cnt;
        }

        let max_node_cnt = self.max_node_cnt;
        let mut kept = 0;
        self.node_ids.retain(|node_id| {
            let keep =
                arena[node_id.0 as usize].best_cost <= pruning_cost && kept < max_node_cnt;
            if keep {
                kept += 1;
            }
            keep
        });
    }

    /// Drops the convergence map once the column is final.
    pub fn free_hash_table(&mut self) {
        self.node_hash = None;
    }

    pub fn best_node(&self, arena: &[SearchNode]) -> Option<NodeId> {
        self.node_ids
            .iter()
            .copied()
            .min_by_key(|node_id| arena[node_id.0 as usize].best_cost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::langmod::EdgeKind;

    fn ood_edge(class_id: usize) -> LangEdge {
        LangEdge {
            kind: EdgeKind::Ood,
            class_id,
            text: "x".to_string(),
            root: false,
            path_cost: 0,
        }
    }

    fn number_edge(class_id: usize, state: usize) -> LangEdge {
        LangEdge {
            kind: EdgeKind::Number {
                state,
                literal: 2,
                repeat: 1,
            },
            class_id,
            text: "1".to_string(),
            root: false,
            path_cost: 0,
        }
    }

    #[test]
    fn test_add_and_merge() {
        let mut arena = Vec::new();
        let mut col = SearchColumn::new(0, 8);
        let first = col
            .add_node(&mut arena, number_edge(1, 1), 100, None)
            .unwrap();
        // same state and parent: converge, keep the cheaper path
        let merged = col.add_node(&mut arena, number_edge(1, 1), 50, None).unwrap();
        assert_eq!(first, merged);
        assert_eq!(col.node_count(), 1);
        assert_eq!(arena[first.0 as usize].best_cost, 50);
        // costlier path does not update
        assert!(col.add_node(&mut arena, number_edge(1, 1), 80, None).is_none());
        assert_eq!(arena[first.0 as usize].best_cost, 50);
        // different state: a new node
        col.add_node(&mut arena, number_edge(1, 2), 60, None).unwrap();
        assert_eq!(col.node_count(), 2);
    }

    #[test]
    fn test_ood_never_merges() {
        let mut arena = Vec::new();
        let mut col = SearchColumn::new(0, 8);
        col.add_node(&mut arena, ood_edge(3), 100, None).unwrap();
        col.add_node(&mut arena, ood_edge(3), 100, None).unwrap();
        assert_eq!(col.node_count(), 2);
    }

    #[test]
    fn test_prune_keeps_cheapest() {
        let mut arena = Vec::new();
        let mut col = SearchColumn::new(0, 4);
        for idx in 0..16 {
            col.add_node(&mut arena, number_edge(idx, 1), (idx as i32) * 100, None);
        }
        col.prune(&arena);
        assert!(col.node_count() <= 4);
        // the cheapest node always survives
        assert_eq!(col.best_node(&arena), Some(NodeId(0)));
        assert!(col
            .node_ids()
            .iter()
            .all(|id| arena[id.0 as usize].best_cost <= 300));
    }

    #[test]
    fn test_full_column_rejects_costly_candidates() {
        let mut arena = Vec::new();
        let mut col = SearchColumn::new(0, 2);
        col.add_node(&mut arena, number_edge(0, 1), 10, None).unwrap();
        col.add_node(&mut arena, number_edge(1, 1), 20, None).unwrap();
        // over capacity and worse than max_cost: rejected outright
        assert!(col.add_node(&mut arena, number_edge(2, 1), 500, None).is_none());
        // cheaper than max_cost still gets in (pruning settles it later)
        assert!(col.add_node(&mut arena, number_edge(3, 1), 15, None).is_some());
    }

    #[test]
    fn test_best_cost_accumulates_from_parent() {
        let mut arena = Vec::new();
        let mut col0 = SearchColumn::new(0, 8);
        let parent = col0
            .add_node(&mut arena, number_edge(1, 1), 40, None)
            .unwrap();
        let mut col1 = SearchColumn::new(1, 8);
        let child = col1
            .add_node(&mut arena, number_edge(2, 1), 25, Some(parent))
            .unwrap();
        assert_eq!(arena[child.0 as usize].best_cost, 65);
        assert!(arena[child.0 as usize].col_idx > arena[parent.0 as usize].col_idx);
    }
}
