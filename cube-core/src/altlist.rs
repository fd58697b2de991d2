use serde::Serialize;

use crate::cost::WORST_COST;
use crate::search_column::NodeId;

/// One character alternate: a class id and its cost.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CharAlt {
    pub class_id: usize,
    pub cost: i32,
}

/// A capped, ranked list of character class alternates. A parallel
/// direct-access table gives O(1) cost lookup by class id; classes that were
/// never inserted report `WORST_COST`.
#[derive(Debug, Clone)]
pub struct CharAltList {
    max_alt: usize,
    alts: Vec<CharAlt>,
    class_cost: Vec<i32>,
}

impl CharAltList {
    pub fn new(class_cnt: usize, max_alt: usize) -> Self {
        CharAltList {
            max_alt,
            alts: Vec::new(),
            class_cost: vec![WORST_COST; class_cnt],
        }
    }

    /// Inserts a new alternate. Rejects invalid class ids and inserts beyond
    /// the cap.
    pub fn insert(&mut self, class_id: usize, cost: i32) -> bool {
        if class_id >= self.class_cost.len() || self.alts.len() >= self.max_alt {
            return false;
        }
        self.alts.push(CharAlt { class_id, cost });
        self.class_cost[class_id] = cost;
        true
    }

    /// Sorts ascending by cost. The sort is stable: ties keep insertion
    /// order.
    pub fn sort(&mut self) {
        self.alts.sort_by_key(|alt| alt.cost);
    }

    pub fn alt_count(&self) -> usize {
        self.alts.len()
    }

    pub fn alt(&self, idx: usize) -> &CharAlt {
        &self.alts[idx]
    }

    pub fn alts(&self) -> &[CharAlt] {
        &self.alts
    }

    /// O(1) cost of a class, `WORST_COST` when absent.
    pub fn class_cost(&self, class_id: usize) -> i32 {
        self.class_cost.get(class_id).copied().unwrap_or(WORST_COST)
    }

    /// The cheapest alternate, if any.
    pub fn best(&self) -> Option<&CharAlt> {
        self.alts.iter().min_by_key(|alt| alt.cost)
    }
}

/// One word alternate: a recognized string, its combined cost, and the
/// lattice node it was read off (for backtracking into per-character
/// sub-images).
#[derive(Debug, Clone, Serialize)]
pub struct WordAlt {
    pub word: String,
    pub cost: i32,
    #[serde(skip)]
    pub node: Option<NodeId>,
}

/// A ranked list of word alternates. Insertion deduplicates by string,
/// keeping the cheaper cost.
#[derive(Debug, Clone, Default)]
pub struct WordAltList {
    alts: Vec<WordAlt>,
}

impl WordAltList {
    pub fn new() -> Self {
        WordAltList::default()
    }

    pub fn insert(&mut self, word: String, cost: i32, node: Option<NodeId>) {
        for alt in &mut self.alts {
            if alt.word == word {
                if cost < alt.cost {
                    alt.cost = cost;
                    alt.node = node;
                }
                return;
            }
        }
        self.alts.push(WordAlt { word, cost, node });
    }

    /// Sorts ascending by cost; ties keep insertion order.
    pub fn sort(&mut self) {
        self.alts.sort_by_key(|alt| alt.cost);
    }

    pub fn alt_count(&self) -> usize {
        self.alts.len()
    }

    pub fn alt(&self, idx: usize) -> &WordAlt {
        &self.alts[idx]
    }

    pub fn alts(&self) -> &[WordAlt] {
        &self.alts
    }

    pub fn is_empty(&self) -> bool {
        self.alts.is_empty()
    }

    pub fn best_cost(&self) -> Option<i32> {
        self.alts.iter().map(|alt| alt.cost).min()
    }
}
