use std::collections::HashMap;
use std::rc::Rc;

use log::warn;

use crate::altlist::CharAltList;
use crate::classifier::CharClassifier;
use crate::conncomp::ConComp;
use crate::context::RecoContext;
use crate::cost::{prob_to_cost, MIN_PROB_COST};
use crate::sample::CharSample;

/// Words decomposing into more segments than this are rejected outright.
pub const MAX_SEGMENT_CNT: usize = 128;

/// Provides the beam search with everything it asks about a word image:
/// the segment decomposition, composite samples and classification results
/// for any consecutive segment range, and the space/no-space costs at the
/// segmentation points. Everything is computed lazily and cached for the
/// lifetime of the object.
pub struct SearchObject<'a> {
    cntxt: &'a RecoContext,
    sample: CharSample,
    init: bool,
    usable: bool,
    segments: Vec<ConComp>,
    rtl: bool,
    hgt: usize,
    min_spc_gap: i32,
    max_spc_gap: i32,
    max_seg_per_char: i32,
    reco_cache: HashMap<(usize, usize), Option<Rc<CharAltList>>>,
    samp_cache: HashMap<(usize, usize), Rc<CharSample>>,
    space_costs: Option<(Vec<i32>, Vec<i32>)>,
}

impl<'a> SearchObject<'a> {
    pub fn new(cntxt: &'a RecoContext, sample: CharSample) -> SearchObject<'a> {
        let hgt = sample.height();
        let params = cntxt.params();
        SearchObject {
            cntxt,
            sample,
            init: false,
            usable: false,
            segments: Vec::new(),
            rtl: cntxt.reading_order().is_right_to_left(),
            hgt,
            min_spc_gap: (hgt as f64 * params.min_space_height_ratio) as i32,
            max_spc_gap: (hgt as f64 * params.max_space_height_ratio) as i32,
            max_seg_per_char: params.max_seg_per_char,
            reco_cache: HashMap::new(),
            samp_cache: HashMap::new(),
            space_costs: None,
        }
    }

    pub fn word_sample(&self) -> &CharSample {
        &self.sample
    }

    fn init(&mut self) -> bool {
        if self.init {
            return self.usable;
        }
        self.init = true;
        let params = self.cntxt.params();
        self.segments = self.sample.segment(
            self.rtl,
            params.hist_wind_wid,
            params.min_con_comp_size as usize,
        );
        self.usable = !self.segments.is_empty() && self.segments.len() < MAX_SEGMENT_CNT;
        self.usable
    }

    /// The count of segmentation points, one less than the segment count.
    /// `None` when the image is unusable (no segments, or too many).
    pub fn seg_pt_count(&mut self) -> Option<i32> {
        if !self.init() {
            return None;
        }
        Some(self.segments.len() as i32 - 1)
    }

    fn is_valid_segment_range(&self, start_pt: i32, end_pt: i32) -> bool {
        end_pt > start_pt
            && start_pt >= -1
            && start_pt < self.segments.len() as i32
            && end_pt >= 0
            && end_pt < self.segments.len() as i32
            && end_pt <= start_pt + self.max_seg_per_char
    }

    /// Composite sample covering segments `(start_pt, end_pt]`, with the
    /// word context attributes filled in.
    pub fn char_sample(&mut self, start_pt: i32, end_pt: i32) -> Option<Rc<CharSample>> {
        if !self.init() || !self.is_valid_segment_range(start_pt, end_pt) {
            return None;
        }
        let key = ((start_pt + 1) as usize, end_pt as usize);
        if let Some(samp) = self.samp_cache.get(&key) {
            return Some(samp.clone());
        }

        let (samp, left_most, right_most) = CharSample::from_con_comps(
            &self.segments,
            (start_pt + 1) as usize,
            (end_pt - start_pt) as usize,
        )?;
        let mut samp = samp.crop()?;

        if self.cntxt.cursive() {
            // first/last depend on whether the range covers the edge of its
            // connected component, honoring the reading order
            let first_char = if self.rtl { right_most } else { left_most };
            let last_char = if self.rtl { left_most } else { right_most };
            samp.set_first_char(if first_char { 255 } else { 0 });
            samp.set_last_char(if last_char { 255 } else { 0 });
        } else {
            samp.set_first_char(if start_pt == -1 { 255 } else { 0 });
            samp.set_last_char(if end_pt == self.segments.len() as i32 - 1 {
                255
            } else {
                0
            });
        }
        let char_top = samp.top() as usize;
        let char_wid = samp.width();
        let char_hgt = samp.height();
        samp.set_norm_top((255 * char_top / self.hgt).min(255) as u8);
        samp.set_norm_bottom((255 * (char_top + char_hgt) / self.hgt).min(255) as u8);
        samp.set_norm_aspect_ratio((255 * char_wid / (char_wid + char_hgt)) as u8);

        let samp = Rc::new(samp);
        self.samp_cache.insert(key, samp.clone());
        Some(samp)
    }

    /// Classification result for the segment range. `None` marks a range
    /// the classifier produced nothing for; the beam search skips it.
    pub fn recognize(&mut self, start_pt: i32, end_pt: i32) -> Option<Rc<CharAltList>> {
        if !self.init() || !self.is_valid_segment_range(start_pt, end_pt) {
            return None;
        }
        let key = ((start_pt + 1) as usize, end_pt as usize);
        if let Some(cached) = self.reco_cache.get(&key) {
            return cached.clone();
        }

        let samp = self.char_sample(start_pt, end_pt)?;
        let alt_list = match self.cntxt.classifier() {
            // a classifier that produced nothing leaves the range skipped
            Some(classifier) => classifier.classify(&samp).map(Rc::new),
            None => {
                // no classifier: all characters are equally probable, with a
                // penalty that favors 2-segment characters and aspect
                // ratios (w/h) > 1
                warn!("context has no character classifier; inventing a probability distribution");
                let class_cnt = self.cntxt.char_set().class_count();
                let seg_cnt = (end_pt - start_pt) as f64;
                let prob_val = (1.0 / class_cnt as f64)
                    * (-(seg_cnt - 2.0).abs()).exp()
                    * (-(samp.width() as f64) / samp.height() as f64).exp();
                let mut alt_list = CharAltList::new(class_cnt, class_cnt);
                for class_id in 0..class_cnt {
                    alt_list.insert(class_id, prob_to_cost(prob_val));
                }
                Some(Rc::new(alt_list))
            }
        };
        self.reco_cache.insert(key, alt_list.clone());
        alt_list
    }

    /// Space probabilities at the segmentation points, modeled as a linear
    /// function of the horizontal gap between the ink on either side.
    fn compute_space_costs(&mut self) -> bool {
        if !self.init() {
            return false;
        }
        if self.space_costs.is_some() {
            return true;
        }
        let seg_cnt = self.segments.len();
        if seg_cnt < 2 {
            return false;
        }

        // maximum x to the left of and minimum x to the right of each point
        let mut max_left_x = vec![0i32; seg_cnt - 1];
        let mut min_right_x = vec![0i32; seg_cnt - 1];
        if self.rtl {
            min_right_x[0] = self.segments[0].left();
            max_left_x[seg_cnt - 2] = self.segments[seg_cnt - 1].right();
            for pt_idx in 1..seg_cnt - 1 {
                min_right_x[pt_idx] =
                    min_right_x[pt_idx - 1].min(self.segments[pt_idx].left());
                max_left_x[seg_cnt - pt_idx - 2] = max_left_x[seg_cnt - pt_idx - 1]
                    .max(self.segments[seg_cnt - pt_idx - 1].right());
            }
        } else {
            min_right_x[seg_cnt - 2] = self.segments[seg_cnt - 1].left();
            max_left_x[0] = self.segments[0].right();
            for pt_idx in 1..seg_cnt - 1 {
                min_right_x[seg_cnt - pt_idx - 2] = min_right_x[seg_cnt - pt_idx - 1]
                    .min(self.segments[seg_cnt - pt_idx - 1].left());
                max_left_x[pt_idx] = max_left_x[pt_idx - 1].max(self.segments[pt_idx].right());
            }
        }

        let mut space_cost = Vec::with_capacity(seg_cnt - 1);
        let mut no_space_cost = Vec::with_capacity(seg_cnt - 1);
        for pt_idx in 0..seg_cnt - 1 {
            let gap = min_right_x[pt_idx] - max_left_x[pt_idx];
            let prob = if gap < self.min_spc_gap {
                0.0
            } else if gap > self.max_spc_gap {
                1.0
            } else {
                (gap - self.min_spc_gap) as f64 / (self.max_spc_gap - self.min_spc_gap) as f64
            };
            // the space prior discounts the space hypothesis
            space_cost.push(prob_to_cost(prob) + prob_to_cost(0.1));
            no_space_cost.push(prob_to_cost(1.0 - prob));
        }
        self.space_costs = Some((space_cost, no_space_cost));
        true
    }

    /// Cost of a space before the segmentation point.
    pub fn space_cost(&mut self, pt_idx: i32) -> i32 {
        if !self.compute_space_costs() {
            return MIN_PROB_COST;
        }
        let (space_cost, _) = self.space_costs.as_ref().expect("space costs computed");
        space_cost
            .get(pt_idx as usize)
            .copied()
            .unwrap_or(MIN_PROB_COST)
    }

    /// Cost of no space before the segmentation point.
    pub fn no_space_cost(&mut self, pt_idx: i32) -> i32 {
        if !self.compute_space_costs() {
            return MIN_PROB_COST;
        }
        let (_, no_space_cost) = self.space_costs.as_ref().expect("space costs computed");
        no_space_cost
            .get(pt_idx as usize)
            .copied()
            .unwrap_or(MIN_PROB_COST)
    }

    /// Cost of having no space anywhere strictly inside the range.
    pub fn no_space_cost_range(&mut self, st_pt: i32, end_pt: i32) -> i32 {
        if !self.compute_space_costs() {
            return 0;
        }
        let mut no_spc_cost = 0;
        for pt_idx in st_pt + 1..end_pt {
            no_spc_cost += self.no_space_cost(pt_idx);
        }
        no_spc_cost
    }
}
