use crate::altlist::{CharAltList, WordAltList};
use crate::beam_search::BeamSearch;
use crate::classifier::CharClassifier;
use crate::context::RecoContext;
use crate::cost::{prob_to_cost, WORST_COST};
use crate::langmod::LangModel;
use crate::sample::CharSample;
use crate::search_column::NodeId;
use crate::search_object::SearchObject;
use crate::word_list_model::WordListLangModel;

/// Minimum mean segment aspect ratio (height over width) that triggers
/// size normalization, and the ratio normalization scales down to.
const MIN_NORMALIZATION_ASPECT_RATIO: f64 = 3.5;
/// Normalization needs at least this many segmentation points to trust the
/// aspect-ratio estimate.
const MIN_NORMALIZATION_SEGMENT_CNT: i32 = 4;
/// A top alternate below this probability gets the de-slanted retry.
const MIN_PROB_SKIP_DESLANTED: f64 = 0.25;

/// Per-word facade over the engine: owns the word sample and drives a beam
/// search over it, with an optional de-slanted shadow pipeline for
/// italic-capable languages. One object serves one recognition call;
/// results stay alive until the object is dropped.
pub struct CubeObject<'a> {
    cntxt: &'a RecoContext,
    char_samp: CharSample,
    beam_obj: Option<BeamSearch<'a>>,
    srch_obj: Option<SearchObject<'a>>,
    deslanted_beam_obj: Option<BeamSearch<'a>>,
    deslanted_srch_obj: Option<SearchObject<'a>>,
    alt_list: Option<WordAltList>,
    deslanted_alt_list: Option<WordAltList>,
    deslanted: bool,
}

impl<'a> CubeObject<'a> {
    pub fn new(cntxt: &'a RecoContext, char_samp: CharSample) -> CubeObject<'a> {
        CubeObject {
            cntxt,
            char_samp,
            beam_obj: None,
            srch_obj: None,
            deslanted_beam_obj: None,
            deslanted_srch_obj: None,
            alt_list: None,
            deslanted_alt_list: None,
            deslanted: false,
        }
    }

    pub fn word_sample(&self) -> &CharSample {
        &self.char_samp
    }

    /// Whether the last recognition adopted the de-slanted pipeline.
    pub fn deslanted(&self) -> bool {
        self.deslanted
    }

    fn cleanup(&mut self) {
        self.alt_list = None;
        self.deslanted_alt_list = None;
    }

    /// Recognizes the word sample against a language model (the context's
    /// by default). `word_mode` forbids internal spaces; phrase mode lets
    /// the language model restart across space-like gaps.
    pub fn recognize(
        &mut self,
        lang_mod: Option<&dyn LangModel>,
        word_mode: bool,
    ) -> Option<&WordAltList> {
        self.cleanup();

        if self.cntxt.size_normalization() {
            self.normalize();
        }
        self.deslanted = false;

        if self.beam_obj.is_none() {
            self.beam_obj = Some(BeamSearch::new(self.cntxt, word_mode));
        }
        if self.srch_obj.is_none() {
            self.srch_obj = Some(SearchObject::new(self.cntxt, self.char_samp.clone()));
        }
        let beam_obj = self.beam_obj.as_mut().expect("beam search built");
        let srch_obj = self.srch_obj.as_mut().expect("search object built");
        let alt_list = beam_obj.search(srch_obj, lang_mod);
        self.alt_list = Some(alt_list);

        // de-slant and re-recognize when the upright answer is weak
        let weak = match self.alt_list.as_ref() {
            Some(alt_list) if alt_list.alt_count() > 0 => {
                alt_list.alt(0).cost > prob_to_cost(MIN_PROB_SKIP_DESLANTED)
            }
            _ => true,
        };
        if self.cntxt.has_italics() && weak {
            if self.deslanted_beam_obj.is_none() {
                self.deslanted_beam_obj = Some(BeamSearch::new(self.cntxt, true));
            }
            if self.deslanted_srch_obj.is_none() {
                let mut deslanted_samp = self.char_samp.clone();
                deslanted_samp.deslant();
                self.deslanted_srch_obj =
                    Some(SearchObject::new(self.cntxt, deslanted_samp));
            }
            let deslanted_beam = self.deslanted_beam_obj.as_mut().expect("beam search built");
            let deslanted_srch = self
                .deslanted_srch_obj
                .as_mut()
                .expect("search object built");
            let deslanted_alt_list = deslanted_beam.search(deslanted_srch, lang_mod);

            if deslanted_alt_list.alt_count() > 0 {
                let adopt = match self.alt_list.as_ref() {
                    Some(alt_list) if alt_list.alt_count() > 0 => {
                        deslanted_alt_list.alt(0).cost < alt_list.alt(0).cost
                    }
                    _ => true,
                };
                if adopt {
                    self.deslanted = true;
                    self.deslanted_alt_list = Some(deslanted_alt_list);
                    return self.deslanted_alt_list.as_ref();
                }
            }
            self.deslanted_alt_list = Some(deslanted_alt_list);
        }

        self.alt_list.as_ref()
    }

    /// Recognizes the sample as a single word.
    pub fn recognize_word(&mut self, lang_mod: Option<&dyn LangModel>) -> Option<&WordAltList> {
        self.recognize(lang_mod, true)
    }

    /// Recognizes the sample as a phrase, allowing implicit spaces.
    pub fn recognize_phrase(&mut self, lang_mod: Option<&dyn LangModel>) -> Option<&WordAltList> {
        self.recognize(lang_mod, false)
    }

    /// Cost of the sample rendering a specific string, computed by
    /// recognizing against a language model containing only that string.
    pub fn word_cost(&mut self, word: &str) -> i32 {
        let mut word_list = WordListLangModel::new(self.cntxt.char_set_arc().clone());
        if word_list.add_string(word).is_err() || word_list.word_count() == 0 {
            return WORST_COST;
        }
        match self.recognize_word(Some(&word_list)) {
            Some(alt_list) if alt_list.alt_count() > 0 => alt_list.alt(0).cost,
            _ => WORST_COST,
        }
    }

    /// Classifies the sample as one character.
    pub fn recognize_char(&self) -> Option<CharAltList> {
        self.cntxt.classifier()?.classify(&self.char_samp)
    }

    /// Recovers, in reading order, the per-character samples and the
    /// aligned string of an alternate's lattice path.
    pub fn backtrack(&mut self, node_id: NodeId) -> Option<(Vec<CharSample>, String)> {
        if self.deslanted {
            let beam_obj = self.deslanted_beam_obj.as_ref()?;
            let srch_obj = self.deslanted_srch_obj.as_mut()?;
            beam_obj.backtrack(srch_obj, node_id)
        } else {
            let beam_obj = self.beam_obj.as_ref()?;
            let srch_obj = self.srch_obj.as_mut()?;
            beam_obj.backtrack(srch_obj, node_id)
        }
    }

    /// Scales the word bitmap down vertically when its segments are
    /// implausibly tall and narrow, to bound the mean aspect ratio.
    fn normalize(&mut self) {
        let mut srch_obj = SearchObject::new(self.cntxt, self.char_samp.clone());
        let seg_cnt = match srch_obj.seg_pt_count() {
            Some(seg_cnt) => seg_cnt,
            None => return,
        };
        if seg_cnt < MIN_NORMALIZATION_SEGMENT_CNT {
            return;
        }

        let mut ar_mean = 0.0;
        for seg_idx in 0..=seg_cnt {
            if let Some(seg_samp) = srch_obj.char_sample(seg_idx - 1, seg_idx) {
                if seg_samp.width() > 0 {
                    ar_mean += seg_samp.height() as f64 / seg_samp.width() as f64;
                }
            }
        }
        ar_mean /= (seg_cnt + 1) as f64;

        if ar_mean > MIN_NORMALIZATION_ASPECT_RATIO {
            let new_hgt = (self.char_samp.height() as f64 * MIN_NORMALIZATION_ASPECT_RATIO
                / ar_mean) as usize;
            if let Some(new_samp) =
                self.char_samp.scaled(self.char_samp.width(), new_hgt, false)
            {
                self.char_samp = new_samp;
                // a fresh sample invalidates any previous segmentation
                self.srch_obj = None;
                self.deslanted_srch_obj = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::tests::bare_context;

    fn tall_bars_sample(bars: usize, hgt: usize) -> CharSample {
        let mut samp = CharSample::new(0, 0, bars * 4, hgt);
        for bar in 0..bars {
            for y in 0..hgt {
                samp.bitmap_mut().set(bar * 4, y, 0);
                samp.bitmap_mut().set(bar * 4 + 1, y, 0);
            }
        }
        samp
    }

    #[test]
    fn test_normalization_trigger() {
        let mut cntxt = bare_context();
        cntxt.set_size_normalization(true);
        // 6 segments of aspect ratio 12 trigger scaling down to 3.5
        let mut cube_obj = CubeObject::new(&cntxt, tall_bars_sample(6, 24));
        cube_obj.recognize_word(None);
        let expected = (24.0 * MIN_NORMALIZATION_ASPECT_RATIO / 12.0) as usize;
        assert_eq!(cube_obj.word_sample().height(), expected);
    }

    #[test]
    fn test_no_normalization_below_trigger() {
        let mut cntxt = bare_context();
        cntxt.set_size_normalization(true);
        // mean aspect ratio of 2 stays untouched
        let mut cube_obj = CubeObject::new(&cntxt, tall_bars_sample(6, 4));
        cube_obj.recognize_word(None);
        assert_eq!(cube_obj.word_sample().height(), 4);
    }

    #[test]
    fn test_empty_sample_yields_empty_list() {
        let cntxt = bare_context();
        let mut cube_obj = CubeObject::new(&cntxt, CharSample::new(0, 0, 16, 8));
        let alt_list = cube_obj.recognize_word(None).unwrap();
        assert_eq!(alt_list.alt_count(), 0);
        assert!(!cube_obj.deslanted());
    }

    #[test]
    fn test_upright_input_not_deslanted() {
        let cntxt = bare_context();
        let mut cube_obj = CubeObject::new(&cntxt, tall_bars_sample(3, 8));
        cube_obj.recognize_word(None);
        // an equal de-slanted answer never displaces the upright one
        assert!(!cube_obj.deslanted());
    }
}
