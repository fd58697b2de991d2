use crate::conncomp::ConComp;
use crate::context::RecoContext;
use crate::sample::CharSample;

/// Slices a full line image into phrase sub-images based on the gaps
/// between its connected components. The word-break threshold starts at the
/// definite-space gap and is relaxed downward until every resulting phrase
/// satisfies the word aspect-ratio bound.
pub struct PhraseSplitter<'a> {
    cntxt: &'a RecoContext,
}

impl<'a> PhraseSplitter<'a> {
    pub fn new(cntxt: &'a RecoContext) -> PhraseSplitter<'a> {
        PhraseSplitter { cntxt }
    }

    /// Splits a line sample into phrase samples, in reading order.
    pub fn split(&self, line_samp: &CharSample) -> Vec<CharSample> {
        let params = self.cntxt.params();
        let rtl = self.cntxt.reading_order().is_right_to_left();
        let line_hgt = line_samp.height() as i32;

        let mut con_comps = line_samp
            .bitmap()
            .find_con_comps(params.min_con_comp_size as usize);
        if con_comps.is_empty() {
            return Vec::new();
        }
        con_comps.sort_by(if rtl {
            ConComp::right_to_left
        } else {
            ConComp::left_to_right
        });

        let word_break_threshold = self.word_break_threshold(&con_comps, line_hgt, rtl);
        if word_break_threshold <= 0 {
            return Vec::new();
        }

        let mut phrases = Vec::new();
        let mut start_con_idx = 0;
        let mut current_phrase_limit = if rtl {
            con_comps[0].left()
        } else {
            con_comps[0].right()
        };
        for con_idx in 1..=con_comps.len() {
            let create_new_phrase = if con_idx < con_comps.len() {
                let dist = if rtl {
                    current_phrase_limit - con_comps[con_idx].right()
                } else {
                    con_comps[con_idx].left() - current_phrase_limit
                };
                dist > word_break_threshold
            } else {
                true
            };

            if create_new_phrase {
                if let Some((phrase_samp, _, _)) =
                    CharSample::from_con_comps(&con_comps, start_con_idx, con_idx - start_con_idx)
                {
                    phrases.push(phrase_samp);
                }
                start_con_idx = con_idx;
                if con_idx < con_comps.len() {
                    current_phrase_limit = if rtl {
                        con_comps[con_idx].left()
                    } else {
                        con_comps[con_idx].right()
                    };
                }
            } else if rtl {
                current_phrase_limit = current_phrase_limit.min(con_comps[con_idx].left());
            } else {
                current_phrase_limit = current_phrase_limit.max(con_comps[con_idx].right());
            }
        }
        phrases
    }

    /// The least word-breaking threshold producing phrases that all satisfy
    /// the aspect-ratio constraint; falls back to the definite-space gap
    /// when no threshold does.
    fn word_break_threshold(&self, con_comps: &[ConComp], line_hgt: i32, rtl: bool) -> i32 {
        let params = self.cntxt.params();
        let default_threshold = (line_hgt as f64 * params.max_space_height_ratio) as i32;
        let mut word_break_threshold = default_threshold;

        while word_break_threshold > 0 {
            let mut current_phrase_limit = if rtl {
                con_comps[0].left()
            } else {
                con_comps[0].right()
            };
            let mut min_x = con_comps[0].left();
            let mut max_x = con_comps[0].right();
            let mut min_y = con_comps[0].top();
            let mut max_y = con_comps[0].bottom();
            let mut valid = true;

            for con_idx in 1..=con_comps.len() {
                let create_new_phrase = if con_idx < con_comps.len() {
                    let dist = if rtl {
                        current_phrase_limit - con_comps[con_idx].right()
                    } else {
                        con_comps[con_idx].left() - current_phrase_limit
                    };
                    dist > word_break_threshold
                } else {
                    true
                };

                if create_new_phrase {
                    if (max_x - min_x + 1) as f64
                        > params.max_word_aspect_ratio * (max_y - min_y + 1) as f64
                    {
                        valid = false;
                        break;
                    }
                    if con_idx < con_comps.len() {
                        current_phrase_limit = if rtl {
                            con_comps[con_idx].left()
                        } else {
                            con_comps[con_idx].right()
                        };
                        min_x = con_comps[con_idx].left();
                        max_x = con_comps[con_idx].right();
                        min_y = con_comps[con_idx].top();
                        max_y = con_comps[con_idx].bottom();
                    }
                } else {
                    if rtl {
                        current_phrase_limit =
                            current_phrase_limit.min(con_comps[con_idx].left());
                    } else {
                        current_phrase_limit =
                            current_phrase_limit.max(con_comps[con_idx].right());
                    }
                    min_x = min_x.min(con_comps[con_idx].left());
                    max_x = max_x.max(con_comps[con_idx].right());
                    min_y = min_y.min(con_comps[con_idx].top());
                    max_y = max_y.max(con_comps[con_idx].bottom());
                }
            }

            if valid {
                return word_break_threshold;
            }
            word_break_threshold -= 1;
        }

        // no threshold achieves the target aspect ratio
        default_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::tests::bare_context;

    fn line_sample(groups: &[(usize, usize)], hgt: usize) -> CharSample {
        // groups of (start_x, bar_count) with 3px bars and 2px intra gaps
        let wid = groups
            .iter()
            .map(|&(x0, bars)| x0 + bars * 5)
            .max()
            .unwrap();
        let mut samp = CharSample::new(0, 0, wid, hgt);
        for &(x0, bars) in groups {
            for bar in 0..bars {
                for y in 0..hgt {
                    for x in 0..3 {
                        samp.bitmap_mut().set(x0 + bar * 5 + x, y, 0);
                    }
                }
            }
        }
        samp
    }

    #[test]
    fn test_split_two_words() {
        let cntxt = bare_context();
        let splitter = PhraseSplitter::new(&cntxt);
        // two groups separated by a 12px gap; height 10 puts the break
        // threshold at 3
        let line = line_sample(&[(0, 3), (25, 2)], 10);
        let phrases = splitter.split(&line);
        assert_eq!(phrases.len(), 2);
        assert!(phrases[0].left() < phrases[1].left());
        assert_eq!(phrases[0].width(), 13);
    }

    #[test]
    fn test_single_word_is_one_phrase() {
        let cntxt = bare_context();
        let splitter = PhraseSplitter::new(&cntxt);
        let line = line_sample(&[(0, 3)], 10);
        let phrases = splitter.split(&line);
        assert_eq!(phrases.len(), 1);
    }

    #[test]
    fn test_blank_line() {
        let cntxt = bare_context();
        let splitter = PhraseSplitter::new(&cntxt);
        let line = CharSample::new(0, 0, 20, 10);
        assert!(splitter.split(&line).is_empty());
    }
}
