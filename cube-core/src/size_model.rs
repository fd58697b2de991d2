use std::path::Path;

use crate::charset::CharSet;
use crate::cost::WORST_COST;
use crate::error::CubeErrorKind;
use crate::sample::CharSample;
use crate::CubeResult;

/// Fixed-point scale applied to the floating-point ratios of the size file.
const SHAPE_MODEL_SCALE: f64 = 1000.0;
/// Tokens per line for non-contextual scripts; contextual scripts carry four
/// extra start/end flags.
const EXPECTED_TOKEN_COUNT: usize = 10;

#[derive(Debug, Clone, Copy, Default)]
struct PairSizeInfo {
    delta_top: i32,
    wid_0: i32,
    hgt_0: i32,
    wid_1: i32,
    hgt_1: i32,
}

#[derive(Debug, Clone)]
struct FontPairSizeInfo {
    font_name: String,
    pair_size_info: Vec<PairSizeInfo>,
}

/// Per-font geometry of character pairs, loaded from the `.cube.size` file.
/// For cursive scripts the size code folds the start/end-of-word flags into
/// the class id, quadrupling the table.
#[derive(Debug, Clone)]
pub struct WordSizeModel {
    contextual: bool,
    size_class_cnt: usize,
    fonts: Vec<FontPairSizeInfo>,
}

impl WordSizeModel {
    /// Size code of a class at a word position.
    #[inline]
    pub fn size_code(cls_id: usize, start: usize, end: usize) -> usize {
        (cls_id << 2) + (end << 1) + start
    }

    pub fn parse(content: &str, class_cnt: usize, contextual: bool) -> CubeResult<WordSizeModel> {
        let tokens: Vec<&str> = content.split_whitespace().collect();
        if tokens.is_empty() {
            return Err(CubeErrorKind::Content.with_error(anyhow::anyhow!("empty size file")));
        }

        let token_cnt = if contextual {
            EXPECTED_TOKEN_COUNT + 4
        } else {
            EXPECTED_TOKEN_COUNT
        };
        let size_class_cnt = if contextual { class_cnt * 4 } else { class_cnt };

        let mut model = WordSizeModel {
            contextual,
            size_class_cnt,
            fonts: Vec::new(),
        };

        let parse_int = |tok: &str, line: usize| -> CubeResult<i64> {
            tok.parse().map_err(|err| {
                CubeErrorKind::Parse
                    .with_error(anyhow::anyhow!("bad format at line {}: {}", line, err))
            })
        };
        let parse_float = |tok: &str, line: usize| -> CubeResult<f64> {
            tok.parse().map_err(|err| {
                CubeErrorKind::Parse
                    .with_error(anyhow::anyhow!("bad format at line {}: {}", line, err))
            })
        };

        let mut fnt_name = "";
        let mut tok = 0;
        while tok + token_cnt <= tokens.len() {
            let line = 1 + tok / token_cnt;
            if tok == 0 || fnt_name != tokens[tok] {
                // strip path and extension from the font name
                let stripped = tokens[tok].split('.').next().unwrap_or(tokens[tok]);
                let font_name = stripped
                    .rsplit(['/', '\\'])
                    .next()
                    .unwrap_or(stripped)
                    .to_string();
                model.fonts.push(FontPairSizeInfo {
                    font_name,
                    pair_size_info: vec![
                        PairSizeInfo::default();
                        size_class_cnt * size_class_cnt
                    ],
                });
            }

            let (size_code_0, size_code_1, delta_top, wid_0, hgt_0, wid_1, hgt_1) = if contextual {
                let cls_0 = parse_int(tokens[tok + 1], line)? as usize;
                let start_0 = parse_int(tokens[tok + 2], line)? as usize;
                let end_0 = parse_int(tokens[tok + 3], line)? as usize;
                let wid_0 = parse_float(tokens[tok + 5], line)?;
                let hgt_0 = parse_float(tokens[tok + 6], line)?;
                let cls_1 = parse_int(tokens[tok + 7], line)? as usize;
                let start_1 = parse_int(tokens[tok + 8], line)? as usize;
                let end_1 = parse_int(tokens[tok + 9], line)? as usize;
                let delta_top = parse_float(tokens[tok + 11], line)?;
                let wid_1 = parse_float(tokens[tok + 12], line)?;
                let hgt_1 = parse_float(tokens[tok + 13], line)?;
                if start_0 > 1 || end_0 > 1 || start_1 > 1 || end_1 > 1 {
                    return Err(CubeErrorKind::Content
                        .with_error(anyhow::anyhow!("bad position flag at line {}", line)));
                }
                (
                    Self::size_code(cls_0, start_0, end_0),
                    Self::size_code(cls_1, start_1, end_1),
                    delta_top,
                    wid_0,
                    hgt_0,
                    wid_1,
                    hgt_1,
                )
            } else {
                let cls_0 = parse_int(tokens[tok + 1], line)? as usize;
                let wid_0 = parse_float(tokens[tok + 3], line)?;
                let hgt_0 = parse_float(tokens[tok + 4], line)?;
                let cls_1 = parse_int(tokens[tok + 5], line)? as usize;
                let delta_top = parse_float(tokens[tok + 7], line)?;
                let wid_1 = parse_float(tokens[tok + 8], line)?;
                let hgt_1 = parse_float(tokens[tok + 9], line)?;
                (cls_0, cls_1, delta_top, wid_0, hgt_0, wid_1, hgt_1)
            };

            if size_code_0 >= size_class_cnt || size_code_1 >= size_class_cnt {
                return Err(CubeErrorKind::Content
                    .with_error(anyhow::anyhow!("class id out of range at line {}", line)));
            }

            let font = model.fonts.last_mut().expect("at least one font");
            let info = &mut font.pair_size_info[size_code_0 * size_class_cnt + size_code_1];
            info.delta_top = (delta_top * SHAPE_MODEL_SCALE) as i32;
            info.wid_0 = (wid_0 * SHAPE_MODEL_SCALE) as i32;
            info.hgt_0 = (hgt_0 * SHAPE_MODEL_SCALE) as i32;
            info.wid_1 = (wid_1 * SHAPE_MODEL_SCALE) as i32;
            info.hgt_1 = (hgt_1 * SHAPE_MODEL_SCALE) as i32;

            fnt_name = tokens[tok];
            tok += token_cnt;
        }

        Ok(model)
    }

    pub fn load<P: AsRef<Path>>(
        path: P,
        class_cnt: usize,
        contextual: bool,
    ) -> CubeResult<WordSizeModel> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|err| {
            CubeErrorKind::Io
                .with_error(anyhow::anyhow!(err))
                .add_context(format!("failed to load {}", path.as_ref().display()))
        })?;
        Self::parse(&content, class_cnt, contextual)
    }

    pub fn font_count(&self) -> usize {
        self.fonts.len()
    }

    pub fn font_name(&self, idx: usize) -> Option<&str> {
        self.fonts.get(idx).map(|fnt| fnt.font_name.as_str())
    }

    /// Size cost of a labeled sample sequence: for each adjacent pair the
    /// observed geometry is scaled into the model's space and the absolute
    /// errors are summed; the mean over pairs is taken per font and the
    /// cheapest font wins. Fewer than two samples cost nothing.
    pub fn cost(&self, samples: &[CharSample], char_set: &CharSet) -> i32 {
        if samples.len() < 2 {
            return 0;
        }

        let size_code_of = |samp: &CharSample| -> Option<usize> {
            let cls = char_set.class_id(samp.label()?)?;
            if cls < 1 {
                return None;
            }
            if self.contextual {
                Some(Self::size_code(
                    cls,
                    if samp.first_char() == 0 { 0 } else { 1 },
                    if samp.last_char() == 0 { 0 } else { 1 },
                ))
            } else {
                Some(cls)
            }
        };

        let mut best_dist = WORST_COST as f64;
        let mut best_fnt = None;
        for (fnt_idx, fnt_info) in self.fonts.iter().enumerate() {
            let mut mean_dist = 0.0;
            let mut pair_cnt = 0;
            for pair in samples.windows(2) {
                let (size_code_0, size_code_1) =
                    match (size_code_of(&pair[0]), size_code_of(&pair[1])) {
                        (Some(code_0), Some(code_1)) => (code_0, code_1),
                        _ => continue,
                    };
                let info = &fnt_info.pair_size_info[size_code_0 * self.size_class_cnt + size_code_1];
                let dist = Self::pair_cost(&pair[0], &pair[1], info);
                if dist > 0.0 {
                    mean_dist += dist;
                    pair_cnt += 1;
                }
            }
            if pair_cnt == 0 {
                continue;
            }
            mean_dist /= pair_cnt as f64;
            if best_fnt.is_none() || mean_dist < best_dist {
                best_dist = mean_dist;
                best_fnt = Some(fnt_idx);
            }
        }
        if best_fnt.is_none() {
            WORST_COST
        } else {
            best_dist as i32
        }
    }

    fn pair_cost(samp_0: &CharSample, samp_1: &CharSample, info: &PairSizeInfo) -> f64 {
        let height_0 = samp_0.height() as f64;
        if height_0 <= 0.0 {
            return 0.0;
        }
        let scale_factor = info.hgt_0 as f64 / height_0;
        let mut dist = 0.0;
        if scale_factor > 0.0 {
            let norm_width_0 = samp_0.width() as f64 * scale_factor;
            let norm_width_1 = samp_1.width() as f64 * scale_factor;
            let norm_height_1 = samp_1.height() as f64 * scale_factor;
            let norm_delta_top = (samp_1.top() - samp_0.top()) as f64 * scale_factor;
            dist += (info.wid_0 as f64 - norm_width_0).abs();
            dist += (info.wid_1 as f64 - norm_width_1).abs();
            dist += (info.hgt_1 as f64 - norm_height_1).abs();
            dist += (info.delta_top as f64 - norm_delta_top).abs();
        }
        dist
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charset::tests::latin_charset;

    fn labeled_sample(label: &str, left: i32, top: i32, wid: usize, hgt: usize) -> CharSample {
        let mut samp = CharSample::new(left, top, wid, hgt);
        samp.set_label(label);
        samp
    }

    // one font, pair (a, b): a is 0.5 wide x 1.0 high, b is 0.5 x 0.5,
    // b's top sits 0.5 below a's
    const CONTENT: &str = "times 1 a 0.5 1.0 2 b 0.5 0.5 0.5\n";

    #[test]
    fn test_parse() {
        let model = WordSizeModel::parse(CONTENT, 16, false).unwrap();
        assert_eq!(model.font_count(), 1);
        assert_eq!(model.font_name(0), Some("times"));
    }

    #[test]
    fn test_matching_geometry_is_cheap() {
        let charset = latin_charset();
        let model = WordSizeModel::parse(CONTENT, charset.class_count(), false).unwrap();
        // geometry nearly agreeing with the model up to a uniform scale
        let good = vec![
            labeled_sample("a", 0, 0, 10, 20),
            labeled_sample("b", 12, 11, 10, 10),
        ];
        // b drawn as tall as a, contradicting the model
        let bad = vec![
            labeled_sample("a", 0, 0, 10, 20),
            labeled_sample("b", 12, 0, 10, 20),
        ];
        assert!(model.cost(&good, &charset) < model.cost(&bad, &charset));
    }

    #[test]
    fn test_single_sample_costs_nothing() {
        let charset = latin_charset();
        let model = WordSizeModel::parse(CONTENT, charset.class_count(), false).unwrap();
        let samples = vec![labeled_sample("a", 0, 0, 10, 20)];
        assert_eq!(model.cost(&samples, &charset), 0);
    }

    #[test]
    fn test_size_code() {
        assert_eq!(WordSizeModel::size_code(3, 0, 0), 12);
        assert_eq!(WordSizeModel::size_code(3, 1, 0), 13);
        assert_eq!(WordSizeModel::size_code(3, 0, 1), 14);
        assert_eq!(WordSizeModel::size_code(3, 1, 1), 15);
    }
}
