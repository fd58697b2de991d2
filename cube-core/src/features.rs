use std::f64::consts::PI;

use crate::sample::CharSample;

/// Chebyshev coefficients computed per border profile.
const CHEBYSHEV_COEFF_CNT: usize = 40;

/// Extracts a fixed-size float feature vector from a character sample.
/// Implementations are pluggable at context-load time through the tuning
/// parameters.
pub trait FeatureExtractor: Send + Sync {
    fn feature_count(&self) -> usize;
    /// Fills `features` (of `feature_count` length). Returns false when the
    /// sample cannot produce features (e.g. degenerate geometry).
    fn compute(&self, samp: &CharSample, features: &mut [f32]) -> bool;
}

/// Scaled-bitmap features: the sample is scaled to a square grid and each
/// pixel becomes one inverted-intensity feature, followed by the five word
/// context attributes.
pub struct BmpFeatures {
    conv_grid_size: usize,
}

impl BmpFeatures {
    pub fn new(conv_grid_size: usize) -> Self {
        BmpFeatures { conv_grid_size }
    }
}

impl FeatureExtractor for BmpFeatures {
    fn feature_count(&self) -> usize {
        self.conv_grid_size * self.conv_grid_size + 5
    }

    fn compute(&self, samp: &CharSample, features: &mut [f32]) -> bool {
        let scaled = match samp.scaled(self.conv_grid_size, self.conv_grid_size, true) {
            Some(scaled) => scaled,
            None => return false,
        };
        let buff = scaled.bitmap().raw_data();
        let bmp_size = self.conv_grid_size * self.conv_grid_size;
        for (feature, &pix) in features[..bmp_size].iter_mut().zip(buff) {
            *feature = 255.0 - pix as f32;
        }
        features[bmp_size] = samp.first_char() as f32;
        features[bmp_size + 1] = samp.last_char() as f32;
        features[bmp_size + 2] = samp.norm_top() as f32;
        features[bmp_size + 3] = samp.norm_bottom() as f32;
        features[bmp_size + 4] = samp.norm_aspect_ratio() as f32;
        true
    }
}

/// Chebyshev-coefficient features of the four border-profile time series
/// (left, top, right, bottom).
pub struct ChebyshevFeatures;

impl ChebyshevFeatures {
    pub fn new() -> Self {
        ChebyshevFeatures
    }

    /// Chebyshev coefficients of a sampled function: the function is
    /// re-sampled at the Chebyshev nodes and projected onto the cosine
    /// basis.
    fn coefficients(input: &[f64], coeff: &mut [f32]) {
        let coeff_cnt = coeff.len();
        let input_range = (input.len() - 1) as f64;
        let mut resamp = vec![0f64; coeff_cnt];
        for (samp_idx, resamp_val) in resamp.iter_mut().enumerate() {
            let samp_pos =
                input_range * (1.0 + (PI * (samp_idx as f64 + 0.5) / coeff_cnt as f64).cos()) / 2.0;
            let samp_start = samp_pos as usize;
            let samp_end = (samp_pos + 0.5) as usize;
            let func_delta = input[samp_end] - input[samp_start];
            *resamp_val = input[samp_start] + (samp_pos - samp_start as f64) * func_delta;
        }
        let normalizer = 2.0 / coeff_cnt as f64;
        for (coeff_idx, coeff_val) in coeff.iter_mut().enumerate() {
            let mut sum = 0.0;
            for (samp_idx, &resamp_val) in resamp.iter().enumerate() {
                sum += resamp_val
                    * (PI * coeff_idx as f64 * (samp_idx as f64 + 0.5) / coeff_cnt as f64).cos();
            }
            *coeff_val = (normalizer * sum) as f32;
        }
    }
}

impl Default for ChebyshevFeatures {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureExtractor for ChebyshevFeatures {
    fn feature_count(&self) -> usize {
        4 * CHEBYSHEV_COEFF_CNT
    }

    fn compute(&self, samp: &CharSample, features: &mut [f32]) -> bool {
        if samp.norm_bottom() == 0 || samp.width() == 0 || samp.height() == 0 {
            return false;
        }
        let wid = samp.width();
        let hgt = samp.height();
        let top = samp.top().max(0) as usize;
        // recover the height of the surrounding word from the normalized
        // bottom attribute
        let word_hgt = 255 * (top + hgt) / samp.norm_bottom() as usize;
        if word_hgt == 0 {
            return false;
        }

        // left and right profiles indexed by absolute y
        let mut left_profile = vec![0f64; word_hgt];
        let mut right_profile = vec![0f64; word_hgt];
        for y in 0..hgt {
            let mut min_x = wid;
            let mut max_x: i64 = -1;
            for x in 0..wid {
                if samp.bitmap().get(x, y) == 0 {
                    min_x = min_x.min(x);
                    max_x = max_x.max(x as i64);
                }
            }
            let row = (top + y).min(word_hgt - 1);
            let left_reach = if min_x == wid { 0.0 } else { (min_x + 1) as f64 };
            let right_reach = if max_x < 0 { 0.0 } else { (wid as i64 - max_x) as f64 };
            left_profile[row] = left_reach / wid as f64;
            right_profile[row] = right_reach / wid as f64;
        }

        // top and bottom profiles indexed by x
        let mut top_profile = vec![0f64; wid];
        let mut bottom_profile = vec![0f64; wid];
        for x in 0..wid {
            let mut min_y = word_hgt;
            let mut max_y: i64 = -1;
            for y in 0..hgt {
                if samp.bitmap().get(x, y) == 0 {
                    min_y = min_y.min(top + y);
                    max_y = max_y.max((top + y) as i64);
                }
            }
            let top_reach = if min_y == word_hgt { 0.0 } else { (min_y + 1) as f64 };
            let bottom_reach = if max_y < 0 {
                0.0
            } else {
                (word_hgt as i64 - max_y) as f64
            };
            top_profile[x] = top_reach / word_hgt as f64;
            bottom_profile[x] = bottom_reach / word_hgt as f64;
        }

        Self::coefficients(&left_profile, &mut features[..CHEBYSHEV_COEFF_CNT]);
        Self::coefficients(
            &top_profile,
            &mut features[CHEBYSHEV_COEFF_CNT..2 * CHEBYSHEV_COEFF_CNT],
        );
        Self::coefficients(
            &right_profile,
            &mut features[2 * CHEBYSHEV_COEFF_CNT..3 * CHEBYSHEV_COEFF_CNT],
        );
        Self::coefficients(
            &bottom_profile,
            &mut features[3 * CHEBYSHEV_COEFF_CNT..4 * CHEBYSHEV_COEFF_CNT],
        );
        true
    }
}

/// Concatenation of the bitmap and Chebyshev features.
pub struct HybridFeatures {
    bmp: BmpFeatures,
    chebyshev: ChebyshevFeatures,
}

impl HybridFeatures {
    pub fn new(conv_grid_size: usize) -> Self {
        HybridFeatures {
            bmp: BmpFeatures::new(conv_grid_size),
            chebyshev: ChebyshevFeatures::new(),
        }
    }
}

impl FeatureExtractor for HybridFeatures {
    fn feature_count(&self) -> usize {
        self.bmp.feature_count() + self.chebyshev.feature_count()
    }

    fn compute(&self, samp: &CharSample, features: &mut [f32]) -> bool {
        let split = self.bmp.feature_count();
        self.bmp.compute(samp, &mut features[..split])
            && self.chebyshev.compute(samp, &mut features[split..])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_sample() -> CharSample {
        let mut samp = CharSample::new(0, 0, 8, 8);
        for y in 0..8 {
            for x in 0..8 {
                samp.bitmap_mut().set(x, y, 0);
            }
        }
        samp.set_norm_top(0);
        samp.set_norm_bottom(255);
        samp.set_norm_aspect_ratio(127);
        samp
    }

    #[test]
    fn test_bmp_features() {
        let feat = BmpFeatures::new(4);
        let mut features = vec![0f32; feat.feature_count()];
        assert_eq!(feat.feature_count(), 21);
        assert!(feat.compute(&solid_sample(), &mut features));
        assert!(features[..16].iter().all(|&f| f == 255.0));
        assert_eq!(features[19], 255.0);
        assert_eq!(features[20], 127.0);
    }

    #[test]
    fn test_chebyshev_features() {
        let feat = ChebyshevFeatures::new();
        assert_eq!(feat.feature_count(), 160);
        let mut features = vec![0f32; feat.feature_count()];
        assert!(feat.compute(&solid_sample(), &mut features));
        // a constant profile projects onto the zeroth coefficient only
        assert!(features[0].abs() > 0.01);
        assert!(features[1].abs() < 0.001);
    }

    #[test]
    fn test_chebyshev_rejects_degenerate() {
        let mut samp = solid_sample();
        samp.set_norm_bottom(0);
        let feat = ChebyshevFeatures::new();
        let mut features = vec![0f32; feat.feature_count()];
        assert!(!feat.compute(&samp, &mut features));
    }

    #[test]
    fn test_hybrid_concat() {
        let feat = HybridFeatures::new(4);
        assert_eq!(feat.feature_count(), 21 + 160);
        let mut features = vec![0f32; feat.feature_count()];
        assert!(feat.compute(&solid_sample(), &mut features));
        assert!(features[..16].iter().all(|&f| f == 255.0));
    }
}
