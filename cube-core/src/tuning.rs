use std::fmt::Write as _;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CubeError, CubeErrorKind};
use crate::CubeResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassifierKind {
    #[serde(rename = "NN")]
    Nn,
    #[serde(rename = "HYBRID_NN")]
    HybridNn,
}

impl FromStr for ClassifierKind {
    type Err = CubeError;
    fn from_str(kind: &str) -> Result<ClassifierKind, Self::Err> {
        match kind {
            "NN" => Ok(ClassifierKind::Nn),
            "HYBRID_NN" => Ok(ClassifierKind::HybridNn),
            _ => Err(CubeErrorKind::Parse
                .with_error(anyhow::anyhow!("invalid classifier type: {}", kind))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureKind {
    #[serde(rename = "BMP")]
    Bmp,
    #[serde(rename = "CHEBYSHEV")]
    Chebyshev,
    #[serde(rename = "HYBRID")]
    Hybrid,
}

impl FromStr for FeatureKind {
    type Err = CubeError;
    fn from_str(kind: &str) -> Result<FeatureKind, Self::Err> {
        match kind {
            "BMP" => Ok(FeatureKind::Bmp),
            "CHEBYSHEV" => Ok(FeatureKind::Chebyshev),
            "HYBRID" => Ok(FeatureKind::Hybrid),
            _ => {
                Err(CubeErrorKind::Parse
                    .with_error(anyhow::anyhow!("invalid feature type: {}", kind)))
            }
        }
    }
}

/// The scalar weights and thresholds tuned during training, loaded from the
/// `.cube.params` key = value file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuningParams {
    /// weight of the recognition cost, which includes the language model cost
    pub reco_wgt: f64,
    pub size_wgt: f64,
    pub char_bigrams_wgt: f64,
    pub word_unigrams_wgt: f64,
    /// maximum number of segments per character
    pub max_seg_per_char: i32,
    /// maximum number of nodes kept in a lattice column after pruning
    pub beam_width: i32,
    pub classifier: ClassifierKind,
    pub feature_type: FeatureKind,
    /// grid size a grapheme bitmap is scaled to for the BMP feature type
    pub conv_grid_size: i32,
    /// cap on the histogram smearing window of the segmentation algorithm
    pub hist_wind_wid: i32,
    /// minimum pixel count of a connected component
    pub min_con_comp_size: i32,
    pub max_word_aspect_ratio: f64,
    /// gap-to-height ratio below which a gap cannot be a word break
    pub min_space_height_ratio: f64,
    /// gap-to-height ratio above which a gap is a definite word break
    pub max_space_height_ratio: f64,
    pub combiner_run_thresh: f64,
    pub combiner_classifier_thresh: f64,
    pub ood_wgt: f64,
    pub num_wgt: f64,
}

impl Default for TuningParams {
    fn default() -> Self {
        TuningParams {
            reco_wgt: 1.0,
            size_wgt: 1.0,
            char_bigrams_wgt: 1.0,
            word_unigrams_wgt: 0.0,
            max_seg_per_char: 8,
            beam_width: 32,
            classifier: ClassifierKind::Nn,
            feature_type: FeatureKind::Bmp,
            conv_grid_size: 32,
            hist_wind_wid: 0,
            min_con_comp_size: 0,
            max_word_aspect_ratio: 10.0,
            min_space_height_ratio: 0.2,
            max_space_height_ratio: 0.3,
            combiner_run_thresh: 1.0,
            combiner_classifier_thresh: 0.5,
            ood_wgt: 1.0,
            num_wgt: 1.0,
        }
    }
}

impl TuningParams {
    /// Parses the `key = value` parameter file.
    pub fn parse(content: &str) -> CubeResult<TuningParams> {
        let lines: Vec<&str> = content
            .lines()
            .map(|line| line.trim())
            .filter(|line| !line.is_empty())
            .collect();
        if lines.len() < 8 {
            return Err(CubeErrorKind::Content
                .with_error(anyhow::anyhow!("too few rows in parameter file")));
        }

        let mut params = TuningParams::default();
        for line in lines {
            let (key, val) = line.split_once('=').ok_or_else(|| {
                CubeErrorKind::Parse.with_error(anyhow::anyhow!("invalid format in line: {}", line))
            })?;
            let key = key.trim();
            let val = val.trim();
            let num = |val: &str| -> CubeResult<f64> {
                val.parse().map_err(|err| {
                    CubeErrorKind::Parse
                        .with_error(anyhow::anyhow!("invalid value in line {:?}: {}", line, err))
                })
            };
            match key {
                "RecoWgt" => params.reco_wgt = num(val)?,
                "SizeWgt" => params.size_wgt = num(val)?,
                "CharBigramsWgt" => params.char_bigrams_wgt = num(val)?,
                "WordUnigramsWgt" => params.word_unigrams_wgt = num(val)?,
                "MaxSegPerChar" => params.max_seg_per_char = num(val)? as i32,
                "BeamWidth" => params.beam_width = num(val)? as i32,
                "Classifier" => params.classifier = val.parse()?,
                "FeatureType" => params.feature_type = val.parse()?,
                "ConvGridSize" => params.conv_grid_size = num(val)? as i32,
                "HistWindWid" => params.hist_wind_wid = num(val)? as i32,
                "MinConCompSize" => params.min_con_comp_size = num(val)? as i32,
                "MaxWordAspectRatio" => params.max_word_aspect_ratio = num(val)?,
                "MinSpaceHeightRatio" => params.min_space_height_ratio = num(val)?,
                "MaxSpaceHeightRatio" => params.max_space_height_ratio = num(val)?,
                "CombinerRunThresh" => params.combiner_run_thresh = num(val)?,
                "CombinerClassifierThresh" => params.combiner_classifier_thresh = num(val)?,
                "OODWgt" => params.ood_wgt = num(val)?,
                "NumWgt" => params.num_wgt = num(val)?,
                _ => {
                    return Err(CubeErrorKind::Parse
                        .with_error(anyhow::anyhow!("unknown parameter in line: {}", line)));
                }
            }
        }
        Ok(params)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> CubeResult<TuningParams> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|err| {
            CubeErrorKind::Io
                .with_error(anyhow::anyhow!(err))
                .add_context(format!("failed to load {}", path.as_ref().display()))
        })?;
        Self::parse(&content)
    }

    /// Renders the parameters in the file format. `parse` of the result
    /// yields pointwise-equal values.
    pub fn to_file_string(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "RecoWgt={:.4}", self.reco_wgt);
        let _ = writeln!(out, "SizeWgt={:.4}", self.size_wgt);
        let _ = writeln!(out, "CharBigramsWgt={:.4}", self.char_bigrams_wgt);
        let _ = writeln!(out, "WordUnigramsWgt={:.4}", self.word_unigrams_wgt);
        let _ = writeln!(out, "MaxSegPerChar={}", self.max_seg_per_char);
        let _ = writeln!(out, "BeamWidth={}", self.beam_width);
        let _ = writeln!(
            out,
            "Classifier={}",
            match self.classifier {
                ClassifierKind::Nn => "NN",
                ClassifierKind::HybridNn => "HYBRID_NN",
            }
        );
        let _ = writeln!(
            out,
            "FeatureType={}",
            match self.feature_type {
                FeatureKind::Bmp => "BMP",
                FeatureKind::Chebyshev => "CHEBYSHEV",
                FeatureKind::Hybrid => "HYBRID",
            }
        );
        let _ = writeln!(out, "ConvGridSize={}", self.conv_grid_size);
        let _ = writeln!(out, "HistWindWid={}", self.hist_wind_wid);
        let _ = writeln!(out, "MinConCompSize={}", self.min_con_comp_size);
        let _ = writeln!(out, "MaxWordAspectRatio={:.4}", self.max_word_aspect_ratio);
        let _ = writeln!(out, "MinSpaceHeightRatio={:.4}", self.min_space_height_ratio);
        let _ = writeln!(out, "MaxSpaceHeightRatio={:.4}", self.max_space_height_ratio);
        let _ = writeln!(out, "CombinerRunThresh={:.4}", self.combiner_run_thresh);
        let _ = writeln!(
            out,
            "CombinerClassifierThresh={:.4}",
            self.combiner_classifier_thresh
        );
        let _ = writeln!(out, "OODWgt={:.4}", self.ood_wgt);
        let _ = writeln!(out, "NumWgt={:.4}", self.num_wgt);
        out
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> CubeResult<()> {
        std::fs::write(path.as_ref(), self.to_file_string()).map_err(|err| {
            CubeErrorKind::Io
                .with_error(anyhow::anyhow!(err))
                .add_context(format!("failed to save {}", path.as_ref().display()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let content = "RecoWgt=1.5\nSizeWgt=0.7\nCharBigramsWgt=1.0\nWordUnigramsWgt=0.3\n\
                       MaxSegPerChar=5\nBeamWidth=16\nClassifier=HYBRID_NN\nFeatureType=HYBRID\n\
                       MinSpaceHeightRatio=0.25\n";
        let params = TuningParams::parse(content).unwrap();
        assert_eq!(params.reco_wgt, 1.5);
        assert_eq!(params.max_seg_per_char, 5);
        assert_eq!(params.beam_width, 16);
        assert_eq!(params.classifier, ClassifierKind::HybridNn);
        assert_eq!(params.feature_type, FeatureKind::Hybrid);
        assert_eq!(params.min_space_height_ratio, 0.25);
        // untouched keys keep their defaults
        assert_eq!(params.max_word_aspect_ratio, 10.0);
    }

    #[test]
    fn test_round_trip() {
        let mut params = TuningParams::default();
        params.reco_wgt = 2.25;
        params.beam_width = 48;
        params.classifier = ClassifierKind::HybridNn;
        params.feature_type = FeatureKind::Chebyshev;
        let reloaded = TuningParams::parse(&params.to_file_string()).unwrap();
        assert_eq!(params, reloaded);
    }

    #[test]
    fn test_rejects_unknown_key() {
        let content = "RecoWgt=1\nSizeWgt=1\nCharBigramsWgt=1\nWordUnigramsWgt=1\n\
                       MaxSegPerChar=8\nBeamWidth=32\nBogusKey=3\nFeatureType=BMP\n";
        assert!(TuningParams::parse(content).is_err());
    }

    #[test]
    fn test_rejects_short_file() {
        assert!(TuningParams::parse("RecoWgt=1\n").is_err());
    }
}
