use std::path::Path;
use std::sync::Arc;

use log::error;

use crate::altlist::CharAltList;
use crate::charset::CharSet;
use crate::classifier::{CharClassifier, FoldingSets};
use crate::cost::prob_to_cost;
use crate::error::CubeErrorKind;
use crate::features::FeatureExtractor;
use crate::nn::NeuralNet;
use crate::sample::CharSample;
use crate::CubeResult;

/// Ensemble character classifier: the feature vector is split across
/// several nets whose weighted outputs are accumulated per class. The
/// ensemble is described by the `.cube.hybrid` file, one
/// `<sub_net_file> <weight>` per line.
pub struct HybridNetClassifier {
    char_set: Arc<CharSet>,
    nets: Vec<NeuralNet>,
    net_wgts: Vec<f32>,
    feat_extract: Box<dyn FeatureExtractor>,
    folding: FoldingSets,
    case_sensitive: bool,
}

impl HybridNetClassifier {
    pub fn new(
        char_set: Arc<CharSet>,
        nets: Vec<NeuralNet>,
        net_wgts: Vec<f32>,
        feat_extract: Box<dyn FeatureExtractor>,
        folding: FoldingSets,
    ) -> Self {
        HybridNetClassifier {
            char_set,
            nets,
            net_wgts,
            feat_extract,
            folding,
            case_sensitive: true,
        }
    }

    /// Loads the ensemble for a language. The `.cube.hybrid` file is
    /// optional; without it the classifier classifies nothing.
    pub fn load(
        data_dir: &Path,
        lang: &str,
        char_set: Arc<CharSet>,
        feat_extract: Box<dyn FeatureExtractor>,
    ) -> CubeResult<HybridNetClassifier> {
        let hybrid_path = data_dir.join(format!("{}.cube.hybrid", lang));
        let mut nets = Vec::new();
        let mut net_wgts = Vec::new();
        if hybrid_path.exists() {
            let content = std::fs::read_to_string(&hybrid_path).map_err(|err| {
                CubeErrorKind::Io
                    .with_error(anyhow::anyhow!(err))
                    .add_context(format!("failed to load {}", hybrid_path.display()))
            })?;
            for line in content.lines() {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let (net_file, wgt) = line.split_once(char::is_whitespace).ok_or_else(|| {
                    CubeErrorKind::Parse
                        .with_error(anyhow::anyhow!("invalid hybrid net line: {}", line))
                })?;
                let wgt: f32 = wgt.trim().parse().map_err(|err| {
                    CubeErrorKind::Parse
                        .with_error(anyhow::anyhow!("bad net weight in {:?}: {}", line, err))
                })?;
                let net = NeuralNet::from_file(data_dir.join(net_file))?;
                if net.out_count() != char_set.class_count() {
                    return Err(CubeErrorKind::ClassifierError.with_error(anyhow::anyhow!(
                        "sub-net output count ({}) and class count ({}) are not equal",
                        net.out_count(),
                        char_set.class_count()
                    )));
                }
                nets.push(net);
                net_wgts.push(wgt);
            }
            let total_in: usize = nets.iter().map(|net| net.in_count()).sum();
            if total_in != feat_extract.feature_count() {
                return Err(CubeErrorKind::ClassifierError.with_error(anyhow::anyhow!(
                    "sub-net input counts ({}) do not cover the feature vector ({})",
                    total_in,
                    feat_extract.feature_count()
                )));
            }
        }

        let folding = FoldingSets::load(data_dir.join(format!("{}.cube.fold", lang)), &char_set);
        Ok(HybridNetClassifier::new(
            char_set,
            nets,
            net_wgts,
            feat_extract,
            folding,
        ))
    }

    fn run_nets(&self, samp: &CharSample) -> Option<Vec<f32>> {
        if self.nets.is_empty() {
            return None;
        }
        let mut net_input = vec![0f32; self.feat_extract.feature_count()];
        if !self.feat_extract.compute(samp, &mut net_input) {
            error!("unable to compute features");
            return None;
        }

        let class_cnt = self.char_set.class_count();
        let mut net_output = vec![0f32; class_cnt];
        let mut input_offset = 0;
        for (net, &wgt) in self.nets.iter().zip(&self.net_wgts) {
            let inputs = &net_input[input_offset..input_offset + net.in_count()];
            let mut net_out = vec![0f32; class_cnt];
            if !net.feed_forward(inputs, &mut net_out) {
                return None;
            }
            for (acc, out) in net_output.iter_mut().zip(&net_out) {
                *acc += out * wgt;
            }
            input_offset += net.in_count();
        }
        self.folding
            .fold(&mut net_output, &self.char_set, self.case_sensitive);
        Some(net_output)
    }
}

impl CharClassifier for HybridNetClassifier {
    fn classify(&self, samp: &CharSample) -> Option<CharAltList> {
        let net_output = self.run_nets(samp)?;
        let class_cnt = self.char_set.class_count();
        let mut alt_list = CharAltList::new(class_cnt, class_cnt);
        for (class_id, &out) in net_output.iter().enumerate().skip(1) {
            alt_list.insert(class_id, prob_to_cost(out as f64));
        }
        alt_list.sort();
        Some(alt_list)
    }

    fn char_cost(&self, samp: &CharSample) -> i32 {
        // zero by design when no nets are present
        match self.run_nets(samp) {
            Some(net_output) => prob_to_cost(1.0 - net_output[0] as f64),
            None => 0,
        }
    }

    fn case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    fn set_case_sensitive(&mut self, case_sensitive: bool) {
        self.case_sensitive = case_sensitive;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charset::tests::latin_charset;
    use crate::features::{BmpFeatures, FeatureExtractor};
    use crate::nn::tests::encode_net;

    #[test]
    fn test_ensemble_accumulates() {
        let char_set = Arc::new(latin_charset());
        let class_cnt = char_set.class_count();
        let feat = BmpFeatures::new(4);
        let in_cnt = feat.feature_count();
        // two flat sub-nets over disjoint halves of the feature vector
        let half = in_cnt / 2;
        let net_a = NeuralNet::from_bytes(&encode_net(
            half,
            class_cnt,
            &vec![0f32; class_cnt],
            &vec![vec![0f32; half]; class_cnt],
        ))
        .unwrap();
        let net_b = NeuralNet::from_bytes(&encode_net(
            in_cnt - half,
            class_cnt,
            &vec![0f32; class_cnt],
            &vec![vec![0f32; in_cnt - half]; class_cnt],
        ))
        .unwrap();
        let classifier = HybridNetClassifier::new(
            char_set,
            vec![net_a, net_b],
            vec![0.5, 0.5],
            Box::new(feat),
            FoldingSets::default(),
        );

        let samp = CharSample::new(0, 0, 4, 4);
        let alt_list = classifier.classify(&samp).unwrap();
        assert_eq!(alt_list.alt_count(), class_cnt - 1);
        // each net contributes sigmoid(0) * 0.5
        let expected = prob_to_cost(0.5);
        assert!(alt_list.alts().iter().all(|alt| alt.cost == expected));
    }

    #[test]
    fn test_no_nets() {
        let char_set = Arc::new(latin_charset());
        let classifier = HybridNetClassifier::new(
            char_set,
            Vec::new(),
            Vec::new(),
            Box::new(BmpFeatures::new(4)),
            FoldingSets::default(),
        );
        let samp = CharSample::new(0, 0, 4, 4);
        assert!(classifier.classify(&samp).is_none());
        assert_eq!(classifier.char_cost(&samp), 0);
    }
}
