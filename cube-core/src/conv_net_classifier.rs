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

/// Single feed-forward-net character classifier. The net's outputs are one
/// activation per character class; output 0 (the space class) doubles as the
/// "genuine character" detector used by `char_cost`.
pub struct ConvNetClassifier {
    char_set: Arc<CharSet>,
    char_net: Option<NeuralNet>,
    feat_extract: Box<dyn FeatureExtractor>,
    folding: FoldingSets,
    case_sensitive: bool,
}

impl ConvNetClassifier {
    pub fn new(
        char_set: Arc<CharSet>,
        char_net: Option<NeuralNet>,
        feat_extract: Box<dyn FeatureExtractor>,
        folding: FoldingSets,
    ) -> Self {
        ConvNetClassifier {
            char_set,
            char_net,
            feat_extract,
            folding,
            case_sensitive: true,
        }
    }

    /// Loads the classifier for a language. The `.cube.nn` net and the
    /// `.cube.fold` folding sets are both optional files, but a present net
    /// must pass the sanity checks.
    pub fn load(
        data_dir: &Path,
        lang: &str,
        char_set: Arc<CharSet>,
        feat_extract: Box<dyn FeatureExtractor>,
    ) -> CubeResult<ConvNetClassifier> {
        let net_path = data_dir.join(format!("{}.cube.nn", lang));
        let char_net = if net_path.exists() {
            let net = NeuralNet::from_file(&net_path)?;
            if net.in_count() != feat_extract.feature_count() {
                return Err(CubeErrorKind::ClassifierError.with_error(anyhow::anyhow!(
                    "net input count ({}) does not match feature count ({})",
                    net.in_count(),
                    feat_extract.feature_count()
                )));
            }
            if net.out_count() != char_set.class_count() {
                return Err(CubeErrorKind::ClassifierError.with_error(anyhow::anyhow!(
                    "net output count ({}) and class count ({}) are not equal",
                    net.out_count(),
                    char_set.class_count()
                )));
            }
            Some(net)
        } else {
            None
        };

        let folding = FoldingSets::load(data_dir.join(format!("{}.cube.fold", lang)), &char_set);
        Ok(ConvNetClassifier::new(
            char_set,
            char_net,
            feat_extract,
            folding,
        ))
    }

    fn run_nets(&self, samp: &CharSample) -> Option<Vec<f32>> {
        let net = self.char_net.as_ref()?;
        let mut net_input = vec![0f32; net.in_count()];
        if !self.feat_extract.compute(samp, &mut net_input) {
            error!("unable to compute features");
            return None;
        }
        let mut net_output = vec![0f32; net.out_count()];
        if !net.feed_forward(&net_input, &mut net_output) {
            error!("unable to run feed-forward");
            return None;
        }
        self.folding
            .fold(&mut net_output, &self.char_set, self.case_sensitive);
        Some(net_output)
    }
}

impl CharClassifier for ConvNetClassifier {
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
