use std::path::Path;

use log::warn;

use crate::altlist::CharAltList;
use crate::charset::CharSet;
use crate::conv_net_classifier::ConvNetClassifier;
use crate::features::{BmpFeatures, ChebyshevFeatures, FeatureExtractor, HybridFeatures};
use crate::hybrid_classifier::HybridNetClassifier;
use crate::sample::CharSample;
use crate::tuning::{ClassifierKind, FeatureKind, TuningParams};
use crate::CubeResult;

/// Activations of a folding set are raised to at least this fraction of the
/// set's maximum.
const FOLDING_RATIO: f32 = 0.75;

/// A character/grapheme classifier. Produces a full ranked alternates list
/// over the supported classes, and a scalar cost for "this is a genuine
/// single character".
pub trait CharClassifier: Send + Sync {
    /// Classifies a sample. `None` means the classifier could not produce a
    /// distribution (no nets loaded, degenerate sample); callers fall back
    /// or skip.
    fn classify(&self, samp: &CharSample) -> Option<CharAltList>;

    /// Cost of the sample being a genuine single character.
    fn char_cost(&self, samp: &CharSample) -> i32;

    fn case_sensitive(&self) -> bool;

    fn set_case_sensitive(&mut self, case_sensitive: bool);
}

/// Groups of mutually confusable classes loaded from the `.cube.fold` file,
/// plus the implicit case folding applied in case-insensitive mode.
#[derive(Debug, Clone, Default)]
pub struct FoldingSets {
    sets: Vec<Vec<usize>>,
}

impl FoldingSets {
    /// Parses folding sets: one UTF-8 set per line, no separators between
    /// members. Characters outside the charset invalidate; a set left with
    /// fewer than two members is skipped with a warning.
    pub fn parse(content: &str, char_set: &CharSet) -> FoldingSets {
        let mut sets = Vec::new();
        for (idx, line) in content.lines().enumerate() {
            let members: Vec<usize> = line
                .trim()
                .chars()
                .filter_map(|ch| char_set.class_id_char(ch))
                .collect();
            if members.len() <= 1 {
                warn!("invalidating folding set {}", idx);
                continue;
            }
            sets.push(members);
        }
        FoldingSets { sets }
    }

    /// Loads the optional folding file. A missing file yields no sets.
    pub fn load<P: AsRef<Path>>(path: P, char_set: &CharSet) -> FoldingSets {
        match std::fs::read_to_string(path.as_ref()) {
            Ok(content) => Self::parse(&content, char_set),
            Err(_) => FoldingSets::default(),
        }
    }

    pub fn set_count(&self) -> usize {
        self.sets.len()
    }

    /// Folds raw net activations: in case-insensitive mode both case forms
    /// of a class receive the max of the two activations, then every member
    /// of a folding set is raised to at least `FOLDING_RATIO` of the set's
    /// maximum.
    pub fn fold(&self, outputs: &mut [f32], char_set: &CharSet, case_sensitive: bool) {
        if !case_sensitive {
            for class_id in 0..char_set.class_count().min(outputs.len()) {
                let upper_form: String = match char_set.class_string(class_id) {
                    Some(text) => text.chars().flat_map(|ch| ch.to_uppercase()).collect(),
                    None => continue,
                };
                if let Some(upper_class_id) = char_set.class_id(&upper_form) {
                    if upper_class_id != class_id && upper_class_id < outputs.len() {
                        let max_out = outputs[class_id].max(outputs[upper_class_id]);
                        outputs[class_id] = max_out;
                        outputs[upper_class_id] = max_out;
                    }
                }
            }
        }

        for set in &self.sets {
            let mut max_prob = f32::MIN;
            for &class_id in set {
                if class_id < outputs.len() {
                    max_prob = max_prob.max(outputs[class_id]);
                }
            }
            for &class_id in set {
                if class_id < outputs.len() {
                    outputs[class_id] = outputs[class_id].max(max_prob * FOLDING_RATIO);
                }
            }
        }
    }
}

/// Builds the feature extractor selected by the tuning parameters.
pub fn create_feature_extractor(params: &TuningParams) -> Box<dyn FeatureExtractor> {
    match params.feature_type {
        FeatureKind::Bmp => Box::new(BmpFeatures::new(params.conv_grid_size as usize)),
        FeatureKind::Chebyshev => Box::new(ChebyshevFeatures::new()),
        FeatureKind::Hybrid => Box::new(HybridFeatures::new(params.conv_grid_size as usize)),
    }
}

/// Builds and initializes the classifier selected by the tuning parameters.
/// Net files are optional; a classifier without nets classifies nothing and
/// callers use the flat fallback distribution.
pub fn create_classifier(
    data_dir: &Path,
    lang: &str,
    params: &TuningParams,
    char_set: &std::sync::Arc<CharSet>,
) -> CubeResult<Box<dyn CharClassifier>> {
    let feat_extract = create_feature_extractor(params);
    match params.classifier {
        ClassifierKind::Nn => {
            let classifier =
                ConvNetClassifier::load(data_dir, lang, char_set.clone(), feat_extract)?;
            Ok(Box::new(classifier))
        }
        ClassifierKind::HybridNn => {
            let classifier =
                HybridNetClassifier::load(data_dir, lang, char_set.clone(), feat_extract)?;
            Ok(Box::new(classifier))
        }
    }
}
