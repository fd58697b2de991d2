use std::path::Path;
use std::sync::Arc;

use log::warn;

use crate::bigrams::CharBigrams;
use crate::charset::CharSet;
use crate::classifier::{create_classifier, CharClassifier};
use crate::dawg::WordDawg;
use crate::error::CubeErrorKind;
use crate::langmod::{LangModel, SystemLangModel};
use crate::size_model::WordSizeModel;
use crate::tuning::TuningParams;
use crate::unigrams::WordUnigrams;
use crate::CubeResult;

/// Reading direction of a script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOrder {
    LeftToRight,
    RightToLeft,
}

impl ReadOrder {
    pub fn is_right_to_left(self) -> bool {
        self == ReadOrder::RightToLeft
    }
}

/// The immutable bundle of everything recognition needs for one language:
/// character set, language model, linguistic cost tables, size model,
/// tuning parameters and the classifier. Built once per language and shared
/// read-only across concurrent recognitions.
impl std::fmt::Debug for RecoContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecoContext").field("lang", &self.lang).finish()
    }
}

pub struct RecoContext {
    lang: String,
    char_set: Arc<CharSet>,
    lang_mod: Box<dyn LangModel>,
    char_bigrams: Option<CharBigrams>,
    word_unigrams: Option<WordUnigrams>,
    word_size_model: Option<WordSizeModel>,
    params: TuningParams,
    char_classifier: Option<Box<dyn CharClassifier>>,
    size_normalization: bool,
    noisy_input: bool,
}

impl RecoContext {
    /// Assembles a context from pre-built parts. Optional components start
    /// absent; the `with_*` builders attach them.
    pub fn new(
        lang: &str,
        char_set: Arc<CharSet>,
        lang_mod: Box<dyn LangModel>,
        params: TuningParams,
    ) -> RecoContext {
        RecoContext {
            lang: lang.to_string(),
            char_set,
            lang_mod,
            char_bigrams: None,
            word_unigrams: None,
            word_size_model: None,
            params,
            char_classifier: None,
            size_normalization: false,
            noisy_input: false,
        }
    }

    pub fn with_bigrams(mut self, char_bigrams: CharBigrams) -> Self {
        self.char_bigrams = Some(char_bigrams);
        self
    }

    pub fn with_unigrams(mut self, word_unigrams: WordUnigrams) -> Self {
        self.word_unigrams = Some(word_unigrams);
        self
    }

    pub fn with_size_model(mut self, word_size_model: WordSizeModel) -> Self {
        self.word_size_model = Some(word_size_model);
        self
    }

    pub fn with_classifier(mut self, char_classifier: Box<dyn CharClassifier>) -> Self {
        self.char_classifier = Some(char_classifier);
        self
    }

    /// Loads all components of a language from its data directory. The
    /// loading order is fixed: character set, language-model character sets
    /// (compiling the word dawg from the word-frequency list), char
    /// bigrams, word unigrams, size model, tuning parameters, classifier.
    /// Optional files may be absent; a present-but-broken optional file is
    /// skipped with a warning, while required files abort the load.
    pub fn load(data_dir: &Path, lang: &str) -> CubeResult<RecoContext> {
        let read_required = |file_name: String| -> CubeResult<String> {
            let path = data_dir.join(&file_name);
            std::fs::read_to_string(&path).map_err(|err| {
                CubeErrorKind::DataNotFound
                    .with_error(anyhow::anyhow!(err))
                    .add_context(format!("failed to load {}", path.display()))
            })
        };

        // character set
        let charset_content = read_required(format!("{}.unicharset", lang))?;
        let char_set = Arc::new(CharSet::parse(&charset_content).map_err(|err| {
            err.add_context(format!("loading {}.unicharset", lang))
        })?);

        // language model elements and the word dawg
        let lm_content = read_required(format!("{}.cube.lm", lang))?;
        let word_freq_path = data_dir.join(format!("{}.cube.word-freq", lang));
        let word_dawgs = if word_freq_path.exists() {
            let word_unigrams = WordUnigrams::load(&word_freq_path)?;
            vec![WordDawg::from_words(word_unigrams.words())?]
        } else {
            Vec::new()
        };
        let mut lang_mod = SystemLangModel::new(
            char_set.clone(),
            &lm_content,
            word_dawgs,
            &TuningParams::default(),
            has_case(lang),
        )?;

        // optional linguistic models
        let bigrams_path = data_dir.join(format!("{}.cube.bigrams", lang));
        let char_bigrams = if bigrams_path.exists() {
            match CharBigrams::load(&bigrams_path) {
                Ok(char_bigrams) => Some(char_bigrams),
                Err(err) => {
                    warn!("skipping unreadable char bigrams: {}", err);
                    None
                }
            }
        } else {
            None
        };

        let word_unigrams = if word_freq_path.exists() {
            match WordUnigrams::load(&word_freq_path) {
                Ok(word_unigrams) => Some(word_unigrams),
                Err(err) => {
                    warn!("skipping unreadable word unigrams: {}", err);
                    None
                }
            }
        } else {
            None
        };

        let size_path = data_dir.join(format!("{}.cube.size", lang));
        let word_size_model = if size_path.exists() {
            match WordSizeModel::load(&size_path, char_set.class_count(), contextual(lang)) {
                Ok(word_size_model) => Some(word_size_model),
                Err(err) => {
                    warn!("skipping unreadable size model: {}", err);
                    None
                }
            }
        } else {
            None
        };

        // tuning parameters, then re-weight the language-model signals
        let params = TuningParams::load(data_dir.join(format!("{}.cube.params", lang)))?;
        lang_mod.set_signal_weights(&params);

        // classifier (net files optional)
        let char_classifier = create_classifier(data_dir, lang, &params, &char_set)?;

        let mut cntxt = RecoContext::new(lang, char_set, Box::new(lang_mod), params);
        cntxt.char_bigrams = char_bigrams;
        cntxt.word_unigrams = word_unigrams;
        cntxt.word_size_model = word_size_model;
        cntxt.char_classifier = Some(char_classifier);
        Ok(cntxt)
    }

    pub fn lang(&self) -> &str {
        &self.lang
    }

    pub fn char_set(&self) -> &CharSet {
        &self.char_set
    }

    pub fn char_set_arc(&self) -> &Arc<CharSet> {
        &self.char_set
    }

    pub fn lang_mod(&self) -> &dyn LangModel {
        self.lang_mod.as_ref()
    }

    pub fn lang_mod_mut(&mut self) -> &mut dyn LangModel {
        self.lang_mod.as_mut()
    }

    pub fn bigrams(&self) -> Option<&CharBigrams> {
        self.char_bigrams.as_ref()
    }

    pub fn unigrams(&self) -> Option<&WordUnigrams> {
        self.word_unigrams.as_ref()
    }

    pub fn size_model(&self) -> Option<&WordSizeModel> {
        self.word_size_model.as_ref()
    }

    pub fn params(&self) -> &TuningParams {
        &self.params
    }

    pub fn classifier(&self) -> Option<&dyn CharClassifier> {
        self.char_classifier.as_deref()
    }

    pub fn classifier_mut(&mut self) -> Option<&mut dyn CharClassifier> {
        match self.char_classifier.as_mut() {
            Some(char_classifier) => Some(char_classifier.as_mut()),
            None => None,
        }
    }

    pub fn reading_order(&self) -> ReadOrder {
        if self.lang == "ara" {
            ReadOrder::RightToLeft
        } else {
            ReadOrder::LeftToRight
        }
    }

    pub fn has_case(&self) -> bool {
        has_case(&self.lang)
    }

    pub fn cursive(&self) -> bool {
        self.lang == "ara"
    }

    pub fn has_italics(&self) -> bool {
        self.lang != "ara" && self.lang != "hin" && self.lang != "uk"
    }

    /// Whether size codes carry start/end-of-word position flags.
    pub fn contextual(&self) -> bool {
        contextual(&self.lang)
    }

    pub fn size_normalization(&self) -> bool {
        self.size_normalization
    }

    pub fn noisy_input(&self) -> bool {
        self.noisy_input
    }

    pub fn set_size_normalization(&mut self, size_normalization: bool) {
        self.size_normalization = size_normalization;
    }

    pub fn set_noisy_input(&mut self, noisy_input: bool) {
        self.noisy_input = noisy_input;
    }
}

fn has_case(lang: &str) -> bool {
    lang != "ara" && lang != "hin"
}

fn contextual(lang: &str) -> bool {
    lang == "ara"
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::charset::tests::latin_charset;
    use crate::langmod::tests::{bare_lang_model, dawg_lang_model};

    /// A context over the test charset with no classifier and no word dawg:
    /// recognition falls back to the flat distribution.
    pub(crate) fn bare_context() -> RecoContext {
        let char_set = Arc::new(latin_charset());
        let lang_mod = Box::new(bare_lang_model(&char_set));
        RecoContext::new("eng", char_set, lang_mod, TuningParams::default())
    }

    /// A context whose language model holds a word dawg over `words`.
    pub(crate) fn dawg_context(words: &[&str]) -> RecoContext {
        let char_set = Arc::new(latin_charset());
        let lang_mod = Box::new(dawg_lang_model(&char_set, words));
        RecoContext::new("eng", char_set, lang_mod, TuningParams::default())
    }

    #[test]
    fn test_language_traits() {
        let cntxt = bare_context();
        assert_eq!(cntxt.reading_order(), ReadOrder::LeftToRight);
        assert!(cntxt.has_case());
        assert!(!cntxt.cursive());
        assert!(cntxt.has_italics());
        assert!(!cntxt.contextual());
    }

    #[test]
    fn test_load_missing_dir() {
        let err = RecoContext::load(Path::new("/nonexistent"), "eng").unwrap_err();
        assert_eq!(err.kind(), CubeErrorKind::DataNotFound);
    }

    #[test]
    fn test_toggles() {
        let mut cntxt = bare_context();
        assert!(cntxt.lang_mod().ood_enabled());
        cntxt.lang_mod_mut().set_ood(false);
        assert!(!cntxt.lang_mod().ood_enabled());
        cntxt.set_noisy_input(true);
        assert!(cntxt.noisy_input());
    }
}
