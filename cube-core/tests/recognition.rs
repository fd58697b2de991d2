use std::collections::HashMap;
use std::sync::Arc;

use cube_core::altlist::CharAltList;
use cube_core::charset::CharSet;
use cube_core::classifier::CharClassifier;
use cube_core::context::RecoContext;
use cube_core::cost::{prob_to_cost, WORST_COST};
use cube_core::cube_object::CubeObject;
use cube_core::dawg::WordDawg;
use cube_core::langmod::{LangModel, SystemLangModel};
use cube_core::sample::CharSample;
use cube_core::tuning::TuningParams;

const LM_PARAMS: &str = "LeadPunc=-\nTrailPunc=.-\nNumLeadPunc=-\nNumTrailPunc=.\n\
                         Operators=-\nDigits=012\nAlphas=abcde\n";

/// Space, a-e lower, A-E upper, digits 0-2, period and hyphen.
fn test_charset() -> CharSet {
    let mut lines = vec!["16".to_string(), "NULL 0 0,0,0,0 NULL 0".to_string()];
    for (idx, ch) in "abcde".chars().enumerate() {
        lines.push(format!("{} 3 0,0,0,0 Latin {}", ch, idx + 6));
    }
    for (idx, ch) in "ABCDE".chars().enumerate() {
        lines.push(format!("{} 5 0,0,0,0 Latin {}", ch, idx + 1));
    }
    for ch in "012".chars() {
        lines.push(format!("{} 8 0,0,0,0 Common 0", ch));
    }
    lines.push(". 10 0,0,0,0 Common 0".to_string());
    lines.push("- 10 0,0,0,0 Common 0".to_string());
    CharSet::parse(&lines.join("\n")).unwrap()
}

/// A deterministic stand-in for the neural-net classifier: a bar of a known
/// width is one specific character, everything else is a long shot.
struct BarWidthClassifier {
    char_set: Arc<CharSet>,
    class_of_width: HashMap<usize, usize>,
}

impl BarWidthClassifier {
    fn new(char_set: Arc<CharSet>, widths: &[(usize, char)]) -> Self {
        let class_of_width = widths
            .iter()
            .map(|&(width, ch)| (width, char_set.class_id_char(ch).unwrap()))
            .collect();
        BarWidthClassifier {
            char_set,
            class_of_width,
        }
    }
}

impl CharClassifier for BarWidthClassifier {
    fn classify(&self, samp: &CharSample) -> Option<CharAltList> {
        let class_cnt = self.char_set.class_count();
        let matched = self.class_of_width.get(&samp.width()).copied();
        let mut alt_list = CharAltList::new(class_cnt, class_cnt);
        for class_id in 1..class_cnt {
            let cost = if matched == Some(class_id) {
                0
            } else {
                prob_to_cost(0.001)
            };
            alt_list.insert(class_id, cost);
        }
        alt_list.sort();
        Some(alt_list)
    }

    fn char_cost(&self, _samp: &CharSample) -> i32 {
        0
    }

    fn case_sensitive(&self) -> bool {
        true
    }

    fn set_case_sensitive(&mut self, _case_sensitive: bool) {}
}

/// Draws solid vertical bars of the given widths, separated by `gaps`
/// blank columns (`gaps[i]` follows `widths[i]`).
fn bars_sample(widths: &[usize], gaps: &[usize], hgt: usize) -> CharSample {
    let wid: usize = widths.iter().sum::<usize>() + gaps.iter().sum::<usize>();
    let mut samp = CharSample::new(0, 0, wid, hgt);
    let mut x0 = 0;
    for (idx, &bar_wid) in widths.iter().enumerate() {
        for y in 0..hgt {
            for x in x0..x0 + bar_wid {
                samp.bitmap_mut().set(x, y, 0);
            }
        }
        x0 += bar_wid + gaps.get(idx).copied().unwrap_or(0);
    }
    samp
}

fn digit_context() -> RecoContext {
    let char_set = Arc::new(test_charset());
    let params = TuningParams {
        num_wgt: 0.0,
        ..TuningParams::default()
    };
    let mut lang_mod =
        SystemLangModel::new(char_set.clone(), LM_PARAMS, Vec::new(), &params, true).unwrap();
    lang_mod.set_ood(false);
    lang_mod.set_word_list(false);
    lang_mod.set_punc(false);
    let classifier = BarWidthClassifier::new(char_set.clone(), &[(3, '0'), (5, '1'), (7, '2')]);
    RecoContext::new("eng", char_set, Box::new(lang_mod), params)
        .with_classifier(Box::new(classifier))
}

fn word_context(words: &[&str]) -> RecoContext {
    let char_set = Arc::new(test_charset());
    let params = TuningParams::default();
    let dawg = WordDawg::from_words(words).unwrap();
    let mut lang_mod =
        SystemLangModel::new(char_set.clone(), LM_PARAMS, vec![dawg], &params, true).unwrap();
    lang_mod.set_ood(false);
    lang_mod.set_numeric(false);
    let classifier = BarWidthClassifier::new(
        char_set.clone(),
        &[(3, 'c'), (5, 'a'), (7, 'b'), (9, 'd')],
    );
    RecoContext::new("eng", char_set, Box::new(lang_mod), params)
        .with_classifier(Box::new(classifier))
}

#[test]
fn test_noise_free_digit_word() {
    let cntxt = digit_context();
    // three well-separated digit shapes
    let samp = bars_sample(&[3, 5, 7], &[5, 5], 10);
    let mut cube_obj = CubeObject::new(&cntxt, samp);
    let alt_list = cube_obj.recognize_word(None).unwrap();

    assert!(alt_list.alt_count() >= 1);
    assert_eq!(alt_list.alt(0).word, "012");
    assert!(alt_list.alt(0).cost < prob_to_cost(0.01));
}

#[test]
fn test_in_dictionary_word() {
    let cntxt = word_context(&["cab", "bad"]);
    let samp = bars_sample(&[3, 5, 7], &[5, 5], 10);
    let mut cube_obj = CubeObject::new(&cntxt, samp);
    let alt_list = cube_obj.recognize_word(None).unwrap();

    assert_eq!(alt_list.alt(0).word, "cab");
    // the visually mismatched capitalized variant costs strictly more
    let cap = alt_list.alts().iter().find(|alt| alt.word == "Cab");
    if let Some(cap) = cap {
        assert!(alt_list.alt(0).cost < cap.cost);
    }
}

#[test]
fn test_phrase_mode_splits_on_wide_gap() {
    let cntxt = word_context(&["cab", "bad"]);
    // "cab" and "bad" with narrow intra-word gaps and a wide gap between
    let samp = bars_sample(&[3, 5, 7, 7, 5, 9], &[1, 1, 10, 1, 1], 10);
    let mut cube_obj = CubeObject::new(&cntxt, samp);
    let alt_list = cube_obj.recognize_phrase(None).unwrap();

    assert!(alt_list.alt_count() >= 1);
    assert_eq!(alt_list.alt(0).word, "cab bad");
    assert_eq!(
        alt_list.alt(0).word.matches(' ').count(),
        1,
        "exactly one space"
    );
}

#[test]
fn test_word_mode_never_splits() {
    let cntxt = word_context(&["cab", "bad"]);
    let samp = bars_sample(&[3, 5, 7, 7, 5, 9], &[1, 1, 10, 1, 1], 10);
    let mut cube_obj = CubeObject::new(&cntxt, samp);
    let alt_list = cube_obj.recognize_word(None).unwrap();
    assert!(alt_list.alts().iter().all(|alt| !alt.word.contains(' ')));
}

#[test]
fn test_word_cost_oracle() {
    let cntxt = word_context(&["cab", "bad"]);
    let samp = bars_sample(&[3, 5, 7], &[5, 5], 10);

    let matching = CubeObject::new(&cntxt, samp.clone()).word_cost("cab");
    let gibberish = CubeObject::new(&cntxt, samp.clone()).word_cost("ecb");
    let unsupported = CubeObject::new(&cntxt, samp).word_cost("zzz");

    assert!(matching < gibberish);
    assert_eq!(unsupported, WORST_COST);
}

#[test]
fn test_recognition_is_deterministic() {
    let cntxt = word_context(&["cab", "bad"]);
    let samp = bars_sample(&[3, 5, 7], &[5, 5], 10);
    let mut cube_obj = CubeObject::new(&cntxt, samp);

    let first: Vec<(String, i32)> = cube_obj
        .recognize_word(None)
        .unwrap()
        .alts()
        .iter()
        .map(|alt| (alt.word.clone(), alt.cost))
        .collect();
    let second: Vec<(String, i32)> = cube_obj
        .recognize_word(None)
        .unwrap()
        .alts()
        .iter()
        .map(|alt| (alt.word.clone(), alt.cost))
        .collect();
    assert_eq!(first, second);
    assert!(!first.is_empty());
}

#[test]
fn test_alt_list_strings_unique() {
    let cntxt = word_context(&["cab", "bad"]);
    let samp = bars_sample(&[3, 5, 7], &[5, 5], 10);
    let mut cube_obj = CubeObject::new(&cntxt, samp);
    let alt_list = cube_obj.recognize_word(None).unwrap();

    let mut words: Vec<&str> = alt_list.alts().iter().map(|alt| alt.word.as_str()).collect();
    let before = words.len();
    words.sort();
    words.dedup();
    assert_eq!(before, words.len());
}

#[test]
fn test_backtracking_matches_alt_string() {
    let cntxt = word_context(&["cab", "bad"]);
    let samp = bars_sample(&[3, 5, 7], &[5, 5], 10);
    let mut cube_obj = CubeObject::new(&cntxt, samp);

    let (best_word, best_node) = {
        let alt_list = cube_obj.recognize_word(None).unwrap();
        let best = alt_list.alt(0);
        (best.word.clone(), best.node.unwrap())
    };
    let (samples, path_str) = cube_obj.backtrack(best_node).unwrap();
    assert_eq!(path_str, best_word);
    assert_eq!(samples.len(), 3);
    // boxes come back in reading order with the edge strings as labels
    assert!(samples.windows(2).all(|pair| pair[0].left() < pair[1].left()));
    let labels: String = samples.iter().filter_map(|samp| samp.label()).collect();
    assert_eq!(labels, "cab");
}

#[test]
fn test_oversegmented_word_rejected() {
    let cntxt = digit_context();
    let widths = vec![1usize; 130];
    let gaps = vec![1usize; 129];
    let samp = bars_sample(&widths, &gaps, 10);
    let mut cube_obj = CubeObject::new(&cntxt, samp);
    let alt_list = cube_obj.recognize_word(None).unwrap();
    assert_eq!(alt_list.alt_count(), 0);
}

#[test]
fn test_all_null_classification_empty() {
    // a dawg-less, numeric-less, ood-less model accepts nothing
    let char_set = Arc::new(test_charset());
    let params = TuningParams::default();
    let mut lang_mod =
        SystemLangModel::new(char_set.clone(), LM_PARAMS, Vec::new(), &params, true).unwrap();
    lang_mod.set_ood(false);
    lang_mod.set_numeric(false);
    lang_mod.set_word_list(false);
    lang_mod.set_punc(false);
    let cntxt = RecoContext::new("eng", char_set, Box::new(lang_mod), params);

    let samp = bars_sample(&[3, 5], &[5], 10);
    let mut cube_obj = CubeObject::new(&cntxt, samp);
    let alt_list = cube_obj.recognize_word(None).unwrap();
    assert_eq!(alt_list.alt_count(), 0);
}
