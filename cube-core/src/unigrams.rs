use std::path::Path;

use crate::charset::CharSet;
use crate::cost::prob_to_cost;
use crate::error::CubeErrorKind;
use crate::langmod::LangModel;
use crate::CubeResult;

/// Words shorter than this do not qualify for the case-invariant cost.
const MIN_LENGTH_CASE_INVARIANT: usize = 4;

/// The unigram costs of the most frequent words of a language, loaded from
/// the `.cube.word-freq` file. The list is sorted lexicographically so a
/// token lookup is a binary search.
#[derive(Debug, Clone)]
pub struct WordUnigrams {
    words: Vec<String>,
    costs: Vec<i32>,
    not_in_list_cost: i32,
}

impl WordUnigrams {
    /// Parses the word-frequency file: a leading word count token, then one
    /// `<utf8> <cost>` pair per word, sorted by word.
    pub fn parse(content: &str) -> CubeResult<WordUnigrams> {
        let mut tokens = content.split_whitespace();
        let word_cnt: usize = tokens
            .next()
            .ok_or_else(|| {
                CubeErrorKind::Content.with_error(anyhow::anyhow!("missing word count"))
            })?
            .parse()
            .map_err(|err| {
                CubeErrorKind::Parse.with_error(anyhow::anyhow!("bad word count: {}", err))
            })?;

        let mut words: Vec<String> = Vec::with_capacity(word_cnt);
        let mut costs = Vec::with_capacity(word_cnt);
        let mut worst_cost = 0;
        for _ in 0..word_cnt {
            let word = tokens.next().ok_or_else(|| {
                CubeErrorKind::Content.with_error(anyhow::anyhow!("truncated word list"))
            })?;
            let cost: i32 = tokens
                .next()
                .ok_or_else(|| {
                    CubeErrorKind::Content.with_error(anyhow::anyhow!("truncated word list"))
                })?
                .parse()
                .map_err(|err| {
                    CubeErrorKind::Parse
                        .with_error(anyhow::anyhow!("bad cost for {:?}: {}", word, err))
                })?;
            if let Some(last) = words.last() {
                if last.as_str() >= word {
                    return Err(CubeErrorKind::Content
                        .with_error(anyhow::anyhow!("word list not sorted at {:?}", word)));
                }
            }
            worst_cost = worst_cost.max(cost);
            words.push(word.to_string());
            costs.push(cost);
        }

        Ok(WordUnigrams {
            words,
            costs,
            // unlisted words cost half as much again as the rarest listed one
            not_in_list_cost: worst_cost + prob_to_cost(0.5),
        })
    }

    pub fn load<P: AsRef<Path>>(path: P) -> CubeResult<WordUnigrams> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|err| {
            CubeErrorKind::Io
                .with_error(anyhow::anyhow!(err))
                .add_context(format!("failed to load {}", path.as_ref().display()))
        })?;
        Self::parse(&content)
    }

    pub fn word_count(&self) -> usize {
        self.words.len()
    }

    pub fn not_in_list_cost(&self) -> i32 {
        self.not_in_list_cost
    }

    pub fn words(&self) -> impl Iterator<Item = &str> {
        self.words.iter().map(|word| word.as_str())
    }

    /// Unigram cost of a string: tokens are split on spaces, each is
    /// stripped of one trailing punctuation code point, looked up, and for
    /// case-invariant tokens of at least 4 characters the all-lower and
    /// all-upper forms are also tried with the cheapest winning. The token
    /// costs are summed.
    pub fn cost(&self, word: &[char], lang_mod: &dyn LangModel, char_set: &CharSet) -> i32 {
        let mut cost = 0;
        for token in word.split(|&ch| ch == ' ') {
            if token.is_empty() {
                continue;
            }
            let mut token = token;
            if let Some(&last) = token.last() {
                if token.len() > 1 && lang_mod.is_trailing_punc(last) {
                    token = &token[..token.len() - 1];
                }
            }
            let mut token_cost = self.token_cost(token);
            if token.len() >= MIN_LENGTH_CASE_INVARIANT && char_set.is_case_invariant(token) {
                if let Some(lower) = char_set.to_lower(token) {
                    token_cost = token_cost.min(self.token_cost(&lower));
                }
                if let Some(upper) = char_set.to_upper(token) {
                    token_cost = token_cost.min(self.token_cost(&upper));
                }
            }
            cost += token_cost;
        }
        cost
    }

    fn token_cost(&self, token: &[char]) -> i32 {
        let token: String = token.iter().collect();
        match self.words.binary_search(&token) {
            Ok(idx) => self.costs[idx],
            Err(_) => self.not_in_list_cost,
        }
    }
}
