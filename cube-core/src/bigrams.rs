use std::collections::HashMap;
use std::path::Path;

use crate::charset::CharSet;
use crate::cost::PROB2COST_SCALE;
use crate::error::CubeErrorKind;
use crate::CubeResult;

/// Words shorter than this do not qualify for the case-invariant cost.
const MIN_LENGTH_CASE_INVARIANT: usize = 4;

#[derive(Debug, Clone, Copy, Default)]
struct Bigram {
    cost: i32,
}

/// Character-bigram cost table, loaded from the `.cube.bigrams` file. Costs
/// are scaled negative log probabilities computed from the counts at load
/// time; unseen pairs cost `worst_cost`.
#[derive(Debug, Clone)]
pub struct CharBigrams {
    table: HashMap<char, HashMap<char, Bigram>>,
    total_cnt: i64,
    worst_cost: i32,
}

impl CharBigrams {
    /// Parses the bigram file: one `<count> <hex_cp1> <hex_cp2>` per line.
    pub fn parse(content: &str) -> CubeResult<CharBigrams> {
        let mut counts: HashMap<char, HashMap<char, i64>> = HashMap::new();
        let mut total_cnt: i64 = 0;
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() != 3 {
                return Err(CubeErrorKind::Parse
                    .with_error(anyhow::anyhow!("invalid format reading line: {}", line)));
            }
            let cnt: i64 = fields[0].parse().map_err(|err| {
                CubeErrorKind::Parse.with_error(anyhow::anyhow!("bad count in {:?}: {}", line, err))
            })?;
            let ch1 = parse_hex_codepoint(fields[1])?;
            let ch2 = parse_hex_codepoint(fields[2])?;
            *counts.entry(ch1).or_default().entry(ch2).or_default() += cnt;
            total_cnt += cnt;
        }
        if total_cnt <= 0 {
            return Err(
                CubeErrorKind::Content.with_error(anyhow::anyhow!("empty char bigram table"))
            );
        }

        let worst_cost = (-PROB2COST_SCALE * (0.5 / total_cnt as f64).ln()) as i32;
        let mut table: HashMap<char, HashMap<char, Bigram>> = HashMap::new();
        for (ch1, inner) in counts {
            let entry = table.entry(ch1).or_default();
            for (ch2, cnt) in inner {
                let cost =
                    (-PROB2COST_SCALE * ((cnt as f64).max(0.5) / total_cnt as f64).ln()) as i32;
                entry.insert(ch2, Bigram { cost });
            }
        }
        Ok(CharBigrams {
            table,
            total_cnt,
            worst_cost,
        })
    }

    pub fn load<P: AsRef<Path>>(path: P) -> CubeResult<CharBigrams> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|err| {
            CubeErrorKind::Io
                .with_error(anyhow::anyhow!(err))
                .add_context(format!("failed to load {}", path.as_ref().display()))
        })?;
        Self::parse(&content)
    }

    pub fn total_count(&self) -> i64 {
        self.total_cnt
    }

    pub fn worst_cost(&self) -> i32 {
        self.worst_cost
    }

    /// Cost of the pair, or `worst_cost` for unseen pairs.
    pub fn pair_cost(&self, ch1: char, ch2: char) -> i32 {
        self.table
            .get(&ch1)
            .and_then(|inner| inner.get(&ch2))
            .map(|bigram| bigram.cost)
            .unwrap_or(self.worst_cost)
    }

    /// Mean bigram cost of a word padded with surrounding spaces. For
    /// case-invariant words of at least 4 characters the all-lower and
    /// all-upper renderings are also tried and the cheapest wins, so that a
    /// cased variant missing from the training counts is not penalized.
    pub fn cost(&self, word: &[char], char_set: &CharSet) -> i32 {
        if word.is_empty() {
            return self.worst_cost;
        }
        let mut cost = self.mean_cost_with_spaces(word);
        if word.len() >= MIN_LENGTH_CASE_INVARIANT && char_set.is_case_invariant(word) {
            if let Some(lower) = char_set.to_lower(word) {
                if !lower.is_empty() {
                    cost = cost.min(self.mean_cost_with_spaces(&lower));
                }
            }
            if let Some(upper) = char_set.to_upper(word) {
                if !upper.is_empty() {
                    cost = cost.min(self.mean_cost_with_spaces(&upper));
                }
            }
        }
        cost
    }

    fn mean_cost_with_spaces(&self, word: &[char]) -> i32 {
        let mut cost = self.pair_cost(' ', word[0]);
        for pair in word.windows(2) {
            cost += self.pair_cost(pair[0], pair[1]);
        }
        cost += self.pair_cost(word[word.len() - 1], ' ');
        (cost as f64 / (word.len() + 1) as f64) as i32
    }
}

fn parse_hex_codepoint(tok: &str) -> CubeResult<char> {
    let code = u32::from_str_radix(tok, 16)
        .map_err(|err| CubeErrorKind::Parse.with_error(anyhow::anyhow!(err)))?;
    char::from_u32(code).ok_or_else(|| {
        CubeErrorKind::Parse.with_error(anyhow::anyhow!("invalid code point: {:x}", code))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charset::tests::latin_charset;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    // 0x20 space, 0x61 'a', 0x62 'b', 0x41 'A'
    const CONTENT: &str = "40 20 61\n30 61 62\n20 62 20\n10 20 41\n";

    #[test]
    fn test_pair_costs() {
        let bigrams = CharBigrams::parse(CONTENT).unwrap();
        assert_eq!(bigrams.total_count(), 100);
        assert!(bigrams.pair_cost(' ', 'a') < bigrams.pair_cost(' ', 'A'));
        assert_eq!(bigrams.pair_cost('z', 'q'), bigrams.worst_cost());
        assert!(bigrams.pair_cost('a', 'b') < bigrams.worst_cost());
    }

    #[test]
    fn test_word_cost_prefers_frequent_casing() {
        let bigrams = CharBigrams::parse(CONTENT).unwrap();
        let charset = latin_charset();
        // "Abab" is case invariant (capitalized), so the cheaper "abab"
        // rendering must bound its cost
        let capitalized = bigrams.cost(&chars("Abab"), &charset);
        let lower = bigrams.cost(&chars("abab"), &charset);
        assert_eq!(capitalized, lower);
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(CharBigrams::parse("12 zz 61").is_err());
        assert!(CharBigrams::parse("nonsense").is_err());
        assert!(CharBigrams::parse("").is_err());
    }

    #[test]
    fn test_empty_word() {
        let bigrams = CharBigrams::parse(CONTENT).unwrap();
        let charset = latin_charset();
        assert_eq!(bigrams.cost(&[], &charset), bigrams.worst_cost());
    }
}
