use std::collections::HashMap;

use crate::error::CubeErrorKind;
use crate::CubeResult;

// Property bits of the unicharset flags field.
const IS_ALPHA: u32 = 0x01;
const IS_LOWER: u32 = 0x02;
const IS_UPPER: u32 = 0x04;
const IS_DIGIT: u32 = 0x08;
const IS_PUNCT: u32 = 0x10;

/// One supported character class: a UTF-32 string (usually a single code
/// point, occasionally a ligature), its case/category properties and the
/// class id of its other-case form.
#[derive(Debug, Clone)]
struct CharClass {
    text: String,
    chars: Vec<char>,
    flags: u32,
    other_case: usize,
}

/// The list of strings/characters supported for a language, loaded from the
/// `.unicharset` file. Each string maps to an integer class id used
/// throughout the engine; class id 0 is the space.
#[derive(Debug, Clone, Default)]
pub struct CharSet {
    classes: Vec<CharClass>,
    index: HashMap<String, usize>,
    // map from class id to an embedding system's char ids, when the two differ
    external_map: Option<Vec<usize>>,
}

impl CharSet {
    /// Parses the `.unicharset` text format: a class count line, then one
    /// line per class carrying the UTF-8 string, a hex property-flag field
    /// and optionally metrics, script, and the other-case class id.
    pub fn parse(content: &str) -> CubeResult<CharSet> {
        let mut lines = content.lines();
        let count_line = lines.next().ok_or_else(|| {
            CubeErrorKind::Content.with_error(anyhow::anyhow!("missing class count line"))
        })?;
        let class_cnt: usize = count_line.trim().parse().map_err(|err| {
            CubeErrorKind::Parse
                .with_error(anyhow::anyhow!("invalid class count {:?}: {}", count_line, err))
        })?;
        if class_cnt < 2 {
            return Err(CubeErrorKind::Content
                .with_error(anyhow::anyhow!("invalid class count: {}", class_cnt)));
        }

        let mut charset = CharSet::default();
        for class_id in 0..class_cnt {
            let line = lines.next().ok_or_else(|| {
                CubeErrorKind::Content.with_error(anyhow::anyhow!(
                    "missing class string with class_id={}",
                    class_id
                ))
            })?;
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.is_empty() {
                return Err(CubeErrorKind::Content
                    .with_error(anyhow::anyhow!("empty class line with class_id={}", class_id)));
            }
            // the space class is written as NULL
            let text = if fields[0] == "NULL" { " " } else { fields[0] };
            let flags = fields
                .get(1)
                .and_then(|tok| u32::from_str_radix(tok, 16).ok())
                .unwrap_or(0);
            let other_case = fields
                .get(4)
                .and_then(|tok| tok.parse::<usize>().ok())
                .filter(|&id| id < class_cnt)
                .unwrap_or(class_id);

            charset.index.entry(text.to_string()).or_insert(class_id);
            charset.classes.push(CharClass {
                text: text.to_string(),
                chars: text.chars().collect(),
                flags,
                other_case,
            });
        }
        Ok(charset)
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    /// Returns the class id of a string, or `None` if unsupported.
    pub fn class_id(&self, text: &str) -> Option<usize> {
        self.index.get(text).copied()
    }

    /// Returns the class id of a single character.
    pub fn class_id_char(&self, ch: char) -> Option<usize> {
        let mut buf = [0u8; 4];
        self.class_id(ch.encode_utf8(&mut buf))
    }

    /// Returns the string of a class id.
    pub fn class_string(&self, class_id: usize) -> Option<&str> {
        self.classes.get(class_id).map(|cls| cls.text.as_str())
    }

    pub fn class_chars(&self, class_id: usize) -> Option<&[char]> {
        self.classes.get(class_id).map(|cls| cls.chars.as_slice())
    }

    /// Translates a class id into the embedding system's id space. When the
    /// two unicharsets are shared this is the identity.
    pub fn external_id(&self, class_id: usize) -> usize {
        match &self.external_map {
            Some(map) => map.get(class_id).copied().unwrap_or(class_id),
            None => class_id,
        }
    }

    pub fn set_external_map(&mut self, map: Vec<usize>) {
        self.external_map = Some(map);
    }

    pub fn is_alpha(&self, class_id: usize) -> bool {
        self.flags(class_id) & IS_ALPHA != 0
    }

    pub fn is_lower(&self, class_id: usize) -> bool {
        self.flags(class_id) & IS_LOWER != 0
    }

    pub fn is_upper(&self, class_id: usize) -> bool {
        self.flags(class_id) & IS_UPPER != 0
    }

    pub fn is_digit(&self, class_id: usize) -> bool {
        self.flags(class_id) & IS_DIGIT != 0
    }

    pub fn is_punct(&self, class_id: usize) -> bool {
        self.flags(class_id) & IS_PUNCT != 0
    }

    pub fn other_case(&self, class_id: usize) -> usize {
        self.classes
            .get(class_id)
            .map(|cls| cls.other_case)
            .unwrap_or(class_id)
    }

    fn flags(&self, class_id: usize) -> u32 {
        self.classes.get(class_id).map(|cls| cls.flags).unwrap_or(0)
    }

    fn char_is_upper(&self, ch: char) -> bool {
        self.class_id_char(ch).map_or(false, |id| self.is_upper(id))
    }

    fn char_is_lower(&self, ch: char) -> bool {
        self.class_id_char(ch).map_or(false, |id| self.is_lower(id))
    }

    /// True when the word is all-one-case, or capitalized (first character
    /// upper-case and the remaining characters lower-case).
    pub fn is_case_invariant(&self, word: &[char]) -> bool {
        if word.is_empty() {
            return true;
        }
        let mut all_one_case = true;
        let mut capitalized = self.char_is_upper(word[0]);
        let mut prev_upper = capitalized;
        let mut prev_lower = self.char_is_lower(word[0]);
        for &ch in &word[1..] {
            let cur_upper = self.char_is_upper(ch);
            let cur_lower = self.char_is_lower(ch);
            if (prev_upper && cur_lower) || (prev_lower && cur_upper) {
                all_one_case = false;
            }
            if cur_upper {
                capitalized = false;
            }
            prev_upper = cur_upper;
            prev_lower = cur_lower;
        }
        all_one_case || capitalized
    }

    /// Lower-cases a word through the class other-case table. Returns `None`
    /// when some character has no single-character lower-case form.
    pub fn to_lower(&self, word: &[char]) -> Option<Vec<char>> {
        self.convert_case(word, true)
    }

    /// Upper-cases a word through the class other-case table.
    pub fn to_upper(&self, word: &[char]) -> Option<Vec<char>> {
        self.convert_case(word, false)
    }

    fn convert_case(&self, word: &[char], to_lower: bool) -> Option<Vec<char>> {
        let mut out = Vec::with_capacity(word.len());
        for &ch in word {
            let class_id = self.class_id_char(ch);
            let convert = match class_id {
                Some(id) => {
                    if to_lower {
                        self.is_upper(id)
                    } else {
                        self.is_lower(id)
                    }
                }
                None => false,
            };
            if convert {
                let other = self.other_case(class_id?);
                let chars = self.class_chars(other)?;
                if chars.len() != 1 {
                    return None;
                }
                out.push(chars[0]);
            } else {
                out.push(ch);
            }
        }
        Some(out)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A small cased latin charset: space, a-e lower, A-E upper, digits 0-2,
    /// period and hyphen.
    pub(crate) fn latin_charset() -> CharSet {
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

    #[test]
    fn test_parse_and_lookup() {
        let charset = latin_charset();
        assert_eq!(charset.class_count(), 16);
        assert_eq!(charset.class_string(0), Some(" "));
        assert_eq!(charset.class_id("a"), Some(1));
        assert_eq!(charset.class_id_char('A'), Some(6));
        assert_eq!(charset.class_id("z"), None);
        assert_eq!(charset.external_id(3), 3);
    }

    #[test]
    fn test_case_properties() {
        let charset = latin_charset();
        let a = charset.class_id("a").unwrap();
        let upper_a = charset.class_id("A").unwrap();
        assert!(charset.is_lower(a));
        assert!(charset.is_upper(upper_a));
        assert_eq!(charset.other_case(a), upper_a);
        assert!(charset.is_digit(charset.class_id("1").unwrap()));
        assert!(charset.is_punct(charset.class_id(".").unwrap()));
    }

    #[test]
    fn test_case_conversion() {
        let charset = latin_charset();
        let word: Vec<char> = "Abc".chars().collect();
        assert_eq!(charset.to_lower(&word).unwrap(), "abc".chars().collect::<Vec<_>>());
        assert_eq!(charset.to_upper(&word).unwrap(), "ABC".chars().collect::<Vec<_>>());
    }

    #[test]
    fn test_case_invariance() {
        let charset = latin_charset();
        let check = |s: &str| charset.is_case_invariant(&s.chars().collect::<Vec<_>>());
        assert!(check("abcde"));
        assert!(check("ABCDE"));
        assert!(check("Abcde"));
        assert!(!check("aBcde"));
    }

    #[test]
    fn test_parse_rejects_tiny_count() {
        assert!(CharSet::parse("1\nNULL 0").is_err());
        assert!(CharSet::parse("garbage").is_err());
    }
}
