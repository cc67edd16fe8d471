//! 发音词典
//!
//! 合成前对旁白文本做整词替换（例如缩写、地名的读法）。
//! 缓存 key 基于替换后的文本计算。

use regex::{Captures, Regex};
use std::collections::{BTreeMap, HashMap};

use super::errors::DomainError;

/// 发音词典（构建后不可变）
#[derive(Debug, Clone, Default)]
pub struct Lexicon {
    /// 所有词合成的一个交替模式；空词典时为 None
    pattern: Option<Regex>,
    replacements: HashMap<String, String>,
}

impl Lexicon {
    /// 从 词 -> 读法 映射构建
    ///
    /// 较长的词排在交替模式前面，避免被其前缀抢先匹配
    pub fn from_map(entries: &BTreeMap<String, String>) -> Result<Self, DomainError> {
        let replacements: HashMap<String, String> = entries
            .iter()
            .filter(|(word, _)| !word.trim().is_empty())
            .map(|(word, replacement)| (word.trim().to_string(), replacement.clone()))
            .collect();

        if replacements.is_empty() {
            return Ok(Self::default());
        }

        let mut words: Vec<&String> = replacements.keys().collect();
        words.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()).then(a.cmp(b)));

        let alternatives: Vec<String> = words.iter().map(|w| regex::escape(w)).collect();
        let pattern = Regex::new(&format!(r"\b(?:{})\b", alternatives.join("|")))
            .map_err(|e| DomainError::InvalidLexicon(e.to_string()))?;

        Ok(Self {
            pattern: Some(pattern),
            replacements,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.replacements.is_empty()
    }

    /// 应用替换
    ///
    /// 单次扫描原文，替换结果不会再被其他词条改写
    pub fn apply(&self, text: &str) -> String {
        match &self.pattern {
            Some(pattern) => pattern
                .replace_all(text, |caps: &Captures| {
                    self.replacements
                        .get(&caps[0])
                        .cloned()
                        .unwrap_or_else(|| caps[0].to_string())
                })
                .into_owned(),
            None => text.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lexicon(pairs: &[(&str, &str)]) -> Lexicon {
        let map = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Lexicon::from_map(&map).unwrap()
    }

    #[test]
    fn test_whole_word_only() {
        let lex = lexicon(&[("NSW", "New South Wales")]);
        assert_eq!(lex.apply("Rain in NSW today"), "Rain in New South Wales today");
        assert_eq!(lex.apply("NSWX stays"), "NSWX stays");
    }

    #[test]
    fn test_longest_first() {
        let lex = lexicon(&[("UN", "U N"), ("UNSC", "U N Security Council")]);
        assert_eq!(lex.apply("The UNSC met"), "The U N Security Council met");
    }

    #[test]
    fn test_replacements_are_not_rewritten() {
        let lex = lexicon(&[("UK", "U K"), ("K", "kay")]);
        assert_eq!(lex.apply("The UK and K"), "The U K and kay");
    }

    #[test]
    fn test_replacement_is_literal() {
        let lex = lexicon(&[("cost", "$1 each")]);
        assert_eq!(lex.apply("the cost"), "the $1 each");
    }

    #[test]
    fn test_empty_lexicon_is_identity() {
        let lex = Lexicon::default();
        assert!(lex.is_empty());
        assert_eq!(lex.apply("unchanged"), "unchanged");
    }
}
