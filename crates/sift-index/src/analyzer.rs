//! Text analysis for segment fields.
//!
//! Two tokenizers are registered on every segment:
//!
//! - `sift_text`, for phrase fields. One of three pipelines, picked by the
//!   `analyzer` setting:
//!   - `stemming`: simple tokenizer, lower-casing, long-token removal and a stemmer
//!   - `standard`: the same pipeline without the stemmer
//!   - `whitespace`: whitespace splitting and lower-casing
//! - `sift_ngram`, for partial-match and autocomplete fields: every word is
//!   lower-cased and cut into grams of `ngram_length` characters.
//!
//! Filter fields use tantivy's built-in `raw` tokenizer.

use std::str::FromStr;

use sift_config::BackendConfig;
use tantivy::{
    Index,
    tokenizer::{
        Language, LowerCaser, RemoveLongFilter, SimpleTokenizer, Stemmer, TextAnalyzer, Token,
        TokenStream, Tokenizer, WhitespaceTokenizer,
    },
};

use crate::IndexError;

/// Tokenizer name for phrase fields.
pub const TEXT_TOKENIZER: &str = "sift_text";

/// Tokenizer name for n-gram fields.
pub const NGRAM_TOKENIZER: &str = "sift_ngram";

/// Tantivy's built-in untokenized analyzer, used by filter fields.
pub const RAW_TOKENIZER: &str = "raw";

/// Maximum token length in bytes before filtering.
const MAX_TOKEN_LENGTH: usize = 40;

/// Parses a stemmer language from a name (`swedish`) or ISO code (`sv`, `sv-SE`).
pub fn parse_language(name: &str) -> Result<Language, IndexError> {
    let lowered = name.trim().to_lowercase();
    let code = lowered
        .split(['-', '_'])
        .next()
        .unwrap_or(lowered.as_str());
    match code {
        "arabic" | "ar" => Ok(Language::Arabic),
        "danish" | "da" => Ok(Language::Danish),
        "dutch" | "nl" => Ok(Language::Dutch),
        "english" | "en" => Ok(Language::English),
        "finnish" | "fi" => Ok(Language::Finnish),
        "french" | "fr" => Ok(Language::French),
        "german" | "de" => Ok(Language::German),
        "greek" | "el" => Ok(Language::Greek),
        "hungarian" | "hu" => Ok(Language::Hungarian),
        "italian" | "it" => Ok(Language::Italian),
        "norwegian" | "no" | "nb" | "nn" => Ok(Language::Norwegian),
        "portuguese" | "pt" => Ok(Language::Portuguese),
        "romanian" | "ro" => Ok(Language::Romanian),
        "russian" | "ru" => Ok(Language::Russian),
        "spanish" | "es" => Ok(Language::Spanish),
        "swedish" | "sv" => Ok(Language::Swedish),
        "tamil" | "ta" => Ok(Language::Tamil),
        "turkish" | "tr" => Ok(Language::Turkish),
        _ => Err(IndexError::InvalidLanguage(name.to_string())),
    }
}

/// Named text analyzer pipelines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AnalyzerKind {
    /// Tokenize and lower-case.
    Standard,
    /// Tokenize, lower-case and stem.
    #[default]
    Stemming,
    /// Split on whitespace and lower-case.
    Whitespace,
}

impl FromStr for AnalyzerKind {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "standard" => Ok(Self::Standard),
            "stemming" => Ok(Self::Stemming),
            "whitespace" => Ok(Self::Whitespace),
            _ => Err(IndexError::UnknownAnalyzer(s.to_string())),
        }
    }
}

/// The analyzers a backend registers on its segments.
#[derive(Debug, Clone, Copy)]
pub struct Analyzers {
    /// Stemmer language.
    language: Language,
    /// Phrase-field pipeline.
    kind: AnalyzerKind,
    /// Shortest gram.
    ngram_min: usize,
    /// Longest gram.
    ngram_max: usize,
}

impl Analyzers {
    /// Resolves the analyzer settings, failing on unknown languages or analyzers.
    pub fn from_config(config: &BackendConfig) -> Result<Self, IndexError> {
        let language = parse_language(&config.language)?;
        let kind = match &config.analyzer {
            Some(name) => name.parse()?,
            None => AnalyzerKind::default(),
        };
        Ok(Self {
            language,
            kind,
            ngram_min: config.ngram_length.min.max(1),
            ngram_max: config.ngram_length.max.max(config.ngram_length.min.max(1)),
        })
    }

    /// The phrase-field pipeline kind.
    pub fn kind(&self) -> AnalyzerKind {
        self.kind
    }

    /// Builds the phrase-field analyzer.
    pub fn text(&self) -> TextAnalyzer {
        match self.kind {
            AnalyzerKind::Stemming => TextAnalyzer::builder(SimpleTokenizer::default())
                .filter(LowerCaser)
                .filter(RemoveLongFilter::limit(MAX_TOKEN_LENGTH))
                .filter(Stemmer::new(self.language))
                .build(),
            AnalyzerKind::Standard => TextAnalyzer::builder(SimpleTokenizer::default())
                .filter(LowerCaser)
                .filter(RemoveLongFilter::limit(MAX_TOKEN_LENGTH))
                .build(),
            AnalyzerKind::Whitespace => TextAnalyzer::builder(WhitespaceTokenizer::default())
                .filter(LowerCaser)
                .filter(RemoveLongFilter::limit(MAX_TOKEN_LENGTH))
                .build(),
        }
    }

    /// Builds the n-gram analyzer.
    pub fn ngram(&self) -> TextAnalyzer {
        TextAnalyzer::from(WordNgramTokenizer {
            min: self.ngram_min,
            max: self.ngram_max,
        })
    }

    /// Registers both analyzers on an index.
    pub fn register(&self, index: &Index) {
        let manager = index.tokenizers();
        manager.register(TEXT_TOKENIZER, self.text());
        manager.register(NGRAM_TOKENIZER, self.ngram());
    }

    /// Runs `text` through the phrase-field analyzer.
    pub fn tokenize_text(&self, text: &str) -> Vec<String> {
        let mut analyzer = self.text();
        let mut stream = analyzer.token_stream(text);
        let mut tokens = Vec::new();
        while stream.advance() {
            tokens.push(stream.token().text.clone());
        }
        tokens
    }

    /// The longest grams of each word in `text`, as indexed by `sift_ngram`.
    ///
    /// A word shorter than the minimum gram produces nothing; a word shorter
    /// than the maximum produces itself.
    pub fn longest_ngrams(&self, text: &str) -> Vec<String> {
        let mut grams = Vec::new();
        for word in words(text) {
            let chars: Vec<char> = word.chars().collect();
            if chars.len() < self.ngram_min {
                continue;
            }
            let size = chars.len().min(self.ngram_max);
            for window in chars.windows(size) {
                let gram: String = window.iter().collect();
                if !grams.contains(&gram) {
                    grams.push(gram);
                }
            }
        }
        grams
    }
}

/// Splits text into lower-cased alphanumeric words.
fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    word_spans(text)
        .into_iter()
        .map(|(_, word)| word.to_lowercase())
}

/// Alphanumeric runs of `text` with their byte offsets.
fn word_spans(text: &str) -> Vec<(usize, &str)> {
    let mut spans = Vec::new();
    let mut start = None;
    for (i, c) in text.char_indices() {
        match (c.is_alphanumeric(), start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                spans.push((s, &text[s..i]));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        spans.push((s, &text[s..]));
    }
    spans
}

/// Emits every gram of `min..=max` characters of each word.
#[derive(Debug, Clone)]
pub struct WordNgramTokenizer {
    /// Shortest gram.
    min: usize,
    /// Longest gram.
    max: usize,
}

impl Tokenizer for WordNgramTokenizer {
    type TokenStream<'a> = WordNgramTokenStream;

    fn token_stream<'a>(&'a mut self, text: &'a str) -> Self::TokenStream<'a> {
        let mut tokens = Vec::new();
        let mut position = 0;
        for (start, raw) in word_spans(text) {
            let word = raw.to_lowercase();
            let chars: Vec<char> = word.chars().collect();
            for size in self.min..=self.max.min(chars.len()) {
                for window in chars.windows(size) {
                    tokens.push(Token {
                        offset_from: start,
                        offset_to: start + raw.len(),
                        position,
                        text: window.iter().collect(),
                        position_length: 1,
                    });
                    position += 1;
                }
            }
        }
        WordNgramTokenStream {
            tokens,
            cursor: None,
        }
    }
}

/// Token stream over precomputed grams.
#[derive(Debug)]
pub struct WordNgramTokenStream {
    /// Grams in emission order.
    tokens: Vec<Token>,
    /// Index of the current token; `None` before the first advance.
    cursor: Option<usize>,
}

impl TokenStream for WordNgramTokenStream {
    fn advance(&mut self) -> bool {
        let next = self.cursor.map_or(0, |c| c + 1);
        self.cursor = Some(next);
        next < self.tokens.len()
    }

    fn token(&self) -> &Token {
        &self.tokens[self.cursor.unwrap_or(0)]
    }

    fn token_mut(&mut self) -> &mut Token {
        let cursor = self.cursor.unwrap_or(0);
        &mut self.tokens[cursor]
    }
}

#[cfg(test)]
mod test {
    use sift_config::NgramRange;

    use super::*;

    fn analyzers(analyzer: Option<&str>) -> Analyzers {
        let config = BackendConfig {
            analyzer: analyzer.map(String::from),
            ..BackendConfig::default()
        };
        Analyzers::from_config(&config).unwrap()
    }

    fn collect(analyzer: &mut TextAnalyzer, text: &str) -> Vec<String> {
        let mut stream = analyzer.token_stream(text);
        let mut out = Vec::new();
        while stream.advance() {
            out.push(stream.token().text.clone());
        }
        out
    }

    #[test]
    fn languages_by_name_and_code() {
        assert_eq!(parse_language("English").unwrap(), Language::English);
        assert_eq!(parse_language("fr").unwrap(), Language::French);
        assert_eq!(parse_language("sv-SE").unwrap(), Language::Swedish);
        assert_eq!(parse_language("pt_BR").unwrap(), Language::Portuguese);
        assert_eq!(parse_language("nb").unwrap(), Language::Norwegian);
        let err = parse_language("klingon").unwrap_err();
        assert!(err.to_string().contains("klingon"));
    }

    #[test]
    fn analyzer_names() {
        assert_eq!("Standard".parse::<AnalyzerKind>().unwrap(), AnalyzerKind::Standard);
        assert!(matches!(
            "snowball".parse::<AnalyzerKind>(),
            Err(IndexError::UnknownAnalyzer(_))
        ));
    }

    #[test]
    fn unknown_language_fails_construction() {
        let config = BackendConfig {
            language: "xx".into(),
            ..BackendConfig::default()
        };
        assert!(matches!(
            Analyzers::from_config(&config),
            Err(IndexError::InvalidLanguage(_))
        ));
    }

    #[test]
    fn stemming_pipeline() {
        let a = analyzers(None);
        assert_eq!(a.tokenize_text("Running, HANDLING"), vec!["run", "handl"]);
    }

    #[test]
    fn standard_pipeline_keeps_words() {
        let a = analyzers(Some("standard"));
        assert_eq!(a.tokenize_text("Running fast"), vec!["running", "fast"]);
    }

    #[test]
    fn whitespace_pipeline_keeps_punctuation() {
        let a = analyzers(Some("whitespace"));
        assert_eq!(a.tokenize_text("foo-bar Baz"), vec!["foo-bar", "baz"]);
    }

    #[test]
    fn long_tokens_removed() {
        let a = analyzers(None);
        let text = format!("short {} word", "a".repeat(50));
        assert_eq!(a.tokenize_text(&text), vec!["short", "word"]);
    }

    #[test]
    fn ngram_tokenizer_emits_all_sizes() {
        let config = BackendConfig {
            ngram_length: NgramRange { min: 2, max: 3 },
            ..BackendConfig::default()
        };
        let a = Analyzers::from_config(&config).unwrap();
        let mut ngram = a.ngram();
        assert_eq!(
            collect(&mut ngram, "Abcd e"),
            vec!["ab", "bc", "cd", "abc", "bcd"]
        );
    }

    #[test]
    fn longest_ngrams_for_queries() {
        let a = analyzers(None);
        assert_eq!(a.longest_ngrams("Python"), vec!["pyth", "ytho", "thon"]);
        assert_eq!(a.longest_ngrams("ja"), vec!["ja"]);
        assert!(a.longest_ngrams("x").is_empty());
        assert_eq!(a.longest_ngrams("go-go"), vec!["go"]);
    }

    #[test]
    fn query_grams_are_indexed_grams() {
        let a = analyzers(None);
        let mut ngram = a.ngram();
        let indexed = collect(&mut ngram, "Learning Python");
        for gram in a.longest_ngrams("earn") {
            assert!(indexed.contains(&gram), "{gram} missing");
        }
    }
}
