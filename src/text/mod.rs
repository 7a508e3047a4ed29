//! Tokenizer/analyzer adapter. Analysis chains are a pluggable capability:
//! the engine only requires positioned, normalized tokens and resolves an
//! analyzer per locale through the registry.

pub mod fuzzy;

use std::collections::HashMap;
use std::sync::Arc;

/// One normalized token with its word position in the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub position: u32,
}

/// A locale-bound analysis chain.
pub trait Analyzer: Send + Sync {
    fn tokens(&self, text: &str) -> Vec<Token>;
}

/// Default analyzer: splits on non-alphanumeric boundaries, lowercases,
/// and folds common Latin diacritics to their ASCII base letters.
#[derive(Debug, Default)]
pub struct SimpleAnalyzer;

impl Analyzer for SimpleAnalyzer {
    fn tokens(&self, text: &str) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut current = String::new();
        let mut position = 0u32;

        for ch in text.chars() {
            if ch.is_alphanumeric() {
                for low in ch.to_lowercase() {
                    fold_into(low, &mut current);
                }
            } else if !current.is_empty() {
                tokens.push(Token {
                    text: std::mem::take(&mut current),
                    position,
                });
                position += 1;
            }
        }
        if !current.is_empty() {
            tokens.push(Token {
                text: current,
                position,
            });
        }
        tokens
    }
}

/// Append the folded form of an already-lowercased character.
fn fold_into(ch: char, out: &mut String) {
    let mapped = match ch {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => "a",
        'è' | 'é' | 'ê' | 'ë' => "e",
        'ì' | 'í' | 'î' | 'ï' => "i",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' => "o",
        'ù' | 'ú' | 'û' | 'ü' => "u",
        'ý' | 'ÿ' => "y",
        'ñ' => "n",
        'ç' => "c",
        'ð' => "d",
        'ß' => "ss",
        'æ' => "ae",
        'ø' => "o",
        _ => {
            out.push(ch);
            return;
        }
    };
    out.push_str(mapped);
}

/// Lowercase and fold a whole string (used for wildcard patterns and raw
/// attribute comparison, where word splitting must not apply).
pub fn fold_lower(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        for low in ch.to_lowercase() {
            fold_into(low, &mut out);
        }
    }
    out
}

/// The language component of a locale tag: `en_GB` → `en`.
pub fn language_of(locale: &str) -> &str {
    locale
        .split(['_', '-'])
        .next()
        .unwrap_or(locale)
}

/// Per-locale analyzer registry with a default fallback.
pub struct AnalyzerRegistry {
    default: Arc<dyn Analyzer>,
    by_language: HashMap<String, Arc<dyn Analyzer>>,
}

impl AnalyzerRegistry {
    pub fn new(default: Arc<dyn Analyzer>) -> Self {
        Self {
            default,
            by_language: HashMap::new(),
        }
    }

    pub fn register(&mut self, language: &str, analyzer: Arc<dyn Analyzer>) {
        self.by_language.insert(language.to_string(), analyzer);
    }

    pub fn analyzer_for(&self, locale: Option<&str>) -> &Arc<dyn Analyzer> {
        locale
            .map(language_of)
            .and_then(|lang| self.by_language.get(lang))
            .unwrap_or(&self.default)
    }
}

impl Default for AnalyzerRegistry {
    fn default() -> Self {
        Self::new(Arc::new(SimpleAnalyzer))
    }
}
