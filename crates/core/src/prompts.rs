//! Prompt name resolution
//!
//! Admin-managed custom prompts arrive with the flow config as a
//! name -> relative-path cache; anything not in the cache falls back to the
//! language's default path scheme. Digits and number segments live under
//! their own per-language paths because the recorded sets differ.

use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct PromptResolver {
    cache: HashMap<String, String>,
    prompts_path: String,
    digits_path: String,
    numbers_path: String,
}

impl PromptResolver {
    pub fn new(
        cache: HashMap<String, String>,
        prompts_path: impl Into<String>,
        digits_path: impl Into<String>,
        numbers_path: impl Into<String>,
    ) -> Self {
        Self {
            cache,
            prompts_path: prompts_path.into(),
            digits_path: digits_path.into(),
            numbers_path: numbers_path.into(),
        }
    }

    /// Default path scheme for a language: `en` keeps custom prompts under
    /// `custom/` with stock digit recordings, everything else is namespaced
    /// by language code.
    pub fn for_language(cache: HashMap<String, String>, language: &str) -> Self {
        match language {
            "en" => Self::new(cache, "custom", "digits", "numbers"),
            lang => Self::new(
                cache,
                lang.to_string(),
                format!("{lang}/digits"),
                format!("{lang}/numbers"),
            ),
        }
    }

    /// Resolve a named prompt: cache first, then `{prompts_path}/{name}`.
    pub fn prompt(&self, name: &str) -> String {
        match self.cache.get(name) {
            Some(path) => path.clone(),
            None => format!("{}/{}", self.prompts_path, name),
        }
    }

    /// Sound path for one spoken digit.
    pub fn digit(&self, digit: char) -> String {
        format!("{}/{}", self.digits_path, digit)
    }

    /// Sound path for one number segment ("0", "wa", "300", ...).
    pub fn number_segment(&self, segment: &str) -> String {
        format!("{}/{}", self.numbers_path, segment)
    }
}
