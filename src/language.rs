//! Language detection.
//!
//! Guesses a file's language from syntect's bundled Sublime syntax
//! definitions: first by extension, then by whole file name (`Makefile`),
//! then by the first line of content. Anything unmatched, or matched only
//! by the plain-text syntax, is [`LanguageLabel::Unknown`].
//!
//! Labels are the syntax names (`"Python"`, `"C++"`, `"Go"`), which is what
//! the element extractor registry keys on. They are stable within a process
//! but may shift between syntect releases.

use std::path::Path;
use syntect::parsing::{SyntaxReference, SyntaxSet};

use crate::models::LanguageLabel;

const PLAIN_TEXT: &str = "Plain Text";

pub struct LanguageDetector {
    syntaxes: SyntaxSet,
}

impl Default for LanguageDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageDetector {
    pub fn new() -> Self {
        Self {
            syntaxes: SyntaxSet::load_defaults_newlines(),
        }
    }

    pub fn detect(&self, filename: &str, content: &str) -> LanguageLabel {
        match self.guess(filename, content) {
            Some(syntax) if syntax.name != PLAIN_TEXT => LanguageLabel::known(syntax.name.clone()),
            _ => LanguageLabel::Unknown,
        }
    }

    fn guess(&self, filename: &str, content: &str) -> Option<&SyntaxReference> {
        let path = Path::new(filename);

        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| self.syntaxes.find_syntax_by_extension(ext))
            .or_else(|| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .and_then(|name| self.syntaxes.find_syntax_by_extension(name))
            })
            .or_else(|| {
                content
                    .lines()
                    .next()
                    .and_then(|line| self.syntaxes.find_syntax_by_first_line(line))
            })
    }
}
