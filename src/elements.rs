//! Structural element extraction.
//!
//! A fixed registry of per-language extractors, looked up by exact
//! [`LanguageLabel`] match. Each extractor is a handful of regexes:
//!
//! | Language | functions | classes | comments | docstrings |
//! |----------|-----------|---------|----------|------------|
//! | Python | `def name(...):` | `class Name:` | `#` | `"""..."""`, `'''...'''` |
//! | Java | `public [static] T name(...) {` | `class`/`interface`/`enum` | `//`, `/* */` | - |
//! | C++ | `T name(...) {` at line start | `class`/`struct` | `//`, `/* */` | - |
//! | C | `T name(...) {` at line start | - | `//`, `/* */` | - |
//! | Go | `func [(recv)] Name(` | - | `//`, `/* */` | - |
//! | JavaScript | `function name(`, `const name = (...) =>` | `class Name` | `//`, `/* */` | - |
//! | Rust | `fn name` | `struct`/`enum`/`trait` | `//`, `/* */` | - |
//!
//! A `-` is a field the extractor leaves as `None`.
//!
//! These are pattern heuristics, not parses. Signatures split across lines,
//! nested parentheses in parameter lists, comment markers inside string
//! literals and similar constructs are missed or mis-captured. That is the
//! accepted precision/recall tradeoff for this component.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ExtractError;
use crate::models::{ElementSet, LanguageLabel};

/// Registered extractor variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extractor {
    Python,
    Java,
    Cpp,
    C,
    Go,
    JavaScript,
    Rust,
}

impl Extractor {
    pub const ALL: [Extractor; 7] = [
        Extractor::Python,
        Extractor::Java,
        Extractor::Cpp,
        Extractor::C,
        Extractor::Go,
        Extractor::JavaScript,
        Extractor::Rust,
    ];

    /// The language label this extractor is registered under.
    pub fn label(&self) -> &'static str {
        match self {
            Extractor::Python => "Python",
            Extractor::Java => "Java",
            Extractor::Cpp => "C++",
            Extractor::C => "C",
            Extractor::Go => "Go",
            Extractor::JavaScript => "JavaScript",
            Extractor::Rust => "Rust",
        }
    }

    pub fn for_label(label: &LanguageLabel) -> Result<Self, ExtractError> {
        match label {
            LanguageLabel::Known(name) => Self::ALL
                .iter()
                .copied()
                .find(|e| e.label() == name)
                .ok_or_else(|| ExtractError::NoExtractorAvailable(label.clone())),
            LanguageLabel::Unknown => Err(ExtractError::NoExtractorAvailable(label.clone())),
        }
    }

    pub fn extract(&self, content: &str) -> ElementSet {
        match self {
            Extractor::Python => ElementSet {
                functions: captures(&PY_FUNCTION, content),
                classes: Some(captures(&PY_CLASS, content)),
                comments: matches(&PY_COMMENT, content),
                docstrings: Some(matches(&PY_DOCSTRING, content)),
            },
            Extractor::Java => ElementSet {
                functions: captures(&JAVA_FUNCTION, content),
                classes: Some(captures(&JAVA_CLASS, content)),
                comments: matches(&C_STYLE_COMMENT, content),
                docstrings: None,
            },
            Extractor::Cpp => ElementSet {
                functions: c_functions(content),
                classes: Some(captures(&CPP_CLASS, content)),
                comments: matches(&C_STYLE_COMMENT, content),
                docstrings: None,
            },
            Extractor::C => ElementSet {
                functions: c_functions(content),
                classes: None,
                comments: matches(&C_STYLE_COMMENT, content),
                docstrings: None,
            },
            Extractor::Go => ElementSet {
                functions: captures(&GO_FUNCTION, content),
                classes: None,
                comments: matches(&C_STYLE_COMMENT, content),
                docstrings: None,
            },
            Extractor::JavaScript => ElementSet {
                functions: captures(&JS_FUNCTION, content),
                classes: Some(captures(&JS_CLASS, content)),
                comments: matches(&C_STYLE_COMMENT, content),
                docstrings: None,
            },
            Extractor::Rust => ElementSet {
                functions: captures(&RUST_FUNCTION, content),
                classes: Some(captures(&RUST_TYPE, content)),
                comments: matches(&C_STYLE_COMMENT, content),
                docstrings: None,
            },
        }
    }
}

/// Extract elements for `label`, or fail naming the unsupported label.
pub fn extract_elements(label: &LanguageLabel, content: &str) -> Result<ElementSet, ExtractError> {
    Ok(Extractor::for_label(label)?.extract(content))
}

static PY_FUNCTION: Lazy<Regex> =
    Lazy::new(|| compile(r"\bdef\s+(\w+)\s*\(.*\)(?:\s*->\s*[^:\n]+)?\s*:"));
static PY_CLASS: Lazy<Regex> = Lazy::new(|| compile(r"\bclass\s+(\w+)\s*(?:\(.*\))?\s*:"));
static PY_COMMENT: Lazy<Regex> = Lazy::new(|| compile(r"#.*"));
static PY_DOCSTRING: Lazy<Regex> = Lazy::new(|| compile(r#"(?s)""".*?"""|'''.*?'''"#));

static C_STYLE_COMMENT: Lazy<Regex> = Lazy::new(|| compile(r"//[^\n]*|(?s:/\*.*?\*/)"));

static JAVA_FUNCTION: Lazy<Regex> = Lazy::new(|| {
    compile(
        r"\b(?:public|protected|private)\s+(?:(?:static|final|abstract|synchronized|native)\s+)*[\w<>\[\],.?]+\s+(\w+)\s*\([^)]*\)\s*(?:throws\s+[\w.,\s]+)?\{",
    )
});
static JAVA_CLASS: Lazy<Regex> =
    Lazy::new(|| compile(r"\b(?:class|interface|enum)\s+(\w+)[^{;]*\{"));

static C_FUNCTION: Lazy<Regex> = Lazy::new(|| {
    compile(
        r"(?m)^[ \t]*(?:[\w:<>,*&~]+[ \t]+)+[*&]?((?:\w+::)*~?\w+)[ \t]*\([^;{}()]*\)[ \t]*(?:const[ \t]*)?(?:noexcept[ \t]*)?(?:override[ \t]*)?\{",
    )
});
static CPP_CLASS: Lazy<Regex> = Lazy::new(|| compile(r"\b(?:class|struct)\s+(\w+)[^;{()]*\{"));

/// Control-flow keywords the C function pattern can mistake for names
/// (`else if (x) {`).
const C_KEYWORDS: &[&str] = &[
    "if", "for", "while", "switch", "return", "else", "do", "catch", "sizeof", "new", "delete",
];

static GO_FUNCTION: Lazy<Regex> =
    Lazy::new(|| compile(r"\bfunc\s+(?:\([^)]*\)\s*)?(\w+)\s*(?:\[[^\]]*\]\s*)?\("));

static JS_FUNCTION: Lazy<Regex> = Lazy::new(|| {
    compile(
        r"\bfunction\b\s*\*?\s*(\w+)\s*\(|\b(?:const|let|var)\s+(\w+)\s*=\s*(?:async\s+)?(?:function\b|\([^)]*\)\s*=>|\w+\s*=>)",
    )
});
static JS_CLASS: Lazy<Regex> = Lazy::new(|| compile(r"\bclass\s+(\w+)"));

static RUST_FUNCTION: Lazy<Regex> = Lazy::new(|| compile(r"\bfn\s+(\w+)"));
static RUST_TYPE: Lazy<Regex> = Lazy::new(|| compile(r"\b(?:struct|enum|trait)\s+(\w+)"));

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("element pattern is a valid regex")
}

/// First participating capture group of every match, in source order.
fn captures(re: &Regex, content: &str) -> Vec<String> {
    re.captures_iter(content)
        .filter_map(|caps| caps.iter().skip(1).flatten().next())
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Whole text of every match, in source order.
fn matches(re: &Regex, content: &str) -> Vec<String> {
    re.find_iter(content).map(|m| m.as_str().to_string()).collect()
}

fn c_functions(content: &str) -> Vec<String> {
    captures(&C_FUNCTION, content)
        .into_iter()
        .filter(|name| !C_KEYWORDS.contains(&name.as_str()))
        .collect()
}
