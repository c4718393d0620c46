use crate::error::ParseError;
use std::fmt;

/// Synthetic token produced for the `ACCESS TO` phrase.
pub const ACCESS_TO: &str = "ACCESS_TO";
/// Synthetic token produced for the `ASSIGNED TO` phrase.
pub const ASSIGNED_TO: &str = "ASSIGNED_TO";

/// Two-word phrases merged into a single synthetic token.
const PHRASES: &[(&str, &str, &str)] = &[
    ("ACCESS", "TO", ACCESS_TO),
    ("ASSIGNED", "TO", ASSIGNED_TO),
];

/// An untyped word of a statement. Meaning is assigned by the interpreter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    /// Index of the word in the original statement (phrases keep the index
    /// of their first word).
    pub position: usize,
}

impl Token {
    pub fn new(text: impl Into<String>, position: usize) -> Self {
        Token {
            text: text.into(),
            position,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Turns statement text into an ordered token sequence.
pub trait Tokenizer {
    fn tokenize(&self, text: &str) -> Result<Vec<Token>, ParseError>;
}

/// Whitespace tokenizer. Case is preserved; only the `ACCESS TO` and
/// `ASSIGNED TO` phrases are merged.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhitespaceTokenizer;

impl Tokenizer for WhitespaceTokenizer {
    fn tokenize(&self, text: &str) -> Result<Vec<Token>, ParseError> {
        lex(text)
    }
}

pub fn lex(text: &str) -> Result<Vec<Token>, ParseError> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return Err(ParseError::EmptyInput);
    }

    let mut tokens = Vec::with_capacity(words.len());
    let mut pos = 0usize;
    while pos < words.len() {
        let word = words[pos];
        let merged = words.get(pos + 1).and_then(|next| {
            PHRASES
                .iter()
                .find(|(first, second, _)| *first == word && second == next)
                .map(|(_, _, synthetic)| *synthetic)
        });
        match merged {
            Some(synthetic) => {
                tokens.push(Token::new(synthetic, pos));
                pos += 2;
            }
            None => {
                tokens.push(Token::new(word, pos));
                pos += 1;
            }
        }
    }
    Ok(tokens)
}
