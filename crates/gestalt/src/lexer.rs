//! The path lexer: turns `db.hosts[0].port` into a token sequence.

use crate::error::ValidationError;
use crate::results::Validated;
use crate::token::Token;
use regex::Regex;
use tracing::trace;

/// Default delimiter between path segments.
pub const DEFAULT_DELIMITER: char = '.';

/// Segment grammar: a name followed by zero or more bracketed indices.
/// Ten digits bound the index well past `u32::MAX`; range is checked after
/// parsing.
const SEGMENT_PATTERN: &str = r"^(?P<name>[\w-]+)(?P<indices>(\[\d{1,10}\])*)$";

/// Largest accepted array index.
const MAX_INDEX: usize = u32::MAX as usize;

/// Splits a path string on the delimiter and lexes each segment into
/// [`Token`]s. Malformed segments (empty, unmatched brackets, non-integer or
/// out-of-range indices) produce `FailedToTokenize` errors with no partial
/// results.
#[derive(Debug, Clone)]
pub struct PathLexer {
    delimiter: char,
    segment: Regex,
}

impl Default for PathLexer {
    fn default() -> Self {
        Self::new(DEFAULT_DELIMITER)
    }
}

impl PathLexer {
    #[must_use]
    pub fn new(delimiter: char) -> Self {
        let segment = Regex::new(SEGMENT_PATTERN).expect("segment pattern is a valid regex");
        Self { delimiter, segment }
    }

    #[must_use]
    pub fn delimiter(&self) -> char {
        self.delimiter
    }

    /// Tokenizes a full path. The empty path is the tree root and lexes to
    /// an empty token list.
    pub fn tokenize(&self, context: &str, sentence: &str) -> Validated<Vec<Token>> {
        if sentence.is_empty() {
            return Validated::valid(Vec::new());
        }

        let mut tokens = Vec::new();
        let mut errors = Vec::new();
        for segment in sentence.split(self.delimiter) {
            match self.lex_segment(sentence, segment) {
                Ok(mut lexed) => tokens.append(&mut lexed),
                Err(error) => errors.push(error),
            }
        }

        if errors.is_empty() {
            trace!(context, sentence, count = tokens.len(), "tokenized path");
            Validated::valid(tokens)
        } else {
            Validated::errors(errors)
        }
    }

    fn lex_segment(&self, sentence: &str, segment: &str) -> Result<Vec<Token>, ValidationError> {
        let failed = || ValidationError::FailedToTokenize {
            element: segment.to_owned(),
            path: sentence.to_owned(),
        };

        let captures = self.segment.captures(segment).ok_or_else(failed)?;
        let name = &captures["name"];
        let mut tokens = vec![Token::Object(name.to_owned())];

        let indices = &captures["indices"];
        for raw in indices.split_terminator(']') {
            let digits = raw.strip_prefix('[').ok_or_else(failed)?;
            let index: usize = digits.parse().map_err(|_| failed())?;
            if index > MAX_INDEX {
                return Err(failed());
            }
            tokens.push(Token::Index(index));
        }
        Ok(tokens)
    }
}
