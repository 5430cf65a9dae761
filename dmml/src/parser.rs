//! Recursive-descent parser for DMML mapping files.
//!
//! ```text
//! databasemap  := "<databasemap>" tablemap* "</databasemap>"
//! tablemap     := "<tablemap>" source dest sourcets destts attrmap* "</tablemap>"
//! source       := "<source>" TOKEN "</source>"
//! dest         := "<dest>" TOKEN "</dest>"
//! sourcets     := "<sourcetimestamp>" TOKEN "</sourcetimestamp>"
//! destts       := "<desttimestamp>" TOKEN "</desttimestamp>"
//! attrmap      := "<attrmap>" source dest type "</attrmap>"
//! type         := "<type>" ("STRING"|"NUMERICAL") "</type>"
//! ```
//!
//! Tokens are separated by whitespace only, so identifiers can never contain
//! whitespace. Parsing stops at the first violation and returns no model.

use std::fs;
use std::path::Path;
use std::str::SplitWhitespace;

use crate::error::{DmmlError, TokenPosition};
use crate::model::{AttributeMap, AttributeType, DbMap, TableMap};

pub(crate) const DATABASE_MAP_OPEN: &str = "<databasemap>";
pub(crate) const DATABASE_MAP_CLOSE: &str = "</databasemap>";
pub(crate) const TABLE_MAP_OPEN: &str = "<tablemap>";
pub(crate) const TABLE_MAP_CLOSE: &str = "</tablemap>";
pub(crate) const SOURCE_OPEN: &str = "<source>";
pub(crate) const SOURCE_CLOSE: &str = "</source>";
pub(crate) const DEST_OPEN: &str = "<dest>";
pub(crate) const DEST_CLOSE: &str = "</dest>";
pub(crate) const SOURCE_TIMESTAMP_OPEN: &str = "<sourcetimestamp>";
pub(crate) const SOURCE_TIMESTAMP_CLOSE: &str = "</sourcetimestamp>";
pub(crate) const DEST_TIMESTAMP_OPEN: &str = "<desttimestamp>";
pub(crate) const DEST_TIMESTAMP_CLOSE: &str = "</desttimestamp>";
pub(crate) const ATTR_MAP_OPEN: &str = "<attrmap>";
pub(crate) const ATTR_MAP_CLOSE: &str = "</attrmap>";
pub(crate) const TYPE_OPEN: &str = "<type>";
pub(crate) const TYPE_CLOSE: &str = "</type>";

type ParseResult<T> = Result<T, DmmlError>;

/// Parse a mapping from DMML text.
pub fn parse_str(text: &str) -> ParseResult<DbMap> {
    let mut parser = Parser::new(text);
    let map = parser.database_map()?;
    tracing::debug!(
        tables = map.len(),
        tokens = parser.consumed,
        "parsed DMML mapping"
    );
    Ok(map)
}

/// Parse a mapping from raw bytes.
///
/// Bytes that are not UTF-8 make the mapping invalid; the reported position
/// is the token holding the first bad byte.
pub fn parse_bytes(bytes: &[u8]) -> ParseResult<DbMap> {
    match std::str::from_utf8(bytes) {
        Ok(text) => parse_str(text),
        Err(e) => Err(DmmlError::InvalidMappingFile {
            reason: "mapping text is not valid UTF-8".to_string(),
            position: TokenPosition::Token(token_at(&bytes[..e.valid_up_to()])),
        }),
    }
}

/// 1-based index of the token that continues after `prefix`.
fn token_at(prefix: &[u8]) -> usize {
    let text = std::str::from_utf8(prefix).unwrap_or_default();
    let complete = text.split_whitespace().count();
    match text.chars().last() {
        Some(c) if !c.is_whitespace() => complete,
        _ => complete + 1,
    }
}

/// Parse the DMML file at `path`.
///
/// Fails with [`DmmlError::FileNotFound`] when the file cannot be opened or
/// read (a directory, for instance); nothing is tokenized in that case.
pub fn parse_file(path: impl AsRef<Path>) -> ParseResult<DbMap> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|source| DmmlError::FileNotFound {
        path: path.to_path_buf(),
        source,
    })?;
    parse_bytes(&bytes)
}

struct Parser<'a> {
    tokens: SplitWhitespace<'a>,
    lookahead: Option<&'a str>,
    consumed: usize,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Self {
        let mut tokens = text.split_whitespace();
        let lookahead = tokens.next();
        Self {
            tokens,
            lookahead,
            consumed: 0,
        }
    }

    fn peek(&self) -> Option<&'a str> {
        self.lookahead
    }

    fn advance(&mut self) -> Option<&'a str> {
        let current = self.lookahead.take()?;
        self.lookahead = self.tokens.next();
        self.consumed += 1;
        Some(current)
    }

    fn invalid_here<T>(&self, reason: String) -> ParseResult<T> {
        Err(DmmlError::InvalidMappingFile {
            reason,
            position: TokenPosition::Token(self.consumed),
        })
    }

    fn invalid_at_end<T>(&self, reason: String) -> ParseResult<T> {
        Err(DmmlError::InvalidMappingFile {
            reason,
            position: TokenPosition::EndOfInput,
        })
    }

    fn expect(&mut self, tag: &str) -> ParseResult<()> {
        match self.advance() {
            Some(token) if token == tag => Ok(()),
            Some(token) => self.invalid_here(format!("expected `{tag}`, found `{token}`")),
            None => self.invalid_at_end(format!("expected `{tag}`")),
        }
    }

    fn value(&mut self, after: &str) -> ParseResult<&'a str> {
        match self.advance() {
            Some(token) => Ok(token),
            None => self.invalid_at_end(format!("expected a value after `{after}`")),
        }
    }

    fn element(&mut self, open: &str, close: &str) -> ParseResult<&'a str> {
        self.expect(open)?;
        let value = self.value(open)?;
        self.expect(close)?;
        Ok(value)
    }

    fn database_map(&mut self) -> ParseResult<DbMap> {
        self.expect(DATABASE_MAP_OPEN)?;
        let mut map = DbMap::new();
        loop {
            match self.peek() {
                Some(DATABASE_MAP_CLOSE) => {
                    self.advance();
                    break;
                }
                Some(TABLE_MAP_OPEN) => map.add_table_map(self.table_map()?),
                Some(token) => {
                    self.advance();
                    return self.invalid_here(format!(
                        "expected `{TABLE_MAP_OPEN}` or `{DATABASE_MAP_CLOSE}`, found `{token}`"
                    ));
                }
                None => return self.invalid_at_end(format!("missing `{DATABASE_MAP_CLOSE}`")),
            }
        }

        if let Some(token) = self.advance() {
            let reason = if token == TABLE_MAP_OPEN {
                format!("`{TABLE_MAP_OPEN}` outside of `{DATABASE_MAP_OPEN}`")
            } else {
                format!("unexpected `{token}` after `{DATABASE_MAP_CLOSE}`")
            };
            return self.invalid_here(reason);
        }

        Ok(map)
    }

    fn table_map(&mut self) -> ParseResult<TableMap> {
        self.expect(TABLE_MAP_OPEN)?;
        let source = self.element(SOURCE_OPEN, SOURCE_CLOSE)?;
        let dest = self.element(DEST_OPEN, DEST_CLOSE)?;
        let source_ts = self.element(SOURCE_TIMESTAMP_OPEN, SOURCE_TIMESTAMP_CLOSE)?;
        let dest_ts = self.element(DEST_TIMESTAMP_OPEN, DEST_TIMESTAMP_CLOSE)?;
        let mut table = TableMap::new(source, dest, source_ts, dest_ts);

        loop {
            match self.peek() {
                Some(TABLE_MAP_CLOSE) => {
                    self.advance();
                    return Ok(table);
                }
                Some(ATTR_MAP_OPEN) => table.add_attribute_map(self.attribute_map()?),
                Some(token) => {
                    self.advance();
                    return self.invalid_here(format!(
                        "expected `{ATTR_MAP_OPEN}` or `{TABLE_MAP_CLOSE}`, found `{token}`"
                    ));
                }
                None => return self.invalid_at_end(format!("missing `{TABLE_MAP_CLOSE}`")),
            }
        }
    }

    fn attribute_map(&mut self) -> ParseResult<AttributeMap> {
        self.expect(ATTR_MAP_OPEN)?;
        let source = self.element(SOURCE_OPEN, SOURCE_CLOSE)?;
        let dest = self.element(DEST_OPEN, DEST_CLOSE)?;

        self.expect(TYPE_OPEN)?;
        let literal = self.value(TYPE_OPEN)?;
        let attribute_type = match literal.parse::<AttributeType>() {
            Ok(attribute_type) => attribute_type,
            Err(reason) => return self.invalid_here(reason),
        };
        self.expect(TYPE_CLOSE)?;
        self.expect(ATTR_MAP_CLOSE)?;

        Ok(AttributeMap::new(source, dest, attribute_type))
    }
}
