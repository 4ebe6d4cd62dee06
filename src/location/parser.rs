//! Location Parser
//!
//! Parses canonical Location strings. Parsing is purely syntactic: it never
//! touches a tree, so it cannot fail because content changed.
//!
//! Grammar:
//! ```text
//! location = "doc:/" chapter-id step* [offset]
//! chapter-id = 1*( any char except "/" "!" ":" )   ; percent-encoded
//! step     = "/" number | "!/" number
//! offset   = ":" number                             ; must be last
//! ```

use thiserror::Error;

use super::types::*;

/// Location parsing errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LocationParseError {
    #[error("Empty location string")]
    Empty,

    #[error("Location must start with 'doc:/'")]
    MissingPrefix,

    #[error("Location has an empty chapter id")]
    EmptyChapterId,

    #[error("Chapter id is not valid percent-encoded UTF-8: {0}")]
    InvalidChapterId(String),

    #[error("Expected number at position {0}")]
    ExpectedNumber(usize),

    #[error("Index too large at position {0}")]
    IndexOverflow(usize),

    #[error("Unexpected character '{0}' at position {1}")]
    UnexpectedChar(char, usize),

    #[error("Character offset must be the last component (position {0})")]
    OffsetNotTrailing(usize),
}

/// Parser state
struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_if(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), LocationParseError> {
        if self.skip_if(expected) {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn unexpected(&self) -> LocationParseError {
        match self.peek() {
            Some(ch) => LocationParseError::UnexpectedChar(ch, self.pos),
            None => LocationParseError::ExpectedNumber(self.pos),
        }
    }

    fn skip_str(&mut self, s: &str) -> bool {
        if self.input[self.pos..].starts_with(s) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    /// Parse a sequence of digits as usize
    fn parse_number(&mut self) -> Result<usize, LocationParseError> {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                self.advance();
            } else {
                break;
            }
        }

        if self.pos == start {
            return Err(LocationParseError::ExpectedNumber(start));
        }

        self.input[start..self.pos]
            .parse()
            .map_err(|_| LocationParseError::IndexOverflow(start))
    }

    /// Parse the chapter id up to the first path sigil
    fn parse_chapter_id(&mut self) -> Result<String, LocationParseError> {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if matches!(ch, '/' | '!' | ':') {
                break;
            }
            self.advance();
        }

        let raw = &self.input[start..self.pos];
        if raw.is_empty() {
            return Err(LocationParseError::EmptyChapterId);
        }

        urlencoding::decode(raw)
            .map(|decoded| decoded.into_owned())
            .map_err(|_| LocationParseError::InvalidChapterId(raw.to_string()))
    }

    /// Parse a single step (`/n` or `!/n`)
    fn parse_step(&mut self) -> Result<PathSegment, LocationParseError> {
        if self.skip_if('/') {
            Ok(PathSegment::element(self.parse_number()?))
        } else if self.skip_if('!') {
            self.expect('/')?;
            Ok(PathSegment::text(self.parse_number()?))
        } else {
            Err(self.unexpected())
        }
    }

    /// Parse a complete Location
    fn parse_location(&mut self) -> Result<Location, LocationParseError> {
        if !self.skip_str(LOCATION_PREFIX) {
            return Err(LocationParseError::MissingPrefix);
        }

        let chapter_id = self.parse_chapter_id()?;

        let mut path = Vec::new();
        while matches!(self.peek(), Some('/') | Some('!')) {
            path.push(self.parse_step()?);
        }

        let mut location = Location::new(chapter_id, path);

        if self.skip_if(':') {
            location.text_offset = Some(self.parse_number()?);
            if !self.at_end() {
                return Err(LocationParseError::OffsetNotTrailing(self.pos));
            }
        }

        Ok(location)
    }
}

/// Parse a Location string
pub fn parse(input: &str) -> Result<Location, LocationParseError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(LocationParseError::Empty);
    }

    let mut parser = Parser::new(input);
    let location = parser.parse_location()?;

    // Ensure we consumed all input
    if !parser.at_end() {
        return Err(parser.unexpected());
    }

    Ok(location)
}

/// Parse a Location string, discarding the error
pub fn try_parse(input: &str) -> Option<Location> {
    parse(input).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_text_position() {
        let location = parse("doc:/chapter-1/1!/0:6").unwrap();
        assert_eq!(location.chapter_id, "chapter-1");
        assert_eq!(location.path, vec![PathSegment::element(1), PathSegment::text(0)]);
        assert_eq!(location.text_offset, Some(6));
        assert_eq!(location.content_hash, None);
    }

    #[test]
    fn test_parse_nested_path() {
        let location = parse("doc:/chapter-3/0/2!/1:15").unwrap();
        assert_eq!(location.path.len(), 3);
        assert_eq!(location.path[0], PathSegment::element(0));
        assert_eq!(location.path[1], PathSegment::element(2));
        assert_eq!(location.path[2], PathSegment::text(1));
        assert_eq!(location.text_offset, Some(15));
    }

    #[test]
    fn test_parse_element_only() {
        let location = parse("  doc:/intro/4/0 ").unwrap();
        assert_eq!(location.chapter_id, "intro");
        assert_eq!(location.path, vec![PathSegment::element(4), PathSegment::element(0)]);
        assert_eq!(location.text_offset, None);
    }

    #[test]
    fn test_parse_decodes_chapter_id() {
        let location = parse("doc:/Text%2Fch%201.xhtml/0").unwrap();
        assert_eq!(location.chapter_id, "Text/ch 1.xhtml");
    }

    #[test]
    fn test_roundtrip() {
        for original in [
            "doc:/chapter-1/1!/0:6",
            "doc:/chapter-3/0/2!/1:15",
            "doc:/c/0/0/0/7",
            "doc:/Text%2Fch1.xhtml/2!/3:0",
        ] {
            let location = parse(original).unwrap();
            assert_eq!(location.to_string(), original);
        }
    }

    #[test]
    fn test_from_str() {
        let location: Location = "doc:/chapter-1/1".parse().unwrap();
        assert_eq!(location.path, vec![PathSegment::element(1)]);
    }

    #[test]
    fn test_error_empty() {
        assert_eq!(parse(""), Err(LocationParseError::Empty));
        assert_eq!(parse("   "), Err(LocationParseError::Empty));
    }

    #[test]
    fn test_error_missing_prefix() {
        assert_eq!(parse("chapter-1/1"), Err(LocationParseError::MissingPrefix));
        assert_eq!(
            parse("epubcfi(/6/4!/4/2)"),
            Err(LocationParseError::MissingPrefix)
        );
    }

    #[test]
    fn test_error_empty_chapter_id() {
        assert_eq!(parse("doc:/"), Err(LocationParseError::EmptyChapterId));
        assert_eq!(parse("doc://1"), Err(LocationParseError::EmptyChapterId));
    }

    #[test]
    fn test_error_non_numeric_index() {
        assert_eq!(
            parse("doc:/c/x"),
            Err(LocationParseError::ExpectedNumber(7))
        );
        assert_eq!(parse("doc:/c/1!/"), Err(LocationParseError::ExpectedNumber(10)));
    }

    #[test]
    fn test_error_unknown_sigil() {
        assert_eq!(
            parse("doc:/c/1!2"),
            Err(LocationParseError::UnexpectedChar('2', 9))
        );
    }

    #[test]
    fn test_error_offset_not_trailing() {
        assert_eq!(
            parse("doc:/c/1:4/2"),
            Err(LocationParseError::OffsetNotTrailing(10))
        );
    }

    #[test]
    fn test_error_index_overflow() {
        assert!(matches!(
            parse("doc:/c/99999999999999999999999"),
            Err(LocationParseError::IndexOverflow(_))
        ));
    }

    #[test]
    fn test_try_parse() {
        assert!(try_parse("doc:/c/1").is_some());
        assert!(try_parse("nope").is_none());
    }
}
