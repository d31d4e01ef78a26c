//! Lexical analysis.
//!
//! The scanner is pull-based: the compiler asks for one token at a time with
//! [`Scanner::next_token`], and the scanner walks the source just far enough
//! to produce it. Whitespace and `//` line comments are skipped silently.
//! Once the source is exhausted, every further call yields an EOF token, so
//! the consumer may look at "the current token" as often as it likes.
//!
//! We can't tell a reserved word from an identifier until we've reached the
//! end of what might be either, so keywords are recognized after the fact
//! from the finished lexeme (maximal munch).

mod token;

use std::{iter::Peekable, str::CharIndices};

pub(crate) use token::*;

use crate::error::scanner::{ScanError, ScanErrorKind};

/// A scanner over a single source unit.
pub(crate) struct Scanner<'a> {
	/// User input source code
	source:      &'a str,
	/// User input source code iterator
	source_iter: Peekable<CharIndices<'a>>,
	/// Points at the beginning of the current lexeme
	start:       usize,
	/// Points past the character currently being considered
	cursor:      usize,
	/// Tracks what source line the cursor is on so we can produce tokens that
	/// know their location
	line:        usize,
}

impl<'a> Scanner<'a> {
	pub fn new(source: &'a str) -> Self {
		let source_iter = source.char_indices().peekable();

		Self { source, source_iter, start: 0, cursor: 0, line: 1 }
	}

	/// Scan the next token from the source code.
	pub fn next_token(&mut self) -> Result<Token<'a>, ScanError> {
		self.skip_whitespace();
		self.start = self.cursor;

		let Some(next_char) = self.advance() else {
			return Ok(Token::new(TokenKind::Eof, "", self.line));
		};

		#[rustfmt::skip]
		let kind = match next_char {
			'(' => TokenKind::LeftParen,
			')' => TokenKind::RightParen,
			'{' => TokenKind::LeftBrace,
			'}' => TokenKind::RightBrace,
			',' => TokenKind::Comma,
			'.' => TokenKind::Dot,
			'-' => TokenKind::Minus,
			'+' => TokenKind::Plus,
			';' => TokenKind::Semicolon,
			'/' => TokenKind::Slash,
			'*' => TokenKind::Star,
			'!' => if self.match_next('=') { TokenKind::BangEqual } else { TokenKind::Bang },
			'=' => if self.match_next('=') { TokenKind::EqualEqual } else { TokenKind::Equal },
			'<' => if self.match_next('=') { TokenKind::LessEqual } else { TokenKind::Less },
			'>' => if self.match_next('=') { TokenKind::GreaterEqual } else { TokenKind::Greater },
			'"' => return self.string(),
			c if c.is_ascii_digit() => return Ok(self.number()),
			c if c.is_ascii_alphabetic() || c == '_' => return Ok(self.identifier()),
			c => return Err(ScanError::new(self.line, ScanErrorKind::UnexpectedCharacter(c))),
		};

		Ok(self.token(kind))
	}

	/// Build a token from the lexeme between `start` and the cursor.
	fn token(&self, kind: TokenKind) -> Token<'a> {
		Token::new(kind, &self.source[self.start..self.cursor], self.line)
	}

	/// Skip whitespace and `//` line comments.
	fn skip_whitespace(&mut self) {
		while let Some(c) = self.peek() {
			match c {
				' ' | '\r' | '\t' => {
					self.advance();
				}
				'\n' => {
					self.advance();
					self.line += 1;
				}
				'/' if self.peek_second() == Some('/') => {
					while self.peek().is_some_and(|c| c != '\n') {
						self.advance();
					}
				}
				_ => break,
			}
		}
	}

	/// Match the next character if it is the expected one
	fn match_next(&mut self, expected: char) -> bool {
		matches!(self.peek(), Some(c) if c == expected && { self.advance(); true })
	}

	/// Advance to the next character
	fn advance(&mut self) -> Option<char> {
		let (i, c) = self.source_iter.next()?;
		self.cursor = i + c.len_utf8();
		Some(c)
	}

	/// Peek the current character
	fn peek(&mut self) -> Option<char> { self.source_iter.peek().map(|&(_, c)| c) }

	/// Peek the second character ahead
	fn peek_second(&mut self) -> Option<char> {
		let mut it = self.source_iter.clone();
		it.next()?;
		it.peek().map(|&(_, c)| c)
	}

	/// Scan a string literal. Strings may span lines; only a `\n` inside the
	/// literal bumps the line counter.
	fn string(&mut self) -> Result<Token<'a>, ScanError> {
		while let Some(c) = self.peek() {
			if c == '"' {
				break;
			}
			if c == '\n' {
				self.line += 1;
			}
			self.advance();
		}

		if self.peek().is_none() {
			return Err(ScanError::new(self.line, ScanErrorKind::UnterminatedString));
		}
		self.advance(); // The closing "
		Ok(self.token(TokenKind::String))
	}

	/// Scan a number literal: digits with an optional fractional part that
	/// requires a digit right after the dot.
	fn number(&mut self) -> Token<'a> {
		while self.peek().is_some_and(|c| c.is_ascii_digit()) {
			self.advance();
		}

		if self.peek() == Some('.') && self.peek_second().is_some_and(|c| c.is_ascii_digit()) {
			self.advance(); // consume '.'
			while self.peek().is_some_and(|c| c.is_ascii_digit()) {
				self.advance();
			}
		}

		self.token(TokenKind::Number)
	}

	/// Scan an identifier or keyword
	fn identifier(&mut self) -> Token<'a> {
		while self.peek().is_some_and(|c| c.is_ascii_alphanumeric() || c == '_') {
			self.advance();
		}
		self.token(TokenKind::keyword_or_identifier(&self.source[self.start..self.cursor]))
	}
}
