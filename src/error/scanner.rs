use std::fmt;

/// A lexical error and the line it occurred on.
#[derive(thiserror::Error, Debug)]
#[error("[line {line}] compilation error: {kind}")]
pub struct ScanError {
	line: usize,
	kind: ScanErrorKind,
}

impl ScanError {
	pub(crate) fn new(line: usize, kind: ScanErrorKind) -> Self { Self { line, kind } }
}

/// The lexical errors the scanner can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanErrorKind {
	UnexpectedCharacter(char),
	UnterminatedString,
}

impl fmt::Display for ScanErrorKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		use ScanErrorKind::*;
		match self {
			UnexpectedCharacter(c) => write!(f, "unexpected character '{c}'"),
			UnterminatedString => write!(f, "unterminated string"),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn display() {
		let error = ScanError::new(3, ScanErrorKind::UnexpectedCharacter('@'));
		assert_eq!(error.to_string(), "[line 3] compilation error: unexpected character '@'");

		let error = ScanError::new(7, ScanErrorKind::UnterminatedString);
		assert_eq!(error.to_string(), "[line 7] compilation error: unterminated string");
	}
}
