use std::fmt;

/// A runtime error. Execution aborts at the first one; there is no recovery
/// and no stack cleanup beyond reporting.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("runtime error: {kind}")]
pub struct RuntimeError {
	kind: RuntimeErrorKind,
}

impl From<RuntimeErrorKind> for RuntimeError {
	fn from(kind: RuntimeErrorKind) -> Self { Self { kind } }
}

/// The type mismatches and lookup failures the dispatch loop can hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeErrorKind {
	NumberOperand,
	NumberOperands,
	NumberOrStringOperands,
	UndefinedVariable,
}

impl fmt::Display for RuntimeErrorKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		use RuntimeErrorKind::*;
		let message = match self {
			NumberOperand => "operand must be a number",
			NumberOperands => "operands must be numbers",
			NumberOrStringOperands => "operands must be two numbers or two strings",
			UndefinedVariable => "undefined variable",
		};
		f.write_str(message)
	}
}
