pub mod compiler;
pub mod scanner;
pub mod vm;

use crate::error::{compiler::CompileError, scanner::ScanError, vm::RuntimeError};

/// Top-level error type for the compile-then-execute pipeline.
///
/// The three user-visible families are flat; the first error at any stage
/// terminates the pipeline. `Internal` is reserved for host-level failures
/// that should never reach a user with a well-formed setup.
#[derive(thiserror::Error, Debug)]
pub enum Error {
	/// Internal error, should never happen
	#[error("internal error: {0}")]
	Internal(#[from] anyhow::Error),
	#[error(transparent)]
	Scan(#[from] ScanError),
	#[error(transparent)]
	Compile(#[from] CompileError),
	#[error(transparent)]
	Runtime(#[from] RuntimeError),
}
