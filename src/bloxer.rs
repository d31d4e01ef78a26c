use std::{
	fs::{read_to_string, File},
	io::BufWriter,
	path::{Path, PathBuf},
};

use anyhow::Context;

use crate::{compiler::compile, vm::Vm};

/// Drives the whole pipeline: source text in, program effects out.
///
/// Compilation and execution are strictly sequential; the compiler owns the
/// chunk while building it and hands it to the VM afterwards.
pub struct Bloxer {
	trace_path: Option<PathBuf>,
}

impl Bloxer {
	pub fn new() -> Self { Self { trace_path: None } }

	/// Like [`Bloxer::new`], but also writes a disassembly line for every
	/// executed instruction to the file at `path`.
	pub fn with_trace(path: PathBuf) -> Self { Self { trace_path: Some(path) } }

	/// Compile and run a source file.
	pub fn run_file(&self, path: &Path) -> crate::Result<()> {
		let source = read_to_string(path).context("Failed to open source file")?;
		self.run(&source)
	}

	/// Compile and run source text, printing program output to stdout.
	pub fn run(&self, source: &str) -> crate::Result<()> {
		let chunk = compile(source)?;
		let mut vm = Vm::new(chunk);
		if let Some(path) = &self.trace_path {
			let file = File::create(path).context("Failed to create trace file")?;
			vm = vm.trace_to(Box::new(BufWriter::new(file)));
		}
		vm.run()?;
		Ok(())
	}
}

impl Default for Bloxer {
	fn default() -> Self { Self::new() }
}
