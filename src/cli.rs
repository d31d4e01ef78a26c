use std::path::PathBuf;

use palc::Parser;

/// CLI arguments
#[derive(Parser)]
#[command(name = "bloxer", after_long_help = "A single-pass bytecode compiler and stack VM for Lox.")]
pub struct Cli {
	/// Script to compile and run
	pub path: PathBuf,

	/// Write a disassembly line for each executed instruction to this file
	#[arg(long)]
	pub debug: Option<PathBuf>,
}
