use bloxer::{cli::Cli, Bloxer};
use palc::Parser;

fn main() {
	let cli = Cli::parse();
	let bloxer = match cli.debug {
		Some(path) => Bloxer::with_trace(path),
		None => Bloxer::new(),
	};
	if let Err(e) = bloxer.run_file(&cli.path) {
		eprintln!("{e}");
		std::process::exit(1);
	}
}
