#[cfg(test)]
mod tests {
	use std::path::PathBuf;

	#[test]
	fn test_blox_file() {
		let bloxer = bloxer::Bloxer::new();
		let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests").join("test.blox");
		let result = bloxer.run_file(&path);
		assert!(result.is_ok());
	}
}
