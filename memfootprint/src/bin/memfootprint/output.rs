//! Output file

// Imports
use {
	anyhow::Context,
	std::{
		fs,
		io::{self, BufWriter},
		path::PathBuf,
	},
};

/// Output file.
///
/// Only created (or truncated) on the first write, unless created eagerly
/// with [`OutputFile::create`].
#[derive(Debug)]
pub struct OutputFile {
	/// Path
	path: PathBuf,

	/// File, once created
	file: Option<BufWriter<fs::File>>,
}

impl OutputFile {
	/// Creates an output file that is only created on the first write
	pub fn lazy(path: impl Into<PathBuf>) -> Self {
		Self {
			path: path.into(),
			file: None,
		}
	}

	/// Creates the output file right away, truncating it
	pub fn create(path: impl Into<PathBuf>) -> Result<Self, anyhow::Error> {
		let path = path.into();
		let file = fs::File::create(&path).with_context(|| format!("Unable to create output file {path:?}"))?;
		Ok(Self {
			path,
			file: Some(BufWriter::new(file)),
		})
	}

	/// Returns the file, creating it if it doesn't exist yet
	fn file(&mut self) -> Result<&mut BufWriter<fs::File>, io::Error> {
		let file = match self.file.take() {
			Some(file) => file,
			None => {
				tracing::debug!(path = ?self.path, "Creating output file");
				BufWriter::new(fs::File::create(&self.path)?)
			},
		};

		Ok(self.file.insert(file))
	}
}

impl io::Write for OutputFile {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		self.file()?.write(buf)
	}

	fn flush(&mut self) -> io::Result<()> {
		match &mut self.file {
			Some(file) => file.flush(),
			None => Ok(()),
		}
	}
}

#[cfg(test)]
mod tests {
	use {super::*, std::io::Write};

	fn temp_path(name: &str) -> PathBuf {
		std::env::temp_dir().join(format!("memfootprint-{}-{name}", std::process::id()))
	}

	#[test]
	fn lazy_keeps_previous_until_written() {
		let path = temp_path("lazy");
		fs::write(&path, "previous\n").expect("Unable to write file");

		let mut output = OutputFile::lazy(&path);
		output.flush().expect("Unable to flush");
		assert_eq!(fs::read_to_string(&path).expect("Unable to read file"), "previous\n");

		writeln!(output, "1 2 3 4").expect("Unable to write");
		output.flush().expect("Unable to flush");
		assert_eq!(fs::read_to_string(&path).expect("Unable to read file"), "1 2 3 4\n");

		fs::remove_file(&path).expect("Unable to remove file");
	}

	#[test]
	fn create_truncates_right_away() {
		let path = temp_path("eager");
		fs::write(&path, "previous\n").expect("Unable to write file");

		let output = OutputFile::create(&path).expect("Unable to create output");
		assert_eq!(fs::read_to_string(&path).expect("Unable to read file"), "");
		drop(output);

		fs::remove_file(&path).expect("Unable to remove file");
	}
}
