//! Reporting

// Imports
use {crate::tracker::Footprint, anyhow::Context, std::io};

/// Reporter
pub trait Reporter {
	/// Reports the footprint of a finished interval
	fn report_interval(&mut self, footprint: &Footprint) -> Result<(), anyhow::Error>;

	/// Reports the footprint at the end of the run, alongside the total instructions retired
	fn report_final(&mut self, footprint: &Footprint, total_instructions: u64) -> Result<(), anyhow::Error>;
}

impl<R: Reporter + ?Sized> Reporter for &mut R {
	fn report_interval(&mut self, footprint: &Footprint) -> Result<(), anyhow::Error> {
		(**self).report_interval(footprint)
	}

	fn report_final(&mut self, footprint: &Footprint, total_instructions: u64) -> Result<(), anyhow::Error> {
		(**self).report_final(footprint, total_instructions)
	}
}

/// Text reporter.
///
/// Writes one line per report with the data cache blocks, data pages,
/// instruction cache blocks and instruction pages, separated by spaces.
/// The final report is followed by a line with the total number of instructions.
#[derive(Debug)]
pub struct TextReporter<W> {
	/// Writer
	writer: W,

	/// Lines written
	lines_written: usize,
}

impl<W: io::Write> TextReporter<W> {
	/// Creates a new text reporter
	pub fn new(writer: W) -> Self {
		Self {
			writer,
			lines_written: 0,
		}
	}

	/// Returns the number of footprint lines written
	pub fn lines_written(&self) -> usize {
		self.lines_written
	}

	/// Returns the inner writer
	pub fn into_inner(self) -> W {
		self.writer
	}

	fn write_footprint(&mut self, footprint: &Footprint) -> Result<(), anyhow::Error> {
		writeln!(self.writer, "{footprint}").context("Unable to write footprint")?;
		self.lines_written += 1;
		Ok(())
	}
}

impl<W: io::Write> Reporter for TextReporter<W> {
	fn report_interval(&mut self, footprint: &Footprint) -> Result<(), anyhow::Error> {
		self.write_footprint(footprint)?;

		// Note: Flush each interval, so partial results survive if the run is cut short
		self.writer.flush().context("Unable to flush output")
	}

	fn report_final(&mut self, footprint: &Footprint, total_instructions: u64) -> Result<(), anyhow::Error> {
		self.write_footprint(footprint)?;
		writeln!(self.writer, "number of instructions: {total_instructions}")
			.context("Unable to write total instructions")?;

		self.writer.flush().context("Unable to flush output")
	}
}
