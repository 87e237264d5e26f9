//! Interval controller

// Imports
use {
	crate::{
		report::Reporter,
		tracker::{Footprint, MemoryAccess, WorkingSetTracker},
	},
	anyhow::Context,
	std::num::NonZeroU64,
};

/// Reporting mode
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum Mode {
	/// Accumulate over the whole run, report once at the end
	FullRun,

	/// Report and reset every `size` instructions
	Intervals { size: NonZeroU64 },
}

impl Mode {
	/// Creates a mode from an optional interval size.
	///
	/// `None` selects a full run.
	///
	/// # Errors
	/// Returns an error if the interval size is zero.
	pub fn from_interval_size(interval_size: Option<u64>) -> Result<Self, anyhow::Error> {
		match interval_size {
			None => Ok(Self::FullRun),
			Some(size) => {
				let size = NonZeroU64::new(size).context("Interval size must not be zero")?;
				Ok(Self::Intervals { size })
			},
		}
	}
}

/// Controller state
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum State {
	/// No access recorded yet
	Idle,

	/// Accumulating accesses
	Accumulating,

	/// Run finished
	Terminated,
}

/// Interval controller.
///
/// Drives a [`WorkingSetTracker`], reporting its footprint through a
/// [`Reporter`] at interval boundaries and at the end of the run.
#[derive(Debug)]
pub struct IntervalController<R> {
	/// Mode
	mode: Mode,

	/// Tracker
	tracker: WorkingSetTracker,

	/// Reporter
	reporter: R,

	/// State
	state: State,

	/// Instructions retired since the last interval boundary
	interval_instructions: u64,

	/// Instructions retired since the start
	total_instructions: u64,

	/// Intervals reported so far
	intervals_reported: u64,
}

impl<R: Reporter> IntervalController<R> {
	/// Creates a new, idle, controller
	pub fn new(mode: Mode, tracker: WorkingSetTracker, reporter: R) -> Self {
		Self {
			mode,
			tracker,
			reporter,
			state: State::Idle,
			interval_instructions: 0,
			total_instructions: 0,
			intervals_reported: 0,
		}
	}

	/// Records an access.
	///
	/// # Errors
	/// Returns an error if the controller has already terminated.
	pub fn record_access(&mut self, access: MemoryAccess) -> Result<(), anyhow::Error> {
		match self.state {
			State::Idle => self.state = State::Accumulating,
			State::Accumulating => (),
			State::Terminated => anyhow::bail!("Cannot record accesses after the run finished"),
		}

		self.tracker.record_access(access);
		Ok(())
	}

	/// Retires `count` instructions.
	///
	/// In interval mode, each time the instructions retired since the last boundary
	/// reach the interval size, the footprint is reported and the tracker reset.
	/// Returns the last footprint reported, if any.
	///
	/// # Errors
	/// Returns an error if the controller has already terminated, or if unable to report.
	pub fn retire_instructions(&mut self, count: u64) -> Result<Option<Footprint>, anyhow::Error> {
		anyhow::ensure!(
			self.state != State::Terminated,
			"Cannot retire instructions after the run finished"
		);
		self.total_instructions += count;

		let Mode::Intervals { size } = self.mode else {
			return Ok(None);
		};

		let mut remaining = count;
		let mut last_footprint = None;
		while remaining > 0 {
			let until_boundary = size.get() - self.interval_instructions;
			if remaining < until_boundary {
				self.interval_instructions += remaining;
				break;
			}

			remaining -= until_boundary;
			last_footprint = Some(self.end_interval().context("Unable to end interval")?);
		}

		Ok(last_footprint)
	}

	/// Finishes the run, reporting the final footprint.
	///
	/// # Errors
	/// Returns an error if the controller has already terminated, or if unable to report.
	pub fn finish(&mut self) -> Result<Footprint, anyhow::Error> {
		anyhow::ensure!(self.state != State::Terminated, "Run already finished");
		self.state = State::Terminated;

		let footprint = self.tracker.snapshot();
		tracing::debug!(?footprint, total_instructions = self.total_instructions, "Reporting final footprint");
		self.reporter
			.report_final(&footprint, self.total_instructions)
			.context("Unable to report final footprint")?;

		Ok(footprint)
	}

	/// Reports the current interval and starts a new one
	fn end_interval(&mut self) -> Result<Footprint, anyhow::Error> {
		let footprint = self.tracker.snapshot();
		tracing::trace!(interval = self.intervals_reported, ?footprint, "Interval finished");
		self.reporter
			.report_interval(&footprint)
			.context("Unable to report interval footprint")?;

		self.tracker.reset_all();
		self.interval_instructions = 0;
		self.intervals_reported += 1;

		Ok(footprint)
	}

	/// Returns the mode
	pub fn mode(&self) -> Mode {
		self.mode
	}

	/// Returns the state
	pub fn state(&self) -> State {
		self.state
	}

	/// Returns the tracker
	pub fn tracker(&self) -> &WorkingSetTracker {
		&self.tracker
	}

	/// Returns the total number of instructions retired
	pub fn total_instructions(&self) -> u64 {
		self.total_instructions
	}

	/// Returns the number of instructions retired in the current interval
	pub fn interval_instructions(&self) -> u64 {
		self.interval_instructions
	}

	/// Returns the number of intervals reported
	pub fn intervals_reported(&self) -> u64 {
		self.intervals_reported
	}

	/// Returns the reporter
	pub fn into_reporter(self) -> R {
		self.reporter
	}
}
