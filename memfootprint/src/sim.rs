//! Simulator

// Imports
use {
	crate::{
		interval::IntervalController,
		report::Reporter,
		trace::{RecordKind, TraceReader},
		tracker::Footprint,
	},
	anyhow::Context,
	average::Estimate,
	std::{
		io,
		time::{Duration, Instant},
	},
};

/// Simulator.
///
/// Replays a trace into an [`IntervalController`], standing in for
/// the instrumentation that would otherwise deliver each access.
#[derive(Debug)]
pub struct Simulator {
	/// Debug output period
	///
	/// Interval in which to output progress
	debug_output_period: Duration,

	/// Whether to keep the footprint of every interval
	collect_intervals: bool,
}

impl Simulator {
	/// Creates a new simulator
	pub fn new(debug_output_period: Duration) -> Self {
		Self {
			debug_output_period,
			collect_intervals: false,
		}
	}

	/// Sets whether to keep the footprint of every interval in [`RunOutput::intervals`].
	///
	/// Otherwise only [`RunOutput::interval_stats`] are kept.
	pub fn with_interval_collection(mut self, collect_intervals: bool) -> Self {
		self.collect_intervals = collect_intervals;
		self
	}

	/// Runs the simulator on all records from `trace_reader`, feeding `controller`.
	///
	/// An instruction fetch record is followed by the data records of that
	/// instruction, so each instruction is only retired once the next
	/// instruction fetch arrives, or the trace ends. This keeps the data
	/// references of the instruction ending an interval inside that interval.
	///
	/// Does not finish the controller.
	pub fn run<R: Reporter>(
		&mut self,
		trace_reader: &mut TraceReader<impl io::Read + io::Seek>,
		controller: &mut IntervalController<R>,
	) -> Result<RunOutput, anyhow::Error> {
		// Note: We start in the past so that we output right away at the start
		let mut last_debug_time = Instant::now()
			.checked_sub(self.debug_output_period)
			.unwrap_or_else(Instant::now);

		let total_records = trace_reader.records_remaining();
		let record_it = std::iter::from_fn(|| trace_reader.read_next().transpose());

		let mut output = RunOutput {
			records:            0,
			intervals:          vec![],
			interval_stats:     IntervalStats::new(),
			total_instructions: 0,
		};
		let mut instruction_pending = false;
		for (record_idx, record_res) in record_it.enumerate() {
			let record = record_res.context("Unable to read next record")?;
			output.records += 1;

			if record.kind == RecordKind::Instruction && instruction_pending {
				self.retire_instruction(controller, &mut output)?;
			}

			controller
				.record_access(record.access())
				.context("Unable to record access")?;
			if record.kind == RecordKind::Instruction {
				instruction_pending = true;
			}

			// Then show debug output, if it's been long enough
			let cur_time = Instant::now();
			if cur_time.duration_since(last_debug_time) >= self.debug_output_period {
				let records_processed_percentage = 100.0 * (record_idx as f64 / total_records as f64);
				tracing::info!(
					"[{records_processed_percentage:.2}%] Intervals: {}, Instructions: {}, Chunks: {}, Current: {}",
					controller.intervals_reported(),
					controller.total_instructions(),
					controller.tracker().chunks_len(),
					controller.tracker().snapshot(),
				);
				last_debug_time = cur_time;
			}
		}

		if instruction_pending {
			self.retire_instruction(controller, &mut output)?;
		}

		output.total_instructions = controller.total_instructions();
		Ok(output)
	}

	/// Retires a single instruction, registering any interval it ends
	fn retire_instruction<R: Reporter>(
		&self,
		controller: &mut IntervalController<R>,
		output: &mut RunOutput,
	) -> Result<(), anyhow::Error> {
		let footprint = controller
			.retire_instructions(1)
			.context("Unable to retire instruction")?;

		if let Some(footprint) = footprint {
			output.interval_stats.add(&footprint);
			if self.collect_intervals {
				output.intervals.push(footprint);
			}
		}

		Ok(())
	}
}

/// Output for [`Simulator::run`]
#[derive(Clone, Debug)]
pub struct RunOutput {
	/// Records replayed
	pub records: u64,

	/// Footprints of every finished interval.
	///
	/// Only filled when enabled with [`Simulator::with_interval_collection`]
	pub intervals: Vec<Footprint>,

	/// Statistics over all finished intervals
	pub interval_stats: IntervalStats,

	/// Total instructions retired
	pub total_instructions: u64,
}

/// Running statistics over interval footprints, per count in report order
#[derive(Clone, Debug)]
pub struct IntervalStats {
	counts: [average::Variance; 4],
}

impl IntervalStats {
	/// Creates empty statistics
	pub fn new() -> Self {
		Self {
			counts: std::array::from_fn(|_| average::Variance::new()),
		}
	}

	/// Adds an interval's footprint
	pub fn add(&mut self, footprint: &Footprint) {
		for (stat, count) in self.counts.iter_mut().zip(footprint.counts()) {
			stat.add(count as f64);
		}
	}

	/// Returns the number of intervals added
	pub fn len(&self) -> u64 {
		self.counts[0].len()
	}

	/// Returns if no intervals were added
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Returns the statistics of each count, in report order
	pub fn counts(&self) -> &[average::Variance; 4] {
		&self.counts
	}
}

impl Default for IntervalStats {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn interval_stats_mean() {
		let mut stats = IntervalStats::new();
		assert!(stats.is_empty());

		for data_cache_blocks in [10, 20, 30] {
			stats.add(&Footprint {
				data_cache_blocks,
				data_pages: 1,
				..Footprint::default()
			});
		}

		assert_eq!(stats.len(), 3);
		assert_eq!(stats.counts()[0].mean(), 20.0);
		assert_eq!(stats.counts()[1].mean(), 1.0);
		assert_eq!(stats.counts()[3].mean(), 0.0);
	}
}
