//! Memory footprint (`memfootprint`)

// Modules
mod args;
mod output;

// Imports
use {
	self::{args::Args, output::OutputFile},
	anyhow::Context,
	clap::Parser,
	memfootprint::{
		config::Config,
		data,
		sim::IntervalStats,
		Footprint,
		IntervalController,
		Mode,
		Simulator,
		TextReporter,
		TraceReader,
		WorkingSetTracker,
	},
	memfootprint_util::logger,
	std::{
		fs,
		io::{BufReader, BufWriter},
		path::Path,
	},
};

/// Default output file for full runs
const FULL_RUN_OUTPUT: &str = "memfootprint_full_int.out";

/// Default output file when using intervals
const INTERVALS_OUTPUT: &str = "memfootprint_phases_int.out";

fn main() -> Result<(), anyhow::Error> {
	// Get arguments
	let args = Args::parse();
	logger::pre_init::debug(format!("Args: {args:?}"));

	// Initialize logging
	logger::init(args.log_file.as_deref(), args.log_file_append);

	// Read the config file
	let config = match &args.config_file {
		Some(config_path) => {
			let config_file = fs::File::open(config_path).context("Unable to open config file")?;
			serde_json::from_reader::<_, Config>(BufReader::new(config_file)).context("Unable to parse config file")?
		},
		None => Config::default(),
	};
	let valid_config = config.validate().context("Invalid config")?;
	tracing::debug!(?config, "Loaded config");

	// Read the trace file
	let trace_file = fs::File::open(&args.trace_file).context("Unable to open trace file")?;
	let mut trace_reader = TraceReader::from_reader(BufReader::new(trace_file)).context("Unable to parse trace")?;
	tracing::trace!(target: "memfootprint::parse_trace", header = ?trace_reader.header(), "Parsed trace");

	// Create the output.
	// Note: When using intervals, we truncate it right away, since it's appended to during the run.
	//       For full runs, it's only created when the final footprint is written.
	let output_path = args.output_file.as_deref().unwrap_or_else(|| match valid_config.mode {
		Mode::FullRun => Path::new(FULL_RUN_OUTPUT),
		Mode::Intervals { .. } => Path::new(INTERVALS_OUTPUT),
	});
	let output_file = match valid_config.mode {
		Mode::FullRun => OutputFile::lazy(output_path),
		Mode::Intervals { .. } => OutputFile::create(output_path)?,
	};

	// Run the simulator
	let tracker = WorkingSetTracker::new(valid_config.cache_granularity, valid_config.page_granularity);
	let mut controller = IntervalController::new(
		valid_config.mode,
		tracker,
		TextReporter::new(output_file),
	);
	let mut sim = Simulator::new(valid_config.debug_output_period).with_interval_collection(args.data_output_file.is_some());
	let run_output = sim
		.run(&mut trace_reader, &mut controller)
		.context("Unable to run simulator")?;
	let last = controller.finish().context("Unable to finish run")?;

	self::log_summary(&run_output.interval_stats, &last, run_output.total_instructions);

	if let Some(data_output_path) = &args.data_output_file {
		let data = data::Data {
			cache_block_size: valid_config.cache_granularity.block_size(),
			page_size: valid_config.page_granularity.block_size(),
			interval_size: config.interval_size,
			intervals: run_output.intervals,
			last,
			total_records: run_output.records,
			total_instructions: run_output.total_instructions,
		};

		let data_output_file = fs::File::create(data_output_path).context("Unable to create data output file")?;
		serde_json::to_writer(BufWriter::new(data_output_file), &data)
			.context("Unable to write to data output file")?;
	}

	Ok(())
}

/// Logs a summary of the run
fn log_summary(interval_stats: &IntervalStats, last: &Footprint, total_instructions: u64) {
	tracing::info!("Instructions: {total_instructions}");
	tracing::info!("Final footprint: {last}");
	if interval_stats.is_empty() {
		return;
	}

	let names = ["Data cache blocks", "Data pages", "Instruction cache blocks", "Instruction pages"];
	for (name, average) in names.into_iter().zip(interval_stats.counts()) {
		tracing::info!(
			"{name} per interval: {:.2} ± {:.2} ({} intervals)",
			average.mean(),
			average.error(),
			interval_stats.len()
		);
	}
}
