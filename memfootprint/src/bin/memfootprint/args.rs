//! Arguments

// Imports
use std::path::PathBuf;

/// Arguments
#[derive(Debug)]
#[derive(clap::Parser)]
pub struct Args {
	/// Log file
	///
	/// Specifies a file to perform verbose logging to.
	/// You can use `RUST_LOG_FILE` to set filtering options
	#[clap(long = "log-file")]
	pub log_file: Option<PathBuf>,

	/// Whether to append to the log file
	#[clap(long = "log-file-append")]
	pub log_file_append: bool,

	/// Trace file
	pub trace_file: PathBuf,

	/// Config file
	///
	/// If not passed, uses 64-byte cache blocks, 4KiB pages and a full run.
	#[clap(long = "config")]
	pub config_file: Option<PathBuf>,

	/// Output file.
	///
	/// Defaults to `memfootprint_full_int.out` for full runs and
	/// `memfootprint_phases_int.out` when using intervals.
	#[clap(long = "output")]
	pub output_file: Option<PathBuf>,

	/// Data output file, as json
	#[clap(long = "data-output")]
	pub data_output_file: Option<PathBuf>,
}
