//! Output data

// Imports
use crate::tracker::Footprint;

/// Output data
#[derive(Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct Data {
	/// Cache block size, in bytes
	pub cache_block_size: u64,

	/// Page size, in bytes
	pub page_size: u64,

	/// Instructions per interval, if not a full run
	pub interval_size: Option<u64>,

	/// Footprint of each interval, in order
	pub intervals: Vec<Footprint>,

	/// Footprint since the last interval boundary, at the end of the run
	pub last: Footprint,

	/// Total records replayed
	pub total_records: u64,

	/// Total instructions retired
	pub total_instructions: u64,
}
