//! Memory footprint (`memfootprint`)
//!
//! Estimates the working set of a program, as the number of distinct cache
//! blocks and pages touched by its data references and instruction fetches,
//! either over the whole run or per fixed number of instructions.

// Modules
pub mod config;
pub mod data;
pub mod decompose;
pub mod interval;
pub mod report;
pub mod sim;
pub mod table;
pub mod trace;
pub mod tracker;

// Exports
pub use self::{
	decompose::{range_blocks, Granularity},
	interval::{IntervalController, Mode},
	report::{Reporter, TextReporter},
	sim::Simulator,
	table::SparseBitmapTable,
	trace::{TraceReader, TraceWriter},
	tracker::{Footprint, MemoryAccess, Stream, WorkingSetTracker},
};
