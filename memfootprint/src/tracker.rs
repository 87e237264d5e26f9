//! Working set tracker

// Imports
use {
	crate::{
		decompose::{self, Granularity},
		table::SparseBitmapTable,
	},
	itertools::Itertools,
	std::fmt,
};

/// Access stream
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum Stream {
	/// Data reference
	Data,

	/// Instruction fetch
	Instruction,
}

/// Memory access
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub struct MemoryAccess {
	/// Address
	pub addr: u64,

	/// Size, in bytes
	pub size: u64,

	/// Stream
	pub stream: Stream,
}

/// Working set tracker.
///
/// Tracks the distinct cache blocks and pages touched by data references
/// and instruction fetches, each in its own table.
#[derive(Debug)]
pub struct WorkingSetTracker {
	/// Cache block granularity
	cache_granularity: Granularity,

	/// Page granularity
	page_granularity: Granularity,

	// Tables, by stream and granularity
	data_cache:  SparseBitmapTable,
	data_page:   SparseBitmapTable,
	instr_cache: SparseBitmapTable,
	instr_page:  SparseBitmapTable,
}

impl WorkingSetTracker {
	/// Creates a new tracker with all tables empty
	pub fn new(cache_granularity: Granularity, page_granularity: Granularity) -> Self {
		Self {
			cache_granularity,
			page_granularity,
			data_cache: SparseBitmapTable::new(),
			data_page: SparseBitmapTable::new(),
			instr_cache: SparseBitmapTable::new(),
			instr_page: SparseBitmapTable::new(),
		}
	}

	/// Records an access.
	///
	/// Marks every cache block and page the access spans in its stream's tables.
	pub fn record_access(&mut self, access: MemoryAccess) {
		let (cache_table, page_table) = match access.stream {
			Stream::Data => (&mut self.data_cache, &mut self.data_page),
			Stream::Instruction => (&mut self.instr_cache, &mut self.instr_page),
		};

		for block in decompose::range_blocks(access.addr, access.size, self.cache_granularity) {
			cache_table.mark(block);
		}
		for page in decompose::range_blocks(access.addr, access.size, self.page_granularity) {
			page_table.mark(page);
		}
	}

	/// Returns the footprint accumulated since the last reset
	pub fn snapshot(&self) -> Footprint {
		Footprint {
			data_cache_blocks:  self.data_cache.popcount_all(),
			data_pages:         self.data_page.popcount_all(),
			instr_cache_blocks: self.instr_cache.popcount_all(),
			instr_pages:        self.instr_page.popcount_all(),
		}
	}

	/// Clears all tables
	pub fn reset_all(&mut self) {
		self.data_cache.clear();
		self.data_page.clear();
		self.instr_cache.clear();
		self.instr_page.clear();
	}

	/// Returns the total number of chunks installed across all tables
	pub fn chunks_len(&self) -> usize {
		[&self.data_cache, &self.data_page, &self.instr_cache, &self.instr_page]
			.iter()
			.map(|table| table.chunks_len())
			.sum()
	}

	/// Returns the cache block granularity
	pub fn cache_granularity(&self) -> Granularity {
		self.cache_granularity
	}

	/// Returns the page granularity
	pub fn page_granularity(&self) -> Granularity {
		self.page_granularity
	}
}

/// Footprint.
///
/// Number of distinct cache blocks and pages touched, per stream.
#[derive(PartialEq, Eq, Clone, Copy, Default, Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct Footprint {
	pub data_cache_blocks:  u64,
	pub data_pages:         u64,
	pub instr_cache_blocks: u64,
	pub instr_pages:        u64,
}

impl Footprint {
	/// Returns all counts, in report order
	pub fn counts(&self) -> [u64; 4] {
		[
			self.data_cache_blocks,
			self.data_pages,
			self.instr_cache_blocks,
			self.instr_pages,
		]
	}
}

/// Displays the counts separated by spaces, in report order
impl fmt::Display for Footprint {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.counts().iter().format(" "))
	}
}

#[cfg(test)]
mod tests {
	use {super::*, crate::table::CHUNK_CAPACITY};

	fn tracker() -> WorkingSetTracker {
		WorkingSetTracker::new(
			Granularity::new(6).expect("Invalid granularity"),
			Granularity::new(12).expect("Invalid granularity"),
		)
	}

	#[test]
	fn data_access_spanning_two_blocks() {
		let mut tracker = tracker();
		tracker.record_access(MemoryAccess {
			addr:   0x1000,
			size:   128,
			stream: Stream::Data,
		});

		assert_eq!(tracker.snapshot(), Footprint {
			data_cache_blocks:  2,
			data_pages:         1,
			instr_cache_blocks: 0,
			instr_pages:        0,
		});
	}

	#[test]
	fn streams_are_independent() {
		let mut tracker = tracker();
		for stream in [Stream::Data, Stream::Instruction, Stream::Instruction] {
			tracker.record_access(MemoryAccess {
				addr: 0x40_0000,
				size: 4,
				stream,
			});
		}
		tracker.record_access(MemoryAccess {
			addr:   0x40_0040,
			size:   4,
			stream: Stream::Instruction,
		});

		assert_eq!(tracker.snapshot().counts(), [1, 1, 2, 1]);
	}

	#[test]
	fn zero_size_access_is_ignored() {
		let mut tracker = tracker();
		tracker.record_access(MemoryAccess {
			addr:   0x1234,
			size:   0,
			stream: Stream::Data,
		});

		assert_eq!(tracker.snapshot(), Footprint::default());
		assert_eq!(tracker.chunks_len(), 0);
	}

	#[test]
	fn access_across_chunk_boundary() {
		// Note: The last cache block of chunk 0 and the first of chunk 1
		let boundary = CHUNK_CAPACITY << 6;
		let mut tracker = tracker();
		tracker.record_access(MemoryAccess {
			addr:   boundary - 8,
			size:   16,
			stream: Stream::Data,
		});

		assert_eq!(tracker.snapshot().data_cache_blocks, 2);
		assert_eq!(tracker.snapshot().data_pages, 2);
	}

	#[test]
	fn reset_clears_every_table() {
		let mut tracker = tracker();
		for stream in [Stream::Data, Stream::Instruction] {
			tracker.record_access(MemoryAccess {
				addr: 0xdead_b000,
				size: 8192,
				stream,
			});
		}
		assert_ne!(tracker.snapshot(), Footprint::default());

		tracker.reset_all();
		assert_eq!(tracker.snapshot(), Footprint::default());
		assert_eq!(tracker.chunks_len(), 0);
	}

	#[test]
	fn footprint_display() {
		let footprint = Footprint {
			data_cache_blocks:  10,
			data_pages:         2,
			instr_cache_blocks: 7,
			instr_pages:        1,
		};
		assert_eq!(footprint.to_string(), "10 2 7 1");
	}
}
