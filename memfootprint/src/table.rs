//! Sparse bitmap table
//!
//! Block indices are split into a chunk id (the high bits) and an offset
//! within that chunk (the low [`CHUNK_CAPACITY_LOG2`] bits). Only chunks that
//! have been touched are allocated, while each chunk is a dense bitmap.

// Imports
use std::fmt;

/// Base-2 logarithm of the number of blocks covered by each chunk
pub const CHUNK_CAPACITY_LOG2: u32 = 12;

/// Number of blocks covered by each chunk
pub const CHUNK_CAPACITY: u64 = 1 << CHUNK_CAPACITY_LOG2;

/// Number of words in each chunk's bitmap
const CHUNK_WORDS: usize = (CHUNK_CAPACITY / u64::BITS as u64) as usize;

/// Base-2 logarithm of the number of buckets in each table
pub const TABLE_CAPACITY_LOG2: u32 = 14;

/// Number of buckets in each table
pub const TABLE_CAPACITY: usize = 1 << TABLE_CAPACITY_LOG2;

/// Chain capacity each bucket may keep across a clear
const BUCKET_RETAINED_CAPACITY: usize = 4;

// Note: A mismatch between these would silently mark bits of a neighbouring chunk.
const _: () = {
	assert!(CHUNK_CAPACITY_LOG2 <= u32::BITS);
	assert!(CHUNK_CAPACITY.is_power_of_two());
	assert!(CHUNK_CAPACITY % u64::BITS as u64 == 0);
	assert!(CHUNK_WORDS as u64 * u64::BITS as u64 == CHUNK_CAPACITY);
	assert!(TABLE_CAPACITY_LOG2 > 0 && TABLE_CAPACITY_LOG2 < u64::BITS);
};

/// Chunk id.
///
/// Identifies the span of [`CHUNK_CAPACITY`] blocks a chunk covers.
#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash, Debug)]
pub struct ChunkId(u64);

impl ChunkId {
	/// Creates a chunk id from a raw value
	pub const fn new(id: u64) -> Self {
		Self(id)
	}

	/// Returns the chunk id as a `u64`
	pub const fn to_u64(self) -> u64 {
		self.0
	}

	/// Returns the bucket this chunk id belongs to
	fn bucket_idx(self) -> usize {
		// Note: Fibonacci hashing, nearby chunk ids land in distant buckets
		(self.0.wrapping_mul(0x9e37_79b9_7f4a_7c15) >> (u64::BITS - TABLE_CAPACITY_LOG2)) as usize
	}
}

/// Offset of a block within its chunk.
///
/// Always in `0..CHUNK_CAPACITY`.
#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash, Debug)]
pub struct Offset(u32);

impl Offset {
	/// Returns the offset as a `usize`
	pub const fn to_usize(self) -> usize {
		self.0 as usize
	}
}

/// Splits a block index into its chunk id and offset
pub const fn split(block: u64) -> (ChunkId, Offset) {
	let id = block >> CHUNK_CAPACITY_LOG2;
	let offset = block & (CHUNK_CAPACITY - 1);
	(ChunkId(id), Offset(offset as u32))
}

/// Chunk.
///
/// One bit per block of the span it covers.
#[derive(Clone)]
pub struct Chunk {
	words: [u64; CHUNK_WORDS],
}

impl Chunk {
	/// Creates an empty chunk
	pub const fn new() -> Self {
		Self { words: [0; CHUNK_WORDS] }
	}

	/// Sets the bit at `offset`.
	///
	/// Returns whether the bit was previously unset.
	pub fn set(&mut self, offset: Offset) -> bool {
		let (word, mask) = Self::locate(offset);
		let was_unset = self.words[word] & mask == 0;
		self.words[word] |= mask;
		was_unset
	}

	/// Returns if the bit at `offset` is set
	pub fn is_set(&self, offset: Offset) -> bool {
		let (word, mask) = Self::locate(offset);
		self.words[word] & mask != 0
	}

	/// Returns the number of set bits
	pub fn count_ones(&self) -> u64 {
		self.words.iter().map(|word| u64::from(word.count_ones())).sum()
	}

	/// Returns the word index and bit mask for `offset`
	fn locate(offset: Offset) -> (usize, u64) {
		let offset = offset.to_usize();
		(offset / u64::BITS as usize, 1 << (offset % u64::BITS as usize))
	}
}

impl Default for Chunk {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Debug for Chunk {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Chunk").field("set", &self.count_ones()).finish()
	}
}

/// Bucket entry
struct Entry {
	/// Chunk id
	id: ChunkId,

	/// Chunk
	// Note: Boxed so that growing a bucket doesn't move whole bitmaps around
	chunk: Box<Chunk>,
}

/// Sparse bitmap table.
///
/// Maps chunk ids to chunks, with a fixed number of buckets, each holding
/// the chain of entries that hashed to it.
pub struct SparseBitmapTable {
	/// Buckets
	buckets: Box<[Vec<Entry>]>,

	/// Number of installed chunks
	chunks_len: usize,
}

impl SparseBitmapTable {
	/// Creates an empty table
	pub fn new() -> Self {
		Self {
			buckets:    Self::empty_buckets(),
			chunks_len: 0,
		}
	}

	/// Returns the chunk with id `id`, if installed
	pub fn lookup(&self, id: ChunkId) -> Option<&Chunk> {
		self.buckets[id.bucket_idx()]
			.iter()
			.find(|entry| entry.id == id)
			.map(|entry| &*entry.chunk)
	}

	/// Installs a new, empty, chunk with id `id`.
	///
	/// # Errors
	/// Returns an error if a chunk with id `id` is already installed.
	pub fn install(&mut self, id: ChunkId) -> Result<&mut Chunk, anyhow::Error> {
		anyhow::ensure!(self.lookup(id).is_none(), "Chunk already installed: {id:?}");
		Ok(self.get_or_install(id))
	}

	/// Returns the chunk with id `id`, installing an empty one if missing
	pub fn get_or_install(&mut self, id: ChunkId) -> &mut Chunk {
		let bucket = &mut self.buckets[id.bucket_idx()];
		let entry_idx = match bucket.iter().position(|entry| entry.id == id) {
			Some(entry_idx) => entry_idx,
			None => {
				bucket.push(Entry {
					id,
					chunk: Box::new(Chunk::new()),
				});
				self.chunks_len += 1;
				bucket.len() - 1
			},
		};

		&mut *bucket[entry_idx].chunk
	}

	/// Marks block `block` as touched
	pub fn mark(&mut self, block: u64) {
		let (id, offset) = self::split(block);
		self.get_or_install(id).set(offset);
	}

	/// Returns if block `block` has been marked
	pub fn is_marked(&self, block: u64) -> bool {
		let (id, offset) = self::split(block);
		self.lookup(id).is_some_and(|chunk| chunk.is_set(offset))
	}

	/// Returns the number of distinct blocks marked since the last clear
	pub fn popcount_all(&self) -> u64 {
		self.buckets
			.iter()
			.flatten()
			.map(|entry| entry.chunk.count_ones())
			.sum()
	}

	/// Removes all chunks.
	///
	/// Afterwards the table is in the same state as a newly created one.
	pub fn clear(&mut self) {
		// Note: Chunks are always freed, but short chains keep their allocation,
		//       so a reset doesn't reallocate every bucket.
		//       Long chains are shrunk so a long run doesn't keep the peak interval's memory alive.
		for bucket in &mut self.buckets {
			bucket.clear();
			if bucket.capacity() > BUCKET_RETAINED_CAPACITY {
				bucket.shrink_to_fit();
			}
		}
		self.chunks_len = 0;
	}

	/// Returns the number of installed chunks
	pub fn chunks_len(&self) -> usize {
		self.chunks_len
	}

	/// Returns if no chunks are installed
	pub fn is_empty(&self) -> bool {
		self.chunks_len == 0
	}

	fn empty_buckets() -> Box<[Vec<Entry>]> {
		std::iter::repeat_with(Vec::new).take(TABLE_CAPACITY).collect()
	}
}

impl Default for SparseBitmapTable {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Debug for SparseBitmapTable {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SparseBitmapTable")
			.field("chunks_len", &self.chunks_len)
			.finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn split_offsets_in_range() {
		for block in [0, 1, CHUNK_CAPACITY - 1, CHUNK_CAPACITY, u64::MAX] {
			let (id, offset) = split(block);
			assert!((offset.to_usize() as u64) < CHUNK_CAPACITY);
			assert_eq!((id.to_u64() << CHUNK_CAPACITY_LOG2) | offset.to_usize() as u64, block);
		}
	}

	#[test]
	fn mark_is_idempotent() {
		let mut table = SparseBitmapTable::new();
		table.mark(42);
		assert_eq!(table.popcount_all(), 1);

		table.mark(42);
		assert_eq!(table.popcount_all(), 1);
		assert!(table.is_marked(42));
		assert!(!table.is_marked(43));
	}

	#[test]
	fn counts_distinct_blocks() {
		let mut table = SparseBitmapTable::new();
		let blocks = (0..5000).map(|idx| idx * 7919).collect::<Vec<u64>>();
		for &block in &blocks {
			table.mark(block);
		}
		for &block in &blocks {
			table.mark(block);
		}

		assert_eq!(table.popcount_all(), blocks.len() as u64);
	}

	#[test]
	fn chunk_boundary_uses_two_chunks() {
		let mut table = SparseBitmapTable::new();
		table.mark(CHUNK_CAPACITY - 1);
		table.mark(CHUNK_CAPACITY);

		assert_eq!(table.chunks_len(), 2);
		assert_eq!(table.popcount_all(), 2);
		assert!(table.lookup(ChunkId::new(0)).is_some());
		assert!(table.lookup(ChunkId::new(1)).is_some());
	}

	#[test]
	fn chains_on_collision() {
		// Note: More chunks than buckets forces chaining
		let mut table = SparseBitmapTable::new();
		let chunks = 3 * TABLE_CAPACITY as u64;
		for id in 0..chunks {
			table.mark(id << CHUNK_CAPACITY_LOG2);
		}

		assert_eq!(table.chunks_len(), chunks as usize);
		assert_eq!(table.popcount_all(), chunks);
		for id in 0..chunks {
			assert!(table.is_marked(id << CHUNK_CAPACITY_LOG2));
		}
	}

	#[test]
	fn install_rejects_duplicates() {
		let mut table = SparseBitmapTable::new();
		let id = ChunkId::new(7);
		assert!(table.lookup(id).is_none());

		table.install(id).expect("Unable to install chunk").set(split(5).1);
		assert!(table.install(id).is_err());
		assert_eq!(table.chunks_len(), 1);
		assert_eq!(table.popcount_all(), 1);
	}

	#[test]
	fn clear_resets_to_empty() {
		let mut table = SparseBitmapTable::new();
		for block in 0..10_000 {
			table.mark(block * 3);
		}
		table.clear();

		assert_eq!(table.popcount_all(), 0);
		assert!(table.is_empty());
		assert!(table.lookup(ChunkId::new(0)).is_none());

		// And behaves just like a new table afterwards
		table.install(ChunkId::new(0)).expect("Unable to install chunk after clear");
		table.mark(1);
		assert_eq!(table.chunks_len(), 1);
		assert_eq!(table.popcount_all(), 1);
	}

	#[test]
	fn clear_keeps_bucket_array() {
		let mut table = SparseBitmapTable::new();
		for id in 0..3 * TABLE_CAPACITY as u64 {
			table.mark(id << CHUNK_CAPACITY_LOG2);
		}
		let buckets_ptr = table.buckets.as_ptr();
		table.clear();

		assert_eq!(table.buckets.as_ptr(), buckets_ptr);
		assert_eq!(table.buckets.len(), TABLE_CAPACITY);
		assert!(table
			.buckets
			.iter()
			.all(|bucket| bucket.is_empty() && bucket.capacity() <= BUCKET_RETAINED_CAPACITY));

		table.mark(0);
		assert_eq!(table.chunks_len(), 1);
		assert_eq!(table.popcount_all(), 1);
	}

	#[test]
	fn chunk_set_reports_new_bits() {
		let mut chunk = Chunk::new();
		let (_, offset) = split(CHUNK_CAPACITY - 1);
		assert!(chunk.set(offset));
		assert!(!chunk.set(offset));
		assert!(chunk.is_set(offset));
		assert_eq!(chunk.count_ones(), 1);
	}
}
