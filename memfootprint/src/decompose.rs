//! Address decomposition

// Imports
use std::{fmt, ops::RangeInclusive};

/// Block granularity.
///
/// Stored as the base-2 logarithm of the block size, e.g. `6` for 64-byte
/// cache blocks or `12` for 4KiB pages.
#[derive(PartialEq, Eq, Clone, Copy)]
pub struct Granularity(u32);

impl Granularity {
	/// Creates a granularity from a shift amount.
	///
	/// Returns `None` if `shift` would shift out every address bit.
	pub const fn new(shift: u32) -> Option<Self> {
		match shift < u64::BITS {
			true => Some(Self(shift)),
			false => None,
		}
	}

	/// Returns the shift amount
	pub const fn shift(self) -> u32 {
		self.0
	}

	/// Returns the block size, in bytes
	pub const fn block_size(self) -> u64 {
		1 << self.0
	}

	/// Returns the block index containing `addr`
	pub const fn block_of(self, addr: u64) -> u64 {
		addr >> self.0
	}
}

impl fmt::Debug for Granularity {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Granularity({} bytes)", self.block_size())
	}
}

/// Returns all block indices touched by an access of `size` bytes at `addr`.
///
/// The range is ascending and inclusive, so an access straddling a block
/// boundary yields both blocks. A zero-sized access touches nothing and
/// yields an empty range.
///
/// Accesses running past the end of the address space are clamped to the
/// last block.
pub fn range_blocks(addr: u64, size: u64, granularity: Granularity) -> RangeInclusive<u64> {
	let Some(last_offset) = size.checked_sub(1) else {
		// Note: `1..=0` is empty, `RangeInclusive` has no dedicated empty constructor
		return 1..=0;
	};

	let first = granularity.block_of(addr);
	let last = granularity.block_of(addr.saturating_add(last_offset));
	first..=last
}

#[cfg(test)]
mod tests {
	use super::*;

	const CACHE: Granularity = match Granularity::new(6) {
		Some(granularity) => granularity,
		None => panic!("Invalid granularity"),
	};
	const PAGE: Granularity = match Granularity::new(12) {
		Some(granularity) => granularity,
		None => panic!("Invalid granularity"),
	};

	#[test]
	fn zero_size_is_empty() {
		for addr in [0, 0x1000, 0x103f, u64::MAX] {
			assert_eq!(range_blocks(addr, 0, CACHE).count(), 0);
			assert_eq!(range_blocks(addr, 0, PAGE).count(), 0);
		}
	}

	#[test]
	fn within_one_block() {
		let blocks = range_blocks(0x1000, 64, CACHE).collect::<Vec<_>>();
		assert_eq!(blocks, [0x40]);

		let blocks = range_blocks(0x1008, 8, CACHE).collect::<Vec<_>>();
		assert_eq!(blocks, [0x40]);
	}

	#[test]
	fn straddles_boundary() {
		// Last byte of one block plus the first of the next
		let blocks = range_blocks(0x103f, 2, CACHE).collect::<Vec<_>>();
		assert_eq!(blocks, [0x40, 0x41]);

		let blocks = range_blocks(0x1000, 128, CACHE).collect::<Vec<_>>();
		assert_eq!(blocks, [0x1000 >> 6, 0x107f >> 6]);

		let pages = range_blocks(0x1000, 128, PAGE).collect::<Vec<_>>();
		assert_eq!(pages, [1]);
	}

	#[test]
	fn matches_first_and_last_byte() {
		for (addr, size) in [(0, 1), (63, 1), (63, 65), (0x7fff_ffff, 4096), (0x1234_5678, 300)] {
			let blocks = range_blocks(addr, size, CACHE).collect::<Vec<_>>();
			let expected = ((addr >> 6)..=((addr + size - 1) >> 6)).collect::<Vec<_>>();
			assert_eq!(blocks, expected, "addr={addr:#x}, size={size}");
			assert!(!blocks.is_empty());
		}
	}

	#[test]
	fn clamps_at_end_of_address_space() {
		let blocks = range_blocks(u64::MAX - 1, 16, PAGE).collect::<Vec<_>>();
		assert_eq!(blocks, [u64::MAX >> 12]);
	}

	#[test]
	fn rejects_full_shift() {
		assert!(Granularity::new(63).is_some());
		assert!(Granularity::new(64).is_none());
	}
}
