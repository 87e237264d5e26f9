//! Utilities

// Modules
pub mod logger;

// Imports
use std::io;

/// Extension trait for `R: io::Read` types to read a byte array
#[extend::ext(name = ReadByteArray)]
pub impl<R: io::Read> R {
	/// Reads a byte array `[u8; N]` from this reader.
	///
	/// Returns `Err` if unable to read exactly `N` bytes.
	fn read_byte_array<const N: usize>(&mut self) -> Result<[u8; N], io::Error> {
		let mut array = [0u8; N];
		self.read_exact(&mut array)?;
		Ok(array)
	}
}

#[cfg(test)]
mod tests {
	use {super::*, std::io::Cursor};

	#[test]
	fn read_byte_array_exact() {
		let mut reader = Cursor::new(b"abcdef".to_vec());
		let first: [u8; 4] = reader.read_byte_array().expect("Unable to read array");
		assert_eq!(&first, b"abcd");

		let rest = reader.read_byte_array::<4>();
		assert!(rest.is_err());
	}
}
