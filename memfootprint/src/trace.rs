//! Memory access traces.
//!
//! A trace is a magic, a header and a sequence of fixed-size records,
//! each describing a single data reference or instruction fetch.

// Imports
use {
	crate::tracker::{MemoryAccess, Stream},
	anyhow::Context,
	byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt},
	memfootprint_util::ReadByteArray,
	std::io,
};

/// Trace reader
#[derive(Clone, Debug)]
pub struct TraceReader<R> {
	/// Header
	header: Header,

	/// Records remaining
	records_remaining: u64,

	/// Reader
	reader: R,
}

impl<R: io::Read + io::Seek> TraceReader<R> {
	/// Parses a trace from a reader
	pub fn from_reader(mut reader: R) -> Result<Self, anyhow::Error> {
		// Read the magic
		let magic = reader.read_byte_array().context("Unable to read magic")?;
		anyhow::ensure!(magic == MAGIC, "Found wrong magic {magic:?}, expected {MAGIC:?}");

		// Read the header
		let header = Header::from_reader(&mut reader).context("Unable to read header")?;
		tracing::trace!(?header, "Parsed header");

		// Get the total number of records from the stream length, since
		// the header might not have been written if the writer was interrupted.
		let total_records = {
			let magic_size = MAGIC.len() as u64;
			let header_size = Header::BYTE_SIZE as u64;
			let record_size = Record::BYTE_SIZE as u64;

			let records_start = reader.stream_position().context("Unable to get stream position")?;
			let total_actual_size = reader
				.seek(io::SeekFrom::End(0))
				.context("Unable to get stream length")?;
			reader
				.seek(io::SeekFrom::Start(records_start))
				.context("Unable to seek back to records")?;

			let total_expected_size = magic_size + header_size + header.records * record_size;
			if total_actual_size != total_expected_size {
				tracing::warn!(
					"Trace size differs from expected. Found {total_actual_size}, expected {total_expected_size}"
				);
			}

			total_actual_size.saturating_sub(magic_size + header_size) / record_size
		};

		Ok(Self {
			header,
			records_remaining: total_records,
			reader,
		})
	}

	/// Reads the next record
	pub fn read_next(&mut self) -> Result<Option<Record>, anyhow::Error> {
		// If we're done, return `None`
		if self.records_remaining == 0 {
			return Ok(None);
		}

		// Else parse the next record and reduce the remaining records
		let record = Record::from_reader(&mut self.reader).context("Unable to read record")?;
		self.records_remaining -= 1;

		Ok(Some(record))
	}

	/// Returns the remaining records
	pub fn records_remaining(&self) -> u64 {
		self.records_remaining
	}

	/// Returns the header
	pub fn header(&self) -> &Header {
		&self.header
	}
}

/// Trace writer
#[derive(Clone, Debug)]
pub struct TraceWriter<W> {
	/// Records written
	records_written: u64,

	/// Instruction records written
	instructions_written: u64,

	/// Writer
	writer: W,
}

impl<W: io::Write + io::Seek> TraceWriter<W> {
	/// Creates a new writer
	pub fn new(mut writer: W) -> Result<Self, anyhow::Error> {
		// Write the magic
		// Note: We rewind to ensure we write at the start, because we then
		//       later come back to write the header
		writer.rewind().context("Unable to rewind to start")?;
		writer.write_all(&MAGIC).context("Unable to write magic")?;

		// Reserve the header
		Header::default()
			.to_writer(&mut writer)
			.context("Unable to reserve header")?;

		Ok(Self {
			records_written: 0,
			instructions_written: 0,
			writer,
		})
	}

	/// Writes a record
	pub fn write(&mut self, record: &Record) -> Result<(), anyhow::Error> {
		record.to_writer(&mut self.writer).context("Unable to write record")?;

		self.records_written += 1;
		if record.kind == RecordKind::Instruction {
			self.instructions_written += 1;
		}
		Ok(())
	}

	/// Finishes writing
	pub fn finish(mut self) -> Result<W, anyhow::Error> {
		// Rewind the writer and write the header
		self.writer
			.seek(io::SeekFrom::Start(MAGIC.len() as u64))
			.context("Unable to seek to header")?;

		let header = Header {
			records:      self.records_written,
			instructions: self.instructions_written,
		};
		header.to_writer(&mut self.writer).context("Unable to write header")?;
		self.writer.flush().context("Unable to flush writer")?;

		Ok(self.writer)
	}
}

/// Magic
pub const MAGIC: [u8; 8] = *b"MFPT v0\0";

/// Header
#[derive(Clone, Copy, Default, Debug)]
pub struct Header {
	/// Total records
	pub records: u64,

	/// Instruction records
	pub instructions: u64,
}

impl Header {
	/// Returns the size of this header (including any padding)
	pub const BYTE_SIZE: usize = 0x18;

	/// Parses a header from a reader
	pub fn from_reader<R: io::Read + io::Seek>(reader: &mut R) -> Result<Self, anyhow::Error> {
		let records = reader.read_u64::<LittleEndian>().context("Unable to read records")?;
		let instructions = reader
			.read_u64::<LittleEndian>()
			.context("Unable to read instructions")?;

		// Then seek over the padding
		reader
			.seek(io::SeekFrom::Current(8))
			.context("Unable to seek over padding")?;

		Ok(Self { records, instructions })
	}

	/// Writes a header to a writer
	pub fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<(), anyhow::Error> {
		writer
			.write_u64::<LittleEndian>(self.records)
			.context("Unable to write records")?;
		writer
			.write_u64::<LittleEndian>(self.instructions)
			.context("Unable to write instructions")?;
		writer.write_all(&[0; 8]).context("Unable to write padding")?;

		Ok(())
	}
}

/// Record
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub struct Record {
	/// Address
	pub addr: u64,

	/// Size, in bytes
	pub size: u64,

	/// Kind
	pub kind: RecordKind,
}

impl Record {
	/// Returns the size of this record
	pub const BYTE_SIZE: usize = 0x10;

	/// Bits of the info word used by the kind
	const KIND_BITS: u32 = 8;

	/// Maximum access size that can be encoded
	pub const MAX_SIZE: u64 = u64::MAX >> Self::KIND_BITS;

	/// Parses a record from a reader
	pub fn from_reader<R: io::Read>(reader: &mut R) -> Result<Self, anyhow::Error> {
		let addr = reader.read_u64::<LittleEndian>().context("Unable to read address")?;
		let info = reader.read_u64::<LittleEndian>().context("Unable to read info")?;

		let size = info >> Self::KIND_BITS;
		let kind = match info & ((1 << Self::KIND_BITS) - 1) {
			0 => RecordKind::Read,
			1 => RecordKind::Write,
			2 => RecordKind::Instruction,
			kind => anyhow::bail!("Unknown record kind: {kind}"),
		};

		Ok(Self { addr, size, kind })
	}

	/// Writes a record to a writer
	pub fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<(), anyhow::Error> {
		anyhow::ensure!(
			self.size <= Self::MAX_SIZE,
			"Record size {} is too large to encode",
			self.size
		);

		let kind_encoded = match self.kind {
			RecordKind::Read => 0,
			RecordKind::Write => 1,
			RecordKind::Instruction => 2,
		};
		let info = (self.size << Self::KIND_BITS) | kind_encoded;

		writer
			.write_u64::<LittleEndian>(self.addr)
			.context("Unable to write address")?;
		writer
			.write_u64::<LittleEndian>(info)
			.context("Unable to write info")?;

		Ok(())
	}

	/// Returns the access this record describes
	pub fn access(&self) -> MemoryAccess {
		MemoryAccess {
			addr:   self.addr,
			size:   self.size,
			stream: self.kind.stream(),
		}
	}
}

/// Record kind
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum RecordKind {
	/// Data read
	Read,

	/// Data write
	Write,

	/// Instruction fetch
	Instruction,
}

impl RecordKind {
	/// Returns the stream of this kind
	pub fn stream(self) -> Stream {
		match self {
			Self::Read | Self::Write => Stream::Data,
			Self::Instruction => Stream::Instruction,
		}
	}
}
