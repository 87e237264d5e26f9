//! Parses `valgrind`'s `lackey` tool output from stdin,
//! converting it to a memory access trace.
//!
//! Expects the output of `valgrind --tool=lackey --trace-mem=yes`.

// Imports
use {
	anyhow::Context,
	clap::Parser,
	memfootprint::{
		trace::{Record, RecordKind},
		TraceWriter,
	},
	std::{
		fs,
		io::{BufRead, BufWriter},
		path::PathBuf,
	},
};

/// Arguments
#[derive(Debug)]
#[derive(clap::Parser)]
struct Args {
	/// Output trace file
	#[clap(short = 'o', long = "output", default_value = "output.trace")]
	output_file: PathBuf,
}

fn main() -> Result<(), anyhow::Error> {
	let args = Args::parse();

	// Create the writer
	let file = fs::File::create(&args.output_file).context("Unable to create output file")?;
	let file = BufWriter::new(file);
	let mut trace_writer = TraceWriter::new(file).context("Unable to create trace writer")?;

	// Start reading the output
	let mut stdin = std::io::stdin().lock();
	let mut line = String::new();
	let mut line_idx = 0_usize;
	while let Ok(1..) = {
		line.clear();
		stdin.read_line(&mut line)
	} {
		line_idx += 1;

		// Note: Anything we don't recognize (e.g. `==pid==` lines) is ignored
		let access = self::parse_line(&line).with_context(|| format!("Unable to parse line {line_idx}: {line:?}"))?;
		let Some((kind, addr, size)) = access else {
			continue;
		};

		// Modifies are a read followed by a write
		let kinds: &[RecordKind] = match kind {
			Kind::Inst => &[RecordKind::Instruction],
			Kind::Read => &[RecordKind::Read],
			Kind::Write => &[RecordKind::Write],
			Kind::Modify => &[RecordKind::Read, RecordKind::Write],
		};
		for &kind in kinds {
			let record = Record { addr, size, kind };
			trace_writer.write(&record).context("Unable to write record")?;
		}
	}

	// Finally finish writing the trace
	trace_writer.finish().context("Unable to finish writing trace")?;

	Ok(())
}

/// Parses a line of `lackey` output.
///
/// Returns `None` if the line isn't a memory access.
fn parse_line(line: &str) -> Result<Option<(Kind, u64, u64)>, anyhow::Error> {
	let line = line.trim_end_matches(['\n', '\r']);

	// Get the kind of record
	let (kind, rest) = if let Some(rest) = line.strip_prefix("I ") {
		(Kind::Inst, rest)
	} else if let Some(rest) = line.strip_prefix(" L ") {
		(Kind::Read, rest)
	} else if let Some(rest) = line.strip_prefix(" S ") {
		(Kind::Write, rest)
	} else if let Some(rest) = line.strip_prefix(" M ") {
		(Kind::Modify, rest)
	} else {
		return Ok(None);
	};

	// Then the address and size
	let (addr, size) = rest.trim().split_once(',').context("Missing size")?;
	let addr = u64::from_str_radix(addr, 16).context("Unable to parse address")?;
	let size = size.parse::<u64>().context("Unable to parse size")?;

	Ok(Some((kind, addr, size)))
}

/// Record kind
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
enum Kind {
	Inst,
	Read,
	Write,
	Modify,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_accesses() {
		let parse = |line| parse_line(line).expect("Unable to parse line");

		assert_eq!(parse("I  04016b0,3\n"), Some((Kind::Inst, 0x04016b0, 3)));
		assert_eq!(parse(" L 1ffefffd48,8\n"), Some((Kind::Read, 0x1ffefffd48, 8)));
		assert_eq!(parse(" S 1ffefffd40,8\r\n"), Some((Kind::Write, 0x1ffefffd40, 8)));
		assert_eq!(parse(" M 0421c40,4"), Some((Kind::Modify, 0x0421c40, 4)));
	}

	#[test]
	fn ignores_other_lines() {
		for line in ["==1234== Lackey, an example Valgrind tool\n", "\n", "Counted 1 call\n"] {
			assert_eq!(parse_line(line).expect("Unable to parse line"), None);
		}
	}

	#[test]
	fn rejects_malformed_access() {
		assert!(parse_line(" L zzzz,8").is_err());
		assert!(parse_line(" L 1000").is_err());
		assert!(parse_line(" L 1000,x").is_err());
	}
}
