//! Logger
//!
//! Logs to `stderr`, filtered by `RUST_LOG`, and optionally to a file,
//! filtered by `RUST_LOG_FILE`.

// Imports
use {
	std::{fs, io, path::Path, sync::Mutex},
	tracing_subscriber::{fmt, prelude::*, EnvFilter},
};

/// Default filter for `stderr`
const DEFAULT_STDERR_FILTER: &str = "info";

/// Default filter for the log file
const DEFAULT_FILE_FILTER: &str = "debug";

/// Initializes the logger.
///
/// Any messages logged through [`pre_init`] before this call are emitted afterwards.
///
/// # Panics
/// Panics if a global subscriber was already set.
pub fn init(log_file: Option<&Path>, log_file_append: bool) {
	let stderr_layer = fmt::layer()
		.with_writer(io::stderr)
		.with_filter(self::env_filter("RUST_LOG", DEFAULT_STDERR_FILTER));

	let file_layer = log_file.and_then(|path| {
		let file = fs::OpenOptions::new()
			.create(true)
			.write(true)
			.append(log_file_append)
			.truncate(!log_file_append)
			.open(path);

		match file {
			Ok(file) => Some(
				fmt::layer()
					.with_ansi(false)
					.with_writer(Mutex::new(file))
					.with_filter(self::env_filter("RUST_LOG_FILE", DEFAULT_FILE_FILTER)),
			),
			Err(err) => {
				pre_init::warn(format!("Unable to open log file {path:?}: {err}"));
				None
			},
		}
	});

	tracing_subscriber::registry().with(stderr_layer).with(file_layer).init();

	pre_init::flush();
}

/// Creates an env filter from `var`, or `default` if unset or invalid
fn env_filter(var: &str, default: &str) -> EnvFilter {
	EnvFilter::try_from_env(var).unwrap_or_else(|_| EnvFilter::new(default))
}

/// Logging before the logger is initialized.
///
/// Messages are buffered and emitted once [`init`](super::init) is called.
pub mod pre_init {
	// Imports
	use std::sync::{Mutex, PoisonError};

	/// Message level
	#[derive(Clone, Copy, Debug)]
	enum Level {
		Debug,
		Warn,
	}

	/// Buffered messages
	static MESSAGES: Mutex<Vec<(Level, String)>> = Mutex::new(Vec::new());

	/// Buffers a debug message
	pub fn debug(msg: impl Into<String>) {
		self::push(Level::Debug, msg.into());
	}

	/// Buffers a warning message
	pub fn warn(msg: impl Into<String>) {
		self::push(Level::Warn, msg.into());
	}

	fn push(level: Level, msg: String) {
		MESSAGES.lock().unwrap_or_else(PoisonError::into_inner).push((level, msg));
	}

	/// Emits all buffered messages
	pub(super) fn flush() {
		let messages = std::mem::take(&mut *MESSAGES.lock().unwrap_or_else(PoisonError::into_inner));
		for (level, msg) in messages {
			match level {
				Level::Debug => tracing::debug!("{msg}"),
				Level::Warn => tracing::warn!("{msg}"),
			}
		}
	}

}
