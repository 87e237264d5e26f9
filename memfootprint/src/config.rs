//! Configuration

// Imports
use {
	crate::{decompose::Granularity, interval::Mode},
	anyhow::Context,
	std::time::Duration,
};

/// Configuration
#[derive(Clone, Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Config {
	/// Cache block size, as a shift (`6` for 64-byte blocks)
	pub cache_block_shift: u32,

	/// Page size, as a shift (`12` for 4KiB pages)
	pub page_shift: u32,

	/// Instructions per interval.
	///
	/// If `None`, accumulates over the whole run instead.
	pub interval_size: Option<u64>,

	/// Debug output period (in seconds)
	pub debug_output_period_secs: f64,
}

impl Config {
	/// Validates this configuration
	pub fn validate(&self) -> Result<ValidConfig, anyhow::Error> {
		let cache_granularity = Granularity::new(self.cache_block_shift)
			.with_context(|| format!("Cache block shift must be below 64, found {}", self.cache_block_shift))?;
		let page_granularity = Granularity::new(self.page_shift)
			.with_context(|| format!("Page shift must be below 64, found {}", self.page_shift))?;
		let mode = Mode::from_interval_size(self.interval_size).context("Invalid interval size")?;
		let debug_output_period = Duration::try_from_secs_f64(self.debug_output_period_secs)
			.context("Debug output period must be a non-negative number of seconds")?;

		if page_granularity.shift() < cache_granularity.shift() {
			tracing::warn!(?cache_granularity, ?page_granularity, "Pages are smaller than cache blocks");
		}

		Ok(ValidConfig {
			cache_granularity,
			page_granularity,
			mode,
			debug_output_period,
		})
	}
}

impl Default for Config {
	fn default() -> Self {
		Self {
			cache_block_shift:        6,
			page_shift:               12,
			interval_size:            None,
			debug_output_period_secs: 1.0,
		}
	}
}

/// Validated configuration
#[derive(Clone, Copy, Debug)]
pub struct ValidConfig {
	pub cache_granularity:   Granularity,
	pub page_granularity:    Granularity,
	pub mode:                Mode,
	pub debug_output_period: Duration,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn default_is_full_run() {
		let config = Config::default().validate().expect("Default config was invalid");
		assert_eq!(config.cache_granularity.block_size(), 64);
		assert_eq!(config.page_granularity.block_size(), 4096);
		assert_eq!(config.mode, Mode::FullRun);
	}

	#[test]
	fn parses_partial_json() {
		let config = serde_json::from_str::<Config>(r#"{ "interval_size": 100000000 }"#).expect("Unable to parse");
		assert_eq!(config.cache_block_shift, 6);
		assert_eq!(config.interval_size, Some(100_000_000));

		let config = config.validate().expect("Config was invalid");
		assert!(matches!(config.mode, Mode::Intervals { size } if size.get() == 100_000_000));
	}

	#[test]
	fn rejects_invalid_values() {
		let invalid = [
			Config {
				cache_block_shift: 64,
				..Config::default()
			},
			Config {
				page_shift: 100,
				..Config::default()
			},
			Config {
				interval_size: Some(0),
				..Config::default()
			},
			Config {
				debug_output_period_secs: -1.0,
				..Config::default()
			},
		];
		for config in invalid {
			assert!(config.validate().is_err(), "{config:?} was accepted");
		}
	}
}
