//! This module implements utility functions shared by the shell and the core library.

use std::fmt;
use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

/// Returns the current timestamp since the Unix epoch.
pub fn get_timestamp() -> Duration {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.expect("System clock panic!")
}

/// Divides `n` by `d`, rounding the result up.
pub fn ceil_division(n: u64, d: u64) -> u64 {
	n.div_ceil(d)
}

/// Structure representing a number of bytes, for human-readable display.
pub struct ByteSize(pub u64);

impl fmt::Display for ByteSize {
	fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
		const UNITS: [&str; 7] = ["bytes", "KiB", "MiB", "GiB", "TiB", "PiB", "EiB"];

		let mut order = 0;
		let mut n = self.0;
		while n >= 1024 && order < UNITS.len() - 1 {
			n /= 1024;
			order += 1;
		}

		write!(fmt, "{} {}", n, UNITS[order])
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn bytesize() {
		assert_eq!(format!("{}", ByteSize(0)).as_str(), "0 bytes");
		assert_eq!(format!("{}", ByteSize(1023)).as_str(), "1023 bytes");
		assert_eq!(format!("{}", ByteSize(1024)).as_str(), "1 KiB");
		assert_eq!(format!("{}", ByteSize(1024 * 1024)).as_str(), "1 MiB");
	}

	#[test]
	fn ceil_division_exact() {
		assert_eq!(ceil_division(4096, 4096), 1);
		assert_eq!(ceil_division(4097, 4096), 2);
		assert_eq!(ceil_division(0, 4096), 0);
	}
}
