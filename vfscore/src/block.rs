//! Block Device Adapter: fixed-size block reads and writes over the backing store.

use crate::consts::BLOCK_SIZE;
use std::fs::File;
use std::fs::OpenOptions;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::io::Write;
use std::io;
use std::path::Path;

/// A block, as read from or written to the backing store.
pub type Block = [u8; BLOCK_SIZE];

/// Adapts a regular host file to block-addressed reads and writes.
///
/// Positioning is always done by seeking to `block_num * BLOCK_SIZE`; the adapter keeps no
/// state across calls and does not buffer writes.
pub struct BlockDevice {
	file: File,
}

impl BlockDevice {
	/// Opens an existing backing store for read and write access.
	pub fn open(path: &Path) -> io::Result<Self> {
		let file = OpenOptions::new().read(true).write(true).open(path)?;
		Ok(Self { file })
	}

	/// Creates (or truncates) the backing store at `path` and sizes it to `size_bytes`.
	pub fn create(path: &Path, size_bytes: u64) -> io::Result<Self> {
		let file = OpenOptions::new()
			.read(true)
			.write(true)
			.create(true)
			.truncate(true)
			.open(path)?;
		file.set_len(size_bytes)?;
		Ok(Self { file })
	}

	/// Reads block `n` into `buf`.
	///
	/// A short read at end-of-stream is tolerated: the untouched tail of `buf` is treated as
	/// zero-filled. Any other I/O error is fatal to the caller.
	pub fn read_block(&mut self, n: u32, buf: &mut Block) -> io::Result<()> {
		self.file.seek(SeekFrom::Start(n as u64 * BLOCK_SIZE as u64))?;

		let mut filled = 0;
		while filled < buf.len() {
			match self.file.read(&mut buf[filled..]) {
				Ok(0) => break,
				Ok(n) => filled += n,
				Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
				Err(e) => return Err(e),
			}
		}
		buf[filled..].fill(0);

		Ok(())
	}

	/// Writes `buf` to block `n`.
	pub fn write_block(&mut self, n: u32, buf: &Block) -> io::Result<()> {
		self.file.seek(SeekFrom::Start(n as u64 * BLOCK_SIZE as u64))?;
		self.file.write_all(buf)
	}
}

/// Returns a zeroed block.
pub fn zero_block() -> Block {
	[0; BLOCK_SIZE]
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn read_short_file_zero_fills() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("disk.img");

		let mut short_file = File::create(&path).unwrap();
		short_file.write_all(&[0xaa; 10]).unwrap();
		drop(short_file);

		let mut dev = BlockDevice::open(&path).unwrap();
		let mut read_buf = zero_block();
		dev.read_block(0, &mut read_buf).unwrap();
		assert_eq!(&read_buf[..10], &[0xaa; 10]);
		assert_eq!(read_buf[BLOCK_SIZE - 1], 0);
	}

	#[test]
	fn read_past_end_is_zero() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("disk.img");
		let dev_file = File::create(&path).unwrap();
		dev_file.set_len(BLOCK_SIZE as u64).unwrap();
		let mut dev = BlockDevice::open(&path).unwrap();

		let mut buf = zero_block();
		dev.read_block(5, &mut buf).unwrap();
		assert!(buf.iter().all(|&b| b == 0));
	}
}
