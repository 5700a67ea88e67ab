//! The superblock: on-disk geometry describing the rest of the filesystem.

use crate::block::zero_block;
use crate::block::BlockDevice;
use crate::consts::DATA_BITMAP_BLOCK;
use crate::consts::INODE_BITMAP_BLOCK;
use crate::consts::INODE_TABLE_START_BLOCK;
use crate::consts::BLOCK_SIZE;
use crate::consts::MAX_DATA_BLOCKS;
use crate::consts::MAX_INODES;
use crate::consts::SUPERBLOCK_BLOCK;
use crate::inode::Inode;
use crate::raw::as_bytes;
use crate::raw::from_bytes;
use std::io;
use std::mem::size_of;
use vfsutil::util::ceil_division;

/// Geometry of a mounted filesystem. Occupies block 0.
#[repr(C, packed)]
#[derive(Debug, Clone, Copy)]
pub struct Superblock {
	/// Total size of the backing store, in bytes.
	pub total_size: u64,
	/// Total number of inodes.
	pub num_inodes: u32,
	/// Total number of data blocks.
	pub num_data_blocks: u32,
	/// Block holding the inode usage bitmap.
	pub inode_bitmap_block: u32,
	/// Block holding the data block usage bitmap.
	pub data_bitmap_block: u32,
	/// First block of the inode table.
	pub inode_table_start_block: u32,
	/// First block of the data region.
	pub data_blocks_start_block: u32,
}

impl Superblock {
	/// Computes the geometry for a backing store of `size_bytes`.
	pub fn compute(size_bytes: u64) -> Self {
		let num_inode_blocks = ceil_division(
			MAX_INODES as u64 * size_of::<Inode>() as u64,
			BLOCK_SIZE as u64,
		) as u32;
		let data_blocks_start_block = INODE_TABLE_START_BLOCK + num_inode_blocks;

		let total_blocks = size_bytes / BLOCK_SIZE as u64;
		let num_data_blocks = (total_blocks.saturating_sub(data_blocks_start_block as u64))
			.min(MAX_DATA_BLOCKS as u64) as u32;

		Self {
			total_size: size_bytes,
			num_inodes: MAX_INODES,
			num_data_blocks,
			inode_bitmap_block: INODE_BITMAP_BLOCK,
			data_bitmap_block: DATA_BITMAP_BLOCK,
			inode_table_start_block: INODE_TABLE_START_BLOCK,
			data_blocks_start_block,
		}
	}

	/// Writes the superblock to block 0.
	pub fn write(&self, dev: &mut BlockDevice) -> io::Result<()> {
		let mut block = zero_block();
		block[..size_of::<Self>()].copy_from_slice(as_bytes(self));
		dev.write_block(SUPERBLOCK_BLOCK, &block)
	}

	/// Reads the superblock from block 0.
	pub fn read(dev: &mut BlockDevice) -> io::Result<Self> {
		let mut block = zero_block();
		dev.read_block(SUPERBLOCK_BLOCK, &mut block)?;
		Ok(from_bytes(&block))
	}
}
