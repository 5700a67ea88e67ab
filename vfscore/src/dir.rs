//! Directory Layer: packs and unpacks fixed-size directory entries inside the data blocks
//! owned by a directory inode.

use crate::alloc::Allocator;
use crate::block::zero_block;
use crate::block::Block;
use crate::block::BlockDevice;
use crate::blockptr::BlockPtr;
use crate::consts::MAX_FILENAME_LEN;
use crate::consts::BLOCK_SIZE;
use crate::consts::INODE_DIRECT_POINTERS;
use crate::error::FsError;
use crate::error::FsResult;
use crate::inode::Inode;
use crate::raw::as_bytes;
use crate::raw::from_bytes;
use crate::superblock::Superblock;
use std::io;
use std::mem::size_of;

/// A packed directory entry: a NUL-terminated name and the inode number it names.
///
/// An entry whose first name byte is NUL is a tombstone (or a never-used slot).
#[repr(C, packed)]
#[derive(Debug, Clone, Copy)]
pub struct DirectoryEntry {
	name: [u8; MAX_FILENAME_LEN + 1],
	inode_number: u32,
}

impl DirectoryEntry {
	fn empty() -> Self {
		Self {
			name: [0; MAX_FILENAME_LEN + 1],
			inode_number: 0,
		}
	}

	fn encode(name: &str, inode_number: u32) -> Self {
		let mut buf = [0u8; MAX_FILENAME_LEN + 1];
		let bytes = name.as_bytes();
		let len = bytes.len().min(MAX_FILENAME_LEN);
		buf[..len].copy_from_slice(&bytes[..len]);
		Self {
			name: buf,
			inode_number,
		}
	}

	fn is_live(&self) -> bool {
		self.name[0] != 0
	}

	fn name(&self) -> String {
		let end = self.name.iter().position(|&b| b == 0).unwrap_or(self.name.len());
		String::from_utf8_lossy(&self.name[..end]).into_owned()
	}
}

/// Number of directory entry slots packed into one block.
pub fn entries_per_block() -> usize {
	BLOCK_SIZE / size_of::<DirectoryEntry>()
}

/// Number of live entries in `dir`, derived from its high-water-mark `size` field.
pub fn live_count(dir: &Inode) -> u32 {
	dir.size / size_of::<DirectoryEntry>() as u32
}

fn read_slot(block: &Block, slot: usize) -> DirectoryEntry {
	let sz = size_of::<DirectoryEntry>();
	from_bytes(&block[slot * sz..slot * sz + sz])
}

fn write_slot(block: &mut Block, slot: usize, entry: &DirectoryEntry) {
	let sz = size_of::<DirectoryEntry>();
	block[slot * sz..slot * sz + sz].copy_from_slice(as_bytes(entry));
}

/// One live entry found while walking a directory's data blocks, along with its physical
/// position (direct-block index, slot index within that block) so callers can rewrite it
/// in place.
struct Located {
	direct_index: usize,
	slot: usize,
	name: String,
	inode_number: u32,
}

/// Walks `dir`'s data blocks in block-major order, stopping once the running count of live
/// entries seen equals `live_count(dir)`. This is the on-disk-format contract that lets
/// tombstoned slots exist below the high-water mark without disturbing iteration order.
fn walk(dev: &mut BlockDevice, sb: &Superblock, dir: &Inode) -> io::Result<Vec<Located>> {
	let target = live_count(dir);
	let mut found = Vec::new();
	let direct_blocks = dir.direct_blocks;

	'blocks: for (direct_index, &block_num) in direct_blocks.iter().enumerate() {
		let Some(block_num) = block_num.get() else { break };
		if found.len() as u32 >= target {
			break;
		}

		let mut block = zero_block();
		dev.read_block(sb.data_blocks_start_block + block_num, &mut block)?;

		for slot in 0..entries_per_block() {
			if found.len() as u32 >= target {
				break 'blocks;
			}
			let entry = read_slot(&block, slot);
			if entry.is_live() {
				found.push(Located {
					direct_index,
					slot,
					name: entry.name(),
					inode_number: entry.inode_number,
				});
			}
		}
	}

	Ok(found)
}

/// Lists the live `(name, inode_number)` pairs of a directory, in on-disk order.
pub fn iterate(dev: &mut BlockDevice, sb: &Superblock, dir_ino: u32) -> io::Result<Vec<(String, u32)>> {
	let dir = Inode::read(dev, sb, dir_ino)?;
	Ok(walk(dev, sb, &dir)?.into_iter().map(|e| (e.name, e.inode_number)).collect())
}

/// Looks up `name` in `dir_ino`. Returns `Ok(None)` both when the name is absent and when
/// `dir_ino` does not name a directory.
pub fn lookup(dev: &mut BlockDevice, sb: &Superblock, dir_ino: u32, name: &str) -> io::Result<Option<u32>> {
	let dir = Inode::read(dev, sb, dir_ino)?;
	if !dir.is_dir() {
		return Ok(None);
	}
	Ok(walk(dev, sb, &dir)?.into_iter().find(|e| e.name == name).map(|e| e.inode_number))
}

/// Inserts `(name, child_ino)` into `dir_ino`.
///
/// Scans existing direct blocks in order for the first free slot (tombstoned or never used).
/// If none is found and fewer than `INODE_DIRECT_POINTERS` are in use, allocates and zeroes a
/// new data block. Fails with [`FsError::DirectoryFull`] if every direct block is allocated
/// and full, or [`FsError::NoSpace`] if a new block is needed but allocation fails.
pub fn insert(
	dev: &mut BlockDevice,
	sb: &Superblock,
	alloc: &mut Allocator,
	dir_ino: u32,
	name: &str,
	child_ino: u32,
) -> FsResult<()> {
	let mut dir = Inode::read(dev, sb, dir_ino)?;
	let entries_per_block = entries_per_block();
	let high_water = live_count(&dir);

	for i in 0..INODE_DIRECT_POINTERS {
		let (block_num, mut block) = match dir.direct_blocks[i].get() {
			None => {
				let new_block = alloc.alloc_data_block()?;
				dir.direct_blocks[i] = BlockPtr::some(new_block);
				(new_block, zero_block())
			}
			Some(block_num) => {
				let mut block = zero_block();
				dev.read_block(sb.data_blocks_start_block + block_num, &mut block)?;
				(block_num, block)
			}
		};

		for slot in 0..entries_per_block {
			if read_slot(&block, slot).is_live() {
				continue;
			}

			write_slot(&mut block, slot, &DirectoryEntry::encode(name, child_ino));
			dev.write_block(sb.data_blocks_start_block + block_num, &block)?;

			let linear = (i * entries_per_block + slot) as u32;
			if linear >= high_water {
				dir.size += size_of::<DirectoryEntry>() as u32;
			}
			dir.touch();
			dir.write(dev, sb, dir_ino)?;
			return Ok(());
		}
	}

	Err(FsError::DirectoryFull)
}

/// Removes the live entry named `name` from `dir_ino`, tombstoning its slot.
///
/// Fails silently (returns `Ok(())`) if no such entry exists; callers are expected to check
/// existence before calling.
pub fn remove(dev: &mut BlockDevice, sb: &Superblock, dir_ino: u32, name: &str) -> io::Result<()> {
	let mut dir = Inode::read(dev, sb, dir_ino)?;
	let Some(found) = walk(dev, sb, &dir)?.into_iter().find(|e| e.name == name) else {
		return Ok(());
	};

	let block_num = dir.direct_blocks[found.direct_index].get().expect("located entry has a live block");
	let mut block = zero_block();
	dev.read_block(sb.data_blocks_start_block + block_num, &mut block)?;
	write_slot(&mut block, found.slot, &DirectoryEntry::empty());
	dev.write_block(sb.data_blocks_start_block + block_num, &block)?;

	dir.size -= size_of::<DirectoryEntry>() as u32;
	dir.write(dev, sb, dir_ino)
}
