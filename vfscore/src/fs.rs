//! Filesystem Operations: the public command surface composing the lower layers, enforcing
//! rollback-on-failure and link-count semantics.

use crate::alloc::Allocator;
use crate::block::zero_block;
use crate::block::BlockDevice;
use crate::blockptr::BlockPtr;
use crate::consts::BLOCK_SIZE;
use crate::consts::MAX_FILE_SIZE;
use crate::consts::MAX_PATH_DEPTH;
use crate::consts::ROOT_INODE_NUM;
use crate::dir;
use crate::error::FsError;
use crate::error::FsResult;
use crate::inode::Inode;
use crate::inode::MODE_DIR;
use crate::inode::MODE_FILE;
use crate::path;
use crate::superblock::Superblock;
use log::info;
use std::fs::File;
use std::io::Read;
use std::io::Write;
use std::path::Path;

/// Whether a directory entry names a file or a directory, for `ls` rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirEntryKind {
	File,
	Directory,
}

/// A plain-value view of an inode's metadata, returned by [`Filesystem::stat`].
#[derive(Debug, Clone, Copy)]
pub struct Stat {
	pub inode_number: u32,
	pub mode: u16,
	pub size: u32,
	pub link_count: u32,
	pub creation_time: u64,
	pub modification_time: u64,
}

impl Stat {
	fn from_inode(inode_number: u32, inode: &Inode) -> Self {
		Self {
			inode_number,
			mode: inode.mode,
			size: inode.size,
			link_count: inode.link_count,
			creation_time: inode.creation_time,
			modification_time: inode.modification_time,
		}
	}

	pub fn is_dir(&self) -> bool {
		self.mode == MODE_DIR
	}
}

/// The result of [`Filesystem::ls`]: either a directory's live entries, or a single file's
/// metadata when `ls` is given a non-directory path.
#[derive(Debug, Clone)]
pub enum Listing {
	Directory(Vec<(String, DirEntryKind)>),
	File(Stat),
}

/// Usage statistics reported by [`Filesystem::df`].
#[derive(Debug, Clone, Copy)]
pub struct DiskUsage {
	pub inodes_used: u32,
	pub inodes_total: u32,
	pub inodes_free: u32,
	pub blocks_used: u32,
	pub blocks_total: u32,
	pub blocks_free: u32,
	pub bytes_used: u64,
	pub bytes_total: u64,
}

/// The in-process value packaging the open backing store, both in-memory bitmaps, and the
/// current working directory. Every filesystem operation is a method on this handle; there is
/// no process-wide global state.
pub struct Filesystem {
	dev: BlockDevice,
	sb: Superblock,
	alloc: Allocator,
	cwd: u32,
}

impl Filesystem {
	/// Formats a fresh backing store of `size_bytes` at `disk_path`: geometry, bitmaps, and a
	/// root directory holding only `.` and `..`.
	pub fn mkfs(disk_path: &Path, size_bytes: u64) -> FsResult<Self> {
		info!("creating filesystem at {} ({} bytes)", disk_path.display(), size_bytes);
		let mut dev = BlockDevice::create(disk_path, size_bytes)?;
		let sb = Superblock::compute(size_bytes);
		sb.write(&mut dev)?;

		let mut alloc = Allocator::new_empty(sb.num_inodes, sb.num_data_blocks);
		alloc.mark_inode_used(ROOT_INODE_NUM);
		alloc.mark_data_block_used(0);

		let mut root = Inode::new(MODE_DIR);
		root.direct_blocks[0] = BlockPtr::some(0);
		root.link_count = 2;
		root.write(&mut dev, &sb, ROOT_INODE_NUM)?;
		dev.write_block(sb.data_blocks_start_block, &zero_block())?;

		dir::insert(&mut dev, &sb, &mut alloc, ROOT_INODE_NUM, ".", ROOT_INODE_NUM)?;
		dir::insert(&mut dev, &sb, &mut alloc, ROOT_INODE_NUM, "..", ROOT_INODE_NUM)?;
		alloc.sync(&mut dev, &sb)?;

		Ok(Self { dev, sb, alloc, cwd: ROOT_INODE_NUM })
	}

	/// Mounts an existing backing store, reading its superblock and bitmaps.
	pub fn mount(disk_path: &Path) -> FsResult<Self> {
		info!("mounting filesystem at {}", disk_path.display());
		let mut dev = BlockDevice::open(disk_path)?;
		let sb = Superblock::read(&mut dev)?;
		let alloc = Allocator::load(&mut dev, &sb)?;
		Ok(Self { dev, sb, alloc, cwd: ROOT_INODE_NUM })
	}

	fn resolve(&mut self, path: &str) -> FsResult<u32> {
		path::resolve(&mut self.dev, &self.sb, self.cwd, path)
	}

	/// Lists a directory's entries, or describes a single file.
	pub fn ls(&mut self, path: &str) -> FsResult<Listing> {
		let ino = self.resolve(path)?;
		let inode = Inode::read(&mut self.dev, &self.sb, ino)?;
		if !inode.is_dir() {
			return Ok(Listing::File(Stat::from_inode(ino, &inode)));
		}

		let entries = dir::iterate(&mut self.dev, &self.sb, ino)?;
		let mut out = Vec::with_capacity(entries.len());
		for (name, child_ino) in entries {
			if name == "." || name == ".." {
				continue;
			}
			let child = Inode::read(&mut self.dev, &self.sb, child_ino)?;
			let kind = if child.is_dir() { DirEntryKind::Directory } else { DirEntryKind::File };
			out.push((name, kind));
		}
		Ok(Listing::Directory(out))
	}

	/// Resolves `path` and returns its metadata.
	pub fn stat(&mut self, path: &str) -> FsResult<Stat> {
		let ino = self.resolve(path)?;
		let inode = Inode::read(&mut self.dev, &self.sb, ino)?;
		Ok(Stat::from_inode(ino, &inode))
	}

	/// Creates a new directory, holding only `.` and `..`, at `path`.
	///
	/// Rolls back any partial allocation (the new inode, the new data block) if it fails
	/// partway through.
	pub fn mkdir(&mut self, path: &str) -> FsResult<()> {
		let (parent_path, name) = path::split_parent_child(path);
		if name.is_empty() {
			return Err(FsError::InvalidArgument(path.to_string()));
		}
		let parent_ino = self.resolve(&parent_path)?;
		let parent = Inode::read(&mut self.dev, &self.sb, parent_ino)?;
		if !parent.is_dir() {
			return Err(FsError::NotADirectory(parent_path));
		}
		if dir::lookup(&mut self.dev, &self.sb, parent_ino, &name)?.is_some() {
			return Err(FsError::AlreadyExists(path.to_string()));
		}

		let snapshot = self.alloc.snapshot();
		match self.mkdir_inner(parent_ino, &name) {
			Ok(()) => {
				self.alloc.sync(&mut self.dev, &self.sb)?;
				Ok(())
			}
			Err(e) => {
				info!("mkdir {}: rolling back partial allocation: {}", path, e);
				self.alloc.restore(snapshot);
				Err(e)
			}
		}
	}

	fn mkdir_inner(&mut self, parent_ino: u32, name: &str) -> FsResult<()> {
		let child_ino = self.alloc.alloc_inode()?;
		let block_num = match self.alloc.alloc_data_block() {
			Ok(b) => b,
			Err(e) => {
				self.alloc.free_inode(child_ino);
				return Err(e);
			}
		};
		self.dev.write_block(self.sb.data_blocks_start_block + block_num, &zero_block())?;

		let mut child = Inode::new(MODE_DIR);
		child.direct_blocks[0] = BlockPtr::some(block_num);
		child.link_count = 2;
		child.write(&mut self.dev, &self.sb, child_ino)?;

		dir::insert(&mut self.dev, &self.sb, &mut self.alloc, child_ino, ".", child_ino)?;
		dir::insert(&mut self.dev, &self.sb, &mut self.alloc, child_ino, "..", parent_ino)?;
		dir::insert(&mut self.dev, &self.sb, &mut self.alloc, parent_ino, name, child_ino)?;

		let mut parent = Inode::read(&mut self.dev, &self.sb, parent_ino)?;
		parent.link_count += 1;
		parent.touch();
		parent.write(&mut self.dev, &self.sb, parent_ino)?;
		Ok(())
	}

	/// Removes an empty directory (holding only `.` and `..`) at `path`.
	pub fn rmdir(&mut self, path: &str) -> FsResult<()> {
		let target_ino = self.resolve(path)?;
		if target_ino == ROOT_INODE_NUM {
			return Err(FsError::CannotRemoveRoot);
		}
		let target = Inode::read(&mut self.dev, &self.sb, target_ino)?;
		if !target.is_dir() {
			return Err(FsError::NotADirectory(path.to_string()));
		}
		if dir::live_count(&target) > 2 {
			return Err(FsError::DirectoryNotEmpty(path.to_string()));
		}

		let (parent_path, name) = path::split_parent_child(path);
		let parent_ino = self.resolve(&parent_path)?;
		dir::remove(&mut self.dev, &self.sb, parent_ino, &name)?;

		let mut parent = Inode::read(&mut self.dev, &self.sb, parent_ino)?;
		parent.link_count -= 1;
		parent.touch();
		parent.write(&mut self.dev, &self.sb, parent_ino)?;

		for block_num in target.direct_blocks {
			if let Some(block_num) = block_num.get() {
				self.alloc.free_data_block(block_num);
			}
		}
		self.alloc.free_inode(target_ino);
		self.alloc.sync(&mut self.dev, &self.sb)?;
		Ok(())
	}

	/// Unlinks a file, reclaiming its inode and data blocks once its link count reaches zero.
	pub fn rm(&mut self, path: &str) -> FsResult<()> {
		let target_ino = self.resolve(path)?;
		let mut target = Inode::read(&mut self.dev, &self.sb, target_ino)?;
		if target.is_dir() {
			return Err(FsError::NotAFile(path.to_string()));
		}

		let (parent_path, name) = path::split_parent_child(path);
		let parent_ino = self.resolve(&parent_path)?;
		dir::remove(&mut self.dev, &self.sb, parent_ino, &name)?;

		target.link_count = target.link_count.saturating_sub(1);
		if target.link_count == 0 {
			for block_num in target.direct_blocks {
				if let Some(block_num) = block_num.get() {
					self.alloc.free_data_block(block_num);
				}
			}
			self.alloc.free_inode(target_ino);
		} else {
			target.write(&mut self.dev, &self.sb, target_ino)?;
		}
		self.alloc.sync(&mut self.dev, &self.sb)?;
		Ok(())
	}

	/// Adds a new directory entry pointing at an existing file's inode.
	pub fn ln(&mut self, target_path: &str, link_path: &str) -> FsResult<()> {
		let target_ino = self.resolve(target_path)?;
		let mut target = Inode::read(&mut self.dev, &self.sb, target_ino)?;
		if target.is_dir() {
			return Err(FsError::NotAFile(target_path.to_string()));
		}

		let (parent_path, name) = path::split_parent_child(link_path);
		if name.is_empty() {
			return Err(FsError::InvalidArgument(link_path.to_string()));
		}
		let parent_ino = self.resolve(&parent_path)?;
		let parent = Inode::read(&mut self.dev, &self.sb, parent_ino)?;
		if !parent.is_dir() {
			return Err(FsError::NotADirectory(parent_path));
		}
		if dir::lookup(&mut self.dev, &self.sb, parent_ino, &name)?.is_some() {
			return Err(FsError::AlreadyExists(link_path.to_string()));
		}

		dir::insert(&mut self.dev, &self.sb, &mut self.alloc, parent_ino, &name, target_ino)?;
		target.link_count += 1;
		target.write(&mut self.dev, &self.sb, target_ino)?;
		self.alloc.sync(&mut self.dev, &self.sb)?;
		Ok(())
	}

	/// Imports a host file's contents as a new file at `vdisk_path`.
	///
	/// Rolls back every data block and the inode allocated for this file if allocation fails
	/// partway through.
	pub fn cp_in(&mut self, host_path: &Path, vdisk_path: &str) -> FsResult<()> {
		let mut data = Vec::new();
		File::open(host_path)?.read_to_end(&mut data)?;
		if data.len() as u64 > MAX_FILE_SIZE {
			return Err(FsError::FileTooLarge { size: data.len() as u64, max: MAX_FILE_SIZE });
		}

		let (parent_path, name) = path::split_parent_child(vdisk_path);
		if name.is_empty() {
			return Err(FsError::InvalidArgument(vdisk_path.to_string()));
		}
		let parent_ino = self.resolve(&parent_path)?;
		let parent = Inode::read(&mut self.dev, &self.sb, parent_ino)?;
		if !parent.is_dir() {
			return Err(FsError::NotADirectory(parent_path));
		}
		if dir::lookup(&mut self.dev, &self.sb, parent_ino, &name)?.is_some() {
			return Err(FsError::AlreadyExists(vdisk_path.to_string()));
		}

		let snapshot = self.alloc.snapshot();
		match self.cp_in_inner(parent_ino, &name, &data) {
			Ok(()) => {
				self.alloc.sync(&mut self.dev, &self.sb)?;
				Ok(())
			}
			Err(e) => {
				info!("cp-in {}: rolling back partial allocation: {}", vdisk_path, e);
				self.alloc.restore(snapshot);
				Err(e)
			}
		}
	}

	fn cp_in_inner(&mut self, parent_ino: u32, name: &str, data: &[u8]) -> FsResult<()> {
		let file_ino = self.alloc.alloc_inode()?;
		let mut inode = Inode::new(MODE_FILE);
		let mut allocated = Vec::new();

		for (i, chunk) in data.chunks(BLOCK_SIZE).enumerate() {
			let block_num = match self.alloc.alloc_data_block() {
				Ok(b) => b,
				Err(e) => {
					for b in allocated {
						self.alloc.free_data_block(b);
					}
					self.alloc.free_inode(file_ino);
					return Err(e);
				}
			};
			allocated.push(block_num);

			let mut block = zero_block();
			block[..chunk.len()].copy_from_slice(chunk);
			self.dev.write_block(self.sb.data_blocks_start_block + block_num, &block)?;
			inode.direct_blocks[i] = BlockPtr::some(block_num);
		}

		inode.size = data.len() as u32;
		inode.link_count = 1;
		inode.write(&mut self.dev, &self.sb, file_ino)?;
		dir::insert(&mut self.dev, &self.sb, &mut self.alloc, parent_ino, name, file_ino)?;
		Ok(())
	}

	/// Exports a file's contents to a host file.
	pub fn cp_out(&mut self, vdisk_path: &str, host_path: &Path) -> FsResult<()> {
		let ino = self.resolve(vdisk_path)?;
		let inode = Inode::read(&mut self.dev, &self.sb, ino)?;
		if inode.is_dir() {
			return Err(FsError::NotAFile(vdisk_path.to_string()));
		}

		let mut out = File::create(host_path)?;
		let mut remaining = inode.size as usize;
		for block_num in inode.direct_blocks {
			if remaining == 0 {
				break;
			}
			let Some(block_num) = block_num.get() else { break };
			let mut block = zero_block();
			self.dev.read_block(self.sb.data_blocks_start_block + block_num, &mut block)?;
			let take = remaining.min(BLOCK_SIZE);
			out.write_all(&block[..take])?;
			remaining -= take;
		}
		Ok(())
	}

	/// Grows a file by `n` zero bytes. Returns the number of bytes actually added, which may
	/// be less than `n` if allocation ran out partway through.
	pub fn append(&mut self, path: &str, n: u64) -> FsResult<u64> {
		if n == 0 {
			return Err(FsError::InvalidArgument("append length must be positive".to_string()));
		}
		let ino = self.resolve(path)?;
		let mut inode = Inode::read(&mut self.dev, &self.sb, ino)?;
		if inode.is_dir() {
			return Err(FsError::NotAFile(path.to_string()));
		}

		let old_size = inode.size as u64;
		let requested_size = old_size + n;
		if requested_size > MAX_FILE_SIZE {
			return Err(FsError::FileTooLarge { size: requested_size, max: MAX_FILE_SIZE });
		}

		let old_last_block = if old_size == 0 { None } else { Some(((old_size - 1) / BLOCK_SIZE as u64) as usize) };
		if let Some(idx) = old_last_block {
			let start_in_block = (old_size % BLOCK_SIZE as u64) as usize;
			if let (Some(block_num), true) = (inode.direct_blocks[idx].get(), start_in_block != 0) {
				let mut block = zero_block();
				self.dev.read_block(self.sb.data_blocks_start_block + block_num, &mut block)?;
				block[start_in_block..].fill(0);
				self.dev.write_block(self.sb.data_blocks_start_block + block_num, &block)?;
			}
		}

		let start_block = old_last_block.map(|i| i + 1).unwrap_or(0);
		let last_block_needed = ((requested_size - 1) / BLOCK_SIZE as u64) as usize;

		// No new block needed: the appended region fits inside the already-allocated tail block.
		let mut new_size = if start_block > last_block_needed { requested_size } else { old_size };

		for idx in start_block..=last_block_needed {
			match self.alloc.alloc_data_block() {
				Ok(block_num) => {
					self.dev.write_block(self.sb.data_blocks_start_block + block_num, &zero_block())?;
					inode.direct_blocks[idx] = BlockPtr::some(block_num);
					new_size = (((idx + 1) as u64) * BLOCK_SIZE as u64).min(requested_size);
				}
				Err(_) => break,
			}
		}

		let actual_added = new_size - old_size;
		inode.size = new_size as u32;
		inode.touch();
		inode.write(&mut self.dev, &self.sb, ino)?;
		self.alloc.sync(&mut self.dev, &self.sb)?;
		Ok(actual_added)
	}

	/// Shrinks a file by `n` bytes, freeing any direct block wholly past the new size.
	pub fn truncate(&mut self, path: &str, n: u64) -> FsResult<()> {
		if n == 0 {
			return Err(FsError::InvalidArgument("truncate length must be positive".to_string()));
		}
		let ino = self.resolve(path)?;
		let mut inode = Inode::read(&mut self.dev, &self.sb, ino)?;
		if inode.is_dir() {
			return Err(FsError::NotAFile(path.to_string()));
		}

		let old_size = inode.size as u64;
		let new_size = old_size.saturating_sub(n);
		let last_block_to_keep: i64 =
			if new_size == 0 { -1 } else { ((new_size - 1) / BLOCK_SIZE as u64) as i64 };

		let mut direct_blocks = inode.direct_blocks;
		for (idx, block_num) in direct_blocks.iter_mut().enumerate() {
			if idx as i64 > last_block_to_keep {
				if let Some(n) = block_num.get() {
					self.alloc.free_data_block(n);
					*block_num = BlockPtr::UNUSED;
				}
			}
		}
		inode.direct_blocks = direct_blocks;

		inode.size = new_size as u32;
		inode.touch();
		inode.write(&mut self.dev, &self.sb, ino)?;
		self.alloc.sync(&mut self.dev, &self.sb)?;
		Ok(())
	}

	/// Changes the current working directory.
	pub fn cd(&mut self, path: &str) -> FsResult<()> {
		let ino = self.resolve(path)?;
		let inode = Inode::read(&mut self.dev, &self.sb, ino)?;
		if !inode.is_dir() {
			return Err(FsError::NotADirectory(path.to_string()));
		}
		self.cwd = ino;
		Ok(())
	}

	/// Reconstructs the absolute path of the current working directory by walking `..` links
	/// and matching names back against each parent's live entries.
	pub fn pwd(&mut self) -> FsResult<String> {
		if self.cwd == ROOT_INODE_NUM {
			return Ok("/".to_string());
		}

		let mut components = Vec::new();
		let mut current = self.cwd;
		for _ in 0..MAX_PATH_DEPTH {
			if current == ROOT_INODE_NUM {
				break;
			}
			let parent = dir::lookup(&mut self.dev, &self.sb, current, "..")?
				.ok_or_else(|| FsError::InvalidArgument("pwd: directory missing ..".to_string()))?;
			let name = dir::iterate(&mut self.dev, &self.sb, parent)?
				.into_iter()
				.find(|(name, ino)| *ino == current && name != "." && name != "..")
				.map(|(name, _)| name)
				.ok_or_else(|| FsError::InvalidArgument("pwd: name not found in parent".to_string()))?;
			components.push(name);
			current = parent;
		}

		if current != ROOT_INODE_NUM {
			return Err(FsError::InvalidArgument("pwd: path depth exceeds limit".to_string()));
		}

		components.reverse();
		Ok(format!("/{}", components.join("/")))
	}

	/// Reports inode and data block usage.
	pub fn df(&self) -> DiskUsage {
		let inodes_used = self.alloc.used_inodes();
		let blocks_used = self.alloc.used_data_blocks();
		DiskUsage {
			inodes_used,
			inodes_total: self.sb.num_inodes,
			inodes_free: self.sb.num_inodes - inodes_used,
			blocks_used,
			blocks_total: self.sb.num_data_blocks,
			blocks_free: self.sb.num_data_blocks - blocks_used,
			bytes_used: blocks_used as u64 * BLOCK_SIZE as u64,
			bytes_total: self.sb.total_size,
		}
	}
}
