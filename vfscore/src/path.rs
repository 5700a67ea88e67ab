//! Path Resolver: walks `/`-delimited paths from a starting inode to a final inode number.

use crate::block::BlockDevice;
use crate::consts::ROOT_INODE_NUM;
use crate::dir;
use crate::error::FsError;
use crate::error::FsResult;
use crate::inode::Inode;
use crate::superblock::Superblock;

/// Resolves `path` to an inode number, starting from `cwd_ino` for relative paths.
///
/// `.` and `..` are never special-cased here: every directory stores them as real entries
/// (root's `..` points to root), so plain lookups resolve them correctly.
pub fn resolve(dev: &mut BlockDevice, sb: &Superblock, cwd_ino: u32, path: &str) -> FsResult<u32> {
	if path.is_empty() {
		return Err(FsError::NotFound(path.to_string()));
	}
	if path == "." {
		return Ok(cwd_ino);
	}
	if path == "/" {
		return Ok(ROOT_INODE_NUM);
	}

	let (mut current, rest) = if let Some(rest) = path.strip_prefix('/') {
		(ROOT_INODE_NUM, rest)
	} else {
		(cwd_ino, path)
	};

	let components: Vec<&str> = rest.split('/').filter(|c| !c.is_empty()).collect();
	for (i, component) in components.iter().enumerate() {
		let entry = Inode::read(dev, sb, current)?;
		if !entry.is_dir() && i + 1 < components.len() {
			return Err(FsError::NotFound(path.to_string()));
		}
		current = dir::lookup(dev, sb, current, component)?.ok_or_else(|| FsError::NotFound(path.to_string()))?;
	}

	Ok(current)
}

/// Splits `path` into its parent path and final component, the dirname/basename extraction
/// every operation that inserts or removes a directory entry needs.
pub fn split_parent_child(path: &str) -> (String, String) {
	let trimmed = path.trim_end_matches('/');
	match trimmed.rsplit_once('/') {
		Some(("", child)) => ("/".to_string(), child.to_string()),
		Some((parent, child)) => (parent.to_string(), child.to_string()),
		None => (".".to_string(), trimmed.to_string()),
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::alloc::Allocator;
	use crate::block::zero_block;
	use crate::blockptr::BlockPtr;
	use crate::dir::insert;
	use crate::inode::MODE_DIR;

	fn fresh() -> (tempfile::TempDir, BlockDevice, Superblock, Allocator) {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("disk.img");
		let mut dev = BlockDevice::create(&path, 1024 * 1024).unwrap();
		let sb = Superblock::compute(1024 * 1024);
		let mut alloc = Allocator::new_empty(sb.num_inodes, sb.num_data_blocks);

		let block_num = alloc.alloc_data_block().unwrap();
		dev.write_block(sb.data_blocks_start_block + block_num, &zero_block()).unwrap();
		let mut root = Inode::new(MODE_DIR);
		root.direct_blocks[0] = BlockPtr::some(block_num);
		root.link_count = 2;
		root.write(&mut dev, &sb, 0).unwrap();
		insert(&mut dev, &sb, &mut alloc, 0, ".", 0).unwrap();
		insert(&mut dev, &sb, &mut alloc, 0, "..", 0).unwrap();

		(dir, dev, sb, alloc)
	}

	fn mkdir(dev: &mut BlockDevice, sb: &Superblock, alloc: &mut Allocator, parent: u32, name: &str) -> u32 {
		let block_num = alloc.alloc_data_block().unwrap();
		dev.write_block(sb.data_blocks_start_block + block_num, &zero_block()).unwrap();
		let child = alloc.alloc_inode().unwrap();
		let mut child_inode = Inode::new(MODE_DIR);
		child_inode.direct_blocks[0] = BlockPtr::some(block_num);
		child_inode.link_count = 2;
		child_inode.write(dev, sb, child).unwrap();
		insert(dev, sb, alloc, child, ".", child).unwrap();
		insert(dev, sb, alloc, child, "..", parent).unwrap();
		insert(dev, sb, alloc, parent, name, child).unwrap();
		child
	}

	#[test]
	fn resolves_nested_absolute_path() {
		let (_dir, mut dev, sb, mut alloc) = fresh();
		let a = mkdir(&mut dev, &sb, &mut alloc, 0, "a");
		let b = mkdir(&mut dev, &sb, &mut alloc, a, "b");

		assert_eq!(resolve(&mut dev, &sb, 0, "/a/b").unwrap(), b);
		assert_eq!(resolve(&mut dev, &sb, 0, "/").unwrap(), 0);
		assert_eq!(resolve(&mut dev, &sb, a, ".").unwrap(), a);
	}

	#[test]
	fn dotdot_resolves_through_real_entries() {
		let (_dir, mut dev, sb, mut alloc) = fresh();
		let a = mkdir(&mut dev, &sb, &mut alloc, 0, "a");
		let b = mkdir(&mut dev, &sb, &mut alloc, a, "b");

		assert_eq!(resolve(&mut dev, &sb, b, "..").unwrap(), a);
		assert_eq!(resolve(&mut dev, &sb, b, "../..").unwrap(), 0);
		assert_eq!(resolve(&mut dev, &sb, 0, "..").unwrap(), 0);
	}

	#[test]
	fn collapses_repeated_slashes() {
		let (_dir, mut dev, sb, mut alloc) = fresh();
		let a = mkdir(&mut dev, &sb, &mut alloc, 0, "a");
		assert_eq!(resolve(&mut dev, &sb, 0, "//a//").unwrap(), a);
	}

	#[test]
	fn intermediate_non_directory_fails() {
		let (_dir, mut dev, sb, mut alloc) = fresh();
		let file_ino = alloc.alloc_inode().unwrap();
		Inode::new(crate::inode::MODE_FILE).write(&mut dev, &sb, file_ino).unwrap();
		insert(&mut dev, &sb, &mut alloc, 0, "f", file_ino).unwrap();

		assert!(matches!(resolve(&mut dev, &sb, 0, "/f/x"), Err(FsError::NotFound(_))));
	}

	#[test]
	fn missing_component_is_not_found() {
		let (_dir, mut dev, sb, _alloc) = fresh();
		assert!(matches!(resolve(&mut dev, &sb, 0, "/nope"), Err(FsError::NotFound(_))));
	}

	#[test]
	fn split_parent_child_cases() {
		assert_eq!(split_parent_child("/a/b"), ("/a".to_string(), "b".to_string()));
		assert_eq!(split_parent_child("/a"), ("/".to_string(), "a".to_string()));
		assert_eq!(split_parent_child("a"), (".".to_string(), "a".to_string()));
		assert_eq!(split_parent_child("/a/b/"), ("/a".to_string(), "b".to_string()));
	}
}
