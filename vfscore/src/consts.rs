//! Constants describing the on-disk geometry and format limits.

/// The size of a block, in bytes.
pub const BLOCK_SIZE: usize = 4096;

/// The maximum number of inodes a filesystem can hold.
pub const MAX_INODES: u32 = 512;
/// The maximum number of data blocks a filesystem can hold.
pub const MAX_DATA_BLOCKS: u32 = 8192;

/// The maximum length of a filename, not counting the terminating NUL byte.
pub const MAX_FILENAME_LEN: usize = 255;
/// The number of direct block pointers stored in an inode.
pub const INODE_DIRECT_POINTERS: usize = 12;
/// The inode number of the root directory.
pub const ROOT_INODE_NUM: u32 = 0;
/// The maximum number of path components `pwd` will walk before giving up.
pub const MAX_PATH_DEPTH: usize = 64;

/// Sentinel value marking a direct block pointer as unused.
pub const UNUSED_BLOCK: u32 = u32::MAX;

/// The block holding the superblock.
pub const SUPERBLOCK_BLOCK: u32 = 0;
/// The block holding the inode usage bitmap.
pub const INODE_BITMAP_BLOCK: u32 = 1;
/// The block holding the data block usage bitmap.
pub const DATA_BITMAP_BLOCK: u32 = 2;
/// The first block of the inode table.
pub const INODE_TABLE_START_BLOCK: u32 = 3;

/// The maximum size of a file, in bytes.
pub const MAX_FILE_SIZE: u64 = (INODE_DIRECT_POINTERS as u64) * (BLOCK_SIZE as u64);
