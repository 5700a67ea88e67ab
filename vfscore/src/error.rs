//! The error taxonomy returned by every core operation.

use std::io;
use thiserror::Error;

/// An error produced by a filesystem operation.
///
/// Every kind except [`FsError::Io`] is meant to be reported to the user as a single
/// diagnostic line; the shell loop keeps running afterwards. `Io` is fatal: it means the
/// backing store itself is no longer trustworthy.
#[derive(Debug, Error)]
pub enum FsError {
	/// A path, or one of its components, does not exist.
	#[error("{0}: no such file or directory")]
	NotFound(String),

	/// A name already exists where a new entry was about to be created.
	#[error("{0}: already exists")]
	AlreadyExists(String),

	/// An operation that requires a directory was given something else.
	#[error("{0}: not a directory")]
	NotADirectory(String),

	/// An operation that requires a file was given a directory.
	#[error("{0}: not a file")]
	NotAFile(String),

	/// `rmdir` was called on a directory holding more than `.` and `..`.
	#[error("{0}: directory not empty")]
	DirectoryNotEmpty(String),

	/// A directory's direct blocks are all allocated and all their slots are live.
	#[error("directory is full")]
	DirectoryFull,

	/// A file would exceed the direct-pointer size cap.
	#[error("file too large: {size} bytes exceeds the {max} byte limit")]
	FileTooLarge {
		/// The size that was rejected.
		size: u64,
		/// The maximum size a file may have.
		max: u64,
	},

	/// The inode or data block bitmap is exhausted.
	#[error("no space left on device")]
	NoSpace,

	/// An argument was out of its valid range (e.g. a non-positive byte count).
	#[error("invalid argument: {0}")]
	InvalidArgument(String),

	/// An attempt was made to remove the root directory.
	#[error("cannot remove root directory")]
	CannotRemoveRoot,

	/// The backing store failed. This is the only fatal error kind.
	#[error("I/O error: {0}")]
	Io(#[from] io::Error),
}

/// The result type returned by every core operation.
pub type FsResult<T> = Result<T, FsError>;

impl FsError {
	/// Tells whether this error should terminate the process rather than just being reported.
	pub fn is_fatal(&self) -> bool {
		matches!(self, FsError::Io(_))
	}
}
