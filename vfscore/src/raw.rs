//! Helpers for reinterpreting `repr(C, packed)` on-disk structures as raw bytes.
//!
//! Mirrors the read/write style used throughout this tool family's other disk-format code
//! (block group descriptors, inodes): a fixed-layout struct is written and read as its raw
//! byte representation rather than hand-rolling a field-by-field (de)serializer.

use std::mem::size_of;
use std::mem::zeroed;
use std::slice;

/// Views `v` as its raw byte representation.
pub fn as_bytes<T>(v: &T) -> &[u8] {
	unsafe { slice::from_raw_parts(v as *const T as *const u8, size_of::<T>()) }
}

/// Views `v` as its mutable raw byte representation.
pub fn as_bytes_mut<T>(v: &mut T) -> &mut [u8] {
	unsafe { slice::from_raw_parts_mut(v as *mut T as *mut u8, size_of::<T>()) }
}

/// Reinterprets the first `size_of::<T>()` bytes of `bytes` as a `T`.
///
/// `T` must be a plain-old-data type for which the all-zero bit pattern is valid, since the
/// value starts zeroed and is then overwritten byte-for-byte.
pub fn from_bytes<T>(bytes: &[u8]) -> T {
	let mut v: T = unsafe { zeroed() };
	as_bytes_mut(&mut v).copy_from_slice(&bytes[..size_of::<T>()]);
	v
}
