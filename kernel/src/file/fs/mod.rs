/*
 * Copyright 2024 Luc Lenôtre
 *
 * This file is part of Encore.
 *
 * Encore is free software: you can redistribute it and/or modify it under the
 * terms of the GNU General Public License as published by the Free Software
 * Foundation, either version 3 of the License, or (at your option) any later
 * version.
 *
 * Encore is distributed in the hope that it will be useful, but WITHOUT ANY
 * WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR
 * A PARTICULAR PURPOSE. See the GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License along with
 * Encore. If not, see <https://www.gnu.org/licenses/>.
 */

//! Filesystems.
//!
//! A filesystem driver implements [`FilesystemOps`], through which the VFS
//! addresses every file it holds. Two kinds are supported: ext-style
//! ([`ext`]) and FAT-style ([`fat`]). Disk-format-exact compatibility is out
//! of scope: both keep their tree in memory over their backing device.

pub mod ext;
pub mod fat;
pub mod nodes;

use crate::{
	device::DeviceHandle,
	errno,
	errno::EResult,
	file::path::Path,
	time::Timestamp,
};
use alloc::{sync::Arc, vec::Vec};

/// A handle to an open file, private to the filesystem that issued it.
pub type FsHandle = u64;

/// The type of a file.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FileType {
	/// A regular file.
	Regular,
	/// A directory.
	Directory,
	/// A symbolic link.
	Symlink,
	/// A character device.
	CharDevice,
	/// A block device.
	BlockDevice,
}

/// Status information of a file.
#[derive(Clone, Debug)]
pub struct Stat {
	/// An identifier unique within the filesystem.
	pub unique_identifier: u64,
	/// The file's permission bits.
	pub mode: u16,
	/// The file's type.
	pub typ: FileType,
	/// The number of hard links to the file.
	pub hard_link_count: u16,
	/// The size of the file in bytes.
	pub byte_size: u64,
	/// Last access time.
	pub access_time: Timestamp,
	/// Last modification time.
	pub modify_time: Timestamp,
	/// Creation time.
	pub create_time: Timestamp,
	/// The preferred I/O block size in bytes.
	pub io_block_size: u32,
	/// The number of I/O blocks used by the file.
	pub io_block_count: u64,
	/// The backing device, for device nodes. `0` otherwise.
	pub device: DeviceHandle,
}

/// An entry of a directory.
#[derive(Clone, Debug)]
pub struct DirEntry {
	/// The unique identifier of the entry's file.
	pub inode: u64,
	/// The entry's type.
	pub typ: FileType,
	/// The entry's name.
	pub name: Vec<u8>,
}

/// The interface every filesystem presents to the VFS.
///
/// Paths given to the operations are relative to the filesystem's root, in
/// compound form.
pub trait FilesystemOps: Send + Sync {
	/// Opens the file at `path`.
	///
	/// `write` tells whether the file may be written through the returned
	/// handle.
	fn open(&self, path: &Path, write: bool) -> EResult<FsHandle>;

	/// Closes the given handle.
	fn close(&self, handle: FsHandle);

	/// Reads from the file at offset `off`, returning the number of bytes
	/// read. A short count indicates end-of-file.
	fn read(&self, handle: FsHandle, off: u64, buf: &mut [u8]) -> EResult<usize>;

	/// Writes to the file at offset `off`, returning the number of bytes
	/// written.
	fn write(&self, handle: FsHandle, off: u64, buf: &[u8]) -> EResult<usize>;

	/// Returns the status of the file.
	fn stat(&self, handle: FsHandle) -> EResult<Stat>;

	/// Truncates or extends the file to `size` bytes.
	fn truncate(&self, handle: FsHandle, size: u64) -> EResult<()>;

	/// Removes the link at `path`, removing the file once its link count
	/// reaches zero and it is no longer open.
	fn unlink(&self, path: &Path) -> EResult<()>;

	/// Renames the file at `src` to `dst`.
	///
	/// If `keep` is set, the source link is kept, making the operation a
	/// hard-link creation.
	fn rename(&self, src: &Path, dst: &Path, keep: bool) -> EResult<()>;

	/// Creates a node at `path`.
	///
	/// `device` is the backing device handle for device nodes.
	fn create_node(
		&self,
		path: &Path,
		typ: FileType,
		mode: u16,
		device: DeviceHandle,
	) -> EResult<()>;

	/// Creates a symbolic link at `path` pointing to `target`.
	fn create_symlink(&self, path: &Path, target: &[u8]) -> EResult<()>;

	/// Creates a hard link at `path` pointing to the file at `target`.
	fn create_hard_link(&self, path: &Path, target: &Path) -> EResult<()>;

	/// Returns the target of the symbolic link at `path`.
	fn read_symbolic_link(&self, path: &Path) -> EResult<Vec<u8>>;

	/// Returns the entries of the directory behind `handle`.
	fn read_entries(&self, handle: FsHandle) -> EResult<Vec<DirEntry>>;

	/// Flushes the file behind `handle`, or the whole filesystem if `None`.
	fn synchronize(&self, handle: Option<FsHandle>) -> EResult<()>;
}

/// Mount filesystem code: ext-style.
pub const MNT_EXT: u32 = 0;
/// Mount filesystem code: FAT-style.
pub const MNT_FAT: u32 = 1;

/// The supported filesystem kinds.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FilesystemType {
	/// ext-style filesystem.
	Ext,
	/// FAT-style filesystem.
	Fat,
}

impl FilesystemType {
	/// Returns the type matching the given ABI code.
	pub fn from_code(code: u32) -> EResult<Self> {
		match code {
			MNT_EXT => Ok(Self::Ext),
			MNT_FAT => Ok(Self::Fat),
			_ => Err(errno!(EINVAL)),
		}
	}

	/// Returns the ABI code of the type.
	pub fn code(self) -> u32 {
		match self {
			Self::Ext => MNT_EXT,
			Self::Fat => MNT_FAT,
		}
	}

	/// Creates a filesystem instance over the given backing device.
	pub fn mount(self, source: DeviceHandle) -> EResult<Arc<dyn FilesystemOps>> {
		match self {
			Self::Ext => Ok(Arc::new(ext::ExtFs::new(source))),
			Self::Fat => Ok(Arc::new(fat::FatFs::new(source))),
		}
	}
}
