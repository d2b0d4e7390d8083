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

//! Utilities shared by system call implementations.

use crate::{
	errno,
	errno::EResult,
	file::{
		fs::{FileType, Stat},
		path::{Path, PathBuf},
	},
	memory::{
		user::UserSlice,
		vmm::AddressSpace,
	},
	process,
	process::Process,
	sync::mutex::IntMutex,
};
use alloc::{sync::Arc, vec::Vec};
use macros::AnyRepr;

/// Special file descriptor value: resolve relative paths from the process's
/// current working directory.
pub const AT_FDCWD: i32 = -100;

/// Returns the process making the current system call.
pub fn current_proc() -> EResult<Arc<IntMutex<Process>>> {
	process::current().ok_or_else(|| errno!(EAGAIN))
}

/// Runs `f` with the address space of the given process.
pub fn with_space<T, F: FnOnce(&mut AddressSpace) -> EResult<T>>(
	proc: &Arc<IntMutex<Process>>,
	f: F,
) -> EResult<T> {
	let space = proc
		.lock()
		.space
		.clone()
		.ok_or_else(|| errno!(EAGAIN))?;
	let mut space = space.lock();
	f(&mut space)
}

/// Copies a path argument (pointer plus length) from userspace.
pub fn user_path(
	proc: &Arc<IntMutex<Process>>,
	ptr: usize,
	len: usize,
) -> EResult<Vec<u8>> {
	if len > crate::limits::PATH_MAX {
		return Err(errno!(ENAMETOOLONG));
	}
	with_space(proc, |space| {
		UserSlice::from_raw(ptr, len).copy_from_user(space)
	})
}

/// Compounds `path` against the directory the file descriptor `dirfd`
/// refers to.
///
/// An absolute `path` stands alone. [`AT_FDCWD`] uses the process's current
/// working directory; any other descriptor must refer to an open file, whose
/// absolute path is used as the base.
pub fn compound_at(
	proc: &Arc<IntMutex<Process>>,
	dirfd: i32,
	path: &[u8],
) -> EResult<PathBuf> {
	let path = Path::new(path)?;
	if path.is_absolute() {
		return Path::root().compound(path);
	}
	if dirfd == AT_FDCWD {
		return proc.lock().cwd.compound(path);
	}
	let desc = proc.lock().get_file(dirfd as u32)?;
	let base = desc.as_file()?.get_path().clone();
	base.compound(path)
}

/// The file status structure exposed to userspace.
#[repr(C)]
#[derive(AnyRepr, Clone, Debug, Default)]
pub struct UserStat {
	/// Identifier unique within the filesystem.
	pub st_ino: u64,
	/// Permission bits.
	pub st_mode: u32,
	/// File type, as one of the `FILE_TYPE_*` constants.
	pub st_type: u32,
	/// Number of hard links.
	pub st_nlink: u32,
	/// Backing device handle, for device nodes.
	pub st_rdev: u32,
	/// Size in bytes.
	pub st_size: u64,
	/// Access time, seconds and nanoseconds since the Unix epoch.
	pub st_atime: [u64; 2],
	/// Modification time.
	pub st_mtime: [u64; 2],
	/// Creation time.
	pub st_ctime: [u64; 2],
	/// Preferred I/O block size.
	pub st_blksize: u64,
	/// Number of I/O blocks used.
	pub st_blocks: u64,
}

/// File type code: regular file.
pub const FILE_TYPE_REGULAR: u32 = 0;
/// File type code: directory.
pub const FILE_TYPE_DIRECTORY: u32 = 1;
/// File type code: symbolic link.
pub const FILE_TYPE_SYMLINK: u32 = 2;
/// File type code: character device.
pub const FILE_TYPE_CHAR: u32 = 3;
/// File type code: block device.
pub const FILE_TYPE_BLOCK: u32 = 4;

/// Returns the ABI code of a file type.
pub fn file_type_code(typ: FileType) -> u32 {
	match typ {
		FileType::Regular => FILE_TYPE_REGULAR,
		FileType::Directory => FILE_TYPE_DIRECTORY,
		FileType::Symlink => FILE_TYPE_SYMLINK,
		FileType::CharDevice => FILE_TYPE_CHAR,
		FileType::BlockDevice => FILE_TYPE_BLOCK,
	}
}

impl From<&Stat> for UserStat {
	fn from(stat: &Stat) -> Self {
		Self {
			st_ino: stat.unique_identifier,
			st_mode: stat.mode as u32,
			st_type: file_type_code(stat.typ),
			st_nlink: stat.hard_link_count as u32,
			st_rdev: stat.device,
			st_size: stat.byte_size,
			st_atime: [stat.access_time.sec, stat.access_time.nsec as u64],
			st_mtime: [stat.modify_time.sec, stat.modify_time.nsec as u64],
			st_ctime: [stat.create_time.sec, stat.create_time.nsec as u64],
			st_blksize: stat.io_block_size as u64,
			st_blocks: stat.io_block_count,
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test_case]
	fn compound_at_cwd() {
		let proc = process::create_process(None).unwrap();
		proc.lock().cwd = PathBuf::try_from(b"/usr/local".as_slice()).unwrap();
		// A relative path is compounded against the CWD
		let path = compound_at(&proc, AT_FDCWD, b"../bin/./sh").unwrap();
		assert_eq!(path.as_bytes(), b"/usr/bin/sh");
		// An absolute path stands alone
		let path = compound_at(&proc, AT_FDCWD, b"/etc/motd").unwrap();
		assert_eq!(path.as_bytes(), b"/etc/motd");
		let pid = proc.lock().get_pid();
		process::delete_process(pid);
	}
}
