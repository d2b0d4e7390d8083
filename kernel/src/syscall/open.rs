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

//! The `open` system call opens a file, returning a file descriptor.

use crate::{
	errno::EResult,
	file,
	file::{fd::FD_CLOEXEC, fs::FileType, vfs, AccessMode, Description, O_CLOEXEC},
	mac::FilterPerms,
	process,
	syscall::util,
};

pub fn open(dirfd: i32, path: usize, len: usize, flags: u32) -> EResult<usize> {
	let proc = util::current_proc()?;
	let path = util::user_path(&proc, path, len)?;
	let path = util::compound_at(&proc, dirfd, &path)?;
	let resolved = vfs::resolve_path(&path, flags & file::O_NOFOLLOW == 0)?;
	// MAC: the access mode must be granted on the path, and on the device
	// for a device node
	let mode = AccessMode::from_flags(flags);
	let mut required = FilterPerms::empty();
	if mode.can_read() {
		required |= FilterPerms::READ;
	}
	if mode.can_write() {
		required |= FilterPerms::WRITE;
	}
	let allowed = proc
		.lock()
		.mac
		.check_path_permissions(&resolved)
		.contains(required);
	process::mac_enforce(&proc, allowed, "open")?;
	let file = vfs::open(&path, flags)?;
	let stat = file.stat()?;
	if matches!(stat.typ, FileType::CharDevice | FileType::BlockDevice) {
		let allowed = proc
			.lock()
			.mac
			.check_device_permissions(stat.device)
			.contains(required);
		process::mac_enforce(&proc, allowed, "open")?;
	}
	let fd_flags = if flags & O_CLOEXEC != 0 { FD_CLOEXEC } else { 0 };
	let fd = proc.lock().add_file(fd_flags, Description::File(file))?;
	Ok(fd as usize)
}
