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

//! The `mknod` system call creates a filesystem node.

use crate::{
	errno,
	errno::EResult,
	file::{fs::FileType, vfs},
	mac::FilterPerms,
	process,
	syscall::util,
	syscall::util::{FILE_TYPE_BLOCK, FILE_TYPE_CHAR, FILE_TYPE_DIRECTORY, FILE_TYPE_REGULAR},
};

pub fn mknod(path: usize, len: usize, typ: u32, mode: u32, dev: u32) -> EResult<usize> {
	let proc = util::current_proc()?;
	let path = util::user_path(&proc, path, len)?;
	let path = util::compound_at(&proc, util::AT_FDCWD, &path)?;
	let typ = match typ {
		FILE_TYPE_REGULAR => FileType::Regular,
		FILE_TYPE_DIRECTORY => FileType::Directory,
		FILE_TYPE_CHAR => FileType::CharDevice,
		FILE_TYPE_BLOCK => FileType::BlockDevice,
		_ => return Err(errno!(EINVAL)),
	};
	let allowed = proc
		.lock()
		.mac
		.check_path_permissions(&path)
		.contains(FilterPerms::WRITE);
	process::mac_enforce(&proc, allowed, "mknod")?;
	vfs::create_node(&path, typ, mode as u16, dev)?;
	Ok(0)
}
