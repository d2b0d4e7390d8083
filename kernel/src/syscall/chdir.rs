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

//! The `chdir` system call changes the current working directory of the
//! calling process.

use crate::{
	errno,
	errno::EResult,
	file::{fs::FileType, vfs},
	syscall::util,
};

pub fn chdir(path: usize, len: usize) -> EResult<usize> {
	let proc = util::current_proc()?;
	let path = util::user_path(&proc, path, len)?;
	let path = util::compound_at(&proc, util::AT_FDCWD, &path)?;
	let resolved = vfs::resolve_path(&path, true)?;
	let stat = vfs::stat_path(&resolved)?;
	if stat.typ != FileType::Directory {
		return Err(errno!(ENOTDIR));
	}
	proc.lock().cwd = resolved;
	Ok(0)
}
