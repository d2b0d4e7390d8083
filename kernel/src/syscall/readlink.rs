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

//! The `readlink` system call reads the target of a symbolic link.
//!
//! A short count indicates the given buffer was too small: no terminator is
//! appended.

use crate::{
	errno::EResult,
	file::vfs,
	memory::user::UserSlice,
	syscall::util,
};

pub fn readlink(path: usize, len: usize, buf: usize, bufsize: usize) -> EResult<usize> {
	let proc = util::current_proc()?;
	let path = util::user_path(&proc, path, len)?;
	let path = util::compound_at(&proc, util::AT_FDCWD, &path)?;
	let target = vfs::read_symbolic_link(&path)?;
	util::with_space(&proc, |space| {
		UserSlice::from_raw(buf, bufsize).copy_to_user(space, &target)
	})
}
