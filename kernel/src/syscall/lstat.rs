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

//! The `lstat` system call returns the status of the file at the given
//! path, without following a symbolic link in the final component.

use crate::{
	errno::EResult,
	file::vfs,
	memory::user::UserPtr,
	syscall::util,
	syscall::util::UserStat,
};

pub fn lstat(dirfd: i32, path: usize, len: usize, statbuf: UserPtr<UserStat>) -> EResult<usize> {
	let proc = util::current_proc()?;
	let path = util::user_path(&proc, path, len)?;
	let path = util::compound_at(&proc, dirfd, &path)?;
	let stat = vfs::lstat_path(&path)?;
	util::with_space(&proc, |space| {
		statbuf.copy_to_user(space, &UserStat::from(&stat))
	})?;
	Ok(0)
}
