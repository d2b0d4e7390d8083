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

//! The `getcwd` system call returns the current working directory of the
//! calling process.

use crate::{
	errno,
	errno::EResult,
	memory::user::UserSlice,
	syscall::util,
};

pub fn getcwd(buf: usize, size: usize) -> EResult<usize> {
	let proc = util::current_proc()?;
	let cwd = proc.lock().cwd.as_bytes().to_vec();
	if size < cwd.len() + 1 {
		return Err(errno!(ERANGE));
	}
	util::with_space(&proc, |space| {
		let slice = UserSlice::from_raw(buf, cwd.len() + 1);
		slice.copy_to_user(space, &cwd)?;
		UserSlice::from_raw(buf + cwd.len(), 1).copy_to_user(space, &[0])?;
		Ok(cwd.len() + 1)
	})
}
