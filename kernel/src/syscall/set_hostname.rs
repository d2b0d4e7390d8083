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

//! The `set_hostname` system call sets the system's hostname.

use crate::{
	errno,
	errno::EResult,
	limits,
	memory::user::UserSlice,
	syscall::util,
	HOSTNAME,
};

pub fn set_hostname(name: usize, len: usize) -> EResult<usize> {
	if len > limits::HOST_NAME_MAX {
		return Err(errno!(ENAMETOOLONG));
	}
	let proc = util::current_proc()?;
	let name = util::with_space(&proc, |space| {
		UserSlice::from_raw(name, len).copy_from_user(space)
	})?;
	*HOSTNAME.lock() = name;
	Ok(0)
}
