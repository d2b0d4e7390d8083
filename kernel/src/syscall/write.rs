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

//! The `write` system call writes to a file descriptor.

use crate::{
	errno::EResult,
	memory::user::UserSlice,
	syscall::{read::MAX_CHUNK, util},
};

pub fn write(fd: u32, buf: usize, count: usize) -> EResult<usize> {
	let proc = util::current_proc()?;
	let count = count.min(MAX_CHUNK);
	let kbuf = util::with_space(&proc, |space| {
		UserSlice::from_raw(buf, count).copy_from_user(space)
	})?;
	let desc = proc.lock().get_file(fd)?;
	// May block: no lock is held across this point
	desc.write(&kbuf)
}
