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

//! The `read` system call reads from a file descriptor.

use crate::{
	errno,
	errno::EResult,
	memory::user::UserSlice,
	syscall::util,
};
use alloc::vec;

/// The maximum number of bytes transferred in one call. A short count tells
/// the caller to loop.
pub(super) const MAX_CHUNK: usize = 65536;

pub fn read(fd: u32, buf: usize, count: usize) -> EResult<usize> {
	let proc = util::current_proc()?;
	let count = count.min(MAX_CHUNK);
	// Validate the destination before any side effect
	util::with_space(&proc, |space| {
		if !space.check_userland_access(buf as u64, count, true) {
			return Err(errno!(EFAULT));
		}
		Ok(())
	})?;
	let desc = proc.lock().get_file(fd)?;
	let mut kbuf = vec![0u8; count];
	// May block: no lock is held across this point
	let n = desc.read(&mut kbuf)?;
	util::with_space(&proc, |space| {
		UserSlice::from_raw(buf, n).copy_to_user(space, &kbuf[..n])
	})
}
