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

//! The `dup` system call duplicates a file descriptor.
//!
//! The new descriptor points to the same open description: reads and writes
//! through either affect the same object, and closing one leaves the other
//! usable.
//!
//! `target` selects the new descriptor's ID: `-1` takes the lowest free
//! slot, any other value replaces that exact slot, as `dup2` would.

use crate::{errno::EResult, syscall::util};

pub fn dup(fd: u32, target: i32) -> EResult<usize> {
	let proc = util::current_proc()?;
	let mut proc = proc.lock();
	if target < 0 {
		return Ok(proc.fds.dup(fd, 0, false)? as usize);
	}
	let target = target as u32;
	if target == fd {
		proc.fds.get_file(fd)?;
		return Ok(target as usize);
	}
	let desc = proc.get_file(fd)?;
	proc.replace_file(target, 0, desc)?;
	Ok(target as usize)
}
