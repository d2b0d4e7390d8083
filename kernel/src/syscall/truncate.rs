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

//! The `truncate` system call resizes an open file.

use crate::{errno::EResult, syscall::util};

pub fn truncate(fd: u32, size: u64) -> EResult<usize> {
	let proc = util::current_proc()?;
	let desc = proc.lock().get_file(fd)?;
	desc.as_file()?.truncate(size)?;
	Ok(0)
}
