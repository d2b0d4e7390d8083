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

//! The `pipe` system call creates a pipe, returning its two file
//! descriptors: the read end first.

use crate::{
	errno::EResult,
	file::{fd::FD_CLOEXEC, pipe::Pipe, Description, O_CLOEXEC, O_NONBLOCK},
	memory::user::UserPtr,
	syscall::util,
};

pub fn pipe(fds: UserPtr<[u32; 2]>, flags: u32) -> EResult<usize> {
	let proc = util::current_proc()?;
	let (reader, writer) = Pipe::pair(flags & O_NONBLOCK == 0);
	let fd_flags = if flags & O_CLOEXEC != 0 { FD_CLOEXEC } else { 0 };
	let (rfd, wfd) = {
		let mut proc = proc.lock();
		let pair = proc.fds.add_file_pair(
			Description::PipeReader(reader),
			Description::PipeWriter(writer),
		)?;
		if fd_flags != 0 {
			proc.fds.get_file_mut(pair.0)?.flags = fd_flags;
			proc.fds.get_file_mut(pair.1)?.flags = fd_flags;
		}
		pair
	};
	util::with_space(&proc, |space| fds.copy_to_user(space, &[rfd, wfd]))?;
	Ok(0)
}
