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

//! The `fcntl` system call manipulates a file descriptor.

use crate::{
	errno,
	errno::EResult,
	file::{fd::FD_CLOEXEC, Description, O_NONBLOCK, O_RDONLY, O_RDWR, O_WRONLY},
	syscall::util,
};

/// Duplicate the descriptor onto the lowest free slot at least `arg`.
pub const F_DUPFD: u32 = 0;
/// Same as `F_DUPFD`, with the close-on-exec flag set on the new
/// descriptor.
pub const F_DUPFD_CLOEXEC: u32 = 1;
/// Get the descriptor's flags.
pub const F_GETFD: u32 = 2;
/// Set the descriptor's flags.
pub const F_SETFD: u32 = 3;
/// Get the description's status flags and access mode.
pub const F_GETFL: u32 = 4;
/// Set the description's status flags.
pub const F_SETFL: u32 = 5;

pub fn fcntl(fd: u32, cmd: u32, arg: usize) -> EResult<usize> {
	let proc = util::current_proc()?;
	let mut proc = proc.lock();
	match cmd {
		F_DUPFD => Ok(proc.fds.dup(fd, arg as u32, false)? as usize),
		F_DUPFD_CLOEXEC => Ok(proc.fds.dup(fd, arg as u32, true)? as usize),
		F_GETFD => Ok(proc.fds.get_file(fd)?.flags as usize),
		F_SETFD => {
			proc.fds.get_file_mut(fd)?.flags = arg as u32 & FD_CLOEXEC;
			Ok(0)
		}
		F_GETFL => {
			let flags = match proc.fds.get_file(fd)?.get() {
				Description::File(file) => {
					let mode = match (file.get_mode().can_read(), file.get_mode().can_write()) {
						(true, true) => O_RDWR,
						(false, true) => O_WRONLY,
						_ => O_RDONLY,
					};
					mode | file.get_flags()
				}
				Description::PipeReader(r) => {
					O_RDONLY | nonblock_flag(r.pipe().is_blocking())
				}
				Description::PipeWriter(w) => {
					O_WRONLY | nonblock_flag(w.pipe().is_blocking())
				}
				Description::PtyPrimary(_) | Description::PtySecondary(_) => O_RDWR,
			};
			Ok(flags as usize)
		}
		F_SETFL => {
			match proc.fds.get_file(fd)?.get() {
				Description::File(file) => file.set_flags(arg as u32),
				Description::PipeReader(r) => {
					r.pipe().set_blocking(arg as u32 & O_NONBLOCK == 0)
				}
				Description::PipeWriter(w) => {
					w.pipe().set_blocking(arg as u32 & O_NONBLOCK == 0)
				}
				_ => {}
			}
			Ok(0)
		}
		_ => Err(errno!(EINVAL)),
	}
}

fn nonblock_flag(blocking: bool) -> u32 {
	if blocking {
		0
	} else {
		O_NONBLOCK
	}
}
